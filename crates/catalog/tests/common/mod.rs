//! Fake downstream MCP servers for integration tests.
//!
//! Each helper builds a descriptor whose command is a small `sh` script
//! speaking just enough NDJSON MCP: read `initialize`, answer it, read the
//! `notifications/initialized` line, read the real request, answer that.
//! The driver spawns a fresh process per call, so one script serves any
//! number of forwards.

#![allow(dead_code)]

use mcp_catalog::config::McpServer;

/// Initialize response every fake server uses.
pub const INIT_LINE: &str = r#"{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","serverInfo":{"name":"echo","version":"0.1"}}}"#;

/// A downstream running the given `sh` script over stdio.
pub fn scripted_server(script: &str) -> McpServer {
    McpServer {
        command: "sh".into(),
        args: vec!["-c".into(), script.into()],
        enabled: true,
        ..Default::default()
    }
}

/// Handshakes normally, then answers the id-2 request with `reply_line`.
pub fn replying_server(reply_line: &str) -> McpServer {
    let script = [
        "read -r init; printf '%s\\n' '",
        INIT_LINE,
        "'; read -r notif; read -r call; printf '%s\\n' '",
        reply_line,
        "'",
    ]
    .concat();
    scripted_server(&script)
}

/// Handshakes normally, then reflects the raw id-2 request back inside the
/// result as `{"echo": <request>}` so tests can assert what was forwarded.
pub fn echoing_server() -> McpServer {
    let script = [
        "read -r init; printf '%s\\n' '",
        INIT_LINE,
        "'; read -r notif; read -r call; ",
        r#"printf '%s\n' "{\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"echo\":$call}}""#,
    ]
    .concat();
    scripted_server(&script)
}

/// A server exporting exactly one tool named `ping`.
pub fn ping_tool_server() -> McpServer {
    replying_server(
        r#"{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"ping","description":"Reply with pong"}]}}"#,
    )
}

/// Lists one `ping` tool for `tools/list`; any other request is reflected
/// back like [`echoing_server`].
pub fn ping_and_echo_server() -> McpServer {
    let listing = r#"{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"ping"}]}}"#;
    let script = [
        "read -r init; printf '%s\\n' '",
        INIT_LINE,
        "'; read -r notif; read -r call; case \"$call\" in *tools/list*) printf '%s\\n' '",
        listing,
        "';; *) ",
        r#"printf '%s\n' "{\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"echo\":$call}}""#,
        ";; esac",
    ]
    .concat();
    scripted_server(&script)
}

/// Lists one resource (`file:///etc/hosts`) for `resources/list`; any other
/// request is reflected back like [`echoing_server`].
pub fn hosts_resource_server() -> McpServer {
    let listing = r#"{"jsonrpc":"2.0","id":2,"result":{"resources":[{"uri":"file:///etc/hosts","name":"hosts"}]}}"#;
    let script = [
        "read -r init; printf '%s\\n' '",
        INIT_LINE,
        "'; read -r notif; read -r call; case \"$call\" in *resources/list*) printf '%s\\n' '",
        listing,
        "';; *) ",
        r#"printf '%s\n' "{\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"echo\":$call}}""#,
        ";; esac",
    ]
    .concat();
    scripted_server(&script)
}
