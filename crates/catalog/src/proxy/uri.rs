//! Proxy resource URI codec.
//!
//! Original URIs are carried as lowercase hex of their UTF-8 bytes, which is
//! deterministic, reversible, and immune to percent-encoding differences
//! between transports.

use super::ResourceRoute;

pub const RESOURCE_PREFIX: &str = "mcp-catalog://resource/";
pub const RESOURCE_TEMPLATE_PREFIX: &str = "mcp-catalog://resource-template/";

/// Build a proxy-facing URI for a downstream resource or template.
pub fn build_proxy_resource_uri(server_name: &str, original_uri: &str, template: bool) -> String {
    let prefix = if template {
        RESOURCE_TEMPLATE_PREFIX
    } else {
        RESOURCE_PREFIX
    };
    format!("{prefix}{server_name}/{}", hex_encode(original_uri.as_bytes()))
}

/// Parse a proxy-facing URI back into its route. Unknown prefixes, missing
/// halves, and invalid hex all yield `None`.
pub fn parse_proxy_resource_uri(uri: &str) -> Option<ResourceRoute> {
    let (prefix, template) = if uri.starts_with(RESOURCE_TEMPLATE_PREFIX) {
        (RESOURCE_TEMPLATE_PREFIX, true)
    } else if uri.starts_with(RESOURCE_PREFIX) {
        (RESOURCE_PREFIX, false)
    } else {
        return None;
    };

    let value = &uri[prefix.len()..];
    let (server_name, encoded) = value.split_once('/')?;
    if server_name.is_empty() || encoded.is_empty() {
        return None;
    }
    let original_uri = String::from_utf8(hex_decode(encoded)?).ok()?;
    Some(ResourceRoute {
        server_name: server_name.to_string(),
        original_uri,
        is_template: template,
    })
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

fn hex_decode(encoded: &str) -> Option<Vec<u8>> {
    if encoded.len() % 2 != 0 {
        return None;
    }
    encoded
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(pair, 16).ok()
        })
        .collect()
}
