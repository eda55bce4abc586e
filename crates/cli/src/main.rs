//! Entry point for the mcp-catalog service.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use mcp_catalog::config::{default_config_path, Store};
use mcp_catalog::manager::HealthManager;
use mcp_catalog::{proxy, server};

/// Catalog and aggregating proxy for MCP tool servers.
#[derive(Parser)]
#[command(name = "mcp-catalog", version, about)]
struct Args {
    /// HTTP port for the management API and the /mcp proxy endpoint.
    #[arg(long, default_value_t = 9847)]
    port: u16,

    /// Config file path (default: <config dir>/mcp-catalog/config.json).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run as an MCP proxy over stdio instead of serving HTTP.
    #[arg(long = "mcp-stdio", default_value_t = false)]
    mcp_stdio: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config_path = args.config.unwrap_or_else(default_config_path);
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create config directory {}", parent.display()))?;
    }

    let store = Arc::new(Store::new(&config_path));
    store
        .load()
        .with_context(|| format!("load config from {}", config_path.display()))?;
    tracing::info!("config loaded from {}", config_path.display());

    if args.mcp_stdio {
        tracing::info!("starting MCP proxy over stdio");
        proxy::stdio::run(store).await.context("stdio proxy")?;
        return Ok(());
    }

    let manager = Arc::new(HealthManager::new(Arc::clone(&store)));

    // Initial health check for all enabled servers, off the startup path.
    {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.check_all().await });
    }
    tokio::spawn(Arc::clone(&manager).run_health_loop());

    let state = server::build_state(Arc::clone(&store), Arc::clone(&manager));
    let router = server::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!("mcp-catalog listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&manager)))
        .await
        .context("http server")?;
    Ok(())
}

async fn shutdown_signal(manager: Arc<HealthManager>) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutting down");
    manager.stop_health_loop();
}

fn init_tracing() {
    let filter = std::env::var("MCP_CATALOG_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
