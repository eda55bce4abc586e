//! Catalog-and-proxy service for MCP tool servers.
//!
//! This crate maintains a registry of configured downstream MCP servers,
//! periodically verifies their health, discovers the capabilities they
//! expose, and presents itself upstream as a single aggregated MCP server
//! over both a streamable HTTP transport and a stdio transport.

pub mod client;
pub mod config;
pub mod manager;
pub mod proxy;
pub mod rpc;
pub mod server;
pub mod types;

pub use config::{CatalogConfig, ConfigError, McpServer, Store, TransportKind};
pub use manager::{HealthManager, ManagerError, ServerInfo};
