//! Persistent store for the catalog configuration document.

use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use thiserror::Error;

use super::model::{CatalogConfig, McpServer};

/// Errors from configuration load and persistence.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Thread-safe owner of the configuration document.
///
/// Every read hands out a deep copy; callers can never mutate the stored
/// state through a returned value. Mutations normalize, swap the document
/// under an exclusive lock, and persist atomically before returning.
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    config: RwLock<CatalogConfig>,
}

impl Store {
    /// Create a store backed by `path` with an empty document.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: RwLock::new(CatalogConfig::default()),
        }
    }

    /// Load the document from disk, creating the file when it is missing.
    pub fn load(&self) -> Result<(), ConfigError> {
        let mut config = self.config.write().expect("config lock poisoned");
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let mut loaded: CatalogConfig = serde_json::from_str(&content)?;
                loaded.normalize();
                *config = loaded;
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => self.persist(&config),
            Err(err) => Err(err.into()),
        }
    }

    /// Deep copy of the whole document.
    pub fn get(&self) -> CatalogConfig {
        self.config.read().expect("config lock poisoned").clone()
    }

    /// Deep copy of a single server entry.
    pub fn get_server(&self, name: &str) -> Option<McpServer> {
        self.config
            .read()
            .expect("config lock poisoned")
            .mcp_servers
            .get(name)
            .cloned()
    }

    /// Replace the whole document and persist it.
    pub fn set(&self, mut new_config: CatalogConfig) -> Result<(), ConfigError> {
        new_config.normalize();
        let mut config = self.config.write().expect("config lock poisoned");
        self.persist(&new_config)?;
        *config = new_config;
        Ok(())
    }

    /// Add or replace one server entry and persist.
    pub fn add_server(&self, name: &str, mut server: McpServer) -> Result<(), ConfigError> {
        server.normalize();
        let mut config = self.config.write().expect("config lock poisoned");
        let mut updated = config.clone();
        updated.mcp_servers.insert(name.to_string(), server);
        self.persist(&updated)?;
        *config = updated;
        Ok(())
    }

    /// Remove one server entry and persist.
    pub fn remove_server(&self, name: &str) -> Result<(), ConfigError> {
        let mut config = self.config.write().expect("config lock poisoned");
        let mut updated = config.clone();
        updated.mcp_servers.shift_remove(name);
        self.persist(&updated)?;
        *config = updated;
        Ok(())
    }

    /// Seconds between periodic health checks; zero or negative = disabled.
    pub fn health_check_interval(&self) -> i64 {
        self.config
            .read()
            .expect("config lock poisoned")
            .health_check_interval
    }

    /// Update the health check interval and persist.
    pub fn set_health_check_interval(&self, seconds: i64) -> Result<(), ConfigError> {
        let mut config = self.config.write().expect("config lock poisoned");
        let mut updated = config.clone();
        updated.health_check_interval = seconds;
        self.persist(&updated)?;
        *config = updated;
        Ok(())
    }

    /// Pretty-printed document for download.
    pub fn export(&self) -> Result<String, ConfigError> {
        let config = self.config.read().expect("config lock poisoned");
        Ok(serde_json::to_string_pretty(&*config)?)
    }

    /// Write the document to a temporary file and rename it into place so a
    /// crash mid-write never leaves a torn file behind.
    fn persist(&self, config: &CatalogConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(config)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Default configuration path: `<config dir>/mcp-catalog/config.json`.
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mcp-catalog")
        .join("config.json")
}
