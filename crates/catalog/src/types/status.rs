//! Observed status of a downstream server.

use serde::{Deserialize, Serialize};

/// Health status of a configured downstream server.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    /// Never checked since it was registered.
    #[default]
    Unchecked,
    /// A health check is currently in flight.
    Checking,
    /// The last handshake succeeded.
    Healthy,
    /// The last check failed.
    Error,
}

impl ServerStatus {
    /// Check if the server passed its last health check.
    pub fn is_healthy(&self) -> bool {
        matches!(self, ServerStatus::Healthy)
    }

    /// Check if the server failed its last health check.
    pub fn is_error(&self) -> bool {
        matches!(self, ServerStatus::Error)
    }
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerStatus::Unchecked => write!(f, "unchecked"),
            ServerStatus::Checking => write!(f, "checking"),
            ServerStatus::Healthy => write!(f, "healthy"),
            ServerStatus::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ServerStatus::Unchecked).unwrap(), "\"unchecked\"");
        assert_eq!(serde_json::to_string(&ServerStatus::Healthy).unwrap(), "\"healthy\"");
    }

    #[test]
    fn status_predicates() {
        assert!(ServerStatus::Healthy.is_healthy());
        assert!(!ServerStatus::Checking.is_healthy());
        assert!(ServerStatus::Error.is_error());
    }
}
