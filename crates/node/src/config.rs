//! Configuration for a storage node
//!
//! Supports YAML configuration files; command-line flags take precedence.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Node identity
    pub node: NodeConfig,
    /// Network configuration
    #[serde(default)]
    pub network: NetworkConfig,
    /// Steward connection
    #[serde(default)]
    pub steward: StewardConnConfig,
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from YAML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_yaml(&content)
    }

    /// Load configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

/// Node identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Instance UUID; generated when absent
    pub instance_uuid: Option<Uuid>,
    /// Replicaset this instance belongs to
    pub replicaset_uuid: Option<Uuid>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            instance_uuid: None,
            replicaset_uuid: None,
        }
    }
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Binary protocol listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Address advertised to the steward; defaults to the listen address
    #[serde(default)]
    pub advertise_addr: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            advertise_addr: None,
        }
    }
}

/// Steward connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StewardConnConfig {
    /// Steward base URL
    #[serde(default = "default_steward_addr")]
    pub steward_addr: String,
    /// Heartbeat interval in seconds
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for StewardConnConfig {
    fn default() -> Self {
        Self {
            steward_addr: default_steward_addr(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl StewardConnConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:33010".to_string()
}

fn default_steward_addr() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_heartbeat_interval_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_yaml_with_defaults() {
        let yaml = r#"
node:
  replicaset_uuid: "c64e82a7-3b16-4c23-8a37-b77c38c77119"
network:
  listen_addr: "127.0.0.1:33011"
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert!(config.node.instance_uuid.is_none());
        assert_eq!(config.network.listen_addr, "127.0.0.1:33011");
        assert_eq!(config.steward.steward_addr, "http://127.0.0.1:8080");
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_from_yaml_rejects_garbage() {
        assert!(Config::from_yaml(": not yaml [").is_err());
    }
}
