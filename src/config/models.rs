// src/config/models.rs
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub poller: PollerConfig,
    pub server: ServerConfig,
    pub metrics: MetricsConfig,
    pub view: ViewConfig,
}

/// Where the front end finds the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Host serving the front end; the base path is resolved against it.
    pub origin: String,
    pub base_path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            origin: "http://127.0.0.1:8000".to_string(),
            base_path: "/api/v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    pub stale_time_secs: u64,
    pub refetch_interval_secs: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            stale_time_secs: 5,
            refetch_interval_secs: 10,
        }
    }
}

impl PollerConfig {
    pub fn stale_time(&self) -> Duration {
        Duration::from_secs(self.stale_time_secs)
    }

    pub fn refetch_interval(&self) -> Duration {
        Duration::from_secs(self.refetch_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub project_name: String,
    pub version: String,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            project_name: "Reflection Agent".to_string(),
            version: "0.1.0".to_string(),
            cors_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(self.bind_address.clone()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
            path: "/metrics".to_string(),
        }
    }
}

/// Front end output. When `html_path` is set the page is also written there
/// on every state change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub html_path: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid API origin '{0}': must be an absolute http(s) URL")]
    InvalidOrigin(String),

    #[error("Invalid API base path '{0}': must start with a single '/'")]
    InvalidBasePath(String),

    #[error("Refetch interval must be greater than zero")]
    ZeroRefetchInterval,

    #[error("Invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("Invalid metrics path '{0}': must start with '/'")]
    InvalidMetricsPath(String),
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match Url::parse(&self.api.origin) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => return Err(ConfigError::InvalidOrigin(self.api.origin.clone())),
        }

        // "//host/x" would resolve against another authority
        let base_path = &self.api.base_path;
        if !base_path.starts_with('/') || base_path.starts_with("//") {
            return Err(ConfigError::InvalidBasePath(self.api.base_path.clone()));
        }

        if self.poller.refetch_interval_secs == 0 {
            return Err(ConfigError::ZeroRefetchInterval);
        }

        self.server.bind_addr()?;

        if self.metrics.enabled && !self.metrics.path.starts_with('/') {
            return Err(ConfigError::InvalidMetricsPath(self.metrics.path.clone()));
        }

        Ok(())
    }
}
