//! Server configuration.
//!
//! Loaded from a YAML file:
//!
//! ```yaml
//! listeners:
//!   - host: localhost
//!     bind-ip: 127.0.0.1
//!     port: 8080
//!     index: ./index.html
//! limits:
//!   header-timeout-secs: 10
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "HTTPD_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "httpd.yaml";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub listeners: Vec<ListenerConfig>,
    #[serde(default)]
    pub limits: Limits,
}

/// One `host`/`bind-ip`/`port`/`index` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ListenerConfig {
    /// Name used in logs
    #[serde(default)]
    pub host: String,
    /// Address to bind; empty means all interfaces
    #[serde(default)]
    pub bind_ip: String,
    pub port: u16,
    /// Document served for `GET /`
    pub index: PathBuf,
}

impl ListenerConfig {
    pub fn bind_addr(&self) -> String {
        let ip = if self.bind_ip.is_empty() {
            "0.0.0.0"
        } else {
            self.bind_ip.as_str()
        };

        if ip.contains(':') && !ip.starts_with('[') {
            format!("[{}]:{}", ip, self.port)
        } else {
            format!("{}:{}", ip, self.port)
        }
    }
}

/// Per-connection resource limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Limits {
    pub max_header_bytes: usize,
    pub max_body_bytes: usize,
    pub header_timeout_secs: u64,
    pub body_timeout_secs: u64,
    pub page_timeout_secs: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_header_bytes: 8 * 1024,
            max_body_bytes: 1024 * 1024,
            header_timeout_secs: 30,
            body_timeout_secs: 30,
            page_timeout_secs: 30,
        }
    }
}

impl Limits {
    pub fn header_timeout(&self) -> Duration {
        Duration::from_secs(self.header_timeout_secs)
    }

    pub fn body_timeout(&self) -> Duration {
        Duration::from_secs(self.body_timeout_secs)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }
}

impl Config {
    /// Loads the file named by `HTTPD_CONFIG`, or `httpd.yaml`.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_file(path)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        let cfg: Config = serde_yaml::from_str(raw)?;
        Ok(cfg)
    }
}
