//! # Node Configuration
//!
//! One TOML file describes the merchant, its key material, the gateway
//! endpoints, where settlement files go, and how the notify server listens.
//! Only `[merchant]` and `[credentials]` are mandatory; `settle` also needs
//! `[gateway]`.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use upacp_protocol::config::{CredentialConfig, GatewayEndpoints, MerchantConfig, SettlementConfig};

/// Default path the notify endpoint is mounted on.
pub const DEFAULT_NOTIFY_PATH: &str = "/notify";

/// Default notify server port.
pub const DEFAULT_PORT: u16 = 8080;

/// Parsed `upacp.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub merchant: MerchantConfig,
    pub credentials: CredentialConfig,
    #[serde(default)]
    pub gateway: Option<GatewayEndpoints>,
    #[serde(default)]
    pub settlement: SettlementConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_notify_path")]
    pub notify_path: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            notify_path: default_notify_path(),
            port: default_port(),
        }
    }
}

fn default_notify_path() -> String {
    DEFAULT_NOTIFY_PATH.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl NodeConfig {
    /// Read and parse the config file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        if !config.server.notify_path.starts_with('/') {
            anyhow::bail!(
                "server.notify_path must start with '/', got {:?}",
                config.server.notify_path
            );
        }
        Ok(config)
    }
}
