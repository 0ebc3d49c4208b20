//! Configuration types

use serde::{Deserialize, Serialize};
use shopsync_channels::ChannelSettings;
use shopsync_client::MutationSettings;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub channels: ChannelSettings,
    #[serde(default)]
    pub mutations: MutationSettings,
}

/// Remote service location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// REST base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path of the push hub under `base_url`
    #[serde(default = "default_hub_path")]
    pub hub_path: String,
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_hub_path() -> String {
    "/hubs".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            hub_path: default_hub_path(),
        }
    }
}

impl ServerConfig {
    /// Full hub URL; the transport maps `http(s)` to `ws(s)`
    #[must_use]
    pub fn hub_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.hub_path.trim_start_matches('/')
        )
    }
}
