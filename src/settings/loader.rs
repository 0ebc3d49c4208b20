//! Configuration loading
//!
//! Embedded defaults, then optional files, then environment.

use super::config::AppConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    let env = std::env::var("SHOPSYNC_ENV").unwrap_or_else(|_| "development".to_string());
    let config = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. External overrides (optional)
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{env}")).required(false))
        .add_source(File::with_name("config/local").required(false))
        // 3. Environment variables (highest priority), e.g. SHOPSYNC_SERVER__BASE_URL
        .add_source(
            Environment::with_prefix("SHOPSYNC")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("channels.reconnect_delays_secs")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_deserialize() {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.hub_url(), "http://localhost:5000/hubs");
        assert_eq!(config.channels.reconnect_delays_secs, vec![2, 5, 10, 30]);
        assert_eq!(config.channels.max_reconnect_delay_secs, 60);
        assert_eq!(config.mutations.max_retries, 2);
    }
}
