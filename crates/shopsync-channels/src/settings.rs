//! Channel settings
//!
//! Deserialized from the `[channels]` config section. Every field has a
//! default so an empty section is valid. The hub address comes from the
//! server section and is handed to the transport.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::backoff::{ReconnectPolicy, DEFAULT_MAX_RECONNECT_DELAY_SECS, DEFAULT_RECONNECT_DELAYS_SECS};

/// Channel connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// Warm-up reconnect delays in seconds
    #[serde(default = "default_reconnect_delays")]
    pub reconnect_delays_secs: Vec<u64>,

    /// Cap on any reconnect delay in seconds
    #[serde(default = "default_max_reconnect_delay")]
    pub max_reconnect_delay_secs: u64,

    /// Ping interval in seconds
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Session is considered lost after this many seconds without a frame
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_secs: u64,

    /// Timeout for a single connect handshake in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_reconnect_delays() -> Vec<u64> {
    DEFAULT_RECONNECT_DELAYS_SECS.to_vec()
}

fn default_max_reconnect_delay() -> u64 {
    DEFAULT_MAX_RECONNECT_DELAY_SECS
}

fn default_heartbeat_interval() -> u64 {
    15
}

fn default_heartbeat_timeout() -> u64 {
    45
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            reconnect_delays_secs: default_reconnect_delays(),
            max_reconnect_delay_secs: default_max_reconnect_delay(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            heartbeat_timeout_secs: default_heartbeat_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl ChannelSettings {
    /// Reconnect delay policy
    #[must_use]
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            self.reconnect_delays_secs
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
            Duration::from_secs(self.max_reconnect_delay_secs.max(1)),
        )
    }

    /// Heartbeat timing
    #[must_use]
    pub fn heartbeat(&self) -> Heartbeat {
        let interval = Duration::from_secs(self.heartbeat_interval_secs.max(1));
        Heartbeat {
            interval,
            timeout: Duration::from_secs(self.heartbeat_timeout_secs).max(interval),
        }
    }

    /// Connect handshake timeout
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }
}

/// Keep-alive timing for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    /// Interval between pings
    pub interval: Duration,
    /// Silence after which the session is treated as lost
    pub timeout: Duration,
}

impl Default for Heartbeat {
    fn default() -> Self {
        ChannelSettings::default().heartbeat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_section_uses_defaults() {
        let settings: ChannelSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, ChannelSettings::default());
        assert_eq!(settings.reconnect_delays_secs, vec![2, 5, 10, 30]);
        assert_eq!(settings.reconnect_policy(), ReconnectPolicy::default());
    }

    #[test]
    fn test_zero_durations_are_clamped() {
        let settings = ChannelSettings {
            heartbeat_interval_secs: 0,
            heartbeat_timeout_secs: 0,
            connect_timeout_secs: 0,
            ..ChannelSettings::default()
        };
        let hb = settings.heartbeat();
        assert_eq!(hb.interval, Duration::from_secs(1));
        assert!(hb.timeout >= hb.interval);
        assert_eq!(settings.connect_timeout(), Duration::from_secs(1));
    }
}
