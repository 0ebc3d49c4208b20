//! Connection state

use serde::Serialize;
use std::fmt;

/// Observable state of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    /// No session and no attempt running
    #[default]
    Disconnected,
    /// Initial connect in progress
    Connecting,
    /// Session open, groups joined
    Connected,
    /// Session lost; waiting for or running reconnect attempt `attempt`
    Reconnecting {
        /// 1-based attempt counter
        attempt: u32,
    },
}

impl ConnectionState {
    /// Whether a session is open
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Whether the channel is between sessions and will retry on its own
    #[must_use]
    pub fn is_reconnecting(self) -> bool {
        matches!(self, Self::Reconnecting { .. })
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display_and_predicates() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        let s = ConnectionState::Reconnecting { attempt: 3 };
        assert!(s.is_reconnecting());
        assert!(!s.is_connected());
        assert_eq!(s.to_string(), "reconnecting (attempt 3)");
    }
}
