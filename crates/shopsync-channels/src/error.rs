//! Error types for shopsync-channels

use thiserror::Error;

/// Channel error type
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Initial connect failed; surfaced to the caller, never retried here
    #[error("failed to connect {topic} channel: {reason}")]
    ConnectionEstablishment {
        /// Topic being connected
        topic: String,
        /// Underlying failure
        reason: String,
    },

    /// `disconnect()` called while the initial connect is still running
    #[error("{0} channel is still connecting")]
    ConnectInProgress(String),

    /// Transport-level failure (socket, handshake, timeout)
    #[error("transport error: {0}")]
    Transport(String),

    /// Session was closed
    #[error("channel closed")]
    ChannelClosed,

    /// Frame could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Hub URL is not usable
    #[error("invalid hub url: {0}")]
    InvalidUrl(String),

    /// No channel registered for the topic
    #[error("unknown topic: {0}")]
    UnknownTopic(String),
}

impl Error {
    /// Create a transport error
    #[must_use]
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Check if a retry may succeed
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionEstablishment { .. }
                | Self::ConnectInProgress(_)
                | Self::Transport(_)
                | Self::ChannelClosed
        )
    }

    /// Get error code for diagnostics
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConnectionEstablishment { .. } => "connection_establishment",
            Self::ConnectInProgress(_) => "connect_in_progress",
            Self::Transport(_) => "transport_error",
            Self::ChannelClosed => "channel_closed",
            Self::Serialization(_) => "serialization_error",
            Self::InvalidUrl(_) => "invalid_url",
            Self::UnknownTopic(_) => "unknown_topic",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
