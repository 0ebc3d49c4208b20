//! Error types for shopsync-client

use thiserror::Error;

/// Client error type
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The remote service refused or failed a mutation
    #[error("mutation rejected{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    MutationRejected {
        /// HTTP status, if a response was received
        status: Option<u16>,
        /// Reason reported by the service or the transport
        message: String,
    },

    /// A snapshot fetch failed
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// The owning view was torn down; the result was discarded
    #[error("view torn down")]
    Cancelled,

    /// HTTP client could not be built
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Channel error
    #[error(transparent)]
    Channel(#[from] shopsync_channels::Error),

    /// Core error
    #[error(transparent)]
    Core(shopsync_core::Error),
}

impl Error {
    /// Create a rejection without an HTTP status
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::MutationRejected {
            status: None,
            message: message.into(),
        }
    }

    /// Check if a retry may succeed
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::MutationRejected { status, .. } => status.map_or(true, |s| s >= 500),
            Self::Fetch(_) => true,
            Self::Channel(e) => e.is_recoverable(),
            Self::Cancelled | Self::Configuration(_) | Self::Core(_) => false,
        }
    }

    /// Get error code for diagnostics
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MutationRejected { .. } => "mutation_rejected",
            Self::Fetch(_) => "fetch_failed",
            Self::Cancelled => "cancelled",
            Self::Configuration(_) => "configuration_error",
            Self::Channel(e) => e.code(),
            Self::Core(e) => e.code(),
        }
    }
}

impl From<shopsync_core::Error> for Error {
    fn from(err: shopsync_core::Error) -> Self {
        match err {
            shopsync_core::Error::Cancelled => Self::Cancelled,
            other => Self::Core(other),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
