//! Error types for shopsync-core
//!
//! Errors raised while decoding wire events and running scoped work.
//! None of these ever escape the event router; they are logged and dropped there.

use thiserror::Error;

/// Core error type
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Event payload is missing required id/scope fields or has the wrong shape
    #[error("malformed {event} event: {reason}")]
    MalformedEvent {
        /// Wire name of the event
        event: String,
        /// What was wrong with the payload
        reason: String,
    },

    /// Event name not present in the dispatch table
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The owning view was torn down before the work completed
    #[error("view torn down")]
    Cancelled,
}

impl Error {
    /// Create a malformed event error
    #[must_use]
    pub fn malformed(event: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedEvent {
            event: event.into(),
            reason: reason.into(),
        }
    }

    /// Get error code for diagnostics
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedEvent { .. } => "malformed_event",
            Self::UnknownEvent(_) => "unknown_event",
            Self::Serialization(_) => "serialization_error",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::malformed("CardMoved", "x").code(), "malformed_event");
        assert_eq!(Error::UnknownEvent("Foo".into()).code(), "unknown_event");
        assert_eq!(Error::Cancelled.code(), "cancelled");
    }

    #[test]
    fn test_error_display() {
        let err = Error::malformed("InspectionStarted", "missing field `repairOrderId`");
        let msg = err.to_string();
        assert!(msg.contains("malformed InspectionStarted event"));
        assert!(msg.contains("repairOrderId"));
    }

    #[test]
    fn test_from_serde_error() {
        let result: std::result::Result<i32, serde_json::Error> = serde_json::from_str("nope");
        let err: Error = result.unwrap_err().into();
        assert_eq!(err.code(), "serialization_error");
    }
}
