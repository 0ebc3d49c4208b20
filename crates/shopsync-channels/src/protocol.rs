//! Channel Protocol Frames
//!
//! JSON frames exchanged with a hub. Each topic has its own connection; group
//! membership narrows which events the hub pushes on it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Category of entities a channel carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Repair-order board
    Board,
    /// Technician jobs
    Job,
    /// Vehicle inspections
    Inspection,
}

impl Topic {
    /// Every topic
    pub const ALL: [Topic; 3] = [Self::Board, Self::Job, Self::Inspection];

    /// Path segment and log label
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Board => "board",
            Self::Job => "job",
            Self::Inspection => "inspection",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownTopic(s.to_string()))
    }
}

/// Frames sent from client to hub
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Subscribe to a group
    JoinGroup {
        /// Group identifier
        group: String,
    },

    /// Unsubscribe from a group
    LeaveGroup {
        /// Group identifier
        group: String,
    },

    /// Keep-alive
    Ping,
}

/// Frames sent from hub to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// A named domain event
    Event {
        /// Event name, e.g. `CardMoved`
        name: String,
        /// Event payload
        #[serde(default)]
        payload: serde_json::Value,
    },

    /// Keep-alive reply
    Pong,

    /// Hub-side error report
    Error {
        /// Error message
        message: String,
    },
}

impl ServerFrame {
    /// Create an event frame
    #[must_use]
    pub fn event(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::Event {
            name: name.into(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_frame_serialization() {
        let frame = ClientFrame::JoinGroup {
            group: "R1".to_string(),
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(json, r#"{"type":"join_group","group":"R1"}"#);

        let ping = serde_json::to_string(&ClientFrame::Ping).unwrap();
        assert_eq!(ping, r#"{"type":"ping"}"#);
    }

    #[test]
    fn test_server_event_frame() {
        let raw = r#"{"type":"event","name":"CardMoved","payload":{"entityId":"c1","newStatusId":"2"}}"#;
        let frame: ServerFrame = serde_json::from_str(raw).unwrap();
        match frame {
            ServerFrame::Event { name, payload } => {
                assert_eq!(name, "CardMoved");
                assert_eq!(payload["entityId"], json!("c1"));
            }
            other => unreachable!("Expected event frame, got {:?}", other),
        }
    }

    #[test]
    fn test_topic_parsing() {
        assert_eq!("Board".parse::<Topic>().unwrap(), Topic::Board);
        assert_eq!(Topic::Inspection.to_string(), "inspection");
        assert_eq!("calendar".parse::<Topic>().unwrap_err().code(), "unknown_topic");
    }
}
