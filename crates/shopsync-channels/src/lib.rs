//! Shopsync Channels - Live hub connections
//!
//! This crate keeps one long-lived connection per topic to the shop's event
//! hub and routes what arrives into an [`shopsync_core::EventRouter`].
//!
//! ## Components
//!
//! - [`ChannelManager`]: connect, group membership, reconnect with backoff
//! - [`ChannelRegistry`]: one manager per [`Topic`], created explicitly
//! - [`Transport`]: session factory; [`WebSocketTransport`] for real hubs,
//!   [`MemoryTransport`] for tests and offline demos
//! - [`ReconnectPolicy`]: 2s, 5s, 10s, 30s, then doubling up to a cap

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backoff;
pub mod error;
pub mod manager;
pub mod memory;
pub mod protocol;
pub mod registry;
pub mod settings;
pub mod state;
pub mod transport;
pub mod websocket;

pub use backoff::ReconnectPolicy;
pub use error::{Error, Result};
pub use manager::ChannelManager;
pub use memory::MemoryTransport;
pub use protocol::{ClientFrame, ServerFrame, Topic};
pub use registry::ChannelRegistry;
pub use settings::{ChannelSettings, Heartbeat};
pub use state::ConnectionState;
pub use transport::{Transport, TransportSession};
pub use websocket::WebSocketTransport;
