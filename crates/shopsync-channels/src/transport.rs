//! Transport abstraction
//!
//! A [`Transport`] opens one [`TransportSession`] per topic connection. The
//! manager owns exactly one session at a time and replaces it on reconnect.

use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::{ClientFrame, ServerFrame, Topic};

/// Opens sessions to a hub
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a new session for `topic`
    async fn open(&self, topic: Topic) -> Result<Box<dyn TransportSession>>;

    /// Transport name for logs
    fn name(&self) -> &str;
}

/// One open connection to a hub
#[async_trait]
pub trait TransportSession: Send {
    /// Send a frame to the hub
    async fn send(&mut self, frame: &ClientFrame) -> Result<()>;

    /// Receive the next frame
    ///
    /// Returns `None` once the hub closed the session. Must be cancel safe:
    /// dropping the future before completion loses no frame.
    async fn recv(&mut self) -> Option<Result<ServerFrame>>;

    /// Close the session
    async fn close(&mut self);
}
