//! In-memory loopback transport
//!
//! A hub that lives in the same process. Tests and offline demos drive it
//! directly: push events with [`MemoryTransport::emit`], drop sessions with
//! [`MemoryTransport::sever`], and inspect what clients sent.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::{ClientFrame, ServerFrame, Topic};
use crate::transport::{Transport, TransportSession};

#[derive(Default)]
struct HubState {
    refuse: usize,
    opens: usize,
    open_delay: Option<Duration>,
    mute_pongs: bool,
    next_generation: u64,
    live: HashMap<Topic, LiveSession>,
    sent: Vec<(Topic, ClientFrame)>,
    preload: HashMap<Topic, Vec<ServerFrame>>,
}

struct LiveSession {
    generation: u64,
    tx: mpsc::UnboundedSender<ServerFrame>,
}

/// Loopback hub; clones share state
#[derive(Clone, Default)]
pub struct MemoryTransport {
    hub: Arc<Mutex<HubState>>,
}

impl MemoryTransport {
    /// Create an empty hub
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next `count` open attempts
    pub fn refuse_next(&self, count: usize) {
        self.lock().refuse = count;
    }

    /// Delay every open attempt
    pub fn set_open_delay(&self, delay: Duration) {
        self.lock().open_delay = Some(delay);
    }

    /// Stop answering pings
    pub fn mute_pongs(&self, mute: bool) {
        self.lock().mute_pongs = mute;
    }

    /// Frames delivered first on the next session opened for `topic`
    pub fn preload_next_session(&self, topic: Topic, frames: Vec<ServerFrame>) {
        self.lock().preload.insert(topic, frames);
    }

    /// Push a frame to the live session for `topic`
    ///
    /// Returns false when no session is open.
    pub fn emit_frame(&self, topic: Topic, frame: ServerFrame) -> bool {
        self.lock()
            .live
            .get(&topic)
            .is_some_and(|live| live.tx.send(frame).is_ok())
    }

    /// Push a named event to the live session for `topic`
    pub fn emit(&self, topic: Topic, name: &str, payload: serde_json::Value) -> bool {
        self.emit_frame(topic, ServerFrame::event(name, payload))
    }

    /// Drop the live session for `topic` as if the network failed
    pub fn sever(&self, topic: Topic) -> bool {
        let severed = self.lock().live.remove(&topic).is_some();
        if severed {
            debug!(topic = %topic, "Memory session severed");
        }
        severed
    }

    /// Whether a session for `topic` is open
    #[must_use]
    pub fn is_open(&self, topic: Topic) -> bool {
        self.lock().live.contains_key(&topic)
    }

    /// Open attempts seen so far, refused ones included
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.lock().opens
    }

    /// Frames clients sent on `topic`, pings excluded
    #[must_use]
    pub fn sent_frames(&self, topic: Topic) -> Vec<ClientFrame> {
        self.lock()
            .sent
            .iter()
            .filter(|(t, _)| *t == topic)
            .map(|(_, frame)| frame.clone())
            .collect()
    }

    /// Count of `JoinGroup` frames sent for `group` on `topic`
    #[must_use]
    pub fn join_count(&self, topic: Topic, group: &str) -> usize {
        self.sent_frames(topic)
            .iter()
            .filter(|f| matches!(f, ClientFrame::JoinGroup { group: g } if g == group))
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.hub.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("opens", &self.open_count())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn open(&self, topic: Topic) -> Result<Box<dyn TransportSession>> {
        let delay = self.lock().open_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut hub = self.lock();
        hub.opens += 1;
        if hub.refuse > 0 {
            hub.refuse -= 1;
            return Err(Error::transport("connection refused"));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        for frame in hub.preload.remove(&topic).unwrap_or_default() {
            let _ = tx.send(frame);
        }
        hub.next_generation += 1;
        let generation = hub.next_generation;
        hub.live.insert(topic, LiveSession { generation, tx });

        Ok(Box::new(MemorySession {
            topic,
            generation,
            hub: Arc::clone(&self.hub),
            rx,
            pong_due: false,
        }))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

struct MemorySession {
    topic: Topic,
    generation: u64,
    hub: Arc<Mutex<HubState>>,
    rx: mpsc::UnboundedReceiver<ServerFrame>,
    pong_due: bool,
}

impl MemorySession {
    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.hub.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TransportSession for MemorySession {
    async fn send(&mut self, frame: &ClientFrame) -> Result<()> {
        let mut hub = self.lock();
        let live = hub
            .live
            .get(&self.topic)
            .is_some_and(|l| l.generation == self.generation);
        if !live {
            return Err(Error::ChannelClosed);
        }
        if matches!(frame, ClientFrame::Ping) {
            let mute = hub.mute_pongs;
            drop(hub);
            self.pong_due = !mute;
        } else {
            hub.sent.push((self.topic, frame.clone()));
        }
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<ServerFrame>> {
        if self.pong_due {
            self.pong_due = false;
            return Some(Ok(ServerFrame::Pong));
        }
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        let mut hub = self.lock();
        if hub
            .live
            .get(&self.topic)
            .is_some_and(|l| l.generation == self.generation)
        {
            hub.live.remove(&self.topic);
        }
        drop(hub);
        self.rx.close();
    }
}
