//! Channel Manager
//!
//! Owns the connection for one topic: single-flight connect, group membership,
//! indefinite reconnect with backoff, and the [`EventRouter`] that inbound
//! events are dispatched through.
//!
//! ## State machine
//!
//! ```text
//! Disconnected --connect()--> Connecting --ok--> Connected
//!      ^                          |                  |
//!      |                       failure          session lost
//!      |                          v                  v
//!      +----------------------- (error)        Reconnecting{n} --ok--> Connected
//!      +--------------------- disconnect() from any state but Connecting
//! ```
//!
//! Group membership is remembered across every transition. Joins recorded
//! while no session is open are sent as soon as one is, and every reconnect
//! re-joins the full set before the first frame of the new session is read.

mod connection;

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use shopsync_core::{EventKind, EventRouter, HandlerId, SyncEvent};

use crate::backoff::ReconnectPolicy;
use crate::error::{Error, Result};
use crate::protocol::{ClientFrame, Topic};
use crate::settings::{ChannelSettings, Heartbeat};
use crate::state::ConnectionState;
use crate::transport::Transport;

type ConnectAttempt = Shared<BoxFuture<'static, Result<()>>>;

/// Handle to the connection for one topic; clones share the connection
#[derive(Clone)]
pub struct ChannelManager {
    shared: Arc<ChannelShared>,
}

pub(crate) struct ChannelShared {
    topic: Topic,
    transport: Arc<dyn Transport>,
    policy: ReconnectPolicy,
    heartbeat: Heartbeat,
    router: Arc<EventRouter>,
    state: watch::Sender<ConnectionState>,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    groups: BTreeSet<String>,
    attempt: Option<ConnectAttempt>,
    commands: Option<mpsc::UnboundedSender<ClientFrame>>,
    cancel: Option<CancellationToken>,
}

enum Pending {
    Attempt(ConnectAttempt),
    Reconnect,
}

impl ChannelManager {
    /// Create a disconnected manager
    #[must_use]
    pub fn new(
        topic: Topic,
        transport: Arc<dyn Transport>,
        policy: ReconnectPolicy,
        heartbeat: Heartbeat,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Arc::new(ChannelShared {
                topic,
                transport,
                policy,
                heartbeat,
                router: Arc::new(EventRouter::new(topic.as_str())),
                state,
                inner: Mutex::new(Inner::default()),
            }),
        }
    }

    /// Create a manager from config settings
    #[must_use]
    pub fn from_settings(topic: Topic, transport: Arc<dyn Transport>, settings: &ChannelSettings) -> Self {
        Self::new(topic, transport, settings.reconnect_policy(), settings.heartbeat())
    }

    /// Topic this manager carries
    #[must_use]
    pub fn topic(&self) -> Topic {
        self.shared.topic
    }

    /// Open the connection
    ///
    /// Returns immediately when already connected. Concurrent callers share
    /// one attempt. While reconnecting, waits for the reconnect to finish.
    ///
    /// # Errors
    /// Returns [`Error::ConnectionEstablishment`] when the attempt fails; the
    /// attempt is not retried automatically. Returns [`Error::ChannelClosed`]
    /// when a pending reconnect is ended by `disconnect()`.
    pub async fn connect(&self) -> Result<()> {
        let pending = {
            let mut inner = self.shared.lock();
            let state = *self.shared.state.borrow();
            match state {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Reconnecting { .. } => Pending::Reconnect,
                ConnectionState::Connecting => match inner.attempt.clone() {
                    Some(attempt) => Pending::Attempt(attempt),
                    None => Pending::Reconnect,
                },
                ConnectionState::Disconnected => Pending::Attempt(self.start_attempt(&mut inner)),
            }
        };

        match pending {
            Pending::Attempt(attempt) => attempt.await,
            Pending::Reconnect => self.await_reconnect().await,
        }
    }

    fn start_attempt(&self, inner: &mut Inner) -> ConnectAttempt {
        let cancel = CancellationToken::new();
        inner.cancel = Some(cancel.clone());
        self.shared.state.send_replace(ConnectionState::Connecting);
        info!(topic = %self.shared.topic, transport = self.shared.transport.name(), "Connecting channel");

        let handle = tokio::spawn(Arc::clone(&self.shared).establish(cancel));
        let attempt = async move {
            handle
                .await
                .unwrap_or_else(|e| Err(Error::transport(format!("connect task failed: {e}"))))
        }
        .boxed()
        .shared();
        inner.attempt = Some(attempt.clone());
        attempt
    }

    async fn await_reconnect(&self) -> Result<()> {
        let mut rx = self.shared.state.subscribe();
        let settled = rx
            .wait_for(|s| !s.is_reconnecting() && *s != ConnectionState::Connecting)
            .await
            .map(|s| *s)
            .map_err(|_| Error::ChannelClosed)?;
        if settled.is_connected() {
            Ok(())
        } else {
            Err(Error::ChannelClosed)
        }
    }

    /// Close the connection and stop any pending reconnect
    ///
    /// Group membership is kept for the next `connect()`.
    ///
    /// # Errors
    /// Returns [`Error::ConnectInProgress`] while the initial connect is running.
    pub fn disconnect(&self) -> Result<()> {
        let mut inner = self.shared.lock();
        if *self.shared.state.borrow() == ConnectionState::Connecting {
            return Err(Error::ConnectInProgress(self.shared.topic.to_string()));
        }
        if let Some(cancel) = inner.cancel.take() {
            cancel.cancel();
        }
        inner.commands = None;
        let previous = self.shared.state.send_replace(ConnectionState::Disconnected);
        if previous != ConnectionState::Disconnected {
            info!(topic = %self.shared.topic, from = %previous, "Channel disconnected");
        }
        Ok(())
    }

    /// Subscribe to `group`
    ///
    /// Recorded in any state and sent once a session is open. Returns false
    /// when already joined; no frame is sent then.
    pub fn join_group(&self, group: impl Into<String>) -> bool {
        let group = group.into();
        let mut inner = self.shared.lock();
        if !inner.groups.insert(group.clone()) {
            debug!(topic = %self.shared.topic, group = %group, "Group already joined");
            return false;
        }
        debug!(topic = %self.shared.topic, group = %group, "Joining group");
        if let Some(commands) = &inner.commands {
            let _ = commands.send(ClientFrame::JoinGroup { group });
        }
        true
    }

    /// Unsubscribe from `group`
    ///
    /// Returns false when the group was not joined; no frame is sent then.
    pub fn leave_group(&self, group: &str) -> bool {
        let mut inner = self.shared.lock();
        if !inner.groups.remove(group) {
            debug!(topic = %self.shared.topic, group, "Group not joined");
            return false;
        }
        debug!(topic = %self.shared.topic, group, "Leaving group");
        if let Some(commands) = &inner.commands {
            let _ = commands.send(ClientFrame::LeaveGroup {
                group: group.to_string(),
            });
        }
        true
    }

    /// Groups currently joined
    #[must_use]
    pub fn groups(&self) -> Vec<String> {
        self.shared.lock().groups.iter().cloned().collect()
    }

    /// Register a handler on this channel's router
    pub fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        self.shared.router.on(kind, handler)
    }

    /// Remove one handler from this channel's router
    pub fn off(&self, kind: EventKind, id: HandlerId) -> bool {
        self.shared.router.off(kind, id)
    }

    /// Remove every handler from this channel's router
    pub fn off_all(&self) {
        self.shared.router.off_all();
    }

    /// This channel's router
    #[must_use]
    pub fn router(&self) -> Arc<EventRouter> {
        Arc::clone(&self.shared.router)
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Watch connection state changes
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Remove every handler, then disconnect once no initial connect is running
    pub async fn shutdown(&self) {
        self.shared.router.off_all();
        let mut rx = self.shared.state.subscribe();
        loop {
            let _ = rx.wait_for(|s| *s != ConnectionState::Connecting).await;
            match self.disconnect() {
                Ok(()) => break,
                Err(e) => warn!(topic = %self.shared.topic, error = %e, "Shutdown raced a connect; retrying"),
            }
        }
    }
}

impl std::fmt::Debug for ChannelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelManager")
            .field("topic", &self.shared.topic)
            .field("state", &self.state())
            .field("groups", &self.groups())
            .finish_non_exhaustive()
    }
}

impl ChannelShared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn establish(self: Arc<Self>, cancel: CancellationToken) -> Result<()> {
        let failed = |reason: String| Error::ConnectionEstablishment {
            topic: self.topic.to_string(),
            reason,
        };

        let mut session = match self.transport.open(self.topic).await {
            Ok(session) => session,
            Err(e) => {
                self.abandon_attempt(&cancel);
                warn!(topic = %self.topic, error = %e, "Channel connect failed");
                return Err(failed(e.to_string()));
            }
        };

        // Commands queued from here on are delivered after the flush below.
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let groups: Vec<String> = {
            let mut inner = self.lock();
            inner.commands = Some(commands_tx);
            inner.groups.iter().cloned().collect()
        };

        for group in groups {
            if let Err(e) = session.send(&ClientFrame::JoinGroup { group }).await {
                session.close().await;
                self.abandon_attempt(&cancel);
                warn!(topic = %self.topic, error = %e, "Channel connect failed while joining groups");
                return Err(failed(e.to_string()));
            }
        }

        let live = {
            let mut inner = self.lock();
            inner.attempt = None;
            let live = !cancel.is_cancelled();
            if live {
                self.state.send_replace(ConnectionState::Connected);
            }
            live
        };
        if !live {
            session.close().await;
            return Err(Error::ChannelClosed);
        }

        info!(topic = %self.topic, "Channel connected");
        tokio::spawn(connection::run(Arc::clone(&self), session, commands_rx, cancel));
        Ok(())
    }

    fn abandon_attempt(&self, cancel: &CancellationToken) {
        let mut inner = self.lock();
        inner.attempt = None;
        inner.commands = None;
        if !cancel.is_cancelled() {
            inner.cancel = None;
            self.state.send_replace(ConnectionState::Disconnected);
        }
    }
}
