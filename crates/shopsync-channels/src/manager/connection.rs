//! Connection task
//!
//! One task per open connection. It reads frames in arrival order, dispatches
//! each synchronously through the router, forwards queued group commands, and
//! keeps the session alive with pings. A lost session is replaced by
//! reconnecting until it succeeds or the connection is cancelled.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::Error;
use crate::protocol::{ClientFrame, ServerFrame};
use crate::state::ConnectionState;
use crate::transport::TransportSession;

use super::ChannelShared;

enum SessionEnd {
    Cancelled,
    Lost(String),
}

pub(super) async fn run(
    shared: Arc<ChannelShared>,
    mut session: Box<dyn TransportSession>,
    mut commands: mpsc::UnboundedReceiver<ClientFrame>,
    cancel: CancellationToken,
) {
    loop {
        let end = pump(&shared, session.as_mut(), &mut commands, &cancel).await;
        session.close().await;
        match end {
            SessionEnd::Cancelled => break,
            SessionEnd::Lost(reason) => {
                warn!(topic = %shared.topic, reason = %reason, "Channel session lost");
                match reconnect(&shared, &mut commands, &cancel).await {
                    Some(next) => session = next,
                    None => break,
                }
            }
        }
    }
    debug!(topic = %shared.topic, "Connection task stopped");
}

async fn pump(
    shared: &ChannelShared,
    session: &mut dyn TransportSession,
    commands: &mut mpsc::UnboundedReceiver<ClientFrame>,
    cancel: &CancellationToken,
) -> SessionEnd {
    let heartbeat = shared.heartbeat;
    let mut ping = tokio::time::interval_at(Instant::now() + heartbeat.interval, heartbeat.interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => return SessionEnd::Cancelled,

            frame = session.recv() => match frame {
                None => return SessionEnd::Lost("closed by hub".to_string()),
                Some(Ok(frame)) => {
                    last_seen = Instant::now();
                    handle_frame(shared, frame);
                }
                Some(Err(Error::Serialization(e))) => {
                    last_seen = Instant::now();
                    warn!(topic = %shared.topic, error = %e, "Skipping undecodable frame");
                }
                Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
            },

            Some(frame) = commands.recv() => {
                if let Err(e) = session.send(&frame).await {
                    return SessionEnd::Lost(e.to_string());
                }
            }

            _ = ping.tick() => {
                if last_seen.elapsed() >= heartbeat.timeout {
                    return SessionEnd::Lost("heartbeat timeout".to_string());
                }
                if let Err(e) = session.send(&ClientFrame::Ping).await {
                    return SessionEnd::Lost(e.to_string());
                }
            }
        }
    }
}

fn handle_frame(shared: &ChannelShared, frame: ServerFrame) {
    match frame {
        ServerFrame::Event { name, payload } => {
            trace!(topic = %shared.topic, event = %name, "Event received");
            shared.router.dispatch_frame(&name, payload);
        }
        ServerFrame::Pong => trace!(topic = %shared.topic, "Pong"),
        ServerFrame::Error { message } => {
            warn!(topic = %shared.topic, message = %message, "Hub reported an error");
        }
    }
}

/// Reconnect with backoff until a session is open and every group re-joined
///
/// Returns `None` once cancelled.
async fn reconnect(
    shared: &ChannelShared,
    commands: &mut mpsc::UnboundedReceiver<ClientFrame>,
    cancel: &CancellationToken,
) -> Option<Box<dyn TransportSession>> {
    let mut attempt: u32 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        {
            let _inner = shared.lock();
            if cancel.is_cancelled() {
                return None;
            }
            shared.state.send_replace(ConnectionState::Reconnecting { attempt });
        }

        let delay = shared.policy.delay_for(attempt);
        info!(
            topic = %shared.topic,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting channel"
        );
        tokio::select! {
            biased;
            () = cancel.cancelled() => return None,
            () = tokio::time::sleep(delay) => {}
        }

        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => return None,
            opened = shared.transport.open(shared.topic) => opened,
        };
        let mut session = match opened {
            Ok(session) => session,
            Err(e) => {
                warn!(topic = %shared.topic, attempt, error = %e, "Reconnect attempt failed");
                continue;
            }
        };

        // Anything queued so far is already reflected in the group set.
        let groups: Vec<String> = {
            let inner = shared.lock();
            while commands.try_recv().is_ok() {}
            inner.groups.iter().cloned().collect()
        };

        let mut rejoined = true;
        for group in groups {
            if let Err(e) = session.send(&ClientFrame::JoinGroup { group }).await {
                warn!(topic = %shared.topic, attempt, error = %e, "Re-joining groups failed");
                rejoined = false;
                break;
            }
        }
        if !rejoined {
            session.close().await;
            continue;
        }

        let live = {
            let _inner = shared.lock();
            let live = !cancel.is_cancelled();
            if live {
                shared.state.send_replace(ConnectionState::Connected);
            }
            live
        };
        if !live {
            session.close().await;
            return None;
        }

        info!(topic = %shared.topic, attempt, "Channel reconnected");
        return Some(session);
    }
}
