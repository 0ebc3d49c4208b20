//! Synchronized views
//!
//! A [`SyncedView`] owns one entity collection and keeps it current by folding
//! every relevant channel event into it. The collection lives in a `watch`
//! channel so renderers can subscribe to change notifications; nothing outside
//! the view writes to it.
//!
//! ## Lifecycle
//!
//! ```ignore
//! let view = SyncedView::open_inspections(channel, source, "R1").await?;
//! let mut changes = view.subscribe();
//! // ... render on every change ...
//! view.teardown();
//! ```
//!
//! Teardown removes this view's handlers, leaves its groups and cancels its
//! scope, so mutation responses and fetches that finish later are dropped.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use shopsync_channels::ChannelManager;
use shopsync_core::{
    apply_fetched, fold, EntityCollection, EventKind, HandlerId, InspectionRecord, JobRecord,
    Reconcile, RepairOrderCard, SyncEvent, ViewScope,
};

use crate::error::Result;
use crate::mutation::{MutationCoordinator, MutationService};
use crate::snapshot::SnapshotSource;

/// A live, self-reconciling entity collection
pub struct SyncedView<T: Reconcile> {
    channel: ChannelManager,
    scope: ViewScope,
    groups: Vec<String>,
    state: Arc<watch::Sender<EntityCollection<T>>>,
    handlers: Mutex<Vec<(EventKind, HandlerId)>>,
    opened: AtomicBool,
}

impl<T: Reconcile> SyncedView<T> {
    /// Create a closed view over `initial`
    ///
    /// `groups` are joined on [`SyncedView::open`] and left on teardown.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        channel: ChannelManager,
        groups: Vec<String>,
        initial: EntityCollection<T>,
    ) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            channel,
            scope: ViewScope::new(name),
            groups,
            state: Arc::new(state),
            handlers: Mutex::new(Vec::new()),
            opened: AtomicBool::new(false),
        }
    }

    /// Register handlers, join groups and connect the channel
    ///
    /// Opening an already open view only reconnects the channel.
    ///
    /// # Errors
    /// Returns [`crate::Error::Cancelled`] after teardown and
    /// [`crate::Error::Channel`] when the channel cannot connect.
    pub async fn open(&self) -> Result<()> {
        self.scope.ensure_live()?;
        if self.opened.swap(true, Ordering::SeqCst) {
            self.channel.connect().await?;
            return Ok(());
        }
        for kind in T::KINDS {
            let state = Arc::clone(&self.state);
            let scope = self.scope.clone();
            let id = self.channel.on(*kind, move |event| {
                if !scope.is_live() {
                    return;
                }
                fold_into(&state, scope.name(), event);
            });
            self.lock_handlers().push((*kind, id));
        }
        for group in &self.groups {
            self.channel.join_group(group.clone());
        }
        self.channel.connect().await?;
        info!(
            view = self.scope.name(),
            topic = %self.channel.topic(),
            entities = self.state.borrow().len(),
            "View opened"
        );
        Ok(())
    }

    /// Fetch and fold an entity whenever `kind` arrives
    ///
    /// `fetch` decides from the event whether a follow-up is needed. The fetch
    /// runs in its own task and its result is dropped if the view is torn
    /// down first.
    pub fn refetch_on<F, Fut>(&self, kind: EventKind, fetch: F) -> HandlerId
    where
        F: Fn(&SyncEvent) -> Option<Fut> + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let scope = self.scope.clone();
        let id = self.channel.on(kind, move |event| {
            if !scope.is_live() {
                return;
            }
            let Some(pending) = fetch(event) else {
                return;
            };
            let state = Arc::clone(&state);
            let scope = scope.clone();
            let target = event.target_id().clone();
            tokio::spawn(async move {
                match scope.run(pending).await {
                    Ok(Ok(entity)) => {
                        state.send_if_modified(|collection| {
                            let next = apply_fetched(collection, entity);
                            replace_if_changed(collection, next)
                        });
                    }
                    Ok(Err(e)) => {
                        warn!(view = scope.name(), target = %target, error = %e, "Follow-up fetch failed");
                    }
                    Err(_) => {
                        debug!(view = scope.name(), target = %target, "Discarding follow-up fetch after teardown");
                    }
                }
            });
        });
        self.lock_handlers().push((kind, id));
        id
    }

    /// Current collection
    #[must_use]
    pub fn collection(&self) -> EntityCollection<T> {
        self.state.borrow().clone()
    }

    /// Subscribe to collection changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<EntityCollection<T>> {
        self.state.subscribe()
    }

    /// This view's scope
    #[must_use]
    pub fn scope(&self) -> &ViewScope {
        &self.scope
    }

    /// Channel the view listens on
    #[must_use]
    pub fn channel(&self) -> &ChannelManager {
        &self.channel
    }

    /// Mutation coordinator whose results are tied to this view's lifetime
    #[must_use]
    pub fn coordinator(&self, service: Arc<dyn MutationService>) -> MutationCoordinator {
        MutationCoordinator::new(service, self.scope.clone())
    }

    /// Whether the view has not been torn down
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.scope.is_live()
    }

    /// Stop receiving events and discard pending async results
    ///
    /// Only this view's handlers are removed; other views on the same channel
    /// keep theirs. Idempotent.
    pub fn teardown(&self) {
        if !self.scope.is_live() {
            return;
        }
        self.scope.teardown();
        for (kind, id) in self.lock_handlers().drain(..) {
            self.channel.off(kind, id);
        }
        for group in &self.groups {
            self.channel.leave_group(group);
        }
        info!(view = self.scope.name(), "View torn down");
    }

    fn lock_handlers(&self) -> MutexGuard<'_, Vec<(EventKind, HandlerId)>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Reconcile> Drop for SyncedView<T> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<T: Reconcile> std::fmt::Debug for SyncedView<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncedView")
            .field("scope", &self.scope.name())
            .field("topic", &self.channel.topic())
            .field("groups", &self.groups)
            .finish_non_exhaustive()
    }
}

fn fold_into<T: Reconcile>(state: &watch::Sender<EntityCollection<T>>, view: &str, event: &SyncEvent) {
    state.send_if_modified(|collection| {
        let (next, outcome) = fold(collection, event);
        trace!(view, event = %event.kind(), target = %event.target_id(), outcome = ?outcome, "Event folded");
        replace_if_changed(collection, next)
    });
}

fn replace_if_changed<T: Reconcile>(collection: &mut EntityCollection<T>, next: EntityCollection<T>) -> bool {
    if *collection == next {
        false
    } else {
        *collection = next;
        true
    }
}

impl SyncedView<RepairOrderCard> {
    /// Open the board view for `board_id`
    ///
    /// # Errors
    /// Returns [`crate::Error::Fetch`] when the snapshot cannot be loaded and
    /// [`crate::Error::Channel`] when the channel cannot connect.
    pub async fn open_board(
        channel: ChannelManager,
        source: &dyn SnapshotSource,
        board_id: &str,
    ) -> Result<Self> {
        let cards = source.fetch_board(board_id).await?;
        let initial = EntityCollection::scoped(board_id).with_entities(cards);
        let view = Self::new(format!("board:{board_id}"), channel, vec![board_id.to_string()], initial);
        view.open().await?;
        Ok(view)
    }
}

impl SyncedView<InspectionRecord> {
    /// Open the inspection list of one repair order
    ///
    /// # Errors
    /// Returns [`crate::Error::Fetch`] when the snapshot cannot be loaded and
    /// [`crate::Error::Channel`] when the channel cannot connect.
    pub async fn open_inspections(
        channel: ChannelManager,
        source: &dyn SnapshotSource,
        repair_order_id: &str,
    ) -> Result<Self> {
        let inspections = source.fetch_inspections(repair_order_id).await?;
        let initial = EntityCollection::scoped(repair_order_id).with_entities(inspections);
        let view = Self::new(
            format!("inspections:{repair_order_id}"),
            channel,
            vec![repair_order_id.to_string()],
            initial,
        );
        view.open().await?;
        Ok(view)
    }
}

impl SyncedView<JobRecord> {
    /// Open the job list of one technician
    ///
    /// A `JobAssigned` event for this technician triggers a fetch of the job,
    /// since the event alone does not carry enough to build the record.
    ///
    /// # Errors
    /// Returns [`crate::Error::Fetch`] when the snapshot cannot be loaded and
    /// [`crate::Error::Channel`] when the channel cannot connect.
    pub async fn open_jobs(
        channel: ChannelManager,
        source: Arc<dyn SnapshotSource>,
        technician_id: &str,
    ) -> Result<Self> {
        let jobs = source.fetch_jobs(technician_id).await?;
        let initial = EntityCollection::unscoped().with_entities(jobs);
        let view = Self::new(
            format!("jobs:{technician_id}"),
            channel,
            vec![technician_id.to_string()],
            initial,
        );

        let technician = technician_id.to_string();
        view.refetch_on(EventKind::JobAssigned, move |event| {
            let SyncEvent::JobAssigned(assigned) = event else {
                return None;
            };
            if assigned
                .technician_id
                .as_deref()
                .is_some_and(|t| t != technician)
            {
                return None;
            }
            let source = Arc::clone(&source);
            let job_id = assigned.job_id.to_string();
            Some(async move { source.fetch_job(&job_id).await })
        });

        view.open().await?;
        Ok(view)
    }
}

#[cfg(test)]
mod tests;
