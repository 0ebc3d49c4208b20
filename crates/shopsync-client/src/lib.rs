//! Shopsync Client - Views and mutations over live channels
//!
//! This crate ties the pieces together for a consumer:
//! - View: [`SyncedView`] keeps one entity collection current from a channel
//! - Mutation: [`MutationCoordinator`] submits change requests and reports acceptance only
//! - Snapshot: [`SnapshotSource`] loads the initial contents of a view
//!
//! A mutation never edits a collection. Its effect shows up when the server
//! publishes the resulting event and the view folds it in.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod mutation;
pub mod settings;
pub mod snapshot;
pub mod view;

pub use error::{Error, Result};
pub use mutation::{
    HttpMutationService, MutationAck, MutationCoordinator, MutationRequest, MutationService,
    IDEMPOTENCY_KEY_HEADER,
};
pub use settings::MutationSettings;
pub use snapshot::{HttpSnapshotSource, SnapshotSource};
pub use view::SyncedView;
