//! View lifetime scope
//!
//! Every asynchronous operation started on behalf of a view (mutation calls,
//! follow-up fetches, event handlers) carries the view's [`ViewScope`] and
//! checks it before touching view state. Tearing the view down cancels the
//! scope; results that arrive afterwards are discarded.
//!
//! ## Usage
//!
//! ```ignore
//! let scope = ViewScope::new("inspections:R1");
//!
//! let fetch = scope.run(source.fetch_job(&job_id));
//! scope.teardown();
//! assert!(fetch.await.is_err()); // Error::Cancelled
//! ```

use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};

/// Cancellation scope owned by one view
#[derive(Debug, Clone)]
pub struct ViewScope {
    name: String,
    token: CancellationToken,
}

impl ViewScope {
    /// Create a live scope
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            token: CancellationToken::new(),
        }
    }

    /// Scope name for diagnostics
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the owning view is still alive
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Fail with `Cancelled` once the view is gone
    ///
    /// # Errors
    /// Returns [`Error::Cancelled`] after [`ViewScope::teardown`].
    pub fn ensure_live(&self) -> Result<()> {
        if self.is_live() {
            Ok(())
        } else {
            Err(Error::Cancelled)
        }
    }

    /// Mark the view as torn down
    pub fn teardown(&self) {
        if self.is_live() {
            debug!(scope = %self.name, "View scope torn down");
        }
        self.token.cancel();
    }

    /// Run `fut`, discarding its output if the view is torn down first or
    /// while it was running
    ///
    /// # Errors
    /// Returns [`Error::Cancelled`] when the scope ends before the result can
    /// be used.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        self.ensure_live()?;
        let output = tokio::select! {
            biased;
            () = self.token.cancelled() => return Err(Error::Cancelled),
            output = fut => output,
        };
        self.ensure_live()?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_scope_starts_live() {
        let scope = ViewScope::new("board");
        assert!(scope.is_live());
        assert_ok!(scope.ensure_live());
        assert_eq!(scope.name(), "board");
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let scope = ViewScope::new("board");
        scope.teardown();
        scope.teardown();
        assert!(!scope.is_live());
        assert_err!(scope.ensure_live());
    }

    #[tokio::test]
    async fn test_run_returns_output_while_live() {
        let scope = ViewScope::new("jobs");
        let value = scope.run(async { 42 }).await;
        assert_eq!(value.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_run_discards_after_teardown() {
        let scope = ViewScope::new("jobs");
        let clone = scope.clone();
        let slow = async move {
            clone.teardown();
            tokio::task::yield_now().await;
            "late"
        };
        let result = scope.run(slow).await;
        assert!(matches!(result, Err(Error::Cancelled)));

        let result = scope.run(async { "never" }).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
