//! HTTP settings for mutation and snapshot calls

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Mutation call settings, the `[mutations]` config section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationSettings {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Extra attempts after a timeout, reusing the idempotency key
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    2
}

impl Default for MutationSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl MutationSettings {
    /// Per-request timeout
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}
