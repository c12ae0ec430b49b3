//! Router tuning knobs.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default deadline applied to invocations that do not name one.
pub const DEFAULT_INVOCATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Default capacity of each client's inbound message queue.
pub const DEFAULT_CLIENT_QUEUE_CAPACITY: usize = 1024;

/// Configuration for a [`MessageRouter`](super::MessageRouter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RouterOptions {
    /// Deadline for invocations made without an explicit timeout.
    #[serde(with = "crate::serde_millis")]
    pub invocation_timeout: Duration,
    /// Bounded size of each client's inbox; messages beyond it are dropped.
    pub client_queue_capacity: usize,
}

impl RouterOptions {
    /// Overrides the default invocation timeout.
    #[must_use]
    pub const fn with_invocation_timeout(mut self, timeout: Duration) -> Self {
        self.invocation_timeout = timeout;
        self
    }

    /// Overrides the per-client queue capacity. Zero is raised to one.
    #[must_use]
    pub const fn with_client_queue_capacity(mut self, capacity: usize) -> Self {
        self.client_queue_capacity = if capacity == 0 { 1 } else { capacity };
        self
    }
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            invocation_timeout: DEFAULT_INVOCATION_TIMEOUT,
            client_queue_capacity: DEFAULT_CLIENT_QUEUE_CAPACITY,
        }
    }
}
