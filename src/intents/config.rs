//! Bounded waits used by the intent broker.

use std::time::Duration;

/// Default wait for a target instance to add an intent listener.
pub const DEFAULT_LISTENER_REGISTRATION_TIMEOUT: Duration = Duration::from_secs(15);

/// Default wait for a handler to store its result.
pub const DEFAULT_INTENT_RESULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default wait for the user to answer the resolver.
pub const DEFAULT_RESOLVER_UI_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeouts for an [`IntentBroker`](super::IntentBroker).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentOptions {
    /// How long a raise waits for the target to listen for the intent.
    pub listener_registration_timeout: Duration,
    /// How long a result request waits for the handler's result.
    pub intent_result_timeout: Duration,
    /// How long a raise waits for a resolver selection.
    pub resolver_ui_timeout: Duration,
}

impl IntentOptions {
    /// Overrides the listener registration timeout.
    #[must_use]
    pub const fn with_listener_registration_timeout(mut self, timeout: Duration) -> Self {
        self.listener_registration_timeout = timeout;
        self
    }

    /// Overrides the intent result timeout.
    #[must_use]
    pub const fn with_intent_result_timeout(mut self, timeout: Duration) -> Self {
        self.intent_result_timeout = timeout;
        self
    }

    /// Overrides the resolver timeout.
    #[must_use]
    pub const fn with_resolver_ui_timeout(mut self, timeout: Duration) -> Self {
        self.resolver_ui_timeout = timeout;
        self
    }
}

impl Default for IntentOptions {
    fn default() -> Self {
        Self {
            listener_registration_timeout: DEFAULT_LISTENER_REGISTRATION_TIMEOUT,
            intent_result_timeout: DEFAULT_INTENT_RESULT_TIMEOUT,
            resolver_ui_timeout: DEFAULT_RESOLVER_UI_TIMEOUT,
        }
    }
}
