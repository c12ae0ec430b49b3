//! Desktop agent configuration.

use super::protocol::Fdc3Operation;
use crate::channels::{ChannelItem, default_user_channel_set};
use crate::intents::IntentOptions;
use crate::intents::config::{
    DEFAULT_INTENT_RESULT_TIMEOUT, DEFAULT_LISTENER_REGISTRATION_TIMEOUT,
    DEFAULT_RESOLVER_UI_TIMEOUT,
};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Default wait for a launched instance to report `Started`.
pub const DEFAULT_APP_START_TIMEOUT: Duration = Duration::from_secs(30);

/// Default lifetime of a context stashed by `open`.
pub const DEFAULT_OPENED_APP_CONTEXT_TTL: Duration = Duration::from_secs(60);

/// Headroom added on top of an operation's own waits when deriving its
/// router deadline.
pub const OPERATION_DEADLINE_SLACK: Duration = Duration::from_secs(5);

/// Errors raised while loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File being read.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON for the expected shape.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// File being parsed.
        path: Utf8PathBuf,
        /// Underlying parse failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

fn read_json<T>(path: &Utf8Path) -> ConfigResult<T>
where
    T: for<'de> Deserialize<'de>,
{
    let contents = crate::fs_utils::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_owned(),
        source,
    })
}

/// Timeouts and channel configuration for a
/// [`DesktopAgent`](super::DesktopAgent).
///
/// Durations are whole milliseconds on the wire; absent fields take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DesktopAgentOptions {
    /// How long a raise or open waits for the target to register a listener.
    #[serde(with = "crate::serde_millis")]
    pub listener_registration_timeout: Duration,
    /// How long a result request waits for the handler's result.
    #[serde(with = "crate::serde_millis")]
    pub intent_result_timeout: Duration,
    /// How long a raise waits for a resolver selection.
    #[serde(with = "crate::serde_millis")]
    pub resolver_ui_timeout: Duration,
    /// How long a launch waits for the `Started` lifecycle event.
    #[serde(with = "crate::serde_millis")]
    pub app_start_timeout: Duration,
    /// How long a context stashed by `open` stays retrievable.
    #[serde(with = "crate::serde_millis")]
    pub opened_app_context_ttl: Duration,
    /// Inline user channel set; the standard eight channels when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_channel_set: Option<Vec<ChannelItem>>,
}

impl DesktopAgentOptions {
    /// Reads options from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: &Utf8Path) -> ConfigResult<Self> {
        let options = read_json(path)?;
        info!(path = %path, "desktop agent options loaded");
        Ok(options)
    }

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

    /// Overrides the app start timeout.
    #[must_use]
    pub const fn with_app_start_timeout(mut self, timeout: Duration) -> Self {
        self.app_start_timeout = timeout;
        self
    }

    /// Overrides the opened app context lifetime.
    #[must_use]
    pub const fn with_opened_app_context_ttl(mut self, ttl: Duration) -> Self {
        self.opened_app_context_ttl = ttl;
        self
    }

    /// Replaces the user channel set.
    #[must_use]
    pub fn with_user_channel_set(mut self, channels: Vec<ChannelItem>) -> Self {
        self.user_channel_set = Some(channels);
        self
    }

    /// Replaces the user channel set with the JSON array stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load_user_channel_set(self, path: &Utf8Path) -> ConfigResult<Self> {
        let channels: Vec<ChannelItem> = read_json(path)?;
        info!(path = %path, channels = channels.len(), "user channel set loaded");
        Ok(self.with_user_channel_set(channels))
    }

    /// Returns the effective user channel set.
    #[must_use]
    pub fn user_channels(&self) -> Vec<ChannelItem> {
        self.user_channel_set
            .clone()
            .unwrap_or_else(default_user_channel_set)
    }

    /// Returns the timeouts handed to the intent broker.
    #[must_use]
    pub const fn intent_options(&self) -> IntentOptions {
        IntentOptions {
            listener_registration_timeout: self.listener_registration_timeout,
            intent_result_timeout: self.intent_result_timeout,
            resolver_ui_timeout: self.resolver_ui_timeout,
        }
    }

    /// Returns how long a router invocation of `operation` may take.
    ///
    /// Operations that suspend on a launch, a listener or the resolver get
    /// the sum of those waits plus [`OPERATION_DEADLINE_SLACK`], so the
    /// agent's own timeout error reaches the caller before the router gives
    /// up. Everything else uses `router_default`, which is also the floor.
    #[must_use]
    pub fn operation_deadline(&self, operation: Fdc3Operation, router_default: Duration) -> Duration {
        let launch = self
            .app_start_timeout
            .saturating_add(self.listener_registration_timeout);
        let waits = match operation {
            Fdc3Operation::Open => launch,
            Fdc3Operation::RaiseIntent => launch.saturating_add(self.resolver_ui_timeout),
            // Intent choice and target choice may each consult the resolver.
            Fdc3Operation::RaiseIntentForContext => launch
                .saturating_add(self.resolver_ui_timeout)
                .saturating_add(self.resolver_ui_timeout),
            Fdc3Operation::GetIntentResult => self.intent_result_timeout,
            _ => return router_default,
        };
        router_default.max(waits.saturating_add(OPERATION_DEADLINE_SLACK))
    }
}

impl Default for DesktopAgentOptions {
    fn default() -> Self {
        Self {
            listener_registration_timeout: DEFAULT_LISTENER_REGISTRATION_TIMEOUT,
            intent_result_timeout: DEFAULT_INTENT_RESULT_TIMEOUT,
            resolver_ui_timeout: DEFAULT_RESOLVER_UI_TIMEOUT,
            app_start_timeout: DEFAULT_APP_START_TIMEOUT,
            opened_app_context_ttl: DEFAULT_OPENED_APP_CONTEXT_TTL,
            user_channel_set: None,
        }
    }
}
