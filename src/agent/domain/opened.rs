//! Contexts stashed by `open` until the launched instance collects them.

use crate::channels::Context;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Error returned when an opened context id is not a UUID.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("opened app context id '{0}' is not a valid UUID")]
pub struct MalformedOpenedContextId(pub String);

/// Identifier handed to a launched instance through its startup parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpenedContextId(Uuid);

impl OpenedContextId {
    /// Creates a new random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OpenedContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OpenedContextId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl FromStr for OpenedContextId {
    type Err = MalformedOpenedContextId;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|_| MalformedOpenedContextId(value.to_owned()))
    }
}

#[derive(Debug, Clone)]
struct StashedContext {
    context: Context,
    expires_at: DateTime<Utc>,
}

/// One-shot store of opened contexts with a fixed lifetime.
///
/// Time is passed in by the caller so expiry follows whichever clock the
/// agent runs on.
#[derive(Debug, Clone)]
pub struct OpenedContextStore {
    ttl: TimeDelta,
    entries: HashMap<OpenedContextId, StashedContext>,
}

impl OpenedContextStore {
    /// Creates an empty store whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            entries: HashMap::new(),
        }
    }

    /// Stashes `context` and returns the id to collect it with.
    pub fn stash(&mut self, context: Context, now: DateTime<Utc>) -> OpenedContextId {
        self.purge_expired(now);
        let id = OpenedContextId::new();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.entries.insert(
            id,
            StashedContext {
                context,
                expires_at,
            },
        );
        id
    }

    /// Removes and returns the context stored under `id` unless it expired.
    pub fn take(&mut self, id: OpenedContextId, now: DateTime<Utc>) -> Option<Context> {
        self.entries
            .remove(&id)
            .filter(|stashed| stashed.expires_at > now)
            .map(|stashed| stashed.context)
    }

    /// Drops the context stored under `id`, if any.
    pub fn discard(&mut self, id: OpenedContextId) {
        self.entries.remove(&id);
    }

    /// Drops expired entries and returns how many were removed.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, stashed| stashed.expires_at > now);
        before - self.entries.len()
    }

    /// Returns the number of stored contexts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn context() -> Context {
        Context::new(json!({ "type": "fdc3.instrument", "id": { "ticker": "AAPL" } }))
            .expect("valid context")
    }

    #[fixture]
    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[rstest]
    fn stashed_context_is_taken_once(context: Context, now: DateTime<Utc>) {
        let mut store = OpenedContextStore::new(Duration::from_secs(60));
        let id = store.stash(context.clone(), now);

        assert_eq!(store.take(id, now), Some(context));
        assert_eq!(store.take(id, now), None);
        assert!(store.is_empty());
    }

    #[rstest]
    fn expired_context_is_not_returned(context: Context, now: DateTime<Utc>) {
        let mut store = OpenedContextStore::new(Duration::from_secs(60));
        let id = store.stash(context, now);

        let later = now + TimeDelta::seconds(61);

        assert_eq!(store.take(id, later), None);
    }

    #[rstest]
    fn stashing_purges_expired_entries(context: Context, now: DateTime<Utc>) {
        let mut store = OpenedContextStore::new(Duration::from_secs(1));
        store.stash(context.clone(), now);

        store.stash(context, now + TimeDelta::seconds(5));

        assert_eq!(store.len(), 1);
    }

    #[rstest]
    fn discarded_context_is_gone(context: Context, now: DateTime<Utc>) {
        let mut store = OpenedContextStore::new(Duration::from_secs(60));
        let id = store.stash(context, now);

        store.discard(id);

        assert_eq!(store.take(id, now), None);
    }

    #[rstest]
    #[case("not-a-uuid")]
    #[case("")]
    fn malformed_ids_are_rejected(#[case] raw: &str) {
        assert_eq!(
            raw.parse::<OpenedContextId>(),
            Err(MalformedOpenedContextId(raw.to_owned()))
        );
    }
}
