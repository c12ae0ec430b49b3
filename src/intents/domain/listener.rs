//! Which instances currently listen for which intents.

use super::IntentDomainError;
use crate::apps::domain::InstanceId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Requested change to an intent listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IntentListenerAction {
    /// Start listening.
    Subscribe,
    /// Stop listening.
    Unsubscribe,
}

#[derive(Debug, Default)]
struct InstanceListeners {
    active: BTreeSet<String>,
    ever_subscribed: BTreeSet<String>,
}

/// Intent listeners keyed by instance.
#[derive(Debug, Default)]
pub struct IntentListenerTable {
    entries: HashMap<InstanceId, InstanceListeners>,
}

impl IntentListenerTable {
    /// Marks `instance_id` as listening for `intent`.
    ///
    /// Returns `false` when the listener was already active.
    pub fn subscribe(&mut self, instance_id: InstanceId, intent: &str) -> bool {
        let listeners = self.entries.entry(instance_id).or_default();
        listeners.ever_subscribed.insert(intent.to_owned());
        listeners.active.insert(intent.to_owned())
    }

    /// Stops `instance_id` listening for `intent`.
    ///
    /// Returns whether the listener was active. Unsubscribing twice is
    /// allowed.
    ///
    /// # Errors
    ///
    /// Returns [`IntentDomainError::NeverSubscribed`] if the instance never
    /// listened for the intent.
    pub fn unsubscribe(
        &mut self,
        instance_id: InstanceId,
        intent: &str,
    ) -> Result<bool, IntentDomainError> {
        let never_subscribed = || IntentDomainError::NeverSubscribed {
            instance_id,
            intent: intent.to_owned(),
        };
        let listeners = self
            .entries
            .get_mut(&instance_id)
            .ok_or_else(never_subscribed)?;
        if !listeners.ever_subscribed.contains(intent) {
            return Err(never_subscribed());
        }
        Ok(listeners.active.remove(intent))
    }

    /// Returns whether `instance_id` is listening for `intent`.
    #[must_use]
    pub fn is_listening(&self, instance_id: InstanceId, intent: &str) -> bool {
        self.entries
            .get(&instance_id)
            .is_some_and(|listeners| listeners.active.contains(intent))
    }

    /// Forgets every listener of `instance_id`.
    pub fn release(&mut self, instance_id: InstanceId) {
        self.entries.remove(&instance_id);
    }
}
