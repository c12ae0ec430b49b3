//! Channel broker: channel membership, the last-context cache and context
//! listeners.

use crate::apps::domain::InstanceId;
use crate::apps::services::{InstanceRegistry, InstanceRegistryError};
use crate::channels::domain::{
    Channel, ChannelDomainError, ChannelId, ChannelItem, ChannelKind, ChannelRef, Context,
    ContextListenerId,
};
use crate::router::{ClientId, MessageRouter, RouterError};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Errors returned by the channel broker.
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    /// No channel with this id exists for the requested kind.
    #[error("no {kind} channel found with id '{id}'")]
    NoChannelFound {
        /// Requested channel id.
        id: String,
        /// Requested channel kind.
        kind: ChannelKind,
    },

    /// The instance is not allowed to perform the operation.
    #[error("instance {instance_id} denied: {reason}")]
    AccessDenied {
        /// Calling instance.
        instance_id: InstanceId,
        /// Why access was denied.
        reason: &'static str,
    },

    /// A channel could not be created.
    #[error("channel creation failed: {0}")]
    CreationFailed(String),

    /// No listener with this id is registered.
    #[error("context listener {0} not found")]
    ListenerNotFound(ContextListenerId),

    /// No user channels are configured.
    #[error("no user channel set configured")]
    NoUserChannelSetFound,

    /// No matching context listener appeared in time.
    #[error("instance {instance_id} registered no context listener within {timeout:?}")]
    ListenerWaitTimedOut {
        /// Instance that was expected to listen.
        instance_id: InstanceId,
        /// How long the broker waited.
        timeout: Duration,
    },

    /// A channel value was invalid.
    #[error(transparent)]
    Domain(#[from] ChannelDomainError),

    /// Publishing on the router failed.
    #[error(transparent)]
    Router(#[from] RouterError),

    /// Instance lookups failed.
    #[error(transparent)]
    Registry(#[from] InstanceRegistryError),

    /// Broker state could not be accessed.
    #[error("channel broker state unavailable: {0}")]
    StateUnavailable(String),
}

/// Result type for channel broker operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

fn poisoned(err: impl std::fmt::Display) -> ChannelError {
    ChannelError::StateUnavailable(err.to_string())
}

/// A registered context listener and the stream it receives contexts on.
#[derive(Debug)]
pub struct ContextSubscription {
    /// Listener identifier, used to remove the listener.
    pub id: ContextListenerId,
    /// Contexts delivered to the listener, replayed context first.
    pub receiver: mpsc::UnboundedReceiver<Context>,
}

struct ListenerEntry {
    instance_id: InstanceId,
    /// `None` follows the instance's current user channel.
    channel: Option<ChannelRef>,
    context_type: Option<String>,
    sender: mpsc::UnboundedSender<Context>,
}

impl ListenerEntry {
    fn accepts(&self, context: &Context) -> bool {
        context.matches_type(self.context_type.as_deref())
    }

    fn deliver(&self, listener_id: ContextListenerId, context: Context) {
        if self.sender.send(context).is_err() {
            debug!(listener_id = %listener_id, "context listener receiver dropped");
        }
    }
}

#[derive(Default)]
struct ListenerState {
    listeners: HashMap<ContextListenerId, ListenerEntry>,
    membership: HashMap<InstanceId, ChannelRef>,
}

impl ListenerState {
    fn effective_channel<'a>(&'a self, entry: &'a ListenerEntry) -> Option<&'a ChannelRef> {
        entry
            .channel
            .as_ref()
            .or_else(|| self.membership.get(&entry.instance_id))
    }

    fn has_listener(&self, instance_id: InstanceId, context_type: Option<&str>) -> bool {
        self.listeners.values().any(|entry| {
            entry.instance_id == instance_id
                && match (entry.context_type.as_deref(), context_type) {
                    (None, _) => true,
                    (Some(listening), Some(wanted)) => listening == wanted,
                    (Some(_), None) => false,
                }
        })
    }
}

type ChannelSlot = Arc<Mutex<Channel>>;

fn lock_slot(slot: &ChannelSlot) -> ChannelResult<MutexGuard<'_, Channel>> {
    slot.lock().map_err(poisoned)
}

/// Manages user, app and private channels for running instances.
///
/// Each channel has its own lock, so traffic on different channels does not
/// contend. Listener registrations and user channel membership share a
/// second lock, always taken after a channel lock.
pub struct ChannelBroker {
    router: Arc<MessageRouter>,
    agent: ClientId,
    instances: Arc<InstanceRegistry>,
    user_channels: Vec<ChannelItem>,
    channels: RwLock<HashMap<ChannelRef, ChannelSlot>>,
    listeners: Mutex<ListenerState>,
    listener_added: watch::Sender<u64>,
}

impl ChannelBroker {
    /// Creates a broker publishing broadcasts as router client `agent`.
    #[must_use]
    pub fn new(
        router: Arc<MessageRouter>,
        agent: ClientId,
        instances: Arc<InstanceRegistry>,
        user_channels: Vec<ChannelItem>,
    ) -> Self {
        let channels = user_channels
            .iter()
            .map(|item| {
                let user_item = ChannelItem {
                    kind: ChannelKind::User,
                    ..item.clone()
                };
                (user_item.reference(), Arc::new(Mutex::new(Channel::new(user_item))))
            })
            .collect();
        let (listener_added, _) = watch::channel(0);
        Self {
            router,
            agent,
            instances,
            user_channels,
            channels: RwLock::new(channels),
            listeners: Mutex::new(ListenerState::default()),
            listener_added,
        }
    }

    fn lock_listeners(&self) -> ChannelResult<MutexGuard<'_, ListenerState>> {
        self.listeners.lock().map_err(poisoned)
    }

    fn slot(&self, reference: &ChannelRef) -> ChannelResult<Option<ChannelSlot>> {
        Ok(self
            .channels
            .read()
            .map_err(poisoned)?
            .get(reference)
            .map(Arc::clone))
    }

    fn existing_slot(&self, reference: &ChannelRef) -> ChannelResult<ChannelSlot> {
        self.slot(reference)?
            .ok_or_else(|| ChannelError::NoChannelFound {
                id: reference.id.to_string(),
                kind: reference.kind,
            })
    }

    fn ensure_running(&self, instance_id: InstanceId) -> ChannelResult<()> {
        if self.instances.is_running(instance_id)? {
            Ok(())
        } else {
            Err(ChannelError::AccessDenied {
                instance_id,
                reason: "instance is not running",
            })
        }
    }

    fn user_channel_ref(channel_id: &str) -> ChannelResult<ChannelRef> {
        let id = ChannelId::new(channel_id).map_err(|_| ChannelError::NoChannelFound {
            id: channel_id.to_owned(),
            kind: ChannelKind::User,
        })?;
        Ok(ChannelRef::new(id, ChannelKind::User))
    }

    /// Lists the configured user channels.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::AccessDenied`] for an instance that is not
    /// running and [`ChannelError::NoUserChannelSetFound`] when no user
    /// channels are configured.
    pub fn get_user_channels(&self, instance_id: InstanceId) -> ChannelResult<Vec<ChannelItem>> {
        self.ensure_running(instance_id)?;
        if self.user_channels.is_empty() {
            return Err(ChannelError::NoUserChannelSetFound);
        }
        Ok(self
            .user_channels
            .iter()
            .map(|item| ChannelItem {
                kind: ChannelKind::User,
                ..item.clone()
            })
            .collect())
    }

    /// Looks up a configured user channel.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::NoChannelFound`] if `channel_id` is not one of
    /// the configured user channels.
    pub fn user_channel(&self, channel_id: &str) -> ChannelResult<ChannelItem> {
        let reference = Self::user_channel_ref(channel_id)?;
        let slot = self.existing_slot(&reference)?;
        let channel = lock_slot(&slot)?;
        Ok(channel.item().clone())
    }

    /// Returns the app channel `channel_id`, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::CreationFailed`] if `channel_id` is not a valid
    /// channel id.
    pub fn app_channel(&self, channel_id: &str) -> ChannelResult<ChannelItem> {
        let id = ChannelId::new(channel_id)
            .map_err(|err| ChannelError::CreationFailed(err.to_string()))?;
        let reference = ChannelRef::new(id, ChannelKind::App);
        let mut channels = self.channels.write().map_err(poisoned)?;
        let slot = channels.entry(reference.clone()).or_insert_with(|| {
            info!(channel = %reference, "app channel created");
            Arc::new(Mutex::new(Channel::new(ChannelItem {
                id: reference.id.clone(),
                kind: ChannelKind::App,
                display_metadata: None,
            })))
        });
        let channel = lock_slot(slot)?;
        Ok(channel.item().clone())
    }

    /// Creates a new private channel owned by `instance_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::AccessDenied`] for an instance that is not
    /// running.
    pub fn create_private_channel(&self, instance_id: InstanceId) -> ChannelResult<ChannelItem> {
        self.ensure_running(instance_id)?;
        let channel = Channel::private(ChannelId::generate(), instance_id);
        let item = channel.item().clone();
        let mut channels = self.channels.write().map_err(poisoned)?;
        if channels.contains_key(&item.reference()) {
            return Err(ChannelError::CreationFailed(format!(
                "private channel '{}' already exists",
                item.id
            )));
        }
        channels.insert(item.reference(), Arc::new(Mutex::new(channel)));
        info!(channel = %item.reference(), creator = %instance_id, "private channel created");
        Ok(item)
    }

    /// Admits `instance_id` as the second party of a private channel.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::NoChannelFound`] for an unknown channel and
    /// [`ChannelError::AccessDenied`] when the channel already has two
    /// members or the instance is not running.
    pub fn connect_private_channel(
        &self,
        channel_id: &ChannelId,
        instance_id: InstanceId,
    ) -> ChannelResult<ChannelItem> {
        self.ensure_running(instance_id)?;
        let reference = ChannelRef::new(channel_id.clone(), ChannelKind::Private);
        let slot = self.existing_slot(&reference)?;
        let mut channel = lock_slot(&slot)?;
        if !channel.admit(instance_id) {
            return Err(ChannelError::AccessDenied {
                instance_id,
                reason: "private channel already has two members",
            });
        }
        Ok(channel.item().clone())
    }

    /// Finds an existing user or app channel.
    ///
    /// Private channels are never returned.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::NoChannelFound`] if no such channel exists.
    pub fn find_channel(&self, channel_id: &str, kind: ChannelKind) -> ChannelResult<ChannelItem> {
        let not_found = || ChannelError::NoChannelFound {
            id: channel_id.to_owned(),
            kind,
        };
        if kind == ChannelKind::Private {
            return Err(not_found());
        }
        let id = ChannelId::new(channel_id).map_err(|_| not_found())?;
        let slot = self.slot(&ChannelRef::new(id, kind))?.ok_or_else(not_found)?;
        let channel = lock_slot(&slot)?;
        Ok(channel.item().clone())
    }

    /// Makes `channel_id` the current user channel of `instance_id`,
    /// leaving any previous one.
    ///
    /// Listeners of the instance that follow its current channel receive the
    /// channel's matching cached context.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::AccessDenied`] for an instance that is not
    /// running and [`ChannelError::NoChannelFound`] for an unknown user
    /// channel.
    pub fn join_channel(
        &self,
        instance_id: InstanceId,
        channel_id: &str,
    ) -> ChannelResult<ChannelItem> {
        self.ensure_running(instance_id)?;
        let reference = Self::user_channel_ref(channel_id)?;
        let slot = self.existing_slot(&reference)?;
        let channel = lock_slot(&slot)?;
        let mut state = self.lock_listeners()?;
        let previous = state.membership.insert(instance_id, reference.clone());
        for (listener_id, entry) in &state.listeners {
            if entry.instance_id != instance_id || entry.channel.is_some() {
                continue;
            }
            if let Some(context) = channel.current_context(entry.context_type.as_deref()) {
                entry.deliver(*listener_id, context.clone());
            }
        }
        info!(
            instance_id = %instance_id,
            channel = %reference,
            previous = ?previous.map(|left| left.to_string()),
            "instance joined user channel"
        );
        Ok(channel.item().clone())
    }

    /// Returns the current user channel of `instance_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::StateUnavailable`] when state is poisoned.
    pub fn get_current_channel(&self, instance_id: InstanceId) -> ChannelResult<Option<ChannelItem>> {
        let current = self.lock_listeners()?.membership.get(&instance_id).cloned();
        let Some(reference) = current else {
            return Ok(None);
        };
        let slot = self.existing_slot(&reference)?;
        let channel = lock_slot(&slot)?;
        Ok(Some(channel.item().clone()))
    }

    /// Leaves the current user channel of `instance_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::StateUnavailable`] when state is poisoned.
    pub fn leave_current_channel(&self, instance_id: InstanceId) -> ChannelResult<()> {
        if let Some(left) = self.lock_listeners()?.membership.remove(&instance_id) {
            info!(instance_id = %instance_id, channel = %left, "instance left user channel");
        }
        Ok(())
    }

    /// Broadcasts `context` on a channel.
    ///
    /// The context replaces the cached context of its type, is delivered to
    /// every matching listener except those of `source`, and is published on
    /// the channel's router topic.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::NoChannelFound`] for an unknown channel,
    /// [`ChannelError::AccessDenied`] when `source` is not a member of a
    /// private channel and [`ChannelError::Router`] when publishing fails.
    pub fn broadcast(
        &self,
        reference: &ChannelRef,
        context: Context,
        source: Option<InstanceId>,
    ) -> ChannelResult<usize> {
        let slot = self.existing_slot(reference)?;
        let payload = json!({
            "channelId": reference.id,
            "context": &context,
            "originatingAppInstanceId": source,
        });
        let context_type = context.context_type().to_owned();
        let delivered = {
            let mut channel = lock_slot(&slot)?;
            if reference.kind == ChannelKind::Private
                && let Some(instance_id) = source
                && !channel.is_member(instance_id)
            {
                return Err(ChannelError::AccessDenied {
                    instance_id,
                    reason: "not a member of the private channel",
                });
            }
            let state = self.lock_listeners()?;
            let mut count = 0_usize;
            for (listener_id, entry) in &state.listeners {
                if Some(entry.instance_id) == source
                    || state.effective_channel(entry) != Some(reference)
                    || !entry.accepts(&context)
                {
                    continue;
                }
                entry.deliver(*listener_id, context.clone());
                count += 1;
            }
            channel.store(context);
            count
        };

        self.router
            .publish(self.agent, &reference.broadcast_topic(), Some(payload))?;
        debug!(channel = %reference, context_type, delivered, "context broadcast");
        Ok(delivered)
    }

    /// Returns the cached context of `context_type` on a channel, or the most
    /// recent context of any type when no type is given.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::NoChannelFound`] for an unknown channel.
    pub fn get_current_context(
        &self,
        reference: &ChannelRef,
        context_type: Option<&str>,
    ) -> ChannelResult<Option<Context>> {
        let slot = self.existing_slot(reference)?;
        let channel = lock_slot(&slot)?;
        Ok(channel.current_context(context_type).cloned())
    }

    /// Registers a context listener for `instance_id`.
    ///
    /// With `channel` set the listener is bound to that channel; otherwise it
    /// follows the instance's current user channel. A matching cached context
    /// is placed on the returned stream before this method returns.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::AccessDenied`] for an instance that is not
    /// running or not a member of the private channel, and
    /// [`ChannelError::NoChannelFound`] for an unknown channel.
    pub fn add_context_listener(
        &self,
        instance_id: InstanceId,
        channel: Option<ChannelRef>,
        context_type: Option<String>,
    ) -> ChannelResult<ContextSubscription> {
        self.ensure_running(instance_id)?;
        let id = ContextListenerId::new();
        let (sender, receiver) = mpsc::unbounded_channel();
        let entry = ListenerEntry {
            instance_id,
            channel,
            context_type,
            sender,
        };

        loop {
            let target = match &entry.channel {
                Some(bound) => Some(bound.clone()),
                None => self.lock_listeners()?.membership.get(&instance_id).cloned(),
            };
            let Some(reference) = target else {
                let mut state = self.lock_listeners()?;
                if state.membership.contains_key(&instance_id) {
                    continue;
                }
                state.listeners.insert(id, entry);
                break;
            };

            let slot = self.existing_slot(&reference)?;
            let channel_state = lock_slot(&slot)?;
            if reference.kind == ChannelKind::Private && !channel_state.is_member(instance_id) {
                return Err(ChannelError::AccessDenied {
                    instance_id,
                    reason: "not a member of the private channel",
                });
            }
            let mut state = self.lock_listeners()?;
            if entry.channel.is_none() && state.membership.get(&instance_id) != Some(&reference) {
                // Membership moved while the channel lock was being taken.
                continue;
            }
            if let Some(context) = channel_state.current_context(entry.context_type.as_deref()) {
                entry.deliver(id, context.clone());
            }
            state.listeners.insert(id, entry);
            break;
        }

        self.listener_added.send_modify(|version| *version += 1);
        debug!(instance_id = %instance_id, listener_id = %id, "context listener added");
        Ok(ContextSubscription { id, receiver })
    }

    /// Removes a context listener.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::ListenerNotFound`] for an unknown listener.
    pub fn remove_context_listener(&self, listener_id: ContextListenerId) -> ChannelResult<()> {
        let removed = self
            .lock_listeners()?
            .listeners
            .remove(&listener_id)
            .ok_or(ChannelError::ListenerNotFound(listener_id))?;
        debug!(
            instance_id = %removed.instance_id,
            listener_id = %listener_id,
            "context listener removed"
        );
        Ok(())
    }

    /// Waits until `instance_id` has a context listener accepting
    /// `context_type`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::ListenerWaitTimedOut`] if no such listener is
    /// registered within `timeout`.
    pub async fn wait_for_context_listener(
        &self,
        instance_id: InstanceId,
        context_type: Option<&str>,
        timeout: Duration,
    ) -> ChannelResult<()> {
        let deadline = Instant::now() + timeout;
        let mut added = self.listener_added.subscribe();
        loop {
            if self.lock_listeners()?.has_listener(instance_id, context_type) {
                return Ok(());
            }
            match tokio::time::timeout_at(deadline, added.changed()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) | Err(_) => {
                    warn!(instance_id = %instance_id, ?timeout, "no context listener registered");
                    return Err(ChannelError::ListenerWaitTimedOut {
                        instance_id,
                        timeout,
                    });
                }
            }
        }
    }

    /// Drops every listener and channel membership held by `instance_id`.
    ///
    /// Private channels whose members have all stopped are removed.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::StateUnavailable`] when state is poisoned.
    pub fn release_instance(&self, instance_id: InstanceId) -> ChannelResult<()> {
        self.release_private_channels(instance_id)?;
        let mut state = self.lock_listeners()?;
        state.membership.remove(&instance_id);
        let before = state.listeners.len();
        state
            .listeners
            .retain(|_, entry| entry.instance_id != instance_id);
        let released = before - state.listeners.len();
        debug!(instance_id = %instance_id, released, "channel state released");
        Ok(())
    }

    fn release_private_channels(&self, instance_id: InstanceId) -> ChannelResult<()> {
        let private: Vec<(ChannelRef, ChannelSlot)> = self
            .channels
            .read()
            .map_err(poisoned)?
            .iter()
            .filter(|(reference, _)| reference.kind == ChannelKind::Private)
            .map(|(reference, slot)| (reference.clone(), Arc::clone(slot)))
            .collect();
        let mut abandoned = Vec::new();
        for (reference, slot) in private {
            if lock_slot(&slot)?.release(instance_id) {
                abandoned.push(reference);
            }
        }
        if abandoned.is_empty() {
            return Ok(());
        }
        let mut channels = self.channels.write().map_err(poisoned)?;
        for reference in abandoned {
            channels.remove(&reference);
            info!(channel = %reference, "private channel removed");
        }
        Ok(())
    }
}

impl std::fmt::Debug for ChannelBroker {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ChannelBroker")
            .field("agent", &self.agent)
            .field("user_channels", &self.user_channels.len())
            .finish_non_exhaustive()
    }
}
