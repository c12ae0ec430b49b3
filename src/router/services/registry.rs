//! Connection table: clients, subscriptions and handler registrations.
//!
//! Topics, service names and scoped endpoints each live in a sharded map,
//! so operations on different keys take different locks. What a client owns
//! is recorded in its [`ClientSlot`] behind the slot's own mutex; lock order
//! is always slot first, then map shard.
//!
//! Removing a client marks its slot disconnected under that mutex before
//! anything is detached. From then on calls on behalf of the client fail
//! with [`RouterError::UnknownClient`], publishes skip its subscriptions and
//! its services no longer resolve.

use crate::router::domain::{
    ClientId, EndpointName, InvocationTarget, RouterError, RouterResult, SubscriptionId, Topic,
    TopicMessage,
};
use crate::router::ports::ServiceHandler;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Default)]
struct Owned {
    subscriptions: HashMap<SubscriptionId, Topic>,
    services: HashSet<EndpointName>,
    endpoints: HashSet<EndpointName>,
}

/// A connected client's inbox and the registrations it owns.
pub struct ClientSlot {
    id: ClientId,
    outbox: mpsc::Sender<TopicMessage>,
    connected: AtomicBool,
    owned: Mutex<Owned>,
}

impl ClientSlot {
    fn new(id: ClientId, outbox: mpsc::Sender<TopicMessage>) -> Self {
        Self {
            id,
            outbox,
            connected: AtomicBool::new(true),
            owned: Mutex::new(Owned::default()),
        }
    }

    /// Returns the client's identifier.
    #[must_use]
    pub const fn id(&self) -> ClientId {
        self.id
    }

    /// Returns whether the client has not started disconnecting.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn lock(&self) -> RouterResult<MutexGuard<'_, Owned>> {
        let owned = self.owned.lock().map_err(RouterError::poisoned)?;
        if self.is_connected() {
            Ok(owned)
        } else {
            Err(RouterError::UnknownClient(self.id))
        }
    }
}

struct Binding {
    owner: Arc<ClientSlot>,
    handler: Arc<dyn ServiceHandler>,
    timeout: Option<Duration>,
}

/// A resolved invocation target.
pub struct Resolved {
    /// Client serving the target.
    pub owner: Arc<ClientSlot>,
    /// Handler to run.
    pub handler: Arc<dyn ServiceHandler>,
    /// Deadline the service asked for, if any.
    pub timeout: Option<Duration>,
}

/// A subscriber's delivery slot for one publish.
pub struct Delivery {
    /// Subscription receiving the message.
    pub subscription: SubscriptionId,
    /// Subscribing client.
    pub client: ClientId,
    /// Client inbox.
    pub outbox: mpsc::Sender<TopicMessage>,
}

/// Summary of what a disconnect removed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RemovedClient {
    /// Subscriptions dropped.
    pub subscriptions: usize,
    /// Global services unregistered.
    pub services: Vec<EndpointName>,
    /// Scoped endpoints unregistered.
    pub endpoints: Vec<EndpointName>,
}

/// All connection state owned by the router.
#[derive(Default)]
pub struct ConnectionRegistry {
    clients: DashMap<ClientId, Arc<ClientSlot>>,
    topics: DashMap<Topic, HashMap<SubscriptionId, Arc<ClientSlot>>>,
    services: DashMap<EndpointName, Binding>,
    endpoints: DashMap<(ClientId, EndpointName), Binding>,
}

impl ConnectionRegistry {
    /// Adds a client with the given inbox.
    pub fn connect(&self, client: ClientId, outbox: mpsc::Sender<TopicMessage>) {
        self.clients
            .insert(client, Arc::new(ClientSlot::new(client, outbox)));
    }

    fn slot(&self, client: ClientId) -> RouterResult<Arc<ClientSlot>> {
        self.clients
            .get(&client)
            .map(|entry| Arc::clone(entry.value()))
            .filter(|slot| slot.is_connected())
            .ok_or(RouterError::UnknownClient(client))
    }

    /// Returns whether `client` is connected.
    #[must_use]
    pub fn is_connected(&self, client: ClientId) -> bool {
        self.slot(client).is_ok()
    }

    /// Returns the number of connected clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients
            .iter()
            .filter(|entry| entry.value().is_connected())
            .count()
    }

    /// Fails with [`RouterError::UnknownClient`] unless `client` is connected.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnknownClient`] for unknown clients.
    pub fn ensure_connected(&self, client: ClientId) -> RouterResult<()> {
        self.slot(client).map(|_| ())
    }

    /// Subscribes `client` to `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnknownClient`] for unknown clients.
    pub fn subscribe(&self, client: ClientId, topic: Topic) -> RouterResult<SubscriptionId> {
        let slot = self.slot(client)?;
        let mut owned = slot.lock()?;
        let subscription = SubscriptionId::new();
        owned.subscriptions.insert(subscription, topic.clone());
        self.topics
            .entry(topic)
            .or_default()
            .insert(subscription, Arc::clone(&slot));
        Ok(subscription)
    }

    /// Cancels one subscription owned by `client`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnknownClient`] or
    /// [`RouterError::UnknownSubscription`].
    pub fn unsubscribe(&self, client: ClientId, subscription: SubscriptionId) -> RouterResult<()> {
        let slot = self.slot(client)?;
        let mut owned = slot.lock()?;
        let topic = owned
            .subscriptions
            .remove(&subscription)
            .ok_or(RouterError::UnknownSubscription(subscription))?;
        self.detach_subscription(&topic, subscription);
        Ok(())
    }

    fn detach_subscription(&self, topic: &Topic, subscription: SubscriptionId) {
        if let Some(mut subscribers) = self.topics.get_mut(topic) {
            subscribers.remove(&subscription);
        }
        self.topics
            .remove_if(topic, |_, subscribers| subscribers.is_empty());
    }

    /// Lists the delivery slots for a publish on `topic`.
    #[must_use]
    pub fn deliveries(&self, topic: &Topic) -> Vec<Delivery> {
        let Some(subscribers) = self.topics.get(topic) else {
            return Vec::new();
        };
        subscribers
            .iter()
            .filter(|(_, slot)| slot.is_connected())
            .map(|(subscription, slot)| Delivery {
                subscription: *subscription,
                client: slot.id,
                outbox: slot.outbox.clone(),
            })
            .collect()
    }

    /// Registers a global service owned by `client`.
    ///
    /// `timeout` replaces the router's default deadline for invocations
    /// that do not name their own.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnknownClient`] or
    /// [`RouterError::DuplicateServiceName`].
    pub fn register_service(
        &self,
        client: ClientId,
        name: EndpointName,
        handler: Arc<dyn ServiceHandler>,
        timeout: Option<Duration>,
    ) -> RouterResult<()> {
        let slot = self.slot(client)?;
        let mut owned = slot.lock()?;
        match self.services.entry(name.clone()) {
            Entry::Occupied(_) => Err(RouterError::DuplicateServiceName(name)),
            Entry::Vacant(vacant) => {
                vacant.insert(Binding {
                    owner: Arc::clone(&slot),
                    handler,
                    timeout,
                });
                owned.services.insert(name);
                Ok(())
            }
        }
    }

    /// Removes a global service if `client` owns it.
    ///
    /// Returns whether a registration was removed; names owned by other
    /// clients are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnknownClient`] for unknown clients.
    pub fn unregister_service(&self, client: ClientId, name: &EndpointName) -> RouterResult<bool> {
        let slot = self.slot(client)?;
        let mut owned = slot.lock()?;
        let removed = self
            .services
            .remove_if(name, |_, binding| binding.owner.id == client)
            .is_some();
        if removed {
            owned.services.remove(name);
        }
        Ok(removed)
    }

    /// Registers an endpoint scoped to `client`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnknownClient`] or
    /// [`RouterError::DuplicateEndpoint`].
    pub fn register_endpoint(
        &self,
        client: ClientId,
        name: EndpointName,
        handler: Arc<dyn ServiceHandler>,
    ) -> RouterResult<()> {
        let slot = self.slot(client)?;
        let mut owned = slot.lock()?;
        match self.endpoints.entry((client, name.clone())) {
            Entry::Occupied(_) => Err(RouterError::DuplicateEndpoint { name, client }),
            Entry::Vacant(vacant) => {
                vacant.insert(Binding {
                    owner: Arc::clone(&slot),
                    handler,
                    timeout: None,
                });
                owned.endpoints.insert(name);
                Ok(())
            }
        }
    }

    /// Removes an endpoint scoped to `client`; returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnknownClient`] for unknown clients.
    pub fn unregister_endpoint(&self, client: ClientId, name: &EndpointName) -> RouterResult<bool> {
        let slot = self.slot(client)?;
        let mut owned = slot.lock()?;
        let removed = owned.endpoints.remove(name);
        if removed {
            self.endpoints.remove(&(client, name.clone()));
        }
        Ok(removed)
    }

    /// Resolves an invocation target to its owning client and handler.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnknownEndpoint`] when nothing matches or the
    /// owner is disconnecting.
    pub fn resolve(&self, target: &InvocationTarget) -> RouterResult<Resolved> {
        let resolved = match target {
            InvocationTarget::Service(name) => self.services.get(name).map(|binding| binding.resolved()),
            InvocationTarget::Endpoint { name, client } => self
                .endpoints
                .get(&(*client, name.clone()))
                .map(|binding| binding.resolved()),
        };
        resolved
            .filter(|found| found.owner.is_connected())
            .ok_or_else(|| RouterError::UnknownEndpoint(target.to_string()))
    }

    /// Removes `client` with all of its subscriptions and registrations.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnknownClient`] when the client is not
    /// connected or is already being removed.
    pub fn remove_client(&self, client: ClientId) -> RouterResult<RemovedClient> {
        let slot = self.slot(client)?;
        let owned = {
            let mut owned = slot.lock()?;
            slot.connected.store(false, Ordering::SeqCst);
            std::mem::take(&mut *owned)
        };
        for (subscription, topic) in &owned.subscriptions {
            self.detach_subscription(topic, *subscription);
        }
        for name in &owned.services {
            self.services
                .remove_if(name, |_, binding| binding.owner.id == client);
        }
        for name in &owned.endpoints {
            self.endpoints.remove(&(client, name.clone()));
        }
        self.clients.remove(&client);
        Ok(RemovedClient {
            subscriptions: owned.subscriptions.len(),
            services: owned.services.into_iter().collect(),
            endpoints: owned.endpoints.into_iter().collect(),
        })
    }
}

impl Binding {
    fn resolved(&self) -> Resolved {
        Resolved {
            owner: Arc::clone(&self.owner),
            handler: Arc::clone(&self.handler),
            timeout: self.timeout,
        }
    }
}
