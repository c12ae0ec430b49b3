//! The message router: pub/sub fan-out and correlated invocations.

use super::client::RouterClient;
use super::registry::{ConnectionRegistry, Resolved};
use crate::router::config::RouterOptions;
use crate::router::domain::{
    ClientId, CorrelationId, EndpointName, InvocationRequest, InvocationState, InvocationTarget,
    PendingInvocation, RouterError, RouterResult, SubscriptionId, Topic, TopicMessage,
};
use crate::router::ports::{HandlerResult, ServiceHandler};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A pending invocation and the means to resolve it.
struct PendingEntry {
    invocation: PendingInvocation,
    reply: oneshot::Sender<RouterResult<Option<Value>>>,
    worker: Option<AbortHandle>,
}

impl PendingEntry {
    /// Resolves the entry, logging instead of failing on an illegal edge.
    fn resolve(mut self, state: InvocationState, outcome: RouterResult<Option<Value>>) {
        if let Err(err) = self.invocation.transition(state) {
            warn!(error = %err, "invocation resolved twice");
            return;
        }
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
        if self.reply.send(outcome).is_err() {
            debug!(
                correlation_id = %self.invocation.correlation_id(),
                "caller stopped waiting before the response arrived"
            );
        }
    }
}

type PendingTable = DashMap<CorrelationId, PendingEntry>;

/// Removes a pending record when the waiting caller goes away.
struct PendingGuard {
    table: Arc<PendingTable>,
    correlation_id: CorrelationId,
}

impl PendingGuard {
    fn take(&self) -> Option<PendingEntry> {
        self.table
            .remove(&self.correlation_id)
            .map(|(_, entry)| entry)
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if let Some(mut entry) = self.take() {
            debug!(correlation_id = %self.correlation_id, "invocation cancelled by caller");
            if let Some(worker) = entry.worker.take() {
                worker.abort();
            }
        }
    }
}

/// Central router shared by every connected client.
///
/// Topics, services, endpoints and in-flight invocations each live in a
/// sharded map, and each client's registrations sit behind that client's own
/// lock. Work on unrelated topics or clients does not contend. A disconnect
/// marks the client gone before detaching anything, so no publish, resolve
/// or registration observes it half removed.
pub struct MessageRouter {
    registry: ConnectionRegistry,
    pending: Arc<PendingTable>,
    options: RouterOptions,
}

impl MessageRouter {
    /// Creates a router with the given options.
    #[must_use]
    pub fn new(options: RouterOptions) -> Self {
        Self {
            registry: ConnectionRegistry::default(),
            pending: Arc::new(DashMap::new()),
            options,
        }
    }

    /// Returns the router options.
    #[must_use]
    pub const fn options(&self) -> &RouterOptions {
        &self.options
    }

    /// Connects a new client and returns its handle.
    #[must_use]
    pub fn connect(self: &Arc<Self>) -> RouterClient {
        let client = ClientId::new();
        let (outbox, inbox) = mpsc::channel(self.options.client_queue_capacity.max(1));
        self.registry.connect(client, outbox);
        info!(client = %client, "router client connected");
        RouterClient::new(client, Arc::clone(self), inbox)
    }

    /// Returns whether `client` is currently connected.
    #[must_use]
    pub fn is_connected(&self, client: ClientId) -> bool {
        self.registry.is_connected(client)
    }

    /// Returns the number of connected clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.registry.client_count()
    }

    /// Returns the number of unresolved invocations.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Subscribes `client` to `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::InvalidTopic`] or [`RouterError::UnknownClient`].
    pub fn subscribe(&self, client: ClientId, topic_name: &str) -> RouterResult<SubscriptionId> {
        let topic = Topic::new(topic_name)?;
        let subscription = self.registry.subscribe(client, topic.clone())?;
        debug!(client = %client, topic = %topic, subscription = %subscription, "subscribed");
        Ok(subscription)
    }

    /// Cancels a subscription owned by `client`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnknownClient`] or
    /// [`RouterError::UnknownSubscription`].
    pub fn unsubscribe(&self, client: ClientId, subscription: SubscriptionId) -> RouterResult<()> {
        self.registry.unsubscribe(client, subscription)?;
        debug!(client = %client, subscription = %subscription, "unsubscribed");
        Ok(())
    }

    /// Publishes `payload` on `topic` to every current subscriber.
    ///
    /// Delivery is best-effort: a subscriber whose queue is full misses the
    /// message. Returns the number of subscriptions that accepted it.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::InvalidTopic`] or [`RouterError::UnknownClient`].
    pub fn publish(
        &self,
        source: ClientId,
        topic_name: &str,
        payload: Option<Value>,
    ) -> RouterResult<usize> {
        let topic = Topic::new(topic_name)?;
        self.registry.ensure_connected(source)?;
        let mut delivered = 0;
        for delivery in self.registry.deliveries(&topic) {
            let message = TopicMessage {
                subscription: delivery.subscription,
                topic: topic.clone(),
                payload: payload.clone(),
                source,
            };
            match delivery.outbox.try_send(message) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => warn!(
                    topic = %topic,
                    client = %delivery.client,
                    "subscriber queue full, message dropped"
                ),
                Err(mpsc::error::TrySendError::Closed(_)) => debug!(
                    topic = %topic,
                    client = %delivery.client,
                    "subscriber inbox closed, message dropped"
                ),
            }
        }
        debug!(topic = %topic, source = %source, delivered, "published");
        Ok(delivered)
    }

    /// Registers a global service owned by `client`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::InvalidEndpoint`], [`RouterError::UnknownClient`]
    /// or [`RouterError::DuplicateServiceName`].
    pub fn register_service(
        &self,
        client: ClientId,
        endpoint_name: &str,
        handler: Arc<dyn ServiceHandler>,
    ) -> RouterResult<()> {
        self.bind_service(client, endpoint_name, handler, None)
    }

    /// Registers a global service whose invocations wait up to `timeout`
    /// instead of the router default.
    ///
    /// Callers of [`MessageRouter::invoke_with_timeout`] still pick their
    /// own deadline.
    ///
    /// # Errors
    ///
    /// See [`MessageRouter::register_service`].
    pub fn register_service_with_timeout(
        &self,
        client: ClientId,
        endpoint_name: &str,
        handler: Arc<dyn ServiceHandler>,
        timeout: Duration,
    ) -> RouterResult<()> {
        self.bind_service(client, endpoint_name, handler, Some(timeout))
    }

    fn bind_service(
        &self,
        client: ClientId,
        endpoint_name: &str,
        handler: Arc<dyn ServiceHandler>,
        timeout: Option<Duration>,
    ) -> RouterResult<()> {
        let name = EndpointName::new(endpoint_name)?;
        self.registry
            .register_service(client, name.clone(), handler, timeout)?;
        info!(client = %client, service = %name, timeout = ?timeout, "service registered");
        Ok(())
    }

    /// Unregisters a global service; a no-op unless `client` owns it.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::InvalidEndpoint`] or [`RouterError::UnknownClient`].
    pub fn unregister_service(&self, client: ClientId, endpoint_name: &str) -> RouterResult<()> {
        let name = EndpointName::new(endpoint_name)?;
        if self.registry.unregister_service(client, &name)? {
            info!(client = %client, service = %name, "service unregistered");
        }
        Ok(())
    }

    /// Registers an endpoint reachable only through a scoped invoke.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::InvalidEndpoint`], [`RouterError::UnknownClient`]
    /// or [`RouterError::DuplicateEndpoint`].
    pub fn register_endpoint(
        &self,
        client: ClientId,
        endpoint_name: &str,
        handler: Arc<dyn ServiceHandler>,
    ) -> RouterResult<()> {
        let name = EndpointName::new(endpoint_name)?;
        self.registry
            .register_endpoint(client, name.clone(), handler)?;
        debug!(client = %client, endpoint = %name, "endpoint registered");
        Ok(())
    }

    /// Unregisters a scoped endpoint owned by `client`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::InvalidEndpoint`] or [`RouterError::UnknownClient`].
    pub fn unregister_endpoint(&self, client: ClientId, endpoint_name: &str) -> RouterResult<()> {
        let name = EndpointName::new(endpoint_name)?;
        self.registry.unregister_endpoint(client, &name)?;
        Ok(())
    }

    /// Invokes `target` with the deadline its service registered, or the
    /// router default.
    ///
    /// # Errors
    ///
    /// See [`MessageRouter::invoke_with_timeout`].
    pub async fn invoke(
        &self,
        caller: ClientId,
        target: InvocationTarget,
        payload: Option<Value>,
    ) -> RouterResult<Option<Value>> {
        self.dispatch(caller, target, payload, None).await
    }

    /// Invokes `target` and waits for exactly one response.
    ///
    /// Dropping the returned future cancels the wait and discards the
    /// pending record; a late response is then dropped.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnknownClient`], [`RouterError::UnknownEndpoint`],
    /// [`RouterError::InvocationTimeout`], [`RouterError::InvocationAborted`]
    /// or [`RouterError::HandlerFailed`].
    pub async fn invoke_with_timeout(
        &self,
        caller: ClientId,
        target: InvocationTarget,
        payload: Option<Value>,
        timeout: Duration,
    ) -> RouterResult<Option<Value>> {
        self.dispatch(caller, target, payload, Some(timeout)).await
    }

    async fn dispatch(
        &self,
        caller: ClientId,
        target: InvocationTarget,
        payload: Option<Value>,
        timeout: Option<Duration>,
    ) -> RouterResult<Option<Value>> {
        let correlation_id = CorrelationId::new();
        let endpoint = target.name().clone();
        let (reply, response) = oneshot::channel();

        self.registry.ensure_connected(caller)?;
        let Resolved {
            owner,
            handler,
            timeout: registered,
        } = self.registry.resolve(&target)?;
        let deadline = Instant::now()
            + timeout
                .or(registered)
                .unwrap_or(self.options.invocation_timeout);
        let invocation =
            PendingInvocation::new(correlation_id, caller, Some(owner.id()), target, deadline);
        self.pending.insert(
            correlation_id,
            PendingEntry {
                invocation,
                reply,
                worker: None,
            },
        );
        let guard = PendingGuard {
            table: Arc::clone(&self.pending),
            correlation_id,
        };
        // A disconnect that ran between resolve and insert missed this entry.
        if !owner.is_connected() || !self.registry.is_connected(caller) {
            return Err(RouterError::InvocationAborted {
                endpoint,
                correlation_id,
            });
        }

        let request = InvocationRequest {
            correlation_id,
            caller,
            endpoint: endpoint.clone(),
            payload,
        };
        self.spawn_handler(handler, request);
        debug!(correlation_id = %correlation_id, endpoint = %endpoint, "invocation dispatched");

        match tokio::time::timeout_at(deadline, response).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(RouterError::InvocationAborted {
                endpoint,
                correlation_id,
            }),
            Err(_) => {
                if let Some(entry) = guard.take() {
                    entry.resolve(
                        InvocationState::TimedOut,
                        Err(RouterError::InvocationTimeout {
                            endpoint: endpoint.clone(),
                            correlation_id,
                        }),
                    );
                }
                warn!(correlation_id = %correlation_id, endpoint = %endpoint, "invocation timed out");
                Err(RouterError::InvocationTimeout {
                    endpoint,
                    correlation_id,
                })
            }
        }
    }

    fn spawn_handler(&self, handler: Arc<dyn ServiceHandler>, request: InvocationRequest) {
        let table = Arc::clone(&self.pending);
        let correlation_id = request.correlation_id;
        let endpoint = request.endpoint.clone();
        let worker = tokio::spawn(async move {
            let result = handler.handle(request).await;
            complete(&table, correlation_id, endpoint, result);
        });

        if let Some(mut entry) = self.pending.get_mut(&correlation_id) {
            entry.worker = Some(worker.abort_handle());
        } else {
            worker.abort();
        }
    }

    /// Disconnects `client`, atomically dropping its subscriptions and
    /// registrations and aborting invocations it was serving.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnknownClient`] if the client is not connected.
    pub fn disconnect(&self, client: ClientId) -> RouterResult<()> {
        let removed = self.registry.remove_client(client)?;
        let orphaned_ids: Vec<CorrelationId> = self
            .pending
            .iter()
            .filter(|entry| entry.value().invocation.involves(client))
            .map(|entry| *entry.key())
            .collect();
        let orphaned: Vec<PendingEntry> = orphaned_ids
            .iter()
            .filter_map(|id| self.pending.remove(id).map(|(_, entry)| entry))
            .collect();

        let aborted = orphaned.len();
        for entry in orphaned {
            let endpoint = entry.invocation.target().name().clone();
            let correlation_id = entry.invocation.correlation_id();
            entry.resolve(
                InvocationState::Aborted,
                Err(RouterError::InvocationAborted {
                    endpoint,
                    correlation_id,
                }),
            );
        }
        info!(
            client = %client,
            subscriptions = removed.subscriptions,
            services = removed.services.len(),
            endpoints = removed.endpoints.len(),
            aborted,
            "router client disconnected"
        );
        Ok(())
    }
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new(RouterOptions::default())
    }
}

fn complete(
    table: &PendingTable,
    correlation_id: CorrelationId,
    endpoint: EndpointName,
    result: HandlerResult,
) {
    let Some((_, mut entry)) = table.remove(&correlation_id) else {
        debug!(correlation_id = %correlation_id, "late response dropped");
        return;
    };
    // The handler task is finishing on its own; no abort needed.
    entry.worker = None;
    match result {
        Ok(payload) => entry.resolve(InvocationState::Completed, Ok(payload)),
        Err(err) => entry.resolve(
            InvocationState::Failed,
            Err(RouterError::HandlerFailed {
                endpoint,
                message: err.message().to_owned(),
            }),
        ),
    }
}
