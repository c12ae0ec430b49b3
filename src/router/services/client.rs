//! Per-client handle onto the router.

use super::router::MessageRouter;
use crate::router::domain::{
    ClientId, EndpointName, InvocationTarget, RouterResult, SubscriptionId, TopicMessage,
};
use crate::router::ports::ServiceHandler;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// A connected client: its identity plus its inbound message queue.
///
/// Every call is attributed to this client. Dropping the handle without
/// calling [`RouterClient::disconnect`] leaves its registrations in place
/// until the router is dropped.
pub struct RouterClient {
    id: ClientId,
    router: Arc<MessageRouter>,
    inbox: mpsc::Receiver<TopicMessage>,
}

impl RouterClient {
    pub(super) const fn new(
        id: ClientId,
        router: Arc<MessageRouter>,
        inbox: mpsc::Receiver<TopicMessage>,
    ) -> Self {
        Self { id, router, inbox }
    }

    /// Returns this client's identifier.
    #[must_use]
    pub const fn id(&self) -> ClientId {
        self.id
    }

    /// Returns the router this client is connected to.
    #[must_use]
    pub const fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    /// Subscribes to `topic`.
    ///
    /// # Errors
    ///
    /// See [`MessageRouter::subscribe`].
    pub fn subscribe(&self, topic: &str) -> RouterResult<SubscriptionId> {
        self.router.subscribe(self.id, topic)
    }

    /// Cancels a subscription.
    ///
    /// # Errors
    ///
    /// See [`MessageRouter::unsubscribe`].
    pub fn unsubscribe(&self, subscription: SubscriptionId) -> RouterResult<()> {
        self.router.unsubscribe(self.id, subscription)
    }

    /// Publishes on `topic`.
    ///
    /// # Errors
    ///
    /// See [`MessageRouter::publish`].
    pub fn publish(&self, topic: &str, payload: Option<Value>) -> RouterResult<usize> {
        self.router.publish(self.id, topic, payload)
    }

    /// Registers a global service.
    ///
    /// # Errors
    ///
    /// See [`MessageRouter::register_service`].
    pub fn register_service(&self, name: &str, handler: Arc<dyn ServiceHandler>) -> RouterResult<()> {
        self.router.register_service(self.id, name, handler)
    }

    /// Registers a global service with its own invocation deadline.
    ///
    /// # Errors
    ///
    /// See [`MessageRouter::register_service_with_timeout`].
    pub fn register_service_with_timeout(
        &self,
        name: &str,
        handler: Arc<dyn ServiceHandler>,
        timeout: Duration,
    ) -> RouterResult<()> {
        self.router
            .register_service_with_timeout(self.id, name, handler, timeout)
    }

    /// Unregisters a global service this client owns.
    ///
    /// # Errors
    ///
    /// See [`MessageRouter::unregister_service`].
    pub fn unregister_service(&self, name: &str) -> RouterResult<()> {
        self.router.unregister_service(self.id, name)
    }

    /// Registers an endpoint scoped to this client.
    ///
    /// # Errors
    ///
    /// See [`MessageRouter::register_endpoint`].
    pub fn register_endpoint(
        &self,
        name: &str,
        handler: Arc<dyn ServiceHandler>,
    ) -> RouterResult<()> {
        self.router.register_endpoint(self.id, name, handler)
    }

    /// Unregisters an endpoint scoped to this client.
    ///
    /// # Errors
    ///
    /// See [`MessageRouter::unregister_endpoint`].
    pub fn unregister_endpoint(&self, name: &str) -> RouterResult<()> {
        self.router.unregister_endpoint(self.id, name)
    }

    /// Invokes a global service.
    ///
    /// # Errors
    ///
    /// See [`MessageRouter::invoke_with_timeout`].
    pub async fn invoke(&self, name: &str, payload: Option<Value>) -> RouterResult<Option<Value>> {
        let target = InvocationTarget::service(EndpointName::new(name)?);
        self.router.invoke(self.id, target, payload).await
    }

    /// Invokes an endpoint registered by `scope`.
    ///
    /// # Errors
    ///
    /// See [`MessageRouter::invoke_with_timeout`].
    pub async fn invoke_scoped(
        &self,
        name: &str,
        scope: ClientId,
        payload: Option<Value>,
    ) -> RouterResult<Option<Value>> {
        let target = InvocationTarget::scoped(EndpointName::new(name)?, scope);
        self.router.invoke(self.id, target, payload).await
    }

    /// Invokes a global service with an explicit deadline.
    ///
    /// # Errors
    ///
    /// See [`MessageRouter::invoke_with_timeout`].
    pub async fn invoke_with_timeout(
        &self,
        name: &str,
        payload: Option<Value>,
        timeout: Duration,
    ) -> RouterResult<Option<Value>> {
        let target = InvocationTarget::service(EndpointName::new(name)?);
        self.router
            .invoke_with_timeout(self.id, target, payload, timeout)
            .await
    }

    /// Waits for the next published message.
    ///
    /// Returns `None` once the client has been disconnected and its queue is
    /// drained.
    pub async fn recv(&mut self) -> Option<TopicMessage> {
        self.inbox.recv().await
    }

    /// Returns a queued message without waiting.
    pub fn try_recv(&mut self) -> Option<TopicMessage> {
        self.inbox.try_recv().ok()
    }

    /// Disconnects the client, releasing everything it registered.
    ///
    /// # Errors
    ///
    /// See [`MessageRouter::disconnect`].
    pub fn disconnect(self) -> RouterResult<()> {
        self.router.disconnect(self.id)
    }
}

impl std::fmt::Debug for RouterClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RouterClient")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
