//! Closure-backed [`ServiceHandler`] implementation.

use crate::router::domain::InvocationRequest;
use crate::router::ports::{HandlerResult, ServiceHandler};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Adapts an async closure into a [`ServiceHandler`].
pub struct FnHandler<F> {
    handler: F,
}

impl<F> FnHandler<F> {
    /// Wraps `handler`.
    #[must_use]
    pub const fn new(handler: F) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<F, Fut> ServiceHandler for FnHandler<F>
where
    F: Fn(InvocationRequest) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    async fn handle(&self, request: InvocationRequest) -> HandlerResult {
        (self.handler)(request).await
    }
}

/// Boxes an async closure as a shareable handler.
#[must_use]
pub fn handler_fn<F, Fut>(handler: F) -> Arc<dyn ServiceHandler>
where
    F: Fn(InvocationRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(FnHandler::new(handler))
}
