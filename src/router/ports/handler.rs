//! Port implemented by service and endpoint handlers.

use crate::router::domain::InvocationRequest;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Failure reported by a handler in place of a response payload.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Creates a handler error carrying `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result produced by a handler; `Ok(None)` is a null response payload.
pub type HandlerResult = Result<Option<Value>, HandlerError>;

/// Serves invocations for a registered service or endpoint.
///
/// The router runs each invocation on its own task, so a slow handler never
/// blocks other traffic. A handler whose owning client disconnects is aborted
/// at its next suspension point.
#[async_trait]
pub trait ServiceHandler: Send + Sync {
    /// Handles one invocation.
    async fn handle(&self, request: InvocationRequest) -> HandlerResult;
}
