//! Error types for the message router.

use super::{ClientId, CorrelationId, EndpointName, InvocationState, SubscriptionId};
use thiserror::Error;

/// Errors surfaced by router operations and invocations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouterError {
    /// The topic name is malformed.
    #[error("invalid topic name: {0:?}")]
    InvalidTopic(String),

    /// The endpoint or service name is malformed.
    #[error("invalid endpoint name: {0:?}")]
    InvalidEndpoint(String),

    /// The client is not (or no longer) connected.
    #[error("unknown client: {0}")]
    UnknownClient(ClientId),

    /// The subscription handle does not belong to the client.
    #[error("unknown subscription: {0}")]
    UnknownSubscription(SubscriptionId),

    /// No service or scoped endpoint matches the invocation target.
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// A global service with this name is already registered.
    #[error("service name already registered: {0}")]
    DuplicateServiceName(EndpointName),

    /// The client already registered an endpoint with this name.
    #[error("endpoint {name} already registered by client {client}")]
    DuplicateEndpoint {
        /// Endpoint name.
        name: EndpointName,
        /// Owning client.
        client: ClientId,
    },

    /// No response arrived before the invocation deadline.
    #[error("invocation {correlation_id} of {endpoint} timed out")]
    InvocationTimeout {
        /// Invoked endpoint.
        endpoint: EndpointName,
        /// Correlation of the abandoned invocation.
        correlation_id: CorrelationId,
    },

    /// The invocation was abandoned because the handling client went away.
    #[error("invocation {correlation_id} of {endpoint} was aborted")]
    InvocationAborted {
        /// Invoked endpoint.
        endpoint: EndpointName,
        /// Correlation of the aborted invocation.
        correlation_id: CorrelationId,
    },

    /// The handler answered with an error.
    #[error("handler for {endpoint} failed: {message}")]
    HandlerFailed {
        /// Invoked endpoint.
        endpoint: EndpointName,
        /// Handler-supplied failure message.
        message: String,
    },

    /// An invocation record was moved along an illegal edge.
    #[error("invalid invocation transition from {from} to {to}")]
    InvalidInvocationTransition {
        /// Current state.
        from: InvocationState,
        /// Requested state.
        to: InvocationState,
    },

    /// Shared router state could not be accessed.
    #[error("router state unavailable: {0}")]
    StateUnavailable(String),
}

impl RouterError {
    /// Builds a [`RouterError::StateUnavailable`] from a lock poisoning error.
    pub fn poisoned(err: impl std::fmt::Display) -> Self {
        Self::StateUnavailable(err.to_string())
    }
}

/// Result type for router operations.
pub type RouterResult<T> = Result<T, RouterError>;
