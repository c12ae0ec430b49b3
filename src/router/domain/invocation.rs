//! Invocation targets and the pending-invocation lifecycle.

use super::{ClientId, CorrelationId, EndpointName, RouterError};
use std::fmt;
use tokio::time::Instant;

/// Where an invocation is routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationTarget {
    /// A global service, resolved by name.
    Service(EndpointName),
    /// An endpoint registered by one specific client.
    Endpoint {
        /// Endpoint name.
        name: EndpointName,
        /// Client that registered the endpoint.
        client: ClientId,
    },
}

impl InvocationTarget {
    /// Targets a global service.
    #[must_use]
    pub const fn service(name: EndpointName) -> Self {
        Self::Service(name)
    }

    /// Targets an endpoint owned by `client`.
    #[must_use]
    pub const fn scoped(name: EndpointName, client: ClientId) -> Self {
        Self::Endpoint { name, client }
    }

    /// Returns the endpoint name regardless of scope.
    #[must_use]
    pub const fn name(&self) -> &EndpointName {
        match self {
            Self::Service(name) | Self::Endpoint { name, .. } => name,
        }
    }
}

impl fmt::Display for InvocationTarget {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service(name) => write!(formatter, "{name}"),
            Self::Endpoint { name, client } => write!(formatter, "{name}@{client}"),
        }
    }
}

/// Lifecycle of a pending invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvocationState {
    /// Awaiting the handler's response.
    Pending,
    /// The handler responded successfully.
    Completed,
    /// The handler responded with an error.
    Failed,
    /// The deadline passed first.
    TimedOut,
    /// The handling client disconnected first.
    Aborted,
}

impl InvocationState {
    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Aborted => "aborted",
        }
    }

    /// Returns whether no further transitions are allowed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns whether `self -> target` is a legal edge.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(self, Self::Pending) && target.is_terminal()
    }
}

impl fmt::Display for InvocationState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Bookkeeping for one in-flight invocation.
///
/// A record resolves exactly once; the router drops it as soon as it reaches a
/// terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInvocation {
    correlation_id: CorrelationId,
    caller: ClientId,
    handler_owner: Option<ClientId>,
    target: InvocationTarget,
    deadline: Instant,
    state: InvocationState,
}

impl PendingInvocation {
    /// Creates a pending record.
    #[must_use]
    pub const fn new(
        correlation_id: CorrelationId,
        caller: ClientId,
        handler_owner: Option<ClientId>,
        target: InvocationTarget,
        deadline: Instant,
    ) -> Self {
        Self {
            correlation_id,
            caller,
            handler_owner,
            target,
            deadline,
            state: InvocationState::Pending,
        }
    }

    /// Returns the correlation identifier.
    #[must_use]
    pub const fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    /// Returns the invoking client.
    #[must_use]
    pub const fn caller(&self) -> ClientId {
        self.caller
    }

    /// Returns the client whose handler serves this invocation, if any.
    #[must_use]
    pub const fn handler_owner(&self) -> Option<ClientId> {
        self.handler_owner
    }

    /// Returns the invocation target.
    #[must_use]
    pub const fn target(&self) -> &InvocationTarget {
        &self.target
    }

    /// Returns the response deadline.
    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> InvocationState {
        self.state
    }

    /// Returns whether `client` is the caller or the handling client.
    #[must_use]
    pub fn involves(&self, client: ClientId) -> bool {
        self.caller == client || self.handler_owner == Some(client)
    }

    /// Moves the record to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::InvalidInvocationTransition`] when the record
    /// already resolved.
    pub fn transition(&mut self, target: InvocationState) -> Result<(), RouterError> {
        if !self.state.can_transition_to(target) {
            return Err(RouterError::InvalidInvocationTransition {
                from: self.state,
                to: target,
            });
        }
        self.state = target;
        Ok(())
    }
}
