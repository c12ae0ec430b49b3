//! Domain model for the message router.

mod error;
mod ids;
mod invocation;
mod message;
mod topic;

pub use error::{RouterError, RouterResult};
pub use ids::{ClientId, CorrelationId, SubscriptionId};
pub use invocation::{InvocationState, InvocationTarget, PendingInvocation};
pub use message::{InvocationRequest, TopicMessage};
pub use topic::{EndpointName, Topic};
