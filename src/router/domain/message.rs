//! Messages carried by the router.

use super::{ClientId, CorrelationId, EndpointName, SubscriptionId, Topic};
use serde_json::Value;

/// A published message as delivered to one subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicMessage {
    /// Subscription the message is delivered for.
    pub subscription: SubscriptionId,
    /// Topic the message was published on.
    pub topic: Topic,
    /// Message payload; `None` is a null payload.
    pub payload: Option<Value>,
    /// Publishing client.
    pub source: ClientId,
}

/// Request handed to a service or endpoint handler.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    /// Correlation of the request and its response.
    pub correlation_id: CorrelationId,
    /// Invoking client.
    pub caller: ClientId,
    /// Endpoint being invoked.
    pub endpoint: EndpointName,
    /// Request payload; `None` is a null payload.
    pub payload: Option<Value>,
}
