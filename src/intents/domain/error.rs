//! Error types for intent domain values.

use crate::apps::domain::InstanceId;
use thiserror::Error;

use super::MessageId;

/// Errors returned by intent domain operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IntentDomainError {
    /// The intent name is empty after trimming.
    #[error("intent name must not be empty")]
    EmptyIntentName,

    /// The instance never subscribed a listener for the intent.
    #[error("instance {instance_id} never listened for intent '{intent}'")]
    NeverSubscribed {
        /// Instance that asked to unsubscribe.
        instance_id: InstanceId,
        /// Intent named in the request.
        intent: String,
    },

    /// A result was already stored for the raised intent.
    #[error("a result was already stored for message {0}")]
    ResultAlreadyStored(MessageId),

    /// The message id is not a valid UUID.
    #[error("malformed message id: {0}")]
    MalformedMessageId(String),
}
