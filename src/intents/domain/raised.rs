//! Raised intents, their delivery message and the results handlers store.

use super::{IntentDomainError, MessageId};
use crate::apps::domain::{AppIdentifier, InstanceId};
use crate::channels::domain::{ChannelItem, Context};
use serde::{Deserialize, Serialize};

/// What an intent handler produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IntentResult {
    /// A context payload.
    Context(Context),
    /// A channel the origin can use.
    Channel(ChannelItem),
    /// The handler finished without a value.
    Void,
    /// The handler failed with this message.
    Error(String),
}

/// Returned to the app that raised an intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentResolution {
    /// Correlates a later result request.
    pub message_id: MessageId,
    /// Intent that was raised.
    pub intent: String,
    /// Instance the intent was delivered to.
    pub source: AppIdentifier,
}

/// Published to the target instance to hand it a raised intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaiseIntentMessage {
    /// Correlates the result the handler stores.
    pub message_id: MessageId,
    /// Intent being raised.
    pub intent: String,
    /// Context the intent was raised with.
    pub context: Context,
    /// Instance that raised the intent.
    pub origin_instance_id: InstanceId,
    /// App that raised the intent, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originating_app: Option<AppIdentifier>,
}

/// Identifies a stored result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentResultKey {
    /// Message id handed out with the resolution.
    pub message_id: MessageId,
    /// Intent that was raised.
    pub intent: String,
    /// Instance that raised the intent.
    pub origin: InstanceId,
    /// Instance that handled the intent.
    pub target: InstanceId,
}

/// A raised intent awaiting, or holding, its result.
#[derive(Debug, Clone)]
pub struct RaisedIntent {
    key: IntentResultKey,
    context: Context,
    result: Option<IntentResult>,
}

impl RaisedIntent {
    /// Records an intent delivered to `key.target`.
    #[must_use]
    pub const fn new(key: IntentResultKey, context: Context) -> Self {
        Self {
            key,
            context,
            result: None,
        }
    }

    /// Returns the correlating key.
    #[must_use]
    pub const fn key(&self) -> &IntentResultKey {
        &self.key
    }

    /// Returns the context the intent was raised with.
    #[must_use]
    pub const fn context(&self) -> &Context {
        &self.context
    }

    /// Returns whether the record belongs to `instance_id` as origin or
    /// target.
    #[must_use]
    pub fn involves(&self, instance_id: InstanceId) -> bool {
        self.key.origin == instance_id || self.key.target == instance_id
    }

    /// Returns whether a result is waiting to be read.
    #[must_use]
    pub const fn has_result(&self) -> bool {
        self.result.is_some()
    }

    /// Stores the handler's result.
    ///
    /// # Errors
    ///
    /// Returns [`IntentDomainError::ResultAlreadyStored`] if a result is
    /// already held.
    pub fn store(&mut self, result: IntentResult) -> Result<(), IntentDomainError> {
        if self.result.is_some() {
            return Err(IntentDomainError::ResultAlreadyStored(self.key.message_id));
        }
        self.result = Some(result);
        Ok(())
    }

    /// Removes and returns the stored result.
    pub const fn take_result(&mut self) -> Option<IntentResult> {
        self.result.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn raised() -> RaisedIntent {
        let context = Context::new(json!({ "type": "fdc3.instrument" })).expect("valid context");
        RaisedIntent::new(
            IntentResultKey {
                message_id: MessageId::new(),
                intent: "ViewChart".to_owned(),
                origin: InstanceId::new(),
                target: InstanceId::new(),
            },
            context,
        )
    }

    #[rstest]
    fn result_is_stored_once_and_taken_once() {
        let mut record = raised();

        record.store(IntentResult::Void).expect("first store");
        assert!(matches!(
            record.store(IntentResult::Void),
            Err(IntentDomainError::ResultAlreadyStored(_))
        ));
        assert_eq!(record.take_result(), Some(IntentResult::Void));
        assert_eq!(record.take_result(), None);
    }

    #[rstest]
    fn record_involves_origin_and_target_only() {
        let record = raised();

        assert!(record.involves(record.key().origin));
        assert!(record.involves(record.key().target));
        assert!(!record.involves(InstanceId::new()));
    }
}
