//! JSON request bodies and the response envelope.
//!
//! Identifiers arrive as optional strings so that an absent id and a
//! malformed one can be reported with different codes.

use super::ErrorCode;
use crate::apps::domain::AppIdentifier;
use crate::channels::ChannelKind;
use crate::intents::{IntentListenerAction, IntentResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field carrying the request correlation id, echoed in every response.
pub const MESSAGE_ID_FIELD: &str = "messageId";

/// Body naming only the calling instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRequest {
    /// Calling instance.
    pub instance_id: Option<String>,
}

/// Body of `findChannel`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindChannelRequest {
    /// Channel to find.
    pub channel_id: Option<String>,
    /// Kind of channel; user when absent.
    pub channel_type: Option<ChannelKind>,
}

/// Body naming a caller and a channel id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRequest {
    /// Calling instance.
    pub instance_id: Option<String>,
    /// Channel to act on.
    pub channel_id: Option<String>,
}

/// Body of `getCurrentContext`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetCurrentContextRequest {
    /// Channel to read.
    pub channel_id: Option<String>,
    /// Kind of channel; user when absent.
    pub channel_type: Option<ChannelKind>,
    /// Context type to read; the latest of any type when absent.
    pub context_type: Option<String>,
}

/// Body of `broadcast`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRequest {
    /// Broadcasting instance.
    pub instance_id: Option<String>,
    /// Channel to broadcast on.
    pub channel_id: Option<String>,
    /// Kind of channel; user when absent.
    pub channel_type: Option<ChannelKind>,
    /// Context to broadcast.
    pub context: Option<Value>,
}

/// Body of `addContextListener`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddContextListenerRequest {
    /// Listening instance.
    pub instance_id: Option<String>,
    /// Channel to bind to; follows the current user channel when absent.
    pub channel_id: Option<String>,
    /// Kind of the bound channel; user when absent.
    pub channel_type: Option<ChannelKind>,
    /// Context type filter.
    pub context_type: Option<String>,
}

/// Body of `removeContextListener`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveContextListenerRequest {
    /// Listener to remove.
    pub listener_id: Option<String>,
}

/// Body of `findIntent`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindIntentRequest {
    /// Intent to find.
    pub intent: Option<String>,
    /// Context type filter.
    pub context_type: Option<String>,
    /// Result type filter.
    pub result_type: Option<String>,
}

/// Body of `findIntentsByContext`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindIntentsByContextRequest {
    /// Context whose type is matched.
    pub context: Option<Value>,
    /// Result type filter.
    pub result_type: Option<String>,
}

/// Body of `raiseIntent`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaiseIntentRequest {
    /// Raising instance.
    pub instance_id: Option<String>,
    /// Intent to raise.
    pub intent: Option<String>,
    /// Context to raise it with.
    pub context: Option<Value>,
    /// Explicit target.
    pub app: Option<AppIdentifier>,
}

/// Body of `raiseIntentForContext`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaiseIntentForContextRequest {
    /// Raising instance.
    pub instance_id: Option<String>,
    /// Context to raise.
    pub context: Option<Value>,
    /// Explicit target.
    pub app: Option<AppIdentifier>,
}

/// Body of `addIntentListener`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentListenerRequest {
    /// Listening instance.
    pub instance_id: Option<String>,
    /// Intent listened for.
    pub intent: Option<String>,
    /// Whether to subscribe or unsubscribe.
    pub state: Option<IntentListenerAction>,
}

/// Body of `storeIntentResult`.
///
/// `messageId` is the id returned by the raise, so it is both the raised
/// intent's key and the echoed correlation id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreIntentResultRequest {
    /// Raised intent the result belongs to.
    pub message_id: Option<String>,
    /// Intent that was handled.
    pub intent: Option<String>,
    /// Instance that raised the intent.
    pub origin_instance_id: Option<String>,
    /// Instance that handled the intent.
    pub target_instance_id: Option<String>,
    /// Handler result.
    pub result: Option<IntentResult>,
}

/// Body of `getIntentResult`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetIntentResultRequest {
    /// Raised intent to collect the result of.
    pub message_id: Option<String>,
    /// Intent that was raised.
    pub intent: Option<String>,
    /// Instance the intent was delivered to.
    pub target_app_identifier: Option<AppIdentifier>,
}

/// Body of `findInstances` and `getAppMetadata`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppQueryRequest {
    /// Calling instance.
    pub instance_id: Option<String>,
    /// App or instance asked about.
    pub app_identifier: Option<AppIdentifier>,
}

/// Body of `open`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenRequest {
    /// Opening instance, if the request comes from one.
    pub instance_id: Option<String>,
    /// App to launch.
    pub app_identifier: Option<AppIdentifier>,
    /// Context handed to the new instance.
    pub context: Option<Value>,
}

/// Body of `getOpenedAppContext`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetOpenedAppContextRequest {
    /// Id from the `OpenedAppContextId` startup parameter.
    pub context_id: Option<String>,
}

/// Response envelope shared by every operation.
///
/// Success fields sit at the top level next to `messageId`; a failure
/// carries only `error`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fdc3Response {
    /// Echo of the request's `messageId`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<Value>,
    /// Failure code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
    /// Operation-specific fields.
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Fdc3Response {
    /// Builds a success response; a non-object body is placed under
    /// `result`.
    #[must_use]
    pub fn success(message_id: Option<Value>, body: Value) -> Self {
        let fields = match body {
            Value::Object(fields) => fields,
            Value::Null => Map::new(),
            other => Map::from_iter([("result".to_owned(), other)]),
        };
        Self {
            message_id,
            error: None,
            body: fields,
        }
    }

    /// Builds a failure response.
    #[must_use]
    pub fn failure(message_id: Option<Value>, code: ErrorCode) -> Self {
        Self {
            message_id,
            error: Some(code),
            body: Map::new(),
        }
    }

    /// Returns the response as a JSON object.
    #[must_use]
    pub fn into_value(self) -> Value {
        let mut fields = self.body;
        if let Some(message_id) = self.message_id {
            fields.insert(MESSAGE_ID_FIELD.to_owned(), message_id);
        }
        if let Some(code) = self.error {
            fields.insert("error".to_owned(), Value::String(code.as_str().to_owned()));
        }
        Value::Object(fields)
    }

    /// Returns a success field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }
}
