//! The FDC3 wire protocol spoken over the router.
//!
//! Each [`Fdc3Operation`] is a router service under `interop/fdc3/v2.0/`.
//! Requests are JSON objects carrying a `messageId` that every
//! [`Fdc3Response`] echoes; failures are reported as an [`ErrorCode`].

mod error_code;
mod messages;
mod operation;

pub use error_code::ErrorCode;
pub use messages::{
    AddContextListenerRequest, AppQueryRequest, BroadcastRequest, ChannelRequest,
    FindChannelRequest, FindIntentRequest, FindIntentsByContextRequest, Fdc3Response,
    GetCurrentContextRequest, GetIntentResultRequest, GetOpenedAppContextRequest,
    InstanceRequest, IntentListenerRequest, MESSAGE_ID_FIELD, OpenRequest,
    RaiseIntentForContextRequest, RaiseIntentRequest, RemoveContextListenerRequest,
    StoreIntentResultRequest,
};
pub use operation::Fdc3Operation;

use crate::apps::domain::{FDC3_TOPIC_ROOT, InstanceId};

/// Returns the topic that contexts for `instance_id`'s router-registered
/// listeners are published on.
///
/// Each message carries `listenerId` and `context`. Subscribe before adding
/// a listener so the replayed context is not missed.
#[must_use]
pub fn context_listener_topic(instance_id: InstanceId) -> String {
    format!("{FDC3_TOPIC_ROOT}/instances/{instance_id}/contexts")
}
