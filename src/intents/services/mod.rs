//! Intent broker service.

pub mod broker;

pub use broker::{
    IntentBroker, RaiseForContextRequest, RaiseIntentRequest, ResolveError, ResolveResult,
    raise_intent_topic,
};
