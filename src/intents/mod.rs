//! Intents: resolving raised intents to a handling app or instance.
//!
//! The broker matches App Directory declarations and running instances
//! against an intent, context type and result type. Ambiguous raises go to
//! the Resolver UI. Delivered intents are tracked until the handler stores a
//! result and the raising app reads it.

pub mod config;
pub mod domain;
pub mod services;

pub use config::IntentOptions;
pub use domain::{
    IntentListenerAction, IntentResolution, IntentResult, IntentResultKey, MessageId,
    RaiseIntentMessage,
};
pub use services::{
    IntentBroker, RaiseForContextRequest, RaiseIntentRequest, ResolveError, ResolveResult,
    raise_intent_topic,
};

#[cfg(test)]
mod tests;
