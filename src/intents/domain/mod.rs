//! Intent domain: listener bookkeeping, raised intents and their results.

mod error;
mod ids;
mod listener;
mod matching;
mod raised;

pub use error::IntentDomainError;
pub use ids::MessageId;
pub use listener::{IntentListenerAction, IntentListenerTable};
pub use matching::{IntentQuery, app_intents};
pub use raised::{
    IntentResolution, IntentResult, IntentResultKey, RaiseIntentMessage, RaisedIntent,
};
