//! Channel broker service.

pub mod broker;

pub use broker::{ChannelBroker, ChannelError, ChannelResult, ContextSubscription};
