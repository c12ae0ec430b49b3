//! Channels: named scopes for sharing context between running instances.
//!
//! User channels are a fixed configured set that instances join and leave.
//! App channels are created on first use by id. Private channels are
//! unlisted and shared by their creator and one peer. Every channel keeps
//! the last context broadcast per context type and replays it to new
//! listeners.

pub mod domain;
pub mod services;

pub use domain::{
    Channel, ChannelDomainError, ChannelId, ChannelItem, ChannelKind, ChannelRef, Context,
    ContextListenerId, DisplayMetadata, default_user_channel_set,
};
pub use services::{ChannelBroker, ChannelError, ChannelResult, ContextSubscription};

#[cfg(test)]
mod tests;
