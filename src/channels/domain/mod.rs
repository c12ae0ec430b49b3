//! Channel domain: identifiers, context payloads and the per-channel cache.

mod channel;
mod context;
mod error;
mod ids;

pub use channel::{
    Channel, ChannelItem, ChannelKind, ChannelRef, DisplayMetadata, default_user_channel_set,
};
pub use context::Context;
pub use error::ChannelDomainError;
pub use ids::{ChannelId, ContextListenerId};
