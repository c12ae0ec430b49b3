//! The FDC3 operations the agent serves, one router service each.

use crate::apps::domain::FDC3_TOPIC_ROOT;
use std::fmt;

/// An operation exposed to app clients over the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fdc3Operation {
    /// Look up a user or app channel.
    FindChannel,
    /// Get or create an app channel.
    CreateAppChannel,
    /// Create a private channel.
    CreatePrivateChannel,
    /// Join a private channel as its second party.
    ConnectPrivateChannel,
    /// List the user channels.
    GetUserChannels,
    /// Join a user channel.
    JoinUserChannel,
    /// Report the caller's user channel.
    GetCurrentChannel,
    /// Leave the caller's user channel.
    LeaveCurrentChannel,
    /// Read a channel's cached context.
    GetCurrentContext,
    /// Broadcast a context on a channel.
    Broadcast,
    /// Register a context listener.
    AddContextListener,
    /// Remove a context listener.
    RemoveContextListener,
    /// Find the handlers of an intent.
    FindIntent,
    /// Find the intents that accept a context.
    FindIntentsByContext,
    /// Raise an intent.
    RaiseIntent,
    /// Raise whichever intent handles a context.
    RaiseIntentForContext,
    /// Subscribe or unsubscribe an intent listener.
    AddIntentListener,
    /// Store the result of a handled intent.
    StoreIntentResult,
    /// Collect the result of a raised intent.
    GetIntentResult,
    /// Describe the agent.
    GetInfo,
    /// List the running instances of an app.
    FindInstances,
    /// Describe an app or instance.
    GetAppMetadata,
    /// Launch an app.
    Open,
    /// Collect the context an instance was opened with.
    GetOpenedAppContext,
}

impl Fdc3Operation {
    /// Every operation, in registration order.
    pub const ALL: [Self; 24] = [
        Self::FindChannel,
        Self::CreateAppChannel,
        Self::CreatePrivateChannel,
        Self::ConnectPrivateChannel,
        Self::GetUserChannels,
        Self::JoinUserChannel,
        Self::GetCurrentChannel,
        Self::LeaveCurrentChannel,
        Self::GetCurrentContext,
        Self::Broadcast,
        Self::AddContextListener,
        Self::RemoveContextListener,
        Self::FindIntent,
        Self::FindIntentsByContext,
        Self::RaiseIntent,
        Self::RaiseIntentForContext,
        Self::AddIntentListener,
        Self::StoreIntentResult,
        Self::GetIntentResult,
        Self::GetInfo,
        Self::FindInstances,
        Self::GetAppMetadata,
        Self::Open,
        Self::GetOpenedAppContext,
    ];

    /// Returns the operation's name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::FindChannel => "findChannel",
            Self::CreateAppChannel => "createAppChannel",
            Self::CreatePrivateChannel => "createPrivateChannel",
            Self::ConnectPrivateChannel => "connectPrivateChannel",
            Self::GetUserChannels => "getUserChannels",
            Self::JoinUserChannel => "joinUserChannel",
            Self::GetCurrentChannel => "getCurrentChannel",
            Self::LeaveCurrentChannel => "leaveCurrentChannel",
            Self::GetCurrentContext => "getCurrentContext",
            Self::Broadcast => "broadcast",
            Self::AddContextListener => "addContextListener",
            Self::RemoveContextListener => "removeContextListener",
            Self::FindIntent => "findIntent",
            Self::FindIntentsByContext => "findIntentsByContext",
            Self::RaiseIntent => "raiseIntent",
            Self::RaiseIntentForContext => "raiseIntentForContext",
            Self::AddIntentListener => "addIntentListener",
            Self::StoreIntentResult => "storeIntentResult",
            Self::GetIntentResult => "getIntentResult",
            Self::GetInfo => "getInfo",
            Self::FindInstances => "findInstances",
            Self::GetAppMetadata => "getAppMetadata",
            Self::Open => "open",
            Self::GetOpenedAppContext => "getOpenedAppContext",
        }
    }

    /// Returns the router service name the operation is registered under.
    #[must_use]
    pub fn service_name(self) -> String {
        format!("{FDC3_TOPIC_ROOT}/{}", self.name())
    }
}

impl fmt::Display for Fdc3Operation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.name())
    }
}
