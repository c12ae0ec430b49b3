//! Wire-level error codes and the mapping from service errors.

use crate::agent::services::{AgentError, OpenError};
use crate::apps::ports::AppDirectoryError;
use crate::apps::services::AppLaunchError;
use crate::channels::{ChannelDomainError, ChannelError};
use crate::intents::ResolveError;
use crate::router::RouterError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure reported in the `error` field of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// The request carried no payload.
    PayloadNull,
    /// A required identifier is absent or unknown.
    MissingId,
    /// An identifier could not be parsed.
    IdNotParsable,
    /// No app can handle the request.
    NoAppsFound,
    /// The channel does not exist.
    NoChannelFound,
    /// The caller may not perform the operation.
    AccessDenied,
    /// A channel could not be created.
    CreationFailed,
    /// The context listener does not exist.
    ListenerNotFound,
    /// The app is not in the directory.
    AppNotFound,
    /// The target did not become ready in time.
    AppTimeout,
    /// The intent or its result could not be delivered.
    IntentDeliveryFailed,
    /// The targeted app is unavailable.
    TargetAppUnavailable,
    /// The targeted instance is unavailable.
    TargetInstanceUnavailable,
    /// No service or endpoint matches the invocation.
    UnknownEndpoint,
    /// A service with this name is already registered.
    DuplicateServiceName,
    /// An invocation received no response in time.
    InvocationTimeout,
    /// An invocation was abandoned.
    InvocationAborted,
    /// The resolver could not be used.
    ResolverUnavailable,
    /// The resolver did not answer in time.
    ResolverTimeout,
    /// The user dismissed the resolver.
    UserCancelledResolution,
    /// No user channels are configured.
    NoUserChannelSetFound,
    /// The app failed to launch.
    ErrorOnLaunch,
    /// No opened context is stored under the id.
    OpenedAppContextNotFound,
    /// The context has no usable `type`.
    MalformedContext,
    /// The agent could not access its own state.
    AgentUnavailable,
}

impl ErrorCode {
    /// Returns the wire name of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PayloadNull => "PayloadNull",
            Self::MissingId => "MissingId",
            Self::IdNotParsable => "IdNotParsable",
            Self::NoAppsFound => "NoAppsFound",
            Self::NoChannelFound => "NoChannelFound",
            Self::AccessDenied => "AccessDenied",
            Self::CreationFailed => "CreationFailed",
            Self::ListenerNotFound => "ListenerNotFound",
            Self::AppNotFound => "AppNotFound",
            Self::AppTimeout => "AppTimeout",
            Self::IntentDeliveryFailed => "IntentDeliveryFailed",
            Self::TargetAppUnavailable => "TargetAppUnavailable",
            Self::TargetInstanceUnavailable => "TargetInstanceUnavailable",
            Self::UnknownEndpoint => "UnknownEndpoint",
            Self::DuplicateServiceName => "DuplicateServiceName",
            Self::InvocationTimeout => "InvocationTimeout",
            Self::InvocationAborted => "InvocationAborted",
            Self::ResolverUnavailable => "ResolverUnavailable",
            Self::ResolverTimeout => "ResolverTimeout",
            Self::UserCancelledResolution => "UserCancelledResolution",
            Self::NoUserChannelSetFound => "NoUserChannelSetFound",
            Self::ErrorOnLaunch => "ErrorOnLaunch",
            Self::OpenedAppContextNotFound => "OpenedAppContextNotFound",
            Self::MalformedContext => "MalformedContext",
            Self::AgentUnavailable => "AgentUnavailable",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl From<&RouterError> for ErrorCode {
    fn from(err: &RouterError) -> Self {
        match err {
            RouterError::InvalidTopic(_) => Self::IdNotParsable,
            RouterError::InvalidEndpoint(_)
            | RouterError::UnknownClient(_)
            | RouterError::UnknownEndpoint(_) => Self::UnknownEndpoint,
            RouterError::UnknownSubscription(_) => Self::ListenerNotFound,
            RouterError::DuplicateServiceName(_) | RouterError::DuplicateEndpoint { .. } => {
                Self::DuplicateServiceName
            }
            RouterError::InvocationTimeout { .. } => Self::InvocationTimeout,
            RouterError::InvocationAborted { .. } => Self::InvocationAborted,
            RouterError::HandlerFailed { .. }
            | RouterError::InvalidInvocationTransition { .. }
            | RouterError::StateUnavailable(_) => Self::AgentUnavailable,
        }
    }
}

impl From<&ChannelError> for ErrorCode {
    fn from(err: &ChannelError) -> Self {
        match err {
            ChannelError::NoChannelFound { .. }
            | ChannelError::Domain(ChannelDomainError::InvalidChannelId(_)) => Self::NoChannelFound,
            ChannelError::AccessDenied { .. } => Self::AccessDenied,
            ChannelError::CreationFailed(_) => Self::CreationFailed,
            ChannelError::ListenerNotFound(_) => Self::ListenerNotFound,
            ChannelError::NoUserChannelSetFound => Self::NoUserChannelSetFound,
            ChannelError::ListenerWaitTimedOut { .. } => Self::AppTimeout,
            ChannelError::Domain(ChannelDomainError::EmptyChannelId) => Self::MissingId,
            ChannelError::Domain(ChannelDomainError::MalformedContext(_)) => Self::MalformedContext,
            ChannelError::Router(router) => router.into(),
            ChannelError::Registry(_) | ChannelError::StateUnavailable(_) => Self::AgentUnavailable,
        }
    }
}

fn launch_code(err: &AppLaunchError) -> ErrorCode {
    match err {
        AppLaunchError::Timeout { .. } => ErrorCode::AppTimeout,
        AppLaunchError::Loader(_) | AppLaunchError::StoppedBeforeStart(_) => ErrorCode::ErrorOnLaunch,
        AppLaunchError::Registry(_) => ErrorCode::AgentUnavailable,
    }
}

impl From<&ResolveError> for ErrorCode {
    fn from(err: &ResolveError) -> Self {
        match err {
            ResolveError::NoAppsFound(_) => Self::NoAppsFound,
            ResolveError::TargetAppUnavailable(_)
            | ResolveError::Directory(AppDirectoryError::AppNotFound(_)) => {
                Self::TargetAppUnavailable
            }
            ResolveError::TargetInstanceUnavailable(_) => Self::TargetInstanceUnavailable,
            ResolveError::AppTimeout { .. } => Self::AppTimeout,
            ResolveError::ResolverUnavailable(_) => Self::ResolverUnavailable,
            ResolveError::ResolverTimeout(_) => Self::ResolverTimeout,
            ResolveError::UserCancelledResolution => Self::UserCancelledResolution,
            ResolveError::MissingId(_) => Self::MissingId,
            ResolveError::IntentDeliveryFailed(_) | ResolveError::Router(_) => {
                Self::IntentDeliveryFailed
            }
            ResolveError::Launch(launch) => launch_code(launch),
            ResolveError::Directory(_)
            | ResolveError::Registry(_)
            | ResolveError::StateUnavailable(_) => Self::AgentUnavailable,
        }
    }
}

impl From<&OpenError> for ErrorCode {
    fn from(err: &OpenError) -> Self {
        match err {
            OpenError::AppNotFound(_) => Self::AppNotFound,
            OpenError::AppTimeout { .. } => Self::AppTimeout,
            OpenError::Launch(launch) => launch_code(launch),
            OpenError::Channel(channel) => channel.into(),
            OpenError::IdNotParsable(_) => Self::IdNotParsable,
            OpenError::OpenedAppContextNotFound(_) => Self::OpenedAppContextNotFound,
            OpenError::Directory(_) | OpenError::StateUnavailable(_) => Self::AgentUnavailable,
        }
    }
}

impl From<&AgentError> for ErrorCode {
    fn from(err: &AgentError) -> Self {
        match err {
            AgentError::PayloadNull => Self::PayloadNull,
            AgentError::MissingId(_)
            | AgentError::MalformedRequest(_)
            | AgentError::UnknownInstance(_) => Self::MissingId,
            AgentError::IdNotParsable(_) => Self::IdNotParsable,
            AgentError::NoAppsFound(_) => Self::NoAppsFound,
            AgentError::TargetAppUnavailable(_) => Self::TargetAppUnavailable,
            AgentError::TargetInstanceUnavailable(_) => Self::TargetInstanceUnavailable,
            AgentError::Open(open) => open.into(),
            AgentError::Channel(channel) => channel.into(),
            AgentError::Resolve(resolve) => resolve.into(),
            AgentError::Router(router) => router.into(),
            AgentError::Directory(_) | AgentError::Registry(_) => Self::AgentUnavailable,
        }
    }
}
