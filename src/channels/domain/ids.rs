//! Channel and listener identifiers.

use super::ChannelDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a channel, unique within its [`ChannelKind`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelId(pub(super) String);

impl ChannelId {
    /// Creates a validated channel identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelDomainError::EmptyChannelId`] for blank values and
    /// [`ChannelDomainError::InvalidChannelId`] for values that cannot be
    /// embedded in a topic name.
    pub fn new(value: impl Into<String>) -> Result<Self, ChannelDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ChannelDomainError::EmptyChannelId);
        }
        if trimmed.contains('/') || trimmed.chars().any(char::is_whitespace) {
            return Err(ChannelDomainError::InvalidChannelId(raw));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Creates a fresh identifier for a private channel.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ChannelId {
    type Error = ChannelDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ChannelId> for String {
    fn from(value: ChannelId) -> Self {
        value.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Identifier of a registered context listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextListenerId(Uuid);

impl ContextListenerId {
    /// Creates a new random listener identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a listener identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ContextListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextListenerId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}
