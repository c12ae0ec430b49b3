//! Error types for channel domain values.

use thiserror::Error;

/// Errors returned while constructing channel domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelDomainError {
    /// The channel identifier is empty after trimming.
    #[error("channel id must not be empty")]
    EmptyChannelId,

    /// The channel identifier contains whitespace or `/`.
    #[error("channel id '{0}' contains whitespace or '/'")]
    InvalidChannelId(String),

    /// The context is not an object with a non-empty string `type`.
    #[error("malformed context: {0}")]
    MalformedContext(String),
}
