//! Error types for application domain values.

use thiserror::Error;

/// Errors returned while constructing app domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AppDomainError {
    /// The app identifier is empty after trimming.
    #[error("app id must not be empty")]
    EmptyAppId,

    /// The instance identifier is not a UUID.
    #[error("instance id '{0}' is not a valid UUID")]
    MalformedInstanceId(String),

    /// Transitioning between two instance lifecycle states is invalid.
    #[error("invalid instance lifecycle transition: {from} -> {to}")]
    InvalidLifecycleTransition {
        /// Current lifecycle state.
        from: String,
        /// Requested target lifecycle state.
        to: String,
    },
}

/// Error returned while parsing an instance lifecycle state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown instance lifecycle state: {0}")]
pub struct ParseInstanceLifecycleError(pub String);
