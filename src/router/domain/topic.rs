//! Validated hierarchical names for topics and service endpoints.

use super::RouterError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Returns whether `value` is a well-formed `/`-separated hierarchical name.
///
/// Names must be non-empty, contain no whitespace, and contain no empty
/// segments (so no leading, trailing or doubled separators).
fn is_valid_hierarchical_name(value: &str) -> bool {
    !value.is_empty()
        && !value.chars().any(char::is_whitespace)
        && value.split('/').all(|segment| !segment.is_empty())
}

/// Pub/sub topic name, for example `interop/fdc3/v2.0/userChannels/red/broadcast`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Creates a validated topic name.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::InvalidTopic`] when the name is malformed.
    pub fn new(value: impl Into<String>) -> Result<Self, RouterError> {
        let value = value.into();
        if !is_valid_hierarchical_name(&value) {
            return Err(RouterError::InvalidTopic(value));
        }
        Ok(Self(value))
    }

    /// Returns the topic name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Name of a global service or per-client endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointName(String);

impl EndpointName {
    /// Creates a validated endpoint name.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::InvalidEndpoint`] when the name is malformed.
    pub fn new(value: impl Into<String>) -> Result<Self, RouterError> {
        let value = value.into();
        if !is_valid_hierarchical_name(&value) {
            return Err(RouterError::InvalidEndpoint(value));
        }
        Ok(Self(value))
    }

    /// Returns the endpoint name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for EndpointName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for EndpointName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
