//! Resolver UI port: asks a human to choose among ambiguous candidates.

use crate::apps::domain::AppMetadata;
use async_trait::async_trait;
use thiserror::Error;

/// Result type for Resolver UI round-trips.
pub type ResolverUiResult<T> = Result<T, ResolverUiError>;

/// Human-in-the-loop disambiguation of apps and intents.
#[async_trait]
pub trait ResolverUi: Send + Sync {
    /// Asks the user to pick one of `candidates`.
    async fn select_app(&self, candidates: Vec<AppMetadata>) -> ResolverUiResult<AppMetadata>;

    /// Asks the user to pick one of `intents`.
    async fn select_intent(&self, intents: Vec<String>) -> ResolverUiResult<String>;
}

/// Errors returned by Resolver UI adapters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolverUiError {
    /// The user dismissed the resolver without choosing.
    #[error("user cancelled the resolution")]
    Cancelled,

    /// No resolver could be reached.
    #[error("resolver UI unavailable: {0}")]
    Unavailable(String),
}
