//! Scripted Resolver UI for headless runs and tests.

use crate::apps::{
    domain::{AppId, AppMetadata},
    ports::{ResolverUi, ResolverUiError, ResolverUiResult},
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// How the scripted resolver answers app selections.
#[derive(Debug, Clone, Default)]
enum AppChoice {
    /// Pick the first candidate.
    #[default]
    First,
    /// Pick the first candidate for this app.
    Prefer(AppId),
    /// Dismiss the resolver.
    Cancel,
}

#[derive(Debug, Default)]
struct ResolverState {
    app_choice: AppChoice,
    intent_choice: Option<String>,
    app_requests: Vec<Vec<AppMetadata>>,
    intent_requests: Vec<Vec<String>>,
}

/// Resolver UI that answers without a human.
///
/// By default it picks the first candidate; it records every request so
/// callers can assert how often disambiguation happened.
#[derive(Debug, Clone, Default)]
pub struct InMemoryResolverUi {
    state: Arc<Mutex<ResolverState>>,
}

impl InMemoryResolverUi {
    /// Creates a resolver that picks the first candidate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver that prefers candidates of `app_id`.
    #[must_use]
    pub fn preferring(app_id: AppId) -> Self {
        let resolver = Self::default();
        if let Ok(mut state) = resolver.state.lock() {
            state.app_choice = AppChoice::Prefer(app_id);
        }
        resolver
    }

    /// Creates a resolver whose user always cancels.
    #[must_use]
    pub fn cancelling() -> Self {
        let resolver = Self::default();
        if let Ok(mut state) = resolver.state.lock() {
            state.app_choice = AppChoice::Cancel;
        }
        resolver
    }

    /// Makes intent selections pick `intent` when offered.
    #[must_use]
    pub fn with_intent_choice(self, intent: impl Into<String>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.intent_choice = Some(intent.into());
        }
        self
    }

    /// Returns how many app selections were requested.
    #[must_use]
    pub fn app_requests(&self) -> usize {
        self.state.lock().map_or(0, |state| state.app_requests.len())
    }

    /// Returns how many intent selections were requested.
    #[must_use]
    pub fn intent_requests(&self) -> usize {
        self.state.lock().map_or(0, |state| state.intent_requests.len())
    }
}

fn unavailable(err: impl std::fmt::Display) -> ResolverUiError {
    ResolverUiError::Unavailable(err.to_string())
}

#[async_trait]
impl ResolverUi for InMemoryResolverUi {
    async fn select_app(&self, candidates: Vec<AppMetadata>) -> ResolverUiResult<AppMetadata> {
        let mut state = self.state.lock().map_err(unavailable)?;
        state.app_requests.push(candidates.clone());
        let choice = match &state.app_choice {
            AppChoice::First => candidates.into_iter().next(),
            AppChoice::Prefer(app_id) => {
                let preferred = candidates
                    .iter()
                    .position(|candidate| &candidate.app_id == app_id)
                    .unwrap_or_default();
                candidates.into_iter().nth(preferred)
            }
            AppChoice::Cancel => None,
        };
        choice.ok_or(ResolverUiError::Cancelled)
    }

    async fn select_intent(&self, intents: Vec<String>) -> ResolverUiResult<String> {
        let mut state = self.state.lock().map_err(unavailable)?;
        state.intent_requests.push(intents.clone());
        if matches!(state.app_choice, AppChoice::Cancel) {
            return Err(ResolverUiError::Cancelled);
        }
        let choice = match &state.intent_choice {
            Some(wanted) if intents.contains(wanted) => Some(wanted.clone()),
            _ => intents.into_iter().next(),
        };
        choice.ok_or(ResolverUiError::Cancelled)
    }
}
