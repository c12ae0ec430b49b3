//! App Directory port: the static catalogue of application manifests.

use crate::apps::domain::{AppId, Fdc3App, IntentDeclaration};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for App Directory operations.
pub type AppDirectoryResult<T> = Result<T, AppDirectoryError>;

/// Read-only access to application manifests.
#[async_trait]
pub trait AppDirectory: Send + Sync {
    /// Returns every known application.
    async fn applications(&self) -> AppDirectoryResult<Vec<Fdc3App>>;

    /// Returns one application by identifier.
    async fn application(&self, app_id: &AppId) -> AppDirectoryResult<Fdc3App> {
        self.applications()
            .await?
            .into_iter()
            .find(|app| &app.app_id == app_id)
            .ok_or_else(|| AppDirectoryError::AppNotFound(app_id.clone()))
    }

    /// Returns the intents an application declares it handles.
    async fn intents_for_app(
        &self,
        app_id: &AppId,
    ) -> AppDirectoryResult<Vec<(String, IntentDeclaration)>> {
        let app = self.application(app_id).await?;
        Ok(app.interop.intents.listens_for.into_iter().collect())
    }
}

/// Errors returned by App Directory adapters.
#[derive(Debug, Clone, Error)]
pub enum AppDirectoryError {
    /// No application has this identifier.
    #[error("app not found: {0}")]
    AppNotFound(AppId),

    /// The directory source could not be read or parsed.
    #[error("app directory unavailable: {0}")]
    Unavailable(Arc<dyn std::error::Error + Send + Sync>),
}

impl AppDirectoryError {
    /// Wraps a read or parse failure from the adapter.
    pub fn unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unavailable(Arc::new(err))
    }
}
