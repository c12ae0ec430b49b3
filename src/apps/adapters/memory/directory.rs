//! In-memory App Directory.

use crate::apps::{
    domain::{AppId, Fdc3App},
    ports::{AppDirectory, AppDirectoryError, AppDirectoryResult},
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory App Directory, ordered by app id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAppDirectory {
    state: Arc<RwLock<BTreeMap<AppId, Fdc3App>>>,
}

impl InMemoryAppDirectory {
    /// Creates a directory holding `apps`; later duplicates replace earlier
    /// ones.
    #[must_use]
    pub fn new(apps: impl IntoIterator<Item = Fdc3App>) -> Self {
        let entries = apps
            .into_iter()
            .map(|app| (app.app_id.clone(), app))
            .collect();
        Self {
            state: Arc::new(RwLock::new(entries)),
        }
    }

    /// Adds or replaces a manifest.
    ///
    /// # Errors
    ///
    /// Returns [`AppDirectoryError::Unavailable`] when lock acquisition fails.
    pub fn insert(&self, app: Fdc3App) -> AppDirectoryResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|err| AppDirectoryError::unavailable(std::io::Error::other(err.to_string())))?;
        state.insert(app.app_id.clone(), app);
        Ok(())
    }
}

#[async_trait]
impl AppDirectory for InMemoryAppDirectory {
    async fn applications(&self) -> AppDirectoryResult<Vec<Fdc3App>> {
        let state = self
            .state
            .read()
            .map_err(|err| AppDirectoryError::unavailable(std::io::Error::other(err.to_string())))?;
        Ok(state.values().cloned().collect())
    }

    async fn application(&self, app_id: &AppId) -> AppDirectoryResult<Fdc3App> {
        let state = self
            .state
            .read()
            .map_err(|err| AppDirectoryError::unavailable(std::io::Error::other(err.to_string())))?;
        state
            .get(app_id)
            .cloned()
            .ok_or_else(|| AppDirectoryError::AppNotFound(app_id.clone()))
    }
}
