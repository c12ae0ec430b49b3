//! App Directory backed by a JSON file on disk.

use crate::apps::{
    domain::{AppId, Fdc3App},
    ports::{AppDirectory, AppDirectoryError, AppDirectoryResult},
};
use async_trait::async_trait;
use camino::Utf8Path;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Accepted file layouts: a bare array, or an appD `/v2/apps` listing.
#[derive(Deserialize)]
#[serde(untagged)]
enum DirectoryDocument {
    Listing { applications: Vec<Fdc3App> },
    Apps(Vec<Fdc3App>),
}

/// App Directory loaded once from a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileAppDirectory {
    apps: Arc<Vec<Fdc3App>>,
}

impl JsonFileAppDirectory {
    /// Reads and parses the directory file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`AppDirectoryError::Unavailable`] when the file cannot be read
    /// or is not a valid directory document.
    pub fn load(path: &Utf8Path) -> AppDirectoryResult<Self> {
        let contents = crate::fs_utils::read_to_string(path).map_err(AppDirectoryError::unavailable)?;
        let document: DirectoryDocument =
            serde_json::from_str(&contents).map_err(AppDirectoryError::unavailable)?;
        let apps = match document {
            DirectoryDocument::Listing { applications } => applications,
            DirectoryDocument::Apps(apps) => apps,
        };
        info!(path = %path, apps = apps.len(), "app directory loaded");
        Ok(Self {
            apps: Arc::new(apps),
        })
    }
}

#[async_trait]
impl AppDirectory for JsonFileAppDirectory {
    async fn applications(&self) -> AppDirectoryResult<Vec<Fdc3App>> {
        Ok(self.apps.as_ref().clone())
    }

    async fn application(&self, app_id: &AppId) -> AppDirectoryResult<Fdc3App> {
        self.apps
            .iter()
            .find(|app| &app.app_id == app_id)
            .cloned()
            .ok_or_else(|| AppDirectoryError::AppNotFound(app_id.clone()))
    }
}
