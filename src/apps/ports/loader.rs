//! Module Loader port: starts and stops application instances.

use crate::apps::domain::{AppId, InstanceId, LifetimeEvent, ModuleInstance};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

/// Result type for Module Loader operations.
pub type ModuleLoaderResult<T> = Result<T, ModuleLoaderError>;

/// Request to launch one instance of an application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    /// Application to launch.
    pub app_id: AppId,
    /// FDC3 instance id the new instance must use.
    pub instance_id: InstanceId,
    /// Additional startup parameters.
    pub parameters: BTreeMap<String, String>,
}

impl StartRequest {
    /// Creates a request with a fresh instance id and no parameters.
    #[must_use]
    pub fn new(app_id: AppId) -> Self {
        Self {
            app_id,
            instance_id: InstanceId::new(),
            parameters: BTreeMap::new(),
        }
    }

    /// Adds a startup parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// Launches application instances and reports their lifecycle.
///
/// `start_module` returns once the launch has been accepted; the instance is
/// usable after the matching `Started` event appears on the event stream.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Requests a new instance.
    async fn start_module(&self, request: StartRequest) -> ModuleLoaderResult<ModuleInstance>;

    /// Requests that an instance stop.
    async fn stop_module(&self, instance_id: InstanceId) -> ModuleLoaderResult<()>;

    /// Subscribes to lifecycle events.
    fn lifetime_events(&self) -> broadcast::Receiver<LifetimeEvent>;
}

/// Errors returned by Module Loader adapters.
#[derive(Debug, Clone, Error)]
pub enum ModuleLoaderError {
    /// The loader has no module for this application.
    #[error("no module registered for app {0}")]
    UnknownApp(AppId),

    /// The instance is not known to the loader.
    #[error("unknown module instance: {0}")]
    UnknownInstance(InstanceId),

    /// Generic launch or shutdown failure.
    #[error("module loader runtime error: {0}")]
    Runtime(Arc<dyn std::error::Error + Send + Sync>),
}

impl ModuleLoaderError {
    /// Wraps a runtime error from the loader adapter.
    pub fn runtime(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Runtime(Arc::new(err))
    }
}
