//! Starts application instances and tracks their lifecycle.

use super::registry::{InstanceRegistry, InstanceRegistryError, StartOutcome};
use crate::apps::domain::{AppId, InstanceId, ModuleInstance, STARTUP_PARAM_INSTANCE_ID};
use crate::apps::ports::{ModuleLoader, ModuleLoaderError, StartRequest};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Errors returned while launching an application.
#[derive(Debug, Clone, Error)]
pub enum AppLaunchError {
    /// The loader refused or failed the launch.
    #[error(transparent)]
    Loader(#[from] ModuleLoaderError),

    /// Instance bookkeeping failed.
    #[error(transparent)]
    Registry(#[from] InstanceRegistryError),

    /// The instance did not reach `Running` in time.
    #[error("app {app_id} did not start within {timeout:?}")]
    Timeout {
        /// Application being launched.
        app_id: AppId,
        /// Configured start timeout.
        timeout: Duration,
    },

    /// The instance stopped before it was running.
    #[error("instance {0} stopped before it started")]
    StoppedBeforeStart(InstanceId),
}

/// Result type for launch operations.
pub type AppLaunchResult<T> = Result<T, AppLaunchError>;

/// Withdraws a start waiter when `start_app` finishes or is cancelled.
struct StartWaiterGuard<'a> {
    registry: &'a InstanceRegistry,
    instance_id: InstanceId,
}

impl Drop for StartWaiterGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.registry.forget_start(self.instance_id) {
            error!(instance_id = %self.instance_id, error = %err, "failed to withdraw start waiter");
        }
    }
}

/// Launches instances through a [`ModuleLoader`] and feeds its lifecycle
/// events into an [`InstanceRegistry`].
///
/// Dropping the launcher stops the event pump.
pub struct AppLauncher<L>
where
    L: ModuleLoader,
{
    loader: Arc<L>,
    registry: Arc<InstanceRegistry>,
    start_timeout: Duration,
    pump: JoinHandle<()>,
}

impl<L> AppLauncher<L>
where
    L: ModuleLoader + 'static,
{
    /// Creates a launcher and starts pumping lifecycle events.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn spawn(loader: Arc<L>, registry: Arc<InstanceRegistry>, start_timeout: Duration) -> Self {
        let mut events = loader.lifetime_events();
        let sink = Arc::clone(&registry);
        let pump = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if let Err(err) = sink.apply_event(&event) {
                            error!(error = %err, "failed to apply lifetime event");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "lifetime event stream lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        Self {
            loader,
            registry,
            start_timeout,
            pump,
        }
    }

    /// Returns the registry this launcher feeds.
    #[must_use]
    pub const fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.registry
    }

    /// Returns the underlying loader.
    #[must_use]
    pub const fn loader(&self) -> &Arc<L> {
        &self.loader
    }

    /// Starts a new instance of `app_id` and waits until it is running.
    ///
    /// Dropping the returned future withdraws the wait; a later `Started`
    /// event for the instance only updates the registry.
    ///
    /// # Errors
    ///
    /// Returns [`AppLaunchError::Loader`] if the loader rejects the launch,
    /// [`AppLaunchError::Timeout`] if no `Started` event arrives within the
    /// start timeout and [`AppLaunchError::StoppedBeforeStart`] if the
    /// instance stops first.
    pub async fn start_app(
        &self,
        app_id: &AppId,
        parameters: BTreeMap<String, String>,
    ) -> AppLaunchResult<ModuleInstance> {
        let mut request = StartRequest::new(app_id.clone());
        let instance_id = request.instance_id;
        request.parameters = parameters;
        request
            .parameters
            .insert(STARTUP_PARAM_INSTANCE_ID.to_owned(), instance_id.to_string());
        let started = self.registry.expect_start(instance_id)?;
        let _waiter = StartWaiterGuard {
            registry: &self.registry,
            instance_id,
        };

        let instance = match self.loader.start_module(request).await {
            Ok(instance) => instance,
            Err(err) => {
                error!(app_id = %app_id, error = %err, "module loader failed to start app");
                return Err(err.into());
            }
        };

        match tokio::time::timeout(self.start_timeout, started).await {
            Ok(Ok(StartOutcome::Started)) => {
                info!(app_id = %app_id, instance_id = %instance_id, "app started");
                Ok(instance)
            }
            Ok(Ok(StartOutcome::Stopped) | Err(_)) => {
                Err(AppLaunchError::StoppedBeforeStart(instance_id))
            }
            Err(_) => {
                warn!(app_id = %app_id, instance_id = %instance_id, "app start timed out");
                Err(AppLaunchError::Timeout {
                    app_id: app_id.clone(),
                    timeout: self.start_timeout,
                })
            }
        }
    }

    /// Asks the loader to stop an instance.
    ///
    /// # Errors
    ///
    /// Returns [`AppLaunchError::Loader`] when the loader fails.
    pub async fn stop_app(&self, instance_id: InstanceId) -> AppLaunchResult<()> {
        self.loader.stop_module(instance_id).await?;
        Ok(())
    }
}

impl<L> Drop for AppLauncher<L>
where
    L: ModuleLoader,
{
    fn drop(&mut self) {
        self.pump.abort();
    }
}

impl<L> std::fmt::Debug for AppLauncher<L>
where
    L: ModuleLoader,
{
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("AppLauncher")
            .field("start_timeout", &self.start_timeout)
            .finish_non_exhaustive()
    }
}
