//! Table of application instances observed through lifecycle events.

use crate::apps::domain::{
    AppId, AppInstance, InstanceId, InstanceLifecycle, LifetimeEvent, LifetimeEventKind,
};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

const STOPPED_CAPACITY: usize = 256;

/// Errors returned by the instance registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InstanceRegistryError {
    /// Registry state could not be accessed.
    #[error("instance registry unavailable: {0}")]
    StateUnavailable(String),
}

/// Result type for registry operations.
pub type InstanceRegistryResult<T> = Result<T, InstanceRegistryError>;

/// How a pending start resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The instance reached `Running`.
    Started,
    /// The instance stopped before it was running.
    Stopped,
}

#[derive(Default)]
struct RegistryState {
    instances: HashMap<InstanceId, AppInstance>,
    start_waiters: HashMap<InstanceId, oneshot::Sender<StartOutcome>>,
}

/// Running-instance table shared by the brokers.
///
/// The table only changes in response to [`LifetimeEvent`]s. Stop events are
/// re-broadcast so the brokers can release per-instance state.
pub struct InstanceRegistry {
    state: RwLock<RegistryState>,
    stopped: broadcast::Sender<InstanceId>,
}

impl InstanceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        let (stopped, _) = broadcast::channel(STOPPED_CAPACITY);
        Self {
            state: RwLock::new(RegistryState::default()),
            stopped,
        }
    }

    fn read_state(&self) -> InstanceRegistryResult<RwLockReadGuard<'_, RegistryState>> {
        self.state
            .read()
            .map_err(|err| InstanceRegistryError::StateUnavailable(err.to_string()))
    }

    fn write_state(&self) -> InstanceRegistryResult<RwLockWriteGuard<'_, RegistryState>> {
        self.state
            .write()
            .map_err(|err| InstanceRegistryError::StateUnavailable(err.to_string()))
    }

    /// Subscribes to instance-stopped notifications.
    #[must_use]
    pub fn subscribe_stopped(&self) -> broadcast::Receiver<InstanceId> {
        self.stopped.subscribe()
    }

    /// Registers interest in the start of `instance_id`.
    ///
    /// Must be called before the launch is requested so the `Started` event
    /// cannot be missed.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceRegistryError::StateUnavailable`] when state is
    /// poisoned.
    pub fn expect_start(
        &self,
        instance_id: InstanceId,
    ) -> InstanceRegistryResult<oneshot::Receiver<StartOutcome>> {
        let (sender, receiver) = oneshot::channel();
        self.write_state()?.start_waiters.insert(instance_id, sender);
        Ok(receiver)
    }

    /// Drops a start waiter that is no longer awaited.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceRegistryError::StateUnavailable`] when state is
    /// poisoned.
    pub fn forget_start(&self, instance_id: InstanceId) -> InstanceRegistryResult<()> {
        self.write_state()?.start_waiters.remove(&instance_id);
        Ok(())
    }

    /// Returns how many launches are still waiting for their instance to
    /// start.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceRegistryError::StateUnavailable`] when state is
    /// poisoned.
    pub fn pending_start_count(&self) -> InstanceRegistryResult<usize> {
        Ok(self.read_state()?.start_waiters.len())
    }

    /// Applies a lifecycle event to the table.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceRegistryError::StateUnavailable`] when state is
    /// poisoned.
    pub fn apply_event(&self, event: &LifetimeEvent) -> InstanceRegistryResult<()> {
        let instance_id = event.instance.instance_id;
        let mut state = self.write_state()?;
        match event.kind {
            LifetimeEventKind::Starting => {
                state.instances.entry(instance_id).or_insert_with(|| {
                    AppInstance::starting(instance_id, event.instance.app_id.clone())
                });
                debug!(instance_id = %instance_id, app_id = %event.instance.app_id, "instance starting");
            }
            LifetimeEventKind::Started => {
                let instance = state.instances.entry(instance_id).or_insert_with(|| {
                    AppInstance::starting(instance_id, event.instance.app_id.clone())
                });
                if let Err(err) = instance.transition_to(InstanceLifecycle::Running) {
                    warn!(instance_id = %instance_id, error = %err, "ignoring started event");
                }
                if let Some(waiter) = state.start_waiters.remove(&instance_id)
                    && waiter.send(StartOutcome::Started).is_err()
                {
                    debug!(instance_id = %instance_id, "start waiter gone");
                }
                info!(instance_id = %instance_id, app_id = %event.instance.app_id, "instance running");
            }
            LifetimeEventKind::Stopping => {
                debug!(instance_id = %instance_id, "instance stopping");
            }
            LifetimeEventKind::Stopped => {
                let removed = state.instances.remove(&instance_id);
                if let Some(waiter) = state.start_waiters.remove(&instance_id)
                    && waiter.send(StartOutcome::Stopped).is_err()
                {
                    debug!(instance_id = %instance_id, "start waiter gone");
                }
                drop(state);
                if removed.is_some() {
                    info!(instance_id = %instance_id, "instance stopped");
                    if self.stopped.send(instance_id).is_err() {
                        debug!(instance_id = %instance_id, "no instance-stopped subscribers");
                    }
                }
            }
        }
        Ok(())
    }

    /// Returns the tracked instance, if any.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceRegistryError::StateUnavailable`] when state is
    /// poisoned.
    pub fn instance(&self, instance_id: InstanceId) -> InstanceRegistryResult<Option<AppInstance>> {
        Ok(self.read_state()?.instances.get(&instance_id).cloned())
    }

    /// Returns the instance if it is running.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceRegistryError::StateUnavailable`] when state is
    /// poisoned.
    pub fn running(&self, instance_id: InstanceId) -> InstanceRegistryResult<Option<AppInstance>> {
        Ok(self
            .instance(instance_id)?
            .filter(|instance| instance.state() == InstanceLifecycle::Running))
    }

    /// Returns whether the instance is running.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceRegistryError::StateUnavailable`] when state is
    /// poisoned.
    pub fn is_running(&self, instance_id: InstanceId) -> InstanceRegistryResult<bool> {
        Ok(self.running(instance_id)?.is_some())
    }

    /// Lists running instances, ordered by instance id.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceRegistryError::StateUnavailable`] when state is
    /// poisoned.
    pub fn running_instances(&self) -> InstanceRegistryResult<Vec<AppInstance>> {
        let mut running: Vec<AppInstance> = self
            .read_state()?
            .instances
            .values()
            .filter(|instance| instance.state() == InstanceLifecycle::Running)
            .cloned()
            .collect();
        running.sort_by_key(AppInstance::instance_id);
        Ok(running)
    }

    /// Lists running instances of `app_id`.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceRegistryError::StateUnavailable`] when state is
    /// poisoned.
    pub fn instances_of(&self, app_id: &AppId) -> InstanceRegistryResult<Vec<AppInstance>> {
        Ok(self
            .running_instances()?
            .into_iter()
            .filter(|instance| instance.app_id() == app_id)
            .collect())
    }
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InstanceRegistry {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("InstanceRegistry")
            .finish_non_exhaustive()
    }
}
