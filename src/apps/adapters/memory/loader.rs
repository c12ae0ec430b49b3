//! In-memory Module Loader that simulates instance lifecycles.

use crate::apps::{
    domain::{AppId, InstanceId, LifetimeEvent, LifetimeEventKind, ModuleInstance},
    ports::{ModuleLoader, ModuleLoaderError, ModuleLoaderResult, StartRequest},
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use tokio::sync::broadcast;
use tracing::debug;

const EVENT_CAPACITY: usize = 256;

/// In-memory module loader.
///
/// Instances "start" immediately: `Starting` and `Started` events are emitted
/// from within `start_module`. Apps marked with [`stall_app`] only ever
/// reach `Starting`, and apps marked with [`reject_app`] fail to launch.
///
/// [`stall_app`]: InMemoryModuleLoader::stall_app
/// [`reject_app`]: InMemoryModuleLoader::reject_app
#[derive(Debug, Clone)]
pub struct InMemoryModuleLoader {
    state: Arc<RwLock<LoaderState>>,
    events: broadcast::Sender<LifetimeEvent>,
}

#[derive(Debug, Default)]
struct LoaderState {
    instances: HashMap<InstanceId, ModuleInstance>,
    stalled: HashSet<AppId>,
    rejected: HashSet<AppId>,
    start_requests: Vec<StartRequest>,
}

impl InMemoryModuleLoader {
    /// Creates a loader with no instances.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(RwLock::new(LoaderState::default())),
            events,
        }
    }

    fn write_state(&self) -> ModuleLoaderResult<RwLockWriteGuard<'_, LoaderState>> {
        self.state
            .write()
            .map_err(|err| ModuleLoaderError::runtime(std::io::Error::other(err.to_string())))
    }

    fn emit(&self, kind: LifetimeEventKind, instance: &ModuleInstance) {
        let event = LifetimeEvent::new(kind, instance.clone());
        if self.events.send(event).is_err() {
            debug!(instance_id = %instance.instance_id, "no lifetime event subscribers");
        }
    }

    /// Makes future launches of `app_id` never reach `Started`.
    ///
    /// # Errors
    ///
    /// Returns loader runtime errors when lock acquisition fails.
    pub fn stall_app(&self, app_id: AppId) -> ModuleLoaderResult<()> {
        self.write_state()?.stalled.insert(app_id);
        Ok(())
    }

    /// Makes future launches of `app_id` fail.
    ///
    /// # Errors
    ///
    /// Returns loader runtime errors when lock acquisition fails.
    pub fn reject_app(&self, app_id: AppId) -> ModuleLoaderResult<()> {
        self.write_state()?.rejected.insert(app_id);
        Ok(())
    }

    /// Returns every start request received so far, oldest first.
    ///
    /// # Errors
    ///
    /// Returns loader runtime errors when lock acquisition fails.
    pub fn start_requests(&self) -> ModuleLoaderResult<Vec<StartRequest>> {
        Ok(self.write_state()?.start_requests.clone())
    }

    /// Returns the instances that have not been stopped.
    ///
    /// # Errors
    ///
    /// Returns loader runtime errors when lock acquisition fails.
    pub fn instances(&self) -> ModuleLoaderResult<Vec<ModuleInstance>> {
        Ok(self.write_state()?.instances.values().cloned().collect())
    }
}

impl Default for InMemoryModuleLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModuleLoader for InMemoryModuleLoader {
    async fn start_module(&self, request: StartRequest) -> ModuleLoaderResult<ModuleInstance> {
        let (instance, stalled) = {
            let mut state = self.write_state()?;
            state.start_requests.push(request.clone());
            if state.rejected.contains(&request.app_id) {
                return Err(ModuleLoaderError::UnknownApp(request.app_id));
            }
            let instance = ModuleInstance {
                instance_id: request.instance_id,
                app_id: request.app_id.clone(),
                parameters: request.parameters,
            };
            state.instances.insert(instance.instance_id, instance.clone());
            (instance, state.stalled.contains(&request.app_id))
        };

        self.emit(LifetimeEventKind::Starting, &instance);
        if !stalled {
            self.emit(LifetimeEventKind::Started, &instance);
        }
        Ok(instance)
    }

    async fn stop_module(&self, instance_id: InstanceId) -> ModuleLoaderResult<()> {
        let instance = self
            .write_state()?
            .instances
            .remove(&instance_id)
            .ok_or(ModuleLoaderError::UnknownInstance(instance_id))?;
        self.emit(LifetimeEventKind::Stopping, &instance);
        self.emit(LifetimeEventKind::Stopped, &instance);
        Ok(())
    }

    fn lifetime_events(&self) -> broadcast::Receiver<LifetimeEvent> {
        self.events.subscribe()
    }
}
