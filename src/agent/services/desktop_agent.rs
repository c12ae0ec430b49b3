//! The desktop agent façade: owns the brokers, launches apps for `open` and
//! answers app management queries.

use crate::agent::config::DesktopAgentOptions;
use crate::agent::domain::{
    ImplementationMetadata, MalformedOpenedContextId, OpenedContextId, OpenedContextStore,
};
use crate::apps::domain::{
    AppId, AppIdentifier, AppMetadata, Fdc3App, InstanceId, STARTUP_PARAM_OPENED_CONTEXT_ID,
};
use crate::apps::ports::{AppDirectory, AppDirectoryError, ModuleLoader, ResolverUi};
use crate::apps::services::{AppLaunchError, AppLauncher, InstanceRegistry, InstanceRegistryError};
use crate::channels::{ChannelBroker, ChannelError, Context};
use crate::intents::{IntentBroker, ResolveError};
use crate::router::{ClientId, MessageRouter, RouterError};
use mockable::Clock;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Errors returned by `open` and opened-context retrieval.
#[derive(Debug, Clone, Error)]
pub enum OpenError {
    /// The app is not in the directory.
    #[error("app {0} not found")]
    AppNotFound(AppId),

    /// The opened instance never listened for the supplied context.
    #[error("instance {instance_id} registered no context listener within {timeout:?}")]
    AppTimeout {
        /// Launched instance.
        instance_id: InstanceId,
        /// How long the agent waited.
        timeout: Duration,
    },

    /// The module loader failed to start the app.
    #[error(transparent)]
    Launch(#[from] AppLaunchError),

    /// The App Directory could not be read.
    #[error(transparent)]
    Directory(#[from] AppDirectoryError),

    /// Waiting for the context listener failed.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// The opened context id is not a UUID.
    #[error("opened app context id '{0}' cannot be parsed")]
    IdNotParsable(String),

    /// No live context is stored under the id.
    #[error("opened app context {0} not found")]
    OpenedAppContextNotFound(OpenedContextId),

    /// Agent state could not be accessed.
    #[error("desktop agent state unavailable: {0}")]
    StateUnavailable(String),
}

/// Result type for `open` operations.
pub type OpenResult<T> = Result<T, OpenError>;

/// Errors returned by the façade's remaining operations and its router
/// adapter.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    /// The request carried no payload.
    #[error("request payload is null")]
    PayloadNull,

    /// A required identifier is absent.
    #[error("missing id: {0}")]
    MissingId(String),

    /// An identifier is present but malformed.
    #[error("id not parsable: {0}")]
    IdNotParsable(String),

    /// The request body does not have the expected shape.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// The calling instance is not running.
    #[error("instance {0} is not running")]
    UnknownInstance(InstanceId),

    /// The app is not in the directory.
    #[error("no apps found for {0}")]
    NoAppsFound(AppId),

    /// The targeted app is not in the directory.
    #[error("target app {0} is unavailable")]
    TargetAppUnavailable(AppId),

    /// The targeted instance is not running.
    #[error("target instance {0} is unavailable")]
    TargetInstanceUnavailable(InstanceId),

    /// Opening an app failed.
    #[error(transparent)]
    Open(#[from] OpenError),

    /// A channel operation failed.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// An intent operation failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The router rejected an operation.
    #[error(transparent)]
    Router(#[from] RouterError),

    /// The App Directory could not be read.
    #[error(transparent)]
    Directory(#[from] AppDirectoryError),

    /// Instance lookups failed.
    #[error(transparent)]
    Registry(#[from] InstanceRegistryError),
}

/// Result type for façade operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Discards the context stashed by `open` unless the open succeeds.
struct StashGuard<'a> {
    opened: &'a Mutex<OpenedContextStore>,
    id: Option<OpenedContextId>,
}

impl StashGuard<'_> {
    /// Keeps the stashed context for the opened instance to collect.
    const fn release(&mut self) {
        self.id = None;
    }
}

impl Drop for StashGuard<'_> {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        match self.opened.lock() {
            Ok(mut store) => {
                store.discard(id);
                debug!(context_id = %id, "opened context discarded");
            }
            Err(err) => error!(context_id = %id, error = %err, "failed to discard opened context"),
        }
    }
}

/// The FDC3 desktop agent.
///
/// Owns the instance registry, the launcher and both brokers. A background
/// task releases broker state whenever an instance stops; it is stopped when
/// the agent is dropped.
pub struct DesktopAgent<D, L, U, C>
where
    D: AppDirectory,
    L: ModuleLoader,
    U: ResolverUi,
    C: Clock + Send + Sync,
{
    options: DesktopAgentOptions,
    router: Arc<MessageRouter>,
    client_id: ClientId,
    directory: Arc<D>,
    launcher: Arc<AppLauncher<L>>,
    channels: Arc<ChannelBroker>,
    intents: Arc<IntentBroker<D, L, U>>,
    opened: Mutex<OpenedContextStore>,
    clock: Arc<C>,
    cleanup: JoinHandle<()>,
}

impl<D, L, U, C> DesktopAgent<D, L, U, C>
where
    D: AppDirectory + 'static,
    L: ModuleLoader + 'static,
    U: ResolverUi + 'static,
    C: Clock + Send + Sync,
{
    /// Connects the agent to `router` and wires its collaborators.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        router: Arc<MessageRouter>,
        directory: Arc<D>,
        loader: Arc<L>,
        resolver: Arc<U>,
        clock: Arc<C>,
        options: DesktopAgentOptions,
    ) -> Self {
        // The agent only publishes and serves; it never reads its own inbox.
        let client_id = router.connect().id();
        let registry = Arc::new(InstanceRegistry::new());
        let stopped = registry.subscribe_stopped();
        let launcher = Arc::new(AppLauncher::spawn(
            loader,
            Arc::clone(&registry),
            options.app_start_timeout,
        ));
        let channels = Arc::new(ChannelBroker::new(
            Arc::clone(&router),
            client_id,
            registry,
            options.user_channels(),
        ));
        let intents = Arc::new(IntentBroker::new(
            Arc::clone(&directory),
            Arc::clone(&launcher),
            resolver,
            Arc::clone(&router),
            client_id,
            options.intent_options(),
        ));
        let cleanup = spawn_cleanup(stopped, Arc::clone(&channels), Arc::clone(&intents));
        info!(client = %client_id, "desktop agent started");
        Self {
            opened: Mutex::new(OpenedContextStore::new(options.opened_app_context_ttl)),
            options,
            router,
            client_id,
            directory,
            launcher,
            channels,
            intents,
            clock,
            cleanup,
        }
    }

    /// Returns the agent configuration.
    #[must_use]
    pub const fn options(&self) -> &DesktopAgentOptions {
        &self.options
    }

    /// Returns the router the agent is connected to.
    #[must_use]
    pub const fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    /// Returns the agent's own router client id.
    #[must_use]
    pub const fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Returns the launcher.
    #[must_use]
    pub const fn launcher(&self) -> &Arc<AppLauncher<L>> {
        &self.launcher
    }

    /// Returns the running-instance registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        self.launcher.registry()
    }

    /// Returns the channel broker.
    #[must_use]
    pub const fn channels(&self) -> &Arc<ChannelBroker> {
        &self.channels
    }

    /// Returns the intent broker.
    #[must_use]
    pub const fn intents(&self) -> &Arc<IntentBroker<D, L, U>> {
        &self.intents
    }

    fn lock_opened(&self) -> OpenResult<MutexGuard<'_, OpenedContextStore>> {
        self.opened
            .lock()
            .map_err(|err| OpenError::StateUnavailable(err.to_string()))
    }

    fn stash_context(&self, context: Context) -> OpenResult<OpenedContextId> {
        let now = self.clock.utc();
        Ok(self.lock_opened()?.stash(context, now))
    }

    /// Starts a new instance of `app`, handing it `context` if given.
    ///
    /// The context is stashed under an id passed to the instance as the
    /// `OpenedAppContextId` startup parameter. With a context the call
    /// returns once the instance listens for its type. If the open fails or
    /// its future is dropped first, the stashed context is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`OpenError::AppNotFound`] for an unknown app,
    /// [`OpenError::Launch`] when the launch fails and
    /// [`OpenError::AppTimeout`] when the instance never listens for the
    /// context.
    pub async fn open(
        &self,
        app: &AppIdentifier,
        context: Option<Context>,
    ) -> OpenResult<AppIdentifier> {
        let manifest = match self.directory.application(&app.app_id).await {
            Ok(manifest) => manifest,
            Err(AppDirectoryError::AppNotFound(app_id)) => return Err(OpenError::AppNotFound(app_id)),
            Err(err) => return Err(err.into()),
        };
        if let Some(instance_id) = app.instance_id {
            debug!(app_id = %app.app_id, instance_id = %instance_id, "open ignores the requested instance");
        }

        let context_type = context
            .as_ref()
            .map(|opened| opened.context_type().to_owned());
        let stashed = context
            .map(|opened| self.stash_context(opened))
            .transpose()?;
        let mut stash = StashGuard {
            opened: &self.opened,
            id: stashed,
        };
        let mut parameters = BTreeMap::new();
        if let Some(id) = stashed {
            parameters.insert(STARTUP_PARAM_OPENED_CONTEXT_ID.to_owned(), id.to_string());
        }

        let instance = match self.launcher.start_app(&manifest.app_id, parameters).await {
            Ok(instance) => instance,
            Err(err) => {
                error!(app_id = %manifest.app_id, error = %err, "failed to open app");
                return Err(err.into());
            }
        };

        if let Some(wanted) = context_type.as_deref() {
            let waited = self
                .channels
                .wait_for_context_listener(
                    instance.instance_id,
                    Some(wanted),
                    self.options.listener_registration_timeout,
                )
                .await;
            if let Err(err) = waited {
                return Err(match err {
                    ChannelError::ListenerWaitTimedOut {
                        instance_id,
                        timeout,
                    } => OpenError::AppTimeout {
                        instance_id,
                        timeout,
                    },
                    other => other.into(),
                });
            }
        }

        stash.release();
        info!(
            app_id = %manifest.app_id,
            instance_id = %instance.instance_id,
            with_context = stashed.is_some(),
            "app opened"
        );
        Ok(AppIdentifier::instance(manifest.app_id, instance.instance_id))
    }

    /// Collects the context stashed by `open` under `context_id`.
    ///
    /// Each context can be collected once, and only before it expires.
    ///
    /// # Errors
    ///
    /// Returns [`OpenError::IdNotParsable`] for a malformed id and
    /// [`OpenError::OpenedAppContextNotFound`] for an unknown, collected or
    /// expired one.
    pub fn get_opened_app_context(&self, context_id: &str) -> OpenResult<Context> {
        let id: OpenedContextId = context_id
            .parse()
            .map_err(|MalformedOpenedContextId(raw)| OpenError::IdNotParsable(raw))?;
        let now = self.clock.utc();
        self.lock_opened()?
            .take(id, now)
            .ok_or(OpenError::OpenedAppContextNotFound(id))
    }

    pub(crate) fn ensure_running(&self, instance_id: InstanceId) -> AgentResult<()> {
        if self.registry().is_running(instance_id)? {
            Ok(())
        } else {
            Err(AgentError::UnknownInstance(instance_id))
        }
    }

    async fn directory_app(&self, app_id: &AppId) -> AgentResult<Fdc3App> {
        match self.directory.application(app_id).await {
            Ok(app) => Ok(app),
            Err(AppDirectoryError::AppNotFound(missing)) => {
                Err(AgentError::TargetAppUnavailable(missing))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Describes the agent to a running instance.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::UnknownInstance`] for an instance that is not
    /// running and [`AgentError::TargetAppUnavailable`] when its app left the
    /// directory.
    pub async fn get_info(&self, instance_id: InstanceId) -> AgentResult<ImplementationMetadata> {
        let instance = self
            .registry()
            .running(instance_id)?
            .ok_or(AgentError::UnknownInstance(instance_id))?;
        let app = self.directory_app(instance.app_id()).await?;
        Ok(ImplementationMetadata::for_app(AppMetadata::from_app(
            &app,
            Some(instance_id),
            None,
        )))
    }

    /// Lists the running instances of `app_id` on behalf of `caller`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::UnknownInstance`] when the caller is not running
    /// and [`AgentError::NoAppsFound`] for an app outside the directory.
    pub async fn find_instances(
        &self,
        caller: InstanceId,
        app_id: &AppId,
    ) -> AgentResult<Vec<AppIdentifier>> {
        self.ensure_running(caller)?;
        match self.directory.application(app_id).await {
            Ok(_) => {}
            Err(AppDirectoryError::AppNotFound(missing)) => {
                return Err(AgentError::NoAppsFound(missing));
            }
            Err(err) => return Err(err.into()),
        }
        Ok(self
            .registry()
            .instances_of(app_id)?
            .into_iter()
            .map(|instance| AppIdentifier::instance(instance.app_id().clone(), instance.instance_id()))
            .collect())
    }

    /// Returns metadata for an app, or for one of its running instances.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::UnknownInstance`] when the caller is not
    /// running, [`AgentError::TargetInstanceUnavailable`] for an instance
    /// that is not running and [`AgentError::TargetAppUnavailable`] for an
    /// app outside the directory.
    pub async fn get_app_metadata(
        &self,
        caller: InstanceId,
        target: &AppIdentifier,
    ) -> AgentResult<AppMetadata> {
        self.ensure_running(caller)?;
        let Some(instance_id) = target.instance_id else {
            let app = self.directory_app(&target.app_id).await?;
            return Ok(AppMetadata::from_app(&app, None, None));
        };
        let instance = self
            .registry()
            .running(instance_id)?
            .ok_or(AgentError::TargetInstanceUnavailable(instance_id))?;
        let app = self.directory_app(instance.app_id()).await?;
        Ok(AppMetadata::from_app(&app, Some(instance_id), None))
    }
}

fn spawn_cleanup<D, L, U>(
    mut stopped: broadcast::Receiver<InstanceId>,
    channels: Arc<ChannelBroker>,
    intents: Arc<IntentBroker<D, L, U>>,
) -> JoinHandle<()>
where
    D: AppDirectory + 'static,
    L: ModuleLoader + 'static,
    U: ResolverUi + 'static,
{
    tokio::spawn(async move {
        loop {
            match stopped.recv().await {
                Ok(instance_id) => {
                    if let Err(err) = channels.release_instance(instance_id) {
                        error!(instance_id = %instance_id, error = %err, "failed to release channel state");
                    }
                    if let Err(err) = intents.release_instance(instance_id) {
                        error!(instance_id = %instance_id, error = %err, "failed to release intent state");
                    }
                    info!(instance_id = %instance_id, "stopped instance released");
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "instance-stopped stream lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

impl<D, L, U, C> Drop for DesktopAgent<D, L, U, C>
where
    D: AppDirectory,
    L: ModuleLoader,
    U: ResolverUi,
    C: Clock + Send + Sync,
{
    fn drop(&mut self) {
        self.cleanup.abort();
        if let Err(err) = self.router.disconnect(self.client_id) {
            debug!(client = %self.client_id, error = %err, "agent client already disconnected");
        }
    }
}

impl<D, L, U, C> std::fmt::Debug for DesktopAgent<D, L, U, C>
where
    D: AppDirectory,
    L: ModuleLoader,
    U: ResolverUi,
    C: Clock + Send + Sync,
{
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("DesktopAgent")
            .field("client_id", &self.client_id)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
