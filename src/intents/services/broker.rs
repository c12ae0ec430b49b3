//! Intent broker: matching, disambiguation, delivery and result hand-off.

use crate::apps::domain::{AppId, AppIdentifier, AppIntent, AppMetadata, FDC3_TOPIC_ROOT, InstanceId};
use crate::apps::ports::{AppDirectory, AppDirectoryError, ModuleLoader, ResolverUi, ResolverUiError};
use crate::apps::services::{AppLaunchError, AppLauncher, InstanceRegistryError};
use crate::channels::domain::Context;
use crate::intents::config::IntentOptions;
use crate::intents::domain::{
    IntentDomainError, IntentListenerAction, IntentListenerTable, IntentQuery, IntentResolution,
    IntentResult, IntentResultKey, MessageId, RaiseIntentMessage, RaisedIntent, app_intents,
};
use crate::router::{ClientId, MessageRouter, RouterError};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Errors returned by the intent broker.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// No app or instance can handle the request.
    #[error("no apps found for {0}")]
    NoAppsFound(String),

    /// The targeted app is not in the directory.
    #[error("target app {0} is unavailable")]
    TargetAppUnavailable(AppId),

    /// The targeted instance is not running.
    #[error("target instance {0} is unavailable")]
    TargetInstanceUnavailable(InstanceId),

    /// The target never listened for the intent.
    #[error("instance {instance_id} did not listen for '{intent}' within {timeout:?}")]
    AppTimeout {
        /// Target instance.
        instance_id: InstanceId,
        /// Intent being delivered.
        intent: String,
        /// How long the broker waited.
        timeout: Duration,
    },

    /// The resolver failed or answered with something unusable.
    #[error("resolver unavailable: {0}")]
    ResolverUnavailable(String),

    /// The user did not answer the resolver in time.
    #[error("resolver did not answer within {0:?}")]
    ResolverTimeout(Duration),

    /// The user dismissed the resolver.
    #[error("user cancelled the resolution")]
    UserCancelledResolution,

    /// A correlating identifier is missing or unknown.
    #[error("missing id: {0}")]
    MissingId(String),

    /// The result cannot be delivered to the requester.
    #[error("intent delivery failed: {0}")]
    IntentDeliveryFailed(String),

    /// Launching the target app failed.
    #[error(transparent)]
    Launch(#[from] AppLaunchError),

    /// The App Directory could not be read.
    #[error(transparent)]
    Directory(#[from] AppDirectoryError),

    /// Delivery over the router failed.
    #[error(transparent)]
    Router(#[from] RouterError),

    /// Instance lookups failed.
    #[error(transparent)]
    Registry(#[from] InstanceRegistryError),

    /// Broker state could not be accessed.
    #[error("intent broker state unavailable: {0}")]
    StateUnavailable(String),
}

/// Result type for intent broker operations.
pub type ResolveResult<T> = Result<T, ResolveError>;

fn poisoned(err: impl std::fmt::Display) -> ResolveError {
    ResolveError::StateUnavailable(err.to_string())
}

/// Returns the router topic raised intents for `intent` are delivered to
/// `instance_id` on.
#[must_use]
pub fn raise_intent_topic(intent: &str, instance_id: InstanceId) -> String {
    format!("{FDC3_TOPIC_ROOT}/raiseIntent/{intent}/{instance_id}")
}

/// Request to raise an intent.
#[derive(Debug, Clone, PartialEq)]
pub struct RaiseIntentRequest {
    /// Intent to raise.
    pub intent: String,
    /// Context to raise it with.
    pub context: Context,
    /// Raising instance.
    pub origin: InstanceId,
    /// Explicit target app or instance.
    pub target: Option<AppIdentifier>,
}

/// Request to raise whichever intent suits a context.
#[derive(Debug, Clone, PartialEq)]
pub struct RaiseForContextRequest {
    /// Context to raise.
    pub context: Context,
    /// Raising instance.
    pub origin: InstanceId,
    /// Explicit target app or instance.
    pub target: Option<AppIdentifier>,
}

/// Resolves intents to apps and instances and relays their results.
///
/// Listener bookkeeping and raised-intent records live behind separate
/// locks; neither is held across an await.
pub struct IntentBroker<D, L, U>
where
    D: AppDirectory,
    L: ModuleLoader,
    U: ResolverUi,
{
    directory: Arc<D>,
    launcher: Arc<AppLauncher<L>>,
    resolver: Arc<U>,
    router: Arc<MessageRouter>,
    agent: ClientId,
    options: IntentOptions,
    listeners: Mutex<IntentListenerTable>,
    listeners_changed: watch::Sender<u64>,
    raised: Mutex<HashMap<MessageId, RaisedIntent>>,
    results_changed: watch::Sender<u64>,
}

impl<D, L, U> IntentBroker<D, L, U>
where
    D: AppDirectory,
    L: ModuleLoader + 'static,
    U: ResolverUi,
{
    /// Creates a broker delivering intents as router client `agent`.
    #[must_use]
    pub fn new(
        directory: Arc<D>,
        launcher: Arc<AppLauncher<L>>,
        resolver: Arc<U>,
        router: Arc<MessageRouter>,
        agent: ClientId,
        options: IntentOptions,
    ) -> Self {
        let (listeners_changed, _) = watch::channel(0);
        let (results_changed, _) = watch::channel(0);
        Self {
            directory,
            launcher,
            resolver,
            router,
            agent,
            options,
            listeners: Mutex::new(IntentListenerTable::default()),
            listeners_changed,
            raised: Mutex::new(HashMap::new()),
            results_changed,
        }
    }

    /// Returns the configured timeouts.
    #[must_use]
    pub const fn options(&self) -> &IntentOptions {
        &self.options
    }

    fn lock_listeners(&self) -> ResolveResult<MutexGuard<'_, IntentListenerTable>> {
        self.listeners.lock().map_err(poisoned)
    }

    fn lock_raised(&self) -> ResolveResult<MutexGuard<'_, HashMap<MessageId, RaisedIntent>>> {
        self.raised.lock().map_err(poisoned)
    }

    async fn matching(&self, query: IntentQuery<'_>) -> ResolveResult<Vec<AppIntent>> {
        let apps = self.directory.applications().await?;
        let running = self.launcher.registry().running_instances()?;
        Ok(app_intents(&apps, &running, query))
    }

    /// Finds the apps and running instances that handle `intent`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NoAppsFound`] when nothing matches.
    pub async fn find_intent(
        &self,
        intent: &str,
        context_type: Option<&str>,
        result_type: Option<&str>,
    ) -> ResolveResult<AppIntent> {
        let query = IntentQuery {
            intent: Some(intent),
            context_type,
            result_type,
        };
        self.matching(query)
            .await?
            .into_iter()
            .next()
            .filter(|app_intent| !app_intent.apps.is_empty())
            .ok_or_else(|| ResolveError::NoAppsFound(format!("intent '{intent}'")))
    }

    /// Finds every intent, with its handlers, that accepts `context_type`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NoAppsFound`] when nothing matches.
    pub async fn find_intents_by_context(
        &self,
        context_type: &str,
        result_type: Option<&str>,
    ) -> ResolveResult<Vec<AppIntent>> {
        let query = IntentQuery {
            intent: None,
            context_type: Some(context_type),
            result_type,
        };
        let matched = self.matching(query).await?;
        if matched.is_empty() {
            return Err(ResolveError::NoAppsFound(format!("context '{context_type}'")));
        }
        Ok(matched)
    }

    /// Raises an intent and delivers it to a single handler.
    ///
    /// An explicit target is used as given; otherwise a single candidate is
    /// chosen directly and several are offered to the resolver. The target
    /// must listen for the intent before delivery.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NoAppsFound`],
    /// [`ResolveError::TargetAppUnavailable`],
    /// [`ResolveError::TargetInstanceUnavailable`],
    /// [`ResolveError::AppTimeout`], resolver failures and launch failures.
    pub async fn raise_intent(&self, request: RaiseIntentRequest) -> ResolveResult<IntentResolution> {
        let RaiseIntentRequest {
            intent,
            context,
            origin,
            target,
        } = request;
        self.check_declared_raise(origin, &intent, context.context_type())
            .await;
        let resolved = match target {
            Some(explicit) => {
                self.validate_target(&intent, context.context_type(), explicit)
                    .await?
            }
            None => self.choose_target(&intent, context.context_type()).await?,
        };
        self.dispatch(intent, context, origin, resolved).await
    }

    /// Raises whichever intent handles `context`, asking the resolver when
    /// several do.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::raise_intent`], plus resolver failures
    /// from intent selection.
    pub async fn raise_intent_for_context(
        &self,
        request: RaiseForContextRequest,
    ) -> ResolveResult<IntentResolution> {
        let RaiseForContextRequest {
            context,
            origin,
            target,
        } = request;
        let mut apps = self.directory.applications().await?;
        if let Some(explicit) = &target {
            apps.retain(|app| app.app_id == explicit.app_id);
            if apps.is_empty() {
                return Err(ResolveError::TargetAppUnavailable(explicit.app_id.clone()));
            }
        }
        let running = self.launcher.registry().running_instances()?;
        let query = IntentQuery {
            intent: None,
            context_type: Some(context.context_type()),
            result_type: None,
        };
        let intents: Vec<String> = app_intents(&apps, &running, query)
            .into_iter()
            .map(|app_intent| app_intent.intent.name)
            .collect();

        let intent = match intents.as_slice() {
            [] => {
                return Err(ResolveError::NoAppsFound(format!(
                    "context '{}'",
                    context.context_type()
                )));
            }
            [only] => only.clone(),
            _ => self.select_intent(intents).await?,
        };
        self.raise_intent(RaiseIntentRequest {
            intent,
            context,
            origin,
            target,
        })
        .await
    }

    async fn check_declared_raise(&self, origin: InstanceId, intent: &str, context_type: &str) {
        let instance = match self.launcher.registry().instance(origin) {
            Ok(Some(instance)) => instance,
            Ok(None) => {
                debug!(origin = %origin, intent, "intent raised by an untracked instance");
                return;
            }
            Err(err) => {
                error!(origin = %origin, error = %err, "instance lookup failed");
                return;
            }
        };
        match self.directory.application(instance.app_id()).await {
            Ok(app) if !app.declares_raise(intent, Some(context_type)) => warn!(
                app_id = %app.app_id,
                intent,
                context_type,
                "app raised an intent its manifest does not declare"
            ),
            Ok(_) => {}
            Err(err) => debug!(app_id = %instance.app_id(), error = %err, "raising app not in directory"),
        }
    }

    async fn validate_target(
        &self,
        intent: &str,
        context_type: &str,
        target: AppIdentifier,
    ) -> ResolveResult<AppIdentifier> {
        let app = match self.directory.application(&target.app_id).await {
            Ok(app) => app,
            Err(AppDirectoryError::AppNotFound(app_id)) => {
                return Err(ResolveError::TargetAppUnavailable(app_id));
            }
            Err(err) => return Err(err.into()),
        };
        let handles = app
            .listens_for(intent)
            .is_some_and(|declaration| declaration.accepts_context_type(Some(context_type)));
        if !handles {
            return Err(ResolveError::NoAppsFound(format!(
                "intent '{intent}' on app {}",
                app.app_id
            )));
        }
        if let Some(instance_id) = target.instance_id {
            let running = self
                .launcher
                .registry()
                .running(instance_id)?
                .is_some_and(|instance| instance.app_id() == &target.app_id);
            if !running {
                return Err(ResolveError::TargetInstanceUnavailable(instance_id));
            }
        }
        Ok(target)
    }

    async fn choose_target(&self, intent: &str, context_type: &str) -> ResolveResult<AppIdentifier> {
        let query = IntentQuery {
            intent: Some(intent),
            context_type: Some(context_type),
            result_type: None,
        };
        let candidates = self
            .matching(query)
            .await?
            .into_iter()
            .next()
            .map(|app_intent| app_intent.apps)
            .unwrap_or_default();
        match candidates.as_slice() {
            [] => Err(ResolveError::NoAppsFound(format!("intent '{intent}'"))),
            [only] => Ok(only.identifier()),
            _ => self.select_app(candidates).await,
        }
    }

    async fn select_app(&self, candidates: Vec<AppMetadata>) -> ResolveResult<AppIdentifier> {
        let offered: Vec<AppIdentifier> = candidates.iter().map(AppMetadata::identifier).collect();
        debug!(candidates = offered.len(), "asking resolver to choose an app");
        let selection = tokio::time::timeout(
            self.options.resolver_ui_timeout,
            self.resolver.select_app(candidates),
        )
        .await
        .map_err(|_| ResolveError::ResolverTimeout(self.options.resolver_ui_timeout))?
        .map_err(resolver_error)?;
        let chosen = selection.identifier();
        if offered.contains(&chosen) {
            Ok(chosen)
        } else {
            Err(ResolveError::ResolverUnavailable(format!(
                "resolver chose {} which was not offered",
                chosen.app_id
            )))
        }
    }

    async fn select_intent(&self, intents: Vec<String>) -> ResolveResult<String> {
        debug!(candidates = intents.len(), "asking resolver to choose an intent");
        let offered = intents.clone();
        let chosen = tokio::time::timeout(
            self.options.resolver_ui_timeout,
            self.resolver.select_intent(intents),
        )
        .await
        .map_err(|_| ResolveError::ResolverTimeout(self.options.resolver_ui_timeout))?
        .map_err(resolver_error)?;
        if offered.contains(&chosen) {
            Ok(chosen)
        } else {
            Err(ResolveError::ResolverUnavailable(format!(
                "resolver chose intent '{chosen}' which was not offered"
            )))
        }
    }

    async fn dispatch(
        &self,
        intent: String,
        context: Context,
        origin: InstanceId,
        target: AppIdentifier,
    ) -> ResolveResult<IntentResolution> {
        let instance_id = match target.instance_id {
            Some(instance_id) => instance_id,
            None => {
                self.launcher
                    .start_app(&target.app_id, BTreeMap::new())
                    .await?
                    .instance_id
            }
        };
        self.wait_for_intent_listener(instance_id, &intent).await?;

        let message_id = MessageId::new();
        let key = IntentResultKey {
            message_id,
            intent: intent.clone(),
            origin,
            target: instance_id,
        };
        self.lock_raised()?
            .insert(message_id, RaisedIntent::new(key, context.clone()));

        let originating_app = self
            .launcher
            .registry()
            .instance(origin)?
            .map(|instance| AppIdentifier::instance(instance.app_id().clone(), origin));
        let message = RaiseIntentMessage {
            message_id,
            intent: intent.clone(),
            context,
            origin_instance_id: origin,
            originating_app,
        };
        let published = serde_json::to_value(&message)
            .map_err(|err| ResolveError::IntentDeliveryFailed(err.to_string()))
            .and_then(|payload| {
                self.router
                    .publish(
                        self.agent,
                        &raise_intent_topic(&intent, instance_id),
                        Some(payload),
                    )
                    .map_err(ResolveError::from)
            });
        if let Err(err) = published {
            self.lock_raised()?.remove(&message_id);
            error!(intent = %intent, target = %instance_id, error = %err, "failed to deliver raised intent");
            return Err(err);
        }

        info!(
            message_id = %message_id,
            intent = %intent,
            origin = %origin,
            target = %instance_id,
            "intent delivered"
        );
        Ok(IntentResolution {
            message_id,
            intent,
            source: AppIdentifier::instance(target.app_id, instance_id),
        })
    }

    async fn wait_for_intent_listener(&self, instance_id: InstanceId, intent: &str) -> ResolveResult<()> {
        let timeout = self.options.listener_registration_timeout;
        let deadline = Instant::now() + timeout;
        let mut changed = self.listeners_changed.subscribe();
        loop {
            if self.lock_listeners()?.is_listening(instance_id, intent) {
                return Ok(());
            }
            if !self.launcher.registry().is_running(instance_id)? {
                return Err(ResolveError::TargetInstanceUnavailable(instance_id));
            }
            match tokio::time::timeout_at(deadline, changed.changed()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) | Err(_) => {
                    warn!(instance_id = %instance_id, intent, "target never listened for intent");
                    return Err(ResolveError::AppTimeout {
                        instance_id,
                        intent: intent.to_owned(),
                        timeout,
                    });
                }
            }
        }
    }

    /// Subscribes or unsubscribes an intent listener.
    ///
    /// Returns whether the listener is active afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::MissingId`] for an empty intent name or when
    /// unsubscribing a listener that was never subscribed.
    pub fn add_intent_listener(
        &self,
        instance_id: InstanceId,
        intent: &str,
        action: IntentListenerAction,
    ) -> ResolveResult<bool> {
        if intent.trim().is_empty() {
            return Err(ResolveError::MissingId("intent".to_owned()));
        }
        let mut table = self.lock_listeners()?;
        match action {
            IntentListenerAction::Subscribe => {
                if !table.subscribe(instance_id, intent) {
                    warn!(instance_id = %instance_id, intent, "intent listener already subscribed");
                }
                drop(table);
                self.listeners_changed.send_modify(|version| *version += 1);
                debug!(instance_id = %instance_id, intent, "intent listener subscribed");
                Ok(true)
            }
            IntentListenerAction::Unsubscribe => {
                let was_active = table.unsubscribe(instance_id, intent).map_err(|err| match err {
                    IntentDomainError::NeverSubscribed { .. } => ResolveError::MissingId(err.to_string()),
                    other => ResolveError::IntentDeliveryFailed(other.to_string()),
                })?;
                debug!(instance_id = %instance_id, intent, was_active, "intent listener unsubscribed");
                Ok(false)
            }
        }
    }

    /// Stores the result of a delivered intent for the raising app.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::MissingId`] when no delivered intent matches
    /// `key` and [`ResolveError::IntentDeliveryFailed`] when a result is
    /// already stored.
    pub fn store_intent_result(&self, key: &IntentResultKey, result: IntentResult) -> ResolveResult<()> {
        {
            let mut raised = self.lock_raised()?;
            let record = raised
                .get_mut(&key.message_id)
                .filter(|record| record.key() == key)
                .ok_or_else(|| {
                    ResolveError::MissingId(format!("no raised intent for message {}", key.message_id))
                })?;
            record
                .store(result)
                .map_err(|err| ResolveError::IntentDeliveryFailed(err.to_string()))?;
        }
        self.results_changed.send_modify(|version| *version += 1);
        debug!(message_id = %key.message_id, intent = %key.intent, "intent result stored");
        Ok(())
    }

    /// Waits for and returns the result of a raised intent.
    ///
    /// A result can be read once; the record is released by the read.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::IntentDeliveryFailed`] when the target has no
    /// instance id, no delivered intent matches, the intent name differs from
    /// the one raised, or no result is stored before the result timeout.
    pub async fn get_intent_result(
        &self,
        message_id: MessageId,
        intent: &str,
        target: &AppIdentifier,
    ) -> ResolveResult<IntentResult> {
        let target_instance = target.instance_id.ok_or_else(|| {
            ResolveError::IntentDeliveryFailed("target instance id missing".to_owned())
        })?;
        let deadline = Instant::now() + self.options.intent_result_timeout;
        let mut changed = self.results_changed.subscribe();
        loop {
            if let Some(result) = self.take_result(message_id, intent, target_instance)? {
                return Ok(result);
            }
            match tokio::time::timeout_at(deadline, changed.changed()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) | Err(_) => {
                    warn!(message_id = %message_id, intent, "no intent result stored in time");
                    return Err(ResolveError::IntentDeliveryFailed(format!(
                        "no result for message {message_id} within {:?}",
                        self.options.intent_result_timeout
                    )));
                }
            }
        }
    }

    fn take_result(
        &self,
        message_id: MessageId,
        intent: &str,
        target: InstanceId,
    ) -> ResolveResult<Option<IntentResult>> {
        let mut raised = self.lock_raised()?;
        let record = raised.get(&message_id).ok_or_else(|| {
            ResolveError::IntentDeliveryFailed(format!("no pending result for message {message_id}"))
        })?;
        if record.key().target != target {
            return Err(ResolveError::IntentDeliveryFailed(format!(
                "message {message_id} was not delivered to {target}"
            )));
        }
        if record.key().intent != intent {
            return Err(ResolveError::IntentDeliveryFailed(format!(
                "message {message_id} was raised for '{}', not '{intent}'",
                record.key().intent
            )));
        }
        if !record.has_result() {
            return Ok(None);
        }
        Ok(raised
            .remove(&message_id)
            .and_then(|mut consumed| consumed.take_result()))
    }

    /// Drops intent listeners and raised-intent records involving
    /// `instance_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::StateUnavailable`] when state is poisoned.
    pub fn release_instance(&self, instance_id: InstanceId) -> ResolveResult<()> {
        self.lock_listeners()?.release(instance_id);
        let released = {
            let mut raised = self.lock_raised()?;
            let before = raised.len();
            raised.retain(|_, record| !record.involves(instance_id));
            before - raised.len()
        };
        self.listeners_changed.send_modify(|version| *version += 1);
        self.results_changed.send_modify(|version| *version += 1);
        debug!(instance_id = %instance_id, released, "intent state released");
        Ok(())
    }
}

fn resolver_error(err: ResolverUiError) -> ResolveError {
    match err {
        ResolverUiError::Cancelled => ResolveError::UserCancelledResolution,
        ResolverUiError::Unavailable(reason) => ResolveError::ResolverUnavailable(reason),
    }
}

impl<D, L, U> std::fmt::Debug for IntentBroker<D, L, U>
where
    D: AppDirectory,
    L: ModuleLoader,
    U: ResolverUi,
{
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("IntentBroker")
            .field("agent", &self.agent)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
