//! Serves the desktop agent's operations as router services.

use crate::agent::protocol::{
    AddContextListenerRequest, AppQueryRequest, BroadcastRequest, ChannelRequest, ErrorCode,
    Fdc3Operation, Fdc3Response, FindChannelRequest, FindIntentRequest,
    FindIntentsByContextRequest, GetCurrentContextRequest, GetIntentResultRequest,
    GetOpenedAppContextRequest, InstanceRequest, IntentListenerRequest, MESSAGE_ID_FIELD,
    OpenRequest, RaiseIntentForContextRequest, RaiseIntentRequest, RemoveContextListenerRequest,
    StoreIntentResultRequest, context_listener_topic,
};
use crate::agent::services::{AgentError, AgentResult, DesktopAgent};
use crate::apps::domain::InstanceId;
use crate::apps::ports::{AppDirectory, ModuleLoader, ResolverUi};
use crate::channels::{ChannelError, ChannelId, ChannelKind, ChannelRef, Context, ContextListenerId};
use crate::intents::{self, IntentResult, IntentResultKey, MessageId};
use crate::router::adapters::handler_fn;
use crate::router::{ClientId, InvocationRequest, MessageRouter, RouterResult};
use mockable::Clock;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

/// Registers one router service per [`Fdc3Operation`] on behalf of a
/// [`DesktopAgent`].
///
/// Every request gets a response: failures are reported as an
/// [`ErrorCode`] in the envelope, never as a router error. Each operation
/// is registered with a deadline that outlasts the agent's own waits for
/// it. Dropping the service unregisters its operations.
pub struct DesktopAgentRouterService<D, L, U, C>
where
    D: AppDirectory,
    L: ModuleLoader,
    U: ResolverUi,
    C: Clock + Send + Sync,
{
    agent: Arc<DesktopAgent<D, L, U, C>>,
    router: Arc<MessageRouter>,
    client: ClientId,
}

impl<D, L, U, C> DesktopAgentRouterService<D, L, U, C>
where
    D: AppDirectory + 'static,
    L: ModuleLoader + 'static,
    U: ResolverUi + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Registers every operation under the agent's router client.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::DuplicateServiceName`](crate::router::RouterError::DuplicateServiceName)
    /// when another client already serves one of the operations; nothing
    /// stays registered in that case.
    pub fn register(agent: Arc<DesktopAgent<D, L, U, C>>) -> RouterResult<Self> {
        let router = Arc::clone(agent.router());
        let client = agent.client_id();
        let router_default = router.options().invocation_timeout;
        for (registered, operation) in Fdc3Operation::ALL.into_iter().enumerate() {
            let target = Arc::clone(&agent);
            let handler = handler_fn(move |request: InvocationRequest| {
                let serving = Arc::clone(&target);
                async move {
                    let dispatch = Dispatch { agent: &serving };
                    Ok(Some(dispatch.respond(operation, request.payload).await))
                }
            });
            let deadline = agent.options().operation_deadline(operation, router_default);
            if let Err(err) = router.register_service_with_timeout(
                client,
                &operation.service_name(),
                handler,
                deadline,
            ) {
                for done in Fdc3Operation::ALL.into_iter().take(registered) {
                    unregister(&router, client, done);
                }
                return Err(err);
            }
        }
        info!(client = %client, operations = Fdc3Operation::ALL.len(), "desktop agent services registered");
        Ok(Self {
            agent,
            router,
            client,
        })
    }

    /// Returns the served agent.
    #[must_use]
    pub const fn agent(&self) -> &Arc<DesktopAgent<D, L, U, C>> {
        &self.agent
    }
}

fn unregister(router: &MessageRouter, client: ClientId, operation: Fdc3Operation) {
    if let Err(err) = router.unregister_service(client, &operation.service_name()) {
        debug!(operation = %operation, error = %err, "service already unregistered");
    }
}

impl<D, L, U, C> Drop for DesktopAgentRouterService<D, L, U, C>
where
    D: AppDirectory,
    L: ModuleLoader,
    U: ResolverUi,
    C: Clock + Send + Sync,
{
    fn drop(&mut self) {
        for operation in Fdc3Operation::ALL {
            unregister(&self.router, self.client, operation);
        }
    }
}

impl<D, L, U, C> std::fmt::Debug for DesktopAgentRouterService<D, L, U, C>
where
    D: AppDirectory,
    L: ModuleLoader,
    U: ResolverUi,
    C: Clock + Send + Sync,
{
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("DesktopAgentRouterService")
            .field("agent", &self.agent)
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

// ── Request parsing ─────────────────────────────────────────────────

fn parse<T: DeserializeOwned>(body: Value) -> AgentResult<T> {
    serde_json::from_value(body).map_err(|err| AgentError::MalformedRequest(err.to_string()))
}

fn required(value: Option<String>, field: &str) -> AgentResult<String> {
    value
        .filter(|raw| !raw.trim().is_empty())
        .ok_or_else(|| AgentError::MissingId(field.to_owned()))
}

fn instance_field(value: Option<String>, field: &str) -> AgentResult<InstanceId> {
    let raw = required(value, field)?;
    InstanceId::parse(&raw).map_err(|_| AgentError::IdNotParsable(raw))
}

fn caller(value: Option<String>) -> AgentResult<InstanceId> {
    instance_field(value, "instanceId")
}

fn message_id(value: Option<String>) -> AgentResult<MessageId> {
    let raw = required(value, MESSAGE_ID_FIELD)?;
    raw.parse().map_err(|_| AgentError::IdNotParsable(raw))
}

fn listener_id(value: Option<String>) -> AgentResult<ContextListenerId> {
    let raw = required(value, "listenerId")?;
    Uuid::parse_str(raw.trim())
        .map(ContextListenerId::from_uuid)
        .map_err(|_| AgentError::IdNotParsable(raw))
}

fn channel_id(value: Option<String>) -> AgentResult<ChannelId> {
    let raw = required(value, "channelId")?;
    Ok(ChannelId::new(raw).map_err(ChannelError::from)?)
}

fn channel_ref(value: Option<String>, kind: Option<ChannelKind>) -> AgentResult<ChannelRef> {
    Ok(ChannelRef::new(
        channel_id(value)?,
        kind.unwrap_or(ChannelKind::User),
    ))
}

fn context(value: Option<Value>) -> AgentResult<Context> {
    Ok(Context::new(value.unwrap_or(Value::Null)).map_err(ChannelError::from)?)
}

// ── Dispatch ────────────────────────────────────────────────────────

fn forward_contexts(
    router: Arc<MessageRouter>,
    source: ClientId,
    instance_id: InstanceId,
    listener: ContextListenerId,
    mut receiver: mpsc::UnboundedReceiver<Context>,
) {
    let topic = context_listener_topic(instance_id);
    tokio::spawn(async move {
        while let Some(delivered) = receiver.recv().await {
            let payload = json!({ "listenerId": listener.to_string(), "context": delivered });
            if let Err(err) = router.publish(source, &topic, Some(payload)) {
                debug!(listener_id = %listener, error = %err, "context forwarding stopped");
                return;
            }
        }
        debug!(listener_id = %listener, "context listener closed");
    });
}

struct Dispatch<'a, D, L, U, C>
where
    D: AppDirectory,
    L: ModuleLoader,
    U: ResolverUi,
    C: Clock + Send + Sync,
{
    agent: &'a DesktopAgent<D, L, U, C>,
}

impl<D, L, U, C> Dispatch<'_, D, L, U, C>
where
    D: AppDirectory + 'static,
    L: ModuleLoader + 'static,
    U: ResolverUi + 'static,
    C: Clock + Send + Sync,
{
    async fn respond(&self, operation: Fdc3Operation, payload: Option<Value>) -> Value {
        let message_id = payload
            .as_ref()
            .and_then(|body| body.get(MESSAGE_ID_FIELD))
            .cloned();
        let mut response = self.dispatch(operation, payload).await.map_or_else(
            |err| {
                let code = ErrorCode::from(&err);
                debug!(operation = %operation, code = %code, error = %err, "operation failed");
                Fdc3Response::failure(None, code)
            },
            |body| Fdc3Response::success(None, body),
        );
        response.message_id = message_id;
        response.into_value()
    }

    async fn dispatch(&self, operation: Fdc3Operation, payload: Option<Value>) -> AgentResult<Value> {
        let body = payload
            .filter(|body| !body.is_null())
            .ok_or(AgentError::PayloadNull)?;
        match operation {
            Fdc3Operation::FindChannel => self.find_channel(parse(body)?),
            Fdc3Operation::CreateAppChannel => self.create_app_channel(parse(body)?),
            Fdc3Operation::CreatePrivateChannel => self.create_private_channel(parse(body)?),
            Fdc3Operation::ConnectPrivateChannel => self.connect_private_channel(parse(body)?),
            Fdc3Operation::GetUserChannels => self.get_user_channels(parse(body)?),
            Fdc3Operation::JoinUserChannel => self.join_user_channel(parse(body)?),
            Fdc3Operation::GetCurrentChannel => self.get_current_channel(parse(body)?),
            Fdc3Operation::LeaveCurrentChannel => self.leave_current_channel(parse(body)?),
            Fdc3Operation::GetCurrentContext => self.get_current_context(parse(body)?),
            Fdc3Operation::Broadcast => self.broadcast(parse(body)?),
            Fdc3Operation::AddContextListener => self.add_context_listener(parse(body)?),
            Fdc3Operation::RemoveContextListener => self.remove_context_listener(parse(body)?),
            Fdc3Operation::FindIntent => self.find_intent(parse(body)?).await,
            Fdc3Operation::FindIntentsByContext => self.find_intents_by_context(parse(body)?).await,
            Fdc3Operation::RaiseIntent => self.raise_intent(parse(body)?).await,
            Fdc3Operation::RaiseIntentForContext => {
                self.raise_intent_for_context(parse(body)?).await
            }
            Fdc3Operation::AddIntentListener => self.add_intent_listener(parse(body)?),
            Fdc3Operation::StoreIntentResult => self.store_intent_result(parse(body)?),
            Fdc3Operation::GetIntentResult => self.get_intent_result(parse(body)?).await,
            Fdc3Operation::GetInfo => self.get_info(parse(body)?).await,
            Fdc3Operation::FindInstances => self.find_instances(parse(body)?).await,
            Fdc3Operation::GetAppMetadata => self.get_app_metadata(parse(body)?).await,
            Fdc3Operation::Open => self.open(parse(body)?).await,
            Fdc3Operation::GetOpenedAppContext => self.get_opened_app_context(parse(body)?),
        }
    }

    // ── Channels ────────────────────────────────────────────────────

    fn find_channel(&self, request: FindChannelRequest) -> AgentResult<Value> {
        let id = required(request.channel_id, "channelId")?;
        let kind = request.channel_type.unwrap_or(ChannelKind::User);
        let channel = self.agent.channels().find_channel(&id, kind)?;
        Ok(json!({ "channel": channel }))
    }

    fn create_app_channel(&self, request: ChannelRequest) -> AgentResult<Value> {
        let instance_id = caller(request.instance_id)?;
        self.agent.ensure_running(instance_id)?;
        let id = required(request.channel_id, "channelId")?;
        let channel = self.agent.channels().app_channel(&id)?;
        Ok(json!({ "channel": channel }))
    }

    fn create_private_channel(&self, request: InstanceRequest) -> AgentResult<Value> {
        let instance_id = caller(request.instance_id)?;
        let channel = self.agent.channels().create_private_channel(instance_id)?;
        Ok(json!({ "channel": channel }))
    }

    fn connect_private_channel(&self, request: ChannelRequest) -> AgentResult<Value> {
        let instance_id = caller(request.instance_id)?;
        let id = channel_id(request.channel_id)?;
        let channel = self
            .agent
            .channels()
            .connect_private_channel(&id, instance_id)?;
        Ok(json!({ "channel": channel }))
    }

    fn get_user_channels(&self, request: InstanceRequest) -> AgentResult<Value> {
        let instance_id = caller(request.instance_id)?;
        let channels = self.agent.channels().get_user_channels(instance_id)?;
        Ok(json!({ "channels": channels }))
    }

    fn join_user_channel(&self, request: ChannelRequest) -> AgentResult<Value> {
        let instance_id = caller(request.instance_id)?;
        let id = required(request.channel_id, "channelId")?;
        let channel = self.agent.channels().join_channel(instance_id, &id)?;
        Ok(json!({ "channel": channel }))
    }

    fn get_current_channel(&self, request: InstanceRequest) -> AgentResult<Value> {
        let instance_id = caller(request.instance_id)?;
        self.agent.ensure_running(instance_id)?;
        let channel = self.agent.channels().get_current_channel(instance_id)?;
        Ok(json!({ "channel": channel }))
    }

    fn leave_current_channel(&self, request: InstanceRequest) -> AgentResult<Value> {
        let instance_id = caller(request.instance_id)?;
        self.agent.ensure_running(instance_id)?;
        self.agent.channels().leave_current_channel(instance_id)?;
        Ok(json!({}))
    }

    fn get_current_context(&self, request: GetCurrentContextRequest) -> AgentResult<Value> {
        let reference = channel_ref(request.channel_id, request.channel_type)?;
        let current = self
            .agent
            .channels()
            .get_current_context(&reference, request.context_type.as_deref())?;
        Ok(json!({ "context": current }))
    }

    fn broadcast(&self, request: BroadcastRequest) -> AgentResult<Value> {
        let instance_id = caller(request.instance_id)?;
        self.agent.ensure_running(instance_id)?;
        let reference = channel_ref(request.channel_id, request.channel_type)?;
        let broadcast = context(request.context)?;
        let delivered = self
            .agent
            .channels()
            .broadcast(&reference, broadcast, Some(instance_id))?;
        Ok(json!({ "delivered": delivered }))
    }

    fn add_context_listener(&self, request: AddContextListenerRequest) -> AgentResult<Value> {
        let instance_id = caller(request.instance_id)?;
        let channel_type = request.channel_type;
        let bound = request
            .channel_id
            .map(|id| channel_ref(Some(id), channel_type))
            .transpose()?;
        let subscription =
            self.agent
                .channels()
                .add_context_listener(instance_id, bound, request.context_type)?;
        forward_contexts(
            Arc::clone(self.agent.router()),
            self.agent.client_id(),
            instance_id,
            subscription.id,
            subscription.receiver,
        );
        Ok(json!({ "listenerId": subscription.id.to_string() }))
    }

    fn remove_context_listener(&self, request: RemoveContextListenerRequest) -> AgentResult<Value> {
        let id = listener_id(request.listener_id)?;
        self.agent.channels().remove_context_listener(id)?;
        Ok(json!({}))
    }

    // ── Intents ─────────────────────────────────────────────────────

    async fn find_intent(&self, request: FindIntentRequest) -> AgentResult<Value> {
        let intent = required(request.intent, "intent")?;
        let app_intent = self
            .agent
            .intents()
            .find_intent(
                &intent,
                request.context_type.as_deref(),
                request.result_type.as_deref(),
            )
            .await?;
        Ok(json!({ "appIntent": app_intent }))
    }

    async fn find_intents_by_context(&self, request: FindIntentsByContextRequest) -> AgentResult<Value> {
        let matched = context(request.context)?;
        let app_intents = self
            .agent
            .intents()
            .find_intents_by_context(matched.context_type(), request.result_type.as_deref())
            .await?;
        Ok(json!({ "appIntents": app_intents }))
    }

    async fn raise_intent(&self, request: RaiseIntentRequest) -> AgentResult<Value> {
        let origin = caller(request.instance_id)?;
        let intent = required(request.intent, "intent")?;
        let raised = context(request.context)?;
        let resolution = self
            .agent
            .intents()
            .raise_intent(intents::RaiseIntentRequest {
                intent,
                context: raised,
                origin,
                target: request.app,
            })
            .await?;
        Ok(json!({ "intentResolution": resolution }))
    }

    async fn raise_intent_for_context(&self, request: RaiseIntentForContextRequest) -> AgentResult<Value> {
        let origin = caller(request.instance_id)?;
        let raised = context(request.context)?;
        let resolution = self
            .agent
            .intents()
            .raise_intent_for_context(intents::RaiseForContextRequest {
                context: raised,
                origin,
                target: request.app,
            })
            .await?;
        Ok(json!({ "intentResolution": resolution }))
    }

    fn add_intent_listener(&self, request: IntentListenerRequest) -> AgentResult<Value> {
        let instance_id = caller(request.instance_id)?;
        let intent = required(request.intent, "intent")?;
        let action = request
            .state
            .ok_or_else(|| AgentError::MalformedRequest("state is required".to_owned()))?;
        let stored = self
            .agent
            .intents()
            .add_intent_listener(instance_id, &intent, action)?;
        Ok(json!({ "stored": stored }))
    }

    fn store_intent_result(&self, request: StoreIntentResultRequest) -> AgentResult<Value> {
        let key = IntentResultKey {
            message_id: message_id(request.message_id)?,
            intent: required(request.intent, "intent")?,
            origin: instance_field(request.origin_instance_id, "originInstanceId")?,
            target: instance_field(request.target_instance_id, "targetInstanceId")?,
        };
        let result = request.result.unwrap_or(IntentResult::Void);
        self.agent.intents().store_intent_result(&key, result)?;
        Ok(json!({ "stored": true }))
    }

    async fn get_intent_result(&self, request: GetIntentResultRequest) -> AgentResult<Value> {
        let id = message_id(request.message_id)?;
        let intent = required(request.intent, "intent")?;
        let target = request
            .target_app_identifier
            .ok_or_else(|| AgentError::MissingId("targetAppIdentifier".to_owned()))?;
        let result = self
            .agent
            .intents()
            .get_intent_result(id, &intent, &target)
            .await?;
        Ok(json!({ "intentResult": result }))
    }

    // ── App management ──────────────────────────────────────────────

    async fn get_info(&self, request: InstanceRequest) -> AgentResult<Value> {
        let instance_id = caller(request.instance_id)?;
        let metadata = self.agent.get_info(instance_id).await?;
        Ok(json!({ "implementationMetadata": metadata }))
    }

    async fn find_instances(&self, request: AppQueryRequest) -> AgentResult<Value> {
        let instance_id = caller(request.instance_id)?;
        let app = request
            .app_identifier
            .ok_or_else(|| AgentError::MissingId("appIdentifier".to_owned()))?;
        let instances = self.agent.find_instances(instance_id, &app.app_id).await?;
        Ok(json!({ "instances": instances }))
    }

    async fn get_app_metadata(&self, request: AppQueryRequest) -> AgentResult<Value> {
        let instance_id = caller(request.instance_id)?;
        let app = request
            .app_identifier
            .ok_or_else(|| AgentError::MissingId("appIdentifier".to_owned()))?;
        let metadata = self.agent.get_app_metadata(instance_id, &app).await?;
        Ok(json!({ "appMetadata": metadata }))
    }

    async fn open(&self, request: OpenRequest) -> AgentResult<Value> {
        let opener = request.instance_id.map(|raw| caller(Some(raw))).transpose()?;
        let app = request
            .app_identifier
            .ok_or_else(|| AgentError::MissingId("appIdentifier".to_owned()))?;
        let opened_context = request.context.map(|raw| context(Some(raw))).transpose()?;
        debug!(app_id = %app.app_id, opener = ?opener, "open requested");
        let opened = self.agent.open(&app, opened_context).await?;
        Ok(json!({ "appIdentifier": opened }))
    }

    fn get_opened_app_context(&self, request: GetOpenedAppContextRequest) -> AgentResult<Value> {
        let id = required(request.context_id, "contextId")?;
        let opened = self.agent.get_opened_app_context(&id)?;
        Ok(json!({ "context": opened }))
    }
}
