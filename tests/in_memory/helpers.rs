//! Shared fixtures for end-to-end tests over the message router.
//!
//! [`Desktop`] loads its App Directory and agent options from JSON files,
//! starts the agent, and serves it on a fresh router. [`AppClient`] plays a
//! running app instance talking to the agent through router services.

use camino::Utf8PathBuf;
use eyre::{Result, WrapErr, bail, ensure, eyre};
use interop_hub::agent::{
    DesktopAgent, DesktopAgentOptions, DesktopAgentRouterService, ErrorCode, Fdc3Operation,
};
use interop_hub::apps::adapters::{InMemoryModuleLoader, InMemoryResolverUi, JsonFileAppDirectory};
use interop_hub::apps::domain::{AppId, InstanceId, ModuleInstance};
use interop_hub::router::{MessageRouter, RouterClient, TopicMessage};
use mockable::DefaultClock;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::{Arc, Once};
use std::time::Duration;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

const WAIT: Duration = Duration::from_secs(2);

/// App Directory used by every end-to-end test.
///
/// - `chart` handles `ViewChart` for instruments
/// - `crm` handles `ViewContact` for contacts and returns a contact
/// - `blotter` declares no intents
const DIRECTORY: &str = r#"{
    "applications": [
        {
            "appId": "chart",
            "name": "Chart",
            "interop": { "intents": { "listensFor": {
                "ViewChart": { "displayName": "View Chart", "contexts": ["fdc3.instrument"] }
            } } }
        },
        {
            "appId": "crm",
            "name": "CRM",
            "interop": { "intents": { "listensFor": {
                "ViewContact": { "contexts": ["fdc3.contact"], "resultType": "fdc3.contact" }
            } } }
        },
        { "appId": "blotter", "name": "Blotter" }
    ]
}"#;

const OPTIONS: &str = r#"{
    "listenerRegistrationTimeout": 500,
    "intentResultTimeout": 500,
    "resolverUiTimeout": 500,
    "appStartTimeout": 1000,
    "openedAppContextTtl": 60000
}"#;

static TRACING: Once = Once::new();

/// Installs a test-writer subscriber filtered by `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

/// Agent type served by [`Desktop`].
pub type TestAgent =
    DesktopAgent<JsonFileAppDirectory, InMemoryModuleLoader, InMemoryResolverUi, DefaultClock>;

/// A desktop agent served on its own router.
pub struct Desktop {
    /// Router apps connect to.
    pub router: Arc<MessageRouter>,
    /// The served agent.
    pub agent: Arc<TestAgent>,
    /// Loader the agent launches through.
    pub loader: Arc<InMemoryModuleLoader>,
    _service: DesktopAgentRouterService<
        JsonFileAppDirectory,
        InMemoryModuleLoader,
        InMemoryResolverUi,
        DefaultClock,
    >,
    _config: TempDir,
}

fn write_config(root: &TempDir, name: &str, contents: &str) -> Result<Utf8PathBuf> {
    let path = Utf8PathBuf::from_path_buf(root.path().join(name))
        .map_err(|path| eyre!("non-UTF-8 temp path {}", path.display()))?;
    std::fs::write(&path, contents).wrap_err_with(|| format!("writing {path}"))?;
    Ok(path)
}

impl Desktop {
    /// Starts the agent; must run inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration cannot be written or loaded
    /// or the agent cannot register its services.
    pub fn start() -> Result<Self> {
        init_tracing();
        let config = tempfile::tempdir()?;
        let directory = JsonFileAppDirectory::load(&write_config(&config, "apps.json", DIRECTORY)?)?;
        let options = DesktopAgentOptions::load(&write_config(&config, "agent.json", OPTIONS)?)?;
        let router = Arc::new(MessageRouter::default());
        let loader = Arc::new(InMemoryModuleLoader::new());
        let agent = Arc::new(DesktopAgent::start(
            Arc::clone(&router),
            Arc::new(directory),
            Arc::clone(&loader),
            Arc::new(InMemoryResolverUi::new()),
            Arc::new(DefaultClock),
            options,
        ));
        let service = DesktopAgentRouterService::register(Arc::clone(&agent))?;
        Ok(Self {
            router,
            agent,
            loader,
            _service: service,
            _config: config,
        })
    }

    /// Starts an instance of `app` and connects a client for it.
    ///
    /// # Errors
    ///
    /// Returns an error when the app fails to start or connect.
    pub async fn launch(&self, app: &str) -> Result<AppClient> {
        let instance = self
            .agent
            .launcher()
            .start_app(&AppId::new(app)?, BTreeMap::new())
            .await?;
        self.connect(instance.instance_id)
    }

    /// Connects a client acting as `instance_id`.
    ///
    /// # Errors
    ///
    /// Returns an error when the router refuses the connection.
    pub fn connect(&self, instance_id: InstanceId) -> Result<AppClient> {
        Ok(AppClient {
            instance_id,
            client: self.router.connect(),
            sent: 0,
        })
    }

    /// Waits until `open` has launched an instance of `app` that is running.
    ///
    /// # Errors
    ///
    /// Returns an error when no such instance appears in time.
    pub async fn launched(&self, app: &str) -> Result<ModuleInstance> {
        let wanted = AppId::new(app)?;
        tokio::time::timeout(WAIT, async {
            loop {
                let found = self
                    .loader
                    .instances()?
                    .into_iter()
                    .find(|instance| instance.app_id == wanted);
                if let Some(instance) = found
                    && self.agent.registry().is_running(instance.instance_id)?
                {
                    return Ok::<_, eyre::Report>(instance);
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .wrap_err_with(|| format!("{app} was not launched in time"))?
    }

    /// Stops `instance_id` and waits until the registry sees it stopped.
    ///
    /// # Errors
    ///
    /// Returns an error when the loader fails or the stop is not observed
    /// in time.
    pub async fn stop(&self, instance_id: InstanceId) -> Result<()> {
        self.agent.launcher().stop_app(instance_id).await?;
        tokio::time::timeout(WAIT, async {
            while self.agent.registry().is_running(instance_id)? {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            Ok::<_, eyre::Report>(())
        })
        .await
        .wrap_err_with(|| format!("{instance_id} did not stop in time"))?
    }
}

/// A running app instance talking to the agent.
pub struct AppClient {
    /// Instance the client acts as.
    pub instance_id: InstanceId,
    /// The client's router connection.
    pub client: RouterClient,
    sent: u64,
}

impl AppClient {
    /// Sends `body` to `operation` and returns the raw response.
    ///
    /// `instanceId` and `messageId` are filled in unless `body` sets them.
    ///
    /// # Errors
    ///
    /// Returns an error when the router fails the invocation or the response
    /// does not echo the message id.
    pub async fn request(&mut self, operation: Fdc3Operation, body: Value) -> Result<Value> {
        let Value::Object(mut fields) = body else {
            bail!("request body for {operation} must be an object");
        };
        self.sent += 1;
        fields
            .entry("instanceId")
            .or_insert_with(|| json!(self.instance_id.to_string()));
        let message_id = fields
            .entry("messageId")
            .or_insert_with(|| json!(format!("{}-{}", self.instance_id, self.sent)))
            .clone();
        let response = self
            .client
            .invoke(&operation.service_name(), Some(Value::Object(fields)))
            .await?
            .ok_or_else(|| eyre!("{operation} returned no body"))?;
        ensure!(
            response.get("messageId") == Some(&message_id),
            "{operation} did not echo {message_id}: {response}"
        );
        Ok(response)
    }

    /// Sends a request that must succeed.
    ///
    /// # Errors
    ///
    /// Returns an error when the response carries an error code.
    pub async fn call(&mut self, operation: Fdc3Operation, body: Value) -> Result<Value> {
        let response = self.request(operation, body).await?;
        if let Some(code) = response.get("error") {
            bail!("{operation} failed with {code}");
        }
        Ok(response)
    }

    /// Sends a request that must fail with `expected`.
    ///
    /// # Errors
    ///
    /// Returns an error when the response carries a different outcome.
    pub async fn expect_error(
        &mut self,
        operation: Fdc3Operation,
        body: Value,
        expected: ErrorCode,
    ) -> Result<()> {
        let response = self.request(operation, body).await?;
        ensure!(
            response.get("error") == Some(&json!(expected.as_str())),
            "{operation} expected {expected}, got {response}"
        );
        Ok(())
    }

    /// Waits for the next message on a subscribed topic.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing arrives in time.
    pub async fn next_message(&mut self) -> Result<TopicMessage> {
        tokio::time::timeout(WAIT, self.client.recv())
            .await
            .wrap_err("no topic message in time")?
            .ok_or_else(|| eyre!("client disconnected"))
    }
}

/// Builds an instrument context.
#[must_use]
pub fn instrument(ticker: &str) -> Value {
    json!({ "type": "fdc3.instrument", "id": { "ticker": ticker } })
}

/// Builds a contact context.
#[must_use]
pub fn contact(email: &str) -> Value {
    json!({ "type": "fdc3.contact", "id": { "email": email } })
}

/// Reads a string field from a response.
///
/// # Errors
///
/// Returns an error when the field is absent or not a string.
pub fn text<'a>(response: &'a Value, pointer: &str) -> Result<&'a str> {
    response
        .pointer(pointer)
        .and_then(Value::as_str)
        .ok_or_else(|| eyre!("missing {pointer} in {response}"))
}
