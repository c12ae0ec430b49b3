//! Unit tests for the desktop agent façade and its router service.

mod info_tests;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::agent::{DesktopAgent, DesktopAgentOptions};
use crate::apps::adapters::{InMemoryAppDirectory, InMemoryModuleLoader, InMemoryResolverUi};
use crate::apps::domain::{AppId, Fdc3App, InstanceId, IntentDeclaration, ModuleInstance};
use crate::apps::ports::ResolverUi;
use crate::channels::Context;
use crate::router::{MessageRouter, RouterOptions};
use chrono::{DateTime, Local, TimeDelta, Utc};
use mockable::Clock;
use serde_json::json;

/// Clock that only moves when told to.
#[derive(Debug)]
pub(super) struct TestClock {
    now: Mutex<DateTime<Utc>>,
}

impl TestClock {
    fn new() -> Self {
        Self {
            now: Mutex::new(Utc::now()),
        }
    }

    pub(super) fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().expect("clock lock");
        *now += by;
    }
}

impl Clock for TestClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}

pub(super) type TestAgent<U> = DesktopAgent<InMemoryAppDirectory, InMemoryModuleLoader, U, TestClock>;

pub(super) const OPENED_CONTEXT_TTL: Duration = Duration::from_secs(60);

pub(super) fn app_id(value: &str) -> AppId {
    AppId::new(value).expect("valid app id")
}

/// Directory shared by the agent tests.
///
/// - `chart` handles `ViewChart` for instruments
/// - `crm` handles `ViewContact` for contacts
/// - `blotter` declares no intents
pub(super) fn directory() -> InMemoryAppDirectory {
    InMemoryAppDirectory::new([
        Fdc3App::new(app_id("chart"), "Chart").listening_for(
            "ViewChart",
            IntentDeclaration {
                display_name: Some("View Chart".to_owned()),
                contexts: vec!["fdc3.instrument".to_owned()],
                result_type: None,
            },
        ),
        Fdc3App::new(app_id("crm"), "CRM").listening_for(
            "ViewContact",
            IntentDeclaration {
                display_name: None,
                contexts: vec!["fdc3.contact".to_owned()],
                result_type: Some("fdc3.contact".to_owned()),
            },
        ),
        Fdc3App::new(app_id("blotter"), "Blotter"),
    ])
}

pub(super) fn options() -> DesktopAgentOptions {
    DesktopAgentOptions::default()
        .with_listener_registration_timeout(Duration::from_millis(300))
        .with_intent_result_timeout(Duration::from_millis(300))
        .with_resolver_ui_timeout(Duration::from_millis(300))
        .with_app_start_timeout(Duration::from_millis(500))
        .with_opened_app_context_ttl(OPENED_CONTEXT_TTL)
}

/// Desktop agent over in-memory collaborators.
pub(super) struct AgentHarness<U: ResolverUi> {
    pub(super) agent: Arc<TestAgent<U>>,
    pub(super) loader: Arc<InMemoryModuleLoader>,
    pub(super) clock: Arc<TestClock>,
    pub(super) router: Arc<MessageRouter>,
}

impl AgentHarness<InMemoryResolverUi> {
    /// Builds a harness whose resolver picks the first candidate.
    pub(super) fn with_default_resolver() -> Self {
        Self::new(InMemoryResolverUi::new())
    }
}

impl<U: ResolverUi + 'static> AgentHarness<U> {
    /// Builds the harness; must run inside the test runtime.
    pub(super) fn new(resolver: U) -> Self {
        Self::with_router_options(resolver, RouterOptions::default())
    }

    /// Builds the harness over a router configured with `router_options`.
    pub(super) fn with_router_options(resolver: U, router_options: RouterOptions) -> Self {
        let router = Arc::new(MessageRouter::new(router_options));
        let loader = Arc::new(InMemoryModuleLoader::new());
        let clock = Arc::new(TestClock::new());
        let agent = DesktopAgent::start(
            Arc::clone(&router),
            Arc::new(directory()),
            Arc::clone(&loader),
            Arc::new(resolver),
            Arc::clone(&clock),
            options(),
        );
        Self {
            agent: Arc::new(agent),
            loader,
            clock,
            router,
        }
    }

    /// Starts an instance of `app` and waits until it runs.
    pub(super) async fn start(&self, app: &str) -> InstanceId {
        self.agent
            .launcher()
            .start_app(&app_id(app), BTreeMap::new())
            .await
            .expect("app starts")
            .instance_id
    }

    /// Waits until an instance of `app` launched by `open` is running.
    pub(super) async fn launched(&self, app: &str) -> ModuleInstance {
        let wanted = app_id(app);
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let launched = self
                    .loader
                    .instances()
                    .expect("loader readable")
                    .into_iter()
                    .find(|instance| instance.app_id == wanted);
                if let Some(instance) = launched
                    && self
                        .agent
                        .registry()
                        .is_running(instance.instance_id)
                        .expect("registry readable")
                {
                    return instance;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("app launched in time")
    }
}

pub(super) fn instrument(ticker: &str) -> Context {
    Context::new(json!({ "type": "fdc3.instrument", "id": { "ticker": ticker } }))
        .expect("valid context")
}
