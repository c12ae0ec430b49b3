//! Unit tests for the intent broker.

mod find_tests;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::apps::adapters::{InMemoryAppDirectory, InMemoryModuleLoader};
use crate::apps::domain::{AppId, AppMetadata, Fdc3App, InstanceId, IntentDeclaration};
use crate::apps::ports::{ResolverUi, ResolverUiResult};
use crate::apps::services::{AppLauncher, InstanceRegistry};
use crate::channels::Context;
use crate::intents::{IntentBroker, IntentListenerAction, IntentOptions};
use crate::router::{MessageRouter, RouterClient};
use async_trait::async_trait;
use mockall::mock;
use serde_json::json;

mock! {
    pub Resolver {}

    #[async_trait]
    impl ResolverUi for Resolver {
        async fn select_app(&self, candidates: Vec<AppMetadata>) -> ResolverUiResult<AppMetadata>;
        async fn select_intent(&self, intents: Vec<String>) -> ResolverUiResult<String>;
    }
}

/// A resolver mock that must never be consulted.
pub(super) fn silent_resolver() -> MockResolver {
    let mut resolver = MockResolver::new();
    resolver.expect_select_app().never();
    resolver.expect_select_intent().never();
    resolver
}

pub(super) type TestBroker<U> = IntentBroker<InMemoryAppDirectory, InMemoryModuleLoader, U>;

/// Intent broker over in-memory collaborators.
pub(super) struct IntentHarness<U: ResolverUi> {
    pub(super) broker: Arc<TestBroker<U>>,
    pub(super) launcher: Arc<AppLauncher<InMemoryModuleLoader>>,
    pub(super) loader: Arc<InMemoryModuleLoader>,
    pub(super) router: Arc<MessageRouter>,
    _agent: RouterClient,
}

pub(super) fn app_id(value: &str) -> AppId {
    AppId::new(value).expect("valid app id")
}

fn declaration(contexts: &[&str], result_type: Option<&str>) -> IntentDeclaration {
    IntentDeclaration {
        display_name: None,
        contexts: contexts.iter().map(|value| (*value).to_owned()).collect(),
        result_type: result_type.map(str::to_owned),
    }
}

/// Directory shared by the intent tests.
///
/// - `chart` and `altchart` both handle `ViewChart` for instruments
/// - `news` handles `ViewNews` for instruments with a channel result
/// - `crm` handles `ViewContact` and `StartCall` for contacts
pub(super) fn directory() -> InMemoryAppDirectory {
    InMemoryAppDirectory::new([
        Fdc3App::new(app_id("chart"), "Chart")
            .listening_for("ViewChart", declaration(&["fdc3.instrument"], None))
            .raising("ViewNews", vec!["fdc3.instrument".to_owned()]),
        Fdc3App::new(app_id("altchart"), "Alt Chart")
            .listening_for("ViewChart", declaration(&["fdc3.instrument"], None)),
        Fdc3App::new(app_id("news"), "News").listening_for(
            "ViewNews",
            declaration(&["fdc3.instrument"], Some("channel<fdc3.news>")),
        ),
        Fdc3App::new(app_id("crm"), "CRM")
            .listening_for("ViewContact", declaration(&["fdc3.contact"], Some("fdc3.contact")))
            .listening_for("StartCall", declaration(&["fdc3.contact"], None)),
    ])
}

impl<U: ResolverUi> IntentHarness<U> {
    /// Builds the harness; must run inside the test runtime.
    pub(super) fn new(resolver: U) -> Self {
        let options = IntentOptions::default()
            .with_listener_registration_timeout(Duration::from_millis(200))
            .with_intent_result_timeout(Duration::from_millis(200))
            .with_resolver_ui_timeout(Duration::from_millis(200));
        let loader = Arc::new(InMemoryModuleLoader::new());
        let launcher = Arc::new(AppLauncher::spawn(
            Arc::clone(&loader),
            Arc::new(InstanceRegistry::new()),
            Duration::from_secs(2),
        ));
        let router = Arc::new(MessageRouter::default());
        let agent = router.connect();
        let broker = Arc::new(IntentBroker::new(
            Arc::new(directory()),
            Arc::clone(&launcher),
            Arc::new(resolver),
            Arc::clone(&router),
            agent.id(),
            options,
        ));
        Self {
            broker,
            launcher,
            loader,
            router,
            _agent: agent,
        }
    }

    /// Starts an instance of `app` and waits until it runs.
    pub(super) async fn start(&self, app: &str) -> InstanceId {
        self.launcher
            .start_app(&app_id(app), BTreeMap::new())
            .await
            .expect("app starts")
            .instance_id
    }

    /// Starts an instance of `app` listening for `intent`.
    pub(super) async fn start_listening(&self, app: &str, intent: &str) -> InstanceId {
        let instance_id = self.start(app).await;
        self.broker
            .add_intent_listener(instance_id, intent, IntentListenerAction::Subscribe)
            .expect("listener added");
        instance_id
    }
}

pub(super) fn instrument(ticker: &str) -> Context {
    Context::new(json!({ "type": "fdc3.instrument", "id": { "ticker": ticker } }))
        .expect("valid context")
}

pub(super) fn contact(email: &str) -> Context {
    Context::new(json!({ "type": "fdc3.contact", "id": { "email": email } }))
        .expect("valid context")
}
