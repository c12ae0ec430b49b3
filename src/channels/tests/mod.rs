//! Unit tests for the channel broker.

mod listener_tests;

use std::sync::Arc;

use crate::apps::domain::{
    AppId, InstanceId, LifetimeEvent, LifetimeEventKind, ModuleInstance,
};
use crate::apps::services::InstanceRegistry;
use crate::channels::{
    ChannelBroker, ChannelId, ChannelKind, ChannelRef, Context, default_user_channel_set,
};
use crate::router::{MessageRouter, RouterClient};
use serde_json::json;

/// Broker wired to a fresh router and registry.
pub(super) struct BrokerHarness {
    pub(super) broker: ChannelBroker,
    pub(super) registry: Arc<InstanceRegistry>,
    pub(super) router: Arc<MessageRouter>,
    pub(super) agent: RouterClient,
}

impl BrokerHarness {
    pub(super) fn new() -> Self {
        let router = Arc::new(MessageRouter::default());
        let agent = router.connect();
        let registry = Arc::new(InstanceRegistry::new());
        let broker = ChannelBroker::new(
            Arc::clone(&router),
            agent.id(),
            Arc::clone(&registry),
            default_user_channel_set(),
        );
        Self {
            broker,
            registry,
            router,
            agent,
        }
    }

    /// Registers a running instance of `app_id`.
    pub(super) fn running(&self, app_id: &str) -> InstanceId {
        let instance = ModuleInstance {
            instance_id: InstanceId::new(),
            app_id: AppId::new(app_id).expect("valid app id"),
            parameters: std::collections::BTreeMap::new(),
        };
        let instance_id = instance.instance_id;
        self.registry
            .apply_event(&LifetimeEvent::new(LifetimeEventKind::Started, instance))
            .expect("registry accepts event");
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

pub(super) fn user_ref(id: &str) -> ChannelRef {
    ChannelRef::new(ChannelId::new(id).expect("valid id"), ChannelKind::User)
}
