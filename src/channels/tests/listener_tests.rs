//! Context listener registration, replay and delivery.

use std::sync::Arc;
use std::time::Duration;

use super::{BrokerHarness, contact, instrument, user_ref};
use crate::apps::domain::InstanceId;
use crate::channels::{ChannelError, ContextListenerId};
use rstest::{fixture, rstest};

#[fixture]
fn harness() -> BrokerHarness {
    BrokerHarness::new()
}

#[rstest]
fn new_listener_receives_cached_context_exactly_once(harness: BrokerHarness) {
    let listener_app = harness.running("chart");
    let channel = user_ref("fdc3.channel.1");
    harness
        .broker
        .broadcast(&channel, instrument("AAPL"), None)
        .expect("broadcast");

    let mut subscription = harness
        .broker
        .add_context_listener(listener_app, Some(channel.clone()), None)
        .expect("listener added");

    assert_eq!(subscription.receiver.try_recv().ok(), Some(instrument("AAPL")));
    assert!(subscription.receiver.try_recv().is_err());

    harness
        .broker
        .broadcast(&channel, instrument("MSFT"), None)
        .expect("broadcast");
    assert_eq!(subscription.receiver.try_recv().ok(), Some(instrument("MSFT")));
    assert!(subscription.receiver.try_recv().is_err());
}

#[rstest]
fn typed_listener_only_sees_its_type(harness: BrokerHarness) {
    let listener_app = harness.running("chart");
    let channel = user_ref("fdc3.channel.2");
    harness
        .broker
        .broadcast(&channel, contact("a@example.com"), None)
        .expect("broadcast");

    let mut subscription = harness
        .broker
        .add_context_listener(listener_app, Some(channel.clone()), Some("fdc3.instrument".to_owned()))
        .expect("listener added");
    assert!(subscription.receiver.try_recv().is_err());

    harness
        .broker
        .broadcast(&channel, contact("b@example.com"), None)
        .expect("broadcast");
    harness
        .broker
        .broadcast(&channel, instrument("IBM"), None)
        .expect("broadcast");

    assert_eq!(subscription.receiver.try_recv().ok(), Some(instrument("IBM")));
    assert!(subscription.receiver.try_recv().is_err());
}

#[rstest]
fn broadcaster_does_not_hear_itself(harness: BrokerHarness) {
    let app = harness.running("chart");
    let channel = user_ref("fdc3.channel.3");
    let mut subscription = harness
        .broker
        .add_context_listener(app, Some(channel.clone()), None)
        .expect("listener added");

    let delivered = harness
        .broker
        .broadcast(&channel, instrument("AAPL"), Some(app))
        .expect("broadcast");

    assert_eq!(delivered, 0);
    assert!(subscription.receiver.try_recv().is_err());
}

#[rstest]
fn unbound_listener_follows_the_current_user_channel(harness: BrokerHarness) {
    let app = harness.running("chart");
    harness
        .broker
        .broadcast(&user_ref("fdc3.channel.5"), instrument("NVDA"), None)
        .expect("broadcast");
    let mut subscription = harness
        .broker
        .add_context_listener(app, None, None)
        .expect("listener added");
    assert!(subscription.receiver.try_recv().is_err());

    harness
        .broker
        .join_channel(app, "fdc3.channel.5")
        .expect("joins");
    assert_eq!(subscription.receiver.try_recv().ok(), Some(instrument("NVDA")));

    harness
        .broker
        .broadcast(&user_ref("fdc3.channel.6"), instrument("AMD"), None)
        .expect("broadcast elsewhere");
    assert!(subscription.receiver.try_recv().is_err());
}

#[rstest]
fn removing_unknown_listener_fails(harness: BrokerHarness) {
    let missing = ContextListenerId::new();

    match harness.broker.remove_context_listener(missing) {
        Err(ChannelError::ListenerNotFound(id)) => assert_eq!(id, missing),
        other => panic!("expected ListenerNotFound, got {other:?}"),
    }
}

#[rstest]
fn removed_listener_stops_receiving(harness: BrokerHarness) {
    let app = harness.running("chart");
    let channel = user_ref("fdc3.channel.7");
    let mut subscription = harness
        .broker
        .add_context_listener(app, Some(channel.clone()), None)
        .expect("listener added");

    harness
        .broker
        .remove_context_listener(subscription.id)
        .expect("removed");
    harness
        .broker
        .broadcast(&channel, instrument("AAPL"), None)
        .expect("broadcast");

    assert!(subscription.receiver.try_recv().is_err());
}

#[rstest]
fn stopped_instance_cannot_add_listeners(harness: BrokerHarness) {
    match harness
        .broker
        .add_context_listener(InstanceId::new(), None, None)
    {
        Err(ChannelError::AccessDenied { .. }) => {}
        other => panic!("expected AccessDenied, got {other:?}"),
    }
}

#[rstest]
fn released_instance_loses_listeners_and_membership(harness: BrokerHarness) {
    let app = harness.running("chart");
    harness
        .broker
        .join_channel(app, "fdc3.channel.8")
        .expect("joins");
    let subscription = harness
        .broker
        .add_context_listener(app, None, None)
        .expect("listener added");

    harness.broker.release_instance(app).expect("released");

    assert_eq!(harness.broker.get_current_channel(app).expect("readable"), None);
    assert!(matches!(
        harness.broker.remove_context_listener(subscription.id),
        Err(ChannelError::ListenerNotFound(_))
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn wait_for_listener_resolves_when_one_is_added(harness: BrokerHarness) {
    let app = harness.running("chart");
    let BrokerHarness { broker, .. } = harness;
    let shared = Arc::new(broker);
    let adder = Arc::clone(&shared);
    let registration = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        adder
            .add_context_listener(app, None, Some("fdc3.instrument".to_owned()))
            .map(|subscription| subscription.id)
    });

    shared
        .wait_for_context_listener(app, Some("fdc3.instrument"), Duration::from_secs(2))
        .await
        .expect("listener appears");
    registration
        .await
        .expect("task completes")
        .expect("listener added");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn wait_for_listener_times_out(harness: BrokerHarness) {
    let app = harness.running("chart");
    let _subscription = harness
        .broker
        .add_context_listener(app, None, Some("fdc3.contact".to_owned()))
        .expect("listener added");

    let result = harness
        .broker
        .wait_for_context_listener(app, Some("fdc3.instrument"), Duration::from_millis(50))
        .await;

    match result {
        Err(ChannelError::ListenerWaitTimedOut { instance_id, .. }) => assert_eq!(instance_id, app),
        other => panic!("expected ListenerWaitTimedOut, got {other:?}"),
    }
}
