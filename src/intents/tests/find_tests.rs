//! Intent discovery against the directory and running instances.

use super::{IntentHarness, silent_resolver};
use crate::intents::ResolveError;
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_intent_finds_no_apps() {
    let harness = IntentHarness::new(silent_resolver());

    let result = harness.broker.find_intent("nosuchintent", None, None).await;

    match result {
        Err(ResolveError::NoAppsFound(_)) => {}
        other => panic!("expected NoAppsFound, got {other:?}"),
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn intent_with_one_app_lists_exactly_that_app() {
    let harness = IntentHarness::new(silent_resolver());

    let app_intent = harness
        .broker
        .find_intent("ViewContact", None, None)
        .await
        .expect("intent found");

    assert_eq!(app_intent.intent.name, "ViewContact");
    assert_eq!(app_intent.apps.len(), 1);
    let app = app_intent.apps.first().expect("one app");
    assert_eq!(app.app_id.as_str(), "crm");
    assert_eq!(app.instance_id, None);
    assert_eq!(app.result_type.as_deref(), Some("fdc3.contact"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn running_instances_are_listed_after_their_app() {
    let harness = IntentHarness::new(silent_resolver());
    let instance_id = harness.start("crm").await;

    let app_intent = harness
        .broker
        .find_intent("ViewContact", Some("fdc3.contact"), None)
        .await
        .expect("intent found");

    let instances: Vec<_> = app_intent
        .apps
        .iter()
        .map(|app| app.instance_id)
        .collect();
    assert_eq!(instances, vec![None, Some(instance_id)]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn context_and_result_type_filter_intents() {
    let harness = IntentHarness::new(silent_resolver());

    let wrong_context = harness
        .broker
        .find_intent("ViewChart", Some("fdc3.contact"), None)
        .await;
    let by_context = harness
        .broker
        .find_intents_by_context("fdc3.instrument", None)
        .await
        .expect("intents found");
    let by_result = harness
        .broker
        .find_intents_by_context("fdc3.instrument", Some("channel"))
        .await
        .expect("intents found");

    assert!(matches!(wrong_context, Err(ResolveError::NoAppsFound(_))));
    let names: Vec<&str> = by_context
        .iter()
        .map(|app_intent| app_intent.intent.name.as_str())
        .collect();
    assert_eq!(names, vec!["ViewChart", "ViewNews"]);
    assert_eq!(by_result.len(), 1);
    assert_eq!(
        by_result.first().map(|app_intent| app_intent.intent.name.as_str()),
        Some("ViewNews")
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn context_without_handlers_finds_no_apps() {
    let harness = IntentHarness::new(silent_resolver());

    let result = harness
        .broker
        .find_intents_by_context("fdc3.country", None)
        .await;

    assert!(matches!(result, Err(ResolveError::NoAppsFound(_))));
}
