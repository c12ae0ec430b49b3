//! Agent metadata and app queries.

use super::{AgentHarness, app_id};
use crate::agent::AgentError;
use crate::agent::domain::{FDC3_VERSION, PROVIDER};
use crate::apps::domain::{AppIdentifier, InstanceId};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn get_info_describes_the_agent_and_caller() {
    let harness = AgentHarness::with_default_resolver();
    let instance_id = harness.start("chart").await;

    let info = harness.agent.get_info(instance_id).await.expect("info returned");

    assert_eq!(info.fdc3_version, FDC3_VERSION);
    assert_eq!(info.provider, PROVIDER);
    assert!(info.optional_features.originating_app_metadata);
    assert!(info.optional_features.user_channel_membership_apis);
    assert_eq!(info.app_metadata.app_id, app_id("chart"));
    assert_eq!(info.app_metadata.instance_id, Some(instance_id));
    assert_eq!(info.app_metadata.name, "Chart");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn get_info_requires_a_running_caller() {
    let harness = AgentHarness::with_default_resolver();
    let stranger = InstanceId::new();

    match harness.agent.get_info(stranger).await {
        Err(AgentError::UnknownInstance(id)) => assert_eq!(id, stranger),
        other => panic!("expected UnknownInstance, got {other:?}"),
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn find_instances_lists_running_instances_of_the_app() {
    let harness = AgentHarness::with_default_resolver();
    let caller = harness.start("blotter").await;
    let first = harness.start("chart").await;
    let second = harness.start("chart").await;

    let mut found: Vec<InstanceId> = harness
        .agent
        .find_instances(caller, &app_id("chart"))
        .await
        .expect("instances listed")
        .into_iter()
        .filter_map(|identifier| identifier.instance_id)
        .collect();
    found.sort();
    let mut expected = vec![first, second];
    expected.sort();

    assert_eq!(found, expected);
    assert!(
        harness
            .agent
            .find_instances(caller, &app_id("crm"))
            .await
            .expect("instances listed")
            .is_empty()
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn find_instances_rejects_unknown_apps_and_callers() {
    let harness = AgentHarness::with_default_resolver();
    let caller = harness.start("blotter").await;

    match harness.agent.find_instances(caller, &app_id("unknown")).await {
        Err(AgentError::NoAppsFound(missing)) => assert_eq!(missing, app_id("unknown")),
        other => panic!("expected NoAppsFound, got {other:?}"),
    }
    match harness
        .agent
        .find_instances(InstanceId::new(), &app_id("chart"))
        .await
    {
        Err(AgentError::UnknownInstance(_)) => {}
        other => panic!("expected UnknownInstance, got {other:?}"),
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn get_app_metadata_describes_apps_and_instances() {
    let harness = AgentHarness::with_default_resolver();
    let caller = harness.start("blotter").await;
    let chart = harness.start("chart").await;

    let app = harness
        .agent
        .get_app_metadata(caller, &AppIdentifier::app(app_id("crm")))
        .await
        .expect("app metadata returned");
    let instance = harness
        .agent
        .get_app_metadata(caller, &AppIdentifier::instance(app_id("chart"), chart))
        .await
        .expect("instance metadata returned");

    assert_eq!(app.app_id, app_id("crm"));
    assert_eq!(app.instance_id, None);
    assert_eq!(instance.app_id, app_id("chart"));
    assert_eq!(instance.instance_id, Some(chart));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn get_app_metadata_reports_unavailable_targets() {
    let harness = AgentHarness::with_default_resolver();
    let caller = harness.start("blotter").await;

    match harness
        .agent
        .get_app_metadata(caller, &AppIdentifier::instance(app_id("chart"), InstanceId::new()))
        .await
    {
        Err(AgentError::TargetInstanceUnavailable(_)) => {}
        other => panic!("expected TargetInstanceUnavailable, got {other:?}"),
    }
    match harness
        .agent
        .get_app_metadata(caller, &AppIdentifier::app(app_id("unknown")))
        .await
    {
        Err(AgentError::TargetAppUnavailable(missing)) => assert_eq!(missing, app_id("unknown")),
        other => panic!("expected TargetAppUnavailable, got {other:?}"),
    }
}
