//! Launching apps through the in-memory loader.

use std::sync::Arc;
use std::time::Duration;

use crate::apps::adapters::InMemoryModuleLoader;
use crate::apps::domain::AppId;
use crate::apps::ports::ModuleLoaderError;
use crate::apps::services::{AppLaunchError, AppLauncher, InstanceRegistry};
use rstest::rstest;
use std::collections::BTreeMap;

struct TestContext {
    loader: Arc<InMemoryModuleLoader>,
    launcher: AppLauncher<InMemoryModuleLoader>,
}

/// Builds the launcher inside the test runtime; the event pump needs one.
fn context() -> TestContext {
    let loader = Arc::new(InMemoryModuleLoader::new());
    let launcher = AppLauncher::spawn(
        Arc::clone(&loader),
        Arc::new(InstanceRegistry::new()),
        Duration::from_millis(100),
    );
    TestContext { loader, launcher }
}

fn app(value: &str) -> AppId {
    AppId::new(value).expect("valid app id")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn start_app_returns_once_running() {
    let context = context();

    let instance = context
        .launcher
        .start_app(&app("chart"), BTreeMap::new())
        .await
        .expect("app starts");

    assert!(context
        .launcher
        .registry()
        .is_running(instance.instance_id)
        .expect("readable"));
    let requests = context.loader.start_requests().expect("readable");
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests.first().map(|request| request.instance_id),
        Some(instance.instance_id)
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stalled_app_times_out() {
    let context = context();
    context.loader.stall_app(app("slow")).expect("stall configured");

    let result = context
        .launcher
        .start_app(&app("slow"), BTreeMap::new())
        .await;

    match result {
        Err(AppLaunchError::Timeout { app_id, .. }) => assert_eq!(app_id.as_str(), "slow"),
        other => panic!("expected Timeout, got {other:?}"),
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rejected_app_surfaces_the_loader_error() {
    let context = context();
    context.loader.reject_app(app("broken")).expect("reject configured");

    let result = context
        .launcher
        .start_app(&app("broken"), BTreeMap::new())
        .await;

    assert!(matches!(
        result,
        Err(AppLaunchError::Loader(ModuleLoaderError::UnknownApp(_)))
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stop_app_removes_the_instance() {
    let context = context();
    let instance = context
        .launcher
        .start_app(&app("chart"), BTreeMap::new())
        .await
        .expect("app starts");
    let mut stopped = context.launcher.registry().subscribe_stopped();

    context
        .launcher
        .stop_app(instance.instance_id)
        .await
        .expect("app stops");

    assert_eq!(stopped.recv().await.expect("stop announced"), instance.instance_id);
    assert!(!context
        .launcher
        .registry()
        .is_running(instance.instance_id)
        .expect("readable"));
}

#[rstest]
#[case::timed_out(Duration::from_millis(300))]
#[case::cancelled(Duration::from_millis(20))]
#[tokio::test(flavor = "multi_thread")]
async fn abandoned_launches_withdraw_their_start_waiter(#[case] wait: Duration) {
    let context = context();
    context.loader.stall_app(app("slow")).expect("stall configured");

    let outcome = tokio::time::timeout(
        wait,
        context.launcher.start_app(&app("slow"), BTreeMap::new()),
    )
    .await;

    match outcome {
        Ok(Err(AppLaunchError::Timeout { .. })) | Err(_) => {}
        other => panic!("expected the launch to be abandoned, got {other:?}"),
    }
    assert_eq!(
        context
            .launcher
            .registry()
            .pending_start_count()
            .expect("readable"),
        0
    );
}
