//! Opening apps, handing over launch contexts, and describing instances.

use super::helpers::{Desktop, instrument, text};
use interop_hub::agent::{ErrorCode, Fdc3Operation};
use interop_hub::apps::domain::STARTUP_PARAM_OPENED_CONTEXT_ID;
use rstest::rstest;
use serde_json::{Value, json};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn opened_apps_collect_their_launch_context() -> eyre::Result<()> {
    let desktop = Desktop::start()?;
    let mut blotter = desktop.launch("blotter").await?;

    let (opened, collected) = tokio::join!(
        blotter.call(
            Fdc3Operation::Open,
            json!({ "appIdentifier": { "appId": "chart" }, "context": instrument("IBM") }),
        ),
        async {
            let launched = desktop.launched("chart").await?;
            let context_id = launched
                .parameters
                .get(STARTUP_PARAM_OPENED_CONTEXT_ID)
                .cloned()
                .ok_or_else(|| eyre::eyre!("no opened context id"))?;
            let mut chart = desktop.connect(launched.instance_id)?;
            let context = chart
                .call(
                    Fdc3Operation::GetOpenedAppContext,
                    json!({ "contextId": context_id }),
                )
                .await?;
            chart
                .call(
                    Fdc3Operation::AddContextListener,
                    json!({ "contextType": "fdc3.instrument" }),
                )
                .await?;
            Ok::<_, eyre::Report>((launched.instance_id, context))
        }
    );

    let opened = opened?;
    let (instance_id, context) = collected?;
    eyre::ensure!(
        text(&opened, "/appIdentifier/instanceId")? == instance_id.to_string(),
        "open returned {opened}"
    );
    eyre::ensure!(context.get("context") == Some(&instrument("IBM")), "got {context}");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn open_reports_unknown_apps_and_missing_listeners() -> eyre::Result<()> {
    let desktop = Desktop::start()?;
    let mut blotter = desktop.launch("blotter").await?;

    blotter
        .expect_error(
            Fdc3Operation::Open,
            json!({ "appIdentifier": { "appId": "spreadsheet" } }),
            ErrorCode::AppNotFound,
        )
        .await?;
    blotter
        .expect_error(
            Fdc3Operation::Open,
            json!({ "appIdentifier": { "appId": "chart" }, "context": instrument("IBM") }),
            ErrorCode::AppTimeout,
        )
        .await?;
    blotter
        .expect_error(
            Fdc3Operation::GetOpenedAppContext,
            json!({ "contextId": "not-a-uuid" }),
            ErrorCode::IdNotParsable,
        )
        .await
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn get_info_describes_the_calling_instance() -> eyre::Result<()> {
    let desktop = Desktop::start()?;
    let mut chart = desktop.launch("chart").await?;

    let info = chart.call(Fdc3Operation::GetInfo, json!({})).await?;

    eyre::ensure!(text(&info, "/implementationMetadata/fdc3Version")? == "2.0", "{info}");
    eyre::ensure!(
        text(&info, "/implementationMetadata/appMetadata/instanceId")?
            == chart.instance_id.to_string(),
        "{info}"
    );
    eyre::ensure!(
        info.pointer("/implementationMetadata/optionalFeatures/userChannelMembershipAPIs")
            == Some(&json!(true)),
        "{info}"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn instances_and_metadata_are_queryable() -> eyre::Result<()> {
    let desktop = Desktop::start()?;
    let mut blotter = desktop.launch("blotter").await?;
    let chart = desktop.launch("chart").await?;

    let instances = blotter
        .call(
            Fdc3Operation::FindInstances,
            json!({ "appIdentifier": { "appId": "chart" } }),
        )
        .await?;
    eyre::ensure!(
        instances.get("instances")
            == Some(&json!([{ "appId": "chart", "instanceId": chart.instance_id.to_string() }])),
        "{instances}"
    );

    let metadata = blotter
        .call(
            Fdc3Operation::GetAppMetadata,
            json!({ "appIdentifier": { "appId": "chart", "instanceId": chart.instance_id.to_string() } }),
        )
        .await?;
    eyre::ensure!(text(&metadata, "/appMetadata/name")? == "Chart", "{metadata}");

    blotter
        .expect_error(
            Fdc3Operation::FindInstances,
            json!({ "appIdentifier": { "appId": "spreadsheet" } }),
            ErrorCode::NoAppsFound,
        )
        .await?;
    let stopped = chart.instance_id;
    desktop.stop(stopped).await?;
    blotter
        .expect_error(
            Fdc3Operation::GetAppMetadata,
            json!({ "appIdentifier": { "appId": "chart", "instanceId": stopped.to_string() } }),
            ErrorCode::TargetInstanceUnavailable,
        )
        .await?;
    let after = blotter
        .call(
            Fdc3Operation::FindInstances,
            json!({ "appIdentifier": { "appId": "chart" } }),
        )
        .await?;
    eyre::ensure!(after.get("instances") == Some(&Value::Array(Vec::new())), "{after}");
    Ok(())
}
