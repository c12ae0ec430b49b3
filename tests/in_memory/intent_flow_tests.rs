//! Finding, raising and answering intents across instances.

use super::helpers::{Desktop, contact, instrument, text};
use interop_hub::agent::{ErrorCode, Fdc3Operation};
use interop_hub::intents::raise_intent_topic;
use rstest::rstest;
use serde_json::{Value, json};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn find_intent_lists_directory_apps_and_running_instances() -> eyre::Result<()> {
    let desktop = Desktop::start()?;
    let mut blotter = desktop.launch("blotter").await?;
    let crm = desktop.launch("crm").await?;

    let found = blotter
        .call(
            Fdc3Operation::FindIntent,
            json!({ "intent": "ViewContact", "contextType": "fdc3.contact" }),
        )
        .await?;

    let apps = found
        .pointer("/appIntent/apps")
        .and_then(Value::as_array)
        .ok_or_else(|| eyre::eyre!("no apps in {found}"))?;
    eyre::ensure!(
        apps.iter().all(|app| app.get("appId") == Some(&json!("crm"))),
        "unexpected handler in {found}"
    );
    eyre::ensure!(
        apps.iter()
            .any(|app| app.get("instanceId") == Some(&json!(crm.instance_id.to_string()))),
        "running instance missing from {found}"
    );

    let by_context = blotter
        .call(
            Fdc3Operation::FindIntentsByContext,
            json!({ "context": instrument("AAPL") }),
        )
        .await?;
    eyre::ensure!(
        text(&by_context, "/appIntents/0/intent/name")? == "ViewChart",
        "unexpected intents in {by_context}"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn raised_intents_are_delivered_and_answered_once() -> eyre::Result<()> {
    let desktop = Desktop::start()?;
    let mut blotter = desktop.launch("blotter").await?;
    let mut crm = desktop.launch("crm").await?;
    crm.client
        .subscribe(&raise_intent_topic("ViewContact", crm.instance_id))?;
    crm.call(
        Fdc3Operation::AddIntentListener,
        json!({ "intent": "ViewContact", "state": "subscribe" }),
    )
    .await?;

    let raised = blotter
        .call(
            Fdc3Operation::RaiseIntent,
            json!({
                "intent": "ViewContact",
                "context": contact("jane@example.com"),
                "app": { "appId": "crm", "instanceId": crm.instance_id.to_string() },
            }),
        )
        .await?;
    let message_id = text(&raised, "/intentResolution/messageId")?.to_owned();
    eyre::ensure!(
        text(&raised, "/intentResolution/source/instanceId")? == crm.instance_id.to_string(),
        "resolved to the wrong instance: {raised}"
    );

    let delivered = crm.next_message().await?;
    let payload = delivered.payload.ok_or_else(|| eyre::eyre!("empty delivery"))?;
    eyre::ensure!(text(&payload, "/messageId")? == message_id, "wrong delivery");
    eyre::ensure!(
        payload.get("context") == Some(&contact("jane@example.com")),
        "wrong context delivered"
    );

    crm.call(
        Fdc3Operation::StoreIntentResult,
        json!({
            "messageId": message_id,
            "intent": "ViewContact",
            "originInstanceId": blotter.instance_id.to_string(),
            "targetInstanceId": crm.instance_id.to_string(),
            "result": { "context": contact("jane.doe@example.com") },
        }),
    )
    .await?;
    let target = json!({ "appId": "crm", "instanceId": crm.instance_id.to_string() });
    let result = blotter
        .call(
            Fdc3Operation::GetIntentResult,
            json!({ "messageId": message_id, "intent": "ViewContact", "targetAppIdentifier": target }),
        )
        .await?;
    eyre::ensure!(
        result.pointer("/intentResult/context") == Some(&contact("jane.doe@example.com")),
        "unexpected result {result}"
    );

    blotter
        .expect_error(
            Fdc3Operation::GetIntentResult,
            json!({ "messageId": message_id, "intent": "ViewContact", "targetAppIdentifier": target }),
            ErrorCode::IntentDeliveryFailed,
        )
        .await
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn raising_an_unhandled_intent_finds_no_apps() -> eyre::Result<()> {
    let desktop = Desktop::start()?;
    let mut blotter = desktop.launch("blotter").await?;

    blotter
        .expect_error(
            Fdc3Operation::RaiseIntent,
            json!({ "intent": "StartChat", "context": contact("jane@example.com") }),
            ErrorCode::NoAppsFound,
        )
        .await
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn intent_listeners_unsubscribe_idempotently() -> eyre::Result<()> {
    let desktop = Desktop::start()?;
    let mut crm = desktop.launch("crm").await?;

    let subscribed = crm
        .call(
            Fdc3Operation::AddIntentListener,
            json!({ "intent": "ViewContact", "state": "subscribe" }),
        )
        .await?;
    eyre::ensure!(subscribed.get("stored") == Some(&json!(true)), "{subscribed}");
    for _ in 0..2 {
        crm.call(
            Fdc3Operation::AddIntentListener,
            json!({ "intent": "ViewContact", "state": "unsubscribe" }),
        )
        .await?;
    }
    crm.expect_error(
        Fdc3Operation::AddIntentListener,
        json!({ "intent": "StartCall", "state": "unsubscribe" }),
        ErrorCode::MissingId,
    )
    .await
}
