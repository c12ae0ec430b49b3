//! Context sharing between instances over user, app and private channels.

use super::helpers::{Desktop, instrument, text};
use interop_hub::agent::{ErrorCode, Fdc3Operation, context_listener_topic};
use rstest::rstest;
use serde_json::{Value, json};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn user_channel_broadcasts_reach_listeners_of_joined_instances() -> eyre::Result<()> {
    let desktop = Desktop::start()?;
    let mut chart = desktop.launch("chart").await?;
    let mut blotter = desktop.launch("blotter").await?;
    blotter
        .client
        .subscribe(&context_listener_topic(blotter.instance_id))?;

    let added = blotter
        .call(
            Fdc3Operation::AddContextListener,
            json!({ "contextType": "fdc3.instrument" }),
        )
        .await?;
    let listener_id = text(&added, "/listenerId")?.to_owned();
    for member in [&mut chart, &mut blotter] {
        member
            .call(
                Fdc3Operation::JoinUserChannel,
                json!({ "channelId": "fdc3.channel.2" }),
            )
            .await?;
    }
    chart
        .call(
            Fdc3Operation::Broadcast,
            json!({ "channelId": "fdc3.channel.2", "context": instrument("AAPL") }),
        )
        .await?;

    let delivered = blotter.next_message().await?;
    let payload = delivered.payload.ok_or_else(|| eyre::eyre!("empty delivery"))?;
    eyre::ensure!(text(&payload, "/listenerId")? == listener_id, "wrong listener");
    eyre::ensure!(payload.get("context") == Some(&instrument("AAPL")), "wrong context");

    let current = blotter
        .call(
            Fdc3Operation::GetCurrentContext,
            json!({ "channelId": "fdc3.channel.2", "contextType": "fdc3.instrument" }),
        )
        .await?;
    eyre::ensure!(current.get("context") == Some(&instrument("AAPL")), "context not cached");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn leaving_a_user_channel_clears_the_current_channel() -> eyre::Result<()> {
    let desktop = Desktop::start()?;
    let mut blotter = desktop.launch("blotter").await?;

    let joined = blotter
        .call(
            Fdc3Operation::JoinUserChannel,
            json!({ "channelId": "fdc3.channel.4" }),
        )
        .await?;
    let current = blotter
        .call(Fdc3Operation::GetCurrentChannel, json!({}))
        .await?;
    eyre::ensure!(current.get("channel") == joined.get("channel"), "join not reflected");

    blotter
        .call(Fdc3Operation::LeaveCurrentChannel, json!({}))
        .await?;
    let left = blotter
        .call(Fdc3Operation::GetCurrentChannel, json!({}))
        .await?;
    eyre::ensure!(left.get("channel") == Some(&Value::Null), "still on a channel: {left}");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn app_channels_are_shared_by_id() -> eyre::Result<()> {
    let desktop = Desktop::start()?;
    let mut chart = desktop.launch("chart").await?;
    let mut blotter = desktop.launch("blotter").await?;
    blotter
        .client
        .subscribe(&context_listener_topic(blotter.instance_id))?;

    chart
        .call(Fdc3Operation::CreateAppChannel, json!({ "channelId": "prices" }))
        .await?;
    let found = blotter
        .call(
            Fdc3Operation::FindChannel,
            json!({ "channelId": "prices", "channelType": "app" }),
        )
        .await?;
    eyre::ensure!(text(&found, "/channel/id")? == "prices", "wrong channel: {found}");
    blotter
        .call(
            Fdc3Operation::AddContextListener,
            json!({ "channelId": "prices", "channelType": "app" }),
        )
        .await?;
    chart
        .call(
            Fdc3Operation::Broadcast,
            json!({ "channelId": "prices", "channelType": "app", "context": instrument("MSFT") }),
        )
        .await?;

    let delivered = blotter.next_message().await?;
    let payload = delivered.payload.ok_or_else(|| eyre::eyre!("empty delivery"))?;
    eyre::ensure!(payload.get("context") == Some(&instrument("MSFT")), "wrong context");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn private_channels_admit_one_peer() -> eyre::Result<()> {
    let desktop = Desktop::start()?;
    let mut creator = desktop.launch("chart").await?;
    let mut peer = desktop.launch("crm").await?;
    let mut outsider = desktop.launch("blotter").await?;

    let created = creator
        .call(Fdc3Operation::CreatePrivateChannel, json!({}))
        .await?;
    let channel_id = text(&created, "/channel/id")?.to_owned();

    peer.call(
        Fdc3Operation::ConnectPrivateChannel,
        json!({ "channelId": channel_id }),
    )
    .await?;
    outsider
        .expect_error(
            Fdc3Operation::ConnectPrivateChannel,
            json!({ "channelId": channel_id }),
            ErrorCode::AccessDenied,
        )
        .await?;
    outsider
        .expect_error(
            Fdc3Operation::FindChannel,
            json!({ "channelId": "fdc3.channel.9" }),
            ErrorCode::NoChannelFound,
        )
        .await
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn malformed_contexts_are_rejected() -> eyre::Result<()> {
    let desktop = Desktop::start()?;
    let mut chart = desktop.launch("chart").await?;
    chart
        .call(
            Fdc3Operation::JoinUserChannel,
            json!({ "channelId": "fdc3.channel.1" }),
        )
        .await?;

    chart
        .expect_error(
            Fdc3Operation::Broadcast,
            json!({ "channelId": "fdc3.channel.1", "context": { "id": "untyped" } }),
            ErrorCode::MalformedContext,
        )
        .await
}
