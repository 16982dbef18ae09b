use std::sync::Arc;

use flashplay_host::{
    spawn_session, ChannelSurface, DeckId, HostConfig, HttpCardGateway, SessionController,
};
use tokio::io::BufReader;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod bridge;

use bridge::Outbound;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // stdout carries the bridge protocol, so logs go to stderr
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = HostConfig::from_env();
    tracing::info!(
        origin = %config.host_origin,
        api_url = %config.api_url,
        plugin_route = %config.plugin_route,
        timeout_secs = config.completion_timeout_secs,
        "starting flashplay runner"
    );

    let gateway = match HttpCardGateway::new(&config.api_url, config.gateway_timeout()) {
        Ok(g) => g,
        Err(e) => {
            tracing::error!("invalid card API configuration: {e}");
            std::process::exit(1);
        }
    };

    // Backend health is informational; decks are fetched lazily
    match gateway.health().await {
        Ok(status) if (200..300).contains(&status) => {
            tracing::info!(status, "card backend is healthy");
        }
        Ok(status) => tracing::warn!(status, "card backend reported unhealthy"),
        Err(e) => tracing::warn!("card backend unreachable: {e}"),
    }

    let (surface, mut surface_rx) = ChannelSurface::new();
    let controller = match SessionController::new(&config, Arc::new(gateway), Arc::new(surface))
    {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("invalid host configuration: {e}");
            std::process::exit(1);
        }
    };

    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let session = spawn_session(controller, cmd_rx, shutdown_rx);

    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(bridge::write_outbound(out_rx, tokio::io::stdout()));

    let forward_tx = out_tx.clone();
    tokio::spawn(async move {
        while let Some(command) = surface_rx.recv().await {
            if forward_tx.send(Outbound::Surface(command)).is_err() {
                break;
            }
        }
    });

    if let Some(deck) = std::env::args().nth(1) {
        bridge::request_deck(&cmd_tx, &out_tx, DeckId::from(deck)).await;
    }

    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = bridge::read_inbound(stdin, cmd_tx, out_tx) => match result {
            Ok(()) => tracing::info!("input closed"),
            Err(e) => tracing::error!("failed to read bridge input: {e}"),
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received interrupt");
        }
    }

    let _ = shutdown_tx.send(true);
    if let Err(e) = session.await {
        tracing::error!("session task failed: {e}");
    }

    // Drain what the session produced before exiting
    match writer.await {
        Ok(Err(e)) => tracing::warn!("failed to write bridge output: {e}"),
        Err(e) => tracing::error!("bridge writer task failed: {e}"),
        Ok(Ok(())) => {}
    }
    tracing::info!("flashplay runner stopped");
    // A pending blocking stdin read would keep the runtime from shutting down
    std::process::exit(0);
}
