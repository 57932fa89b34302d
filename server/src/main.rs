use anyhow::Context;
use clap::Parser;
use holdem_server::actor::RoomEvent;
use holdem_server::broadcast::Fabric;
use holdem_server::config::Args;
use holdem_server::gateway;
use holdem_server::registry::Registry;
use holdem_server::store::Store;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const REAP_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    args.validate().context("invalid configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(args.log_level().context("invalid log level")?)
        .init();

    let store_url = args.store_url.as_deref().or(args.broker_url.as_deref());
    let store = Store::connect(store_url).await;
    let fabric = Fabric::connect(args.broker_url.as_deref());

    let registry = Registry::new(
        args.game_config(),
        args.room_idle_timeout_ms,
        store,
        fabric.clone(),
    );
    registry.clone().spawn_reaper(REAP_INTERVAL);

    // Multi-node mode only: fan sibling nodes' broadcasts out to whatever
    // local subscribers this node happens to hold for the same room.
    if let Fabric::Redis(redis_fabric) = fabric {
        let registry = registry.clone();
        tokio::spawn(async move {
            redis_fabric
                .run_subscriber(Arc::new(move |room_id: String, payload: Vec<u8>| {
                    let registry = registry.clone();
                    tokio::spawn(async move {
                        let Some(mailbox) = registry.get_existing(&room_id).await else {
                            return;
                        };
                        match serde_json::from_slice(&payload) {
                            Ok(state) => mailbox.send(RoomEvent::RemoteBroadcast { state }).await,
                            Err(err) => {
                                warn!(%err, room_id, "failed to decode remote room broadcast")
                            }
                        }
                    });
                }))
                .await;
        });
    }

    let app = gateway::router(registry);

    let addr = format!("0.0.0.0:{}", args.listen_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "holdem-server listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .context("axum server error")?;

    Ok(())
}
