use crate::error::BroadcastError;
use futures_util::StreamExt;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Cross-process fan-out. Single-node mode needs nothing: the room actor's
/// own subscriber registry already delivers to every locally connected
/// socket. Multi-node mode additionally publishes every broadcast to a
/// per-room pub/sub channel so sibling nodes can fan it out to *their*
/// locally connected sockets.
pub trait BroadcastFabric: Send + Sync {
    fn publish(
        &self,
        room_id: &str,
        payload: Vec<u8>,
    ) -> impl std::future::Future<Output = Result<(), BroadcastError>> + Send;
}

#[derive(Clone, Default)]
pub struct LocalFabric;

impl BroadcastFabric for LocalFabric {
    async fn publish(&self, _room_id: &str, _payload: Vec<u8>) -> Result<(), BroadcastError> {
        Ok(())
    }
}

/// Wire envelope for a published broadcast: `origin` lets every node's own
/// subscriber loop recognize and skip the copy redis echoes back to the
/// publisher on `psubscribe`, rather than re-delivering its own broadcast to
/// itself a second time.
#[derive(Serialize, Deserialize)]
struct Envelope {
    origin: Uuid,
    state: serde_json::Value,
}

#[derive(Clone)]
pub struct RedisFabric {
    client: redis::Client,
    node_id: Uuid,
}

impl RedisFabric {
    pub fn new(url: &str) -> Result<Self, BroadcastError> {
        Ok(Self {
            client: redis::Client::open(url)?,
            node_id: Uuid::new_v4(),
        })
    }

    pub fn channel(room_id: &str) -> String {
        format!("room:{room_id}:updates")
    }

    /// Subscribe to every room's update channel and invoke `on_message` for
    /// each inbound payload originated by a sibling node. Runs until the
    /// connection drops; the caller is expected to `tokio::spawn` this and
    /// let remote deliveries degrade to "no other node heard this" rather
    /// than crash the process, matching the "broker drops mid-run: continue
    /// with local broadcast" policy.
    pub async fn run_subscriber(
        &self,
        on_message: Arc<dyn Fn(String, Vec<u8>) + Send + Sync>,
    ) {
        let mut pubsub = match self.client.get_async_pubsub().await {
            Ok(conn) => conn,
            Err(err) => {
                error!(%err, "broadcast fabric: failed to open pubsub connection");
                return;
            }
        };
        if let Err(err) = pubsub.psubscribe("room:*:updates").await {
            error!(%err, "broadcast fabric: failed to subscribe to room channels");
            return;
        }
        info!("broadcast fabric: subscribed to room:*:updates");

        let mut stream = pubsub.on_message();
        while let Some(msg) = stream.next().await {
            let channel: String = msg.get_channel_name().to_string();
            let Some(room_id) = channel
                .strip_prefix("room:")
                .and_then(|s| s.strip_suffix(":updates"))
            else {
                continue;
            };
            let raw: Vec<u8> = match msg.get_payload() {
                Ok(p) => p,
                Err(err) => {
                    warn!(%err, "broadcast fabric: failed to decode pub/sub payload");
                    continue;
                }
            };
            let envelope: Envelope = match serde_json::from_slice(&raw) {
                Ok(e) => e,
                Err(err) => {
                    warn!(%err, "broadcast fabric: failed to decode broadcast envelope");
                    continue;
                }
            };
            if envelope.origin == self.node_id {
                continue;
            }
            let payload = match serde_json::to_vec(&envelope.state) {
                Ok(p) => p,
                Err(err) => {
                    warn!(%err, "broadcast fabric: failed to re-encode remote room state");
                    continue;
                }
            };
            on_message(room_id.to_string(), payload);
        }
        warn!("broadcast fabric: subscriber stream ended");
    }
}

impl BroadcastFabric for RedisFabric {
    async fn publish(&self, room_id: &str, payload: Vec<u8>) -> Result<(), BroadcastError> {
        let state: serde_json::Value = serde_json::from_slice(&payload)?;
        let envelope = Envelope {
            origin: self.node_id,
            state,
        };
        let bytes = serde_json::to_vec(&envelope)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.publish(Self::channel(room_id), bytes).await?;
        Ok(())
    }
}

/// Either backend behind one handle, selected the same way the Store
/// Adapter is: unreachable at startup degrades to single-node + memory,
/// logged once.
#[derive(Clone)]
pub enum Fabric {
    Local(LocalFabric),
    Redis(RedisFabric),
}

impl Fabric {
    pub fn connect(broker_url: Option<&str>) -> Self {
        match broker_url {
            None => Fabric::Local(LocalFabric),
            Some(url) => match RedisFabric::new(url) {
                Ok(fabric) => Fabric::Redis(fabric),
                Err(err) => {
                    warn!(%err, "broadcast fabric: failed to configure redis, falling back to single-node");
                    Fabric::Local(LocalFabric)
                }
            },
        }
    }

    pub async fn publish(&self, room_id: &str, payload: Vec<u8>) -> Result<(), BroadcastError> {
        match self {
            Fabric::Local(f) => f.publish(room_id, payload).await,
            Fabric::Redis(f) => f.publish(room_id, payload).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_fabric_publish_is_a_no_op() {
        let fabric = LocalFabric;
        assert!(fabric.publish("r1", b"hi".to_vec()).await.is_ok());
    }

    #[test]
    fn redis_channel_name_is_room_scoped() {
        assert_eq!(RedisFabric::channel("abc"), "room:abc:updates");
    }
}
