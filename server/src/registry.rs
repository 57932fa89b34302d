use crate::actor::{Mailbox, RoomActor};
use crate::broadcast::Fabric;
use crate::store::Store;
use holdem_types::GameConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Duration;
use tracing::info;

/// Concurrent `roomId -> room actor handle` map. Rooms are created lazily
/// the first time any socket references an unseen id; this is the
/// documented first-writer-wins policy (no cross-node lease).
#[derive(Clone)]
pub struct Registry {
    rooms: Arc<RwLock<HashMap<String, Mailbox>>>,
    config: GameConfig,
    idle_timeout_ms: u64,
    store: Store,
    fabric: Fabric,
}

impl Registry {
    pub fn new(config: GameConfig, idle_timeout_ms: u64, store: Store, fabric: Fabric) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            config,
            idle_timeout_ms,
            store,
            fabric,
        }
    }

    pub async fn get_or_create(&self, room_id: &str) -> Mailbox {
        if let Some(mailbox) = self.rooms.read().await.get(room_id) {
            return mailbox.clone();
        }
        let mut rooms = self.rooms.write().await;
        if let Some(mailbox) = rooms.get(room_id) {
            return mailbox.clone();
        }
        info!(room_id, "creating room actor");
        let mailbox = RoomActor::spawn(
            room_id.to_string(),
            self.config,
            self.idle_timeout_ms,
            self.store.clone(),
            self.fabric.clone(),
        )
        .await;
        rooms.insert(room_id.to_string(), mailbox.clone());
        mailbox
    }

    /// Look up a room's mailbox without creating one. Used by the broadcast
    /// fabric's remote-subscriber loop: a sibling node's update is only
    /// worth delivering if this node already has an actor (and therefore
    /// possibly local subscribers) for that room.
    pub async fn get_existing(&self, room_id: &str) -> Option<Mailbox> {
        self.rooms.read().await.get(room_id).cloned()
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Periodically drop mailbox handles whose room actor has shut itself
    /// down. A room's task only exits once its mailbox's last sender is
    /// dropped, so this just prunes handles to actors nobody holds a live
    /// reference to anymore; it does not itself decide idleness.
    pub async fn reap_closed(&self) {
        let mut rooms = self.rooms.write().await;
        rooms.retain(|_, mailbox| !mailbox.is_closed());
    }

    pub fn spawn_reaper(self, interval: Duration) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.reap_closed().await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_room_id_reuses_one_actor() {
        let registry = Registry::new(
            GameConfig::default(),
            300_000,
            Store::connect(None).await,
            Fabric::connect(None),
        );
        let _ = registry.get_or_create("r1").await;
        let _ = registry.get_or_create("r1").await;
        let _ = registry.get_or_create("r2").await;
        assert_eq!(registry.room_count().await, 2);
    }

    #[tokio::test]
    async fn reap_closed_prunes_rooms_that_idled_out() {
        let registry = Registry::new(
            GameConfig::default(),
            20,
            Store::connect(None).await,
            Fabric::connect(None),
        );
        let _ = registry.get_or_create("r1").await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        registry.reap_closed().await;
        assert_eq!(registry.room_count().await, 0);
    }
}
