use crate::broadcast::Fabric;
use crate::store::{room_key, Store};
use holdem_types::{
    redact_for, transition, Effect, Event, GameConfig, Intent, PlayerId, RoomState, ServerMessage,
};
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Typed events a room's mailbox accepts, per the component's event list:
/// JOIN, LEAVE, START, INTENT, TIMER_EXPIRY, SUBSCRIBE, UNSUBSCRIBE.
pub enum RoomEvent {
    Join { player_id: PlayerId, name: String },
    Rejoin { player_id: PlayerId },
    Leave { player_id: PlayerId },
    Start { player_id: PlayerId },
    Intent { player_id: PlayerId, intent: Intent },
    TimerExpiry { player_id: PlayerId, turn_token: u64 },
    RevealTimerExpiry,
    DisconnectGraceExpiry { player_id: PlayerId, token: u64 },
    Subscribe { conn_id: Uuid, player_id: Option<PlayerId>, tx: mpsc::Sender<ServerMessage> },
    Unsubscribe { conn_id: Uuid },
    /// Fired by a delayed task armed whenever the subscriber set becomes
    /// empty. If still empty and `token` is still current when this lands,
    /// the room has had no subscriber for a full idle timeout and the actor
    /// shuts itself down (spec.md §3: "RoomState ... lives until the last
    /// subscriber leaves and a configurable idle timeout elapses").
    IdleTimeout { token: u64 },
    /// A room snapshot published by a sibling node's actor for this same
    /// room id, relayed here by this node's broadcast fabric subscriber.
    /// Replaces local state wholesale and fans out to local subscribers
    /// only — it is not re-persisted or re-published, since this node did
    /// not produce the transition.
    RemoteBroadcast { state: RoomState },
}

/// A clonable handle to a room's mailbox. Cheap to clone and share across
/// every socket task that touches this room.
#[derive(Clone)]
pub struct Mailbox {
    sender: mpsc::Sender<RoomEvent>,
}

impl Mailbox {
    pub async fn send(&self, event: RoomEvent) {
        if self.sender.send(event).await.is_err() {
            warn!("room actor mailbox closed, dropping event");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

struct Subscriber {
    player_id: Option<PlayerId>,
    tx: mpsc::Sender<ServerMessage>,
}

/// One serialized event queue per room. The game state machine itself
/// requires no locking; every mutation happens on this task's logical
/// thread of control.
pub struct RoomActor {
    state: RoomState,
    config: GameConfig,
    idle_timeout_ms: u64,
    store: Store,
    fabric: Fabric,
    subscribers: HashMap<Uuid, Subscriber>,
    turn_token: Arc<AtomicU64>,
    grace_tokens: HashMap<PlayerId, Arc<AtomicU64>>,
    idle_token: Arc<AtomicU64>,
    mailbox: mpsc::Sender<RoomEvent>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl RoomActor {
    /// Spawn the room's event loop and return a mailbox handle to it.
    ///
    /// Cold-start recovery: a room actor is created fresh unless the Store
    /// Adapter already holds a persisted context for this `roomId`, in
    /// which case it is rehydrated from there. Corrupt persisted state is
    /// not fatal — spec.md §7 treats it as if the room were absent.
    pub async fn spawn(
        room_id: String,
        config: GameConfig,
        idle_timeout_ms: u64,
        store: Store,
        fabric: Fabric,
    ) -> Mailbox {
        let state = Self::recover(&room_id, &store).await;
        let (tx, rx) = mpsc::channel(256);
        let mut actor = RoomActor {
            state,
            config,
            idle_timeout_ms,
            store,
            fabric,
            subscribers: HashMap::new(),
            turn_token: Arc::new(AtomicU64::new(0)),
            grace_tokens: HashMap::new(),
            idle_token: Arc::new(AtomicU64::new(0)),
            mailbox: tx.clone(),
        };
        actor.arm_idle_check();
        tokio::spawn(actor.run(rx));
        Mailbox { sender: tx }
    }

    async fn recover(room_id: &str, store: &Store) -> RoomState {
        let key = room_key(room_id);
        match store.get(&key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<RoomState>(&bytes) {
                Ok(state) => {
                    info!(room_id = %room_id, "recovered room state from store");
                    state
                }
                Err(err) => {
                    warn!(room_id = %room_id, %err, "corrupt persisted room state, starting fresh");
                    RoomState::new(room_id.to_string(), now_ms())
                }
            },
            Ok(None) => RoomState::new(room_id.to_string(), now_ms()),
            Err(err) => {
                warn!(room_id = %room_id, %err, "store read failed on cold start, starting fresh");
                RoomState::new(room_id.to_string(), now_ms())
            }
        }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<RoomEvent>) {
        while let Some(event) = rx.recv().await {
            self.state.last_activity_ms = now_ms();
            if self.handle(event).await {
                break;
            }
        }
        info!(room_id = %self.state.room_id, "room actor shutting down");
    }

    /// Returns `true` if the actor should shut down after this event.
    async fn handle(&mut self, room_event: RoomEvent) -> bool {
        match room_event {
            RoomEvent::Subscribe { conn_id, player_id, tx } => {
                self.subscribers.insert(conn_id, Subscriber { player_id: player_id.clone(), tx });
                if let Some(player_id) = player_id {
                    self.grace_tokens.remove(&player_id);
                    self.apply(Event::Rejoin { player_id }).await;
                } else {
                    self.broadcast().await;
                }
            }
            RoomEvent::Unsubscribe { conn_id } => {
                if let Some(sub) = self.subscribers.remove(&conn_id) {
                    if let Some(player_id) = sub.player_id {
                        self.apply(Event::Disconnect { player_id: player_id.clone() }).await;
                        self.start_disconnect_grace(player_id);
                    }
                }
                if self.subscribers.is_empty() {
                    self.arm_idle_check();
                }
            }
            RoomEvent::DisconnectGraceExpiry { player_id, token } => {
                let still_current = self
                    .grace_tokens
                    .get(&player_id)
                    .map(|t| t.load(Ordering::SeqCst) == token)
                    .unwrap_or(false);
                if still_current {
                    self.grace_tokens.remove(&player_id);
                    self.apply(Event::Leave { player_id }).await;
                }
            }
            RoomEvent::IdleTimeout { token } => {
                let still_current = self.idle_token.load(Ordering::SeqCst) == token;
                if still_current && self.subscribers.is_empty() {
                    info!(room_id = %self.state.room_id, "room idle timeout elapsed, closing");
                    return true;
                }
            }
            RoomEvent::Join { player_id, name } => {
                self.apply(Event::Join { player_id, name }).await;
            }
            RoomEvent::Rejoin { player_id } => {
                self.apply(Event::Rejoin { player_id }).await;
            }
            RoomEvent::Leave { player_id } => {
                self.apply(Event::Leave { player_id }).await;
            }
            RoomEvent::Start { player_id } => {
                self.apply(Event::Start { player_id }).await;
            }
            RoomEvent::Intent { player_id, intent } => {
                self.apply(Event::PlayerIntent { player_id, intent }).await;
            }
            RoomEvent::TimerExpiry { player_id, turn_token } => {
                if self.turn_token.load(Ordering::SeqCst) != turn_token {
                    debug!(%player_id, "ignoring stale turn timer");
                    return false;
                }
                self.apply(Event::TimerExpiry { player_id, turn_token }).await;
            }
            RoomEvent::RevealTimerExpiry => {
                self.apply(Event::RevealTimerExpiry).await;
            }
            RoomEvent::RemoteBroadcast { state } => {
                self.state = state;
                self.broadcast_local().await;
            }
        }
        false
    }

    /// Bump the idle generation and schedule a check. A subscriber arriving
    /// (or another idle check being armed) before it fires makes the token
    /// stale, the same pattern `start_disconnect_grace` uses.
    fn arm_idle_check(&mut self) {
        let token = self.idle_token.fetch_add(1, Ordering::SeqCst) + 1;
        let mailbox = self.mailbox.clone();
        let timeout_ms = self.idle_timeout_ms;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
            let _ = mailbox.send(RoomEvent::IdleTimeout { token }).await;
        });
    }

    fn start_disconnect_grace(&mut self, player_id: PlayerId) {
        let generation = Arc::new(AtomicU64::new(0));
        self.grace_tokens.insert(player_id.clone(), generation.clone());
        let mailbox = self.mailbox.clone();
        let grace_ms = self.config.disconnect_grace_ms;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(grace_ms)).await;
            let _ = mailbox
                .send(RoomEvent::DisconnectGraceExpiry {
                    player_id,
                    token: generation.load(Ordering::SeqCst),
                })
                .await;
        });
    }

    /// Run one event through the pure transition function, then execute the
    /// effects it asked for: persist, broadcast, arm/disarm timers, in that
    /// order, exactly as the component design specifies.
    async fn apply(&mut self, event: Event) {
        let state = std::mem::replace(&mut self.state, RoomState::new(String::new(), 0));
        let config = self.config;
        let (new_state, effects) = transition(
            state,
            event,
            &config,
            {
                let mut rng = rand::rngs::StdRng::from_entropy();
                move || holdem_types::Deck::shuffled(&mut rng)
            },
            {
                let token = self.turn_token.clone();
                move || token.fetch_add(1, Ordering::SeqCst) + 1
            },
        );
        self.state = new_state;

        for effect in effects {
            match effect {
                Effect::Persist => self.persist().await,
                Effect::Broadcast => self.broadcast().await,
                Effect::ArmTurnTimer { player_id, turn_token, timeout_ms } => {
                    self.turn_token.store(turn_token, Ordering::SeqCst);
                    let mailbox = self.mailbox.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
                        let _ = mailbox
                            .send(RoomEvent::TimerExpiry { player_id, turn_token })
                            .await;
                    });
                }
                Effect::DisarmTurnTimer => {
                    // Bumping here would also invalidate an Arm issued in the
                    // same batch of effects, so disarm is a no-op: a stale
                    // timer is already caught by the turn_token comparison
                    // in `handle`.
                }
                Effect::ArmRevealTimer { delay_ms } => {
                    let mailbox = self.mailbox.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        let _ = mailbox.send(RoomEvent::RevealTimerExpiry).await;
                    });
                }
            }
        }
    }

    async fn persist(&self) {
        let key = room_key(&self.state.room_id);
        match serde_json::to_vec(&self.state) {
            Ok(bytes) => {
                if let Err(err) = self.store.set(&key, bytes).await {
                    warn!(%err, room_id = %self.state.room_id, "store write failed, in-memory state remains canonical");
                }
            }
            Err(err) => warn!(%err, "failed to serialize room state for persistence"),
        }
    }

    /// Deliver the current state to every locally connected subscriber.
    /// Used both after a local transition (followed by a fabric publish so
    /// sibling nodes' subscribers see it too) and when relaying a sibling
    /// node's broadcast, which must not itself be re-published.
    async fn broadcast_local(&mut self) {
        let mut dead = Vec::new();
        for (conn_id, sub) in self.subscribers.iter() {
            let view = redact_for(&self.state, sub.player_id.as_deref());
            let message = ServerMessage::GameState { state: view };
            if sub.tx.send(message).await.is_err() {
                dead.push(*conn_id);
            }
        }
        for conn_id in dead {
            self.subscribers.remove(&conn_id);
        }
    }

    async fn broadcast(&mut self) {
        self.broadcast_local().await;

        if let Ok(payload) = serde_json::to_vec(&self.state) {
            if let Err(err) = self.fabric.publish(&self.state.room_id, payload).await {
                warn!(%err, room_id = %self.state.room_id, "broadcast fabric publish failed, continuing with local delivery only");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holdem_types::{IntentKind, Phase};

    async fn next_game_state(rx: &mut mpsc::Receiver<ServerMessage>) -> holdem_types::PublicRoomState {
        loop {
            match rx.recv().await.expect("mailbox closed before a gameState arrived") {
                ServerMessage::GameState { state } => return state,
                _ => continue,
            }
        }
    }

    const TEST_IDLE_TIMEOUT_MS: u64 = 60_000;

    async fn spawn_test_room() -> Mailbox {
        let store = Store::connect(None).await;
        let fabric = Fabric::connect(None);
        RoomActor::spawn(
            "r1".to_string(),
            GameConfig::default(),
            TEST_IDLE_TIMEOUT_MS,
            store,
            fabric,
        )
        .await
    }

    async fn spawn_test_room_with_config(config: GameConfig) -> Mailbox {
        let store = Store::connect(None).await;
        let fabric = Fabric::connect(None);
        RoomActor::spawn("r1".to_string(), config, TEST_IDLE_TIMEOUT_MS, store, fabric).await
    }

    #[tokio::test]
    async fn room_actor_closes_after_idle_timeout_with_no_subscribers() {
        let store = Store::connect(None).await;
        let fabric = Fabric::connect(None);
        let mailbox =
            RoomActor::spawn("r1".to_string(), GameConfig::default(), 20, store, fabric).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(mailbox.is_closed());
    }

    #[tokio::test]
    async fn room_actor_with_an_active_subscriber_does_not_idle_out() {
        let store = Store::connect(None).await;
        let fabric = Fabric::connect(None);
        let mailbox =
            RoomActor::spawn("r1".to_string(), GameConfig::default(), 20, store, fabric).await;
        let (tx, _rx) = mpsc::channel(16);
        mailbox
            .send(RoomEvent::Subscribe { conn_id: Uuid::new_v4(), player_id: None, tx })
            .await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!mailbox.is_closed());
    }

    #[tokio::test]
    async fn join_then_subscribe_delivers_own_hole_cards_only_to_owner() {
        let mailbox = spawn_test_room().await;
        let (tx1, mut rx1) = mpsc::channel(16);
        let (tx2, mut rx2) = mpsc::channel(16);

        mailbox
            .send(RoomEvent::Subscribe { conn_id: Uuid::new_v4(), player_id: Some("p1".into()), tx: tx1 })
            .await;
        mailbox.send(RoomEvent::Join { player_id: "p1".into(), name: "P1".into() }).await;
        mailbox
            .send(RoomEvent::Subscribe { conn_id: Uuid::new_v4(), player_id: Some("p2".into()), tx: tx2 })
            .await;
        mailbox.send(RoomEvent::Join { player_id: "p2".into(), name: "P2".into() }).await;
        mailbox.send(RoomEvent::Start { player_id: "p1".into() }).await;

        // Drain to the post-deal snapshot for each subscriber.
        let mut view1 = next_game_state(&mut rx1).await;
        while view1.phase != Phase::PreFlop {
            view1 = next_game_state(&mut rx1).await;
        }
        let mut view2 = next_game_state(&mut rx2).await;
        while view2.phase != Phase::PreFlop {
            view2 = next_game_state(&mut rx2).await;
        }

        let p1_self = view1.players.iter().find(|p| p.id == "p1").unwrap();
        assert_eq!(p1_self.hole_cards.len(), 2);
        let p1_as_seen_by_p2 = view2.players.iter().find(|p| p.id == "p1").unwrap();
        assert!(p1_as_seen_by_p2.hole_cards.is_empty());
    }

    #[tokio::test]
    async fn all_fold_to_bb_ends_hand_uncontested() {
        let mailbox = spawn_test_room().await;
        let (tx, mut rx) = mpsc::channel(16);
        mailbox
            .send(RoomEvent::Subscribe { conn_id: Uuid::new_v4(), player_id: Some("p1".into()), tx })
            .await;
        mailbox.send(RoomEvent::Join { player_id: "p1".into(), name: "P1".into() }).await;
        mailbox.send(RoomEvent::Join { player_id: "p2".into(), name: "P2".into() }).await;
        mailbox.send(RoomEvent::Join { player_id: "p3".into(), name: "P3".into() }).await;
        mailbox.send(RoomEvent::Start { player_id: "p1".into() }).await;

        mailbox
            .send(RoomEvent::Intent {
                player_id: "p3".into(),
                intent: Intent { kind: IntentKind::Fold, amount: 0 },
            })
            .await;
        mailbox
            .send(RoomEvent::Intent {
                player_id: "p1".into(),
                intent: Intent { kind: IntentKind::Fold, amount: 0 },
            })
            .await;

        let mut view = next_game_state(&mut rx).await;
        while view.phase != Phase::Reveal {
            view = next_game_state(&mut rx).await;
        }
        let p2 = view.players.iter().find(|p| p.id == "p2").unwrap();
        assert_eq!(p2.tiles, 1010);
        assert_eq!(view.pot, 0);
    }

    #[tokio::test]
    async fn remote_broadcast_relays_to_local_subscribers_without_persisting() {
        let mailbox = spawn_test_room().await;
        let (tx, mut rx) = mpsc::channel(16);
        mailbox
            .send(RoomEvent::Subscribe { conn_id: Uuid::new_v4(), player_id: None, tx })
            .await;
        // Drain the initial spectator snapshot from the Subscribe handler.
        let _ = next_game_state(&mut rx).await;

        let mut remote_state = RoomState::new("r1".into(), 0);
        remote_state.history.push("relayed from sibling node".into());
        mailbox
            .send(RoomEvent::RemoteBroadcast { state: remote_state })
            .await;

        let view = next_game_state(&mut rx).await;
        assert_eq!(view.history, vec!["relayed from sibling node".to_string()]);
    }

    #[tokio::test]
    async fn turn_timeout_forces_fold_and_advances_action() {
        let config = GameConfig {
            turn_timeout_ms: 20,
            ..GameConfig::default()
        };
        let mailbox = spawn_test_room_with_config(config).await;
        let (tx, mut rx) = mpsc::channel(16);
        mailbox
            .send(RoomEvent::Subscribe { conn_id: Uuid::new_v4(), player_id: None, tx })
            .await;
        mailbox.send(RoomEvent::Join { player_id: "p1".into(), name: "P1".into() }).await;
        mailbox.send(RoomEvent::Join { player_id: "p2".into(), name: "P2".into() }).await;
        mailbox.send(RoomEvent::Join { player_id: "p3".into(), name: "P3".into() }).await;
        mailbox.send(RoomEvent::Start { player_id: "p1".into() }).await;

        // Dealer=p1, so SB=p1, BB=p2, first to act preflop is p3 (UTG).
        // Nobody ever sends p3 an intent, so the turn timer fires the
        // automatic fold once it expires.
        let mut view = next_game_state(&mut rx).await;
        while view.phase != Phase::PreFlop {
            view = next_game_state(&mut rx).await;
        }
        assert_eq!(view.active_player_index, Some(2));

        while !view.history.iter().any(|entry| entry == "p3 folds") {
            view = next_game_state(&mut rx).await;
        }
        let p3 = view.players.iter().find(|p| p.id == "p3").unwrap();
        assert!(p3.is_folded);
        assert_eq!(view.active_player_index, Some(0));
    }
}
