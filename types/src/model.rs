use crate::card::{Card, Deck};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub type PlayerId = String;
pub type RoomId = String;

/// One seated participant. `position` is the stable seat index assigned at
/// join and never renumbered when others leave.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub tiles: u64,
    pub hole_cards: Vec<Card>,
    pub is_folded: bool,
    pub is_spectator: bool,
    pub position: usize,
    pub connected: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: String, tiles: u64, position: usize) -> Self {
        Self {
            id,
            name,
            tiles,
            hole_cards: Vec::new(),
            is_folded: false,
            is_spectator: tiles == 0,
            position,
            connected: true,
        }
    }

    pub fn is_contending(&self) -> bool {
        !self.is_spectator && !self.is_folded
    }

    /// Eligible to be handed the turn: seated, not folded, and has chips to
    /// act with (an all-in player has none left to commit further).
    pub fn can_act(&self) -> bool {
        !self.is_spectator && !self.is_folded && self.tiles > 0
    }
}

/// The per-room game phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Lobby,
    Dealing,
    PreFlop,
    Flop,
    Turn,
    River,
    Reveal,
    Cleanup,
}

/// The game state machine's context. Holds everything needed to replay or
/// persist a room; the authoritative, non-redacted view.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomState {
    pub room_id: RoomId,
    pub players: Vec<Player>,
    /// Persisted (the recovery-only Store Adapter snapshot includes the
    /// deck per spec.md §6), never exposed through the redacted snapshot
    /// sent to clients — that hiding happens in `redact::redact_for`, not
    /// here.
    pub deck: Deck,
    pub community_cards: Vec<Card>,
    pub pot: u64,
    pub current_commitment: u64,
    pub round_bets: BTreeMap<PlayerId, u64>,
    #[serde(skip)]
    pub players_who_acted: BTreeSet<PlayerId>,
    pub active_player_index: Option<usize>,
    pub dealer_index: usize,
    pub phase: Phase,
    pub history: Vec<String>,
    pub created_at_ms: u64,
    pub last_activity_ms: u64,
}

impl RoomState {
    pub fn new(room_id: RoomId, now_ms: u64) -> Self {
        Self {
            room_id,
            players: Vec::new(),
            deck: Deck::default(),
            community_cards: Vec::new(),
            pot: 0,
            current_commitment: 0,
            round_bets: BTreeMap::new(),
            players_who_acted: BTreeSet::new(),
            active_player_index: None,
            dealer_index: 0,
            phase: Phase::Lobby,
            history: Vec::new(),
            created_at_ms: now_ms,
            last_activity_ms: now_ms,
        }
    }

    pub fn player_by_id(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_index_by_id(&self, id: &str) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    pub fn active_player(&self) -> Option<&Player> {
        self.active_player_index.and_then(|i| self.players.get(i))
    }

    pub fn log(&mut self, entry: impl Into<String>) {
        self.history.push(entry.into());
    }
}

/// Config constants the machine is parameterized over. Mirrors the
/// configuration keys every deployment must recognize.
#[derive(Clone, Copy, Debug)]
pub struct GameConfig {
    pub small_blind: u64,
    pub big_blind: u64,
    pub starting_tiles: u64,
    pub turn_timeout_ms: u64,
    pub reveal_delay_ms: u64,
    pub disconnect_grace_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            small_blind: 10,
            big_blind: 20,
            starting_tiles: 1000,
            turn_timeout_ms: 30_000,
            reveal_delay_ms: 5_000,
            disconnect_grace_ms: 60_000,
        }
    }
}

/// An intent submitted by a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentKind {
    Check,
    Commit,
    Fold,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub kind: IntentKind,
    pub amount: u64,
}

/// Events fed into the pure transition function.
#[derive(Clone, Debug)]
pub enum Event {
    Join { player_id: PlayerId, name: String },
    Rejoin { player_id: PlayerId },
    Disconnect { player_id: PlayerId },
    Leave { player_id: PlayerId },
    Start { player_id: PlayerId },
    PlayerIntent { player_id: PlayerId, intent: Intent },
    TimerExpiry { player_id: PlayerId, turn_token: u64 },
    RevealTimerExpiry,
}

/// Side effects the actor must execute after a transition settles. The
/// transition function never performs I/O itself; it only describes what
/// should happen.
#[derive(Clone, Debug)]
pub enum Effect {
    Persist,
    Broadcast,
    ArmTurnTimer { player_id: PlayerId, turn_token: u64, timeout_ms: u64 },
    DisarmTurnTimer,
    ArmRevealTimer { delay_ms: u64 },
}
