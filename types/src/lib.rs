pub mod card;
pub mod engine;
pub mod evaluator;
pub mod model;
pub mod redact;
pub mod wire;

pub use card::{Card, Deck, Rank, Suit};
pub use engine::transition;
pub use evaluator::{evaluate_hand, Category, HandResult};
pub use model::{Effect, Event, GameConfig, Intent, IntentKind, Phase, Player, PlayerId, RoomState};
pub use redact::{redact_for, PublicPlayer, PublicRoomState};
pub use wire::{ClientMessage, ServerMessage, WireIntentKind};
