use crate::model::PlayerId;
use crate::redact::PublicRoomState;
use serde::{Deserialize, Serialize};

/// Inbound wire messages. Tagged on `event` (not `type`) so the intent
/// payload can carry its own `type` field (`COMMIT`/`FOLD`/`CHECK`/`PASS`)
/// without colliding with the outer discriminant.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinRoom {
        room_id: String,
        nickname: String,
        player_id: Option<PlayerId>,
    },
    StartGame,
    SendIntent {
        #[serde(rename = "type")]
        kind: WireIntentKind,
        amount: Option<u64>,
    },
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum WireIntentKind {
    Commit,
    Fold,
    Check,
    Pass,
}

/// Outbound wire messages, tagged the same way on `event`.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerMessage {
    JoinedRoom {
        room_id: String,
        player_id: PlayerId,
    },
    GameState {
        #[serde(flatten)]
        state: PublicRoomState,
    },
    Error {
        message: String,
    },
}
