use crate::model::{Phase, Player, PlayerId, RoomState};
use serde::Serialize;

/// The per-recipient view of a room: a deep, redacted copy. Never built by
/// mutating the live `RoomState` — this is a pure projection.
#[derive(Clone, Debug, Serialize)]
pub struct PublicRoomState {
    pub room_id: String,
    pub players: Vec<PublicPlayer>,
    pub community_cards: Vec<crate::card::Card>,
    pub pot: u64,
    pub current_commitment: u64,
    pub active_player_index: Option<usize>,
    pub dealer_index: usize,
    pub phase: Phase,
    pub history: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PublicPlayer {
    pub id: PlayerId,
    pub name: String,
    pub tiles: u64,
    pub hole_cards: Vec<crate::card::Card>,
    pub is_folded: bool,
    pub is_spectator: bool,
    pub position: usize,
    pub connected: bool,
}

/// Redact `state` for the given viewer. `viewer` is `None` for a spectator
/// socket. Hole cards of every other player are hidden; at REVEAL, every
/// non-folded player's cards become visible to everyone.
pub fn redact_for(state: &RoomState, viewer: Option<&str>) -> PublicRoomState {
    let reveal_all = state.phase == Phase::Reveal;
    PublicRoomState {
        room_id: state.room_id.clone(),
        players: state
            .players
            .iter()
            .map(|p| redact_player(p, viewer, reveal_all))
            .collect(),
        community_cards: state.community_cards.clone(),
        pot: state.pot,
        current_commitment: state.current_commitment,
        active_player_index: state.active_player_index,
        dealer_index: state.dealer_index,
        phase: state.phase,
        history: state.history.clone(),
    }
}

fn redact_player(p: &Player, viewer: Option<&str>, reveal_all: bool) -> PublicPlayer {
    let is_owner = viewer == Some(p.id.as_str());
    let visible = is_owner || (reveal_all && !p.is_folded);
    PublicPlayer {
        id: p.id.clone(),
        name: p.name.clone(),
        tiles: p.tiles,
        hole_cards: if visible { p.hole_cards.clone() } else { Vec::new() },
        is_folded: p.is_folded,
        is_spectator: p.is_spectator,
        position: p.position,
        connected: p.connected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{Card, Rank, Suit};

    fn state_with_two_players() -> RoomState {
        let mut state = RoomState::new("r1".into(), 0);
        let mut p1 = Player::new("p1".into(), "Alice".into(), 1000, 0);
        p1.hole_cards = vec![
            Card::new(Suit::Spades, Rank::new_unchecked(14)),
            Card::new(Suit::Hearts, Rank::new_unchecked(13)),
        ];
        let mut p2 = Player::new("p2".into(), "Bob".into(), 1000, 1);
        p2.hole_cards = vec![
            Card::new(Suit::Clubs, Rank::new_unchecked(2)),
            Card::new(Suit::Diamonds, Rank::new_unchecked(7)),
        ];
        state.players = vec![p1, p2];
        state.phase = Phase::PreFlop;
        state
    }

    #[test]
    fn other_players_hole_cards_are_hidden() {
        let state = state_with_two_players();
        let view = redact_for(&state, Some("p1"));
        assert_eq!(view.players[0].hole_cards.len(), 2);
        assert!(view.players[1].hole_cards.is_empty());
    }

    #[test]
    fn spectator_sees_nothing_before_reveal() {
        let state = state_with_two_players();
        let view = redact_for(&state, None);
        assert!(view.players.iter().all(|p| p.hole_cards.is_empty()));
    }

    #[test]
    fn reveal_phase_shows_non_folded_hands_to_everyone() {
        let mut state = state_with_two_players();
        state.phase = Phase::Reveal;
        state.players[1].is_folded = true;
        let view = redact_for(&state, None);
        assert_eq!(view.players[0].hole_cards.len(), 2);
        assert!(view.players[1].hole_cards.is_empty());
    }
}
