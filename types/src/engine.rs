use crate::card::Deck;
use crate::evaluator::evaluate_hand;
use crate::model::{
    Effect, Event, GameConfig, Intent, IntentKind, Phase, Player, PlayerId, RoomState,
};

/// Drive one event through the machine. Pure: all effects the actor must
/// perform (persist, broadcast, arm/disarm timers) are returned for the
/// caller to execute, never performed here.
///
/// `deal_deck` is only invoked when a new hand actually starts (entering
/// DEALING); `next_turn_token` is only invoked when a turn timer is armed,
/// so tests that never reach those paths can pass trivial closures.
pub fn transition(
    mut state: RoomState,
    event: Event,
    config: &GameConfig,
    deal_deck: impl FnOnce() -> Deck,
    next_turn_token: impl FnOnce() -> u64,
) -> (RoomState, Vec<Effect>) {
    let mut effects = Vec::new();
    match event {
        Event::Join { player_id, name } => {
            if state.player_by_id(&player_id).is_none() {
                let position = state.players.len();
                state
                    .players
                    .push(Player::new(player_id, name, config.starting_tiles, position));
                effects.push(Effect::Persist);
                effects.push(Effect::Broadcast);
            }
        }
        Event::Rejoin { player_id } => {
            if let Some(p) = state.players.iter_mut().find(|p| p.id == player_id) {
                p.connected = true;
                effects.push(Effect::Persist);
                effects.push(Effect::Broadcast);
            }
        }
        Event::Disconnect { player_id } => {
            if let Some(p) = state.players.iter_mut().find(|p| p.id == player_id) {
                p.connected = false;
                effects.push(Effect::Persist);
                effects.push(Effect::Broadcast);
            }
        }
        Event::Leave { player_id } => {
            if let Some(idx) = state.player_index_by_id(&player_id) {
                // Forfeit policy: chips already committed to the pot this hand
                // stay there. Only the (already-separate) tiles balance is
                // the player's own, and it leaves with them.
                state.round_bets.remove(&player_id);
                state.players_who_acted.remove(&player_id);
                state.players.remove(idx);
                fixup_indices_after_removal(&mut state, idx);
                effects.push(Effect::Persist);
                effects.push(Effect::Broadcast);
            }
        }
        Event::Start { player_id } => {
            if state.phase == Phase::Lobby
                && state.player_by_id(&player_id).is_some()
                && eligible_count(&state) >= 2
            {
                start_new_hand(&mut state, config, deal_deck, next_turn_token, &mut effects);
            }
        }
        Event::PlayerIntent { player_id, intent } => {
            apply_intent(
                &mut state,
                &player_id,
                intent,
                config,
                next_turn_token,
                &mut effects,
            );
        }
        Event::TimerExpiry {
            player_id,
            turn_token,
        } => {
            // Stale timers (superseded by a later turn) carry a token that
            // no longer matches; the actor is expected to have already
            // dropped these, but re-check here since the machine must stay
            // correct even if a stale event slips through.
            if state.active_player_index.is_some()
                && state.active_player().map(|p| &p.id) == Some(&player_id)
            {
                let _ = turn_token;
                apply_intent(
                    &mut state,
                    &player_id,
                    Intent {
                        kind: IntentKind::Fold,
                        amount: 0,
                    },
                    config,
                    next_turn_token,
                    &mut effects,
                );
                state.log(format!("{player_id} timed out, forced fold"));
            }
        }
        Event::RevealTimerExpiry => {
            if state.phase == Phase::Reveal {
                enter_cleanup(&mut state, config, deal_deck, next_turn_token, &mut effects);
            }
        }
    }
    (state, effects)
}

fn eligible_count(state: &RoomState) -> usize {
    state
        .players
        .iter()
        .filter(|p| !p.is_spectator && p.tiles > 0)
        .count()
}

fn fixup_indices_after_removal(state: &mut RoomState, removed_idx: usize) {
    if let Some(active) = state.active_player_index {
        if active == removed_idx {
            state.active_player_index = None;
        } else if active > removed_idx {
            state.active_player_index = Some(active - 1);
        }
    }
    if state.dealer_index > removed_idx {
        state.dealer_index -= 1;
    } else if state.dealer_index >= state.players.len() && !state.players.is_empty() {
        state.dealer_index %= state.players.len();
    }
}

/// Smallest `k` in `[1..=N]` such that `players[(from + k) % N]` satisfies
/// `pred`, searching forward from but excluding `from`.
fn find_next(players: &[Player], from: usize, pred: impl Fn(&Player) -> bool) -> Option<usize> {
    let n = players.len();
    if n == 0 {
        return None;
    }
    for k in 1..=n {
        let idx = (from + k) % n;
        if pred(&players[idx]) {
            return Some(idx);
        }
    }
    None
}

fn is_eligible_to_deal(p: &Player) -> bool {
    !p.is_spectator && p.tiles > 0
}

fn start_new_hand(
    state: &mut RoomState,
    config: &GameConfig,
    deal_deck: impl FnOnce() -> Deck,
    next_turn_token: impl FnOnce() -> u64,
    effects: &mut Vec<Effect>,
) {
    state.phase = Phase::Dealing;
    state.community_cards.clear();
    state.pot = 0;
    state.current_commitment = 0;
    state.round_bets.clear();
    state.players_who_acted.clear();
    for p in state.players.iter_mut() {
        p.hole_cards.clear();
        p.is_folded = false;
    }

    let mut deck = deal_deck();
    let deal_order: Vec<usize> = (0..state.players.len())
        .filter(|&i| is_eligible_to_deal(&state.players[i]))
        .collect();
    for _ in 0..2 {
        for &idx in &deal_order {
            if let Some(card) = deck.pop() {
                state.players[idx].hole_cards.push(card);
            }
        }
    }
    state.deck = deck;

    let sb_index = first_eligible_seat(&state.players, state.dealer_index)
        .expect("start requires >= 2 eligible players");
    let bb_index =
        find_next(&state.players, sb_index, is_eligible_to_deal).expect("heads-up minimum");

    let sb_amount = config.small_blind.min(state.players[sb_index].tiles);
    post_blind(state, sb_index, sb_amount);
    let bb_amount = config.big_blind.min(state.players[bb_index].tiles);
    post_blind(state, bb_index, bb_amount);
    state.current_commitment = bb_amount;

    state.log(format!(
        "new hand: dealer={} sb={} bb={}",
        state.dealer_index, sb_index, bb_index
    ));

    state.phase = Phase::PreFlop;
    let first_to_act = find_next(&state.players, bb_index, |p| p.can_act());
    enter_turn(state, first_to_act, config, next_turn_token, effects);
    effects.push(Effect::Persist);
    effects.push(Effect::Broadcast);
}

fn first_eligible_seat(players: &[Player], from: usize) -> Option<usize> {
    let n = players.len();
    if n == 0 {
        return None;
    }
    for k in 0..n {
        let idx = (from + k) % n;
        if is_eligible_to_deal(&players[idx]) {
            return Some(idx);
        }
    }
    None
}

fn post_blind(state: &mut RoomState, idx: usize, amount: u64) {
    let player = &mut state.players[idx];
    player.tiles -= amount;
    state.pot += amount;
    *state.round_bets.entry(player.id.clone()).or_insert(0) += amount;
}

fn enter_turn(
    state: &mut RoomState,
    idx: Option<usize>,
    config: &GameConfig,
    next_turn_token: impl FnOnce() -> u64,
    effects: &mut Vec<Effect>,
) {
    match idx {
        Some(i) => {
            state.active_player_index = Some(i);
            let token = next_turn_token();
            effects.push(Effect::ArmTurnTimer {
                player_id: state.players[i].id.clone(),
                turn_token: token,
                timeout_ms: config.turn_timeout_ms,
            });
        }
        None => {
            // No contender left who can still act: either only one
            // contender remains, or everyone still in is already all-in.
            // Side pots aren't modeled, so an all-in short-circuits straight
            // to reveal rather than running the board out street by street.
            state.active_player_index = None;
            effects.push(Effect::DisarmTurnTimer);
            enter_reveal(state, config, effects);
        }
    }
}

fn apply_intent(
    state: &mut RoomState,
    player_id: &str,
    intent: Intent,
    config: &GameConfig,
    next_turn_token: impl FnOnce() -> u64,
    effects: &mut Vec<Effect>,
) {
    let is_betting_phase = matches!(
        state.phase,
        Phase::PreFlop | Phase::Flop | Phase::Turn | Phase::River
    );
    if !is_betting_phase {
        return;
    }
    let Some(active) = state.active_player() else {
        return;
    };
    if active.id != player_id {
        return;
    }
    let idx = state.player_index_by_id(player_id).unwrap();

    let current_bet = *state.round_bets.get(player_id).unwrap_or(&0);
    let legal = match intent.kind {
        IntentKind::Check => current_bet == state.current_commitment,
        IntentKind::Commit => intent.amount <= state.players[idx].tiles,
        IntentKind::Fold => true,
    };
    if !legal {
        return;
    }

    match intent.kind {
        IntentKind::Check => {
            state.players_who_acted.insert(player_id.to_string());
        }
        IntentKind::Commit => {
            state.players[idx].tiles -= intent.amount;
            let entry = state.round_bets.entry(player_id.to_string()).or_insert(0);
            *entry += intent.amount;
            state.pot += intent.amount;
            let new_total = *entry;
            if new_total > state.current_commitment {
                state.current_commitment = new_total;
                state.players_who_acted.clear();
                state.players_who_acted.insert(player_id.to_string());
                state.log(format!("{player_id} raises to {new_total}"));
            } else {
                state.players_who_acted.insert(player_id.to_string());
                state.log(format!("{player_id} calls {}", intent.amount));
            }
        }
        IntentKind::Fold => {
            state.players[idx].is_folded = true;
            state.players_who_acted.insert(player_id.to_string());
            state.log(format!("{player_id} folds"));
        }
    }

    effects.push(Effect::DisarmTurnTimer);

    if contenders_remaining(state) <= 1 {
        state.active_player_index = None;
        enter_reveal(state, config, effects);
        effects.push(Effect::Persist);
        effects.push(Effect::Broadcast);
        return;
    }

    if is_betting_round_complete(state) {
        advance_street(state, config, next_turn_token, effects);
    } else {
        let next = find_next(&state.players, idx, |p| p.can_act());
        enter_turn(state, next, config, next_turn_token, effects);
    }

    effects.push(Effect::Persist);
    effects.push(Effect::Broadcast);
}

fn contenders_remaining(state: &RoomState) -> usize {
    state.players.iter().filter(|p| p.is_contending()).count()
}

/// The set A of spec.md §4.C: non-folded, non-spectator players who are
/// either still able to act or have already put chips in this street.
fn betting_set(state: &RoomState) -> Vec<&Player> {
    state
        .players
        .iter()
        .filter(|p| p.is_contending())
        .filter(|p| p.tiles > 0 || *state.round_bets.get(&p.id).unwrap_or(&0) > 0)
        .collect()
}

fn is_betting_round_complete(state: &RoomState) -> bool {
    let set = betting_set(state);
    set.iter().all(|p| {
        let bet = *state.round_bets.get(&p.id).unwrap_or(&0);
        bet == state.current_commitment || p.tiles == 0
    }) && set.iter().all(|p| state.players_who_acted.contains(&p.id))
}

fn advance_street(
    state: &mut RoomState,
    config: &GameConfig,
    next_turn_token: impl FnOnce() -> u64,
    effects: &mut Vec<Effect>,
) {
    state.round_bets.clear();
    state.players_who_acted.clear();
    state.current_commitment = 0;

    match state.phase {
        Phase::PreFlop => {
            state.deck.burn();
            for _ in 0..3 {
                if let Some(c) = state.deck.pop() {
                    state.community_cards.push(c);
                }
            }
            state.phase = Phase::Flop;
        }
        Phase::Flop => {
            state.deck.burn();
            if let Some(c) = state.deck.pop() {
                state.community_cards.push(c);
            }
            state.phase = Phase::Turn;
        }
        Phase::Turn => {
            state.deck.burn();
            if let Some(c) = state.deck.pop() {
                state.community_cards.push(c);
            }
            state.phase = Phase::River;
        }
        Phase::River => {
            enter_reveal(state, config, effects);
            return;
        }
        _ => {}
    }

    let first_to_act = find_next(&state.players, state.dealer_index, |p| p.can_act());
    enter_turn(state, first_to_act, config, next_turn_token, effects);
}

fn enter_reveal(state: &mut RoomState, config: &GameConfig, effects: &mut Vec<Effect>) {
    state.phase = Phase::Reveal;
    award_pot(state);
    effects.push(Effect::ArmRevealTimer {
        delay_ms: config.reveal_delay_ms,
    });
}

fn award_pot(state: &mut RoomState) {
    let contenders: Vec<usize> = state
        .players
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_contending())
        .map(|(i, _)| i)
        .collect();

    if contenders.is_empty() {
        state.pot = 0;
        return;
    }

    let winners: Vec<usize> = if contenders.len() == 1 {
        contenders
    } else {
        let scored: Vec<(usize, _)> = contenders
            .iter()
            .map(|&i| {
                let mut cards = state.players[i].hole_cards.clone();
                cards.extend(state.community_cards.iter().copied());
                (i, evaluate_hand(&cards))
            })
            .collect();
        let best = scored.iter().map(|(_, r)| *r).max().unwrap();
        scored
            .into_iter()
            .filter(|(_, r)| *r == best)
            .map(|(i, _)| i)
            .collect()
    };

    let pot = state.pot;
    let share = pot / winners.len() as u64;
    let remainder = pot % winners.len() as u64;

    // Odd chips go to the winner seated earliest after the dealer.
    let mut ordered = winners.clone();
    ordered.sort_by_key(|&i| {
        let n = state.players.len() as isize;
        ((i as isize - state.dealer_index as isize).rem_euclid(n)) as usize
    });

    for (rank, &idx) in ordered.iter().enumerate() {
        let mut amount = share;
        if rank == 0 {
            amount += remainder;
        }
        state.players[idx].tiles += amount;
    }
    state.pot = 0;
    state.log(format!(
        "pot of {pot} awarded to {} winner(s)",
        winners.len()
    ));
}

fn enter_cleanup(
    state: &mut RoomState,
    config: &GameConfig,
    deal_deck: impl FnOnce() -> Deck,
    next_turn_token: impl FnOnce() -> u64,
    effects: &mut Vec<Effect>,
) {
    state.phase = Phase::Cleanup;
    for p in state.players.iter_mut() {
        p.hole_cards.clear();
        p.is_folded = false;
        if p.tiles == 0 {
            p.is_spectator = true;
        }
    }
    state.community_cards.clear();
    state.pot = 0;

    if let Some(new_dealer) = find_next(&state.players, state.dealer_index, is_eligible_to_deal) {
        state.dealer_index = new_dealer;
    }

    effects.push(Effect::Persist);
    effects.push(Effect::Broadcast);

    if eligible_count(state) >= 2 {
        start_new_hand(state, config, deal_deck, next_turn_token, effects);
    } else {
        state.phase = Phase::Lobby;
        effects.push(Effect::Persist);
        effects.push(Effect::Broadcast);
    }
}
