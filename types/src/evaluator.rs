use crate::card::{Card, Rank};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Hand categories, ascending strength. Derived `Ord` relies on declaration
/// order matching spec.md's resolution order exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    HighCard,
    OnePair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
    RoyalFlush,
}

/// A totally ordered hand strength: category first, then a canonical
/// tie-breaker tuple compared lexicographically within the category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandResult {
    pub category: Category,
    pub tiebreak: [u8; 5],
}

impl PartialOrd for HandResult {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HandResult {
    fn cmp(&self, other: &Self) -> Ordering {
        self.category
            .cmp(&other.category)
            .then_with(|| self.tiebreak.cmp(&other.tiebreak))
    }
}

/// Evaluate 2..7 cards into the best 5-card `HandResult`.
///
/// Follows the design-level algorithm unchanged: sort by rank descending,
/// bucket by suit and by rank count, detect straights on the descending
/// unique-rank list (with the wheel as a special case), then resolve
/// categories strongest-first.
pub fn evaluate_hand(cards: &[Card]) -> HandResult {
    assert!(
        (2..=7).contains(&cards.len()),
        "evaluator requires 2..=7 cards, got {}",
        cards.len()
    );

    let mut sorted: Vec<Card> = cards.to_vec();
    sorted.sort_by(|a, b| b.rank.cmp(&a.rank));

    let suit_counts: HashMap<_, usize> =
        sorted.iter().fold(HashMap::new(), |mut acc, c| {
            *acc.entry(c.suit).or_insert(0) += 1;
            acc
        });
    let flush_suit = suit_counts
        .iter()
        .find(|&(_, &count)| count >= 5)
        .map(|(&suit, _)| suit);

    let mut rank_counts: HashMap<Rank, u8> = HashMap::new();
    for c in &sorted {
        *rank_counts.entry(c.rank).or_insert(0) += 1;
    }

    let mut unique_ranks: Vec<Rank> = rank_counts.keys().copied().collect();
    unique_ranks.sort_by(|a, b| b.cmp(a));

    let straight_top = find_straight(&unique_ranks);

    if let Some(suit) = flush_suit {
        let flush_ranks: Vec<Rank> = sorted
            .iter()
            .filter(|c| c.suit == suit)
            .map(|c| c.rank)
            .collect();
        let mut unique_flush_ranks = flush_ranks.clone();
        unique_flush_ranks.sort_by(|a, b| b.cmp(a));
        unique_flush_ranks.dedup();
        if let Some(top) = find_straight(&unique_flush_ranks) {
            let category = if top.value() == 14 {
                Category::RoyalFlush
            } else {
                Category::StraightFlush
            };
            return HandResult {
                category,
                tiebreak: [top.wheel_value(), 0, 0, 0, 0],
            };
        }
    }

    let mut groups: Vec<(Rank, u8)> = rank_counts.into_iter().collect();
    groups.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));

    if groups[0].1 == 4 {
        let quad_rank = groups[0].0;
        let kicker_rank = groups
            .iter()
            .find(|(r, _)| *r != quad_rank)
            .map(|(r, _)| r.value())
            .unwrap_or(0);
        return HandResult {
            category: Category::FourOfAKind,
            tiebreak: [quad_rank.value(), kicker_rank, 0, 0, 0],
        };
    }

    if groups[0].1 == 3 {
        if let Some(pair) = groups.iter().find(|(r, c)| *c >= 2 && *r != groups[0].0) {
            return HandResult {
                category: Category::FullHouse,
                tiebreak: [groups[0].0.value(), pair.0.value(), 0, 0, 0],
            };
        }
    }

    if let Some(suit) = flush_suit {
        let mut flush_ranks: Vec<u8> = sorted
            .iter()
            .filter(|c| c.suit == suit)
            .map(|c| c.rank.value())
            .collect();
        flush_ranks.sort_by(|a, b| b.cmp(a));
        flush_ranks.truncate(5);
        let mut tiebreak = [0u8; 5];
        tiebreak[..flush_ranks.len()].copy_from_slice(&flush_ranks);
        return HandResult {
            category: Category::Flush,
            tiebreak,
        };
    }

    if let Some(top) = straight_top {
        return HandResult {
            category: Category::Straight,
            tiebreak: [top.wheel_value(), 0, 0, 0, 0],
        };
    }

    if groups[0].1 == 3 {
        let quad_rank = groups[0].0;
        let mut kickers: Vec<u8> = groups
            .iter()
            .filter(|(r, _)| *r != quad_rank)
            .map(|(r, _)| r.value())
            .collect();
        kickers.sort_by(|a, b| b.cmp(a));
        kickers.truncate(2);
        let mut tiebreak = [quad_rank.value(), 0, 0, 0, 0];
        tiebreak[1..1 + kickers.len()].copy_from_slice(&kickers);
        return HandResult {
            category: Category::ThreeOfAKind,
            tiebreak,
        };
    }

    let pairs: Vec<Rank> = groups
        .iter()
        .filter(|(_, c)| *c == 2)
        .map(|(r, _)| *r)
        .collect();
    if pairs.len() >= 2 {
        let high = pairs[0];
        let low = pairs[1];
        let kicker = groups
            .iter()
            .find(|(r, _)| *r != high && *r != low)
            .map(|(r, _)| r.value())
            .unwrap_or(0);
        return HandResult {
            category: Category::TwoPair,
            tiebreak: [high.value(), low.value(), kicker, 0, 0],
        };
    }

    if pairs.len() == 1 {
        let pair = pairs[0];
        let mut kickers: Vec<u8> = groups
            .iter()
            .filter(|(r, _)| *r != pair)
            .map(|(r, _)| r.value())
            .collect();
        kickers.sort_by(|a, b| b.cmp(a));
        kickers.truncate(3);
        let mut tiebreak = [pair.value(), 0, 0, 0, 0];
        tiebreak[1..1 + kickers.len()].copy_from_slice(&kickers);
        return HandResult {
            category: Category::OnePair,
            tiebreak,
        };
    }

    let mut highs: Vec<u8> = unique_ranks.iter().map(|r| r.value()).collect();
    highs.truncate(5);
    let mut tiebreak = [0u8; 5];
    tiebreak[..highs.len()].copy_from_slice(&highs);
    HandResult {
        category: Category::HighCard,
        tiebreak,
    }
}

/// Slide a window of 5 over a descending, duplicate-free rank list; a
/// window qualifies iff `first - last == 4`. The wheel (A,5,4,3,2) is a
/// special case since Ace plays low there.
fn find_straight(descending_unique_ranks: &[Rank]) -> Option<Rank> {
    if descending_unique_ranks.len() >= 5 {
        for window in descending_unique_ranks.windows(5) {
            let first = window[0].value();
            let last = window[4].value();
            if first - last == 4 {
                return Some(window[0]);
            }
        }
    }
    let has = |v: u8| descending_unique_ranks.iter().any(|r| r.value() == v);
    if has(14) && has(5) && has(4) && has(3) && has(2) {
        return Some(Rank::new_unchecked(5));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Suit;

    fn c(suit: Suit, value: u8) -> Card {
        Card::new(suit, Rank::new_unchecked(value))
    }

    #[test]
    fn wheel_is_five_high_straight() {
        let cards = vec![
            c(Suit::Spades, 14),
            c(Suit::Hearts, 2),
            c(Suit::Clubs, 3),
            c(Suit::Diamonds, 4),
            c(Suit::Spades, 5),
        ];
        let result = evaluate_hand(&cards);
        assert_eq!(result.category, Category::Straight);
        assert_eq!(result.tiebreak[0], 5);
    }

    #[test]
    fn broadway_is_ace_high_straight() {
        let cards = vec![
            c(Suit::Spades, 10),
            c(Suit::Hearts, 11),
            c(Suit::Clubs, 12),
            c(Suit::Diamonds, 13),
            c(Suit::Spades, 14),
        ];
        let result = evaluate_hand(&cards);
        assert_eq!(result.category, Category::Straight);
        assert_eq!(result.tiebreak[0], 14);
    }

    #[test]
    fn six_card_straight_picks_ace_high_not_wheel() {
        let cards = vec![
            c(Suit::Spades, 9),
            c(Suit::Hearts, 10),
            c(Suit::Clubs, 11),
            c(Suit::Diamonds, 12),
            c(Suit::Spades, 13),
            c(Suit::Hearts, 14),
        ];
        let result = evaluate_hand(&cards);
        assert_eq!(result.category, Category::Straight);
        assert_eq!(result.tiebreak[0], 14);
    }

    #[test]
    fn three_aces_beats_two_pair() {
        let trips = vec![
            c(Suit::Spades, 14),
            c(Suit::Hearts, 14),
            c(Suit::Clubs, 14),
            c(Suit::Diamonds, 4),
            c(Suit::Spades, 9),
            c(Suit::Hearts, 3),
            c(Suit::Diamonds, 13),
        ];
        let two_pair = vec![
            c(Suit::Clubs, 2),
            c(Suit::Diamonds, 7),
            c(Suit::Diamonds, 14),
            c(Suit::Clubs, 4),
            c(Suit::Spades, 9),
            c(Suit::Hearts, 3),
            c(Suit::Diamonds, 13),
        ];
        assert!(evaluate_hand(&trips) > evaluate_hand(&two_pair));
    }

    #[test]
    fn royal_flush_beats_straight_flush() {
        let royal = vec![
            c(Suit::Spades, 10),
            c(Suit::Spades, 11),
            c(Suit::Spades, 12),
            c(Suit::Spades, 13),
            c(Suit::Spades, 14),
        ];
        let straight_flush = vec![
            c(Suit::Hearts, 9),
            c(Suit::Hearts, 10),
            c(Suit::Hearts, 11),
            c(Suit::Hearts, 12),
            c(Suit::Hearts, 13),
        ];
        let r1 = evaluate_hand(&royal);
        let r2 = evaluate_hand(&straight_flush);
        assert_eq!(r1.category, Category::RoyalFlush);
        assert_eq!(r2.category, Category::StraightFlush);
        assert!(r1 > r2);
    }

    #[test]
    fn identical_ranked_hands_are_equal() {
        let a = vec![
            c(Suit::Spades, 14),
            c(Suit::Hearts, 4),
            c(Suit::Clubs, 9),
            c(Suit::Diamonds, 3),
            c(Suit::Spades, 13),
        ];
        let b = vec![
            c(Suit::Hearts, 14),
            c(Suit::Clubs, 4),
            c(Suit::Diamonds, 9),
            c(Suit::Spades, 3),
            c(Suit::Hearts, 13),
        ];
        assert_eq!(evaluate_hand(&a), evaluate_hand(&b));
    }

    #[test]
    fn ordering_is_total_over_random_sample() {
        use rand::rngs::StdRng;
        use rand::SeedableRng;
        use crate::card::Deck;

        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let mut deck = Deck::shuffled(&mut rng);
            let mut hand = Vec::new();
            for _ in 0..7 {
                hand.push(deck.pop().unwrap());
            }
            let r = evaluate_hand(&hand);
            assert_eq!(r.cmp(&r), Ordering::Equal);
        }
    }
}
