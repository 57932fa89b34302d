use rand::seq::SliceRandom;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four suits. Ordered only for stable sorting, not for gameplay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Suit {
    Clubs,
    Diamonds,
    Hearts,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades];
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Suit::Clubs => '♣',
            Suit::Diamonds => '♦',
            Suit::Hearts => '♥',
            Suit::Spades => '♠',
        };
        write!(f, "{c}")
    }
}

/// A card's rank, stored as its "ace-high" numeric value (2..=14). The wheel
/// straight (A-2-3-4-5) is handled specially by the evaluator, not here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rank(u8);

impl Rank {
    pub const TWO: Rank = Rank(2);
    pub const ACE: Rank = Rank(14);

    pub const ALL: [Rank; 13] = [
        Rank(2),
        Rank(3),
        Rank(4),
        Rank(5),
        Rank(6),
        Rank(7),
        Rank(8),
        Rank(9),
        Rank(10),
        Rank(11),
        Rank(12),
        Rank(13),
        Rank(14),
    ];

    /// The ace-high numeric value used for every comparison except the wheel.
    pub fn value(self) -> u8 {
        self.0
    }

    /// Build a rank from its ace-high numeric value (2..=14). Intended for
    /// test fixtures and the evaluator's internal bookkeeping, not for
    /// parsing untrusted input.
    pub fn new_unchecked(value: u8) -> Rank {
        debug_assert!((2..=14).contains(&value), "rank value out of range");
        Rank(value)
    }

    /// The value Ace takes when it plays low in the wheel straight (A-2-3-4-5).
    pub fn wheel_value(self) -> u8 {
        if self.0 == 14 {
            1
        } else {
            self.0
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self.0 {
            2..=9 => return write!(f, "{}", self.0),
            10 => "T",
            11 => "J",
            12 => "Q",
            13 => "K",
            14 => "A",
            _ => unreachable!("rank out of range"),
        };
        write!(f, "{s}")
    }
}

/// An immutable playing card value. Two cards are equal iff suit and rank match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
}

impl Card {
    pub fn new(suit: Suit, rank: Rank) -> Self {
        Self { suit, rank }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

/// An ordered sequence of remaining cards. Serialized only for the Store
/// Adapter's recovery snapshot (spec.md §6); never sent to a client — the
/// Snapshot Redactor drops this field entirely from every outbound view.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Deck {
    cards: Vec<Card>,
    burned: u32,
}

impl Deck {
    /// The canonical 52-card deck, suit-major, rank-ascending order.
    fn canonical() -> Vec<Card> {
        let mut cards = Vec::with_capacity(52);
        for &suit in &Suit::ALL {
            for &rank in &Rank::ALL {
                cards.push(Card::new(suit, rank));
            }
        }
        cards
    }

    /// Build a freshly shuffled deck using an unbiased Fisher-Yates shuffle
    /// over a cryptographically strong RNG. An insecure PRNG here would let
    /// an adversarial client predict or bias the deal, so the RNG bound is
    /// part of this function's contract, not an implementation detail.
    pub fn shuffled<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut cards = Self::canonical();
        cards.shuffle(rng);
        Self { cards, burned: 0 }
    }

    /// Build a deck from an explicit card order, topmost card last (`pop`
    /// deals from the end of `cards`, same as any other deck). This is the
    /// deterministic-deck override hook tests use in place of
    /// [`Deck::shuffled`] to pin down exact deals.
    pub fn from_cards(cards: Vec<Card>) -> Self {
        Self { cards, burned: 0 }
    }

    /// Deal from the top of the deck.
    pub fn pop(&mut self) -> Option<Card> {
        self.cards.pop()
    }

    /// Remove and discard the top card; its count still contributes to the
    /// 52-card conservation invariant via [`Deck::burned`].
    pub fn burn(&mut self) -> Option<Card> {
        let card = self.cards.pop();
        if card.is_some() {
            self.burned += 1;
        }
        card
    }

    pub fn remaining(&self) -> usize {
        self.cards.len()
    }

    pub fn burned(&self) -> u32 {
        self.burned
    }
}
