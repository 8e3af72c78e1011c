//! Seven-card hand evaluator.
//!
//! Pure and deterministic: the same seven cards always produce the same
//! [`HandRank`], regardless of input order or suit permutation. Ranks are
//! totally ordered across categories and kickers, so two hands compare with
//! `<`/`>` and an exact tie compares equal.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::entities::{Card, RANK_ACE, Rank, Suit};

/// Hand category, weakest to strongest.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[repr(u8)]
pub enum Category {
    HighCard = 0,
    OnePair = 1,
    TwoPair = 2,
    ThreeOfAKind = 3,
    Straight = 4,
    Flush = 5,
    FullHouse = 6,
    FourOfAKind = 7,
    StraightFlush = 8,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::HighCard => "high card",
            Self::OnePair => "one pair",
            Self::TwoPair => "two pair",
            Self::ThreeOfAKind => "three of a kind",
            Self::Straight => "straight",
            Self::Flush => "flush",
            Self::FullHouse => "full house",
            Self::FourOfAKind => "four of a kind",
            Self::StraightFlush => "straight flush",
        };
        write!(f, "{repr}")
    }
}

/// Packed, comparable hand strength.
///
/// Layout, most significant first: category (4 bits), then five kicker ranks
/// (4 bits each). Kicker slots beyond what a category needs are zero, so
/// equal hands pack to equal values.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct HandRank(u32);

impl HandRank {
    fn pack(category: Category, kickers: &[Rank]) -> Self {
        debug_assert!(kickers.len() <= 5);
        let mut v = (category as u32) << 20;
        for (i, &rank) in kickers.iter().enumerate() {
            v |= u32::from(rank) << (16 - 4 * i);
        }
        Self(v)
    }

    #[must_use]
    pub fn category(self) -> Category {
        match self.0 >> 20 {
            0 => Category::HighCard,
            1 => Category::OnePair,
            2 => Category::TwoPair,
            3 => Category::ThreeOfAKind,
            4 => Category::Straight,
            5 => Category::Flush,
            6 => Category::FullHouse,
            7 => Category::FourOfAKind,
            _ => Category::StraightFlush,
        }
    }

    /// The packed value, exposed for logging and persistence by the host.
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for HandRank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.category())
    }
}

/// Top rank of the best straight within `ranks` (a presence mask indexed by
/// rank), or `None`. The ace doubles as rank 1 so A-2-3-4-5 is found, topped
/// by the five.
fn straight_top(present: &[bool; 15]) -> Option<Rank> {
    for top in (5..=RANK_ACE).rev() {
        let run = (0u8..5).all(|i| {
            let r = top - i;
            // Rank 1 is the ace playing low.
            if r == 1 { present[RANK_ACE as usize] } else { present[r as usize] }
        });
        if run {
            return Some(top);
        }
    }
    None
}

/// Evaluate exactly seven cards (two hole plus the full board).
///
/// Works directly on rank counts rather than enumerating the 21 five-card
/// combinations: flushes need five of one suit among seven, straights scan
/// the distinct-rank mask, and pair-family kickers fall out of the counts.
#[must_use]
pub fn evaluate(cards: &[Card; 7]) -> HandRank {
    let mut counts = [0u8; 15];
    let mut suit_counts = [0u8; 4];
    for card in cards {
        counts[card.rank() as usize] += 1;
        suit_counts[card.suit() as usize] += 1;
    }

    let flush_suit: Option<Suit> = Suit::ALL
        .into_iter()
        .find(|&s| suit_counts[s as usize] >= 5);

    // Straight flush: restrict the presence mask to the flush suit.
    if let Some(suit) = flush_suit {
        let mut present = [false; 15];
        for card in cards.iter().filter(|c| c.suit() == suit) {
            present[card.rank() as usize] = true;
        }
        if let Some(top) = straight_top(&present) {
            return HandRank::pack(Category::StraightFlush, &[top]);
        }
    }

    // Group ranks by multiplicity, highest rank first within each.
    let mut quads = Vec::new();
    let mut trips = Vec::new();
    let mut pairs = Vec::new();
    let mut singles = Vec::new();
    for rank in (2..=RANK_ACE).rev() {
        match counts[rank as usize] {
            4 => quads.push(rank),
            3 => trips.push(rank),
            2 => pairs.push(rank),
            1 => singles.push(rank),
            _ => {}
        }
    }

    if let Some(&quad) = quads.first() {
        let kicker = best_excluding(&counts, &[quad]);
        return HandRank::pack(Category::FourOfAKind, &[quad, kicker]);
    }

    // Two sets of trips make a full house of the higher trips over the
    // higher remaining pair.
    if let Some(&t) = trips.first() {
        let pair_part = trips.get(1).copied().or_else(|| pairs.first().copied());
        if let Some(p) = pair_part {
            return HandRank::pack(Category::FullHouse, &[t, p]);
        }
    }

    if let Some(suit) = flush_suit {
        let mut flush_ranks: Vec<Rank> = cards
            .iter()
            .filter(|c| c.suit() == suit)
            .map(|c| c.rank())
            .collect();
        flush_ranks.sort_unstable_by(|a, b| b.cmp(a));
        flush_ranks.truncate(5);
        return HandRank::pack(Category::Flush, &flush_ranks);
    }

    let mut present = [false; 15];
    for card in cards {
        present[card.rank() as usize] = true;
    }
    if let Some(top) = straight_top(&present) {
        return HandRank::pack(Category::Straight, &[top]);
    }

    if let Some(&t) = trips.first() {
        let k1 = singles.first().copied().unwrap_or(0);
        let k2 = singles.get(1).copied().unwrap_or(0);
        return HandRank::pack(Category::ThreeOfAKind, &[t, k1, k2]);
    }

    // Three pairs are possible with seven cards; the third-best pair rank
    // competes with the singles for the kicker slot.
    if pairs.len() >= 2 {
        let (hi, lo) = (pairs[0], pairs[1]);
        let kicker = best_excluding(&counts, &[hi, lo]);
        return HandRank::pack(Category::TwoPair, &[hi, lo, kicker]);
    }

    if let Some(&p) = pairs.first() {
        let kickers = [singles[0], singles[1], singles[2]];
        return HandRank::pack(Category::OnePair, &[p, kickers[0], kickers[1], kickers[2]]);
    }

    HandRank::pack(Category::HighCard, &singles[..5])
}

/// Highest rank present in `counts` that is not in `exclude`.
fn best_excluding(counts: &[u8; 15], exclude: &[Rank]) -> Rank {
    (2..=RANK_ACE)
        .rev()
        .find(|r| counts[*r as usize] > 0 && !exclude.contains(r))
        .unwrap_or(0)
}
