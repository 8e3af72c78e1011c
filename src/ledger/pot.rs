//! Pot bookkeeping for one hand: per-seat investments, side-pot layering,
//! and remainder-aware splitting.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::errors::{LedgerError, LedgerResult};
use crate::game::entities::{Chips, SeatIndex};

/// One awardable pot: the main pot or a side pot. Seats in `eligible` are
/// the non-folded seats whose investment reaches this pot's layer.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SidePot {
    pub amount: Chips,
    pub eligible: BTreeSet<SeatIndex>,
}

/// All chips wagered during a hand, tracked as each seat's total investment.
///
/// Pot boundaries are not materialized while betting runs; they fall out of
/// the investment levels at settlement, which makes conservation trivial:
/// the pot total is always exactly the sum of what seats put in.
#[derive(Clone, Debug, Default)]
pub struct Pot {
    investments: BTreeMap<SeatIndex, Chips>,
}

impl Pot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `amount` cents from `stack` into the pot. The caller caps to
    /// all-in first; an amount beyond the stack is an engine bug surfaced as
    /// `IllegalBet`.
    pub fn post(
        &mut self,
        seat: SeatIndex,
        stack: &mut Chips,
        amount: Chips,
    ) -> LedgerResult<()> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        if amount > *stack {
            return Err(LedgerError::IllegalBet {
                stack: *stack,
                amount,
            });
        }
        *stack -= amount;
        *self.investments.entry(seat).or_insert(0) += amount;
        Ok(())
    }

    #[must_use]
    pub fn total(&self) -> Chips {
        self.investments.values().sum()
    }

    #[must_use]
    pub fn investment(&self, seat: SeatIndex) -> Chips {
        self.investments.get(&seat).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Return every investment to its seat's stack. Used when a corrupted
    /// hand is aborted: the table reconciles to its pre-hand chip total.
    pub fn refund(&mut self, mut credit: impl FnMut(SeatIndex, Chips)) {
        for (seat, amount) in std::mem::take(&mut self.investments) {
            credit(seat, amount);
        }
    }

    /// Build the main pot and side pots from investment layers.
    ///
    /// Each distinct investment level among contenders closes a layer; every
    /// seat (folded included) contributes up to that level, but only
    /// contenders at or above it are eligible. Folded chips above the top
    /// contender level are dead money added to the last pot.
    #[must_use]
    pub fn build_pots(&self, contenders: &BTreeSet<SeatIndex>) -> Vec<SidePot> {
        let mut levels: Vec<Chips> = contenders
            .iter()
            .map(|seat| self.investment(*seat))
            .filter(|&inv| inv > 0)
            .collect();
        levels.sort_unstable();
        levels.dedup();

        let mut pots = Vec::with_capacity(levels.len());
        let mut prev = 0;
        for level in levels {
            let amount: Chips = self
                .investments
                .values()
                .map(|&inv| inv.min(level) - inv.min(prev))
                .sum();
            let eligible: BTreeSet<SeatIndex> = contenders
                .iter()
                .copied()
                .filter(|seat| self.investment(*seat) >= level)
                .collect();
            pots.push(SidePot { amount, eligible });
            prev = level;
        }

        // Folded seats may have invested past the deepest contender.
        let dead: Chips = self
            .investments
            .values()
            .map(|&inv| inv - inv.min(prev))
            .sum();
        if dead > 0
            && let Some(last) = pots.last_mut()
        {
            last.amount += dead;
        }

        pots
    }

    /// Split `amount` among `winners`, which must already be ordered
    /// clockwise starting left of the button. Indivisible remainder cents go
    /// one each to the earliest winners in that order.
    #[must_use]
    pub fn split(amount: Chips, winners: &[SeatIndex]) -> Vec<(SeatIndex, Chips)> {
        if winners.is_empty() {
            return Vec::new();
        }
        let n = winners.len() as Chips;
        let share = amount / n;
        let remainder = amount % n;
        winners
            .iter()
            .enumerate()
            .map(|(i, &seat)| {
                let extra = Chips::from((i as Chips) < remainder);
                (seat, share + extra)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contenders(seats: &[SeatIndex]) -> BTreeSet<SeatIndex> {
        seats.iter().copied().collect()
    }

    #[test]
    fn single_level_makes_one_pot() {
        let mut pot = Pot::new();
        let mut stacks = [100, 100, 100];
        for (seat, stack) in stacks.iter_mut().enumerate() {
            pot.post(seat, stack, 100).unwrap();
        }
        let pots = pot.build_pots(&contenders(&[0, 1, 2]));
        assert_eq!(pots.len(), 1);
        assert_eq!(pots[0].amount, 300);
        assert_eq!(pots[0].eligible, contenders(&[0, 1, 2]));
    }

    #[test]
    fn all_in_ladder_creates_two_boundaries() {
        // All-ins of 50/150/300 with a fourth seat matching 300: a main pot
        // and exactly two side pots.
        let mut pot = Pot::new();
        let mut stacks = [50, 150, 300, 1_000];
        pot.post(0, &mut stacks[0], 50).unwrap();
        pot.post(1, &mut stacks[1], 150).unwrap();
        pot.post(2, &mut stacks[2], 300).unwrap();
        pot.post(3, &mut stacks[3], 300).unwrap();

        let pots = pot.build_pots(&contenders(&[0, 1, 2, 3]));
        assert_eq!(pots.len(), 3);

        assert_eq!(pots[0].amount, 200); // 50 x 4
        assert_eq!(pots[0].eligible, contenders(&[0, 1, 2, 3]));
        assert_eq!(pots[1].amount, 300); // 100 x 3
        assert_eq!(pots[1].eligible, contenders(&[1, 2, 3]));
        assert_eq!(pots[2].amount, 300); // 150 x 2
        assert_eq!(pots[2].eligible, contenders(&[2, 3]));

        let distributed: Chips = pots.iter().map(|p| p.amount).sum();
        assert_eq!(distributed, pot.total());
    }

    #[test]
    fn folded_chips_stay_in_pots_without_eligibility() {
        let mut pot = Pot::new();
        let mut stacks = [1_000, 1_000, 1_000];
        pot.post(0, &mut stacks[0], 60).unwrap(); // folds later
        pot.post(1, &mut stacks[1], 100).unwrap();
        pot.post(2, &mut stacks[2], 100).unwrap();

        let pots = pot.build_pots(&contenders(&[1, 2]));
        assert_eq!(pots.len(), 1);
        assert_eq!(pots[0].amount, 260);
        assert_eq!(pots[0].eligible, contenders(&[1, 2]));
    }

    #[test]
    fn dead_money_above_top_contender_level_is_kept() {
        // The folder invested more than the lone short-stacked contender
        // pair; the excess lands in the final pot.
        let mut pot = Pot::new();
        let mut stacks = [500, 80, 80];
        pot.post(0, &mut stacks[0], 200).unwrap(); // folds
        pot.post(1, &mut stacks[1], 80).unwrap();
        pot.post(2, &mut stacks[2], 80).unwrap();

        let pots = pot.build_pots(&contenders(&[1, 2]));
        assert_eq!(pots.len(), 1);
        assert_eq!(pots[0].amount, 360);
    }

    #[test]
    fn post_rejects_more_than_stack() {
        let mut pot = Pot::new();
        let mut stack = 40;
        let err = pot.post(0, &mut stack, 50).unwrap_err();
        assert_eq!(
            err,
            LedgerError::IllegalBet {
                stack: 40,
                amount: 50
            }
        );
        assert_eq!(stack, 40);
        assert!(pot.is_empty());
    }

    #[test]
    fn split_gives_remainder_to_earliest_winners() {
        let awards = Pot::split(101, &[4, 7, 2]);
        assert_eq!(awards, vec![(4, 34), (7, 34), (2, 33)]);
        let total: Chips = awards.iter().map(|(_, c)| c).sum();
        assert_eq!(total, 101);
    }

    #[test]
    fn refund_restores_every_investment() {
        let mut pot = Pot::new();
        let mut stacks = [300, 500];
        pot.post(0, &mut stacks[0], 120).unwrap();
        pot.post(1, &mut stacks[1], 250).unwrap();

        pot.refund(|seat, amount| stacks[seat] += amount);
        assert_eq!(stacks, [300, 500]);
        assert!(pot.is_empty());
    }
}
