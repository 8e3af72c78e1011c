//! Side-pot construction and award tests.
//!
//! Pots are layered from per-seat investments: every distinct contender
//! investment level closes a pot with its own eligible-seat set, folded
//! chips stay in but never win, and awarding every pot independently must
//! reproduce the conservation invariant.

use cardroom::entities::{Chips, SeatIndex};
use cardroom::ledger::SidePot;
use cardroom::Pot;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

fn seats(indices: &[SeatIndex]) -> BTreeSet<SeatIndex> {
    indices.iter().copied().collect()
}

fn pot_from(investments: &BTreeMap<SeatIndex, Chips>) -> Pot {
    let mut pot = Pot::new();
    for (&seat, &amount) in investments {
        let mut stack = amount;
        pot.post(seat, &mut stack, amount).unwrap();
        assert_eq!(stack, 0);
    }
    pot
}

/// The canonical ladder: all-ins of 50/150/300 plus a 300 caller
/// produce a main pot and exactly two side-pot boundaries.
#[test]
fn fifty_one_fifty_three_hundred_ladder() {
    let investments: BTreeMap<SeatIndex, Chips> =
        [(0, 50), (1, 150), (2, 300), (3, 300)].into();
    let pot = pot_from(&investments);
    let pots = pot.build_pots(&seats(&[0, 1, 2, 3]));

    assert_eq!(
        pots,
        vec![
            SidePot {
                amount: 200,
                eligible: seats(&[0, 1, 2, 3]),
            },
            SidePot {
                amount: 300,
                eligible: seats(&[1, 2, 3]),
            },
            SidePot {
                amount: 300,
                eligible: seats(&[2, 3]),
            },
        ]
    );

    // Awarding each pot independently redistributes every cent.
    let mut stacks: BTreeMap<SeatIndex, Chips> = seats(&[0, 1, 2, 3])
        .into_iter()
        .map(|s| (s, 0))
        .collect();
    for pot in &pots {
        let winner = *pot.eligible.iter().next().unwrap();
        for (seat, amount) in Pot::split(pot.amount, &[winner]) {
            *stacks.get_mut(&seat).unwrap() += amount;
        }
    }
    let redistributed: Chips = stacks.values().sum();
    assert_eq!(redistributed, 800);
}

#[test]
fn folded_contributions_are_winnable_but_not_eligible() {
    // Seat 0 bets 60 and folds; seats 1 and 2 see it through.
    let investments: BTreeMap<SeatIndex, Chips> = [(0, 60), (1, 100), (2, 100)].into();
    let pot = pot_from(&investments);
    let pots = pot.build_pots(&seats(&[1, 2]));

    assert_eq!(pots.len(), 1);
    assert_eq!(pots[0].amount, 260);
    assert!(!pots[0].eligible.contains(&0));
}

#[test]
fn equal_investments_make_a_single_pot() {
    let investments: BTreeMap<SeatIndex, Chips> = [(0, 100), (1, 100), (2, 100)].into();
    let pot = pot_from(&investments);
    let pots = pot.build_pots(&seats(&[0, 1, 2]));
    assert_eq!(pots.len(), 1);
    assert_eq!(pots[0].amount, 300);
    assert_eq!(pots[0].eligible, seats(&[0, 1, 2]));
}

#[test]
fn lone_contender_takes_everything_in_one_pot() {
    let investments: BTreeMap<SeatIndex, Chips> = [(0, 80), (1, 200), (2, 40)].into();
    let pot = pot_from(&investments);
    let pots = pot.build_pots(&seats(&[1]));
    assert_eq!(pots.len(), 1);
    assert_eq!(pots[0].amount, 320);
    assert_eq!(pots[0].eligible, seats(&[1]));
}

#[test]
fn split_remainder_goes_to_earliest_in_order() {
    // 101 cents between three winners ordered from the button.
    let awards = Pot::split(101, &[5, 0, 2]);
    assert_eq!(awards, vec![(5, 34), (0, 34), (2, 33)]);
}

// ---- properties ----

fn investments_strategy() -> impl Strategy<Value = BTreeMap<SeatIndex, Chips>> {
    prop::collection::btree_map(0usize..9, 1i64..=2_000, 2..=9)
}

proptest! {
    /// Layered pots always account for every invested cent.
    #[test]
    fn pots_sum_to_total(investments in investments_strategy()) {
        let pot = pot_from(&investments);
        let contenders: BTreeSet<SeatIndex> = investments.keys().copied().collect();
        let pots = pot.build_pots(&contenders);
        let layered: Chips = pots.iter().map(|p| p.amount).sum();
        prop_assert_eq!(layered, pot.total());
    }

    /// Dead money never vanishes even when contenders are a strict subset.
    #[test]
    fn pots_sum_to_total_with_folds(
        investments in investments_strategy(),
        keep in prop::collection::vec(any::<bool>(), 9),
    ) {
        let pot = pot_from(&investments);
        let contenders: BTreeSet<SeatIndex> = investments
            .keys()
            .copied()
            .filter(|&s| keep[s])
            .collect();
        prop_assume!(!contenders.is_empty());

        let pots = pot.build_pots(&contenders);
        let layered: Chips = pots.iter().map(|p| p.amount).sum();
        prop_assert_eq!(layered, pot.total());
    }

    /// Eligible sets shrink monotonically from the main pot outward, and
    /// the number of pots equals the number of distinct contender levels.
    #[test]
    fn eligibility_shrinks_by_layer(investments in investments_strategy()) {
        let pot = pot_from(&investments);
        let contenders: BTreeSet<SeatIndex> = investments.keys().copied().collect();
        let pots = pot.build_pots(&contenders);

        let levels: BTreeSet<Chips> = investments.values().copied().collect();
        prop_assert_eq!(pots.len(), levels.len());

        prop_assert_eq!(pots[0].eligible.clone(), contenders);
        for pair in pots.windows(2) {
            prop_assert!(pair[1].eligible.is_subset(&pair[0].eligible));
            prop_assert!(!pair[1].eligible.is_empty());
        }
    }

    /// Splitting never creates or destroys cents and spreads the remainder
    /// one cent at a time from the front of the order.
    #[test]
    fn split_is_exact_and_fair(
        amount in 0i64..=100_000,
        winner_count in 1usize..=9,
    ) {
        let winners: Vec<SeatIndex> = (0..winner_count).collect();
        let awards = Pot::split(amount, &winners);
        let total: Chips = awards.iter().map(|(_, a)| a).sum();
        prop_assert_eq!(total, amount);

        let max = awards.iter().map(|(_, a)| *a).max().unwrap();
        let min = awards.iter().map(|(_, a)| *a).min().unwrap();
        prop_assert!(max - min <= 1);
        // Larger shares come strictly before smaller ones.
        for pair in awards.windows(2) {
            prop_assert!(pair[0].1 >= pair[1].1);
        }
    }
}
