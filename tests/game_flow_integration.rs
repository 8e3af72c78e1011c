//! End-to-end game flow: the heads-up blinds scenario, turn order, and a
//! full lobby round trip through registry, actors, and the ledger.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cardroom::entities::{Action, Chips, DisplayName, PlayerId, SeatIndex};
use cardroom::game::engine::GameEvent;
use cardroom::gateway::AccountStore;
use cardroom::{Accounts, Blinds, HandPhase, TableEngine, TableRegistry};

struct NullStore;

#[async_trait]
impl AccountStore for NullStore {
    async fn level(&self, _player: PlayerId) -> u32 {
        0
    }
    async fn record_hand_played(&self, _player: PlayerId) {}
}

fn engine_with(stacks: &[Chips]) -> TableEngine {
    let mut engine = TableEngine::new(1, Blinds { small: 10, big: 20 }, stacks.len());
    for (i, &stack) in stacks.iter().enumerate() {
        engine
            .sit(i as PlayerId + 1, DisplayName::new(&format!("p{i}")), stack)
            .unwrap();
    }
    engine
}

fn act_current(engine: &mut TableEngine, action: Action) {
    let (seat, _) = engine.choices().expect("seat to act");
    let hand = engine.hand_id().unwrap();
    let version = engine.version();
    engine.act(seat, hand, version, action).unwrap();
}

/// Two players, blinds 10/20, stacks 1000/1000: small blind completes, big
/// blind checks, board runs out checked down, evaluator declares the result,
/// and the winner gains exactly what the loser put in.
#[test]
fn heads_up_limped_hand_settles_exactly() {
    let mut engine = engine_with(&[1_000, 1_000]);
    engine.start_hand_if_ready().unwrap();
    engine.drain_events();

    // Small blind (the button) completes to 20; big blind checks.
    act_current(&mut engine, Action::Call);
    act_current(&mut engine, Action::Check);
    assert_eq!(engine.phase(), HandPhase::Flop);

    // Check the board down.
    while engine.phase().is_betting() {
        act_current(&mut engine, Action::Check);
    }
    assert_eq!(engine.phase(), HandPhase::Settled);

    let awards: Vec<(SeatIndex, Chips)> = engine
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            GameEvent::PotAwarded { seat, amount, .. } => Some((seat, amount)),
            _ => None,
        })
        .collect();
    let pot: Chips = awards.iter().map(|(_, a)| a).sum();
    assert_eq!(pot, 40);

    let (s0, s1) = (engine.stack_of(0).unwrap(), engine.stack_of(1).unwrap());
    assert_eq!(s0 + s1, 2_000);
    if awards.len() == 1 {
        // Outright winner: up exactly the loser's net contribution.
        assert_eq!(s0.max(s1), 1_020);
        assert_eq!(s0.min(s1), 980);
    } else {
        // Declared tie: both stacks restored.
        assert_eq!((s0, s1), (1_000, 1_000));
    }
}

/// The sequence of seats granted action is clockwise from the correct
/// starting seat each round: left of the big blind preflop, left of the
/// button postflop.
#[test]
fn turn_order_is_clockwise_per_round() {
    let mut engine = engine_with(&[2_000, 2_000, 2_000, 2_000]);
    engine.start_hand_if_ready().unwrap();
    let button = engine.button();
    let n = 4;

    let mut turns_by_phase: Vec<(HandPhase, SeatIndex)> = Vec::new();
    let mut phase = HandPhase::Preflop;
    for event in engine.drain_events() {
        if let GameEvent::TurnChanged { seat, .. } = event {
            turns_by_phase.push((phase, seat));
        }
    }

    // Call or check every turn to the river.
    while engine.phase().is_betting() {
        let (_, choices) = engine.choices().unwrap();
        let action = if choices.can_check {
            Action::Check
        } else {
            Action::Call
        };
        act_current(&mut engine, action);
        phase = engine.phase();
        for event in engine.drain_events() {
            if let GameEvent::TurnChanged { seat, .. } = event {
                turns_by_phase.push((phase, seat));
            }
        }
    }

    let order_in = |wanted: HandPhase| -> Vec<SeatIndex> {
        turns_by_phase
            .iter()
            .filter(|(p, _)| *p == wanted)
            .map(|(_, s)| *s)
            .collect()
    };

    // Preflop: under the gun is three seats past the button.
    let preflop = order_in(HandPhase::Preflop);
    let expected: Vec<SeatIndex> = (3..=6).map(|i| (button + i) % n).collect();
    assert_eq!(preflop, expected);

    // Postflop rounds start left of the button.
    for phase in [HandPhase::Flop, HandPhase::Turn, HandPhase::River] {
        let order = order_in(phase);
        let expected: Vec<SeatIndex> = (1..=4).map(|i| (button + i) % n).collect();
        assert_eq!(order, expected, "order wrong on {phase}");
    }
}

/// Folded and all-in seats are skipped when granting turns.
#[test]
fn folded_and_all_in_seats_are_skipped() {
    let mut engine = engine_with(&[2_000, 60, 2_000, 2_000]);
    engine.start_hand_if_ready().unwrap();
    let button = engine.button();
    let short_seat = 1;

    // UTG folds; the short stack shoves; the rest call.
    act_current(&mut engine, Action::Fold);
    let folded_seat = (button + 3) % 4;
    while engine.phase() == HandPhase::Preflop {
        let (seat, choices) = engine.choices().unwrap();
        assert_ne!(seat, folded_seat);
        let action = if seat == short_seat {
            Action::AllIn
        } else if choices.call.is_some() {
            Action::Call
        } else {
            Action::Check
        };
        act_current(&mut engine, action);
    }

    // Postflop turns go only to the two live full stacks.
    engine.drain_events();
    while engine.phase().is_betting() {
        let (seat, _) = engine.choices().unwrap();
        assert_ne!(seat, folded_seat);
        assert_ne!(seat, short_seat);
        act_current(&mut engine, Action::Check);
    }
    assert_eq!(engine.phase(), HandPhase::Settled);
    assert_eq!(engine.total_chips(), 2_000 + 60 + 2_000 + 2_000);
}

/// Full lobby round trip: deposits, cash-table join, a complete hand played
/// through the registry, and cash-outs that conserve every cent.
#[tokio::test(start_paused = true)]
async fn registry_hand_round_trip_conserves_bankrolls() -> anyhow::Result<()> {
    let accounts = Arc::new(Accounts::new());
    let registry = Arc::new(TableRegistry::new(accounts.clone(), Arc::new(NullStore)));
    registry.open_cash_tables().await;

    for player in [1, 2] {
        accounts.register(player);
        accounts.confirm_deposit(player, 5_000)?;
    }

    let table = 1; // Beginners, 10/20.
    let mut seat_to_player: HashMap<SeatIndex, PlayerId> = HashMap::new();
    for player in [1, 2] {
        let seat = registry
            .join_table(table, player, &format!("p{player}"), 2_000, None)
            .await?;
        seat_to_player.insert(seat, player);
    }

    // Let the actor deal the first hand.
    let first_hand = loop {
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        let view = registry.view(table, None).await?;
        if let Some(hand) = view.hand {
            break hand;
        }
    };

    // Play that hand to completion: every seat checks or calls. The table
    // will deal again afterwards, so stop as soon as the hand id changes.
    loop {
        let view = registry.view(table, None).await?;
        if view.hand != Some(first_hand) || !view.phase.is_betting() {
            break;
        }
        let Some(seat) = view.to_act else {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            continue;
        };
        let player = seat_to_player[&seat];
        let mine = registry.view(table, Some(player)).await?;
        if mine.hand != Some(first_hand) {
            break;
        }
        let Some(choices) = mine.choices else {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            continue;
        };
        let action = if choices.can_check {
            Action::Check
        } else {
            Action::Call
        };
        registry
            .take_action(table, player, first_hand, mine.version, action)
            .await?;
    }

    // Stand both players up; stacks flow back through the ledger.
    for player in [1, 2] {
        registry.leave_table(table, player).await?;
    }
    // Mid-hand stand-ups cash out at the hand boundary.
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let status_empty = registry
            .list_tables()
            .await
            .iter()
            .find(|s| s.id == table)
            .is_some_and(|s| s.player_count == 0);
        if status_empty {
            break;
        }
    }

    let total = accounts.balance(1)? + accounts.balance(2)?;
    assert_eq!(total, 10_000);
    Ok(())
}
