//! Reconnection and timeout behavior at the table-actor level: grace
//! windows, state carry-over across a reconnect, synthetic actions for
//! absent seats, and the stale rejection of actions that lost the race.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cardroom::entities::{Action, Chips, DisplayName, PlayerId, SeatStatus};
use cardroom::game::engine::{GameError, HandPhase, TableView};
use cardroom::gateway::AccountStore;
use cardroom::table::{TableConfig, TableError, TableMessage};
use cardroom::{Accounts, TableActor, TableHandle};
use tokio::sync::oneshot;

struct NullStore;

#[async_trait]
impl AccountStore for NullStore {
    async fn level(&self, _player: PlayerId) -> u32 {
        0
    }
    async fn record_hand_played(&self, _player: PlayerId) {}
}

fn table_config(turn_deadline_secs: u64, grace_window_secs: u64) -> TableConfig {
    TableConfig {
        name: "test".to_string(),
        seats: 3,
        turn_deadline_secs,
        grace_window_secs,
        ..TableConfig::default()
    }
}

fn spawn(config: TableConfig) -> (TableHandle, Arc<Accounts>) {
    let accounts = Arc::new(Accounts::new());
    let (actor, handle) = TableActor::new(1, config, accounts.clone(), Arc::new(NullStore));
    tokio::spawn(actor.run());
    (handle, accounts)
}

async fn sit(handle: &TableHandle, accounts: &Accounts, player: PlayerId, stack: Chips) {
    accounts.register(player);
    accounts.confirm_deposit(player, stack).unwrap();
    accounts.reserve_buy_in(player, handle.table_id(), stack).unwrap();
    let (tx, rx) = oneshot::channel();
    handle
        .send(TableMessage::SitDown {
            player,
            name: DisplayName::new(&format!("p{player}")),
            stack,
            respond: tx,
        })
        .await
        .unwrap();
    rx.await.unwrap().unwrap();
}

async fn view_for(handle: &TableHandle, player: Option<PlayerId>) -> TableView {
    let (tx, rx) = oneshot::channel();
    handle
        .send(TableMessage::GetView {
            player,
            respond: tx,
        })
        .await
        .unwrap();
    rx.await.unwrap()
}

async fn wait_for_hand(handle: &TableHandle) -> TableView {
    loop {
        tokio::time::sleep(Duration::from_millis(150)).await;
        let view = view_for(handle, None).await;
        if view.hand.is_some() && view.phase.is_betting() {
            return view;
        }
    }
}

fn seat_of(view: &TableView, name: &str) -> usize {
    view.seats
        .iter()
        .find(|s| s.name.as_str() == name)
        .map(|s| s.index)
        .expect("seat present")
}

/// A seat disconnected and reconnected within the grace window keeps its
/// exact stack and hole cards and returns to `Seated`.
#[tokio::test(start_paused = true)]
async fn reconnect_within_grace_restores_seat_state() {
    let (handle, accounts) = spawn(table_config(3_600, 60));
    sit(&handle, &accounts, 1, 1_000).await;
    sit(&handle, &accounts, 2, 1_000).await;
    wait_for_hand(&handle).await;

    let before = view_for(&handle, Some(1)).await;
    let seat = seat_of(&before, "p1");
    let stack_before = before.seats[seat].stack;
    let hole_before = before.seats[seat].hole.clone().expect("own hole cards");

    handle
        .send(TableMessage::Disconnected { player: 1 })
        .await
        .unwrap();
    let during = view_for(&handle, Some(1)).await;
    assert_eq!(during.seats[seat].status, SeatStatus::DisconnectedGrace);

    // Well inside the 60 s window.
    tokio::time::sleep(Duration::from_secs(5)).await;

    let (tx, rx) = oneshot::channel();
    handle
        .send(TableMessage::Reconnected {
            player: 1,
            respond: tx,
        })
        .await
        .unwrap();
    let resync = rx.await.unwrap().unwrap();

    assert_eq!(resync.seats[seat].status, SeatStatus::Seated);
    assert_eq!(resync.seats[seat].stack, stack_before);
    assert_eq!(resync.seats[seat].hole.as_deref(), Some(&hole_before[..]));
    assert_eq!(resync.hand, before.hand);
}

/// After grace expiry the seat is sat out but never removed mid-hand; the
/// stand-up (and cash-out) happens at the hand boundary.
#[tokio::test(start_paused = true)]
async fn grace_expiry_stands_up_only_at_hand_boundary() {
    let (handle, accounts) = spawn(table_config(3_600, 2));
    sit(&handle, &accounts, 1, 1_000).await;
    sit(&handle, &accounts, 2, 1_000).await;
    let view = wait_for_hand(&handle).await;
    let hand = view.hand.unwrap();
    let seat = view.to_act.unwrap();
    let away: PlayerId = if view.seats[seat].name.as_str() == "p1" { 1 } else { 2 };
    let stayer = 3 - away;

    handle
        .send(TableMessage::Disconnected { player: away })
        .await
        .unwrap();

    // Let the 2 s grace expire while the hand is still live.
    tokio::time::sleep(Duration::from_secs(3)).await;
    let mid_hand = view_for(&handle, None).await;
    if mid_hand.hand == Some(hand) {
        // Still the same hand: the seat must not have been removed.
        assert!(
            mid_hand.seats.iter().any(|s| s.index == seat),
            "seat removed mid-hand"
        );
    }

    // Once the absent seat's turn is folded for it, the hand settles and
    // the boundary stands the player up with their remaining stack.
    let away_name = format!("p{away}");
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let now = view_for(&handle, None).await;
        if now.seats.iter().all(|s| s.name.as_str() != away_name) {
            break;
        }
    }
    let after = view_for(&handle, None).await;
    assert!(after.seats.iter().all(|s| s.name.as_str() != away_name));
    // The stack came back through the ledger, minus whatever the hand cost.
    let balance = accounts.balance(away).unwrap();
    assert!(balance > 0, "cash-out missing");
    let stayer_total = accounts.balance(stayer).unwrap()
        + after
            .seats
            .iter()
            .find(|s| s.name.as_str() == format!("p{stayer}"))
            .map_or(0, |s| s.stack);
    assert_eq!(balance + stayer_total, 2_000);
}

/// The engine synthesizes a fold (or check) when the turn deadline passes,
/// and a real action arriving after the synthetic one is rejected stale.
#[tokio::test(start_paused = true)]
async fn late_action_after_timeout_fold_is_stale() {
    let (handle, accounts) = spawn(table_config(1, 600));
    sit(&handle, &accounts, 1, 1_000).await;
    sit(&handle, &accounts, 2, 1_000).await;
    let view = wait_for_hand(&handle).await;
    let hand = view.hand.unwrap();
    let version = view.version;
    let to_act = view.to_act.unwrap();
    let player = view
        .seats
        .iter()
        .find(|s| s.index == to_act)
        .map(|s| if s.name.as_str() == "p1" { 1 } else { 2 })
        .unwrap();

    // Sleep past the 1 s turn deadline so the synthetic fold fires.
    tokio::time::sleep(Duration::from_secs(2)).await;

    let (tx, rx) = oneshot::channel();
    handle
        .send(TableMessage::TakeAction {
            player,
            hand,
            version,
            action: Action::Call,
            respond: tx,
        })
        .await
        .unwrap();
    let err = rx.await.unwrap().unwrap_err();
    assert_eq!(err, TableError::Game(GameError::StaleReference));
}

/// A real action that arrives before the deadline wins: nothing is
/// synthesized and the hand proceeds from the player's own choice.
#[tokio::test(start_paused = true)]
async fn real_action_before_deadline_wins_race() {
    let (handle, accounts) = spawn(table_config(5, 600));
    sit(&handle, &accounts, 1, 1_000).await;
    sit(&handle, &accounts, 2, 1_000).await;
    let view = wait_for_hand(&handle).await;
    let hand = view.hand.unwrap();
    let to_act = view.to_act.unwrap();
    let player = view
        .seats
        .iter()
        .find(|s| s.index == to_act)
        .map(|s| if s.name.as_str() == "p1" { 1 } else { 2 })
        .unwrap();

    let (tx, rx) = oneshot::channel();
    handle
        .send(TableMessage::TakeAction {
            player,
            hand,
            version: view.version,
            action: Action::Call,
            respond: tx,
        })
        .await
        .unwrap();
    rx.await.unwrap().unwrap();

    // The deadline for the first seat must not fire a fold later: the big
    // blind still holds the option and the hand is still on its first
    // betting round after the deadline horizon passes.
    tokio::time::sleep(Duration::from_secs(6)).await;
    let now = view_for(&handle, None).await;
    if now.hand == Some(hand) {
        let folded: usize = now.seats.iter().filter(|s| s.folded).count();
        assert_eq!(folded, 0, "synthetic fold fired despite the real action");
    }
}

/// Disconnected seats keep receiving the hand's progress conceptually (the
/// seat stays dealt in) but the timeout policy still folds them when it is
/// their turn.
#[tokio::test(start_paused = true)]
async fn disconnected_seat_folds_on_its_turn_not_before() {
    let (handle, accounts) = spawn(table_config(2, 600));
    sit(&handle, &accounts, 1, 1_000).await;
    sit(&handle, &accounts, 2, 1_000).await;
    let view = wait_for_hand(&handle).await;
    let to_act = view.to_act.unwrap();
    let away = view
        .seats
        .iter()
        .find(|s| s.index == to_act)
        .map(|s| if s.name.as_str() == "p1" { 1 } else { 2 })
        .unwrap();

    handle
        .send(TableMessage::Disconnected { player: away })
        .await
        .unwrap();

    // Before the deadline the seat is merely in grace, not folded.
    let early = view_for(&handle, None).await;
    assert_eq!(early.seats[to_act].status, SeatStatus::DisconnectedGrace);
    assert!(!early.seats[to_act].folded);

    // After the deadline the engine has folded for it and play moved on.
    tokio::time::sleep(Duration::from_secs(3)).await;
    let later = view_for(&handle, None).await;
    let still_same_hand = later.hand == view.hand;
    if still_same_hand {
        assert!(later.seats[to_act].folded);
    } else {
        // Heads-up: the fold ended the hand entirely.
        assert_eq!(later.phase, HandPhase::WaitingForPlayers);
    }
}
