//! Table actor: one task per table, serializing every state transition.
//!
//! The actor owns a [`TableEngine`] and is the only code that touches it, so
//! seating, actions, timeouts, and settlement for one table never interleave.
//! Turn deadlines and reconnection grace are the only scheduled transitions;
//! both are checked against the engine's current state when they fire, so a
//! real action that arrived first always wins the race.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval};

use super::{
    config::{TableConfig, TableKind},
    messages::{TableError, TableMessage, TableStatus},
};
use crate::game::engine::{GameEvent, HandPhase, TableEngine, TableView};
use crate::game::entities::{
    Action, Chips, DisplayName, HandId, PlayerId, SeatIndex, SeatStatus, StateVersion,
};
use crate::gateway::AccountStore;
use crate::ledger::{Accounts, TableId};
use crate::net::ServerEvent;

/// Cloneable handle for sending messages to a table actor.
#[derive(Clone)]
pub struct TableHandle {
    sender: mpsc::Sender<TableMessage>,
    table_id: TableId,
}

impl TableHandle {
    #[must_use]
    pub fn new(sender: mpsc::Sender<TableMessage>, table_id: TableId) -> Self {
        Self { sender, table_id }
    }

    #[must_use]
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    /// Deliver a message to the actor. Fails only once the table is gone.
    pub async fn send(&self, message: TableMessage) -> Result<(), TableError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| TableError::Closed)
    }
}

/// Armed turn deadline for the seat currently to act. At fire time the
/// engine revalidates that the seat is still to act on the same hand, so a
/// real action that was applied first turns the firing into a stale no-op.
struct TurnDeadline {
    hand: HandId,
    seat: SeatIndex,
    at: Instant,
}

pub struct TableActor {
    id: TableId,
    config: TableConfig,
    engine: TableEngine,
    inbox: mpsc::Receiver<TableMessage>,
    accounts: Arc<Accounts>,
    store: Arc<dyn AccountStore>,
    subscribers: HashMap<PlayerId, mpsc::Sender<ServerEvent>>,
    turn_deadline: Option<TurnDeadline>,
    /// Reconnection-grace deadlines keyed by player.
    grace: HashMap<PlayerId, Instant>,
    is_closed: bool,
}

impl TableActor {
    #[must_use]
    pub fn new(
        id: TableId,
        config: TableConfig,
        accounts: Arc<Accounts>,
        store: Arc<dyn AccountStore>,
    ) -> (Self, TableHandle) {
        let (sender, inbox) = mpsc::channel(100);
        let engine = TableEngine::new(id, config.blinds(), config.seats);
        let actor = Self {
            id,
            config,
            engine,
            inbox,
            accounts,
            store,
            subscribers: HashMap::new(),
            turn_deadline: None,
            grace: HashMap::new(),
            is_closed: false,
        };
        (actor, TableHandle::new(sender, id))
    }

    /// Run the actor event loop until the table closes.
    pub async fn run(mut self) {
        log::info!("table {} '{}' starting", self.id, self.config.name);

        let mut tick = interval(Duration::from_millis(100));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                maybe = self.inbox.recv() => match maybe {
                    Some(message) => {
                        self.handle_message(message).await;
                        if self.is_closed {
                            break;
                        }
                    }
                    None => break,
                },
                _ = tick.tick() => {
                    self.tick().await;
                    if self.is_closed {
                        break;
                    }
                }
            }
        }

        log::info!("table {} '{}' closed", self.id, self.config.name);
    }

    async fn handle_message(&mut self, message: TableMessage) {
        match message {
            TableMessage::SitDown {
                player,
                name,
                stack,
                respond,
            } => {
                let result = self.handle_sit(player, name, stack);
                let _ = respond.send(result);
            }

            TableMessage::StandUp { player, respond } => {
                let result = self.handle_stand(player);
                let _ = respond.send(result);
            }

            TableMessage::TakeAction {
                player,
                hand,
                version,
                action,
                respond,
            } => {
                let result = self.handle_action(player, hand, version, action);
                let _ = respond.send(result);
                self.flush_events();
                self.conclude_if_settled().await;
            }

            TableMessage::GetView { player, respond } => {
                let _ = respond.send(self.engine.view_for(player));
            }

            TableMessage::GetStatus { respond } => {
                let _ = respond.send(self.status());
            }

            TableMessage::Disconnected { player } => {
                self.handle_disconnect(player);
            }

            TableMessage::Reconnected { player, respond } => {
                let result = self.handle_reconnect(player);
                let _ = respond.send(result);
            }

            TableMessage::Subscribe { player, sender } => {
                self.subscribers.insert(player, sender);
            }

            TableMessage::Unsubscribe { player } => {
                self.subscribers.remove(&player);
            }

            TableMessage::Close { force, respond } => {
                if self.engine.hand_in_progress() && !force {
                    let _ = respond.send(Err(TableError::HandInProgress));
                } else {
                    self.close();
                    let _ = respond.send(Ok(()));
                }
            }
        }
    }

    fn handle_sit(
        &mut self,
        player: PlayerId,
        name: DisplayName,
        stack: Chips,
    ) -> Result<SeatIndex, TableError> {
        if self.is_closed {
            self.cash_out(player, stack);
            return Err(TableError::Closed);
        }
        match self.engine.sit(player, name.clone(), stack) {
            Ok(seat) => {
                log::info!(
                    "table {}: {name} (player {player}) sat at seat {seat} with {stack}",
                    self.id
                );
                self.broadcast(ServerEvent::PlayerJoined {
                    seat,
                    name: name.to_string(),
                });
                Ok(seat)
            }
            Err(err) => {
                // The buy-in was reserved before we were asked; hand it back.
                self.cash_out(player, stack);
                Err(err.into())
            }
        }
    }

    fn handle_stand(&mut self, player: PlayerId) -> Result<(), TableError> {
        let seat = self.engine.seat_of(player).ok_or(TableError::NotAtTable)?;
        match self.engine.stand(seat)? {
            Some((player, stack)) => {
                self.cash_out(player, stack);
                self.grace.remove(&player);
                self.broadcast(ServerEvent::PlayerLeft { seat });
            }
            None => {
                // Mid-hand: folded and sitting out, cashed out at the
                // hand boundary by conclude_if_settled.
                log::debug!(
                    "table {}: player {player} standing up at next hand boundary",
                    self.id
                );
            }
        }
        self.flush_events();
        Ok(())
    }

    fn handle_action(
        &mut self,
        player: PlayerId,
        hand: HandId,
        version: StateVersion,
        action: Action,
    ) -> Result<(), TableError> {
        let seat = self.engine.seat_of(player).ok_or(TableError::NotAtTable)?;
        self.engine.act(seat, hand, version, action)?;
        Ok(())
    }

    fn handle_disconnect(&mut self, player: PlayerId) {
        let Some(seat) = self.engine.seat_of(player) else {
            return;
        };
        if self.engine.set_status(seat, SeatStatus::DisconnectedGrace).is_ok() {
            let deadline = Instant::now() + self.config.grace_window();
            self.grace.insert(player, deadline);
            log::info!(
                "table {}: player {player} disconnected, grace until {:?}",
                self.id,
                self.config.grace_window()
            );
        }
        self.flush_events();
    }

    fn handle_reconnect(&mut self, player: PlayerId) -> Result<TableView, TableError> {
        let seat = self.engine.seat_of(player).ok_or(TableError::NotAtTable)?;
        if self.engine.status_of(seat) == Some(SeatStatus::DisconnectedGrace) {
            self.engine.set_status(seat, SeatStatus::Seated)?;
            self.grace.remove(&player);
            log::info!("table {}: player {player} reconnected to seat {seat}", self.id);
        }
        self.flush_events();
        Ok(self.engine.view_for(Some(player)))
    }

    /// Periodic housekeeping: expire grace windows, start hands, fire turn
    /// deadlines.
    async fn tick(&mut self) {
        if self.is_closed {
            return;
        }

        self.expire_grace();
        self.stand_abandoned_seats();

        if self.engine.start_hand_if_ready().is_some() {
            self.flush_events();
        }

        self.maintain_turn_deadline();
        self.fire_turn_deadline_if_due();
        self.flush_events();
        self.conclude_if_settled().await;
    }

    fn expire_grace(&mut self) {
        let now = Instant::now();
        let expired: Vec<PlayerId> = self
            .grace
            .iter()
            .filter(|(_, at)| now >= **at)
            .map(|(player, _)| *player)
            .collect();
        for player in expired {
            self.grace.remove(&player);
            let Some(seat) = self.engine.seat_of(player) else {
                continue;
            };
            log::info!(
                "table {}: grace expired for player {player} at seat {seat}",
                self.id
            );
            // Never stood up mid-hand: sit the seat out and let the hand
            // boundary (or the turn deadline) deal with it.
            let in_live_hand = self.engine.hand_in_progress();
            if in_live_hand {
                let _ = self.engine.set_status(seat, SeatStatus::SittingOut);
            } else if let Ok(Some((player, stack))) = self.engine.stand(seat) {
                self.cash_out(player, stack);
                self.broadcast(ServerEvent::PlayerLeft { seat });
            }
        }
    }

    /// Stand up seats left sitting out with no hand live. The usual path is
    /// the hand-boundary summary; this catches seats orphaned by an aborted
    /// hand.
    fn stand_abandoned_seats(&mut self) {
        if self.engine.hand_in_progress() {
            return;
        }
        for seat in 0..self.engine.seat_count() {
            if self.engine.status_of(seat) == Some(SeatStatus::SittingOut)
                && let Ok(Some((player, stack))) = self.engine.stand(seat)
            {
                self.cash_out(player, stack);
                self.grace.remove(&player);
                self.broadcast(ServerEvent::PlayerLeft { seat });
            }
        }
    }

    /// Keep exactly one deadline armed for the seat to act. Re-arming on a
    /// (hand, seat) change rather than on every version bump means a seat's
    /// clock is not reset by unrelated state changes.
    fn maintain_turn_deadline(&mut self) {
        match (self.engine.choices(), self.engine.hand_id()) {
            (Some((seat, _)), Some(hand)) => {
                let same_turn = self
                    .turn_deadline
                    .as_ref()
                    .is_some_and(|d| d.hand == hand && d.seat == seat);
                if !same_turn {
                    self.turn_deadline = Some(TurnDeadline {
                        hand,
                        seat,
                        at: Instant::now() + self.config.turn_deadline(),
                    });
                }
            }
            _ => {
                self.turn_deadline = None;
            }
        }
    }

    fn fire_turn_deadline_if_due(&mut self) {
        let Some(deadline) = self.turn_deadline.as_ref() else {
            return;
        };
        // A seat that was forced to sit out has abandoned its turn; act for
        // it immediately instead of burning the full deadline.
        let abandoned = self
            .engine
            .status_of(deadline.seat)
            .is_some_and(|s| s == SeatStatus::SittingOut);
        if Instant::now() < deadline.at && !abandoned {
            return;
        }
        let (hand, seat) = (deadline.hand, deadline.seat);
        self.turn_deadline = None;
        if self.engine.hand_id() != Some(hand) {
            return;
        }
        // The engine revalidates that the seat is still to act; if a real
        // action won the race this is a stale no-op.
        match self.engine.apply_timeout(seat) {
            Ok(()) => {
                log::info!("table {}: seat {seat} timed out", self.id);
            }
            Err(_) => {
                log::debug!("table {}: stale turn deadline for seat {seat}", self.id);
            }
        }
    }

    async fn conclude_if_settled(&mut self) {
        if self.engine.phase() != HandPhase::Settled {
            return;
        }
        let Some(summary) = self.engine.conclude_hand() else {
            return;
        };
        for player in &summary.dealt_in {
            self.store.record_hand_played(*player).await;
        }
        for (player, stack) in &summary.stood_up {
            self.cash_out(*player, *stack);
            self.grace.remove(player);
            self.subscribers.remove(player);
        }
        self.flush_events();

        // Private tables fold up once everyone is gone.
        if self.config.kind == TableKind::Private && self.engine.occupied_count() == 0 {
            self.close();
        }
    }

    fn close(&mut self) {
        // A force-close can interrupt a live hand; refund the pot first so
        // the stands below return full stacks.
        if self.engine.hand_in_progress() {
            self.engine.abort_hand();
        }
        // Cash out anyone still seated so no chips are stranded.
        for seat in 0..self.engine.seat_count() {
            if let Ok(Some((player, stack))) = self.engine.stand(seat) {
                self.cash_out(player, stack);
            }
        }
        self.broadcast(ServerEvent::TableClosed);
        self.subscribers.clear();
        self.grace.clear();
        self.turn_deadline = None;
        self.is_closed = true;
    }

    fn cash_out(&self, player: PlayerId, stack: Chips) {
        if stack <= 0 {
            return;
        }
        if let Err(err) = self.accounts.credit_cash_out(player, self.id, stack) {
            // Chips would be stranded; this is the one ledger failure that
            // cannot be surfaced to a request.
            log::error!(
                "table {}: failed to cash out {stack} for player {player}: {err}",
                self.id
            );
        }
    }

    fn status(&self) -> TableStatus {
        TableStatus {
            id: self.id,
            name: self.config.name.clone(),
            kind: self.config.kind,
            player_count: self.engine.occupied_count(),
            seats: self.config.seats,
            small_blind: self.config.small_blind,
            big_blind: self.config.big_blind,
            hand_in_progress: self.engine.hand_in_progress(),
        }
    }

    /// Translate drained engine events into protocol events and fan them
    /// out. Hole cards are delivered privately, everything else broadcast.
    fn flush_events(&mut self) {
        for event in self.engine.drain_events() {
            match event {
                GameEvent::HandStarted { hand, button } => {
                    self.broadcast(ServerEvent::HandStarted {
                        table: self.id,
                        hand,
                        button,
                    });
                    self.send_hole_cards(hand);
                }
                GameEvent::BlindPosted { seat, kind, amount } => {
                    self.broadcast(ServerEvent::BlindPosted { seat, kind, amount });
                }
                GameEvent::ActionTaken { seat, applied } => {
                    self.broadcast(ServerEvent::ActionTaken { seat, applied });
                }
                GameEvent::TimedOut { seat, applied } => {
                    self.broadcast(ServerEvent::TimedOut { seat, applied });
                }
                GameEvent::RoundAdvanced { phase, board } => {
                    self.broadcast(ServerEvent::RoundAdvanced { phase, board });
                }
                GameEvent::TurnChanged { seat, choices } => {
                    let deadline_ms = self.config.turn_deadline().as_millis() as u64;
                    self.broadcast(ServerEvent::TurnSignal {
                        seat,
                        choices,
                        version: self.engine.version(),
                        deadline_ms,
                    });
                }
                GameEvent::Showdown { reveals } => {
                    self.broadcast(ServerEvent::Showdown { reveals });
                }
                GameEvent::PotAwarded {
                    pot_index,
                    seat,
                    amount,
                } => {
                    self.broadcast(ServerEvent::PotAwarded {
                        pot_index,
                        seat,
                        amount,
                    });
                }
                GameEvent::HandEnded { hand } => {
                    self.broadcast(ServerEvent::HandEnded { hand });
                }
            }
        }
    }

    fn send_hole_cards(&mut self, hand: HandId) {
        let deliveries: Vec<(PlayerId, ServerEvent)> = self
            .subscribers
            .keys()
            .filter_map(|&player| {
                let seat = self.engine.seat_of(player)?;
                let cards = self.engine.hole_of(seat)?;
                Some((player, ServerEvent::HoleCards { hand, cards }))
            })
            .collect();
        for (player, event) in deliveries {
            self.send_to(player, event);
        }
    }

    fn send_to(&mut self, player: PlayerId, event: ServerEvent) {
        if let Some(sender) = self.subscribers.get(&player)
            && sender.try_send(event).is_err()
        {
            log::debug!("table {}: dropping event for player {player}", self.id);
        }
    }

    /// Fan an event out to every subscriber, pruning dead channels.
    fn broadcast(&mut self, event: ServerEvent) {
        self.subscribers.retain(|player, sender| {
            match sender.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log::warn!("subscriber {player} channel full, dropping event");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::AccountStore;
    use async_trait::async_trait;
    use tokio::sync::oneshot;

    struct NullStore;

    #[async_trait]
    impl AccountStore for NullStore {
        async fn level(&self, _player: PlayerId) -> u32 {
            0
        }
        async fn record_hand_played(&self, _player: PlayerId) {}
    }

    fn spawn_table(config: TableConfig) -> (TableHandle, Arc<Accounts>) {
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

    #[tokio::test]
    async fn sit_down_failure_refunds_reservation() {
        let config = TableConfig {
            seats: 2,
            ..TableConfig::default()
        };
        let (handle, accounts) = spawn_table(config);
        sit(&handle, &accounts, 1, 1_000).await;
        sit(&handle, &accounts, 2, 1_000).await;

        // Third player cannot be seated; the reservation must come back.
        accounts.register(3);
        accounts.confirm_deposit(3, 1_000).unwrap();
        accounts.reserve_buy_in(3, 1, 1_000).unwrap();
        assert_eq!(accounts.balance(3).unwrap(), 0);

        let (tx, rx) = oneshot::channel();
        handle
            .send(TableMessage::SitDown {
                player: 3,
                name: DisplayName::new("late"),
                stack: 1_000,
                respond: tx,
            })
            .await
            .unwrap();
        let err = rx.await.unwrap().unwrap_err();
        assert!(matches!(err, TableError::Game(_)));
        assert_eq!(accounts.balance(3).unwrap(), 1_000);
    }

    #[tokio::test]
    async fn stand_up_between_hands_cashes_out() {
        let (handle, accounts) = spawn_table(TableConfig::default());
        sit(&handle, &accounts, 7, 2_000).await;
        assert_eq!(accounts.balance(7).unwrap(), 0);

        let (tx, rx) = oneshot::channel();
        handle
            .send(TableMessage::StandUp {
                player: 7,
                respond: tx,
            })
            .await
            .unwrap();
        rx.await.unwrap().unwrap();
        assert_eq!(accounts.balance(7).unwrap(), 2_000);
    }

    #[tokio::test]
    async fn status_reports_seating() {
        let (handle, accounts) = spawn_table(TableConfig::default());
        sit(&handle, &accounts, 1, 1_000).await;

        let (tx, rx) = oneshot::channel();
        handle
            .send(TableMessage::GetStatus { respond: tx })
            .await
            .unwrap();
        let status = rx.await.unwrap();
        assert_eq!(status.player_count, 1);
        assert!(!status.hand_in_progress);
    }

    #[tokio::test]
    async fn close_refuses_while_hand_is_live() {
        let (handle, accounts) = spawn_table(TableConfig::default());
        sit(&handle, &accounts, 1, 1_000).await;
        sit(&handle, &accounts, 2, 1_000).await;

        // Wait for the tick loop to deal a hand.
        tokio::time::sleep(Duration::from_millis(300)).await;

        let (tx, rx) = oneshot::channel();
        handle
            .send(TableMessage::Close {
                force: false,
                respond: tx,
            })
            .await
            .unwrap();
        assert_eq!(rx.await.unwrap(), Err(TableError::HandInProgress));
    }
}
