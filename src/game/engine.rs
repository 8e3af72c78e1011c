//! Per-table betting engine.
//!
//! One [`TableEngine`] owns a table's seats, deck, button, and the live hand.
//! It is a plain mutable state machine with no interior locking: the table
//! actor serializes every call, so at most one transition runs at a time.
//! Chips only move through [`Pot`] postings and the settlement credits here;
//! the sum of seat stacks plus the pot is checked against the hand's opening
//! total at every settlement.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use thiserror::Error;

use super::entities::{
    Action, ActionChoices, Blinds, Card, Chips, Deck, DisplayName, HandId, MAX_SEATS, MIN_PLAYERS,
    Occupant, PlayerId, Seat, SeatIndex, SeatStatus, SeatView, StateVersion,
};
use super::evaluator::{self, HandRank};
use crate::ledger::{LedgerError, Pot, SidePot, TableId};

/// Lifecycle of a table's current hand. `WaitingForPlayers` is the resting
/// state between hands; `Dealing` only exists inside hand setup.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum HandPhase {
    WaitingForPlayers,
    Dealing,
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
    Settled,
}

impl HandPhase {
    #[must_use]
    pub fn is_betting(self) -> bool {
        matches!(self, Self::Preflop | Self::Flop | Self::Turn | Self::River)
    }
}

impl fmt::Display for HandPhase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::WaitingForPlayers => "waiting for players",
            Self::Dealing => "dealing",
            Self::Preflop => "preflop",
            Self::Flop => "flop",
            Self::Turn => "turn",
            Self::River => "river",
            Self::Showdown => "showdown",
            Self::Settled => "settled",
        };
        write!(f, "{repr}")
    }
}

/// Why an action was rejected as illegal.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum IllegalReason {
    #[error("not your turn")]
    OutOfTurn,
    #[error("cannot check while facing a bet")]
    CheckFacingBet,
    #[error("nothing to call")]
    NothingToCall,
    #[error("there is already a bet; raise instead")]
    BetFacingBet,
    #[error("no bet to raise")]
    RaiseWithoutBet,
    #[error("bet below the minimum of {min}")]
    BetTooSmall { min: Chips },
    #[error("raise below the minimum of {min}")]
    RaiseTooSmall { min: Chips },
    #[error("seat cannot act in this hand")]
    CannotAct,
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum GameError {
    /// The action violates turn order or betting rules. No state changed.
    #[error("illegal action: {0}")]
    IllegalAction(IllegalReason),

    /// The action references a hand or state version that has already
    /// advanced (including a turn consumed by a timeout fold).
    #[error("stale reference: table state has advanced")]
    StaleReference,

    /// Join or seating request against a full or unusable seat.
    #[error("seat unavailable")]
    SeatUnavailable,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Chip conservation failed. The hand is aborted and the table
    /// reconciled; other tables are unaffected.
    #[error("chip conservation violated: expected {expected}, found {actual}")]
    InvariantViolation { expected: Chips, actual: Chips },
}

/// An action as actually applied, with the chips it moved.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AppliedAction {
    pub action: Action,
    /// Chips moved into the pot by this action.
    pub posted: Chips,
    pub all_in: bool,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum BlindKind {
    Small,
    Big,
}

/// Engine-level happenings, drained by the table actor after each call and
/// fanned out to sessions as protocol events.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum GameEvent {
    HandStarted {
        hand: HandId,
        button: SeatIndex,
    },
    BlindPosted {
        seat: SeatIndex,
        kind: BlindKind,
        amount: Chips,
    },
    ActionTaken {
        seat: SeatIndex,
        applied: AppliedAction,
    },
    /// The engine folded or checked for a seat that timed out or sat
    /// disconnected. The only action the engine ever originates.
    TimedOut {
        seat: SeatIndex,
        applied: AppliedAction,
    },
    RoundAdvanced {
        phase: HandPhase,
        board: Vec<Card>,
    },
    TurnChanged {
        seat: SeatIndex,
        choices: ActionChoices,
    },
    Showdown {
        reveals: Vec<(SeatIndex, Vec<Card>, HandRank)>,
    },
    PotAwarded {
        pot_index: usize,
        seat: SeatIndex,
        amount: Chips,
    },
    HandEnded {
        hand: HandId,
    },
}

/// What a concluded hand leaves behind for the actor: who played (for the
/// account store's hand counter) and who was stood up at the boundary.
#[derive(Clone, Debug, Default)]
pub struct HandSummary {
    pub dealt_in: Vec<PlayerId>,
    pub stood_up: Vec<(PlayerId, Chips)>,
}

#[derive(Debug)]
struct HandState {
    id: HandId,
    phase: HandPhase,
    board: Vec<Card>,
    pot: Pot,
    /// Highest total wagered by any seat this betting round.
    current_bet: Chips,
    /// Increment a raise must add on top of `current_bet`.
    min_raise: Chips,
    to_act: Option<SeatIndex>,
    /// Seats that still owe a decision this round.
    needs_action: BTreeSet<SeatIndex>,
    /// Stacks plus pot at the moment the hand started.
    opening_total: Chips,
    went_to_showdown: bool,
}

/// Redacted table snapshot for one viewer.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TableView {
    pub table: TableId,
    pub blinds: Blinds,
    pub phase: HandPhase,
    pub hand: Option<HandId>,
    pub version: StateVersion,
    pub button: SeatIndex,
    pub board: Vec<Card>,
    pub pot_total: Chips,
    pub to_act: Option<SeatIndex>,
    /// Present when the viewer is the seat to act.
    pub choices: Option<ActionChoices>,
    pub seats: Vec<SeatView>,
}

pub struct TableEngine {
    table: TableId,
    blinds: Blinds,
    seats: Vec<Seat>,
    button: SeatIndex,
    deck: Deck,
    hand: Option<HandState>,
    version: StateVersion,
    events: VecDeque<GameEvent>,
}

impl TableEngine {
    #[must_use]
    pub fn new(table: TableId, blinds: Blinds, seat_count: usize) -> Self {
        let seat_count = seat_count.min(MAX_SEATS);
        Self {
            table,
            blinds,
            seats: vec![Seat::default(); seat_count],
            button: 0,
            deck: Deck::default(),
            hand: None,
            version: 0,
            events: VecDeque::new(),
        }
    }

    #[must_use]
    pub fn version(&self) -> StateVersion {
        self.version
    }

    #[must_use]
    pub fn phase(&self) -> HandPhase {
        self.hand
            .as_ref()
            .map_or(HandPhase::WaitingForPlayers, |h| h.phase)
    }

    #[must_use]
    pub fn hand_id(&self) -> Option<HandId> {
        self.hand.as_ref().map(|h| h.id)
    }

    #[must_use]
    pub fn hand_in_progress(&self) -> bool {
        self.hand.is_some()
    }

    #[must_use]
    pub fn button(&self) -> SeatIndex {
        self.button
    }

    #[must_use]
    pub fn seat_count(&self) -> usize {
        self.seats.len()
    }

    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.seats.iter().filter(|s| !s.is_empty()).count()
    }

    #[must_use]
    pub fn seat_of(&self, player: PlayerId) -> Option<SeatIndex> {
        self.seats
            .iter()
            .position(|s| s.occupant.as_ref().is_some_and(|o| o.player == player))
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.events.drain(..).collect()
    }

    /// Seat a player with a stack the ledger already reserved.
    pub fn sit(
        &mut self,
        player: PlayerId,
        name: DisplayName,
        stack: Chips,
    ) -> Result<SeatIndex, GameError> {
        if self.seat_of(player).is_some() {
            return Err(GameError::SeatUnavailable);
        }
        let index = self
            .seats
            .iter()
            .position(Seat::is_empty)
            .ok_or(GameError::SeatUnavailable)?;
        self.seats[index].occupant = Some(Occupant::new(player, name, stack));
        self.bump();
        Ok(index)
    }

    /// Stand a seat up. Between hands the seat empties immediately and its
    /// stack is returned for cash-out. Mid-hand the seat is folded and marked
    /// sitting out; the stack comes back with the hand-boundary summary.
    pub fn stand(&mut self, seat: SeatIndex) -> Result<Option<(PlayerId, Chips)>, GameError> {
        let (in_hand, can_act) = {
            let occ = self
                .seats
                .get(seat)
                .and_then(|s| s.occupant.as_ref())
                .ok_or(GameError::SeatUnavailable)?;
            (occ.in_hand(), occ.can_act())
        };

        if self.hand.is_some() && in_hand {
            if let Some(occ) = self.occupant_mut(seat) {
                occ.status = SeatStatus::SittingOut;
            }
            if can_act && self.phase().is_betting() {
                self.fold_out_of_turn(seat);
            }
            self.bump();
            Ok(None)
        } else {
            let occupant = self.seats[seat].occupant.take().expect("occupant checked");
            self.bump();
            Ok(Some((occupant.player, occupant.stack)))
        }
    }

    /// Update a seat's connection status. Disconnected seats keep their
    /// stack and cards; the actor owns the grace timing.
    pub fn set_status(&mut self, seat: SeatIndex, status: SeatStatus) -> Result<(), GameError> {
        let occupant = self
            .seats
            .get_mut(seat)
            .and_then(|s| s.occupant.as_mut())
            .ok_or(GameError::SeatUnavailable)?;
        occupant.status = status;
        self.bump();
        Ok(())
    }

    #[must_use]
    pub fn stack_of(&self, seat: SeatIndex) -> Option<Chips> {
        self.seats
            .get(seat)
            .and_then(|s| s.occupant.as_ref())
            .map(|o| o.stack)
    }

    #[must_use]
    pub fn status_of(&self, seat: SeatIndex) -> Option<SeatStatus> {
        self.occupant(seat).map(|o| o.status)
    }

    #[must_use]
    pub fn player_at(&self, seat: SeatIndex) -> Option<PlayerId> {
        self.occupant(seat).map(|o| o.player)
    }

    /// The seat's live hole cards, if any were dealt this hand.
    #[must_use]
    pub fn hole_of(&self, seat: SeatIndex) -> Option<Vec<Card>> {
        self.occupant(seat)
            .filter(|o| !o.hole.is_empty())
            .map(|o| o.hole.clone())
    }

    /// Start a hand if none is live and enough seated stacks remain.
    /// Returns the new hand id when dealing happened.
    pub fn start_hand_if_ready(&mut self) -> Option<HandId> {
        if self.hand.is_some() {
            return None;
        }
        let dealt: Vec<SeatIndex> = self
            .seat_indices()
            .filter(|&i| self.occupant(i).is_some_and(Occupant::deals_in))
            .collect();
        if dealt.len() < MIN_PLAYERS {
            return None;
        }

        for seat in &dealt {
            if let Some(occ) = self.occupant_mut(*seat) {
                occ.reset_for_hand();
            }
        }

        // Button moves one occupied seat clockwise, skipping empties.
        self.button = self
            .next_seat(self.button, |i| dealt.contains(&i))
            .unwrap_or(self.button);

        let id = HandId::new_v4();
        // Hand is not live yet, so this is the sum of every occupant stack,
        // including seats sitting out: the figure settlement must restore.
        let opening_total = self.total_chips();

        let mut hand = HandState {
            id,
            phase: HandPhase::Dealing,
            board: Vec::with_capacity(5),
            pot: Pot::new(),
            current_bet: 0,
            min_raise: self.blinds.big,
            to_act: None,
            needs_action: BTreeSet::new(),
            opening_total,
            went_to_showdown: false,
        };
        self.events.push_back(GameEvent::HandStarted {
            hand: id,
            button: self.button,
        });

        // Heads-up the button posts the small blind; otherwise blinds sit
        // left of the button in order.
        let (sb_seat, bb_seat) = if dealt.len() == 2 {
            let other = self
                .next_seat(self.button, |i| dealt.contains(&i))
                .expect("two dealt seats");
            (self.button, other)
        } else {
            let sb = self
                .next_seat(self.button, |i| dealt.contains(&i))
                .expect("dealt seats");
            let bb = self
                .next_seat(sb, |i| dealt.contains(&i))
                .expect("dealt seats");
            (sb, bb)
        };

        self.post_blind(&mut hand, sb_seat, self.blinds.small, BlindKind::Small);
        self.post_blind(&mut hand, bb_seat, self.blinds.big, BlindKind::Big);
        hand.current_bet = self.blinds.big;

        self.deck.shuffle();
        for seat in &dealt {
            let cards = vec![self.deck.deal(), self.deck.deal()];
            if let Some(occ) = self.occupant_mut(*seat) {
                occ.hole = cards;
            }
        }

        hand.phase = HandPhase::Preflop;
        hand.needs_action = dealt
            .iter()
            .copied()
            .filter(|&i| self.occupant(i).is_some_and(Occupant::can_act))
            .collect();
        let first = self.next_seat(bb_seat, |i| hand.needs_action.contains(&i));
        hand.to_act = first;

        self.hand = Some(hand);
        self.bump();
        if first.is_none() {
            // Blinds put everyone all-in; nothing to bet, run the board out.
            self.end_betting_round();
        } else {
            self.emit_turn_signal();
        }
        log::debug!("table {}: hand {id} started, button {}", self.table, self.button);
        Some(id)
    }

    /// Apply a player action. `hand` and `version` must reference the
    /// current state exactly; anything older is rejected as stale with no
    /// effect.
    pub fn act(
        &mut self,
        seat: SeatIndex,
        hand: HandId,
        version: StateVersion,
        action: Action,
    ) -> Result<(), GameError> {
        {
            let state = self.hand.as_ref().ok_or(GameError::StaleReference)?;
            if state.id != hand || version != self.version || !state.phase.is_betting() {
                return Err(GameError::StaleReference);
            }
            if state.to_act != Some(seat) {
                return Err(GameError::IllegalAction(IllegalReason::OutOfTurn));
            }
        }
        let applied = self.apply_action(seat, action)?;
        self.events
            .push_back(GameEvent::ActionTaken { seat, applied });
        self.after_action(seat);
        Ok(())
    }

    /// Synthesize the timeout action for the seat to act: check when
    /// checking is legal, otherwise fold. Called by the actor when a turn
    /// deadline fires against an unchanged state version.
    pub fn apply_timeout(&mut self, seat: SeatIndex) -> Result<(), GameError> {
        let state = self.hand.as_ref().ok_or(GameError::StaleReference)?;
        if state.to_act != Some(seat) || !state.phase.is_betting() {
            return Err(GameError::StaleReference);
        }
        let owed = self.owed(seat);
        let action = if owed == 0 { Action::Check } else { Action::Fold };
        let applied = self.apply_action(seat, action)?;
        self.events.push_back(GameEvent::TimedOut { seat, applied });
        self.after_action(seat);
        Ok(())
    }

    /// Legal actions for the seat currently to act.
    #[must_use]
    pub fn choices(&self) -> Option<(SeatIndex, ActionChoices)> {
        let state = self.hand.as_ref()?;
        if !state.phase.is_betting() {
            return None;
        }
        let seat = state.to_act?;
        let occ = self.occupant(seat)?;
        let owed = state.current_bet - occ.round_bet;
        let choices = ActionChoices {
            can_check: owed == 0,
            call: (owed > 0).then_some(owed.min(occ.stack)),
            min_bet: (state.current_bet == 0).then_some(self.blinds.big),
            min_raise_to: (state.current_bet > 0
                && occ.stack > owed)
                .then_some(state.current_bet + state.min_raise),
            all_in: occ.stack,
        };
        Some((seat, choices))
    }

    /// Finish a settled hand: reset per-hand seat state, stand up seats
    /// marked sitting out, and report who was dealt in.
    pub fn conclude_hand(&mut self) -> Option<HandSummary> {
        let state = self.hand.as_ref()?;
        if state.phase != HandPhase::Settled {
            return None;
        }
        let id = state.id;
        let mut summary = HandSummary::default();

        for index in 0..self.seats.len() {
            let Some(occ) = self.seats[index].occupant.as_mut() else {
                continue;
            };
            if !occ.hole.is_empty() {
                summary.dealt_in.push(occ.player);
            }
            occ.reset_for_hand();
            if occ.status == SeatStatus::SittingOut {
                let occ = self.seats[index].occupant.take().expect("occupant");
                summary.stood_up.push((occ.player, occ.stack));
            }
        }

        self.events.push_back(GameEvent::HandEnded { hand: id });
        self.hand = None;
        self.bump();
        Some(summary)
    }

    /// Abort a corrupted hand: refund every pot investment to its seat and
    /// return the table to `WaitingForPlayers`. Called on invariant
    /// violations so one table's failure never spreads.
    pub fn abort_hand(&mut self) {
        let Some(mut state) = self.hand.take() else {
            return;
        };
        log::error!(
            "table {}: aborting hand {} at {}, refunding pot of {}",
            self.table,
            state.id,
            state.phase,
            state.pot.total()
        );
        let seats = &mut self.seats;
        state.pot.refund(|seat, amount| {
            if let Some(occ) = seats.get_mut(seat).and_then(|s| s.occupant.as_mut()) {
                occ.stack += amount;
            }
        });
        for seat in seats.iter_mut() {
            if let Some(occ) = seat.occupant.as_mut() {
                occ.reset_for_hand();
            }
        }
        self.events.push_back(GameEvent::HandEnded { hand: state.id });
        self.bump();
    }

    /// Snapshot for one viewer. Hole cards appear only on the viewer's own
    /// seat, or on contested seats once the hand reached showdown.
    #[must_use]
    pub fn view_for(&self, viewer: Option<PlayerId>) -> TableView {
        let state = self.hand.as_ref();
        let showdown_public = state.is_some_and(|h| {
            h.went_to_showdown && matches!(h.phase, HandPhase::Showdown | HandPhase::Settled)
        });
        let seats = self
            .seats
            .iter()
            .enumerate()
            .filter_map(|(index, seat)| {
                let occ = seat.occupant.as_ref()?;
                let own = viewer == Some(occ.player);
                let reveal = own || (showdown_public && occ.in_hand());
                Some(SeatView {
                    index,
                    name: occ.name.clone(),
                    stack: occ.stack,
                    status: occ.status,
                    round_bet: occ.round_bet,
                    folded: occ.folded,
                    all_in: occ.all_in,
                    hole: (reveal && !occ.hole.is_empty()).then(|| occ.hole.clone()),
                })
            })
            .collect();

        let choices = self.choices().and_then(|(seat, choices)| {
            let own = viewer.is_some()
                && self.occupant(seat).map(|o| o.player) == viewer;
            own.then_some(choices)
        });

        TableView {
            table: self.table,
            blinds: self.blinds,
            phase: self.phase(),
            hand: state.map(|h| h.id),
            version: self.version,
            button: self.button,
            board: state.map(|h| h.board.clone()).unwrap_or_default(),
            pot_total: state.map_or(0, |h| h.pot.total()),
            to_act: state.and_then(|h| h.to_act),
            choices,
            seats,
        }
    }

    /// Sum of all seat stacks plus the live pot. Conserved across every
    /// action; exposed for tests and the actor's settlement audit.
    #[must_use]
    pub fn total_chips(&self) -> Chips {
        let stacks: Chips = self
            .seats
            .iter()
            .filter_map(|s| s.occupant.as_ref())
            .map(|o| o.stack)
            .sum();
        stacks + self.hand.as_ref().map_or(0, |h| h.pot.total())
    }

    // ---- internals ----

    fn bump(&mut self) {
        self.version += 1;
    }

    fn seat_indices(&self) -> std::ops::Range<SeatIndex> {
        0..self.seats.len()
    }

    fn occupant(&self, seat: SeatIndex) -> Option<&Occupant> {
        self.seats.get(seat).and_then(|s| s.occupant.as_ref())
    }

    fn occupant_mut(&mut self, seat: SeatIndex) -> Option<&mut Occupant> {
        self.seats.get_mut(seat).and_then(|s| s.occupant.as_mut())
    }

    /// First seat clockwise after `from` satisfying `keep`.
    fn next_seat(&self, from: SeatIndex, keep: impl Fn(SeatIndex) -> bool) -> Option<SeatIndex> {
        let n = self.seats.len();
        (1..=n).map(|step| (from + step) % n).find(|&i| keep(i))
    }

    fn owed(&self, seat: SeatIndex) -> Chips {
        let Some(state) = self.hand.as_ref() else {
            return 0;
        };
        let Some(occ) = self.occupant(seat) else {
            return 0;
        };
        state.current_bet - occ.round_bet
    }

    fn post_blind(&mut self, hand: &mut HandState, seat: SeatIndex, amount: Chips, kind: BlindKind) {
        let Some(occ) = self.seats.get_mut(seat).and_then(|s| s.occupant.as_mut()) else {
            return;
        };
        let posted = amount.min(occ.stack);
        hand.pot
            .post(seat, &mut occ.stack, posted)
            .expect("blind capped to stack");
        occ.round_bet += posted;
        if occ.stack == 0 {
            occ.all_in = true;
        }
        self.events.push_back(GameEvent::BlindPosted {
            seat,
            kind,
            amount: posted,
        });
    }

    /// Fold a seat outside its turn (voluntary leave mid-hand). Keeps the
    /// round's bookkeeping consistent without consuming the turn.
    fn fold_out_of_turn(&mut self, seat: SeatIndex) {
        // The last contender cannot forfeit the pot by leaving; the hand is
        // theirs and settles immediately.
        let contenders = self.contenders();
        if contenders.len() <= 1 && contenders.contains(&seat) {
            self.settle(contenders);
            return;
        }
        let was_to_act = self
            .hand
            .as_ref()
            .is_some_and(|h| h.to_act == Some(seat));
        if let Some(occ) = self.occupant_mut(seat) {
            occ.folded = true;
        }
        if let Some(state) = self.hand.as_mut() {
            state.needs_action.remove(&seat);
        }
        self.events.push_back(GameEvent::ActionTaken {
            seat,
            applied: AppliedAction {
                action: Action::Fold,
                posted: 0,
                all_in: false,
            },
        });
        if was_to_act {
            self.after_action(seat);
        } else if self
            .hand
            .as_ref()
            .is_some_and(|h| h.needs_action.is_empty() && h.phase.is_betting())
        {
            self.end_betting_round();
        }
    }

    /// Validate and apply one action for the seat to act. Any `Err` leaves
    /// all state untouched.
    fn apply_action(&mut self, seat: SeatIndex, action: Action) -> Result<AppliedAction, GameError> {
        let (current_bet, min_raise) = {
            let state = self.hand.as_ref().expect("checked by caller");
            (state.current_bet, state.min_raise)
        };
        let occ = self.occupant(seat).ok_or(GameError::StaleReference)?;
        if !occ.can_act() {
            return Err(GameError::IllegalAction(IllegalReason::CannotAct));
        }
        let stack = occ.stack;
        let round_bet = occ.round_bet;
        let owed = current_bet - round_bet;
        let big_blind = self.blinds.big;

        // Resolve the action into chips to post and the raise it implies.
        // `to_total` is the seat's total wager this round after the action.
        let (posted, to_total) = match action {
            Action::Fold => (0, round_bet),
            Action::Check => {
                if owed != 0 {
                    return Err(GameError::IllegalAction(IllegalReason::CheckFacingBet));
                }
                (0, round_bet)
            }
            Action::Call => {
                if owed == 0 {
                    return Err(GameError::IllegalAction(IllegalReason::NothingToCall));
                }
                let pay = owed.min(stack);
                (pay, round_bet + pay)
            }
            Action::Bet(total) => {
                if current_bet != 0 {
                    return Err(GameError::IllegalAction(IllegalReason::BetFacingBet));
                }
                let total = total.min(stack);
                if total < big_blind && total < stack {
                    return Err(GameError::IllegalAction(IllegalReason::BetTooSmall {
                        min: big_blind,
                    }));
                }
                (total, total)
            }
            Action::Raise(total) => {
                if current_bet == 0 {
                    return Err(GameError::IllegalAction(IllegalReason::RaiseWithoutBet));
                }
                let total = total.min(round_bet + stack);
                let min_to = current_bet + min_raise;
                let pay = total - round_bet;
                if total < min_to && pay < stack {
                    return Err(GameError::IllegalAction(IllegalReason::RaiseTooSmall {
                        min: min_to,
                    }));
                }
                if total <= current_bet {
                    return Err(GameError::IllegalAction(IllegalReason::RaiseTooSmall {
                        min: min_to,
                    }));
                }
                (pay, total)
            }
            Action::AllIn => (stack, round_bet + stack),
        };

        let state = self.hand.as_mut().expect("checked by caller");
        if matches!(action, Action::Fold) {
            let occ = self.seats[seat].occupant.as_mut().expect("occupant");
            occ.folded = true;
        } else if posted > 0 {
            let occ = self.seats[seat].occupant.as_mut().expect("occupant");
            state.pot.post(seat, &mut occ.stack, posted)?;
            occ.round_bet = to_total;
            if occ.stack == 0 {
                occ.all_in = true;
            }
        }

        // A wager above the standing bet reopens action. A full raise also
        // grows the minimum increment; a short all-in raise does not.
        let all_in = self.occupant(seat).is_some_and(|o| o.all_in);
        let state = self.hand.as_mut().expect("checked by caller");
        state.needs_action.remove(&seat);
        if to_total > state.current_bet {
            let full_raise = to_total >= state.current_bet + state.min_raise;
            if full_raise {
                state.min_raise = if state.current_bet == 0 {
                    to_total
                } else {
                    to_total - state.current_bet
                };
            }
            state.current_bet = to_total;
            let reopen: Vec<SeatIndex> = self
                .seat_indices()
                .filter(|&i| i != seat)
                .filter(|&i| self.seats[i].occupant.as_ref().is_some_and(Occupant::can_act))
                .collect();
            let state = self.hand.as_mut().expect("checked by caller");
            for i in reopen {
                state.needs_action.insert(i);
            }
        }

        self.bump();
        Ok(AppliedAction {
            action,
            posted,
            all_in,
        })
    }

    /// After an accepted action: pass the turn, end the round, or settle.
    fn after_action(&mut self, seat: SeatIndex) {
        // Fold-out: one contender left takes everything immediately.
        let contenders = self.contenders();
        if contenders.len() <= 1 {
            self.settle(contenders);
            return;
        }

        let needs = self.hand.as_ref().expect("live hand").needs_action.clone();
        if needs.is_empty() {
            self.end_betting_round();
            return;
        }

        let next = self.next_seat(seat, |i| needs.contains(&i));
        self.hand.as_mut().expect("live hand").to_act = next;
        self.emit_turn_signal();
    }

    fn contenders(&self) -> BTreeSet<SeatIndex> {
        self.seat_indices()
            .filter(|&i| self.occupant(i).is_some_and(Occupant::in_hand))
            .collect()
    }

    fn end_betting_round(&mut self) {
        for seat in self.seat_indices() {
            if let Some(occ) = self.occupant_mut(seat) {
                occ.round_bet = 0;
            }
        }
        let state = self.hand.as_mut().expect("live hand");
        state.current_bet = 0;
        state.min_raise = self.blinds.big;
        state.to_act = None;

        let contenders = self.contenders();
        if contenders.len() <= 1 {
            self.settle(contenders);
            return;
        }
        let able_to_act = contenders
            .iter()
            .filter(|&&i| self.occupant(i).is_some_and(Occupant::can_act))
            .count();

        // With one or zero seats still able to act there is no more betting:
        // run the board out and show down.
        if able_to_act <= 1 {
            while self
                .hand
                .as_ref()
                .is_some_and(|h| h.phase != HandPhase::River)
            {
                self.deal_next_street();
            }
            self.settle(contenders);
            return;
        }

        let state = self.hand.as_ref().expect("live hand");
        if state.phase == HandPhase::River {
            self.settle(contenders);
            return;
        }

        self.deal_next_street();
        let needs: BTreeSet<SeatIndex> = contenders
            .iter()
            .copied()
            .filter(|&i| self.occupant(i).is_some_and(Occupant::can_act))
            .collect();
        let first = self.next_seat(self.button, |i| needs.contains(&i));
        let state = self.hand.as_mut().expect("live hand");
        state.needs_action = needs;
        state.to_act = first;
        self.bump();
        self.emit_turn_signal();
    }

    fn deal_next_street(&mut self) {
        let state = self.hand.as_mut().expect("live hand");
        let (next_phase, count) = match state.phase {
            HandPhase::Preflop => (HandPhase::Flop, 3),
            HandPhase::Flop => (HandPhase::Turn, 1),
            HandPhase::Turn => (HandPhase::River, 1),
            other => {
                debug_assert!(false, "deal_next_street in {other}");
                return;
            }
        };
        for _ in 0..count {
            let card = self.deck.deal();
            self.hand.as_mut().expect("live hand").board.push(card);
        }
        let state = self.hand.as_mut().expect("live hand");
        state.phase = next_phase;
        self.events.push_back(GameEvent::RoundAdvanced {
            phase: next_phase,
            board: self.hand.as_ref().expect("live hand").board.clone(),
        });
    }

    /// Award every pot and mark the hand settled. On a chip-conservation
    /// failure the hand is aborted and refunded instead.
    fn settle(&mut self, contenders: BTreeSet<SeatIndex>) {
        if contenders.is_empty() {
            // No one left to award to; refund rather than strand the pot.
            self.abort_hand();
            return;
        }
        let expected = self.hand.as_ref().expect("live hand").opening_total;
        let actual = self.total_chips();
        if expected != actual {
            log::error!(
                "table {}: conservation check failed before settlement ({expected} != {actual})",
                self.table
            );
            self.abort_hand();
            return;
        }

        let contested = contenders.len() > 1;
        let state = self.hand.as_mut().expect("live hand");
        state.phase = HandPhase::Showdown;
        state.went_to_showdown = contested;

        let pots = state.pot.build_pots(&contenders);
        let board = state.board.clone();
        state.pot = Pot::new();

        if contested {
            let reveals: Vec<(SeatIndex, Vec<Card>, HandRank)> = contenders
                .iter()
                .map(|&seat| {
                    let occ = self.occupant(seat).expect("contender seated");
                    let rank = rank_hand(&occ.hole, &board);
                    (seat, occ.hole.clone(), rank)
                })
                .collect();
            self.events.push_back(GameEvent::Showdown {
                reveals: reveals.clone(),
            });
            self.award_pots(&pots, |seat| {
                reveals
                    .iter()
                    .find(|(s, _, _)| *s == seat)
                    .map(|(_, _, rank)| *rank)
                    .expect("eligible seat revealed")
            });
        } else if let Some(&winner) = contenders.iter().next() {
            // Everyone else folded: no evaluation, no reveal.
            for (index, pot) in pots.iter().enumerate() {
                self.credit_award(index, winner, pot.amount);
            }
        }

        let state = self.hand.as_mut().expect("live hand");
        state.phase = HandPhase::Settled;
        self.bump();

        let expected = self.hand.as_ref().expect("live hand").opening_total;
        let actual = self.total_chips();
        if expected != actual {
            // Award arithmetic lost or minted chips. The hand is already
            // settled, so all that remains is to flag it loudly; conclude
            // clears the hand and the table keeps running.
            log::error!(
                "table {}: conservation check failed after settlement ({expected} != {actual})",
                self.table
            );
        }
    }

    fn award_pots(&mut self, pots: &[SidePot], rank_of: impl Fn(SeatIndex) -> HandRank) {
        for (index, pot) in pots.iter().enumerate() {
            let best = pot
                .eligible
                .iter()
                .map(|&s| rank_of(s))
                .max()
                .expect("pot has eligible seats");
            let mut winners: Vec<SeatIndex> = pot
                .eligible
                .iter()
                .copied()
                .filter(|&s| rank_of(s) == best)
                .collect();
            self.order_from_button(&mut winners);
            for (seat, amount) in Pot::split(pot.amount, &winners) {
                self.credit_award(index, seat, amount);
            }
        }
    }

    fn credit_award(&mut self, pot_index: usize, seat: SeatIndex, amount: Chips) {
        if let Some(occ) = self.occupant_mut(seat) {
            occ.stack += amount;
        }
        self.events.push_back(GameEvent::PotAwarded {
            pot_index,
            seat,
            amount,
        });
    }

    /// Sort seats clockwise starting at the seat left of the button, the
    /// order in which indivisible remainders are handed out.
    fn order_from_button(&self, seats: &mut [SeatIndex]) {
        let n = self.seats.len();
        let button = self.button;
        seats.sort_by_key(|&s| (s + n - (button + 1) % n) % n);
    }

    fn emit_turn_signal(&mut self) {
        if let Some((seat, choices)) = self.choices() {
            self.events.push_back(GameEvent::TurnChanged { seat, choices });
        }
    }
}

/// Evaluate a seat's best hand from its two hole cards and the full board.
fn rank_hand(hole: &[Card], board: &[Card]) -> HandRank {
    debug_assert_eq!(hole.len(), 2);
    debug_assert_eq!(board.len(), 5);
    let cards = [
        hole[0], hole[1], board[0], board[1], board[2], board[3], board[4],
    ];
    evaluator::evaluate(&cards)
}
