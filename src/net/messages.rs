//! Protocol messages between clients and the server core.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::game::engine::{AppliedAction, BlindKind, HandPhase, TableView};
use crate::game::entities::{
    Action, ActionChoices, Card, Chips, HandId, SeatIndex, StateVersion,
};
use crate::game::evaluator::HandRank;
use crate::ledger::TableId;
use crate::session::SessionToken;

/// Transport-assigned identity of one live connection.
pub type ConnectionId = u64;

/// Commands a client sends over its connection. The transport decodes these
/// with [`crate::net::codec`] and routes them to the registry, session
/// manager, or table actor.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ClientCommand {
    /// Sit at a table with a buy-in (cents). Private tables take the invite
    /// code in `table_code` plus an optional passphrase.
    JoinTable {
        table_code: String,
        buy_in: Chips,
        passphrase: Option<String>,
    },
    /// Create a private table and sit at it.
    CreatePrivateTable {
        name: String,
        small_blind: Chips,
        big_blind: Chips,
        seats: usize,
        buy_in: Chips,
        passphrase: Option<String>,
    },
    LeaveTable,
    TakeAction {
        hand: HandId,
        version: StateVersion,
        action: Action,
    },
    /// Resume a dropped session within the grace window.
    Reconnect { token: SessionToken },
    /// Ask the payment gateway for a deposit; credited on confirmation.
    RequestDeposit { amount: Chips },
    /// Ask the payment gateway for a withdrawal; debited on confirmation.
    RequestWithdrawal { amount: Chips },
}

impl fmt::Display for ClientCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::JoinTable { table_code, buy_in, .. } => {
                &format!("join {table_code} for {buy_in}")
            }
            Self::CreatePrivateTable { name, .. } => &format!("create private table {name}"),
            Self::LeaveTable => "leave table",
            Self::TakeAction { action, .. } => &action.to_string(),
            Self::Reconnect { .. } => "reconnect",
            Self::RequestDeposit { amount } => &format!("deposit {amount}"),
            Self::RequestWithdrawal { amount } => &format!("withdraw {amount}"),
        };
        write!(f, "{repr}")
    }
}

/// Events the core pushes out to connections. Hole cards travel only in
/// `HoleCards` and `Resync`, which are addressed to their owner; everything
/// else is broadcast to the table.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum ServerEvent {
    HandStarted {
        table: TableId,
        hand: HandId,
        button: SeatIndex,
    },
    /// Private: the recipient's own hole cards.
    HoleCards {
        hand: HandId,
        cards: Vec<Card>,
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
    /// The engine acted for a timed-out or disconnected seat.
    TimedOut {
        seat: SeatIndex,
        applied: AppliedAction,
    },
    RoundAdvanced {
        phase: HandPhase,
        board: Vec<Card>,
    },
    /// It is `seat`'s turn. Actions must echo `version`; the deadline is
    /// how long the engine will wait before acting for the seat.
    TurnSignal {
        seat: SeatIndex,
        choices: ActionChoices,
        version: StateVersion,
        deadline_ms: u64,
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
    PlayerJoined {
        seat: SeatIndex,
        name: String,
    },
    PlayerLeft {
        seat: SeatIndex,
    },
    /// Private: full state resynchronization after a reconnect.
    Resync(TableView),
    TableClosed,
    /// A rejected command, echoed back to the offending connection only.
    Error(String),
}

impl fmt::Display for ServerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::HandStarted { hand, .. } => &format!("hand {hand} started"),
            Self::HoleCards { .. } => "hole cards",
            Self::BlindPosted { seat, amount, .. } => &format!("seat {seat} posts {amount}"),
            Self::ActionTaken { seat, applied } => &format!("seat {seat} {}", applied.action),
            Self::TimedOut { seat, applied } => {
                &format!("seat {seat} timed out, {}", applied.action)
            }
            Self::RoundAdvanced { phase, .. } => &format!("dealing the {phase}"),
            Self::TurnSignal { seat, .. } => &format!("seat {seat} to act"),
            Self::Showdown { .. } => "showdown",
            Self::PotAwarded { seat, amount, .. } => &format!("seat {seat} wins {amount}"),
            Self::HandEnded { hand } => &format!("hand {hand} ended"),
            Self::PlayerJoined { seat, name } => &format!("{name} sat at seat {seat}"),
            Self::PlayerLeft { seat } => &format!("seat {seat} stood up"),
            Self::Resync(_) => "resync",
            Self::TableClosed => "table closed",
            Self::Error(message) => message,
        };
        write!(f, "{repr}")
    }
}

/// Outbound half of the transport: deliver one event to one connection.
/// Implementations must tolerate a dead connection (the session layer
/// reports it as a disconnect separately).
#[async_trait]
pub trait ConnectionSink: Send + Sync {
    async fn send(&self, connection: ConnectionId, event: ServerEvent);
}
