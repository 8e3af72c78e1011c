//! Table actor message types.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use super::config::TableKind;
use crate::game::engine::{GameError, TableView};
use crate::game::entities::{
    Action, Chips, DisplayName, HandId, PlayerId, SeatIndex, StateVersion,
};
use crate::ledger::{LedgerError, TableId};
use crate::net::ServerEvent;

/// Errors surfaced to the originating connection. Everything here is
/// rejected synchronously with no state mutation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum TableError {
    #[error(transparent)]
    Game(#[from] GameError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("table not found")]
    NotFound,

    #[error("table is closed")]
    Closed,

    #[error("a hand is in progress")]
    HandInProgress,

    #[error("buy-in must be between {min} and {max}")]
    BuyInOutOfRange { min: Chips, max: Chips },

    #[error("account level {required} required")]
    LevelTooLow { required: u32 },

    #[error("invalid passphrase")]
    AccessDenied,

    #[error("invalid table configuration: {0}")]
    InvalidConfig(String),

    #[error("player is not at this table")]
    NotAtTable,
}

impl TableError {
    /// Client-safe message, with ledger internals sanitized.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Ledger(err) => err.client_message(),
            other => other.to_string(),
        }
    }
}

/// Messages a [`super::actor::TableActor`] consumes from its inbox. Each
/// request carries a oneshot for its reply; everything else is fire and
/// forget.
#[derive(Debug)]
pub enum TableMessage {
    /// Seat a player with a stack the registry already reserved against the
    /// ledger. On failure the actor refunds the reservation itself.
    SitDown {
        player: PlayerId,
        name: DisplayName,
        stack: Chips,
        respond: oneshot::Sender<Result<SeatIndex, TableError>>,
    },

    /// Stand up. Between hands the seat cashes out immediately; mid-hand it
    /// is folded and cashed out at the hand boundary.
    StandUp {
        player: PlayerId,
        respond: oneshot::Sender<Result<(), TableError>>,
    },

    TakeAction {
        player: PlayerId,
        hand: HandId,
        version: StateVersion,
        action: Action,
        respond: oneshot::Sender<Result<(), TableError>>,
    },

    GetView {
        player: Option<PlayerId>,
        respond: oneshot::Sender<TableView>,
    },

    GetStatus {
        respond: oneshot::Sender<TableStatus>,
    },

    /// The player's connection dropped; start the grace window.
    Disconnected { player: PlayerId },

    /// The player reconnected within grace; reply with a full resync.
    Reconnected {
        player: PlayerId,
        respond: oneshot::Sender<Result<TableView, TableError>>,
    },

    /// Subscribe a player's event channel.
    Subscribe {
        player: PlayerId,
        sender: mpsc::Sender<ServerEvent>,
    },

    Unsubscribe { player: PlayerId },

    /// Shut the table down. Refuses while a hand is live unless `force`.
    Close {
        force: bool,
        respond: oneshot::Sender<Result<(), TableError>>,
    },
}

/// Lobby-facing summary of one table.
#[derive(Clone, Debug)]
pub struct TableStatus {
    pub id: TableId,
    pub name: String,
    pub kind: TableKind,
    pub player_count: usize,
    pub seats: usize,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub hand_in_progress: bool,
}
