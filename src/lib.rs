//! # Cardroom
//!
//! A Texas Hold'em cash-game server core. The crate hosts many concurrent
//! tables, each driven by its own actor task: a betting-round state machine,
//! pot and side-pot accounting in integer cents, a 7-card hand evaluator, and
//! a session layer that lets a player's seat survive a dropped connection.
//!
//! ## Architecture
//!
//! - [`game`]: cards, the hand evaluator, and the per-hand betting engine
//! - [`ledger`]: player balances and pot bookkeeping (sole owner of chips)
//! - [`table`]: per-table actors, configuration, and the table registry
//! - [`session`]: connection binding, resumable tokens, reconnection grace
//! - [`net`]: protocol messages and length-prefixed framing
//! - [`gateway`]: traits for the external payment gateway and account store
//!
//! Each table is an independent unit of mutable state; all transitions for a
//! table are serialized through its actor inbox, so concurrent tables run
//! fully in parallel. The transport acceptor, persistence, and the payment
//! processor itself live outside this crate and plug in through [`net`] and
//! [`gateway`].

pub mod game;
pub use game::{
    engine::{GameError, HandPhase, TableEngine},
    entities::{self, Action, Blinds, Card, Chips, PlayerId, SeatIndex, Suit},
    evaluator::{Category, HandRank, evaluate},
};

pub mod ledger;
pub use ledger::{Accounts, LedgerError, Pot};

pub mod table;
pub use table::{
    TableConfig, TableId, TableKind,
    actor::{TableActor, TableHandle},
    registry::TableRegistry,
};

pub mod session;
pub use session::{SessionManager, SessionToken};

pub mod gateway;
pub mod net;
