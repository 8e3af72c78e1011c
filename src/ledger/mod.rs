//! Chip accounting. The ledger is the sole owner of every currency-unit
//! field in the crate: player balances live in [`Accounts`], a hand's wagers
//! live in a [`Pot`], and seat stacks move only through the operations here.

mod accounts;
mod errors;
mod models;
mod pot;

pub use accounts::Accounts;
pub use errors::{LedgerError, LedgerResult};
pub use models::{EntryDirection, EntryType, LedgerEntry, TableId};
pub use pot::{Pot, SidePot};
