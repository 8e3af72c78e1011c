//! Ledger journal models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::game::entities::{Chips, PlayerId};

/// Identifier for a table. Cash tables take the low ids at startup; private
/// tables continue the sequence.
pub type TableId = u64;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum EntryDirection {
    Debit,
    Credit,
}

impl fmt::Display for EntryDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum EntryType {
    BuyIn,
    CashOut,
    Deposit,
    Withdrawal,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::BuyIn => "buy_in",
            Self::CashOut => "cash_out",
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
        };
        write!(f, "{repr}")
    }
}

/// One balance mutation. Signed `amount` plus `balance_after` lets an
/// auditor replay the journal and detect any gap.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LedgerEntry {
    pub player: PlayerId,
    pub table: Option<TableId>,
    pub amount: Chips,
    pub balance_after: Chips,
    pub direction: EntryDirection,
    pub entry_type: EntryType,
    pub at: DateTime<Utc>,
}
