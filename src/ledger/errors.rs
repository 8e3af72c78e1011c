//! Ledger error types.

use thiserror::Error;

use crate::game::entities::{Chips, PlayerId};

#[derive(Debug, Error, Eq, PartialEq)]
pub enum LedgerError {
    /// Buy-in or withdrawal exceeds the available balance.
    #[error("insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: Chips, required: Chips },

    /// A wager exceeds the seat's stack. Callers must cap to all-in before
    /// posting, so this indicates an engine bug rather than user error.
    #[error("illegal bet of {amount} against a stack of {stack}")]
    IllegalBet { stack: Chips, amount: Chips },

    #[error("no account for player {0}")]
    AccountNotFound(PlayerId),

    #[error("invalid amount: {0}")]
    InvalidAmount(Chips),

    #[error("balance overflow")]
    BalanceOverflow,
}

impl LedgerError {
    /// Client-safe message that does not leak internal identifiers.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::AccountNotFound(_) => "account not found".to_string(),
            other => other.to_string(),
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
