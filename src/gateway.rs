//! External collaborators: the payment processor and the account store.
//!
//! The core never computes real-money totals beyond crediting or debiting
//! what the gateway confirms. A deposit or withdrawal request only produces
//! a pending transaction; the balance moves when the processor's
//! asynchronous confirmation comes back through [`Cashier::confirm`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::game::entities::{Chips, PlayerId};
use crate::ledger::{Accounts, LedgerResult};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
}

/// A request the gateway has accepted but not yet confirmed.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PendingTransaction {
    pub id: Uuid,
    pub player: PlayerId,
    pub amount: Chips,
    pub kind: TransactionKind,
    pub requested_at: DateTime<Utc>,
}

impl PendingTransaction {
    #[must_use]
    pub fn new(player: PlayerId, amount: Chips, kind: TransactionKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            player,
            amount,
            kind,
            requested_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request could not be dispatched. The balance is untouched; the
    /// collaborator retries with backoff, not this crate.
    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("gateway rejected the request: {0}")]
    Rejected(String),
}

/// Payment processor boundary. Implemented by the host against the real
/// processor's API; both calls return `pending` and settle later through a
/// confirmation callback.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn request_deposit(
        &self,
        player: PlayerId,
        amount: Chips,
    ) -> Result<PendingTransaction, GatewayError>;

    async fn request_withdrawal(
        &self,
        player: PlayerId,
        amount: Chips,
    ) -> Result<PendingTransaction, GatewayError>;
}

/// Read-only account metadata plus the post-hand counter, both owned by the
/// external account system.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Experience level used to gate cash tables.
    async fn level(&self, player: PlayerId) -> u32;

    /// Called once per player after each completed hand.
    async fn record_hand_played(&self, player: PlayerId);
}

/// Glue between the gateway and the ledger: requests pass through untouched,
/// confirmations move the balance.
pub struct Cashier {
    gateway: Arc<dyn PaymentGateway>,
    accounts: Arc<Accounts>,
}

impl Cashier {
    #[must_use]
    pub fn new(gateway: Arc<dyn PaymentGateway>, accounts: Arc<Accounts>) -> Self {
        Self { gateway, accounts }
    }

    pub async fn request_deposit(
        &self,
        player: PlayerId,
        amount: Chips,
    ) -> Result<PendingTransaction, GatewayError> {
        let pending = self.gateway.request_deposit(player, amount).await?;
        log::info!(
            "deposit of {amount} for player {player} pending as {}",
            pending.id
        );
        Ok(pending)
    }

    pub async fn request_withdrawal(
        &self,
        player: PlayerId,
        amount: Chips,
    ) -> Result<PendingTransaction, GatewayError> {
        let pending = self.gateway.request_withdrawal(player, amount).await?;
        log::info!(
            "withdrawal of {amount} for player {player} pending as {}",
            pending.id
        );
        Ok(pending)
    }

    /// Apply a confirmed transaction to the ledger. Withdrawal debits happen
    /// here and nowhere earlier, so a failed withdrawal never touches the
    /// balance.
    pub fn confirm(&self, transaction: &PendingTransaction) -> LedgerResult<Chips> {
        match transaction.kind {
            TransactionKind::Deposit => self
                .accounts
                .confirm_deposit(transaction.player, transaction.amount),
            TransactionKind::Withdrawal => self
                .accounts
                .confirm_withdrawal(transaction.player, transaction.amount),
        }
    }
}
