//! Player balance accounts with an in-memory double-entry journal.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{
    errors::{LedgerError, LedgerResult},
    models::{EntryDirection, EntryType, LedgerEntry, TableId},
};
use crate::game::entities::{Chips, PlayerId};

#[derive(Default)]
struct AccountsInner {
    balances: HashMap<PlayerId, Chips>,
    journal: Vec<LedgerEntry>,
}

/// Real-money balances, in integer cents.
///
/// Every operation is atomic: the lock is held for the full check-and-mutate,
/// so a balance can never go negative and no entry is journaled without its
/// balance change. Cross-table movement is deliberately two independent
/// operations (cash out, then buy in) rather than one transaction, so an
/// observer may see the money at neither table in between.
#[derive(Default)]
pub struct Accounts {
    inner: Mutex<AccountsInner>,
}

impl Accounts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an account with a zero balance. Idempotent.
    pub fn register(&self, player: PlayerId) {
        let mut inner = self.inner.lock().expect("accounts lock");
        inner.balances.entry(player).or_insert(0);
    }

    pub fn balance(&self, player: PlayerId) -> LedgerResult<Chips> {
        let inner = self.inner.lock().expect("accounts lock");
        inner
            .balances
            .get(&player)
            .copied()
            .ok_or(LedgerError::AccountNotFound(player))
    }

    /// Debit a buy-in from the player balance. The returned amount becomes
    /// the new seat stack; the caller seats it in the same serialized table
    /// operation.
    pub fn reserve_buy_in(
        &self,
        player: PlayerId,
        table: TableId,
        amount: Chips,
    ) -> LedgerResult<Chips> {
        self.debit(player, Some(table), amount, EntryType::BuyIn)?;
        log::info!("player {player} bought in to table {table} for {amount}");
        Ok(amount)
    }

    /// Credit a stood-up seat's remaining stack back to the player balance.
    pub fn credit_cash_out(
        &self,
        player: PlayerId,
        table: TableId,
        amount: Chips,
    ) -> LedgerResult<Chips> {
        let balance = self.credit(player, Some(table), amount, EntryType::CashOut)?;
        log::info!("player {player} cashed out {amount} from table {table}");
        Ok(balance)
    }

    /// Gateway confirmation callback: the processor captured a deposit.
    pub fn confirm_deposit(&self, player: PlayerId, amount: Chips) -> LedgerResult<Chips> {
        self.credit(player, None, amount, EntryType::Deposit)
    }

    /// Gateway confirmation callback: the processor paid out a withdrawal.
    /// The balance is debited only here, never at request time.
    pub fn confirm_withdrawal(&self, player: PlayerId, amount: Chips) -> LedgerResult<Chips> {
        self.debit(player, None, amount, EntryType::Withdrawal)
    }

    /// Most recent journal entries for a player, newest first.
    pub fn entries(&self, player: PlayerId, limit: usize) -> Vec<LedgerEntry> {
        let inner = self.inner.lock().expect("accounts lock");
        inner
            .journal
            .iter()
            .rev()
            .filter(|e| e.player == player)
            .take(limit)
            .cloned()
            .collect()
    }

    fn debit(
        &self,
        player: PlayerId,
        table: Option<TableId>,
        amount: Chips,
        entry_type: EntryType,
    ) -> LedgerResult<Chips> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let mut inner = self.inner.lock().expect("accounts lock");
        let balance = inner
            .balances
            .get_mut(&player)
            .ok_or(LedgerError::AccountNotFound(player))?;
        if *balance < amount {
            return Err(LedgerError::InsufficientFunds {
                available: *balance,
                required: amount,
            });
        }
        *balance -= amount;
        let balance_after = *balance;
        inner.journal.push(LedgerEntry {
            player,
            table,
            amount: -amount,
            balance_after,
            direction: EntryDirection::Debit,
            entry_type,
            at: Utc::now(),
        });
        Ok(balance_after)
    }

    fn credit(
        &self,
        player: PlayerId,
        table: Option<TableId>,
        amount: Chips,
        entry_type: EntryType,
    ) -> LedgerResult<Chips> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let mut inner = self.inner.lock().expect("accounts lock");
        let balance = inner
            .balances
            .get_mut(&player)
            .ok_or(LedgerError::AccountNotFound(player))?;
        let balance_after = balance
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow)?;
        *balance = balance_after;
        inner.journal.push(LedgerEntry {
            player,
            table,
            amount,
            balance_after,
            direction: EntryDirection::Credit,
            entry_type,
            at: Utc::now(),
        });
        Ok(balance_after)
    }
}
