//! Table registry: the lobby's view of every live table.
//!
//! Owns the five fixed cash tables (spawned at startup, never destroyed) and
//! the dynamic set of private tables (created on demand with an invite code,
//! removed once empty). Join requests are validated here (capacity, buy-in
//! range, account level, passphrase) before any money moves; the ledger
//! reservation happens last so a rejection never touches a balance.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::{Rng, distr::Alphanumeric};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, mpsc, oneshot};

use super::{
    actor::{TableActor, TableHandle},
    config::{TableConfig, TableKind, cash_table_configs},
    messages::{TableError, TableMessage, TableStatus},
};
use crate::game::engine::TableView;
use crate::game::entities::{
    Action, Chips, DisplayName, HandId, PlayerId, SeatIndex, StateVersion,
};
use crate::gateway::AccountStore;
use crate::ledger::{Accounts, TableId};
use crate::net::ServerEvent;

struct TableEntry {
    handle: TableHandle,
    config: TableConfig,
}

pub struct TableRegistry {
    accounts: Arc<Accounts>,
    store: Arc<dyn AccountStore>,
    tables: RwLock<HashMap<TableId, TableEntry>>,
    invites: RwLock<HashMap<String, TableId>>,
    next_id: AtomicU64,
}

impl TableRegistry {
    #[must_use]
    pub fn new(accounts: Arc<Accounts>, store: Arc<dyn AccountStore>) -> Self {
        Self {
            accounts,
            store,
            tables: RwLock::new(HashMap::new()),
            invites: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Spawn the predefined cash tables. Called once at startup; returns how
    /// many were opened.
    pub async fn open_cash_tables(&self) -> usize {
        let configs = cash_table_configs();
        let count = configs.len();
        for config in configs {
            self.spawn_table(config).await;
        }
        count
    }

    /// Create a private table with a generated invite code and an optional
    /// passphrase. Returns the table id and the code to share.
    pub async fn create_private_table(
        &self,
        name: &str,
        small_blind: Chips,
        big_blind: Chips,
        seats: usize,
        passphrase: Option<&str>,
    ) -> Result<(TableId, String), TableError> {
        let invite_code = generate_invite_code();
        let config = TableConfig {
            name: name.to_string(),
            kind: TableKind::Private,
            seats,
            small_blind,
            big_blind,
            passphrase_hash: passphrase.map(hash_passphrase),
            invite_code: Some(invite_code.clone()),
            ..TableConfig::default()
        };
        config
            .validate()
            .map_err(|err| TableError::InvalidConfig(err.to_string()))?;

        let id = self.spawn_table(config).await;
        self.invites.write().await.insert(invite_code.clone(), id);
        log::info!("private table {id} '{name}' created with invite {invite_code}");
        Ok((id, invite_code))
    }

    async fn spawn_table(&self, config: TableConfig) -> TableId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (actor, handle) =
            TableActor::new(id, config.clone(), self.accounts.clone(), self.store.clone());
        tokio::spawn(actor.run());
        log::info!("table {id} '{}' spawned", config.name);
        self.tables
            .write()
            .await
            .insert(id, TableEntry { handle, config });
        id
    }

    /// Resolve a lobby code: a numeric table id for cash tables, or a
    /// private table's invite code.
    pub async fn resolve(&self, code: &str) -> Option<TableId> {
        if let Ok(id) = code.parse::<TableId>() {
            if self.tables.read().await.contains_key(&id) {
                return Some(id);
            }
        }
        self.invites.read().await.get(code).copied()
    }

    /// Validate and execute a join: capacity and stakes checks, account
    /// level gate, passphrase, then the ledger reservation and seating.
    pub async fn join_table(
        &self,
        table: TableId,
        player: PlayerId,
        name: &str,
        buy_in: Chips,
        passphrase: Option<&str>,
    ) -> Result<SeatIndex, TableError> {
        let (handle, config) = self.entry(table).await?;

        let level = self.store.level(player).await;
        if level < config.required_level {
            return Err(TableError::LevelTooLow {
                required: config.required_level,
            });
        }

        let (min, max) = (config.min_buy_in_chips(), config.max_buy_in_chips());
        if buy_in < min || buy_in > max {
            return Err(TableError::BuyInOutOfRange { min, max });
        }

        if let Some(hash) = &config.passphrase_hash {
            let presented = passphrase.ok_or(TableError::AccessDenied)?;
            if !verify_passphrase(hash, presented) {
                return Err(TableError::AccessDenied);
            }
        }

        // Money moves last: the actor refunds this reservation itself if
        // seating fails. If the actor is already gone the message was never
        // processed, so the refund falls to us.
        let stack = self.accounts.reserve_buy_in(player, table, buy_in)?;

        let (tx, rx) = oneshot::channel();
        let sent = handle
            .send(TableMessage::SitDown {
                player,
                name: DisplayName::new(name),
                stack,
                respond: tx,
            })
            .await;
        if sent.is_err() {
            let _ = self.accounts.credit_cash_out(player, table, stack);
            self.remove_table(table).await;
            return Err(TableError::NotFound);
        }
        match rx.await {
            Ok(result) => result,
            Err(_) => {
                let _ = self.accounts.credit_cash_out(player, table, stack);
                self.remove_table(table).await;
                Err(TableError::NotFound)
            }
        }
    }

    /// Stand a player up; private tables are closed and removed once the
    /// last player has left.
    pub async fn leave_table(&self, table: TableId, player: PlayerId) -> Result<(), TableError> {
        let (handle, config) = self.entry(table).await?;
        let (tx, rx) = oneshot::channel();
        handle
            .send(TableMessage::StandUp {
                player,
                respond: tx,
            })
            .await?;
        rx.await.map_err(|_| TableError::Closed)??;

        if config.kind == TableKind::Private {
            self.close_if_empty(table).await;
        }
        Ok(())
    }

    pub async fn take_action(
        &self,
        table: TableId,
        player: PlayerId,
        hand: HandId,
        version: StateVersion,
        action: Action,
    ) -> Result<(), TableError> {
        let (handle, _) = self.entry(table).await?;
        let (tx, rx) = oneshot::channel();
        handle
            .send(TableMessage::TakeAction {
                player,
                hand,
                version,
                action,
                respond: tx,
            })
            .await?;
        rx.await.map_err(|_| TableError::Closed)?
    }

    pub async fn view(
        &self,
        table: TableId,
        player: Option<PlayerId>,
    ) -> Result<TableView, TableError> {
        let (handle, _) = self.entry(table).await?;
        let (tx, rx) = oneshot::channel();
        handle
            .send(TableMessage::GetView {
                player,
                respond: tx,
            })
            .await?;
        rx.await.map_err(|_| TableError::Closed)
    }

    /// Lobby listing of every live table.
    pub async fn list_tables(&self) -> Vec<TableStatus> {
        let handles: Vec<TableHandle> = {
            let tables = self.tables.read().await;
            tables.values().map(|e| e.handle.clone()).collect()
        };
        let mut statuses = Vec::with_capacity(handles.len());
        let mut dead = Vec::new();
        for handle in handles {
            let (tx, rx) = oneshot::channel();
            if handle.send(TableMessage::GetStatus { respond: tx }).await.is_err() {
                dead.push(handle.table_id());
                continue;
            }
            match rx.await {
                Ok(status) => statuses.push(status),
                Err(_) => dead.push(handle.table_id()),
            }
        }
        for id in dead {
            self.remove_table(id).await;
        }
        statuses.sort_by_key(|s| s.id);
        statuses
    }

    /// Route a disconnect notice to the player's table.
    pub async fn notify_disconnect(&self, table: TableId, player: PlayerId) {
        if let Ok((handle, _)) = self.entry(table).await {
            let _ = handle.send(TableMessage::Disconnected { player }).await;
        }
    }

    /// Route a reconnect; replies with the full resynchronization snapshot.
    pub async fn notify_reconnect(
        &self,
        table: TableId,
        player: PlayerId,
    ) -> Result<TableView, TableError> {
        let (handle, _) = self.entry(table).await?;
        let (tx, rx) = oneshot::channel();
        handle
            .send(TableMessage::Reconnected {
                player,
                respond: tx,
            })
            .await?;
        rx.await.map_err(|_| TableError::Closed)?
    }

    /// Subscribe a player's event channel to their table.
    pub async fn subscribe(
        &self,
        table: TableId,
        player: PlayerId,
        sender: mpsc::Sender<ServerEvent>,
    ) -> Result<(), TableError> {
        let (handle, _) = self.entry(table).await?;
        handle
            .send(TableMessage::Subscribe { player, sender })
            .await
    }

    pub async fn unsubscribe(&self, table: TableId, player: PlayerId) {
        if let Ok((handle, _)) = self.entry(table).await {
            let _ = handle.send(TableMessage::Unsubscribe { player }).await;
        }
    }

    pub async fn table_count(&self) -> usize {
        self.tables.read().await.len()
    }

    async fn entry(&self, table: TableId) -> Result<(TableHandle, TableConfig), TableError> {
        let tables = self.tables.read().await;
        tables
            .get(&table)
            .map(|e| (e.handle.clone(), e.config.clone()))
            .ok_or(TableError::NotFound)
    }

    async fn close_if_empty(&self, table: TableId) {
        let Ok((handle, _)) = self.entry(table).await else {
            return;
        };
        let (tx, rx) = oneshot::channel();
        if handle.send(TableMessage::GetStatus { respond: tx }).await.is_err() {
            // Actor already self-closed when its last player left.
            self.remove_table(table).await;
            return;
        }
        match rx.await {
            Ok(status) if status.player_count == 0 => {
                let (tx, rx) = oneshot::channel();
                let _ = handle
                    .send(TableMessage::Close {
                        force: false,
                        respond: tx,
                    })
                    .await;
                let _ = rx.await;
                self.remove_table(table).await;
            }
            Ok(_) => {}
            Err(_) => self.remove_table(table).await,
        }
    }

    async fn remove_table(&self, table: TableId) {
        let removed = self.tables.write().await.remove(&table);
        if let Some(entry) = removed {
            if let Some(code) = &entry.config.invite_code {
                self.invites.write().await.remove(code);
            }
            log::info!("table {table} '{}' removed from registry", entry.config.name);
        }
    }
}

fn generate_invite_code() -> String {
    let code: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    code.to_lowercase()
}

fn hash_passphrase(passphrase: &str) -> String {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(passphrase.as_bytes(), &salt)
        .expect("argon2 hashing cannot fail with a fresh salt")
        .to_string()
}

fn verify_passphrase(hash: &str, presented: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(presented.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}
