//! Session manager: durable identity to live connection binding.
//!
//! A player's seat belongs to their identity, not their socket. The manager
//! issues a resumable token at connect time; when the transport reports the
//! connection lost, the table is told to start the seat's grace window, and
//! a reconnect presenting the token inside that window lands back on the
//! same seat with a full state resynchronization.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;

use super::models::{SessionError, SessionToken};
use crate::game::entities::PlayerId;
use crate::ledger::TableId;
use crate::net::{ConnectionId, ConnectionSink, ServerEvent};
use crate::table::registry::TableRegistry;

struct Session {
    token: SessionToken,
    connection: Option<ConnectionId>,
    table: Option<TableId>,
    /// Task forwarding the table's event channel to the live connection.
    forwarder: Option<JoinHandle<()>>,
}

type Sessions = Arc<RwLock<HashMap<PlayerId, Session>>>;

pub struct SessionManager {
    registry: Arc<TableRegistry>,
    sink: Arc<dyn ConnectionSink>,
    sessions: Sessions,
}

impl SessionManager {
    #[must_use]
    pub fn new(registry: Arc<TableRegistry>, sink: Arc<dyn ConnectionSink>) -> Self {
        Self {
            registry,
            sink,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Bind a fresh connection to a player identity, returning the
    /// resumable token. A newer connection displaces any older one: a player
    /// has at most one live connection per table.
    pub async fn connect(&self, player: PlayerId, connection: ConnectionId) -> SessionToken {
        let token = SessionToken::generate();
        let mut sessions = self.sessions.write().await;
        let previous = sessions.insert(
            player,
            Session {
                token,
                connection: Some(connection),
                table: None,
                forwarder: None,
            },
        );
        if let Some(previous) = previous {
            if let Some(task) = previous.forwarder {
                task.abort();
            }
            log::info!("player {player}: session replaced by new connection {connection}");
        }
        token
    }

    /// Record that the player sat at a table and start streaming its events
    /// to their connection.
    pub async fn attach_table(
        &self,
        player: PlayerId,
        table: TableId,
    ) -> Result<(), SessionError> {
        let (tx, rx) = mpsc::channel(64);
        self.registry
            .subscribe(table, player, tx)
            .await
            .map_err(|_| SessionError::TableGone)?;

        let forwarder = self.spawn_forwarder(player, rx);
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&player)
            .ok_or(SessionError::UnknownSession)?;
        session.table = Some(table);
        if let Some(task) = session.forwarder.replace(forwarder) {
            task.abort();
        }
        Ok(())
    }

    /// Stop streaming and drop the table binding (after a stand-up).
    pub async fn detach_table(&self, player: PlayerId) {
        let table = {
            let mut sessions = self.sessions.write().await;
            let Some(session) = sessions.get_mut(&player) else {
                return;
            };
            if let Some(task) = session.forwarder.take() {
                task.abort();
            }
            session.table.take()
        };
        if let Some(table) = table {
            self.registry.unsubscribe(table, player).await;
        }
    }

    /// The transport lost this connection. The seat survives: the table is
    /// told to start the grace window and the session waits for a resume.
    pub async fn disconnect(&self, connection: ConnectionId) {
        let mut at_table = None;
        {
            let mut sessions = self.sessions.write().await;
            for (player, session) in sessions.iter_mut() {
                if session.connection == Some(connection) {
                    session.connection = None;
                    if let Some(task) = session.forwarder.take() {
                        task.abort();
                    }
                    at_table = session.table.map(|table| (*player, table));
                    break;
                }
            }
        }
        if let Some((player, table)) = at_table {
            log::info!("player {player}: connection {connection} lost, grace window starts");
            self.registry.notify_disconnect(table, player).await;
        }
    }

    /// Resume a dropped session. The token is compared in constant time; on
    /// success the seat returns to play and the new connection receives a
    /// full resynchronization (hand, pots, board, own hole cards, and the
    /// legal actions if it is the seat's turn).
    pub async fn reconnect(
        &self,
        player: PlayerId,
        token: &SessionToken,
        connection: ConnectionId,
    ) -> Result<(), SessionError> {
        let table = {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .get_mut(&player)
                .ok_or(SessionError::UnknownSession)?;
            if !session.token.matches(token) {
                return Err(SessionError::InvalidToken);
            }
            session.connection = Some(connection);
            session.table
        };

        let Some(table) = table else {
            return Ok(());
        };

        let view = self
            .registry
            .notify_reconnect(table, player)
            .await
            .map_err(|_| SessionError::TableGone)?;

        // Re-subscribe on the new connection, then resync.
        self.attach_table(player, table).await?;
        self.sink.send(connection, ServerEvent::Resync(view)).await;
        log::info!("player {player}: reconnected on connection {connection}");
        Ok(())
    }

    /// The player's current table binding, if any.
    pub async fn table_of(&self, player: PlayerId) -> Option<TableId> {
        self.sessions.read().await.get(&player)?.table
    }

    /// Deliver one event to the player's live connection, if any.
    pub async fn send_to_player(&self, player: PlayerId, event: ServerEvent) {
        let connection = {
            let sessions = self.sessions.read().await;
            sessions.get(&player).and_then(|s| s.connection)
        };
        if let Some(connection) = connection {
            self.sink.send(connection, event).await;
        }
    }

    /// Forward a table's event stream to whatever connection the player
    /// currently holds, so a mid-hand reconnect keeps receiving progress
    /// without resubscribing the table.
    fn spawn_forwarder(
        &self,
        player: PlayerId,
        mut rx: mpsc::Receiver<ServerEvent>,
    ) -> JoinHandle<()> {
        let sessions = Arc::clone(&self.sessions);
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let connection = {
                    let sessions = sessions.read().await;
                    sessions.get(&player).and_then(|s| s.connection)
                };
                if let Some(connection) = connection {
                    sink.send(connection, event).await;
                }
            }
        })
    }
}
