//! Table hosting: per-table actors, configuration, and the registry that
//! owns the fixed cash tables and on-demand private tables.

pub mod actor;
pub mod config;
pub mod messages;
pub mod registry;

pub use config::{ConfigError, TableConfig, TableKind, cash_table_configs};
pub use messages::{TableError, TableMessage, TableStatus};
pub use crate::ledger::TableId;
