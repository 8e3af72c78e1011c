//! Table configuration models.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::game::entities::{Blinds, Chips, MAX_SEATS, MIN_PLAYERS};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    /// Created at process start, never destroyed.
    CashFixed,
    /// Created on first join, destroyed once the last player leaves.
    Private,
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableKind::CashFixed => write!(f, "cash"),
            TableKind::Private => write!(f, "private"),
        }
    }
}

/// Table configuration. All money fields are integer cents.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TableConfig {
    pub name: String,

    pub kind: TableKind,

    /// Seat capacity, 2..=9.
    pub seats: usize,

    /// Small blind in cents.
    pub small_blind: Chips,

    /// Big blind in cents.
    pub big_blind: Chips,

    /// Minimum buy-in in big blinds.
    pub min_buy_in_bb: u8,

    /// Maximum buy-in in big blinds.
    pub max_buy_in_bb: u8,

    /// Seconds the seat to act has before the engine folds or checks for it.
    pub turn_deadline_secs: u64,

    /// Seconds a disconnected seat is held before being sat out.
    pub grace_window_secs: u64,

    /// Minimum account level to join. Zero admits everyone; read from the
    /// external account store, never computed here.
    pub required_level: u32,

    /// Argon2id-hashed passphrase for private tables.
    pub passphrase_hash: Option<String>,

    /// Invite code private tables are joined through.
    pub invite_code: Option<String>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            name: "Table".to_string(),
            kind: TableKind::Private,
            seats: MAX_SEATS,
            small_blind: 10,
            big_blind: 20,
            min_buy_in_bb: 20,
            max_buy_in_bb: 100,
            turn_deadline_secs: default_turn_deadline_secs(),
            grace_window_secs: default_grace_window_secs(),
            required_level: 0,
            passphrase_hash: None,
            invite_code: None,
        }
    }
}

impl TableConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.small_blind <= 0 {
            return Err(ConfigError::Invalid {
                field: "small_blind",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.big_blind <= self.small_blind {
            return Err(ConfigError::Invalid {
                field: "big_blind",
                reason: format!("must be greater than small blind ({})", self.small_blind),
            });
        }
        if self.seats < MIN_PLAYERS || self.seats > MAX_SEATS {
            return Err(ConfigError::Invalid {
                field: "seats",
                reason: format!("must be between {MIN_PLAYERS} and {MAX_SEATS}"),
            });
        }
        if self.max_buy_in_bb <= self.min_buy_in_bb {
            return Err(ConfigError::Invalid {
                field: "max_buy_in_bb",
                reason: format!("must be greater than min buy-in ({})", self.min_buy_in_bb),
            });
        }
        if self.turn_deadline_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "turn_deadline_secs",
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn blinds(&self) -> Blinds {
        Blinds {
            small: self.small_blind,
            big: self.big_blind,
        }
    }

    #[must_use]
    pub fn min_buy_in_chips(&self) -> Chips {
        self.big_blind * Chips::from(self.min_buy_in_bb)
    }

    #[must_use]
    pub fn max_buy_in_chips(&self) -> Chips {
        self.big_blind * Chips::from(self.max_buy_in_bb)
    }

    #[must_use]
    pub fn turn_deadline(&self) -> Duration {
        Duration::from_secs(self.turn_deadline_secs)
    }

    #[must_use]
    pub fn grace_window(&self) -> Duration {
        Duration::from_secs(self.grace_window_secs)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// The predefined cash tables, cheapest first. Blinds are cents; a 10/20
/// table is €0.10/€0.20. Level gates rise with the stakes.
#[must_use]
pub fn cash_table_configs() -> Vec<TableConfig> {
    let stakes: [(&str, Chips, Chips, usize, u32); 5] = [
        ("Beginners", 10, 20, 9, 0),
        ("Intermediate", 25, 50, 9, 1),
        ("Advanced", 50, 100, 9, 2),
        ("High Roller", 100, 200, 6, 3),
        ("VIP", 250, 500, 6, 4),
    ];
    stakes
        .into_iter()
        .map(|(name, small, big, seats, level)| TableConfig {
            name: name.to_string(),
            kind: TableKind::CashFixed,
            seats,
            small_blind: small,
            big_blind: big,
            required_level: level,
            ..TableConfig::default()
        })
        .collect()
}

fn default_turn_deadline_secs() -> u64 {
    parse_env_or("CARDROOM_TURN_DEADLINE_SECS", 30)
}

fn default_grace_window_secs() -> u64 {
    parse_env_or("CARDROOM_GRACE_WINDOW_SECS", 45)
}

/// Parse an environment variable with a default fallback.
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
