//! Session model types.

use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;

/// Opaque resumable session token handed to a client at connect time and
/// presented again on reconnect.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SessionToken(Uuid);

impl SessionToken {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Constant-time comparison; the token is a bearer secret.
    #[must_use]
    pub fn matches(&self, presented: &SessionToken) -> bool {
        self.0.as_bytes().ct_eq(presented.0.as_bytes()).into()
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Redacted on purpose; tokens must not end up in logs.
        write!(f, "session-token")
    }
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum SessionError {
    #[error("no session for this player")]
    UnknownSession,

    #[error("invalid session token")]
    InvalidToken,

    #[error("session is not bound to a table")]
    NotAtTable,

    #[error("table no longer exists")]
    TableGone,
}
