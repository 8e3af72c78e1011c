//! Network error types for serialization and framing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("failed to encode message: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("failed to decode message: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("message size {actual} exceeds maximum {max}")]
    MessageTooLarge { actual: usize, max: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SerializationError>;
