//! Length-prefixed bincode framing for the message channel.

use bincode::config::Configuration;
use serde::{Serialize, de::DeserializeOwned};
use std::io::{Read, Write};

use super::errors::{Result, SerializationError};

/// Cap on a single framed message to prevent unbounded allocation from a
/// hostile or broken peer.
const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

fn config() -> Configuration {
    bincode::config::standard()
}

/// Write `value` as a little-endian u32 length prefix followed by its
/// bincode encoding, in a single write to avoid read-side EOF races.
pub fn write_prefixed<T: Serialize, W: Write>(writer: &mut W, value: &T) -> Result<()> {
    let encoded = bincode::serde::encode_to_vec(value, config())?;
    if encoded.len() > MAX_MESSAGE_SIZE {
        return Err(SerializationError::MessageTooLarge {
            actual: encoded.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    let mut buf = Vec::with_capacity(4 + encoded.len());
    buf.extend_from_slice(&(encoded.len() as u32).to_le_bytes());
    buf.extend_from_slice(&encoded);
    writer.write_all(&buf)?;
    Ok(())
}

/// Read one length-prefixed message. The size is validated before any
/// allocation happens.
pub fn read_prefixed<T: DeserializeOwned, R: Read>(reader: &mut R) -> Result<T> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(SerializationError::MessageTooLarge {
            actual: len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    let (value, _) = bincode::serde::decode_from_slice(&buf, config())?;
    Ok(value)
}
