//! Journal positions and the opaque cursor codec
//!
//! A position is a monotonically increasing sequence number scoped to a
//! mount generation. Callers receive positions as opaque hex strings; the
//! only valid operations on them are handing them back unchanged and
//! equality comparison.

use serde::{Deserialize, Serialize};

use crate::error::JournalError;

/// Cursor format version tag
const CURSOR_VERSION: u8 = 1;
/// version byte + generation u64 + sequence u64
const CURSOR_LEN: usize = 17;

/// A point in a mount's journal history.
///
/// Sequences are totally ordered within a generation. Positions from
/// different generations are never comparable; consumers must treat a
/// generation mismatch as out-of-date, not attempt to order across it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub generation: u64,
    pub sequence: u64,
}

impl Position {
    /// The position of an empty journal in the given generation
    pub fn origin(generation: u64) -> Self {
        Self {
            generation,
            sequence: 0,
        }
    }

    /// Encode to the opaque cursor string handed to callers
    pub fn encode(&self) -> String {
        let mut buf = [0u8; CURSOR_LEN];
        buf[0] = CURSOR_VERSION;
        buf[1..9].copy_from_slice(&self.generation.to_be_bytes());
        buf[9..17].copy_from_slice(&self.sequence.to_be_bytes());
        hex::encode(buf)
    }

    /// Decode an opaque cursor string.
    ///
    /// Fails with `MalformedPosition` on structurally invalid input; there
    /// is no best-effort recovery.
    pub fn decode(cursor: &str) -> Result<Self, JournalError> {
        let bytes = hex::decode(cursor)
            .map_err(|_| JournalError::MalformedPosition(format!("not hex: {cursor:?}")))?;
        if bytes.len() != CURSOR_LEN {
            return Err(JournalError::MalformedPosition(format!(
                "expected {CURSOR_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        if bytes[0] != CURSOR_VERSION {
            return Err(JournalError::MalformedPosition(format!(
                "unknown cursor version {}",
                bytes[0]
            )));
        }
        let mut generation = [0u8; 8];
        let mut sequence = [0u8; 8];
        generation.copy_from_slice(&bytes[1..9]);
        sequence.copy_from_slice(&bytes[9..17]);
        Ok(Self {
            generation: u64::from_be_bytes(generation),
            sequence: u64::from_be_bytes(sequence),
        })
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.generation, self.sequence)
    }
}
