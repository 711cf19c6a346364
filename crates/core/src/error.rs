//! Typed errors for journal operations

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to journal callers.
///
/// Both variants are fatal to the request that produced them: a caller
/// holding a malformed position must resend with a fresh one, and a caller
/// holding an out-of-date position must fall back to a full rescan. Neither
/// is retried internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JournalError {
    /// The position blob failed to decode
    #[error("malformed journal position: {0}")]
    MalformedPosition(String),

    /// The position was issued before the mount's current generation
    #[error(
        "position from generation {given:#x} is out of date (current generation {current:#x})"
    )]
    OutOfDate { given: u64, current: u64 },

    /// The query's root scope is not a valid relative path inside the mount
    #[error("invalid root path {0:?} in mount")]
    InvalidRoot(PathBuf),
}
