//! Bounded change journal and incremental query engine
//!
//! This crate provides:
//! - The per-mount journal store (append-only, bounded, generation-tagged)
//! - The `changes_since` query engine (root/suffix filtering, pagination cursor)
//! - Runtime configuration (retention limit, synchronization timeout)

pub mod config;
pub mod journal;
pub mod query;

// Re-exports
pub use config::JournalConfig;
pub use journal::{EntriesAfter, Journal};
pub use query::{changes_since, ChangesSinceParams, ChangesSinceResult};
