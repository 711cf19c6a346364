//! Shared types for the chronicle change journal
//!
//! This crate provides:
//! - The change vocabulary (`SmallChange`, `LargeChange`, `ChangeNotification`)
//! - Journal positions and the opaque cursor codec
//! - Typed journal errors
//! - Path prefix/suffix matching used by query filters

pub mod change;
pub mod error;
pub mod pathfilter;
pub mod position;

// Re-exports
pub use change::{
    ChangeNotification, Dtype, JournalEntry, LargeChange, LostChangesReason, RootId, SmallChange,
};
pub use error::JournalError;
pub use position::Position;

/// Result type for journal operations
pub type Result<T> = std::result::Result<T, JournalError>;
