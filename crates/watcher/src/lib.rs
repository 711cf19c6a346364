//! Event intake for the chronicle journal
//!
//! This crate provides:
//! - The raw event vocabulary and the `EventSource` boundary to OS backends
//! - Backend-specific event coalescing (`Coalescer`)
//! - The synchronization barrier for asynchronous-delivery backends
//! - The ingest pump, the single logical writer feeding a mount's journal
//! - A `notify`-backed local event source

pub mod backend;
pub mod barrier;
pub mod coalesce;
pub mod ingest;

use std::path::PathBuf;

use chronicle_core::Dtype;

// Re-exports
pub use backend::NotifyBackend;
pub use barrier::{SyncBarrier, SyncOutcome};
pub use coalesce::{Coalescer, HashIdentity, RenameIdentity};
pub use ingest::IngestPump;

/// Content identity of a file as reported by a backend.
///
/// Backends that know file contents (virtual checkouts do) attach these to
/// create/remove events so a remove+add pair can be recognized as a rename.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentId([u8; 32]);

impl ContentId {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn of_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContentId({})", blake3::Hash::from_bytes(self.0).to_hex())
    }
}

/// How a backend hands events to the journal layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Fine-grained, delivered in operation order (inotify-style). A file
    /// creation arrives as a create followed by a separate write.
    Synchronous,
    /// Deferred and collapsed by the OS (FSEvents/ProjFS-style). A file
    /// creation arrives as a single event; delivery lags the operation.
    Coalesced,
}

/// One raw notification from an event source, paths mount-relative
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvent {
    Created {
        path: PathBuf,
        dtype: Dtype,
        content: Option<ContentId>,
    },
    Modified {
        path: PathBuf,
        dtype: Dtype,
    },
    Removed {
        path: PathBuf,
        dtype: Dtype,
        content: Option<ContentId>,
    },
    /// Backend-detected move; `overwrote` marks a destination that existed
    Renamed {
        from: PathBuf,
        to: PathBuf,
        dtype: Dtype,
        overwrote: bool,
    },
    /// Backend-detected whole-directory move
    DirectoryRenamed {
        from: PathBuf,
        to: PathBuf,
    },
    /// Barrier handshake echo; see [`SyncBarrier`]
    FlushMarker {
        token: u64,
    },
}

/// Boundary to the OS notification layer.
///
/// Implementations deliver `Vec<RawEvent>` batches over the mount's ingest
/// channel; this trait only exposes what the journal layer needs to know
/// about the backend itself.
pub trait EventSource: Send + Sync {
    fn delivery_mode(&self) -> DeliveryMode;

    /// Ask the backend to echo `FlushMarker { token }` through the event
    /// stream after every notification it has already accepted.
    fn request_flush(&self, token: u64) -> anyhow::Result<()>;
}
