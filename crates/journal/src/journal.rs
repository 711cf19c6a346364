//! The per-mount journal store
//!
//! A bounded, append-only, in-memory sequence of change entries. One logical
//! writer per mount appends; readers query concurrently. Retention is a
//! bounded entry count with O(1) oldest-first eviction, so a write burst can
//! never stall ingestion; readers that fall behind the window are told so
//! in-band instead of silently missing history.

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

use chronicle_core::{
    ChangeNotification, Dtype, JournalEntry, JournalError, LargeChange, Position, Result, RootId,
    SmallChange,
};

use crate::config::JournalConfig;

/// Entries strictly after a query's starting position, captured atomically
/// with the cursor the caller should resume from.
#[derive(Debug, Clone)]
pub struct EntriesAfter {
    /// Retained entries in append order
    pub entries: Vec<JournalEntry>,
    /// True when the starting position predates the oldest retained entry
    pub truncated: bool,
    /// The store's current position at read time
    pub to_position: Position,
}

struct JournalState {
    generation: u64,
    /// Sequence number the next appended entry receives; starts at 1
    next_sequence: u64,
    entries: VecDeque<JournalEntry>,
    retention_limit: usize,
    /// Newest sequence number ever evicted; 0 when nothing was evicted
    evicted_through: u64,
}

impl JournalState {
    fn latest_sequence(&self) -> u64 {
        self.next_sequence - 1
    }

    fn current_position(&self) -> Position {
        Position {
            generation: self.generation,
            sequence: self.latest_sequence(),
        }
    }
}

/// Bounded ordered journal for one mount.
///
/// Appends are mutually exclusive with each other and with eviction; reads
/// run concurrently and block only behind an in-progress append. Entries are
/// immutable once appended.
pub struct Journal {
    state: RwLock<JournalState>,
}

impl Journal {
    /// Create a journal with a fresh generation
    pub fn new(config: &JournalConfig) -> Self {
        Self::with_generation(config, fresh_generation())
    }

    /// Create a journal with an explicit generation tag
    pub fn with_generation(config: &JournalConfig, generation: u64) -> Self {
        Self {
            state: RwLock::new(JournalState {
                generation,
                next_sequence: 1,
                entries: VecDeque::new(),
                // A zero limit would make every append evict itself
                retention_limit: config.retention_limit.max(1),
                evicted_through: 0,
            }),
        }
    }

    /// Append one change, assigning it the next position.
    ///
    /// Evicts the oldest entry when the retention limit is exceeded. The
    /// evicted range is remembered so later queries spanning it observe a
    /// truncation instead of a silent gap.
    pub fn append(&self, change: ChangeNotification) -> Position {
        let mut state = self.state.write();
        let position = Position {
            generation: state.generation,
            sequence: state.next_sequence,
        };
        state.next_sequence += 1;
        state.entries.push_back(JournalEntry {
            position,
            change,
            timestamp: SystemTime::now(),
        });
        if state.entries.len() > state.retention_limit {
            // pop_front cannot fail here: len > limit >= 1
            if let Some(evicted) = state.entries.pop_front() {
                state.evicted_through = evicted.position.sequence;
                debug!(
                    sequence = evicted.position.sequence,
                    "evicted oldest journal entry"
                );
            }
        }
        position
    }

    /// Position of the most recently appended entry, or the origin position
    /// if nothing was ever appended.
    pub fn current_position(&self) -> Position {
        self.state.read().current_position()
    }

    /// All entries strictly after `from`, plus whether the requested start
    /// had already been evicted.
    ///
    /// Fails with `OutOfDate` when `from` was issued under a different
    /// generation (the mount was reset since the cursor was handed out).
    pub fn entries_after(&self, from: Position) -> Result<EntriesAfter> {
        let state = self.state.read();
        if from.generation != state.generation {
            return Err(JournalError::OutOfDate {
                given: from.generation,
                current: state.generation,
            });
        }
        let truncated = from.sequence < state.evicted_through;
        let entries = state
            .entries
            .iter()
            .skip_while(|e| e.position.sequence <= from.sequence)
            .cloned()
            .collect();
        Ok(EntriesAfter {
            entries,
            truncated,
            to_position: state.current_position(),
        })
    }

    /// Mount teardown/remount path: bump the generation and drop all
    /// history. Every outstanding position becomes out-of-date.
    pub fn reset(&self) -> u64 {
        let mut state = self.state.write();
        let generation = fresh_generation().max(state.generation + 1);
        info!(
            old_generation = state.generation,
            new_generation = generation,
            "journal reset"
        );
        state.generation = generation;
        state.next_sequence = 1;
        state.entries.clear();
        state.evicted_through = 0;
        generation
    }

    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    /// Number of currently retained entries
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }
}

/// Convenience recorders used by the ingest path and the checkout layer.
impl Journal {
    pub fn record_added(&self, path: impl Into<PathBuf>, dtype: Dtype) -> Position {
        self.append(ChangeNotification::Small(SmallChange::Added {
            path: path.into(),
            dtype,
        }))
    }

    pub fn record_modified(&self, path: impl Into<PathBuf>, dtype: Dtype) -> Position {
        self.append(ChangeNotification::Small(SmallChange::Modified {
            path: path.into(),
            dtype,
        }))
    }

    pub fn record_removed(&self, path: impl Into<PathBuf>, dtype: Dtype) -> Position {
        self.append(ChangeNotification::Small(SmallChange::Removed {
            path: path.into(),
            dtype,
        }))
    }

    pub fn record_renamed(
        &self,
        from: impl Into<PathBuf>,
        to: impl Into<PathBuf>,
        dtype: Dtype,
    ) -> Position {
        self.append(ChangeNotification::Small(SmallChange::Renamed {
            from: from.into(),
            to: to.into(),
            dtype,
        }))
    }

    pub fn record_replaced(
        &self,
        from: impl Into<PathBuf>,
        to: impl Into<PathBuf>,
        dtype: Dtype,
    ) -> Position {
        self.append(ChangeNotification::Small(SmallChange::Replaced {
            from: from.into(),
            to: to.into(),
            dtype,
        }))
    }

    pub fn record_directory_renamed(
        &self,
        from: impl Into<PathBuf>,
        to: impl Into<PathBuf>,
    ) -> Position {
        self.append(ChangeNotification::Large(LargeChange::DirectoryRenamed {
            from: from.into(),
            to: to.into(),
        }))
    }

    pub fn record_commit_transition(&self, from: RootId, to: RootId) -> Position {
        self.append(ChangeNotification::Large(LargeChange::CommitTransition {
            from,
            to,
        }))
    }
}

fn fresh_generation() -> u64 {
    // Wall-clock nanos give a tag that survives process restarts without
    // persisted state. Reset additionally enforces strict growth.
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1)
}
