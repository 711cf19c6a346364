//! The change vocabulary recorded by the journal
//!
//! Every stored entry is exactly one `ChangeNotification`: either a
//! single-path `SmallChange` or a subtree/checkout-scope `LargeChange`.
//! The split is enforced by the type system, so an entry can never carry
//! zero or two payloads.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::position::Position;

/// File type of a changed path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dtype {
    Regular,
    Directory,
    Symlink,
}

/// Identifier of a checked-out commit (opaque to the journal)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RootId(pub String);

impl RootId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RootId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for RootId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single-path mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmallChange {
    Added {
        path: PathBuf,
        dtype: Dtype,
    },
    Modified {
        path: PathBuf,
        dtype: Dtype,
    },
    /// Moved to a path that did not previously exist
    Renamed {
        from: PathBuf,
        to: PathBuf,
        dtype: Dtype,
    },
    /// Moved over a path that did exist; the destination was replaced
    Replaced {
        from: PathBuf,
        to: PathBuf,
        dtype: Dtype,
    },
    Removed {
        path: PathBuf,
        dtype: Dtype,
    },
}

impl SmallChange {
    /// All paths named by this change (one, or two for renames/replaces)
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        let (first, second) = match self {
            SmallChange::Added { path, .. }
            | SmallChange::Modified { path, .. }
            | SmallChange::Removed { path, .. } => (path.as_path(), None),
            SmallChange::Renamed { from, to, .. } | SmallChange::Replaced { from, to, .. } => {
                (from.as_path(), Some(to.as_path()))
            }
        };
        std::iter::once(first).chain(second)
    }

    pub fn dtype(&self) -> Dtype {
        match self {
            SmallChange::Added { dtype, .. }
            | SmallChange::Modified { dtype, .. }
            | SmallChange::Renamed { dtype, .. }
            | SmallChange::Replaced { dtype, .. }
            | SmallChange::Removed { dtype, .. } => *dtype,
        }
    }
}

/// Why journal history is incomplete at this point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LostChangesReason {
    /// Entries were evicted from the retention window
    JournalTruncated,
    /// The mount was torn down and remounted
    Remounted,
}

/// A whole-subtree or whole-checkout-scope event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LargeChange {
    /// A directory moved; children are not reported individually
    DirectoryRenamed { from: PathBuf, to: PathBuf },
    /// The checked-out commit changed
    CommitTransition { from: RootId, to: RootId },
    /// History before this entry is gone. Synthesized by the journal layer,
    /// never produced by an event source.
    LostChanges { reason: LostChangesReason },
}

/// Exactly one small or large change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeNotification {
    Small(SmallChange),
    Large(LargeChange),
}

impl ChangeNotification {
    pub fn lost_changes(reason: LostChangesReason) -> Self {
        ChangeNotification::Large(LargeChange::LostChanges { reason })
    }

    pub fn is_lost_changes(&self) -> bool {
        matches!(
            self,
            ChangeNotification::Large(LargeChange::LostChanges { .. })
        )
    }
}

/// One stored journal record. Immutable once appended; owned exclusively by
/// the journal store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub position: Position,
    pub change: ChangeNotification,
    pub timestamp: SystemTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_change_paths_single() {
        let change = SmallChange::Added {
            path: PathBuf::from("src/main.rs"),
            dtype: Dtype::Regular,
        };
        let paths: Vec<_> = change.paths().collect();
        assert_eq!(paths, vec![Path::new("src/main.rs")]);
    }

    #[test]
    fn small_change_paths_rename() {
        let change = SmallChange::Renamed {
            from: PathBuf::from("a"),
            to: PathBuf::from("b"),
            dtype: Dtype::Regular,
        };
        let paths: Vec<_> = change.paths().collect();
        assert_eq!(paths, vec![Path::new("a"), Path::new("b")]);
    }

    #[test]
    fn lost_changes_marker() {
        let change = ChangeNotification::lost_changes(LostChangesReason::JournalTruncated);
        assert!(change.is_lost_changes());
        let added = ChangeNotification::Small(SmallChange::Added {
            path: PathBuf::from("f"),
            dtype: Dtype::Regular,
        });
        assert!(!added.is_lost_changes());
    }
}
