//! Incremental retrieval with root/suffix filtering
//!
//! `changes_since` answers "everything after position P, restricted to these
//! roots and suffixes". Filters are query-time views: they never affect what
//! the store keeps or evicts, and they never reorder entries.

use ahash::AHashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use chronicle_core::pathfilter::{
    extension_of, is_under, is_valid_root, normalize_suffix, relative_to,
};
use chronicle_core::{
    ChangeNotification, JournalError, LargeChange, LostChangesReason, Position, Result,
    SmallChange,
};

use crate::journal::Journal;

/// Query-time filters for `changes_since`
#[derive(Debug, Clone, Default)]
pub struct ChangesSinceParams {
    /// When given, every path of an entry must lie under one of these
    pub included_roots: Option<Vec<PathBuf>>,
    /// Entries with any path under one of these are dropped; wins over
    /// `included_roots`
    pub excluded_roots: Vec<PathBuf>,
    /// When given, every path of a single-file entry must carry one of
    /// these extensions (leading dot optional)
    pub included_suffixes: Option<Vec<String>>,
    /// Single-file entries with any path carrying one of these extensions
    /// are dropped; wins over `included_suffixes`
    pub excluded_suffixes: Vec<String>,
    /// Hard scope: only entries under this root are considered at all, and
    /// result paths are reported relative to it. When combined with the
    /// root sets above, those prefixes are interpreted relative to the
    /// scope root.
    pub root: Option<PathBuf>,
}

/// Filtered changes plus the cursor to resume from
#[derive(Debug, Clone)]
pub struct ChangesSinceResult {
    pub changes: Vec<ChangeNotification>,
    /// The store's position at read time. Deliberately not the position of
    /// the last returned entry, so a caller whose filters matched nothing
    /// still advances.
    pub to_position: Position,
}

/// Everything after `from`, filtered.
///
/// A retention gap between `from` and the oldest retained entry surfaces as
/// a leading `LostChanges(JournalTruncated)` entry; it has no path and is
/// exempt from filtering. A `from` issued under a previous mount generation
/// fails with `OutOfDate`.
pub fn changes_since(
    journal: &Journal,
    from: Position,
    params: &ChangesSinceParams,
) -> Result<ChangesSinceResult> {
    if let Some(root) = &params.root {
        if !is_valid_root(root) {
            return Err(JournalError::InvalidRoot(root.clone()));
        }
    }

    let read = journal.entries_after(from)?;
    let filters = CompiledFilters::new(params);

    let mut changes = Vec::new();
    if read.truncated {
        debug!(from = %from, "journal truncated before requested position");
        changes.push(ChangeNotification::lost_changes(
            LostChangesReason::JournalTruncated,
        ));
    }
    changes.extend(read.entries.into_iter().filter_map(|entry| {
        let change = match &params.root {
            Some(root) => scope_to_root(entry.change, root)?,
            None => entry.change,
        };
        filters.passes(&change).then_some(change)
    }));

    Ok(ChangesSinceResult {
        changes,
        to_position: read.to_position,
    })
}

struct CompiledFilters<'a> {
    included_roots: Option<&'a [PathBuf]>,
    excluded_roots: &'a [PathBuf],
    included_suffixes: Option<AHashSet<&'a str>>,
    excluded_suffixes: AHashSet<&'a str>,
}

impl<'a> CompiledFilters<'a> {
    fn new(params: &'a ChangesSinceParams) -> Self {
        Self {
            included_roots: params.included_roots.as_deref(),
            excluded_roots: &params.excluded_roots,
            included_suffixes: params
                .included_suffixes
                .as_ref()
                .map(|s| s.iter().map(|s| normalize_suffix(s)).collect()),
            excluded_suffixes: params
                .excluded_suffixes
                .iter()
                .map(|s| normalize_suffix(s))
                .collect(),
        }
    }

    fn passes(&self, change: &ChangeNotification) -> bool {
        match change {
            ChangeNotification::Small(small) => small
                .paths()
                .all(|p| self.path_in_roots(p) && self.path_has_suffix(p)),
            // Directory moves carry paths but no meaningful extension
            ChangeNotification::Large(LargeChange::DirectoryRenamed { from, to }) => {
                self.path_in_roots(from) && self.path_in_roots(to)
            }
            // Checkout-scope events have no path to filter on
            ChangeNotification::Large(LargeChange::CommitTransition { .. })
            | ChangeNotification::Large(LargeChange::LostChanges { .. }) => true,
        }
    }

    fn path_in_roots(&self, path: &Path) -> bool {
        if self.excluded_roots.iter().any(|r| is_under(path, r)) {
            return false;
        }
        match self.included_roots {
            Some(roots) => roots.iter().any(|r| is_under(path, r)),
            None => true,
        }
    }

    fn path_has_suffix(&self, path: &Path) -> bool {
        let ext = extension_of(path);
        if self.excluded_suffixes.contains(ext) {
            return false;
        }
        match &self.included_suffixes {
            Some(suffixes) => suffixes.contains(ext),
            None => true,
        }
    }
}

/// Restrict a change to the scope root, rebasing paths to be root-relative.
///
/// Renames and replaces that cross the scope boundary degrade to the view an
/// observer of the root alone would have seen: a move out of the root is a
/// removal, a move into the root is an addition (or a modification when it
/// replaced an existing destination). The root itself is not reported.
fn scope_to_root(change: ChangeNotification, root: &Path) -> Option<ChangeNotification> {
    let scoped = match change {
        ChangeNotification::Small(small) => ChangeNotification::Small(match small {
            SmallChange::Added { path, dtype } => SmallChange::Added {
                path: relative_to(&path, root)?,
                dtype,
            },
            SmallChange::Modified { path, dtype } => SmallChange::Modified {
                path: relative_to(&path, root)?,
                dtype,
            },
            SmallChange::Removed { path, dtype } => SmallChange::Removed {
                path: relative_to(&path, root)?,
                dtype,
            },
            SmallChange::Renamed { from, to, dtype } => {
                match (relative_to(&from, root), relative_to(&to, root)) {
                    (Some(from), Some(to)) => SmallChange::Renamed { from, to, dtype },
                    (Some(from), None) => SmallChange::Removed { path: from, dtype },
                    (None, Some(to)) => SmallChange::Added { path: to, dtype },
                    (None, None) => return None,
                }
            }
            SmallChange::Replaced { from, to, dtype } => {
                match (relative_to(&from, root), relative_to(&to, root)) {
                    (Some(from), Some(to)) => SmallChange::Replaced { from, to, dtype },
                    (Some(from), None) => SmallChange::Removed { path: from, dtype },
                    (None, Some(to)) => SmallChange::Modified { path: to, dtype },
                    (None, None) => return None,
                }
            }
        }),
        ChangeNotification::Large(LargeChange::DirectoryRenamed { from, to }) => {
            use chronicle_core::Dtype;
            match (relative_to(&from, root), relative_to(&to, root)) {
                (Some(from), Some(to)) => {
                    ChangeNotification::Large(LargeChange::DirectoryRenamed { from, to })
                }
                // The subtree left or entered the scope wholesale
                (Some(from), None) => ChangeNotification::Small(SmallChange::Removed {
                    path: from,
                    dtype: Dtype::Directory,
                }),
                (None, Some(to)) => ChangeNotification::Small(SmallChange::Added {
                    path: to,
                    dtype: Dtype::Directory,
                }),
                (None, None) => return None,
            }
        }
        // Checkout-scope events are visible from any root
        large @ ChangeNotification::Large(LargeChange::CommitTransition { .. })
        | large @ ChangeNotification::Large(LargeChange::LostChanges { .. }) => large,
    };
    Some(scoped)
}
