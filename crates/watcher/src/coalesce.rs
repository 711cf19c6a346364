//! Backend-specific event coalescing
//!
//! The single place where backend delivery differences are reconciled into
//! the canonical change vocabulary. A synchronous backend's events pass
//! through one-to-one; a coalesced backend's events are folded per path
//! within each batch. Rename inference over remove+add pairs runs for both.

use ahash::AHashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::trace;

use chronicle_core::{ChangeNotification, Dtype, LargeChange, SmallChange};

use crate::{ContentId, DeliveryMode, RawEvent};

/// Decides whether a removed path and an added path held the same content,
/// which is what turns a Removed+Added pair into a rename.
///
/// The exact rule is backend-dependent; this is deliberately pluggable.
pub trait RenameIdentity: Send + Sync {
    fn identical(&self, removed: Option<&ContentId>, added: Option<&ContentId>) -> bool;
}

/// Default predicate: equal blake3 content ids. Missing ids on either side
/// mean the pair stays an independent Removed+Added.
pub struct HashIdentity;

impl RenameIdentity for HashIdentity {
    fn identical(&self, removed: Option<&ContentId>, added: Option<&ContentId>) -> bool {
        match (removed, added) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// Translates raw per-path OS notifications into canonical changes,
/// applying the policy for one backend identity.
pub struct Coalescer {
    mode: DeliveryMode,
    rename_identity: Arc<dyn RenameIdentity>,
}

impl Coalescer {
    pub fn new(mode: DeliveryMode) -> Self {
        Self::with_rename_identity(mode, Arc::new(HashIdentity))
    }

    pub fn with_rename_identity(mode: DeliveryMode, identity: Arc<dyn RenameIdentity>) -> Self {
        Self {
            mode,
            rename_identity: identity,
        }
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Collapse one notification batch into journal-ready changes.
    ///
    /// Batch boundaries matter: rename inference and per-path folding never
    /// look across batches.
    pub fn coalesce(&self, batch: Vec<RawEvent>) -> Vec<ChangeNotification> {
        let batch = self.infer_renames(batch);
        let changes = match self.mode {
            DeliveryMode::Synchronous => batch.into_iter().filter_map(translate).collect(),
            DeliveryMode::Coalesced => fold_per_path(batch),
        };
        trace!(count = changes.len(), mode = ?self.mode, "coalesced batch");
        changes
    }

    /// Collapse Removed(a) immediately followed by Created(b) into a rename
    /// when the content identity predicate matches.
    fn infer_renames(&self, batch: Vec<RawEvent>) -> Vec<RawEvent> {
        let mut out: Vec<RawEvent> = Vec::with_capacity(batch.len());
        for event in batch {
            match (&out.last(), &event) {
                (
                    Some(RawEvent::Removed {
                        path: removed_path,
                        dtype,
                        content: removed_content,
                    }),
                    RawEvent::Created {
                        path: added_path,
                        content: added_content,
                        ..
                    },
                ) if removed_path != added_path
                    && self
                        .rename_identity
                        .identical(removed_content.as_ref(), added_content.as_ref()) =>
                {
                    let renamed = RawEvent::Renamed {
                        from: removed_path.clone(),
                        to: added_path.clone(),
                        dtype: *dtype,
                        overwrote: false,
                    };
                    out.pop();
                    out.push(renamed);
                }
                _ => out.push(event),
            }
        }
        out
    }
}

/// One raw event to at most one change; markers never reach this point
fn translate(event: RawEvent) -> Option<ChangeNotification> {
    Some(match event {
        RawEvent::Created { path, dtype, .. } => {
            ChangeNotification::Small(SmallChange::Added { path, dtype })
        }
        RawEvent::Modified { path, dtype } => {
            ChangeNotification::Small(SmallChange::Modified { path, dtype })
        }
        RawEvent::Removed { path, dtype, .. } => {
            ChangeNotification::Small(SmallChange::Removed { path, dtype })
        }
        RawEvent::Renamed {
            from,
            to,
            dtype,
            overwrote,
        } => ChangeNotification::Small(if overwrote {
            SmallChange::Replaced { from, to, dtype }
        } else {
            SmallChange::Renamed { from, to, dtype }
        }),
        RawEvent::DirectoryRenamed { from, to } => {
            ChangeNotification::Large(LargeChange::DirectoryRenamed { from, to })
        }
        RawEvent::FlushMarker { .. } => return None,
    })
}

/// Net effect of a run of single-path events on one path
#[derive(Clone, Copy)]
enum Folded {
    Added(Dtype),
    Modified(Dtype),
    Removed(Dtype),
    /// Created and removed within the batch; nothing to report
    Gone,
}

impl Folded {
    fn start(event: &RawEvent) -> Self {
        match event {
            RawEvent::Created { dtype, .. } => Folded::Added(*dtype),
            RawEvent::Modified { dtype, .. } => Folded::Modified(*dtype),
            RawEvent::Removed { dtype, .. } => Folded::Removed(*dtype),
            _ => unreachable!("only single-path events are folded"),
        }
    }

    fn apply(self, event: &RawEvent) -> Self {
        match (self, event) {
            (Folded::Added(d), RawEvent::Modified { .. }) => Folded::Added(d),
            (Folded::Added(_), RawEvent::Removed { .. }) => Folded::Gone,
            (Folded::Modified(d), RawEvent::Modified { .. }) => Folded::Modified(d),
            (Folded::Modified(_), RawEvent::Removed { dtype, .. }) => Folded::Removed(*dtype),
            // Removed then recreated nets out to a content change
            (Folded::Removed(_), RawEvent::Created { dtype, .. }) => Folded::Modified(*dtype),
            (Folded::Gone, RawEvent::Created { dtype, .. }) => Folded::Added(*dtype),
            (state, RawEvent::Created { dtype, .. }) => match state {
                // Duplicate create reports collapse
                Folded::Added(_) => Folded::Added(*dtype),
                other => other,
            },
            (state, _) => state,
        }
    }
}

/// Per-path folding for coalesced-delivery backends. Output order is the
/// first appearance of each path within the batch.
fn fold_per_path(batch: Vec<RawEvent>) -> Vec<ChangeNotification> {
    enum Slot {
        PerPath(PathBuf, Folded),
        Passthrough(ChangeNotification),
    }

    let mut slots: Vec<Slot> = Vec::new();
    let mut index: AHashMap<PathBuf, usize> = AHashMap::new();

    for event in batch {
        match &event {
            RawEvent::Created { path, .. }
            | RawEvent::Modified { path, .. }
            | RawEvent::Removed { path, .. } => match index.get(path) {
                Some(&i) => {
                    if let Slot::PerPath(_, folded) = &mut slots[i] {
                        *folded = folded.apply(&event);
                    }
                }
                None => {
                    index.insert(path.clone(), slots.len());
                    slots.push(Slot::PerPath(path.clone(), Folded::start(&event)));
                }
            },
            // Multi-path events keep their place but are not folded
            _ => {
                if let Some(change) = translate(event) {
                    slots.push(Slot::Passthrough(change));
                }
            }
        }
    }

    slots
        .into_iter()
        .filter_map(|slot| match slot {
            Slot::PerPath(path, Folded::Added(dtype)) => {
                Some(ChangeNotification::Small(SmallChange::Added { path, dtype }))
            }
            Slot::PerPath(path, Folded::Modified(dtype)) => Some(ChangeNotification::Small(
                SmallChange::Modified { path, dtype },
            )),
            Slot::PerPath(path, Folded::Removed(dtype)) => Some(ChangeNotification::Small(
                SmallChange::Removed { path, dtype },
            )),
            Slot::PerPath(_, Folded::Gone) => None,
            Slot::Passthrough(change) => Some(change),
        })
        .collect()
}
