//! `notify`-backed local event source
//!
//! Translates platform watcher events into the raw vocabulary and feeds
//! them onto a mount's ingest channel. This backend has no view of file
//! contents, so it never attaches content ids; remove+add pairs therefore
//! stay independent instead of collapsing to renames.

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{trace, warn};

use chronicle_core::Dtype;

use crate::{DeliveryMode, EventSource, RawEvent};

pub struct NotifyBackend {
    // Kept alive for the watch registration; wrapped for Sync
    _watcher: Mutex<RecommendedWatcher>,
    events: mpsc::UnboundedSender<Vec<RawEvent>>,
}

impl NotifyBackend {
    /// Watch `root` recursively, delivering batches on `events`
    pub fn watch(
        root: &Path,
        events: mpsc::UnboundedSender<Vec<RawEvent>>,
    ) -> anyhow::Result<Self> {
        let event_root = root.to_path_buf();
        let tx = events.clone();
        let mut watcher = recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    let raw = translate(&event_root, event);
                    if !raw.is_empty() {
                        // Receiver gone means the mount is shutting down
                        let _ = tx.send(raw);
                    }
                }
                Err(e) => warn!(error = %e, "watcher error"),
            }
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        trace!(root = %root.display(), "watching");
        Ok(Self {
            _watcher: Mutex::new(watcher),
            events,
        })
    }
}

impl EventSource for NotifyBackend {
    fn delivery_mode(&self) -> DeliveryMode {
        if cfg!(target_os = "macos") {
            DeliveryMode::Coalesced
        } else {
            DeliveryMode::Synchronous
        }
    }

    fn request_flush(&self, token: u64) -> anyhow::Result<()> {
        // The channel is FIFO, so the marker lands after everything this
        // backend already delivered
        self.events
            .send(vec![RawEvent::FlushMarker { token }])
            .map_err(|_| anyhow::anyhow!("ingest channel closed"))
    }
}

fn translate(root: &Path, event: Event) -> Vec<RawEvent> {
    match event.kind {
        EventKind::Create(kind) => relative_paths(root, &event.paths)
            .map(|(abs, path)| RawEvent::Created {
                dtype: create_dtype(kind, &abs),
                path,
                content: None,
            })
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            match (event.paths.first(), event.paths.get(1)) {
                (Some(from_abs), Some(to_abs)) => {
                    match (
                        relative_path(root, from_abs),
                        relative_path(root, to_abs),
                    ) {
                        (Some(from), Some(to)) => {
                            if stat_dtype(to_abs) == Dtype::Directory {
                                vec![RawEvent::DirectoryRenamed { from, to }]
                            } else {
                                vec![RawEvent::Renamed {
                                    from,
                                    to,
                                    dtype: stat_dtype(to_abs),
                                    overwrote: false,
                                }]
                            }
                        }
                        _ => Vec::new(),
                    }
                }
                _ => Vec::new(),
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            relative_paths(root, &event.paths)
                .map(|(_, path)| RawEvent::Removed {
                    path,
                    dtype: Dtype::Regular,
                    content: None,
                })
                .collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            relative_paths(root, &event.paths)
                .map(|(abs, path)| RawEvent::Created {
                    dtype: stat_dtype(&abs),
                    path,
                    content: None,
                })
                .collect()
        }
        // One-sided rename reports: decide by what is on disk now
        EventKind::Modify(ModifyKind::Name(_)) => relative_paths(root, &event.paths)
            .map(|(abs, path)| {
                if abs.exists() {
                    RawEvent::Created {
                        dtype: stat_dtype(&abs),
                        path,
                        content: None,
                    }
                } else {
                    RawEvent::Removed {
                        path,
                        dtype: Dtype::Regular,
                        content: None,
                    }
                }
            })
            .collect(),
        EventKind::Modify(_) => relative_paths(root, &event.paths)
            .map(|(abs, path)| RawEvent::Modified {
                dtype: stat_dtype(&abs),
                path,
            })
            .collect(),
        EventKind::Remove(kind) => relative_paths(root, &event.paths)
            .map(|(_, path)| RawEvent::Removed {
                path,
                dtype: remove_dtype(kind),
                content: None,
            })
            .collect(),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

fn relative_path(root: &Path, abs: &Path) -> Option<PathBuf> {
    abs.strip_prefix(root).ok().map(Path::to_path_buf)
}

fn relative_paths<'a>(
    root: &'a Path,
    paths: &'a [PathBuf],
) -> impl Iterator<Item = (PathBuf, PathBuf)> + 'a {
    paths.iter().filter_map(move |abs| {
        relative_path(root, abs).map(|rel| (abs.clone(), rel))
    })
}

fn create_dtype(kind: CreateKind, abs: &Path) -> Dtype {
    match kind {
        CreateKind::File => Dtype::Regular,
        CreateKind::Folder => Dtype::Directory,
        _ => stat_dtype(abs),
    }
}

fn remove_dtype(kind: RemoveKind) -> Dtype {
    match kind {
        RemoveKind::Folder => Dtype::Directory,
        _ => Dtype::Regular,
    }
}

fn stat_dtype(abs: &Path) -> Dtype {
    match std::fs::symlink_metadata(abs) {
        Ok(meta) if meta.file_type().is_symlink() => Dtype::Symlink,
        Ok(meta) if meta.is_dir() => Dtype::Directory,
        _ => Dtype::Regular,
    }
}
