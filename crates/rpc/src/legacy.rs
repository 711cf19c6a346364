//! Legacy wire schema
//!
//! Older clients speak a flat record: a change-type tag, a dtype, and one
//! or two raw byte paths. Large changes are flattened into the same record
//! shape, with the commit ids or the loss reason riding in the path field.
//! New code should use the tagged-union schema in [`crate::wire`].

use serde::{Deserialize, Serialize};
use std::path::Path;

use chronicle_core::{ChangeNotification, Dtype, LargeChange, LostChangesReason, SmallChange};

use crate::wire::WireDtype;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LegacyChangeType {
    Added,
    Modified,
    Renamed,
    Replaced,
    Removed,
    DirectoryRenamed,
    CommitTransition,
    LostChanges,
}

/// One flat legacy record. `to_path` is present only for the two-path
/// change types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyChange {
    pub change_type: LegacyChangeType,
    pub dtype: WireDtype,
    pub path: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_path: Option<Vec<u8>>,
}

fn path_bytes(path: &Path) -> Vec<u8> {
    path.as_os_str().as_encoded_bytes().to_vec()
}

fn lost_reason_bytes(reason: LostChangesReason) -> Vec<u8> {
    match reason {
        LostChangesReason::JournalTruncated => b"journalTruncated".to_vec(),
        LostChangesReason::Remounted => b"remounted".to_vec(),
    }
}

impl From<&ChangeNotification> for LegacyChange {
    fn from(change: &ChangeNotification) -> Self {
        match change {
            ChangeNotification::Small(small) => {
                let (change_type, to_path) = match small {
                    SmallChange::Added { .. } => (LegacyChangeType::Added, None),
                    SmallChange::Modified { .. } => (LegacyChangeType::Modified, None),
                    SmallChange::Removed { .. } => (LegacyChangeType::Removed, None),
                    SmallChange::Renamed { to, .. } => {
                        (LegacyChangeType::Renamed, Some(path_bytes(to)))
                    }
                    SmallChange::Replaced { to, .. } => {
                        (LegacyChangeType::Replaced, Some(path_bytes(to)))
                    }
                };
                // paths() yields the single path, or `from` first
                let first = small.paths().next().unwrap_or_else(|| Path::new(""));
                LegacyChange {
                    change_type,
                    dtype: small.dtype().into(),
                    path: path_bytes(first),
                    to_path,
                }
            }
            ChangeNotification::Large(LargeChange::DirectoryRenamed { from, to }) => LegacyChange {
                change_type: LegacyChangeType::DirectoryRenamed,
                dtype: Dtype::Directory.into(),
                path: path_bytes(from),
                to_path: Some(path_bytes(to)),
            },
            ChangeNotification::Large(LargeChange::CommitTransition { from, to }) => LegacyChange {
                change_type: LegacyChangeType::CommitTransition,
                dtype: Dtype::Regular.into(),
                path: from.as_str().as_bytes().to_vec(),
                to_path: Some(to.as_str().as_bytes().to_vec()),
            },
            ChangeNotification::Large(LargeChange::LostChanges { reason }) => LegacyChange {
                change_type: LegacyChangeType::LostChanges,
                dtype: Dtype::Regular.into(),
                path: lost_reason_bytes(*reason),
                to_path: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyChangesSinceResponse {
    pub to_position: String,
    pub changes: Vec<LegacyChange>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_core::RootId;

    #[test]
    fn added_flattens_without_to_path() {
        let change = ChangeNotification::Small(SmallChange::Added {
            path: "f.rs".into(),
            dtype: Dtype::Regular,
        });
        let legacy = LegacyChange::from(&change);
        assert_eq!(legacy.change_type, LegacyChangeType::Added);
        assert_eq!(legacy.dtype, WireDtype::Regular);
        assert_eq!(legacy.path, b"f.rs");
        assert!(legacy.to_path.is_none());
    }

    #[test]
    fn rename_flattens_with_both_paths() {
        let change = ChangeNotification::Small(SmallChange::Renamed {
            from: "a".into(),
            to: "b".into(),
            dtype: Dtype::Symlink,
        });
        let legacy = LegacyChange::from(&change);
        assert_eq!(legacy.change_type, LegacyChangeType::Renamed);
        assert_eq!(legacy.dtype, WireDtype::Symlink);
        assert_eq!(legacy.path, b"a");
        assert_eq!(legacy.to_path.as_deref(), Some(b"b".as_slice()));
    }

    #[test]
    fn commit_transition_rides_the_path_fields() {
        let change = ChangeNotification::Large(LargeChange::CommitTransition {
            from: RootId::from("aaaa"),
            to: RootId::from("bbbb"),
        });
        let legacy = LegacyChange::from(&change);
        assert_eq!(legacy.change_type, LegacyChangeType::CommitTransition);
        assert_eq!(legacy.path, b"aaaa");
        assert_eq!(legacy.to_path.as_deref(), Some(b"bbbb".as_slice()));
    }

    #[test]
    fn lost_changes_carries_the_reason_in_path() {
        let change = ChangeNotification::lost_changes(LostChangesReason::JournalTruncated);
        let legacy = LegacyChange::from(&change);
        assert_eq!(legacy.change_type, LegacyChangeType::LostChanges);
        assert_eq!(legacy.path, b"journalTruncated");
        assert!(legacy.to_path.is_none());
    }

    #[test]
    fn change_type_tags_are_screaming_snake() {
        assert_eq!(
            serde_json::to_value(LegacyChangeType::DirectoryRenamed).unwrap(),
            serde_json::json!("DIRECTORY_RENAMED")
        );
    }
}
