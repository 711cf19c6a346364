//! Current wire schema
//!
//! Externally tagged unions with camelCase tags, mirroring the internal
//! small/large split. Paths are UTF-8 strings; non-UTF-8 names are
//! lossily converted, which clients of this schema generation accept.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use chronicle_core::{ChangeNotification, Dtype, LargeChange, LostChangesReason, SmallChange};
use chronicle_journal::ChangesSinceParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WireDtype {
    Regular,
    Directory,
    Symlink,
}

impl From<Dtype> for WireDtype {
    fn from(dtype: Dtype) -> Self {
        match dtype {
            Dtype::Regular => WireDtype::Regular,
            Dtype::Directory => WireDtype::Directory,
            Dtype::Symlink => WireDtype::Symlink,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WireSmallChange {
    Added { path: String, dtype: WireDtype },
    Modified { path: String, dtype: WireDtype },
    Renamed { from: String, to: String, dtype: WireDtype },
    Replaced { from: String, to: String, dtype: WireDtype },
    Removed { path: String, dtype: WireDtype },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WireLostReason {
    JournalTruncated,
    Remounted,
}

impl From<LostChangesReason> for WireLostReason {
    fn from(reason: LostChangesReason) -> Self {
        match reason {
            LostChangesReason::JournalTruncated => WireLostReason::JournalTruncated,
            LostChangesReason::Remounted => WireLostReason::Remounted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WireLargeChange {
    DirectoryRenamed { from: String, to: String },
    CommitTransition { from: String, to: String },
    LostChanges { reason: WireLostReason },
}

/// One change on the wire: exactly one small or large payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WireChange {
    SmallChange(WireSmallChange),
    LargeChange(WireLargeChange),
}

fn wire_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl From<&ChangeNotification> for WireChange {
    fn from(change: &ChangeNotification) -> Self {
        match change {
            ChangeNotification::Small(small) => WireChange::SmallChange(match small {
                SmallChange::Added { path, dtype } => WireSmallChange::Added {
                    path: wire_path(path),
                    dtype: (*dtype).into(),
                },
                SmallChange::Modified { path, dtype } => WireSmallChange::Modified {
                    path: wire_path(path),
                    dtype: (*dtype).into(),
                },
                SmallChange::Renamed { from, to, dtype } => WireSmallChange::Renamed {
                    from: wire_path(from),
                    to: wire_path(to),
                    dtype: (*dtype).into(),
                },
                SmallChange::Replaced { from, to, dtype } => WireSmallChange::Replaced {
                    from: wire_path(from),
                    to: wire_path(to),
                    dtype: (*dtype).into(),
                },
                SmallChange::Removed { path, dtype } => WireSmallChange::Removed {
                    path: wire_path(path),
                    dtype: (*dtype).into(),
                },
            }),
            ChangeNotification::Large(large) => WireChange::LargeChange(match large {
                LargeChange::DirectoryRenamed { from, to } => WireLargeChange::DirectoryRenamed {
                    from: wire_path(from),
                    to: wire_path(to),
                },
                LargeChange::CommitTransition { from, to } => WireLargeChange::CommitTransition {
                    from: from.as_str().to_string(),
                    to: to.as_str().to_string(),
                },
                LargeChange::LostChanges { reason } => WireLargeChange::LostChanges {
                    reason: (*reason).into(),
                },
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesSinceRequest {
    pub mount_point: String,
    /// Opaque cursor from a previous response, or from `current_position`
    pub from_position: String,
    #[serde(default)]
    pub included_roots: Option<Vec<String>>,
    #[serde(default)]
    pub excluded_roots: Vec<String>,
    #[serde(default)]
    pub included_suffixes: Option<Vec<String>>,
    #[serde(default)]
    pub excluded_suffixes: Vec<String>,
    /// Hard scope; result paths come back relative to it
    #[serde(default)]
    pub root: Option<String>,
}

impl ChangesSinceRequest {
    pub(crate) fn params(&self) -> ChangesSinceParams {
        ChangesSinceParams {
            included_roots: self
                .included_roots
                .as_ref()
                .map(|roots| roots.iter().map(PathBuf::from).collect()),
            excluded_roots: self.excluded_roots.iter().map(PathBuf::from).collect(),
            included_suffixes: self.included_suffixes.clone(),
            excluded_suffixes: self.excluded_suffixes.clone(),
            root: self.root.as_ref().map(PathBuf::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesSinceResponse {
    pub to_position: String,
    pub changes: Vec<WireChange>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn added_serializes_as_tagged_union() {
        let change = ChangeNotification::Small(SmallChange::Added {
            path: "src/lib.rs".into(),
            dtype: Dtype::Regular,
        });
        let wire = WireChange::from(&change);
        assert_eq!(
            serde_json::to_value(&wire).unwrap(),
            json!({
                "smallChange": {
                    "added": { "path": "src/lib.rs", "dtype": "regular" }
                }
            })
        );
    }

    #[test]
    fn rename_keeps_both_endpoints() {
        let change = ChangeNotification::Small(SmallChange::Renamed {
            from: "old".into(),
            to: "new".into(),
            dtype: Dtype::Directory,
        });
        assert_eq!(
            serde_json::to_value(WireChange::from(&change)).unwrap(),
            json!({
                "smallChange": {
                    "renamed": { "from": "old", "to": "new", "dtype": "directory" }
                }
            })
        );
    }

    #[test]
    fn lost_changes_carries_the_reason_tag() {
        let change = ChangeNotification::lost_changes(LostChangesReason::JournalTruncated);
        assert_eq!(
            serde_json::to_value(WireChange::from(&change)).unwrap(),
            json!({
                "largeChange": {
                    "lostChanges": { "reason": "journalTruncated" }
                }
            })
        );
    }

    #[test]
    fn request_fields_are_camel_case_and_optional() {
        let request: ChangesSinceRequest = serde_json::from_value(json!({
            "mountPoint": "/repo",
            "fromPosition": "00",
            "includedSuffixes": ["rs"]
        }))
        .unwrap();
        assert_eq!(request.mount_point, "/repo");
        assert_eq!(request.included_suffixes, Some(vec!["rs".to_string()]));
        assert!(request.excluded_roots.is_empty());
        assert!(request.root.is_none());
    }

    #[test]
    fn request_round_trips() {
        let request = ChangesSinceRequest {
            mount_point: "/repo".into(),
            from_position: "0100".into(),
            included_roots: Some(vec!["src".into()]),
            excluded_roots: vec!["target".into()],
            included_suffixes: None,
            excluded_suffixes: vec!["o".into()],
            root: Some("crates".into()),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            serde_json::from_value::<ChangesSinceRequest>(value).unwrap(),
            request
        );
    }
}
