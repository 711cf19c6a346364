//! Path prefix and suffix matching used by query filters
//!
//! All journal paths are mount-relative. Prefix checks are component-wise:
//! `build` covers `build/out.o` but not `build2/out.o`.

use std::path::{Component, Path, PathBuf};

/// True if `path` equals `root` or lies underneath it
pub fn is_under(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

/// Rebase `path` to be relative to `root`. `None` if it is the root itself
/// or lies outside it.
pub fn relative_to(path: &Path, root: &Path) -> Option<PathBuf> {
    if path == root {
        return None;
    }
    path.strip_prefix(root).ok().map(Path::to_path_buf)
}

/// Suffix filters accept `"rs"` and `".rs"` interchangeably
pub fn normalize_suffix(suffix: &str) -> &str {
    suffix.strip_prefix('.').unwrap_or(suffix)
}

/// The path's trailing extension, or `""` when it has none
pub fn extension_of(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("")
}

/// True if `root` is usable as a query scope: relative, non-empty, and not
/// escaping the mount via parent components.
pub fn is_valid_root(root: &Path) -> bool {
    if root.as_os_str().is_empty() {
        return false;
    }
    root.components()
        .all(|c| matches!(c, Component::Normal(_)))
}
