//! Helpers for classifying and normalising asset reference paths.
//!
//! This module intentionally splits the responsibilities into focused submodules so that
//! the logic for classifying raw references, moving paths between coordinate spaces, and
//! substituting `{variable}` placeholders can be tested independently. The same code is
//! shared between the candidate search and the canonical name generator.

mod classify;
mod vars;

pub use classify::{classify, InputKind};
pub use vars::{substitute, validate_target_path};

use std::path::{Path, PathBuf};

/// Returns whether a repository-style path is absolute.
pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/') || Path::new(path).is_absolute()
}

/// Make a repository path absolute against a base directory.
///
/// Absolute inputs are only normalised. The result always uses forward slashes so
/// that repository lookups behave identically on every platform, regardless of the
/// native directory separator.
pub fn make_absolute(path: &str, base_dir: &str) -> String {
    let joined = if is_absolute(path) {
        path.replace('\\', "/")
    } else {
        format!("{}/{}", base_dir.trim_end_matches('/'), path).replace('\\', "/")
    };

    canonicalize_segments(&joined)
}

/// Collapse `.` and `..` segments of an absolute repository path.
fn canonicalize_segments(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    format!("/{}", segments.join("/"))
}

/// Make a file system path relative to a root, if it is a strict descendant.
///
/// The returned path uses forward slashes. Returns `None` when the path equals the
/// root or lies outside of it.
pub fn relative_to_root(path: &Path, root: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    if relative.as_os_str().is_empty() {
        return None;
    }

    Some(path_to_slashes(relative))
}

/// Join a relative reference onto a file system root.
pub fn join_root(root: &Path, relative: &str) -> PathBuf {
    let mut joined = root.to_path_buf();
    for segment in relative.split('/').filter(|s| !s.is_empty() && *s != ".") {
        joined.push(segment);
    }
    joined
}

/// Render a file system path with forward slashes.
pub fn path_to_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
