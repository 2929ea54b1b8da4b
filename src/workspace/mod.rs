//! Workspace: the directory a pilot reads and writes files in.
//!
//! Every relative path goes through [`sanitize_path`] before touching
//! storage. Ships with [`LocalWorkspace`] for a real directory (behind the
//! `native` feature) and [`MemoryWorkspace`] for tests.

mod memory;
#[cfg(feature = "native")]
mod local;

pub use memory::MemoryWorkspace;
#[cfg(feature = "native")]
pub use local::LocalWorkspace;

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{PilotError, PilotResult};

/// Persisted workspace options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceSettings {
    pub root: PathBuf,
    #[serde(default = "default_restrict")]
    pub restrict_to_root: bool,
}

fn default_restrict() -> bool {
    true
}

impl WorkspaceSettings {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            restrict_to_root: true,
        }
    }
}

/// Storage rooted at a directory
#[async_trait]
pub trait Workspace: Send + Sync {
    fn root(&self) -> &Path;

    fn restrict_to_root(&self) -> bool;

    /// Resolve a workspace-relative path
    fn get_path(&self, relative: &str) -> PilotResult<PathBuf> {
        sanitize_path(relative, self.root(), self.restrict_to_root())
    }

    async fn read_text(&self, relative: &str) -> PilotResult<String>;

    /// Create or overwrite a file, creating parent directories
    async fn write_text(&self, relative: &str, contents: &str) -> PilotResult<()>;

    async fn exists(&self, relative: &str) -> PilotResult<bool>;
}

/// Spellings of a NUL byte that must never reach the filesystem
const NULL_MARKERS: &[&str] = &["\0", "%00", "\\x00", "\\u0000", "\\z"];

fn contains_null(path: &str) -> bool {
    NULL_MARKERS.iter().any(|marker| path.contains(marker))
}

/// Lexically resolve `.` and `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve `relative` against `root`.
///
/// Rejects a NUL byte in any representation in either path. With
/// `restrict_to_root`, also rejects any result outside the root.
pub fn sanitize_path(relative: &str, root: &Path, restrict_to_root: bool) -> PilotResult<PathBuf> {
    let root_str = root.to_string_lossy();
    if contains_null(relative) {
        return Err(PilotError::WorkspacePath(format!(
            "embedded null byte in path {relative:?}"
        )));
    }
    if contains_null(&root_str) {
        return Err(PilotError::WorkspacePath(format!(
            "embedded null byte in workspace root {root_str:?}"
        )));
    }

    let root = normalize(root);
    let relative_path = Path::new(relative);
    let full = if relative_path.is_absolute() {
        normalize(relative_path)
    } else {
        normalize(&root.join(relative_path))
    };

    if restrict_to_root && !full.starts_with(&root) {
        return Err(PilotError::WorkspacePath(format!(
            "{relative:?} resolves outside the workspace root {}",
            root.display()
        )));
    }
    Ok(full)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> PathBuf {
        PathBuf::from("/srv/workspace")
    }

    #[test]
    fn resolves_relative_paths() {
        let path = sanitize_path("notes/a.txt", &root(), true).unwrap();
        assert_eq!(path, PathBuf::from("/srv/workspace/notes/a.txt"));

        let path = sanitize_path("./notes/../b.txt", &root(), true).unwrap();
        assert_eq!(path, PathBuf::from("/srv/workspace/b.txt"));
    }

    #[test]
    fn rejects_null_byte_spellings() {
        for bad in ["a\0b", "a%00b", "a\\x00b", "a\\u0000b", "a\\zb"] {
            let err = sanitize_path(bad, &root(), false).unwrap_err();
            assert!(matches!(err, PilotError::WorkspacePath(_)), "{bad:?} accepted");
        }
    }

    #[test]
    fn rejects_null_in_root() {
        let err = sanitize_path("a.txt", Path::new("/srv/work%00space"), true).unwrap_err();
        assert!(err.to_string().contains("workspace root"));
    }

    #[test]
    fn rejects_escape_when_restricted() {
        assert!(sanitize_path("../etc/passwd", &root(), true).is_err());
        assert!(sanitize_path("notes/../../secret", &root(), true).is_err());
        assert!(sanitize_path("/etc/passwd", &root(), true).is_err());
    }

    #[test]
    fn allows_escape_when_unrestricted() {
        let path = sanitize_path("../shared/x", &root(), false).unwrap();
        assert_eq!(path, PathBuf::from("/srv/shared/x"));
        let path = sanitize_path("/etc/hosts", &root(), false).unwrap();
        assert_eq!(path, PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn absolute_path_inside_root_is_allowed() {
        let path = sanitize_path("/srv/workspace/a/./b", &root(), true).unwrap();
        assert_eq!(path, PathBuf::from("/srv/workspace/a/b"));
    }

    #[test]
    fn normalize_keeps_leading_parent_of_relative_root() {
        assert_eq!(normalize(Path::new("../a/./b/..")), PathBuf::from("../a"));
        assert_eq!(normalize(Path::new("/../a")), PathBuf::from("/a"));
    }

    #[test]
    fn settings_default_to_restricted() {
        let settings: WorkspaceSettings = serde_yaml::from_str("root: /tmp/pilot").unwrap();
        assert!(settings.restrict_to_root);
        assert_eq!(settings, WorkspaceSettings::new("/tmp/pilot"));
    }

    #[test]
    fn workspace_is_object_safe() {
        fn _assert_object_safe(_: &dyn Workspace) {}
    }
}
