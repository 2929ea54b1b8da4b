//! Workspace on the native filesystem, using `tokio::fs`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{PilotError, PilotResult};

use super::{Workspace, WorkspaceSettings};

/// A real directory on disk
pub struct LocalWorkspace {
    root: PathBuf,
    restrict_to_root: bool,
}

impl LocalWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            restrict_to_root: true,
        }
    }

    pub fn from_settings(settings: &WorkspaceSettings) -> Self {
        Self {
            root: settings.root.clone(),
            restrict_to_root: settings.restrict_to_root,
        }
    }

    pub fn unrestricted(mut self) -> Self {
        self.restrict_to_root = false;
        self
    }

    /// [`Workspace::get_path`], then follow symlinks in the deepest existing
    /// ancestor so a link inside the root cannot lead outside it
    async fn resolve(&self, relative: &str) -> PilotResult<PathBuf> {
        let full = self.get_path(relative)?;
        if !self.restrict_to_root {
            return Ok(full);
        }
        let root = match tokio::fs::canonicalize(&self.root).await {
            Ok(root) => root,
            // Nothing on disk yet, so there is no link to follow
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(full),
            Err(e) => return Err(e.into()),
        };

        let mut ancestor: &Path = &full;
        let real = loop {
            match tokio::fs::canonicalize(ancestor).await {
                Ok(real) => break real,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    if tokio::fs::symlink_metadata(ancestor).await.is_ok() {
                        return Err(self.escape_error(relative));
                    }
                    match ancestor.parent() {
                        Some(parent) => ancestor = parent,
                        None => return Ok(full),
                    }
                }
                Err(e) => return Err(e.into()),
            }
        };

        if !real.starts_with(&root) {
            return Err(self.escape_error(relative));
        }
        Ok(full)
    }

    fn escape_error(&self, relative: &str) -> PilotError {
        PilotError::WorkspacePath(format!(
            "{relative:?} follows a link outside the workspace root {}",
            self.root.display()
        ))
    }
}

#[async_trait]
impl Workspace for LocalWorkspace {
    fn root(&self) -> &Path {
        &self.root
    }

    fn restrict_to_root(&self) -> bool {
        self.restrict_to_root
    }

    async fn read_text(&self, relative: &str) -> PilotResult<String> {
        let full = self.resolve(relative).await?;
        Ok(tokio::fs::read_to_string(&full).await?)
    }

    async fn write_text(&self, relative: &str, contents: &str) -> PilotResult<()> {
        let full = self.resolve(relative).await?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, contents).await?;
        Ok(())
    }

    async fn exists(&self, relative: &str) -> PilotResult<bool> {
        let full = self.resolve(relative).await?;
        Ok(tokio::fs::try_exists(&full).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let ws = LocalWorkspace::new(dir.path());

        ws.write_text("notes/today.md", "# Today").await.unwrap();
        assert!(ws.exists("notes/today.md").await.unwrap());
        assert_eq!(ws.read_text("notes/today.md").await.unwrap(), "# Today");
        assert!(dir.path().join("notes/today.md").is_file());
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let ws = LocalWorkspace::new(dir.path());
        assert!(!ws.exists("nope.txt").await.unwrap());
        assert!(matches!(ws.read_text("nope.txt").await, Err(PilotError::Io(_))));
    }

    #[tokio::test]
    async fn escape_is_rejected_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let ws = LocalWorkspace::new(dir.path().join("inner"));
        let err = ws.write_text("../outside.txt", "x").await.unwrap_err();
        assert!(matches!(err, PilotError::WorkspacePath(_)));
        assert!(!dir.path().join("outside.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_out_of_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("ws");
        let outside = dir.path().join("outside");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir_all(&outside).unwrap();
        std::fs::write(outside.join("secret.txt"), "secret").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("escape")).unwrap();
        std::os::unix::fs::symlink(outside.join("gone.txt"), root.join("dangling")).unwrap();

        let ws = LocalWorkspace::new(&root);
        let err = ws.read_text("escape/secret.txt").await.unwrap_err();
        assert!(matches!(err, PilotError::WorkspacePath(_)));
        let err = ws.write_text("escape/new.txt", "x").await.unwrap_err();
        assert!(matches!(err, PilotError::WorkspacePath(_)));
        assert!(!outside.join("new.txt").exists());
        let err = ws.write_text("dangling", "x").await.unwrap_err();
        assert!(matches!(err, PilotError::WorkspacePath(_)));
        assert!(!outside.join("gone.txt").exists());

        // Links that stay inside the root still work
        std::fs::create_dir_all(root.join("real")).unwrap();
        std::os::unix::fs::symlink(root.join("real"), root.join("alias")).unwrap();
        ws.write_text("alias/ok.txt", "fine").await.unwrap();
        assert_eq!(ws.read_text("real/ok.txt").await.unwrap(), "fine");

        let unrestricted = LocalWorkspace::new(&root).unrestricted();
        assert_eq!(unrestricted.read_text("escape/secret.txt").await.unwrap(), "secret");
    }

    #[test]
    fn from_settings_copies_restriction() {
        let mut settings = WorkspaceSettings::new("/tmp/pilot");
        settings.restrict_to_root = false;
        let ws = LocalWorkspace::from_settings(&settings);
        assert!(!ws.restrict_to_root());
        assert_eq!(ws.root(), Path::new("/tmp/pilot"));
    }
}
