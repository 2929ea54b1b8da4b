//! In-memory workspace for tests and sandboxed runs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{PilotError, PilotResult};

use super::Workspace;

/// Files kept in a `BTreeMap` keyed by resolved path
pub struct MemoryWorkspace {
    root: PathBuf,
    files: RwLock<BTreeMap<PathBuf, String>>,
}

impl MemoryWorkspace {
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("/workspace"),
            files: RwLock::new(BTreeMap::new()),
        }
    }

    /// Paths of every stored file, relative to the root
    pub async fn files(&self) -> Vec<String> {
        self.files
            .read()
            .await
            .keys()
            .filter_map(|p| p.strip_prefix(&self.root).ok())
            .map(|p| p.to_string_lossy().into_owned())
            .collect()
    }
}

impl Default for MemoryWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Workspace for MemoryWorkspace {
    fn root(&self) -> &Path {
        &self.root
    }

    fn restrict_to_root(&self) -> bool {
        true
    }

    async fn read_text(&self, relative: &str) -> PilotResult<String> {
        let full = self.get_path(relative)?;
        self.files.read().await.get(&full).cloned().ok_or_else(|| {
            PilotError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("file not found: {relative}"),
            ))
        })
    }

    async fn write_text(&self, relative: &str, contents: &str) -> PilotResult<()> {
        let full = self.get_path(relative)?;
        self.files.write().await.insert(full, contents.to_string());
        Ok(())
    }

    async fn exists(&self, relative: &str) -> PilotResult<bool> {
        let full = self.get_path(relative)?;
        Ok(self.files.read().await.contains_key(&full))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_read_overwrite() {
        let ws = MemoryWorkspace::new();
        ws.write_text("a.txt", "one").await.unwrap();
        ws.write_text("./a.txt", "two").await.unwrap();
        assert_eq!(ws.read_text("a.txt").await.unwrap(), "two");
        assert_eq!(ws.files().await, vec!["a.txt"]);
    }

    #[tokio::test]
    async fn missing_file() {
        let ws = MemoryWorkspace::new();
        assert!(!ws.exists("x").await.unwrap());
        assert!(matches!(ws.read_text("x").await, Err(PilotError::Io(_))));
    }

    #[tokio::test]
    async fn sanitizer_applies() {
        let ws = MemoryWorkspace::new();
        assert!(matches!(
            ws.write_text("../escape", "x").await,
            Err(PilotError::WorkspacePath(_))
        ));
        assert!(matches!(
            ws.read_text("a%00.txt").await,
            Err(PilotError::WorkspacePath(_))
        ));
    }
}
