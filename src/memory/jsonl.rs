use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::error::PilotResult;
use crate::types::Message;

use super::Memory;

/// History persisted as one JSON message per line
pub struct FileMessageHistory {
    path: PathBuf,
}

impl FileMessageHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `{workspace}/memory/messages.jsonl`
    pub fn in_workspace(root: &Path) -> Self {
        Self::new(root.join("memory").join("messages.jsonl"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Memory for FileMessageHistory {
    async fn load(&self) -> PilotResult<Vec<Message>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(Vec::new());
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        let messages = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "skipping corrupt history line");
                    None
                }
            })
            .collect();
        Ok(messages)
    }

    async fn append(&self, message: &Message) -> PilotResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let line = serde_json::to_string(message)? + "\n";
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }
}
