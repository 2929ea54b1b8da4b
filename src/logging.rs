//! Log files under `{workspace}/logs/`: `debug.log` receives tracing output
//! and `cycles.jsonl` one record per pilot cycle.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use crate::error::{PilotError, PilotResult};
use crate::pilot::CycleOutcome;
use crate::task::TaskStatus;

/// Filter used when `RUST_LOG` is unset or invalid
pub const DEFAULT_FILTER: &str = "pilot_core=info";

pub const DEBUG_LOG: &str = "debug.log";
pub const CYCLE_LOG: &str = "cycles.jsonl";

/// Install a global fmt subscriber writing to `{log_dir}/debug.log`.
///
/// Fails if a global subscriber is already set.
pub fn init_tracing(log_dir: &Path) -> PilotResult<()> {
    std::fs::create_dir_all(log_dir)?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(DEBUG_LOG))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| PilotError::Settings(format!("tracing already initialized: {e}")))?;

    tracing::info!(log_dir = %log_dir.display(), "tracing initialized");
    Ok(())
}

/// What happened in one pilot cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub cycle: u64,
    pub timestamp: DateTime<Utc>,
    pub task_id: String,
    pub objective: String,
    /// Cycles spent on the task, this one included
    pub task_cycle_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<CycleOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CycleRecord {
    pub fn new(cycle: u64, task_id: impl Into<String>, objective: impl Into<String>) -> Self {
        Self {
            cycle,
            timestamp: Utc::now(),
            task_id: task_id.into(),
            objective: objective.into(),
            task_cycle_count: 0,
            ability: None,
            success: None,
            task_status: None,
            outcome: None,
            error: None,
        }
    }
}

/// Append-only JSONL log of [`CycleRecord`]s
pub struct CycleLog {
    path: PathBuf,
}

impl CycleLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `{log_dir}/cycles.jsonl`
    pub fn in_dir(log_dir: &Path) -> Self {
        Self::new(log_dir.join(CYCLE_LOG))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, record: &CycleRecord) -> PilotResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let line = serde_json::to_string(record)? + "\n";
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }

    /// Every record written so far; unreadable lines are skipped
    pub async fn read_all(&self) -> PilotResult<Vec<CycleRecord>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(Vec::new());
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cycle_log_appends_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let log = CycleLog::in_dir(&dir.path().join("logs"));

        let mut first = CycleRecord::new(1, "t1", "Summarize X");
        first.ability = Some("text_summarize".into());
        first.success = Some(true);
        first.task_status = Some(TaskStatus::Done);
        first.outcome = Some(CycleOutcome::Completed);
        log.append(&first).await.unwrap();

        let mut second = CycleRecord::new(2, "t2", "Publish");
        second.error = Some("Ability not found: publish".into());
        log.append(&second).await.unwrap();

        let raw = tokio::fs::read_to_string(log.path()).await.unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert!(raw.lines().next().unwrap().contains(r#""outcome":"completed""#));

        let records = log.read_all().await.unwrap();
        assert_eq!(records, vec![first, second]);
    }

    #[tokio::test]
    async fn read_missing_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = CycleLog::in_dir(dir.path());
        assert!(log.read_all().await.unwrap().is_empty());
    }

    #[test]
    fn init_tracing_creates_debug_log() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        // Another test may already own the global subscriber
        let _ = init_tracing(&logs);
        assert!(logs.join(DEBUG_LOG).exists());
    }
}
