//! Tasks and the priority queue the pilot drains.
//!
//! Priority is an integer where a smaller number means more urgent. The
//! queue keeps tasks sorted by non-increasing priority so the most urgent
//! task is always at the back and [`TaskQueue::pop`] is O(1).
//!
//! ```rust
//! use pilot_core::task::{Task, TaskQueue, TaskStatus};
//!
//! let mut queue = TaskQueue::from_plan(vec![
//!     Task::new("Write report", "write", 2),
//!     Task::new("Gather sources", "research", 1),
//! ]);
//! let next = queue.pop().unwrap();
//! assert_eq!(next.objective, "Gather sources");
//! assert_eq!(next.context.status, TaskStatus::Ready);
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ability::AbilityAction;
use crate::error::{PilotError, PilotResult};

/// Task status progression: backlog → ready → in_progress → done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Backlog,
    Ready,
    InProgress,
    Done,
}

impl TaskStatus {
    /// Symbol for display rendering.
    pub fn symbol(&self) -> &'static str {
        match self {
            TaskStatus::Backlog => "◻",
            TaskStatus::Ready => "▷",
            TaskStatus::InProgress => "◼",
            TaskStatus::Done => "✓",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TaskStatus::Backlog => "backlog",
            TaskStatus::Ready => "ready",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        };
        write!(f, "{label}")
    }
}

/// Mutable execution state of a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskContext {
    pub status: TaskStatus,
    #[serde(default)]
    cycle_count: u32,
    #[serde(default)]
    pub enough_info: bool,
    #[serde(default)]
    pub prior_actions: Vec<AbilityAction>,
    #[serde(default)]
    pub user_input: Vec<String>,
    #[serde(default)]
    pub supplementary_info: Vec<String>,
}

impl TaskContext {
    pub fn cycle_count(&self) -> u32 {
        self.cycle_count
    }

    /// Count one pilot cycle spent on this task
    pub fn increment_cycle(&mut self) -> u32 {
        self.cycle_count += 1;
        self.cycle_count
    }

    pub fn record_action(&mut self, action: AbilityAction) {
        self.prior_actions.push(action);
    }

    pub fn record_user_input(&mut self, input: impl Into<String>) {
        self.user_input.push(input.into());
    }
}

/// A unit of work produced by the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub objective: String,
    /// Free-text category assigned by the planner
    #[serde(rename = "type")]
    pub task_type: String,
    /// Smaller is more urgent
    pub priority: u32,
    #[serde(default)]
    pub ready_criteria: Vec<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub context: TaskContext,
}

impl Task {
    pub fn new(objective: impl Into<String>, task_type: impl Into<String>, priority: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            objective: objective.into(),
            task_type: task_type.into(),
            priority,
            ready_criteria: Vec::new(),
            acceptance_criteria: Vec::new(),
            context: TaskContext::default(),
        }
    }

    pub fn with_ready_criteria(mut self, criteria: Vec<String>) -> Self {
        self.ready_criteria = criteria;
        self
    }

    pub fn with_acceptance_criteria(mut self, criteria: Vec<String>) -> Self {
        self.acceptance_criteria = criteria;
        self
    }

    pub fn status(&self) -> TaskStatus {
        self.context.status
    }

    pub fn is_done(&self) -> bool {
        self.context.status.is_terminal()
    }

    /// One-line rendering for operator display
    pub fn render_line(&self) -> String {
        format!(
            "{} [p{}] {} ({}, {} cycles)",
            self.context.status.symbol(),
            self.priority,
            self.objective,
            self.task_type,
            self.context.cycle_count
        )
    }
}

/// Pending tasks ordered by non-increasing priority; the back is next.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskQueue {
    tasks: Vec<Task>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a fresh plan. The most urgent task becomes ready, the rest
    /// stay in the backlog.
    pub fn from_plan(tasks: Vec<Task>) -> Self {
        let mut queue = Self { tasks };
        for task in &mut queue.tasks {
            task.context.status = TaskStatus::Backlog;
        }
        queue.sort();
        queue.promote_next();
        queue
    }

    /// Move the next task out of the backlog. Returns whether it changed.
    pub fn promote_next(&mut self) -> bool {
        match self.tasks.last_mut() {
            Some(next) if next.context.status == TaskStatus::Backlog => {
                next.context.status = TaskStatus::Ready;
                true
            }
            _ => false,
        }
    }

    fn sort(&mut self) {
        // Stable: equal priorities keep insertion order
        self.tasks.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Re-enqueue a task. Done tasks are refused.
    pub fn push(&mut self, task: Task) -> PilotResult<()> {
        if task.is_done() {
            return Err(PilotError::TaskAlreadyDone { task_id: task.id });
        }
        self.tasks.push(task);
        self.sort();
        self.promote_next();
        Ok(())
    }

    /// Remove the most urgent task
    pub fn pop(&mut self) -> Option<Task> {
        self.tasks.pop()
    }

    pub fn peek(&self) -> Option<&Task> {
        self.tasks.last()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks from most to least urgent
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().rev()
    }

    pub fn render(&self) -> String {
        if self.tasks.is_empty() {
            return "(no pending tasks)".to_string();
        }
        self.iter().map(Task::render_line).collect::<Vec<_>>().join("\n")
    }
}
