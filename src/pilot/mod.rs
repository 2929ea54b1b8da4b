//! Pilot: the plan → select → execute → update loop.
//!
//! A pilot owns its task queue and running [`Context`]. Each call to
//! [`Pilot::step`] processes one task for one cycle; [`Pilot::run`] steps
//! until the queue is empty.
//!
//! Fatal conditions for a single task (cycle limit, insufficient info) are
//! reported as [`TaskFailure`]s and never silently dropped.

mod interaction;

pub use interaction::{ScriptedInteraction, UserInteraction, UserReply};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::ability::{AbilityAction, AbilityRegistry};
use crate::context::Context;
use crate::cost::ProviderBudget;
use crate::error::{PilotError, PilotResult};
use crate::logging::{CycleLog, CycleRecord};
use crate::memory::Memory;
use crate::planner::Planner;
use crate::prompt::AbilityChoice;
use crate::task::{Task, TaskQueue, TaskStatus};
use crate::types::{ContentItem, Message, ProviderKind};

// ─── Configuration ──────────────────────────────────────────────────────────

/// How provider and dispatch errors are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Abort the run on the first error
    #[default]
    SingleRun,
    /// Record the error in the context, fail the task and keep going
    BestEffort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PilotConfig {
    #[serde(default = "default_max_task_cycle_count")]
    pub max_task_cycle_count: u32,
    #[serde(default)]
    pub mode: ExecutionMode,
}

fn default_max_task_cycle_count() -> u32 {
    3
}

impl PilotConfig {
    pub fn new() -> Self {
        Self {
            max_task_cycle_count: default_max_task_cycle_count(),
            mode: ExecutionMode::default(),
        }
    }

    pub fn with_max_task_cycle_count(mut self, count: u32) -> Self {
        self.max_task_cycle_count = count;
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ─── State & Outcomes ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PilotState {
    Initialized,
    Planned,
    Selecting,
    Executing,
    AwaitingClarification,
    Done,
    Aborted,
}

impl PilotState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PilotState::Done | PilotState::Aborted)
    }
}

/// Result of one [`Pilot::step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// The task reached `Done` and moved to the completed set
    Completed,
    /// The task needs more cycles and went back on the queue
    Requeued,
    /// The user answered a question; the task went back on the queue
    Clarified,
    /// The model gave no usable choice; the task went back on the queue
    NoChoice,
    /// The task was reported as a [`TaskFailure`]
    Failed,
    /// The queue was empty
    Idle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    CycleLimitExceeded { cycles: u32, limit: u32 },
    /// The task is in progress but lacks the information to act
    InsufficientInfo,
    /// A provider or dispatch error in best-effort mode
    Errored { message: String },
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::CycleLimitExceeded { cycles, limit } => {
                write!(f, "cycle limit exceeded ({cycles}/{limit})")
            }
            FailureReason::InsufficientInfo => write!(f, "insufficient information to act"),
            FailureReason::Errored { message } => write!(f, "errored: {message}"),
        }
    }
}

/// A task the pilot gave up on, with the reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub task: Task,
    pub reason: FailureReason,
}

/// Final accounting of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub completed: Vec<Task>,
    pub failures: Vec<TaskFailure>,
    pub budgets: Vec<(ProviderKind, ProviderBudget)>,
    pub cycles: u64,
}

impl RunReport {
    pub fn total_cost(&self) -> f64 {
        self.budgets.iter().map(|(_, b)| b.total_cost).sum()
    }
}

/// Progress notifications, for UIs and tests
#[derive(Debug, Clone, PartialEq)]
pub enum PilotEvent {
    Planned { tasks: usize },
    CycleStart { cycle: u64, task_id: String, objective: String },
    AbilityPerformed { cycle: u64, action: AbilityAction },
    ClarificationRequested { question: String },
    TaskCompleted { task_id: String },
    TaskFailed { task_id: String, reason: FailureReason },
    Done,
}

// ─── Pilot ──────────────────────────────────────────────────────────────────

pub struct Pilot {
    config: PilotConfig,
    planner: Planner,
    abilities: Arc<AbilityRegistry>,
    interaction: Arc<dyn UserInteraction>,
    memory: Option<Arc<dyn Memory>>,
    cycle_log: Option<CycleLog>,
    events: Option<mpsc::UnboundedSender<PilotEvent>>,
    state: PilotState,
    queue: TaskQueue,
    completed: Vec<Task>,
    failures: Vec<TaskFailure>,
    context: Context,
    cycle: u64,
}

impl Pilot {
    pub fn new(
        config: PilotConfig,
        planner: Planner,
        abilities: Arc<AbilityRegistry>,
        interaction: Arc<dyn UserInteraction>,
    ) -> Self {
        Self {
            config,
            planner,
            abilities,
            interaction,
            memory: None,
            cycle_log: None,
            events: None,
            state: PilotState::Initialized,
            queue: TaskQueue::new(),
            completed: Vec::new(),
            failures: Vec::new(),
            context: Context::new(),
            cycle: 0,
        }
    }

    /// Persist the objective and every action into `memory`
    pub fn with_memory(mut self, memory: Arc<dyn Memory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_cycle_log(mut self, log: CycleLog) -> Self {
        self.cycle_log = Some(log);
        self
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<PilotEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> PilotState {
        self.state
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn completed(&self) -> &[Task] {
        &self.completed
    }

    pub fn failures(&self) -> &[TaskFailure] {
        &self.failures
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    fn emit(&self, event: PilotEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    async fn remember(&self, message: &Message) {
        if let Some(memory) = &self.memory {
            if let Err(e) = memory.append(message).await {
                warn!(error = %e, "failed to append to memory");
            }
        }
    }

    /// Ask the planner for tasks and queue them
    pub async fn plan(&mut self, objective: &str) -> PilotResult<()> {
        let abilities = self.abilities.list_abilities();
        let planned = self.planner.plan(objective, &abilities).await;
        let tasks = match planned {
            Ok(tasks) => tasks,
            Err(e) => {
                self.state = PilotState::Aborted;
                return Err(e);
            }
        };

        let message = Message::user(objective);
        self.remember(&message).await;
        self.context.add_message(message);
        self.load_plan(tasks);
        Ok(())
    }

    /// Queue tasks planned elsewhere
    pub fn load_plan(&mut self, tasks: Vec<Task>) {
        self.queue = TaskQueue::from_plan(tasks);
        self.state = PilotState::Planned;
        info!(tasks = self.queue.len(), "plan loaded");
        self.emit(PilotEvent::Planned {
            tasks: self.queue.len(),
        });
    }

    /// Queue a task as-is, e.g. one carried over from an earlier run.
    /// Done tasks are refused.
    pub fn enqueue(&mut self, task: Task) -> PilotResult<()> {
        self.queue.push(task)?;
        if self.state == PilotState::Initialized || self.state == PilotState::Done {
            self.state = PilotState::Planned;
        }
        Ok(())
    }

    /// Step until the queue is empty
    pub async fn run(&mut self) -> PilotResult<RunReport> {
        if self.state == PilotState::Initialized {
            return Err(PilotError::Aborted("run started before a plan was loaded".into()));
        }
        while self.step().await? != CycleOutcome::Idle {}
        Ok(self.report().await)
    }

    pub async fn report(&self) -> RunReport {
        RunReport {
            completed: self.completed.clone(),
            failures: self.failures.clone(),
            budgets: self.planner.providers().budgets().await,
            cycles: self.cycle,
        }
    }

    /// Process the most urgent task for one cycle
    pub async fn step(&mut self) -> PilotResult<CycleOutcome> {
        if self.state == PilotState::Aborted {
            return Err(PilotError::Aborted("pilot was aborted".into()));
        }
        let Some(task) = self.queue.pop() else {
            if self.state != PilotState::Done {
                info!(
                    completed = self.completed.len(),
                    failed = self.failures.len(),
                    "task queue drained"
                );
                self.emit(PilotEvent::Done);
            }
            self.state = PilotState::Done;
            return Ok(CycleOutcome::Idle);
        };

        self.cycle += 1;
        let mut record = CycleRecord::new(self.cycle, task.id.clone(), task.objective.clone());
        self.emit(PilotEvent::CycleStart {
            cycle: self.cycle,
            task_id: task.id.clone(),
            objective: task.objective.clone(),
        });

        let result = self.cycle_body(task, &mut record).await;
        match &result {
            Ok(outcome) => record.outcome = Some(*outcome),
            Err(e) => record.error = Some(e.to_string()),
        }
        info!(
            cycle = self.cycle,
            task = %record.objective,
            ability = record.ability.as_deref().unwrap_or("-"),
            outcome = ?record.outcome,
            "cycle finished"
        );
        if let Some(log) = &self.cycle_log {
            if let Err(e) = log.append(&record).await {
                warn!(error = %e, "failed to write cycle log");
            }
        }
        result
    }

    async fn cycle_body(&mut self, mut task: Task, record: &mut CycleRecord) -> PilotResult<CycleOutcome> {
        self.state = PilotState::Selecting;
        let limit = self.config.max_task_cycle_count;

        if task.context.cycle_count() >= limit {
            let cycles = task.context.cycle_count();
            record.task_cycle_count = cycles;
            return Ok(self.fail(task, FailureReason::CycleLimitExceeded { cycles, limit }));
        }

        if task.status() == TaskStatus::InProgress {
            if !task.context.enough_info {
                record.task_cycle_count = task.context.cycle_count();
                return Ok(self.fail(task, FailureReason::InsufficientInfo));
            }
        } else {
            task.context.status = TaskStatus::InProgress;
            task.context.enough_info = true;
        }

        record.task_cycle_count = task.context.increment_cycle();

        let schemas = self.abilities.dump_abilities();
        let next = self.planner.next(&task, &schemas).await;
        let choice = match next {
            Ok(choice) => choice,
            Err(e) => return self.handle_error(task, e),
        };

        if choice.is_empty() {
            warn!(task = %task.objective, "no actionable choice in model reply");
            self.requeue(task)?;
            return Ok(CycleOutcome::NoChoice);
        }
        record.ability = Some(choice.next_ability.clone());

        if choice.is_clarification() {
            return self.clarify(task, &choice).await;
        }

        self.state = PilotState::Executing;
        let performed = self
            .abilities
            .perform(&choice.next_ability, choice.arguments())
            .await;
        let action = match performed {
            Ok(action) => action,
            Err(e) => return self.handle_error(task, e),
        };
        record.success = Some(action.success);

        let message = action.to_message();
        self.remember(&message).await;
        self.context.add_message(message);
        self.emit(PilotEvent::AbilityPerformed {
            cycle: self.cycle,
            action: action.clone(),
        });

        // A failed ability never completes a task
        let status = match choice.task_status {
            Some(TaskStatus::Done) if action.success => TaskStatus::Done,
            _ => TaskStatus::InProgress,
        };
        task.context.record_action(action);
        task.context.status = status;
        record.task_status = Some(status);
        self.state = PilotState::Selecting;

        if status == TaskStatus::Done {
            info!(task = %task.objective, cycles = task.context.cycle_count(), "task completed");
            self.emit(PilotEvent::TaskCompleted {
                task_id: task.id.clone(),
            });
            self.completed.push(task);
            self.queue.promote_next();
            Ok(CycleOutcome::Completed)
        } else {
            self.requeue(task)?;
            Ok(CycleOutcome::Requeued)
        }
    }

    async fn clarify(&mut self, mut task: Task, choice: &AbilityChoice) -> PilotResult<CycleOutcome> {
        self.state = PilotState::AwaitingClarification;
        let question = choice
            .question()
            .unwrap_or("Can you provide more information about this task?")
            .to_string();
        self.emit(PilotEvent::ClarificationRequested {
            question: question.clone(),
        });

        let asked = self.interaction.ask(&question).await;
        let reply = match asked {
            Ok(reply) => reply,
            Err(e) => {
                self.state = PilotState::Aborted;
                self.requeue(task)?;
                return Err(e);
            }
        };

        match reply {
            UserReply::Answer(answer) => {
                self.context.add_message(Message::assistant(question));
                let message = Message::user(answer.clone());
                self.remember(&message).await;
                self.context.add_message(message);
                task.context.record_user_input(answer);
                self.requeue(task)?;
                self.state = PilotState::Selecting;
                Ok(CycleOutcome::Clarified)
            }
            UserReply::Exit => {
                info!(task = %task.objective, "user exited");
                self.state = PilotState::Aborted;
                self.requeue(task)?;
                Err(PilotError::Aborted("user exited".into()))
            }
        }
    }

    fn requeue(&mut self, task: Task) -> PilotResult<()> {
        self.queue.push(task)
    }

    fn fail(&mut self, task: Task, reason: FailureReason) -> CycleOutcome {
        warn!(task = %task.objective, reason = %reason, "task failed");
        self.emit(PilotEvent::TaskFailed {
            task_id: task.id.clone(),
            reason: reason.clone(),
        });
        self.failures.push(TaskFailure { task, reason });
        self.queue.promote_next();
        CycleOutcome::Failed
    }

    fn handle_error(&mut self, task: Task, error: PilotError) -> PilotResult<CycleOutcome> {
        let reason = FailureReason::Errored {
            message: error.to_string(),
        };
        match self.config.mode {
            ExecutionMode::SingleRun => {
                self.state = PilotState::Aborted;
                self.fail(task, reason);
                Err(error)
            }
            ExecutionMode::BestEffort => {
                self.context.add_message(
                    Message::ability(format!("Error while working on \"{}\"", task.objective))
                        .with_item(ContentItem::object(json!({
                            "task_id": task.id.clone(),
                            "error": error.to_string(),
                            "transient": error.is_transient(),
                        }))),
                );
                self.state = PilotState::Selecting;
                Ok(self.fail(task, reason))
            }
        }
    }
}

// ─── Bootstrap ──────────────────────────────────────────────────────────────

#[cfg(feature = "native")]
impl Pilot {
    /// Wire providers, workspace, memory, abilities, planner and cycle log
    /// from persisted settings.
    pub fn from_settings(
        settings: &crate::settings::PilotSettings,
        interaction: Arc<dyn UserInteraction>,
    ) -> PilotResult<Self> {
        use crate::ability::{default_factories, AbilityResources};
        use crate::memory::FileMessageHistory;
        use crate::provider::ProviderRegistry;
        use crate::workspace::LocalWorkspace;

        let providers = ProviderRegistry::from_settings(&settings.providers)?;
        let workspace = Arc::new(LocalWorkspace::from_settings(&settings.workspace));
        let memory: Arc<dyn Memory> =
            Arc::new(FileMessageHistory::in_workspace(&settings.workspace.root));

        let resources = AbilityResources::new(providers.clone())
            .with_memory(memory.clone())
            .with_workspace(workspace);
        let abilities = AbilityRegistry::build(&settings.abilities, &resources, &default_factories())?;
        let planner = Planner::new(settings.planner.clone(), providers);

        Ok(Self::new(settings.pilot.clone(), planner, Arc::new(abilities), interaction)
            .with_memory(memory)
            .with_cycle_log(CycleLog::in_dir(&settings.log_dir())))
    }
}
