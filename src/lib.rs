//! # pilot-core
//!
//! Task/ability orchestration core for LLM-driven agents. Given an objective
//! it plans an ordered set of tasks, picks and invokes pluggable abilities to
//! make progress on each, and tracks the cost of every model call against a
//! per-provider budget.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pilot_core::pilot::{Pilot, ScriptedInteraction};
//! use pilot_core::settings::PilotSettings;
//!
//! # async fn demo() -> pilot_core::PilotResult<()> {
//! let settings = PilotSettings::load(std::path::Path::new("/srv/agent")).await?;
//! let mut pilot = Pilot::from_settings(&settings, Arc::new(ScriptedInteraction::unattended()))?;
//!
//! pilot.plan("summarize topic X").await?;
//! let report = pilot.run().await?;
//! println!("{} done, {} failed, ${:.4} spent",
//!     report.completed.len(), report.failures.len(), report.total_cost());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`types`] | Core types: `Message`, `ContentItem`, `FunctionSchema`, `ModelInfo`, `ProviderKind` |
//! | [`context`] | Append-only message log that ability results fold into |
//! | [`cost`] | Provider budgets, per-model pricing catalog, async budget tracker |
//! | [`provider`] | `ModelProvider` trait, OpenAI / Anthropic / Ollama backends, retry with backoff |
//! | [`prompt`] | `PromptStrategy` trait, JSON recovery chain, built-in strategies |
//! | [`task`] | `Task`, status machine, priority queue |
//! | [`ability`] | `Ability` trait, registry with typed resource injection, built-in abilities |
//! | [`planner`] | Objective → tasks, task → next ability |
//! | [`pilot`] | The plan → select → execute → update loop |
//! | [`workspace`] | Sandboxed file access with path sanitizing |
//! | [`memory`] | Message history per workspace |
//! | [`settings`] | YAML settings persisted in the workspace |
//! | [`logging`] | Tracing setup and the JSONL cycle log |
//! | [`error`] | Error types with thiserror; `is_transient` drives retries |

pub mod ability;
pub mod context;
pub mod cost;
pub mod error;
pub mod logging;
pub mod memory;
pub mod pilot;
pub mod planner;
pub mod prompt;
pub mod provider;
pub mod settings;
pub mod task;
pub mod types;
pub mod workspace;

pub use error::{PilotError, PilotResult};
pub use types::*;
