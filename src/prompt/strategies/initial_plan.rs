//! Objective → ordered task list.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::error::PilotResult;
use crate::prompt::{bullet_list, json, numbered_list, ChatPrompt, PromptStrategy};
use crate::task::Task;
use crate::types::{AssistantReply, FunctionSchema, Message, ModelClassification};

const FUNCTION_NAME: &str = "create_initial_agent_plan";

const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert project planner. \
Your responsibility is to create work plans for autonomous agents. \
You will be given a name, a role, set of goals for the agent to accomplish. \
Your job is to break down those goals into a set of tasks that the agent can accomplish to achieve those goals. \
Agents are resourceful, but require clear instructions. \
Each task you create should have clearly defined `ready_criteria` that the agent can check to see if the task is ready to be started. \
Each task should also have clearly defined `acceptance_criteria` that the agent can check to evaluate if the task is complete.";

/// Input to [`InitialPlan`]
#[derive(Debug, Clone, Default)]
pub struct InitialPlanInput {
    pub objective: String,
    /// Ability names or summaries the agent can use
    pub abilities: Vec<String>,
    pub system_info: Vec<String>,
}

/// One task as the model describes it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlannedTask {
    #[serde(default)]
    pub objective: String,
    #[serde(rename = "type", default)]
    pub task_type: String,
    #[serde(default, deserialize_with = "lenient_priority")]
    pub priority: u32,
    #[serde(default)]
    pub ready_criteria: Vec<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
}

impl PlannedTask {
    pub fn into_task(self) -> Task {
        Task::new(self.objective, self.task_type, self.priority)
            .with_ready_criteria(self.ready_criteria)
            .with_acceptance_criteria(self.acceptance_criteria)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitialPlanOutput {
    #[serde(default, deserialize_with = "lenient_task_list")]
    pub task_list: Vec<PlannedTask>,
}

/// Accepts `2`, `2.0` and `"2"`; models are loose with integer types
fn lenient_priority<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    use serde::de::Error;

    let value = Value::deserialize(deserializer)?;
    let number = match &value {
        Value::Number(n) => n.as_u64().or_else(|| whole_number(n.as_f64())),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>().ok().or_else(|| whole_number(s.parse::<f64>().ok()))
        }
        Value::Null => Some(0),
        _ => None,
    };
    number
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| D::Error::custom(format!("invalid task priority: {value}")))
}

fn whole_number(value: Option<f64>) -> Option<u64> {
    value
        .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
        .map(|f| f as u64)
}

/// Decodes entries one at a time so a single malformed task is dropped
/// without losing the rest of the plan
fn lenient_task_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<PlannedTask>, D::Error> {
    let entries = Vec::<Value>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value::<PlannedTask>(entry) {
            Ok(task) => Some(task),
            Err(e) => {
                warn!(index, error = %e, "skipping malformed planned task");
                None
            }
        })
        .collect())
}

/// Asks a smart model to break an objective into tasks
pub struct InitialPlan {
    system_prompt: String,
}

impl InitialPlan {
    pub fn new() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    fn function_schema() -> FunctionSchema {
        FunctionSchema::new(
            FUNCTION_NAME,
            "Creates a set of tasks that forms the initial plan for an autonomous agent.",
            json!({
                "task_list": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "objective": {
                                "type": "string",
                                "description": "An imperative verb phrase that succinctly describes the task."
                            },
                            "type": {
                                "type": "string",
                                "description": "A categorization for the task, e.g. research, write, code."
                            },
                            "priority": {
                                "type": "integer",
                                "description": "A number between 1 and 10 indicating the priority of the task relative to other generated tasks. 1 is the most urgent.",
                                "minimum": 1,
                                "maximum": 10
                            },
                            "ready_criteria": {
                                "type": "array",
                                "items": {"type": "string"},
                                "description": "A list of measurable and testable criteria that must be met for the task to be ready to start."
                            },
                            "acceptance_criteria": {
                                "type": "array",
                                "items": {"type": "string"},
                                "description": "A list of measurable and testable criteria that must be met before the task can be considered complete."
                            }
                        },
                        "required": ["objective", "type", "priority", "ready_criteria", "acceptance_criteria"]
                    }
                }
            }),
            &["task_list".to_string()],
        )
    }
}

impl Default for InitialPlan {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptStrategy for InitialPlan {
    type Input = InitialPlanInput;
    type Output = InitialPlanOutput;

    fn name(&self) -> &'static str {
        "initial_plan"
    }

    fn model_classification(&self) -> ModelClassification {
        ModelClassification::Smart
    }

    fn build_prompt(&self, input: &InitialPlanInput) -> PilotResult<ChatPrompt> {
        let mut system = self.system_prompt.clone();
        if !input.system_info.is_empty() {
            system.push_str("\n\nSystem Info:\n");
            system.push_str(&bullet_list(&input.system_info));
        }

        let mut user = String::from("You are an autonomous agent.\n\n");
        if !input.abilities.is_empty() {
            user.push_str("You have access to the following abilities:\n");
            user.push_str(&numbered_list(&input.abilities));
            user.push_str("\n\n");
        }
        user.push_str(&format!(
            "Your objective is:\n{}\n\nCreate an initial plan by calling `{FUNCTION_NAME}`.",
            input.objective
        ));

        Ok(ChatPrompt::new(vec![Message::system(system), Message::user(user)])
            .with_functions(vec![Self::function_schema()])
            .with_function_call(FUNCTION_NAME))
    }

    fn parse_response_content(&self, reply: &AssistantReply) -> PilotResult<serde_json::Value> {
        Ok(json::reply_payload(reply))
    }
}
