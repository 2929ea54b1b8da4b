//! Task → the next ability to invoke, with its arguments and rationale.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::PilotResult;
use crate::prompt::{bullet_list, json, ChatPrompt, PromptStrategy};
use crate::task::{Task, TaskStatus};
use crate::types::{AssistantReply, FunctionSchema, Message, ModelClassification};

/// Built-in function the model calls to ask the user a question
pub const ASK_USER_FUNCTION: &str = "ask_user";

const SYSTEM_PROMPT: &str = "Answer in the provided format. \
Your decisions must always be made independently without seeking user assistance, \
unless you have no way to make progress without information only the user has. \
Play to your strengths as an LLM and pursue simple strategies with no legal complications.";

/// Arguments added to every ability so the model explains its choice
const META_ARGUMENTS: [&str; 4] = ["motivation", "self_criticism", "reasoning", "task_status"];

#[derive(Debug, Clone)]
pub struct NextAbilityInput {
    pub task: Task,
    pub abilities: Vec<FunctionSchema>,
}

/// The model's decision for one cycle.
///
/// An empty `next_ability` means the reply held no usable choice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbilityChoice {
    #[serde(default)]
    pub next_ability: String,
    #[serde(default)]
    pub ability_arguments: Value,
    #[serde(default)]
    pub motivation: String,
    #[serde(default)]
    pub self_criticism: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub task_status: Option<TaskStatus>,
}

impl AbilityChoice {
    pub fn is_empty(&self) -> bool {
        self.next_ability.is_empty()
    }

    pub fn is_clarification(&self) -> bool {
        self.next_ability == ASK_USER_FUNCTION
    }

    /// Question for the user, when this is a clarification
    pub fn question(&self) -> Option<&str> {
        if !self.is_clarification() {
            return None;
        }
        self.ability_arguments.get("question").and_then(|q| q.as_str())
    }

    /// Arguments as an object; anything else becomes `{}`
    pub fn arguments(&self) -> Value {
        match &self.ability_arguments {
            Value::Object(_) => self.ability_arguments.clone(),
            _ => Value::Object(Map::new()),
        }
    }
}

/// Chooses the next ability for a task
#[derive(Debug, Clone, Copy, Default)]
pub struct NextAbility;

impl NextAbility {
    fn augment(schema: &FunctionSchema) -> FunctionSchema {
        let mut schema = schema.clone();
        let params = &mut schema.parameters;
        if !params.get("properties").is_some_and(Value::is_object) {
            params["properties"] = json!({});
        }
        params["properties"]["motivation"] = json!({
            "type": "string",
            "description": "Your justification for choosing this ability instead of a different one."
        });
        params["properties"]["self_criticism"] = json!({
            "type": "string",
            "description": "Thoughtful self-criticism that explains why this ability may not be the best choice."
        });
        params["properties"]["reasoning"] = json!({
            "type": "string",
            "description": "Your reasoning for choosing this ability taking into account the motivation and weighing the self-criticism."
        });
        params["properties"]["task_status"] = json!({
            "type": "string",
            "enum": ["in_progress", "done"],
            "description": "`done` if this call will satisfy every acceptance criterion of the task, otherwise `in_progress`."
        });

        let mut required: Vec<Value> = params
            .get("required")
            .and_then(|r| r.as_array())
            .cloned()
            .unwrap_or_default();
        for meta in META_ARGUMENTS {
            if !required.iter().any(|r| r == meta) {
                required.push(json!(meta));
            }
        }
        params["required"] = Value::Array(required);
        schema
    }

    fn ask_user_schema() -> FunctionSchema {
        FunctionSchema::new(
            ASK_USER_FUNCTION,
            "Ask the user a clarifying question. Use only when the task cannot progress without it.",
            json!({
                "question": {
                    "type": "string",
                    "description": "The question to ask the user."
                }
            }),
            &["question".to_string()],
        )
    }

    fn render_task(task: &Task) -> String {
        let mut out = format!(
            "Your current task is \"{}\".\nIt has taken {} cycles so far.\n",
            task.objective,
            task.context.cycle_count()
        );
        if !task.acceptance_criteria.is_empty() {
            out.push_str("\nThe task is complete when:\n");
            out.push_str(&bullet_list(&task.acceptance_criteria));
            out.push('\n');
        }
        if !task.context.prior_actions.is_empty() {
            let actions: Vec<String> = task
                .context
                .prior_actions
                .iter()
                .map(|a| a.summary())
                .collect();
            out.push_str("\nYou have taken the following actions on this task:\n");
            out.push_str(&bullet_list(&actions));
            out.push('\n');
        }
        if !task.context.user_input.is_empty() {
            out.push_str("\nThe user has provided the following information:\n");
            out.push_str(&bullet_list(&task.context.user_input));
            out.push('\n');
        }
        if !task.context.supplementary_info.is_empty() {
            out.push_str("\nAdditional information:\n");
            out.push_str(&bullet_list(&task.context.supplementary_info));
            out.push('\n');
        }
        out
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> String {
    match map.remove(key) {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Lenient mapping of a reported status
fn normalize_status(raw: &str) -> &'static str {
    match raw.trim().to_ascii_lowercase().as_str() {
        "done" | "complete" | "completed" => "done",
        _ => "in_progress",
    }
}

impl PromptStrategy for NextAbility {
    type Input = NextAbilityInput;
    type Output = AbilityChoice;

    fn name(&self) -> &'static str {
        "next_ability"
    }

    fn model_classification(&self) -> ModelClassification {
        ModelClassification::Fast
    }

    fn build_prompt(&self, input: &NextAbilityInput) -> PilotResult<ChatPrompt> {
        let mut functions: Vec<FunctionSchema> = input.abilities.iter().map(Self::augment).collect();
        functions.push(Self::ask_user_schema());

        let listing: Vec<String> = functions.iter().map(|f| f.summary()).collect();
        let user = format!(
            "{}\nYou have access to the following abilities:\n{}\n\n\
             Select the next ability to use and provide its arguments.",
            Self::render_task(&input.task),
            bullet_list(&listing)
        );

        Ok(ChatPrompt::new(vec![Message::system(SYSTEM_PROMPT), Message::user(user)])
            .with_functions(functions))
    }

    /// Restructures the call into `{next_ability, ability_arguments,
    /// motivation, self_criticism, reasoning, task_status}`. A reply without
    /// a function call, in either native or serialized form, yields `{}`.
    fn parse_response_content(&self, reply: &AssistantReply) -> PilotResult<Value> {
        let (name, arguments) = match &reply.function_call {
            Some(call) => (call.name.clone(), json::parse_json_object(&call.arguments)),
            None => {
                // Backends without tool support may serialize the call as text
                let value = json::parse_json_object(&reply.content);
                match value.get("name").and_then(|n| n.as_str()) {
                    Some(name) => {
                        let arguments = match value.get("arguments") {
                            Some(Value::String(s)) => json::parse_json_object(s),
                            Some(v @ Value::Object(_)) => v.clone(),
                            _ => json!({}),
                        };
                        (name.to_string(), arguments)
                    }
                    None => {
                        debug!("reply carried no ability call");
                        return Ok(json!({}));
                    }
                }
            }
        };

        let mut arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let motivation = take_string(&mut arguments, "motivation");
        let self_criticism = take_string(&mut arguments, "self_criticism");
        let reasoning = take_string(&mut arguments, "reasoning");
        let task_status = take_string(&mut arguments, "task_status");

        let mut out = json!({
            "next_ability": name,
            "ability_arguments": Value::Object(arguments),
            "motivation": motivation,
            "self_criticism": self_criticism,
            "reasoning": reasoning,
        });
        if !task_status.is_empty() {
            out["task_status"] = json!(normalize_status(&task_status));
        }
        Ok(out)
    }
}
