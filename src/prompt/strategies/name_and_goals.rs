//! User objective → agent name, role and goals.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::PilotResult;
use crate::prompt::{json, ChatPrompt, PromptStrategy};
use crate::types::{AssistantReply, FunctionSchema, Message, ModelClassification};

const FUNCTION_NAME: &str = "create_agent";

const SYSTEM_PROMPT: &str = "Your job is to respond to a user-defined task by invoking the \
`create_agent` function to generate an autonomous agent to complete the task. \
You should supply a role-based name for the agent, an informative description for what the agent does, \
and 1 to 5 goals that are optimally aligned with the successful completion of its assigned task.";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    #[serde(default)]
    pub agent_name: String,
    #[serde(default)]
    pub agent_role: String,
    #[serde(default)]
    pub agent_goals: Vec<String>,
}

/// Names the agent and derives its goals from the user's objective
#[derive(Debug, Clone, Copy, Default)]
pub struct NameAndGoals;

impl PromptStrategy for NameAndGoals {
    type Input = String;
    type Output = AgentProfile;

    fn name(&self) -> &'static str {
        "name_and_goals"
    }

    fn model_classification(&self) -> ModelClassification {
        ModelClassification::Smart
    }

    fn build_prompt(&self, objective: &String) -> PilotResult<ChatPrompt> {
        let function = FunctionSchema::new(
            FUNCTION_NAME,
            "Create a new autonomous AI agent to complete a given task.",
            json!({
                "agent_name": {
                    "type": "string",
                    "description": "A short role-based name for an autonomous agent."
                },
                "agent_role": {
                    "type": "string",
                    "description": "An informative one sentence description of what the AI agent does."
                },
                "agent_goals": {
                    "type": "array",
                    "minItems": 1,
                    "maxItems": 5,
                    "items": {"type": "string"},
                    "description": "One to five highly effective goals that are optimally aligned with the completion of a specific task."
                }
            }),
            &[
                "agent_name".to_string(),
                "agent_role".to_string(),
                "agent_goals".to_string(),
            ],
        );
        Ok(ChatPrompt::new(vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(format!("'{objective}'")),
        ])
        .with_functions(vec![function])
        .with_function_call(FUNCTION_NAME))
    }

    fn parse_response_content(&self, reply: &AssistantReply) -> PilotResult<serde_json::Value> {
        Ok(json::reply_payload(reply))
    }
}
