//! Prompt strategies: how a structured request becomes a chat prompt and
//! how the model's reply becomes a structured value.
//!
//! A strategy is a pure transformation pair. It never talks to a provider;
//! the planner sends the built prompt and hands the strategy's
//! [`PromptStrategy::parse_response_content`] to the provider as the
//! response parser.

pub mod json;
mod strategies;

pub use strategies::initial_plan::{InitialPlan, InitialPlanInput, InitialPlanOutput, PlannedTask};
pub use strategies::name_and_goals::{AgentProfile, NameAndGoals};
pub use strategies::next_ability::{
    AbilityChoice, NextAbility, NextAbilityInput, ASK_USER_FUNCTION,
};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::PilotResult;
use crate::provider::CompletionRequest;
use crate::types::{AssistantReply, FunctionSchema, Message, ModelClassification};

/// A prompt ready to send: messages plus the functions offered to the model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatPrompt {
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionSchema>,
    /// Function the model is required to call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<String>,
}

impl ChatPrompt {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_functions(mut self, functions: Vec<FunctionSchema>) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_function_call(mut self, name: impl Into<String>) -> Self {
        self.function_call = Some(name.into());
        self
    }

    pub fn into_request(self, model_name: impl Into<String>, temperature: Option<f32>) -> CompletionRequest {
        let mut request = CompletionRequest::new(model_name, self.messages).with_functions(self.functions);
        request.function_call = self.function_call;
        request.temperature = temperature;
        request
    }

    /// Plain-text rendering, used for debug logging
    pub fn render(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{:?}: {}", m.role, m.text_content()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Builds a prompt from a typed input and interprets the model's reply.
pub trait PromptStrategy: Send + Sync {
    type Input;
    type Output: DeserializeOwned + Default;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn model_classification(&self) -> ModelClassification;

    fn build_prompt(&self, input: &Self::Input) -> PilotResult<ChatPrompt>;

    /// Structured value extracted from the reply. Unparseable replies
    /// produce an empty object rather than an error.
    fn parse_response_content(&self, reply: &AssistantReply) -> PilotResult<serde_json::Value>;

    /// Typed view of a parsed value; falls back to `Output::default()`
    fn decode(&self, value: serde_json::Value) -> Self::Output {
        match serde_json::from_value(value) {
            Ok(output) => output,
            Err(e) => {
                warn!(strategy = self.name(), error = %e, "response did not match expected shape");
                Self::Output::default()
            }
        }
    }
}

/// Bulleted listing, `- item` per line
pub(crate) fn bullet_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|i| format!("- {}", i.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Numbered listing, `1. item` per line
pub(crate) fn numbered_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}
