use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cost::ProviderBudget;
use crate::error::PilotResult;
use crate::types::*;

/// Maps a raw assistant reply to the structured value a caller expects.
///
/// Prompt strategies supply one of these; it runs after the budget has been
/// charged, so a parse failure never rolls back spend.
pub type ResponseParser<'a> = dyn Fn(&AssistantReply) -> PilotResult<serde_json::Value> + Send + Sync + 'a;

/// Everything a provider needs to issue one completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model_name: String,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionSchema>,
    /// Force the model to call this function
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
}

impl CompletionRequest {
    pub fn new(model_name: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model_name: model_name.into(),
            messages,
            functions: Vec::new(),
            function_call: None,
            temperature: None,
            max_tokens: None,
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

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Estimated prompt size, 4 chars ≈ 1 token
    pub fn estimate_prompt_tokens(&self) -> usize {
        let messages: usize = self.messages.iter().map(|m| m.estimate_tokens()).sum();
        let functions: usize = self
            .functions
            .iter()
            .map(|f| (f.name.len() + f.description.len() + f.parameters.to_string().len() + 3) / 4)
            .sum();
        messages + functions
    }
}

/// Result of a successful, budgeted completion
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    pub reply: AssistantReply,
    pub parsed: serde_json::Value,
    pub usage: TokenUsage,
    pub model_info: ModelInfo,
    pub incremental_cost: f64,
}

/// A model provider with budget accounting and retry.
///
/// Implementations must be safe to share between concurrently running
/// pilots: budget updates are serialized internally.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Context size of a model this provider serves
    fn get_token_limit(&self, model_name: &str) -> PilotResult<usize>;

    async fn get_remaining_budget(&self) -> f64;

    /// Snapshot of spend and usage so far
    async fn budget(&self) -> ProviderBudget;

    async fn create_language_completion(
        &self,
        request: CompletionRequest,
        parser: &ResponseParser<'_>,
    ) -> PilotResult<ProviderResponse>;
}

/// One unbudgeted round trip to a model backend
#[derive(Debug, Clone, PartialEq)]
pub struct RawCompletion {
    pub reply: AssistantReply,
    pub usage: TokenUsage,
}

/// Wire-level backend: serializes a request and extracts the reply and
/// token counts. Backends differ only in their wire format.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn complete_raw(
        &self,
        request: &CompletionRequest,
        model: &ModelInfo,
    ) -> PilotResult<RawCompletion>;
}
