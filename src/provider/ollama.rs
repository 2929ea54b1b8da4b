use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::cost::BudgetConfig;
use crate::error::{PilotError, PilotResult};
use crate::types::*;

use super::budgeted::BudgetedProvider;
use super::http::send_json;
use super::traits::{ChatBackend, CompletionRequest, RawCompletion};

/// Ollama `/api/chat` backend for locally served models
pub struct OllamaBackend {
    client: Client,
    base_url: String,
}

/// Ollama backend with budget and retry
pub type OllamaProvider = BudgetedProvider<OllamaBackend>;

impl OllamaBackend {
    pub fn new() -> Self {
        Self::with_base_url("http://localhost:11434")
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn into_provider(self, budget: &BudgetConfig) -> OllamaProvider {
        BudgetedProvider::new(self, budget)
    }

    fn build_body(&self, request: &CompletionRequest, model: &ModelInfo) -> serde_json::Value {
        let api_messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::Assistant => "assistant",
                    Role::User | Role::Ability => "user",
                };
                json!({"role": role, "content": m.text_content()})
            })
            .collect();

        let mut body = json!({
            "model": model.name,
            "messages": api_messages,
            "stream": false,
        });

        let mut options = serde_json::Map::new();
        if let Some(temperature) = request.temperature {
            options.insert("temperature".into(), json!(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            options.insert("num_predict".into(), json!(max_tokens));
        }
        if !options.is_empty() {
            body["options"] = serde_json::Value::Object(options);
        }

        // No tool_choice here; a forced function is left to the response parser
        if !request.functions.is_empty() {
            let tools: Vec<serde_json::Value> = request
                .functions
                .iter()
                .map(|f| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": f.name,
                            "description": f.description,
                            "parameters": f.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = json!(tools);
        }

        body
    }

    fn parse_response(&self, data: &serde_json::Value) -> PilotResult<RawCompletion> {
        let message = data
            .get("message")
            .ok_or_else(|| PilotError::Provider("ollama response has no message".into()))?;

        let content = message
            .get("content")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let function_call = message
            .get("tool_calls")
            .and_then(|v| v.get(0))
            .and_then(|tc| tc.get("function"))
            .and_then(|f| {
                let name = f.get("name")?.as_str()?.to_string();
                let arguments = match f.get("arguments") {
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => "{}".to_string(),
                };
                Some(FunctionCall { name, arguments })
            });

        let count = |field: &str| data.get(field).and_then(|v| v.as_u64()).unwrap_or(0) as usize;

        Ok(RawCompletion {
            reply: AssistantReply {
                content,
                function_call,
            },
            usage: TokenUsage::new(count("prompt_eval_count"), count("eval_count")),
        })
    }
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    async fn complete_raw(
        &self,
        request: &CompletionRequest,
        model: &ModelInfo,
    ) -> PilotResult<RawCompletion> {
        let body = self.build_body(request, model);
        let url = format!("{}/api/chat", self.base_url);
        let data = send_json(self.client.post(&url), "ollama", &body).await?;
        self.parse_response(&data)
    }
}
