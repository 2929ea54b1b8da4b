use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::cost::BudgetConfig;
use crate::error::{PilotError, PilotResult};
use crate::types::*;

use super::budgeted::BudgetedProvider;
use super::http::send_json;
use super::traits::{ChatBackend, CompletionRequest, RawCompletion};

/// OpenAI-compatible chat completions backend
pub struct OpenAIBackend {
    client: Client,
    base_url: String,
    api_key: String,
}

/// OpenAI backend with budget and retry
pub type OpenAIProvider = BudgetedProvider<OpenAIBackend>;

impl OpenAIBackend {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, "https://api.openai.com")
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn into_provider(self, budget: &BudgetConfig) -> OpenAIProvider {
        BudgetedProvider::new(self, budget)
    }

    fn build_body(&self, request: &CompletionRequest, model: &ModelInfo) -> serde_json::Value {
        let api_messages: Vec<serde_json::Value> =
            request.messages.iter().map(message_to_api).collect();

        let mut body = json!({
            "model": model.name,
            "messages": api_messages,
        });

        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

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

            if let Some(name) = &request.function_call {
                body["tool_choice"] = json!({"type": "function", "function": {"name": name}});
            }
        }

        body
    }

    fn parse_response(&self, data: &serde_json::Value) -> PilotResult<RawCompletion> {
        let message = data
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .ok_or_else(|| PilotError::Provider("openai response has no choices".into()))?;

        let content = message
            .get("content")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        // Current tool_calls shape first, then the legacy function_call field
        let function = message
            .get("tool_calls")
            .and_then(|v| v.get(0))
            .and_then(|tc| tc.get("function"))
            .or_else(|| message.get("function_call"));

        let function_call = function.and_then(|f| {
            let name = f.get("name")?.as_str()?.to_string();
            let arguments = match f.get("arguments") {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => "{}".to_string(),
            };
            Some(FunctionCall { name, arguments })
        });

        let usage = data.get("usage");
        let count = |field: &str| {
            usage
                .and_then(|u| u.get(field))
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as usize
        };

        Ok(RawCompletion {
            reply: AssistantReply {
                content,
                function_call,
            },
            usage: TokenUsage::new(count("prompt_tokens"), count("completion_tokens")),
        })
    }
}

fn message_to_api(msg: &Message) -> serde_json::Value {
    let role = match msg.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Ability => "user",
    };
    json!({"role": role, "content": msg.text_content()})
}

#[async_trait]
impl ChatBackend for OpenAIBackend {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAI
    }

    async fn complete_raw(
        &self,
        request: &CompletionRequest,
        model: &ModelInfo,
    ) -> PilotResult<RawCompletion> {
        let body = self.build_body(request, model);
        let url = format!("{}/v1/chat/completions", self.base_url);

        let http = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key));
        let data = send_json(http, "openai", &body).await?;

        self.parse_response(&data)
    }
}
