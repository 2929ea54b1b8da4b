use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::cost::BudgetConfig;
use crate::error::{PilotError, PilotResult};
use crate::types::*;

use super::budgeted::BudgetedProvider;
use super::http::send_json;
use super::traits::{ChatBackend, CompletionRequest, RawCompletion};

const DEFAULT_MAX_TOKENS: usize = 4096;

/// Anthropic Messages API backend
pub struct AnthropicBackend {
    client: Client,
    base_url: String,
    api_key: String,
}

/// Anthropic backend with budget and retry
pub type AnthropicProvider = BudgetedProvider<AnthropicBackend>;

impl AnthropicBackend {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, "https://api.anthropic.com")
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn into_provider(self, budget: &BudgetConfig) -> AnthropicProvider {
        BudgetedProvider::new(self, budget)
    }

    fn build_body(&self, request: &CompletionRequest, model: &ModelInfo) -> serde_json::Value {
        // System prompts travel in their own field
        let system: Vec<String> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.text_content())
            .collect();

        let api_messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(message_to_api)
            .collect();

        let mut body = json!({
            "model": model.name,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "messages": api_messages,
        });

        if !system.is_empty() {
            body["system"] = json!(system.join("\n\n"));
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }

        if !request.functions.is_empty() {
            let tools: Vec<serde_json::Value> = request
                .functions
                .iter()
                .map(|f| {
                    json!({
                        "name": f.name,
                        "description": f.description,
                        "input_schema": f.parameters,
                    })
                })
                .collect();
            body["tools"] = json!(tools);

            if let Some(name) = &request.function_call {
                body["tool_choice"] = json!({"type": "tool", "name": name});
            }
        }

        body
    }

    fn parse_response(&self, data: &serde_json::Value) -> PilotResult<RawCompletion> {
        let blocks = data
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| PilotError::Provider("anthropic response has no content".into()))?;

        let mut content = String::new();
        let mut function_call = None;
        for block in blocks {
            match block.get("type").and_then(|t| t.as_str()) {
                Some("text") => {
                    if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                        content.push_str(text);
                    }
                }
                Some("tool_use") if function_call.is_none() => {
                    let name = block
                        .get("name")
                        .and_then(|n| n.as_str())
                        .unwrap_or_default()
                        .to_string();
                    let arguments = block
                        .get("input")
                        .map(|i| i.to_string())
                        .unwrap_or_else(|| "{}".to_string());
                    function_call = Some(FunctionCall { name, arguments });
                }
                _ => {}
            }
        }

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
            usage: TokenUsage::new(count("input_tokens"), count("output_tokens")),
        })
    }
}

fn message_to_api(msg: &Message) -> serde_json::Value {
    let role = match msg.role {
        Role::Assistant => "assistant",
        // Ability output is fed back as user turns
        Role::User | Role::Ability | Role::System => "user",
    };

    let mut content = Vec::new();
    if !msg.content.is_empty() {
        content.push(json!({"type": "text", "text": msg.content}));
    }
    for item in &msg.items {
        match item {
            ContentItem::Image { media_type, data } => content.push(json!({
                "type": "image",
                "source": {"type": "base64", "media_type": media_type, "data": data}
            })),
            other => content.push(json!({"type": "text", "text": other.render()})),
        }
    }
    if content.is_empty() {
        content.push(json!({"type": "text", "text": ""}));
    }

    json!({"role": role, "content": content})
}

#[async_trait]
impl ChatBackend for AnthropicBackend {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn complete_raw(
        &self,
        request: &CompletionRequest,
        model: &ModelInfo,
    ) -> PilotResult<RawCompletion> {
        let body = self.build_body(request, model);
        let url = format!("{}/v1/messages", self.base_url);

        let http = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01");
        let data = send_json(http, "anthropic", &body).await?;

        self.parse_response(&data)
    }
}
