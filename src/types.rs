use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Message Types ──────────────────────────────────────────────────────────

/// Sender of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Output folded back from an ability invocation
    Ability,
}

/// An item attached to a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    Text {
        text: String,
    },
    File {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Image {
        media_type: String,
        data: String,
    },
    Object {
        value: serde_json::Value,
    },
}

impl ContentItem {
    pub fn text(s: impl Into<String>) -> Self {
        ContentItem::Text { text: s.into() }
    }

    pub fn file(path: impl Into<String>) -> Self {
        ContentItem::File {
            path: path.into(),
            description: None,
        }
    }

    pub fn object(value: serde_json::Value) -> Self {
        ContentItem::Object { value }
    }

    /// Render the item as prompt text
    pub fn render(&self) -> String {
        match self {
            ContentItem::Text { text } => text.clone(),
            ContentItem::File { path, description } => match description {
                Some(d) => format!("[file {path}: {d}]"),
                None => format!("[file {path}]"),
            },
            ContentItem::Image { media_type, .. } => format!("[image {media_type}]"),
            ContentItem::Object { value } => value.to_string(),
        }
    }

    /// Estimate token count for this item (rough: 4 chars ≈ 1 token)
    pub fn estimate_tokens(&self) -> usize {
        let chars = match self {
            ContentItem::Text { text } => text.len(),
            ContentItem::File { path, description } => {
                path.len() + description.as_ref().map(|d| d.len()).unwrap_or(0)
            }
            ContentItem::Image { data, .. } => data.len() / 4, // base64 overhead
            ContentItem::Object { value } => value.to_string().len(),
        };
        (chars + 3) / 4 // ceil division
    }
}

/// A message in a prompt or in the running context log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ContentItem>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            items: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn ability(text: impl Into<String>) -> Self {
        Self::new(Role::Ability, text)
    }

    pub fn with_item(mut self, item: ContentItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_items(mut self, items: impl IntoIterator<Item = ContentItem>) -> Self {
        self.items.extend(items);
        self
    }

    /// Content plus rendered items, as sent to a model
    pub fn text_content(&self) -> String {
        if self.items.is_empty() {
            return self.content.clone();
        }
        let mut parts = Vec::with_capacity(self.items.len() + 1);
        if !self.content.is_empty() {
            parts.push(self.content.clone());
        }
        parts.extend(self.items.iter().map(|i| i.render()));
        parts.join("\n")
    }

    /// Estimate total tokens for this message
    pub fn estimate_tokens(&self) -> usize {
        let item_tokens: usize = self.items.iter().map(|i| i.estimate_tokens()).sum();
        (self.content.len() + 3) / 4 + item_tokens + 4 // role + framing overhead
    }
}

// ─── Function Calling ────────────────────────────────────────────────────────

/// JSON-schema description of a callable function offered to a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl FunctionSchema {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        properties: serde_json::Value,
        required: &[String],
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }

    /// One-line rendering for prompt listings
    pub fn summary(&self) -> String {
        let args: Vec<String> = self
            .parameters
            .get("properties")
            .and_then(|p| p.as_object())
            .map(|props| {
                props
                    .iter()
                    .map(|(k, v)| {
                        let ty = v.get("type").and_then(|t| t.as_str()).unwrap_or("any");
                        format!("{k}: {ty}")
                    })
                    .collect()
            })
            .unwrap_or_default();
        format!("{}: {}. Params: ({})", self.name, self.description, args.join(", "))
    }
}

/// A function call emitted by a model; arguments stay serialized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// The assistant side of a completion, backend-independent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantReply {
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

impl AssistantReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            function_call: None,
        }
    }

    pub fn function_call(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            function_call: Some(FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            }),
        }
    }
}

// ─── Token Usage ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    #[serde(default)]
    pub total_tokens: usize,
}

impl TokenUsage {
    pub fn new(prompt: usize, completion: usize) -> Self {
        Self {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
        }
    }

    pub fn add(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.prompt_tokens + other.completion_tokens;
    }
}

// ─── Model Info ──────────────────────────────────────────────────────────────

/// Static description of a model a provider can serve.
///
/// Costs are USD per 1000 tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub provider: ProviderKind,
    pub max_tokens: usize,
    #[serde(default)]
    pub prompt_token_cost: f64,
    #[serde(default)]
    pub completion_token_cost: f64,
    #[serde(default = "default_true")]
    pub supports_functions: bool,
}

fn default_true() -> bool {
    true
}

/// Known LLM providers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAI,
    Anthropic,
    Ollama,
    Custom(String),
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::OpenAI => write!(f, "openai"),
            ProviderKind::Anthropic => write!(f, "anthropic"),
            ProviderKind::Ollama => write!(f, "ollama"),
            ProviderKind::Custom(s) => write!(f, "{s}"),
        }
    }
}

/// Budget tier a prompt strategy targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelClassification {
    Fast,
    Smart,
}

impl std::fmt::Display for ModelClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelClassification::Fast => write!(f, "fast"),
            ModelClassification::Smart => write!(f, "smart"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_constructors_set_role() {
        assert_eq!(Message::user("hi").role, Role::User);
        assert_eq!(Message::assistant("hi").role, Role::Assistant);
        assert_eq!(Message::system("hi").role, Role::System);
        assert_eq!(Message::ability("hi").role, Role::Ability);
        assert!(!Message::user("hi").id.is_empty());
    }

    #[test]
    fn text_content_renders_items() {
        let msg = Message::ability("summarize: done")
            .with_item(ContentItem::text("short summary"))
            .with_item(ContentItem::file("notes.md"));
        assert_eq!(
            msg.text_content(),
            "summarize: done\nshort summary\n[file notes.md]"
        );
    }

    #[test]
    fn text_content_without_items() {
        let msg = Message::user("plain");
        assert_eq!(msg.text_content(), "plain");
    }

    #[test]
    fn content_item_serializes_tagged() {
        let json = serde_json::to_string(&ContentItem::text("hello")).unwrap();
        assert!(json.contains(r#""type":"text""#));

        let json = serde_json::to_string(&ContentItem::object(json!({"a": 1}))).unwrap();
        assert!(json.contains(r#""type":"object""#));
    }

    #[test]
    fn token_estimation() {
        let item = ContentItem::text("hello world!"); // 12 chars → 3
        assert_eq!(item.estimate_tokens(), 3);
        assert_eq!(ContentItem::text("").estimate_tokens(), 0);
        assert!(Message::user("hello world!").estimate_tokens() >= 4);
    }

    #[test]
    fn token_usage_accumulates() {
        let mut usage = TokenUsage::new(100, 50);
        assert_eq!(usage.total_tokens, 150);
        usage.add(&TokenUsage::new(10, 5));
        assert_eq!(usage.prompt_tokens, 110);
        assert_eq!(usage.completion_tokens, 55);
        assert_eq!(usage.total_tokens, 165);
    }

    #[test]
    fn provider_kind_display_and_serde() {
        assert_eq!(ProviderKind::OpenAI.to_string(), "openai");
        assert_eq!(ProviderKind::Custom("vllm".into()).to_string(), "vllm");
        let json = serde_json::to_string(&ProviderKind::Anthropic).unwrap();
        assert_eq!(json, r#""anthropic""#);
        let kind: ProviderKind = serde_json::from_str(r#""ollama""#).unwrap();
        assert_eq!(kind, ProviderKind::Ollama);
    }

    #[test]
    fn classification_serializes_snake_case() {
        let json = serde_json::to_string(&ModelClassification::Smart).unwrap();
        assert_eq!(json, r#""smart""#);
    }

    #[test]
    fn function_schema_summary_lists_params() {
        let schema = FunctionSchema::new(
            "read_file",
            "Read a file",
            json!({"filename": {"type": "string"}}),
            &["filename".to_string()],
        );
        assert_eq!(schema.parameters["required"][0], "filename");
        assert_eq!(
            schema.summary(),
            "read_file: Read a file. Params: (filename: string)"
        );
    }

    #[test]
    fn assistant_reply_constructors() {
        let reply = AssistantReply::function_call("ask_user", r#"{"question":"why?"}"#);
        assert_eq!(reply.function_call.as_ref().unwrap().name, "ask_user");
        assert!(reply.content.is_empty());
        assert!(AssistantReply::text("hi").function_call.is_none());
    }
}
