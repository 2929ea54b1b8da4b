//! Abilities: the actions a pilot can take, and the registry that builds
//! and dispatches them.
//!
//! An ability declares its schema and the resources it needs through its
//! [`AbilityConfiguration`]; the [`AbilityRegistry`] resolves the concrete
//! implementation from an [`AbilityKind`] factory and supplies exactly the
//! requested resources.

pub mod builtins;
mod registry;

pub use registry::{
    default_factories, AbilityFactory, AbilityInit, AbilityRegistry, AbilityRegistrySettings,
    AbilityResources, LanguageModelHandle,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::{PilotError, PilotResult};
use crate::types::{ContentItem, FunctionSchema, Message, ProviderKind};

/// An action the pilot can invoke
#[async_trait]
pub trait Ability: Send + Sync {
    /// Ability name (must match the registry key)
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON-schema `properties` object describing the arguments
    fn arguments(&self) -> serde_json::Value;

    fn required_arguments(&self) -> Vec<String>;

    async fn invoke(&self, arguments: serde_json::Value) -> PilotResult<AbilityOutput>;

    /// Function schema offered to the model
    fn schema(&self) -> FunctionSchema {
        FunctionSchema::new(
            self.name(),
            self.description(),
            self.arguments(),
            &self.required_arguments(),
        )
    }
}

/// Raw outcome of an ability invocation
#[derive(Debug, Clone, PartialEq)]
pub struct AbilityOutput {
    pub success: bool,
    pub message: String,
    pub result: Context,
}

impl AbilityOutput {
    pub fn success(message: impl Into<String>, result: Context) -> Self {
        Self {
            success: true,
            message: message.into(),
            result,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            result: Context::new(),
        }
    }
}

/// Record of one ability call. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityAction {
    pub ability_name: String,
    pub ability_args: serde_json::Value,
    pub executed: bool,
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub result: Context,
}

impl AbilityAction {
    pub fn executed(ability_name: impl Into<String>, ability_args: serde_json::Value, output: AbilityOutput) -> Self {
        Self {
            ability_name: ability_name.into(),
            ability_args,
            executed: true,
            success: output.success,
            message: output.message,
            result: output.result,
        }
    }

    /// One-line summary for prompts
    pub fn summary(&self) -> String {
        let outcome = if self.success { "succeeded" } else { "failed" };
        format!(
            "{}({}) {}: {}",
            self.ability_name, self.ability_args, outcome, self.message
        )
    }

    /// Ability-role message carrying the summary and every result item
    pub fn to_message(&self) -> Message {
        Message::ability(self.summary()).with_items(self.result.items().cloned())
    }
}

/// Which implementation backs an ability
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityKind {
    QueryLanguageModel,
    TextSummarize,
    ReadFile,
    WriteFile,
    /// Supplied by the embedding application
    Custom(String),
}

impl std::fmt::Display for AbilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbilityKind::QueryLanguageModel => write!(f, "query_language_model"),
            AbilityKind::TextSummarize => write!(f, "text_summarize"),
            AbilityKind::ReadFile => write!(f, "read_file"),
            AbilityKind::WriteFile => write!(f, "write_file"),
            AbilityKind::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}

/// Language model an ability needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageModelRequirement {
    pub model_name: String,
    pub provider_name: ProviderKind,
    #[serde(default)]
    pub temperature: f32,
}

/// Declared implementation and resource needs of one ability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityConfiguration {
    pub location: AbilityKind,
    /// Overrides the implementation's own description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Informational only; nothing is installed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages_required: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_model_required: Option<LanguageModelRequirement>,
    #[serde(default)]
    pub memory_provider_required: bool,
    #[serde(default)]
    pub workspace_required: bool,
}

impl AbilityConfiguration {
    pub fn new(location: AbilityKind) -> Self {
        Self {
            location,
            description: None,
            packages_required: Vec::new(),
            language_model_required: None,
            memory_provider_required: false,
            workspace_required: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_language_model(
        mut self,
        provider_name: ProviderKind,
        model_name: impl Into<String>,
        temperature: f32,
    ) -> Self {
        self.language_model_required = Some(LanguageModelRequirement {
            model_name: model_name.into(),
            provider_name,
            temperature,
        });
        self
    }

    pub fn with_memory(mut self) -> Self {
        self.memory_provider_required = true;
        self
    }

    pub fn with_workspace(mut self) -> Self {
        self.workspace_required = true;
        self
    }
}

/// Required string argument, or `InvalidArguments`
pub fn string_argument<'a>(
    ability: &str,
    arguments: &'a serde_json::Value,
    key: &str,
) -> PilotResult<&'a str> {
    arguments
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| PilotError::InvalidArguments {
            ability: ability.to_string(),
            message: format!("missing string argument '{key}'"),
        })
}

/// Text items of an ability result joined by newlines
pub fn result_text(result: &Context) -> String {
    result
        .items()
        .filter_map(|item| match item {
            ContentItem::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
