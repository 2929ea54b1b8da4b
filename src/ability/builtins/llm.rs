//! Abilities that delegate to a language model.

use async_trait::async_trait;
use serde_json::json;

use crate::ability::{string_argument, Ability, AbilityInit, AbilityOutput, LanguageModelHandle};
use crate::context::Context;
use crate::error::{PilotError, PilotResult};
use crate::types::{Message, Role};

/// A failed model call inside an ability, tagged with the ability's name
fn execution_error(ability: &str, error: PilotError) -> PilotError {
    PilotError::AbilityExecution {
        ability: ability.to_string(),
        message: error.to_string(),
    }
}

/// Sends a free-form query to a language model and returns its answer.
pub struct QueryLanguageModel {
    name: String,
    description: String,
    model: LanguageModelHandle,
}

impl QueryLanguageModel {
    pub const DESCRIPTION: &'static str =
        "Query a language model. A query should be a question and any relevant context.";

    pub fn from_init(init: AbilityInit) -> PilotResult<Self> {
        Ok(Self {
            model: init.require_language_model()?,
            description: init.description_or(Self::DESCRIPTION),
            name: init.name,
        })
    }
}

#[async_trait]
impl Ability for QueryLanguageModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn arguments(&self) -> serde_json::Value {
        json!({
            "query": {
                "type": "string",
                "description": "A query for a language model. Include all necessary context."
            }
        })
    }

    fn required_arguments(&self) -> Vec<String> {
        vec!["query".into()]
    }

    async fn invoke(&self, arguments: serde_json::Value) -> PilotResult<AbilityOutput> {
        let query = string_argument(&self.name, &arguments, "query")?;
        let response = self
            .model
            .complete(vec![Message::user(query)])
            .await
            .map_err(|e| execution_error(&self.name, e))?;
        let answer = response.reply.content;
        if answer.trim().is_empty() {
            return Ok(AbilityOutput::failure("language model returned an empty answer"));
        }
        Ok(AbilityOutput::success(
            format!("Queried {}", response.model_info.name),
            Context::from_text(Role::Ability, answer),
        ))
    }
}

/// Summarizes a block of text with a language model.
pub struct TextSummarize {
    name: String,
    description: String,
    model: LanguageModelHandle,
}

impl TextSummarize {
    pub const DESCRIPTION: &'static str = "Summarize a text, keeping the key facts.";

    const SYSTEM_PROMPT: &'static str = "You write faithful, compact summaries. \
        Keep names, numbers and conclusions. Do not add information that is not in the text. \
        Reply with the summary only.";

    pub fn from_init(init: AbilityInit) -> PilotResult<Self> {
        Ok(Self {
            model: init.require_language_model()?,
            description: init.description_or(Self::DESCRIPTION),
            name: init.name,
        })
    }
}

#[async_trait]
impl Ability for TextSummarize {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn arguments(&self) -> serde_json::Value {
        json!({
            "text": {
                "type": "string",
                "description": "The text to summarize, or the topic to write a summary about."
            },
            "max_words": {
                "type": "integer",
                "description": "Upper bound on the summary length in words."
            }
        })
    }

    fn required_arguments(&self) -> Vec<String> {
        vec!["text".into()]
    }

    async fn invoke(&self, arguments: serde_json::Value) -> PilotResult<AbilityOutput> {
        let text = string_argument(&self.name, &arguments, "text")?;
        let mut instruction = String::from("Summarize the following text");
        if let Some(max_words) = arguments.get("max_words").and_then(|v| v.as_u64()) {
            instruction.push_str(&format!(" in at most {max_words} words"));
        }
        instruction.push_str(":\n\n");
        instruction.push_str(text);

        let response = self
            .model
            .complete(vec![Message::system(Self::SYSTEM_PROMPT), Message::user(instruction)])
            .await
            .map_err(|e| execution_error(&self.name, e))?;

        let summary = response.reply.content.trim().to_string();
        if summary.is_empty() {
            return Ok(AbilityOutput::failure("language model returned an empty summary"));
        }
        Ok(AbilityOutput::success(
            "Summarized text",
            Context::from_text(Role::Ability, summary),
        ))
    }
}
