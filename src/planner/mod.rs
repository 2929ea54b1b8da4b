//! Planner: turns an objective into tasks and picks the next ability for a
//! task, one model completion per decision.
//!
//! Each operation runs a [`PromptStrategy`] against the provider and model
//! configured for the strategy's [`ModelClassification`].

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::PilotResult;
use crate::prompt::{
    AbilityChoice, AgentProfile, InitialPlan, InitialPlanInput, NameAndGoals, NextAbility,
    NextAbilityInput, PlannedTask, PromptStrategy,
};
use crate::provider::ProviderRegistry;
use crate::task::Task;
use crate::types::{AssistantReply, FunctionSchema, ModelClassification, ProviderKind};

// ─── Configuration ──────────────────────────────────────────────────────────

/// Provider, model and temperature used for one classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageModelConfiguration {
    pub model_name: String,
    pub provider_name: ProviderKind,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_temperature() -> f32 {
    0.9
}

impl LanguageModelConfiguration {
    pub fn new(provider_name: ProviderKind, model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            provider_name,
            temperature: default_temperature(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfiguration {
    #[serde(default = "default_fast")]
    pub fast: LanguageModelConfiguration,
    #[serde(default = "default_smart")]
    pub smart: LanguageModelConfiguration,
    /// Facts about the host included in planning prompts
    #[serde(default = "default_system_info")]
    pub system_info: Vec<String>,
}

fn default_fast() -> LanguageModelConfiguration {
    LanguageModelConfiguration::new(ProviderKind::OpenAI, "gpt-3.5-turbo")
}

fn default_smart() -> LanguageModelConfiguration {
    LanguageModelConfiguration::new(ProviderKind::OpenAI, "gpt-4")
}

fn default_system_info() -> Vec<String> {
    vec![format!(
        "The OS you are running on is: {}",
        std::env::consts::OS
    )]
}

impl PlannerConfiguration {
    pub fn new(fast: LanguageModelConfiguration, smart: LanguageModelConfiguration) -> Self {
        Self {
            fast,
            smart,
            system_info: default_system_info(),
        }
    }

    pub fn with_system_info(mut self, info: Vec<String>) -> Self {
        self.system_info = info;
        self
    }

    pub fn model_for(&self, classification: ModelClassification) -> &LanguageModelConfiguration {
        match classification {
            ModelClassification::Fast => &self.fast,
            ModelClassification::Smart => &self.smart,
        }
    }
}

impl Default for PlannerConfiguration {
    fn default() -> Self {
        Self::new(default_fast(), default_smart())
    }
}

// ─── Planner ────────────────────────────────────────────────────────────────

pub struct Planner {
    config: PlannerConfiguration,
    providers: ProviderRegistry,
    initial_plan: InitialPlan,
    next_ability: NextAbility,
    name_and_goals: NameAndGoals,
}

impl Planner {
    pub fn new(config: PlannerConfiguration, providers: ProviderRegistry) -> Self {
        Self {
            config,
            providers,
            initial_plan: InitialPlan::new(),
            next_ability: NextAbility,
            name_and_goals: NameAndGoals,
        }
    }

    /// Replace the planning strategy, e.g. to change its system prompt
    pub fn with_initial_plan(mut self, strategy: InitialPlan) -> Self {
        self.initial_plan = strategy;
        self
    }

    pub fn config(&self) -> &PlannerConfiguration {
        &self.config
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    fn system_info(&self) -> Vec<String> {
        let mut info = self.config.system_info.clone();
        info.push(format!(
            "The current time and date is {}",
            Utc::now().format("%c")
        ));
        info
    }

    /// One completion through `strategy`, decoded into its output type
    async fn chat_with_model<S: PromptStrategy>(
        &self,
        strategy: &S,
        input: &S::Input,
    ) -> PilotResult<S::Output> {
        let model = self.config.model_for(strategy.model_classification());
        let provider = self.providers.require(&model.provider_name)?;

        let prompt = strategy.build_prompt(input)?;
        debug!(
            strategy = strategy.name(),
            model = %model.model_name,
            prompt = %prompt.render(),
            "sending prompt"
        );

        let request = prompt.into_request(model.model_name.clone(), Some(model.temperature));
        let parser = |reply: &AssistantReply| strategy.parse_response_content(reply);
        let response = provider.create_language_completion(request, &parser).await?;
        Ok(strategy.decode(response.parsed))
    }

    /// Ordered task list for `objective`, least urgent first
    pub async fn plan(&self, objective: &str, ability_names: &[String]) -> PilotResult<Vec<Task>> {
        let input = InitialPlanInput {
            objective: objective.to_string(),
            abilities: ability_names.to_vec(),
            system_info: self.system_info(),
        };
        let output = self.chat_with_model(&self.initial_plan, &input).await?;

        let mut tasks: Vec<Task> = output
            .task_list
            .into_iter()
            .map(PlannedTask::into_task)
            .collect();
        tasks.sort_by(|a, b| b.priority.cmp(&a.priority));

        info!(objective, tasks = tasks.len(), "initial plan created");
        Ok(tasks)
    }

    /// The model's choice of ability for `task`. An empty choice means the
    /// reply could not be understood.
    pub async fn next(&self, task: &Task, abilities: &[FunctionSchema]) -> PilotResult<AbilityChoice> {
        let input = NextAbilityInput {
            task: task.clone(),
            abilities: abilities.to_vec(),
        };
        let choice = self.chat_with_model(&self.next_ability, &input).await?;
        debug!(
            task = %task.objective,
            ability = %choice.next_ability,
            reasoning = %choice.reasoning,
            "next ability chosen"
        );
        Ok(choice)
    }

    /// Agent name, role and goals derived from a user objective
    pub async fn decide_name_and_goals(&self, objective: &str) -> PilotResult<AgentProfile> {
        let profile = self
            .chat_with_model(&self.name_and_goals, &objective.to_string())
            .await?;
        info!(agent = %profile.agent_name, goals = profile.agent_goals.len(), "agent profile decided");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::{BudgetConfig, ProviderBudget};
    use crate::error::PilotError;
    use crate::provider::{CompletionRequest, ModelProvider, ProviderResponse, ResponseParser};
    use crate::task::TaskStatus;
    use crate::types::{ModelInfo, TokenUsage};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Answers with queued replies and keeps every request
    struct ScriptedProvider {
        kind: ProviderKind,
        replies: Mutex<VecDeque<AssistantReply>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedProvider {
        fn new(kind: ProviderKind, replies: Vec<AssistantReply>) -> Arc<Self> {
            Arc::new(Self {
                kind,
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        fn kind(&self) -> ProviderKind {
            self.kind.clone()
        }

        fn get_token_limit(&self, _model_name: &str) -> PilotResult<usize> {
            Ok(8_192)
        }

        async fn get_remaining_budget(&self) -> f64 {
            f64::INFINITY
        }

        async fn budget(&self) -> ProviderBudget {
            ProviderBudget::new(&BudgetConfig::default())
        }

        async fn create_language_completion(
            &self,
            request: CompletionRequest,
            parser: &ResponseParser<'_>,
        ) -> PilotResult<ProviderResponse> {
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| PilotError::Provider("script exhausted".into()))?;
            let parsed = parser(&reply)?;
            let model_info = ModelInfo {
                name: request.model_name.clone(),
                provider: self.kind.clone(),
                max_tokens: 8_192,
                prompt_token_cost: 0.0,
                completion_token_cost: 0.0,
                supports_functions: true,
            };
            self.requests.lock().unwrap().push(request);
            Ok(ProviderResponse {
                reply,
                parsed,
                usage: TokenUsage::new(1, 1),
                model_info,
                incremental_cost: 0.0,
            })
        }
    }

    fn planner(provider: Arc<ScriptedProvider>) -> Planner {
        let config = PlannerConfiguration::new(
            LanguageModelConfiguration::new(ProviderKind::Ollama, "llama3.1").with_temperature(0.0),
            LanguageModelConfiguration::new(ProviderKind::Ollama, "qwen2.5").with_temperature(0.5),
        );
        Planner::new(config, ProviderRegistry::new().with(provider))
    }

    #[tokio::test]
    async fn plan_sorts_by_non_increasing_priority() {
        let provider = ScriptedProvider::new(
            ProviderKind::Ollama,
            vec![AssistantReply::function_call(
                "create_initial_agent_plan",
                r#"{"task_list": [
                    {"objective": "Outline", "type": "write", "priority": 1},
                    {"objective": "Publish", "type": "ops", "priority": 3},
                    {"objective": "Draft", "type": "write", "priority": 2}
                ]}"#,
            )],
        );
        let planner = planner(provider.clone());
        let tasks = planner
            .plan("write a post", &["text_summarize: Summarize".to_string()])
            .await
            .unwrap();

        let priorities: Vec<u32> = tasks.iter().map(|t| t.priority).collect();
        assert_eq!(priorities, vec![3, 2, 1]);
        assert!(tasks.iter().all(|t| t.status() == TaskStatus::Backlog));

        // Planning is a smart-model call
        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].model_name, "qwen2.5");
        assert_eq!(requests[0].temperature, Some(0.5));
        assert!(requests[0].messages[0].content.contains("The current time and date is"));
    }

    #[tokio::test]
    async fn next_uses_fast_model() {
        let provider = ScriptedProvider::new(
            ProviderKind::Ollama,
            vec![AssistantReply::function_call(
                "text_summarize",
                r#"{"text": "X", "reasoning": "only option", "task_status": "done"}"#,
            )],
        );
        let planner = planner(provider.clone());
        let schema = FunctionSchema::new(
            "text_summarize",
            "Summarize",
            serde_json::json!({"text": {"type": "string"}}),
            &["text".to_string()],
        );
        let choice = planner
            .next(&Task::new("Summarize X", "write", 1), &[schema])
            .await
            .unwrap();

        assert_eq!(choice.next_ability, "text_summarize");
        assert_eq!(choice.task_status, Some(TaskStatus::Done));
        assert_eq!(provider.requests.lock().unwrap()[0].model_name, "llama3.1");
    }

    #[tokio::test]
    async fn unparseable_reply_is_empty_choice() {
        let provider = ScriptedProvider::new(
            ProviderKind::Ollama,
            vec![AssistantReply::text("no idea")],
        );
        let choice = planner(provider)
            .next(&Task::new("a", "b", 1), &[])
            .await
            .unwrap();
        assert!(choice.is_empty());
    }

    #[tokio::test]
    async fn name_and_goals() {
        let provider = ScriptedProvider::new(
            ProviderKind::Ollama,
            vec![AssistantReply::function_call(
                "create_agent",
                r#"{"agent_name": "Scribe", "agent_role": "Summarizes", "agent_goals": ["a", "b"]}"#,
            )],
        );
        let profile = planner(provider)
            .decide_name_and_goals("summarize topic X")
            .await
            .unwrap();
        assert_eq!(profile.agent_name, "Scribe");
        assert_eq!(profile.agent_goals.len(), 2);
    }

    #[tokio::test]
    async fn missing_provider_is_an_error() {
        let planner = Planner::new(PlannerConfiguration::default(), ProviderRegistry::new());
        let err = planner.plan("x", &[]).await.unwrap_err();
        assert!(matches!(err, PilotError::Provider(_)));
    }

    #[test]
    fn configuration_yaml_defaults() {
        let config: PlannerConfiguration = serde_yaml::from_str(
            "fast:\n  model_name: llama3.1\n  provider_name: ollama\n",
        )
        .unwrap();
        assert_eq!(config.fast.provider_name, ProviderKind::Ollama);
        assert_eq!(config.fast.temperature, 0.9);
        assert_eq!(config.smart, default_smart());
        assert!(!config.system_info.is_empty());
    }
}
