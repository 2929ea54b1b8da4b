use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::cost::{models_for, BudgetConfig, BudgetTracker, ProviderBudget};
use crate::error::{PilotError, PilotResult};
use crate::types::{ModelInfo, ProviderKind};

use super::retry::{RetryConfig, RetryHandler};
use super::traits::{ChatBackend, CompletionRequest, ModelProvider, ProviderResponse, ResponseParser};

/// A [`ChatBackend`] wrapped with a model table, retry and budget.
///
/// The budget is charged exactly once per completion that returns
/// successfully from the backend. Failed attempts and retries cost nothing.
pub struct BudgetedProvider<B: ChatBackend> {
    backend: B,
    retry: RetryHandler,
    models: HashMap<String, ModelInfo>,
    budget: BudgetTracker,
}

impl<B: ChatBackend> BudgetedProvider<B> {
    /// Serves the built-in catalog models of the backend's provider kind
    pub fn new(backend: B, budget: &BudgetConfig) -> Self {
        let kind = backend.kind();
        let models = models_for(&kind)
            .into_iter()
            .map(|m| (m.name.clone(), m))
            .collect();
        Self {
            budget: BudgetTracker::new(kind.to_string(), budget),
            backend,
            retry: RetryHandler::default(),
            models,
        }
    }

    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry = RetryHandler::new(config);
        self
    }

    /// Add or replace a model entry
    pub fn with_model(mut self, model: ModelInfo) -> Self {
        self.models.insert(model.name.clone(), model);
        self
    }

    pub fn model(&self, name: &str) -> PilotResult<&ModelInfo> {
        self.models
            .get(name)
            .ok_or_else(|| PilotError::ModelNotFound(format!("{} does not serve {name}", self.backend.kind())))
    }

    pub fn models(&self) -> Vec<&ModelInfo> {
        let mut models: Vec<_> = self.models.values().collect();
        models.sort_by(|a, b| a.name.cmp(&b.name));
        models
    }

    pub fn tracker(&self) -> &BudgetTracker {
        &self.budget
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[async_trait]
impl<B: ChatBackend> ModelProvider for BudgetedProvider<B> {
    fn kind(&self) -> ProviderKind {
        self.backend.kind()
    }

    fn get_token_limit(&self, model_name: &str) -> PilotResult<usize> {
        Ok(self.model(model_name)?.max_tokens)
    }

    async fn get_remaining_budget(&self) -> f64 {
        self.budget.remaining_budget().await
    }

    async fn budget(&self) -> ProviderBudget {
        self.budget.snapshot().await
    }

    async fn create_language_completion(
        &self,
        request: CompletionRequest,
        parser: &ResponseParser<'_>,
    ) -> PilotResult<ProviderResponse> {
        let model = self.model(&request.model_name)?.clone();

        let estimated = request.estimate_prompt_tokens();
        if estimated > model.max_tokens {
            return Err(PilotError::ContextOverflow {
                used_tokens: estimated,
                max_tokens: model.max_tokens,
            });
        }

        debug!(
            provider = %self.kind(),
            model = %model.name,
            messages = request.messages.len(),
            functions = request.functions.len(),
            estimated_tokens = estimated,
            "sending completion"
        );

        let raw = self
            .retry
            .run(|| self.backend.complete_raw(&request, &model))
            .await?;

        let event = self.budget.record(&raw.usage, &model).await;
        info!(
            provider = %event.provider,
            model = %event.model,
            prompt_tokens = event.prompt_tokens,
            completion_tokens = event.completion_tokens,
            cost = event.incremental_cost,
            total_cost = event.cumulative_cost,
            "completion charged"
        );

        let parsed = parser(&raw.reply)?;

        Ok(ProviderResponse {
            reply: raw.reply,
            parsed,
            usage: raw.usage,
            model_info: model,
            incremental_cost: event.incremental_cost,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::PER_CALL_OVERHEAD_USD;
    use crate::provider::traits::RawCompletion;
    use crate::types::{AssistantReply, Message, TokenUsage};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedBackend {
        script: Mutex<VecDeque<PilotResult<RawCompletion>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<PilotResult<RawCompletion>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        fn kind(&self) -> ProviderKind {
            ProviderKind::OpenAI
        }

        async fn complete_raw(
            &self,
            _request: &CompletionRequest,
            _model: &ModelInfo,
        ) -> PilotResult<RawCompletion> {
            *self.calls.lock().unwrap() += 1;
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(PilotError::Provider("script exhausted".into())))
        }
    }

    fn ok(text: &str, prompt: usize, completion: usize) -> PilotResult<RawCompletion> {
        Ok(RawCompletion {
            reply: AssistantReply::text(text),
            usage: TokenUsage::new(prompt, completion),
        })
    }

    fn rate_limited() -> PilotResult<RawCompletion> {
        Err(PilotError::RateLimited {
            provider: "openai".into(),
            message: "429".into(),
        })
    }

    fn raw_json(reply: &AssistantReply) -> PilotResult<serde_json::Value> {
        Ok(serde_json::from_str(&reply.content)?)
    }

    fn test_model() -> ModelInfo {
        ModelInfo {
            name: "test-model".into(),
            provider: ProviderKind::OpenAI,
            max_tokens: 1_000,
            prompt_token_cost: 0.01,
            completion_token_cost: 0.03,
            supports_functions: true,
        }
    }

    fn provider(script: Vec<PilotResult<RawCompletion>>) -> BudgetedProvider<ScriptedBackend> {
        BudgetedProvider::new(ScriptedBackend::new(script), &BudgetConfig::new().with_total_budget(1.0))
            .with_model(test_model())
    }

    fn request() -> CompletionRequest {
        CompletionRequest::new("test-model", vec![Message::user("hi")])
    }

    #[test]
    fn serves_catalog_models() {
        let provider = provider(vec![]);
        assert_eq!(provider.get_token_limit("gpt-4").unwrap(), 8_191);
        assert_eq!(provider.get_token_limit("test-model").unwrap(), 1_000);
        assert!(matches!(
            provider.get_token_limit("nope"),
            Err(PilotError::ModelNotFound(_))
        ));
    }

    #[tokio::test]
    async fn success_charges_budget_once() {
        let provider = provider(vec![ok(r#"{"a": 1}"#, 1000, 500)]);
        let response = provider
            .create_language_completion(request(), &raw_json)
            .await
            .unwrap();

        assert_eq!(response.parsed, json!({"a": 1}));
        let expected = 0.025 + PER_CALL_OVERHEAD_USD;
        assert!((response.incremental_cost - expected).abs() < 1e-12);

        let budget = provider.budget().await;
        assert_eq!(budget.completions, 1);
        assert!((budget.total_cost - expected).abs() < 1e-12);
        assert!((provider.get_remaining_budget().await - (1.0 - expected)).abs() < 1e-12);
    }

    #[tokio::test(start_paused = true)]
    async fn retried_call_is_charged_once() {
        let provider = provider(vec![rate_limited(), rate_limited(), ok("{}", 10, 10)]);
        provider
            .create_language_completion(request(), &raw_json)
            .await
            .unwrap();

        assert_eq!(provider.backend().calls(), 3);
        let budget = provider.budget().await;
        assert_eq!(budget.completions, 1);
        assert_eq!(budget.usage, TokenUsage::new(10, 10));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_leave_budget_untouched() {
        let provider = provider((0..3).map(|_| rate_limited()).collect())
            .with_retry(RetryConfig {
                max_retries: 2,
                backoff_base: 2.0,
            });
        let result = provider.create_language_completion(request(), &raw_json).await;

        assert!(matches!(result, Err(PilotError::RateLimited { .. })));
        assert_eq!(provider.backend().calls(), 3);
        assert_eq!(provider.budget().await.total_cost, 0.0);
    }

    #[tokio::test]
    async fn context_overflow_is_rejected_before_sending() {
        let provider = provider(vec![ok("{}", 1, 1)]);
        let big = CompletionRequest::new("test-model", vec![Message::user("x".repeat(8_000))]);
        let result = provider.create_language_completion(big, &raw_json).await;

        assert!(matches!(result, Err(PilotError::ContextOverflow { max_tokens: 1_000, .. })));
        assert_eq!(provider.backend().calls(), 0);
    }

    #[tokio::test]
    async fn parser_failure_still_charges() {
        let provider = provider(vec![ok("not json", 100, 100)]);
        let result = provider.create_language_completion(request(), &raw_json).await;

        assert!(matches!(result, Err(PilotError::Serialization(_))));
        assert_eq!(provider.budget().await.completions, 1);
    }
}
