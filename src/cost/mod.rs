//! Budget accounting for model providers.
//!
//! Each provider owns one [`BudgetTracker`]. The tracker is the single
//! mutation point for spend: it is updated once per successful completion
//! and never for failed or retried calls.
//!
//! # Example
//!
//! ```rust
//! use pilot_core::cost::{BudgetConfig, BudgetTracker};
//!
//! let tracker = BudgetTracker::new("openai", &BudgetConfig::new().with_total_budget(1.0));
//! ```

pub mod budget;
pub mod pricing;

pub use budget::{BudgetConfig, ProviderBudget, PER_CALL_OVERHEAD_USD};
pub use pricing::{compute_cost, model_info, models_for};

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::types::{ModelInfo, TokenUsage};

/// Shared handle on a provider's budget.
#[derive(Clone)]
pub struct BudgetTracker {
    inner: Arc<RwLock<TrackerState>>,
    provider: String,
}

#[derive(Debug, Clone)]
struct TrackerState {
    budget: ProviderBudget,
    by_model: HashMap<String, ModelCostBreakdown>,
}

/// Cost breakdown for a specific model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCostBreakdown {
    pub model: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost_usd: f64,
    pub request_count: u64,
}

/// Emitted after each recorded completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEvent {
    pub provider: String,
    pub model: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub incremental_cost: f64,
    pub cumulative_cost: f64,
    pub timestamp_ms: u64,
}

impl BudgetTracker {
    pub fn new(provider: impl Into<String>, config: &BudgetConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(TrackerState {
                budget: ProviderBudget::new(config),
                by_model: HashMap::new(),
            })),
            provider: provider.into(),
        }
    }

    /// Charge one completed call against the budget.
    pub async fn record(&self, usage: &TokenUsage, model: &ModelInfo) -> CostEvent {
        let now_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        let mut state = self.inner.write().await;
        let cost = state.budget.update_usage_and_cost(usage, model);
        let cumulative_cost = state.budget.total_cost;

        let entry = state
            .by_model
            .entry(model.name.clone())
            .or_insert_with(|| ModelCostBreakdown {
                model: model.name.clone(),
                prompt_tokens: 0,
                completion_tokens: 0,
                cost_usd: 0.0,
                request_count: 0,
            });
        entry.prompt_tokens += usage.prompt_tokens as u64;
        entry.completion_tokens += usage.completion_tokens as u64;
        entry.cost_usd += cost;
        entry.request_count += 1;

        CostEvent {
            provider: self.provider.clone(),
            model: model.name.clone(),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            incremental_cost: cost,
            cumulative_cost,
            timestamp_ms: now_ms,
        }
    }

    pub async fn snapshot(&self) -> ProviderBudget {
        self.inner.read().await.budget.clone()
    }

    pub async fn remaining_budget(&self) -> f64 {
        self.inner.read().await.budget.remaining_budget
    }

    pub async fn total_cost(&self) -> f64 {
        self.inner.read().await.budget.total_cost
    }

    pub async fn by_model(&self) -> Vec<ModelCostBreakdown> {
        let mut models: Vec<_> = self.inner.read().await.by_model.values().cloned().collect();
        models.sort_by(|a, b| a.model.cmp(&b.model));
        models
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProviderKind;

    fn test_model(name: &str) -> ModelInfo {
        ModelInfo {
            name: name.into(),
            provider: ProviderKind::OpenAI,
            max_tokens: 8192,
            prompt_token_cost: 0.01,
            completion_token_cost: 0.03,
            supports_functions: true,
        }
    }

    #[tokio::test]
    async fn record_single_completion() {
        let tracker = BudgetTracker::new("openai", &BudgetConfig::new().with_total_budget(1.0));
        let event = tracker.record(&TokenUsage::new(1000, 500), &test_model("gpt-4")).await;

        assert_eq!(event.provider, "openai");
        assert_eq!(event.prompt_tokens, 1000);
        assert_eq!(event.completion_tokens, 500);
        assert_eq!(event.cumulative_cost, event.incremental_cost);
        let remaining = tracker.remaining_budget().await;
        assert!((remaining - (1.0 - event.incremental_cost)).abs() < 1e-12);
    }

    #[tokio::test]
    async fn accumulates_across_calls() {
        let tracker = BudgetTracker::new("openai", &BudgetConfig::new().with_total_budget(1.0));
        let model = test_model("gpt-4");
        let e1 = tracker.record(&TokenUsage::new(100, 10), &model).await;
        let e2 = tracker.record(&TokenUsage::new(200, 20), &model).await;

        assert!((e2.cumulative_cost - (e1.incremental_cost + e2.incremental_cost)).abs() < 1e-12);
        let snapshot = tracker.snapshot().await;
        assert_eq!(snapshot.completions, 2);
        assert_eq!(snapshot.usage.total_tokens, 330);
    }

    #[tokio::test]
    async fn by_model_breakdown() {
        let tracker = BudgetTracker::new("openai", &BudgetConfig::default());
        tracker.record(&TokenUsage::new(10, 10), &test_model("gpt-4")).await;
        tracker.record(&TokenUsage::new(10, 10), &test_model("gpt-4o")).await;
        tracker.record(&TokenUsage::new(10, 10), &test_model("gpt-4o")).await;

        let models = tracker.by_model().await;
        assert_eq!(models.len(), 2);
        assert_eq!(models[1].model, "gpt-4o");
        assert_eq!(models[1].request_count, 2);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let tracker = BudgetTracker::new("openai", &BudgetConfig::default());
        let clone = tracker.clone();
        clone.record(&TokenUsage::new(1000, 0), &test_model("gpt-4")).await;
        assert!(tracker.total_cost().await > 0.0);
    }

    #[tokio::test]
    async fn cost_event_serializes() {
        let tracker = BudgetTracker::new("openai", &BudgetConfig::default());
        let event = tracker.record(&TokenUsage::new(1, 1), &test_model("gpt-4")).await;
        let json = serde_json::to_string(&event).unwrap();
        let back: CostEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.model, "gpt-4");
    }
}
