use serde::{Deserialize, Serialize};

use crate::types::{ModelInfo, TokenUsage};

use super::pricing::compute_cost;

/// Flat surcharge added to every successful completion, in USD.
pub const PER_CALL_OVERHEAD_USD: f64 = 0.0001;

/// Budget limits for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Total spend allowed, in USD. Unlimited by default.
    #[serde(default = "default_total_budget")]
    pub total_budget: f64,

    #[serde(default = "default_overhead")]
    pub per_call_overhead: f64,
}

fn default_total_budget() -> f64 {
    f64::INFINITY
}

fn default_overhead() -> f64 {
    PER_CALL_OVERHEAD_USD
}

impl BudgetConfig {
    pub fn new() -> Self {
        Self {
            total_budget: default_total_budget(),
            per_call_overhead: default_overhead(),
        }
    }

    pub fn with_total_budget(mut self, usd: f64) -> Self {
        self.total_budget = usd;
        self
    }

    pub fn with_overhead(mut self, usd: f64) -> Self {
        self.per_call_overhead = usd;
        self
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Running spend and token usage of one provider.
///
/// `remaining_budget` is always `total_budget - total_cost`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderBudget {
    pub total_budget: f64,
    pub total_cost: f64,
    pub remaining_budget: f64,
    pub usage: TokenUsage,
    #[serde(default)]
    pub completions: u64,
    per_call_overhead: f64,
}

impl ProviderBudget {
    pub fn new(config: &BudgetConfig) -> Self {
        Self {
            total_budget: config.total_budget,
            total_cost: 0.0,
            remaining_budget: config.total_budget,
            usage: TokenUsage::default(),
            completions: 0,
            per_call_overhead: config.per_call_overhead,
        }
    }

    /// Incremental cost of one completion, including the per-call overhead
    pub fn incremental_cost(&self, usage: &TokenUsage, model: &ModelInfo) -> f64 {
        compute_cost(usage, model) + self.per_call_overhead
    }

    /// Record a completed call. Returns the incremental cost charged.
    pub fn update_usage_and_cost(&mut self, usage: &TokenUsage, model: &ModelInfo) -> f64 {
        let cost = self.incremental_cost(usage, model);
        self.usage.add(usage);
        self.total_cost += cost;
        self.remaining_budget = self.total_budget - self.total_cost;
        self.completions += 1;
        cost
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_budget <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProviderKind;

    fn model(prompt_cost: f64, completion_cost: f64) -> ModelInfo {
        ModelInfo {
            name: "test-model".into(),
            provider: ProviderKind::OpenAI,
            max_tokens: 8192,
            prompt_token_cost: prompt_cost,
            completion_token_cost: completion_cost,
            supports_functions: true,
        }
    }

    #[test]
    fn new_budget_is_untouched() {
        let budget = ProviderBudget::new(&BudgetConfig::new().with_total_budget(10.0));
        assert_eq!(budget.total_cost, 0.0);
        assert_eq!(budget.remaining_budget, 10.0);
        assert_eq!(budget.usage, TokenUsage::default());
        assert!(!budget.is_exhausted());
    }

    #[test]
    fn update_applies_formula() {
        let mut budget = ProviderBudget::new(&BudgetConfig::new().with_total_budget(1.0));
        let usage = TokenUsage::new(1000, 500);
        let cost = budget.update_usage_and_cost(&usage, &model(0.01, 0.03));
        // (500 * 0.03 + 1000 * 0.01) / 1000 + overhead
        let expected = 0.025 + PER_CALL_OVERHEAD_USD;
        assert!((cost - expected).abs() < 1e-12);
        assert!((budget.total_cost - expected).abs() < 1e-12);
        assert!((budget.remaining_budget - (1.0 - expected)).abs() < 1e-12);
        assert_eq!(budget.usage.total_tokens, 1500);
        assert_eq!(budget.completions, 1);
    }

    #[test]
    fn remaining_tracks_total_minus_cost() {
        let mut budget = ProviderBudget::new(&BudgetConfig::new().with_total_budget(5.0));
        let m = model(0.0015, 0.002);
        for i in 1..=25 {
            budget.update_usage_and_cost(&TokenUsage::new(100 * i, 37 * i), &m);
            assert!((budget.remaining_budget - (budget.total_budget - budget.total_cost)).abs() < 1e-12);
        }
    }

    #[test]
    fn zero_overhead_config() {
        let mut budget = ProviderBudget::new(&BudgetConfig::new().with_overhead(0.0));
        let cost = budget.update_usage_and_cost(&TokenUsage::new(0, 0), &model(0.01, 0.03));
        assert_eq!(cost, 0.0);
    }

    #[test]
    fn exhausted_when_spent() {
        let mut budget = ProviderBudget::new(&BudgetConfig::new().with_total_budget(0.01));
        budget.update_usage_and_cost(&TokenUsage::new(1000, 1000), &model(0.01, 0.03));
        assert!(budget.is_exhausted());
    }

    #[test]
    fn unlimited_by_default() {
        let mut budget = ProviderBudget::new(&BudgetConfig::default());
        budget.update_usage_and_cost(&TokenUsage::new(1_000_000, 1_000_000), &model(0.01, 0.03));
        assert!(budget.remaining_budget.is_infinite());
        assert!(!budget.is_exhausted());
    }

    #[test]
    fn budget_config_serializes() {
        let config = BudgetConfig::new().with_total_budget(25.0);
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: BudgetConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, config);
    }
}
