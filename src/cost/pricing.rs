use crate::types::{ModelInfo, ProviderKind, TokenUsage};

/// Built-in catalog: (name, provider, token limit, prompt $/1k, completion $/1k).
const CATALOG: &[(&str, ProviderKindTag, usize, f64, f64)] = &[
    // OpenAI
    ("gpt-3.5-turbo", ProviderKindTag::OpenAI, 16_384, 0.0005, 0.0015),
    ("gpt-4", ProviderKindTag::OpenAI, 8_191, 0.03, 0.06),
    ("gpt-4-turbo", ProviderKindTag::OpenAI, 128_000, 0.01, 0.03),
    ("gpt-4o", ProviderKindTag::OpenAI, 128_000, 0.0025, 0.01),
    ("gpt-4o-mini", ProviderKindTag::OpenAI, 128_000, 0.00015, 0.0006),
    // Anthropic
    ("claude-3-5-haiku-20241022", ProviderKindTag::Anthropic, 200_000, 0.0008, 0.004),
    ("claude-3-5-sonnet-20241022", ProviderKindTag::Anthropic, 200_000, 0.003, 0.015),
    ("claude-sonnet-4-20250514", ProviderKindTag::Anthropic, 200_000, 0.003, 0.015),
    ("claude-opus-4-20250514", ProviderKindTag::Anthropic, 200_000, 0.015, 0.075),
    // Local models cost nothing per token
    ("llama3.1", ProviderKindTag::Ollama, 128_000, 0.0, 0.0),
    ("mistral", ProviderKindTag::Ollama, 32_768, 0.0, 0.0),
    ("qwen2.5", ProviderKindTag::Ollama, 32_768, 0.0, 0.0),
];

#[derive(Clone, Copy)]
enum ProviderKindTag {
    OpenAI,
    Anthropic,
    Ollama,
}

impl ProviderKindTag {
    fn kind(self) -> ProviderKind {
        match self {
            ProviderKindTag::OpenAI => ProviderKind::OpenAI,
            ProviderKindTag::Anthropic => ProviderKind::Anthropic,
            ProviderKindTag::Ollama => ProviderKind::Ollama,
        }
    }
}

/// Look up a built-in model by name.
pub fn model_info(name: &str) -> Option<ModelInfo> {
    CATALOG
        .iter()
        .find(|(n, ..)| *n == name)
        .map(|&(n, tag, max_tokens, prompt, completion)| ModelInfo {
            name: n.to_string(),
            provider: tag.kind(),
            max_tokens,
            prompt_token_cost: prompt,
            completion_token_cost: completion,
            supports_functions: true,
        })
}

/// All built-in models served by `provider`.
pub fn models_for(provider: &ProviderKind) -> Vec<ModelInfo> {
    CATALOG
        .iter()
        .filter(|(_, tag, ..)| tag.kind() == *provider)
        .filter_map(|(n, ..)| model_info(n))
        .collect()
}

/// Token cost of one completion, before the per-call overhead.
///
/// Model costs are per 1000 tokens.
pub fn compute_cost(usage: &TokenUsage, model: &ModelInfo) -> f64 {
    (usage.completion_tokens as f64 * model.completion_token_cost
        + usage.prompt_tokens as f64 * model.prompt_token_cost)
        / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_lookup() {
        let info = model_info("gpt-4").unwrap();
        assert_eq!(info.provider, ProviderKind::OpenAI);
        assert_eq!(info.max_tokens, 8_191);
        assert_eq!(info.prompt_token_cost, 0.03);
        assert_eq!(info.completion_token_cost, 0.06);
    }

    #[test]
    fn unknown_model_is_none() {
        assert!(model_info("some-unknown-model-v99").is_none());
    }

    #[test]
    fn models_for_provider() {
        let anthropic = models_for(&ProviderKind::Anthropic);
        assert!(!anthropic.is_empty());
        assert!(anthropic.iter().all(|m| m.provider == ProviderKind::Anthropic));
        assert!(models_for(&ProviderKind::Custom("x".into())).is_empty());
    }

    #[test]
    fn local_models_are_free() {
        let info = model_info("llama3.1").unwrap();
        assert_eq!(compute_cost(&TokenUsage::new(10_000, 10_000), &info), 0.0);
    }

    #[test]
    fn compute_cost_per_thousand() {
        let info = model_info("gpt-4").unwrap();
        let cost = compute_cost(&TokenUsage::new(1000, 500), &info);
        // 1000 * 0.03 / 1000 + 500 * 0.06 / 1000 = 0.03 + 0.03
        assert!((cost - 0.06).abs() < 1e-12);
    }

    #[test]
    fn compute_cost_zero_tokens() {
        let info = model_info("gpt-4o").unwrap();
        assert_eq!(compute_cost(&TokenUsage::new(0, 0), &info), 0.0);
    }
}
