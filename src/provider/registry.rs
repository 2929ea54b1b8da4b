use std::collections::HashMap;
use std::sync::Arc;

use crate::cost::ProviderBudget;
use crate::error::{PilotError, PilotResult};
use crate::settings::ProviderSettings;
use crate::types::ProviderKind;

use super::anthropic::AnthropicBackend;
use super::ollama::OllamaBackend;
use super::openai::OpenAIBackend;
use super::traits::ModelProvider;

/// Registry of available providers, one per kind
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn ModelProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Build the built-in backends described by `settings`
    pub fn from_settings(settings: &[ProviderSettings]) -> PilotResult<Self> {
        let mut registry = Self::new();
        for s in settings {
            let provider: Arc<dyn ModelProvider> = match &s.kind {
                ProviderKind::OpenAI => {
                    let backend = match &s.base_url {
                        Some(url) => OpenAIBackend::with_base_url(s.api_key.clone().unwrap_or_default(), url),
                        None => OpenAIBackend::new(s.api_key.clone().unwrap_or_default()),
                    };
                    let mut provider = backend.into_provider(&s.budget).with_retry(s.retry.clone());
                    for model in &s.models {
                        provider = provider.with_model(model.clone());
                    }
                    Arc::new(provider)
                }
                ProviderKind::Anthropic => {
                    let backend = match &s.base_url {
                        Some(url) => AnthropicBackend::with_base_url(s.api_key.clone().unwrap_or_default(), url),
                        None => AnthropicBackend::new(s.api_key.clone().unwrap_or_default()),
                    };
                    let mut provider = backend.into_provider(&s.budget).with_retry(s.retry.clone());
                    for model in &s.models {
                        provider = provider.with_model(model.clone());
                    }
                    Arc::new(provider)
                }
                ProviderKind::Ollama => {
                    let backend = match &s.base_url {
                        Some(url) => OllamaBackend::with_base_url(url),
                        None => OllamaBackend::new(),
                    };
                    let mut provider = backend.into_provider(&s.budget).with_retry(s.retry.clone());
                    for model in &s.models {
                        provider = provider.with_model(model.clone());
                    }
                    Arc::new(provider)
                }
                ProviderKind::Custom(name) => {
                    return Err(PilotError::Settings(format!(
                        "no built-in backend for provider {name}; register it directly"
                    )))
                }
            };
            registry.register(provider);
        }
        Ok(registry)
    }

    pub fn register(&mut self, provider: Arc<dyn ModelProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    pub fn with(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, kind: &ProviderKind) -> Option<Arc<dyn ModelProvider>> {
        self.providers.get(kind).cloned()
    }

    /// Like [`get`](Self::get), failing with a provider error when absent
    pub fn require(&self, kind: &ProviderKind) -> PilotResult<Arc<dyn ModelProvider>> {
        self.get(kind)
            .ok_or_else(|| PilotError::Provider(format!("provider not configured: {kind}")))
    }

    pub fn has(&self, kind: &ProviderKind) -> bool {
        self.providers.contains_key(kind)
    }

    pub fn providers(&self) -> Vec<ProviderKind> {
        self.providers.keys().cloned().collect()
    }

    /// Budget snapshot of every registered provider, sorted by kind name
    pub async fn budgets(&self) -> Vec<(ProviderKind, ProviderBudget)> {
        let mut budgets = Vec::with_capacity(self.providers.len());
        for (kind, provider) in &self.providers {
            budgets.push((kind.clone(), provider.budget().await));
        }
        budgets.sort_by_key(|(kind, _)| kind.to_string());
        budgets
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
