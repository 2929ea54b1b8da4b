use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PilotError, PilotResult};
use crate::memory::Memory;
use crate::provider::{CompletionRequest, ModelProvider, ProviderRegistry, ProviderResponse};
use crate::types::{AssistantReply, FunctionSchema, Message};
use crate::workspace::Workspace;

use super::builtins;
use super::{Ability, AbilityAction, AbilityConfiguration, AbilityKind};

/// Builds one ability instance from its resolved resources
pub type AbilityFactory = Arc<dyn Fn(AbilityInit) -> PilotResult<Arc<dyn Ability>> + Send + Sync>;

/// Ability name → configuration, as persisted in settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbilityRegistrySettings {
    #[serde(default)]
    pub abilities: BTreeMap<String, AbilityConfiguration>,
}

impl AbilityRegistrySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, config: AbilityConfiguration) -> Self {
        self.abilities.insert(name.into(), config);
        self
    }
}

/// Shared resources the registry hands out on request
#[derive(Clone, Default)]
pub struct AbilityResources {
    pub providers: ProviderRegistry,
    pub memory: Option<Arc<dyn Memory>>,
    pub workspace: Option<Arc<dyn Workspace>>,
}

impl AbilityResources {
    pub fn new(providers: ProviderRegistry) -> Self {
        Self {
            providers,
            memory: None,
            workspace: None,
        }
    }

    pub fn with_memory(mut self, memory: Arc<dyn Memory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_workspace(mut self, workspace: Arc<dyn Workspace>) -> Self {
        self.workspace = Some(workspace);
        self
    }
}

/// A provider bound to the model and temperature an ability asked for
#[derive(Clone)]
pub struct LanguageModelHandle {
    pub provider: Arc<dyn ModelProvider>,
    pub model_name: String,
    pub temperature: f32,
}

impl LanguageModelHandle {
    /// Plain-text completion; the parsed value is the reply text
    pub async fn complete(&self, messages: Vec<Message>) -> PilotResult<ProviderResponse> {
        let request = CompletionRequest::new(self.model_name.clone(), messages)
            .with_temperature(self.temperature);
        let parser = |reply: &AssistantReply| -> PilotResult<serde_json::Value> {
            Ok(serde_json::Value::String(reply.content.clone()))
        };
        self.provider.create_language_completion(request, &parser).await
    }
}

/// Exactly the resources one ability's configuration requested
pub struct AbilityInit {
    pub name: String,
    pub configuration: AbilityConfiguration,
    pub language_model: Option<LanguageModelHandle>,
    pub memory: Option<Arc<dyn Memory>>,
    pub workspace: Option<Arc<dyn Workspace>>,
}

impl AbilityInit {
    fn unavailable(&self, resource: &str) -> PilotError {
        PilotError::ResourceUnavailable {
            ability: self.name.clone(),
            resource: resource.to_string(),
        }
    }

    /// Configured description, or the implementation's default
    pub fn description_or(&self, default: &str) -> String {
        self.configuration
            .description
            .clone()
            .unwrap_or_else(|| default.to_string())
    }

    pub fn require_language_model(&self) -> PilotResult<LanguageModelHandle> {
        self.language_model
            .clone()
            .ok_or_else(|| self.unavailable("language model"))
    }

    pub fn require_memory(&self) -> PilotResult<Arc<dyn Memory>> {
        self.memory.clone().ok_or_else(|| self.unavailable("memory"))
    }

    pub fn require_workspace(&self) -> PilotResult<Arc<dyn Workspace>> {
        self.workspace.clone().ok_or_else(|| self.unavailable("workspace"))
    }
}

/// Factories for every built-in [`AbilityKind`]
pub fn default_factories() -> HashMap<AbilityKind, AbilityFactory> {
    let mut factories: HashMap<AbilityKind, AbilityFactory> = HashMap::new();
    factories.insert(
        AbilityKind::QueryLanguageModel,
        Arc::new(|init: AbilityInit| Ok(Arc::new(builtins::QueryLanguageModel::from_init(init)?) as Arc<dyn Ability>)),
    );
    factories.insert(
        AbilityKind::TextSummarize,
        Arc::new(|init: AbilityInit| Ok(Arc::new(builtins::TextSummarize::from_init(init)?) as Arc<dyn Ability>)),
    );
    factories.insert(
        AbilityKind::ReadFile,
        Arc::new(|init: AbilityInit| Ok(Arc::new(builtins::ReadFile::from_init(init)?) as Arc<dyn Ability>)),
    );
    factories.insert(
        AbilityKind::WriteFile,
        Arc::new(|init: AbilityInit| Ok(Arc::new(builtins::WriteFile::from_init(init)?) as Arc<dyn Ability>)),
    );
    factories
}

/// Immutable set of ability instances, at most one per name.
pub struct AbilityRegistry {
    abilities: BTreeMap<String, Arc<dyn Ability>>,
    configurations: BTreeMap<String, AbilityConfiguration>,
}

impl AbilityRegistry {
    pub fn new() -> Self {
        Self {
            abilities: BTreeMap::new(),
            configurations: BTreeMap::new(),
        }
    }

    /// Instantiate every configured ability from its kind's factory
    pub fn build(
        settings: &AbilityRegistrySettings,
        resources: &AbilityResources,
        factories: &HashMap<AbilityKind, AbilityFactory>,
    ) -> PilotResult<Self> {
        let mut registry = Self::new();

        for (name, config) in &settings.abilities {
            let factory = factories
                .get(&config.location)
                .ok_or_else(|| PilotError::AbilityFactoryMissing {
                    kind: config.location.to_string(),
                })?;

            let unavailable = |resource: String| PilotError::ResourceUnavailable {
                ability: name.clone(),
                resource,
            };

            let language_model = match &config.language_model_required {
                Some(req) => {
                    let provider = resources.providers.get(&req.provider_name).ok_or_else(|| {
                        unavailable(format!("language model provider {}", req.provider_name))
                    })?;
                    Some(LanguageModelHandle {
                        provider,
                        model_name: req.model_name.clone(),
                        temperature: req.temperature,
                    })
                }
                None => None,
            };

            let memory = if config.memory_provider_required {
                Some(resources.memory.clone().ok_or_else(|| unavailable("memory".into()))?)
            } else {
                None
            };

            let workspace = if config.workspace_required {
                Some(
                    resources
                        .workspace
                        .clone()
                        .ok_or_else(|| unavailable("workspace".into()))?,
                )
            } else {
                None
            };

            let ability = factory(AbilityInit {
                name: name.clone(),
                configuration: config.clone(),
                language_model,
                memory,
                workspace,
            })?;

            debug!(ability = %name, kind = %config.location, "ability registered");
            registry.abilities.insert(name.clone(), ability);
            registry.configurations.insert(name.clone(), config.clone());
        }

        info!(count = registry.abilities.len(), "ability registry built");
        Ok(registry)
    }

    /// Add an already constructed ability under its own name
    pub fn with_ability(mut self, ability: Arc<dyn Ability>) -> Self {
        self.abilities.insert(ability.name().to_string(), ability);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Ability>> {
        self.abilities.get(name).cloned()
    }

    pub fn configuration(&self, name: &str) -> Option<&AbilityConfiguration> {
        self.configurations.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.abilities.keys().cloned().collect()
    }

    /// `name: description` lines for planning prompts
    pub fn list_abilities(&self) -> Vec<String> {
        self.abilities
            .iter()
            .map(|(name, ability)| format!("{name}: {}", ability.description()))
            .collect()
    }

    /// Function schemas of every ability
    pub fn dump_abilities(&self) -> Vec<FunctionSchema> {
        self.abilities.values().map(|a| a.schema()).collect()
    }

    pub fn len(&self) -> usize {
        self.abilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.abilities.is_empty()
    }

    /// Invoke an ability by name
    pub async fn perform(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> PilotResult<AbilityAction> {
        let ability = self
            .abilities
            .get(name)
            .ok_or_else(|| PilotError::AbilityNotFound {
                name: name.to_string(),
            })?;

        debug!(ability = %name, arguments = %arguments, "performing ability");
        let output = ability.invoke(arguments.clone()).await?;
        info!(ability = %name, success = output.success, "ability performed");

        Ok(AbilityAction::executed(name, arguments, output))
    }

    /// Launch every call together; results come back in launch order
    pub async fn perform_parallel(
        &self,
        calls: Vec<(String, serde_json::Value)>,
    ) -> Vec<PilotResult<AbilityAction>> {
        join_all(
            calls
                .into_iter()
                .map(|(name, arguments)| async move { self.perform(&name, arguments).await }),
        )
        .await
    }
}

impl Default for AbilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
