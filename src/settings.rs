//! Persisted settings: `{workspace}/settings.yaml`.
//!
//! Settings are read once at startup and handed to constructors. Nothing
//! mutates them afterwards; to change a setting, build a new pilot.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ability::{AbilityConfiguration, AbilityKind, AbilityRegistrySettings};
use crate::cost::BudgetConfig;
use crate::error::{PilotError, PilotResult};
use crate::pilot::PilotConfig;
use crate::planner::PlannerConfiguration;
use crate::provider::RetryConfig;
use crate::types::{ModelInfo, ProviderKind};
use crate::workspace::WorkspaceSettings;

pub const SETTINGS_FILE: &str = "settings.yaml";
pub const LOG_DIR: &str = "logs";

/// One model backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Added to, or overriding, the built-in model catalog
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<ModelInfo>,
}

impl ProviderSettings {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            api_key: None,
            base_url: None,
            budget: BudgetConfig::default(),
            retry: RetryConfig::default(),
            models: Vec::new(),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_budget(mut self, budget: BudgetConfig) -> Self {
        self.budget = budget;
        self
    }
}

/// Everything needed to build a pilot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PilotSettings {
    #[serde(default)]
    pub pilot: PilotConfig,
    #[serde(default)]
    pub planner: PlannerConfiguration,
    #[serde(default)]
    pub providers: Vec<ProviderSettings>,
    #[serde(default)]
    pub abilities: AbilityRegistrySettings,
    pub workspace: WorkspaceSettings,
}

impl PilotSettings {
    /// Defaults for a workspace at `root`: one OpenAI provider and the
    /// built-in abilities
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            pilot: PilotConfig::default(),
            planner: PlannerConfiguration::default(),
            providers: vec![ProviderSettings::new(ProviderKind::OpenAI)],
            abilities: default_abilities(),
            workspace: WorkspaceSettings::new(root),
        }
    }

    pub fn settings_path(root: &Path) -> PathBuf {
        root.join(SETTINGS_FILE)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.workspace.root.join(LOG_DIR)
    }

    pub fn from_yaml(yaml: &str) -> PilotResult<Self> {
        let settings: Self = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_yaml(&self) -> PilotResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Every provider an ability or the planner names must be configured
    pub fn validate(&self) -> PilotResult<()> {
        let configured = |kind: &ProviderKind| self.providers.iter().any(|p| &p.kind == kind);

        for (name, config) in &self.abilities.abilities {
            if let Some(req) = &config.language_model_required {
                if !configured(&req.provider_name) {
                    return Err(PilotError::Settings(format!(
                        "ability {name} needs provider {}, which is not configured",
                        req.provider_name
                    )));
                }
            }
        }
        for model in [&self.planner.fast, &self.planner.smart] {
            if !configured(&model.provider_name) {
                return Err(PilotError::Settings(format!(
                    "planner model {} needs provider {}, which is not configured",
                    model.model_name, model.provider_name
                )));
            }
        }
        Ok(())
    }

    /// Read `{root}/settings.yaml`
    pub async fn load(root: &Path) -> PilotResult<Self> {
        let path = Self::settings_path(root);
        let yaml = tokio::fs::read_to_string(&path).await?;
        let settings = Self::from_yaml(&yaml)?;
        info!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Write to `{workspace.root}/settings.yaml`, creating the workspace
    pub async fn save(&self) -> PilotResult<PathBuf> {
        tokio::fs::create_dir_all(&self.workspace.root).await?;
        let path = Self::settings_path(&self.workspace.root);
        tokio::fs::write(&path, self.to_yaml()?).await?;
        Ok(path)
    }
}

/// The four built-in abilities, language-model ones on the fast OpenAI model
pub fn default_abilities() -> AbilityRegistrySettings {
    AbilityRegistrySettings::new()
        .with(
            "query_language_model",
            AbilityConfiguration::new(AbilityKind::QueryLanguageModel).with_language_model(
                ProviderKind::OpenAI,
                "gpt-3.5-turbo",
                0.9,
            ),
        )
        .with(
            "text_summarize",
            AbilityConfiguration::new(AbilityKind::TextSummarize).with_language_model(
                ProviderKind::OpenAI,
                "gpt-3.5-turbo",
                0.0,
            ),
        )
        .with(
            "read_file",
            AbilityConfiguration::new(AbilityKind::ReadFile).with_workspace(),
        )
        .with(
            "write_file",
            AbilityConfiguration::new(AbilityKind::WriteFile).with_workspace(),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pilot::ExecutionMode;

    #[test]
    fn defaults_validate() {
        let settings = PilotSettings::new("/tmp/pilot");
        settings.validate().unwrap();
        assert_eq!(settings.abilities.abilities.len(), 4);
        assert_eq!(settings.log_dir(), PathBuf::from("/tmp/pilot/logs"));
    }

    #[test]
    fn minimal_yaml_fills_defaults() {
        let yaml = "\
providers:
  - kind: openai
    api_key: sk-test
workspace:
  root: /tmp/pilot
";
        let settings = PilotSettings::from_yaml(yaml).unwrap();
        assert_eq!(settings.pilot, PilotConfig::default());
        assert!(settings.abilities.abilities.is_empty());
        assert_eq!(settings.providers[0].retry.max_retries, 10);
        assert!(settings.providers[0].budget.total_budget.is_infinite());
        assert!(settings.workspace.restrict_to_root);
    }

    #[test]
    fn unconfigured_provider_is_rejected() {
        let mut settings = PilotSettings::new("/tmp/pilot");
        settings.providers = vec![ProviderSettings::new(ProviderKind::Ollama)];
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, PilotError::Settings(_)));
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = PilotSettings::new(dir.path());
        settings.pilot = PilotConfig::new()
            .with_max_task_cycle_count(5)
            .with_mode(ExecutionMode::BestEffort);
        settings.providers[0] = ProviderSettings::new(ProviderKind::OpenAI)
            .with_api_key("sk-test")
            .with_budget(BudgetConfig::new().with_total_budget(2.5));

        let path = settings.save().await.unwrap();
        assert_eq!(path, dir.path().join(SETTINGS_FILE));

        let loaded = PilotSettings::load(dir.path()).await.unwrap();
        assert_eq!(loaded, settings);
    }

    #[tokio::test]
    async fn load_missing_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            PilotSettings::load(dir.path()).await,
            Err(PilotError::Io(_))
        ));
    }
}
