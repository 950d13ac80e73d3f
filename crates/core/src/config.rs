//! # Settings
//!
//! Resolved configuration: an optional YAML file overlaid by environment
//! variables. Missing credentials are not fatal; [`Settings::validate`]
//! records a Warning for each one and the system runs with reduced
//! functionality.
//!
//! ```yaml
//! language: Kotlin
//! llm:
//!   provider: anthropic
//!   model: claude-sonnet-4-20250514
//!   temperature: 0.2
//! github:
//!   owner: acme
//!   repo: shop
//! agents:
//!   reviewer:
//!     max_rpm: 10
//! tasks:
//!   review:
//!     expected_output: A bullet list of defects.
//! ```

use crate::agents::{AgentKind, ProfileUpdate, DEFAULT_LANGUAGE};
use crate::crew::{StageKind, TaskOverride};
use crate::errors::{AppError, ErrorCategory, ErrorStore};
use crate::models::ModelConfig;
use crate::tools::github::GitHubConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/devteam.yaml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub llm: ModelConfig,
    pub github: GitHubConfig,
    /// Target programming language of the crew
    pub language: String,
    /// Directory holding the response cache files
    pub cache_dir: PathBuf,
    /// Root the file-read tool is confined to
    pub workspace_root: PathBuf,
    /// Preferred SearXNG instance for web search
    pub search_url: Option<String>,
    pub agents: HashMap<AgentKind, ProfileUpdate>,
    pub tasks: HashMap<StageKind, TaskOverride>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            llm: ModelConfig::default(),
            github: GitHubConfig::default(),
            language: DEFAULT_LANGUAGE.to_string(),
            cache_dir: PathBuf::from("."),
            workspace_root: PathBuf::from("."),
            search_url: None,
            agents: HashMap::new(),
            tasks: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load from `path` (or the default location when it exists), then
    /// overlay the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => {
                tracing::debug!("No settings file, using defaults");
                Self::default()
            }
        };
        settings.apply_env_from(|key| std::env::var(key).ok())?;
        settings.llm.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let settings = Self::from_yaml_str(&text)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        tracing::info!(path = %path.display(), "Settings loaded");
        Ok(settings)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Overlay non-empty values from `lookup`, keyed by environment variable
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(provider) = lookup("LLM_PROVIDER") {
            self.llm.provider = provider.parse()?;
        }
        if let Some(model) = lookup("ANTHROPIC_MODEL") {
            self.llm.model = model;
        }
        if let Some(temperature) = lookup("TEMPERATURE") {
            self.llm.temperature = temperature
                .trim()
                .parse()
                .with_context(|| format!("invalid TEMPERATURE value '{}'", temperature))?;
        }
        self.github.overlay(&lookup);
        if let Some(language) = lookup("DEVTEAM_LANGUAGE") {
            self.language = language;
        }
        if let Some(dir) = lookup("DEVTEAM_CACHE_DIR") {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(root) = lookup("DEVTEAM_WORKSPACE") {
            self.workspace_root = PathBuf::from(root);
        }
        if let Some(url) = lookup("SEARXNG_URL") {
            self.search_url = Some(url);
        }
        Ok(())
    }

    /// Record a Warning for every missing credential
    pub fn validate(&self, store: &ErrorStore) -> Vec<AppError> {
        self.validate_with(store, |key| std::env::var(key).ok())
    }

    pub fn validate_with(
        &self,
        store: &ErrorStore,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Vec<AppError> {
        let mut warnings = Vec::new();

        let key_env = self.llm.provider.api_key_env();
        if lookup(key_env).filter(|v| !v.trim().is_empty()).is_none() {
            warnings.push(store.warning(
                format!("{} not set. Language model calls will fail.", key_env),
                ErrorCategory::Configuration,
            ));
        }
        if self.github.token.is_none() {
            warnings.push(store.warning(
                "GITHUB_ACCESS_TOKEN not set. GitHub integration will not work.",
                ErrorCategory::Configuration,
            ));
        }
        if self.github.owner.is_none() || self.github.repo.is_none() {
            warnings.push(store.warning(
                "GITHUB_OWNER or GITHUB_REPO not set. Repository actions need an explicit repository.",
                ErrorCategory::Configuration,
            ));
        }
        warnings
    }

    pub fn model_config(&self) -> ModelConfig {
        self.llm.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Severity;
    use crate::models::LlmProvider;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_yaml_sections() {
        let settings = Settings::from_yaml_str(
            r#"
language: Kotlin
llm:
  provider: openai
  model: gpt-4o
  temperature: 0.5
github:
  owner: acme
agents:
  reviewer:
    max_rpm: 10
    goal: Find every defect
tasks:
  review:
    expected_output: A bullet list of defects.
"#,
        )
        .unwrap();

        assert_eq!(settings.language, "Kotlin");
        assert_eq!(settings.llm.provider, LlmProvider::OpenAI);
        assert_eq!(settings.llm.temperature, 0.5);
        assert_eq!(settings.github.owner.as_deref(), Some("acme"));
        assert_eq!(settings.github.api_url, "https://api.github.com");
        let reviewer = &settings.agents[&AgentKind::Reviewer];
        assert_eq!(reviewer.max_rpm, Some(Some(10)));
        assert_eq!(reviewer.goal.as_deref(), Some("Find every defect"));
        assert_eq!(
            settings.tasks[&StageKind::Review].expected_output.as_deref(),
            Some("A bullet list of defects.")
        );
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let settings = Settings::from_yaml_str("").unwrap();
        assert_eq!(settings.language, "Java");
        assert_eq!(settings.llm, ModelConfig::default());
    }

    #[test]
    fn test_env_overlay() {
        let mut settings = Settings::default();
        settings
            .apply_env_from(env(&[
                ("ANTHROPIC_MODEL", "claude-opus-4"),
                ("TEMPERATURE", "0.7"),
                ("GITHUB_TOKEN", "ghp_x"),
                ("GITHUB_OWNER", "acme"),
                ("DEVTEAM_LANGUAGE", "Python"),
                ("DEVTEAM_CACHE_DIR", "/tmp/devteam"),
                ("SEARXNG_URL", ""),
            ]))
            .unwrap();

        assert_eq!(settings.llm.model, "claude-opus-4");
        assert_eq!(settings.llm.temperature, 0.7);
        assert_eq!(settings.github.token.as_deref(), Some("ghp_x"));
        assert_eq!(settings.language, "Python");
        assert_eq!(settings.cache_dir, PathBuf::from("/tmp/devteam"));
        assert!(settings.search_url.is_none());
    }

    #[test]
    fn test_bad_env_values() {
        let mut settings = Settings::default();
        let err = settings
            .apply_env_from(env(&[("TEMPERATURE", "warm")]))
            .unwrap_err();
        assert!(err.to_string().contains("invalid TEMPERATURE"));

        let err = settings
            .apply_env_from(env(&[("LLM_PROVIDER", "mystery")]))
            .unwrap_err();
        assert!(err.to_string().contains("invalid LLM provider"));
    }

    #[test]
    fn test_out_of_range_temperature_rejected_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devteam.yaml");
        std::fs::write(&path, "llm:\n  temperature: 1.5\n").unwrap();
        let err = Settings::load(Some(&path)).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid temperature"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = Settings::load(Some(Path::new("/nonexistent/devteam.yaml"))).unwrap_err();
        assert!(err.to_string().contains("reading config file"));
    }

    #[test]
    fn test_validation_records_warnings() {
        let store = ErrorStore::new();
        let warnings = Settings::default().validate_with(&store, env(&[]));
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().all(|w| w.severity() == Severity::Warning));
        assert!(warnings[0].message().contains("ANTHROPIC_API_KEY"));
        assert_eq!(store.summary().warning, 3);
        assert!(!store.has_critical_errors());

        let store = ErrorStore::new();
        let mut settings = Settings::default();
        settings.github.token = Some("t".to_string());
        settings.github.owner = Some("o".to_string());
        settings.github.repo = Some("r".to_string());
        let warnings = settings.validate_with(&store, env(&[("ANTHROPIC_API_KEY", "k")]));
        assert!(warnings.is_empty());
        assert!(store.is_empty());
    }
}
