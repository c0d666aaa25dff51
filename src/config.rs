//! Configuration
//!
//! `FinqueryConfig` is read from YAML. The path comes from `FINQUERY_CONFIG`,
//! then `config/finquery.yaml`; with neither present the defaults apply.
//! Secrets never live in the file: API keys and the database URL are read
//! from the environment.

use finquery_agent::{AgentBackend, SummarizerSettings, TranslatorSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::executor::DEFAULT_RESULT_LIMIT;

pub const CONFIG_PATH_ENV: &str = "FINQUERY_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/finquery.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Environment variable {0} is not set")]
    MissingEnv(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FinqueryConfig {
    pub agent: AgentConfig,
    pub limits: LimitsConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub backend: AgentBackend,
    pub temperature: f32,
    /// Summarize one-shot results
    pub summarize: bool,
    pub translator: TranslatorSettings,
    pub summarizer: SummarizerSettings,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            backend: AgentBackend::default(),
            temperature: 0.0,
            summarize: true,
            translator: TranslatorSettings::default(),
            summarizer: SummarizerSettings::default(),
        }
    }
}

/// Result caps. `result_limit` bounds every store query; `preview_limit`
/// bounds how many of those rows a conversational turn shows the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub result_limit: usize,
    pub preview_limit: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            result_limit: DEFAULT_RESULT_LIMIT,
            preview_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Directory of `<collection>.json` fixtures for the memory backend
    pub fixtures_dir: PathBuf,
    /// Name of the environment variable holding the Postgres URL
    pub database_url_env: String,
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            fixtures_dir: PathBuf::from("data/fixtures"),
            database_url_env: "DATABASE_URL".to_string(),
            max_connections: 5,
        }
    }
}

impl StoreConfig {
    pub fn database_url(&self) -> Result<String, ConfigError> {
        std::env::var(&self.database_url_env)
            .map_err(|_| ConfigError::MissingEnv(self.database_url_env.clone()))
    }
}

impl FinqueryConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        // An empty file is a valid, all-default config
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.result_limit == 0 {
            return Err(ConfigError::Invalid(
                "limits.result_limit must be at least 1".into(),
            ));
        }
        if self.limits.preview_limit == 0 {
            return Err(ConfigError::Invalid(
                "limits.preview_limit must be at least 1".into(),
            ));
        }
        if self.agent.translator.max_tokens == 0 {
            return Err(ConfigError::Invalid(
                "agent.translator.max_tokens must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Apply `AGENT_BACKEND` from `lookup`. Model and endpoint overrides are
    /// read by the client factory itself.
    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup("AGENT_BACKEND") {
            self.agent.backend = value
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("AGENT_BACKEND: {}", e)))?;
            debug!("AGENT_BACKEND overrides backend: {}", self.agent.backend);
        }
        Ok(())
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from the process environment and filesystem
    pub fn load() -> Result<FinqueryConfig, ConfigError> {
        Self::load_with_path(None)
    }

    /// Like `load`, but an explicit `path` wins over `FINQUERY_CONFIG`
    pub fn load_with_path(path: Option<&Path>) -> Result<FinqueryConfig, ConfigError> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));
        let mut config = match explicit {
            Some(path) => Self::load_from_path(&path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::load_from_path(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => {
                info!("No config file found, using defaults");
                FinqueryConfig::default()
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<FinqueryConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = FinqueryConfig::from_yaml_str(&content).map_err(|source| {
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
