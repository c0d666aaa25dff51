//! Model backends
//!
//! Which provider answers translation and summary prompts. Selected in the
//! config file and overridable through `AGENT_BACKEND`.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const BACKEND_ENV: &str = "AGENT_BACKEND";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentBackend {
    #[default]
    #[serde(alias = "claude")]
    Anthropic,
    #[serde(alias = "gpt")]
    OpenAi,
    /// Any OpenAI-compatible server (llama.cpp, vLLM, Ollama)
    #[serde(alias = "llama")]
    Local,
}

/// Accepted spellings, matched case-insensitively
const ALIASES: &[(&str, AgentBackend)] = &[
    ("anthropic", AgentBackend::Anthropic),
    ("claude", AgentBackend::Anthropic),
    ("openai", AgentBackend::OpenAi),
    ("gpt", AgentBackend::OpenAi),
    ("local", AgentBackend::Local),
    ("llama", AgentBackend::Local),
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown backend '{given}' (expected one of: {expected})")]
pub struct ParseBackendError {
    pub given: String,
    pub expected: String,
}

impl AgentBackend {
    /// The backend named by `AGENT_BACKEND`, if that variable is set
    pub fn from_env() -> Result<Option<Self>> {
        let Ok(value) = std::env::var(BACKEND_ENV) else {
            return Ok(None);
        };
        Ok(Some(value.parse()?))
    }

    pub fn name(&self) -> &'static str {
        match self {
            AgentBackend::Anthropic => "Anthropic",
            AgentBackend::OpenAi => "OpenAI",
            AgentBackend::Local => "Local",
        }
    }

    /// Environment variable holding the API key; local servers need none
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            AgentBackend::Anthropic => Some("ANTHROPIC_API_KEY"),
            AgentBackend::OpenAi => Some("OPENAI_API_KEY"),
            AgentBackend::Local => None,
        }
    }

    /// Environment variable that overrides the model name
    pub fn model_env(&self) -> &'static str {
        match self {
            AgentBackend::Anthropic => "ANTHROPIC_MODEL",
            AgentBackend::OpenAi => "OPENAI_MODEL",
            AgentBackend::Local => "LOCAL_LLM_MODEL",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        self.api_key_env().is_some()
    }
}

impl FromStr for AgentBackend {
    type Err = ParseBackendError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim();
        ALIASES
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(wanted))
            .map(|(_, backend)| *backend)
            .ok_or_else(|| ParseBackendError {
                given: wanted.to_string(),
                expected: ALIASES
                    .iter()
                    .map(|(alias, _)| *alias)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

impl fmt::Display for AgentBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
