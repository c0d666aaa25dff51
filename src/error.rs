//! Top-level error type for the query agent

use thiserror::Error;

use crate::config::ConfigError;
use crate::session::UnknownSession;
use crate::store::StoreError;
use finquery_agent::TranslationError;

/// Any failure surfaced by `QueryAgent`
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Translation failed: {0}")]
    Translation(#[from] TranslationError),

    #[error("Query execution failed: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] UnknownSession),

    #[error("LLM client error: {0:#}")]
    Client(#[from] anyhow::Error),
}

pub type AgentResult<T> = std::result::Result<T, AgentError>;

impl AgentError {
    /// Failed before anything touched the store
    pub fn is_translation(&self) -> bool {
        matches!(self, AgentError::Translation(_))
    }
}
