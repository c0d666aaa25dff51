//! Client Factory
//!
//! Builds an `LlmClient` for the selected backend. API keys are read from the
//! environment only.

use anyhow::{anyhow, Result};
use std::sync::Arc;

use crate::anthropic_client::AnthropicClient;
use crate::backend::AgentBackend;
use crate::llm_client::LlmClient;
use crate::openai_client::OpenAiClient;

/// Default endpoint for a local llama.cpp / OpenAI-compatible server
pub const DEFAULT_LOCAL_URL: &str = "http://localhost:8080/v1";

const DEFAULT_LOCAL_MODEL: &str = "mistral-7b-instruct-v0.2";

/// Backend from AGENT_BACKEND, falling back to `configured`
pub fn current_backend(configured: AgentBackend) -> Result<AgentBackend> {
    Ok(AgentBackend::from_env()?.unwrap_or(configured))
}

/// Create a client for `backend`, reading keys and models from the environment
pub fn create_llm_client(backend: AgentBackend, temperature: f32) -> Result<Arc<dyn LlmClient>> {
    let client: Arc<dyn LlmClient> = match backend {
        AgentBackend::Anthropic => {
            Arc::new(AnthropicClient::from_env()?.with_temperature(temperature))
        }
        AgentBackend::OpenAi => Arc::new(OpenAiClient::from_env()?.with_temperature(temperature)),
        AgentBackend::Local => {
            let url =
                std::env::var("LOCAL_LLM_URL").unwrap_or_else(|_| DEFAULT_LOCAL_URL.to_string());
            let model = std::env::var(backend.model_env())
                .unwrap_or_else(|_| DEFAULT_LOCAL_MODEL.to_string());
            Arc::new(OpenAiClient::local(&url, &model).with_temperature(temperature))
        }
    };

    tracing::info!(
        "Using {} backend with model {}",
        client.provider_name(),
        client.model_name()
    );
    Ok(client)
}

/// Create a client with an explicit API key (local backend ignores the key)
pub fn create_llm_client_with_key(
    backend: AgentBackend,
    api_key: String,
) -> Result<Arc<dyn LlmClient>> {
    if api_key.trim().is_empty() && backend.requires_api_key() {
        return Err(anyhow!("Empty API key for {} backend", backend));
    }
    let client: Arc<dyn LlmClient> = match backend {
        AgentBackend::Anthropic => Arc::new(AnthropicClient::new(api_key)),
        AgentBackend::OpenAi => Arc::new(OpenAiClient::new(api_key)),
        AgentBackend::Local => Arc::new(OpenAiClient::local(DEFAULT_LOCAL_URL, DEFAULT_LOCAL_MODEL)),
    };
    Ok(client)
}
