//! OpenAI Client
//!
//! LLM client implementation for the OpenAI chat completions API. Also used
//! for local OpenAI-compatible servers (llama.cpp, vLLM, Ollama) via
//! `with_base_url`, which don't need an API key.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::llm_client::{LlmClient, ToolCallResult, ToolDefinition};

/// Default OpenAI model
const DEFAULT_MODEL: &str = "gpt-4o";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI API client
#[derive(Clone)]
pub struct OpenAiClient {
    api_key: Option<String>,
    client: reqwest::Client,
    model: String,
    base_url: String,
    temperature: f32,
    provider: &'static str,
}

impl OpenAiClient {
    /// Create a new OpenAI client with the given API key
    pub fn new(api_key: String) -> Self {
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self::with_model(api_key, &model)
    }

    /// Create with a specific model
    pub fn with_model(api_key: String, model: &str) -> Self {
        Self {
            api_key: Some(api_key),
            client: reqwest::Client::new(),
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.0,
            provider: "OpenAI",
        }
    }

    /// Create a client for a local OpenAI-compatible server
    pub fn local(base_url: &str, model: &str) -> Self {
        Self {
            api_key: None,
            client: reqwest::Client::new(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            temperature: 0.0,
            provider: "Local",
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key))
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn post(&self, body: serde_json::Value) -> Result<String> {
        let mut request = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("{} API error {}: {}", self.provider, status, body));
        }

        Ok(response.text().await?)
    }

    /// Internal API call implementation
    async fn call_api(&self, prompt: &str, max_tokens: usize) -> Result<String> {
        let response_text = self
            .post(serde_json::json!({
                "model": &self.model,
                "messages": [{"role": "user", "content": prompt}],
                "max_tokens": max_tokens,
                "temperature": self.temperature
            }))
            .await?;

        #[derive(Deserialize)]
        struct Message {
            content: Option<String>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            choices: Vec<Choice>,
        }

        let api_response: ApiResponse = serde_json::from_str(&response_text)
            .map_err(|e| anyhow!("Failed to parse {} response: {}", self.provider, e))?;
        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("{} returned no choices", self.provider))
    }

    /// Internal API call with function_calling for structured output
    async fn call_api_with_tool(
        &self,
        prompt: &str,
        max_tokens: usize,
        tool: &ToolDefinition,
    ) -> Result<ToolCallResult> {
        let response_text = self
            .post(serde_json::json!({
                "model": &self.model,
                "messages": [{"role": "user", "content": prompt}],
                "max_tokens": max_tokens,
                "temperature": self.temperature,
                "functions": [{
                    "name": &tool.name,
                    "description": &tool.description,
                    "parameters": &tool.parameters
                }],
                "function_call": {"name": &tool.name}
            }))
            .await?;

        tracing::debug!(
            "{} raw response: {}",
            self.provider,
            &response_text[..response_text.len().min(1000)]
        );

        // Response format: { "choices": [{ "message": { "function_call": { "name": "...", "arguments": "..." } } }] }
        #[derive(Deserialize)]
        struct FunctionCall {
            name: String,
            arguments: String, // arguments arrive as a JSON string
        }
        #[derive(Deserialize)]
        struct Message {
            function_call: Option<FunctionCall>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            choices: Vec<Choice>,
        }

        let api_response: ApiResponse = serde_json::from_str(&response_text)
            .map_err(|e| anyhow!("Failed to parse {} response: {}", self.provider, e))?;

        let function_call = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.function_call)
            .ok_or_else(|| anyhow!("No function_call in {} response", self.provider))?;

        let arguments: serde_json::Value = serde_json::from_str(&function_call.arguments)
            .map_err(|e| anyhow!("Failed to parse function arguments: {}", e))?;

        Ok(ToolCallResult {
            tool_name: function_call.name,
            arguments,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, prompt: &str, max_tokens: usize) -> Result<String> {
        self.call_api(prompt, max_tokens).await
    }

    async fn complete_with_tool(
        &self,
        prompt: &str,
        max_tokens: usize,
        tool: &ToolDefinition,
    ) -> Result<ToolCallResult> {
        self.call_api_with_tool(prompt, max_tokens, tool).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        self.provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_model() {
        let client = OpenAiClient::with_model("test-key".to_string(), "gpt-4o-mini");
        assert_eq!(client.model_name(), "gpt-4o-mini");
        assert_eq!(client.provider_name(), "OpenAI");
        assert_eq!(client.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_local_endpoint() {
        let client = OpenAiClient::local("http://localhost:8080/v1/", "mistral-7b-instruct");
        assert_eq!(client.provider_name(), "Local");
        assert!(client.api_key.is_none());
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/chat/completions");
    }
}
