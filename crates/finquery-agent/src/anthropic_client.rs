//! Anthropic Client
//!
//! LLM client implementation for Anthropic Claude API.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::llm_client::{LlmClient, ToolCallResult, ToolDefinition};

/// Default Anthropic model
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

const API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic Claude API client
#[derive(Clone)]
pub struct AnthropicClient {
    api_key: String,
    client: reqwest::Client,
    model: String,
    temperature: f32,
}

impl AnthropicClient {
    /// Create a new Anthropic client with the given API key
    pub fn new(api_key: String) -> Self {
        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self::with_model(api_key, &model)
    }

    /// Create with a specific model
    pub fn with_model(api_key: String, model: &str) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            model: model.to_string(),
            temperature: 0.0,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow!("ANTHROPIC_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    async fn post(&self, body: serde_json::Value) -> Result<String> {
        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Anthropic API error {}: {}", status, body));
        }

        Ok(response.text().await?)
    }

    /// Internal API call implementation
    async fn call_api(&self, prompt: &str, max_tokens: usize) -> Result<String> {
        let response_text = self
            .post(serde_json::json!({
                "model": &self.model,
                "max_tokens": max_tokens,
                "temperature": self.temperature,
                "messages": [{"role": "user", "content": prompt}]
            }))
            .await?;

        #[derive(Deserialize)]
        struct ContentBlock {
            text: Option<String>,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            content: Vec<ContentBlock>,
        }

        let api_response: ApiResponse = serde_json::from_str(&response_text)
            .map_err(|e| anyhow!("Failed to parse Anthropic response: {}", e))?;
        api_response
            .content
            .into_iter()
            .find_map(|c| c.text)
            .ok_or_else(|| anyhow!("Empty response from Anthropic"))
    }

    async fn call_api_with_tool(
        &self,
        prompt: &str,
        max_tokens: usize,
        tool: &ToolDefinition,
    ) -> Result<ToolCallResult> {
        let response_text = self
            .post(serde_json::json!({
                "model": &self.model,
                "max_tokens": max_tokens,
                "temperature": self.temperature,
                "messages": [{"role": "user", "content": prompt}],
                "tools": [{
                    "name": &tool.name,
                    "description": &tool.description,
                    "input_schema": &tool.parameters
                }],
                "tool_choice": {"type": "tool", "name": &tool.name}
            }))
            .await?;

        tracing::debug!(
            "Anthropic raw response: {}",
            &response_text[..response_text.len().min(1000)]
        );

        // Response format: { "content": [{ "type": "tool_use", "name": "...", "input": {...} }] }
        #[derive(Deserialize)]
        struct ContentBlock {
            #[serde(rename = "type")]
            kind: String,
            name: Option<String>,
            input: Option<serde_json::Value>,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            content: Vec<ContentBlock>,
        }

        let api_response: ApiResponse = serde_json::from_str(&response_text)
            .map_err(|e| anyhow!("Failed to parse Anthropic response: {}", e))?;

        let block = api_response
            .content
            .into_iter()
            .find(|c| c.kind == "tool_use")
            .ok_or_else(|| anyhow!("No tool_use block in Anthropic response"))?;

        Ok(ToolCallResult {
            tool_name: block.name.unwrap_or_else(|| tool.name.clone()),
            arguments: block.input.unwrap_or(serde_json::Value::Null),
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
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
        "Anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_model() {
        let client = AnthropicClient::with_model("test-key".to_string(), "claude-3-opus");
        assert_eq!(client.model_name(), "claude-3-opus");
        assert_eq!(client.provider_name(), "Anthropic");
    }

    #[test]
    fn test_temperature_override() {
        let client = AnthropicClient::with_model("k".to_string(), "m").with_temperature(0.3);
        assert!((client.temperature - 0.3).abs() < f32::EPSILON);
    }
}
