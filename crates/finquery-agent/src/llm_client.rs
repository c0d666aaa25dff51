//! LLM Client Trait
//!
//! Unified completion interface for the model providers (Anthropic, OpenAI,
//! local OpenAI-compatible servers).

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Tool/function definition for structured output
///
/// Used with `complete_with_tool()` to force the model to return structured JSON.
/// - Anthropic: maps to `tools` array with `tool_choice`
/// - OpenAI: maps to `functions` array with `function_call`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool/function name (e.g., "emit_query")
    pub name: String,
    /// Description of what the tool does
    pub description: String,
    /// JSON Schema for the tool's parameters
    pub parameters: serde_json::Value,
}

/// Result from a tool/function call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Name of the tool that was called
    pub tool_name: String,
    /// Structured arguments as JSON
    pub arguments: serde_json::Value,
}

/// Unified LLM client interface
///
/// One call is one blocking round trip with the model; no streaming.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single prompt, return the raw completion text
    async fn complete(&self, prompt: &str, max_tokens: usize) -> Result<String>;

    /// Send a prompt with a forced tool/function call
    ///
    /// The provider guarantees the arguments are JSON, not that they match the schema.
    async fn complete_with_tool(
        &self,
        prompt: &str,
        max_tokens: usize,
        tool: &ToolDefinition,
    ) -> Result<ToolCallResult>;

    /// Get the model name for logging
    fn model_name(&self) -> &str;

    /// Get the provider name for logging
    fn provider_name(&self) -> &str;
}
