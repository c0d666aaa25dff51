//! Summarizer
//!
//! Turns a result set back into a short answer. Summaries are explanatory,
//! not executable, so nothing is validated and failures degrade to a
//! placeholder instead of failing the request.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::llm_client::LlmClient;

/// Returned when the model call fails or produces nothing
pub const SUMMARY_UNAVAILABLE: &str = "Summary unavailable.";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerSettings {
    /// Number of leading results shown to the model
    pub context_results: usize,
    pub max_tokens: usize,
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            context_results: 5,
            max_tokens: 250,
        }
    }
}

pub struct Summarizer {
    client: Arc<dyn LlmClient>,
    settings: SummarizerSettings,
}

impl Summarizer {
    pub fn new(client: Arc<dyn LlmClient>, settings: SummarizerSettings) -> Self {
        Self { client, settings }
    }

    pub fn build_prompt(&self, results: &[Value], user_text: &str) -> String {
        self.build_prompt_showing(results, user_text, self.settings.context_results)
    }

    /// Prompt showing the first `context_results` rows out of all of `results`
    pub fn build_prompt_showing(
        &self,
        results: &[Value],
        user_text: &str,
        context_results: usize,
    ) -> String {
        let shown = &results[..results.len().min(context_results)];
        let rendered = serde_json::to_string_pretty(shown).unwrap_or_else(|_| "[]".to_string());

        format!(
            "The user asked: '{}'.\n\n\
             Here are the top results from the database ({} of {} shown):\n\
             {}\n\n\
             Based on these results, give a concise, user-friendly summary of the key findings in 2-3 sentences.",
            user_text.trim(),
            shown.len(),
            results.len(),
            rendered
        )
    }

    /// Summarize `results` for `user_text`; never fails
    pub async fn summarize(&self, results: &[Value], user_text: &str) -> String {
        self.summarize_showing(results, user_text, self.settings.context_results)
            .await
    }

    /// As [`Summarizer::summarize`], with the model seeing `context_results` rows
    pub async fn summarize_showing(
        &self,
        results: &[Value],
        user_text: &str,
        context_results: usize,
    ) -> String {
        let prompt = self.build_prompt_showing(results, user_text, context_results);

        match self.client.complete(&prompt, self.settings.max_tokens).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                tracing::warn!("Summarizer returned an empty completion");
                SUMMARY_UNAVAILABLE.to_string()
            }
            Err(e) => {
                tracing::warn!("Summarizer completion failed: {:#}", e);
                SUMMARY_UNAVAILABLE.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::{ToolCallResult, ToolDefinition};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedClient(Option<&'static str>);

    #[async_trait]
    impl LlmClient for FixedClient {
        async fn complete(&self, _prompt: &str, _max_tokens: usize) -> anyhow::Result<String> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| anyhow!("connection refused"))
        }

        async fn complete_with_tool(
            &self,
            _prompt: &str,
            _max_tokens: usize,
            _tool: &ToolDefinition,
        ) -> anyhow::Result<ToolCallResult> {
            Err(anyhow!("not used"))
        }

        fn model_name(&self) -> &str {
            "fixed"
        }

        fn provider_name(&self) -> &str {
            "Test"
        }
    }

    fn summarizer(reply: Option<&'static str>) -> Summarizer {
        Summarizer::new(Arc::new(FixedClient(reply)), SummarizerSettings::default())
    }

    #[test]
    fn test_prompt_shows_at_most_five_results() {
        let results: Vec<Value> = (0..8).map(|i| json!({"marker": format!("row-{}", i)})).collect();
        let prompt = summarizer(None).build_prompt(&results, "big trades");
        assert!(prompt.contains("The user asked: 'big trades'"));
        assert!(prompt.contains("row-4"));
        assert!(!prompt.contains("row-5"));
        assert!(prompt.contains("(5 of 8 shown)"));
    }

    #[test]
    fn test_prompt_counts_every_result_when_showing_fewer() {
        let results: Vec<Value> = (0..20).map(|i| json!({"marker": format!("row-{}", i)})).collect();
        let prompt = summarizer(None).build_prompt_showing(&results, "big trades", 3);
        assert!(prompt.contains("row-2"));
        assert!(!prompt.contains("row-3"));
        assert!(prompt.contains("(3 of 20 shown)"));
    }

    #[tokio::test]
    async fn test_summary_is_trimmed() {
        let summary = summarizer(Some("  Three large trades.\n")).summarize(&[], "q").await;
        assert_eq!(summary, "Three large trades.");
    }

    #[tokio::test]
    async fn test_failures_degrade_to_placeholder() {
        assert_eq!(summarizer(None).summarize(&[], "q").await, SUMMARY_UNAVAILABLE);
        assert_eq!(
            summarizer(Some("   ")).summarize(&[], "q").await,
            SUMMARY_UNAVAILABLE
        );
    }
}
