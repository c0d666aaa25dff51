//! Query Translator
//!
//! The trust boundary between model output and the data layer. Whatever
//! leaves this module as a `TranslatedQuery` has passed both the JSON shape
//! check and the closed-vocabulary check.
//!
//! Two variants produce the same capability:
//! - `CompletionTranslator`: plain completion, cleaned and parsed
//! - `ToolCallTranslator`: forced tool/function call, arguments validated

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::{
    SchemaViolation, TranslationError, TranslationErrorKind, DEFAULT_PREVIEW_CHARS,
};
use crate::llm_client::LlmClient;
use crate::parser;
use crate::prompt::{PreviousExchange, PromptBuilder};
use crate::registry::CollectionName;
use crate::schema::StructuredResponse;

/// A validated (collection, filter) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedQuery {
    pub collection: CollectionName,
    pub query: Map<String, Value>,
}

/// Which translator variant to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslatorMode {
    /// Free-text completion with defensive cleanup
    #[default]
    Completion,
    /// Provider-enforced tool/function call
    ToolCall,
}

/// Translation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorSettings {
    pub mode: TranslatorMode,
    /// Token budget for the translation completion
    pub max_tokens: usize,
    /// Preview length for diagnostic payloads in errors
    pub preview_chars: usize,
}

impl Default for TranslatorSettings {
    fn default() -> Self {
        Self {
            mode: TranslatorMode::Completion,
            max_tokens: 512,
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }
}

/// Produce a validated (collection, query) pair from user text
#[async_trait]
pub trait QueryTranslator: Send + Sync {
    /// Translate, optionally showing the model the previous exchange
    async fn translate_with_context(
        &self,
        user_text: &str,
        previous: Option<PreviousExchange<'_>>,
    ) -> Result<TranslatedQuery, TranslationError>;

    /// Single-shot translation
    async fn translate(&self, user_text: &str) -> Result<TranslatedQuery, TranslationError> {
        self.translate_with_context(user_text, None).await
    }

    fn mode(&self) -> TranslatorMode;
}

/// Build the translator selected by `settings.mode`
pub fn create_translator(
    client: Arc<dyn LlmClient>,
    settings: TranslatorSettings,
) -> Arc<dyn QueryTranslator> {
    match settings.mode {
        TranslatorMode::Completion => Arc::new(CompletionTranslator::new(client, settings)),
        TranslatorMode::ToolCall => Arc::new(ToolCallTranslator::new(client, settings)),
    }
}

/// Closed-vocabulary check shared by both variants
pub fn validate_structured(
    response: StructuredResponse,
    user_text: &str,
    raw: &str,
    cleaned: &str,
    preview_chars: usize,
) -> Result<TranslatedQuery, TranslationError> {
    let collection = CollectionName::parse(&response.collection).ok_or_else(|| {
        TranslationError::new(
            TranslationErrorKind::InvalidCollection {
                declared: response.collection.clone(),
                valid: CollectionName::vocabulary(),
            },
            raw,
            cleaned,
            preview_chars,
        )
    })?;

    let heuristic = CollectionName::classify(user_text);
    if heuristic != collection {
        tracing::warn!(
            "Model chose '{}' but keyword classifier suggests '{}' for: {}",
            collection,
            heuristic,
            user_text
        );
    }

    Ok(TranslatedQuery {
        collection,
        query: response.query,
    })
}

fn schema_error(
    violation: SchemaViolation,
    raw: &str,
    cleaned: &str,
    preview_chars: usize,
) -> TranslationError {
    let kind = match violation {
        SchemaViolation::InvalidJson(reason) => TranslationErrorKind::InvalidJson(reason),
        other => TranslationErrorKind::Schema(other),
    };
    TranslationError::new(kind, raw, cleaned, preview_chars)
}

/// Translator over plain text completions
pub struct CompletionTranslator {
    client: Arc<dyn LlmClient>,
    prompts: PromptBuilder,
    settings: TranslatorSettings,
}

impl CompletionTranslator {
    pub fn new(client: Arc<dyn LlmClient>, settings: TranslatorSettings) -> Self {
        Self {
            client,
            prompts: PromptBuilder::default(),
            settings,
        }
    }

    /// Clean, parse and validate a completion already in hand
    pub fn interpret(
        &self,
        user_text: &str,
        raw: &str,
    ) -> Result<TranslatedQuery, TranslationError> {
        let cleaned = parser::clean(raw);
        tracing::debug!("Cleaned completion candidate: {}", cleaned);

        let preview_chars = self.settings.preview_chars;
        let response = self
            .prompts
            .schema()
            .parse(&cleaned)
            .map_err(|v| schema_error(v, raw, &cleaned, preview_chars))?;

        validate_structured(response, user_text, raw, &cleaned, preview_chars)
    }
}

#[async_trait]
impl QueryTranslator for CompletionTranslator {
    async fn translate_with_context(
        &self,
        user_text: &str,
        previous: Option<PreviousExchange<'_>>,
    ) -> Result<TranslatedQuery, TranslationError> {
        let prompt = self.prompts.build_with_context(user_text, previous);
        let raw = self
            .client
            .complete(&prompt, self.settings.max_tokens)
            .await
            .map_err(|e| TranslationError::completion(&e))?;

        tracing::debug!(
            "Raw completion from {} ({}): {}",
            self.client.provider_name(),
            self.client.model_name(),
            raw
        );

        let translated = self.interpret(user_text, &raw)?;
        let rendered = Value::Object(translated.query.clone());
        tracing::info!(
            "Translated to collection '{}' with query {}",
            translated.collection,
            rendered
        );
        Ok(translated)
    }

    fn mode(&self) -> TranslatorMode {
        TranslatorMode::Completion
    }
}

/// Translator over forced tool/function calls
pub struct ToolCallTranslator {
    client: Arc<dyn LlmClient>,
    prompts: PromptBuilder,
    settings: TranslatorSettings,
}

impl ToolCallTranslator {
    pub fn new(client: Arc<dyn LlmClient>, settings: TranslatorSettings) -> Self {
        Self {
            client,
            prompts: PromptBuilder::default(),
            settings,
        }
    }

    /// Validate tool arguments already in hand
    ///
    /// Some local models return the arguments as a JSON-bearing string; that
    /// string goes through the same cleanup as a plain completion.
    pub fn interpret(
        &self,
        user_text: &str,
        arguments: Value,
    ) -> Result<TranslatedQuery, TranslationError> {
        let preview_chars = self.settings.preview_chars;
        let schema = self.prompts.schema();

        let (raw, cleaned, parsed) = match arguments {
            Value::String(text) => {
                let cleaned = parser::clean(&text);
                let parsed = schema.parse(&cleaned);
                (text, cleaned, parsed)
            }
            other => {
                let raw = other.to_string();
                let parsed = schema.validate_value(other);
                (raw.clone(), raw, parsed)
            }
        };
        tracing::debug!("Tool call arguments: {}", raw);

        let response = parsed.map_err(|v| schema_error(v, &raw, &cleaned, preview_chars))?;
        validate_structured(response, user_text, &raw, &cleaned, preview_chars)
    }
}

#[async_trait]
impl QueryTranslator for ToolCallTranslator {
    async fn translate_with_context(
        &self,
        user_text: &str,
        previous: Option<PreviousExchange<'_>>,
    ) -> Result<TranslatedQuery, TranslationError> {
        let prompt = self.prompts.build_with_context(user_text, previous);
        let tool = self.prompts.schema().tool_definition();

        let result = self
            .client
            .complete_with_tool(&prompt, self.settings.max_tokens, &tool)
            .await
            .map_err(|e| TranslationError::completion(&e))?;

        if result.tool_name != tool.name {
            tracing::warn!(
                "Expected tool '{}' but model called '{}'",
                tool.name,
                result.tool_name
            );
        }

        let translated = self.interpret(user_text, result.arguments)?;
        let rendered = Value::Object(translated.query.clone());
        tracing::info!(
            "Translated to collection '{}' with query {}",
            translated.collection,
            rendered
        );
        Ok(translated)
    }

    fn mode(&self) -> TranslatorMode {
        TranslatorMode::ToolCall
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::{ToolCallResult, ToolDefinition};
    use serde_json::json;

    /// Returns canned output; records nothing
    struct CannedClient {
        text: String,
        arguments: Value,
    }

    impl CannedClient {
        fn text(text: &str) -> Arc<dyn LlmClient> {
            Arc::new(Self {
                text: text.to_string(),
                arguments: Value::Null,
            })
        }

        fn tool(arguments: Value) -> Arc<dyn LlmClient> {
            Arc::new(Self {
                text: String::new(),
                arguments,
            })
        }
    }

    #[async_trait]
    impl LlmClient for CannedClient {
        async fn complete(&self, _prompt: &str, _max_tokens: usize) -> anyhow::Result<String> {
            Ok(self.text.clone())
        }

        async fn complete_with_tool(
            &self,
            _prompt: &str,
            _max_tokens: usize,
            tool: &ToolDefinition,
        ) -> anyhow::Result<ToolCallResult> {
            Ok(ToolCallResult {
                tool_name: tool.name.clone(),
                arguments: self.arguments.clone(),
            })
        }

        fn model_name(&self) -> &str {
            "canned"
        }

        fn provider_name(&self) -> &str {
            "Test"
        }
    }

    fn completion(text: &str) -> CompletionTranslator {
        CompletionTranslator::new(CannedClient::text(text), TranslatorSettings::default())
    }

    #[tokio::test]
    async fn test_plain_completion() {
        let translator = completion(
            r#"{"collection": "transactions", "query": {"amount": {"$gt": 1000}}}"#,
        );
        let translated = translator
            .translate("Show me all transactions over $1000 in the last 7 days")
            .await
            .unwrap();
        assert_eq!(translated.collection, CollectionName::Transactions);
        assert_eq!(
            Value::Object(translated.query),
            json!({"amount": {"$gt": 1000}})
        );
    }

    #[tokio::test]
    async fn test_fenced_completion_with_iso_date() {
        let translator = completion(
            "```json\n{\"collection\": \"Accounts\", \"query\": {\"opened\": ISODate(\"2024-01-01\")}}\n```\nAnswer: done",
        );
        let translated = translator.translate("accounts opened this year").await.unwrap();
        assert_eq!(translated.collection, CollectionName::Accounts);
        assert_eq!(Value::Object(translated.query), json!({"opened": "2024-01-01"}));
    }

    #[tokio::test]
    async fn test_unknown_collection_is_rejected() {
        let translator = completion(r#"{"collection": "orders", "query": {}}"#);
        let err = translator.translate("show orders").await.unwrap_err();
        assert!(err.is_invalid_collection());
        assert!(err.raw_preview.contains("orders"));
    }

    #[tokio::test]
    async fn test_missing_query_carries_raw_text() {
        let raw = r#"{"collection": "stocks"}"#;
        let err = completion(raw).translate("stocks").await.unwrap_err();
        assert_eq!(
            err.kind,
            TranslationErrorKind::Schema(SchemaViolation::MissingKey("query"))
        );
        assert_eq!(err.raw_preview, raw);
    }

    #[tokio::test]
    async fn test_empty_completion_fails_cleanly() {
        let err = completion("").translate("anything").await.unwrap_err();
        assert!(matches!(err.kind, TranslationErrorKind::InvalidJson(_)));

        let err = completion("Sorry, I can't help").translate("x").await.unwrap_err();
        assert!(matches!(err.kind, TranslationErrorKind::InvalidJson(_)));
        assert_eq!(err.cleaned_preview, "Sorry, I can't help");
    }

    #[tokio::test]
    async fn test_tool_call_object_arguments() {
        let translator = ToolCallTranslator::new(
            CannedClient::tool(json!({"collection": " ETFs ", "query": {"sector": "tech"}})),
            TranslatorSettings::default(),
        );
        let translated = translator.translate("tech etfs").await.unwrap();
        assert_eq!(translated.collection, CollectionName::Etfs);
        assert_eq!(translator.mode(), TranslatorMode::ToolCall);
    }

    #[tokio::test]
    async fn test_tool_call_string_arguments_are_cleaned() {
        let translator = ToolCallTranslator::new(
            CannedClient::tool(json!(
                "```json\n{\"collection\": \"customers\", \"query\": {\"since\": ISODate(\"2023-05-01\")}}\n```"
            )),
            TranslatorSettings::default(),
        );
        let translated = translator.translate("new customers").await.unwrap();
        assert_eq!(translated.collection, CollectionName::Customers);
        assert_eq!(Value::Object(translated.query), json!({"since": "2023-05-01"}));
    }

    #[test]
    fn test_factory_selects_variant() {
        let settings = TranslatorSettings {
            mode: TranslatorMode::ToolCall,
            ..Default::default()
        };
        let translator = create_translator(CannedClient::text(""), settings);
        assert_eq!(translator.mode(), TranslatorMode::ToolCall);
        let translator = create_translator(CannedClient::text(""), TranslatorSettings::default());
        assert_eq!(translator.mode(), TranslatorMode::Completion);
    }
}
