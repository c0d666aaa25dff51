//! Query Agent
//!
//! Orchestrates one request: translate → execute → (optionally) summarize.
//! Stages run sequentially and nothing is retried; the first failure is
//! returned to the caller.
//!
//! Two caller modes:
//! - `translate_and_execute`: one-shot, returns the full structured response
//! - `converse`: conversational, carries the session's previous exchange
//!   into the prompt and answers in prose

use finquery_agent::{
    create_llm_client, create_translator, CollectionName, LlmClient, PreviousExchange,
    QueryTranslator, Summarizer, TranslatedQuery, SUMMARY_UNAVAILABLE,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{FinqueryConfig, LimitsConfig, StoreBackend, StoreConfig};
use crate::error::AgentResult;
use crate::executor::{QueryExecutor, ResultSet};
use crate::session::SessionStore;
use crate::store::{DocumentStore, InMemoryStore};

/// One-shot response
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub collection: CollectionName,
    pub query: Map<String, Value>,
    pub results: ResultSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

pub struct QueryAgent {
    translator: Arc<dyn QueryTranslator>,
    executor: QueryExecutor,
    summarizer: Summarizer,
    sessions: SessionStore,
    limits: LimitsConfig,
    summarize: bool,
}

impl QueryAgent {
    /// Assemble an agent from an existing client and store
    pub fn new(
        client: Arc<dyn LlmClient>,
        store: Arc<dyn DocumentStore>,
        config: &FinqueryConfig,
    ) -> Self {
        let translator = create_translator(client.clone(), config.agent.translator.clone());
        let summarizer = Summarizer::new(client, config.agent.summarizer.clone());
        let executor = QueryExecutor::new(store).with_default_limit(config.limits.result_limit);

        Self {
            translator,
            executor,
            summarizer,
            sessions: SessionStore::new(),
            limits: config.limits.clone(),
            summarize: config.agent.summarize,
        }
    }

    /// Build the LLM client and document store named by `config`
    pub async fn from_config(config: &FinqueryConfig) -> AgentResult<Self> {
        let client = create_llm_client(config.agent.backend, config.agent.temperature)?;
        let store = open_store(&config.store).await?;
        info!(
            "Query agent ready ({:?} translator, {} store)",
            config.agent.translator.mode,
            store.backend_name()
        );
        Ok(Self::new(client, store, config))
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        self.executor.store()
    }

    /// Translate without executing
    pub async fn translate(&self, user_text: &str) -> AgentResult<TranslatedQuery> {
        Ok(self.translator.translate(user_text).await?)
    }

    /// One-shot query; summarizes when the config says so
    pub async fn translate_and_execute(&self, user_text: &str) -> AgentResult<QueryResponse> {
        self.translate_and_execute_with(user_text, self.summarize)
            .await
    }

    pub async fn translate_and_execute_with(
        &self,
        user_text: &str,
        summarize: bool,
    ) -> AgentResult<QueryResponse> {
        let translated = self.translator.translate(user_text).await?;
        let collection = translated.collection;
        let query = translated.query.clone();
        let rendered = Value::Object(query.clone());
        info!("Running on collection: {} query: {}", collection, rendered);

        let results = self.executor.run(translated).await?;

        let summary = if summarize {
            Some(
                self.summarizer
                    .summarize(results.documents(), user_text)
                    .await,
            )
        } else {
            None
        };

        Ok(QueryResponse {
            collection,
            query,
            results,
            summary,
        })
    }

    /// Start a conversation
    pub async fn start_session(&self) -> Uuid {
        self.sessions.create().await
    }

    /// End a conversation and drop its memory
    pub async fn end_session(&self, session_id: Uuid) -> bool {
        self.sessions.end(session_id).await
    }

    /// Answer `user_text` in prose, using and then replacing the session's
    /// remembered exchange. Only the first `preview_limit` rows reach the model.
    pub async fn converse(&self, session_id: Uuid, user_text: &str) -> AgentResult<String> {
        let previous = self.sessions.get_context(session_id).await?;
        let exchange = previous.as_ref().map(|entry| PreviousExchange {
            question: &entry.query,
            answer: &entry.result,
        });

        let translated = self
            .translator
            .translate_with_context(user_text, exchange)
            .await?;
        let collection = translated.collection;
        let results = self.executor.run(translated).await?;
        let summary = self
            .summarizer
            .summarize_showing(results.documents(), user_text, self.limits.preview_limit)
            .await;
        let reply = if summary == SUMMARY_UNAVAILABLE {
            warn!("Falling back to a raw preview for session {}", session_id);
            let preview = results.preview(self.limits.preview_limit);
            render_preview(collection, preview, results.len())
        } else {
            summary
        };

        self.sessions
            .update_context(session_id, user_text, &reply)
            .await?;
        Ok(reply)
    }
}

fn render_preview(collection: CollectionName, preview: &[Value], total: usize) -> String {
    let rendered = serde_json::to_string_pretty(preview).unwrap_or_else(|_| "[]".to_string());
    format!(
        "Found {} documents in '{}' ({} shown):\n{}",
        total,
        collection,
        preview.len(),
        rendered
    )
}

/// Open the configured document store
pub async fn open_store(config: &StoreConfig) -> AgentResult<Arc<dyn DocumentStore>> {
    match config.backend {
        StoreBackend::Memory => {
            if config.fixtures_dir.is_dir() {
                Ok(Arc::new(InMemoryStore::load_dir(&config.fixtures_dir).await?))
            } else {
                warn!(
                    "Fixtures directory {} not found, starting with an empty store",
                    config.fixtures_dir.display()
                );
                Ok(Arc::new(InMemoryStore::new()))
            }
        }
        #[cfg(feature = "database")]
        StoreBackend::Postgres => {
            let url = config.database_url()?;
            let store =
                crate::store::PgDocumentStore::connect(&url, config.max_connections).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "database"))]
        StoreBackend::Postgres => Err(crate::config::ConfigError::Invalid(
            "store.backend 'postgres' requires the `database` feature".to_string(),
        )
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_preview() {
        let text = render_preview(CollectionName::Stocks, &[json!({"ticker": "AAPL"})], 12);
        assert!(text.starts_with("Found 12 documents in 'stocks' (1 shown):"));
        assert!(text.contains("AAPL"));
    }

    #[test]
    fn test_response_omits_missing_summary() {
        let response = QueryResponse {
            collection: CollectionName::Etfs,
            query: Map::new(),
            results: ResultSet::default(),
            summary: None,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value, json!({"collection": "etfs", "query": {}, "results": []}));
    }

    #[tokio::test]
    async fn test_missing_fixtures_dir_gives_empty_store() {
        let config = StoreConfig {
            fixtures_dir: "does/not/exist".into(),
            ..StoreConfig::default()
        };
        let store = open_store(&config).await.unwrap();
        assert!(store.list_collections().await.unwrap().is_empty());
    }
}
