//! Query Executor
//!
//! Runs a validated `TranslatedQuery` against the document store and hands
//! back plain JSON. The store is trusted to honour `limit`, but the result is
//! truncated again here so the cap holds for every backend.

use finquery_agent::TranslatedQuery;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::normalize::normalize_document;
use crate::store::{DocumentStore, StoreError};

/// Default result cap
pub const DEFAULT_RESULT_LIMIT: usize = 20;

/// Ordered plain-JSON documents, never longer than the limit used to fetch them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet(Vec<Value>);

impl ResultSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn documents(&self) -> &[Value] {
        &self.0
    }

    /// The first `n` documents
    pub fn preview(&self, n: usize) -> &[Value] {
        &self.0[..self.0.len().min(n)]
    }

    pub fn into_inner(self) -> Vec<Value> {
        self.0
    }
}

pub struct QueryExecutor {
    store: Arc<dyn DocumentStore>,
    default_limit: usize,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            default_limit: DEFAULT_RESULT_LIMIT,
        }
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Execute with the default limit
    pub async fn run(&self, query: TranslatedQuery) -> Result<ResultSet, StoreError> {
        self.execute(query, self.default_limit).await
    }

    /// Execute `query`, returning at most `limit` normalized documents.
    /// Store errors propagate unchanged; nothing is retried.
    pub async fn execute(
        &self,
        query: TranslatedQuery,
        limit: usize,
    ) -> Result<ResultSet, StoreError> {
        let TranslatedQuery { collection, query } = query;

        let mut docs = self
            .store
            .find(collection.as_str(), &query, limit)
            .await?;
        docs.truncate(limit);

        let results = docs
            .into_iter()
            .map(|doc| {
                let plain = Value::Object(normalize_document(doc));
                // Round trip so the output is independent of the store's value types
                serde_json::from_str::<Value>(&serde_json::to_string(&plain)?)
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            "{} returned {} documents from '{}' (limit {})",
            self.store.backend_name(),
            results.len(),
            collection,
            limit
        );
        Ok(ResultSet(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Document, InMemoryStore};
    use async_trait::async_trait;
    use finquery_agent::CollectionName;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn query(collection: CollectionName, filter: Value) -> TranslatedQuery {
        TranslatedQuery {
            collection,
            query: doc(filter),
        }
    }

    /// Ignores the limit it is given
    struct GreedyStore;

    #[async_trait]
    impl DocumentStore for GreedyStore {
        async fn find(&self, _c: &str, _f: &Document, _l: usize) -> crate::store::Result<Vec<Document>> {
            Ok((0..50).map(|i| doc(json!({"n": i}))).collect())
        }
        async fn list_collections(&self) -> crate::store::Result<Vec<String>> {
            Ok(vec![])
        }
        async fn sample_document(&self, _c: &str) -> crate::store::Result<Option<Document>> {
            Ok(None)
        }
        fn backend_name(&self) -> &'static str {
            "greedy"
        }
    }

    struct DownStore;

    #[async_trait]
    impl DocumentStore for DownStore {
        async fn find(&self, _c: &str, _f: &Document, _l: usize) -> crate::store::Result<Vec<Document>> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn list_collections(&self) -> crate::store::Result<Vec<String>> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn sample_document(&self, _c: &str) -> crate::store::Result<Option<Document>> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        fn backend_name(&self) -> &'static str {
            "down"
        }
    }

    #[tokio::test]
    async fn test_limit_caps_matching_documents() {
        let store = InMemoryStore::new();
        store
            .insert_many(
                "transactions",
                (0..35).map(|i| doc(json!({"amount": 1500 + i}))),
            )
            .await;
        let executor = QueryExecutor::new(Arc::new(store));

        let results = executor
            .run(query(
                CollectionName::Transactions,
                json!({"amount": {"$gt": 1000}}),
            ))
            .await
            .unwrap();
        assert_eq!(results.len(), 20);
        assert_eq!(results.preview(10).len(), 10);
    }

    #[tokio::test]
    async fn test_truncates_even_when_store_ignores_limit() {
        let executor = QueryExecutor::new(Arc::new(GreedyStore));
        let results = executor
            .execute(query(CollectionName::Stocks, json!({})), 7)
            .await
            .unwrap();
        assert_eq!(results.len(), 7);
    }

    #[tokio::test]
    async fn test_documents_are_normalized() {
        let store = InMemoryStore::new();
        store
            .insert_many(
                "accounts",
                [doc(json!({
                    "_id": {"$oid": "65a1f0c2e4b0a1b2c3d4e5f6"},
                    "opened": {"$date": "2024-02-01T00:00:00Z"},
                    "balance": {"$numberDecimal": "2500.50"}
                }))],
            )
            .await;
        let executor = QueryExecutor::new(Arc::new(store));

        let results = executor
            .run(query(CollectionName::Accounts, json!({})))
            .await
            .unwrap();
        assert_eq!(
            results.documents()[0],
            json!({
                "_id": "65a1f0c2e4b0a1b2c3d4e5f6",
                "opened": "2024-02-01T00:00:00Z",
                "balance": 2500.5
            })
        );
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        let executor = QueryExecutor::new(Arc::new(DownStore));
        let err = executor
            .run(query(CollectionName::Customers, json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn test_result_set_serializes_as_array() {
        let results = ResultSet(vec![json!({"a": 1})]);
        assert_eq!(serde_json::to_value(&results).unwrap(), json!([{"a": 1}]));
    }
}
