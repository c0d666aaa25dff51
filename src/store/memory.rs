//! In-memory document store
//!
//! Collections are held as ordered vectors of JSON documents. Fixtures load
//! from a directory of `<collection>.json` files, each a JSON array.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::RwLock;

use super::filter;
use super::{Document, DocumentStore, Result, StoreError};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: RwLock<BTreeMap<String, Vec<Document>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from in-hand collections
    pub fn with_collections(collections: BTreeMap<String, Vec<Document>>) -> Self {
        Self {
            collections: RwLock::new(collections),
        }
    }

    /// Load every `*.json` file in `dir`; the file stem names the collection
    pub async fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut collections = BTreeMap::new();

        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
            else {
                continue;
            };

            let content = tokio::fs::read_to_string(&path).await?;
            let docs = parse_fixture(&content).map_err(|e| {
                StoreError::Unavailable(format!("bad fixture {}: {}", path.display(), e))
            })?;
            tracing::debug!("Loaded {} documents into '{}'", docs.len(), name);
            collections.insert(name, docs);
        }

        tracing::info!(
            "Loaded {} collections from {}",
            collections.len(),
            dir.display()
        );
        Ok(Self::with_collections(collections))
    }

    /// Append documents to a collection, creating it if needed
    pub async fn insert_many(&self, collection: &str, docs: impl IntoIterator<Item = Document>) {
        let mut guard = self.collections.write().await;
        guard
            .entry(collection.to_string())
            .or_default()
            .extend(docs);
    }
}

fn parse_fixture(content: &str) -> std::result::Result<Vec<Document>, String> {
    let value: Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
    let items = match value {
        Value::Array(items) => items,
        _ => return Err("fixture must be a JSON array".to_string()),
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(map) => Ok(map),
            _ => Err("fixture entries must be objects".to_string()),
        })
        .collect()
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn find(
        &self,
        collection: &str,
        filter: &Document,
        limit: usize,
    ) -> Result<Vec<Document>> {
        filter::validate(filter)?;

        let guard = self.collections.read().await;
        let Some(docs) = guard.get(collection) else {
            // Like a document database: an absent collection is simply empty
            return Ok(Vec::new());
        };

        let mut found = Vec::new();
        for doc in docs {
            if found.len() >= limit {
                break;
            }
            if filter::matches(doc, filter)? {
                found.push(doc.clone());
            }
        }
        Ok(found)
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        Ok(self.collections.read().await.keys().cloned().collect())
    }

    async fn sample_document(&self, collection: &str) -> Result<Option<Document>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|docs| docs.first().cloned()))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
