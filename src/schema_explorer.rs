//! Schema explorer and metadata cache
//!
//! Lists the store's collections and samples one document from each so a
//! caller can see what fields exist before asking a question.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::normalize::normalize_document;
use crate::store::{DocumentStore, Result};

pub async fn list_collections(store: &dyn DocumentStore) -> Result<Vec<String>> {
    let mut names = store.list_collections().await?;
    names.sort();
    Ok(names)
}

/// One normalized sample document from `collection`, if it has any
pub async fn get_schema(store: &dyn DocumentStore, collection: &str) -> Result<Option<Value>> {
    Ok(store
        .sample_document(collection)
        .await?
        .map(|doc| Value::Object(normalize_document(doc))))
}

/// Collection → sample document for every collection in the store
pub async fn cache_metadata(store: &dyn DocumentStore) -> Result<BTreeMap<String, Option<Value>>> {
    let mut meta = BTreeMap::new();
    for name in list_collections(store).await? {
        let sample = get_schema(store, &name).await?;
        meta.insert(name, sample);
    }
    tracing::debug!("Cached metadata for {} collections", meta.len());
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_cache_metadata_samples_each_collection() {
        let store = InMemoryStore::new();
        store
            .insert_many(
                "stocks",
                [json!({"ticker": "AAPL", "_id": {"$oid": "abc"}})
                    .as_object()
                    .cloned()
                    .unwrap()],
            )
            .await;
        store.insert_many("etfs", Vec::new()).await;

        let meta = cache_metadata(&store).await.unwrap();
        assert_eq!(meta.keys().collect::<Vec<_>>(), vec!["etfs", "stocks"]);
        assert_eq!(meta["stocks"], Some(json!({"ticker": "AAPL", "_id": "abc"})));
        assert_eq!(meta["etfs"], None);
    }
}
