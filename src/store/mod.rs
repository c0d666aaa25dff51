//! Document store abstraction
//!
//! The executor only ever talks to a `DocumentStore`. Backends:
//! - `InMemoryStore`: JSON fixtures held in memory (default)
//! - `PgDocumentStore`: Postgres JSONB table (feature `database`)

pub mod filter;
pub mod memory;
#[cfg(feature = "database")]
pub mod postgres;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub use memory::InMemoryStore;
#[cfg(feature = "database")]
pub use postgres::PgDocumentStore;

/// A stored document: field name → value
pub type Document = Map<String, Value>;

/// Store failures. Propagated unchanged, never retried.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    #[error("Filter rejected: {0}")]
    InvalidFilter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A generic document store reachable by collection name
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Documents in `collection` matching `filter`, at most `limit`
    async fn find(&self, collection: &str, filter: &Document, limit: usize)
        -> Result<Vec<Document>>;

    /// Names of all collections holding documents
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Any one document from `collection`, if it has one
    async fn sample_document(&self, collection: &str) -> Result<Option<Document>>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}
