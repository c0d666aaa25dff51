//! finquery - natural-language queries over financial document collections
//!
//! Questions are translated into a validated (collection, filter) pair by the
//! `finquery-agent` crate, executed against a `DocumentStore`, and optionally
//! summarized back into prose.
//!
//! ## Call Chain
//! User text -> QueryTranslator -> QueryExecutor -> DocumentStore -> Summarizer
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use finquery::{ConfigLoader, QueryAgent};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::load()?;
//! let agent = QueryAgent::from_config(&config).await?;
//! let response = agent
//!     .translate_and_execute("Show all transactions above $1000")
//!     .await?;
//! println!("{} results from {}", response.results.len(), response.collection);
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Configuration
pub mod config;

// Document stores and execution
pub mod executor;
pub mod normalize;
pub mod schema_explorer;
pub mod store;

// Conversation state and orchestration
pub mod agent;
pub mod session;

// Re-exports for convenience
pub use agent::{open_store, QueryAgent, QueryResponse};
pub use config::{ConfigError, ConfigLoader, FinqueryConfig, StoreBackend};
pub use error::{AgentError, AgentResult};
pub use executor::{QueryExecutor, ResultSet, DEFAULT_RESULT_LIMIT};
pub use session::{MemoryEntry, SessionMemory, SessionStore, UnknownSession};
pub use store::{Document, DocumentStore, InMemoryStore, StoreError};

// Translation layer
pub use finquery_agent::{
    CollectionName, LlmClient, TranslatedQuery, TranslationError, TranslationErrorKind,
    TranslatorMode,
};
