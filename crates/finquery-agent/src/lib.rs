//! LLM-powered query translation for finquery
//!
//! This crate turns natural-language questions into validated
//! (collection, filter) pairs and summarizes result sets. It has no store
//! dependencies - execution stays in the `finquery` crate.
//!
//! ## Architecture
//!
//! ```text
//! User text → PromptBuilder → LlmClient → parser::clean → ResponseSchema → registry check
//! ```
//!
//! ## Backend Selection
//!
//! Set `AGENT_BACKEND` environment variable:
//! - `anthropic` (default): Anthropic Claude API
//! - `openai`: OpenAI API
//! - `local`: OpenAI-compatible server at `LOCAL_LLM_URL`

// LLM client abstraction
pub mod anthropic_client;
pub mod backend;
pub mod client_factory;
pub mod llm_client;
pub mod openai_client;

// Translation pipeline
pub mod error;
pub mod parser;
pub mod prompt;
pub mod registry;
pub mod schema;
pub mod summarizer;
pub mod translator;

// Re-exports for convenience
pub use backend::AgentBackend;
pub use client_factory::{create_llm_client, current_backend};
pub use error::{SchemaViolation, TranslationError, TranslationErrorKind};
pub use llm_client::LlmClient;
pub use prompt::{PreviousExchange, PromptBuilder};
pub use registry::CollectionName;
pub use schema::{ResponseSchema, StructuredResponse};
pub use summarizer::{Summarizer, SummarizerSettings, SUMMARY_UNAVAILABLE};
pub use translator::{
    create_translator, QueryTranslator, TranslatedQuery, TranslatorMode, TranslatorSettings,
};
