//! Postgres JSONB document store
//!
//! All collections share one table, `documents(id, collection, doc jsonb)`.
//! Filters are compiled to SQL with `sqlx::QueryBuilder`; every value is a
//! bound parameter. Field paths resolve with `doc #> path`, and comparisons
//! only hold between values of the same JSON type, matching the in-memory
//! evaluator.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, Postgres};
use sqlx::types::Json;
use sqlx::{PgPool, QueryBuilder};
use std::time::Duration;
use tracing::{info, warn};

use super::filter;
use super::{Document, DocumentStore, Result, StoreError};
use crate::normalize::{normalize_document, normalize_value};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id BIGSERIAL PRIMARY KEY,
    collection TEXT NOT NULL,
    doc JSONB NOT NULL
)"#;

const CREATE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS documents_collection_idx ON documents (collection)";

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and make sure the documents table exists
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        info!("Connecting to document store: {}", mask_database_url(database_url));

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await
            .map_err(|e| {
                warn!("Failed to connect to database: {}", e);
                StoreError::Unavailable(e.to_string())
            })?;

        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_INDEX).execute(&self.pool).await?;
        Ok(())
    }

    /// Insert documents; extended-JSON wrappers are flattened first so that
    /// dates and identifiers compare as strings in SQL
    pub async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<u64> {
        if docs.is_empty() {
            return Ok(0);
        }

        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO documents (collection, doc) ");
        query_builder.push_values(docs, |mut row, doc| {
            row.push_bind(collection.to_string())
                .push_bind(Json(Value::Object(normalize_document(doc))));
        });

        let done = query_builder.build().execute(&self.pool).await?;
        Ok(done.rows_affected())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn find(
        &self,
        collection: &str,
        filter: &Document,
        limit: usize,
    ) -> Result<Vec<Document>> {
        filter::validate(filter)?;

        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT doc FROM documents WHERE collection = ");
        query_builder.push_bind(collection.to_string());
        query_builder.push(" AND ");
        push_filter(&mut query_builder, filter)?;
        query_builder.push(" ORDER BY id LIMIT ");
        query_builder.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));

        tracing::debug!("Document query: {}", query_builder.sql());

        let rows = query_builder
            .build_query_scalar::<Json<Value>>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(|Json(v)| into_document(v)).collect()
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT collection FROM documents ORDER BY collection",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    async fn sample_document(&self, collection: &str) -> Result<Option<Document>> {
        let row = sqlx::query_scalar::<_, Json<Value>>(
            "SELECT doc FROM documents WHERE collection = $1 ORDER BY id LIMIT 1",
        )
        .bind(collection)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|Json(v)| into_document(v)).transpose()
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

fn into_document(value: Value) -> Result<Document> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Unavailable(format!(
            "stored document is not an object: {}",
            other
        ))),
    }
}

/// Push a whole filter document as a parenthesised predicate
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &Document) -> Result<()> {
    if filter.is_empty() {
        qb.push("TRUE");
        return Ok(());
    }

    qb.push("(");
    for (i, (key, condition)) in filter.iter().enumerate() {
        if i > 0 {
            qb.push(" AND ");
        }
        match key.as_str() {
            "$and" => push_logical(qb, key, condition, " AND ", false)?,
            "$or" => push_logical(qb, key, condition, " OR ", false)?,
            "$nor" => push_logical(qb, key, condition, " OR ", true)?,
            op if op.starts_with('$') => {
                return Err(StoreError::InvalidFilter(format!(
                    "unsupported top-level operator '{}'",
                    op
                )))
            }
            path => push_condition(qb, &path_segments(path), condition)?,
        }
    }
    qb.push(")");
    Ok(())
}

fn push_logical(
    qb: &mut QueryBuilder<'_, Postgres>,
    op: &str,
    condition: &Value,
    joiner: &str,
    negate: bool,
) -> Result<()> {
    let items = condition
        .as_array()
        .ok_or_else(|| StoreError::InvalidFilter(format!("'{}' expects an array", op)))?;
    if items.is_empty() {
        return Err(StoreError::InvalidFilter(format!(
            "'{}' expects a non-empty array",
            op
        )));
    }

    qb.push(if negate { "NOT (" } else { "(" });
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            qb.push(joiner);
        }
        let sub = item.as_object().ok_or_else(|| {
            StoreError::InvalidFilter(format!("'{}' entries must be objects", op))
        })?;
        push_filter(qb, sub)?;
    }
    qb.push(")");
    Ok(())
}

fn path_segments(path: &str) -> Vec<String> {
    path.split('.').map(str::to_string).collect()
}

fn push_path(qb: &mut QueryBuilder<'_, Postgres>, path: &[String]) {
    qb.push("doc #> ");
    qb.push_bind(path.to_vec());
    qb.push("::text[]");
}

fn push_condition(
    qb: &mut QueryBuilder<'_, Postgres>,
    path: &[String],
    condition: &Value,
) -> Result<()> {
    let Some(ops) = filter::operator_map(condition) else {
        push_eq(qb, path, condition);
        return Ok(());
    };

    qb.push("(");
    let mut first = true;
    for (op, arg) in ops {
        if op == "$options" {
            continue;
        }
        if !first {
            qb.push(" AND ");
        }
        first = false;

        match op.as_str() {
            "$eq" => push_eq(qb, path, arg),
            "$ne" => {
                qb.push("NOT ");
                push_eq(qb, path, arg);
            }
            "$gt" => push_compare(qb, path, ">", arg),
            "$gte" => push_compare(qb, path, ">=", arg),
            "$lt" => push_compare(qb, path, "<", arg),
            "$lte" => push_compare(qb, path, "<=", arg),
            "$in" | "$nin" => {
                let items = arg.as_array().ok_or_else(|| {
                    StoreError::InvalidFilter(format!("'{}' expects an array", op))
                })?;
                if op == "$nin" {
                    qb.push("NOT ");
                }
                qb.push("(");
                if items.is_empty() {
                    qb.push("FALSE");
                }
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        qb.push(" OR ");
                    }
                    push_eq(qb, path, item);
                }
                qb.push(")");
            }
            "$exists" => {
                let wanted = arg.as_bool().ok_or_else(|| {
                    StoreError::InvalidFilter("'$exists' expects a boolean".to_string())
                })?;
                qb.push("(");
                push_path(qb, path);
                qb.push(if wanted { " IS NOT NULL)" } else { " IS NULL)" });
            }
            "$regex" => {
                let pattern = arg.as_str().ok_or_else(|| {
                    StoreError::InvalidFilter("'$regex' expects a string".to_string())
                })?;
                let insensitive = ops
                    .get("$options")
                    .and_then(|o| o.as_str())
                    .map(|o| o.contains('i'))
                    .unwrap_or(false);
                qb.push("COALESCE(jsonb_typeof(");
                push_path(qb, path);
                qb.push(") = 'string' AND (doc #>> ");
                qb.push_bind(path.to_vec());
                qb.push("::text[]) ");
                qb.push(if insensitive { "~* " } else { "~ " });
                qb.push_bind(pattern.to_string());
                qb.push(", FALSE)");
            }
            "$not" => {
                qb.push("NOT ");
                push_condition(qb, path, arg)?;
            }
            other => {
                return Err(StoreError::InvalidFilter(format!(
                    "unsupported operator '{}'",
                    other
                )))
            }
        }
    }
    if first {
        qb.push("TRUE");
    }
    qb.push(")");
    Ok(())
}

/// Equality; a scalar also matches an array field containing it, and null
/// matches a missing field
fn push_eq(qb: &mut QueryBuilder<'_, Postgres>, path: &[String], target: &Value) {
    let target = normalize_value(target.clone());

    if target.is_null() {
        qb.push("COALESCE(");
        push_path(qb, path);
        qb.push(" = 'null'::jsonb, TRUE)");
        return;
    }

    qb.push("COALESCE(");
    push_path(qb, path);
    qb.push(" = ");
    qb.push_bind(Json(target.clone()));
    if !target.is_array() {
        qb.push(" OR (jsonb_typeof(");
        push_path(qb, path);
        qb.push(") = 'array' AND ");
        push_path(qb, path);
        qb.push(" @> ");
        qb.push_bind(Json(Value::Array(vec![target])));
        qb.push(")");
    }
    qb.push(", FALSE)");
}

/// Ordered comparison between values of the same JSON type
fn push_compare(qb: &mut QueryBuilder<'_, Postgres>, path: &[String], op: &str, arg: &Value) {
    let arg = normalize_value(arg.clone());

    qb.push("COALESCE(jsonb_typeof(");
    push_path(qb, path);
    qb.push(") = jsonb_typeof(");
    qb.push_bind(Json(arg.clone()));
    qb.push(") AND ");
    push_path(qb, path);
    qb.push(" ");
    qb.push(op);
    qb.push(" ");
    qb.push_bind(Json(arg));
    qb.push(", FALSE)");
}

/// Hide the password in a connection URL for logging
fn mask_database_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            let creds = &url[scheme_end + 3..at];
            match creds.find(':') {
                Some(colon) => format!(
                    "{}{}:****{}",
                    &url[..scheme_end + 3],
                    &creds[..colon],
                    &url[at..]
                ),
                None => url.to_string(),
            }
        }
        _ => url.to_string(),
    }
}
