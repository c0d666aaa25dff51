//! Structured Response Schema
//!
//! The contract a model completion must satisfy: a JSON object with a
//! `collection` string and a `query` object. The schema renders its own
//! format instructions for the prompt and a JSON Schema for tool calls.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SchemaViolation;
use crate::llm_client::ToolDefinition;
use crate::registry::CollectionName;

/// Name of the tool used by the tool-call translator
pub const QUERY_TOOL_NAME: &str = "emit_query";

/// One named field of the response contract
#[derive(Debug, Clone, Serialize)]
pub struct ResponseField {
    pub name: &'static str,
    pub json_type: &'static str,
    pub description: String,
}

/// Fields extracted from a completion, not yet checked against the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredResponse {
    pub collection: String,
    pub query: Map<String, Value>,
}

/// The `{collection, query}` response contract
#[derive(Debug, Clone)]
pub struct ResponseSchema {
    fields: Vec<ResponseField>,
}

impl Default for ResponseSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseSchema {
    pub fn new() -> Self {
        Self {
            fields: vec![
                ResponseField {
                    name: "collection",
                    json_type: "string",
                    description: format!(
                        "Collection to query (only from: {})",
                        CollectionName::vocabulary()
                    ),
                },
                ResponseField {
                    name: "query",
                    json_type: "object",
                    description: "Filter to apply, as a JSON object without extra explanation \
                                  or formatting"
                        .to_string(),
                },
            ],
        }
    }

    pub fn fields(&self) -> &[ResponseField] {
        &self.fields
    }

    /// Natural-language format instructions embedded in the prompt
    pub fn format_instructions(&self) -> String {
        let mut out = String::from(
            "The output should be a single JSON object formatted exactly like this:\n\n{\n",
        );
        let lines: Vec<String> = self
            .fields
            .iter()
            .map(|f| format!("\t\"{}\": {}  // {}", f.name, f.json_type, f.description))
            .collect();
        out.push_str(&lines.join(",\n"));
        out.push_str("\n}\n");
        out
    }

    /// JSON Schema for the tool-call translator
    pub fn json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| {
                let mut prop = serde_json::json!({
                    "type": f.json_type,
                    "description": f.description,
                });
                if f.name == "collection" {
                    prop["enum"] = CollectionName::ALL
                        .iter()
                        .map(|c| Value::String(c.as_str().to_string()))
                        .collect();
                }
                (f.name.to_string(), prop)
            })
            .collect();
        let required: Vec<&str> = self.fields.iter().map(|f| f.name).collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn tool_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: QUERY_TOOL_NAME.to_string(),
            description: "Emit the collection and filter that answer the user's question"
                .to_string(),
            parameters: self.json_schema(),
        }
    }

    /// Parse cleaned completion text against the contract
    pub fn parse(&self, text: &str) -> Result<StructuredResponse, SchemaViolation> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| SchemaViolation::InvalidJson(e.to_string()))?;
        self.validate_value(value)
    }

    /// Check an already-parsed value against the contract
    pub fn validate_value(&self, value: Value) -> Result<StructuredResponse, SchemaViolation> {
        let mut object = match value {
            Value::Object(map) => map,
            other => {
                return Err(SchemaViolation::NotAnObject {
                    found: json_type_name(&other),
                })
            }
        };

        let collection = match object.remove("collection") {
            Some(Value::String(s)) => s,
            Some(other) => {
                return Err(SchemaViolation::WrongType {
                    key: "collection",
                    expected: "a string",
                    found: json_type_name(&other),
                })
            }
            None => return Err(SchemaViolation::MissingKey("collection")),
        };

        let query = match object.remove("query") {
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(SchemaViolation::WrongType {
                    key: "query",
                    expected: "an object",
                    found: json_type_name(&other),
                })
            }
            None => return Err(SchemaViolation::MissingKey("query")),
        };

        Ok(StructuredResponse { collection, query })
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
