//! Store-native value normalization
//!
//! Stores may hand back extended-JSON wrappers for types JSON lacks
//! (`{"$oid": ..}`, `{"$date": ..}`, `{"$numberLong": ..}`). Everything that
//! leaves the executor is plain JSON: identifiers and dates become strings,
//! wrapped numbers become numbers.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};

use crate::store::Document;

/// Normalize a whole document
pub fn normalize_document(doc: Document) -> Document {
    doc.into_iter()
        .map(|(k, v)| (k, normalize_value(v)))
        .collect()
}

/// Normalize one value, recursing into arrays and objects
pub fn normalize_value(value: Value) -> Value {
    match value {
        Value::Object(map) => match unwrap_extended(&map) {
            Some(plain) => plain,
            None => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, normalize_value(v)))
                    .collect(),
            ),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_value).collect()),
        other => other,
    }
}

/// Is `map` itself a single-key extended-JSON wrapper such as `{"$date": ..}`?
///
/// Only the top level is inspected; wrappers nested inside `map` do not count.
pub fn is_extended_wrapper(map: &Map<String, Value>) -> bool {
    unwrap_extended(map).is_some()
}

/// Plain JSON for a single-key extended-JSON wrapper, if `map` is one
fn unwrap_extended(map: &Map<String, Value>) -> Option<Value> {
    if map.len() != 1 {
        return None;
    }
    let (key, inner) = map.iter().next()?;
    match key.as_str() {
        "$oid" | "$symbol" => inner.as_str().map(|s| Value::String(s.to_string())),
        "$date" => date_value(inner),
        "$numberLong" | "$numberInt" | "$numberDouble" | "$numberDecimal" => number_value(inner),
        _ => None,
    }
}

fn date_value(inner: &Value) -> Option<Value> {
    match inner {
        Value::String(s) => Some(Value::String(s.clone())),
        Value::Number(n) => n.as_i64().and_then(millis_to_iso),
        Value::Object(m) => m
            .get("$numberLong")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(millis_to_iso),
        _ => None,
    }
}

fn millis_to_iso(millis: i64) -> Option<Value> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)))
}

fn number_value(inner: &Value) -> Option<Value> {
    match inner {
        Value::Number(n) => Some(Value::Number(n.clone())),
        Value::String(s) => {
            if let Ok(i) = s.parse::<i64>() {
                Some(Value::Number(i.into()))
            } else {
                s.parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
            }
        }
        _ => None,
    }
}
