//! Filter evaluation for the in-memory store
//!
//! Supports the document-filter subset the translator asks models for:
//! implicit equality, `$eq $ne $gt $gte $lt $lte $in $nin $exists $regex $not`,
//! logical `$and $or $nor`, and dotted field paths. Field values are compared
//! after normalization, so `{"$date": "2024-01-01"}` compares as a string.
//! Strings order lexicographically, which orders ISO-8601 dates correctly.

use regex::RegexBuilder;
use serde_json::{Map, Value};
use std::cmp::Ordering;

use super::{Document, Result, StoreError};
use crate::normalize::{is_extended_wrapper, normalize_value};

/// Does `doc` satisfy every clause of `filter`?
///
/// Every clause is evaluated, so a malformed clause is reported even when an
/// earlier one already failed to match.
pub fn matches(doc: &Document, filter: &Document) -> Result<bool> {
    let mut all = true;
    for (key, condition) in filter {
        all &= match_clause(doc, key, condition)?;
    }
    Ok(all)
}

/// Reject malformed filters without needing a document
pub fn validate(filter: &Document) -> Result<()> {
    matches(&Document::new(), filter).map(|_| ())
}

fn match_clause(doc: &Document, key: &str, condition: &Value) -> Result<bool> {
    match key {
        "$and" => {
            let mut all = true;
            for sub in sub_filters(key, condition)? {
                all &= matches(doc, sub)?;
            }
            Ok(all)
        }
        "$or" => {
            let mut any = false;
            for sub in sub_filters(key, condition)? {
                any |= matches(doc, sub)?;
            }
            Ok(any)
        }
        "$nor" => {
            let mut any = false;
            for sub in sub_filters(key, condition)? {
                any |= matches(doc, sub)?;
            }
            Ok(!any)
        }
        op if op.starts_with('$') => Err(StoreError::InvalidFilter(format!(
            "unsupported top-level operator '{}'",
            op
        ))),
        path => {
            let value = lookup(doc, path);
            match_condition(value.as_ref(), condition)
        }
    }
}

fn sub_filters<'a>(op: &str, condition: &'a Value) -> Result<Vec<&'a Document>> {
    let items = condition
        .as_array()
        .ok_or_else(|| StoreError::InvalidFilter(format!("'{}' expects an array", op)))?;
    if items.is_empty() {
        return Err(StoreError::InvalidFilter(format!(
            "'{}' expects a non-empty array",
            op
        )));
    }
    items
        .iter()
        .map(|item| {
            item.as_object().ok_or_else(|| {
                StoreError::InvalidFilter(format!("'{}' entries must be objects", op))
            })
        })
        .collect()
}

/// Resolve a dotted path; arrays of objects fan out into an array of hits
fn lookup(doc: &Document, path: &str) -> Option<Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = normalize_value(doc.get(first)?.clone());

    for segment in segments {
        current = match current {
            Value::Object(mut map) => map.remove(segment)?,
            Value::Array(items) => match segment.parse::<usize>() {
                Ok(idx) => items.into_iter().nth(idx)?,
                Err(_) => {
                    let hits: Vec<Value> = items
                        .into_iter()
                        .filter_map(|item| match item {
                            Value::Object(mut map) => map.remove(segment),
                            _ => None,
                        })
                        .collect();
                    if hits.is_empty() {
                        return None;
                    }
                    Value::Array(hits)
                }
            },
            _ => return None,
        };
    }
    Some(current)
}

/// `{"$gt": ..}` style conditions. A bare extended-JSON literal like
/// `{"$date": ..}` is a value, but wrappers inside operator arguments are not.
pub(crate) fn operator_map(condition: &Value) -> Option<&Map<String, Value>> {
    condition
        .as_object()
        .filter(|m| !m.is_empty() && m.keys().all(|k| k.starts_with('$')))
        .filter(|m| !is_extended_wrapper(m))
}

fn match_condition(value: Option<&Value>, condition: &Value) -> Result<bool> {
    let Some(ops) = operator_map(condition) else {
        return Ok(equals(value, condition));
    };

    let mut all = true;
    for (op, arg) in ops {
        all &= match op.as_str() {
            "$eq" => equals(value, arg),
            "$ne" => !equals(value, arg),
            "$gt" => compares(value, arg, |o| o == Ordering::Greater),
            "$gte" => compares(value, arg, |o| o != Ordering::Less),
            "$lt" => compares(value, arg, |o| o == Ordering::Less),
            "$lte" => compares(value, arg, |o| o != Ordering::Greater),
            "$in" => in_list(value, op, arg)?,
            "$nin" => !in_list(value, op, arg)?,
            "$exists" => {
                let wanted = arg.as_bool().ok_or_else(|| {
                    StoreError::InvalidFilter("'$exists' expects a boolean".to_string())
                })?;
                value.is_some() == wanted
            }
            "$regex" => regex_match(value, arg, ops.get("$options"))?,
            "$options" => {
                if !ops.contains_key("$regex") {
                    return Err(StoreError::InvalidFilter(
                        "'$options' without '$regex'".to_string(),
                    ));
                }
                true
            }
            "$not" => !match_condition(value, arg)?,
            other => {
                return Err(StoreError::InvalidFilter(format!(
                    "unsupported operator '{}'",
                    other
                )))
            }
        };
    }
    Ok(all)
}

/// Equality with array-element semantics: `{"tags": "x"}` matches `["x", "y"]`
fn equals(value: Option<&Value>, target: &Value) -> bool {
    let target = normalize_value(target.clone());
    match value {
        None => target.is_null(),
        Some(Value::Array(items)) if !target.is_array() => items.iter().any(|v| *v == target),
        Some(v) => *v == target,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn compares(value: Option<&Value>, arg: &Value, pred: impl Fn(Ordering) -> bool) -> bool {
    let arg = normalize_value(arg.clone());
    match value {
        None => false,
        Some(Value::Array(items)) => items
            .iter()
            .any(|v| compare(v, &arg).map(&pred).unwrap_or(false)),
        Some(v) => compare(v, &arg).map(&pred).unwrap_or(false),
    }
}

fn in_list(value: Option<&Value>, op: &str, arg: &Value) -> Result<bool> {
    let items = arg
        .as_array()
        .ok_or_else(|| StoreError::InvalidFilter(format!("'{}' expects an array", op)))?;
    Ok(items.iter().any(|candidate| equals(value, candidate)))
}

fn regex_match(value: Option<&Value>, pattern: &Value, options: Option<&Value>) -> Result<bool> {
    let pattern = pattern
        .as_str()
        .ok_or_else(|| StoreError::InvalidFilter("'$regex' expects a string".to_string()))?;
    let options = options.and_then(|o| o.as_str()).unwrap_or_default();

    let re = RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .build()
        .map_err(|e| StoreError::InvalidFilter(format!("bad '$regex': {}", e)))?;

    Ok(match value {
        Some(Value::String(s)) => re.is_match(s),
        Some(Value::Array(items)) => items
            .iter()
            .any(|v| v.as_str().map(|s| re.is_match(s)).unwrap_or(false)),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn check(d: &Value, f: Value) -> bool {
        matches(&doc(d.clone()), &doc(f)).unwrap()
    }

    #[test]
    fn test_equality_and_comparison() {
        let d = json!({"amount": 1500, "currency": "USD", "tags": ["wire", "intl"]});
        assert!(check(&d, json!({"currency": "USD"})));
        assert!(check(&d, json!({"amount": {"$gt": 1000}})));
        assert!(!check(&d, json!({"amount": {"$gt": 1000, "$lt": 1200}})));
        assert!(check(&d, json!({"tags": "wire"})));
        assert!(check(&d, json!({"missing": null})));
        assert!(check(&d, json!({})));
    }

    #[test]
    fn test_dates_compare_as_iso_strings() {
        let d = json!({"opened": {"$date": "2024-02-10T00:00:00Z"}});
        assert!(check(&d, json!({"opened": {"$gte": "2024-01-01"}})));
        assert!(!check(&d, json!({"opened": {"$lt": "2024-01-01"}})));
    }

    #[test]
    fn test_wrapped_date_operator_arguments() {
        let d = json!({"opened": "2024-02-10T00:00:00Z"});
        assert!(check(&d, json!({"opened": {"$gte": {"$date": "2024-01-01T00:00:00Z"}}})));
        assert!(!check(&d, json!({"opened": {"$lt": {"$date": "2024-01-01T00:00:00Z"}}})));
        assert!(check(
            &d,
            json!({"opened": {"$gte": {"$date": "2024-01-01T00:00:00Z"}, "$lt": {"$date": "2024-03-01T00:00:00Z"}}})
        ));
        // A bare wrapper is still an equality value
        assert!(check(&d, json!({"opened": {"$date": "2024-02-10T00:00:00Z"}})));
    }

    #[test]
    fn test_logical_operators() {
        let d = json!({"state": "TX", "balance": 50});
        assert!(check(&d, json!({"$or": [{"state": "CA"}, {"state": "TX"}]})));
        assert!(!check(&d, json!({"$and": [{"state": "TX"}, {"balance": {"$gt": 100}}]})));
        assert!(check(&d, json!({"$nor": [{"state": "CA"}]})));
        assert!(check(&d, json!({"state": {"$in": ["TX", "NY"]}})));
        assert!(check(&d, json!({"state": {"$nin": ["CA"]}})));
        assert!(check(&d, json!({"balance": {"$not": {"$gt": 100}}})));
    }

    #[test]
    fn test_exists_regex_and_paths() {
        let d = json!({"name": "Vanguard Total", "address": {"city": "Austin"}, "holdings": [{"ticker": "AAPL"}, {"ticker": "MSFT"}]});
        assert!(check(&d, json!({"address.city": "Austin"})));
        assert!(check(&d, json!({"holdings.ticker": "MSFT"})));
        assert!(check(&d, json!({"holdings.0.ticker": "AAPL"})));
        assert!(check(&d, json!({"name": {"$regex": "^vanguard", "$options": "i"}})));
        assert!(check(&d, json!({"email": {"$exists": false}})));
        assert!(!check(&d, json!({"name": {"$exists": false}})));
    }

    #[test]
    fn test_malformed_filters_rejected() {
        let d = doc(json!({"a": 1}));
        assert!(matches(&d, &doc(json!({"a": {"$where": "1"}}))).is_err());
        assert!(matches(&d, &doc(json!({"$or": {"a": 1}}))).is_err());
        assert!(matches(&d, &doc(json!({"$and": []}))).is_err());
        assert!(matches(&d, &doc(json!({"a": {"$in": 1}}))).is_err());
        assert!(validate(&doc(json!({"$text": {"$search": "x"}}))).is_err());
        assert!(validate(&doc(json!({"a": {"$gt": 1}}))).is_ok());
    }
}
