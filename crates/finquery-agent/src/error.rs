//! Translation errors
//!
//! Every failure between a raw model completion and a validated query ends up
//! as a `TranslationError` carrying bounded previews of what the model said.

use thiserror::Error;

/// Default preview length for diagnostic payloads
pub const DEFAULT_PREVIEW_CHARS: usize = 300;

/// The cleaned completion does not satisfy the structured response contract
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaViolation {
    #[error("Completion is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Completion must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("Missing required key '{0}'")]
    MissingKey(&'static str),

    #[error("Key '{key}' must be {expected}, found {found}")]
    WrongType {
        key: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

/// What went wrong during translation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslationErrorKind {
    #[error("JSON parsing failed: {0}")]
    InvalidJson(String),

    #[error("Schema violation: {0}")]
    Schema(SchemaViolation),

    #[error("Invalid collection '{declared}' (valid: {valid})")]
    InvalidCollection { declared: String, valid: String },

    #[error("Model completion failed: {0}")]
    Completion(String),
}

/// Translation failure with bounded previews of the offending output
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}\nRaw model response:\n{raw_preview}\nCleaned candidate:\n{cleaned_preview}")]
pub struct TranslationError {
    pub kind: TranslationErrorKind,
    pub raw_preview: String,
    pub cleaned_preview: String,
}

impl TranslationError {
    pub fn new(kind: TranslationErrorKind, raw: &str, cleaned: &str, max_chars: usize) -> Self {
        Self {
            kind,
            raw_preview: preview(raw, max_chars),
            cleaned_preview: preview(cleaned, max_chars),
        }
    }

    /// A model call failure, before any output exists
    pub fn completion(err: &anyhow::Error) -> Self {
        Self {
            kind: TranslationErrorKind::Completion(format!("{:#}", err)),
            raw_preview: String::new(),
            cleaned_preview: String::new(),
        }
    }

    pub fn is_invalid_collection(&self) -> bool {
        matches!(self.kind, TranslationErrorKind::InvalidCollection { .. })
    }

    pub fn is_schema_violation(&self) -> bool {
        matches!(
            self.kind,
            TranslationErrorKind::Schema(_) | TranslationErrorKind::InvalidJson(_)
        )
    }
}

const ELLIPSIS: &str = "...";

/// `text` cut to at most `max_chars` characters, the trailing "..." included
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars <= ELLIPSIS.len() {
        return text.chars().take(max_chars).collect();
    }
    let kept: String = text.chars().take(max_chars - ELLIPSIS.len()).collect();
    format!("{}{}", kept, ELLIPSIS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        assert_eq!(preview("abcdefgh", 6), "abc...");
        assert_eq!(preview("abcdef", 6), "abcdef");
        assert_eq!(preview("€€€€€€", 5), "€€...");
        assert_eq!(preview("abcdef", 2), "ab");
        assert_eq!(preview("", 10), "");
    }

    #[test]
    fn test_error_carries_bounded_previews() {
        let raw = "x".repeat(1000);
        let err = TranslationError::new(
            TranslationErrorKind::InvalidJson("eof".into()),
            &raw,
            &raw,
            DEFAULT_PREVIEW_CHARS,
        );
        assert_eq!(err.raw_preview.chars().count(), DEFAULT_PREVIEW_CHARS);
        assert!(err.raw_preview.ends_with("..."));
        assert!(err.cleaned_preview.chars().count() <= DEFAULT_PREVIEW_CHARS);
        assert!(err.is_schema_violation());
        assert!(!err.is_invalid_collection());
    }

    #[test]
    fn test_display_includes_raw_text() {
        let err = TranslationError::new(
            TranslationErrorKind::Schema(SchemaViolation::MissingKey("query")),
            r#"{"collection": "stocks"}"#,
            r#"{"collection": "stocks"}"#,
            DEFAULT_PREVIEW_CHARS,
        );
        let rendered = err.to_string();
        assert!(rendered.contains("Missing required key 'query'"));
        assert!(rendered.contains(r#"{"collection": "stocks"}"#));
    }
}
