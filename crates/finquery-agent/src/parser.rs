//! Completion Parser
//!
//! Extracts a JSON candidate from free-form model text. Models wrap JSON in
//! markdown fences, prepend labels, echo the question back, and emit shell
//! date constructors even when told not to, so nothing here assumes the
//! completion is already JSON.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)```[ \t]*(?:json\b)?").expect("valid fence regex"));

static JSON_LABEL_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^[ \t]*json[ \t]*$").expect("valid json label regex"));

static JSON_LABEL_LEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\A\s*json\b:?").expect("valid leading json regex"));

static ANSWER_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^[ \t]*Answer:[ \t]*").expect("valid answer regex"));

static QUESTION_ECHO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Question:").expect("valid question regex"));

/// `ISODate("...")`, `new Date('...')`, `DateTime("...")` and friends
static DATE_CONSTRUCTOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:\bnew\s+)?\b[A-Za-z_]*Date[A-Za-z_]*\s*\(\s*(?:"([^"]*)"|'([^']*)')\s*\)"#)
        .expect("valid date constructor regex")
});

/// Clean a raw completion down to a JSON candidate.
///
/// Returns `raw` unchanged when no `{ ... }` pair survives cleanup so the
/// downstream parse error shows what the model actually said.
pub fn clean(raw: &str) -> String {
    let stripped = strip_markup(raw);
    let rewritten = rewrite_date_literals(&stripped);

    match slice_object(&rewritten) {
        Some(candidate) => candidate.to_string(),
        None => raw.to_string(),
    }
}

/// Remove fences, labels and any trailing echoed question
fn strip_markup(text: &str) -> String {
    // Order matters: removing "Answer:" can expose a bare "json" line.
    let text = CODE_FENCE.replace_all(text, "");
    let text = JSON_LABEL_LEADING.replace(&text, "");
    let text = ANSWER_LABEL.replace_all(&text, "");
    let text = JSON_LABEL_LINE.replace_all(&text, "");
    truncate_question_echo(&text).to_string()
}

/// Drop an echoed `Question:` and everything after it, but only once the
/// first JSON object has closed; a question echoed before the answer is left
/// for slicing.
fn truncate_question_echo(text: &str) -> &str {
    let Some(close) = object_end(text) else {
        return text;
    };
    match QUESTION_ECHO.find_at(text, close) {
        Some(m) => &text[..m.start()],
        None => text,
    }
}

/// Byte offset just past the `}` that balances the first `{`. Braces inside
/// string literals do not count.
fn object_end(text: &str) -> Option<usize> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Byte ranges of the double-quoted string literals in `text`
fn string_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut open = None;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        match open {
            Some(start) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    spans.push(start..i + 1);
                    open = None;
                }
            }
            None if c == '"' => open = Some(i),
            None => {}
        }
    }
    spans
}

/// Rewrite store-native date constructors into plain quoted strings.
/// Constructors quoted inside a string literal are left alone.
pub fn rewrite_date_literals(text: &str) -> String {
    let quoted = string_spans(text);
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in DATE_CONSTRUCTOR.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if quoted.iter().any(|span| span.contains(&whole.start())) {
            continue;
        }
        let value = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        out.push_str(&text[last..whole.start()]);
        out.push('"');
        out.push_str(value);
        out.push('"');
        last = whole.end();
    }
    out.push_str(&text[last..]);
    out
}

/// Slice from the first `{` to the last `}`
fn slice_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}
