//! Collection Registry
//!
//! The closed vocabulary of financial collections a translated query may
//! target, plus the keyword classifier used to double-check a model's choice.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A valid target collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionName {
    Stocks,
    Etfs,
    Customers,
    Accounts,
    Transactions,
}

/// Keyword → collection, in priority order. First substring hit wins.
const CLASSIFIER_KEYWORDS: &[(&str, CollectionName)] = &[
    ("stock", CollectionName::Stocks),
    ("etf", CollectionName::Etfs),
    ("customer", CollectionName::Customers),
    ("account", CollectionName::Accounts),
    ("transaction", CollectionName::Transactions),
];

impl CollectionName {
    /// All collections in registry order
    pub const ALL: [CollectionName; 5] = [
        CollectionName::Stocks,
        CollectionName::Etfs,
        CollectionName::Customers,
        CollectionName::Accounts,
        CollectionName::Transactions,
    ];

    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionName::Stocks => "stocks",
            CollectionName::Etfs => "etfs",
            CollectionName::Customers => "customers",
            CollectionName::Accounts => "accounts",
            CollectionName::Transactions => "transactions",
        }
    }

    /// Closed-set lookup, case-insensitive after trimming
    pub fn parse(declared: &str) -> Option<Self> {
        let wanted = declared.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
    }

    /// Keyword heuristic over free text; defaults to `Stocks`
    pub fn classify(text: &str) -> Self {
        let lowered = text.to_lowercase();
        CLASSIFIER_KEYWORDS
            .iter()
            .find(|(keyword, _)| lowered.contains(keyword))
            .map(|(_, collection)| *collection)
            .unwrap_or(CollectionName::Stocks)
    }

    /// Comma-separated list of valid names for prompts and error messages
    pub fn vocabulary() -> String {
        Self::ALL
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for names outside the closed set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown collection '{0}'")]
pub struct UnknownCollection(pub String);

impl FromStr for CollectionName {
    type Err = UnknownCollection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownCollection(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive_and_trimmed() {
        assert_eq!(CollectionName::parse("ETFs"), Some(CollectionName::Etfs));
        assert_eq!(
            CollectionName::parse("  Transactions \n"),
            Some(CollectionName::Transactions)
        );
        assert_eq!(CollectionName::parse("ACCOUNTS"), Some(CollectionName::Accounts));
        assert_eq!(CollectionName::parse("orders"), None);
        assert_eq!(CollectionName::parse("stock"), None);
        assert_eq!(CollectionName::parse(""), None);
    }

    #[test]
    fn test_classify_priority_order() {
        // "stock" beats "account" because it comes first in the keyword list
        assert_eq!(
            CollectionName::classify("Which accounts hold Apple stock?"),
            CollectionName::Stocks
        );
        assert_eq!(
            CollectionName::classify("List ETF holdings"),
            CollectionName::Etfs
        );
        assert_eq!(
            CollectionName::classify("Customers in Texas"),
            CollectionName::Customers
        );
        assert_eq!(
            CollectionName::classify("Show me all transactions over $1000"),
            CollectionName::Transactions
        );
    }

    #[test]
    fn test_classify_defaults_to_stocks() {
        assert_eq!(CollectionName::classify("hello there"), CollectionName::Stocks);
        assert_eq!(CollectionName::classify(""), CollectionName::Stocks);
    }

    #[test]
    fn test_vocabulary_lists_all() {
        assert_eq!(
            CollectionName::vocabulary(),
            "stocks, etfs, customers, accounts, transactions"
        );
    }

    #[test]
    fn test_from_str_error() {
        let err = "orders".parse::<CollectionName>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown collection 'orders'");
    }
}
