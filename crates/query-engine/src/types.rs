//! Shared value types for parse results and diagnostics.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Result of a type parser: `Some` on success.
pub type ParseResult<T> = Option<T>;

/// A problem found while parsing query text.
///
/// `index` and `length` are byte offsets into the original query text, even
/// for problems found inside nested groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryError {
    pub index: usize,
    pub length: usize,
    pub reason: String,
}

impl QueryError {
    pub fn new(index: usize, reason: impl Into<String>) -> Self {
        Self::with_length(index, 1, reason)
    }

    pub fn with_length(index: usize, length: usize, reason: impl Into<String>) -> Self {
        Self {
            index,
            length: length.max(1),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at {}..{})", self.reason, self.index, self.index + self.length)
    }
}

/// How strings are compared by string handlers and search words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringComparison {
    CaseSensitive,
    #[default]
    CaseInsensitive,
}

impl StringComparison {
    pub fn equals(self, left: &str, right: &str) -> bool {
        match self {
            Self::CaseSensitive => left == right,
            Self::CaseInsensitive => {
                left.eq_ignore_ascii_case(right) || left.to_lowercase() == right.to_lowercase()
            }
        }
    }

    pub fn contains(self, haystack: &str, needle: &str) -> bool {
        match self {
            Self::CaseSensitive => haystack.contains(needle),
            Self::CaseInsensitive => haystack
                .to_lowercase()
                .contains(needle.to_lowercase().as_str()),
        }
    }

    pub fn compare(self, left: &str, right: &str) -> Ordering {
        match self {
            Self::CaseSensitive => left.cmp(right),
            Self::CaseInsensitive => left.to_lowercase().cmp(&right.to_lowercase()),
        }
    }
}
