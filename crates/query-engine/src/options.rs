//! Engine configuration.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::types::StringComparison;

bitflags! {
    /// Parse-time validation switches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ValidationFlags: u8 {
        /// Reject search words when no search data source is configured.
        const VALIDATE_FILTERS = 1;
        /// Drop clauses with unknown filter tokens instead of reporting them.
        const SKIP_UNKNOWN_FILTERS = 1 << 1;
    }
}

impl Default for ValidationFlags {
    fn default() -> Self {
        Self::VALIDATE_FILTERS
    }
}

/// Options applied to every query parsed by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryEngineOptions {
    pub validation: ValidationFlags,
    /// Comparison used by string handlers and search words unless a filter or
    /// the search data source overrides it.
    pub string_comparison: StringComparison,
}

impl QueryEngineOptions {
    pub fn validate_filters(&self) -> bool {
        self.validation.contains(ValidationFlags::VALIDATE_FILTERS)
    }

    pub fn skip_unknown_filters(&self) -> bool {
        self.validation.contains(ValidationFlags::SKIP_UNKNOWN_FILTERS)
    }
}
