//! Embeddable boolean query engine.
//!
//! This crate turns query text such as `name:bob (age>=18 or admin=true) -"on leave"`
//! into a typed predicate over any element type:
//! - A registry of filters, operators with typed handlers, and type parsers
//! - A tokenizer and graph builder with implicit AND and `not > and > or`
//! - Per-clause value-type inference and handler resolution
//! - Lazy (and rayon-parallel) matching, plus optional graph optimization
//!
//! ```ignore
//! let mut engine = QueryEngine::new();
//! engine.register_filter(Filter::new("age", |person: &Person| person.age))?;
//! engine.set_search_data_source(|person: &Person| [person.name.clone()], None)?;
//!
//! let query = engine.parse("age>=18 bob");
//! if query.is_valid() {
//!     for person in query.apply(&people)? {
//!         println!("{}", person?.name);
//!     }
//! }
//! ```

pub mod engine;
pub mod error;
pub mod options;
pub mod query;
pub mod registry;
pub mod types;

// Re-export main types
pub use engine::QueryEngine;
pub use error::{BoxError, QueryEngineError, Result};
pub use options::{QueryEngineOptions, ValidationFlags};
pub use query::{FilterOperation, NodeId, Query, QueryGraph, QueryMatches, QueryNodeKind, QueryNodeType};
pub use registry::{
    Filter, FilterOperator, FilterValue, OperatorHandler, QueryEnum, TypeParser, Value, ValueType,
    DEFAULT_OPERATORS,
};
pub use types::{ParseResult, QueryError, StringComparison};
