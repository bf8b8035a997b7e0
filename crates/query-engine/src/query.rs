//! Query parsing, compilation, and matching.
//!
//! This module provides the query language, including:
//! - Tokenization (whitespace, combinators, groups, filters, words)
//! - Graph building with implicit AND and `not > and > or` precedence
//! - Filter clause compilation against the registry
//! - Predicate compilation and lazy matching
//! - Graph optimization (De Morgan, negation reordering)

mod builder;
mod evaluate;
mod graph;
mod lexer;
mod matcher;
mod operation;
mod optimizer;
mod search;
mod tokenizer;

pub use graph::{NodeId, QueryGraph, QueryNode, QueryNodeKind, QueryNodeType, SearchNode, Span};
pub use matcher::{Query, QueryMatches};
pub use operation::FilterOperation;
pub use search::SearchSource;

pub(crate) use builder::GraphBuilder;
pub(crate) use operation::DefaultFilterFn;
pub(crate) use tokenizer::{filter_pattern, FilterPattern};
