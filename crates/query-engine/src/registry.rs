//! Filter, operator and type parser registry.
//!
//! - Values and value types shared by filters and handlers
//! - Filters (getters and resolvers) keyed by token
//! - Operators with typed handlers keyed by `(left, right)` value type
//! - Type parsers used for value-type inference

mod filter;
mod operator;
mod parser;
mod value;

pub use filter::Filter;
pub use operator::{FilterOperator, OperatorHandler, DEFAULT_OPERATORS};
pub use parser::TypeParser;
pub use value::{CustomType, CustomValue, FilterValue, QueryEnum, Value, ValueType};

pub(crate) use filter::{Argument, FilterAccess, GetterFn, ResolverFn};
pub(crate) use operator::default_operators;
pub(crate) use parser::builtin_parsers;
