//! Type parsers: raw query text to typed values.

use std::fmt;
use std::sync::Arc;

use crate::types::ParseResult;

use super::value::{FilterValue, Value, ValueType};

type ParseFn = dyn Fn(&str) -> Option<Value> + Send + Sync;

/// Converts raw text into a [`Value`] of one [`ValueType`].
#[derive(Clone)]
pub struct TypeParser {
    value_type: ValueType,
    parse: Arc<ParseFn>,
}

impl TypeParser {
    pub fn new<V, F>(parse: F) -> Self
    where
        V: FilterValue,
        F: Fn(&str) -> ParseResult<V> + Send + Sync + 'static,
    {
        Self {
            value_type: V::value_type(),
            parse: Arc::new(move |raw: &str| parse(raw).map(FilterValue::into_value)),
        }
    }

    /// The default parser of `V`, if the type declares one.
    pub fn of<V: FilterValue>() -> Option<Self> {
        V::parser().map(Self::new::<V, _>)
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn parse(&self, raw: &str) -> Option<Value> {
        (self.parse)(raw)
    }
}

impl fmt::Debug for TypeParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeParser")
            .field("value_type", &self.value_type)
            .finish()
    }
}

/// Parsers every engine starts with.
pub(crate) fn builtin_parsers() -> Vec<TypeParser> {
    [
        TypeParser::of::<Value>(),
        TypeParser::of::<String>(),
        TypeParser::of::<i64>(),
        TypeParser::of::<f64>(),
        TypeParser::of::<bool>(),
    ]
    .into_iter()
    .flatten()
    .collect()
}
