//! Filter operators and their typed handlers.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use fnv::FnvBuildHasher;
use indexmap::IndexMap;

use crate::types::StringComparison;

use super::value::{FilterValue, Value, ValueType};

/// Operators every engine starts with.
pub const DEFAULT_OPERATORS: [&str; 7] = [":", "=", "!=", "<", ">", "<=", ">="];

type HandlerFn = dyn Fn(&Value, &Value, StringComparison) -> bool + Send + Sync;

/// A comparison between a filter value (left) and a query value (right).
#[derive(Clone)]
pub struct OperatorHandler {
    left: ValueType,
    right: ValueType,
    handler: Arc<HandlerFn>,
}

impl OperatorHandler {
    pub fn new<L, R, F>(handler: F) -> Self
    where
        L: FilterValue,
        R: FilterValue,
        F: Fn(&L, &R, StringComparison) -> bool + Send + Sync + 'static,
    {
        Self {
            left: L::value_type(),
            right: R::value_type(),
            handler: Arc::new(move |left: &Value, right: &Value, comparison: StringComparison| {
                match (L::from_value(left), R::from_value(right)) {
                    (Some(left), Some(right)) => handler(&*left, &*right, comparison),
                    _ => false,
                }
            }),
        }
    }

    pub fn left_type(&self) -> ValueType {
        self.left
    }

    pub fn right_type(&self) -> ValueType {
        self.right
    }

    pub fn call(&self, left: &Value, right: &Value, comparison: StringComparison) -> bool {
        (self.handler)(left, right, comparison)
    }
}

impl fmt::Debug for OperatorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorHandler")
            .field("left", &self.left)
            .field("right", &self.right)
            .finish()
    }
}

/// An operator token and its handlers keyed by `(left, right)` type.
#[derive(Debug, Clone)]
pub struct FilterOperator {
    token: String,
    handlers: IndexMap<(ValueType, ValueType), OperatorHandler, FnvBuildHasher>,
}

impl FilterOperator {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            handlers: IndexMap::default(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn handlers(&self) -> impl Iterator<Item = &OperatorHandler> {
        self.handlers.values()
    }

    /// Adds a handler, returning the one it replaced for the same type pair.
    pub(crate) fn add_handler(&mut self, handler: OperatorHandler) -> Option<OperatorHandler> {
        self.handlers
            .insert((handler.left_type(), handler.right_type()), handler)
    }

    pub fn handler(&self, left: ValueType, right: ValueType) -> Option<&OperatorHandler> {
        self.handlers.get(&(left, right))
    }

    /// Picks the handler for resolved types: exact pair, then an object
    /// left-hand side, then the fully generic handler.
    pub fn resolve_handler(&self, left: ValueType, right: ValueType) -> Option<&OperatorHandler> {
        self.handler(left, right)
            .or_else(|| self.handler(ValueType::Object, right))
            .or_else(|| self.handler(ValueType::Object, ValueType::Object))
    }

    /// Whether any handler can take `left` as its left-hand side.
    pub fn accepts_left(&self, left: ValueType) -> bool {
        self.handlers
            .keys()
            .any(|(candidate, _)| *candidate == left || candidate.is_object())
    }

    /// Right-hand types worth trying for a filter of type `left`, specific
    /// types first and `Object` last, otherwise in registration order.
    pub fn candidate_right_types(&self, left: ValueType) -> Vec<ValueType> {
        let mut candidates = Vec::new();
        for (candidate_left, candidate_right) in self.handlers.keys() {
            let applies = *candidate_left == left || (!left.is_object() && candidate_left.is_object());
            if applies && !candidates.contains(candidate_right) {
                candidates.push(*candidate_right);
            }
        }
        candidates.sort_by_key(|right: &ValueType| right.is_object());
        candidates
    }
}

fn ordering_matches(operator: &str, ordering: Option<Ordering>) -> bool {
    let Some(ordering) = ordering else {
        return operator == "!=";
    };
    match operator {
        ":" | "=" => ordering == Ordering::Equal,
        "!=" => ordering != Ordering::Equal,
        "<" => ordering == Ordering::Less,
        ">" => ordering == Ordering::Greater,
        "<=" => ordering != Ordering::Greater,
        ">=" => ordering != Ordering::Less,
        _ => false,
    }
}

/// Builds the default operators with handlers for object, string, int, float
/// and bool values.
pub(crate) fn default_operators() -> Vec<FilterOperator> {
    DEFAULT_OPERATORS
        .iter()
        .map(|&token| {
            let mut operator = FilterOperator::new(token);
            operator.add_handler(OperatorHandler::new(
                move |left: &Value, right: &Value, comparison| {
                    if token == ":" {
                        left.loose_contains(right, comparison)
                    } else {
                        ordering_matches(token, left.loose_cmp(right, comparison))
                    }
                },
            ));
            operator.add_handler(OperatorHandler::new(
                move |left: &String, right: &String, comparison: StringComparison| {
                    if token == ":" {
                        comparison.contains(left, right)
                    } else {
                        ordering_matches(token, Some(comparison.compare(left, right)))
                    }
                },
            ));
            operator.add_handler(OperatorHandler::new(move |left: &i64, right: &i64, _| {
                ordering_matches(token, Some(left.cmp(right)))
            }));
            operator.add_handler(OperatorHandler::new(move |left: &f64, right: &f64, _| {
                ordering_matches(token, left.partial_cmp(right))
            }));
            if matches!(token, ":" | "=" | "!=") {
                operator.add_handler(OperatorHandler::new(move |left: &bool, right: &bool, _| {
                    ordering_matches(token, Some(left.cmp(right)))
                }));
            }
            operator
        })
        .collect()
}
