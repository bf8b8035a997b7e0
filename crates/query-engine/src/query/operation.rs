//! Filter clause compilation: `token(param)<op>value` to a typed operation.

use std::fmt;
use std::sync::Arc;

use crate::engine::QueryEngine;
use crate::error::{BoxError, QueryEngineError, Result};
use crate::registry::{
    Argument, FilterAccess, GetterFn, OperatorHandler, ResolverFn, Value, ValueType,
};
use crate::types::StringComparison;

use super::graph::Span;

pub(crate) type DefaultFilterFn<T> = dyn Fn(&T, &str, &str, &str) -> bool + Send + Sync;

// ---------------------------------------------------------------------------
// Parsed clause
// ---------------------------------------------------------------------------

/// A `token(param)<op>value` match. Spans are offsets into the full query.
#[derive(Debug, Clone)]
pub(crate) struct FilterClause<'a> {
    pub text: &'a str,
    pub span: Span,
    pub token: (&'a str, Span),
    pub param: Option<(&'a str, Span)>,
    pub operator: (&'a str, Span),
    pub value: (&'a str, Span),
}

impl FilterClause<'_> {
    pub(crate) fn part_span(&self, part: ClausePart) -> Span {
        match part {
            ClausePart::Token => self.token.1,
            ClausePart::Param => self.param.map_or(self.token.1, |(_, span)| span),
            ClausePart::Operator => self.operator.1,
            ClausePart::Value => self.value.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClausePart {
    Token,
    Param,
    Operator,
    Value,
}

/// Why a clause could not be compiled, and which part of it is at fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ClauseError {
    pub part: ClausePart,
    pub reason: String,
}

impl ClauseError {
    fn new(part: ClausePart, reason: impl Into<String>) -> Self {
        Self {
            part,
            reason: reason.into(),
        }
    }
}

pub(crate) enum CompiledClause<T> {
    Operation(FilterOperation<T>),
    /// Unknown filter dropped because the engine skips unknown filters.
    Skip,
}

fn unquote(raw: &str) -> &str {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        &raw[1..raw.len() - 1]
    } else {
        raw
    }
}

fn conversion_error(value: &str) -> ClauseError {
    ClauseError::new(
        ClausePart::Value,
        format!("The value {value} could not be converted to any of the supported handler types."),
    )
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

pub(crate) fn compile_filter_clause<T: 'static>(
    engine: &QueryEngine<T>,
    clause: &FilterClause<'_>,
) -> std::result::Result<CompiledClause<T>, ClauseError> {
    let token = clause.token.0.to_lowercase();
    let operator_token = clause.operator.0;
    let raw_value = unquote(clause.value.0);

    let Some(filter) = engine.filter(&token) else {
        if engine.options().skip_unknown_filters() {
            log::trace!("skipping unknown filter {token:?}");
            return Ok(CompiledClause::Skip);
        }
        if let Some(default) = engine.default_filter() {
            return Ok(CompiledClause::Operation(FilterOperation {
                filter: token,
                operator: operator_token.to_string(),
                raw_value: raw_value.to_string(),
                param: None,
                value: Value::String(raw_value.to_string()),
                comparison: engine.options().string_comparison,
                evaluator: OperationEvaluator::Default(default),
            }));
        }
        return Err(ClauseError::new(ClausePart::Token, "Unknown filter type"));
    };

    let Some(operator) = engine.operator(operator_token) else {
        return Err(ClauseError::new(ClausePart::Operator, "Unknown filter operator"));
    };
    if !filter.supports_operator(operator_token) {
        return Err(ClauseError::new(
            ClausePart::Operator,
            format!("Operator \"{operator_token}\" is not supported by filter \"{token}\""),
        ));
    }

    let param = match (filter.param_type(), clause.param) {
        (Some(param_type), Some((raw, _))) => {
            let raw = unquote(raw.trim());
            let parsed = filter
                .param_argument()
                .and_then(|argument| parse_argument(engine, argument, param_type, raw))
                .ok_or_else(|| {
                    ClauseError::new(
                        ClausePart::Param,
                        format!("The parameter {raw} could not be converted to {param_type}"),
                    )
                })?;
            Some(parsed)
        }
        (Some(_), None) => {
            return Err(ClauseError::new(
                ClausePart::Token,
                format!("Filter \"{token}\" requires a parameter"),
            ));
        }
        (None, Some(_)) => {
            return Err(ClauseError::new(
                ClausePart::Param,
                format!("Filter \"{token}\" does not take a parameter"),
            ));
        }
        (None, None) => None,
    };

    let comparison = filter
        .string_comparison()
        .unwrap_or(engine.options().string_comparison);
    let left = filter.value_type();

    let (value, evaluator) = match filter.access() {
        FilterAccess::Resolver(resolver) => {
            let value = parse_argument(engine, filter.value_argument(), left, raw_value)
                .ok_or_else(|| conversion_error(raw_value))?;
            (value, OperationEvaluator::Resolver(Arc::clone(resolver)))
        }
        FilterAccess::Getter(getter) => {
            let value = infer_value(engine, operator_token, left, raw_value)
                .ok_or_else(|| conversion_error(raw_value))?;
            let right = value.value_type();
            let handler = operator.resolve_handler(left, right).ok_or_else(|| {
                ClauseError::new(
                    ClausePart::Value,
                    format!("No handler of type ({left}, {right}) found for operator \"{operator_token}\""),
                )
            })?;
            (
                value,
                OperationEvaluator::Handler {
                    getter: Arc::clone(getter),
                    handler: handler.clone(),
                },
            )
        }
    };

    Ok(CompiledClause::Operation(FilterOperation {
        filter: token,
        operator: operator_token.to_string(),
        raw_value: raw_value.to_string(),
        param,
        value,
        comparison,
        evaluator,
    }))
}

/// Parses a resolver value or a parameter: custom parsers of its type, the
/// filter's own parser, then the engine parser. The first value the
/// argument's Rust type can hold wins.
fn parse_argument<T: 'static>(
    engine: &QueryEngine<T>,
    argument: &Argument,
    value_type: ValueType,
    raw: &str,
) -> Option<Value> {
    engine
        .custom_parsers()
        .iter()
        .filter(|parser| parser.value_type() == value_type)
        .chain(argument.parser())
        .chain(engine.parser(value_type))
        .filter_map(|parser| parser.parse(raw))
        .find(|value| argument.accepts(value))
}

/// Resolves the right-hand value: custom parsers, then the handler types of
/// the operator (specific before `Object`), then the filter's own type.
fn infer_value<T: 'static>(
    engine: &QueryEngine<T>,
    operator: &str,
    left: ValueType,
    raw: &str,
) -> Option<Value> {
    if let Some(value) = engine
        .custom_parsers()
        .iter()
        .find_map(|parser| parser.parse(raw))
    {
        return Some(value);
    }

    let candidates = engine.candidate_types(operator, left);
    candidates
        .iter()
        .filter_map(|right| engine.parser(*right))
        .find_map(|parser| parser.parse(raw))
        .or_else(|| engine.parser(left).and_then(|parser| parser.parse(raw)))
}

// ---------------------------------------------------------------------------
// Compiled operation
// ---------------------------------------------------------------------------

enum OperationEvaluator<T> {
    Handler {
        getter: Arc<GetterFn<T>>,
        handler: OperatorHandler,
    },
    Resolver(Arc<ResolverFn<T>>),
    Default(Arc<DefaultFilterFn<T>>),
}

/// One filter, one operator and one parsed value, bound together.
pub struct FilterOperation<T> {
    filter: String,
    operator: String,
    raw_value: String,
    param: Option<Value>,
    value: Value,
    comparison: StringComparison,
    evaluator: OperationEvaluator<T>,
}

impl<T> FilterOperation<T> {
    pub fn filter_token(&self) -> &str {
        &self.filter
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    /// The value as written in the query, without quotes.
    pub fn raw_value(&self) -> &str {
        &self.raw_value
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn param(&self) -> Option<&Value> {
        self.param.as_ref()
    }

    pub fn matches(&self, item: &T) -> Result<bool> {
        match &self.evaluator {
            OperationEvaluator::Handler { getter, handler } => {
                let left = getter(item, self.param.as_ref())
                    .map_err(|source| self.evaluation_error(source))?;
                Ok(handler.call(&left, &self.value, self.comparison))
            }
            OperationEvaluator::Resolver(resolver) => resolver(
                item,
                self.param.as_ref(),
                &self.operator,
                &self.value,
                self.comparison,
            )
            .map_err(|source| self.evaluation_error(source)),
            OperationEvaluator::Default(default) => {
                Ok(default(item, &self.filter, &self.operator, &self.raw_value))
            }
        }
    }

    fn evaluation_error(&self, source: BoxError) -> QueryEngineError {
        QueryEngineError::Evaluation {
            filter: self.filter.clone(),
            operator: self.operator.clone(),
            value: self.raw_value.clone(),
            source,
        }
    }
}

impl<T> fmt::Debug for FilterOperation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterOperation")
            .field("filter", &self.filter)
            .field("operator", &self.operator)
            .field("param", &self.param)
            .field("value", &self.value)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unquote_strips_only_matching_quotes() {
        assert_eq!(unquote("\"a b\""), "a b");
        assert_eq!(unquote("\"a"), "\"a");
        assert_eq!(unquote("\""), "\"");
        assert_eq!(unquote("plain"), "plain");
    }
}
