//! Filter definitions: named, typed accessors used on the left of
//! `token:value` clauses.

use std::fmt;
use std::sync::Arc;

use crate::error::BoxError;
use crate::types::StringComparison;

use super::parser::TypeParser;
use super::value::{FilterValue, Value, ValueType};

pub(crate) type GetterFn<T> =
    dyn Fn(&T, Option<&Value>) -> Result<Value, BoxError> + Send + Sync;

pub(crate) type ResolverFn<T> = dyn Fn(&T, Option<&Value>, &str, &Value, StringComparison) -> Result<bool, BoxError>
    + Send
    + Sync;

/// How a filter reads an element.
pub(crate) enum FilterAccess<T> {
    /// Produces the left-hand value compared by operator handlers.
    Getter(Arc<GetterFn<T>>),
    /// Decides the whole clause itself, bypassing operator handlers.
    Resolver(Arc<ResolverFn<T>>),
}

/// A named filter over elements of type `T`.
///
/// ```ignore
/// engine.register_filter(Filter::new("age", |person: &Person| person.age))?;
/// engine.register_filter(
///     Filter::new("name", |person: &Person| person.name.clone()).with_operators([":", "="]),
/// )?;
/// ```
pub struct Filter<T> {
    token: String,
    value_type: ValueType,
    param_type: Option<ValueType>,
    supported_operators: Vec<String>,
    string_comparison: Option<StringComparison>,
    access: FilterAccess<T>,
    value: Argument,
    param: Option<Argument>,
}

/// Reads the text of a filter's value or parameter as one Rust type.
///
/// `accepts` rejects values the engine-wide parser of the same
/// [`ValueType`] produced but the Rust type cannot hold (`300` for `u8`).
#[derive(Clone)]
pub(crate) struct Argument {
    parser: Option<TypeParser>,
    accepts: fn(&Value) -> bool,
}

fn accepts<V: FilterValue>(value: &Value) -> bool {
    V::from_value(value).is_some()
}

impl Argument {
    fn of<V: FilterValue>() -> Self {
        Self {
            parser: TypeParser::of::<V>(),
            accepts: accepts::<V>,
        }
    }

    pub(crate) fn parser(&self) -> Option<&TypeParser> {
        self.parser.as_ref()
    }

    pub(crate) fn accepts(&self, value: &Value) -> bool {
        (self.accepts)(value)
    }
}

fn missing_argument(kind: &str, value_type: ValueType) -> BoxError {
    BoxError::from(format!("expected a {kind} of type {value_type}"))
}

impl<T: 'static> Filter<T> {
    fn from_parts(
        token: impl Into<String>,
        value_type: ValueType,
        param_type: Option<ValueType>,
        access: FilterAccess<T>,
        value: Argument,
        param: Option<Argument>,
    ) -> Self {
        Self {
            token: token.into(),
            value_type,
            param_type,
            supported_operators: Vec::new(),
            string_comparison: None,
            access,
            value,
            param,
        }
    }

    /// A filter reading one value of type `L` from each element.
    pub fn new<L, F>(token: impl Into<String>, getter: F) -> Self
    where
        L: FilterValue,
        F: Fn(&T) -> L + Send + Sync + 'static,
    {
        let getter: Arc<GetterFn<T>> =
            Arc::new(move |item: &T, _: Option<&Value>| Ok(getter(item).into_value()));
        Self::from_parts(
            token,
            L::value_type(),
            None,
            FilterAccess::Getter(getter),
            Argument::of::<L>(),
            None,
        )
    }

    /// Like [`Filter::new`] for getters that can fail. Failures surface as
    /// evaluation errors naming the filter, operator and value.
    pub fn try_new<L, E, F>(token: impl Into<String>, getter: F) -> Self
    where
        L: FilterValue,
        E: Into<BoxError>,
        F: Fn(&T) -> Result<L, E> + Send + Sync + 'static,
    {
        let getter: Arc<GetterFn<T>> = Arc::new(move |item: &T, _: Option<&Value>| {
            getter(item).map(FilterValue::into_value).map_err(Into::into)
        });
        Self::from_parts(
            token,
            L::value_type(),
            None,
            FilterAccess::Getter(getter),
            Argument::of::<L>(),
            None,
        )
    }

    /// A filter taking a parameter, written `token(param)` in queries.
    pub fn with_param<P, L, F>(token: impl Into<String>, getter: F) -> Self
    where
        P: FilterValue,
        L: FilterValue,
        F: Fn(&T, &P) -> L + Send + Sync + 'static,
    {
        let getter: Arc<GetterFn<T>> = Arc::new(move |item: &T, param: Option<&Value>| {
            let param = param
                .and_then(P::from_value)
                .ok_or_else(|| missing_argument("parameter", P::value_type()))?;
            Ok(getter(item, &*param).into_value())
        });
        Self::from_parts(
            token,
            L::value_type(),
            Some(P::value_type()),
            FilterAccess::Getter(getter),
            Argument::of::<L>(),
            Some(Argument::of::<P>()),
        )
    }

    /// A filter that evaluates every operator itself. The query value is
    /// parsed as `V`.
    pub fn resolver<V, F>(token: impl Into<String>, resolver: F) -> Self
    where
        V: FilterValue,
        F: Fn(&T, &str, &V, StringComparison) -> bool + Send + Sync + 'static,
    {
        let resolver: Arc<ResolverFn<T>> = Arc::new(
            move |item: &T,
                  _: Option<&Value>,
                  operator: &str,
                  value: &Value,
                  comparison: StringComparison| {
                let value = V::from_value(value)
                    .ok_or_else(|| missing_argument("value", V::value_type()))?;
                Ok(resolver(item, operator, &*value, comparison))
            },
        );
        Self::from_parts(
            token,
            V::value_type(),
            None,
            FilterAccess::Resolver(resolver),
            Argument::of::<V>(),
            None,
        )
    }

    /// A parameterized resolver filter.
    pub fn resolver_with_param<P, V, F>(token: impl Into<String>, resolver: F) -> Self
    where
        P: FilterValue,
        V: FilterValue,
        F: Fn(&T, &P, &str, &V, StringComparison) -> bool + Send + Sync + 'static,
    {
        let resolver: Arc<ResolverFn<T>> = Arc::new(
            move |item: &T,
                  param: Option<&Value>,
                  operator: &str,
                  value: &Value,
                  comparison: StringComparison| {
                let param = param
                    .and_then(P::from_value)
                    .ok_or_else(|| missing_argument("parameter", P::value_type()))?;
                let value = V::from_value(value)
                    .ok_or_else(|| missing_argument("value", V::value_type()))?;
                Ok(resolver(item, &*param, operator, &*value, comparison))
            },
        );
        Self::from_parts(
            token,
            V::value_type(),
            Some(P::value_type()),
            FilterAccess::Resolver(resolver),
            Argument::of::<V>(),
            Some(Argument::of::<P>()),
        )
    }
}

impl<T> Filter<T> {
    /// Restricts the filter to the given operator tokens.
    pub fn with_operators<I, S>(mut self, operators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_operators = operators.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides the engine-wide string comparison for this filter.
    pub fn with_string_comparison(mut self, comparison: StringComparison) -> Self {
        self.string_comparison = Some(comparison);
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn param_type(&self) -> Option<ValueType> {
        self.param_type
    }

    /// Operator tokens this filter accepts; empty means all of them.
    pub fn supported_operators(&self) -> &[String] {
        &self.supported_operators
    }

    pub fn supports_operator(&self, operator: &str) -> bool {
        self.supported_operators.is_empty()
            || self.supported_operators.iter().any(|token| token == operator)
    }

    pub fn string_comparison(&self) -> Option<StringComparison> {
        self.string_comparison
    }

    pub fn is_resolver(&self) -> bool {
        matches!(self.access, FilterAccess::Resolver(_))
    }

    pub(crate) fn access(&self) -> &FilterAccess<T> {
        &self.access
    }

    pub(crate) fn set_token(&mut self, token: String) {
        self.token = token;
    }

    pub(crate) fn value_argument(&self) -> &Argument {
        &self.value
    }

    pub(crate) fn param_argument(&self) -> Option<&Argument> {
        self.param.as_ref()
    }

    pub(crate) fn parsers(&self) -> impl Iterator<Item = &TypeParser> {
        self.value
            .parser()
            .into_iter()
            .chain(self.param.as_ref().and_then(Argument::parser))
    }
}

impl<T> fmt::Debug for Filter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("token", &self.token)
            .field("value_type", &self.value_type)
            .field("param_type", &self.param_type)
            .field("supported_operators", &self.supported_operators)
            .field("string_comparison", &self.string_comparison)
            .field("resolver", &self.is_resolver())
            .finish()
    }
}
