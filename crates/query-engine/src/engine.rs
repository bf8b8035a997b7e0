//! QueryEngine - registry of filters, operators and parsers, and the `parse`
//! entry point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use fnv::{FnvBuildHasher, FnvHashMap};
use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::error::{QueryEngineError, Result};
use crate::options::{QueryEngineOptions, ValidationFlags};
use crate::query::{
    filter_pattern, DefaultFilterFn, FilterPattern, GraphBuilder, Query, SearchSource,
};
use crate::registry::{
    builtin_parsers, default_operators, Filter, FilterOperator, FilterValue, OperatorHandler,
    TypeParser, ValueType,
};
use crate::types::{ParseResult, StringComparison};

#[cfg(test)]
mod tests;

type CandidateCache = RwLock<FnvHashMap<(String, ValueType), Arc<[ValueType]>>>;

/// Parses query text into [`Query`] values over elements of type `T`.
///
/// Configure filters, operators and parsers first; the first call to
/// [`QueryEngine::parse`] seals the engine and later registrations fail with
/// [`QueryEngineError::Sealed`].
pub struct QueryEngine<T> {
    options: QueryEngineOptions,
    filters: FnvHashMap<String, Filter<T>>,
    operators: IndexMap<String, FilterOperator, FnvBuildHasher>,
    type_parsers: FnvHashMap<ValueType, TypeParser>,
    custom_parsers: Vec<TypeParser>,
    default_filter: Option<Arc<DefaultFilterFn<T>>>,
    search_source: Option<SearchSource<T>>,
    filter_pattern: Option<FilterPattern>,
    candidate_cache: CandidateCache,
    sealed: AtomicBool,
}

impl<T: 'static> Default for QueryEngine<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn is_filter_token(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '.' | '#'))
}

fn is_operator_token(token: &str) -> bool {
    !token.is_empty()
        && !token
            .chars()
            .any(|ch| ch.is_whitespace() || matches!(ch, '"' | '(' | ')'))
}

impl<T: 'static> QueryEngine<T> {
    pub fn new() -> Self {
        Self::with_options(QueryEngineOptions::default())
    }

    /// Creates an engine with the default operators and parsers.
    pub fn with_options(options: QueryEngineOptions) -> Self {
        let operators = default_operators()
            .into_iter()
            .map(|operator| (operator.token().to_string(), operator))
            .collect::<IndexMap<_, _, FnvBuildHasher>>();
        let type_parsers = builtin_parsers()
            .into_iter()
            .map(|parser| (parser.value_type(), parser))
            .collect();
        let filter_pattern = filter_pattern(operators.keys().map(String::as_str));
        Self {
            options,
            filters: FnvHashMap::default(),
            operators,
            type_parsers,
            custom_parsers: Vec::new(),
            default_filter: None,
            search_source: None,
            filter_pattern,
            candidate_cache: RwLock::new(FnvHashMap::default()),
            sealed: AtomicBool::new(false),
        }
    }

    pub fn options(&self) -> &QueryEngineOptions {
        &self.options
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    fn ensure_unsealed(&self, what: &str) -> Result<()> {
        if self.is_sealed() {
            return Err(QueryEngineError::Sealed(what.to_string()));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    pub fn set_validation(&mut self, validation: ValidationFlags) -> Result<()> {
        self.ensure_unsealed("validation flags")?;
        self.options.validation = validation;
        Ok(())
    }

    pub fn set_global_string_comparison(&mut self, comparison: StringComparison) -> Result<()> {
        self.ensure_unsealed("string comparison")?;
        self.options.string_comparison = comparison;
        Ok(())
    }

    pub fn register_filter(&mut self, mut filter: Filter<T>) -> Result<()> {
        let token = filter.token().to_lowercase();
        self.ensure_unsealed(&format!("filter {token:?}"))?;
        if !is_filter_token(&token) {
            return Err(QueryEngineError::InvalidToken(token));
        }
        if self.filters.contains_key(&token) {
            return Err(QueryEngineError::DuplicateFilter(token));
        }
        if let Some(unknown) = filter
            .supported_operators()
            .iter()
            .find(|operator| !self.operators.contains_key(operator.as_str()))
        {
            return Err(QueryEngineError::UnknownOperator(unknown.clone()));
        }

        let has_parser = |value_type: ValueType| {
            self.type_parsers.contains_key(&value_type)
                || filter
                    .parsers()
                    .any(|parser| parser.value_type() == value_type)
        };

        let value_type = filter.value_type();
        if filter.is_resolver() {
            if !has_parser(value_type) {
                return Err(QueryEngineError::MissingParser(value_type));
            }
        } else {
            let handled = self
                .operators
                .values()
                .filter(|operator| filter.supports_operator(operator.token()))
                .any(|operator| operator.accepts_left(value_type));
            if !handled {
                return Err(QueryEngineError::MissingHandler {
                    filter: token,
                    value_type,
                });
            }
        }
        if let Some(param_type) = filter.param_type() {
            if !has_parser(param_type) {
                return Err(QueryEngineError::MissingParser(param_type));
            }
        }

        for parser in filter.parsers() {
            self.type_parsers
                .entry(parser.value_type())
                .or_insert_with(|| parser.clone());
        }
        log::debug!("registered filter {token:?} of type {value_type}");
        filter.set_token(token.clone());
        self.filters.insert(token, filter);
        Ok(())
    }

    /// Removes a filter, returning whether it was registered.
    pub fn remove_filter(&mut self, token: &str) -> Result<bool> {
        self.ensure_unsealed(&format!("filter {token:?}"))?;
        Ok(self.filters.remove(&token.to_lowercase()).is_some())
    }

    /// Registers an operator token. Registering an existing token is a no-op.
    pub fn register_operator(&mut self, token: &str) -> Result<()> {
        self.ensure_unsealed(&format!("operator {token:?}"))?;
        if !is_operator_token(token) {
            return Err(QueryEngineError::InvalidToken(token.to_string()));
        }
        if self.operators.contains_key(token) {
            log::debug!("operator {token:?} already registered");
            return Ok(());
        }
        self.operators
            .insert(token.to_string(), FilterOperator::new(token));
        self.filter_pattern = filter_pattern(self.operators.keys().map(String::as_str));
        Ok(())
    }

    /// Adds a handler for `(L, R)` to an operator, replacing any handler for
    /// the same pair. Parsers of `L` and `R` are registered if missing.
    pub fn register_operator_handler<L, R, F>(&mut self, operator: &str, handler: F) -> Result<()>
    where
        L: FilterValue,
        R: FilterValue,
        F: Fn(&L, &R, StringComparison) -> bool + Send + Sync + 'static,
    {
        self.ensure_unsealed(&format!("handler for operator {operator:?}"))?;
        let Some(target) = self.operators.get_mut(operator) else {
            return Err(QueryEngineError::UnknownOperator(operator.to_string()));
        };
        let handler = OperatorHandler::new::<L, R, F>(handler);
        if target.add_handler(handler).is_some() {
            log::debug!(
                "replaced handler ({}, {}) for operator {operator:?}",
                L::value_type(),
                R::value_type()
            );
        }
        for parser in [TypeParser::of::<L>(), TypeParser::of::<R>()]
            .into_iter()
            .flatten()
        {
            self.type_parsers
                .entry(parser.value_type())
                .or_insert(parser);
        }
        self.candidate_cache.write().clear();
        Ok(())
    }

    /// Registers a parser tried before any handler type during value
    /// inference. It also becomes the parser of `V`.
    pub fn register_type_parser<V, F>(&mut self, parse: F) -> Result<()>
    where
        V: FilterValue,
        F: Fn(&str) -> ParseResult<V> + Send + Sync + 'static,
    {
        self.ensure_unsealed(&format!("type parser for {}", V::value_type()))?;
        let parser = TypeParser::new::<V, F>(parse);
        let value_type = parser.value_type();
        if let Some(index) = self
            .custom_parsers
            .iter()
            .position(|existing| existing.value_type() == value_type)
        {
            log::warn!("replacing custom type parser for {value_type}");
            self.custom_parsers[index] = parser.clone();
        } else {
            self.custom_parsers.push(parser.clone());
        }
        self.type_parsers.insert(value_type, parser);
        Ok(())
    }

    /// Handles clauses whose filter token is not registered. The callback
    /// receives the element, the filter token, the operator and the raw value.
    pub fn set_default_filter_handler<F>(&mut self, handler: F) -> Result<()>
    where
        F: Fn(&T, &str, &str, &str) -> bool + Send + Sync + 'static,
    {
        self.ensure_unsealed("default filter handler")?;
        if self.default_filter.is_some() {
            log::warn!("replacing default filter handler");
        }
        self.default_filter = Some(Arc::new(handler));
        Ok(())
    }

    /// Sets the strings search words and phrases are matched against.
    /// `comparison` overrides the global string comparison for search words.
    pub fn set_search_data_source<I, S, F>(
        &mut self,
        source: F,
        comparison: Option<StringComparison>,
    ) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(&T) -> I + Send + Sync + 'static,
    {
        self.ensure_unsealed("search data source")?;
        if self.search_source.is_some() {
            log::warn!("replacing search data source");
        }
        self.search_source = Some(SearchSource::new(source, comparison));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// Registered filter tokens, sorted.
    pub fn filter_tokens(&self) -> Vec<&str> {
        let mut tokens = self.filters.keys().map(String::as_str).collect::<Vec<_>>();
        tokens.sort_unstable();
        tokens
    }

    /// Registered operator tokens, in registration order.
    pub fn operator_tokens(&self) -> impl Iterator<Item = &str> + '_ {
        self.operators.keys().map(String::as_str)
    }

    pub fn filter(&self, token: &str) -> Option<&Filter<T>> {
        match self.filters.get(token) {
            Some(filter) => Some(filter),
            None => self.filters.get(&token.to_lowercase()),
        }
    }

    pub(crate) fn operator(&self, token: &str) -> Option<&FilterOperator> {
        self.operators.get(token)
    }

    pub(crate) fn parser(&self, value_type: ValueType) -> Option<&TypeParser> {
        self.type_parsers.get(&value_type)
    }

    pub(crate) fn custom_parsers(&self) -> &[TypeParser] {
        &self.custom_parsers
    }

    pub(crate) fn default_filter(&self) -> Option<Arc<DefaultFilterFn<T>>> {
        self.default_filter.clone()
    }

    pub(crate) fn search_source(&self) -> Option<&SearchSource<T>> {
        self.search_source.as_ref()
    }

    pub(crate) fn filter_pattern(&self) -> Option<&FilterPattern> {
        self.filter_pattern.as_ref()
    }

    /// Right-hand types to try for values of an `operator` clause on a
    /// filter of type `left`. Memoized per `(operator, left)`.
    pub(crate) fn candidate_types(&self, operator: &str, left: ValueType) -> Arc<[ValueType]> {
        let key = (operator.to_string(), left);
        if let Some(candidates) = self.candidate_cache.read().get(&key) {
            return Arc::clone(candidates);
        }
        let candidates: Arc<[ValueType]> = self
            .operators
            .get(operator)
            .map(|operator| operator.candidate_right_types(left))
            .unwrap_or_default()
            .into();
        self.candidate_cache
            .write()
            .insert(key, Arc::clone(&candidates));
        candidates
    }

    // -----------------------------------------------------------------------
    // Parsing
    // -----------------------------------------------------------------------

    /// Parses `text`. Problems in the text are reported through
    /// [`Query::errors`], never as an `Err`.
    pub fn parse(&self, text: &str) -> Query<T> {
        if !self.sealed.swap(true, Ordering::AcqRel) {
            log::debug!(
                "sealing query engine with {} filters and {} operators",
                self.filters.len(),
                self.operators.len()
            );
        }

        let started = Instant::now();
        let (graph, errors) = GraphBuilder::new(self, text).build();
        log::debug!(
            "parsed query {text:?}: {} nodes, {} errors in {:?}",
            graph.iter().count(),
            errors.len(),
            started.elapsed()
        );
        Query::new(
            text,
            graph,
            errors,
            self.search_source.clone(),
            self.options.string_comparison,
        )
    }
}

impl<T> std::fmt::Debug for QueryEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut filters = self.filters.keys().collect::<Vec<_>>();
        filters.sort_unstable();
        f.debug_struct("QueryEngine")
            .field("options", &self.options)
            .field("filters", &filters)
            .field("operators", &self.operators.keys().collect::<Vec<_>>())
            .field("custom_parsers", &self.custom_parsers)
            .field("sealed", &self.sealed.load(Ordering::Relaxed))
            .finish()
    }
}
