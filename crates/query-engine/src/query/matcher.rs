//! Parsed queries and lazy matching over data sets.

use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;

use rayon::prelude::*;

use crate::error::{QueryEngineError, Result};
use crate::types::{QueryError, StringComparison};

use super::evaluate::{compile_predicate, Predicate};
use super::graph::{QueryGraph, QueryNodeKind};
use super::optimizer::{propagate_not_to_leaves, swap_not_to_right_hand_side};
use super::search::SearchSource;

/// A parsed query: its graph, the problems found while parsing it and the
/// compiled predicate.
///
/// Check [`Query::is_valid`] before matching; matching an invalid query
/// returns [`QueryEngineError::InvalidQuery`].
pub struct Query<T> {
    text: String,
    graph: QueryGraph<T>,
    errors: Vec<QueryError>,
    search: Option<SearchSource<T>>,
    comparison: StringComparison,
    predicate: Option<Predicate<T>>,
}

impl<T: 'static> Query<T> {
    pub(crate) fn new(
        text: impl Into<String>,
        graph: QueryGraph<T>,
        errors: Vec<QueryError>,
        search: Option<SearchSource<T>>,
        comparison: StringComparison,
    ) -> Self {
        let predicate = compile_predicate(&graph, search.as_ref(), comparison);
        Self {
            text: text.into(),
            graph,
            errors,
            search,
            comparison,
            predicate,
        }
    }

    /// Rewrites the graph and recompiles the predicate. Matching results do
    /// not change.
    pub fn optimize(&mut self, propagate_not: bool, swap_not: bool) {
        if propagate_not {
            propagate_not_to_leaves(&mut self.graph);
        }
        if swap_not {
            swap_not_to_right_hand_side(&mut self.graph);
        }
        self.predicate = compile_predicate(&self.graph, self.search.as_ref(), self.comparison);
    }
}

impl<T> Query<T> {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn errors(&self) -> &[QueryError] {
        &self.errors
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && !self.graph.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn graph(&self) -> &QueryGraph<T> {
        &self.graph
    }

    /// Textual form of the parsed graph.
    pub fn identifier(&self) -> Option<String> {
        self.graph.root().map(|root| self.graph.identifier(root))
    }

    /// Words and phrases searched for, sorted and deduplicated. Useful for
    /// highlighting matches.
    pub fn search_words(&self) -> Vec<String> {
        self.graph
            .iter()
            .filter_map(|(_, node)| match node.kind() {
                QueryNodeKind::Search(search) => Some(search.text.clone()),
                _ => None,
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn predicate(&self) -> Result<&Predicate<T>> {
        match (&self.predicate, self.errors.first()) {
            (Some(predicate), None) => Ok(predicate),
            (_, Some(error)) => Err(QueryEngineError::InvalidQuery(error.to_string())),
            (None, None) => Err(QueryEngineError::InvalidQuery("empty query".to_string())),
        }
    }

    pub fn matches(&self, item: &T) -> Result<bool> {
        let predicate = self.predicate()?;
        predicate(item)
    }

    /// Lazily yields the elements of `data` that match, in input order.
    pub fn apply<I>(&self, data: I) -> Result<QueryMatches<'_, T, I::IntoIter>>
    where
        I: IntoIterator,
        I::Item: Borrow<T>,
    {
        Ok(QueryMatches {
            predicate: self.predicate()?,
            inner: data.into_iter(),
        })
    }

    /// Matches a slice on the rayon pool, keeping input order.
    pub fn par_apply<'d>(&self, data: &'d [T]) -> Result<Vec<&'d T>>
    where
        T: Sync,
    {
        let predicate = self.predicate()?;
        data.par_iter()
            .filter_map(|item| match predicate(item) {
                Ok(true) => Some(Ok(item)),
                Ok(false) => None,
                Err(err) => Some(Err(err)),
            })
            .collect()
    }
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("text", &self.text)
            .field("graph", &self.graph)
            .field("errors", &self.errors)
            .finish()
    }
}

/// Iterator returned by [`Query::apply`].
///
/// Yields `Err` when a filter fails on an element and keeps going afterwards.
pub struct QueryMatches<'q, T, I> {
    predicate: &'q Predicate<T>,
    inner: I,
}

impl<T, I> Iterator for QueryMatches<'_, T, I>
where
    I: Iterator,
    I::Item: Borrow<T>,
{
    type Item = Result<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        for item in self.inner.by_ref() {
            match (self.predicate)(item.borrow()) {
                Ok(true) => return Some(Ok(item)),
                Ok(false) => {}
                Err(err) => return Some(Err(err)),
            }
        }
        None
    }
}
