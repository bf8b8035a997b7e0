//! Graph builder: flat token list per nesting level to a boolean tree.

use std::sync::Arc;

use crate::engine::QueryEngine;
use crate::types::QueryError;

use super::graph::{NodeId, QueryGraph, QueryNodeKind, QueryNodeType, SearchNode, Span};
use super::operation::{compile_filter_clause, CompiledClause, FilterClause};
use super::tokenizer::{next_token, Token};

/// Returned when a hard error stops the build; the error itself is already
/// recorded.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BuildAborted;

type BuildResult<T> = std::result::Result<T, BuildAborted>;

pub(crate) struct GraphBuilder<'e, 't, T> {
    engine: &'e QueryEngine<T>,
    text: &'t str,
    graph: QueryGraph<T>,
    errors: Vec<QueryError>,
}

impl<'e, 't, T: 'static> GraphBuilder<'e, 't, T> {
    pub(crate) fn new(engine: &'e QueryEngine<T>, text: &'t str) -> Self {
        Self {
            engine,
            text,
            graph: QueryGraph::default(),
            errors: Vec::new(),
        }
    }

    pub(crate) fn build(mut self) -> (QueryGraph<T>, Vec<QueryError>) {
        match self.build_level(0, self.text.len()) {
            Ok(root) => {
                self.graph.set_root(root);
                if let Some(root) = root {
                    self.validate(root);
                }
                self.prune_noops();
            }
            Err(BuildAborted) => self.graph.set_root(None),
        }
        (self.graph, self.errors)
    }

    fn error(&mut self, span: Span, reason: impl Into<String>) {
        self.errors
            .push(QueryError::with_length(span.index, span.length, reason));
    }

    // -----------------------------------------------------------------------
    // Tokens to nodes
    // -----------------------------------------------------------------------

    fn build_level(&mut self, start: usize, end: usize) -> BuildResult<Option<NodeId>> {
        let items = self.tokenize(start, end)?;
        self.combine(items)
    }

    fn tokenize(&mut self, start: usize, end: usize) -> BuildResult<Vec<NodeId>> {
        let text = self.text;
        let engine = self.engine;
        let pattern = engine.filter_pattern();
        let mut items = Vec::new();
        let mut pos = start;

        while pos < end {
            let lexed = match next_token(text, pos, end, pattern) {
                Ok(lexed) => lexed,
                Err(error) => {
                    self.errors.push(error);
                    return Err(BuildAborted);
                }
            };
            let span = lexed.span;
            let source = &text[span.index..span.end()];
            log::trace!("token {:?} at {}..{}", source, span.index, span.end());

            match lexed.token {
                Token::Whitespace => {}
                Token::Combinator(kind) => {
                    let kind = match kind {
                        QueryNodeType::And => QueryNodeKind::And,
                        QueryNodeType::Or => QueryNodeKind::Or,
                        _ => QueryNodeKind::Not,
                    };
                    items.push(self.graph.add_node(kind, span, source));
                }
                Token::Group { inner } => {
                    if let Some(group) = self.build_level(inner.start, inner.end)? {
                        items.push(group);
                    }
                }
                Token::Filter(clause) => items.push(self.filter_node(&clause)),
                Token::Word { text: word, exact } => {
                    let node = if self.engine.search_source().is_none()
                        && self.engine.options().validate_filters()
                    {
                        self.error(
                            span,
                            "Cannot use a search word without setting the search data callback",
                        );
                        QueryNodeKind::NoOp
                    } else {
                        QueryNodeKind::Search(SearchNode {
                            text: word.to_string(),
                            exact,
                        })
                    };
                    items.push(self.graph.add_node(node, span, source));
                }
            }
            pos = span.end();
        }
        Ok(items)
    }

    fn filter_node(&mut self, clause: &FilterClause<'_>) -> NodeId {
        let kind = match compile_filter_clause(self.engine, clause) {
            Ok(CompiledClause::Operation(operation)) => QueryNodeKind::Filter(Arc::new(operation)),
            Ok(CompiledClause::Skip) => QueryNodeKind::NoOp,
            Err(error) => {
                self.error(clause.part_span(error.part), error.reason);
                QueryNodeKind::NoOp
            }
        };
        self.graph.add_node(kind, clause.span, clause.text)
    }

    // -----------------------------------------------------------------------
    // Combining
    // -----------------------------------------------------------------------

    fn combine(&mut self, items: Vec<NodeId>) -> BuildResult<Option<NodeId>> {
        let items = self.insert_implicit_and(items);
        let items = self.combine_not(items);
        let items = self.combine_binary(items, QueryNodeType::And);
        let items = self.combine_binary(items, QueryNodeType::Or);

        match items.as_slice() {
            [] => Ok(None),
            [root] => Ok(Some(*root)),
            [_, extra, ..] => {
                let span = self.graph.node(*extra).span();
                self.error(span, "Query terms could not be combined");
                Err(BuildAborted)
            }
        }
    }

    fn is_open(&self, id: NodeId) -> bool {
        self.graph.node(id).is_open_combinator()
    }

    fn is_open_binary(&self, id: NodeId) -> bool {
        self.is_open(id) && self.graph.node_type(id) != QueryNodeType::Not
    }

    fn insert_implicit_and(&mut self, items: Vec<NodeId>) -> Vec<NodeId> {
        let mut result = Vec::with_capacity(items.len() * 2);
        for item in items {
            if let Some(&previous) = result.last() {
                if !self.is_open(previous) && !self.is_open_binary(item) {
                    let span = Span::between(
                        self.graph.node(previous).span(),
                        self.graph.node(item).span(),
                    );
                    result.push(self.graph.add_node(QueryNodeKind::And, span, ""));
                }
            }
            result.push(item);
        }
        result
    }

    fn combine_not(&mut self, mut items: Vec<NodeId>) -> Vec<NodeId> {
        for index in (0..items.len()).rev() {
            let id = items[index];
            if !(self.graph.node_type(id) == QueryNodeType::Not && self.is_open(id)) {
                continue;
            }
            match items.get(index + 1).copied() {
                Some(operand) if !self.is_open(operand) => {
                    self.graph.add_child(id, operand);
                    items.remove(index + 1);
                }
                _ => {
                    let span = self.graph.node(id).span();
                    let keyword = self.graph.node(id).text().to_string();
                    self.error(
                        Span::new(span.end(), 1),
                        format!("Missing operand for \"{keyword}\""),
                    );
                    items.remove(index);
                }
            }
        }
        items
    }

    fn combine_binary(&mut self, mut items: Vec<NodeId>, kind: QueryNodeType) -> Vec<NodeId> {
        let mut index = 0;
        while index < items.len() {
            let id = items[index];
            if !(self.graph.node_type(id) == kind && self.is_open(id)) {
                index += 1;
                continue;
            }

            let left = index.checked_sub(1).map(|left| items[left]);
            let right = items.get(index + 1).copied();
            match (left, right) {
                (Some(left), Some(right)) if !self.is_open(left) && !self.is_open(right) => {
                    self.graph.add_child(id, left);
                    self.graph.add_child(id, right);
                    items.remove(index + 1);
                    items.remove(index);
                    items[index - 1] = id;
                }
                (left, _) => {
                    let side = match left {
                        Some(left) if !self.is_open(left) => "right",
                        _ => "left",
                    };
                    let span = self.graph.node(id).span();
                    self.error(
                        span,
                        format!("Missing {side} operand for \"{}\"", kind.keyword()),
                    );
                    items.remove(index);
                }
            }
        }
        items
    }

    // -----------------------------------------------------------------------
    // Validation and pruning
    // -----------------------------------------------------------------------

    fn validate(&mut self, id: NodeId) {
        let node_type = self.graph.node_type(id);
        let children = self.graph.children(id).to_vec();
        if children.len() != node_type.arity() {
            let span = self.graph.node(id).span();
            self.error(
                span,
                format!(
                    "\"{}\" expects {} operand(s) but has {}",
                    node_type.keyword(),
                    node_type.arity(),
                    children.len()
                ),
            );
        }
        for child in children {
            self.validate(child);
        }
    }

    /// Removes no-op leaves, collapsing the combinators they leave behind.
    fn prune_noops(&mut self) {
        let noops = self
            .graph
            .iter()
            .filter(|(_, node)| node.node_type() == QueryNodeType::NoOp)
            .map(|(id, _)| id)
            .collect::<Vec<_>>();
        for id in noops {
            self.remove_subtree(id);
        }
    }

    fn remove_subtree(&mut self, id: NodeId) {
        let Some(parent) = self.graph.parent(id) else {
            if self.graph.root() == Some(id) {
                self.graph.set_root(None);
            }
            return;
        };
        self.graph.remove_child(parent, id);
        match self.graph.children(parent) {
            [] => self.remove_subtree(parent),
            [remaining] if self.graph.node_type(parent) != QueryNodeType::Not => {
                let remaining = *remaining;
                self.graph.replace_node(parent, remaining);
            }
            _ => {}
        }
    }
}
