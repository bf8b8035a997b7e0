//! Compiles a query graph into a single predicate.

use std::sync::Arc;

use crate::error::Result;
use crate::types::StringComparison;

use super::graph::{NodeId, QueryGraph, QueryNodeKind};
use super::search::SearchSource;

pub(crate) type Predicate<T> = Arc<dyn Fn(&T) -> Result<bool> + Send + Sync>;

pub(crate) fn compile_predicate<T: 'static>(
    graph: &QueryGraph<T>,
    search: Option<&SearchSource<T>>,
    comparison: StringComparison,
) -> Option<Predicate<T>> {
    graph
        .root()
        .map(|root| compile_node(graph, root, search, comparison))
}

fn never<T: 'static>() -> Predicate<T> {
    Arc::new(|_: &T| Ok(false))
}

fn compile_node<T: 'static>(
    graph: &QueryGraph<T>,
    id: NodeId,
    search: Option<&SearchSource<T>>,
    comparison: StringComparison,
) -> Predicate<T> {
    let children = graph.children(id);
    let child = |index: usize| {
        children
            .get(index)
            .map_or_else(never, |child| compile_node(graph, *child, search, comparison))
    };

    match graph.node(id).kind() {
        QueryNodeKind::And => {
            let (left, right) = (child(0), child(1));
            Arc::new(move |item: &T| Ok(left(item)? && right(item)?))
        }
        QueryNodeKind::Or => {
            let (left, right) = (child(0), child(1));
            Arc::new(move |item: &T| Ok(left(item)? || right(item)?))
        }
        QueryNodeKind::Not => {
            let inner = child(0);
            Arc::new(move |item: &T| Ok(!inner(item)?))
        }
        QueryNodeKind::Filter(operation) => {
            let operation = Arc::clone(operation);
            Arc::new(move |item: &T| operation.matches(item))
        }
        QueryNodeKind::Search(node) => match search {
            Some(source) => {
                let source = source.clone();
                let word = node.text.clone();
                let exact = node.exact;
                Arc::new(move |item: &T| Ok(source.matches(item, &word, exact, comparison)))
            }
            None => never(),
        },
        QueryNodeKind::NoOp => never(),
    }
}
