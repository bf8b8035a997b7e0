//! In-place graph rewrites that keep the predicate equivalent.

use super::graph::{NodeId, QueryGraph, QueryNodeKind, QueryNodeType, Span};

/// Pushes every `not` down to the leaves with De Morgan's laws and drops
/// double negations.
pub(crate) fn propagate_not_to_leaves<T>(graph: &mut QueryGraph<T>) {
    if let Some(root) = graph.root() {
        push_not_down(graph, root);
    }
}

fn push_not_down<T>(graph: &mut QueryGraph<T>, id: NodeId) {
    match graph.node_type(id) {
        QueryNodeType::Not => {
            let Some(&child) = graph.children(id).first() else {
                return;
            };
            match graph.node_type(child) {
                QueryNodeType::Not => {
                    let Some(&grandchild) = graph.children(child).first() else {
                        return;
                    };
                    graph.replace_node(id, grandchild);
                    push_not_down(graph, grandchild);
                }
                combinator @ (QueryNodeType::And | QueryNodeType::Or) => {
                    apply_de_morgan(graph, id, child, combinator);
                    for operand in graph.children(id).to_vec() {
                        push_not_down(graph, operand);
                    }
                }
                _ => {}
            }
        }
        QueryNodeType::And | QueryNodeType::Or => {
            for child in graph.children(id).to_vec() {
                push_not_down(graph, child);
            }
        }
        _ => {}
    }
}

/// `not (a and b)` becomes `(not a or not b)`, reusing the `not` node as the
/// flipped combinator and the inner combinator as the first new `not`.
fn apply_de_morgan<T>(
    graph: &mut QueryGraph<T>,
    not: NodeId,
    inner: NodeId,
    combinator: QueryNodeType,
) {
    let [left, right] = graph.children(inner)[..] else {
        return;
    };
    graph.take_children(inner);
    graph.remove_child(not, inner);

    let flipped = match combinator {
        QueryNodeType::And => QueryNodeKind::Or,
        _ => QueryNodeKind::And,
    };
    graph.set_kind(not, flipped);
    graph.set_kind(inner, QueryNodeKind::Not);
    graph.add_child(inner, left);

    let right_span: Span = graph.node(right).span();
    let negated_right = graph.add_node(QueryNodeKind::Not, right_span, "");
    graph.add_child(negated_right, right);

    graph.add_child(not, inner);
    graph.add_child(not, negated_right);
}

/// Moves negated operands of `and`/`or` to the right so the cheaper side is
/// evaluated first.
pub(crate) fn swap_not_to_right_hand_side<T>(graph: &mut QueryGraph<T>) {
    if let Some(root) = graph.root() {
        swap_not_right(graph, root);
    }
}

fn swap_not_right<T>(graph: &mut QueryGraph<T>, id: NodeId) {
    let children = graph.children(id).to_vec();
    for child in &children {
        swap_not_right(graph, *child);
    }
    if !matches!(graph.node_type(id), QueryNodeType::And | QueryNodeType::Or) {
        return;
    }
    if let [left, right] = children[..] {
        if graph.node_type(left) == QueryNodeType::Not && graph.node_type(right) != QueryNodeType::Not
        {
            graph.swap_children(id);
        }
    }
}
