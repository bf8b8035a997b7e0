//! Arena-backed query graph.
//!
//! Nodes live in a vector and refer to each other by [`NodeId`]. Rewrites
//! (implicit AND insertion, no-op pruning, the optimizer) only move ids
//! around; detached nodes stay in the arena but are unreachable from the root.

use std::fmt;
use std::sync::Arc;

use super::operation::FilterOperation;

/// Index of a node inside its [`QueryGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Byte range of a node in the original query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub index: usize,
    pub length: usize,
}

impl Span {
    pub fn new(index: usize, length: usize) -> Self {
        Self { index, length }
    }

    /// The gap from the end of `before` to the start of `after`.
    pub fn between(before: Span, after: Span) -> Self {
        let index = before.end();
        Self::new(index, after.index.saturating_sub(index))
    }

    pub fn end(self) -> usize {
        self.index + self.length
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryNodeType {
    And,
    Or,
    Not,
    Filter,
    Search,
    NoOp,
}

impl QueryNodeType {
    pub fn is_combinator(self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Not)
    }

    /// Number of children a fully combined node of this type has.
    pub fn arity(self) -> usize {
        match self {
            Self::And | Self::Or => 2,
            Self::Not => 1,
            Self::Filter | Self::Search | Self::NoOp => 0,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::Filter => "filter",
            Self::Search => "search",
            Self::NoOp => "noop",
        }
    }
}

/// A search word or quoted phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchNode {
    /// The word, or the phrase without its quotes.
    pub text: String,
    /// Whole-string match instead of substring containment (`!word`).
    pub exact: bool,
}

pub enum QueryNodeKind<T> {
    And,
    Or,
    Not,
    Filter(Arc<FilterOperation<T>>),
    Search(SearchNode),
    NoOp,
}

impl<T> QueryNodeKind<T> {
    pub fn node_type(&self) -> QueryNodeType {
        match self {
            Self::And => QueryNodeType::And,
            Self::Or => QueryNodeType::Or,
            Self::Not => QueryNodeType::Not,
            Self::Filter(_) => QueryNodeType::Filter,
            Self::Search(_) => QueryNodeType::Search,
            Self::NoOp => QueryNodeType::NoOp,
        }
    }
}

impl<T> Clone for QueryNodeKind<T> {
    fn clone(&self) -> Self {
        match self {
            Self::And => Self::And,
            Self::Or => Self::Or,
            Self::Not => Self::Not,
            Self::Filter(operation) => Self::Filter(Arc::clone(operation)),
            Self::Search(search) => Self::Search(search.clone()),
            Self::NoOp => Self::NoOp,
        }
    }
}

impl<T> fmt::Debug for QueryNodeKind<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filter(operation) => f.debug_tuple("Filter").field(operation).finish(),
            Self::Search(search) => f.debug_tuple("Search").field(search).finish(),
            other => f.write_str(match other.node_type() {
                QueryNodeType::And => "And",
                QueryNodeType::Or => "Or",
                QueryNodeType::Not => "Not",
                _ => "NoOp",
            }),
        }
    }
}

pub struct QueryNode<T> {
    kind: QueryNodeKind<T>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    span: Span,
    text: String,
}

impl<T> QueryNode<T> {
    pub fn kind(&self) -> &QueryNodeKind<T> {
        &self.kind
    }

    pub fn node_type(&self) -> QueryNodeType {
        self.kind.node_type()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// The query text this node was parsed from. Empty for inserted nodes.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// A combinator still waiting for its operands.
    pub fn is_open_combinator(&self) -> bool {
        self.node_type().is_combinator() && self.children.is_empty()
    }
}

impl<T> fmt::Debug for QueryNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryNode")
            .field("kind", &self.kind)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("span", &self.span)
            .field("text", &self.text)
            .finish()
    }
}

pub struct QueryGraph<T> {
    nodes: Vec<QueryNode<T>>,
    root: Option<NodeId>,
}

impl<T> Default for QueryGraph<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
        }
    }
}

impl<T> QueryGraph<T> {
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn node(&self, id: NodeId) -> &QueryNode<T> {
        &self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn node_type(&self, id: NodeId) -> QueryNodeType {
        self.nodes[id.0].node_type()
    }

    /// Textual form of the subtree at `id`. Combinators are rebuilt from
    /// their children, so the result parses back to an equivalent query.
    pub fn identifier(&self, id: NodeId) -> String {
        let node = self.node(id);
        let children = node
            .children
            .iter()
            .map(|child| self.identifier(*child))
            .collect::<Vec<_>>();
        match node.node_type() {
            QueryNodeType::And => format!("({})", children.join(" and ")),
            QueryNodeType::Or => format!("({})", children.join(" or ")),
            QueryNodeType::Not => format!("not {}", children.join(" ")),
            QueryNodeType::Filter | QueryNodeType::Search | QueryNodeType::NoOp => {
                node.text.clone()
            }
        }
    }

    /// Nodes reachable from the root, parents before children.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &QueryNode<T>)> + '_ {
        let mut stack = self.root.into_iter().collect::<Vec<_>>();
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            let node = self.node(id);
            stack.extend(node.children.iter().rev().copied());
            Some((id, node))
        })
    }

    pub(crate) fn add_node(
        &mut self,
        kind: QueryNodeKind<T>,
        span: Span,
        text: impl Into<String>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(QueryNode {
            kind,
            parent: None,
            children: Vec::new(),
            span,
            text: text.into(),
        });
        id
    }

    pub(crate) fn set_root(&mut self, root: Option<NodeId>) {
        if let Some(id) = root {
            self.nodes[id.0].parent = None;
        }
        self.root = root;
    }

    pub(crate) fn set_kind(&mut self, id: NodeId, kind: QueryNodeKind<T>) {
        self.nodes[id.0].kind = kind;
    }

    pub(crate) fn add_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);
    }

    pub(crate) fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0].children.retain(|id| *id != child);
        self.nodes[child.0].parent = None;
    }

    /// Detaches and returns every child of `id`.
    pub(crate) fn take_children(&mut self, id: NodeId) -> Vec<NodeId> {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for child in &children {
            self.nodes[child.0].parent = None;
        }
        children
    }

    /// Puts `replacement` in the slot `old` occupies in its parent, or makes
    /// it the root. `old` is left detached.
    pub(crate) fn replace_node(&mut self, old: NodeId, replacement: NodeId) {
        if let Some(previous) = self.nodes[replacement.0].parent {
            self.remove_child(previous, replacement);
        }
        match self.nodes[old.0].parent.take() {
            Some(parent) => {
                for slot in &mut self.nodes[parent.0].children {
                    if *slot == old {
                        *slot = replacement;
                    }
                }
                self.nodes[replacement.0].parent = Some(parent);
            }
            None => {
                if self.root == Some(old) {
                    self.set_root(Some(replacement));
                }
            }
        }
    }

    pub(crate) fn swap_children(&mut self, id: NodeId) {
        self.nodes[id.0].children.reverse();
    }
}

impl<T> fmt::Debug for QueryGraph<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryGraph")
            .field("root", &self.root)
            .field("identifier", &self.root.map(|root| self.identifier(root)))
            .finish()
    }
}
