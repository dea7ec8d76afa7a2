//! Content specifications.
//!
//! Every manipulation verb accepts "something to insert": a node, a list of
//! nodes, a markup string, or a callback computing one of those per target.
//! [`Content`] is that union; it is resolved into concrete nodes once per
//! call by the [`Builder`](super::Builder).

use std::fmt;
use std::rc::Rc;

use crate::tree::Node;

use super::Nodes;

/// Callback producing content for one target: `(target, index, inner_xml)`.
pub type ContentCallback = Rc<dyn Fn(&Node, usize, &str) -> Content>;

/// Content accepted by manipulation methods.
///
/// Conversions exist from the usual shapes, so call sites can pass a `&str`,
/// a [`Node`], a `Vec<Node>` or a [`Nodes`] selection directly:
///
/// ```
/// use fluentxml::Content;
///
/// let markup: Content = "<b>bold</b>".into();
/// assert!(matches!(markup, Content::Markup(_)));
/// ```
#[derive(Clone)]
pub enum Content {
    /// A single node.
    Node(Node),
    /// Several nodes, in order.
    Collection(Vec<Node>),
    /// A markup string, parsed with the node-set's content type (or, for
    /// target selectors, evaluated as an expression).
    Markup(String),
    /// Computes content per target node.
    Callback(ContentCallback),
}

impl Content {
    /// Wraps a closure as callback content.
    ///
    /// The closure receives the target node, its index within the
    /// selection and the target's current inner markup.
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&Node, usize, &str) -> Content + 'static,
    {
        Self::Callback(Rc::new(f))
    }

    /// Returns `true` for callback content.
    #[must_use]
    pub fn is_callback(&self) -> bool {
        matches!(self, Self::Callback(_))
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(node) => f.debug_tuple("Node").field(node).finish(),
            Self::Collection(nodes) => f.debug_tuple("Collection").field(nodes).finish(),
            Self::Markup(markup) => f.debug_tuple("Markup").field(markup).finish(),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

impl From<Node> for Content {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

impl From<&Node> for Content {
    fn from(node: &Node) -> Self {
        Self::Node(node.clone())
    }
}

impl From<Vec<Node>> for Content {
    fn from(nodes: Vec<Node>) -> Self {
        Self::Collection(nodes)
    }
}

impl From<&Nodes> for Content {
    fn from(nodes: &Nodes) -> Self {
        Self::Collection(nodes.iter().collect())
    }
}

impl From<Nodes> for Content {
    fn from(nodes: Nodes) -> Self {
        Self::from(&nodes)
    }
}

impl From<&str> for Content {
    fn from(markup: &str) -> Self {
        Self::Markup(markup.to_string())
    }
}

impl From<String> for Content {
    fn from(markup: String) -> Self {
        Self::Markup(markup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Document, SharedDocument};

    #[test]
    fn test_conversions() {
        let shared = SharedDocument::new(Document::new());
        let root_id = shared.borrow().root();
        let root = shared.node(root_id);
        assert!(matches!(Content::from(&root), Content::Node(_)));
        assert!(matches!(
            Content::from(vec![root.clone(), root]),
            Content::Collection(ref nodes) if nodes.len() == 2
        ));
        assert!(matches!(Content::from(String::from("<a/>")), Content::Markup(_)));
    }

    #[test]
    fn test_callback_debug() {
        let content = Content::callback(|_, index, _| Content::from(format!("<i n='{index}'/>")));
        assert!(content.is_callback());
        assert_eq!(format!("{content:?}"), "Callback(..)");
    }
}
