//! The node-set engine.
//!
//! A [`Nodes`] value is an ordered selection of nodes of one shared
//! document, linked to the selection it was derived from. Every operation
//! returns a new selection through [`Nodes::spawn`]; a selection is never
//! changed once handed out.
//!
//! The engine is split into four parts used by the fluent methods in
//! [`crate::query`]:
//!
//! - [`Compare`] orders nodes by document position and de-duplicates
//! - [`Fetcher`] evaluates expressions with reverse, filter and stop
//!   semantics
//! - [`Builder`] resolves [`Content`] into concrete nodes of the document
//! - [`Modifier`] performs the structural mutations on one target node

pub mod builder;
pub mod compare;
pub mod content;
pub mod fetcher;
pub mod modifier;

pub use builder::Builder;
pub use compare::Compare;
pub use content::{Content, ContentCallback};
pub use fetcher::{FetchOptions, Fetcher, NodePredicate};
pub use modifier::Modifier;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::error::{Error, Result};
use crate::loader::{Loader, Loaders, ParseOptions, DEFAULT_MAX_DEPTH};
use crate::tree::{Document, DocumentId, Node, NodeId, SharedDocument};
use crate::xpath::{XPath, XPathValue};

/// Configuration shared by a chain of selections.
///
/// ```
/// use fluentxml::Config;
///
/// let config = Config::default()
///     .content_type("text/html")
///     .max_depth(32)
///     .namespace("atom", "http://www.w3.org/2005/Atom");
/// assert_eq!(config.content_type, "text/html");
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Content type used to parse markup content strings.
    pub content_type: String,
    /// Recursion budget for parsing and wrapper searches.
    pub max_depth: usize,
    /// Loaders by content type.
    pub loaders: Loaders,
    /// Initial namespace prefix bindings for expressions.
    pub namespaces: Vec<(String, String)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            content_type: "text/xml".to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            loaders: Loaders::default(),
            namespaces: Vec::new(),
        }
    }
}

impl Config {
    /// Sets the content type for markup strings.
    #[must_use]
    pub fn content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.to_string();
        self
    }

    /// Sets the recursion budget.
    #[must_use]
    pub fn max_depth(mut self, max: usize) -> Self {
        self.max_depth = max;
        self
    }

    /// Registers a loader for a content type.
    #[must_use]
    pub fn loader(mut self, content_type: &str, loader: Rc<dyn Loader>) -> Self {
        self.loaders.register(content_type, loader);
        self
    }

    /// Adds a namespace binding.
    #[must_use]
    pub fn namespace(mut self, prefix: &str, uri: &str) -> Self {
        self.namespaces.push((prefix.to_string(), uri.to_string()));
        self
    }

    /// The parse options implied by this configuration.
    #[must_use]
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions::default().max_depth(self.max_depth)
    }
}

/// State shared by every selection of one chain.
pub(crate) struct Context {
    config: Config,
    namespaces: RefCell<HashMap<String, String>>,
    evaluator: RefCell<Option<(DocumentId, Rc<XPath>)>>,
}

impl Context {
    fn new(config: Config) -> Self {
        let namespaces = config.namespaces.iter().cloned().collect();
        Self {
            config,
            namespaces: RefCell::new(namespaces),
            evaluator: RefCell::new(None),
        }
    }

    /// Returns the evaluator for `document`, building it on first use and
    /// whenever the document identity changed.
    fn xpath(&self, document: DocumentId) -> Rc<XPath> {
        let mut cache = self.evaluator.borrow_mut();
        if let Some((id, xpath)) = cache.as_ref() {
            if *id == document {
                return Rc::clone(xpath);
            }
        }
        let mut xpath = XPath::new();
        for (prefix, uri) in self.namespaces.borrow().iter() {
            xpath.register_namespace(prefix, uri);
        }
        trace!(?document, "evaluator rebuilt");
        let xpath = Rc::new(xpath);
        *cache = Some((document, Rc::clone(&xpath)));
        xpath
    }

    fn register_namespace(&self, prefix: &str, uri: &str) {
        self.namespaces
            .borrow_mut()
            .insert(prefix.to_string(), uri.to_string());
        self.evaluator.borrow_mut().take();
    }
}

#[derive(Clone)]
struct Inner {
    document: SharedDocument,
    nodes: Vec<NodeId>,
    parent: Option<Nodes>,
    context: Rc<Context>,
}

/// An ordered selection of nodes of one document.
///
/// Cloning is cheap and yields a handle to the same selection; compare
/// handles with [`Nodes::ptr_eq`].
#[derive(Clone)]
pub struct Nodes {
    inner: Rc<Inner>,
}

impl Nodes {
    /// Creates an empty selection over `document` with the given
    /// configuration.
    #[must_use]
    pub fn with_document(document: SharedDocument, config: Config) -> Self {
        Self {
            inner: Rc::new(Inner {
                document,
                nodes: Vec::new(),
                parent: None,
                context: Rc::new(Context::new(config)),
            }),
        }
    }

    /// Creates an empty selection over `document` with the default
    /// configuration.
    #[must_use]
    pub fn from_document(document: Document) -> Self {
        Self::with_document(SharedDocument::new(document), Config::default())
    }

    /// The shared document.
    #[must_use]
    pub fn document(&self) -> &SharedDocument {
        &self.inner.document
    }

    /// The configuration of this chain.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.context.config
    }

    /// The selected node ids, in order.
    #[must_use]
    pub fn ids(&self) -> &[NodeId] {
        &self.inner.nodes
    }

    /// The number of selected nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.nodes.len()
    }

    /// Returns `true` if nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.nodes.is_empty()
    }

    /// Returns `true` if both handles refer to the same selection.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // --- Chaining ---

    /// Adds nodes to the selection.
    ///
    /// Elements are always kept; text nodes only if they are not blank and
    /// `ignore_text_nodes` is false. Other node kinds are skipped. A
    /// selection that is already shared is copied first, so other handles
    /// never observe the change.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DocumentMismatch`] for a node of another document
    /// and [`Error::TypeMismatch`] for an id the document does not hold.
    /// Nothing is added in either case.
    pub fn push<I>(&mut self, nodes: I, ignore_text_nodes: bool) -> Result<()>
    where
        I: IntoIterator<Item = Node>,
    {
        let mut ids = Vec::new();
        {
            let doc = self.inner.document.borrow();
            for node in nodes {
                if !node.belongs_to(&self.inner.document) {
                    return Err(Error::DocumentMismatch);
                }
                if !doc.contains(node.id()) {
                    return Err(Error::TypeMismatch(format!(
                        "{:?} is not a node of this document",
                        node.id()
                    )));
                }
                ids.push(node.id());
            }
        }
        self.push_ids(ids, ignore_text_nodes);
        Ok(())
    }

    fn push_ids(&mut self, ids: Vec<NodeId>, ignore_text_nodes: bool) {
        let inner = Rc::make_mut(&mut self.inner);
        let doc = inner.document.borrow();
        inner.nodes.extend(
            ids.into_iter()
                .filter(|&id| doc.contains(id) && doc.is_significant(id, ignore_text_nodes)),
        );
    }

    /// Creates an empty selection derived from this one.
    #[must_use]
    pub fn spawn(&self) -> Self {
        Self {
            inner: Rc::new(Inner {
                document: self.inner.document.clone(),
                nodes: Vec::new(),
                parent: Some(self.clone()),
                context: Rc::clone(&self.inner.context),
            }),
        }
    }

    /// Creates a selection of `nodes` derived from this one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DocumentMismatch`] for a node of another document.
    pub fn spawn_with<I>(&self, nodes: I) -> Result<Self>
    where
        I: IntoIterator<Item = Node>,
    {
        let mut spawned = self.spawn();
        spawned.push(nodes, false)?;
        Ok(spawned)
    }

    /// Spawns a selection from ids known to belong to the document.
    pub(crate) fn spawn_from(&self, ids: Vec<NodeId>, ignore_text_nodes: bool) -> Self {
        let mut spawned = self.spawn();
        spawned.push_ids(ids, ignore_text_nodes);
        spawned
    }

    /// The selection this one was derived from, or this selection itself
    /// if it is the start of the chain.
    #[must_use]
    pub fn end(&self) -> Self {
        self.inner.parent.clone().unwrap_or_else(|| self.clone())
    }

    /// This selection followed by the nodes of the previous selection that
    /// it does not contain yet.
    #[must_use]
    pub fn and_self(&self) -> Self {
        let mut ids = self.inner.nodes.clone();
        if let Some(parent) = &self.inner.parent {
            for &id in parent.ids() {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        let mut spawned = self.spawn();
        Rc::make_mut(&mut spawned.inner).nodes = ids;
        spawned
    }

    // --- Positions ---

    /// The position of the first node among its siblings, counting only
    /// elements and non-blank text.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        let &first = self.inner.nodes.first()?;
        let doc = self.inner.document.borrow();
        let mut position = 0;
        let mut cursor = doc.prev_sibling(first);
        while let Some(sibling) = cursor {
            if doc.is_significant(sibling, false) {
                position += 1;
            }
            cursor = doc.prev_sibling(sibling);
        }
        Some(position)
    }

    /// The index of the first member matching `expression`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::XPath`] if the expression is malformed.
    pub fn index_of_expression(&self, expression: &str) -> Result<Option<usize>> {
        for (index, &id) in self.inner.nodes.iter().enumerate() {
            if self.matches(expression, id)? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// The index of `node` within the selection.
    #[must_use]
    pub fn index_of(&self, node: &Node) -> Option<usize> {
        if !node.belongs_to(&self.inner.document) {
            return None;
        }
        self.inner.nodes.iter().position(|&id| id == node.id())
    }

    // --- Expressions ---

    /// Binds a namespace prefix for every selection of this chain.
    pub fn register_namespace(&self, prefix: &str, uri: &str) {
        self.inner.context.register_namespace(prefix, uri);
    }

    /// Evaluates an expression. Without a context node, the document node
    /// is the context.
    ///
    /// # Errors
    ///
    /// - [`Error::TypeMismatch`] if `context` is not a node of the document
    /// - [`Error::XPath`] if the expression is malformed or fails
    pub fn evaluate(&self, expression: &str, context: Option<NodeId>) -> Result<XPathValue> {
        let xpath = self.inner.context.xpath(self.inner.document.id());
        let doc = self.inner.document.borrow();
        if let Some(id) = context {
            if !doc.contains(id) {
                return Err(Error::TypeMismatch(format!(
                    "{id:?} is not a node of this document"
                )));
            }
        }
        Ok(xpath.evaluate(&doc, expression, context)?)
    }

    /// Returns `true` if `expression`, evaluated with `node` as context,
    /// is true: a non-empty node-set, a non-zero number, a non-empty
    /// string or `true()`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::XPath`] if the expression is malformed.
    pub fn matches(&self, expression: &str, node: NodeId) -> Result<bool> {
        Ok(self.evaluate(expression, Some(node))?.to_boolean())
    }

    /// Sorts ids into document order without duplicates; detached nodes
    /// follow in encounter order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if an id is not a node of the
    /// document.
    pub fn unique(&self, ids: &[NodeId]) -> Result<Vec<NodeId>> {
        let xpath = self.inner.context.xpath(self.inner.document.id());
        let doc = self.inner.document.borrow();
        Compare::new(&doc, &xpath)?.unique(ids)
    }
}

impl fmt::Debug for Nodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Nodes")
            .field("document", &self.inner.document.id())
            .field("nodes", &self.inner.nodes)
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LIST: &str = "<list>\n  <a/>\n  text\n  <!--c-->\n  <b/>\n</list>";

    fn list() -> (Nodes, Vec<Node>) {
        let nodes = Nodes::from_document(Document::parse_str(LIST).unwrap());
        let children = {
            let doc = nodes.document().borrow();
            let list = doc.root_element().unwrap();
            doc.children(list)
                .map(|id| nodes.document().node(id))
                .collect()
        };
        (nodes, children)
    }

    #[test]
    fn test_push_keeps_elements_and_significant_text() {
        let (nodes, children) = list();
        let mut selection = nodes.spawn();
        selection.push(children.clone(), false).unwrap();
        let names: Vec<_> = selection
            .ids()
            .iter()
            .map(|&id| nodes.document().borrow().kind(id).type_name())
            .collect();
        assert_eq!(names, vec!["element", "text", "element"]);

        let mut elements_only = nodes.spawn();
        elements_only.push(children, true).unwrap();
        assert_eq!(elements_only.len(), 2);
    }

    #[test]
    fn test_push_rejects_foreign_nodes() {
        let (nodes, _) = list();
        let other = SharedDocument::new(Document::parse_str("<x/>").unwrap());
        let x = other.borrow().root_element().unwrap();
        let mut selection = nodes.spawn();
        let err = selection.push([other.node(x)], false).unwrap_err();
        assert!(matches!(err, Error::DocumentMismatch));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_push_rejects_ids_outside_the_document() {
        let (nodes, children) = list();
        let dangling = nodes.document().node(NodeId::from_raw(9_999).unwrap());
        let mut selection = nodes.spawn();
        let err = selection
            .push([children[0].clone(), dangling], false)
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch(_)));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_push_does_not_alter_shared_selection() {
        let (nodes, children) = list();
        let mut selection = nodes.spawn_with(children[1..2].to_vec()).unwrap();
        let handle = selection.clone();
        selection.push(children[1..].to_vec(), true).unwrap();
        assert_eq!(handle.len(), 1);
        assert_eq!(selection.len(), 2);
    }

    #[test]
    fn test_spawn_end_round_trip() {
        let (nodes, _) = list();
        assert!(nodes.end().ptr_eq(&nodes.end()));
        assert!(nodes.end().ptr_eq(&nodes));
        let child = nodes.spawn();
        assert!(child.end().ptr_eq(&nodes));
        assert!(child.spawn().end().ptr_eq(&child));
    }

    #[test]
    fn test_and_self_merges_parent_without_duplicates() {
        let (nodes, children) = list();
        let parent = nodes.spawn_with(children.clone()).unwrap();
        let child = parent.spawn_with([children[5].clone()]).unwrap();
        let merged = child.and_self();
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.ids()[0], children[5].id());
        assert!(merged.end().ptr_eq(&child));
    }

    #[test]
    fn test_index_variants() {
        let (nodes, children) = list();
        let b = nodes.spawn_with([children[5].clone()]).unwrap();
        // <a/>, "text" and <b/> are significant; blanks and the comment
        // are not.
        assert_eq!(b.index(), Some(2));
        assert_eq!(nodes.spawn().index(), None);

        let all = nodes.spawn_with(children.clone()).unwrap();
        assert_eq!(all.index_of_expression("self::b").unwrap(), Some(2));
        assert_eq!(all.index_of_expression("self::zzz").unwrap(), None);
        assert_eq!(all.index_of(&children[2]), Some(1));
        assert_eq!(all.index_of(&children[0]), None);
    }

    #[test]
    fn test_register_namespace_is_shared_by_the_chain() {
        let nodes = Nodes::from_document(
            Document::parse_str(r#"<feed xmlns="urn:atom"><entry/></feed>"#).unwrap(),
        );
        let child = nodes.spawn();
        assert!(child.evaluate("//a:entry", None).is_err());
        nodes.register_namespace("a", "urn:atom");
        let found = child.evaluate("//a:entry", None).unwrap();
        assert_eq!(found.as_node_set().map(<[NodeId]>::len), Some(1));
    }

    #[test]
    fn test_config_namespaces_seed_the_evaluator() {
        let shared = SharedDocument::new(
            Document::parse_str(r#"<feed xmlns="urn:atom"><entry/></feed>"#).unwrap(),
        );
        let nodes = Nodes::with_document(shared, Config::default().namespace("a", "urn:atom"));
        assert!(nodes.matches("a:entry", nodes.document().borrow().root_element().unwrap())
            .unwrap());
    }

    #[test]
    fn test_evaluate_rejects_unknown_context() {
        let (nodes, _) = list();
        let bogus = NodeId::from_raw(4_242).unwrap();
        assert!(matches!(
            nodes.evaluate("count(*)", Some(bogus)),
            Err(Error::TypeMismatch(_))
        ));
    }
}
