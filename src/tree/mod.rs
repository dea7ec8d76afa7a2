//! Arena-based markup tree.
//!
//! All nodes live in a contiguous `Vec<NodeData>` owned by the `Document`,
//! and are referenced by `NodeId`, a newtype over `NonZeroU32`. Navigation
//! links (parent, first\_child, last\_child, next\_sibling, prev\_sibling)
//! are arena indices, so there are no reference cycles and no per-node
//! allocation.
//!
//! Detached nodes stay in the arena. A detached subtree is still a tree of
//! its own: it can be navigated, queried, cloned and re-attached.
//!
//! Every document carries a process-unique [`DocumentId`], which is how
//! node-sets tell whether a node belongs to "their" document. Documents are
//! shared between node-sets through [`SharedDocument`], and a node together
//! with its document is a [`Node`].

mod handle;
mod node;

pub use handle::{Node, SharedDocument};
pub use node::NodeKind;

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(u64);

impl DocumentId {
    fn next() -> Self {
        Self(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A typed index into the document's node arena.
///
/// `NodeId` is a newtype over `NonZeroU32`, meaning it can never be zero
/// and `Option<NodeId>` has the same size as `NodeId` (niche optimization).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(NonZeroU32);

impl NodeId {
    /// Creates a `NodeId` from an arena index. Index 0 is the placeholder
    /// slot and never handed out.
    fn from_index(index: usize) -> Self {
        let raw = u32::try_from(index).unwrap_or(u32::MAX);
        Self(NonZeroU32::new(raw).unwrap_or(NonZeroU32::MIN))
    }

    /// Returns the raw index as a `usize` for indexing into the arena.
    fn as_index(self) -> usize {
        self.0.get() as usize
    }

    /// Converts this `NodeId` to a raw `u32`.
    #[must_use]
    pub fn into_raw(self) -> u32 {
        self.0.get()
    }

    /// Creates a `NodeId` from a raw `u32`, if non-zero.
    #[must_use]
    pub fn from_raw(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }
}

/// Storage for a single node in the document arena.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// What kind of node this is and its payload.
    pub kind: NodeKind,
    /// Parent node, if any.
    pub parent: Option<NodeId>,
    /// First child node.
    pub first_child: Option<NodeId>,
    /// Last child node (for O(1) append).
    pub last_child: Option<NodeId>,
    /// Next sibling.
    pub next_sibling: Option<NodeId>,
    /// Previous sibling.
    pub prev_sibling: Option<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            prev_sibling: None,
        }
    }
}

/// An attribute on an element.
///
/// Namespace declarations (`xmlns`, `xmlns:p`) are stored as attributes so
/// that serialization reproduces them; [`Attribute::is_namespace_declaration`]
/// tells them apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// The local part of the attribute name.
    pub name: String,
    /// The attribute value.
    pub value: String,
    /// Namespace prefix, if any (e.g., `"xml"` for `xml:lang`).
    pub prefix: Option<String>,
    /// Namespace URI after resolution, if any.
    pub namespace: Option<String>,
}

impl Attribute {
    /// Creates an attribute from a possibly prefixed name.
    #[must_use]
    pub fn new(name: &str, value: &str) -> Self {
        let (prefix, local) = match name.split_once(':') {
            Some((prefix, local)) => (Some(prefix.to_string()), local),
            None => (None, name),
        };
        Self {
            name: local.to_string(),
            value: value.to_string(),
            prefix,
            namespace: None,
        }
    }

    /// Returns the attribute name as written, with its prefix.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Returns `true` for `xmlns` and `xmlns:*` declarations.
    #[must_use]
    pub fn is_namespace_declaration(&self) -> bool {
        self.prefix.as_deref() == Some("xmlns") || (self.prefix.is_none() && self.name == "xmlns")
    }

    fn matches_name(&self, name: &str) -> bool {
        match name.split_once(':') {
            Some((prefix, local)) => self.prefix.as_deref() == Some(prefix) && self.name == local,
            None => self.prefix.is_none() && self.name == name,
        }
    }
}

/// A markup document.
///
/// The `Document` owns all nodes in an arena and provides methods for tree
/// navigation and mutation. Navigation goes through `&Document`, mutation
/// through `&mut Document`.
///
/// # Examples
///
/// ```
/// use fluentxml::tree::{Document, NodeKind};
///
/// let mut doc = Document::new();
/// let root = doc.create_element("root");
/// doc.append_child(doc.root(), root);
/// assert_eq!(doc.root_element(), Some(root));
/// ```
#[derive(Debug)]
pub struct Document {
    id: DocumentId,
    /// The node arena. Index 0 is unused (placeholder for `NonZeroU32`).
    nodes: Vec<NodeData>,
    /// The document node id (not the root element).
    root: NodeId,
}

impl Document {
    /// Creates a new empty document containing only the document node.
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = Vec::with_capacity(64);
        nodes.push(NodeData::new(NodeKind::Document));
        nodes.push(NodeData::new(NodeKind::Document));
        Self {
            id: DocumentId::next(),
            nodes,
            root: NodeId::from_index(1),
        }
    }

    /// Returns the identity of this document.
    #[must_use]
    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// Returns the document node id.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the root element of the document, if it has one.
    #[must_use]
    pub fn root_element(&self) -> Option<NodeId> {
        self.children(self.root).find(|&id| self.is_element(id))
    }

    /// Returns `true` if `id` addresses a node of this document's arena.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        id.as_index() < self.nodes.len()
    }

    /// Raw node storage.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not refer to a node of this document. Use
    /// [`Document::contains`] for ids of unknown origin.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.as_index()]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.as_index()]
    }

    /// Returns the kind of a node.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    /// Returns the local name of an element or the target of a PI.
    #[must_use]
    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Element { name, .. }
            | NodeKind::ProcessingInstruction { target: name, .. } => Some(name),
            _ => None,
        }
    }

    /// Returns the element name as written, including its prefix.
    #[must_use]
    pub fn qualified_name(&self, id: NodeId) -> Option<String> {
        match self.kind(id) {
            NodeKind::Element {
                name,
                prefix: Some(prefix),
                ..
            } => Some(format!("{prefix}:{name}")),
            _ => self.node_name(id).map(str::to_string),
        }
    }

    /// The namespace URI of an element.
    #[must_use]
    pub fn node_namespace(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Element { namespace, .. } => namespace.as_deref(),
            _ => None,
        }
    }

    /// Returns the content of a text, CDATA, comment or PI node.
    #[must_use]
    pub fn node_text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Text { content }
            | NodeKind::Comment { content }
            | NodeKind::CData { content } => Some(content),
            NodeKind::ProcessingInstruction { data, .. } => data.as_deref(),
            _ => None,
        }
    }

    /// Returns the concatenated text of a node and all its descendants.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        match self.kind(id) {
            NodeKind::Text { content }
            | NodeKind::CData { content }
            | NodeKind::Comment { content } => content.clone(),
            NodeKind::ProcessingInstruction { data, .. } => data.clone().unwrap_or_default(),
            _ => self
                .descendants(id)
                .filter_map(|d| match self.kind(d) {
                    NodeKind::Text { content } | NodeKind::CData { content } => {
                        Some(content.as_str())
                    }
                    _ => None,
                })
                .collect(),
        }
    }

    /// Returns the attributes of an element node (empty for other kinds).
    #[must_use]
    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        match self.kind(id) {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    /// Returns the value of an attribute by (possibly prefixed) name.
    #[must_use]
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|a| a.matches_name(name))
            .map(|a| a.value.as_str())
    }

    /// Sets an attribute on an element, replacing an existing value.
    ///
    /// Returns `false` if the node is not an element.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> bool {
        let NodeKind::Element { attributes, .. } = &mut self.node_mut(id).kind else {
            return false;
        };
        if let Some(existing) = attributes.iter_mut().find(|a| a.matches_name(name)) {
            existing.value = value.to_string();
        } else {
            attributes.push(Attribute::new(name, value));
        }
        true
    }

    /// Removes an attribute from an element. Returns `true` if it existed.
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> bool {
        let NodeKind::Element { attributes, .. } = &mut self.node_mut(id).kind else {
            return false;
        };
        let before = attributes.len();
        attributes.retain(|a| !a.matches_name(name));
        attributes.len() != before
    }

    /// Replaces the character content of a text, CDATA, comment or PI node.
    ///
    /// Returns `false` for node kinds without character content.
    pub fn set_node_text(&mut self, id: NodeId, text: &str) -> bool {
        match &mut self.node_mut(id).kind {
            NodeKind::Text { content }
            | NodeKind::CData { content }
            | NodeKind::Comment { content } => {
                *content = text.to_string();
                true
            }
            NodeKind::ProcessingInstruction { data, .. } => {
                *data = (!text.is_empty()).then(|| text.to_string());
                true
            }
            _ => false,
        }
    }

    // --- Classification ---

    /// Returns `true` for element nodes.
    #[must_use]
    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Element { .. })
    }

    /// Returns `true` for text and CDATA nodes.
    #[must_use]
    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Text { .. } | NodeKind::CData { .. })
    }

    /// Returns `true` for text or CDATA nodes made only of whitespace.
    #[must_use]
    pub fn is_blank_text(&self, id: NodeId) -> bool {
        match self.kind(id) {
            NodeKind::Text { content } | NodeKind::CData { content } => {
                content.trim().is_empty()
            }
            _ => false,
        }
    }

    /// Returns `true` for nodes a selection keeps: elements, and (unless
    /// `ignore_text_nodes`) text nodes that are not blank.
    #[must_use]
    pub fn is_significant(&self, id: NodeId, ignore_text_nodes: bool) -> bool {
        self.is_element(id) || (!ignore_text_nodes && self.is_text(id) && !self.is_blank_text(id))
    }

    /// Returns `true` if the node is the document node or one of its
    /// descendants.
    #[must_use]
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.tree_root(id) == self.root
    }

    /// Returns the topmost ancestor of a node (the node itself when it has
    /// no parent).
    #[must_use]
    pub fn tree_root(&self, id: NodeId) -> NodeId {
        self.ancestors(id).last().unwrap_or(id)
    }

    // --- Navigation ---

    /// The parent, or `None` for a tree root.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).first_child
    }

    #[must_use]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).last_child
    }

    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).next_sibling
    }

    #[must_use]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).prev_sibling
    }

    /// Child nodes in order.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.node(id).first_child,
        }
    }

    /// Returns an iterator over the element children of a node.
    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id).filter(move |&c| self.is_element(c))
    }

    /// Returns an iterator over a node and its ancestors (walking up).
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: Some(id),
        }
    }

    /// The node and its descendants, in document order.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            root: id,
            next: self.first_child(id),
        }
    }

    // --- Mutation ---

    /// Allocates a new, detached node in the arena.
    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let index = self.nodes.len();
        self.nodes.push(NodeData::new(kind));
        NodeId::from_index(index)
    }

    /// Creates a detached element; `name` may carry a prefix.
    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.create_node(NodeKind::element(name))
    }

    /// Creates a detached text node.
    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.create_node(NodeKind::text(content))
    }

    /// Returns `true` if making `child` a child of `parent` would create a
    /// cycle.
    fn would_cycle(&self, parent: NodeId, child: NodeId) -> bool {
        self.ancestors(parent).any(|a| a == child)
    }

    /// Appends `child` as the last child of `parent`, detaching it first.
    ///
    /// A child that is attached elsewhere is moved. Appending a node into
    /// itself or one of its descendants is ignored.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if self.would_cycle(parent, child) {
            return;
        }
        self.detach(child);
        self.node_mut(child).parent = Some(parent);

        if let Some(last) = self.node(parent).last_child {
            self.node_mut(last).next_sibling = Some(child);
            self.node_mut(child).prev_sibling = Some(last);
            self.node_mut(parent).last_child = Some(child);
        } else {
            self.node_mut(parent).first_child = Some(child);
            self.node_mut(parent).last_child = Some(child);
        }
    }

    /// Inserts `new_child` before `reference` in the parent's child list.
    ///
    /// Does nothing if `reference` has no parent or the insertion would
    /// create a cycle. A `new_child` attached elsewhere is moved.
    pub fn insert_before(&mut self, reference: NodeId, new_child: NodeId) {
        let Some(parent) = self.node(reference).parent else {
            return;
        };
        if reference == new_child || self.would_cycle(parent, new_child) {
            return;
        }
        self.detach(new_child);
        self.node_mut(new_child).parent = Some(parent);

        if let Some(prev) = self.node(reference).prev_sibling {
            self.node_mut(prev).next_sibling = Some(new_child);
            self.node_mut(new_child).prev_sibling = Some(prev);
        } else {
            self.node_mut(parent).first_child = Some(new_child);
        }

        self.node_mut(new_child).next_sibling = Some(reference);
        self.node_mut(reference).prev_sibling = Some(new_child);
    }

    /// Inserts `child` as the first child of `parent`.
    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(first) = self.first_child(parent) {
            self.insert_before(first, child);
        } else {
            self.append_child(parent, child);
        }
    }

    /// Detaches a node from its parent. The node stays in the arena.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).parent else {
            return;
        };

        let prev = self.node(id).prev_sibling;
        let next = self.node(id).next_sibling;

        match prev {
            Some(p) => self.node_mut(p).next_sibling = next,
            None => self.node_mut(parent).first_child = next,
        }

        match next {
            Some(n) => self.node_mut(n).prev_sibling = prev,
            None => self.node_mut(parent).last_child = prev,
        }

        let node = self.node_mut(id);
        node.parent = None;
        node.prev_sibling = None;
        node.next_sibling = None;
    }

    /// Detaches every child of a node.
    pub fn remove_children(&mut self, id: NodeId) {
        while let Some(child) = self.first_child(id) {
            self.detach(child);
        }
    }

    /// Copies a node (and, if `deep`, its subtree) into a new detached node.
    pub fn clone_node(&mut self, id: NodeId, deep: bool) -> NodeId {
        let snapshot = self.snapshot(id, deep);
        self.materialize(snapshot)
    }

    /// Copies a node of another document (and, if `deep`, its subtree) into
    /// this document. The copy is detached.
    pub fn import_node(&mut self, source: &Document, id: NodeId, deep: bool) -> NodeId {
        let snapshot = source.snapshot(id, deep);
        self.materialize(snapshot)
    }

    /// Captures a subtree in pre-order as `(kind, parent index)` pairs.
    fn snapshot(&self, id: NodeId, deep: bool) -> Vec<(NodeKind, Option<usize>)> {
        let kind = match self.kind(id) {
            NodeKind::Document => NodeKind::Fragment,
            other => other.clone(),
        };
        let mut out = vec![(kind, None)];
        if !deep {
            return out;
        }
        let mut stack: Vec<(NodeId, usize)> = self.children(id).map(|c| (c, 0)).collect();
        stack.reverse();
        while let Some((node, parent)) = stack.pop() {
            let index = out.len();
            out.push((self.kind(node).clone(), Some(parent)));
            let mut children: Vec<(NodeId, usize)> =
                self.children(node).map(|c| (c, index)).collect();
            children.reverse();
            stack.extend(children);
        }
        out
    }

    fn materialize(&mut self, snapshot: Vec<(NodeKind, Option<usize>)>) -> NodeId {
        let mut created: Vec<NodeId> = Vec::with_capacity(snapshot.len());
        for (kind, parent) in snapshot {
            let id = self.create_node(kind);
            if let Some(parent) = parent.and_then(|p| created.get(p).copied()) {
                self.append_child(parent, id);
            }
            created.push(id);
        }
        created.first().copied().unwrap_or(self.root)
    }

    /// Returns the total number of nodes in the arena (including detached
    /// ones, excluding the placeholder slot).
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

// --- Iterators ---

/// See [`Document::children`].
pub struct Children<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.node(current).next_sibling;
        Some(current)
    }
}

/// Iterator over a node and its ancestors.
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.node(current).parent;
        Some(current)
    }
}

/// Pre-order walk of a subtree, see [`Document::descendants`].
pub struct Descendants<'a> {
    doc: &'a Document,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;

        if let Some(child) = self.doc.first_child(current) {
            self.next = Some(child);
            return Some(current);
        }

        let mut cursor = current;
        loop {
            if cursor == self.root {
                self.next = None;
                break;
            }
            if let Some(sibling) = self.doc.next_sibling(cursor) {
                self.next = Some(sibling);
                break;
            }
            match self.doc.parent(cursor) {
                Some(parent) => cursor = parent,
                None => {
                    self.next = None;
                    break;
                }
            }
        }
        Some(current)
    }
}
