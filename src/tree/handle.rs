//! Shared document handles.
//!
//! Node-sets spawned from one document all point at the same tree, so the
//! document lives behind `Rc<RefCell<_>>`. Borrows are taken for the length
//! of a single primitive and never held across user callbacks.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use super::{Document, DocumentId, NodeId};

/// A reference-counted, interior-mutable document shared by node-sets.
#[derive(Clone)]
pub struct SharedDocument {
    id: DocumentId,
    inner: Rc<RefCell<Document>>,
}

impl SharedDocument {
    /// Wraps a document for sharing.
    #[must_use]
    pub fn new(document: Document) -> Self {
        Self {
            id: document.id(),
            inner: Rc::new(RefCell::new(document)),
        }
    }

    /// Returns the identity of the wrapped document.
    #[must_use]
    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// Immutably borrows the document.
    ///
    /// # Panics
    ///
    /// Panics if the document is currently mutably borrowed.
    #[must_use]
    pub fn borrow(&self) -> Ref<'_, Document> {
        self.inner.borrow()
    }

    /// Mutably borrows the document.
    ///
    /// # Panics
    ///
    /// Panics if the document is currently borrowed.
    #[must_use]
    pub fn borrow_mut(&self) -> RefMut<'_, Document> {
        self.inner.borrow_mut()
    }

    /// Returns `true` if both handles point at the same document.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns a handle to a node of this document.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Node {
        Node::new(self.clone(), id)
    }
}

impl From<Document> for SharedDocument {
    fn from(document: Document) -> Self {
        Self::new(document)
    }
}

impl fmt::Debug for SharedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedDocument").field(&self.id).finish()
    }
}

/// A node together with the document it belongs to.
///
/// Two handles are equal when they address the same node of the same
/// document.
#[derive(Clone)]
pub struct Node {
    document: SharedDocument,
    id: NodeId,
}

impl Node {
    /// Creates a handle for `id` within `document`.
    #[must_use]
    pub fn new(document: SharedDocument, id: NodeId) -> Self {
        Self { document, id }
    }

    /// The arena id of the node.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The document the node belongs to.
    #[must_use]
    pub fn document(&self) -> &SharedDocument {
        &self.document
    }

    /// Returns `true` if the node belongs to `document`.
    #[must_use]
    pub fn belongs_to(&self, document: &SharedDocument) -> bool {
        self.document.ptr_eq(document)
    }

    /// The element name as written (with prefix), or the PI target.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.document.borrow().qualified_name(self.id)
    }

    /// Returns `true` for element nodes.
    #[must_use]
    pub fn is_element(&self) -> bool {
        self.document.borrow().is_element(self.id)
    }

    /// The value of an attribute of the node.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.document
            .borrow()
            .attribute(self.id, name)
            .map(str::to_string)
    }

    /// The concatenated text of the node and its descendants.
    #[must_use]
    pub fn text_content(&self) -> String {
        self.document.borrow().text_content(self.id)
    }

    /// Serializes the node (and its subtree) as XML.
    #[must_use]
    pub fn to_xml(&self) -> String {
        crate::serial::serialize_node(&self.document.borrow(), self.id)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.document.ptr_eq(&other.document)
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("document", &self.document.id)
            .field("id", &self.id)
            .finish()
    }
}
