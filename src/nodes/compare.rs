//! Document-order comparison and de-duplication.
//!
//! [`Compare`] orders nodes by their pre-order position. Cheap structural
//! checks come first; otherwise each node's rank, the number of nodes
//! before it in document order including its ancestors, is computed with
//! the `XPath` evaluator and cached.
//!
//! The cache borrows the document, so a `Compare` cannot outlive a
//! mutation. Create one per comparison pass.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::trace;

use crate::error::{Error, Result};
use crate::tree::{Document, NodeId};
use crate::xpath::{Expr, XPath};

/// Counts the nodes that precede the context node, ancestors included.
const RANK_EXPRESSION: &str = "count(ancestor::node() | preceding::node())";

/// Total order over the nodes of one document.
///
/// Nodes of separate trees (the document and detached subtrees) order by
/// tree: the document first, then detached trees by the arena id of their
/// root.
pub struct Compare<'a> {
    doc: &'a Document,
    xpath: &'a XPath,
    rank_expr: Expr,
    ranks: HashMap<NodeId, usize>,
}

impl<'a> Compare<'a> {
    /// Creates a comparator with an empty position cache.
    ///
    /// # Errors
    ///
    /// Returns [`Error::XPath`] if the rank expression cannot be compiled.
    pub fn new(doc: &'a Document, xpath: &'a XPath) -> Result<Self> {
        Ok(Self {
            doc,
            xpath,
            rank_expr: xpath.compile(RANK_EXPRESSION)?,
            ranks: HashMap::new(),
        })
    }

    /// Compares two nodes by document position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if either id is not a node of the
    /// document.
    pub fn compare(&mut self, a: NodeId, b: NodeId) -> Result<Ordering> {
        self.check(a)?;
        self.check(b)?;
        if a == b {
            return Ok(Ordering::Equal);
        }
        let doc = self.doc;
        if a == doc.root() {
            return Ok(Ordering::Less);
        }
        if b == doc.root() {
            return Ok(Ordering::Greater);
        }
        let root_element = doc.root_element();
        if root_element == Some(a) {
            return Ok(Ordering::Less);
        }
        if root_element == Some(b) {
            return Ok(Ordering::Greater);
        }
        if doc.prev_sibling(b) == Some(a) || doc.parent(b) == Some(a) {
            return Ok(Ordering::Less);
        }
        if doc.prev_sibling(a) == Some(b) || doc.parent(a) == Some(b) {
            return Ok(Ordering::Greater);
        }

        let (tree_a, tree_b) = (doc.tree_root(a), doc.tree_root(b));
        if tree_a != tree_b {
            let key = |tree: NodeId| (tree != doc.root(), tree);
            return Ok(key(tree_a).cmp(&key(tree_b)));
        }
        Ok(self.rank(a)?.cmp(&self.rank(b)?))
    }

    /// Returns the number of nodes preceding `id` in its tree, ancestors
    /// included.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] for an id that is not a node of the
    /// document.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn rank(&mut self, id: NodeId) -> Result<usize> {
        self.check(id)?;
        if let Some(&rank) = self.ranks.get(&id) {
            return Ok(rank);
        }
        let count = self
            .xpath
            .evaluate_expr(self.doc, &self.rank_expr, Some(id))?
            .to_number();
        let rank = count as usize;
        self.ranks.insert(id, rank);
        Ok(rank)
    }

    /// Sorts nodes into document order and drops duplicates.
    ///
    /// Nodes attached to the document come first, ordered by rank (the
    /// first occurrence of a node wins). Detached nodes follow in the order
    /// they were encountered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if an id is not a node of the
    /// document.
    pub fn unique(&mut self, ids: &[NodeId]) -> Result<Vec<NodeId>> {
        let mut attached: BTreeMap<usize, NodeId> = BTreeMap::new();
        let mut detached = Vec::new();
        let mut seen = HashSet::new();
        for &id in ids {
            self.check(id)?;
            if self.doc.is_attached(id) {
                let rank = self.rank(id)?;
                attached.entry(rank).or_insert(id);
            } else if seen.insert(id) {
                detached.push(id);
            }
        }
        trace!(
            input = ids.len(),
            attached = attached.len(),
            detached = detached.len(),
            "unique"
        );
        Ok(attached.into_values().chain(detached).collect())
    }

    fn check(&self, id: NodeId) -> Result<()> {
        if self.doc.contains(id) {
            Ok(())
        } else {
            Err(Error::TypeMismatch(format!(
                "{id:?} is not a node of this document"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const XML: &str = "<items><group><item index=\"0\">text1</item><item index=\"1\">text2</item>\
                       <item index=\"2\">text3</item></group><tail/></items>";

    fn all_nodes(doc: &Document) -> Vec<NodeId> {
        std::iter::once(doc.root())
            .chain(doc.descendants(doc.root()))
            .collect()
    }

    #[test]
    fn test_reflexive_and_root_first() {
        let doc = Document::parse_str(XML).unwrap();
        let xpath = XPath::new();
        let mut cmp = Compare::new(&doc, &xpath).unwrap();
        let root = doc.root_element().unwrap();
        for id in doc.descendants(root) {
            assert_eq!(cmp.compare(root, id).unwrap(), Ordering::Less);
            assert_eq!(cmp.compare(id, root).unwrap(), Ordering::Greater);
            assert_eq!(cmp.compare(id, id).unwrap(), Ordering::Equal);
        }
    }

    #[test]
    fn test_antisymmetric_and_consistent_with_document_order() {
        let doc = Document::parse_str(XML).unwrap();
        let xpath = XPath::new();
        let mut cmp = Compare::new(&doc, &xpath).unwrap();
        let nodes = all_nodes(&doc);
        for (i, &a) in nodes.iter().enumerate() {
            for (j, &b) in nodes.iter().enumerate() {
                let forward = cmp.compare(a, b).unwrap();
                assert_eq!(forward, i.cmp(&j));
                assert_eq!(forward, cmp.compare(b, a).unwrap().reverse());
            }
        }
    }

    #[test]
    fn test_rank_counts_preceding_nodes() {
        let doc = Document::parse_str(XML).unwrap();
        let xpath = XPath::new();
        let mut cmp = Compare::new(&doc, &xpath).unwrap();
        for (position, id) in all_nodes(&doc).into_iter().enumerate() {
            assert_eq!(cmp.rank(id).unwrap(), position);
        }
    }

    #[test]
    fn test_unique_sorts_and_dedupes() {
        let doc = Document::parse_str(XML).unwrap();
        let xpath = XPath::new();
        let mut cmp = Compare::new(&doc, &xpath).unwrap();
        let group = doc.first_child(doc.root_element().unwrap()).unwrap();
        let items: Vec<NodeId> = doc.children(group).collect();
        let shuffled = vec![items[2], items[0], items[2], items[1], items[0]];
        let unique = cmp.unique(&shuffled).unwrap();
        assert_eq!(unique, items);
        assert_eq!(cmp.unique(&unique).unwrap(), unique);
    }

    #[test]
    fn test_unique_appends_detached_in_encounter_order() {
        let mut doc = Document::parse_str(XML).unwrap();
        let loose_a = doc.create_element("a");
        let loose_b = doc.create_element("b");
        let root = doc.root_element().unwrap();
        let xpath = XPath::new();
        let mut cmp = Compare::new(&doc, &xpath).unwrap();
        let unique = cmp.unique(&[loose_b, root, loose_a, loose_b]).unwrap();
        assert_eq!(unique, vec![root, loose_b, loose_a]);
    }

    #[test]
    fn test_foreign_id_is_type_mismatch() {
        let doc = Document::parse_str("<r/>").unwrap();
        let xpath = XPath::new();
        let mut cmp = Compare::new(&doc, &xpath).unwrap();
        let bogus = NodeId::from_raw(9_999).unwrap();
        assert!(matches!(
            cmp.unique(&[bogus]),
            Err(Error::TypeMismatch(_))
        ));
        let root = doc.root_element().unwrap();
        assert!(matches!(
            cmp.compare(root, bogus),
            Err(Error::TypeMismatch(_))
        ));
    }
}
