//! Selection and traversal.
//!
//! Every method returns a new selection spawned from `self`, so
//! [`Nodes::end`] walks back along the chain.

use std::ops::{Bound, RangeBounds};

use crate::error::{Error, Result};
use crate::nodes::{Builder, Content, FetchOptions, Fetcher, Nodes};
use crate::tree::Node;
use crate::xpath::XPathValue;

use super::Matcher;

/// Following siblings that are elements or non-blank text.
const FOLLOWING: &str =
    "following-sibling::node()[self::* or (self::text() and normalize-space(.) != '')]";

/// Preceding siblings that are elements or non-blank text.
const PRECEDING: &str =
    "preceding-sibling::node()[self::* or (self::text() and normalize-space(.) != '')]";

impl Nodes {
    /// Fetches `expression` for every member, keeping nodes that match
    /// `filter`.
    fn select(
        &self,
        expression: &str,
        filter: Option<&str>,
        options: FetchOptions,
    ) -> Result<Self> {
        self.select_until(expression, filter, None, options)
    }

    fn select_until(
        &self,
        expression: &str,
        filter: Option<&str>,
        stop: Option<&str>,
        options: FetchOptions,
    ) -> Result<Self> {
        let keep = Matcher::new(self, filter)?;
        let stop_matcher = Matcher::new(self, stop)?;
        let keep_fn = |node: &Node, _: usize| keep.test(node);
        let stop_fn = |node: &Node, _: usize| stop_matcher.test(node);
        let ids = Fetcher::new(self).fetch(
            expression,
            Some(&keep_fn),
            stop.map(|_| &stop_fn as &dyn Fn(&Node, usize) -> bool),
            options,
        )?;
        keep.finish()?;
        stop_matcher.finish()?;
        Ok(self.spawn_from(ids, false))
    }

    // --- Selection ---

    /// Evaluates `expression` for every member (or once against the
    /// document, if absolute) and selects the result in document order.
    ///
    /// # Errors
    ///
    /// - [`Error::NotANodeSet`] if the expression yields a scalar
    /// - [`Error::XPath`] if the expression is malformed
    pub fn find(&self, expression: &str) -> Result<Self> {
        self.select(expression, None, FetchOptions::default().unique())
    }

    /// Keeps the members matching `expression`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::XPath`] if the expression is malformed.
    pub fn filter(&self, expression: &str) -> Result<Self> {
        let mut kept = Vec::new();
        for &id in self.ids() {
            if self.matches(expression, id)? {
                kept.push(id);
            }
        }
        Ok(self.spawn_from(kept, false))
    }

    /// Keeps the members for which `predicate(node, index)` is true.
    #[must_use]
    pub fn filter_by(&self, predicate: impl Fn(&Node, usize) -> bool) -> Self {
        let kept = self
            .ids()
            .iter()
            .enumerate()
            .filter(|&(index, &id)| predicate(&self.document().node(id), index))
            .map(|(_, &id)| id)
            .collect();
        self.spawn_from(kept, false)
    }

    /// Removes the members matching `expression`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::XPath`] if the expression is malformed.
    pub fn not(&self, expression: &str) -> Result<Self> {
        let mut kept = Vec::new();
        for &id in self.ids() {
            if !self.matches(expression, id)? {
                kept.push(id);
            }
        }
        Ok(self.spawn_from(kept, false))
    }

    /// Keeps the members for which `expression` selects at least one node.
    ///
    /// # Errors
    ///
    /// - [`Error::NotANodeSet`] if the expression yields a scalar
    /// - [`Error::XPath`] if the expression is malformed
    pub fn has(&self, expression: &str) -> Result<Self> {
        let mut kept = Vec::new();
        for &id in self.ids() {
            match self.evaluate(expression, Some(id))? {
                XPathValue::NodeSet(found) => {
                    if !found.is_empty() {
                        kept.push(id);
                    }
                }
                other => {
                    return Err(Error::NotANodeSet {
                        expression: expression.to_string(),
                        found: other.type_name(),
                    })
                }
            }
        }
        Ok(self.spawn_from(kept, false))
    }

    /// Returns `true` if any member matches `expression`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::XPath`] if the expression is malformed.
    pub fn is(&self, expression: &str) -> Result<bool> {
        for &id in self.ids() {
            if self.matches(expression, id)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Adds nodes to a copy of the selection, keeping document order.
    ///
    /// A string is evaluated as an expression against the document.
    ///
    /// # Errors
    ///
    /// As [`Builder::get_target_nodes`].
    pub fn add(&self, nodes: impl Into<Content>) -> Result<Self> {
        let mut ids = self.ids().to_vec();
        ids.extend(Builder::new(self).get_target_nodes(&nodes.into(), None)?);
        let ids = self.unique(&ids)?;
        Ok(self.spawn_from(ids, false))
    }

    // --- Tree navigation ---

    /// The element children of every member, optionally filtered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::XPath`] if the filter is malformed.
    pub fn children(&self, filter: Option<&str>) -> Result<Self> {
        self.select("*", filter, FetchOptions::default().unique())
    }

    /// The element and non-blank text children of every member.
    ///
    /// # Errors
    ///
    /// Never fails for a well-formed selection; the result type follows
    /// the other traversal methods.
    pub fn contents(&self) -> Result<Self> {
        self.select("node()", None, FetchOptions::default().unique())
    }

    /// The parent element of every member.
    ///
    /// # Errors
    ///
    /// As [`Nodes::contents`].
    pub fn parent(&self) -> Result<Self> {
        self.select("parent::*", None, FetchOptions::default().unique())
    }

    /// The ancestor elements of every member. For a single member the
    /// nearest ancestor comes first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::XPath`] if the filter is malformed.
    pub fn parents(&self, filter: Option<&str>) -> Result<Self> {
        self.select(
            "ancestor::*",
            filter,
            FetchOptions::default().reverse().unique(),
        )
    }

    /// For every member, the nearest element matching `expression`,
    /// starting with the member itself.
    ///
    /// # Errors
    ///
    /// Returns [`Error::XPath`] if the expression is malformed.
    pub fn closest(&self, expression: &str) -> Result<Self> {
        let matcher = Matcher::new(self, Some(expression))?;
        let test = |node: &Node, _: usize| matcher.test(node);
        let ids = Fetcher::new(self).fetch(
            "ancestor-or-self::*",
            Some(&test),
            Some(&test),
            FetchOptions::default().reverse().include_stop().unique(),
        )?;
        matcher.finish()?;
        Ok(self.spawn_from(ids, false))
    }

    /// The sibling elements of every member, excluding the member.
    ///
    /// # Errors
    ///
    /// Returns [`Error::XPath`] if the filter is malformed.
    pub fn siblings(&self, filter: Option<&str>) -> Result<Self> {
        self.select(
            "preceding-sibling::* | following-sibling::*",
            filter,
            FetchOptions::default().unique(),
        )
    }

    /// The next element or non-blank text sibling of every member.
    ///
    /// # Errors
    ///
    /// Returns [`Error::XPath`] if the filter is malformed.
    pub fn next(&self, filter: Option<&str>) -> Result<Self> {
        let expression = format!("{FOLLOWING}[1]");
        self.select(&expression, filter, FetchOptions::default().unique())
    }

    /// All following element and non-blank text siblings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::XPath`] if the filter is malformed.
    pub fn next_all(&self, filter: Option<&str>) -> Result<Self> {
        self.select(FOLLOWING, filter, FetchOptions::default().unique())
    }

    /// Following siblings up to, not including, the first one matching
    /// `stop`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::XPath`] if an expression is malformed.
    pub fn next_until(&self, stop: Option<&str>, filter: Option<&str>) -> Result<Self> {
        self.select_until(FOLLOWING, filter, stop, FetchOptions::default().unique())
    }

    /// The previous element or non-blank text sibling of every member.
    ///
    /// # Errors
    ///
    /// Returns [`Error::XPath`] if the filter is malformed.
    pub fn prev(&self, filter: Option<&str>) -> Result<Self> {
        let expression = format!("{PRECEDING}[1]");
        self.select(&expression, filter, FetchOptions::default().unique())
    }

    /// All preceding element and non-blank text siblings. For a single
    /// member the nearest sibling comes first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::XPath`] if the filter is malformed.
    pub fn prev_all(&self, filter: Option<&str>) -> Result<Self> {
        self.select(
            PRECEDING,
            filter,
            FetchOptions::default().reverse().unique(),
        )
    }

    /// Preceding siblings, nearest first, up to the first one matching
    /// `stop`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::XPath`] if an expression is malformed.
    pub fn prev_until(&self, stop: Option<&str>, filter: Option<&str>) -> Result<Self> {
        self.select_until(
            PRECEDING,
            filter,
            stop,
            FetchOptions::default().reverse().unique(),
        )
    }

    // --- Slicing ---

    /// The first member.
    #[must_use]
    pub fn first(&self) -> Self {
        self.slice(..1)
    }

    /// The last member.
    #[must_use]
    pub fn last(&self) -> Self {
        self.slice(self.len().saturating_sub(1)..)
    }

    /// The member at `index`; a negative index counts from the end.
    #[must_use]
    pub fn eq(&self, index: isize) -> Self {
        let position = if index < 0 {
            self.len().checked_sub(index.unsigned_abs())
        } else {
            Some(index.unsigned_abs())
        };
        match position {
            Some(position) if position < self.len() => self.slice(position..=position),
            _ => self.spawn(),
        }
    }

    /// The members within `range`, clamped to the selection.
    #[must_use]
    pub fn slice(&self, range: impl RangeBounds<usize>) -> Self {
        let len = self.len();
        let start = match range.start_bound() {
            Bound::Included(&start) => start,
            Bound::Excluded(&start) => start.saturating_add(1),
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&end) => end.saturating_add(1),
            Bound::Excluded(&end) => end,
            Bound::Unbounded => len,
        };
        let end = end.min(len);
        let ids = if start < end {
            self.ids()[start..end].to_vec()
        } else {
            Vec::new()
        };
        self.spawn_from(ids, false)
    }

    // --- Iteration ---

    /// Calls `f(node, index)` for every member.
    pub fn each(&self, mut f: impl FnMut(&Node, usize)) -> &Self {
        for (index, &id) in self.ids().iter().enumerate() {
            f(&self.document().node(id), index);
        }
        self
    }

    /// Collects `f(node, index)` for every member.
    pub fn map<T>(&self, mut f: impl FnMut(&Node, usize) -> T) -> Vec<T> {
        self.ids()
            .iter()
            .enumerate()
            .map(|(index, &id)| f(&self.document().node(id), index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LIST: &str = "<list>\n  <a id='1'/>\n  text\n  <!-- note -->\n  <b id='2'><c id='3'/><c id='4'/></b>\n  <d id='5'/>\n</list>";

    fn ids(nodes: &Nodes) -> Vec<String> {
        nodes.map(|node, _| {
            node.attribute("id")
                .unwrap_or_else(|| node.text_content().trim().to_string())
        })
    }

    fn load() -> Nodes {
        Nodes::load(LIST, "text/xml").unwrap()
    }

    #[test]
    fn test_find() {
        let doc = load();
        assert_eq!(ids(&doc.find("//c").unwrap()), vec!["3", "4"]);
        let b = doc.find("/list/b").unwrap();
        assert_eq!(ids(&b.find("c").unwrap()), vec!["3", "4"]);
        assert!(b.find("c").unwrap().end().ptr_eq(&b));
        assert!(matches!(
            doc.find("count(//c)"),
            Err(Error::NotANodeSet { .. })
        ));
    }

    #[test]
    fn test_find_merges_contexts_in_document_order() {
        let doc = load();
        let all = doc.find("//*[@id]").unwrap();
        assert_eq!(ids(&all.find("parent::*").unwrap()), vec!["2"]);
    }

    #[test]
    fn test_filter_not_is() {
        let doc = load();
        let all = doc.find("//*[@id]").unwrap();
        assert_eq!(ids(&all.filter("self::c").unwrap()), vec!["3", "4"]);
        assert_eq!(ids(&all.not("self::c").unwrap()), vec!["1", "2", "5"]);
        assert!(all.is("self::d").unwrap());
        assert!(!all.is("self::e").unwrap());
        assert_eq!(
            ids(&all.filter_by(|_, index| index % 2 == 0)),
            vec!["1", "3", "5"]
        );
    }

    #[test]
    fn test_has() {
        let doc = load();
        let all = doc.find("//*[@id]").unwrap();
        assert_eq!(ids(&all.has("c").unwrap()), vec!["2"]);
        assert!(matches!(
            all.has("count(c)"),
            Err(Error::NotANodeSet { found: "number", .. })
        ));
    }

    #[test]
    fn test_add_keeps_document_order() {
        let doc = load();
        let d = doc.find("//d").unwrap();
        let added = d.add("//a").unwrap();
        assert_eq!(ids(&added), vec!["1", "5"]);
        let other = Nodes::load("<x/>", "xml").unwrap();
        let foreign = other.find("/x").unwrap().get(0).unwrap();
        assert!(matches!(d.add(foreign), Err(Error::DocumentMismatch)));
    }

    #[test]
    fn test_children_and_contents() {
        let doc = load();
        let list = doc.find("/list").unwrap();
        assert_eq!(ids(&list.children(None).unwrap()), vec!["1", "2", "5"]);
        assert_eq!(
            ids(&list.children(Some("self::b or self::d")).unwrap()),
            vec!["2", "5"]
        );
        // Comments and blank text are dropped.
        assert_eq!(ids(&list.contents().unwrap()), vec!["1", "text", "2", "5"]);
    }

    #[test]
    fn test_parent_parents_closest() {
        let doc = load();
        let c = doc.find("//c").unwrap();
        assert_eq!(ids(&c.parent().unwrap()), vec!["2"]);

        let first = c.first();
        let names = first
            .parents(None)
            .unwrap()
            .map(|node, _| node.name().unwrap_or_default());
        assert_eq!(names, vec!["b", "list"]);
        assert_eq!(first.parents(Some("self::list")).unwrap().len(), 1);

        assert_eq!(ids(&c.closest("self::c").unwrap()), vec!["3", "4"]);
        assert_eq!(ids(&c.closest("@id").unwrap()), vec!["3", "4"]);
        assert_eq!(ids(&c.closest("self::b").unwrap()), vec!["2"]);
        assert!(c.closest("self::x").unwrap().is_empty());
    }

    #[test]
    fn test_siblings() {
        let doc = load();
        let b = doc.find("//b").unwrap();
        assert_eq!(ids(&b.siblings(None).unwrap()), vec!["1", "5"]);
        assert_eq!(ids(&b.siblings(Some("self::d")).unwrap()), vec!["5"]);
    }

    #[test]
    fn test_next_and_prev_skip_insignificant_nodes() {
        let doc = load();
        let a = doc.find("//a").unwrap();
        assert_eq!(ids(&a.next(None).unwrap()), vec!["text"]);
        assert_eq!(ids(&a.next_all(None).unwrap()), vec!["text", "2", "5"]);
        assert_eq!(ids(&a.next_all(Some("self::*")).unwrap()), vec!["2", "5"]);

        let d = doc.find("//d").unwrap();
        assert_eq!(ids(&d.prev(None).unwrap()), vec!["2"]);
        assert_eq!(ids(&d.prev_all(None).unwrap()), vec!["2", "text", "1"]);
    }

    #[test]
    fn test_until() {
        let doc = load();
        let a = doc.find("//a").unwrap();
        assert_eq!(
            ids(&a.next_until(Some("self::d"), None).unwrap()),
            vec!["text", "2"]
        );
        assert_eq!(
            ids(&a.next_until(Some("self::d"), Some("self::*")).unwrap()),
            vec!["2"]
        );
        assert_eq!(ids(&a.next_until(None, None).unwrap()).len(), 3);

        let d = doc.find("//d").unwrap();
        assert_eq!(
            ids(&d.prev_until(Some("self::a"), None).unwrap()),
            vec!["2", "text"]
        );
    }

    #[test]
    fn test_slicing() {
        let doc = load();
        let all = doc.find("//*[@id]").unwrap();
        assert_eq!(ids(&all.first()), vec!["1"]);
        assert_eq!(ids(&all.last()), vec!["5"]);
        assert_eq!(ids(&all.eq(1)), vec!["2"]);
        assert_eq!(ids(&all.eq(-1)), vec!["5"]);
        assert!(all.eq(5).is_empty());
        assert!(all.eq(-6).is_empty());
        assert_eq!(ids(&all.slice(1..3)), vec!["2", "3"]);
        assert_eq!(ids(&all.slice(3..)), vec!["4", "5"]);
        assert!(all.slice(4..2).is_empty());
        assert_eq!(all.slice(..10).len(), 5);
        assert!(doc.first().is_empty());
        assert!(doc.last().is_empty());
    }

    #[test]
    fn test_each_and_map() {
        let doc = load();
        let c = doc.find("//c").unwrap();
        let mut seen = Vec::new();
        c.each(|node, index| seen.push((index, node.attribute("id"))))
            .set_attr("visited", "yes")
            .unwrap();
        assert_eq!(
            seen,
            vec![(0, Some("3".to_string())), (1, Some("4".to_string()))]
        );
        assert_eq!(doc.find("//c[@visited]").unwrap().len(), 2);
    }

    #[test]
    fn test_callbacks_may_read_the_document() {
        let doc = load();
        let c = doc.find("//c").unwrap();
        let counts = c.map(|node, _| {
            let seen = doc.find("//c").map(|found| found.len()).unwrap_or(0);
            seen + node.text_content().len()
        });
        assert_eq!(counts, vec![2, 2]);
    }
}
