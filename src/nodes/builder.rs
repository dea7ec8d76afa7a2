//! Content resolution.
//!
//! The [`Builder`] turns the values handed to manipulation methods into
//! nodes of the selection's document: target selectors become node lists,
//! content becomes nodes ready to be cloned into place, and wrapper
//! templates become a cloned wrapper plus its insertion point.
//!
//! Content owned by another document is imported (deep-copied) here and
//! nowhere else.

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::serial::{serialize_nodes, Syntax};
use crate::tree::{Document, Node, NodeId};
use crate::xpath::XPathValue;

use super::{Content, Nodes};

/// Outcome of the search for a wrapper's insertion point.
enum Innermost {
    Found(NodeId),
    NotFound,
    Exhausted,
}

/// Resolves content and targets for a node-set.
#[derive(Debug, Clone, Copy)]
pub struct Builder<'a> {
    nodes: &'a Nodes,
}

impl<'a> Builder<'a> {
    /// Creates a builder for the document of `nodes`.
    #[must_use]
    pub fn new(nodes: &'a Nodes) -> Self {
        Self { nodes }
    }

    /// Resolves a target specification.
    ///
    /// Nodes are returned as they are. A markup string is evaluated as an
    /// expression with `context` (default: the document node) as context
    /// node.
    ///
    /// # Errors
    ///
    /// - [`Error::DocumentMismatch`] for a node of another document
    /// - [`Error::TypeMismatch`] for a handle whose id is not in its document
    /// - [`Error::InvalidSelector`] if the expression yields a scalar
    /// - [`Error::InvalidArgument`] for an empty selector or a callback
    /// - [`Error::XPath`] if the expression is malformed
    pub fn get_target_nodes(
        &self,
        spec: &Content,
        context: Option<NodeId>,
    ) -> Result<Vec<NodeId>> {
        match spec {
            Content::Node(node) => Ok(vec![self.owned(node)?]),
            Content::Collection(nodes) => nodes.iter().map(|node| self.owned(node)).collect(),
            Content::Markup(selector) => {
                if selector.trim().is_empty() {
                    return Err(Error::InvalidArgument("empty target selector".into()));
                }
                match self.nodes.evaluate(selector, context)? {
                    XPathValue::NodeSet(ids) => Ok(ids),
                    _ => Err(Error::InvalidSelector {
                        selector: selector.clone(),
                    }),
                }
            }
            Content::Callback(_) => Err(Error::InvalidArgument(
                "a callback cannot select target nodes".into(),
            )),
        }
    }

    fn owned(&self, node: &Node) -> Result<NodeId> {
        if !node.belongs_to(self.nodes.document()) {
            return Err(Error::DocumentMismatch);
        }
        check_handle(node)?;
        Ok(node.id())
    }

    /// Resolves content into nodes of the document.
    ///
    /// Elements are always used; non-blank text only with
    /// `include_text_nodes`. Markup is parsed with the configured content
    /// type. At most `limit` nodes are returned.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptySource`] for an empty markup string
    /// - [`Error::EmptyResult`] if nothing usable remains
    /// - [`Error::TypeMismatch`] for a handle whose id is not in its document
    /// - [`Error::InvalidArgument`] for a callback (see
    ///   [`Builder::get_content_nodes_for`])
    /// - [`Error::InvalidFragmentLoader`] if no loader handles the content
    ///   type
    pub fn get_content_nodes(
        &self,
        spec: &Content,
        include_text_nodes: bool,
        limit: Option<usize>,
    ) -> Result<Vec<NodeId>> {
        let ids = match spec {
            Content::Node(node) => {
                self.resolve(std::slice::from_ref(node), include_text_nodes, limit)?
            }
            Content::Collection(nodes) => self.resolve(nodes, include_text_nodes, limit)?,
            Content::Markup(markup) => {
                if markup.is_empty() {
                    return Err(Error::EmptySource);
                }
                let content_type = &self.nodes.config().content_type;
                self.get_fragment(markup, content_type, include_text_nodes, limit)?
            }
            Content::Callback(_) => {
                return Err(Error::InvalidArgument(
                    "callback content needs a target node".into(),
                ))
            }
        };
        if ids.is_empty() {
            return Err(Error::EmptyResult);
        }
        Ok(ids)
    }

    /// Like [`Builder::get_content_nodes`], but a callback is first invoked
    /// with `(target, index, inner_xml(target))` and its result resolved.
    ///
    /// # Errors
    ///
    /// As [`Builder::get_content_nodes`]; a callback returning another
    /// callback is [`Error::InvalidArgument`].
    pub fn get_content_nodes_for(
        &self,
        spec: &Content,
        target: NodeId,
        index: usize,
        include_text_nodes: bool,
        limit: Option<usize>,
    ) -> Result<Vec<NodeId>> {
        let Content::Callback(callback) = spec else {
            return self.get_content_nodes(spec, include_text_nodes, limit);
        };
        let inner = self.get_inner_xml(target);
        let node = self.nodes.document().node(target);
        let produced = callback(&node, index, &inner);
        if produced.is_callback() {
            return Err(Error::InvalidArgument(
                "a content callback returned another callback".into(),
            ));
        }
        self.get_content_nodes(&produced, include_text_nodes, limit)
    }

    /// The first element of the content.
    ///
    /// # Errors
    ///
    /// As [`Builder::get_content_nodes`].
    pub fn get_content_element(&self, spec: &Content) -> Result<NodeId> {
        first_element(self.get_content_nodes(spec, false, Some(1))?)
    }

    /// The first element of the content computed for `target`.
    ///
    /// # Errors
    ///
    /// As [`Builder::get_content_nodes_for`].
    pub fn get_content_element_for(
        &self,
        spec: &Content,
        target: NodeId,
        index: usize,
    ) -> Result<NodeId> {
        first_element(self.get_content_nodes_for(spec, target, index, false, Some(1))?)
    }

    /// Parses markup with the loader for `content_type` and imports the
    /// fragment's top-level nodes.
    ///
    /// Empty markup and markup the loader rejects yield no nodes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFragmentLoader`] if no loader is registered
    /// for `content_type`.
    pub fn get_fragment(
        &self,
        markup: &str,
        content_type: &str,
        include_text_nodes: bool,
        limit: Option<usize>,
    ) -> Result<Vec<NodeId>> {
        let config = self.nodes.config();
        let Some(loader) = config.loaders.get(content_type) else {
            debug!(content_type, "no fragment loader registered");
            return Err(Error::InvalidFragmentLoader(content_type.to_string()));
        };
        if markup.is_empty() {
            return Ok(Vec::new());
        }
        let Some(fragment) = loader.load_fragment(markup, &config.parse_options()) else {
            debug!(content_type, "fragment did not parse, no content");
            return Ok(Vec::new());
        };

        let mut doc = self.nodes.document().borrow_mut();
        let mut ids = Vec::new();
        for child in fragment.children() {
            if limit.is_some_and(|limit| ids.len() >= limit) {
                break;
            }
            if fragment.document.is_significant(child, !include_text_nodes) {
                ids.push(doc.import_node(&fragment.document, child, true));
            }
        }
        trace!(content_type, imported = ids.len(), "fragment imported");
        Ok(ids)
    }

    /// Resolves concrete nodes, importing those of other documents.
    fn resolve(
        &self,
        nodes: &[Node],
        include_text_nodes: bool,
        limit: Option<usize>,
    ) -> Result<Vec<NodeId>> {
        let target = self.nodes.document();
        let mut ids = Vec::new();
        for node in nodes {
            if limit.is_some_and(|limit| ids.len() >= limit) {
                break;
            }
            check_handle(node)?;
            let source = node.document().borrow();
            if !source.is_significant(node.id(), !include_text_nodes) {
                continue;
            }
            if node.belongs_to(target) {
                ids.push(node.id());
            } else {
                let imported = target.borrow_mut().import_node(&source, node.id(), true);
                trace!(from = ?node.document().id(), ?imported, "node imported");
                ids.push(imported);
            }
        }
        Ok(ids)
    }

    /// Serializes the element and non-blank text children of `node`.
    #[must_use]
    pub fn get_inner_xml(&self, node: NodeId) -> String {
        let doc = self.nodes.document().borrow();
        let children: Vec<NodeId> = doc
            .children(node)
            .filter(|&child| doc.is_significant(child, false))
            .collect();
        let syntax = Syntax::for_content_type(&self.nodes.config().content_type);
        serialize_nodes(&doc, &children, syntax)
    }

    /// Clones a wrapper template and finds where wrapped content goes.
    ///
    /// Returns `(insertion_target, wrapper_root)`. The insertion target is
    /// the first element of the clone, in document order, without element
    /// children. A template without element children is "simple": its
    /// clone is both root and target. Once `simple` is set, later calls
    /// skip the search.
    #[must_use]
    pub fn get_wrapper_nodes(&self, template: NodeId, simple: &mut bool) -> (NodeId, NodeId) {
        let mut doc = self.nodes.document().borrow_mut();
        let wrapper = doc.clone_node(template, true);
        if !*simple {
            match innermost_element(&doc, wrapper, self.nodes.config().max_depth) {
                Innermost::Found(target) => return (target, wrapper),
                Innermost::Exhausted => {
                    debug!("wrapper template exceeds the depth budget, using it as simple");
                }
                Innermost::NotFound => {}
            }
            *simple = true;
        }
        (wrapper, wrapper)
    }
}

fn check_handle(node: &Node) -> Result<()> {
    if node.document().borrow().contains(node.id()) {
        Ok(())
    } else {
        Err(Error::TypeMismatch(format!(
            "{:?} is not a node of its document",
            node.id()
        )))
    }
}

fn first_element(ids: Vec<NodeId>) -> Result<NodeId> {
    ids.into_iter().next().ok_or(Error::EmptyResult)
}

fn innermost_element(doc: &Document, id: NodeId, remaining: usize) -> Innermost {
    if remaining == 0 {
        return Innermost::Exhausted;
    }
    for child in doc.element_children(id) {
        if doc.element_children(child).next().is_none() {
            return Innermost::Found(child);
        }
        match innermost_element(doc, child, remaining - 1) {
            Innermost::NotFound => {}
            found_or_exhausted => return found_or_exhausted,
        }
    }
    Innermost::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{Fragment, Loader, ParseOptions};
    use crate::nodes::Config;
    use crate::error::ParseError;
    use crate::serial::serialize_node;
    use crate::tree::SharedDocument;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn nodes(xml: &str) -> Nodes {
        Nodes::from_document(Document::parse_str(xml).unwrap())
    }

    fn xml_of(nodes: &Nodes, id: NodeId) -> String {
        serialize_node(&nodes.document().borrow(), id)
    }

    fn root_of(nodes: &Nodes) -> NodeId {
        nodes.document().borrow().root_element().unwrap()
    }

    #[test]
    fn test_target_nodes_from_selector() {
        let nodes = nodes("<r><a/><b/><a/></r>");
        let builder = Builder::new(&nodes);
        let found = builder
            .get_target_nodes(&Content::from("//a"), None)
            .unwrap();
        assert_eq!(found.len(), 2);

        let root = root_of(&nodes);
        let relative = builder
            .get_target_nodes(&Content::from("b"), Some(root))
            .unwrap();
        assert_eq!(relative.len(), 1);
    }

    #[test]
    fn test_target_nodes_errors() {
        let nodes = nodes("<r/>");
        let builder = Builder::new(&nodes);
        assert!(matches!(
            builder.get_target_nodes(&Content::from("count(//*)"), None),
            Err(Error::InvalidSelector { .. })
        ));
        assert!(matches!(
            builder.get_target_nodes(&Content::from(""), None),
            Err(Error::InvalidArgument(_))
        ));
        let callback = Content::callback(|_, _, _| Content::from("<a/>"));
        assert!(matches!(
            builder.get_target_nodes(&callback, None),
            Err(Error::InvalidArgument(_))
        ));
        let other = SharedDocument::new(Document::parse_str("<x/>").unwrap());
        let x = other.borrow().root_element().unwrap();
        assert!(matches!(
            builder.get_target_nodes(&Content::from(other.node(x)), None),
            Err(Error::DocumentMismatch)
        ));
    }

    #[test]
    fn test_content_from_markup() {
        let nodes = nodes("<r/>");
        let builder = Builder::new(&nodes);
        let content = builder
            .get_content_nodes(&Content::from("<b/>text<i/>"), true, None)
            .unwrap();
        assert_eq!(content.len(), 3);
        let elements = builder
            .get_content_nodes(&Content::from("<b/>text<i/>"), false, None)
            .unwrap();
        assert_eq!(elements.len(), 2);
        let limited = builder
            .get_content_nodes(&Content::from("<b/><i/>"), true, Some(1))
            .unwrap();
        assert_eq!(xml_of(&nodes, limited[0]), "<b/>");
    }

    #[test]
    fn test_content_imports_foreign_nodes() {
        let nodes = nodes("<r/>");
        let other = SharedDocument::new(Document::parse_str("<x><y/></x>").unwrap());
        let x = other.borrow().root_element().unwrap();
        let content = Builder::new(&nodes)
            .get_content_nodes(&Content::from(other.node(x)), true, None)
            .unwrap();
        assert_eq!(xml_of(&nodes, content[0]), "<x><y/></x>");
        assert!(nodes.document().borrow().parent(content[0]).is_none());
        // The source document is untouched.
        assert!(other.borrow().first_child(x).is_some());
    }

    #[test]
    fn test_out_of_range_handles_are_rejected() {
        let nodes = nodes("<r/>");
        let builder = Builder::new(&nodes);
        let dangling = Content::from(nodes.document().node(NodeId::from_raw(9_999).unwrap()));
        assert!(matches!(
            builder.get_target_nodes(&dangling, None),
            Err(Error::TypeMismatch(_))
        ));
        assert!(matches!(
            builder.get_content_nodes(&dangling, true, None),
            Err(Error::TypeMismatch(_))
        ));

        let other = SharedDocument::new(Document::parse_str("<x/>").unwrap());
        let foreign = Content::from(other.node(NodeId::from_raw(9_999).unwrap()));
        assert!(matches!(
            builder.get_content_nodes(&foreign, true, None),
            Err(Error::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_content_errors() {
        let nodes = nodes("<r/>");
        let builder = Builder::new(&nodes);
        assert!(matches!(
            builder.get_content_nodes(&Content::from(""), true, None),
            Err(Error::EmptySource)
        ));
        assert!(matches!(
            builder.get_content_nodes(&Content::from("just text"), false, None),
            Err(Error::EmptyResult)
        ));
        assert!(matches!(
            builder.get_content_nodes(&Content::from("<a><b></a>"), true, None),
            Err(Error::EmptyResult)
        ));
        let callback = Content::callback(|_, _, _| Content::from("<a/>"));
        assert!(matches!(
            builder.get_content_nodes(&callback, true, None),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_callback_content_sees_target() {
        let nodes = nodes("<r><p>old <b>x</b></p></r>");
        let builder = Builder::new(&nodes);
        let p = nodes.document().borrow().first_child(root_of(&nodes)).unwrap();
        let callback = Content::callback(|target, index, inner| {
            Content::from(format!(
                "<seen name='{}' index='{index}'>{inner}</seen>",
                target.name().unwrap_or_default()
            ))
        });
        let element = builder.get_content_element_for(&callback, p, 3).unwrap();
        assert_eq!(
            xml_of(&nodes, element),
            r#"<seen name="p" index="3">old <b>x</b></seen>"#
        );
    }

    #[test]
    fn test_fragment_loader_lookup() {
        let nodes = nodes("<r/>");
        let builder = Builder::new(&nodes);
        assert!(matches!(
            builder.get_fragment("<a/>", "application/json", true, None),
            Err(Error::InvalidFragmentLoader(ref t)) if t == "application/json"
        ));
        assert!(builder.get_fragment("", "xml", true, None).unwrap().is_empty());
        let html = builder.get_fragment("<P>one<br>", "text/html", true, None).unwrap();
        assert_eq!(xml_of(&nodes, html[0]), "<p>one<br/></p>");
    }

    #[test]
    fn test_custom_loader() {
        struct Shouting;
        impl Loader for Shouting {
            fn load(&self, source: &str, options: &ParseOptions) -> Result<Document, ParseError> {
                crate::loader::xml::parse_document(source, options)
            }
            fn load_fragment(&self, markup: &str, options: &ParseOptions) -> Option<Fragment> {
                crate::loader::xml::parse_fragment(&markup.to_uppercase(), options).ok()
            }
        }
        let shared = SharedDocument::new(Document::parse_str("<r/>").unwrap());
        let nodes = Nodes::with_document(
            shared,
            Config::default()
                .content_type("shout")
                .loader("shout", Rc::new(Shouting)),
        );
        let element = Builder::new(&nodes)
            .get_content_element(&Content::from("<hey/>"))
            .unwrap();
        assert_eq!(xml_of(&nodes, element), "<HEY/>");
    }

    #[test]
    fn test_inner_xml_skips_blank_text_and_comments() {
        let nodes = nodes("<r>\n  <a/>\n  text <!--c--><b>x</b>\n</r>");
        let inner = Builder::new(&nodes).get_inner_xml(root_of(&nodes));
        assert_eq!(inner, "<a/>\n  text <b>x</b>");
    }

    #[test]
    fn test_wrapper_nodes() {
        let nodes = nodes(r#"<r><div class="outer"><div class="inner"/></div><em/></r>"#);
        let builder = Builder::new(&nodes);
        let (outer, em) = {
            let doc = nodes.document().borrow();
            let root = doc.root_element().unwrap();
            (doc.first_child(root).unwrap(), doc.last_child(root).unwrap())
        };

        let mut simple = false;
        let (target, wrapper) = builder.get_wrapper_nodes(outer, &mut simple);
        assert!(!simple);
        assert_ne!(wrapper, outer);
        assert_eq!(
            nodes.document().borrow().attribute(target, "class"),
            Some("inner")
        );

        let mut simple = false;
        let (target, wrapper) = builder.get_wrapper_nodes(em, &mut simple);
        assert!(simple);
        assert_eq!(target, wrapper);

        let mut simple = true;
        let (target, wrapper) = builder.get_wrapper_nodes(outer, &mut simple);
        assert_eq!(target, wrapper);
    }

    #[test]
    fn test_wrapper_search_respects_depth_budget() {
        let shared = SharedDocument::new(Document::parse_str("<a><b><c><d/></c></b></a>").unwrap());
        let a = shared.borrow().root_element().unwrap();
        let nodes = Nodes::with_document(shared, Config::default().max_depth(2));
        let mut simple = false;
        let (target, wrapper) = Builder::new(&nodes).get_wrapper_nodes(a, &mut simple);
        assert!(simple);
        assert_eq!(target, wrapper);
    }
}
