//! Fluent selection and manipulation.
//!
//! The methods here are the everyday surface of [`Nodes`]: loading a
//! document, walking it with expressions and changing it. They are thin
//! compositions of the engine parts in [`crate::nodes`].
//!
//! # Quick Start
//!
//! ```
//! use fluentxml::Nodes;
//!
//! let xml = "<items><item index='0'>one</item><item index='1'>two</item></items>";
//! let doc = Nodes::load(xml, "text/xml").unwrap();
//!
//! let items = doc.find("//item").unwrap();
//! assert_eq!(items.len(), 2);
//! assert_eq!(items.last().attr("index").as_deref(), Some("1"));
//!
//! items.set_attr("seen", "yes").unwrap();
//! assert_eq!(doc.find("//item[@seen]").unwrap().len(), 2);
//! ```

mod manipulation;
mod traversal;

use std::cell::RefCell;
use std::fmt;

use tracing::debug;

use crate::encoding::decode_to_utf8;
use crate::error::{Error, Result};
use crate::nodes::{Config, Nodes};
use crate::serial::{serialize_document, Syntax};
use crate::tree::{Node, SharedDocument};
use crate::xpath::parser;

impl Nodes {
    /// Loads a document of the given content type with the default
    /// configuration. The returned selection is empty.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidFragmentLoader`] if no loader handles the type
    /// - [`Error::Parse`] if the source cannot be parsed
    pub fn load(source: &str, content_type: &str) -> Result<Self> {
        Self::load_with(source, Config::default().content_type(content_type))
    }

    /// Loads a document with an explicit configuration, using the loader
    /// registered for `config.content_type`.
    ///
    /// # Errors
    ///
    /// As [`Nodes::load`].
    pub fn load_with(source: &str, config: Config) -> Result<Self> {
        let Some(loader) = config.loaders.get(&config.content_type) else {
            debug!(content_type = %config.content_type, "no loader registered");
            return Err(Error::InvalidFragmentLoader(config.content_type));
        };
        let document = loader.load(source, &config.parse_options())?;
        debug!(
            content_type = %config.content_type,
            nodes = document.node_count(),
            "document loaded"
        );
        Ok(Self::with_document(SharedDocument::new(document), config))
    }

    /// Loads a document from raw bytes, detecting the encoding from a byte
    /// order mark or the XML declaration.
    ///
    /// # Errors
    ///
    /// [`Error::Encoding`] if the bytes cannot be decoded, otherwise as
    /// [`Nodes::load`].
    pub fn load_bytes(bytes: &[u8], content_type: &str) -> Result<Self> {
        let text = decode_to_utf8(bytes)?;
        Self::load(&text, content_type)
    }

    /// The node at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Node> {
        self.ids()
            .get(index)
            .map(|&id| self.document().node(id))
    }

    /// Iterates over the selected nodes.
    pub fn iter(&self) -> impl Iterator<Item = Node> + '_ {
        self.ids().iter().map(|&id| self.document().node(id))
    }

    /// Serializes the whole document in the syntax of the configured
    /// content type.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let syntax = Syntax::for_content_type(&self.config().content_type);
        serialize_document(&self.document().borrow(), syntax)
    }
}

impl fmt::Display for Nodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml())
    }
}

/// Tests nodes against an optional expression from inside infallible
/// callbacks, keeping the first evaluation error for later.
pub(crate) struct Matcher<'a> {
    nodes: &'a Nodes,
    expression: Option<&'a str>,
    error: RefCell<Option<Error>>,
}

impl<'a> Matcher<'a> {
    /// Creates a matcher. A syntax error surfaces here rather than being
    /// deferred.
    pub(crate) fn new(nodes: &'a Nodes, expression: Option<&'a str>) -> Result<Self> {
        if let Some(expression) = expression {
            parser::parse(expression)?;
        }
        Ok(Self {
            nodes,
            expression,
            error: RefCell::new(None),
        })
    }

    /// Returns `true` if the node matches (always, without an expression).
    pub(crate) fn test(&self, node: &Node) -> bool {
        let Some(expression) = self.expression else {
            return true;
        };
        if self.error.borrow().is_some() {
            return false;
        }
        match self.nodes.matches(expression, node.id()) {
            Ok(matched) => matched,
            Err(err) => {
                *self.error.borrow_mut() = Some(err);
                false
            }
        }
    }

    /// Returns the first error seen by [`Matcher::test`].
    pub(crate) fn finish(self) -> Result<()> {
        match self.error.into_inner() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_load_selects_nothing() {
        let doc = Nodes::load("<r><a/></r>", "xml").unwrap();
        assert!(doc.is_empty());
        assert_eq!(doc.config().content_type, "xml");
        assert!(doc.end().ptr_eq(&doc));
    }

    #[test]
    fn test_load_errors() {
        assert!(matches!(
            Nodes::load("<r>", "text/xml"),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            Nodes::load("{}", "application/json"),
            Err(Error::InvalidFragmentLoader(_))
        ));
    }

    #[test]
    fn test_load_bytes_detects_encoding() {
        let bytes = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><r>caf\xE9</r>";
        let doc = Nodes::load_bytes(bytes, "text/xml").unwrap();
        assert_eq!(doc.find("/r").unwrap().text(), "caf\u{e9}");
        assert!(matches!(
            Nodes::load_bytes(b"<r>\xFF</r>", "text/xml"),
            Err(Error::Encoding(_))
        ));
    }

    #[test]
    fn test_load_html() {
        let doc = Nodes::load("<ul><li>one<li>two</ul>", "text/html").unwrap();
        assert_eq!(doc.find("//li").unwrap().len(), 2);
        assert_eq!(doc.to_string(), "<ul><li>one</li><li>two</li></ul>\n");
    }

    #[test]
    fn test_get_and_iter() {
        let doc = Nodes::load("<r><a/><b/></r>", "xml").unwrap();
        let children = doc.find("/r/*").unwrap();
        assert_eq!(children.get(1).and_then(|n| n.name()).as_deref(), Some("b"));
        assert!(children.get(2).is_none());
        let names: Vec<_> = children.iter().filter_map(|n| n.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_display_serializes_document() {
        let doc = Nodes::load("<r><a/></r>", "xml").unwrap();
        assert_eq!(
            doc.to_string(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<r><a/></r>\n"
        );
    }

    #[test]
    fn test_matcher_reports_first_error() {
        let doc = Nodes::load("<r><a/></r>", "xml").unwrap();
        assert!(Matcher::new(&doc, Some("self::[")).is_err());

        let a = doc.find("//a").unwrap();
        let matcher = Matcher::new(&a, Some("self::u:a")).unwrap();
        let node = a.get(0).unwrap();
        assert!(!matcher.test(&node));
        assert!(matches!(matcher.finish(), Err(Error::XPath(_))));

        let always = Matcher::new(&a, None).unwrap();
        assert!(always.test(&node));
        assert!(always.finish().is_ok());
    }
}
