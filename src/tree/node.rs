//! Node type definitions.
//!
//! The `NodeKind` enum carries the node-type-specific payload (element name
//! and attributes, text content, ...). Navigation links live in `NodeData`.

use super::Attribute;

/// The kind of a tree node and its associated data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The document node. There is exactly one per `Document`.
    Document,

    /// A transient container of sibling nodes, e.g. a parsed fragment or a
    /// copied document node.
    Fragment,

    /// An element node, e.g., `<div class="x">`.
    Element {
        /// The element's local name.
        name: String,
        /// Namespace prefix (e.g., `"svg"` in `svg:rect`), if any.
        prefix: Option<String>,
        /// Namespace URI after resolution, if any.
        namespace: Option<String>,
        /// Attributes on this element, including namespace declarations.
        attributes: Vec<Attribute>,
    },

    /// A text node containing character data.
    Text {
        /// The text content (entity and character references resolved).
        content: String,
    },

    /// A CDATA section, e.g., `<![CDATA[...]]>`.
    CData {
        /// The CDATA content (no escaping applied).
        content: String,
    },

    /// A comment node, e.g., `<!-- ... -->`.
    Comment {
        /// The comment text (without the `<!--` and `-->` delimiters).
        content: String,
    },

    /// A processing instruction, e.g., `<?target data?>`.
    ProcessingInstruction {
        /// The PI target (e.g., `"xml-stylesheet"`).
        target: String,
        /// The PI data, if any.
        data: Option<String>,
    },
}

impl NodeKind {
    /// Creates an element kind without namespace information.
    #[must_use]
    pub fn element(name: &str) -> Self {
        let (prefix, local) = match name.split_once(':') {
            Some((prefix, local)) => (Some(prefix.to_string()), local),
            None => (None, name),
        };
        Self::Element {
            name: local.to_string(),
            prefix,
            namespace: None,
            attributes: Vec::new(),
        }
    }

    /// Creates a text kind.
    #[must_use]
    pub fn text(content: &str) -> Self {
        Self::Text {
            content: content.to_string(),
        }
    }

    /// Short lowercase name of the kind, used in diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Fragment => "fragment",
            Self::Element { .. } => "element",
            Self::Text { .. } => "text",
            Self::CData { .. } => "cdata",
            Self::Comment { .. } => "comment",
            Self::ProcessingInstruction { .. } => "processing-instruction",
        }
    }
}
