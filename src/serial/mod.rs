//! XML and HTML serialization.
//!
//! Serializes nodes of a `Document` back to markup. XML syntax self-closes
//! empty elements (`<b/>`); HTML syntax leaves void elements unclosed and
//! gives every other element an end tag. Raw-text elements (`script`,
//! `style`) keep their content unescaped in HTML syntax.

use crate::loader::html::{is_raw_text_element, is_void_element};
use crate::tree::{Document, NodeId, NodeKind};

/// The markup syntax to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Syntax {
    /// XML syntax.
    #[default]
    Xml,
    /// HTML syntax.
    Html,
}

impl Syntax {
    /// Picks the syntax for a content type: `html` and `text/html` are
    /// HTML, everything else is XML.
    #[must_use]
    pub fn for_content_type(content_type: &str) -> Self {
        let lower = content_type.to_ascii_lowercase();
        if lower == "html" || lower.starts_with("text/html") {
            Self::Html
        } else {
            Self::Xml
        }
    }
}

/// Serializes a node and its subtree as XML.
///
/// # Examples
///
/// ```
/// use fluentxml::Document;
/// use fluentxml::serial::serialize_node;
///
/// let doc = Document::parse_str("<p><b/>text</p>").unwrap();
/// let p = doc.root_element().unwrap();
/// assert_eq!(serialize_node(&doc, p), "<p><b/>text</p>");
/// ```
#[must_use]
pub fn serialize_node(doc: &Document, id: NodeId) -> String {
    serialize_node_as(doc, id, Syntax::Xml)
}

/// Serializes a node and its subtree in the given syntax.
#[must_use]
pub fn serialize_node_as(doc: &Document, id: NodeId, syntax: Syntax) -> String {
    let mut out = String::new();
    write_node(doc, id, syntax, false, &mut out);
    out
}

/// Serializes several nodes, concatenated in order.
#[must_use]
pub fn serialize_nodes(doc: &Document, ids: &[NodeId], syntax: Syntax) -> String {
    let mut out = String::new();
    for &id in ids {
        write_node(doc, id, syntax, false, &mut out);
    }
    out
}

/// Serializes a whole document. XML output starts with an XML declaration;
/// both syntaxes end with a newline.
#[must_use]
pub fn serialize_document(doc: &Document, syntax: Syntax) -> String {
    let mut out = String::new();
    if syntax == Syntax::Xml {
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    }
    for child in doc.children(doc.root()) {
        write_node(doc, child, syntax, false, &mut out);
    }
    out.push('\n');
    out
}

fn write_node(doc: &Document, id: NodeId, syntax: Syntax, raw_text: bool, out: &mut String) {
    match doc.kind(id) {
        NodeKind::Document | NodeKind::Fragment => {
            for child in doc.children(id) {
                write_node(doc, child, syntax, false, out);
            }
        }
        NodeKind::Element {
            name,
            prefix,
            attributes,
            ..
        } => {
            let qname = match prefix {
                Some(prefix) => format!("{prefix}:{name}"),
                None => name.clone(),
            };
            out.push('<');
            out.push_str(&qname);
            for attr in attributes {
                out.push(' ');
                out.push_str(&attr.qualified_name());
                out.push_str("=\"");
                write_escaped(out, &attr.value, true);
                out.push('"');
            }

            if doc.first_child(id).is_none() {
                match syntax {
                    Syntax::Xml => out.push_str("/>"),
                    Syntax::Html if is_void_element(&qname) => out.push('>'),
                    Syntax::Html => {
                        out.push_str("></");
                        out.push_str(&qname);
                        out.push('>');
                    }
                }
                return;
            }

            out.push('>');
            let raw = syntax == Syntax::Html && is_raw_text_element(&qname);
            for child in doc.children(id) {
                write_node(doc, child, syntax, raw, out);
            }
            out.push_str("</");
            out.push_str(&qname);
            out.push('>');
        }
        NodeKind::Text { content } => {
            if raw_text {
                out.push_str(content);
            } else {
                write_escaped(out, content, false);
            }
        }
        NodeKind::CData { content } => match syntax {
            Syntax::Xml => {
                out.push_str("<![CDATA[");
                out.push_str(content);
                out.push_str("]]>");
            }
            Syntax::Html if raw_text => out.push_str(content),
            Syntax::Html => write_escaped(out, content, false),
        },
        NodeKind::Comment { content } => {
            out.push_str("<!--");
            out.push_str(content);
            out.push_str("-->");
        }
        NodeKind::ProcessingInstruction { target, data } => {
            out.push_str("<?");
            out.push_str(target);
            if let Some(data) = data {
                out.push(' ');
                out.push_str(data);
            }
            out.push_str(if syntax == Syntax::Xml { "?>" } else { ">" });
        }
    }
}

/// Escapes `&`, `<` and `>`; attribute values also escape `"`.
fn write_escaped(out: &mut String, text: &str, attribute: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}
