//! Lenient HTML parser.
//!
//! Not an HTML5 tree builder: it keeps an explicit stack of open elements
//! and applies the handful of rules that make everyday markup come out
//! right.
//!
//! - Tag and attribute names are lower-cased.
//! - Attribute values may be unquoted or missing.
//! - Void elements never take children; `script` and `style` content is raw
//!   text.
//! - `p`, `li`, `option`, `tr`, `td`, `th`, `dt` and `dd` are closed
//!   implicitly, and block-level start tags close an open paragraph.
//! - End tags without a matching open element are ignored, and elements
//!   still open at the end of input are closed.
//!
//! Comments are kept; doctypes and processing instructions are skipped.
//! The only hard failure is nesting deeper than the depth budget.

use crate::error::ParseError;
use crate::tree::{Attribute, Document, NodeId, NodeKind};

use super::{Fragment, ParseOptions};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Start tags that close an open `p`.
const CLOSES_PARAGRAPH: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "details",
    "div",
    "dl",
    "fieldset",
    "figure",
    "footer",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "main",
    "menu",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "ul",
];

/// Elements a paragraph cannot be closed across.
const PARAGRAPH_SCOPE: &[&str] = &["button", "table", "td", "th", "caption", "object"];

/// Returns `true` for elements that never have content (`br`, `img`, ...).
#[must_use]
pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name.to_ascii_lowercase().as_str())
}

/// Returns `true` for elements whose content is raw text.
#[must_use]
pub fn is_raw_text_element(name: &str) -> bool {
    name.eq_ignore_ascii_case("script") || name.eq_ignore_ascii_case("style")
}

/// Parses an HTML document.
///
/// # Errors
///
/// Returns [`ParseError`] only if elements nest deeper than the depth
/// budget.
///
/// # Examples
///
/// ```
/// use fluentxml::loader::{html, ParseOptions};
///
/// let doc = html::parse_document("<UL><li>one<li>two</UL>", &ParseOptions::default()).unwrap();
/// let ul = doc.root_element().unwrap();
/// assert_eq!(doc.node_name(ul), Some("ul"));
/// assert_eq!(doc.element_children(ul).count(), 2);
/// ```
pub fn parse_document(input: &str, options: &ParseOptions) -> Result<Document, ParseError> {
    let doc = Document::new();
    let root = doc.root();
    let mut parser = HtmlParser::new(input, options, doc, root);
    parser.run()?;
    let mut doc = parser.doc;
    let blanks: Vec<NodeId> = doc
        .children(root)
        .filter(|&id| doc.is_blank_text(id))
        .collect();
    for id in blanks {
        doc.detach(id);
    }
    Ok(doc)
}

/// Parses HTML content into a fragment.
///
/// # Errors
///
/// Returns [`ParseError`] only if elements nest deeper than the depth
/// budget.
pub fn parse_fragment(input: &str, options: &ParseOptions) -> Result<Fragment, ParseError> {
    let mut doc = Document::new();
    let root = doc.create_node(NodeKind::Fragment);
    let mut parser = HtmlParser::new(input, options, doc, root);
    parser.run()?;
    Ok(Fragment {
        document: parser.doc,
        root,
    })
}

struct HtmlParser<'a> {
    input: &'a str,
    pos: usize,
    options: &'a ParseOptions,
    doc: Document,
    /// Open elements; the bottom entry is the container being filled.
    stack: Vec<NodeId>,
}

impl<'a> HtmlParser<'a> {
    fn new(input: &'a str, options: &'a ParseOptions, doc: Document, container: NodeId) -> Self {
        let input = input.strip_prefix('\u{feff}').unwrap_or(input);
        Self {
            input,
            pos: 0,
            options,
            doc,
            stack: vec![container],
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn current(&self) -> NodeId {
        self.stack.last().copied().unwrap_or_else(|| self.doc.root())
    }

    fn run(&mut self) -> Result<(), ParseError> {
        while self.pos < self.input.len() {
            let rest = self.rest();
            if rest.starts_with("<!--") {
                self.comment();
            } else if rest.starts_with("<!") || rest.starts_with("<?") {
                self.skip_past('>');
            } else if rest.starts_with("</") && starts_with_letter(&rest[2..]) {
                self.end_tag();
            } else if rest.starts_with('<') && starts_with_letter(&rest[1..]) {
                self.start_tag()?;
            } else {
                self.text();
            }
        }
        Ok(())
    }

    fn skip_past(&mut self, c: char) {
        self.pos = match self.rest().find(c) {
            Some(i) => self.pos + i + c.len_utf8(),
            None => self.input.len(),
        };
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn comment(&mut self) {
        let body = &self.rest()[4..];
        let (content, consumed) = match body.find("-->") {
            Some(end) => (&body[..end], 4 + end + 3),
            None => (body, self.rest().len()),
        };
        let id = self.doc.create_node(NodeKind::Comment {
            content: content.to_string(),
        });
        let parent = self.current();
        self.doc.append_child(parent, id);
        self.pos += consumed;
    }

    fn text(&mut self) {
        let rest = self.rest();
        // A `<` that does not open markup is literal text.
        let end = rest
            .char_indices()
            .skip(1)
            .find(|&(i, c)| c == '<' && opens_markup(&rest[i..]))
            .map_or(rest.len(), |(i, _)| i);
        self.pos += end;
        let text = decode_entities(&rest[..end]);
        self.append_text(&text);
    }

    fn append_text(&mut self, text: &str) {
        if text.is_empty() || (self.options.no_blanks && text.trim().is_empty()) {
            return;
        }
        let parent = self.current();
        if let Some(last) = self.doc.last_child(parent) {
            if let NodeKind::Text { content } = self.doc.kind(last) {
                let merged = format!("{content}{text}");
                self.doc.set_node_text(last, &merged);
                return;
            }
        }
        let id = self.doc.create_text(text);
        self.doc.append_child(parent, id);
    }

    fn read_name(&mut self) -> String {
        let rest = self.rest();
        let end = rest
            .find(|c: char| c.is_whitespace() || matches!(c, '/' | '>' | '=' | '"' | '\''))
            .unwrap_or(rest.len());
        self.pos += end;
        rest[..end].to_ascii_lowercase()
    }

    fn end_tag(&mut self) {
        self.pos += 2;
        let name = self.read_name();
        self.skip_past('>');
        let open = self
            .stack
            .iter()
            .enumerate()
            .skip(1)
            .rev()
            .find(|&(_, &id)| self.doc.node_name(id) == Some(name.as_str()))
            .map(|(i, _)| i);
        if let Some(i) = open {
            self.stack.truncate(i);
        }
    }

    fn start_tag(&mut self) -> Result<(), ParseError> {
        let tag_start = self.pos;
        self.pos += 1;
        let name = self.read_name();
        let mut attributes: Vec<Attribute> = Vec::new();
        let mut self_closing = false;

        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                break;
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break;
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                self_closing = true;
                break;
            }
            if rest.starts_with('/') {
                self.pos += 1;
                continue;
            }
            let attr_name = self.read_name();
            if attr_name.is_empty() {
                // A stray quote or `=`; drop it.
                self.pos += rest.chars().next().map_or(1, char::len_utf8);
                continue;
            }
            self.skip_whitespace();
            let value = if self.rest().starts_with('=') {
                self.pos += 1;
                self.skip_whitespace();
                self.attribute_value()
            } else {
                String::new()
            };
            if !attributes.iter().any(|a| a.qualified_name() == attr_name) {
                attributes.push(Attribute::new(&attr_name, &value));
            }
        }

        self.close_implied(&name);
        if self.stack.len() > self.options.max_depth {
            return Err(ParseError::at(
                self.input,
                tag_start,
                "maximum nesting depth exceeded",
            ));
        }

        let mut kind = NodeKind::element(&name);
        if let NodeKind::Element {
            attributes: slot, ..
        } = &mut kind
        {
            *slot = attributes;
        }
        let element = self.doc.create_node(kind);
        let parent = self.current();
        self.doc.append_child(parent, element);

        if is_void_element(&name) || self_closing {
            return Ok(());
        }
        if is_raw_text_element(&name) {
            self.raw_text(element, &name);
            return Ok(());
        }
        self.stack.push(element);
        Ok(())
    }

    fn attribute_value(&mut self) -> String {
        let rest = self.rest();
        let raw = match rest.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let body = &rest[1..];
                let end = body.find(quote).unwrap_or(body.len());
                self.pos += 1 + end + usize::from(end < body.len());
                &body[..end]
            }
            _ => {
                let end = rest
                    .find(|c: char| c.is_whitespace() || c == '>')
                    .unwrap_or(rest.len());
                self.pos += end;
                &rest[..end]
            }
        };
        decode_entities(raw)
    }

    fn raw_text(&mut self, element: NodeId, name: &str) {
        let rest = self.rest();
        let needle = format!("</{name}");
        let end = rest
            .to_ascii_lowercase()
            .find(&needle)
            .unwrap_or(rest.len());
        if end > 0 {
            let id = self.doc.create_text(&rest[..end]);
            self.doc.append_child(element, id);
        }
        self.pos += end;
        if self.pos < self.input.len() {
            self.skip_past('>');
        }
    }

    /// Closes the elements a start tag `name` ends implicitly.
    fn close_implied(&mut self, name: &str) {
        let (closes, scope): (&[&str], &[&str]) = match name {
            "li" => (&["li"], &["ul", "ol"]),
            "dt" | "dd" => (&["dt", "dd"], &["dl"]),
            "option" => (&["option"], &["select", "datalist"]),
            "tr" => (&["tr", "td", "th"], &["table", "tbody", "thead", "tfoot"]),
            "td" | "th" => (&["td", "th"], &["tr", "table"]),
            _ if CLOSES_PARAGRAPH.contains(&name) => (&["p"], PARAGRAPH_SCOPE),
            _ => return,
        };
        let mut cut = None;
        for (i, &id) in self.stack.iter().enumerate().skip(1).rev() {
            let open = self.doc.node_name(id).unwrap_or_default();
            if closes.contains(&open) {
                cut = Some(i);
            } else if scope.contains(&open) {
                break;
            }
        }
        if let Some(i) = cut {
            self.stack.truncate(i);
        }
    }
}

fn starts_with_letter(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
}

fn opens_markup(s: &str) -> bool {
    let after = &s[1..];
    starts_with_letter(after)
        || after.starts_with('!')
        || after.starts_with('?')
        || (after.starts_with('/') && starts_with_letter(&after[1..]))
}

fn named_entity(name: &str) -> Option<char> {
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        _ => return None,
    })
}

fn numeric_reference(num: &str) -> Option<char> {
    let code = match num.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => num.parse().ok()?,
    };
    char::from_u32(code).filter(|&c| c != '\0')
}

/// Decodes entity references, keeping unknown ones literally.
fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let decoded = after.find(';').and_then(|semi| {
            let name = &after[..semi];
            let c = match name.strip_prefix('#') {
                Some(num) => numeric_reference(num),
                None => named_entity(name),
            };
            c.map(|c| (c, semi))
        });
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &after[semi + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
