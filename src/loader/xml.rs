//! XML parser.
//!
//! A small recursive descent parser covering what the node-set engine
//! consumes: elements, attributes, namespace scopes, character and
//! predefined entity references, CDATA sections, comments and processing
//! instructions. The XML declaration and any DOCTYPE are skipped; DTDs are
//! not interpreted.
//!
//! Nesting is bounded by [`ParseOptions::max_depth`]. Exceeding it is a
//! parse error, never a stack overflow.

use crate::error::ParseError;
use crate::tree::{Attribute, Document, NodeId, NodeKind};

use super::{Fragment, ParseOptions};

/// The namespace bound to the `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Parses a complete XML document with exactly one root element.
///
/// # Errors
///
/// Returns [`ParseError`] if the input is not well-formed, uses an unbound
/// namespace prefix, or nests deeper than the depth budget.
pub fn parse_document(input: &str, options: &ParseOptions) -> Result<Document, ParseError> {
    let input = normalize_newlines(input);
    let mut parser = XmlParser::new(&input, options);
    let root = parser.doc.root();
    parser.skip_prolog()?;
    parser.parse_content(root, 0)?;
    if !parser.at_end() {
        return Err(parser.error("unexpected end tag"));
    }
    let elements = parser.doc.element_children(root).count();
    if elements != 1 {
        let message = if elements == 0 {
            "document has no root element"
        } else {
            "document has more than one root element"
        };
        return Err(parser.error(message));
    }
    let stray_text = parser
        .doc
        .children(root)
        .any(|id| parser.doc.is_text(id) && !parser.doc.is_blank_text(id));
    if stray_text {
        return Err(parser.error("text outside the root element"));
    }
    // Whitespace around the root element carries no content.
    let blanks: Vec<NodeId> = parser
        .doc
        .children(root)
        .filter(|&id| parser.doc.is_blank_text(id))
        .collect();
    for id in blanks {
        parser.doc.detach(id);
    }
    Ok(parser.doc)
}

/// Parses XML content (any mix of elements, text, comments, ...) into a
/// fragment.
///
/// # Errors
///
/// Returns [`ParseError`] if the content is not well-formed.
pub fn parse_fragment(input: &str, options: &ParseOptions) -> Result<Fragment, ParseError> {
    let input = normalize_newlines(input);
    let mut parser = XmlParser::new(&input, options);
    let root = parser.doc.create_node(NodeKind::Fragment);
    parser.skip_declaration()?;
    parser.parse_content(root, 0)?;
    if !parser.at_end() {
        return Err(parser.error("unexpected end tag"));
    }
    Ok(Fragment {
        document: parser.doc,
        root,
    })
}

fn normalize_newlines(input: &str) -> String {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    if input.contains('\r') {
        input.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        input.to_string()
    }
}

/// Namespace bindings declared on one element.
type Scope = Vec<(Option<String>, Option<String>)>;

struct XmlParser<'a> {
    input: &'a str,
    pos: usize,
    options: &'a ParseOptions,
    doc: Document,
    scopes: Vec<Scope>,
}

impl<'a> XmlParser<'a> {
    fn new(input: &'a str, options: &'a ParseOptions) -> Self {
        Self {
            input,
            pos: 0,
            options,
            doc: Document::new(),
            scopes: Vec::new(),
        }
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError::at(self.input, self.pos, message)
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn looking_at(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn expect(&mut self, s: &str) -> Result<(), ParseError> {
        if self.looking_at(s) {
            self.pos += s.len();
            Ok(())
        } else {
            Err(self.error(&format!("expected `{s}`")))
        }
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        let trimmed = self.rest().trim_start_matches([' ', '\t', '\n']);
        self.pos = self.input.len() - trimmed.len();
        self.pos > start
    }

    /// Reads up to (not including) `terminator` and moves past it.
    fn take_until(&mut self, terminator: &str, what: &str) -> Result<&'a str, ParseError> {
        let Some(offset) = self.rest().find(terminator) else {
            return Err(self.error(&format!("unterminated {what}")));
        };
        let text = &self.rest()[..offset];
        self.pos += offset + terminator.len();
        Ok(text)
    }

    fn parse_name(&mut self) -> Result<String, ParseError> {
        let rest = self.rest();
        let mut end = 0;
        for (i, c) in rest.char_indices() {
            let ok = if i == 0 {
                is_name_start_char(c)
            } else {
                is_name_char(c)
            };
            if !ok {
                break;
            }
            end = i + c.len_utf8();
        }
        if end == 0 {
            return Err(self.error("expected a name"));
        }
        self.pos += end;
        Ok(rest[..end].to_string())
    }

    // --- Prolog ---

    fn skip_declaration(&mut self) -> Result<(), ParseError> {
        if self.looking_at("<?xml")
            && self
                .input
                .get(self.pos + 5..self.pos + 6)
                .is_some_and(|c| c.trim().is_empty())
        {
            self.take_until("?>", "XML declaration")?;
        }
        Ok(())
    }

    fn skip_prolog(&mut self) -> Result<(), ParseError> {
        self.skip_declaration()?;
        loop {
            self.skip_whitespace();
            if self.looking_at("<!DOCTYPE") {
                self.skip_doctype()?;
            } else {
                return Ok(());
            }
        }
    }

    fn skip_doctype(&mut self) -> Result<(), ParseError> {
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        for (i, c) in self.rest().char_indices() {
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '"' | '\'') => quote = Some(c),
                (None, '[') => depth += 1,
                (None, ']') => depth = depth.saturating_sub(1),
                (None, '>') if depth == 0 => {
                    self.pos += i + 1;
                    return Ok(());
                }
                _ => {}
            }
        }
        Err(self.error("unterminated DOCTYPE"))
    }

    // --- Content ---

    /// Parses content into `parent` until an end tag or the end of input.
    fn parse_content(&mut self, parent: NodeId, depth: usize) -> Result<(), ParseError> {
        loop {
            if self.at_end() || self.looking_at("</") {
                return Ok(());
            }
            if self.looking_at("<!--") {
                self.pos += 4;
                let content = self.take_until("-->", "comment")?;
                let id = self.doc.create_node(NodeKind::Comment {
                    content: content.to_string(),
                });
                self.doc.append_child(parent, id);
            } else if self.looking_at("<![CDATA[") {
                self.pos += 9;
                let content = self.take_until("]]>", "CDATA section")?;
                let id = self.doc.create_node(NodeKind::CData {
                    content: content.to_string(),
                });
                self.doc.append_child(parent, id);
            } else if self.looking_at("<?") {
                self.parse_pi(parent)?;
            } else if self.looking_at("<!") {
                return Err(self.error("markup declarations are only allowed in the prolog"));
            } else if self.looking_at("<") {
                self.parse_element(parent, depth + 1)?;
            } else {
                self.parse_text(parent)?;
            }
        }
    }

    fn parse_pi(&mut self, parent: NodeId) -> Result<(), ParseError> {
        self.pos += 2;
        let target = self.parse_name()?;
        if target.eq_ignore_ascii_case("xml") {
            return Err(self.error("XML declaration not at the start of the input"));
        }
        self.skip_whitespace();
        let data = self.take_until("?>", "processing instruction")?;
        let id = self.doc.create_node(NodeKind::ProcessingInstruction {
            target,
            data: (!data.is_empty()).then(|| data.to_string()),
        });
        self.doc.append_child(parent, id);
        Ok(())
    }

    fn parse_text(&mut self, parent: NodeId) -> Result<(), ParseError> {
        let end = self.rest().find('<').unwrap_or(self.rest().len());
        let raw = &self.rest()[..end];
        if raw.contains("]]>") {
            return Err(self.error("`]]>` is not allowed in text"));
        }
        let text = self.decode_entities(raw)?;
        self.pos += end;
        if self.options.no_blanks && text.trim().is_empty() {
            return Ok(());
        }
        let id = self.doc.create_text(&text);
        self.doc.append_child(parent, id);
        Ok(())
    }

    fn parse_element(&mut self, parent: NodeId, depth: usize) -> Result<(), ParseError> {
        if depth > self.options.max_depth {
            return Err(self.error("maximum nesting depth exceeded"));
        }
        self.pos += 1;
        let qname = self.parse_name()?;

        let mut raw_attributes: Vec<(String, String)> = Vec::new();
        let self_closing = loop {
            let had_space = self.skip_whitespace();
            if self.looking_at("/>") {
                self.pos += 2;
                break true;
            }
            if self.looking_at(">") {
                self.pos += 1;
                break false;
            }
            if self.at_end() {
                return Err(self.error(&format!("unterminated start tag <{qname}>")));
            }
            if !had_space {
                return Err(self.error("expected whitespace between attributes"));
            }
            let name = self.parse_name()?;
            self.skip_whitespace();
            self.expect("=")?;
            self.skip_whitespace();
            let value = self.parse_attribute_value()?;
            if raw_attributes.iter().any(|(n, _)| *n == name) {
                return Err(self.error(&format!("duplicate attribute `{name}`")));
            }
            raw_attributes.push((name, value));
        };

        let scope: Scope = raw_attributes
            .iter()
            .filter_map(|(name, value)| {
                let uri = (!value.is_empty()).then(|| value.clone());
                if name == "xmlns" {
                    Some((None, uri))
                } else {
                    name.strip_prefix("xmlns:")
                        .map(|prefix| (Some(prefix.to_string()), uri))
                }
            })
            .collect();
        self.scopes.push(scope);

        let (prefix, local) = split_name(&qname);
        let namespace = self.resolve_element(prefix)?;
        let mut attributes = Vec::with_capacity(raw_attributes.len());
        for (name, value) in &raw_attributes {
            let mut attr = Attribute::new(name, value);
            if !attr.is_namespace_declaration() {
                if let Some(prefix) = attr.prefix.clone() {
                    attr.namespace = Some(self.resolve_prefix(&prefix)?);
                }
            }
            attributes.push(attr);
        }

        let element = self.doc.create_node(NodeKind::Element {
            name: local.to_string(),
            prefix: prefix.map(str::to_string),
            namespace,
            attributes,
        });
        self.doc.append_child(parent, element);

        if !self_closing {
            self.parse_content(element, depth)?;
            if !self.looking_at("</") {
                return Err(self.error(&format!("element <{qname}> is not closed")));
            }
            self.pos += 2;
            let end_name = self.parse_name()?;
            if end_name != qname {
                return Err(self.error(&format!(
                    "end tag </{end_name}> does not match <{qname}>"
                )));
            }
            self.skip_whitespace();
            self.expect(">")?;
        }
        self.scopes.pop();
        Ok(())
    }

    fn parse_attribute_value(&mut self) -> Result<String, ParseError> {
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.error("expected a quoted attribute value")),
        };
        self.pos += 1;
        let Some(end) = self.rest().find(quote) else {
            return Err(self.error("unterminated attribute value"));
        };
        let raw = &self.rest()[..end];
        if raw.contains('<') {
            return Err(self.error("`<` is not allowed in attribute values"));
        }
        let value = self.decode_entities(raw)?;
        self.pos += end + 1;
        Ok(value.replace(['\t', '\n'], " "))
    }

    fn decode_entities(&self, raw: &str) -> Result<String, ParseError> {
        if !raw.contains('&') {
            return Ok(raw.to_string());
        }
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;
        while let Some(amp) = rest.find('&') {
            out.push_str(&rest[..amp]);
            let after = &rest[amp + 1..];
            let Some(semi) = after.find(';') else {
                return Err(self.error("unterminated entity reference"));
            };
            let name = &after[..semi];
            match decode_reference(name) {
                Some(c) => out.push(c),
                None => return Err(self.error(&format!("undefined entity `&{name};`"))),
            }
            rest = &after[semi + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    // --- Namespaces ---

    fn lookup(&self, prefix: Option<&str>) -> Option<Option<String>> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|(p, _)| p.as_deref() == prefix)
            .map(|(_, uri)| uri.clone())
    }

    fn resolve_element(&self, prefix: Option<&str>) -> Result<Option<String>, ParseError> {
        match prefix {
            None => Ok(self.lookup(None).flatten()),
            Some(prefix) => self.resolve_prefix(prefix).map(Some),
        }
    }

    fn resolve_prefix(&self, prefix: &str) -> Result<String, ParseError> {
        if prefix == "xml" {
            return Ok(XML_NAMESPACE.to_string());
        }
        self.lookup(Some(prefix))
            .flatten()
            .ok_or_else(|| self.error(&format!("namespace prefix `{prefix}` is not bound")))
    }
}

/// Decodes the body of an entity or character reference.
fn decode_reference(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let digits = name.strip_prefix('#')?;
            let code = match digits.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => digits.parse().ok()?,
            };
            char::from_u32(code).filter(|&c| c != '\0')
        }
    }
}

fn split_name(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

pub(crate) fn is_name_start_char(c: char) -> bool {
    c == '_' || c == ':' || c.is_alphabetic()
}

pub(crate) fn is_name_char(c: char) -> bool {
    is_name_start_char(c) || c == '-' || c == '.' || c.is_alphanumeric()
}
