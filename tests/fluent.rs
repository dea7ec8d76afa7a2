//! End-to-end use of the fluent API: loading, chained traversal and
//! mutation, namespaces, HTML documents and custom loaders.

#![allow(clippy::unwrap_used)]

use std::rc::Rc;

use fluentxml::loader::{Fragment, Loader, ParseOptions};
use fluentxml::xpath::XPathValue;
use fluentxml::{Config, Content, Document, Error, Node, Nodes};
use pretty_assertions::assert_eq;

const CATALOG: &str = r#"<?xml version="1.0"?>
<!DOCTYPE catalog>
<catalog xmlns:p="urn:price">
  <book id="b1" lang="en">
    <title>Rust</title>
    <p:price>30</p:price>
  </book>
  <book id="b2" lang="de">
    <title>XML</title>
    <p:price>20</p:price>
  </book>
  <magazine id="m1">
    <title>Weekly</title>
  </magazine>
</catalog>"#;

fn catalog() -> Nodes {
    Nodes::load(CATALOG, "text/xml").unwrap()
}

fn ids(nodes: &Nodes) -> Vec<String> {
    nodes.map(|node, _| node.attribute("id").unwrap_or_default())
}

fn body(doc: &Nodes) -> String {
    doc.find("/*").unwrap().get(0).unwrap().to_xml()
}

#[test]
fn test_chained_traversal() {
    let doc = catalog();
    let titles = doc
        .find("//book")
        .unwrap()
        .filter("@lang = 'de'")
        .unwrap()
        .children(Some("self::title"))
        .unwrap();
    assert_eq!(titles.text(), "XML");

    let book = titles.parent().unwrap();
    assert_eq!(ids(&book), vec!["b2"]);
    assert_eq!(ids(&book.prev(None).unwrap()), vec!["b1"]);
    assert_eq!(ids(&book.next(None).unwrap()), vec!["m1"]);
    assert_eq!(ids(&book.siblings(None).unwrap()), vec!["b1", "m1"]);
    assert_eq!(book.index(), Some(1));

    // Walking back along the chain.
    assert!(book.end().ptr_eq(&titles));
    assert_eq!(titles.end().len(), 1);
    assert_eq!(titles.end().end().len(), 2);
    assert!(titles.end().end().end().ptr_eq(&doc));
}

#[test]
fn test_namespaces() {
    let doc = catalog();
    assert!(matches!(doc.find("//p:price"), Err(Error::XPath(_))));

    doc.register_namespace("p", "urn:price");
    let prices = doc.find("//p:price").unwrap();
    assert_eq!(prices.text(), "3020");

    let config = Config::default().namespace("q", "urn:price");
    let other = Nodes::load_with(CATALOG, config).unwrap();
    assert_eq!(other.find("//q:price").unwrap().len(), 2);
}

#[test]
fn test_index_helpers() {
    let doc = catalog();
    let items = doc.find("/catalog/*").unwrap();
    assert_eq!(items.index_of_expression("self::magazine").unwrap(), Some(2));
    assert_eq!(items.index_of_expression("self::none").unwrap(), None);
    let second = items.get(1).unwrap();
    assert_eq!(items.index_of(&second), Some(1));
    assert_eq!(doc.index(), None);
}

#[test]
fn test_evaluate_scalars() {
    let doc = catalog();
    let value = doc.evaluate("sum(//*[local-name() = 'price'])", None).unwrap();
    assert_eq!(value.to_number(), 50.0);
    let book = doc.find("//book[1]").unwrap();
    let title = doc.evaluate("string(title)", Some(book.ids()[0])).unwrap();
    assert_eq!(title, XPathValue::String("Rust".to_string()));
}

#[test]
fn test_restructure_catalog() {
    let doc = catalog();
    let books = doc.find("//book").unwrap();
    books.wrap_all("<books/>").unwrap();
    doc.find("//magazine").unwrap().remove(None).unwrap();
    doc.find("//title")
        .unwrap()
        .set_attr("kind", "main")
        .unwrap();
    doc.find("//book[@lang = 'de']")
        .unwrap()
        .append_to("//books")
        .unwrap();

    let order: Vec<String> = doc
        .find("//book")
        .unwrap()
        .map(|node, _| node.attribute("id").unwrap_or_default());
    assert_eq!(order, vec!["b1", "b2"]);
    assert_eq!(doc.find("//books/*").unwrap().len(), 2);
    assert!(doc.find("//magazine").unwrap().is_empty());
    assert_eq!(doc.find("//title[@kind = 'main']").unwrap().len(), 2);
}

#[test]
fn test_content_callback_reads_document() {
    let doc = catalog();
    let books = doc.find("//book").unwrap();
    let observer = doc.clone();
    books
        .prepend(Content::callback(move |node: &Node, index, _: &str| {
            let total = observer.find("//book").map(|b| b.len()).unwrap_or(0);
            let id = node.attribute("id").unwrap_or_default();
            Content::from(format!("<n pos='{index}' of='{total}' for='{id}'/>"))
        }))
        .unwrap();
    let notes = doc.find("//n").unwrap();
    assert_eq!(
        notes.map(|node, _| node.attribute("for").unwrap_or_default()),
        vec!["b1", "b2"]
    );
    assert_eq!(notes.last().attr("pos").as_deref(), Some("1"));
    assert_eq!(notes.attr("of").as_deref(), Some("2"));
}

#[test]
fn test_nodes_from_another_document_are_imported() {
    let doc = Nodes::load("<r><a/></r>", "xml").unwrap();
    let other = Nodes::load("<x><y>copy</y></x>", "xml").unwrap();
    let y = other.find("//y").unwrap();
    doc.find("//a").unwrap().append(&y).unwrap();
    assert_eq!(body(&doc), "<r><a><y>copy</y></a></r>");
    assert_eq!(body(&other), "<x><y>copy</y></x>");
}

#[test]
fn test_html_document() {
    let doc = Nodes::load(
        "<div class=box><P>One<br>two<p>Three &amp; <b>four</div>",
        "text/html",
    )
    .unwrap();
    let paragraphs = doc.find("//p").unwrap();
    assert_eq!(paragraphs.len(), 2);
    paragraphs.first().append("<img src=x.png>").unwrap();
    assert_eq!(
        doc.to_string(),
        "<div class=\"box\"><p>One<br>two<img src=\"x.png\"></p><p>Three &amp; <b>four</b></p></div>\n"
    );
    assert_eq!(paragraphs.last().xml(), "Three &amp; <b>four</b>");
}

#[test]
fn test_load_bytes_with_bom() {
    let mut bytes = vec![0xFF, 0xFE];
    for unit in "<r>\u{e9}</r>".encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    let doc = Nodes::load_bytes(&bytes, "text/xml").unwrap();
    assert_eq!(doc.find("/r").unwrap().text(), "\u{e9}");
}

/// Treats every line of the input as a `<line>` element.
#[derive(Debug)]
struct Lines;

impl Loader for Lines {
    fn load(
        &self,
        source: &str,
        _options: &ParseOptions,
    ) -> Result<Document, fluentxml::error::ParseError> {
        let mut doc = Document::new();
        let root = doc.root();
        let lines = doc.create_element("lines");
        doc.append_child(root, lines);
        for line in source.lines() {
            let element = doc.create_element("line");
            let text = doc.create_text(line);
            doc.append_child(element, text);
            doc.append_child(lines, element);
        }
        Ok(doc)
    }

    fn load_fragment(&self, markup: &str, options: &ParseOptions) -> Option<Fragment> {
        let document = self.load(markup, options).ok()?;
        let root = document.root_element()?;
        Some(Fragment { document, root })
    }
}

#[test]
fn test_custom_loader() {
    let config = Config::default()
        .loader("text/plain", Rc::new(Lines))
        .content_type("text/plain");
    let doc = Nodes::load_with("alpha\nbeta", config).unwrap();
    let lines = doc.find("//line").unwrap();
    assert_eq!(lines.map(|node, _| node.text_content()), vec!["alpha", "beta"]);

    doc.find("/lines").unwrap().append("gamma").unwrap();
    assert_eq!(doc.find("//line").unwrap().len(), 3);
}

#[test]
fn test_unknown_content_type() {
    let doc = Nodes::load_with("<r/>", Config::default()).unwrap();
    let r = doc.find("/r").unwrap();
    assert_eq!(r.append(Content::from("<b/>")).unwrap().len(), 1);
    let config = Config::default().content_type("application/json");
    assert!(matches!(
        Nodes::load_with("{}", config),
        Err(Error::InvalidFragmentLoader(_))
    ));
}

#[test]
fn test_depth_budget() {
    let deep = format!("{}{}", "<a>".repeat(20), "</a>".repeat(20));
    let config = Config::default().max_depth(10);
    assert!(matches!(
        Nodes::load_with(&deep, config),
        Err(Error::Parse(_))
    ));
    assert!(Nodes::load(&deep, "xml").is_ok());
}
