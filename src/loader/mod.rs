//! Document and fragment loaders.
//!
//! A [`Loader`] turns markup into a tree: a whole document with
//! [`Loader::load`], or a transient [`Fragment`] with
//! [`Loader::load_fragment`]. Loaders are registered by content type in a
//! [`Loaders`] registry; lookups are case-insensitive.
//!
//! Two loaders ship with the crate:
//!
//! - [`XmlLoader`] for `xml`, `text/xml` and `application/xml`
//! - [`HtmlLoader`] for `html` and `text/html`

pub mod html;
pub mod xml;

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::error::ParseError;
use crate::tree::{Document, NodeId};

/// Default nesting budget for parsing.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Options controlling how markup is parsed.
///
/// ```
/// use fluentxml::loader::ParseOptions;
///
/// let opts = ParseOptions::default().max_depth(32).no_blanks(true);
/// assert_eq!(opts.max_depth, 32);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Maximum element nesting depth. Deeper input fails to parse.
    pub max_depth: usize,
    /// If true, whitespace-only text nodes are dropped.
    pub no_blanks: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            no_blanks: false,
        }
    }
}

impl ParseOptions {
    /// Sets the maximum element nesting depth.
    #[must_use]
    pub fn max_depth(mut self, max: usize) -> Self {
        self.max_depth = max;
        self
    }

    /// Enables or disables dropping of blank text nodes.
    #[must_use]
    pub fn no_blanks(mut self, yes: bool) -> Self {
        self.no_blanks = yes;
        self
    }
}

/// A transient collection of sibling nodes parsed from a markup string.
///
/// The nodes are the children of `root`, a detached fragment node inside
/// `document`.
#[derive(Debug)]
pub struct Fragment {
    /// The document owning the parsed nodes.
    pub document: Document,
    /// The fragment container node.
    pub root: NodeId,
}

impl Fragment {
    /// The top-level nodes of the fragment, in order.
    #[must_use]
    pub fn children(&self) -> Vec<NodeId> {
        self.document.children(self.root).collect()
    }
}

/// Parses markup of one content type.
pub trait Loader {
    /// Parses a complete document.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the source cannot be parsed.
    fn load(&self, source: &str, options: &ParseOptions) -> Result<Document, ParseError>;

    /// Parses a markup fragment. Unparseable markup yields `None`.
    fn load_fragment(&self, markup: &str, options: &ParseOptions) -> Option<Fragment>;
}

/// Loader for XML markup.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlLoader;

impl Loader for XmlLoader {
    fn load(&self, source: &str, options: &ParseOptions) -> Result<Document, ParseError> {
        xml::parse_document(source, options)
    }

    fn load_fragment(&self, markup: &str, options: &ParseOptions) -> Option<Fragment> {
        xml::parse_fragment(markup, options)
            .map_err(|err| debug!(%err, "XML fragment rejected"))
            .ok()
    }
}

/// Lenient loader for HTML markup.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlLoader;

impl Loader for HtmlLoader {
    fn load(&self, source: &str, options: &ParseOptions) -> Result<Document, ParseError> {
        html::parse_document(source, options)
    }

    fn load_fragment(&self, markup: &str, options: &ParseOptions) -> Option<Fragment> {
        html::parse_fragment(markup, options)
            .map_err(|err| debug!(%err, "HTML fragment rejected"))
            .ok()
    }
}

/// A registry of loaders keyed by content type.
#[derive(Clone)]
pub struct Loaders {
    loaders: HashMap<String, Rc<dyn Loader>>,
}

impl Loaders {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            loaders: HashMap::new(),
        }
    }

    /// Registers `loader` for `content_type`, replacing any previous one.
    pub fn register(&mut self, content_type: &str, loader: Rc<dyn Loader>) {
        self.loaders
            .insert(content_type.to_ascii_lowercase(), loader);
    }

    /// Looks up the loader for `content_type`.
    #[must_use]
    pub fn get(&self, content_type: &str) -> Option<Rc<dyn Loader>> {
        self.loaders
            .get(&content_type.to_ascii_lowercase())
            .cloned()
    }

    /// Returns `true` if a loader is registered for `content_type`.
    #[must_use]
    pub fn contains(&self, content_type: &str) -> bool {
        self.loaders
            .contains_key(&content_type.to_ascii_lowercase())
    }

    /// The registered content types, sorted.
    #[must_use]
    pub fn content_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.loaders.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl Default for Loaders {
    fn default() -> Self {
        let mut loaders = Self::new();
        let xml: Rc<dyn Loader> = Rc::new(XmlLoader);
        let html: Rc<dyn Loader> = Rc::new(HtmlLoader);
        for content_type in ["xml", "text/xml", "application/xml"] {
            loaders.register(content_type, Rc::clone(&xml));
        }
        for content_type in ["html", "text/html"] {
            loaders.register(content_type, Rc::clone(&html));
        }
        loaders
    }
}

impl fmt::Debug for Loaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.content_types()).finish()
    }
}

impl Document {
    /// Parses an XML string with default options.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the input is not well-formed.
    pub fn parse_str(input: &str) -> Result<Self, ParseError> {
        xml::parse_document(input, &ParseOptions::default())
    }

    /// Parses an HTML string with default options.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] only when nesting exceeds the depth budget.
    pub fn parse_html(input: &str) -> Result<Self, ParseError> {
        html::parse_document(input, &ParseOptions::default())
    }
}
