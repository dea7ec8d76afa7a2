//! `XPath` 1.0 query language.
//!
//! A compact `XPath` 1.0 engine over the arena tree: the abbreviated and
//! unabbreviated syntax, every axis but `namespace::`, and the core function
//! library except `lang()` and `id()`.
//!
//! # Quick Start
//!
//! ```
//! use fluentxml::Document;
//! use fluentxml::xpath::{evaluate, XPathValue};
//!
//! let doc = Document::parse_str("<root><a>1</a><b>2</b></root>").unwrap();
//! let root = doc.root_element().unwrap();
//! let result = evaluate(&doc, root, "count(*)").unwrap();
//! assert_eq!(result, XPathValue::Number(2.0));
//! ```
//!
//! Name tests follow `XPath` 1.0 strictly: an unprefixed name matches only
//! elements without a namespace. Elements in a default namespace are
//! selected through a prefix registered with [`XPath::register_namespace`].

pub mod ast;
mod eval;
pub mod lexer;
pub mod parser;
pub mod types;

pub use ast::Expr;
pub use types::{XPathError, XPathValue};

use std::collections::HashMap;

use crate::tree::{Document, NodeId};
use eval::Evaluator;

/// An `XPath` evaluator configured with namespace and variable bindings.
#[derive(Debug, Clone, Default)]
pub struct XPath {
    namespaces: HashMap<String, String>,
    variables: HashMap<String, XPathValue>,
}

impl XPath {
    /// Creates an evaluator without bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a prefix for use in name tests.
    pub fn register_namespace(&mut self, prefix: &str, uri: &str) {
        self.namespaces.insert(prefix.to_string(), uri.to_string());
    }

    /// Returns the URI bound to `prefix`.
    #[must_use]
    pub fn namespace(&self, prefix: &str) -> Option<&str> {
        self.namespaces.get(prefix).map(String::as_str)
    }

    /// Binds a variable for `$name` references.
    pub fn set_variable(&mut self, name: &str, value: XPathValue) {
        self.variables.insert(name.to_string(), value);
    }

    /// Parses an expression for repeated evaluation.
    ///
    /// # Errors
    ///
    /// Returns [`XPathError::Syntax`] for malformed expressions.
    pub fn compile(&self, expression: &str) -> Result<Expr, XPathError> {
        parser::parse(expression)
    }

    /// Parses and evaluates an expression. Without a context node the
    /// document node is the context.
    ///
    /// # Errors
    ///
    /// Returns [`XPathError`] if the expression is malformed or its
    /// evaluation fails.
    pub fn evaluate(
        &self,
        doc: &Document,
        expression: &str,
        context: Option<NodeId>,
    ) -> Result<XPathValue, XPathError> {
        let expr = self.compile(expression)?;
        self.evaluate_expr(doc, &expr, context)
    }

    /// Evaluates a compiled expression.
    ///
    /// # Errors
    ///
    /// Returns [`XPathError`] if evaluation fails, e.g. on an unknown
    /// function or an unregistered prefix.
    pub fn evaluate_expr(
        &self,
        doc: &Document,
        expr: &Expr,
        context: Option<NodeId>,
    ) -> Result<XPathValue, XPathError> {
        let context = context.unwrap_or_else(|| doc.root());
        Evaluator::new(doc, &self.namespaces, &self.variables).evaluate(expr, context)
    }
}

/// Evaluates an expression against a context node without any bindings.
///
/// # Errors
///
/// Returns [`XPathError`] if the expression is malformed or evaluation fails.
pub fn evaluate(
    doc: &Document,
    context_node: NodeId,
    expression: &str,
) -> Result<XPathValue, XPathError> {
    XPath::new().evaluate(doc, expression, Some(context_node))
}
