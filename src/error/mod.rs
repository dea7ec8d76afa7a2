//! Error types for the node-set engine and its collaborators.
//!
//! [`Error`] is the single failure type surfaced by node-set operations. The
//! collaborators (markup loading, `XPath` evaluation, byte decoding) keep
//! their own error types, which convert into [`Error`] with `?`.
//!
//! Markup errors carry a [`SourceLocation`] with line, column and byte
//! offset so that a failed load can point at the offending input.

use std::fmt;

use thiserror::Error;

use crate::encoding::EncodingError;
use crate::xpath::XPathError;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures raised by node-set selection and manipulation.
///
/// All variants are raised synchronously and immediately; the engine never
/// retries or recovers from them.
#[derive(Debug, Error)]
pub enum Error {
    /// A selector or content specification was malformed or absent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A fetch expression was empty.
    #[error("invalid expression: a non-empty expression is required")]
    InvalidExpression,

    /// A target selector did not evaluate to a node list.
    #[error("selector `{selector}` does not select nodes")]
    InvalidSelector {
        /// The offending selector.
        selector: String,
    },

    /// A fetch expression evaluated to a scalar instead of a node list.
    #[error("expression `{expression}` returned a {found}, expected a node-set")]
    NotANodeSet {
        /// The evaluated expression.
        expression: String,
        /// The type name of the value it produced.
        found: &'static str,
    },

    /// A content string was empty.
    #[error("content source is empty")]
    EmptySource,

    /// Content resolved to no usable nodes.
    #[error("content did not resolve to any nodes")]
    EmptyResult,

    /// A node belonging to another document was used without being imported.
    #[error("node belongs to a different document")]
    DocumentMismatch,

    /// No fragment loader is registered for a content type.
    #[error("no fragment loader registered for content type `{0}`")]
    InvalidFragmentLoader(String),

    /// A value that is not a node of the document was given where a node
    /// is required.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// An `XPath` expression failed to compile or evaluate.
    #[error(transparent)]
    XPath(#[from] XPathError),

    /// A document failed to load.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Byte input could not be decoded.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

/// Source location within a markup string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number (in characters, not bytes).
    pub column: u32,
    /// 0-based byte offset from the start of the input.
    pub byte_offset: usize,
}

impl SourceLocation {
    /// Computes the location of `byte_offset` within `input`.
    #[must_use]
    pub fn locate(input: &str, byte_offset: usize) -> Self {
        let offset = byte_offset.min(input.len());
        let before = input.get(..offset).unwrap_or(input);
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before[line_start..].chars().count() + 1;
        Self {
            line: u32::try_from(line).unwrap_or(u32::MAX),
            column: u32::try_from(column).unwrap_or(u32::MAX),
            byte_offset: offset,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The error returned when markup cannot be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at {location}: {message}")]
pub struct ParseError {
    /// The primary error message.
    pub message: String,
    /// Where in the source the error occurred.
    pub location: SourceLocation,
}

impl ParseError {
    /// Creates a parse error at `byte_offset` within `input`.
    #[must_use]
    pub fn at(input: &str, byte_offset: usize, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: SourceLocation::locate(input, byte_offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_location_display() {
        let loc = SourceLocation {
            line: 10,
            column: 5,
            byte_offset: 42,
        };
        assert_eq!(loc.to_string(), "10:5");
    }

    #[test]
    fn test_locate_counts_lines_and_columns() {
        let input = "<a>\n  <b>\n</a>";
        let loc = SourceLocation::locate(input, 6);
        assert_eq!(loc.line, 2);
        assert_eq!(loc.column, 3);
        assert_eq!(loc.byte_offset, 6);
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::at("<root>", 6, "unexpected end of input");
        assert_eq!(err.to_string(), "parse error at 1:7: unexpected end of input");
    }

    #[test]
    fn test_error_wraps_parse_error() {
        let err: Error = ParseError::at("", 0, "empty document").into();
        assert!(matches!(err, Error::Parse(_)));
        assert_eq!(err.to_string(), "parse error at 1:1: empty document");
    }

    #[test]
    fn test_not_a_node_set_display() {
        let err = Error::NotANodeSet {
            expression: "count(*)".to_string(),
            found: "number",
        };
        assert_eq!(
            err.to_string(),
            "expression `count(*)` returned a number, expected a node-set"
        );
    }
}
