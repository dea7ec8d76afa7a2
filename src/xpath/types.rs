//! `XPath` 1.0 value types and errors.
//!
//! The four data types of the `XPath` 1.0 data model (boolean, number,
//! string and node-set) plus the conversions between them.

use thiserror::Error;

use crate::tree::NodeId;

/// An error raised while compiling or evaluating an `XPath` expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XPathError {
    /// The expression is not valid `XPath` 1.0.
    #[error("XPath syntax error at position {position}: {message}")]
    Syntax {
        /// Human-readable error message.
        message: String,
        /// 0-based byte offset in the expression.
        position: usize,
    },

    /// A function name that is not part of the supported library.
    #[error("unknown XPath function `{name}`")]
    UnknownFunction {
        /// The function name.
        name: String,
    },

    /// A function called with the wrong number of arguments.
    #[error("XPath function `{name}` expects {expected} argument(s), got {found}")]
    ArgumentCount {
        /// The function name.
        name: String,
        /// Description of the accepted argument count.
        expected: &'static str,
        /// Number of arguments given.
        found: usize,
    },

    /// A variable reference with no binding.
    #[error("undefined XPath variable `${name}`")]
    UndefinedVariable {
        /// The variable name without `$`.
        name: String,
    },

    /// A namespace prefix that has not been registered.
    #[error("namespace prefix `{prefix}` is not registered")]
    UnboundPrefix {
        /// The unresolved prefix.
        prefix: String,
    },

    /// An operand of the wrong type, e.g. a union of numbers.
    #[error("XPath type error: expected {expected}, found {found}")]
    TypeError {
        /// The expected type name.
        expected: &'static str,
        /// The type name found.
        found: &'static str,
    },
}

/// The result of evaluating an `XPath` expression.
///
/// Node-sets are in document order without duplicates. Attributes are not
/// tree nodes: expressions selecting only attributes yield an empty
/// node-set, while attribute values remain usable inside predicates and
/// functions.
#[derive(Debug, Clone, PartialEq)]
pub enum XPathValue {
    /// A boolean value.
    Boolean(bool),
    /// An IEEE 754 double.
    Number(f64),
    /// A string.
    String(String),
    /// An ordered set of tree nodes.
    NodeSet(Vec<NodeId>),
}

impl XPathValue {
    /// The `XPath` name of the value's type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::NodeSet(_) => "node-set",
        }
    }

    /// Converts the value to a boolean (`XPath` 1.0 section 4.3).
    #[must_use]
    pub fn to_boolean(&self) -> bool {
        match self {
            Self::Boolean(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::NodeSet(nodes) => !nodes.is_empty(),
        }
    }

    /// Converts a scalar to a number (`XPath` 1.0 section 4.4). Node-sets
    /// need the document to compute string-values and yield NaN here.
    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Boolean(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => parse_number(s),
            Self::NodeSet(_) => f64::NAN,
        }
    }

    /// Borrows the node-set, if the value is one.
    #[must_use]
    pub fn as_node_set(&self) -> Option<&[NodeId]> {
        match self {
            Self::NodeSet(nodes) => Some(nodes),
            _ => None,
        }
    }

    /// Takes the node-set, if the value is one.
    #[must_use]
    pub fn into_node_set(self) -> Option<Vec<NodeId>> {
        match self {
            Self::NodeSet(nodes) => Some(nodes),
            _ => None,
        }
    }
}

/// Parses a string as an `XPath` number: optional minus, digits with an
/// optional fraction, surrounding whitespace allowed. Anything else is NaN.
#[must_use]
pub fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim_matches(|c: char| matches!(c, ' ' | '\t' | '\n' | '\r'));
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let mut seen_digit = false;
    let mut seen_dot = false;
    for c in digits.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => return f64::NAN,
        }
    }
    if !seen_digit {
        return f64::NAN;
    }
    trimmed.parse().unwrap_or(f64::NAN)
}

/// Formats a number per the `XPath` `string()` rules.
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e17 {
        #[allow(clippy::cast_possible_truncation)]
        let int = n as i64;
        int.to_string()
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_conversion() {
        assert!(XPathValue::Number(2.0).to_boolean());
        assert!(!XPathValue::Number(f64::NAN).to_boolean());
        assert!(!XPathValue::String(String::new()).to_boolean());
        assert!(!XPathValue::NodeSet(vec![]).to_boolean());
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(" 42 "), 42.0);
        assert_eq!(parse_number("-1.5"), -1.5);
        assert_eq!(parse_number(".5"), 0.5);
        assert!(parse_number("1e3").is_nan());
        assert!(parse_number("").is_nan());
        assert!(parse_number("abc").is_nan());
        assert!(parse_number("-").is_nan());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_type_names() {
        assert_eq!(XPathValue::Boolean(true).type_name(), "boolean");
        assert_eq!(XPathValue::NodeSet(vec![]).type_name(), "node-set");
    }

    #[test]
    fn test_error_display() {
        let err = XPathError::UndefinedVariable {
            name: "x".to_string(),
        };
        assert_eq!(err.to_string(), "undefined XPath variable `$x`");
    }
}
