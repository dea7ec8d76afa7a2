//! Abstract syntax tree types for `XPath` 1.0 expressions.
//!
//! Location paths are composed of [`Step`]s, each having an [`Axis`], a
//! [`NodeTest`], and zero or more predicate expressions.

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `42`, `.5`
    Number(f64),
    /// `'text'` or `"text"`
    String(String),
    /// `$name`, stored without the dollar sign.
    Variable(String),
    /// Arithmetic, comparison and boolean operators.
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `-operand`
    Negate(Box<Expr>),
    /// `name(args...)`
    Function { name: String, args: Vec<Expr> },
    /// A location path. An absolute path with no steps is the bare `/`.
    Path {
        /// Starts at the root of the context node's tree.
        absolute: bool,
        steps: Vec<Step>,
    },
    /// `primary[predicate]...` with optional trailing steps, as in
    /// `(a | b)[1]/c`.
    Filter {
        primary: Box<Expr>,
        predicates: Vec<Expr>,
        steps: Vec<Step>,
    },
    /// `left | right`
    Union(Box<Expr>, Box<Expr>),
}

/// Operators of [`Expr::Binary`], named after their token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    /// Comparison operators yield booleans regardless of operand types.
    #[must_use]
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Neq | Self::Lt | Self::Lte | Self::Gt | Self::Gte
        )
    }
}

/// A single step in a location path, e.g. `child::p[@class='intro']`.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    /// The test candidate nodes must pass.
    pub node_test: NodeTest,
    /// Predicates, applied in axis order.
    pub predicates: Vec<Expr>,
}

impl Step {
    /// A step with no predicates.
    #[must_use]
    pub fn new(axis: Axis, node_test: NodeTest) -> Self {
        Self {
            axis,
            node_test,
            predicates: Vec::new(),
        }
    }

    /// The `descendant-or-self::node()` step that `//` abbreviates.
    #[must_use]
    pub fn descendant_or_self() -> Self {
        Self::new(Axis::DescendantOrSelf, NodeTest::Node)
    }
}

/// An `XPath` axis. The namespace axis is not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// `ancestor::`
    Ancestor,
    /// `ancestor-or-self::`
    AncestorOrSelf,
    /// `attribute::` (abbreviated `@`)
    Attribute,
    /// `child::` (the default axis)
    Child,
    /// `descendant::`
    Descendant,
    /// `descendant-or-self::`
    DescendantOrSelf,
    /// `following::`
    Following,
    /// `following-sibling::`
    FollowingSibling,
    /// `parent::` (abbreviated `..`)
    Parent,
    /// `preceding::`
    Preceding,
    /// `preceding-sibling::`
    PrecedingSibling,
    /// `self::` (abbreviated `.`)
    SelfAxis,
}

impl Axis {
    /// Looks up an axis by its `XPath` name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "ancestor" => Self::Ancestor,
            "ancestor-or-self" => Self::AncestorOrSelf,
            "attribute" => Self::Attribute,
            "child" => Self::Child,
            "descendant" => Self::Descendant,
            "descendant-or-self" => Self::DescendantOrSelf,
            "following" => Self::Following,
            "following-sibling" => Self::FollowingSibling,
            "parent" => Self::Parent,
            "preceding" => Self::Preceding,
            "preceding-sibling" => Self::PrecedingSibling,
            "self" => Self::SelfAxis,
            _ => return None,
        })
    }

    /// Reverse axes number their proximity positions backwards from the
    /// context node.
    #[must_use]
    pub fn is_reverse(self) -> bool {
        matches!(
            self,
            Self::Ancestor | Self::AncestorOrSelf | Self::Preceding | Self::PrecedingSibling
        )
    }
}

/// A node test within a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// A (possibly prefixed) name test, e.g. `item` or `atom:entry`.
    Name {
        /// Namespace prefix, resolved against registered namespaces.
        prefix: Option<String>,
        /// Local name.
        local: String,
    },
    /// `*`
    Wildcard,
    /// `prefix:*`
    PrefixWildcard(String),
    /// `node()`
    Node,
    /// `text()`
    Text,
    /// `comment()`
    Comment,
    /// `processing-instruction()` with an optional target literal.
    ProcessingInstruction(Option<String>),
}
