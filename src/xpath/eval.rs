//! `XPath` 1.0 evaluator over the arena tree.
//!
//! Node-sets are evaluated as lists of [`Item`]s so attributes can take part
//! in predicates and string functions; they are dropped when a node-set
//! leaves the evaluator, because attributes are not tree nodes.
#![allow(clippy::cast_precision_loss, clippy::float_cmp)]

use std::collections::{HashMap, HashSet};
use std::iter;

use super::ast::{Axis, BinaryOp, Expr, NodeTest, Step};
use super::types::{format_number, parse_number, XPathError, XPathValue};
use crate::tree::{Document, NodeId, NodeKind};

/// The namespace bound to the `xml` prefix.
const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Item {
    Node(NodeId),
    /// An attribute, addressed by its owner element and its index.
    Attribute(NodeId, usize),
}

impl Item {
    fn owner(self) -> NodeId {
        match self {
            Self::Node(id) | Self::Attribute(id, _) => id,
        }
    }

    fn node(self) -> Option<NodeId> {
        match self {
            Self::Node(id) => Some(id),
            Self::Attribute(..) => None,
        }
    }
}

enum Value {
    Boolean(bool),
    Number(f64),
    String(String),
    Items(Vec<Item>),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Items(_) => "node-set",
        }
    }
}

/// The context item, position and size.
struct Focus {
    item: Item,
    position: usize,
    size: usize,
}

/// A node test with its prefix resolved.
enum Test<'e> {
    Name {
        namespace: Option<String>,
        local: &'e str,
    },
    Namespace(String),
    Principal,
    Node,
    Text,
    Comment,
    ProcessingInstruction(Option<&'e str>),
}

pub(crate) struct Evaluator<'a> {
    doc: &'a Document,
    namespaces: &'a HashMap<String, String>,
    variables: &'a HashMap<String, XPathValue>,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(
        doc: &'a Document,
        namespaces: &'a HashMap<String, String>,
        variables: &'a HashMap<String, XPathValue>,
    ) -> Self {
        Self {
            doc,
            namespaces,
            variables,
        }
    }

    pub(crate) fn evaluate(&self, expr: &Expr, context: NodeId) -> Result<XPathValue, XPathError> {
        let focus = Focus {
            item: Item::Node(context),
            position: 1,
            size: 1,
        };
        Ok(match self.eval(expr, &focus)? {
            Value::Boolean(b) => XPathValue::Boolean(b),
            Value::Number(n) => XPathValue::Number(n),
            Value::String(s) => XPathValue::String(s),
            Value::Items(items) => {
                XPathValue::NodeSet(items.into_iter().filter_map(Item::node).collect())
            }
        })
    }

    fn eval(&self, expr: &Expr, focus: &Focus) -> Result<Value, XPathError> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Variable(name) => self
                .variables
                .get(name)
                .map(|value| match value {
                    XPathValue::Boolean(b) => Value::Boolean(*b),
                    XPathValue::Number(n) => Value::Number(*n),
                    XPathValue::String(s) => Value::String(s.clone()),
                    XPathValue::NodeSet(ids) => {
                        Value::Items(ids.iter().copied().map(Item::Node).collect())
                    }
                })
                .ok_or_else(|| XPathError::UndefinedVariable { name: name.clone() }),
            Expr::Negate(inner) => {
                let value = self.eval(inner, focus)?;
                Ok(Value::Number(-self.number(&value)))
            }
            Expr::Binary { op, left, right } => self.binary(*op, left, right, focus),
            Expr::Function { name, args } => self.function(name, args, focus),
            Expr::Path { absolute, steps } => {
                let start = if *absolute {
                    Item::Node(self.doc.tree_root(focus.item.owner()))
                } else {
                    focus.item
                };
                self.apply_steps(vec![start], steps).map(Value::Items)
            }
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let mut items = Self::items(self.eval(primary, focus)?)?;
                self.sort(&mut items);
                for predicate in predicates {
                    items = self.filter(items, predicate)?;
                }
                self.apply_steps(items, steps).map(Value::Items)
            }
            Expr::Union(left, right) => {
                let mut items = Self::items(self.eval(left, focus)?)?;
                items.extend(Self::items(self.eval(right, focus)?)?);
                self.sort(&mut items);
                Ok(Value::Items(items))
            }
        }
    }

    fn items(value: Value) -> Result<Vec<Item>, XPathError> {
        match value {
            Value::Items(items) => Ok(items),
            other => Err(XPathError::TypeError {
                expected: "node-set",
                found: other.type_name(),
            }),
        }
    }

    // --- Location paths ---

    fn apply_steps(&self, mut items: Vec<Item>, steps: &[Step]) -> Result<Vec<Item>, XPathError> {
        for step in steps {
            items = self.step(&items, step)?;
        }
        Ok(items)
    }

    fn step(&self, input: &[Item], step: &Step) -> Result<Vec<Item>, XPathError> {
        let test = self.resolve(&step.node_test)?;
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        for &item in input {
            let mut matched: Vec<Item> = self
                .axis(item, step.axis)
                .into_iter()
                .filter(|&candidate| self.matches(candidate, &test, step.axis))
                .collect();
            for predicate in &step.predicates {
                matched = self.filter(matched, predicate)?;
            }
            out.extend(matched.into_iter().filter(|m| seen.insert(*m)));
        }
        // One context yields its axis in order already.
        if input.len() == 1 {
            if step.axis.is_reverse() {
                out.reverse();
            }
        } else {
            self.sort(&mut out);
        }
        Ok(out)
    }

    fn resolve<'e>(&self, test: &'e NodeTest) -> Result<Test<'e>, XPathError> {
        Ok(match test {
            NodeTest::Name { prefix, local } => Test::Name {
                namespace: prefix.as_deref().map(|p| self.namespace_uri(p)).transpose()?,
                local,
            },
            NodeTest::PrefixWildcard(prefix) => Test::Namespace(self.namespace_uri(prefix)?),
            NodeTest::Wildcard => Test::Principal,
            NodeTest::Node => Test::Node,
            NodeTest::Text => Test::Text,
            NodeTest::Comment => Test::Comment,
            NodeTest::ProcessingInstruction(target) => {
                Test::ProcessingInstruction(target.as_deref())
            }
        })
    }

    fn namespace_uri(&self, prefix: &str) -> Result<String, XPathError> {
        match self.namespaces.get(prefix) {
            Some(uri) => Ok(uri.clone()),
            None if prefix == "xml" => Ok(XML_NAMESPACE.to_string()),
            None => Err(XPathError::UnboundPrefix {
                prefix: prefix.to_string(),
            }),
        }
    }

    /// Candidates along `axis`, in axis order.
    fn axis(&self, item: Item, axis: Axis) -> Vec<Item> {
        let doc = self.doc;
        let nodes = |ids: &mut dyn Iterator<Item = NodeId>| -> Vec<Item> {
            ids.map(Item::Node).collect()
        };
        match item {
            Item::Attribute(owner, _) => match axis {
                Axis::SelfAxis => vec![item],
                Axis::Parent => vec![Item::Node(owner)],
                Axis::Ancestor => nodes(&mut doc.ancestors(owner)),
                Axis::AncestorOrSelf => iter::once(item)
                    .chain(doc.ancestors(owner).map(Item::Node))
                    .collect(),
                Axis::Following => {
                    nodes(&mut doc.descendants(owner).chain(self.following(owner)))
                }
                Axis::Preceding => nodes(&mut self.preceding(owner).into_iter()),
                _ => Vec::new(),
            },
            Item::Node(id) => match axis {
                Axis::Child => nodes(&mut doc.children(id)),
                Axis::Descendant => nodes(&mut doc.descendants(id)),
                Axis::DescendantOrSelf => nodes(&mut iter::once(id).chain(doc.descendants(id))),
                Axis::Parent => nodes(&mut doc.parent(id).into_iter()),
                Axis::Ancestor => nodes(&mut doc.ancestors(id).skip(1)),
                Axis::AncestorOrSelf => nodes(&mut doc.ancestors(id)),
                Axis::FollowingSibling => nodes(&mut iter::successors(
                    doc.next_sibling(id),
                    |&s| doc.next_sibling(s),
                )),
                Axis::PrecedingSibling => nodes(&mut iter::successors(
                    doc.prev_sibling(id),
                    |&s| doc.prev_sibling(s),
                )),
                Axis::Following => nodes(&mut self.following(id).into_iter()),
                Axis::Preceding => nodes(&mut self.preceding(id).into_iter()),
                Axis::Attribute => doc
                    .attributes(id)
                    .iter()
                    .enumerate()
                    .filter(|(_, attr)| !attr.is_namespace_declaration())
                    .map(|(index, _)| Item::Attribute(id, index))
                    .collect(),
                Axis::SelfAxis => vec![item],
            },
        }
    }

    /// Nodes after `id` in document order, excluding descendants.
    fn following(&self, id: NodeId) -> Vec<NodeId> {
        let doc = self.doc;
        let mut out = Vec::new();
        for current in doc.ancestors(id) {
            let mut sibling = doc.next_sibling(current);
            while let Some(s) = sibling {
                out.push(s);
                out.extend(doc.descendants(s));
                sibling = doc.next_sibling(s);
            }
        }
        out
    }

    /// Nodes before `id` in reverse document order, excluding ancestors.
    fn preceding(&self, id: NodeId) -> Vec<NodeId> {
        let doc = self.doc;
        let mut out = Vec::new();
        for current in doc.ancestors(id) {
            let mut sibling = doc.prev_sibling(current);
            while let Some(s) = sibling {
                let mut subtree: Vec<NodeId> = doc.descendants(s).collect();
                subtree.reverse();
                out.extend(subtree);
                out.push(s);
                sibling = doc.prev_sibling(s);
            }
        }
        out
    }

    fn matches(&self, item: Item, test: &Test<'_>, axis: Axis) -> bool {
        match item {
            Item::Attribute(owner, index) => {
                let Some(attr) = self.doc.attributes(owner).get(index) else {
                    return false;
                };
                match test {
                    Test::Name { namespace, local } => {
                        attr.name == *local && attr.namespace.as_deref() == namespace.as_deref()
                    }
                    Test::Namespace(uri) => attr.namespace.as_deref() == Some(uri.as_str()),
                    Test::Principal | Test::Node => true,
                    _ => false,
                }
            }
            Item::Node(id) => match (self.doc.kind(id), test) {
                (_, Test::Node) => true,
                (
                    NodeKind::Element {
                        name, namespace, ..
                    },
                    Test::Name {
                        namespace: expected,
                        local,
                    },
                ) => axis != Axis::Attribute && name == local && namespace == expected,
                (NodeKind::Element { namespace, .. }, Test::Namespace(uri)) => {
                    axis != Axis::Attribute && namespace.as_deref() == Some(uri.as_str())
                }
                (NodeKind::Element { .. }, Test::Principal) => axis != Axis::Attribute,
                (NodeKind::Text { .. } | NodeKind::CData { .. }, Test::Text)
                | (NodeKind::Comment { .. }, Test::Comment) => true,
                (
                    NodeKind::ProcessingInstruction { target, .. },
                    Test::ProcessingInstruction(expected),
                ) => expected.map_or(true, |e| e == target.as_str()),
                _ => false,
            },
        }
    }

    /// Keeps the items for which `predicate` holds, numbering them in the
    /// order given.
    fn filter(&self, items: Vec<Item>, predicate: &Expr) -> Result<Vec<Item>, XPathError> {
        let size = items.len();
        let mut kept = Vec::with_capacity(size);
        for (index, item) in items.into_iter().enumerate() {
            let focus = Focus {
                item,
                position: index + 1,
                size,
            };
            let keep = match self.eval(predicate, &focus)? {
                Value::Number(n) => n == (index + 1) as f64,
                other => self.boolean(&other),
            };
            if keep {
                kept.push(item);
            }
        }
        Ok(kept)
    }

    /// Sorts items into document order and drops duplicates. Detached trees
    /// follow the document tree, ordered by their root ids.
    fn sort(&self, items: &mut Vec<Item>) {
        if items.len() < 2 {
            return;
        }
        let doc_root = self.doc.root();
        let mut roots: Vec<NodeId> = items
            .iter()
            .map(|item| self.doc.tree_root(item.owner()))
            .collect();
        roots.sort_by_key(|&root| (root != doc_root, root));
        roots.dedup();

        let mut ranks: HashMap<NodeId, usize> = HashMap::new();
        for root in roots {
            for node in iter::once(root).chain(self.doc.descendants(root)) {
                let rank = ranks.len();
                ranks.insert(node, rank);
            }
        }
        items.sort_by_key(|item| {
            let rank = ranks.get(&item.owner()).copied().unwrap_or(usize::MAX);
            match item {
                Item::Node(_) => (rank, 0),
                Item::Attribute(_, index) => (rank, index + 1),
            }
        });
        items.dedup();
    }

    // --- Conversions ---

    fn string_value(&self, item: Item) -> String {
        match item {
            Item::Node(id) => self.doc.text_content(id),
            Item::Attribute(owner, index) => self
                .doc
                .attributes(owner)
                .get(index)
                .map(|attr| attr.value.clone())
                .unwrap_or_default(),
        }
    }

    fn string(&self, value: &Value) -> String {
        match value {
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Items(items) => items
                .first()
                .map(|&item| self.string_value(item))
                .unwrap_or_default(),
        }
    }

    fn number(&self, value: &Value) -> f64 {
        match value {
            Value::Boolean(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => parse_number(s),
            Value::Items(_) => parse_number(&self.string(value)),
        }
    }

    fn boolean(&self, value: &Value) -> bool {
        match value {
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Items(items) => !items.is_empty(),
        }
    }

    // --- Operators ---

    fn binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        focus: &Focus,
    ) -> Result<Value, XPathError> {
        let lhs = self.eval(left, focus)?;
        match op {
            BinaryOp::And => {
                if !self.boolean(&lhs) {
                    return Ok(Value::Boolean(false));
                }
                let rhs = self.eval(right, focus)?;
                Ok(Value::Boolean(self.boolean(&rhs)))
            }
            BinaryOp::Or => {
                if self.boolean(&lhs) {
                    return Ok(Value::Boolean(true));
                }
                let rhs = self.eval(right, focus)?;
                Ok(Value::Boolean(self.boolean(&rhs)))
            }
            op if op.is_comparison() => {
                let rhs = self.eval(right, focus)?;
                Ok(Value::Boolean(self.compare(op, &lhs, &rhs)))
            }
            _ => {
                let rhs = self.eval(right, focus)?;
                let (x, y) = (self.number(&lhs), self.number(&rhs));
                Ok(Value::Number(match op {
                    BinaryOp::Add => x + y,
                    BinaryOp::Sub => x - y,
                    BinaryOp::Mul => x * y,
                    BinaryOp::Div => x / y,
                    _ => x % y,
                }))
            }
        }
    }

    /// Comparison with the existential node-set semantics of `XPath` 1.0
    /// section 3.4.
    fn compare(&self, op: BinaryOp, left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::Items(l), Value::Items(r)) => {
                let rhs: Vec<Value> = r
                    .iter()
                    .map(|&item| Value::String(self.string_value(item)))
                    .collect();
                l.iter().any(|&item| {
                    let lhs = Value::String(self.string_value(item));
                    rhs.iter().any(|b| self.compare_atoms(op, &lhs, b))
                })
            }
            (Value::Items(items), Value::Boolean(_)) => {
                self.compare_atoms(op, &Value::Boolean(!items.is_empty()), right)
            }
            (Value::Boolean(_), Value::Items(items)) => {
                self.compare_atoms(op, left, &Value::Boolean(!items.is_empty()))
            }
            (Value::Items(items), other) => items
                .iter()
                .any(|&item| self.compare_atoms(op, &self.atomize(item, other), other)),
            (other, Value::Items(items)) => items
                .iter()
                .any(|&item| self.compare_atoms(op, other, &self.atomize(item, other))),
            _ => self.compare_atoms(op, left, right),
        }
    }

    /// Converts a node-set member to the type of the other operand.
    fn atomize(&self, item: Item, other: &Value) -> Value {
        let text = self.string_value(item);
        match other {
            Value::Number(_) => Value::Number(parse_number(&text)),
            _ => Value::String(text),
        }
    }

    fn compare_atoms(&self, op: BinaryOp, a: &Value, b: &Value) -> bool {
        match op {
            BinaryOp::Eq | BinaryOp::Neq => {
                let equal = if matches!(a, Value::Boolean(_)) || matches!(b, Value::Boolean(_)) {
                    self.boolean(a) == self.boolean(b)
                } else if matches!(a, Value::Number(_)) || matches!(b, Value::Number(_)) {
                    self.number(a) == self.number(b)
                } else {
                    self.string(a) == self.string(b)
                };
                equal == (op == BinaryOp::Eq)
            }
            _ => {
                let (x, y) = (self.number(a), self.number(b));
                match op {
                    BinaryOp::Lt => x < y,
                    BinaryOp::Lte => x <= y,
                    BinaryOp::Gt => x > y,
                    _ => x >= y,
                }
            }
        }
    }

    // --- Core function library ---

    #[allow(clippy::too_many_lines)]
    fn function(&self, name: &str, args: &[Expr], focus: &Focus) -> Result<Value, XPathError> {
        let argc = args.len();
        let arity = |min: usize, max: usize, expected: &'static str| {
            if argc < min || argc > max {
                Err(XPathError::ArgumentCount {
                    name: name.to_string(),
                    expected,
                    found: argc,
                })
            } else {
                Ok(())
            }
        };
        let arg = |index: usize| self.eval(&args[index], focus);

        let value = match name {
            "last" => {
                arity(0, 0, "0")?;
                Value::Number(focus.size as f64)
            }
            "position" => {
                arity(0, 0, "0")?;
                Value::Number(focus.position as f64)
            }
            "count" => {
                arity(1, 1, "1")?;
                Value::Number(Self::items(arg(0)?)?.len() as f64)
            }
            "local-name" | "name" | "namespace-uri" => {
                arity(0, 1, "0 or 1")?;
                let item = if argc == 0 {
                    Some(focus.item)
                } else {
                    let mut items = Self::items(arg(0)?)?;
                    self.sort(&mut items);
                    items.first().copied()
                };
                Value::String(item.map(|i| self.item_name(i, name)).unwrap_or_default())
            }
            "string" => {
                arity(0, 1, "0 or 1")?;
                Value::String(self.string_arg(args, focus)?)
            }
            "concat" => {
                arity(2, usize::MAX, "at least 2")?;
                let mut out = String::new();
                for index in 0..argc {
                    out.push_str(&self.string(&arg(index)?));
                }
                Value::String(out)
            }
            "starts-with" | "contains" | "substring-before" | "substring-after" => {
                arity(2, 2, "2")?;
                let haystack = self.string(&arg(0)?);
                let needle = self.string(&arg(1)?);
                match name {
                    "starts-with" => Value::Boolean(haystack.starts_with(&needle)),
                    "contains" => Value::Boolean(haystack.contains(&needle)),
                    "substring-before" => Value::String(
                        haystack
                            .find(&needle)
                            .map(|i| haystack[..i].to_string())
                            .unwrap_or_default(),
                    ),
                    _ => Value::String(
                        haystack
                            .find(&needle)
                            .map(|i| haystack[i + needle.len()..].to_string())
                            .unwrap_or_default(),
                    ),
                }
            }
            "substring" => {
                arity(2, 3, "2 or 3")?;
                let text = self.string(&arg(0)?);
                let start = round(self.number(&arg(1)?));
                let end = if argc == 3 {
                    start + round(self.number(&arg(2)?))
                } else {
                    f64::INFINITY
                };
                Value::String(
                    text.chars()
                        .enumerate()
                        .filter(|&(i, _)| {
                            let position = (i + 1) as f64;
                            position >= start && position < end
                        })
                        .map(|(_, c)| c)
                        .collect(),
                )
            }
            "string-length" => {
                arity(0, 1, "0 or 1")?;
                Value::Number(self.string_arg(args, focus)?.chars().count() as f64)
            }
            "normalize-space" => {
                arity(0, 1, "0 or 1")?;
                let text = self.string_arg(args, focus)?;
                Value::String(
                    text.split([' ', '\t', '\n', '\r'])
                        .filter(|part| !part.is_empty())
                        .collect::<Vec<_>>()
                        .join(" "),
                )
            }
            "translate" => {
                arity(3, 3, "3")?;
                let text = self.string(&arg(0)?);
                let from: Vec<char> = self.string(&arg(1)?).chars().collect();
                let to: Vec<char> = self.string(&arg(2)?).chars().collect();
                Value::String(
                    text.chars()
                        .filter_map(|c| match from.iter().position(|&f| f == c) {
                            Some(i) => to.get(i).copied(),
                            None => Some(c),
                        })
                        .collect(),
                )
            }
            "boolean" => {
                arity(1, 1, "1")?;
                Value::Boolean(self.boolean(&arg(0)?))
            }
            "not" => {
                arity(1, 1, "1")?;
                Value::Boolean(!self.boolean(&arg(0)?))
            }
            "true" | "false" => {
                arity(0, 0, "0")?;
                Value::Boolean(name == "true")
            }
            "number" => {
                arity(0, 1, "0 or 1")?;
                if argc == 0 {
                    Value::Number(parse_number(&self.string_value(focus.item)))
                } else {
                    Value::Number(self.number(&arg(0)?))
                }
            }
            "sum" => {
                arity(1, 1, "1")?;
                let items = Self::items(arg(0)?)?;
                Value::Number(
                    items
                        .into_iter()
                        .map(|item| parse_number(&self.string_value(item)))
                        .sum(),
                )
            }
            "floor" | "ceiling" | "round" => {
                arity(1, 1, "1")?;
                let n = self.number(&arg(0)?);
                Value::Number(match name {
                    "floor" => n.floor(),
                    "ceiling" => n.ceil(),
                    _ => round(n),
                })
            }
            _ => {
                return Err(XPathError::UnknownFunction {
                    name: name.to_string(),
                })
            }
        };
        Ok(value)
    }

    /// The string value of the first argument, or of the context item.
    fn string_arg(&self, args: &[Expr], focus: &Focus) -> Result<String, XPathError> {
        match args.first() {
            Some(expr) => Ok(self.string(&self.eval(expr, focus)?)),
            None => Ok(self.string_value(focus.item)),
        }
    }

    fn item_name(&self, item: Item, function: &str) -> String {
        match item {
            Item::Attribute(owner, index) => {
                let Some(attr) = self.doc.attributes(owner).get(index) else {
                    return String::new();
                };
                match function {
                    "local-name" => attr.name.clone(),
                    "name" => attr.qualified_name(),
                    _ => attr.namespace.clone().unwrap_or_default(),
                }
            }
            Item::Node(id) => match function {
                "local-name" => self.doc.node_name(id).unwrap_or_default().to_string(),
                "name" => self.doc.qualified_name(id).unwrap_or_default(),
                _ => self.doc.node_namespace(id).unwrap_or_default().to_string(),
            },
        }
    }
}

/// `XPath` rounding: halves round towards positive infinity.
fn round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        n
    } else if (-0.5..0.0).contains(&n) {
        -0.0
    } else {
        (n + 0.5).floor()
    }
}
