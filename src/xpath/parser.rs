//! Recursive descent parser for `XPath` 1.0.
//!
//! Precedence, lowest first: `or`, `and`, equality, relational, additive,
//! multiplicative, unary minus, union, path.

use super::ast::{Axis, BinaryOp, Expr, NodeTest, Step};
use super::lexer::{tokenize, Spanned, Token};
use super::types::XPathError;

/// Parses an expression into its syntax tree.
///
/// # Errors
///
/// Returns [`XPathError::Syntax`] if the expression is empty or malformed.
pub fn parse(input: &str) -> Result<Expr, XPathError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
    };
    if parser.tokens.is_empty() {
        return Err(parser.error("empty expression"));
    }
    let expr = parser.or_expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), XPathError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {what}")))
        }
    }

    fn error(&self, message: &str) -> XPathError {
        XPathError::Syntax {
            message: message.to_string(),
            position: self.tokens.get(self.pos).map_or(self.end, |s| s.position),
        }
    }

    fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn or_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.and_expr()?;
        while self.eat(&Token::Or) {
            let right = self.and_expr()?;
            left = Self::binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.equality_expr()?;
        while self.eat(&Token::And) {
            let right = self.equality_expr()?;
            left = Self::binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn equality_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.relational_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Equal) => BinaryOp::Eq,
                Some(Token::NotEqual) => BinaryOp::Neq,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.relational_expr()?;
            left = Self::binary(op, left, right);
        }
    }

    fn relational_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.additive_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Less) => BinaryOp::Lt,
                Some(Token::LessEqual) => BinaryOp::Lte,
                Some(Token::Greater) => BinaryOp::Gt,
                Some(Token::GreaterEqual) => BinaryOp::Gte,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.additive_expr()?;
            left = Self::binary(op, left, right);
        }
    }

    fn additive_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.multiplicative_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.multiplicative_expr()?;
            left = Self::binary(op, left, right);
        }
    }

    fn multiplicative_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.unary_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Div) => BinaryOp::Div,
                Some(Token::Mod) => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.unary_expr()?;
            left = Self::binary(op, left, right);
        }
    }

    fn unary_expr(&mut self) -> Result<Expr, XPathError> {
        if self.eat(&Token::Minus) {
            let operand = self.unary_expr()?;
            return Ok(Expr::Negate(Box::new(operand)));
        }
        self.union_expr()
    }

    fn union_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.path_expr()?;
        while self.eat(&Token::Pipe) {
            let right = self.path_expr()?;
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn path_expr(&mut self) -> Result<Expr, XPathError> {
        let starts_filter = matches!(
            self.peek(),
            Some(
                Token::Variable(_)
                    | Token::LeftParen
                    | Token::Literal(_)
                    | Token::Number(_)
                    | Token::FunctionName(_)
            )
        );
        if !starts_filter {
            return self.location_path();
        }

        let primary = self.primary_expr()?;
        let predicates = self.predicates()?;
        let mut steps = Vec::new();
        if matches!(self.peek(), Some(Token::Slash | Token::DoubleSlash)) {
            self.continue_path(&mut steps)?;
        }
        if predicates.is_empty() && steps.is_empty() {
            return Ok(primary);
        }
        Ok(Expr::Filter {
            primary: Box::new(primary),
            predicates,
            steps,
        })
    }

    fn primary_expr(&mut self) -> Result<Expr, XPathError> {
        match self.advance() {
            Some(Token::Variable(name)) => Ok(Expr::Variable(name)),
            Some(Token::Literal(text)) => Ok(Expr::String(text)),
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::LeftParen) => {
                let inner = self.or_expr()?;
                self.expect(&Token::RightParen, "`)`")?;
                Ok(inner)
            }
            Some(Token::FunctionName(name)) => {
                self.expect(&Token::LeftParen, "`(`")?;
                let mut args = Vec::new();
                if !self.eat(&Token::RightParen) {
                    loop {
                        args.push(self.or_expr()?);
                        if self.eat(&Token::RightParen) {
                            break;
                        }
                        self.expect(&Token::Comma, "`,` or `)`")?;
                    }
                }
                Ok(Expr::Function { name, args })
            }
            other => {
                if other.is_some() {
                    self.pos -= 1;
                }
                Err(self.error("expected a primary expression"))
            }
        }
    }

    fn location_path(&mut self) -> Result<Expr, XPathError> {
        let mut steps = Vec::new();
        let absolute = match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                if self.starts_step() {
                    self.relative_path(&mut steps)?;
                }
                true
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                steps.push(Step::descendant_or_self());
                self.relative_path(&mut steps)?;
                true
            }
            _ => {
                self.relative_path(&mut steps)?;
                false
            }
        };
        Ok(Expr::Path { absolute, steps })
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Dot
                    | Token::DotDot
                    | Token::At
                    | Token::AxisName(_)
                    | Token::Star
                    | Token::Name(_)
                    | Token::NodeType(_)
            )
        )
    }

    fn relative_path(&mut self, steps: &mut Vec<Step>) -> Result<(), XPathError> {
        steps.push(self.step()?);
        self.continue_path(steps)
    }

    /// Consumes `/step` and `//step` continuations.
    fn continue_path(&mut self, steps: &mut Vec<Step>) -> Result<(), XPathError> {
        loop {
            match self.peek() {
                Some(Token::Slash) => self.pos += 1,
                Some(Token::DoubleSlash) => {
                    self.pos += 1;
                    steps.push(Step::descendant_or_self());
                }
                _ => return Ok(()),
            }
            steps.push(self.step()?);
        }
    }

    fn step(&mut self) -> Result<Step, XPathError> {
        if self.eat(&Token::Dot) {
            return Ok(Step::new(Axis::SelfAxis, NodeTest::Node));
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step::new(Axis::Parent, NodeTest::Node));
        }
        let axis = if self.eat(&Token::At) {
            Axis::Attribute
        } else if let Some(Token::AxisName(name)) = self.peek() {
            let Some(axis) = Axis::from_name(name) else {
                return Err(self.error(&format!("unsupported axis `{name}`")));
            };
            self.pos += 1;
            self.expect(&Token::ColonColon, "`::`")?;
            axis
        } else {
            Axis::Child
        };
        let node_test = self.node_test()?;
        let predicates = self.predicates()?;
        Ok(Step {
            axis,
            node_test,
            predicates,
        })
    }

    fn node_test(&mut self) -> Result<NodeTest, XPathError> {
        match self.advance() {
            Some(Token::Star) => Ok(NodeTest::Wildcard),
            Some(Token::Name(name)) => Ok(match name.split_once(':') {
                Some((prefix, "*")) => NodeTest::PrefixWildcard(prefix.to_string()),
                Some((prefix, local)) => NodeTest::Name {
                    prefix: Some(prefix.to_string()),
                    local: local.to_string(),
                },
                None => NodeTest::Name {
                    prefix: None,
                    local: name,
                },
            }),
            Some(Token::NodeType(kind)) => {
                self.expect(&Token::LeftParen, "`(`")?;
                let test = match kind.as_str() {
                    "node" => NodeTest::Node,
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    _ => {
                        let target = match self.peek() {
                            Some(Token::Literal(target)) => Some(target.clone()),
                            _ => None,
                        };
                        if target.is_some() {
                            self.pos += 1;
                        }
                        NodeTest::ProcessingInstruction(target)
                    }
                };
                self.expect(&Token::RightParen, "`)`")?;
                Ok(test)
            }
            other => {
                if other.is_some() {
                    self.pos -= 1;
                }
                Err(self.error("expected a node test"))
            }
        }
    }

    fn predicates(&mut self) -> Result<Vec<Expr>, XPathError> {
        let mut predicates = Vec::new();
        while self.eat(&Token::LeftBracket) {
            predicates.push(self.or_expr()?);
            self.expect(&Token::RightBracket, "`]`")?;
        }
        Ok(predicates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn name(local: &str) -> NodeTest {
        NodeTest::Name {
            prefix: None,
            local: local.to_string(),
        }
    }

    #[test]
    fn test_absolute_path() {
        assert_eq!(
            parse("/root/item").unwrap(),
            Expr::Path {
                absolute: true,
                steps: vec![
                    Step::new(Axis::Child, name("root")),
                    Step::new(Axis::Child, name("item")),
                ],
            }
        );
    }

    #[test]
    fn test_bare_root() {
        assert_eq!(
            parse("/").unwrap(),
            Expr::Path {
                absolute: true,
                steps: vec![],
            }
        );
    }

    #[test]
    fn test_double_slash_expands() {
        let Expr::Path { absolute, steps } = parse("//item").unwrap() else {
            panic!("expected a path");
        };
        assert!(absolute);
        assert_eq!(
            steps,
            vec![
                Step::descendant_or_self(),
                Step::new(Axis::Child, name("item")),
            ]
        );
    }

    #[test]
    fn test_abbreviated_steps() {
        let Expr::Path { steps, .. } = parse("../.").unwrap() else {
            panic!("expected a path");
        };
        assert_eq!(steps[0], Step::new(Axis::Parent, NodeTest::Node));
        assert_eq!(steps[1], Step::new(Axis::SelfAxis, NodeTest::Node));
    }

    #[test]
    fn test_predicate_with_function() {
        let Expr::Path { steps, .. } = parse("item[position() = last()]").unwrap() else {
            panic!("expected a path");
        };
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].predicates.len(), 1);
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            parse("1 + 2 * 3").unwrap(),
            Expr::Binary {
                op: BinaryOp::Add,
                left: Box::new(Expr::Number(1.0)),
                right: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    left: Box::new(Expr::Number(2.0)),
                    right: Box::new(Expr::Number(3.0)),
                }),
            }
        );
    }

    #[test]
    fn test_filter_expression_with_steps() {
        let expr = parse("(a | b)[1]/c").unwrap();
        let Expr::Filter {
            primary,
            predicates,
            steps,
        } = expr
        else {
            panic!("expected a filter expression");
        };
        assert!(matches!(*primary, Expr::Union(_, _)));
        assert_eq!(predicates, vec![Expr::Number(1.0)]);
        assert_eq!(steps, vec![Step::new(Axis::Child, name("c"))]);
    }

    #[test]
    fn test_prefixed_tests() {
        let Expr::Path { steps, .. } = parse("atom:feed/atom:*").unwrap() else {
            panic!("expected a path");
        };
        assert_eq!(
            steps[0].node_test,
            NodeTest::Name {
                prefix: Some("atom".into()),
                local: "feed".into(),
            }
        );
        assert_eq!(steps[1].node_test, NodeTest::PrefixWildcard("atom".into()));
    }

    #[test]
    fn test_processing_instruction_target() {
        let Expr::Path { steps, .. } = parse("processing-instruction('pi')").unwrap() else {
            panic!("expected a path");
        };
        assert_eq!(
            steps[0].node_test,
            NodeTest::ProcessingInstruction(Some("pi".into()))
        );
    }

    #[test]
    fn test_errors() {
        assert!(parse("").is_err());
        assert!(parse("   ").is_err());
        assert!(parse("item[").is_err());
        assert!(parse("foo::bar").is_err());
        assert!(parse("a b").is_err());
        assert!(parse("/root/").is_err());
    }
}
