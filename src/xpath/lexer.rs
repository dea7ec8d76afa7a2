//! `XPath` 1.0 expression tokenizer.
//!
//! The lexer applies the disambiguation rules of `XPath` 1.0 section 3.7:
//!
//! - `and`, `or`, `mod` and `div` are operators only when the preceding
//!   token could end an operand.
//! - A name followed by `(` is a function name or node type test.
//! - A name followed by `::` is an axis name.
//!
//! `*` is always emitted as [`Token::Star`]; the parser tells multiplication
//! from a wildcard by position.

use super::types::XPathError;

/// Names that start a node type test when followed by `(`.
const NODE_TYPE_NAMES: &[&str] = &["comment", "text", "processing-instruction", "node"];

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `.`
    Dot,
    /// `..`
    DotDot,
    /// `@`
    At,
    /// `,`
    Comma,
    /// `::`
    ColonColon,
    /// `/`
    Slash,
    /// `//`
    DoubleSlash,
    /// `|`
    Pipe,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`, either a wildcard or multiplication.
    Star,
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
    /// `and`
    And,
    /// `or`
    Or,
    /// `mod`
    Mod,
    /// `div`
    Div,
    /// A numeric literal.
    Number(f64),
    /// A quoted string literal, without quotes.
    Literal(String),
    /// `$name`, without the `$`.
    Variable(String),
    /// A name test: `name`, `prefix:name` or `prefix:*`.
    Name(String),
    /// A function name (a name followed by `(`).
    FunctionName(String),
    /// A node type test name (`node`, `text`, ...).
    NodeType(String),
    /// An axis name (a name followed by `::`).
    AxisName(String),
}

impl Token {
    /// Whether the token can end an operand, which makes a following name an
    /// operator.
    fn ends_operand(&self) -> bool {
        matches!(
            self,
            Self::RightParen
                | Self::RightBracket
                | Self::Dot
                | Self::DotDot
                | Self::Number(_)
                | Self::Literal(_)
                | Self::Variable(_)
                | Self::Name(_)
        )
    }
}

/// A token with its byte offset in the expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    /// The token.
    pub token: Token,
    /// 0-based byte offset of the token start.
    pub position: usize,
}

/// Splits an expression into tokens.
///
/// # Errors
///
/// Returns [`XPathError::Syntax`] on an unterminated literal or a character
/// that cannot start a token.
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, XPathError> {
    Lexer {
        input,
        bytes: input.as_bytes(),
        pos: 0,
        tokens: Vec::new(),
        // A `*` right after an operand is multiplication, which itself ends
        // nothing; track that separately from the token kind.
        star_is_operand: Vec::new(),
    }
    .run()
}

struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    tokens: Vec<Spanned>,
    star_is_operand: Vec<bool>,
}

impl Lexer<'_> {
    fn run(mut self) -> Result<Vec<Spanned>, XPathError> {
        loop {
            self.skip_whitespace();
            let Some(&b) = self.bytes.get(self.pos) else {
                return Ok(self.tokens);
            };
            let start = self.pos;
            let token = match b {
                b'(' => self.single(Token::LeftParen),
                b')' => self.single(Token::RightParen),
                b'[' => self.single(Token::LeftBracket),
                b']' => self.single(Token::RightBracket),
                b'@' => self.single(Token::At),
                b',' => self.single(Token::Comma),
                b'|' => self.single(Token::Pipe),
                b'+' => self.single(Token::Plus),
                b'-' => self.single(Token::Minus),
                b'=' => self.single(Token::Equal),
                b'*' => self.single(Token::Star),
                b'/' => self.one_or_two(b'/', Token::Slash, Token::DoubleSlash),
                b'<' => self.one_or_two(b'=', Token::Less, Token::LessEqual),
                b'>' => self.one_or_two(b'=', Token::Greater, Token::GreaterEqual),
                b'!' if self.peek_at(1) == Some(b'=') => {
                    self.pos += 2;
                    Token::NotEqual
                }
                b':' if self.peek_at(1) == Some(b':') => {
                    self.pos += 2;
                    Token::ColonColon
                }
                b'.' => match self.peek_at(1) {
                    Some(b'.') => {
                        self.pos += 2;
                        Token::DotDot
                    }
                    Some(d) if d.is_ascii_digit() => self.number(),
                    _ => self.single(Token::Dot),
                },
                b'"' | b'\'' => self.literal(b)?,
                b'$' => {
                    self.pos += 1;
                    let name = self.qname();
                    if name.is_empty() {
                        return Err(self.error(start, "expected variable name after `$`"));
                    }
                    Token::Variable(name)
                }
                d if d.is_ascii_digit() => self.number(),
                _ => {
                    let name = self.qname();
                    if name.is_empty() {
                        let c = self.input[start..].chars().next().unwrap_or('?');
                        return Err(self.error(start, &format!("unexpected character `{c}`")));
                    }
                    self.classify_name(name)
                }
            };
            let star_operand = token == Token::Star && !self.previous_ends_operand();
            self.star_is_operand.push(star_operand);
            self.tokens.push(Spanned {
                token,
                position: start,
            });
        }
    }

    fn previous_ends_operand(&self) -> bool {
        match (self.tokens.last(), self.star_is_operand.last()) {
            (Some(Spanned { token: Token::Star, .. }), Some(&operand)) => operand,
            (Some(last), _) => last.token.ends_operand(),
            (None, _) => false,
        }
    }

    fn classify_name(&mut self, name: String) -> Token {
        if self.previous_ends_operand() {
            match name.as_str() {
                "and" => return Token::And,
                "or" => return Token::Or,
                "mod" => return Token::Mod,
                "div" => return Token::Div,
                _ => {}
            }
        }
        let save = self.pos;
        self.skip_whitespace();
        let next = self.peek_at(0);
        let after = self.peek_at(1);
        self.pos = save;
        if next == Some(b'(') && !name.ends_with(":*") {
            if NODE_TYPE_NAMES.contains(&name.as_str()) {
                Token::NodeType(name)
            } else {
                Token::FunctionName(name)
            }
        } else if next == Some(b':') && after == Some(b':') {
            Token::AxisName(name)
        } else {
            Token::Name(name)
        }
    }

    fn single(&mut self, token: Token) -> Token {
        self.pos += 1;
        token
    }

    fn one_or_two(&mut self, second: u8, one: Token, two: Token) -> Token {
        if self.peek_at(1) == Some(second) {
            self.pos += 2;
            two
        } else {
            self.pos += 1;
            one
        }
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek_at(0), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn number(&mut self) -> Token {
        let start = self.pos;
        while matches!(self.peek_at(0), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        if self.peek_at(0) == Some(b'.') {
            self.pos += 1;
            while matches!(self.peek_at(0), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
        }
        Token::Number(self.input[start..self.pos].parse().unwrap_or(f64::NAN))
    }

    fn literal(&mut self, quote: u8) -> Result<Token, XPathError> {
        let start = self.pos;
        self.pos += 1;
        let body_start = self.pos;
        while let Some(b) = self.peek_at(0) {
            if b == quote {
                let text = self.input[body_start..self.pos].to_string();
                self.pos += 1;
                return Ok(Token::Literal(text));
            }
            self.pos += 1;
        }
        Err(self.error(start, "unterminated string literal"))
    }

    /// Reads an `NCName`, optionally followed by `:NCName` or `:*`.
    fn qname(&mut self) -> String {
        let start = self.pos;
        self.ncname();
        if self.pos == start {
            return String::new();
        }
        if self.peek_at(0) == Some(b':') && self.peek_at(1) != Some(b':') {
            let colon = self.pos;
            self.pos += 1;
            if self.peek_at(0) == Some(b'*') {
                self.pos += 1;
            } else {
                let local = self.pos;
                self.ncname();
                if self.pos == local {
                    self.pos = colon;
                }
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn ncname(&mut self) {
        let rest = &self.input[self.pos..];
        for (i, c) in rest.char_indices() {
            let ok = if i == 0 {
                c == '_' || c.is_alphabetic()
            } else {
                c == '_' || c == '-' || c == '.' || c.is_alphanumeric()
            };
            if !ok {
                self.pos += i;
                return;
            }
        }
        self.pos += rest.len();
    }

    fn error(&self, position: usize, message: &str) -> XPathError {
        XPathError::Syntax {
            message: message.to_string(),
            position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(input: &str) -> Vec<Token> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_simple_path() {
        assert_eq!(
            tokens("/root/item"),
            vec![
                Token::Slash,
                Token::Name("root".into()),
                Token::Slash,
                Token::Name("item".into()),
            ]
        );
    }

    #[test]
    fn test_axis_and_node_type() {
        assert_eq!(
            tokens("following-sibling::node()[1]"),
            vec![
                Token::AxisName("following-sibling".into()),
                Token::ColonColon,
                Token::NodeType("node".into()),
                Token::LeftParen,
                Token::RightParen,
                Token::LeftBracket,
                Token::Number(1.0),
                Token::RightBracket,
            ]
        );
    }

    #[test]
    fn test_operator_names_after_operand() {
        assert_eq!(
            tokens("a and div"),
            vec![
                Token::Name("a".into()),
                Token::And,
                Token::Name("div".into()),
            ]
        );
        assert_eq!(
            tokens("6 div 2"),
            vec![Token::Number(6.0), Token::Div, Token::Number(2.0)]
        );
    }

    #[test]
    fn test_star_followed_by_operator() {
        assert_eq!(
            tokens("* and *"),
            vec![Token::Star, Token::And, Token::Star]
        );
        assert_eq!(
            tokens("2 * 3"),
            vec![Token::Number(2.0), Token::Star, Token::Number(3.0)]
        );
    }

    #[test]
    fn test_prefixed_names() {
        assert_eq!(
            tokens("atom:entry | atom:*"),
            vec![
                Token::Name("atom:entry".into()),
                Token::Pipe,
                Token::Name("atom:*".into()),
            ]
        );
    }

    #[test]
    fn test_literals_and_variables() {
        assert_eq!(
            tokens(r#"concat("a", 'b', $x)"#),
            vec![
                Token::FunctionName("concat".into()),
                Token::LeftParen,
                Token::Literal("a".into()),
                Token::Comma,
                Token::Literal("b".into()),
                Token::Comma,
                Token::Variable("x".into()),
                Token::RightParen,
            ]
        );
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(
            tokens("a != b <= c"),
            vec![
                Token::Name("a".into()),
                Token::NotEqual,
                Token::Name("b".into()),
                Token::LessEqual,
                Token::Name("c".into()),
            ]
        );
    }

    #[test]
    fn test_unterminated_literal() {
        let err = tokenize("'abc").unwrap_err();
        assert!(matches!(err, XPathError::Syntax { position: 0, .. }));
    }

    #[test]
    fn test_unexpected_character() {
        assert!(tokenize("a # b").is_err());
    }
}
