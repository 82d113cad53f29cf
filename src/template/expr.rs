// ABOUTME: Lexer and recursive-descent parser for trusted template expressions
// ABOUTME: Produces an expression AST covering literals, member access, operators and calls

use std::fmt;

use super::error::{Result, TemplateError};
use super::scanner::find_expression_end;
use super::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Template(Vec<TemplatePart>),
    Ident(String),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Member {
        object: Box<Expr>,
        property: String,
        optional: bool,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Text(String),
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TemplateChunk {
    Text(String),
    Expr(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Str(String),
    Template(Vec<TemplateChunk>),
    Ident(String),
    Punct(&'static str),
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "number {}", n),
            Token::Str(s) => write!(f, "string {:?}", s),
            Token::Template(_) => write!(f, "template literal"),
            Token::Ident(name) => write!(f, "identifier '{}'", name),
            Token::Punct(p) => write!(f, "'{}'", p),
            Token::Eof => write!(f, "end of expression"),
        }
    }
}

// Longest punctuators first so that `===` is not lexed as `==` + `=`.
const PUNCTUATORS: &[&str] = &[
    "===", "!==", "?.", "??", "==", "!=", "<=", ">=", "&&", "||", "+", "-", "*", "/", "%", "<",
    ">", "!", "?", ":", ".", ",", "(", ")", "[", "]", "{", "}",
];

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn tokenize(mut self) -> std::result::Result<Vec<Token>, String> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn next_token(&mut self) -> std::result::Result<Token, String> {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();

        let Some(c) = trimmed.chars().next() else {
            return Ok(Token::Eof);
        };

        if c.is_ascii_digit()
            || (c == '.' && trimmed[1..].starts_with(|d: char| d.is_ascii_digit()))
        {
            return self.number();
        }
        if c == '\'' || c == '"' {
            return self.string(c).map(Token::Str);
        }
        if c == '`' {
            return self.template();
        }
        if is_ident_start(c) {
            let len = trimmed
                .find(|ch: char| !is_ident_continue(ch))
                .unwrap_or(trimmed.len());
            self.pos += len;
            return Ok(Token::Ident(trimmed[..len].to_string()));
        }
        for punct in PUNCTUATORS {
            if trimmed.starts_with(punct) {
                // `a?.5:b` is a conditional, not optional chaining
                if *punct == "?." && trimmed[2..].starts_with(|d: char| d.is_ascii_digit()) {
                    continue;
                }
                self.pos += punct.len();
                return Ok(Token::Punct(punct));
            }
        }

        Err(format!("unexpected character '{}'", c))
    }

    fn number(&mut self) -> std::result::Result<Token, String> {
        let rest = self.rest();
        let mut len = 0;
        let mut seen_dot = false;
        let mut seen_exp = false;
        let bytes = rest.as_bytes();

        while len < bytes.len() {
            match bytes[len] {
                b'0'..=b'9' => len += 1,
                b'.' if !seen_dot && !seen_exp => {
                    seen_dot = true;
                    len += 1;
                }
                b'e' | b'E' if !seen_exp => {
                    seen_exp = true;
                    len += 1;
                    if matches!(bytes.get(len), Some(b'+') | Some(b'-')) {
                        len += 1;
                    }
                }
                _ => break,
            }
        }

        let text = &rest[..len];
        let value = text
            .parse::<f64>()
            .map_err(|_| format!("invalid number literal '{}'", text))?;
        self.pos += len;
        Ok(Token::Number(value))
    }

    fn string(&mut self, quote: char) -> std::result::Result<String, String> {
        let mut out = String::new();
        let mut chars = self.rest().char_indices();
        chars.next();

        while let Some((idx, c)) = chars.next() {
            match c {
                '\\' => {
                    let (_, escaped) = chars.next().ok_or("unterminated string literal")?;
                    push_escape(&mut out, escaped, &mut chars)?;
                }
                c if c == quote => {
                    self.pos += idx + c.len_utf8();
                    return Ok(out);
                }
                c => out.push(c),
            }
        }

        Err("unterminated string literal".to_string())
    }

    fn template(&mut self) -> std::result::Result<Token, String> {
        let bytes = self.src.as_bytes();
        let mut chunks = Vec::new();
        let mut text = String::new();
        let mut pos = self.pos + 1;

        loop {
            let Some(c) = self.src[pos..].chars().next() else {
                return Err("unterminated template literal".to_string());
            };
            match c {
                '`' => {
                    if !text.is_empty() {
                        chunks.push(TemplateChunk::Text(text));
                    }
                    self.pos = pos + 1;
                    return Ok(Token::Template(chunks));
                }
                '\\' => {
                    let mut chars = self.src[pos + 1..].char_indices();
                    let (_, escaped) = chars.next().ok_or("unterminated template literal")?;
                    push_escape(&mut text, escaped, &mut chars)?;
                    let consumed = chars.next().map(|(i, _)| i).unwrap_or(self.src.len() - pos - 1);
                    pos += 1 + consumed;
                }
                '$' if bytes.get(pos + 1) == Some(&b'{') => {
                    let end = find_expression_end(bytes, pos + 2)
                        .ok_or("unterminated expression in template literal")?;
                    let inner = self.src[pos + 2..end].trim();
                    if inner.is_empty() {
                        return Err("empty expression in template literal".to_string());
                    }
                    if !text.is_empty() {
                        chunks.push(TemplateChunk::Text(std::mem::take(&mut text)));
                    }
                    chunks.push(TemplateChunk::Expr(inner.to_string()));
                    pos = end + 1;
                }
                c => {
                    text.push(c);
                    pos += c.len_utf8();
                }
            }
        }
    }
}

fn push_escape(
    out: &mut String,
    escaped: char,
    chars: &mut std::str::CharIndices<'_>,
) -> std::result::Result<(), String> {
    match escaped {
        'n' => out.push('\n'),
        't' => out.push('\t'),
        'r' => out.push('\r'),
        '0' => out.push('\0'),
        'b' => out.push('\u{8}'),
        'f' => out.push('\u{c}'),
        'v' => out.push('\u{b}'),
        'u' => {
            let hex: String = chars.by_ref().take(4).map(|(_, c)| c).collect();
            let code = u32::from_str_radix(&hex, 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| format!("invalid unicode escape '\\u{}'", hex))?;
            out.push(code);
        }
        other => out.push(other),
    }
    Ok(())
}

pub(crate) fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

pub(crate) fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Tokenize an expression body
pub(crate) fn tokenize(source: &str) -> std::result::Result<Vec<Token>, String> {
    Lexer::new(source).tokenize()
}

/// Parse a single expression body, as found between `${` and `}`
pub fn parse_expression(source: &str) -> Result<Expr> {
    let syntax = |message: String| TemplateError::SyntaxError {
        expression: source.to_string(),
        message,
    };
    let tokens = tokenize(source).map_err(syntax)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_conditional().map_err(syntax)?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        other => Err(syntax(format!("unexpected {} after expression", other))),
    }
}

type ParseResult<T> = std::result::Result<T, String>;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, punct: &str) -> bool {
        if matches!(self.peek(), Token::Punct(p) if *p == punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> ParseResult<()> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(format!("expected '{}' but found {}", punct, self.peek()))
        }
    }

    fn parse_conditional(&mut self) -> ParseResult<Expr> {
        let test = self.parse_nullish()?;
        if !self.eat("?") {
            return Ok(test);
        }
        let consequent = self.parse_conditional()?;
        self.expect(":")?;
        let alternate = self.parse_conditional()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn parse_binary_level(
        &mut self,
        ops: &[(&str, BinaryOp)],
        next: fn(&mut Self) -> ParseResult<Expr>,
    ) -> ParseResult<Expr> {
        let mut left = next(self)?;
        'outer: loop {
            for (punct, op) in ops {
                if self.eat(punct) {
                    let right = next(self)?;
                    left = Expr::Binary {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn parse_nullish(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(&[("??", BinaryOp::Nullish)], Self::parse_or)
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(&[("||", BinaryOp::Or)], Self::parse_and)
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(&[("&&", BinaryOp::And)], Self::parse_equality)
    }

    fn parse_equality(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(
            &[
                ("===", BinaryOp::StrictEq),
                ("!==", BinaryOp::StrictNe),
                ("==", BinaryOp::Eq),
                ("!=", BinaryOp::Ne),
            ],
            Self::parse_relational,
        )
    }

    fn parse_relational(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(
            &[
                ("<=", BinaryOp::Le),
                (">=", BinaryOp::Ge),
                ("<", BinaryOp::Lt),
                (">", BinaryOp::Gt),
            ],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(
            &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(
            &[
                ("*", BinaryOp::Mul),
                ("/", BinaryOp::Div),
                ("%", BinaryOp::Rem),
            ],
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let op = if self.eat("!") {
            UnaryOp::Not
        } else if self.eat("-") {
            UnaryOp::Neg
        } else if self.eat("+") {
            UnaryOp::Plus
        } else {
            return self.parse_postfix();
        };
        let operand = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(".") {
                let property = self.property_name()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                    optional: false,
                };
            } else if self.eat("?.") {
                if self.eat("[") {
                    let index = self.parse_conditional()?;
                    self.expect("]")?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        optional: true,
                    };
                } else {
                    let property = self.property_name()?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property,
                        optional: true,
                    };
                }
            } else if self.eat("[") {
                let index = self.parse_conditional()?;
                self.expect("]")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                    optional: false,
                };
            } else if self.eat("(") {
                let args = self.parse_list(")")?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn property_name(&mut self) -> ParseResult<String> {
        match self.advance() {
            Token::Ident(name) => Ok(name),
            other => Err(format!("expected property name but found {}", other)),
        }
    }

    fn parse_list(&mut self, close: &str) -> ParseResult<Vec<Expr>> {
        let mut items = Vec::new();
        while !self.eat(close) {
            items.push(self.parse_conditional()?);
            if !self.eat(",") {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        match self.advance() {
            Token::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Template(chunks) => {
                let parts = chunks
                    .into_iter()
                    .map(|chunk| match chunk {
                        TemplateChunk::Text(text) => Ok(TemplatePart::Text(text)),
                        TemplateChunk::Expr(source) => parse_expression(&source)
                            .map(TemplatePart::Expr)
                            .map_err(|e| e.to_string()),
                    })
                    .collect::<ParseResult<Vec<_>>>()?;
                Ok(Expr::Template(parts))
            }
            Token::Ident(name) => Ok(match name.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" => Expr::Literal(Value::Null),
                "undefined" => Expr::Literal(Value::Undefined),
                _ => Expr::Ident(name),
            }),
            Token::Punct("(") => {
                let inner = self.parse_conditional()?;
                self.expect(")")?;
                Ok(inner)
            }
            Token::Punct("[") => Ok(Expr::Array(self.parse_list("]")?)),
            Token::Punct("{") => self.parse_object(),
            other => Err(format!("unexpected {}", other)),
        }
    }

    fn parse_object(&mut self) -> ParseResult<Expr> {
        let mut entries = Vec::new();
        while !self.eat("}") {
            let (key, shorthand) = match self.advance() {
                Token::Ident(name) => (name, true),
                Token::Str(s) => (s, false),
                Token::Number(n) => (super::value::format_number(n), false),
                other => return Err(format!("expected object key but found {}", other)),
            };

            let value = if self.eat(":") {
                self.parse_conditional()?
            } else if shorthand {
                Expr::Ident(key.clone())
            } else {
                return Err(format!("expected ':' after object key '{}'", key));
            };
            entries.push((key, value));

            if !self.eat(",") {
                self.expect("}")?;
                break;
            }
        }
        Ok(Expr::Object(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Ident(name.to_string()))
    }

    #[test]
    fn test_member_chain() {
        let expr = parse_expression("globals.app").unwrap();
        assert_eq!(
            expr,
            Expr::Member {
                object: ident("globals"),
                property: "app".to_string(),
                optional: false
            }
        );
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expression("1 + 2 * 3").unwrap();
        match expr {
            Expr::Binary {
                op: BinaryOp::Add,
                right,
                ..
            } => assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. })),
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_call_with_object_literal() {
        let expr = parse_expression(r#"partial("footer", {text: "hi", n})"#).unwrap();
        match expr {
            Expr::Call { callee, args } => {
                assert_eq!(callee, ident("partial"));
                assert_eq!(args.len(), 2);
                assert_eq!(
                    args[1],
                    Expr::Object(vec![
                        ("text".to_string(), Expr::Literal(Value::from("hi"))),
                        ("n".to_string(), Expr::Ident("n".to_string())),
                    ])
                );
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_string_escapes() {
        let expr = parse_expression(r#"'it\'s\nA'"#).unwrap();
        assert_eq!(expr, Expr::Literal(Value::from("it's\nA")));
    }

    #[test]
    fn test_template_literal_parts() {
        let expr = parse_expression("`a ${b} c`").unwrap();
        assert_eq!(
            expr,
            Expr::Template(vec![
                TemplatePart::Text("a ".to_string()),
                TemplatePart::Expr(Expr::Ident("b".to_string())),
                TemplatePart::Text(" c".to_string()),
            ])
        );
    }

    #[test]
    fn test_conditional_and_optional_chain() {
        assert!(matches!(
            parse_expression("a ? b : c").unwrap(),
            Expr::Conditional { .. }
        ));
        assert!(matches!(
            parse_expression("a?.b").unwrap(),
            Expr::Member { optional: true, .. }
        ));
        assert!(matches!(
            parse_expression("a?.5:1").unwrap(),
            Expr::Conditional { .. }
        ));
    }

    #[test]
    fn test_syntax_errors() {
        for source in ["a +", "(a", "a b", "{a: }", "'open", "a ? b", "#"] {
            let err = parse_expression(source).unwrap_err();
            assert!(
                matches!(err, TemplateError::SyntaxError { .. }),
                "expected syntax error for {:?}, got {:?}",
                source,
                err
            );
        }
    }
}
