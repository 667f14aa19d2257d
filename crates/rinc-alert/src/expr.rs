//! Boolean expressions evaluated against a dynamic JSON context.
//!
//! The grammar covers literals, variables with `.field`/`[index]` access,
//! function calls, arithmetic (`+ - * / % **`), comparison
//! (`== != < <= > >= in =~ !~`), logic (`&& || !`), nil coalescing (`??`)
//! and the ternary `cond ? a : b`.
//!
//! ```
//! use rinc_alert::expr::Expr;
//! use serde_json::json;
//!
//! let expr = Expr::compile(r#"len(jobs) > 0 && jobs[0].namespace == "batch""#).unwrap();
//! let ctx = json!({"jobs": [{"name": "j1", "namespace": "batch"}]});
//! assert!(expr.evaluate_bool(&ctx).unwrap());
//! ```

use crate::error::{CompileError, EvalError};
use crate::functions::Functions;
use crate::value::{self, lookup, type_name};
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

/// A compiled expression together with its source text.
#[derive(Clone)]
pub struct Expr {
    source: String,
    root: Node,
    functions: Arc<Functions>,
}

impl Expr {
    /// Compiles `source` against the standard function set.
    pub fn compile(source: &str) -> Result<Self, CompileError> {
        Self::compile_with(source, standard_functions())
    }

    /// Compiles `source`, resolving calls against `functions`.
    pub fn compile_with(source: &str, functions: Arc<Functions>) -> Result<Self, CompileError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(CompileError::Empty);
        }
        let tokens = lex(source)?;
        let mut parser = Parser {
            source,
            tokens,
            pos: 0,
            functions: &functions,
        };
        let root = parser.parse_ternary()?;
        if let Some(tok) = parser.peek() {
            return Err(parser.error_at(tok.offset, format!("unexpected {}", tok.kind)));
        }
        Ok(Self {
            source: source.to_string(),
            root,
            functions,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates the expression and returns the resulting value.
    pub fn evaluate(&self, ctx: &Value) -> Result<Value, EvalError> {
        let eval = Evaluator {
            ctx,
            functions: &self.functions,
        };
        eval.eval(&self.root).map(Cow::into_owned)
    }

    /// Evaluates the expression and requires a boolean result.
    pub fn evaluate_bool(&self, ctx: &Value) -> Result<bool, EvalError> {
        match self.evaluate(ctx)? {
            Value::Bool(b) => Ok(b),
            other => Err(EvalError::NotBoolean(type_name(&other))),
        }
    }
}

impl FromStr for Expr {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

impl std::fmt::Debug for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Expr").field(&self.source).finish()
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

fn standard_functions() -> Arc<Functions> {
    static STANDARD: OnceLock<Arc<Functions>> = OnceLock::new();
    Arc::clone(STANDARD.get_or_init(|| Arc::new(Functions::standard())))
}

// ---- Lexer ----

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "number {n}"),
            TokenKind::Str(s) => write!(f, "string {s:?}"),
            TokenKind::Ident(s) => write!(f, "identifier `{s}`"),
            TokenKind::Op(op) => write!(f, "`{op}`"),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

/// Longest operators first so `**` wins over `*`.
const OPERATORS: &[&str] = &[
    "**", "==", "!=", "<=", ">=", "&&", "||", "=~", "!~", "??", "+", "-", "*", "/", "%", "<",
    ">", "!", "(", ")", "[", "]", ",", ".", "?", ":",
];

fn lex(source: &str) -> Result<Vec<Token>, CompileError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;

        if c.is_ascii_digit() {
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                // `1.foo` is not a number; stop before a dot not followed by a digit.
                if bytes[i] == b'.' && !bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
                    break;
                }
                i += 1;
            }
            if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                let mut j = i + 1;
                if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                    j += 1;
                }
                if j < bytes.len() && bytes[j].is_ascii_digit() {
                    i = j;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text = &source[start..i];
            let n = text.parse::<f64>().map_err(|_| CompileError::Syntax {
                source_text: source.to_string(),
                offset: start,
                message: format!("invalid number {text:?}"),
            })?;
            tokens.push(Token {
                kind: TokenKind::Number(n),
                offset: start,
            });
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            tokens.push(Token {
                kind: TokenKind::Ident(source[start..i].to_string()),
                offset: start,
            });
            continue;
        }

        if c == b'"' || c == b'\'' {
            let (s, end) = lex_string(source, start)?;
            tokens.push(Token {
                kind: TokenKind::Str(s),
                offset: start,
            });
            i = end;
            continue;
        }

        let rest = &source[i..];
        match OPERATORS.iter().find(|op| rest.starts_with(**op)) {
            Some(op) => {
                tokens.push(Token {
                    kind: TokenKind::Op(*op),
                    offset: start,
                });
                i += op.len();
            }
            None => {
                let ch = rest.chars().next().unwrap_or_default();
                return Err(CompileError::Syntax {
                    source_text: source.to_string(),
                    offset: start,
                    message: format!("unexpected character {ch:?}"),
                });
            }
        }
    }

    Ok(tokens)
}

/// Lexes a quoted string starting at `start`; returns the unescaped text and
/// the offset just past the closing quote.
fn lex_string(source: &str, start: usize) -> Result<(String, usize), CompileError> {
    let mut chars = source[start..].char_indices();
    let quote = chars.next().map(|(_, c)| c).unwrap_or('"');
    let mut out = String::new();
    let unterminated = || CompileError::Syntax {
        source_text: source.to_string(),
        offset: start,
        message: "unterminated string".to_string(),
    };

    while let Some((idx, c)) = chars.next() {
        match c {
            '\\' => {
                let (_, esc) = chars.next().ok_or_else(unterminated)?;
                out.push(match esc {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => other,
                });
            }
            c if c == quote => return Ok((out, start + idx + c.len_utf8())),
            c => out.push(c),
        }
    }
    Err(unterminated())
}

// ---- AST ----

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Pow => "**",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::In => "in",
        }
    }
}

#[derive(Debug, Clone)]
enum Pattern {
    Literal(Regex),
    Dynamic(Box<Node>),
}

#[derive(Debug, Clone)]
enum Node {
    Literal(Value),
    Array(Vec<Node>),
    Var(String),
    Field(Box<Node>, String),
    Index(Box<Node>, Box<Node>),
    Call(String, Vec<Node>),
    Neg(Box<Node>),
    Not(Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Coalesce(Box<Node>, Box<Node>),
    Match {
        negate: bool,
        subject: Box<Node>,
        pattern: Pattern,
    },
    Ternary(Box<Node>, Box<Node>, Box<Node>),
}

// ---- Parser ----

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    functions: &'a Functions,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_op(&self) -> Option<&'static str> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Op(op),
                ..
            }) => Some(*op),
            _ => None,
        }
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.peek_op() == Some(op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> Result<(), CompileError> {
        if self.eat_op(op) {
            return Ok(());
        }
        Err(self.unexpected(&format!("expected `{op}`")))
    }

    fn error_at(&self, offset: usize, message: String) -> CompileError {
        CompileError::Syntax {
            source_text: self.source.to_string(),
            offset,
            message,
        }
    }

    fn unexpected(&self, expected: &str) -> CompileError {
        match self.peek() {
            Some(tok) => self.error_at(tok.offset, format!("{expected}, found {}", tok.kind)),
            None => self.error_at(self.source.len(), format!("{expected}, found end of input")),
        }
    }

    fn parse_ternary(&mut self) -> Result<Node, CompileError> {
        let cond = self.parse_coalesce()?;
        if !self.eat_op("?") {
            return Ok(cond);
        }
        let then = self.parse_ternary()?;
        self.expect_op(":")?;
        let otherwise = self.parse_ternary()?;
        Ok(Node::Ternary(Box::new(cond), Box::new(then), Box::new(otherwise)))
    }

    fn parse_coalesce(&mut self) -> Result<Node, CompileError> {
        let mut left = self.parse_or()?;
        while self.eat_op("??") {
            let right = self.parse_or()?;
            left = Node::Coalesce(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Node, CompileError> {
        let mut left = self.parse_and()?;
        while self.eat_op("||") {
            let right = self.parse_and()?;
            left = Node::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Node, CompileError> {
        let mut left = self.parse_comparison()?;
        while self.eat_op("&&") {
            let right = self.parse_comparison()?;
            left = Node::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Node, CompileError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Op("==")) => BinaryOp::Eq,
                Some(TokenKind::Op("!=")) => BinaryOp::Ne,
                Some(TokenKind::Op("<")) => BinaryOp::Lt,
                Some(TokenKind::Op("<=")) => BinaryOp::Le,
                Some(TokenKind::Op(">")) => BinaryOp::Gt,
                Some(TokenKind::Op(">=")) => BinaryOp::Ge,
                Some(TokenKind::Ident(word)) if word == "in" => BinaryOp::In,
                Some(TokenKind::Op(op @ ("=~" | "!~"))) => {
                    let negate = *op == "!~";
                    self.pos += 1;
                    let offset = self.peek().map_or(self.source.len(), |t| t.offset);
                    let pattern = match self.parse_additive()? {
                        Node::Literal(Value::String(re)) => {
                            Pattern::Literal(Regex::new(&re).map_err(|e| CompileError::Regex {
                                source_text: self.source.to_string(),
                                message: format!("{e} (at offset {offset})"),
                            })?)
                        }
                        other => Pattern::Dynamic(Box::new(other)),
                    };
                    left = Node::Match {
                        negate,
                        subject: Box::new(left),
                        pattern,
                    };
                    continue;
                }
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_additive()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_additive(&mut self) -> Result<Node, CompileError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_op() {
                Some("+") => BinaryOp::Add,
                Some("-") => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Node, CompileError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_op() {
                Some("*") => BinaryOp::Mul,
                Some("/") => BinaryOp::Div,
                Some("%") => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<Node, CompileError> {
        if self.eat_op("-") {
            return Ok(Node::Neg(Box::new(self.parse_unary()?)));
        }
        if self.eat_op("!") {
            return Ok(Node::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_power()
    }

    /// `**` is right-associative and binds tighter than unary minus on its
    /// left: `-2 ** 2 == -4`.
    fn parse_power(&mut self) -> Result<Node, CompileError> {
        let base = self.parse_postfix()?;
        if self.eat_op("**") {
            let exponent = self.parse_unary()?;
            return Ok(Node::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Node, CompileError> {
        let mut node = self.parse_primary()?;
        loop {
            if self.eat_op(".") {
                match self.peek().map(|t| t.kind.clone()) {
                    Some(TokenKind::Ident(name)) => {
                        self.pos += 1;
                        node = Node::Field(Box::new(node), name);
                    }
                    _ => return Err(self.unexpected("expected field name after `.`")),
                }
            } else if self.eat_op("[") {
                let index = self.parse_ternary()?;
                self.expect_op("]")?;
                node = Node::Index(Box::new(node), Box::new(index));
            } else {
                return Ok(node);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Node, CompileError> {
        let Some(tok) = self.peek().cloned() else {
            return Err(self.unexpected("expected a value"));
        };
        self.pos += 1;
        match tok.kind {
            TokenKind::Number(n) => value::number(n)
                .map(Node::Literal)
                .map_err(|e| self.error_at(tok.offset, e.to_string())),
            TokenKind::Str(s) => Ok(Node::Literal(Value::String(s))),
            TokenKind::Ident(name) => match name.as_str() {
                "true" => Ok(Node::Literal(Value::Bool(true))),
                "false" => Ok(Node::Literal(Value::Bool(false))),
                "nil" | "null" => Ok(Node::Literal(Value::Null)),
                _ if self.peek_op() == Some("(") => {
                    if !self.functions.contains(&name) {
                        return Err(CompileError::UnknownFunction {
                            source_text: self.source.to_string(),
                            name,
                        });
                    }
                    self.pos += 1;
                    let args = self.parse_list(")")?;
                    Ok(Node::Call(name, args))
                }
                _ => Ok(Node::Var(name)),
            },
            TokenKind::Op("(") => {
                let inner = self.parse_ternary()?;
                self.expect_op(")")?;
                Ok(inner)
            }
            TokenKind::Op("[") => Ok(Node::Array(self.parse_list("]")?)),
            other => Err(self.error_at(tok.offset, format!("unexpected {other}"))),
        }
    }

    /// Parses comma-separated expressions up to and including `close`.
    fn parse_list(&mut self, close: &str) -> Result<Vec<Node>, CompileError> {
        let mut items = Vec::new();
        if self.eat_op(close) {
            return Ok(items);
        }
        loop {
            items.push(self.parse_ternary()?);
            if self.eat_op(close) {
                return Ok(items);
            }
            self.expect_op(",")?;
        }
    }
}

// ---- Evaluator ----

struct Evaluator<'c> {
    ctx: &'c Value,
    functions: &'c Functions,
}

impl<'c> Evaluator<'c> {
    fn eval<'n>(&self, node: &'n Node) -> Result<Cow<'c, Value>, EvalError> {
        match node {
            Node::Literal(v) => Ok(Cow::Owned(v.clone())),
            Node::Array(items) => items
                .iter()
                .map(|item| self.eval(item).map(Cow::into_owned))
                .collect::<Result<Vec<_>, _>>()
                .map(|items| Cow::Owned(Value::Array(items))),
            Node::Var(name) => self
                .ctx
                .as_object()
                .and_then(|root| lookup(root, name))
                .map(Cow::Borrowed)
                .ok_or_else(|| EvalError::UnknownVariable(name.clone())),
            Node::Field(base, field) => {
                let base = self.eval(base)?;
                field_of(base, field)
            }
            Node::Index(base, index) => {
                let base = self.eval(base)?;
                let index = self.eval(index)?;
                index_of(base, &index)
            }
            Node::Call(name, args) => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg).map(Cow::into_owned))
                    .collect::<Result<Vec<_>, _>>()?;
                let func = self.functions.get(name).ok_or_else(|| EvalError::Function {
                    name: name.clone(),
                    message: "not registered".to_string(),
                })?;
                func(args.as_slice())
                    .map(Cow::Owned)
                    .map_err(|message| EvalError::Function {
                        name: name.clone(),
                        message,
                    })
            }
            Node::Neg(inner) => match self.eval(inner)?.as_ref() {
                Value::Number(n) => {
                    value::number(-n.as_f64().unwrap_or_default()).map(Cow::Owned)
                }
                other => Err(EvalError::InvalidOperand {
                    op: "-",
                    operand: type_name(other),
                }),
            },
            Node::Not(inner) => {
                let b = self.eval_bool(inner, "!")?;
                Ok(Cow::Owned(Value::Bool(!b)))
            }
            Node::And(left, right) => {
                let result = self.eval_bool(left, "&&")? && self.eval_bool(right, "&&")?;
                Ok(Cow::Owned(Value::Bool(result)))
            }
            Node::Or(left, right) => {
                let result = self.eval_bool(left, "||")? || self.eval_bool(right, "||")?;
                Ok(Cow::Owned(Value::Bool(result)))
            }
            Node::Coalesce(left, right) => match self.eval(left) {
                Ok(v) if !v.is_null() => Ok(v),
                Ok(_)
                | Err(EvalError::UnknownVariable(_))
                | Err(EvalError::MissingField { .. })
                | Err(EvalError::IndexOutOfRange { .. }) => self.eval(right),
                Err(e) => Err(e),
            },
            Node::Ternary(cond, then, otherwise) => {
                if self.eval_bool(cond, "?:")? {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Node::Match {
                negate,
                subject,
                pattern,
            } => {
                let op = if *negate { "!~" } else { "=~" };
                let subject = self.eval(subject)?;
                let Value::String(text) = subject.as_ref() else {
                    return Err(EvalError::InvalidOperand {
                        op,
                        operand: type_name(&subject),
                    });
                };
                let matched = match pattern {
                    Pattern::Literal(re) => re.is_match(text),
                    Pattern::Dynamic(node) => {
                        let pattern = self.eval(node)?;
                        let Value::String(re) = pattern.as_ref() else {
                            return Err(EvalError::TypeMismatch {
                                op,
                                left: "string",
                                right: type_name(&pattern),
                            });
                        };
                        Regex::new(re)
                            .map_err(|e| EvalError::InvalidRegex(e.to_string()))?
                            .is_match(text)
                    }
                };
                Ok(Cow::Owned(Value::Bool(matched != *negate)))
            }
            Node::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, &left, &right).map(Cow::Owned)
            }
        }
    }

    fn eval_bool(&self, node: &Node, op: &'static str) -> Result<bool, EvalError> {
        match self.eval(node)?.as_ref() {
            Value::Bool(b) => Ok(*b),
            other => Err(EvalError::InvalidOperand {
                op,
                operand: type_name(other),
            }),
        }
    }
}

fn field_of<'c>(base: Cow<'c, Value>, field: &str) -> Result<Cow<'c, Value>, EvalError> {
    let missing = |on| EvalError::MissingField {
        field: field.to_string(),
        on,
    };
    match base {
        Cow::Borrowed(v) => match v {
            Value::Object(o) => lookup(o, field).map(Cow::Borrowed).ok_or(missing("object")),
            other => Err(missing(type_name(other))),
        },
        Cow::Owned(v) => match v {
            Value::Object(o) => lookup(&o, field)
                .cloned()
                .map(Cow::Owned)
                .ok_or(missing("object")),
            other => Err(missing(type_name(&other))),
        },
    }
}

fn index_of<'c>(base: Cow<'c, Value>, index: &Value) -> Result<Cow<'c, Value>, EvalError> {
    if let Value::String(key) = index {
        if base.is_object() {
            return field_of(base, key);
        }
    }
    let (Value::Array(items), Value::Number(n)) = (base.as_ref(), index) else {
        return Err(EvalError::TypeMismatch {
            op: "[]",
            left: type_name(&base),
            right: type_name(index),
        });
    };
    let len = items.len();
    let raw = n.as_f64().unwrap_or(-1.0);
    let pos = raw as i64;
    if raw.fract() != 0.0 || pos < 0 || pos as usize >= len {
        return Err(EvalError::IndexOutOfRange { index: pos, len });
    }
    let pos = pos as usize;
    Ok(match base {
        Cow::Borrowed(v) => Cow::Borrowed(&v[pos]),
        Cow::Owned(mut v) => Cow::Owned(v[pos].take()),
    })
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let mismatch = || EvalError::TypeMismatch {
        op: op.symbol(),
        left: type_name(left),
        right: type_name(right),
    };

    match op {
        BinaryOp::Eq => return Ok(Value::Bool(value::equals(left, right))),
        BinaryOp::Ne => return Ok(Value::Bool(!value::equals(left, right))),
        BinaryOp::In => {
            let found = match right {
                Value::Array(items) => items.iter().any(|item| value::equals(left, item)),
                Value::Object(o) => match left {
                    Value::String(key) => lookup(o, key).is_some(),
                    _ => return Err(mismatch()),
                },
                Value::String(haystack) => match left {
                    Value::String(needle) => haystack.contains(needle.as_str()),
                    _ => return Err(mismatch()),
                },
                _ => return Err(mismatch()),
            };
            return Ok(Value::Bool(found));
        }
        _ => {}
    }

    if let (Value::String(l), Value::String(r)) = (left, right) {
        return match op {
            BinaryOp::Add => Ok(Value::String(format!("{l}{r}"))),
            BinaryOp::Lt => Ok(Value::Bool(l < r)),
            BinaryOp::Le => Ok(Value::Bool(l <= r)),
            BinaryOp::Gt => Ok(Value::Bool(l > r)),
            BinaryOp::Ge => Ok(Value::Bool(l >= r)),
            _ => Err(mismatch()),
        };
    }

    let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) else {
        return Err(mismatch());
    };
    match op {
        BinaryOp::Add => value::number(l + r),
        BinaryOp::Sub => value::number(l - r),
        BinaryOp::Mul => value::number(l * r),
        BinaryOp::Div if r == 0.0 => Err(EvalError::DivisionByZero),
        BinaryOp::Div => value::number(l / r),
        BinaryOp::Rem if r == 0.0 => Err(EvalError::DivisionByZero),
        BinaryOp::Rem => value::number(l % r),
        BinaryOp::Pow => value::number(l.powf(r)),
        BinaryOp::Lt => Ok(Value::Bool(l < r)),
        BinaryOp::Le => Ok(Value::Bool(l <= r)),
        BinaryOp::Gt => Ok(Value::Bool(l > r)),
        BinaryOp::Ge => Ok(Value::Bool(l >= r)),
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::In => Err(mismatch()),
    }
}
