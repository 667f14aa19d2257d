//! Alert message templates in Go `text/template` syntax.
//!
//! Supported: `{{ pipeline }}` interpolation, `{{-`/`-}}` whitespace
//! trimming, `{{/* comments */}}`, `if`/`else if`/`else`/`end`,
//! `range`/`else`/`end`,
//! field chains (`.Status.Health`, `$.Jobs`), string/number/bool literals,
//! parenthesized pipelines and `|` pipes. Functions: `len`, `index`,
//! `printf`, `lower`, `upper`, `not`, `and`, `or`, `eq`, `ne`, `lt`, `le`,
//! `gt`, `ge`.
//!
//! ```
//! use rinc_alert::template::Template;
//! use serde_json::json;
//!
//! let tpl = Template::compile("{{len .Jobs}} stale jobs").unwrap();
//! assert_eq!(tpl.render(&json!({"jobs": [{"name": "j1"}]})).unwrap(), "1 stale jobs");
//! ```

use crate::error::{CompileError, RenderError};
use crate::value::{self, display, lookup, truthy, type_name};
use serde_json::Value;
use std::cmp::Ordering;
use std::str::FromStr;

const FUNCTIONS: &[&str] = &[
    "len", "index", "printf", "lower", "upper", "not", "and", "or", "eq", "ne", "lt", "le", "gt",
    "ge",
];

/// A compiled message template.
#[derive(Clone, Default)]
pub struct Template {
    source: String,
    parts: Vec<Part>,
}

#[derive(Debug, Clone)]
enum Part {
    Text(String),
    Action(Pipeline),
    If {
        cond: Pipeline,
        then: Vec<Part>,
        otherwise: Vec<Part>,
    },
    Range {
        over: Pipeline,
        body: Vec<Part>,
        otherwise: Vec<Part>,
    },
}

type Pipeline = Vec<Command>;

/// One pipeline stage; a function call when the first operand is `Func`.
#[derive(Debug, Clone)]
struct Command(Vec<Operand>);

#[derive(Debug, Clone)]
enum Operand {
    /// Field chain relative to the current dot; empty for `.` itself.
    Dot(Vec<String>),
    /// Field chain relative to the root context (`$`).
    Root(Vec<String>),
    Literal(Value),
    Func(&'static str),
    Paren(Pipeline),
}

impl Template {
    /// Compiles `source`. Surrounding whitespace is ignored; an empty source
    /// yields a template that renders to an empty string.
    pub fn compile(source: &str) -> Result<Self, CompileError> {
        let source = source.trim();
        let err = |message: String| CompileError::Template {
            source_text: source.to_string(),
            message,
        };

        let segments = split(source).map_err(err)?;
        let mut parser = Parser { segments, pos: 0 };
        let (parts, terminator) = parser.parse_list().map_err(err)?;
        if let Some(t) = terminator {
            return Err(err(format!("unexpected {{{{{t}}}}}")));
        }

        Ok(Self {
            source: source.to_string(),
            parts,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Renders the template with `ctx` as both the root (`$`) and the
    /// initial dot.
    pub fn render(&self, ctx: &Value) -> Result<String, RenderError> {
        let mut out = String::new();
        Renderer { root: ctx }.render_parts(&self.parts, ctx, &mut out)?;
        Ok(out)
    }
}

impl FromStr for Template {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

impl std::fmt::Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Template").field(&self.source).finish()
    }
}

impl std::fmt::Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

// ---- Splitting text and actions ----

enum Segment {
    Text(String),
    Action(String),
}

fn split(source: &str) -> Result<Vec<Segment>, String> {
    let mut segments = Vec::new();
    let mut rest = source;
    let mut trim_next = false;

    while let Some(open) = rest.find("{{") {
        let mut text = &rest[..open];
        if trim_next {
            text = text.trim_start();
        }
        let mut body_start = open + 2;
        if rest[body_start..].starts_with('-')
            && rest[body_start + 1..].starts_with(char::is_whitespace)
        {
            text = text.trim_end();
            body_start += 1;
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text.to_string()));
        }

        let close = find_close(&rest[body_start..]).ok_or_else(|| "unclosed action".to_string())?;
        let mut body = &rest[body_start..body_start + close];
        trim_next = false;
        if let Some(stripped) = body.strip_suffix('-') {
            if stripped.ends_with(char::is_whitespace) {
                body = stripped;
                trim_next = true;
            }
        }

        let body = body.trim();
        if !(body.starts_with("/*") && body.ends_with("*/")) {
            segments.push(Segment::Action(body.to_string()));
        }
        rest = &rest[body_start + close + 2..];
    }

    let text = if trim_next { rest.trim_start() } else { rest };
    if !text.is_empty() {
        segments.push(Segment::Text(text.to_string()));
    }
    Ok(segments)
}

/// Offset of the `}}` closing the action that `s` starts, skipping over a
/// leading comment and any quoted or raw strings.
fn find_close(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let lead = s.len() - s.trim_start().len();
    let mut i = 0;
    if s[lead..].starts_with("/*") {
        i = lead + 2 + s[lead + 2..].find("*/")? + 2;
    }

    while i < bytes.len() {
        match bytes[i] {
            b'}' if bytes.get(i + 1) == Some(&b'}') => return Some(i),
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'`' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'`' {
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

// ---- Tokens inside an action ----

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Field(Vec<String>),
    Root(Vec<String>),
    Ident(String),
    Literal(Value),
    Pipe,
    LParen,
    RParen,
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn tokenize(body: &str) -> Result<Vec<Tok>, String> {
    let chars: Vec<char> = body.chars().collect();
    let mut toks = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '|' => {
                toks.push(Tok::Pipe);
                i += 1;
            }
            '(' => {
                toks.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                toks.push(Tok::RParen);
                i += 1;
            }
            '.' | '$' => {
                let root = c == '$';
                if root {
                    i += 1;
                }
                let mut path = Vec::new();
                while i < chars.len() && chars[i] == '.' {
                    i += 1;
                    let start = i;
                    while i < chars.len() && is_ident_char(chars[i]) {
                        i += 1;
                    }
                    if i == start {
                        if path.is_empty() {
                            break;
                        }
                        return Err("expected field name after `.`".to_string());
                    }
                    path.push(chars[start..i].iter().collect());
                }
                toks.push(if root { Tok::Root(path) } else { Tok::Field(path) });
            }
            '"' => {
                i += 1;
                let mut s = String::new();
                loop {
                    let Some(&c) = chars.get(i) else {
                        return Err("unterminated quoted string".to_string());
                    };
                    i += 1;
                    match c {
                        '"' => break,
                        '\\' => {
                            let esc = chars
                                .get(i)
                                .ok_or_else(|| "unterminated quoted string".to_string())?;
                            i += 1;
                            s.push(match esc {
                                'n' => '\n',
                                't' => '\t',
                                other => *other,
                            });
                        }
                        c => s.push(c),
                    }
                }
                toks.push(Tok::Literal(Value::String(s)));
            }
            '`' => {
                let start = i + 1;
                let len = chars[start..]
                    .iter()
                    .position(|&c| c == '`')
                    .ok_or_else(|| "unterminated raw string".to_string())?;
                toks.push(Tok::Literal(Value::String(
                    chars[start..start + len].iter().collect(),
                )));
                i = start + len + 1;
            }
            c if c.is_ascii_digit()
                || (c == '-' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number {text:?}"))?;
                toks.push(Tok::Literal(value::number(n).map_err(|e| e.to_string())?));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                toks.push(Tok::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected {other:?} in action")),
        }
    }
    Ok(toks)
}

// ---- Structure ----

#[derive(Debug, Clone)]
enum Terminator {
    Else,
    /// `{{else if pipeline}}`
    ElseIf(Pipeline),
    End,
}

impl std::fmt::Display for Terminator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Terminator::Else => "else",
            Terminator::ElseIf(_) => "else if",
            Terminator::End => "end",
        })
    }
}

struct Parser {
    segments: Vec<Segment>,
    pos: usize,
}

impl Parser {
    /// Parses parts until `{{else}}`, `{{else if}}`, `{{end}}` or the end of
    /// input.
    fn parse_list(&mut self) -> Result<(Vec<Part>, Option<Terminator>), String> {
        let mut parts = Vec::new();
        while let Some(segment) = self.segments.get(self.pos) {
            self.pos += 1;
            let body = match segment {
                Segment::Text(text) => {
                    parts.push(Part::Text(text.clone()));
                    continue;
                }
                Segment::Action(body) => body.clone(),
            };

            let toks = tokenize(&body)?;
            match toks.first() {
                Some(Tok::Ident(word)) if word == "else" && toks.len() == 1 => {
                    return Ok((parts, Some(Terminator::Else)));
                }
                Some(Tok::Ident(word))
                    if word == "else" && matches!(toks.get(1), Some(Tok::Ident(w)) if w == "if") =>
                {
                    let cond = parse_action(&toks[2..])?;
                    return Ok((parts, Some(Terminator::ElseIf(cond))));
                }
                Some(Tok::Ident(word)) if word == "end" && toks.len() == 1 => {
                    return Ok((parts, Some(Terminator::End)));
                }
                Some(Tok::Ident(word)) if word == "if" || word == "range" => {
                    let keyword = word.clone();
                    let pipeline = parse_action(&toks[1..])?;
                    let (body, otherwise) = self.parse_block(&keyword)?;
                    parts.push(if keyword == "if" {
                        Part::If {
                            cond: pipeline,
                            then: body,
                            otherwise,
                        }
                    } else {
                        Part::Range {
                            over: pipeline,
                            body,
                            otherwise,
                        }
                    });
                }
                None => return Err("missing value for command".to_string()),
                Some(_) => parts.push(Part::Action(parse_action(&toks)?)),
            }
        }
        Ok((parts, None))
    }

    /// Parses the body and optional else branch of an `if` or `range`.
    fn parse_block(&mut self, keyword: &str) -> Result<(Vec<Part>, Vec<Part>), String> {
        let (body, terminator) = self.parse_list()?;
        match terminator {
            Some(Terminator::End) => Ok((body, Vec::new())),
            Some(Terminator::Else) => match self.parse_list()? {
                (otherwise, Some(Terminator::End)) => Ok((body, otherwise)),
                (_, Some(t)) => Err(format!("unexpected {{{{{t}}}}} after {{{{else}}}} in {keyword}")),
                (_, None) => Err(format!("unexpected EOF in {keyword}")),
            },
            // The chain shares the outer `{{end}}`, so the nested `if` owns it.
            Some(Terminator::ElseIf(cond)) if keyword == "if" => {
                let (then, otherwise) = self.parse_block(keyword)?;
                Ok((body, vec![Part::If { cond, then, otherwise }]))
            }
            Some(Terminator::ElseIf(_)) => Err(format!("{{{{else if}}}} not allowed in {keyword}")),
            None => Err(format!("unexpected EOF in {keyword}")),
        }
    }
}

fn parse_action(toks: &[Tok]) -> Result<Pipeline, String> {
    let mut i = 0;
    let pipeline = parse_pipeline(toks, &mut i)?;
    match toks.get(i) {
        None => Ok(pipeline),
        Some(Tok::RParen) => Err("unexpected `)`".to_string()),
        Some(tok) => Err(format!("unexpected {tok:?}")),
    }
}

fn parse_pipeline(toks: &[Tok], i: &mut usize) -> Result<Pipeline, String> {
    let mut pipeline = Vec::new();
    loop {
        let command = parse_command(toks, i)?;
        let is_call = matches!(command.0.first(), Some(Operand::Func(_)));
        if !is_call && command.0.len() > 1 {
            return Err("can't give argument to non-function".to_string());
        }
        if !is_call && !pipeline.is_empty() {
            return Err("non-function in pipeline cannot receive piped input".to_string());
        }
        pipeline.push(command);
        if toks.get(*i) == Some(&Tok::Pipe) {
            *i += 1;
        } else {
            return Ok(pipeline);
        }
    }
}

fn parse_command(toks: &[Tok], i: &mut usize) -> Result<Command, String> {
    let mut operands = Vec::new();
    while let Some(tok) = toks.get(*i) {
        let operand = match tok {
            Tok::Pipe | Tok::RParen => break,
            Tok::Field(path) => Operand::Dot(path.clone()),
            Tok::Root(path) => Operand::Root(path.clone()),
            Tok::Literal(v) => Operand::Literal(v.clone()),
            Tok::Ident(word) => match word.as_str() {
                "true" => Operand::Literal(Value::Bool(true)),
                "false" => Operand::Literal(Value::Bool(false)),
                "nil" => Operand::Literal(Value::Null),
                name => match FUNCTIONS.iter().find(|f| **f == name) {
                    Some(f) if operands.is_empty() => Operand::Func(*f),
                    Some(f) => return Err(format!("function {f:?} used as an argument")),
                    None => return Err(format!("function {name:?} not defined")),
                },
            },
            Tok::LParen => {
                *i += 1;
                let inner = parse_pipeline(toks, i)?;
                if toks.get(*i) != Some(&Tok::RParen) {
                    return Err("unclosed left paren".to_string());
                }
                Operand::Paren(inner)
            }
        };
        operands.push(operand);
        *i += 1;
    }
    if operands.is_empty() {
        return Err("missing value for command".to_string());
    }
    Ok(Command(operands))
}

// ---- Rendering ----

struct Renderer<'a> {
    root: &'a Value,
}

impl Renderer<'_> {
    fn render_parts(&self, parts: &[Part], dot: &Value, out: &mut String) -> Result<(), RenderError> {
        for part in parts {
            match part {
                Part::Text(text) => out.push_str(text),
                Part::Action(pipeline) => out.push_str(&display(&self.pipeline(pipeline, dot)?)),
                Part::If {
                    cond,
                    then,
                    otherwise,
                } => {
                    let branch = if truthy(&self.pipeline(cond, dot)?) {
                        then
                    } else {
                        otherwise
                    };
                    self.render_parts(branch, dot, out)?;
                }
                Part::Range {
                    over,
                    body,
                    otherwise,
                } => {
                    let items = match self.pipeline(over, dot)? {
                        Value::Null => Vec::new(),
                        Value::Array(items) => items,
                        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
                        other => return Err(RenderError::NotIterable(type_name(&other))),
                    };
                    if items.is_empty() {
                        self.render_parts(otherwise, dot, out)?;
                    }
                    for item in &items {
                        self.render_parts(body, item, out)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn pipeline(&self, pipeline: &[Command], dot: &Value) -> Result<Value, RenderError> {
        let mut piped = None;
        for command in pipeline {
            piped = Some(self.command(command, dot, piped.take())?);
        }
        Ok(piped.unwrap_or(Value::Null))
    }

    fn command(&self, command: &Command, dot: &Value, piped: Option<Value>) -> Result<Value, RenderError> {
        let Command(operands) = command;
        match operands.split_first() {
            Some((Operand::Func(name), rest)) => {
                let mut args = rest
                    .iter()
                    .map(|op| self.operand(op, dot))
                    .collect::<Result<Vec<_>, _>>()?;
                args.extend(piped);
                call(name, &args).map_err(|message| RenderError::Function {
                    name: name.to_string(),
                    message,
                })
            }
            Some((operand, _)) => self.operand(operand, dot),
            None => Ok(Value::Null),
        }
    }

    fn operand(&self, operand: &Operand, dot: &Value) -> Result<Value, RenderError> {
        match operand {
            Operand::Dot(path) => walk(dot, path),
            Operand::Root(path) => walk(self.root, path),
            Operand::Literal(v) => Ok(v.clone()),
            Operand::Paren(pipeline) => self.pipeline(pipeline, dot),
            Operand::Func(name) => call(name, &[]).map_err(|message| RenderError::Function {
                name: name.to_string(),
                message,
            }),
        }
    }
}

fn walk(start: &Value, path: &[String]) -> Result<Value, RenderError> {
    let mut current = start;
    for field in path {
        current = match current {
            Value::Object(map) => lookup(map, field).ok_or_else(|| RenderError::MissingField {
                field: field.clone(),
                on: "object",
            })?,
            other => {
                return Err(RenderError::MissingField {
                    field: field.clone(),
                    on: type_name(other),
                })
            }
        };
    }
    Ok(current.clone())
}

fn call(name: &str, args: &[Value]) -> Result<Value, String> {
    let arity = |n: usize| {
        if args.len() == n {
            Ok(())
        } else {
            Err(format!("wrong number of args: want {n} got {}", args.len()))
        }
    };

    match name {
        "len" => {
            arity(1)?;
            let n = match &args[0] {
                Value::String(s) => s.chars().count(),
                Value::Array(a) => a.len(),
                Value::Object(o) => o.len(),
                Value::Null => 0,
                other => return Err(format!("len of {}", type_name(other))),
            };
            Ok(Value::from(n))
        }
        "index" => {
            let (first, keys) = args
                .split_first()
                .ok_or_else(|| "wrong number of args: want at least 1 got 0".to_string())?;
            let mut current = first.clone();
            for key in keys {
                current = index(&current, key)?;
            }
            Ok(current)
        }
        "printf" => printf(args),
        "lower" => {
            arity(1)?;
            Ok(Value::String(display(&args[0]).to_lowercase()))
        }
        "upper" => {
            arity(1)?;
            Ok(Value::String(display(&args[0]).to_uppercase()))
        }
        "not" => {
            arity(1)?;
            Ok(Value::Bool(!truthy(&args[0])))
        }
        "and" => Ok(args
            .iter()
            .find(|v| !truthy(v))
            .or_else(|| args.last())
            .cloned()
            .unwrap_or(Value::Null)),
        "or" => Ok(args
            .iter()
            .find(|v| truthy(v))
            .or_else(|| args.last())
            .cloned()
            .unwrap_or(Value::Null)),
        "eq" => {
            let (first, rest) = args
                .split_first()
                .ok_or_else(|| "missing argument for comparison".to_string())?;
            if rest.is_empty() {
                return Err("missing argument for comparison".to_string());
            }
            Ok(Value::Bool(rest.iter().any(|v| value::equals(first, v))))
        }
        "ne" => {
            arity(2)?;
            Ok(Value::Bool(!value::equals(&args[0], &args[1])))
        }
        "lt" | "le" | "gt" | "ge" => {
            arity(2)?;
            let ord = compare(&args[0], &args[1])?;
            Ok(Value::Bool(match name {
                "lt" => ord == Ordering::Less,
                "le" => ord != Ordering::Greater,
                "gt" => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            }))
        }
        other => Err(format!("function {other:?} not defined")),
    }
}

fn index(container: &Value, key: &Value) -> Result<Value, String> {
    match (container, key) {
        (Value::Array(items), Value::Number(n)) => {
            let i = n
                .as_u64()
                .ok_or_else(|| format!("cannot index slice with {n}"))?;
            usize::try_from(i)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .ok_or_else(|| format!("index out of range: {i}"))
        }
        (Value::Object(map), Value::String(k)) => Ok(map.get(k).cloned().unwrap_or(Value::Null)),
        (Value::Null, _) => Err("index of untyped nil".to_string()),
        (c, k) => Err(format!("cannot index {} with {}", type_name(c), type_name(k))),
    }
}

fn compare(a: &Value, b: &Value) -> Result<Ordering, String> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .zip(y.as_f64())
            .and_then(|(x, y)| x.partial_cmp(&y))
            .ok_or_else(|| "incomparable numbers".to_string()),
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        _ => Err(format!(
            "incompatible types for comparison: {} and {}",
            type_name(a),
            type_name(b)
        )),
    }
}

/// `printf` with the verbs `%s %v %d %f %.Nf %q %%`.
fn printf(args: &[Value]) -> Result<Value, String> {
    let (format, mut rest) = match args.split_first() {
        Some((Value::String(format), rest)) => (format, rest.iter()),
        _ => return Err("format must be a string".to_string()),
    };
    let mut out = String::new();
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut precision = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut digits = String::new();
            while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                digits.push(d);
                chars.next();
            }
            precision = Some(digits.parse::<usize>().unwrap_or(0));
        }
        let Some(verb) = chars.next() else {
            out.push_str("%!(NOVERB)");
            break;
        };
        if verb == '%' {
            out.push('%');
            continue;
        }
        let arg = rest
            .next()
            .ok_or_else(|| format!("missing argument for %{verb}"))?;
        match verb {
            's' | 'v' => out.push_str(&display(arg)),
            'q' => out.push_str(&format!("{:?}", display(arg))),
            'd' => {
                let n = arg
                    .as_i64()
                    .or_else(|| arg.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                    .ok_or_else(|| format!("%d needs an integer, got {}", type_name(arg)))?;
                out.push_str(&n.to_string());
            }
            'f' => {
                let n = arg
                    .as_f64()
                    .ok_or_else(|| format!("%f needs a number, got {}", type_name(arg)))?;
                out.push_str(&format!("{:.*}", precision.unwrap_or(6), n));
            }
            other => return Err(format!("unsupported verb %{other}")),
        }
    }
    Ok(Value::String(out))
}
