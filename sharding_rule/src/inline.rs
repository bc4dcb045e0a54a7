//! Inline expressions.
//!
//! Two flavours share the `${...}` (or `$->{...}`) placeholder syntax:
//!
//! * data node lists such as `ds_${0..1}.t_order_${[0, 1]}`, which expand to
//!   the cartesian product of every placeholder, left to right, and
//! * algorithm expressions such as `t_order_${order_id % 2}`, which are
//!   evaluated against the sharding value of a column.

use sql_statement::Value;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("empty inline expression")]
    Empty,

    #[error("unterminated placeholder in inline expression {expression:?}")]
    Unterminated { expression: String },

    #[error("invalid range {range:?} in inline expression")]
    InvalidRange { range: String },

    #[error("unsupported placeholder {placeholder:?}, expected a range `a..b` or a list `[a, b]`")]
    UnsupportedPlaceholder { placeholder: String },

    #[error("syntax error at offset {offset} of {expression:?}: {reason}")]
    Syntax {
        expression: String,
        offset: usize,
        reason: &'static str,
    },

    #[error("no value bound to {name:?}")]
    Unbound { name: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow")]
    Overflow,

    #[error("cannot apply '{op}' to {left} and {right}")]
    TypeMismatch { op: char, left: Value, right: Value },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

enum Part<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

/// Splits `expression` into literal text and placeholder bodies.
fn split_parts(expression: &str) -> Result<Vec<Part<'_>>> {
    let mut parts = vec![];
    let mut rest = expression;

    while let Some(start) = rest.find('$') {
        let after = &rest[start + 1..];
        let open = if after.starts_with('{') {
            1
        } else if after.starts_with("->{") {
            3
        } else {
            // a lone `$` is plain text
            let (text, tail) = rest.split_at(start + 1);
            parts.push(Part::Text(text));
            rest = tail;
            continue;
        };

        let body_start = start + 1 + open;
        let close = matching_brace(&rest[body_start..]).ok_or_else(|| Error::Unterminated {
            expression: expression.to_owned(),
        })?;
        if start > 0 {
            parts.push(Part::Text(&rest[..start]));
        }
        parts.push(Part::Placeholder(&rest[body_start..body_start + close]));
        rest = &rest[body_start + close + 1..];
    }
    if !rest.is_empty() {
        parts.push(Part::Text(rest));
    }

    Ok(parts)
}

/// Offset of the `}` closing a placeholder whose body starts `s`.
fn matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' if depth == 0 => return Some(idx),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Splits on commas that are not inside a placeholder.
fn split_segments(expression: &str) -> Vec<&str> {
    let mut segments = vec![];
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, c) in expression.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                segments.push(&expression[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    segments.push(&expression[start..]);
    segments
}

/// Expands a list expression into every string it denotes.
///
/// ```text
/// ds_${0..1}.t_${[a, b]}  ->  ds_0.t_a, ds_0.t_b, ds_1.t_a, ds_1.t_b
/// ```
pub fn expand(expression: &str) -> Result<Vec<String>> {
    let mut out = vec![];
    for segment in split_segments(expression) {
        let segment = segment.trim();
        if segment.is_empty() {
            return Err(Error::Empty);
        }

        let mut expanded = vec![String::new()];
        for part in split_parts(segment)? {
            match part {
                Part::Text(text) => expanded.iter_mut().for_each(|s| s.push_str(text)),
                Part::Placeholder(body) => {
                    let values = expand_placeholder(body)?;
                    expanded = expanded
                        .iter()
                        .flat_map(|prefix| values.iter().map(move |v| format!("{prefix}{v}")))
                        .collect();
                }
            }
        }
        out.extend(expanded);
    }
    Ok(out)
}

fn expand_placeholder(body: &str) -> Result<Vec<String>> {
    let body = body.trim();

    if let Some(list) = body.strip_prefix('[').and_then(|b| b.strip_suffix(']')) {
        return Ok(list
            .split(',')
            .map(|item| unquote(item.trim()).to_owned())
            .filter(|item| !item.is_empty())
            .collect());
    }

    if let Some((from, to)) = body.split_once("..") {
        let (from, to) = (from.trim(), to.trim());
        let invalid = || Error::InvalidRange {
            range: body.to_owned(),
        };
        let start: i64 = from.parse().map_err(|_| invalid())?;
        let end: i64 = to.parse().map_err(|_| invalid())?;
        // `${00..15}` keeps the width of the lower bound
        let width = if from.len() > 1 && from.starts_with('0') {
            from.len()
        } else {
            0
        };
        let values: Vec<i64> = if start <= end {
            (start..=end).collect()
        } else {
            (end..=start).rev().collect()
        };
        return Ok(values.into_iter().map(|v| format!("{v:0width$}")).collect());
    }

    Err(Error::UnsupportedPlaceholder {
        placeholder: body.to_owned(),
    })
}

fn unquote(s: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|s| s.strip_suffix(quote)) {
            return inner;
        }
    }
    s
}

/// A parsed algorithm expression such as `ds_${user_id % 2}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineExpression {
    source: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Expr(Ast),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Ast {
    Literal(Value),
    Ident(String),
    Neg(Box<Ast>),
    Binary(Box<Ast>, char, Box<Ast>),
}

impl InlineExpression {
    pub fn parse(source: &str) -> Result<Self> {
        if source.trim().is_empty() {
            return Err(Error::Empty);
        }
        let segments = split_parts(source.trim())?
            .into_iter()
            .map(|part| match part {
                Part::Text(text) => Ok(Segment::Text(text.to_owned())),
                Part::Placeholder(body) => Parser::new(body).parse().map(Segment::Expr),
            })
            .collect::<Result<_>>()?;

        Ok(Self {
            source: source.trim().to_owned(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Renders the expression, resolving identifiers through `lookup`.
    pub fn evaluate(&self, lookup: impl Fn(&str) -> Option<Value>) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Expr(ast) => out.push_str(&eval(ast, &lookup)?.to_string()),
            }
        }
        Ok(out)
    }

    /// Renders the expression with `name` bound to `value`.
    pub fn evaluate_with(&self, name: &str, value: &Value) -> Result<String> {
        self.evaluate(|ident| ident.eq_ignore_ascii_case(name).then(|| value.clone()))
    }
}

fn eval(ast: &Ast, lookup: &impl Fn(&str) -> Option<Value>) -> Result<Value> {
    match ast {
        Ast::Literal(v) => Ok(v.clone()),
        Ast::Ident(name) => lookup(name).ok_or_else(|| Error::Unbound { name: name.clone() }),
        Ast::Neg(inner) => {
            let v = eval(inner, lookup)?;
            let n = v.as_i64().ok_or_else(|| Error::TypeMismatch {
                op: '-',
                left: Value::Integer(0),
                right: v.clone(),
            })?;
            n.checked_neg().map(Value::Integer).ok_or(Error::Overflow)
        }
        Ast::Binary(left, op, right) => {
            let left = eval(left, lookup)?;
            let right = eval(right, lookup)?;
            apply(*op, left, right)
        }
    }
}

fn apply(op: char, left: Value, right: Value) -> Result<Value> {
    let numbers = (left.as_i64(), right.as_i64());
    if op == '+' {
        if let (Some(a), Some(b)) = numbers {
            return a.checked_add(b).map(Value::Integer).ok_or(Error::Overflow);
        }
        if !left.is_null() && !right.is_null() {
            return Ok(Value::Text(format!("{left}{right}")));
        }
    }

    let (Some(a), Some(b)) = numbers else {
        return Err(Error::TypeMismatch { op, left, right });
    };
    let result = match op {
        '+' => a.checked_add(b),
        '-' => a.checked_sub(b),
        '*' => a.checked_mul(b),
        '/' | '%' if b == 0 => return Err(Error::DivisionByZero),
        '/' => a.checked_div(b),
        '%' => a.checked_rem(b),
        _ => return Err(Error::TypeMismatch { op, left, right }),
    };
    result.map(Value::Integer).ok_or(Error::Overflow)
}

/// Recursive descent parser over the body of one placeholder.
///
/// ```text
/// expr   := term (('+' | '-') term)*
/// term   := factor (('*' | '/' | '%') factor)*
/// factor := number | string | ident | '(' expr ')' | '-' factor
/// ```
struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn parse(mut self) -> Result<Ast> {
        let ast = self.expr()?;
        self.skip_ws();
        if self.pos != self.src.len() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok(ast)
    }

    fn error(&self, reason: &'static str) -> Error {
        Error::Syntax {
            expression: self.src.to_owned(),
            offset: self.pos,
            reason,
        }
    }

    fn skip_ws(&mut self) {
        let rest = &self.src[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.src[self.pos..].chars().next() {
            self.pos += c.len_utf8();
        }
    }

    fn expr(&mut self) -> Result<Ast> {
        let mut left = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.bump();
            let right = self.term()?;
            left = Ast::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Ast> {
        let mut left = self.factor()?;
        while let Some(op @ ('*' | '/' | '%')) = self.peek() {
            self.bump();
            let right = self.factor()?;
            left = Ast::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<Ast> {
        match self.peek() {
            Some('(') => {
                self.bump();
                let inner = self.expr()?;
                if self.peek() != Some(')') {
                    return Err(self.error("expected ')'"));
                }
                self.bump();
                Ok(inner)
            }
            Some('-') => {
                self.bump();
                Ok(Ast::Neg(Box::new(self.factor()?)))
            }
            Some(quote @ ('\'' | '"')) => {
                self.bump();
                let rest = &self.src[self.pos..];
                let end = rest
                    .find(quote)
                    .ok_or_else(|| self.error("unterminated string literal"))?;
                let text = rest[..end].to_owned();
                self.pos += end + 1;
                Ok(Ast::Literal(Value::Text(text)))
            }
            Some(c) if c.is_ascii_digit() => {
                let digits = self.take_while(|c| c.is_ascii_digit());
                digits
                    .parse()
                    .map(|n| Ast::Literal(Value::Integer(n)))
                    .map_err(|_| Error::Overflow)
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let ident = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
                Ok(Ast::Ident(ident.to_owned()))
            }
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of expression")),
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        let rest = &self.src[start..];
        let len = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        self.pos += len;
        &self.src[start..start + len]
    }
}
