//! Activation conditions for translations.
//!
//! A translation may carry an `evaluateWhen` expression such as
//! `semver.gte(version, '1.0.0') && something == 'bar'`. The expression is evaluated against the
//! condition variables supplied for the run (`version=1.1.0,something=bar`) with a small,
//! whitelisted grammar:
//!
//! ```text
//! expr    := or
//! or      := and ("||" and)*
//! and     := unary ("&&" unary)*
//! unary   := "!" unary | compare
//! compare := primary (("==" | "===" | "!=" | "!==" | "<" | "<=" | ">" | ">=") primary)?
//! primary := STRING | NUMBER | true | false | call | IDENT | "(" expr ")"
//! call    := ["semver" "."] FUNCTION "(" expr "," expr ")"
//! ```
//!
//! Functions: `gt`, `gte`, `lt`, `lte`, `eq`, `neq` (version order) and `satisfies`
//! (version against a range). Ordering operators compare as versions when both sides parse
//! as versions, as numbers when both are numeric, and as text otherwise.

use std::{cmp::Ordering, collections::BTreeMap};

use semver::{Version, VersionReq};
use thiserror::Error;

use crate::compiler::CompiledTranslation;

/// Variable name a bare condition token binds to.
pub const IMPLICIT_KEY: &str = "version";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConditionError {
    #[error("syntax error at {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("`{0}` is not defined")]
    Undefined(String),

    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    #[error("`{name}` expects {expected} arguments, got {actual}")]
    Arity {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid version `{0}`")]
    InvalidVersion(String),

    #[error("invalid version range `{0}`")]
    InvalidRange(String),
}

/// Variables an activation expression can reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionVars {
    vars: BTreeMap<String, String>,
}

impl ConditionVars {
    /// Parses `key=value,key2=value2`. A token without `=` binds to `version`.
    pub fn parse(input: &str) -> Self {
        let vars = input
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| match token.split_once('=') {
                Some((k, v)) => (k.trim().to_string(), v.trim().to_string()),
                None => (IMPLICIT_KEY.to_string(), token.to_string()),
            })
            .collect();
        ConditionVars { vars }
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

/// Whether a translation should run. Evaluation failures are logged and make it inactive.
pub fn is_active(translation: &CompiledTranslation, vars: &ConditionVars) -> bool {
    let Some(expression) = translation.evaluate_when.as_deref() else {
        return true;
    };
    match evaluate(expression, vars) {
        Ok(active) => active,
        Err(e) => {
            log::warn!(
                "translation [{}]{}: cannot evaluate `{}`: {}",
                translation.id,
                translation
                    .label
                    .as_deref()
                    .map(|l| format!(" ({})", l))
                    .unwrap_or_default(),
                expression,
                e
            );
            false
        }
    }
}

/// Evaluates an activation expression to a boolean.
pub fn evaluate(expression: &str, vars: &ConditionVars) -> Result<bool, ConditionError> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        vars,
    };
    let value = parser.parse_or()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(value.truthy()),
        Some(t) => Err(syntax(t.position, format!("unexpected {}", t.kind.describe()))),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Str(String),
    Num(f64),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
    Dot,
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            TokenKind::Str(s) => format!("string '{}'", s),
            TokenKind::Num(n) => format!("number {}", n),
            TokenKind::Ident(s) => format!("identifier `{}`", s),
            TokenKind::Op(op) => format!("`{}`", op),
            TokenKind::LParen => "`(`".to_string(),
            TokenKind::RParen => "`)`".to_string(),
            TokenKind::Comma => "`,`".to_string(),
            TokenKind::Dot => "`.`".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    position: usize,
}

fn syntax(position: usize, message: impl Into<String>) -> ConditionError {
    ConditionError::Syntax {
        position,
        message: message.into(),
    }
}

/// Longest operators first.
const OPERATORS: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "<", ">", "!",
];

fn tokenize(input: &str) -> Result<Vec<Token>, ConditionError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let (position, c) = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            '\'' | '"' => {
                let mut value = String::new();
                let mut j = i + 1;
                loop {
                    match chars.get(j) {
                        None => return Err(syntax(position, "unterminated string")),
                        Some((_, '\\')) => {
                            if let Some((_, escaped)) = chars.get(j + 1) {
                                value.push(*escaped);
                            }
                            j += 2;
                        }
                        Some((_, q)) if *q == c => break,
                        Some((_, other)) => {
                            value.push(*other);
                            j += 1;
                        }
                    }
                }
                i = j + 1;
                tokens.push(Token {
                    kind: TokenKind::Str(value),
                    position,
                });
                continue;
            }
            d if d.is_ascii_digit() => {
                let mut j = i;
                while chars
                    .get(j)
                    .is_some_and(|(_, ch)| ch.is_ascii_digit() || *ch == '.')
                {
                    j += 1;
                }
                let text: String = chars[i..j].iter().map(|(_, ch)| ch).collect();
                i = j;
                // "1.2.3" is not a number; keep it as text so it can still compare as a version.
                let kind = match text.parse::<f64>() {
                    Ok(n) => TokenKind::Num(n),
                    Err(_) => TokenKind::Str(text),
                };
                tokens.push(Token { kind, position });
                continue;
            }
            a if a.is_alphabetic() || a == '_' || a == '$' => {
                let mut j = i;
                while chars
                    .get(j)
                    .is_some_and(|(_, ch)| ch.is_alphanumeric() || *ch == '_' || *ch == '$')
                {
                    j += 1;
                }
                let text: String = chars[i..j].iter().map(|(_, ch)| ch).collect();
                i = j;
                tokens.push(Token {
                    kind: TokenKind::Ident(text),
                    position,
                });
                continue;
            }
            _ => {
                let rest = &input[position..];
                match OPERATORS.iter().copied().find(|op| rest.starts_with(op)) {
                    Some(op) => {
                        i += op.chars().count();
                        tokens.push(Token {
                            kind: TokenKind::Op(op),
                            position,
                        });
                        continue;
                    }
                    None => return Err(syntax(position, format!("unexpected character `{}`", c))),
                }
            }
        };
        tokens.push(Token { kind, position });
        i += 1;
    }
    Ok(tokens)
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Bool(bool),
    Num(f64),
    Str(String),
}

impl Value {
    fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
        }
    }

    fn text(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Num(n) => n.to_string(),
            Value::Str(s) => s.clone(),
        }
    }

    fn number(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            Value::Str(s) => s.trim().parse().ok(),
            Value::Bool(_) => None,
        }
    }
}

/// Parses a version leniently: a leading `v` is dropped and missing minor/patch parts are 0.
fn parse_version(text: &str) -> Option<Version> {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    if let Ok(v) = Version::parse(trimmed) {
        return Some(v);
    }
    let (core, rest) = match trimmed.find(['-', '+']) {
        Some(idx) => trimmed.split_at(idx),
        None => (trimmed, ""),
    };
    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(rest);
    Version::parse(&padded).ok()
}

/// Joins space-separated comparators (`>=1.0 <2.0`) with commas. A bare operator
/// token (`>= 1.0`) is glued to the version that follows it.
fn normalize_range(range: &str) -> String {
    if range.contains(',') {
        return range.to_string();
    }
    let mut comparators: Vec<String> = Vec::new();
    let mut operator = String::new();
    for token in range.split_whitespace() {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^')) {
            operator.push_str(token);
            continue;
        }
        comparators.push(format!("{}{}", std::mem::take(&mut operator), token));
    }
    comparators.join(", ")
}

fn version_of(value: &Value) -> Result<Version, ConditionError> {
    let text = value.text();
    parse_version(&text).ok_or(ConditionError::InvalidVersion(text))
}

fn compare(lhs: &Value, rhs: &Value) -> Ordering {
    if let (Some(a), Some(b)) = (parse_version(&lhs.text()), parse_version(&rhs.text())) {
        if !matches!((lhs, rhs), (Value::Num(_), Value::Num(_))) {
            return a.cmp(&b);
        }
    }
    if let (Some(a), Some(b)) = (lhs.number(), rhs.number()) {
        return a.partial_cmp(&b).unwrap_or(Ordering::Equal);
    }
    lhs.text().cmp(&rhs.text())
}

fn loosely_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        _ => match (lhs.number(), rhs.number()) {
            (Some(a), Some(b)) => a == b,
            _ => lhs.text() == rhs.text(),
        },
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    vars: &'a ConditionVars,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(0, |t| t.position)
    }

    fn eat_op(&mut self, op: &'static str) -> bool {
        if self.peek() == Some(&TokenKind::Op(op)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ConditionError> {
        match self.peek() {
            Some(k) if *k == kind => {
                self.pos += 1;
                Ok(())
            }
            Some(k) => Err(syntax(
                self.position(),
                format!("expected {}, found {}", kind.describe(), k.describe()),
            )),
            None => Err(syntax(
                self.position(),
                format!("expected {}, found end of input", kind.describe()),
            )),
        }
    }

    // Both sides are always evaluated so that undefined names surface as errors.
    fn parse_or(&mut self) -> Result<Value, ConditionError> {
        let mut value = self.parse_and()?;
        while self.eat_op("||") {
            let rhs = self.parse_and()?;
            value = Value::Bool(value.truthy() || rhs.truthy());
        }
        Ok(value)
    }

    fn parse_and(&mut self) -> Result<Value, ConditionError> {
        let mut value = self.parse_unary()?;
        while self.eat_op("&&") {
            let rhs = self.parse_unary()?;
            value = Value::Bool(value.truthy() && rhs.truthy());
        }
        Ok(value)
    }

    fn parse_unary(&mut self) -> Result<Value, ConditionError> {
        if self.eat_op("!") {
            let value = self.parse_unary()?;
            return Ok(Value::Bool(!value.truthy()));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<Value, ConditionError> {
        let lhs = self.parse_primary()?;
        let op = match self.peek() {
            Some(TokenKind::Op(op)) if !matches!(*op, "&&" | "||" | "!") => *op,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.parse_primary()?;
        let result = match op {
            "==" | "===" => loosely_equal(&lhs, &rhs),
            "!=" | "!==" => !loosely_equal(&lhs, &rhs),
            "<" => compare(&lhs, &rhs) == Ordering::Less,
            "<=" => compare(&lhs, &rhs) != Ordering::Greater,
            ">" => compare(&lhs, &rhs) == Ordering::Greater,
            ">=" => compare(&lhs, &rhs) != Ordering::Less,
            other => return Err(syntax(self.position(), format!("unexpected `{}`", other))),
        };
        Ok(Value::Bool(result))
    }

    fn parse_primary(&mut self) -> Result<Value, ConditionError> {
        let position = self.position();
        let Some(kind) = self.peek().cloned() else {
            return Err(syntax(position, "unexpected end of input"));
        };
        self.pos += 1;
        match kind {
            TokenKind::Str(s) => Ok(Value::Str(s)),
            TokenKind::Num(n) => Ok(Value::Num(n)),
            TokenKind::LParen => {
                let value = self.parse_or()?;
                self.expect(TokenKind::RParen)?;
                Ok(value)
            }
            TokenKind::Ident(name) => self.parse_identifier(name),
            other => Err(syntax(position, format!("unexpected {}", other.describe()))),
        }
    }

    fn parse_identifier(&mut self, name: String) -> Result<Value, ConditionError> {
        match name.as_str() {
            "true" => return Ok(Value::Bool(true)),
            "false" => return Ok(Value::Bool(false)),
            _ => {}
        }
        let mut path = name;
        while self.peek() == Some(&TokenKind::Dot) {
            self.pos += 1;
            match self.peek().cloned() {
                Some(TokenKind::Ident(member)) => {
                    self.pos += 1;
                    path = format!("{}.{}", path, member);
                }
                _ => return Err(syntax(self.position(), "expected a name after `.`")),
            }
        }
        if self.peek() == Some(&TokenKind::LParen) {
            self.pos += 1;
            let args = self.parse_args()?;
            return call(&path, &args);
        }
        self.vars
            .get(&path)
            .map(|v| Value::Str(v.to_string()))
            .ok_or(ConditionError::Undefined(path))
    }

    fn parse_args(&mut self) -> Result<Vec<Value>, ConditionError> {
        let mut args = Vec::new();
        if self.peek() == Some(&TokenKind::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            match self.peek() {
                Some(TokenKind::Comma) => self.pos += 1,
                _ => break,
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }
}

fn call(path: &str, args: &[Value]) -> Result<Value, ConditionError> {
    let name = path.strip_prefix("semver.").unwrap_or(path);
    if !matches!(
        name,
        "gt" | "gte" | "lt" | "lte" | "eq" | "neq" | "satisfies"
    ) {
        return Err(ConditionError::UnknownFunction(path.to_string()));
    }
    let [lhs, rhs] = args else {
        return Err(ConditionError::Arity {
            name: path.to_string(),
            expected: 2,
            actual: args.len(),
        });
    };
    let version = version_of(lhs)?;
    if name == "satisfies" {
        let range = rhs.text();
        let req = VersionReq::parse(&normalize_range(&range))
            .map_err(|_| ConditionError::InvalidRange(range.clone()))?;
        return Ok(Value::Bool(req.matches(&version)));
    }
    let ordering = version.cmp(&version_of(rhs)?);
    let result = match name {
        "gt" => ordering == Ordering::Greater,
        "gte" => ordering != Ordering::Less,
        "lt" => ordering == Ordering::Less,
        "lte" => ordering != Ordering::Greater,
        "eq" => ordering == Ordering::Equal,
        _ => ordering != Ordering::Equal,
    };
    Ok(Value::Bool(result))
}
