//! The `{{expr}}` expression language: lexer, recursive-descent parser,
//! evaluator, and the cache that compiles each distinct template text once.
//!
//! Function dispatch follows the closure-wrapping pattern used by
//! `anathema-value-resolver`'s `FunctionTable`: a function is a boxed
//! closure keyed by name, looked up once per call rather than matched in a
//! giant `match`.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::error::ExprError;
use crate::state::StateStore;

const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

// ---------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// Dot-path identifier, e.g. `user.name`.
    Ident(Vec<String>),
    /// The `$` whole-state binding.
    WholeState,
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    Index(Box<Expr>, Box<Expr>),
}

/// One piece of a parsed template string: either literal text, or an
/// `{{expr}}` hole to evaluate.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Literal(String),
    Expr(Expr),
}

// ---------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Ident(String),
    Dollar,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AndAnd,
    OrOr,
    Bang,
}

fn lex(src: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    let mut tokens = Vec::new();

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '$' => {
                tokens.push(Token::Dollar);
                i += 1;
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::NotEq);
                    i += 2;
                } else {
                    tokens.push(Token::Bang);
                    i += 1;
                }
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::EqEq);
                    i += 2;
                } else {
                    return Err(ExprError::UnexpectedToken("=".into(), i));
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::LtEq);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::GtEq);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(Token::AndAnd);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(Token::OrOr);
                i += 2;
            }
            '"' | '\'' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                while i < chars.len() && chars[i] != quote {
                    s.push(chars[i]);
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(ExprError::UnexpectedEof);
                }
                i += 1; // closing quote
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| ExprError::UnexpectedToken(text.clone(), start))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    // Don't swallow a trailing dot that isn't followed by an identifier char.
                    if chars[i] == '.' {
                        let next_is_ident_start = chars
                            .get(i + 1)
                            .map(|c| c.is_alphabetic() || *c == '_')
                            .unwrap_or(false);
                        if !next_is_ident_start {
                            break;
                        }
                    }
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                match text.as_str() {
                    "true" => tokens.push(Token::Bool(true)),
                    "false" => tokens.push(Token::Bool(false)),
                    "null" => tokens.push(Token::Null),
                    _ => tokens.push(Token::Ident(text)),
                }
            }
            other => return Err(ExprError::UnexpectedToken(other.to_string(), i)),
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------
// Parser (precedence climbing)
// ---------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ExprError> {
        match self.advance() {
            Some(ref t) if t == expected => Ok(()),
            Some(t) => Err(ExprError::UnexpectedToken(format!("{t:?}"), self.pos)),
            None => Err(ExprError::UnexpectedEof),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ExprError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Token::OrOr)) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_equality()?;
        while matches!(self.peek(), Some(Token::AndAnd)) {
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinOp::Eq,
                Some(Token::NotEq) => BinOp::Ne,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinOp::Lt,
                Some(Token::LtEq) => BinOp::Le,
                Some(Token::Gt) => BinOp::Gt,
                Some(Token::GtEq) => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Rem,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        match self.peek() {
            Some(Token::Bang) => {
                self.advance();
                Ok(Expr::Unary(UnOp::Not, Box::new(self.parse_unary()?)))
            }
            Some(Token::Minus) => {
                self.advance();
                Ok(Expr::Unary(UnOp::Neg, Box::new(self.parse_unary()?)))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.parse_primary()?;
        while matches!(self.peek(), Some(Token::LBracket)) {
            self.advance();
            let index = self.parse_expr()?;
            self.expect(&Token::RBracket)?;
            expr = Expr::Index(Box::new(expr), Box::new(index));
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Literal(
                serde_json::Number::from_f64(n)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
            )),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Bool(b)) => Ok(Expr::Literal(Value::Bool(b))),
            Some(Token::Null) => Ok(Expr::Literal(Value::Null)),
            Some(Token::Dollar) => Ok(Expr::WholeState),
            Some(Token::Ident(name)) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.advance();
                    let mut args = Vec::new();
                    if !matches!(self.peek(), Some(Token::RParen)) {
                        loop {
                            args.push(self.parse_expr()?);
                            if matches!(self.peek(), Some(Token::Comma)) {
                                self.advance();
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect(&Token::RParen)?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Ident(name.split('.').map(str::to_string).collect()))
                }
            }
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(other) => Err(ExprError::UnexpectedToken(format!("{other:?}"), self.pos)),
            None => Err(ExprError::UnexpectedEof),
        }
    }
}

pub fn parse(src: &str) -> Result<Expr, ExprError> {
    let tokens = lex(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(ExprError::UnexpectedToken(
            format!("{:?}", parser.tokens[parser.pos]),
            parser.pos,
        ));
    }
    Ok(expr)
}

/// Splits a template string into literal and `{{expr}}` parts. Bracket
/// accessors inside a hole (`items[0]`) are left untouched here — that
/// normalization happens in the expression parser itself.
pub fn parse_template(text: &str) -> Result<Vec<TemplatePart>, ExprError> {
    let mut parts = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            parts.push(TemplatePart::Literal(rest[..start].to_string()));
        }
        let after_open = &rest[start + 2..];
        let end = after_open.find("}}").ok_or(ExprError::UnexpectedEof)?;
        let expr_src = &after_open[..end];
        parts.push(TemplatePart::Expr(parse(expr_src.trim())?));
        rest = &after_open[end + 2..];
    }

    if !rest.is_empty() || parts.is_empty() {
        parts.push(TemplatePart::Literal(rest.to_string()));
    }

    Ok(parts)
}

// ---------------------------------------------------------------------
// Function table
// ---------------------------------------------------------------------

type BoxedFn = Box<dyn Fn(&[Value]) -> Result<Value, ExprError> + Send + Sync>;

pub struct Function(BoxedFn);

impl Function {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, ExprError> + Send + Sync + 'static,
    {
        Self(Box::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, ExprError> {
        (self.0)(args)
    }
}

pub struct FunctionTable {
    functions: HashMap<String, Function>,
}

impl Default for FunctionTable {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl FunctionTable {
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// `len`, `upper`, `lower`, `trim`, `contains` — the small pure helper
    /// set §4.E calls out by name.
    pub fn with_builtins() -> Self {
        let mut table = Self::empty();

        table.register("len", |args| {
            let value = one_arg("len", args)?;
            match value {
                Value::Array(items) => Ok(Value::from(items.len())),
                Value::String(s) => Ok(Value::from(s.chars().count())),
                Value::Object(map) => Ok(Value::from(map.len())),
                other => Err(ExprError::Type(format!("len() expects a collection, got {other}"))),
            }
        });

        table.register("upper", |args| {
            let value = one_arg("upper", args)?;
            as_str("upper", value).map(|s| Value::String(s.to_uppercase()))
        });

        table.register("lower", |args| {
            let value = one_arg("lower", args)?;
            as_str("lower", value).map(|s| Value::String(s.to_lowercase()))
        });

        table.register("trim", |args| {
            let value = one_arg("trim", args)?;
            as_str("trim", value).map(|s| Value::String(s.trim().to_string()))
        });

        table.register("contains", |args| {
            if args.len() != 2 {
                return Err(ExprError::Arity {
                    name: "contains".into(),
                    expected: 2,
                    got: args.len(),
                });
            }
            match &args[0] {
                Value::Array(items) => Ok(Value::Bool(items.contains(&args[1]))),
                Value::String(s) => {
                    let needle = as_str("contains", &args[1])?;
                    Ok(Value::Bool(s.contains(&needle)))
                }
                other => Err(ExprError::Type(format!(
                    "contains() expects an array or string, got {other}"
                ))),
            }
        });

        table
    }

    pub fn register<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&[Value]) -> Result<Value, ExprError> + Send + Sync + 'static,
    {
        self.functions.insert(name.to_string(), Function::new(f));
    }

    pub fn lookup(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }
}

fn one_arg<'a>(name: &str, args: &'a [Value]) -> Result<&'a Value, ExprError> {
    args.first().ok_or_else(|| ExprError::Arity {
        name: name.to_string(),
        expected: 1,
        got: 0,
    })
}

fn as_str(fn_name: &str, value: &Value) -> Result<String, ExprError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(ExprError::Type(format!(
            "{fn_name}() expects a string, got {other}"
        ))),
    }
}

// ---------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------

pub fn evaluate(expr: &Expr, state: &StateStore, functions: &FunctionTable) -> Result<Value, ExprError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::WholeState => Ok(state.as_value()),
        Expr::Ident(path) => Ok(state.get(&path.join(".")).0.unwrap_or(Value::Null)),
        Expr::Unary(UnOp::Not, inner) => Ok(Value::Bool(!is_truthy(&evaluate(inner, state, functions)?))),
        Expr::Unary(UnOp::Neg, inner) => {
            let v = evaluate(inner, state, functions)?;
            as_f64(&v).map(|n| json_number(-n))
        }
        Expr::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, state, functions),
        Expr::Call(name, arg_exprs) => {
            let function = functions
                .lookup(name)
                .ok_or_else(|| ExprError::UnknownFunction(name.clone()))?;
            let args = arg_exprs
                .iter()
                .map(|e| evaluate(e, state, functions))
                .collect::<Result<Vec<_>, _>>()?;
            function.call(&args)
        }
        Expr::Index(base, index) => {
            let base_v = evaluate(base, state, functions)?;
            let index_v = evaluate(index, state, functions)?;
            index_value(&base_v, &index_v)
        }
    }
}

fn eval_binary(
    op: BinOp,
    lhs: &Expr,
    rhs: &Expr,
    state: &StateStore,
    functions: &FunctionTable,
) -> Result<Value, ExprError> {
    if op == BinOp::And {
        let l = evaluate(lhs, state, functions)?;
        if !is_truthy(&l) {
            return Ok(Value::Bool(false));
        }
        return Ok(Value::Bool(is_truthy(&evaluate(rhs, state, functions)?)));
    }
    if op == BinOp::Or {
        let l = evaluate(lhs, state, functions)?;
        if is_truthy(&l) {
            return Ok(Value::Bool(true));
        }
        return Ok(Value::Bool(is_truthy(&evaluate(rhs, state, functions)?)));
    }

    let l = evaluate(lhs, state, functions)?;
    let r = evaluate(rhs, state, functions)?;

    match op {
        BinOp::Add => match (&l, &r) {
            (Value::String(_), _) | (_, Value::String(_)) => {
                Ok(Value::String(format!("{}{}", stringify(&l), stringify(&r))))
            }
            _ => Ok(json_number(as_f64(&l)? + as_f64(&r)?)),
        },
        BinOp::Sub => Ok(json_number(as_f64(&l)? - as_f64(&r)?)),
        BinOp::Mul => Ok(json_number(as_f64(&l)? * as_f64(&r)?)),
        BinOp::Div => Ok(json_number(as_f64(&l)? / as_f64(&r)?)),
        BinOp::Rem => Ok(json_number(as_f64(&l)? % as_f64(&r)?)),
        BinOp::Eq => Ok(Value::Bool(l == r)),
        BinOp::Ne => Ok(Value::Bool(l != r)),
        BinOp::Lt => Ok(Value::Bool(as_f64(&l)? < as_f64(&r)?)),
        BinOp::Le => Ok(Value::Bool(as_f64(&l)? <= as_f64(&r)?)),
        BinOp::Gt => Ok(Value::Bool(as_f64(&l)? > as_f64(&r)?)),
        BinOp::Ge => Ok(Value::Bool(as_f64(&l)? >= as_f64(&r)?)),
        BinOp::And | BinOp::Or => unreachable!("handled above"),
    }
}

fn index_value(base: &Value, index: &Value) -> Result<Value, ExprError> {
    match (base, index) {
        (Value::Array(items), Value::Number(n)) => {
            let idx = n.as_u64().ok_or_else(|| ExprError::Type("array index must be non-negative".into()))? as usize;
            Ok(items.get(idx).cloned().unwrap_or(Value::Null))
        }
        (Value::Object(map), Value::String(key)) => Ok(map.get(key).cloned().unwrap_or(Value::Null)),
        _ => Err(ExprError::Type("invalid index operation".into())),
    }
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn as_f64(value: &Value) -> Result<f64, ExprError> {
    value
        .as_f64()
        .ok_or_else(|| ExprError::Type(format!("expected a number, got {value}")))
}

fn json_number(n: f64) -> Value {
    serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Evaluates a parsed template. A template consisting of exactly one
/// `{{expr}}` hole and no surrounding literal text passes through the raw
/// value (so a bool/number prop binding stays typed); anything else is
/// concatenated into a string.
pub fn evaluate_template(
    parts: &[TemplatePart],
    state: &StateStore,
    functions: &FunctionTable,
) -> Result<Value, ExprError> {
    if let [TemplatePart::Expr(expr)] = parts {
        return evaluate(expr, state, functions);
    }

    let mut out = String::new();
    for part in parts {
        match part {
            TemplatePart::Literal(s) => out.push_str(s),
            TemplatePart::Expr(expr) => out.push_str(&stringify(&evaluate(expr, state, functions)?)),
        }
    }
    Ok(Value::String(out))
}

// ---------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------

struct CompiledTemplate {
    parts: Vec<TemplatePart>,
    compiled_at: Instant,
}

/// Compiles each distinct `{{expr}}`-bearing text once and serves cached
/// programs until either their TTL expires or the whole cache is cleared.
///
/// Whole-cache invalidation (not per-key) is the correctness contract: any
/// State Store write calls [`ExpressionCache::clear`] rather than trying to
/// reason about which cached texts depend on the changed key.
pub struct ExpressionCache {
    entries: RwLock<HashMap<String, Arc<CompiledTemplate>>>,
    ttl: Duration,
    warned: Mutex<HashSet<String>>,
}

impl Default for ExpressionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            warned: Mutex::new(HashSet::new()),
        }
    }

    fn get_or_compile(&self, text: &str) -> Arc<CompiledTemplate> {
        if let Some(entry) = self.fresh_entry(text) {
            return entry;
        }

        let mut guard = self.entries.write().expect("expression cache lock poisoned");
        if let Some(entry) = guard.get(text) {
            if entry.compiled_at.elapsed() < self.ttl {
                return entry.clone();
            }
        }

        let parts = match parse_template(text) {
            Ok(parts) => parts,
            Err(err) => {
                self.warn_once(text, &err);
                vec![TemplatePart::Literal(text.to_string())]
            }
        };
        let compiled = Arc::new(CompiledTemplate {
            parts,
            compiled_at: Instant::now(),
        });
        guard.insert(text.to_string(), compiled.clone());
        compiled
    }

    fn fresh_entry(&self, text: &str) -> Option<Arc<CompiledTemplate>> {
        let guard = self.entries.read().expect("expression cache lock poisoned");
        guard
            .get(text)
            .filter(|entry| entry.compiled_at.elapsed() < self.ttl)
            .cloned()
    }

    fn warn_once(&self, text: &str, err: &ExprError) {
        let mut warned = self.warned.lock().expect("expression cache warn lock poisoned");
        if warned.insert(text.to_string()) {
            tracing::warn!(text, error = %err, "expression failed to compile, using literal text");
        }
    }

    /// Resolves `text` against `state`, falling back to the literal text on
    /// a compile or evaluation error (logged once per distinct text).
    pub fn resolve(&self, text: &str, state: &StateStore, functions: &FunctionTable) -> Value {
        let compiled = self.get_or_compile(text);
        match evaluate_template(&compiled.parts, state, functions) {
            Ok(v) => v,
            Err(err) => {
                self.warn_once(text, &err);
                Value::String(text.to_string())
            }
        }
    }

    /// Whole-cache invalidation. `key: None` clears everything (the only
    /// mode the correctness contract relies on); `Some(text)` is an
    /// opportunistic partial clear, never required for correctness.
    pub fn invalidate(&self, key: Option<&str>) {
        let mut guard = self.entries.write().expect("expression cache lock poisoned");
        match key {
            Some(text) => {
                guard.remove(text);
            }
            None => guard.clear(),
        }
    }

    pub fn clear(&self) {
        self.invalidate(None);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_with(pairs: &[(&str, Value)]) -> StateStore {
        let store = StateStore::new();
        for (k, v) in pairs {
            store.set(*k, v.clone());
        }
        store
    }

    #[test]
    fn simple_ident_lookup() {
        let store = store_with(&[("count", json!(3))]);
        let cache = ExpressionCache::new();
        let functions = FunctionTable::with_builtins();
        assert_eq!(cache.resolve("{{count}}", &store, &functions), json!(3));
    }

    #[test]
    fn mixed_literal_and_expr_concatenates_as_string() {
        let store = store_with(&[("count", json!(3))]);
        let cache = ExpressionCache::new();
        let functions = FunctionTable::with_builtins();
        assert_eq!(
            cache.resolve("Counter: {{count}}", &store, &functions),
            json!("Counter: 3")
        );
    }

    #[test]
    fn arithmetic_and_functions() {
        let store = store_with(&[("name", json!("ada"))]);
        let functions = FunctionTable::with_builtins();
        let expr = parse("upper(name)").unwrap();
        assert_eq!(evaluate(&expr, &store, &functions).unwrap(), json!("ADA"));

        let expr = parse("1 + 2 * 3").unwrap();
        assert_eq!(evaluate(&expr, &store, &functions).unwrap(), json!(7.0));
    }

    #[test]
    fn whole_state_binding() {
        let store = store_with(&[("a", json!(1))]);
        let functions = FunctionTable::with_builtins();
        let expr = parse("len($)").unwrap();
        assert_eq!(evaluate(&expr, &store, &functions).unwrap(), json!(1));
    }

    #[test]
    fn bracket_indexing() {
        let store = store_with(&[("items", json!(["a", "b", "c"]))]);
        let functions = FunctionTable::with_builtins();
        let expr = parse("items[1]").unwrap();
        assert_eq!(evaluate(&expr, &store, &functions).unwrap(), json!("b"));
    }

    #[test]
    fn compile_error_falls_back_to_literal_text() {
        let store = StateStore::new();
        let cache = ExpressionCache::new();
        let functions = FunctionTable::with_builtins();
        let resolved = cache.resolve("{{(}}", &store, &functions);
        assert_eq!(resolved, json!("{{(}}"));
    }

    #[test]
    fn idempotent_second_evaluation_uses_cache() {
        let store = store_with(&[("count", json!(1))]);
        let cache = ExpressionCache::new();
        let functions = FunctionTable::with_builtins();
        cache.resolve("{{count}}", &store, &functions);
        cache.resolve("{{count}}", &store, &functions);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_empties_cache() {
        let store = store_with(&[("count", json!(1))]);
        let cache = ExpressionCache::new();
        let functions = FunctionTable::with_builtins();
        cache.resolve("{{count}}", &store, &functions);
        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
