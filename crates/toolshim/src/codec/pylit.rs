//! A small Python-literal grammar.
//!
//! Covers exactly what tool arguments need: numbers, strings, booleans,
//! `None`, lists, dicts and tuples, plus keyword-only call expressions
//! `name(key=value, ...)`. Nothing is ever evaluated; names other than the
//! boolean and null constants are rejected.
//!
//! Both spellings of the constants are accepted (`True`/`true`,
//! `False`/`false`, `None`/`null`) so text produced by [`repr`] parses back.

use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Why a fragment is not a literal (or a call).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct LiteralError(String);

impl LiteralError {
    fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

type Result<T> = std::result::Result<T, LiteralError>;

/// Deepest bracket nesting accepted, same limit as `serde_json`.
pub const MAX_NESTING: usize = 128;

/// A parsed literal. Tuples stay distinct from lists until converted.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i128),
    Float(f64),
    Str(String),
    List(Vec<Literal>),
    Tuple(Vec<Literal>),
    Dict(Vec<(Literal, Literal)>),
}

impl Literal {
    /// Convert into a JSON value. Tuples become arrays and dict keys are
    /// stringified the way `json.dumps` does it.
    pub fn into_value(self) -> Result<Value> {
        Ok(match self {
            Literal::None => Value::Null,
            Literal::Bool(b) => Value::Bool(b),
            Literal::Int(i) => int_value(i)?,
            Literal::Float(f) => float_value(f)?,
            Literal::Str(s) => Value::String(s),
            Literal::List(items) | Literal::Tuple(items) => Value::Array(
                items
                    .into_iter()
                    .map(Literal::into_value)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Literal::Dict(pairs) => {
                let mut map = Map::new();
                for (key, value) in pairs {
                    map.insert(key.into_key()?, value.into_value()?);
                }
                Value::Object(map)
            }
        })
    }

    fn into_key(self) -> Result<String> {
        match self {
            Literal::Str(s) => Ok(s),
            Literal::None => Ok("null".into()),
            Literal::Bool(b) => Ok(b.to_string()),
            Literal::Int(i) => Ok(i.to_string()),
            Literal::Float(f) => Ok(float_value(f)?.to_string()),
            _ => Err(LiteralError::new("dict keys must be strings, numbers or constants")),
        }
    }
}

fn int_value(i: i128) -> Result<Value> {
    if let Ok(v) = i64::try_from(i) {
        Ok(Value::from(v))
    } else if let Ok(v) = u64::try_from(i) {
        Ok(Value::from(v))
    } else {
        float_value(i as f64)
    }
}

fn float_value(f: f64) -> Result<Value> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| LiteralError::new(format!("{f} cannot be represented")))
}

/// A keyword-only call expression.
#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    /// Possibly dotted: `files.read`.
    pub name: String,
    /// Keyword arguments in source order, duplicates preserved.
    pub keywords: Vec<(String, Literal)>,
}

// ── Public entry points ───────────────────────────────────────────

/// Parse a single literal spanning the whole input.
pub fn parse_literal(src: &str) -> Result<Literal> {
    let mut parser = Parser::new(tokenize(src)?);
    parser.skip_separators();
    let literal = parser.literal()?;
    parser.skip_separators();
    match parser.next() {
        None => Ok(literal),
        Some(tok) => Err(LiteralError::new(format!(
            "unexpected {} after literal",
            tok.describe()
        ))),
    }
}

/// Parse a sequence of call expressions separated by newlines or `;`.
pub fn parse_calls(src: &str) -> Result<Vec<CallExpr>> {
    let mut parser = Parser::new(tokenize(src)?);
    let mut calls = Vec::new();
    loop {
        parser.skip_separators();
        if parser.peek().is_none() {
            break;
        }
        calls.push(parser.call()?);
        match parser.next() {
            None => break,
            Some(Token::Separator) => {}
            Some(tok) => {
                return Err(LiteralError::new(format!(
                    "unexpected {} after call",
                    tok.describe()
                )));
            }
        }
    }
    Ok(calls)
}

/// Render a value as a literal this grammar parses back: strings quoted,
/// booleans lower-cased, `null` as `None`.
pub fn repr(value: &Value) -> String {
    match value {
        Value::Null => "None".into(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(repr).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Object(map) => {
            let parts: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", quote(k), repr(v)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
    }
}

/// Like [`repr`] but top-level strings are left bare.
pub fn str_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => repr(other),
    }
}

/// Quote a string, preferring single quotes unless the text contains one
/// and no double quote.
///
/// `<` and backticks are written as `\x` escapes so a quoted value can
/// never close a `</code>` block or a Markdown fence.
pub fn quote(s: &str) -> String {
    let q = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(q);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '<' => out.push_str("\\x3c"),
            '`' => out.push_str("\\x60"),
            c if c == q => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(q);
    out
}

// ── Tokenizer ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Name(String),
    Number(String),
    Str(String),
    Open(char),
    Close(char),
    Comma,
    Colon,
    Equals,
    Dot,
    Minus,
    Plus,
    /// Newline or `;` outside brackets.
    Separator,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Name(n) => format!("name '{n}'"),
            Token::Number(n) => format!("number '{n}'"),
            Token::Str(_) => "string".into(),
            Token::Open(c) | Token::Close(c) => format!("'{c}'"),
            Token::Comma => "','".into(),
            Token::Colon => "':'".into(),
            Token::Equals => "'='".into(),
            Token::Dot => "'.'".into(),
            Token::Minus => "'-'".into(),
            Token::Plus => "'+'".into(),
            Token::Separator => "end of line".into(),
        }
    }
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
    tokens: Vec<Token>,
}

fn tokenize(src: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer {
        chars: src.chars().collect(),
        pos: 0,
        depth: 0,
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

impl Lexer {
    fn peek_char(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn run(&mut self) -> Result<()> {
        while let Some(c) = self.peek_char(0) {
            match c {
                ' ' | '\t' | '\r' | '\x0c' => self.pos += 1,
                '\n' | ';' => {
                    self.pos += 1;
                    if self.depth == 0 {
                        self.tokens.push(Token::Separator);
                    } else if c == ';' {
                        return Err(LiteralError::new("';' inside brackets"));
                    }
                }
                '#' => {
                    while self.peek_char(0).is_some_and(|c| c != '\n') {
                        self.pos += 1;
                    }
                }
                '\\' if self.peek_char(1) == Some('\n') => self.pos += 2,
                '\\' if self.peek_char(1) == Some('\r') && self.peek_char(2) == Some('\n') => {
                    self.pos += 3
                }
                '(' | '[' | '{' => {
                    self.depth += 1;
                    self.pos += 1;
                    self.tokens.push(Token::Open(c));
                }
                ')' | ']' | '}' => {
                    if self.depth == 0 {
                        return Err(LiteralError::new(format!("unbalanced '{c}'")));
                    }
                    self.depth -= 1;
                    self.pos += 1;
                    self.tokens.push(Token::Close(c));
                }
                ',' => self.single(Token::Comma),
                ':' => self.single(Token::Colon),
                '-' => self.single(Token::Minus),
                '+' => self.single(Token::Plus),
                '=' => {
                    if self.peek_char(1) == Some('=') {
                        return Err(LiteralError::new("comparisons are not literals"));
                    }
                    self.single(Token::Equals);
                }
                '.' if self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) => self.number(),
                '.' => self.single(Token::Dot),
                '"' | '\'' => self.string(false)?,
                c if c.is_ascii_digit() => self.number(),
                c if c.is_alphabetic() || c == '_' => self.name_or_prefixed_string()?,
                other => {
                    return Err(LiteralError::new(format!("unexpected character '{other}'")));
                }
            }
        }
        Ok(())
    }

    fn single(&mut self, tok: Token) {
        self.pos += 1;
        self.tokens.push(tok);
    }

    fn number(&mut self) {
        let start = self.pos;
        let radix_prefixed = self.peek_char(0) == Some('0')
            && self
                .peek_char(1)
                .is_some_and(|c| matches!(c, 'x' | 'X' | 'o' | 'O' | 'b' | 'B'));
        while let Some(c) = self.peek_char(0) {
            let exponent_sign = (c == '+' || c == '-')
                && !radix_prefixed
                && self.pos > start
                && matches!(self.chars[self.pos - 1], 'e' | 'E');
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || exponent_sign {
                self.pos += 1;
            } else {
                break;
            }
        }
        let raw: String = self.chars[start..self.pos].iter().collect();
        self.tokens.push(Token::Number(raw));
    }

    fn name_or_prefixed_string(&mut self) -> Result<()> {
        let start = self.pos;
        while self
            .peek_char(0)
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        if matches!(self.peek_char(0), Some('"' | '\'')) {
            return match name.to_ascii_lowercase().as_str() {
                "r" => self.string(true),
                "u" => self.string(false),
                _ => Err(LiteralError::new(format!(
                    "unsupported string prefix '{name}'"
                ))),
            };
        }
        self.tokens.push(Token::Name(name));
        Ok(())
    }

    fn string(&mut self, raw: bool) -> Result<()> {
        let quote = self.chars[self.pos];
        let triple = self.peek_char(1) == Some(quote) && self.peek_char(2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };

        let mut out = String::new();
        loop {
            let Some(c) = self.peek_char(0) else {
                return Err(LiteralError::new("unterminated string"));
            };
            if c == quote {
                if !triple {
                    self.pos += 1;
                    break;
                }
                if self.peek_char(1) == Some(quote) && self.peek_char(2) == Some(quote) {
                    self.pos += 3;
                    break;
                }
                out.push(c);
                self.pos += 1;
                continue;
            }
            if c == '\n' && !triple {
                return Err(LiteralError::new("newline in single-quoted string"));
            }
            if c == '\\' {
                let Some(next) = self.peek_char(1) else {
                    return Err(LiteralError::new("unterminated string"));
                };
                if raw {
                    out.push('\\');
                    out.push(next);
                    self.pos += 2;
                } else {
                    self.pos += 2;
                    self.escape(next, &mut out)?;
                }
                continue;
            }
            out.push(c);
            self.pos += 1;
        }
        self.tokens.push(Token::Str(out));
        Ok(())
    }

    /// Decode the escape whose selector `c` was just consumed.
    fn escape(&mut self, c: char, out: &mut String) -> Result<()> {
        match c {
            '\n' => {}
            '\\' | '\'' | '"' => out.push(c),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut code = c.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.peek_char(0).and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            self.pos += 1;
                        }
                        None => break,
                    }
                }
                out.push(char_from(code)?);
            }
            'x' => out.push(self.hex_escape(2)?),
            'u' => out.push(self.hex_escape(4)?),
            'U' => out.push(self.hex_escape(8)?),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex_escape(&mut self, len: usize) -> Result<char> {
        let digits: String = (0..len).filter_map(|i| self.peek_char(i)).collect();
        if digits.len() != len || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(LiteralError::new("truncated hex escape"));
        }
        self.pos += len;
        let code = u32::from_str_radix(&digits, 16)
            .map_err(|e| LiteralError::new(format!("bad hex escape: {e}")))?;
        char_from(code)
    }
}

fn char_from(code: u32) -> Result<char> {
    char::from_u32(code).ok_or_else(|| LiteralError::new(format!("invalid code point {code:#x}")))
}

fn number_literal(raw: &str) -> Result<Literal> {
    let clean: String = raw.chars().filter(|c| *c != '_').collect();
    let lower = clean.to_ascii_lowercase();
    let radix = match lower.get(..2) {
        Some("0x") => Some(16),
        Some("0o") => Some(8),
        Some("0b") => Some(2),
        _ => None,
    };
    let invalid = || LiteralError::new(format!("invalid number '{raw}'"));
    if let Some(radix) = radix {
        return i128::from_str_radix(lower.get(2..).unwrap_or_default(), radix)
            .map(Literal::Int)
            .map_err(|_| invalid());
    }
    if lower.contains(['.', 'e']) {
        return lower.parse::<f64>().map(Literal::Float).map_err(|_| invalid());
    }
    match lower.parse::<i128>() {
        Ok(i) => Ok(Literal::Int(i)),
        Err(_) => lower.parse::<f64>().map(Literal::Float).map_err(|_| invalid()),
    }
}

// ── Parser ────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn skip_separators(&mut self) {
        while self.peek() == Some(&Token::Separator) {
            self.pos += 1;
        }
    }

    fn unexpected(tok: Option<Token>, wanted: &str) -> LiteralError {
        match tok {
            Some(tok) => LiteralError::new(format!("expected {wanted}, found {}", tok.describe())),
            None => LiteralError::new(format!("expected {wanted}, found end of input")),
        }
    }

    fn literal(&mut self) -> Result<Literal> {
        match self.next() {
            Some(Token::Str(mut s)) => {
                // Adjacent string literals concatenate.
                while let Some(Token::Str(more)) = self.peek() {
                    s.push_str(more);
                    self.pos += 1;
                }
                Ok(Literal::Str(s))
            }
            Some(Token::Number(raw)) => number_literal(&raw),
            Some(Token::Minus) => match self.next() {
                Some(Token::Number(raw)) => match number_literal(&raw)? {
                    Literal::Int(i) => Ok(Literal::Int(-i)),
                    Literal::Float(f) => Ok(Literal::Float(-f)),
                    _ => Err(LiteralError::new("invalid negative number")),
                },
                other => Err(Self::unexpected(other, "a number after '-'")),
            },
            Some(Token::Plus) => match self.next() {
                Some(Token::Number(raw)) => number_literal(&raw),
                other => Err(Self::unexpected(other, "a number after '+'")),
            },
            Some(Token::Name(name)) => match name.as_str() {
                "True" | "true" => Ok(Literal::Bool(true)),
                "False" | "false" => Ok(Literal::Bool(false)),
                "None" | "null" => Ok(Literal::None),
                _ => Err(LiteralError::new(format!("'{name}' is not a literal"))),
            },
            Some(Token::Open(open)) => self.nested(open),
            other => Err(Self::unexpected(other, "a literal")),
        }
    }

    fn nested(&mut self, open: char) -> Result<Literal> {
        if self.depth >= MAX_NESTING {
            return Err(LiteralError::new(format!("nesting deeper than {MAX_NESTING} levels")));
        }
        self.depth += 1;
        let parsed = match open {
            '[' => self.sequence(']').map(Literal::List),
            '(' => self.paren(),
            _ => self.dict(),
        };
        self.depth -= 1;
        parsed
    }

    /// Comma-separated literals up to `close`; a trailing comma is allowed.
    fn sequence(&mut self, close: char) -> Result<Vec<Literal>> {
        let mut items = Vec::new();
        loop {
            if self.peek() == Some(&Token::Close(close)) {
                self.pos += 1;
                return Ok(items);
            }
            items.push(self.literal()?);
            match self.next() {
                Some(Token::Comma) => {}
                Some(Token::Close(c)) if c == close => return Ok(items),
                other => return Err(Self::unexpected(other, &format!("',' or '{close}'"))),
            }
        }
    }

    /// `()` and `(a, ...)` are tuples, `(a)` is just `a`.
    fn paren(&mut self) -> Result<Literal> {
        if self.peek() == Some(&Token::Close(')')) {
            self.pos += 1;
            return Ok(Literal::Tuple(Vec::new()));
        }
        let first = self.literal()?;
        match self.next() {
            Some(Token::Close(')')) => Ok(first),
            Some(Token::Comma) => {
                let mut items = vec![first];
                items.extend(self.sequence(')')?);
                Ok(Literal::Tuple(items))
            }
            other => Err(Self::unexpected(other, "',' or ')'")),
        }
    }

    fn dict(&mut self) -> Result<Literal> {
        let mut pairs = Vec::new();
        loop {
            if self.peek() == Some(&Token::Close('}')) {
                self.pos += 1;
                return Ok(Literal::Dict(pairs));
            }
            let key = self.literal()?;
            match self.next() {
                Some(Token::Colon) => {}
                other => return Err(Self::unexpected(other, "':'")),
            }
            let value = self.literal()?;
            pairs.push((key, value));
            match self.next() {
                Some(Token::Comma) => {}
                Some(Token::Close('}')) => return Ok(Literal::Dict(pairs)),
                other => return Err(Self::unexpected(other, "',' or '}'")),
            }
        }
    }

    fn call(&mut self) -> Result<CallExpr> {
        let mut name = match self.next() {
            Some(Token::Name(n)) => n,
            other => return Err(Self::unexpected(other, "a function name")),
        };
        while self.peek() == Some(&Token::Dot) {
            self.pos += 1;
            match self.next() {
                Some(Token::Name(part)) => {
                    name.push('.');
                    name.push_str(&part);
                }
                other => return Err(Self::unexpected(other, "a name after '.'")),
            }
        }
        match self.next() {
            Some(Token::Open('(')) => {}
            other => return Err(Self::unexpected(other, "'('")),
        }

        let mut keywords = Vec::new();
        loop {
            if self.peek() == Some(&Token::Close(')')) {
                self.pos += 1;
                break;
            }
            let key = match (self.peek(), self.peek_at(1)) {
                (Some(Token::Name(key)), Some(Token::Equals)) => key.clone(),
                _ => {
                    return Err(LiteralError::new(
                        "only keyword arguments are supported",
                    ));
                }
            };
            self.pos += 2;
            let value = self.literal()?;
            keywords.push((key, value));
            match self.next() {
                Some(Token::Comma) => {}
                Some(Token::Close(')')) => break,
                other => return Err(Self::unexpected(other, "',' or ')'")),
            }
        }
        Ok(CallExpr { name, keywords })
    }
}
