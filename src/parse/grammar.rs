//! Recursive descent parser for command expressions
//!
//! This module turns a flat token list into an expression tree. A `(`
//! opens a nested list collected until the matching `)`; an unexpected
//! `)` or running out of tokens while a list is open is a structural
//! error. Leaves are classified in a fixed order: quoted string, `null`,
//! integer, float, then symbol/keyword name.

use crate::error::{CorrectionError, Result};
use crate::parse::tokens::{tokenize, Token};

/// Leaf value of the command language
#[derive(Clone, Debug, PartialEq)]
pub enum Atom {
    Int(i64),
    Float(f64),
    Str(String),
    /// Bare name in internal form (words separated by `_`)
    Sym(String),
    /// `#:`-marked name in internal form, marker stripped
    Key(String),
    Null,
}

/// Expression tree: an atom or an ordered list of expressions
///
/// The tree and its text encoding are distinct types connected only by
/// `parse` and `serialize`.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Atom(Atom),
    List(Vec<Expr>),
}

impl Expr {
    pub fn sym(name: &str) -> Expr {
        Expr::Atom(Atom::Sym(name.to_string()))
    }

    pub fn key(name: &str) -> Expr {
        Expr::Atom(Atom::Key(name.to_string()))
    }

    pub fn str(text: &str) -> Expr {
        Expr::Atom(Atom::Str(text.to_string()))
    }

    pub fn int(n: i64) -> Expr {
        Expr::Atom(Atom::Int(n))
    }

    pub fn float(f: f64) -> Expr {
        Expr::Atom(Atom::Float(f))
    }

    pub fn null() -> Expr {
        Expr::Atom(Atom::Null)
    }

    pub fn as_list(&self) -> Option<&[Expr]> {
        match self {
            Expr::List(items) => Some(items),
            Expr::Atom(_) => None,
        }
    }

    /// Name of the symbol heading this list, if any
    pub fn head_name(&self) -> Option<&str> {
        match self.as_list()?.first()? {
            Expr::Atom(Atom::Sym(name)) => Some(name),
            _ => None,
        }
    }
}

/// Turn a command string into an expression tree
pub fn parse(cmd: &str) -> Result<Expr> {
    let tokens = tokenize(cmd)?;
    let mut pos = 0;
    let expr = read_expr(&tokens, &mut pos)?;
    if pos < tokens.len() {
        return Err(CorrectionError::Syntax(format!(
            "trailing tokens after expression: {} unread",
            tokens.len() - pos
        )));
    }
    Ok(expr)
}

fn read_expr(tokens: &[Token], pos: &mut usize) -> Result<Expr> {
    let token = tokens
        .get(*pos)
        .ok_or_else(|| CorrectionError::Syntax("unexpected end of input".into()))?;
    *pos += 1;
    match token {
        Token::Open => {
            let mut items = Vec::new();
            loop {
                match tokens.get(*pos) {
                    None => {
                        return Err(CorrectionError::Syntax("unclosed list".into()));
                    }
                    Some(Token::Close) => {
                        *pos += 1;
                        return Ok(Expr::List(items));
                    }
                    Some(_) => items.push(read_expr(tokens, pos)?),
                }
            }
        }
        Token::Close => Err(CorrectionError::Syntax("unexpected )".into())),
        Token::Atom(text) => Ok(Expr::Atom(atomize(text)?)),
    }
}

/// Classify a leaf token, trying each atom form in order
fn atomize(token: &str) -> Result<Atom> {
    if token.starts_with('"') {
        if token.len() < 2 || !token.ends_with('"') {
            return Err(CorrectionError::Syntax(format!(
                "malformed string token: {}",
                token
            )));
        }
        return Ok(Atom::Str(unescape(&token[1..token.len() - 1])?));
    }
    if token == "null" {
        return Ok(Atom::Null);
    }
    if let Ok(n) = token.parse::<i64>() {
        return Ok(Atom::Int(n));
    }
    if let Ok(f) = token.parse::<f64>() {
        return Ok(Atom::Float(f));
    }
    if let Some(name) = token.strip_prefix("#:") {
        return Ok(Atom::Key(internalize_name(name)));
    }
    Ok(Atom::Sym(internalize_name(token)))
}

/// External name form to internal: `-` becomes `_`, first character kept
pub fn internalize_name(name: &str) -> String {
    let mut chars = name.chars();
    let mut out = String::with_capacity(name.len());
    if let Some(first) = chars.next() {
        out.push(first);
    }
    for ch in chars {
        out.push(if ch == '-' { '_' } else { ch });
    }
    out
}

/// Decode the escape sequences the serializer emits
fn unescape(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => {
                return Err(CorrectionError::Syntax(format!(
                    "unknown escape sequence: \\{}",
                    other
                )));
            }
            None => {
                return Err(CorrectionError::Syntax(
                    "dangling escape at end of string".into(),
                ));
            }
        }
    }
    Ok(out)
}
