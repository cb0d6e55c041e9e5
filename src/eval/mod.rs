//! Command expression evaluation
//!
//! Interprets an expression tree against the live event sequence. The
//! environment is a closed set of builtins (the five operations plus the
//! two target-descriptor constructors) dispatched by exhaustive match;
//! there is no open name-to-callable mapping and no control flow. The
//! event handle is threaded explicitly through every call.

use crate::error::{CorrectionError, Result};
use crate::models::{Event, Value};
use crate::ops::{self, Kwargs, OpKind};
use crate::parse::grammar::{Atom, Expr};

/// Everything a symbol may name in head position
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Builtin {
    Op(OpKind),
    Interval,
    IntervalPair,
}

impl Builtin {
    /// Environment lookup over the closed builtin set
    pub fn lookup(name: &str) -> Result<Builtin> {
        if let Some(op) = OpKind::from_name(name) {
            return Ok(Builtin::Op(op));
        }
        match name {
            "interval" => Ok(Builtin::Interval),
            "interval_pair" => Ok(Builtin::IntervalPair),
            _ => Err(CorrectionError::Lookup(format!(
                "operation name not recognized: {}",
                name
            ))),
        }
    }
}

/// Evaluate an expression: a mutation returns `Null`, a descriptor
/// constructor returns its realized field mapping, any other atom returns
/// itself
pub fn evaluate(expr: &Expr, events: &mut Vec<Event>) -> Result<Value> {
    match expr {
        Expr::Atom(Atom::Sym(name)) => {
            // Builtins are not first-class values; a symbol anywhere but
            // head position has nothing to evaluate to
            Builtin::lookup(name)?;
            Err(CorrectionError::Lookup(format!(
                "operation {} used in value position",
                name
            )))
        }
        Expr::Atom(atom) => atom_value(atom),
        Expr::List(items) => {
            let head = items
                .first()
                .ok_or_else(|| CorrectionError::Syntax("empty command list".into()))?;
            let name = match head {
                Expr::Atom(Atom::Sym(name)) => name,
                _ => {
                    return Err(CorrectionError::Syntax(
                        "command must begin with an operation name".into(),
                    ));
                }
            };
            let builtin = Builtin::lookup(name)?;
            let kwargs = evaluate_kwargs(&items[1..], events)?;
            match builtin {
                Builtin::Op(op) => {
                    log::debug!("executing {} on {} events", op.name(), events.len());
                    ops::execute(op, events, &kwargs)?;
                    Ok(Value::Null)
                }
                Builtin::Interval | Builtin::IntervalPair => Ok(Value::Map(kwargs)),
            }
        }
    }
}

/// Partition a list tail into ordered (keyword, value) pairs and evaluate
/// each value, so nested descriptors realize into composite values
fn evaluate_kwargs(tail: &[Expr], events: &mut Vec<Event>) -> Result<Kwargs> {
    let mut kwargs = Kwargs::new();
    let mut pairs = tail.chunks_exact(2);
    for pair in &mut pairs {
        let key = match &pair[0] {
            Expr::Atom(Atom::Key(name)) => name.clone(),
            other => {
                return Err(CorrectionError::Syntax(format!(
                    "expected keyword, found {:?}",
                    other
                )));
            }
        };
        if matches!(&pair[1], Expr::Atom(Atom::Key(_))) {
            return Err(CorrectionError::Syntax(format!(
                "keyword {} is missing a value",
                key
            )));
        }
        let value = evaluate(&pair[1], events)?;
        kwargs.insert(key, value);
    }
    if !pairs.remainder().is_empty() {
        return Err(CorrectionError::Syntax(
            "dangling keyword without a value".into(),
        ));
    }
    Ok(kwargs)
}

fn atom_value(atom: &Atom) -> Result<Value> {
    match atom {
        Atom::Int(n) => Ok(Value::Int(*n)),
        Atom::Float(f) => Ok(Value::Float(*f)),
        Atom::Str(s) => Ok(Value::Str(s.clone())),
        Atom::Null => Ok(Value::Null),
        Atom::Key(name) => Err(CorrectionError::Syntax(format!(
            "keyword {} used in value position",
            name
        ))),
        Atom::Sym(_) => unreachable!("symbols handled by evaluate"),
    }
}
