//! Validated commands and generic inversion
//!
//! A command is a list expression headed by an operation name, carrying
//! keyword arguments and one nested target descriptor with the index and
//! every old field value its inverse needs. Construction checks the
//! structure once (in particular that every `new-<field>` argument has a
//! matching `<field>` in the descriptor), so inversion is infallible and
//! needs no per-operation logic.

use crate::error::{CorrectionError, Result};
use crate::ops::OpKind;
use crate::parse::grammar::{Atom, Expr};
use crate::parse::{parse, serialize};
use std::fmt;

const NEW_PREFIX: &str = "new_";

/// One self-invertible mutation description
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    op: OpKind,
    expr: Expr,
}

impl Command {
    /// Validate an expression tree as a command
    pub fn from_expr(expr: Expr) -> Result<Command> {
        let items = expr
            .as_list()
            .ok_or_else(|| CorrectionError::Syntax("command must be a list".into()))?;
        let name = expr
            .head_name()
            .ok_or_else(|| CorrectionError::Syntax("command must begin with an operation name".into()))?;
        let op = OpKind::from_name(name).ok_or_else(|| {
            CorrectionError::Lookup(format!("operation name not recognized: {}", name))
        })?;
        validate_pairs(&items[1..])?;

        let descriptor = keyword_value(items, "target")
            .ok_or_else(|| CorrectionError::Validation("command requires a target keyword".into()))?;
        let desc_items = descriptor.as_list().ok_or_else(|| {
            CorrectionError::Validation("target descriptor must be a nested expression".into())
        })?;
        match descriptor.head_name() {
            Some("interval") | Some("interval_pair") => {}
            _ => {
                return Err(CorrectionError::Validation(
                    "target descriptor must be interval or interval-pair".into(),
                ));
            }
        }
        validate_pairs(&desc_items[1..])?;
        if keyword_value(desc_items, "index").is_none() {
            return Err(CorrectionError::Validation(
                "target descriptor requires an index".into(),
            ));
        }

        // Generic inversion precondition: every new-<field> argument must
        // have a matching old <field> in the descriptor
        for (key, _) in keyword_pairs(items) {
            if let Some(base) = key.strip_prefix(NEW_PREFIX) {
                if keyword_value(desc_items, base).is_none() {
                    return Err(CorrectionError::Validation(format!(
                        "argument new-{} has no matching {} field in the target descriptor",
                        base, base
                    )));
                }
            }
        }

        Ok(Command { op, expr })
    }

    /// Parse and validate command text
    pub fn parse(text: &str) -> Result<Command> {
        Command::from_expr(parse(text)?)
    }

    pub fn op(&self) -> OpKind {
        self.op
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Canonical command text, as written to the ops log
    pub fn text(&self) -> String {
        serialize(&self.expr)
    }

    /// The structurally-opposite command: opcode flipped through the
    /// inverse table, each `new-<field>` value swapped with the
    /// descriptor's `<field>` value, everything else untouched. An
    /// involution: inverting twice restores the original structure.
    pub fn inverted(&self) -> Command {
        let mut items = match &self.expr {
            Expr::List(items) => items.clone(),
            Expr::Atom(_) => unreachable!("command validated at construction"),
        };
        let inverse = self.op.inverse();
        items[0] = Expr::sym(inverse.name());

        let target_slot = keyword_slot(&items, "target")
            .unwrap_or_else(|| unreachable!("command validated at construction"));
        // Take the descriptor out so both sides of the swap are mutable
        let descriptor = std::mem::replace(&mut items[target_slot], Expr::null());
        let mut desc_items = match descriptor {
            Expr::List(desc_items) => desc_items,
            Expr::Atom(_) => unreachable!("command validated at construction"),
        };

        let mut slot = 1;
        while slot + 1 < items.len() {
            let base = match &items[slot] {
                Expr::Atom(Atom::Key(key)) => key.strip_prefix(NEW_PREFIX).map(str::to_string),
                _ => None,
            };
            if let Some(base) = base {
                let old_slot = keyword_slot(&desc_items, &base)
                    .unwrap_or_else(|| unreachable!("command validated at construction"));
                std::mem::swap(&mut items[slot + 1], &mut desc_items[old_slot]);
            }
            slot += 2;
        }

        items[target_slot] = Expr::List(desc_items);
        Command {
            op: inverse,
            expr: Expr::List(items),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// Check that a list tail is well-formed keyword/value pairs
fn validate_pairs(tail: &[Expr]) -> Result<()> {
    if tail.len() % 2 != 0 {
        return Err(CorrectionError::Syntax(
            "dangling keyword without a value".into(),
        ));
    }
    for pair in tail.chunks_exact(2) {
        if !matches!(&pair[0], Expr::Atom(Atom::Key(_))) {
            return Err(CorrectionError::Syntax(format!(
                "expected keyword, found {:?}",
                pair[0]
            )));
        }
        if matches!(&pair[1], Expr::Atom(Atom::Key(_))) {
            return Err(CorrectionError::Syntax(
                "keyword used in value position".into(),
            ));
        }
    }
    Ok(())
}

/// Index of the value slot following the named keyword
fn keyword_slot(items: &[Expr], name: &str) -> Option<usize> {
    let mut slot = 1;
    while slot + 1 < items.len() {
        if matches!(&items[slot], Expr::Atom(Atom::Key(key)) if key == name) {
            return Some(slot + 1);
        }
        slot += 2;
    }
    None
}

fn keyword_value<'a>(items: &'a [Expr], name: &str) -> Option<&'a Expr> {
    keyword_slot(items, name).map(|slot| &items[slot])
}

/// Ordered (keyword, value) view of a command's top-level arguments
fn keyword_pairs(items: &[Expr]) -> Vec<(&str, &Expr)> {
    let mut pairs = Vec::new();
    let mut slot = 1;
    while slot + 1 < items.len() {
        if let Expr::Atom(Atom::Key(key)) = &items[slot] {
            pairs.push((key.as_str(), &items[slot + 1]));
        }
        slot += 2;
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    const MERGE: &str = "(merge-next #:target (interval-pair #:index 0 #:name \"a\" \
         #:stop 2.1 #:next-start 2.1 #:next-name \"b\") #:new-name \"ab\" #:new-stop null \
         #:new-next-start null #:new-next-name null)";

    fn merge_text() -> String {
        MERGE.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_parse_validates_opcode() {
        let err = Command::parse("(explode #:target (interval #:index 0))").unwrap_err();
        assert!(matches!(err, CorrectionError::Lookup(_)));
    }

    #[test]
    fn test_parse_requires_target() {
        let err = Command::parse("(delete #:index 0)").unwrap_err();
        assert!(matches!(err, CorrectionError::Validation(_)));
    }

    #[test]
    fn test_parse_rejects_unmatched_new_argument() {
        let err = Command::parse(
            "(set-value #:target (interval #:index 0) #:new-name \"b\")",
        )
        .unwrap_err();
        assert!(err.to_string().contains("new-name"));
    }

    #[test]
    fn test_invert_swaps_values_and_opcode() {
        let cmd = Command::parse(&merge_text()).unwrap();
        let inverse = cmd.inverted();

        assert_eq!(inverse.op(), OpKind::Split);
        assert_eq!(
            inverse.text(),
            "(split #:target (interval-pair #:index 0 #:name \"ab\" #:stop null \
             #:next-start null #:next-name null) #:new-name \"a\" #:new-stop 2.1 \
             #:new-next-start 2.1 #:new-next-name \"b\")"
        );
    }

    #[test]
    fn test_invert_is_involution() {
        for text in [
            merge_text(),
            "(set-value #:target (interval #:index 3 #:stop 2.5) #:new-stop 2.75)".to_string(),
            "(delete #:target (interval #:index 1 #:start 1.0 #:stop 2.0 #:name \"x\"))"
                .to_string(),
        ] {
            let cmd = Command::parse(&text).unwrap();
            assert_eq!(cmd.inverted().inverted(), cmd);
            assert_eq!(cmd.inverted().inverted().text(), text);
        }
    }

    #[test]
    fn test_delete_create_are_exact_mutual_inverses() {
        let cmd = Command::parse(
            "(delete #:target (interval #:index 2 #:start 3.1 #:stop 3.3 #:name \"c2\" \
             #:tier \"female\"))",
        )
        .unwrap();
        let inverse = cmd.inverted();
        assert_eq!(inverse.op(), OpKind::Create);
        // No new-* arguments, so the snapshot rides along untouched
        assert!(inverse.text().contains("#:tier \"female\""));
        assert_eq!(inverse.inverted(), cmd);
    }
}
