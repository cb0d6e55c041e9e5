//! Command serialization
//!
//! Exact inverse of the parser: an expression tree becomes canonical
//! command text. Lists are parenthesized with single-space separation and
//! no space directly after `(` or before `)`. String escapes are
//! re-encoded, so `serialize` and `parse` round-trip both ways.

use crate::parse::grammar::{Atom, Expr};

/// Turn an expression tree into canonical command text
pub fn serialize(expr: &Expr) -> String {
    let mut tokens = Vec::new();
    write_to_tokens(expr, &mut tokens);
    detokenize(&tokens)
}

fn write_to_tokens(expr: &Expr, tokens: &mut Vec<String>) {
    match expr {
        Expr::Atom(atom) => tokens.push(deatomize(atom)),
        Expr::List(items) => {
            tokens.push("(".to_string());
            for item in items {
                write_to_tokens(item, tokens);
            }
            tokens.push(")".to_string());
        }
    }
}

/// Join tokens with single spaces, gluing brackets to their neighbors
fn detokenize(tokens: &[String]) -> String {
    let mut out = String::new();
    for token in tokens {
        if !out.is_empty() && token.as_str() != ")" && !out.ends_with('(') {
            out.push(' ');
        }
        out.push_str(token);
    }
    out
}

fn deatomize(atom: &Atom) -> String {
    match atom {
        Atom::Int(n) => n.to_string(),
        // Debug formatting keeps the decimal point on whole floats, so
        // 3.0 re-parses as a float rather than an integer
        Atom::Float(f) => format!("{:?}", f),
        Atom::Str(s) => format!("\"{}\"", escape(s)),
        Atom::Sym(name) => externalize_name(name),
        Atom::Key(name) => format!("#:{}", externalize_name(name)),
        Atom::Null => "null".to_string(),
    }
}

/// Internal name form to external: `_` becomes `-`, first character kept
pub fn externalize_name(name: &str) -> String {
    let mut chars = name.chars();
    let mut out = String::with_capacity(name.len());
    if let Some(first) = chars.next() {
        out.push(first);
    }
    for ch in chars {
        out.push(if ch == '_' { '-' } else { ch });
    }
    out
}

/// Encode the escape sequences the parser decodes
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::grammar::parse;

    #[test]
    fn test_serialize_spacing() {
        let expr = Expr::List(vec![
            Expr::sym("set_value"),
            Expr::key("target"),
            Expr::List(vec![Expr::sym("interval"), Expr::key("index"), Expr::int(0)]),
            Expr::key("new_name"),
            Expr::str("b"),
        ]);
        assert_eq!(
            serialize(&expr),
            "(set-value #:target (interval #:index 0) #:new-name \"b\")"
        );
    }

    #[test]
    fn test_whole_floats_keep_decimal_point() {
        assert_eq!(serialize(&Expr::float(3.0)), "3.0");
        assert_eq!(parse("3.0").unwrap(), Expr::float(3.0));
    }

    #[test]
    fn test_round_trip_canonical_text() {
        let text = "(merge-next #:target (interval-pair #:index 0 #:name \"a\" \
                    #:stop 2.1 #:next-start 2.1 #:next-name \"b\") #:new-name \"ab\" \
                    #:new-stop null #:new-next-start null #:new-next-name null)";
        let text: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let expr = parse(&text).unwrap();
        assert_eq!(serialize(&expr), text);
        assert_eq!(parse(&serialize(&expr)).unwrap(), expr);
    }

    #[test]
    fn test_round_trip_escaped_string() {
        let expr = Expr::str("say \"hi\"\nback\\slash");
        let text = serialize(&expr);
        assert_eq!(parse(&text).unwrap(), expr);
    }
}
