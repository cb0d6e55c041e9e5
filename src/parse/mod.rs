//! Command language parsing and serialization
//!
//! This module contains the lexer, the recursive-descent parser, and the
//! serializer for the textual command language. `parse` and `serialize`
//! are exact inverses over canonical command text.

pub mod grammar;
pub mod tokens;
pub mod writer;

// Re-export commonly used types
pub use grammar::{parse, Atom, Expr};
pub use tokens::{tokenize, Token};
pub use writer::serialize;
