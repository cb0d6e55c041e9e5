//! Correction log for labeled interval annotations
//!
//! This crate tracks manual corrections to a sequence of labeled time
//! intervals as a durable, replayable, invertible command log: a compact
//! textual command language with an exact parse/serialize pair, a generic
//! inversion algorithm, and an undo/redo history stack persisted beside
//! the event-data file it is bound to.

pub mod command;
pub mod error;
pub mod eval;
pub mod models;
pub mod ops;
pub mod parse;
pub mod stack;
pub mod utils;

// Re-export commonly used types
pub use command::Command;
pub use error::{CorrectionError, Result};
pub use models::{Event, Value};
pub use ops::OpKind;
pub use stack::{AttachMode, CorrectionStack};
