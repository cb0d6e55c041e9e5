//! Correction stack: history, codegen, and session persistence
//!
//! Manages the undo/redo command history over one event sequence, builds
//! self-invertible commands from user-level edits, and persists the
//! accumulated history to an ops-log file bound to the exact event-data
//! file it edits.

pub mod persist;

use crate::command::Command;
use crate::error::{CorrectionError, Result};
use crate::eval::evaluate;
use crate::models::{Event, Value};
use crate::ops::OpKind;
use crate::parse::grammar::{Atom, Expr};
use crate::utils::sha256_file;
use self::persist::Metadata;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// How to interpret an existing ops log on attach
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachMode {
    /// The event data already reflects the log; load history only
    TrustExisting,
    /// The event data is pristine; apply every logged command in order
    ReplayAll,
}

/// Undo/redo history over one exclusively-owned event sequence
///
/// Strict two-stack history with no random seek: `undo_stack` holds the
/// forward commands already applied (oldest first), `redo_stack` the
/// inverse forms available for redo. Any push discards the redo branch.
/// Single-threaded and fully synchronous; callers serialize externally if
/// sharing is required.
#[derive(Debug)]
pub struct CorrectionStack {
    events: Vec<Event>,
    undo_stack: Vec<Command>,
    redo_stack: Vec<Command>,
    session_id: Uuid,
    log_file: Option<PathBuf>,
    data_file: Option<PathBuf>,
    data_hash: Option<String>,
}

impl CorrectionStack {
    /// Fresh in-memory session over an event sequence, no files bound
    pub fn new(events: Vec<Event>) -> Self {
        let session_id = Uuid::new_v4();
        log::info!("new correction session {}", session_id);
        CorrectionStack {
            events,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            session_id,
            log_file: None,
            data_file: None,
            data_hash: None,
        }
    }

    /// Fresh session bound to an ops-log path and, optionally, the
    /// event-data file the sequence was loaded from (its digest is taken
    /// now and persisted with the log)
    pub fn with_files(
        events: Vec<Event>,
        log_file: &Path,
        data_file: Option<&Path>,
    ) -> Result<Self> {
        let mut stack = CorrectionStack::new(events);
        stack.log_file = Some(log_file.to_path_buf());
        if let Some(data_file) = data_file {
            stack.data_hash = Some(sha256_file(data_file)?);
            stack.data_file = Some(data_file.to_path_buf());
        }
        Ok(stack)
    }

    /// Resume from an existing ops log
    ///
    /// `TrustExisting` loads the history without touching the events;
    /// `ReplayAll` first verifies the bound data file against the
    /// metadata digest (refusing a mismatch), then applies every logged
    /// command in order.
    pub fn attach(
        events: Vec<Event>,
        log_file: &Path,
        data_file: Option<&Path>,
        mode: AttachMode,
    ) -> Result<Self> {
        let commands = persist::read_log(log_file)?;
        let metadata = persist::read_metadata(&persist::metadata_path(log_file))?;
        let mut stack = CorrectionStack::new(events);
        stack.log_file = Some(log_file.to_path_buf());
        stack.data_file = data_file.map(Path::to_path_buf);

        if let Some(metadata) = &metadata {
            stack.session_id = Uuid::parse_str(&metadata.uuid).map_err(|_| {
                CorrectionError::Validation(format!("metadata uuid not valid: {}", metadata.uuid))
            })?;
            stack.data_hash = metadata.evfile_hash.clone();
        } else {
            log::warn!("ops log {} has no metadata sidecar", log_file.display());
        }

        match mode {
            AttachMode::TrustExisting => {
                stack.undo_stack = commands;
            }
            AttachMode::ReplayAll => {
                if stack.data_file.is_some() && stack.data_hash.is_some() {
                    stack.verify_binding()?;
                }
                for cmd in commands {
                    evaluate(cmd.expr(), &mut stack.events)?;
                    stack.undo_stack.push(cmd);
                }
            }
        }
        log::info!(
            "attached session {} with {} commands",
            stack.session_id,
            stack.undo_stack.len()
        );
        Ok(stack)
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Take the event sequence back from the stack
    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    // history

    /// Apply a command and record it; discards the redo branch
    pub fn push(&mut self, cmd: Command) -> Result<()> {
        evaluate(cmd.expr(), &mut self.events)?;
        log::debug!("push {}", cmd);
        self.undo_stack.push(cmd);
        self.redo_stack.clear();
        Ok(())
    }

    /// Roll back the most recent command
    pub fn undo(&mut self) -> Result<()> {
        let cmd = self
            .undo_stack
            .last()
            .ok_or_else(|| CorrectionError::History("nothing to undo".into()))?;
        let inverse = cmd.inverted();
        evaluate(inverse.expr(), &mut self.events)?;
        log::debug!("undo via {}", inverse);
        self.undo_stack.pop();
        self.redo_stack.push(inverse);
        Ok(())
    }

    /// Re-apply the most recently undone command
    pub fn redo(&mut self) -> Result<()> {
        let inverse = self
            .redo_stack
            .last()
            .ok_or_else(|| CorrectionError::History("nothing to redo".into()))?;
        let forward = inverse.inverted();
        evaluate(forward.expr(), &mut self.events)?;
        log::debug!("redo {}", forward);
        self.redo_stack.pop();
        self.undo_stack.push(forward);
        Ok(())
    }

    /// Read-only look at an applied command, oldest first
    pub fn peek(&self, index: usize) -> Result<&Command> {
        self.undo_stack.get(index).ok_or_else(|| {
            CorrectionError::History(format!(
                "peek index {} out of range for {} commands",
                index,
                self.undo_stack.len()
            ))
        })
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    // persistence

    /// Confirm the bound event-data file still matches the recorded digest
    pub fn verify_binding(&self) -> Result<()> {
        let data_file = self.data_file.as_ref().ok_or_else(|| {
            CorrectionError::Validation("no event-data file bound".into())
        })?;
        let expected = self.data_hash.as_ref().ok_or_else(|| {
            CorrectionError::Validation("no event-data digest recorded".into())
        })?;
        let actual = sha256_file(data_file)?;
        if &actual != expected {
            return Err(CorrectionError::IntegrityMismatch {
                expected: expected.clone(),
                actual,
            });
        }
        Ok(())
    }

    fn metadata(&self) -> Metadata {
        Metadata {
            uuid: self.session_id.to_string(),
            evfile_hash: self.data_hash.clone(),
        }
    }

    /// Write the history and metadata to the bound primary pair
    pub fn persist(&self) -> Result<()> {
        let log_file = self.bound_log_file()?.to_path_buf();
        self.persist_to(&log_file)
    }

    /// Write the history and metadata to an explicit ops-log path
    pub fn persist_to(&self, log_file: &Path) -> Result<()> {
        persist::write_pair(log_file, &self.undo_stack, &self.metadata())?;
        log::info!(
            "persisted {} commands to {}",
            self.undo_stack.len(),
            log_file.display()
        );
        Ok(())
    }

    /// Write the history and metadata to the distinctly-named backup pair,
    /// leaving the primary files untouched
    pub fn persist_backup(&self) -> Result<()> {
        let log_file = persist::backup_path(self.bound_log_file()?);
        let meta_file = persist::backup_path(&persist::metadata_path(self.bound_log_file()?));
        persist::write_log(&log_file, &self.undo_stack)?;
        persist::write_metadata(&meta_file, &self.metadata())?;
        log::warn!(
            "persisted {} commands to backup {}",
            self.undo_stack.len(),
            log_file.display()
        );
        Ok(())
    }

    fn bound_log_file(&self) -> Result<&Path> {
        self.log_file
            .as_deref()
            .ok_or_else(|| CorrectionError::Validation("no ops-log file bound".into()))
    }

    /// Scoped editing session
    ///
    /// Runs the closure against this stack. On success the accumulated
    /// history goes to the primary files; on failure it goes to the
    /// backup pair instead and the error propagates, so confirmed and
    /// crashed state never commingle.
    pub fn run_session<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        match f(self) {
            Ok(value) => {
                self.persist()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(backup_err) = self.persist_backup() {
                    log::error!("backup persistence failed: {}", backup_err);
                }
                Err(err)
            }
        }
    }

    // code generators

    fn event_at(&self, index: usize) -> Result<&Event> {
        self.events.get(index).ok_or_else(|| {
            CorrectionError::Validation(format!(
                "index {} out of range for {} events",
                index,
                self.events.len()
            ))
        })
    }

    /// Command to overwrite one named field, embedding the old value
    pub fn set_value(&self, index: usize, field: &str, value: Value) -> Result<Command> {
        let old = self.event_at(index)?.get(field).ok_or_else(|| {
            CorrectionError::Lookup(format!("field name not recognized: {}", field))
        })?;
        let expr = command_expr(
            OpKind::SetValue,
            descriptor("interval", index, vec![(field.to_string(), old)])?,
            vec![(format!("new_{}", field), value)],
        )?;
        Command::from_expr(expr)
    }

    /// Command to rename an interval
    pub fn rename(&self, index: usize, new_name: &str) -> Result<Command> {
        self.set_value(index, "name", Value::Str(new_name.to_string()))
    }

    /// Command to move an interval's start
    pub fn set_start(&self, index: usize, new_start: f64) -> Result<Command> {
        self.set_value(index, "start", Value::Float(new_start))
    }

    /// Command to move an interval's stop
    pub fn set_stop(&self, index: usize, new_stop: f64) -> Result<Command> {
        self.set_value(index, "stop", Value::Float(new_stop))
    }

    /// Command to merge an interval with its successor
    ///
    /// Without an explicit name the merged interval concatenates the two
    /// parents' names.
    pub fn merge_next(&self, index: usize, new_name: Option<&str>) -> Result<Command> {
        let event = self.event_at(index)?;
        let next = self.event_at(index + 1)?;
        let merged = match new_name {
            Some(name) => name.to_string(),
            None => format!("{}{}", event.name, next.name),
        };
        let expr = command_expr(
            OpKind::MergeNext,
            descriptor(
                "interval_pair",
                index,
                vec![
                    ("name".to_string(), Value::Str(event.name.clone())),
                    ("stop".to_string(), Value::Float(event.stop)),
                    ("next_start".to_string(), Value::Float(next.start)),
                    ("next_name".to_string(), Value::Str(next.name.clone())),
                ],
            )?,
            vec![
                ("new_name".to_string(), Value::Str(merged)),
                ("new_stop".to_string(), Value::Null),
                ("new_next_start".to_string(), Value::Null),
                ("new_next_name".to_string(), Value::Null),
            ],
        )?;
        Command::from_expr(expr)
    }

    /// Command to split an interval in two at a boundary inside its span
    ///
    /// Defaults: the first part keeps the old name, the second gets an
    /// empty one.
    pub fn split(
        &self,
        index: usize,
        at: f64,
        new_name: Option<&str>,
        new_next_name: Option<&str>,
    ) -> Result<Command> {
        let event = self.event_at(index)?;
        let name = new_name.unwrap_or(&event.name).to_string();
        let next_name = new_next_name.unwrap_or("").to_string();
        let expr = command_expr(
            OpKind::Split,
            descriptor(
                "interval_pair",
                index,
                vec![
                    ("name".to_string(), Value::Str(event.name.clone())),
                    ("stop".to_string(), Value::Null),
                    ("next_start".to_string(), Value::Null),
                    ("next_name".to_string(), Value::Null),
                ],
            )?,
            vec![
                ("new_name".to_string(), Value::Str(name)),
                ("new_stop".to_string(), Value::Float(at)),
                ("new_next_start".to_string(), Value::Float(at)),
                ("new_next_name".to_string(), Value::Str(next_name)),
            ],
        )?;
        Command::from_expr(expr)
    }

    /// Command to delete an interval, snapshotting every field so the
    /// inverse can restore it exactly
    pub fn delete(&self, index: usize) -> Result<Command> {
        let event = self.event_at(index)?;
        let expr = command_expr(
            OpKind::Delete,
            descriptor("interval", index, event.fields())?,
            Vec::new(),
        )?;
        Command::from_expr(expr)
    }

    /// Command to insert a new interval at an index
    pub fn create(&self, index: usize, event: &Event) -> Result<Command> {
        if index > self.events.len() {
            return Err(CorrectionError::Validation(format!(
                "insertion point {} past end of {} events",
                index,
                self.events.len()
            )));
        }
        let expr = command_expr(
            OpKind::Create,
            descriptor("interval", index, event.fields())?,
            Vec::new(),
        )?;
        Command::from_expr(expr)
    }
}

/// Scalar value as a leaf expression
fn value_expr(value: &Value) -> Result<Expr> {
    match value {
        Value::Int(n) => Ok(Expr::int(*n)),
        Value::Float(f) => Ok(Expr::float(*f)),
        Value::Str(s) => Ok(Expr::str(s)),
        Value::Null => Ok(Expr::null()),
        Value::Map(_) => Err(CorrectionError::Validation(
            "composite value cannot be embedded in a command".into(),
        )),
    }
}

/// Target descriptor expression: shape tag, index, then old field values
fn descriptor(shape: &str, index: usize, fields: Vec<(String, Value)>) -> Result<Expr> {
    let mut items = vec![
        Expr::sym(shape),
        Expr::key("index"),
        Expr::int(index as i64),
    ];
    for (field, value) in fields {
        items.push(Expr::Atom(Atom::Key(field)));
        items.push(value_expr(&value)?);
    }
    Ok(Expr::List(items))
}

/// Full command expression: opcode, target, then the new-value arguments
fn command_expr(op: OpKind, target: Expr, args: Vec<(String, Value)>) -> Result<Expr> {
    let mut items = vec![Expr::sym(op.name()), Expr::key("target"), target];
    for (key, value) in args {
        items.push(Expr::Atom(Atom::Key(key)));
        items.push(value_expr(&value)?);
    }
    Ok(Expr::List(items))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_events() -> Vec<Event> {
        vec![Event::new(1.0, 2.1, "a"), Event::new(2.1, 3.5, "b")]
    }

    #[test]
    fn test_codegen_embeds_old_values() {
        let stack = CorrectionStack::new(two_events());
        let cmd = stack.rename(0, "a2").unwrap();
        assert_eq!(
            cmd.text(),
            "(set-value #:target (interval #:index 0 #:name \"a\") #:new-name \"a2\")"
        );
    }

    #[test]
    fn test_codegen_merge_serialization() {
        let stack = CorrectionStack::new(two_events());
        let cmd = stack.merge_next(0, None).unwrap();
        assert_eq!(
            cmd.text(),
            "(merge-next #:target (interval-pair #:index 0 #:name \"a\" #:stop 2.1 \
             #:next-start 2.1 #:next-name \"b\") #:new-name \"ab\" #:new-stop null \
             #:new-next-start null #:new-next-name null)"
        );
    }

    #[test]
    fn test_push_applies_and_clears_redo() {
        let mut stack = CorrectionStack::new(two_events());
        let cmd = stack.rename(0, "a2").unwrap();
        stack.push(cmd).unwrap();
        stack.undo().unwrap();
        assert!(stack.can_redo());

        let cmd = stack.rename(1, "b2").unwrap();
        stack.push(cmd).unwrap();
        assert!(!stack.can_redo());
        assert!(stack.redo().is_err());
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut stack = CorrectionStack::new(two_events());
        let cmd = stack.merge_next(0, Some("ab")).unwrap();
        stack.push(cmd).unwrap();
        assert_eq!(stack.events(), &[Event::new(1.0, 3.5, "ab")]);

        stack.undo().unwrap();
        assert_eq!(stack.events(), &two_events()[..]);
        assert_eq!(stack.undo_count(), 0);

        stack.redo().unwrap();
        assert_eq!(stack.events(), &[Event::new(1.0, 3.5, "ab")]);
        assert_eq!(stack.undo_count(), 1);
        assert_eq!(stack.redo_count(), 0);
    }

    #[test]
    fn test_peek_is_bounds_checked() {
        let mut stack = CorrectionStack::new(two_events());
        let cmd = stack.rename(0, "a2").unwrap();
        let text = cmd.text();
        stack.push(cmd).unwrap();

        assert_eq!(stack.peek(0).unwrap().text(), text);
        assert!(matches!(
            stack.peek(1),
            Err(CorrectionError::History(_))
        ));
    }

    #[test]
    fn test_failed_edit_leaves_state_unchanged() {
        let mut stack = CorrectionStack::new(two_events());
        let cmd = stack.split(0, 0.5, None, None).unwrap();
        assert!(stack.push(cmd).is_err());
        assert_eq!(stack.events(), &two_events()[..]);
        assert_eq!(stack.undo_count(), 0);
    }
}
