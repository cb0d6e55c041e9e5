//! Operation executors
//!
//! The five primitive mutators over the event sequence. Each executor
//! receives the live sequence and the evaluated keyword mapping (realized
//! target descriptor plus `new-*` arguments), validates everything it
//! needs, and only then mutates. A failing call performs no partial
//! mutation.

use crate::error::{CorrectionError, Result};
use crate::models::{Event, Value};
use std::collections::BTreeMap;

/// Evaluated keyword arguments, name -> value
pub type Kwargs = BTreeMap<String, Value>;

/// Closed set of operations in the command vocabulary
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpKind {
    SetValue,
    MergeNext,
    Split,
    Delete,
    Create,
}

impl OpKind {
    /// Internal-form operation name, as it appears in a parsed expression
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::SetValue => "set_value",
            OpKind::MergeNext => "merge_next",
            OpKind::Split => "split",
            OpKind::Delete => "delete",
            OpKind::Create => "create",
        }
    }

    pub fn from_name(name: &str) -> Option<OpKind> {
        match name {
            "set_value" => Some(OpKind::SetValue),
            "merge_next" => Some(OpKind::MergeNext),
            "split" => Some(OpKind::Split),
            "delete" => Some(OpKind::Delete),
            "create" => Some(OpKind::Create),
            _ => None,
        }
    }

    /// Structural opposite used by generic inversion
    pub fn inverse(&self) -> OpKind {
        match self {
            OpKind::SetValue => OpKind::SetValue,
            OpKind::MergeNext => OpKind::Split,
            OpKind::Split => OpKind::MergeNext,
            OpKind::Delete => OpKind::Create,
            OpKind::Create => OpKind::Delete,
        }
    }
}

/// Dispatch one operation against the live sequence
pub fn execute(op: OpKind, events: &mut Vec<Event>, kwargs: &Kwargs) -> Result<()> {
    match op {
        OpKind::SetValue => set_value(events, kwargs),
        OpKind::MergeNext => merge_next(events, kwargs),
        OpKind::Split => split(events, kwargs),
        OpKind::Delete => delete(events, kwargs),
        OpKind::Create => create(events, kwargs),
    }
}

/// Realized target descriptor out of the keyword mapping
fn target(kwargs: &Kwargs) -> Result<&BTreeMap<String, Value>> {
    kwargs
        .get("target")
        .and_then(Value::as_map)
        .ok_or_else(|| CorrectionError::Validation("operation requires a target descriptor".into()))
}

fn target_index(target: &BTreeMap<String, Value>) -> Result<usize> {
    target
        .get("index")
        .and_then(Value::as_index)
        .ok_or_else(|| CorrectionError::Validation("target descriptor requires an index".into()))
}

fn check_index(index: usize, len: usize) -> Result<()> {
    if index >= len {
        return Err(CorrectionError::Validation(format!(
            "index {} out of range for {} events",
            index, len
        )));
    }
    Ok(())
}

/// `new-*` arguments with their base field names, in keyword order
fn new_args(kwargs: &Kwargs) -> Vec<(&str, &Value)> {
    kwargs
        .iter()
        .filter_map(|(key, value)| key.strip_prefix("new_").map(|base| (base, value)))
        .collect()
}

fn required_f64(kwargs: &Kwargs, key: &str) -> Result<f64> {
    kwargs.get(key).and_then(Value::as_f64).ok_or_else(|| {
        CorrectionError::Validation(format!("operation requires a numeric {}", key))
    })
}

fn required_str<'a>(kwargs: &'a Kwargs, key: &str) -> Result<&'a str> {
    kwargs.get(key).and_then(Value::as_str).ok_or_else(|| {
        CorrectionError::Validation(format!("operation requires a string {}", key))
    })
}

/// Overwrite the one field named by the single `new-<field>` argument
fn set_value(events: &mut Vec<Event>, kwargs: &Kwargs) -> Result<()> {
    let target = target(kwargs)?;
    let index = target_index(target)?;
    check_index(index, events.len())?;
    let args = new_args(kwargs);
    if args.len() != 1 {
        return Err(CorrectionError::Validation(format!(
            "set-value takes exactly one new-* argument, got {}",
            args.len()
        )));
    }
    let (field, value) = args[0];
    events[index].set(field, value)
}

/// Absorb the successor: stretch `stop`, take supplied name/extra values,
/// remove the successor
fn merge_next(events: &mut Vec<Event>, kwargs: &Kwargs) -> Result<()> {
    let target = target(kwargs)?;
    let index = target_index(target)?;
    check_index(index + 1, events.len())?;
    // Build the merged record aside so a bad argument leaves the live
    // sequence untouched
    let mut merged = events[index].clone();
    merged.stop = events[index + 1].stop;
    for (field, value) in new_args(kwargs) {
        // The null-valued slots exist only to receive old values on
        // inversion; next-* names the successor, not the merged event
        if value.is_null() || matches!(field, "stop" | "next_start" | "next_name") {
            continue;
        }
        merged.put(field, value.clone())?;
    }
    events[index] = merged;
    events.remove(index + 1);
    Ok(())
}

/// Shrink the event to `[start, new-stop]` and insert a successor holding
/// the remaining span
fn split(events: &mut Vec<Event>, kwargs: &Kwargs) -> Result<()> {
    let target = target(kwargs)?;
    let index = target_index(target)?;
    check_index(index, events.len())?;
    let new_stop = required_f64(kwargs, "new_stop")?;
    let next_start = required_f64(kwargs, "new_next_start")?;
    let new_name = required_str(kwargs, "new_name")?.to_string();
    let next_name = required_str(kwargs, "new_next_name")?.to_string();
    if new_stop <= events[index].start || next_start >= events[index].stop {
        return Err(CorrectionError::Validation(format!(
            "split boundary ({}, {}) outside interval ({}, {})",
            new_stop, next_start, events[index].start, events[index].stop
        )));
    }
    // The successor inherits extra fields from the parent interval
    let mut successor = events[index].clone();
    successor.start = next_start;
    successor.name = next_name;
    events[index].stop = new_stop;
    events[index].name = new_name;
    events.insert(index + 1, successor);
    Ok(())
}

fn delete(events: &mut Vec<Event>, kwargs: &Kwargs) -> Result<()> {
    let target = target(kwargs)?;
    let index = target_index(target)?;
    check_index(index, events.len())?;
    events.remove(index);
    Ok(())
}

/// Insert a new event built from the descriptor's field snapshot
fn create(events: &mut Vec<Event>, kwargs: &Kwargs) -> Result<()> {
    let target = target(kwargs)?;
    let index = target_index(target)?;
    if index > events.len() {
        return Err(CorrectionError::Validation(format!(
            "insertion point {} past end of {} events",
            index,
            events.len()
        )));
    }
    let event = Event::from_fields(target)?;
    events.insert(index, event);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_events() -> Vec<Event> {
        vec![Event::new(1.0, 2.1, "a"), Event::new(2.1, 3.5, "b")]
    }

    fn interval_target(index: usize, fields: &[(&str, Value)]) -> Kwargs {
        let mut target = BTreeMap::new();
        target.insert("index".to_string(), Value::Int(index as i64));
        for (field, value) in fields {
            target.insert(field.to_string(), value.clone());
        }
        let mut kwargs = BTreeMap::new();
        kwargs.insert("target".to_string(), Value::Map(target));
        kwargs
    }

    #[test]
    fn test_set_value_overwrites_named_field() {
        let mut events = two_events();
        let mut kwargs = interval_target(0, &[("name", Value::Str("a".into()))]);
        kwargs.insert("new_name".to_string(), Value::Str("a2".into()));

        execute(OpKind::SetValue, &mut events, &kwargs).unwrap();
        assert_eq!(events[0].name, "a2");
    }

    #[test]
    fn test_set_value_unknown_field_fails() {
        let mut events = two_events();
        let mut kwargs = interval_target(0, &[("tier", Value::Null)]);
        kwargs.insert("new_tier".to_string(), Value::Str("x".into()));

        let err = execute(OpKind::SetValue, &mut events, &kwargs).unwrap_err();
        assert!(matches!(err, CorrectionError::Lookup(_)));
        assert_eq!(events, two_events());
    }

    #[test]
    fn test_merge_next_requires_successor() {
        let mut events = two_events();
        let mut kwargs = interval_target(1, &[]);
        kwargs.insert("new_name".to_string(), Value::Str("x".into()));

        assert!(execute(OpKind::MergeNext, &mut events, &kwargs).is_err());
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_merge_next_absorbs_successor() {
        let mut events = two_events();
        let mut kwargs = interval_target(0, &[]);
        kwargs.insert("new_name".to_string(), Value::Str("ab".into()));
        kwargs.insert("new_stop".to_string(), Value::Null);
        kwargs.insert("new_next_start".to_string(), Value::Null);
        kwargs.insert("new_next_name".to_string(), Value::Null);

        execute(OpKind::MergeNext, &mut events, &kwargs).unwrap();
        assert_eq!(events, vec![Event::new(1.0, 3.5, "ab")]);
    }

    #[test]
    fn test_split_boundary_validation() {
        let mut kwargs = interval_target(0, &[]);
        kwargs.insert("new_name".to_string(), Value::Str("a".into()));
        kwargs.insert("new_next_name".to_string(), Value::Str("".into()));

        // 0.5 lies before the interval start
        let mut events = vec![Event::new(1.0, 2.1, "a")];
        kwargs.insert("new_stop".to_string(), Value::Float(0.5));
        kwargs.insert("new_next_start".to_string(), Value::Float(0.5));
        assert!(execute(OpKind::Split, &mut events, &kwargs).is_err());
        assert_eq!(events.len(), 1);

        // 1.5 is inside, producing a shared boundary
        kwargs.insert("new_stop".to_string(), Value::Float(1.5));
        kwargs.insert("new_next_start".to_string(), Value::Float(1.5));
        execute(OpKind::Split, &mut events, &kwargs).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].stop, 1.5);
        assert_eq!(events[1].start, 1.5);
        assert_eq!(events[1].stop, 2.1);
    }

    #[test]
    fn test_split_successor_inherits_extras() {
        let mut events = vec![Event::new(1.0, 2.1, "a").with_field("tier", Value::Str("f".into()))];
        let mut kwargs = interval_target(0, &[]);
        kwargs.insert("new_name".to_string(), Value::Str("a".into()));
        kwargs.insert("new_next_name".to_string(), Value::Str("".into()));
        kwargs.insert("new_stop".to_string(), Value::Float(1.5));
        kwargs.insert("new_next_start".to_string(), Value::Float(1.5));

        execute(OpKind::Split, &mut events, &kwargs).unwrap();
        assert_eq!(events[1].get("tier"), Some(Value::Str("f".into())));
    }

    #[test]
    fn test_delete_and_create_round_trip() {
        let mut events = two_events();
        let snapshot = interval_target(
            1,
            &[
                ("start", Value::Float(2.1)),
                ("stop", Value::Float(3.5)),
                ("name", Value::Str("b".into())),
            ],
        );

        execute(OpKind::Delete, &mut events, &snapshot).unwrap();
        assert_eq!(events.len(), 1);

        execute(OpKind::Create, &mut events, &snapshot).unwrap();
        assert_eq!(events, two_events());
    }

    #[test]
    fn test_create_past_end_fails() {
        let mut events = two_events();
        let snapshot = interval_target(
            5,
            &[
                ("start", Value::Float(9.0)),
                ("stop", Value::Float(9.5)),
                ("name", Value::Str("x".into())),
            ],
        );
        assert!(execute(OpKind::Create, &mut events, &snapshot).is_err());
    }
}
