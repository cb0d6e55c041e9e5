//! Event data model
//!
//! An event is one labeled time interval in an annotation sequence. Events
//! have no stable identity of their own; they are addressed purely by
//! position in the owning sequence.

use crate::error::{CorrectionError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Runtime value for event fields and evaluated command arguments
///
/// `Map` never appears inside an event; it only arises when a nested
/// target descriptor is realized during evaluation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Numeric view accepting either integer or float
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Non-negative integer view, for sequence indices
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Value::Int(n) if *n >= 0 => Some(*n as usize),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// One labeled interval: `[start, stop)` plus a name and open extra fields
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Event {
    pub start: f64,
    pub stop: f64,
    pub name: String,
    /// Extra annotation columns (tier, channel, ...), scalar-valued
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Event {
    pub fn new(start: f64, stop: f64, name: &str) -> Self {
        Event {
            start,
            stop,
            name: name.to_string(),
            extra: BTreeMap::new(),
        }
    }

    /// Builder-style extra field attachment
    pub fn with_field(mut self, field: &str, value: Value) -> Self {
        self.extra.insert(field.to_string(), value);
        self
    }

    /// Build an event from a realized field mapping (everything a target
    /// descriptor carries except the index)
    pub fn from_fields(fields: &BTreeMap<String, Value>) -> Result<Self> {
        let start = fields
            .get("start")
            .and_then(Value::as_f64)
            .ok_or_else(|| CorrectionError::Validation("event requires a numeric 'start'".into()))?;
        let stop = fields
            .get("stop")
            .and_then(Value::as_f64)
            .ok_or_else(|| CorrectionError::Validation("event requires a numeric 'stop'".into()))?;
        let name = fields
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| CorrectionError::Validation("event requires a string 'name'".into()))?;
        if start >= stop {
            return Err(CorrectionError::Validation(format!(
                "event start {} must precede stop {}",
                start, stop
            )));
        }
        let mut event = Event::new(start, stop, name);
        for (field, value) in fields {
            if !matches!(field.as_str(), "index" | "start" | "stop" | "name") {
                event.put(field, value.clone())?;
            }
        }
        Ok(event)
    }

    pub fn has_field(&self, field: &str) -> bool {
        matches!(field, "start" | "stop" | "name") || self.extra.contains_key(field)
    }

    /// Current value of a named field
    pub fn get(&self, field: &str) -> Option<Value> {
        match field {
            "start" => Some(Value::Float(self.start)),
            "stop" => Some(Value::Float(self.stop)),
            "name" => Some(Value::Str(self.name.clone())),
            _ => self.extra.get(field).cloned(),
        }
    }

    /// Overwrite a field the event already has
    pub fn set(&mut self, field: &str, value: &Value) -> Result<()> {
        if !self.has_field(field) {
            return Err(CorrectionError::Lookup(format!(
                "field name not recognized: {}",
                field
            )));
        }
        self.put(field, value.clone())
    }

    /// Overwrite-or-insert a field, type-checking the core fields
    pub fn put(&mut self, field: &str, value: Value) -> Result<()> {
        match field {
            "start" | "stop" => {
                let bound = value.as_f64().ok_or_else(|| {
                    CorrectionError::Validation(format!("field '{}' requires a number", field))
                })?;
                if field == "start" {
                    self.start = bound;
                } else {
                    self.stop = bound;
                }
            }
            "name" => {
                self.name = value
                    .as_str()
                    .ok_or_else(|| {
                        CorrectionError::Validation("field 'name' requires a string".into())
                    })?
                    .to_string();
            }
            _ => {
                if matches!(value, Value::Map(_)) {
                    return Err(CorrectionError::Validation(format!(
                        "field '{}' requires a scalar value",
                        field
                    )));
                }
                self.extra.insert(field.to_string(), value);
            }
        }
        Ok(())
    }

    /// Every field as (name, value), core fields first then extras:
    /// the full snapshot a delete command embeds
    pub fn fields(&self) -> Vec<(String, Value)> {
        let mut out = vec![
            ("start".to_string(), Value::Float(self.start)),
            ("stop".to_string(), Value::Float(self.stop)),
            ("name".to_string(), Value::Str(self.name.clone())),
        ];
        for (field, value) in &self.extra {
            out.push((field.clone(), value.clone()));
        }
        out
    }
}
