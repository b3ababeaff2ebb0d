//! Message and context objects
//!
//! Both are free-form key/value records. The sequence only ever writes the
//! four fault coordinates into the context; everything else belongs to
//! receivers and transports.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::fault::Fault;

pub const CAUSE_LEVEL: &str = "causeLevel";
pub const CAUSE_STEP: &str = "causeStep";
pub const CATCH_LEVEL: &str = "catchLevel";
pub const CATCH_STEP: &str = "catchStep";
pub const EXCEPTION: &str = "exception";

/// Mutable key/value record attached to an in-flight message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

/// Payload routed through the chains
pub type Message = Record;

/// Per-message processing context
pub type MessageContext = Record;

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.0.get(field).and_then(Value::as_i64)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Record {
    type Error = serde_json::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        serde_json::from_value(value)
    }
}

/// Where a fault was raised and which level caught it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultCoordinates {
    pub cause_level: usize,
    pub cause_step:  isize,
    pub catch_level: usize,
    pub catch_step:  isize
}

impl FaultCoordinates {
    pub fn write(&self, context: &mut MessageContext) {
        context.set(CAUSE_LEVEL, self.cause_level as i64);
        context.set(CAUSE_STEP, self.cause_step as i64);
        context.set(CATCH_LEVEL, self.catch_level as i64);
        context.set(CATCH_STEP, self.catch_step as i64);
    }

    /// Read the coordinates of the last caught fault, if any
    pub fn read(context: &MessageContext) -> Option<Self> {
        Some(Self {
            cause_level: usize::try_from(context.get_i64(CAUSE_LEVEL)?).ok()?,
            cause_step:  context.get_i64(CAUSE_STEP)? as isize,
            catch_level: usize::try_from(context.get_i64(CATCH_LEVEL)?).ok()?,
            catch_step:  context.get_i64(CATCH_STEP)? as isize
        })
    }
}

/// Fault stored in the context by the processor before the fallback chain runs
pub fn fault_from(context: &MessageContext) -> Option<Fault> {
    context.get(EXCEPTION).and_then(|value| serde_json::from_value(value.clone()).ok())
}
