//! Dynamic candidate records fetched from the CRM.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A raw record from a CRM module.
///
/// CRM modules are schemaless from our point of view: field names
/// drift across legacy imports (`Emplyee_ID`, `Emp_ID`, ...), so the
/// record is kept as a field-bag and read through accessor helpers
/// that encode the fallback orders in one place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CrmRecord {
    fields: Map<String, Value>,
}

impl CrmRecord {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self { fields: Map::new() }
    }

    /// Wrap an existing JSON object.
    #[must_use]
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Build a record from a JSON value; non-objects become empty records.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self { fields },
            _ => Self::new(),
        }
    }

    /// The CRM record id, if present.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        self.text("id")
    }

    /// Read a field as text.
    ///
    /// JSON strings are returned as-is, numbers and booleans are
    /// stringified (rates arrive as either), null and missing fields
    /// are `None`.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<String> {
        match self.fields.get(name) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        }
    }

    /// Read the first non-empty field out of a priority-ordered list.
    #[must_use]
    pub fn first_text(&self, names: &[&str]) -> Option<String> {
        names
            .iter()
            .filter_map(|name| self.text(name))
            .find(|value| !value.is_empty())
    }

    /// Set a field (used when building records in tests and payloads).
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Access the raw field map.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl From<Value> for CrmRecord {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}
