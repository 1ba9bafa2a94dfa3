//! Serialized command envelope
//!
//! Defines [`SerializedCommand`], the wire form every command flattens into:
//! a `kind` tag plus a flat map of named fields. The envelope is plain data,
//! safe to queue, persist, and transport; reconstruction goes through the
//! registry.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MalformedCommandError;

/// String-keyed map of arbitrary scalar/structured values
pub type FieldMap = serde_json::Map<String, Value>;

/// Kind-tagged serialized form of a command
///
/// Wire shape is `{"kind": ..., <fields...>}`; the fields sit beside the tag
/// rather than nested under it.
///
/// # Invariants
/// - The field name `kind` is reserved for the tag and never stored in
///   `fields`
/// - Immutable once enqueued; admission policies may enrich it before that
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedCommand {
    kind: String,
    #[serde(flatten)]
    fields: FieldMap,
}

impl SerializedCommand {
    /// Create an envelope with the given kind tag and no fields
    #[inline]
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: FieldMap::new(),
        }
    }

    /// Add a named field, builder style
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        debug_assert!(name != "kind", "field name `kind` is reserved for the tag");
        self.fields.insert(name, value.into());
        self
    }

    /// Insert or replace a named field in place
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        debug_assert!(name != "kind", "field name `kind` is reserved for the tag");
        self.fields.insert(name, value.into());
    }

    /// Kind tag identifying the command variant
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// All fields of the envelope
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Look up a field by name
    #[inline]
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Fetch a required string field
    ///
    /// # Errors
    /// `MissingField` if absent, `InvalidField` if not a string
    pub fn require_str(&self, field: &'static str) -> Result<&str, MalformedCommandError> {
        match self.fields.get(field) {
            None => Err(MalformedCommandError::MissingField {
                kind: self.kind.clone(),
                field,
            }),
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(MalformedCommandError::InvalidField {
                kind: self.kind.clone(),
                field,
                expected: "a string",
            }),
        }
    }

    /// Fetch a required object field
    ///
    /// # Errors
    /// `MissingField` if absent, `InvalidField` if not an object
    pub fn require_object(&self, field: &'static str) -> Result<&FieldMap, MalformedCommandError> {
        match self.fields.get(field) {
            None => Err(MalformedCommandError::MissingField {
                kind: self.kind.clone(),
                field,
            }),
            Some(Value::Object(map)) => Ok(map),
            Some(_) => Err(MalformedCommandError::InvalidField {
                kind: self.kind.clone(),
                field,
                expected: "an object",
            }),
        }
    }
}
