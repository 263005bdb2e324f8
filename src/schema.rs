//! Declarative extraction schemas.
//!
//! An [`ExtractionSchema`] is an ordered list of [`FieldSpec`]s. The LLM
//! adapter turns it into a JSON Schema for constrained output
//! ([`ExtractionSchema::to_json_schema`]) and into prompt-side field
//! documentation ([`ExtractionSchema::field_docs`]). Whatever the model
//! returns is then normalised by [`ExtractionSchema::conform`]: unknown
//! optional fields become `null`, missing required fields are an error.
//!
//! [`DerivedField`]s are never requested from the model; they are computed
//! after extraction.

use std::fmt;

use chrono::{Months, NaiveDate};
use serde_json::{Map, Number, Value, json};
use thiserror::Error;

/// Field map produced by extraction, keyed by field name.
pub type Payload = Map<String, Value>;

#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("extraction result is not a JSON object")]
    NotAnObject,
    #[error("required field `{0}` is missing")]
    MissingField(String),
    #[error("field `{field}` expected {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: FieldKind,
        found: String,
    },
    #[error("derived field `{0}` could not be computed")]
    Derived(String),
}

// ── Fields ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Number,
    String,
}

impl FieldKind {
    fn json_type(self) -> &'static str {
        match self {
            FieldKind::Integer => "integer",
            FieldKind::Number => "number",
            FieldKind::String => "string",
        }
    }

    /// Human-readable type name used in prompt field docs.
    fn doc_name(self) -> &'static str {
        match self {
            FieldKind::Integer => "целое число",
            FieldKind::Number => "число",
            FieldKind::String => "строка",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.json_type())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    /// Steers the model; keep it stable and descriptive.
    pub description: String,
}

// ── Schema ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionSchema {
    name: String,
    description: String,
    fields: Vec<FieldSpec>,
}

impl ExtractionSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            fields: Vec::new(),
        }
    }

    pub fn required(self, name: &str, kind: FieldKind, description: &str) -> Self {
        self.field(name, kind, true, description)
    }

    pub fn optional(self, name: &str, kind: FieldKind, description: &str) -> Self {
        self.field(name, kind, false, description)
    }

    fn field(mut self, name: &str, kind: FieldKind, required: bool, description: &str) -> Self {
        self.fields.push(FieldSpec {
            name: name.to_string(),
            kind,
            required,
            description: description.to_string(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// JSON Schema for the constrained-output contract.
    ///
    /// Optional fields are typed as `[kind, "null"]`. Every field is listed
    /// in `required` so the model has to answer each one, with `null` for
    /// the unknowns.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let ty = if field.required {
                json!(field.kind.json_type())
            } else {
                json!([field.kind.json_type(), "null"])
            };
            properties.insert(
                field.name.clone(),
                json!({ "type": ty, "description": field.description }),
            );
        }
        let names: Vec<&str> = self.fields.iter().map(|f| f.name.as_str()).collect();
        json!({
            "type": "object",
            "description": self.description,
            "properties": properties,
            "required": names,
            "additionalProperties": false,
        })
    }

    /// One line per field, in declaration order.
    pub fn field_docs(&self) -> String {
        self.fields
            .iter()
            .map(|f| {
                let presence = if f.required { "обязательное" } else { "может быть null" };
                format!("- {} ({}, {}): {}", f.name, f.kind.doc_name(), presence, f.description)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Normalise a raw model answer into a [`Payload`].
    ///
    /// Fields not declared in the schema are dropped. Integral floats and
    /// numeric strings are accepted for numeric fields.
    pub fn conform(&self, raw: Value) -> Result<Payload, SchemaError> {
        let Value::Object(mut object) = raw else {
            return Err(SchemaError::NotAnObject);
        };

        let mut payload = Map::new();
        for field in &self.fields {
            let value = match object.remove(&field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        return Err(SchemaError::MissingField(field.name.clone()));
                    }
                    Value::Null
                }
                Some(value) => coerce(field, value)?,
            };
            payload.insert(field.name.clone(), value);
        }
        Ok(payload)
    }
}

fn coerce(field: &FieldSpec, value: Value) -> Result<Value, SchemaError> {
    let mismatch = |found: &Value| SchemaError::TypeMismatch {
        field: field.name.clone(),
        expected: field.kind,
        found: found.to_string(),
    };

    match field.kind {
        FieldKind::Integer => {
            let int = match &value {
                Value::Number(n) => n.as_i64().or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                        .map(|f| f as i64)
                }),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            int.map(Value::from).ok_or_else(|| mismatch(&value))
        }
        FieldKind::Number => {
            let num = match &value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
                _ => None,
            };
            num.and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| mismatch(&value))
        }
        FieldKind::String => match value {
            Value::String(s) => Ok(Value::String(s)),
            other => Err(mismatch(&other)),
        },
    }
}

// ── Derived fields ────────────────────────────────────────────────────────────

/// A payload field computed after extraction, independent of the model.
#[derive(Debug, Clone, PartialEq)]
pub enum DerivedField {
    /// `today` plus a number of calendar months, formatted with a chrono
    /// format string. Month overflow clamps to the last day of the month.
    DateAfterMonths {
        name: String,
        months: u32,
        format: String,
    },
}

impl DerivedField {
    pub fn name(&self) -> &str {
        match self {
            DerivedField::DateAfterMonths { name, .. } => name,
        }
    }

    pub fn compute(&self, today: NaiveDate) -> Result<Value, SchemaError> {
        match self {
            DerivedField::DateAfterMonths { name, months, format } => today
                .checked_add_months(Months::new(*months))
                .map(|date| Value::String(date.format(format).to_string()))
                .ok_or_else(|| SchemaError::Derived(name.clone())),
        }
    }

    /// Insert the computed value, overwriting anything the model produced.
    pub fn apply(&self, payload: &mut Payload, today: NaiveDate) -> Result<(), SchemaError> {
        let value = self.compute(today)?;
        payload.insert(self.name().to_string(), value);
        Ok(())
    }
}
