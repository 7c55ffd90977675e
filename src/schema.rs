//! Declarative typing for agent boundaries.
//!
//! A [`Schema`] is an ordered list of [`FieldSpec`]s. Validation is
//! shallow-structural: array element types are checked recursively, `Map`
//! accepts any JSON object without recursing, `Any` accepts everything.
//! Unknown extra fields are permitted for forward compatibility.
//!
//! Schemas also translate to the JSON Schema shape consumed by
//! structured-output completion APIs via [`Schema::to_json_schema`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::context::DataMap;
use crate::error::SchemaError;

/// The type of a declared field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    /// Any JSON object; values are not recursed into
    Map,
    /// A JSON array whose elements all match the inner type
    Array(Box<FieldType>),
    /// Accepts any value
    Any,
}

impl FieldType {
    /// Human-readable name used in validation errors
    pub fn name(&self) -> String {
        match self {
            FieldType::String => "string".to_string(),
            FieldType::Integer => "integer".to_string(),
            FieldType::Float => "float".to_string(),
            FieldType::Boolean => "boolean".to_string(),
            FieldType::Map => "map".to_string(),
            FieldType::Array(inner) => format!("array<{}>", inner.name()),
            FieldType::Any => "any".to_string(),
        }
    }

    /// Check a value against this type (shallow, arrays recursed)
    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            // Accept only integral JSON numbers
            FieldType::Integer => value.is_i64() || value.is_u64(),
            // Integers widen losslessly to floats
            FieldType::Float => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Map => value.is_object(),
            FieldType::Array(_) => value.is_array(),
            FieldType::Any => true,
        }
    }

    /// JSON Schema fragment for this type
    fn json_schema(&self) -> Value {
        match self {
            FieldType::String => json!({"type": "string"}),
            FieldType::Integer => json!({"type": "integer"}),
            FieldType::Float => json!({"type": "number"}),
            FieldType::Boolean => json!({"type": "boolean"}),
            FieldType::Map => json!({"type": "object"}),
            FieldType::Array(inner) => json!({"type": "array", "items": inner.json_schema()}),
            // Empty schema accepts any value
            FieldType::Any => json!({}),
        }
    }
}

/// Describe a JSON value's type for error messages
pub(crate) fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}

/// One declared field: name, type, and options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
}

impl FieldSpec {
    /// Declare a required field
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            default: None,
            description: None,
        }
    }

    /// Declare an optional field
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            default: None,
            description: None,
        }
    }

    /// Attach a default value (optional fields only; enforced by `Schema::new`)
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Attach a description (surfaced in the JSON Schema translation)
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// An ordered set of field declarations for one agent boundary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

impl Schema {
    /// Build a schema, enforcing declaration invariants:
    /// field names are unique, and a required field declares no default.
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, SchemaError> {
        for (i, field) in fields.iter().enumerate() {
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(SchemaError::DuplicateField {
                    name: field.name.clone(),
                });
            }
            if field.required && field.default.is_some() {
                return Err(SchemaError::RequiredWithDefault {
                    name: field.name.clone(),
                });
            }
        }
        Ok(Self { fields })
    }

    /// An empty schema (accepts any data map)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Declared fields, in declaration order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Validate a data map against this schema
    ///
    /// Returns the first violation in field declaration order. Extra fields
    /// not declared here are ignored.
    pub fn validate(&self, data: &DataMap) -> Result<(), SchemaError> {
        for field in &self.fields {
            match data.get(&field.name) {
                None => {
                    if field.required {
                        return Err(SchemaError::MissingRequired {
                            field: field.name.clone(),
                        });
                    }
                }
                Some(value) => {
                    if !field.field_type.matches(value) {
                        return Err(SchemaError::TypeMismatch {
                            field: field.name.clone(),
                            expected: field.field_type.name(),
                            actual: value_type_name(value).to_string(),
                        });
                    }
                    if let (FieldType::Array(inner), Value::Array(elements)) =
                        (&field.field_type, value)
                    {
                        for (index, element) in elements.iter().enumerate() {
                            if !inner.matches(element) {
                                return Err(SchemaError::ElementMismatch {
                                    field: field.name.clone(),
                                    index,
                                    expected: inner.name(),
                                    actual: value_type_name(element).to_string(),
                                });
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Fill missing optional fields that declare defaults
    ///
    /// Applied before the task handler runs, so handlers always observe
    /// declared defaults.
    pub fn merge_defaults(&self, data: &mut DataMap) {
        for field in &self.fields {
            if let Some(default) = &field.default {
                if !data.contains_key(&field.name) {
                    data.insert(field.name.clone(), default.clone());
                }
            }
        }
    }

    /// Translate to the JSON Schema object consumed by structured-output APIs
    ///
    /// The `FieldType` enum is closed, so every declared field translates.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for field in &self.fields {
            let mut fragment = field.field_type.json_schema();
            if let Some(description) = &field.description {
                fragment["description"] = Value::String(description.clone());
            }
            properties.insert(field.name.clone(), fragment);
            if field.required {
                required.push(Value::String(field.name.clone()));
            }
        }

        json!({
            "type": "object",
            "properties": Value::Object(properties),
            "required": Value::Array(required),
            "additionalProperties": true,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
