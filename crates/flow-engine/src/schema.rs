//! Field schemas and value validation
//!
//! Every element declares an input schema and an output schema: a map from
//! field name to [`FieldSpec`]. Values travel as `serde_json::Value`, so
//! validation is a structural check of JSON shapes against the declared
//! [`FieldType`].

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field name → specification
pub type Schema = BTreeMap<String, FieldSpec>;

/// Declared type of a schema field.
///
/// Parsed from the wire tags `string`, `int`, `float`, `bool`, `json`,
/// `list`, `any`, and unions like `string|int`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
    Json,
    List,
    /// Accepts every value, including null
    #[default]
    Any,
    /// Any of the member types
    Union(Vec<FieldType>),
    /// A tag this engine does not know; accepts any non-null value
    Other(String),
}

impl FieldType {
    /// Whether `value` has this type's JSON shape.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Int => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Bool => value.is_boolean(),
            Self::Json => value.is_object(),
            Self::List => value.is_array(),
            Self::Any => true,
            Self::Union(members) => members.iter().any(|t| t.matches(value)),
            Self::Other(_) => !value.is_null(),
        }
    }

    /// Zero value used when an element has to fabricate a field.
    pub fn default_value(&self) -> Value {
        match self {
            Self::String => Value::String(String::new()),
            Self::Int => Value::from(0),
            Self::Float => Value::from(0.0),
            Self::Bool => Value::Bool(false),
            Self::Json => Value::Object(serde_json::Map::new()),
            Self::List => Value::Array(Vec::new()),
            Self::Union(members) => members
                .first()
                .map(FieldType::default_value)
                .unwrap_or(Value::Null),
            Self::Any | Self::Other(_) => Value::Null,
        }
    }
}

impl FromStr for FieldType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim();
        if tag.contains('|') {
            let members = tag
                .split('|')
                .map(|part| part.parse::<FieldType>().unwrap_or(FieldType::Any))
                .collect();
            return Ok(Self::Union(members));
        }
        Ok(match tag {
            "string" | "str" => Self::String,
            "int" | "integer" => Self::Int,
            "float" | "number" => Self::Float,
            "bool" | "boolean" => Self::Bool,
            "json" | "object" | "dict" => Self::Json,
            "list" | "array" => Self::List,
            "" | "any" => Self::Any,
            other => Self::Other(other.to_string()),
        })
    }
}

impl From<String> for FieldType {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(t) => t,
            Err(never) => match never {},
        }
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::Bool => f.write_str("bool"),
            Self::Json => f.write_str("json"),
            Self::List => f.write_str("list"),
            Self::Any => f.write_str("any"),
            Self::Union(members) => {
                let tags: Vec<String> = members.iter().map(ToString::to_string).collect();
                f.write_str(&tags.join("|"))
            }
            Self::Other(tag) => f.write_str(tag),
        }
    }
}

/// Declaration of a single input or output field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Nested schema for `json` fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    /// Enumerated choices offered to editors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

impl FieldSpec {
    /// Create a required field of the given type
    pub fn required(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: true,
            ..Default::default()
        }
    }

    /// Create an optional field of the given type
    pub fn optional(field_type: FieldType) -> Self {
        Self {
            field_type,
            ..Default::default()
        }
    }

    /// Set a default value
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Set a nested schema (for `json` fields)
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Set a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Which side of an element a schema describes; only affects messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::Input => "Input",
            Self::Output => "Output",
        }
    }
}

/// Check one value against its field spec.
///
/// Returns a human readable problem when the value does not fit.
pub fn validate_value(value: &Value, spec: &FieldSpec) -> Result<(), String> {
    if !spec.field_type.matches(value) {
        return Err(format!(
            "Value '{}' does not match expected type '{}'.",
            value, spec.field_type
        ));
    }

    if let (FieldType::Json, Some(nested), Some(object)) =
        (&spec.field_type, &spec.schema, value.as_object())
    {
        for (key, key_spec) in nested {
            match object.get(key) {
                None if key_spec.required => {
                    return Err(format!("Required field '{}' is missing from JSON.", key));
                }
                None => {}
                Some(inner) => {
                    validate_value(inner, key_spec)
                        .map_err(|err| format!("Field '{}': {}", key, err))?;
                }
            }
        }
    }

    Ok(())
}

/// Validate a whole value map against a schema.
///
/// Collects every missing required field and every type mismatch instead of
/// stopping at the first. Optional fields that are present but null are
/// treated as absent.
pub fn validate_fields(
    values: &serde_json::Map<String, Value>,
    schema: &Schema,
    direction: Direction,
) -> Vec<String> {
    let mut problems = Vec::new();
    for (name, spec) in schema {
        match values.get(name) {
            None if spec.required => problems.push(format!(
                "Required {} '{}' is missing.",
                direction.label(),
                name
            )),
            None => {}
            Some(Value::Null) if !spec.required => {}
            Some(value) => {
                if let Err(err) = validate_value(value, spec) {
                    problems.push(format!("{} '{}': {}", direction.title(), name, err));
                }
            }
        }
    }
    problems
}

/// True iff every required field is present.
pub fn required_present(values: &serde_json::Map<String, Value>, schema: &Schema) -> bool {
    schema
        .iter()
        .all(|(name, spec)| !spec.required || values.contains_key(name))
}

/// Best-effort coercion of a value towards a declared type.
///
/// Returns the original value unchanged when no coercion applies.
pub fn coerce_value(value: &Value, field_type: &FieldType) -> Value {
    let coerced = match (field_type, value) {
        (FieldType::String, Value::String(_)) => None,
        (FieldType::String, Value::Null) => None,
        (FieldType::String, other) => Some(Value::String(other.to_string())),
        (FieldType::Int, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .ok()
            .map(Value::from)
            .or_else(|| {
                s.trim()
                    .parse::<f64>()
                    .ok()
                    .map(|f| Value::from(f.trunc() as i64))
            }),
        (FieldType::Int, Value::Number(n)) if !(n.is_i64() || n.is_u64()) => {
            n.as_f64().map(|f| Value::from(f.trunc() as i64))
        }
        (FieldType::Int, Value::Bool(b)) => Some(Value::from(*b as i64)),
        (FieldType::Float, Value::String(s)) => s.trim().parse::<f64>().ok().map(Value::from),
        (FieldType::Float, Value::Number(n)) if n.is_i64() || n.is_u64() => {
            n.as_f64().map(Value::from)
        }
        (FieldType::Float, Value::Bool(b)) => Some(Value::from(if *b { 1.0 } else { 0.0 })),
        (FieldType::Bool, Value::String(s)) => Some(Value::Bool(matches!(
            s.to_lowercase().as_str(),
            "true" | "yes" | "1" | "t" | "y"
        ))),
        (FieldType::Bool, Value::Number(n)) => Some(Value::Bool(n.as_f64() != Some(0.0))),
        (FieldType::Bool, Value::Null) => Some(Value::Bool(false)),
        (FieldType::Json, Value::String(s)) | (FieldType::List, Value::String(s)) => {
            serde_json::from_str::<Value>(s).ok()
        }
        _ => None,
    };

    match coerced {
        Some(v) => v,
        None => {
            if !field_type.matches(value) {
                log::warn!(
                    "Failed to coerce value '{}' to type '{}'",
                    value,
                    field_type
                );
            }
            value.clone()
        }
    }
}
