//! Structural input schemas for tools.
//!
//! [`InputSchema`] serializes to the JSON-Schema subset that `tools/list`
//! advertises (`type`, `properties`, `required`, `minimum`, `maximum`, `enum`,
//! `default`, `items`, `additionalProperties`) and validates call arguments
//! against it. Validation never stops at the first problem: every violation is
//! reported.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single schema violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Path to the offending field, e.g. `sides`, `location.city`, `tags[2]`.
    pub path: String,
    pub message: String,
}

impl Violation {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ObjectType {
    #[default]
    Object,
}

/// Type of a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ValueKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|n| n.fract() == 0.0)
            }
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn default_true() -> bool {
    true
}

fn is_true(b: &bool) -> bool {
    *b
}

/// Schema of a tool's `arguments` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(rename = "type", default)]
    kind: ObjectType,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(
        rename = "additionalProperties",
        default = "default_true",
        skip_serializing_if = "is_true"
    )]
    pub additional_properties: bool,
}

impl Default for InputSchema {
    fn default() -> Self {
        Self::object()
    }
}

impl InputSchema {
    /// An object schema with no properties that accepts anything.
    pub fn object() -> Self {
        Self {
            kind: ObjectType::Object,
            properties: BTreeMap::new(),
            required: Vec::new(),
            additional_properties: true,
        }
    }

    pub fn property(mut self, name: impl Into<String>, schema: PropertySchema) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    pub fn required(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.required.extend(names.into_iter().map(Into::into));
        self
    }

    /// Reject properties not listed in the schema.
    pub fn deny_unknown(mut self) -> Self {
        self.additional_properties = false;
        self
    }

    /// Schema as the JSON value advertised by `tools/list`.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Validate `arguments`, returning them with defaults filled in.
    pub fn validate(
        &self,
        arguments: &Map<String, Value>,
    ) -> Result<Map<String, Value>, Vec<Violation>> {
        let mut violations = Vec::new();
        let validated = check_object(
            &self.properties,
            &self.required,
            self.additional_properties,
            arguments,
            "",
            &mut violations,
        );
        if violations.is_empty() {
            Ok(validated)
        } else {
            Err(violations)
        }
    }
}

/// Schema of a single property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub kind: ValueKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<PropertySchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, PropertySchema>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl PropertySchema {
    pub fn new(kind: ValueKind) -> Self {
        Self {
            kind,
            description: None,
            minimum: None,
            maximum: None,
            allowed: None,
            default: None,
            items: None,
            properties: None,
            required: Vec::new(),
        }
    }

    pub fn string() -> Self {
        Self::new(ValueKind::String)
    }

    pub fn integer() -> Self {
        Self::new(ValueKind::Integer)
    }

    pub fn number() -> Self {
        Self::new(ValueKind::Number)
    }

    pub fn boolean() -> Self {
        Self::new(ValueKind::Boolean)
    }

    pub fn array(items: PropertySchema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::new(ValueKind::Array)
        }
    }

    /// A nested object built from another schema's properties.
    pub fn object(schema: InputSchema) -> Self {
        Self {
            properties: Some(schema.properties),
            required: schema.required,
            ..Self::new(ValueKind::Object)
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn minimum(mut self, min: impl Into<f64>) -> Self {
        self.minimum = Some(min.into());
        self
    }

    pub fn maximum(mut self, max: impl Into<f64>) -> Self {
        self.maximum = Some(max.into());
        self
    }

    pub fn one_of(mut self, values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    fn check(&self, value: &Value, path: &str, violations: &mut Vec<Violation>) -> Value {
        if !self.kind.matches(value) {
            violations.push(Violation::new(
                path,
                format!("expected {}, got {}", self.kind.as_str(), kind_of(value)),
            ));
            return value.clone();
        }

        if let Some(allowed) = &self.allowed {
            if !allowed.contains(value) {
                let options = allowed
                    .iter()
                    .map(Value::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                violations.push(Violation::new(path, format!("must be one of [{options}]")));
            }
        }

        if let Some(n) = value.as_f64() {
            if let Some(min) = self.minimum {
                if n < min {
                    violations.push(Violation::new(path, format!("must be >= {min}")));
                }
            }
            if let Some(max) = self.maximum {
                if n > max {
                    violations.push(Violation::new(path, format!("must be <= {max}")));
                }
            }
        }

        match value {
            Value::Array(elements) => {
                let Some(items) = &self.items else {
                    return value.clone();
                };
                let checked = elements
                    .iter()
                    .enumerate()
                    .map(|(i, element)| items.check(element, &format!("{path}[{i}]"), violations))
                    .collect();
                Value::Array(checked)
            }
            Value::Object(fields) => match &self.properties {
                Some(properties) => Value::Object(check_object(
                    properties,
                    &self.required,
                    true,
                    fields,
                    path,
                    violations,
                )),
                None => value.clone(),
            },
            _ => value.clone(),
        }
    }
}

fn join_path(parent: &str, field: &str) -> String {
    if parent.is_empty() {
        field.to_string()
    } else {
        format!("{parent}.{field}")
    }
}

fn check_object(
    properties: &BTreeMap<String, PropertySchema>,
    required: &[String],
    additional_properties: bool,
    fields: &Map<String, Value>,
    path: &str,
    violations: &mut Vec<Violation>,
) -> Map<String, Value> {
    let mut out = Map::new();

    for name in required {
        if fields.get(name).is_none_or(Value::is_null) && !properties.contains_key(name) {
            violations.push(Violation::new(&join_path(path, name), "required property missing"));
        }
    }

    for (name, schema) in properties {
        let field_path = join_path(path, name);
        match fields.get(name) {
            Some(value) if !value.is_null() => {
                out.insert(name.clone(), schema.check(value, &field_path, violations));
            }
            _ => {
                if required.contains(name) {
                    violations.push(Violation::new(&field_path, "required property missing"));
                } else if let Some(default) = &schema.default {
                    out.insert(name.clone(), default.clone());
                }
            }
        }
    }

    for (name, value) in fields {
        if properties.contains_key(name) {
            continue;
        }
        if additional_properties {
            out.insert(name.clone(), value.clone());
        } else {
            violations.push(Violation::new(&join_path(path, name), "unexpected property"));
        }
    }

    out
}
