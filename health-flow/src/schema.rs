//! Declarative output shapes.
//!
//! A [`Schema`] does double duty: it is rendered as JSON Schema to tell the
//! model what to produce, and it validates whatever comes back. Validation
//! never coerces; a payload either conforms or yields a [`SchemaViolation`]
//! naming the offending path.

use serde_json::{Map, Value, json};
use std::fmt;

/// Semantic type of a schema node.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaType {
    String,
    Number,
    /// A number in `[0, 1]`.
    Probability,
    Enum(&'static [&'static str]),
    Array(Box<SchemaType>),
    Object(Vec<Field>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub description: &'static str,
    pub ty: SchemaType,
    pub required: bool,
}

impl Field {
    pub fn required(name: &'static str, description: &'static str, ty: SchemaType) -> Self {
        Self {
            name,
            description,
            ty,
            required: true,
        }
    }

    pub fn optional(name: &'static str, description: &'static str, ty: SchemaType) -> Self {
        Self {
            name,
            description,
            ty,
            required: false,
        }
    }
}

/// A named output contract.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub name: &'static str,
    pub root: SchemaType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// The payload could not be parsed as JSON at all.
    NotJson,
    MissingField,
    WrongType(&'static str),
    OutOfRange,
    NotInEnum(String),
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotJson => write!(f, "payload is not a JSON object"),
            Self::MissingField => write!(f, "required field is missing"),
            Self::WrongType(expected) => write!(f, "expected {expected}"),
            Self::OutOfRange => write!(f, "number outside [0, 1]"),
            Self::NotInEnum(actual) => write!(f, "'{actual}' is not an allowed value"),
        }
    }
}

/// Where and why a payload failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub kind: ViolationKind,
    /// JSONPath-like location, e.g. `$.hospitals[2].name`.
    pub path: String,
}

impl SchemaViolation {
    pub fn new(kind: ViolationKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.path)
    }
}

impl std::error::Error for SchemaViolation {}

impl Schema {
    pub fn object(name: &'static str, fields: Vec<Field>) -> Self {
        Self {
            name,
            root: SchemaType::Object(fields),
        }
    }

    pub fn array(name: &'static str, items: SchemaType) -> Self {
        Self {
            name,
            root: SchemaType::Array(Box::new(items)),
        }
    }

    /// Render as a JSON Schema document.
    pub fn to_json_schema(&self) -> Value {
        type_to_json_schema(&self.root)
    }

    /// Check `value` against this schema without modifying it.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        check(&self.root, value, "$")
    }
}

fn type_to_json_schema(ty: &SchemaType) -> Value {
    match ty {
        SchemaType::String => json!({ "type": "string" }),
        SchemaType::Number => json!({ "type": "number" }),
        SchemaType::Probability => json!({ "type": "number", "minimum": 0, "maximum": 1 }),
        SchemaType::Enum(allowed) => json!({ "type": "string", "enum": allowed }),
        SchemaType::Array(items) => json!({
            "type": "array",
            "items": type_to_json_schema(items),
        }),
        SchemaType::Object(fields) => {
            let mut properties = Map::new();
            let mut required = Vec::new();
            for field in fields {
                let mut property = type_to_json_schema(&field.ty);
                if !field.description.is_empty() {
                    property["description"] = json!(field.description);
                }
                properties.insert(field.name.to_string(), property);
                if field.required {
                    required.push(field.name);
                }
            }
            json!({
                "type": "object",
                "properties": properties,
                "required": required,
            })
        }
    }
}

fn check(ty: &SchemaType, value: &Value, path: &str) -> Result<(), SchemaViolation> {
    match ty {
        SchemaType::String => value
            .as_str()
            .map(|_| ())
            .ok_or_else(|| SchemaViolation::new(ViolationKind::WrongType("string"), path)),
        SchemaType::Number => value
            .as_f64()
            .map(|_| ())
            .ok_or_else(|| SchemaViolation::new(ViolationKind::WrongType("number"), path)),
        SchemaType::Probability => {
            let n = value
                .as_f64()
                .ok_or_else(|| SchemaViolation::new(ViolationKind::WrongType("number"), path))?;
            if (0.0..=1.0).contains(&n) {
                Ok(())
            } else {
                Err(SchemaViolation::new(ViolationKind::OutOfRange, path))
            }
        }
        SchemaType::Enum(allowed) => {
            let s = value
                .as_str()
                .ok_or_else(|| SchemaViolation::new(ViolationKind::WrongType("string"), path))?;
            if allowed.contains(&s) {
                Ok(())
            } else {
                Err(SchemaViolation::new(
                    ViolationKind::NotInEnum(s.to_string()),
                    path,
                ))
            }
        }
        SchemaType::Array(items) => {
            let elements = value
                .as_array()
                .ok_or_else(|| SchemaViolation::new(ViolationKind::WrongType("array"), path))?;
            for (i, element) in elements.iter().enumerate() {
                check(items, element, &format!("{path}[{i}]"))?;
            }
            Ok(())
        }
        SchemaType::Object(fields) => {
            let object = value
                .as_object()
                .ok_or_else(|| SchemaViolation::new(ViolationKind::WrongType("object"), path))?;
            for field in fields {
                let field_path = format!("{path}.{}", field.name);
                match object.get(field.name) {
                    None | Some(Value::Null) if field.required => {
                        return Err(SchemaViolation::new(ViolationKind::MissingField, field_path));
                    }
                    None | Some(Value::Null) => {}
                    Some(v) => check(&field.ty, v, &field_path)?,
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Schema {
        Schema::object(
            "sample",
            vec![
                Field::required("summary", "Short summary", SchemaType::String),
                Field::required(
                    "items",
                    "",
                    SchemaType::Array(Box::new(SchemaType::Object(vec![
                        Field::required("score", "", SchemaType::Probability),
                        Field::required("level", "", SchemaType::Enum(&["Low", "High"])),
                        Field::optional("note", "", SchemaType::String),
                    ]))),
                ),
            ],
        )
    }

    #[test]
    fn accepts_conforming_payload() {
        let value = json!({
            "summary": "ok",
            "items": [{ "score": 0.5, "level": "Low" }, { "score": 1, "level": "High", "note": "x" }],
            "extra": true
        });
        assert_eq!(sample().validate(&value), Ok(()));
    }

    #[test]
    fn missing_required_field_reports_path() {
        let value = json!({ "items": [] });
        let err = sample().validate(&value).unwrap_err();
        assert_eq!(err.kind, ViolationKind::MissingField);
        assert_eq!(err.path, "$.summary");
    }

    #[test]
    fn null_counts_as_missing() {
        let value = json!({ "summary": null, "items": [] });
        let err = sample().validate(&value).unwrap_err();
        assert_eq!(err.kind, ViolationKind::MissingField);
    }

    #[test]
    fn nested_errors_carry_index() {
        let value = json!({
            "summary": "ok",
            "items": [{ "score": 0.5, "level": "Low" }, { "score": 0.2, "level": "Medium" }]
        });
        let err = sample().validate(&value).unwrap_err();
        assert_eq!(err.kind, ViolationKind::NotInEnum("Medium".to_string()));
        assert_eq!(err.path, "$.items[1].level");
    }

    #[test]
    fn probability_is_range_checked_not_clamped() {
        let value = json!({ "summary": "ok", "items": [{ "score": 1.2, "level": "Low" }] });
        let err = sample().validate(&value).unwrap_err();
        assert_eq!(err.kind, ViolationKind::OutOfRange);
        assert_eq!(err.path, "$.items[0].score");
    }

    #[test]
    fn string_number_is_not_coerced() {
        let value = json!({ "summary": "ok", "items": [{ "score": "0.3", "level": "Low" }] });
        let err = sample().validate(&value).unwrap_err();
        assert_eq!(err.kind, ViolationKind::WrongType("number"));
    }

    #[test]
    fn json_schema_lists_required_fields() {
        let rendered = sample().to_json_schema();
        assert_eq!(rendered["type"], "object");
        assert_eq!(rendered["required"], json!(["summary", "items"]));
        assert_eq!(rendered["properties"]["summary"]["description"], "Short summary");
        let item = &rendered["properties"]["items"]["items"];
        assert_eq!(item["required"], json!(["score", "level"]));
        assert_eq!(item["properties"]["level"]["enum"], json!(["Low", "High"]));
        assert_eq!(item["properties"]["score"]["maximum"], 1);
    }
}
