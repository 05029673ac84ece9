//! Event schemas and structural property filtering.
//!
//! A schema declares the fields an event type accepts. Filtering copies only
//! declared fields that carry a value, checking each against its declared
//! type. Nested objects and repeated fields are filtered recursively.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::SchemaError;

/// Declared type of a schema field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    /// Accept any JSON value without inspecting it.
    Any,
    /// Nested message with its own declared fields.
    Object(BTreeMap<String, FieldType>),
    /// Repeated field; every element must match the item type.
    Array(Box<FieldType>),
}

impl FieldType {
    fn describe(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Any => "any",
            FieldType::Object(_) => "object",
            FieldType::Array(_) => "array",
        }
    }
}

/// Schema for one event type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSchema {
    pub fields: BTreeMap<String, FieldType>,
}

impl EventSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field declaration.
    pub fn with_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.insert(name.into(), field_type);
        self
    }

    /// Restrict `properties` to the declared fields.
    ///
    /// Fails with [`SchemaError::TypeMismatch`] when a declared field holds a
    /// value of the wrong type, and with [`SchemaError::EmptyResult`] when
    /// nothing survives the filter.
    pub fn filter(
        &self,
        event: &str,
        properties: &Map<String, Value>,
    ) -> Result<Map<String, Value>, SchemaError> {
        let filtered = filter_fields(&self.fields, properties, None)?;
        if filtered.is_empty() {
            return Err(SchemaError::EmptyResult {
                event: event.to_string(),
            });
        }
        Ok(filtered)
    }
}

fn filter_fields(
    fields: &BTreeMap<String, FieldType>,
    input: &Map<String, Value>,
    parent: Option<&str>,
) -> Result<Map<String, Value>, SchemaError> {
    let mut out = Map::new();
    for (name, field_type) in fields {
        let Some(value) = input.get(name) else {
            continue;
        };
        let field = match parent {
            Some(parent) => format!("{parent}.{name}"),
            None => name.clone(),
        };
        if let Some(kept) = filter_value(field_type, value, &field)? {
            out.insert(name.clone(), kept);
        }
    }
    Ok(out)
}

fn filter_value(
    field_type: &FieldType,
    value: &Value,
    field: &str,
) -> Result<Option<Value>, SchemaError> {
    if value.is_null() {
        return Ok(None);
    }

    let matches = match field_type {
        FieldType::Any => true,
        FieldType::String => value.is_string(),
        FieldType::Number => value.is_number(),
        FieldType::Integer => value.as_f64().map_or(false, |n| n.fract() == 0.0),
        FieldType::Boolean => value.is_boolean(),
        FieldType::Object(fields) => {
            let Some(map) = value.as_object() else {
                return Err(mismatch(field_type, value, field));
            };
            let nested = filter_fields(fields, map, Some(field))?;
            return Ok((!nested.is_empty()).then_some(Value::Object(nested)));
        }
        FieldType::Array(item_type) => {
            let Some(items) = value.as_array() else {
                return Err(mismatch(field_type, value, field));
            };
            let mut kept = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                if let Some(v) = filter_value(item_type, item, &format!("{field}[{i}]"))? {
                    kept.push(v);
                }
            }
            return Ok((!kept.is_empty()).then_some(Value::Array(kept)));
        }
    };

    if matches {
        Ok(Some(value.clone()))
    } else {
        Err(mismatch(field_type, value, field))
    }
}

fn mismatch(field_type: &FieldType, value: &Value, field: &str) -> SchemaError {
    SchemaError::TypeMismatch {
        field: field.to_string(),
        expected: field_type.describe().to_string(),
        found: json_type_name(value).to_string(),
    }
}

/// Name of a JSON value's type, for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn likes_schema() -> EventSchema {
        let mut person = BTreeMap::new();
        person.insert("id".to_string(), FieldType::String);
        person.insert("name".to_string(), FieldType::String);

        let mut summary = BTreeMap::new();
        summary.insert("total_count".to_string(), FieldType::Integer);

        EventSchema::new()
            .with_field("data", FieldType::Array(Box::new(FieldType::Object(person))))
            .with_field("summary", FieldType::Object(summary))
    }

    fn as_map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_unknown_fields_dropped() {
        let schema = EventSchema::new().with_field("amount", FieldType::Number);
        let out = schema
            .filter("Purchase", &as_map(json!({"amount": 42, "coupon": "X"})))
            .unwrap();
        assert_eq!(Value::Object(out), json!({"amount": 42}));
    }

    #[test]
    fn test_nested_filtering() {
        let input = json!({
            "data": [{"id": "100", "name": "John Doe", "email": "j@example.com"}],
            "paging": {"cursors": {"before": "MTA"}},
            "summary": {"total_count": 42, "extra": true}
        });
        let out = likes_schema().filter("Likes", &as_map(input)).unwrap();
        assert_eq!(
            Value::Object(out),
            json!({
                "data": [{"id": "100", "name": "John Doe"}],
                "summary": {"total_count": 42}
            })
        );
    }

    #[test]
    fn test_type_mismatch() {
        let schema = EventSchema::new().with_field("amount", FieldType::Number);
        let err = schema
            .filter("Purchase", &as_map(json!({"amount": "lots"})))
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::TypeMismatch {
                field: "amount".to_string(),
                expected: "number".to_string(),
                found: "string".to_string(),
            }
        );
    }

    #[test]
    fn test_nested_mismatch_reports_full_field() {
        let input = json!({"data": [{"id": 7}]});
        let err = likes_schema().filter("Likes", &as_map(input)).unwrap_err();
        assert!(matches!(err, SchemaError::TypeMismatch { ref field, .. } if field == "data[0].id"));
    }

    #[test]
    fn test_integer_rejects_fraction() {
        let schema = EventSchema::new().with_field("count", FieldType::Integer);
        assert!(schema.filter("E", &as_map(json!({"count": 3.0}))).is_ok());
        assert!(schema.filter("E", &as_map(json!({"count": 3.5}))).is_err());
    }

    #[test]
    fn test_empty_result() {
        let schema = EventSchema::new().with_field("amount", FieldType::Number);
        let err = schema
            .filter("Purchase", &as_map(json!({"other": 1, "amount": null})))
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::EmptyResult {
                event: "Purchase".to_string()
            }
        );
    }

    #[test]
    fn test_filter_is_idempotent() {
        let input = json!({
            "data": [{"id": "1", "junk": 0}, null],
            "summary": {"total_count": 3},
            "ignored": "yes"
        });
        let schema = likes_schema();
        let once = schema.filter("Likes", &as_map(input)).unwrap();
        let twice = schema.filter("Likes", &once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_schema_deserializes_from_json() {
        let schema: EventSchema = serde_json::from_value(json!({
            "fields": {
                "amount": "number",
                "items": {"array": {"object": {"sku": "string"}}}
            }
        }))
        .unwrap();
        assert_eq!(schema.fields["amount"], FieldType::Number);
        assert!(matches!(schema.fields["items"], FieldType::Array(_)));
    }
}
