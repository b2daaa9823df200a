//! Payload schemas for triggers.
//!
//! A schema is a small JSON Schema subset: an object with typed
//! `properties` and a `required` list. Payloads are checked against it once,
//! before the trigger's context is resolved.

use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

/// A JSON Schema describing the payload a trigger accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadSchema {
    /// The JSON Schema definition.
    #[serde(flatten)]
    pub schema: JsonValue,
}

impl PayloadSchema {
    /// A schema that accepts any payload.
    #[must_use]
    pub fn any() -> Self {
        Self { schema: json!({}) }
    }

    /// An empty object schema, extended with [`Self::field`].
    #[must_use]
    pub fn object() -> Self {
        Self {
            schema: json!({ "type": "object", "properties": {}, "required": [] }),
        }
    }

    /// Wraps a raw JSON Schema value.
    #[must_use]
    pub fn from_json(schema: JsonValue) -> Self {
        Self { schema }
    }

    /// Adds a property of the given JSON type.
    #[must_use]
    pub fn field(mut self, name: &str, json_type: &str, required: bool) -> Self {
        if let Some(properties) = self
            .schema
            .get_mut("properties")
            .and_then(JsonValue::as_object_mut)
        {
            properties.insert(name.to_string(), json!({ "type": json_type }));
        }
        if required {
            if let Some(list) = self
                .schema
                .get_mut("required")
                .and_then(JsonValue::as_array_mut)
            {
                list.push(JsonValue::String(name.to_string()));
            }
        }
        self
    }

    /// Checks a payload, returning every problem found.
    #[must_use]
    pub fn check(&self, payload: &JsonValue) -> Vec<String> {
        let mut problems = Vec::new();

        if let Some(expected) = self.schema.get("type").and_then(JsonValue::as_str) {
            if !matches_type(payload, expected) {
                problems.push(format!("payload must be of type {expected}"));
                return problems;
            }
        }

        let Some(object) = payload.as_object() else {
            return problems;
        };

        if let Some(required) = self.schema.get("required").and_then(JsonValue::as_array) {
            for name in required.iter().filter_map(JsonValue::as_str) {
                if object.get(name).is_none_or(JsonValue::is_null) {
                    problems.push(format!("missing required field '{name}'"));
                }
            }
        }

        if let Some(properties) = self.schema.get("properties").and_then(JsonValue::as_object) {
            for (name, property) in properties {
                let Some(value) = object.get(name) else {
                    continue;
                };
                if value.is_null() {
                    continue;
                }
                if let Some(expected) = property.get("type").and_then(JsonValue::as_str) {
                    if !matches_type(value, expected) {
                        problems.push(format!("field '{name}' must be of type {expected}"));
                    }
                }
            }
        }

        problems
    }
}

impl Default for PayloadSchema {
    fn default() -> Self {
        Self::any()
    }
}

fn matches_type(value: &JsonValue, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}
