use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::item::Data;

/// Field-level rules a resource enforces on incoming payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceSchema {
    /// Shorthand list of fields that must be present on create/replace.
    pub required: Vec<String>,
    /// Per-field definitions.
    pub fields: Vec<FieldDef>,
}

/// Single field definition within a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    /// Name of the field.
    pub name: String,
    /// Whether the field must be present in every full payload.
    #[serde(default)]
    pub required: bool,
    /// Expected JSON type, if constrained.
    #[serde(default, rename = "type")]
    pub field_type: Option<FieldType>,
}

/// JSON type a field must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl FieldType {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

/// Result of validating a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// The payload conforms.
    Valid,
    /// The payload violates one or more constraints.
    Invalid {
        /// Human-readable descriptions of each failure.
        errors: Vec<String>,
    },
}

impl ValidationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    fn from_errors(errors: Vec<String>) -> Self {
        if errors.is_empty() {
            Self::Valid
        } else {
            Self::Invalid { errors }
        }
    }
}

/// Kind of write being validated. Partial writes skip required-field checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Replace,
    Patch,
}

impl ResourceSchema {
    /// Validates `data` against this schema.
    #[must_use]
    pub fn validate(&self, data: &Data, mode: WriteMode) -> ValidationResult {
        let mut errors = Vec::new();

        if mode != WriteMode::Patch {
            let required = self
                .required
                .iter()
                .chain(self.fields.iter().filter(|f| f.required).map(|f| &f.name));
            for field in required {
                if data.get(field).map_or(true, Value::is_null) {
                    errors.push(format!("field '{field}' is required"));
                }
            }
        }

        for def in &self.fields {
            let (Some(expected), Some(value)) = (def.field_type, data.get(&def.name)) else {
                continue;
            };
            if !value.is_null() && !expected.accepts(value) {
                errors.push(format!(
                    "field '{}' must be of type {}",
                    def.name,
                    expected.as_str()
                ));
            }
        }

        errors.dedup();
        ValidationResult::from_errors(errors)
    }
}

/// Pass/fail hook consulted before a write reaches a resource.
pub trait RequestValidator: Send + Sync {
    fn validate(&self, resource: &str, data: &Data, mode: WriteMode) -> ValidationResult;
}

/// [`RequestValidator`] backed by per-resource [`ResourceSchema`]s.
/// Resources without a schema always pass.
#[derive(Debug, Clone, Default)]
pub struct SchemaValidator {
    schemas: HashMap<String, ResourceSchema>,
}

impl SchemaValidator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces the schema for `resource`.
    pub fn insert(&mut self, resource: impl Into<String>, schema: ResourceSchema) {
        self.schemas.insert(resource.into(), schema);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl RequestValidator for SchemaValidator {
    fn validate(&self, resource: &str, data: &Data, mode: WriteMode) -> ValidationResult {
        match self.schemas.get(resource) {
            Some(schema) => schema.validate(data, mode),
            None => ValidationResult::Valid,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn data(v: Value) -> Data {
        v.as_object().cloned().unwrap()
    }

    fn schema() -> ResourceSchema {
        serde_json::from_value(json!({
            "required": ["name"],
            "fields": [
                {"name": "age", "type": "integer"},
                {"name": "email", "required": true, "type": "string"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn required_fields_checked_on_create() {
        let result = schema().validate(&data(json!({"age": 3})), WriteMode::Create);
        let ValidationResult::Invalid { errors } = result else {
            panic!("expected invalid");
        };
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.contains("'name'")));
        assert!(errors.iter().any(|e| e.contains("'email'")));
    }

    #[test]
    fn patch_skips_required_but_checks_types() {
        let s = schema();
        assert!(s.validate(&data(json!({"age": 4})), WriteMode::Patch).is_valid());
        assert!(!s
            .validate(&data(json!({"age": "four"})), WriteMode::Patch)
            .is_valid());
    }

    #[test]
    fn valid_payload_passes() {
        let payload = data(json!({"name": "a", "email": "a@b.c", "age": 1}));
        assert!(schema().validate(&payload, WriteMode::Replace).is_valid());
    }

    #[test]
    fn schema_validator_ignores_unknown_resources() {
        let mut v = SchemaValidator::new();
        v.insert("users", schema());
        assert!(v.validate("orders", &Data::new(), WriteMode::Create).is_valid());
        assert!(!v.validate("users", &Data::new(), WriteMode::Create).is_valid());
    }
}
