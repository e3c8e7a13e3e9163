//! Context-schema validation for workflow initialization.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ContextError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Bool,
    Path,
}

/// Validation rules for one context field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRules {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    /// Path fields only: the file must exist on disk.
    #[serde(default)]
    pub exists: bool,
}

impl FieldRules {
    pub fn required(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: true,
            choices: None,
            exists: false,
        }
    }

    pub fn optional(field_type: FieldType) -> Self {
        Self {
            required: false,
            ..Self::required(field_type)
        }
    }

    pub fn with_choices(mut self, choices: &[&str]) -> Self {
        self.choices = Some(choices.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn must_exist(mut self) -> Self {
        self.exists = true;
        self
    }
}

/// Field name → rules. BTreeMap keeps error output deterministic.
pub type ContextSchema = BTreeMap<String, FieldRules>;

/// Validate a context mapping against a schema. Returns every violation;
/// an empty list means the context is acceptable.
pub fn validate_context(schema: &ContextSchema, context: &Map<String, Value>) -> Vec<ContextError> {
    let mut errors = Vec::new();

    for (field, rules) in schema {
        let value = context.get(field);

        let Some(value) = value else {
            if rules.required {
                errors.push(ContextError {
                    field: field.clone(),
                    message: "required field missing".to_string(),
                });
            }
            continue;
        };

        if let Some(error) = validate_type(field, value, rules) {
            errors.push(error);
            continue;
        }

        if let Some(choices) = &rules.choices
            && let Some(text) = value.as_str()
            && !choices.iter().any(|c| c == text)
        {
            errors.push(ContextError {
                field: field.clone(),
                message: format!("must be one of {choices:?}, got '{text}'"),
            });
        }
    }

    errors
}

fn validate_type(field: &str, value: &Value, rules: &FieldRules) -> Option<ContextError> {
    let mismatch = |expected: &str| ContextError {
        field: field.to_string(),
        message: format!("expected {expected}, got {}", type_name(value)),
    };

    match rules.field_type {
        FieldType::String => value.is_string().then_some(()).ok_or(mismatch("string")),
        FieldType::Int => value.is_i64().then_some(()).ok_or(mismatch("int")),
        FieldType::Bool => value.is_boolean().then_some(()).ok_or(mismatch("bool")),
        FieldType::Path => match value.as_str() {
            None => Err(mismatch("path string")),
            Some(raw) => {
                if rules.exists {
                    let path = Path::new(raw);
                    if !path.exists() {
                        return Some(ContextError {
                            field: field.to_string(),
                            message: format!("path does not exist: {raw}"),
                        });
                    }
                    if !path.is_file() {
                        return Some(ContextError {
                            field: field.to_string(),
                            message: format!("path is not a file: {raw}"),
                        });
                    }
                }
                Ok(())
            }
        },
    }
    .err()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
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

    fn schema() -> ContextSchema {
        let mut schema = ContextSchema::new();
        schema.insert(
            "entity".to_string(),
            FieldRules::required(FieldType::String),
        );
        schema.insert(
            "scope".to_string(),
            FieldRules::optional(FieldType::String).with_choices(&["domain", "service"]),
        );
        schema.insert("count".to_string(), FieldRules::optional(FieldType::Int));
        schema
    }

    fn context(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_valid_context_passes() {
        let errors = validate_context(
            &schema(),
            &context(&[("entity", json!("Tier")), ("scope", json!("domain"))]),
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn test_missing_required_field() {
        let errors = validate_context(&schema(), &context(&[("scope", json!("domain"))]));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "entity");
        assert!(errors[0].message.contains("required"));
    }

    #[test]
    fn test_optional_field_may_be_absent() {
        let errors = validate_context(&schema(), &context(&[("entity", json!("Tier"))]));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_type_mismatch() {
        let errors = validate_context(
            &schema(),
            &context(&[("entity", json!(42)), ("count", json!("three"))]),
        );
        assert_eq!(errors.len(), 2);
        assert!(errors[0].message.contains("expected string"));
        assert!(errors[1].message.contains("expected int"));
    }

    #[test]
    fn test_choices_violation() {
        let errors = validate_context(
            &schema(),
            &context(&[("entity", json!("Tier")), ("scope", json!("galaxy"))]),
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("must be one of"));
    }

    #[test]
    fn test_path_existence() {
        let mut schema = ContextSchema::new();
        schema.insert(
            "schema_file".to_string(),
            FieldRules::required(FieldType::Path).must_exist(),
        );

        let errors = validate_context(
            &schema,
            &context(&[("schema_file", json!("/no/such/file.sql"))]),
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("does not exist"));

        let file = tempfile::NamedTempFile::new().unwrap();
        let errors = validate_context(
            &schema,
            &context(&[("schema_file", json!(file.path().to_str().unwrap()))]),
        );
        assert!(errors.is_empty());
    }
}
