//! Validation domain module.
//!
//! Field rules are JSON Schema fragments with two extensions carried from the
//! directory's schema dialect:
//!
//! - a boolean `required` inside a field's rules is lifted into the
//!   object-level `required` list when the full-document variant is compiled,
//! - `keyschema` applies a sub-schema to every value of a mapping (see
//!   [`keyschema`]).
//!
//! Each resource compiles one [`FieldValidator`] holding two validators: a
//! full-document variant for inserts and replaces, and a relaxed variant for
//! partial updates where required fields may be absent.

mod error;
pub mod keyschema;

pub use error::SchemaError;
pub use keyschema::KEYSCHEMA_RULE;

use std::collections::BTreeMap;
use std::fmt;

use jsonschema::{Validator, error::ValidationErrorKind};
use serde_json::{Map, Value};

/// Mapping of field name to its rules fragment.
pub type FieldRules = Map<String, Value>;

/// Field-keyed validation failures, ordered for stable reporting.
pub type Issues = BTreeMap<String, String>;

/// Issue key used when a failure cannot be pinned to a single field.
pub const DOCUMENT_ISSUE_KEY: &str = "_document";

/// Compiled validators for one resource's field rules.
pub struct FieldValidator {
    document: Validator,
    changes: Validator,
}

impl FieldValidator {
    /// Compile field rules into the full-document and partial-update
    /// validators.
    pub fn compile(fields: &FieldRules) -> Result<Self, SchemaError> {
        let document = compile_object_schema(&object_schema(fields, true))?;
        let changes = compile_object_schema(&object_schema(fields, false))?;
        Ok(Self { document, changes })
    }

    /// Validate a full document. Required fields must be present.
    pub fn validate_document(&self, document: &Value) -> Result<(), Issues> {
        check(&self.document, document)
    }

    /// Validate a partial update. Required fields may be absent, every
    /// present field must still satisfy its rules.
    pub fn validate_changes(&self, changes: &Value) -> Result<(), Issues> {
        check(&self.changes, changes)
    }
}

impl fmt::Debug for FieldValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldValidator").finish_non_exhaustive()
    }
}

fn compile_object_schema(schema: &Value) -> Result<Validator, SchemaError> {
    keyschema::compile_validator(schema).map_err(|err| SchemaError::compile(err.to_string()))
}

/// Assemble an object schema from field rules.
///
/// A boolean `required` inside a field's rules is stripped in both variants
/// (it is not a valid property-level keyword) and, when `demand_required` is
/// set, lifted into the object-level `required` list. An array-valued
/// `required` is standard JSON Schema for nested objects and passes through
/// untouched.
fn object_schema(fields: &FieldRules, demand_required: bool) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for (field, rules) in fields {
        let rules = match rules {
            Value::Object(map) => {
                let mut map = map.clone();
                if matches!(map.get("required"), Some(Value::Bool(_)))
                    && map.remove("required") == Some(Value::Bool(true))
                {
                    required.push(Value::String(field.clone()));
                }
                Value::Object(map)
            }
            other => other.clone(),
        };
        properties.insert(field.clone(), rules);
    }

    let mut schema = Map::new();
    schema.insert("type".to_string(), Value::String("object".to_string()));
    schema.insert("properties".to_string(), Value::Object(properties));
    if demand_required && !required.is_empty() {
        schema.insert("required".to_string(), Value::Array(required));
    }
    Value::Object(schema)
}

fn check(validator: &Validator, value: &Value) -> Result<(), Issues> {
    let issues = collect_issues(validator, value);
    if issues.is_empty() { Ok(()) } else { Err(issues) }
}

/// Fold the validator's error stream into a field-keyed issue map.
///
/// Missing-required failures are keyed by the missing property; everything
/// else by the failing value's path. The first message per field wins.
fn collect_issues(validator: &Validator, value: &Value) -> Issues {
    let mut issues = Issues::new();
    for error in validator.iter_errors(value) {
        let field = match &error.kind {
            ValidationErrorKind::Required { property } => match property {
                Value::String(name) => name.clone(),
                other => other.to_string(),
            },
            _ => {
                let pointer = error.instance_path.to_string();
                let trimmed = pointer.trim_start_matches('/');
                if trimmed.is_empty() {
                    DOCUMENT_ISSUE_KEY.to_string()
                } else {
                    trimmed.replace('/', ".")
                }
            }
        };
        issues.entry(field).or_insert_with(|| error.to_string());
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> FieldRules {
        value.as_object().expect("field rules").clone()
    }

    #[test]
    fn test_valid_document_passes() {
        let validator = FieldValidator::compile(&fields(json!({
            "name": {"type": "string", "required": true},
            "region": {"type": "string"}
        })))
        .expect("compile");

        let outcome = validator.validate_document(&json!({"name": "clinic", "region": "north"}));
        assert!(outcome.is_ok());
    }

    #[test]
    fn test_missing_required_field_is_reported_by_name() {
        let validator = FieldValidator::compile(&fields(json!({
            "name": {"type": "string", "required": true}
        })))
        .expect("compile");

        let issues = validator
            .validate_document(&json!({"region": "north"}))
            .expect_err("issues");
        assert!(issues.contains_key("name"));
    }

    #[test]
    fn test_changes_variant_relaxes_required_but_keeps_types() {
        let validator = FieldValidator::compile(&fields(json!({
            "name": {"type": "string", "required": true},
            "beds": {"type": "integer"}
        })))
        .expect("compile");

        assert!(validator.validate_changes(&json!({"beds": 12})).is_ok());

        let issues = validator
            .validate_changes(&json!({"beds": "many"}))
            .expect_err("issues");
        assert!(issues.contains_key("beds"));
    }

    #[test]
    fn test_type_failure_keyed_by_field_path() {
        let validator = FieldValidator::compile(&fields(json!({
            "beds": {"type": "integer"}
        })))
        .expect("compile");

        let issues = validator
            .validate_document(&json!({"beds": "many"}))
            .expect_err("issues");
        assert_eq!(issues.keys().collect::<Vec<_>>(), vec!["beds"]);
    }

    #[test]
    fn test_required_false_is_not_demanded() {
        let validator = FieldValidator::compile(&fields(json!({
            "note": {"type": "string", "required": false}
        })))
        .expect("compile");

        assert!(validator.validate_document(&json!({})).is_ok());
    }

    #[test]
    fn test_array_required_inside_nested_object_survives() {
        let validator = FieldValidator::compile(&fields(json!({
            "contact": {
                "type": "object",
                "properties": {"phone": {"type": "string"}},
                "required": ["phone"]
            }
        })))
        .expect("compile");

        assert!(
            validator
                .validate_document(&json!({"contact": {"phone": "112"}}))
                .is_ok()
        );
        let issues = validator
            .validate_document(&json!({"contact": {}}))
            .expect_err("issues");
        assert!(issues.contains_key("phone"));
    }

    #[test]
    fn test_keyschema_rule_flows_through_field_rules() {
        let validator = FieldValidator::compile(&fields(json!({
            "fields": {"type": "object", "keyschema": {"type": "string"}}
        })))
        .expect("compile");

        assert!(
            validator
                .validate_document(&json!({"fields": {"region": "string-rule"}}))
                .is_ok()
        );

        let issues = validator
            .validate_document(&json!({"fields": {"region": 7}}))
            .expect_err("issues");
        assert!(issues.contains_key("fields"));
        assert!(issues["fields"].contains("region"));
    }

    #[test]
    fn test_malformed_rules_fail_compile() {
        let result = FieldValidator::compile(&fields(json!({
            "beds": {"type": 12}
        })));
        assert!(matches!(result, Err(SchemaError::Compile(_))));
    }

    #[test]
    fn test_non_object_document_reported_at_document_level() {
        let validator = FieldValidator::compile(&fields(json!({
            "name": {"type": "string"}
        })))
        .expect("compile");

        let issues = validator
            .validate_document(&json!("not an object"))
            .expect_err("issues");
        assert!(issues.contains_key(DOCUMENT_ISSUE_KEY));
    }
}
