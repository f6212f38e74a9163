//! Registered resource descriptor.

use crate::core::db::Filter;
use crate::domains::validation::{FieldRules, FieldValidator, SchemaError};

/// One registered REST resource.
///
/// A definition is created once at registration and never mutated; the
/// registry hands it out behind an `Arc` so in-flight requests keep a
/// consistent view even across concurrent registrations.
#[derive(Debug)]
pub struct ResourceDefinition {
    /// Route segment the resource is served under.
    pub name: String,

    /// Human-readable item title.
    pub title: String,

    /// Effective field rules (family base merged with per-document fields).
    pub schema: FieldRules,

    /// Backing collection documents live in.
    pub source: String,

    /// Equality filter restricting which source documents are visible.
    pub filter: Filter,

    /// Compiled validators for the schema.
    pub validator: FieldValidator,
}

impl ResourceDefinition {
    /// Compile field rules and assemble a definition.
    pub fn build(
        name: impl Into<String>,
        title: impl Into<String>,
        schema: FieldRules,
        source: impl Into<String>,
        filter: Filter,
    ) -> Result<Self, SchemaError> {
        let validator = FieldValidator::compile(&schema)?;
        Ok(Self {
            name: name.into(),
            title: title.into(),
            schema,
            source: source.into(),
            filter,
            validator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules(value: serde_json::Value) -> FieldRules {
        value.as_object().expect("rules").clone()
    }

    #[test]
    fn test_build_compiles_validator() {
        let definition = ResourceDefinition::build(
            "clinicA",
            "clinicA",
            rules(json!({"region": {"type": "string", "required": true}})),
            "facilities",
            Filter::new(),
        )
        .expect("definition");

        assert!(
            definition
                .validator
                .validate_document(&json!({"region": "north"}))
                .is_ok()
        );
        assert!(definition.validator.validate_document(&json!({})).is_err());
    }

    #[test]
    fn test_build_rejects_malformed_rules() {
        let result = ResourceDefinition::build(
            "broken",
            "broken",
            rules(json!({"region": {"type": 7}})),
            "facilities",
            Filter::new(),
        );
        assert!(result.is_err());
    }
}
