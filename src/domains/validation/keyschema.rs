//! The `keyschema` validation rule.
//!
//! A `keyschema` entry inside a schema applies its sub-schema to every value
//! of the instance mapping, treating each entry as `(key-as-label, value)`.
//! Keys themselves are unconstrained, which is what makes it suitable for
//! open field sets such as a sub-resource's `fields` mapping.

use jsonschema::{
    Keyword, ValidationError, Validator,
    paths::{LazyLocation, Location},
};
use serde_json::{Map, Value};

/// Name of the rule as it appears in schemas.
pub const KEYSCHEMA_RULE: &str = "keyschema";

/// Compile `schema` with the `keyschema` rule registered.
///
/// The rule's sub-schema is compiled through this same function, so nested
/// `keyschema` rules compose.
pub fn compile_validator(schema: &Value) -> Result<Validator, ValidationError<'static>> {
    jsonschema::options()
        .with_keyword(KEYSCHEMA_RULE, keyschema_factory)
        .build(schema)
}

fn keyschema_factory<'a>(
    _parent: &'a Map<String, Value>,
    value: &'a Value,
    path: Location,
) -> Result<Box<dyn Keyword>, ValidationError<'a>> {
    match compile_validator(value) {
        Ok(entries) => Ok(Box::new(KeySchema { entries })),
        Err(err) => Err(ValidationError::custom(
            Location::new(),
            path,
            value,
            format!("keyschema sub-schema does not compile: {err}"),
        )),
    }
}

struct KeySchema {
    entries: Validator,
}

impl Keyword for KeySchema {
    fn validate<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
    ) -> Result<(), ValidationError<'i>> {
        let Value::Object(mapping) = instance else {
            return Err(ValidationError::custom(
                Location::new(),
                location.into(),
                instance,
                "keyschema applies to objects only",
            ));
        };

        // Invalid entries are collected, not raised one at a time.
        let mut failures = Vec::new();
        for (key, value) in mapping {
            if let Some(first) = self.entries.iter_errors(value).next() {
                failures.push(format!("{key}: {first}"));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::custom(
                Location::new(),
                location.into(),
                instance,
                failures.join("; "),
            ))
        }
    }

    fn is_valid(&self, instance: &Value) -> bool {
        match instance {
            Value::Object(mapping) => mapping.values().all(|value| self.entries.is_valid(value)),
            _ => false,
        }
    }
}
