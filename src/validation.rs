//! Schema validation helpers.
//!
//! Checks a declared `serde_json::Value` against a [`Schema`] before any
//! cloud call is made, so configuration mistakes surface as diagnostics
//! rather than API errors.
//!
//! # Example
//!
//! ```
//! use yandex_provider::schema::{Attribute, Schema};
//! use yandex_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::optional_string())
//!     .with_attribute("created_at", Attribute::computed_string());
//!
//! assert!(validate(&schema, &json!({"name": "acct"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": 42}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("name".to_string()));
//! ```

use crate::schema::{Attribute, AttributeType, Diagnostic, Schema};
use serde_json::Value;

/// Validate a declared configuration against a schema.
///
/// Returns a list of diagnostics; an empty list means the value is valid.
///
/// # Validation Rules
///
/// - Required attributes must be present and non-null
/// - Computed-only attributes must not be set
/// - Attributes not in the schema are rejected
/// - Attribute types must match the schema
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let obj = match value {
        Value::Object(map) => map,
        Value::Null => {
            for (name, attr) in &schema.attributes {
                validate_attribute(name, attr, None, &mut diagnostics);
            }
            return diagnostics;
        }
        _ => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(value))),
            );
            return diagnostics;
        }
    };

    for (name, attr) in &schema.attributes {
        validate_attribute(name, attr, obj.get(name), &mut diagnostics);
    }

    for name in obj.keys() {
        if schema.attribute(name).is_none() {
            diagnostics.push(
                Diagnostic::error(format!("Unsupported attribute '{}'", name))
                    .with_attribute(name.as_str()),
            );
        }
    }

    diagnostics
}

/// Validate a declared configuration, returning `Err` with the diagnostics if invalid.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check whether a declared configuration is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

fn validate_attribute(
    name: &str,
    attr: &Attribute,
    value: Option<&Value>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", name))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(name),
                );
            }
        }
        Some(v) if !attr.flags.is_configurable() => {
            diagnostics.push(
                Diagnostic::error(format!("Attribute '{}' is computed", name))
                    .with_detail(format!(
                        "The provider sets this value; got {}",
                        value_type_name(v)
                    ))
                    .with_attribute(name),
            );
        }
        Some(v) => validate_attribute_type(&attr.attr_type, v, name, diagnostics),
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        }
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        }
        AttributeType::Map(value_type) => {
            if let Some(obj) = value.as_object() {
                for (key, val) in obj {
                    let key_path = format!("{}.{}", path, key);
                    validate_attribute_type(value_type, val, &key_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "map", value));
            }
        }
    }
}

fn type_error(path: &str, expected: &str, value: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for '{}'", path))
        .with_detail(format!(
            "Expected {}, got {}",
            expected,
            value_type_name(value)
        ))
        .with_attribute(path)
}

fn value_type_name(value: &Value) -> &'static str {
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

    fn schema() -> Schema {
        Schema::v0()
            .with_attribute("name", Attribute::optional_string())
            .with_attribute("folder_id", Attribute::optional_computed_string())
            .with_attribute("created_at", Attribute::computed_string())
            .with_attribute("timeouts", Attribute::optional_string_map())
    }

    #[test]
    fn test_valid_config() {
        let value = json!({
            "name": "acct",
            "folder_id": "f-1",
            "timeouts": {"create": "5m"}
        });
        assert!(is_valid(&schema(), &value));
        assert!(validate_result(&schema(), &value).is_ok());
    }

    #[test]
    fn test_null_optional_is_valid() {
        assert!(is_valid(&schema(), &json!({"name": null})));
        assert!(is_valid(&schema(), &Value::Null));
    }

    #[test]
    fn test_missing_required() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());
        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Missing required"));
    }

    #[test]
    fn test_wrong_type() {
        let diagnostics = validate(&schema(), &json!({"name": 42}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].detail.as_deref(),
            Some("Expected string, got number")
        );
    }

    #[test]
    fn test_computed_attribute_cannot_be_set() {
        let diagnostics = validate(&schema(), &json!({"created_at": "2020-01-01T00:00:00Z"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("created_at"));
    }

    #[test]
    fn test_unknown_attribute() {
        let diagnostics = validate(&schema(), &json!({"nmae": "typo"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("nmae"));
    }

    #[test]
    fn test_map_values_are_checked() {
        let diagnostics = validate(&schema(), &json!({"timeouts": {"create": 60}}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("timeouts.create"));
    }

    #[test]
    fn test_non_object() {
        let diagnostics = validate(&schema(), &json!("string"));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Expected object");
    }
}
