// ABOUTME: Locals schema validation for partials
// ABOUTME: Async validator seam with a JSON Schema implementation backed by the jsonschema crate

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::fmt;

/// A rejected set of locals
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFailure {
    pub message: String,
    pub errors: Vec<String>,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[async_trait]
pub trait LocalsValidator: Send + Sync + fmt::Debug {
    async fn validate(&self, locals: &JsonValue) -> std::result::Result<(), ValidationFailure>;

    /// The schema this validator enforces, when it has a JSON form
    fn schema(&self) -> Option<&JsonValue> {
        None
    }
}

pub struct JsonSchemaValidator {
    schema: JsonValue,
    validator: jsonschema::Validator,
}

impl fmt::Debug for JsonSchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchemaValidator")
            .field("schema", &self.schema)
            .finish()
    }
}

impl JsonSchemaValidator {
    /// Compile a JSON Schema document. The error string describes why the
    /// schema itself is invalid.
    pub fn compile(schema: JsonValue) -> std::result::Result<Self, String> {
        let validator = jsonschema::validator_for(&schema).map_err(|e| e.to_string())?;
        Ok(Self { schema, validator })
    }
}

#[async_trait]
impl LocalsValidator for JsonSchemaValidator {
    async fn validate(&self, locals: &JsonValue) -> std::result::Result<(), ValidationFailure> {
        let errors: Vec<String> = self
            .validator
            .iter_errors(locals)
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{}: {}", path, e)
                }
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationFailure {
                message: errors.join("; "),
                errors,
            })
        }
    }

    fn schema(&self) -> Option<&JsonValue> {
        Some(&self.schema)
    }
}
