// ABOUTME: Partial fragment definition with optional locals validation and injection settings
// ABOUTME: Rendering a fragment's content is fail-closed: invalid locals yield diagnostic text

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use super::error::{PartialError, Result};
use super::schema::{JsonSchemaValidator, LocalsValidator, ValidationFailure};
use crate::template::{Locals, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InjectionMode {
    #[default]
    Prepend,
    Append,
    Both,
}

impl InjectionMode {
    /// Both flags give `Both`, only `append` gives `Append`, anything else `Prepend`
    pub fn from_flags(prepend: bool, append: bool) -> Self {
        match (prepend, append) {
            (true, true) => InjectionMode::Both,
            (false, true) => InjectionMode::Append,
            _ => InjectionMode::Prepend,
        }
    }
}

impl fmt::Display for InjectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InjectionMode::Prepend => "prepend",
            InjectionMode::Append => "append",
            InjectionMode::Both => "both",
        };
        f.write_str(name)
    }
}

/// Automatic wrapping of other rendered artifacts whose path matches `globs`
#[derive(Debug, Clone, PartialEq)]
pub struct Injection {
    pub globs: Vec<String>,
    pub mode: InjectionMode,
}

impl Injection {
    pub fn wrap(&self, wrapper: &str, content: &str) -> String {
        match self.mode {
            InjectionMode::Prepend => format!("{}\n{}", wrapper, content),
            InjectionMode::Append => format!("{}\n{}", content, wrapper),
            InjectionMode::Both => format!("{}\n{}\n{}", wrapper, content, wrapper),
        }
    }
}

/// Output of rendering a fragment's content for a set of locals
#[derive(Debug, Clone, PartialEq)]
pub struct ContentResult {
    pub content: String,
    /// `false` when `content` is already a rendered diagnostic
    pub interpolate: bool,
    pub locals: Locals,
}

impl ContentResult {
    pub fn new(content: impl Into<String>, locals: Locals) -> Self {
        Self {
            content: content.into(),
            interpolate: true,
            locals,
        }
    }
}

/// Replaces the default validation diagnostic: `(message, source, failure)`
pub type ValidationErrorHandler = dyn Fn(&str, &str, &ValidationFailure) -> Option<String> + Send + Sync;

/// Problems found while defining a partial that do not prevent its construction
#[derive(Debug, Clone, PartialEq)]
pub struct PartialIssue {
    pub identity: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct PartialOptions {
    pub inject_globs: Vec<String>,
    pub prepend: bool,
    pub append: bool,
}

#[derive(Debug, Clone)]
pub struct PartialFragment {
    identity: String,
    source: String,
    validator: Option<Arc<dyn LocalsValidator>>,
    injection: Option<Injection>,
}

/// Build a fragment. A schema that fails to compile is reported through
/// `register_issue` and the fragment is created without validation.
pub fn define_partial(
    identity: &str,
    source: &str,
    schema: Option<JsonValue>,
    options: PartialOptions,
    register_issue: &mut dyn FnMut(PartialIssue),
) -> Result<PartialFragment> {
    let mut fragment = PartialFragment::new(identity, source)?;

    if let Some(schema) = schema {
        match JsonSchemaValidator::compile(schema) {
            Ok(validator) => fragment = fragment.with_validator(Arc::new(validator)),
            Err(message) => {
                let error = PartialError::SchemaCompile {
                    identity: identity.to_string(),
                    message,
                };
                warn!("{}", error);
                register_issue(PartialIssue {
                    identity: identity.to_string(),
                    message: error.to_string(),
                });
            }
        }
    }

    if !options.inject_globs.is_empty() {
        fragment = fragment.with_injection(Injection {
            globs: options.inject_globs,
            mode: InjectionMode::from_flags(options.prepend, options.append),
        });
    }

    Ok(fragment)
}

impl PartialFragment {
    pub fn new(identity: &str, source: &str) -> Result<Self> {
        if identity.trim().is_empty() {
            return Err(PartialError::EmptyIdentity);
        }
        if source.is_empty() {
            return Err(PartialError::EmptySource {
                identity: identity.to_string(),
            });
        }

        Ok(Self {
            identity: identity.to_string(),
            source: source.to_string(),
            validator: None,
            injection: None,
        })
    }

    pub fn with_validator(mut self, validator: Arc<dyn LocalsValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_injection(mut self, injection: Injection) -> Self {
        self.injection = Some(injection);
        self
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn injection(&self) -> Option<&Injection> {
        self.injection.as_ref()
    }

    pub fn has_validator(&self) -> bool {
        self.validator.is_some()
    }

    /// The record bound under the partial's local variable name while it renders
    pub fn record(&self) -> Value {
        let mut record = Locals::new();
        record.insert("identity".to_string(), Value::from(self.identity.as_str()));
        record.insert("source".to_string(), Value::from(self.source.as_str()));
        if let Some(injection) = &self.injection {
            let mut inject = Locals::new();
            inject.insert(
                "globs".to_string(),
                Value::Array(injection.globs.iter().map(|g| Value::from(g.as_str())).collect()),
            );
            inject.insert("mode".to_string(), Value::from(injection.mode.to_string()));
            record.insert("injection".to_string(), Value::Object(inject));
        }
        Value::Object(record)
    }

    /// Validate `locals` and return the source for interpolation, or a
    /// diagnostic with `interpolate: false` when validation rejects them.
    pub async fn content(
        &self,
        locals: Locals,
        on_error: Option<&ValidationErrorHandler>,
    ) -> ContentResult {
        let Some(validator) = &self.validator else {
            return ContentResult::new(self.source.clone(), locals);
        };

        let json = Value::locals_to_json(&locals);
        match validator.validate(&json).await {
            Ok(()) => ContentResult::new(self.source.clone(), locals),
            Err(failure) => {
                let message = self.default_validation_message(validator.as_ref(), &failure);
                warn!("Partial '{}' rejected its locals: {}", self.identity, failure);
                let content = on_error
                    .and_then(|handler| handler(&message, &self.source, &failure))
                    .unwrap_or(message);
                ContentResult {
                    content,
                    interpolate: false,
                    locals,
                }
            }
        }
    }

    fn default_validation_message(
        &self,
        validator: &dyn LocalsValidator,
        failure: &ValidationFailure,
    ) -> String {
        let expected = validator
            .schema()
            .map(|schema| format!("\nPartial '{}' expected arguments {}", self.identity, schema))
            .unwrap_or_default();
        format!(
            "Invalid arguments passed to partial '{}': {}{}",
            self.identity, failure.message, expected
        )
    }
}
