// ABOUTME: Error types for template compilation and rendering
// ABOUTME: Separates synchronous compile failures from runtime render failures

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("Invalid identifier '{name}' used as a {role} binding")]
    InvalidIdentifier { name: String, role: &'static str },

    #[error("Local '{name}' collides with the context binding name")]
    ContextCollision { name: String },

    #[error("Unterminated expression starting at offset {offset}")]
    UnterminatedExpression { offset: usize },

    #[error("Empty expression at offset {offset}")]
    EmptyExpression { offset: usize },

    #[error("Syntax error in expression '{expression}': {message}")]
    SyntaxError { expression: String, message: String },

    #[error("Expression '{expression}' is not allowed in restricted templates: {reason}")]
    Disallowed { expression: String, reason: String },

    #[error("Unknown identifier '{name}' in restricted template")]
    UnknownIdentifier { name: String },

    #[error("Template render error: {0}")]
    RenderError(String),

    #[error("Partial '{name}' failed: {message}")]
    PartialFailed { name: String, message: String },
}

impl TemplateError {
    /// Compile errors are raised before any rendering happens
    pub fn is_compile_error(&self) -> bool {
        !matches!(
            self,
            TemplateError::RenderError(_) | TemplateError::PartialFailed { .. }
        )
    }

    pub fn render(message: impl Into<String>) -> Self {
        TemplateError::RenderError(message.into())
    }
}

pub type Result<T> = std::result::Result<T, TemplateError>;
