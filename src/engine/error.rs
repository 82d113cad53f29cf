// ABOUTME: Error types for interpolation engine operations
// ABOUTME: Wraps template compile/render failures and partial registry failures

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Template error: {0}")]
    Template(#[from] crate::template::TemplateError),

    #[error("Partial error: {0}")]
    Partial(#[from] crate::partial::PartialError),
}

impl EngineError {
    pub fn is_compile_error(&self) -> bool {
        matches!(self, EngineError::Template(e) if e.is_compile_error())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
