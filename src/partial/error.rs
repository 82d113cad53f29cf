// ABOUTME: Error types for partial definition, registration and declaration loading
// ABOUTME: Validation failures are not errors here; they render as diagnostic content

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PartialError {
    #[error("Partial identity must not be empty")]
    EmptyIdentity,

    #[error("Partial '{identity}' has an empty source")]
    EmptySource { identity: String },

    #[error("Partial '{identity}' already exists")]
    AlreadyExists { identity: String },

    #[error("Invalid locals schema for partial '{identity}': {message}")]
    SchemaCompile { identity: String, message: String },

    #[error("Failed to read partial declarations: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse partial declarations: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, PartialError>;
