// ABOUTME: Error types for capturing executed output into files and history
// ABOUTME: Capture failures propagate to callers instead of degrading to diagnostics

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capture path must be relative: {path}")]
    AbsolutePath { path: String },

    #[error("Capture path must stay inside the capture root: {path}")]
    OutsideRoot { path: String },

    #[error("Failed to write capture {path}: {message}")]
    WriteError { path: String, message: String },

    #[error("Failed to register ignore rule for {path}: {message}")]
    IgnoreError { path: String, message: String },

    #[error("Captured text is not valid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CaptureError>;
