// ABOUTME: Outcome of a fail-closed interpolation request
// ABOUTME: Mutated and unmodified results carry text; failures carry the error and original source

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationStatus {
    Mutated,
    Unmodified,
    Failed,
}

impl fmt::Display for InterpolationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InterpolationStatus::Mutated => "mutated",
            InterpolationStatus::Unmodified => "unmodified",
            InterpolationStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum InterpolationResult {
    Mutated { source: String },
    Unmodified { source: String },
    Failed { error: EngineError, source: String },
}

impl InterpolationResult {
    /// Classify rendered output against the text it came from
    pub fn from_render(original: String, rendered: String) -> Self {
        if rendered == original {
            InterpolationResult::Unmodified { source: original }
        } else {
            InterpolationResult::Mutated { source: rendered }
        }
    }

    pub fn status(&self) -> InterpolationStatus {
        match self {
            InterpolationResult::Mutated { .. } => InterpolationStatus::Mutated,
            InterpolationResult::Unmodified { .. } => InterpolationStatus::Unmodified,
            InterpolationResult::Failed { .. } => InterpolationStatus::Failed,
        }
    }

    /// Rendered text, or the original source when unmodified or failed
    pub fn source(&self) -> &str {
        match self {
            InterpolationResult::Mutated { source }
            | InterpolationResult::Unmodified { source }
            | InterpolationResult::Failed { source, .. } => source,
        }
    }

    pub fn into_source(self) -> String {
        match self {
            InterpolationResult::Mutated { source }
            | InterpolationResult::Unmodified { source }
            | InterpolationResult::Failed { source, .. } => source,
        }
    }

    pub fn error(&self) -> Option<&EngineError> {
        match self {
            InterpolationResult::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, InterpolationResult::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateError;

    #[test]
    fn test_classification() {
        let unchanged = InterpolationResult::from_render("a".to_string(), "a".to_string());
        assert_eq!(unchanged.status(), InterpolationStatus::Unmodified);

        let changed = InterpolationResult::from_render("${x}".to_string(), "1".to_string());
        assert_eq!(changed.status(), InterpolationStatus::Mutated);
        assert_eq!(changed.source(), "1");
    }

    #[test]
    fn test_failed_keeps_source() {
        let failed = InterpolationResult::Failed {
            error: TemplateError::render("boom").into(),
            source: "${x}".to_string(),
        };
        assert!(failed.is_failed());
        assert_eq!(failed.status().to_string(), "failed");
        assert_eq!(failed.into_source(), "${x}");
    }
}
