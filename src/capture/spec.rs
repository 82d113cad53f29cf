// ABOUTME: Capture destinations: a relative file path or an in-memory history key
// ABOUTME: Parses the external string form where a leading "./" selects a file

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "nature", rename_all = "lowercase")]
pub enum CaptureSpec {
    Path {
        path: PathBuf,
        #[serde(default)]
        gitignore: bool,
    },
    Memory {
        key: String,
    },
}

impl CaptureSpec {
    pub fn parse(spec: &str, gitignore: bool) -> Self {
        if spec.starts_with("./") {
            CaptureSpec::Path {
                path: PathBuf::from(spec),
                gitignore,
            }
        } else {
            CaptureSpec::Memory {
                key: spec.to_string(),
            }
        }
    }

    pub fn memory(key: impl Into<String>) -> Self {
        CaptureSpec::Memory { key: key.into() }
    }
}

impl fmt::Display for CaptureSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureSpec::Path { path, .. } => write!(f, "{}", path.display()),
            CaptureSpec::Memory { key } => write!(f, "memory:{}", key),
        }
    }
}
