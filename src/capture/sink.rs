// ABOUTME: Default capture handlers writing files under a root directory or storing into history
// ABOUTME: Async and blocking variants share one gitignore registrar and newline normalization

use async_trait::async_trait;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{CaptureError, Result};
use super::history::{Captured, History};
use super::spec::CaptureSpec;

/// Handles one capture spec for an executed operation
#[async_trait]
pub trait CaptureSink: Send + Sync {
    async fn on_capture(&self, spec: &CaptureSpec, captured: &Captured, history: &History) -> Result<()>;
}

pub trait BlockingCaptureSink: Send + Sync {
    fn on_capture_blocking(&self, spec: &CaptureSpec, captured: &Captured, history: &History) -> Result<()>;
}

/// Keeps captured artifacts out of version control
pub trait IgnoreRegistrar: Send + Sync {
    fn register(&self, root: &Path, relative: &Path) -> Result<()>;
}

/// Appends entries to `<root>/.gitignore`, skipping entries already present
#[derive(Debug, Clone, Copy, Default)]
pub struct GitignoreRegistrar;

impl IgnoreRegistrar for GitignoreRegistrar {
    fn register(&self, root: &Path, relative: &Path) -> Result<()> {
        let entry = ignore_entry(relative);
        let gitignore = root.join(".gitignore");
        let ignore_error = |e: std::io::Error| CaptureError::IgnoreError {
            path: entry.clone(),
            message: e.to_string(),
        };

        let existing = match fs::read_to_string(&gitignore) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(ignore_error(e)),
        };
        if existing.lines().any(|line| line.trim() == entry) {
            return Ok(());
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&gitignore)
            .map_err(ignore_error)?;
        let separator = if existing.is_empty() || existing.ends_with('\n') { "" } else { "\n" };
        writeln!(file, "{}{}", separator, entry).map_err(ignore_error)?;

        debug!("Registered '{}' in {}", entry, gitignore.display());
        Ok(())
    }
}

fn ignore_entry(relative: &Path) -> String {
    let text = relative.to_string_lossy().replace('\\', "/");
    text.strip_prefix("./").unwrap_or(&text).to_string()
}

/// Exactly one trailing `\n`; a `\r` before it is kept
pub fn with_trailing_newline(text: &str) -> String {
    let mut out = text.trim_end_matches('\n').to_string();
    out.push('\n');
    out
}

/// Writes path captures relative to `root`; memory captures go to history
#[derive(Clone)]
pub struct FsCaptureSink {
    root: PathBuf,
    registrar: Arc<dyn IgnoreRegistrar>,
}

impl FsCaptureSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_registrar(root, Arc::new(GitignoreRegistrar))
    }

    pub fn with_registrar(root: impl Into<PathBuf>, registrar: Arc<dyn IgnoreRegistrar>) -> Self {
        Self {
            root: root.into(),
            registrar,
        }
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        if path.is_absolute() {
            return Err(CaptureError::AbsolutePath {
                path: path.display().to_string(),
            });
        }
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(CaptureError::OutsideRoot {
                path: path.display().to_string(),
            });
        }
        Ok(self.root.join(path))
    }
}

fn write_error(path: &Path, e: std::io::Error) -> CaptureError {
    CaptureError::WriteError {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

#[async_trait]
impl CaptureSink for FsCaptureSink {
    async fn on_capture(&self, spec: &CaptureSpec, captured: &Captured, history: &History) -> Result<()> {
        match spec {
            CaptureSpec::Memory { key } => {
                history.insert(key.clone(), captured.clone());
                Ok(())
            }
            CaptureSpec::Path { path, gitignore } => {
                let target = self.resolve(path)?;
                if let Some(parent) = target.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| write_error(parent, e))?;
                }
                let content = with_trailing_newline(captured.text());
                tokio::fs::write(&target, &content)
                    .await
                    .map_err(|e| write_error(&target, e))?;

                if *gitignore {
                    let registrar = Arc::clone(&self.registrar);
                    let root = self.root.clone();
                    let relative = path.clone();
                    tokio::task::spawn_blocking(move || registrar.register(&root, &relative))
                        .await
                        .map_err(|e| CaptureError::IgnoreError {
                            path: path.display().to_string(),
                            message: e.to_string(),
                        })??;
                }

                info!("Captured {} bytes to {}", content.len(), target.display());
                Ok(())
            }
        }
    }
}

impl BlockingCaptureSink for FsCaptureSink {
    fn on_capture_blocking(&self, spec: &CaptureSpec, captured: &Captured, history: &History) -> Result<()> {
        match spec {
            CaptureSpec::Memory { key } => {
                history.insert(key.clone(), captured.clone());
                Ok(())
            }
            CaptureSpec::Path { path, gitignore } => {
                let target = self.resolve(path)?;
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(|e| write_error(parent, e))?;
                }
                let content = with_trailing_newline(captured.text());
                fs::write(&target, &content).map_err(|e| write_error(&target, e))?;

                if *gitignore {
                    self.registrar.register(&self.root, path)?;
                }

                info!("Captured {} bytes to {}", content.len(), target.display());
                Ok(())
            }
        }
    }
}
