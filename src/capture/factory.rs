// ABOUTME: Capture factories binding a capturability predicate, adapter builder, sink and history
// ABOUTME: The async factory awaits its sink; the sync factory drives a blocking sink

use std::sync::Arc;
use tracing::debug;

use super::error::Result;
use super::history::{Captured, History};
use super::sink::{BlockingCaptureSink, CaptureSink, FsCaptureSink};
use super::spec::CaptureSpec;

/// Result of running a task body through an external executor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Operation {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl Operation {
    pub fn from_stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::default()
        }
    }
}

/// Returns the destinations for an operation, or `None` when it is not captured
pub type IsCapturable<C, O> = Box<dyn Fn(&C, &O) -> Option<Vec<CaptureSpec>> + Send + Sync>;

pub type PrepareCaptured<C, O> = Box<dyn Fn(&C, &O) -> Captured + Send + Sync>;

/// Adapter builder that captures an operation's stdout
pub fn stdout_captured<C: 'static>() -> PrepareCaptured<C, Operation> {
    Box::new(|_: &C, op: &Operation| Captured::new(op.stdout.clone()))
}

pub struct CaptureFactory<C, O> {
    is_capturable: IsCapturable<C, O>,
    prepare_captured: PrepareCaptured<C, O>,
    sink: Arc<dyn CaptureSink>,
    history: History,
}

impl<C, O> CaptureFactory<C, O> {
    pub fn new(
        is_capturable: IsCapturable<C, O>,
        prepare_captured: PrepareCaptured<C, O>,
        sink: Arc<dyn CaptureSink>,
    ) -> Self {
        Self {
            is_capturable,
            prepare_captured,
            sink,
            history: History::new(),
        }
    }

    /// Factory using the filesystem sink rooted at `root`
    pub fn with_root(
        is_capturable: IsCapturable<C, O>,
        prepare_captured: PrepareCaptured<C, O>,
        root: impl Into<std::path::PathBuf>,
    ) -> Self {
        Self::new(is_capturable, prepare_captured, Arc::new(FsCaptureSink::new(root)))
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Capture `op` to every destination the predicate names.
    /// Returns the specs handled; write failures propagate.
    pub async fn capture(&self, ctx: &C, op: &O) -> Result<Vec<CaptureSpec>> {
        let Some(specs) = (self.is_capturable)(ctx, op) else {
            return Ok(Vec::new());
        };
        if specs.is_empty() {
            return Ok(specs);
        }

        let captured = (self.prepare_captured)(ctx, op);
        for spec in &specs {
            debug!("Capturing to {}", spec);
            self.sink.on_capture(spec, &captured, &self.history).await?;
        }
        Ok(specs)
    }
}

pub struct CaptureFactorySync<C, O> {
    is_capturable: IsCapturable<C, O>,
    prepare_captured: PrepareCaptured<C, O>,
    sink: Arc<dyn BlockingCaptureSink>,
    history: History,
}

impl<C, O> CaptureFactorySync<C, O> {
    pub fn new(
        is_capturable: IsCapturable<C, O>,
        prepare_captured: PrepareCaptured<C, O>,
        sink: Arc<dyn BlockingCaptureSink>,
    ) -> Self {
        Self {
            is_capturable,
            prepare_captured,
            sink,
            history: History::new(),
        }
    }

    pub fn with_root(
        is_capturable: IsCapturable<C, O>,
        prepare_captured: PrepareCaptured<C, O>,
        root: impl Into<std::path::PathBuf>,
    ) -> Self {
        Self::new(is_capturable, prepare_captured, Arc::new(FsCaptureSink::new(root)))
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn capture(&self, ctx: &C, op: &O) -> Result<Vec<CaptureSpec>> {
        let Some(specs) = (self.is_capturable)(ctx, op) else {
            return Ok(Vec::new());
        };
        if specs.is_empty() {
            return Ok(specs);
        }

        let captured = (self.prepare_captured)(ctx, op);
        for spec in &specs {
            debug!("Capturing to {}", spec);
            self.sink.on_capture_blocking(spec, &captured, &self.history)?;
        }
        Ok(specs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Task {
        capture: Option<&'static str>,
    }

    fn predicate() -> IsCapturable<Task, Operation> {
        Box::new(|task: &Task, _: &Operation| task.capture.map(|c| vec![CaptureSpec::parse(c, false)]))
    }

    #[tokio::test]
    async fn test_capture_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let factory = CaptureFactory::with_root(predicate(), stdout_captured(), dir.path());

        let specs = factory
            .capture(&Task { capture: Some("step1") }, &Operation::from_stdout("42"))
            .await
            .unwrap();
        assert_eq!(specs, vec![CaptureSpec::memory("step1")]);
        assert_eq!(factory.history().get("step1").unwrap().text(), "42");
    }

    #[tokio::test]
    async fn test_not_capturable_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let factory = CaptureFactory::with_root(predicate(), stdout_captured(), dir.path());

        let specs = factory
            .capture(&Task { capture: None }, &Operation::from_stdout("42"))
            .await
            .unwrap();
        assert!(specs.is_empty());
        assert!(factory.history().is_empty());
    }

    #[test]
    fn test_sync_capture_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let factory = CaptureFactorySync::with_root(predicate(), stdout_captured(), dir.path());

        factory
            .capture(&Task { capture: Some("./out/r.txt") }, &Operation::from_stdout("rows"))
            .unwrap();
        let written = std::fs::read_to_string(dir.path().join("out/r.txt")).unwrap();
        assert_eq!(written, "rows\n");
    }
}
