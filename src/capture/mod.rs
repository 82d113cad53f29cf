// ABOUTME: Capture module threading executed output into files and later interpolations
// ABOUTME: Re-exports capture specs, the captured adapter, history, sinks and factories

pub mod error;
pub mod factory;
pub mod history;
pub mod sink;
pub mod spec;

pub use error::{CaptureError, Result};
pub use factory::{
    stdout_captured, CaptureFactory, CaptureFactorySync, IsCapturable, Operation, PrepareCaptured,
};
pub use history::{Captured, History};
pub use sink::{
    with_trailing_newline, BlockingCaptureSink, CaptureSink, FsCaptureSink, GitignoreRegistrar,
    IgnoreRegistrar,
};
pub use spec::CaptureSpec;
