// ABOUTME: Main library module for the spry-weave interpolation engine
// ABOUTME: Exports all core modules and provides the public API

pub mod capture;
pub mod cli;
pub mod engine;
pub mod glob;
pub mod partial;
pub mod template;

// Re-export commonly used types
pub use capture::{CaptureFactory, CaptureFactorySync, CaptureSpec, Captured, History};
pub use cli::{App, Args, Config};
pub use engine::{
    EngineConfig, EngineError, InterpolationResult, InterpolationStatus, Interpolator,
    PrimeContext, RecursionStack,
};
pub use partial::{define_partial, DuplicatePolicy, PartialCollection, PartialFragment};
pub use template::{Locals, TemplateError, Value};

// Error handling
pub type Result<T> = anyhow::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
