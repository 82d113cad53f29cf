// ABOUTME: Interpolation engine module for spry-weave
// ABOUTME: Orchestrates rendering, context binding and recursive partial expansion

pub mod config;
pub mod context;
pub mod error;
pub mod interpolator;
mod invocation;
pub mod recursion;
pub mod result;

pub use config::{EngineConfig, Naming};
pub use context::PrimeContext;
pub use error::{EngineError, Result};
pub use interpolator::Interpolator;
pub use recursion::{RecursionFrame, RecursionStack};
pub use result::{InterpolationResult, InterpolationStatus};
