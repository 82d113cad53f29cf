// ABOUTME: Expression template compiler for the interpolation engine
// ABOUTME: Scans ${...} spans, compiles trusted or restricted renderers and caches them

pub mod cache;
pub mod error;
pub mod eval;
pub mod expr;
pub mod renderer;
pub mod restricted;
pub mod scanner;
pub mod trusted;
pub mod value;

pub use cache::{CacheKey, CacheStats, TemplateCache};
pub use error::{Result, TemplateError};
pub use expr::{parse_expression, Expr};
pub use renderer::{
    is_valid_identifier, validate_bindings, CompileOptions, CompiledRenderer, NoPartials,
    PartialInvoker, TemplateDialect,
};
pub use restricted::RestrictedDialect;
pub use scanner::{scan, Segment};
pub use trusted::TrustedDialect;
pub use value::{locals_from_json, Builtin, Locals, Value};
