// ABOUTME: Partial fragment module: reusable named template text with validation and injection
// ABOUTME: Re-exports fragment definition, the collection registry and declaration loading

pub mod collection;
pub mod declaration;
pub mod error;
pub mod fragment;
pub mod schema;

pub use collection::{DuplicatePolicy, InjectionMatch, PartialCollection};
pub use declaration::{load_declarations, parse_declarations, PartialDeclaration};
pub use error::{PartialError, Result};
pub use fragment::{
    define_partial, ContentResult, Injection, InjectionMode, PartialFragment, PartialIssue,
    PartialOptions, ValidationErrorHandler,
};
pub use schema::{JsonSchemaValidator, LocalsValidator, ValidationFailure};
