// ABOUTME: Seams between template dialects, compiled renderers and partial expansion
// ABOUTME: Defines the dialect, renderer and partial-invoker traits plus binding-name validation

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use super::error::{Result, TemplateError};
use super::expr::{is_ident_continue, is_ident_start};
use super::value::Locals;

/// Naming used while compiling a template
#[derive(Debug, Clone, Copy)]
pub struct CompileOptions<'a> {
    pub context_name: &'a str,
    pub exec_fn_name: &'a str,
}

/// Expands `partial(name, locals)` calls encountered while rendering
#[async_trait]
pub trait PartialInvoker: Send + Sync {
    async fn invoke(&self, name: &str, locals: Locals) -> Result<String>;
}

/// Invoker for renders that have no partial registry attached
pub struct NoPartials;

#[async_trait]
impl PartialInvoker for NoPartials {
    async fn invoke(&self, name: &str, _locals: Locals) -> Result<String> {
        Ok(format!("/* partial '{}' not found (no partials registered) */", name))
    }
}

/// An executable form of one template, reusable across renders
#[async_trait]
pub trait CompiledRenderer: Send + Sync + fmt::Debug {
    /// Render against a scope holding the context binding and all locals
    async fn render(&self, scope: &Locals, invoker: &dyn PartialInvoker) -> Result<String>;

    fn has_expressions(&self) -> bool;
}

/// Turns template text into a compiled renderer
pub trait TemplateDialect: Send + Sync {
    fn name(&self) -> &'static str;

    fn compile(
        &self,
        template: &str,
        local_names: &[String],
        options: &CompileOptions<'_>,
    ) -> Result<Arc<dyn CompiledRenderer>>;
}

// Names that the expression grammar reads as literals, so a binding could never be referenced.
const LITERAL_KEYWORDS: &[&str] = &["true", "false", "null", "undefined"];

/// Check a binding name against `[A-Za-z_$][\w$]*`
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_ident_start(first) => {}
        _ => return false,
    }
    chars.all(is_ident_continue) && !LITERAL_KEYWORDS.contains(&name)
}

/// Validate the context binding and every local name before compiling
pub fn validate_bindings(local_names: &[String], context_name: &str) -> Result<()> {
    if !is_valid_identifier(context_name) {
        return Err(TemplateError::InvalidIdentifier {
            name: context_name.to_string(),
            role: "context",
        });
    }

    for name in local_names {
        if name == context_name {
            return Err(TemplateError::ContextCollision { name: name.clone() });
        }
        if !is_valid_identifier(name) {
            return Err(TemplateError::InvalidIdentifier {
                name: name.clone(),
                role: "local",
            });
        }
    }

    Ok(())
}
