// ABOUTME: Trusted template dialect compiling ${...} spans into evaluated expression segments
// ABOUTME: Assumes trusted authors; the expression grammar still only reaches whitelisted builtins

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::error::{Result, TemplateError};
use super::eval::Evaluator;
use super::expr::{parse_expression, Expr};
use super::renderer::{validate_bindings, CompileOptions, CompiledRenderer, PartialInvoker, TemplateDialect};
use super::scanner::{scan, Segment};
use super::value::Locals;

#[derive(Debug, Clone, Copy, Default)]
pub struct TrustedDialect;

#[derive(Debug)]
enum CompiledSegment {
    Literal(String),
    Expression { source: String, expr: Expr },
}

#[derive(Debug)]
pub struct TrustedTemplate {
    segments: Vec<CompiledSegment>,
}

impl TemplateDialect for TrustedDialect {
    fn name(&self) -> &'static str {
        "trusted"
    }

    fn compile(
        &self,
        template: &str,
        local_names: &[String],
        options: &CompileOptions<'_>,
    ) -> Result<Arc<dyn CompiledRenderer>> {
        validate_bindings(local_names, options.context_name)?;

        let segments = scan(template)?
            .into_iter()
            .map(|segment| match segment {
                Segment::Literal(text) => Ok(CompiledSegment::Literal(text)),
                Segment::Expression { source, .. } => {
                    let expr = parse_expression(&source)?;
                    Ok(CompiledSegment::Expression { source, expr })
                }
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Compiled trusted template ({} segments, {} locals)",
            segments.len(),
            local_names.len()
        );
        Ok(Arc::new(TrustedTemplate { segments }))
    }
}

#[async_trait]
impl CompiledRenderer for TrustedTemplate {
    async fn render(&self, scope: &Locals, invoker: &dyn PartialInvoker) -> Result<String> {
        let evaluator = Evaluator::new(scope, invoker);
        let mut out = String::new();

        for segment in &self.segments {
            match segment {
                CompiledSegment::Literal(text) => out.push_str(text),
                CompiledSegment::Expression { source, expr } => {
                    let value = evaluator.eval(expr).await.map_err(|e| match e {
                        TemplateError::RenderError(message) => {
                            TemplateError::RenderError(format!("{} in ${{{}}}", message, source))
                        }
                        other => other,
                    })?;
                    out.push_str(&value.to_text());
                }
            }
        }

        Ok(out)
    }

    fn has_expressions(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, CompiledSegment::Expression { .. }))
    }
}
