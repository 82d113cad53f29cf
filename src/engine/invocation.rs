// ABOUTME: Partial invocation bound into a render: looks up fragments and expands them recursively
// ABOUTME: Missing partials and rejected locals render as diagnostics instead of failing the render

use async_trait::async_trait;
use tracing::debug;

use super::config::Naming;
use super::interpolator::Interpolator;
use super::recursion::RecursionStack;
use crate::template::{Builtin, Locals, PartialInvoker, Result, TemplateError, Value};

pub(crate) struct PartialCall<'e> {
    engine: &'e Interpolator,
    stack: RecursionStack,
    naming: Naming,
    purpose: Locals,
}

impl<'e> PartialCall<'e> {
    pub(crate) fn new(engine: &'e Interpolator, stack: RecursionStack, naming: Naming, purpose: Locals) -> Self {
        Self {
            engine,
            stack,
            naming,
            purpose,
        }
    }
}

#[async_trait]
impl PartialInvoker for PartialCall<'_> {
    async fn invoke(&self, name: &str, locals: Locals) -> Result<String> {
        let fragment = {
            let partials = self.engine.partials();
            let partials = partials.read().await;
            match partials.get(name) {
                Some(fragment) => fragment,
                None => {
                    debug!("Partial '{}' not found", name);
                    return Ok(partials.missing_diagnostic(name));
                }
            }
        };

        // Lowest priority first; later inserts win.
        let mut merged = Locals::new();
        merged.insert(self.naming.json_fn_name.clone(), Value::Builtin(Builtin::Json));
        merged.insert(self.naming.exec_fn_name.clone(), Value::Builtin(Builtin::Partial));
        merged.extend(self.purpose.clone());
        merged.extend(locals.clone());
        merged.insert(self.naming.local_var_name.clone(), fragment.record());
        merged.insert(self.naming.self_ref_key_name.clone(), Value::Object(locals));

        let content = fragment.content(merged, None).await;
        if !content.interpolate {
            return Ok(content.content);
        }

        let stack = self.stack.push(name, content.content.as_str());
        debug!("Expanding partial '{}' at depth {}", name, stack.len());
        self.engine
            .render_with(
                &content.content,
                content.locals,
                stack,
                self.naming.clone(),
                self.purpose.clone(),
            )
            .await
            .map_err(|e| TemplateError::PartialFailed {
                name: name.to_string(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::{EngineConfig, Interpolator, PrimeContext};
    use crate::partial::{define_partial, PartialCollection, PartialFragment, PartialOptions};
    use crate::template::Value;
    use serde_json::json;

    fn engine_with(fragments: Vec<PartialFragment>, limit: usize) -> Interpolator {
        let mut partials = PartialCollection::new();
        partials.register_all(fragments).unwrap();
        let config = EngineConfig {
            recursion_limit: limit,
            ..EngineConfig::default()
        };
        Interpolator::new(config, Value::Null, partials)
    }

    #[tokio::test]
    async fn test_partial_record_and_self_are_bound() {
        let fragment = PartialFragment::new("who", "${PARTIAL.identity}:${SELF.x}:${x}").unwrap();
        let engine = engine_with(vec![fragment], 9);

        let result = engine
            .interpolate_unsafely(PrimeContext::new("[${partial('who', {x: 1})}]"))
            .await;
        assert_eq!(result.source(), "[who:1:1]");
    }

    #[tokio::test]
    async fn test_missing_partial_is_inline_diagnostic() {
        let engine = engine_with(vec![PartialFragment::new("a", "x").unwrap()], 9);
        let result = engine
            .interpolate_unsafely(PrimeContext::new("${partial('b')}"))
            .await;
        assert_eq!(result.source(), "/* partial 'b' not found (available: 'a') */");
    }

    #[tokio::test]
    async fn test_validation_diagnostic_is_not_reinterpolated() {
        let fragment = define_partial(
            "strict",
            "${text}",
            Some(json!({"type": "object", "required": ["text"]})),
            PartialOptions::default(),
            &mut |_| {},
        )
        .unwrap();
        let engine = engine_with(vec![fragment], 9);

        let result = engine
            .interpolate_unsafely(PrimeContext::new("${partial('strict')}"))
            .await;
        assert!(!result.is_failed());
        assert!(result.source().starts_with("Invalid arguments passed to partial 'strict'"));
    }

    #[tokio::test]
    async fn test_nested_render_errors_name_the_partial() {
        let engine = engine_with(vec![PartialFragment::new("bad", "${missing}").unwrap()], 9);
        let result = engine
            .interpolate_unsafely(PrimeContext::new("${partial('bad')}"))
            .await;
        assert!(result.is_failed());
        assert!(result.error().unwrap().to_string().contains("Partial 'bad' failed"));
    }
}
