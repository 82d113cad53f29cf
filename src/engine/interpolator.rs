// ABOUTME: Interpolation engine binding a dialect, shared context, partial registry and renderer cache
// ABOUTME: Renders templates under a recursion guard and offers a fail-closed interpolation entry

use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::config::{EngineConfig, Naming};
use super::context::PrimeContext;
use super::error::Result;
use super::invocation::PartialCall;
use super::recursion::RecursionStack;
use super::result::InterpolationResult;
use crate::capture::History;
use crate::partial::{
    ContentResult, DuplicatePolicy, PartialCollection, PartialFragment, ValidationErrorHandler,
};
use crate::template::{
    Builtin, CacheKey, CacheStats, CompileOptions, CompiledRenderer, Locals, RestrictedDialect,
    TemplateCache, TemplateDialect, TrustedDialect, Value,
};

/// One interpolation engine instance. Clones share the registry, cache and history.
#[derive(Clone)]
pub struct Interpolator {
    config: Arc<EngineConfig>,
    context: Arc<Value>,
    dialect: Arc<dyn TemplateDialect>,
    partials: Arc<RwLock<PartialCollection>>,
    cache: Arc<TemplateCache>,
    history: Option<History>,
}

impl Interpolator {
    /// Trusted engine evaluating full expressions
    pub fn new(config: EngineConfig, context: Value, partials: PartialCollection) -> Self {
        Self::with_dialect(config, context, partials, Arc::new(TrustedDialect))
    }

    /// Engine limited to lookups and partial calls
    pub fn restricted(config: EngineConfig, context: Value, partials: PartialCollection) -> Self {
        Self::with_dialect(config, context, partials, Arc::new(RestrictedDialect))
    }

    pub fn with_dialect(
        config: EngineConfig,
        context: Value,
        partials: PartialCollection,
        dialect: Arc<dyn TemplateDialect>,
    ) -> Self {
        let cache = Arc::new(TemplateCache::new(config.cache_enabled));
        debug!(
            "Created {} interpolator (context '{}', recursion limit {}, cache {})",
            dialect.name(),
            config.context_name,
            config.recursion_limit,
            if config.cache_enabled { "on" } else { "off" }
        );
        Self {
            config: Arc::new(config),
            context: Arc::new(context),
            dialect,
            partials: Arc::new(RwLock::new(partials)),
            cache,
            history: None,
        }
    }

    /// Expose `history` to every template under the configured captured name
    pub fn with_history(mut self, history: History) -> Self {
        self.history = Some(history);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn dialect_name(&self) -> &'static str {
        self.dialect.name()
    }

    pub fn history(&self) -> Option<&History> {
        self.history.as_ref()
    }

    pub fn partials(&self) -> Arc<RwLock<PartialCollection>> {
        Arc::clone(&self.partials)
    }

    pub async fn register_partial(&self, fragment: PartialFragment) -> Result<()> {
        self.partials.write().await.register(fragment)?;
        Ok(())
    }

    pub async fn register_partial_with<F>(&self, fragment: PartialFragment, on_duplicate: F) -> Result<()>
    where
        F: FnOnce(&PartialFragment) -> DuplicatePolicy,
    {
        self.partials.write().await.register_with(fragment, on_duplicate)?;
        Ok(())
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Compile `template` for the given local names, reusing a cached renderer
    pub async fn compile(&self, template: &str, local_names: &[String]) -> Result<Arc<dyn CompiledRenderer>> {
        self.compile_with(template, local_names, &self.config.exec_fn_name).await
    }

    async fn compile_with(
        &self,
        template: &str,
        local_names: &[String],
        exec_fn_name: &str,
    ) -> Result<Arc<dyn CompiledRenderer>> {
        let key = CacheKey::new(template, local_names, &self.config.context_name, exec_fn_name);
        let options = CompileOptions {
            context_name: &self.config.context_name,
            exec_fn_name,
        };
        let dialect = &self.dialect;
        let renderer = self
            .cache
            .get_or_compile(key, || dialect.compile(template, local_names, &options))
            .await?;
        Ok(renderer)
    }

    /// Render `template` with `locals` and the bound context.
    /// `stack` is the chain of partial expansions leading here, if any.
    #[instrument(skip(self, template, locals, stack), fields(dialect = self.dialect.name()))]
    pub async fn interpolate(
        &self,
        template: &str,
        locals: Locals,
        stack: Option<RecursionStack>,
    ) -> Result<String> {
        let naming = self.config.naming();
        self.render_with(template, locals, stack.unwrap_or_default(), naming, Locals::new())
            .await
    }

    /// Render a prime context without ever returning an error.
    pub async fn interpolate_unsafely(&self, prime: PrimeContext) -> InterpolationResult {
        if !prime.interpolate {
            return InterpolationResult::Unmodified {
                source: prime.source,
            };
        }

        let naming = self.config.naming().with_overrides(&prime);
        let purpose = prime.context.clone();

        let mut locals = purpose.clone();
        locals.insert(naming.json_fn_name.clone(), Value::Builtin(Builtin::Json));
        locals.insert(naming.self_ref_key_name.clone(), prime.self_value());
        locals.insert(naming.exec_fn_name.clone(), Value::Builtin(Builtin::Partial));

        match self
            .render_with(&prime.source, locals, RecursionStack::new(), naming, purpose)
            .await
        {
            Ok(rendered) => InterpolationResult::from_render(prime.source, rendered),
            Err(error) => {
                warn!("Interpolation failed: {}", error);
                InterpolationResult::Failed {
                    error,
                    source: prime.source,
                }
            }
        }
    }

    /// Wrap a rendered body with the most specific injectable partial for `path`
    pub async fn compose_for_path(
        &self,
        result: ContentResult,
        path: &str,
        on_error: Option<&ValidationErrorHandler>,
    ) -> ContentResult {
        let found = self.partials.read().await.find_injectable_for_path(path);
        match found {
            Some(found) => found.compose(result, path, on_error).await,
            None => result,
        }
    }

    pub(crate) fn render_with<'a>(
        &'a self,
        template: &'a str,
        locals: Locals,
        stack: RecursionStack,
        naming: Naming,
        purpose: Locals,
    ) -> BoxFuture<'a, Result<String>> {
        async move {
            if stack.len() > self.config.recursion_limit {
                warn!(
                    "Recursion limit {} exceeded: {}",
                    self.config.recursion_limit,
                    stack.chain()
                );
                return Ok(stack.limit_diagnostic(self.config.recursion_limit));
            }

            let locals = self.with_captured(locals);
            let local_names: Vec<String> = locals.keys().cloned().collect();
            let renderer = self
                .compile_with(template, &local_names, &naming.exec_fn_name)
                .await?;

            let mut scope = locals;
            scope.insert(self.config.context_name.clone(), self.context.as_ref().clone());

            let invoker = PartialCall::new(self, stack, naming, purpose);
            Ok(renderer.render(&scope, &invoker).await?)
        }
        .boxed()
    }

    // History sits below every caller-supplied local.
    fn with_captured(&self, locals: Locals) -> Locals {
        let Some(history) = &self.history else {
            return locals;
        };
        let name = &self.config.captured_name;
        if locals.contains_key(name) || *name == self.config.context_name {
            return locals;
        }
        let mut merged = Locals::with_capacity(locals.len() + 1);
        merged.insert(name.clone(), history.snapshot());
        merged.extend(locals);
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Captured;
    use crate::engine::result::InterpolationStatus;
    use serde_json::json;

    fn engine() -> Interpolator {
        Interpolator::new(
            EngineConfig::default(),
            Value::from_json(json!({"app": "Spry"})),
            PartialCollection::new(),
        )
    }

    #[tokio::test]
    async fn test_interpolate_with_context_and_locals() {
        let mut locals = Locals::new();
        locals.insert("n".to_string(), Value::from(2i64));
        let out = engine()
            .interpolate("${ctx.app} x${n * 3}", locals, None)
            .await
            .unwrap();
        assert_eq!(out, "Spry x6");
    }

    #[tokio::test]
    async fn test_unsafely_statuses() {
        let engine = engine();

        let result = engine.interpolate_unsafely(PrimeContext::new("plain text")).await;
        assert_eq!(result.status(), InterpolationStatus::Unmodified);

        let result = engine
            .interpolate_unsafely(PrimeContext::new("${ctx.app}").without_interpolation())
            .await;
        assert_eq!(result.status(), InterpolationStatus::Unmodified);
        assert_eq!(result.source(), "${ctx.app}");

        let result = engine.interpolate_unsafely(PrimeContext::new("${ctx.app}")).await;
        assert_eq!(result.status(), InterpolationStatus::Mutated);
        assert_eq!(result.source(), "Spry");

        let result = engine.interpolate_unsafely(PrimeContext::new("${nope}")).await;
        assert_eq!(result.status(), InterpolationStatus::Failed);
        assert_eq!(result.source(), "${nope}");
    }

    #[tokio::test]
    async fn test_self_and_json_helpers_are_bound() {
        let prime = PrimeContext::new("${SELF.task} ${json(SELF.task)}").with_local("task", "build");
        let result = engine().interpolate_unsafely(prime).await;
        assert_eq!(result.source(), r#"build "build""#);
    }

    #[tokio::test]
    async fn test_history_is_exposed_as_captured() {
        let history = History::new();
        history.insert("step1", Captured::new("hello"));
        let engine = engine().with_history(history.clone());

        let out = engine
            .interpolate("${captured.step1.text()}", Locals::new(), None)
            .await
            .unwrap();
        assert_eq!(out, "hello");

        history.insert("step1", Captured::new("again"));
        let out = engine
            .interpolate("${captured['step1'].text()}", Locals::new(), None)
            .await
            .unwrap();
        assert_eq!(out, "again");
    }

    #[tokio::test]
    async fn test_compile_errors_surface_from_interpolate() {
        let err = engine().interpolate("${a +}", Locals::new(), None).await.unwrap_err();
        assert!(err.is_compile_error());
    }
}
