// ABOUTME: Compiled renderer cache keyed by template text, local-name signature and binding names
// ABOUTME: Shared across concurrent renders; redundant first compiles of one key are idempotent

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::error::Result;
use super::renderer::CompiledRenderer;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    template: String,
    locals_signature: String,
    context_name: String,
    exec_fn_name: String,
}

impl CacheKey {
    /// Local names are sorted, so call-site ordering never changes the key
    pub fn new(template: &str, local_names: &[String], context_name: &str, exec_fn_name: &str) -> Self {
        let mut sorted: Vec<&str> = local_names.iter().map(String::as_str).collect();
        sorted.sort_unstable();

        Self {
            template: template.to_string(),
            locals_signature: sorted.join(","),
            context_name: context_name.to_string(),
            exec_fn_name: exec_fn_name.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug, Default)]
pub struct TemplateCache {
    enabled: bool,
    entries: RwLock<HashMap<CacheKey, Arc<dyn CompiledRenderer>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TemplateCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Return the cached renderer for `key`, compiling on a miss.
    /// Failed compiles are never cached.
    pub async fn get_or_compile<F>(&self, key: CacheKey, compile: F) -> Result<Arc<dyn CompiledRenderer>>
    where
        F: FnOnce() -> Result<Arc<dyn CompiledRenderer>> + Send,
    {
        if !self.enabled {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return compile();
        }

        let cached = self.entries.read().await.get(&key).cloned();
        if let Some(renderer) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Template cache hit ({} locals)", key.locals_signature);
            return Ok(renderer);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let compiled = compile()?;
        let mut entries = self.entries.write().await;
        // A concurrent compile of the same key may have landed first; keep that one.
        let renderer = entries.entry(key).or_insert(compiled).clone();
        Ok(renderer)
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.read().await.len(),
        }
    }
}
