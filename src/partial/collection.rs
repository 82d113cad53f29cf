// ABOUTME: Registry of partial fragments keyed by identity with a derived glob injection index
// ABOUTME: Chooses the most specific injectable for a path and composes wrappers around content

use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::error::{PartialError, Result};
use super::fragment::{ContentResult, PartialFragment, ValidationErrorHandler};
use crate::glob::{best_match, GlobPattern};

/// What `register_with` does when the identity is already taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    #[default]
    Overwrite,
    Throw,
    Ignore,
}

#[derive(Debug, Clone)]
struct InjectableEntry {
    identity: String,
    pattern: GlobPattern,
}

/// The winning injectable for a path
#[derive(Debug, Clone)]
pub struct InjectionMatch {
    pub partial: Arc<PartialFragment>,
    pub glob: String,
    pub wildcard_weight: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PartialCollection {
    partials: IndexMap<String, Arc<PartialFragment>>,
    injectables: Vec<InjectableEntry>,
}

impl PartialCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register with the default duplicate policy (overwrite)
    pub fn register(&mut self, fragment: PartialFragment) -> Result<()> {
        self.register_with(fragment, |_| DuplicatePolicy::Overwrite)
    }

    /// Register, asking `on_duplicate` what to do when the identity exists
    pub fn register_with<F>(&mut self, fragment: PartialFragment, on_duplicate: F) -> Result<()>
    where
        F: FnOnce(&PartialFragment) -> DuplicatePolicy,
    {
        if let Some(existing) = self.partials.get(fragment.identity()) {
            match on_duplicate(existing) {
                DuplicatePolicy::Overwrite => {
                    debug!("Overwriting partial '{}'", fragment.identity());
                }
                DuplicatePolicy::Ignore => {
                    debug!("Ignoring duplicate partial '{}'", fragment.identity());
                    return Ok(());
                }
                DuplicatePolicy::Throw => {
                    return Err(PartialError::AlreadyExists {
                        identity: fragment.identity().to_string(),
                    })
                }
            }
        }

        // Overwrites keep the original registration slot.
        self.partials
            .insert(fragment.identity().to_string(), Arc::new(fragment));
        self.rebuild_index();
        Ok(())
    }

    pub fn register_all<I>(&mut self, fragments: I) -> Result<()>
    where
        I: IntoIterator<Item = PartialFragment>,
    {
        for fragment in fragments {
            self.register(fragment)?;
        }
        Ok(())
    }

    pub fn get(&self, identity: &str) -> Option<Arc<PartialFragment>> {
        self.partials.get(identity).cloned()
    }

    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.partials.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.partials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partials.is_empty()
    }

    /// Inline comment used when a template calls a partial that is not registered
    pub fn missing_diagnostic(&self, identity: &str) -> String {
        let available = if self.partials.is_empty() {
            "no partials registered".to_string()
        } else {
            let names: Vec<String> = self.identities().map(|id| format!("'{}'", id)).collect();
            format!("available: {}", names.join(", "))
        };
        format!("/* partial '{}' not found ({}) */", identity, available)
    }

    fn rebuild_index(&mut self) {
        self.injectables.clear();
        for fragment in self.partials.values() {
            let Some(injection) = fragment.injection() else {
                continue;
            };
            for glob in &injection.globs {
                match GlobPattern::compile(glob) {
                    Ok(pattern) => self.injectables.push(InjectableEntry {
                        identity: fragment.identity().to_string(),
                        pattern,
                    }),
                    Err(e) => warn!("Skipping injection glob for '{}': {}", fragment.identity(), e),
                }
            }
        }
        debug!(
            "Rebuilt injection index: {} partials, {} globs",
            self.partials.len(),
            self.injectables.len()
        );
    }

    /// Most specific injectable whose glob matches `path`
    pub fn find_injectable_for_path(&self, path: &str) -> Option<InjectionMatch> {
        let candidates = self
            .injectables
            .iter()
            .map(|entry| (&entry.pattern, entry.identity.as_str()));

        let (pattern, identity) = best_match(path, candidates)?;
        let partial = self.get(identity)?;
        Some(InjectionMatch {
            partial,
            glob: pattern.pattern().to_string(),
            wildcard_weight: pattern.wildcard_weight(),
        })
    }

    /// Wrap `result` with the injectable chosen for `path`, if any.
    /// A wrapper that rejects the locals makes the whole result a diagnostic.
    pub async fn compose(
        &self,
        result: ContentResult,
        path: &str,
        on_error: Option<&ValidationErrorHandler>,
    ) -> ContentResult {
        match self.find_injectable_for_path(path) {
            Some(found) => found.compose(result, path, on_error).await,
            None => result,
        }
    }
}

impl InjectionMatch {
    /// Wrap `result` with this match's partial. Needs no access to the collection.
    pub async fn compose(
        &self,
        result: ContentResult,
        path: &str,
        on_error: Option<&ValidationErrorHandler>,
    ) -> ContentResult {
        let Some(injection) = self.partial.injection() else {
            return result;
        };

        debug!(
            "Injecting partial '{}' into '{}' via '{}' ({})",
            self.partial.identity(),
            path,
            self.glob,
            injection.mode
        );

        let wrapper = self.partial.content(result.locals.clone(), on_error).await;
        if !wrapper.interpolate {
            return ContentResult {
                content: wrapper.content,
                interpolate: false,
                locals: result.locals,
            };
        }

        ContentResult {
            content: injection.wrap(&wrapper.content, &result.content),
            interpolate: result.interpolate,
            locals: result.locals,
        }
    }
}
