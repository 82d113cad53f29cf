// ABOUTME: Captured adapter over executed output and the run-scoped history of captures
// ABOUTME: History is shared by clones and exposed to templates as an object of captures

use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::sync::{Arc, RwLock};
use tracing::debug;

use super::error::Result;
use crate::template::{Locals, Value};

/// Text produced by an executed operation, readable as text or parsed JSON
#[derive(Debug, Clone, PartialEq)]
pub struct Captured {
    text: Arc<str>,
}

impl Captured {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Arc::from(text.into()),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn json(&self) -> Result<JsonValue> {
        Ok(serde_json::from_str(&self.text)?)
    }
}

/// Memory-key captures for one run; writes to the same key are last-write-wins
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Arc<RwLock<IndexMap<String, Captured>>>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, captured: Captured) {
        let key = key.into();
        debug!("Captured {} bytes into history '{}'", captured.text().len(), key);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key, captured);
    }

    pub fn get(&self, key: &str) -> Option<Captured> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current captures as a template value keyed by memory key
    pub fn snapshot(&self) -> Value {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let object: Locals = entries
            .iter()
            .map(|(key, captured)| (key.clone(), Value::Captured(captured.clone())))
            .collect();
        Value::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_captured_text_and_json() {
        let captured = Captured::new("{\"rows\": [1, 2]}");
        assert_eq!(captured.text(), "{\"rows\": [1, 2]}");
        assert_eq!(captured.json().unwrap(), json!({"rows": [1, 2]}));
        assert!(Captured::new("not json").json().is_err());
    }

    #[test]
    fn test_history_overwrites_by_key_and_shares_clones() {
        let history = History::new();
        let view = history.clone();

        history.insert("step1", Captured::new("first"));
        history.insert("step1", Captured::new("second"));
        history.insert("step2", Captured::new("other"));

        assert_eq!(view.get("step1").unwrap().text(), "second");
        assert_eq!(view.keys(), vec!["step1".to_string(), "step2".to_string()]);
        assert_eq!(view.len(), 2);
    }

    #[test]
    fn test_snapshot_exposes_captured_values() {
        let history = History::new();
        history.insert("step1", Captured::new("out"));

        let snapshot = history.snapshot();
        assert_eq!(
            snapshot.get_member("step1"),
            Some(Value::Captured(Captured::new("out")))
        );
    }
}
