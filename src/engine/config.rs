// ABOUTME: Interpolation engine configuration and the binding names used inside templates
// ABOUTME: Serde defaults mirror the names templates rely on when nothing is configured

use serde::{Deserialize, Serialize};

use super::context::PrimeContext;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Identifier the shared context is bound under
    pub context_name: String,
    /// Maximum nested partial expansions before a diagnostic is rendered
    pub recursion_limit: usize,
    pub cache_enabled: bool,
    pub exec_fn_name: String,
    pub local_var_name: String,
    pub self_ref_key_name: String,
    pub json_fn_name: String,
    pub captured_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            context_name: "ctx".to_string(),
            recursion_limit: 9,
            cache_enabled: true,
            exec_fn_name: "partial".to_string(),
            local_var_name: "PARTIAL".to_string(),
            self_ref_key_name: "SELF".to_string(),
            json_fn_name: "json".to_string(),
            captured_name: "captured".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn naming(&self) -> Naming {
        Naming {
            exec_fn_name: self.exec_fn_name.clone(),
            local_var_name: self.local_var_name.clone(),
            self_ref_key_name: self.self_ref_key_name.clone(),
            json_fn_name: self.json_fn_name.clone(),
        }
    }
}

/// Names of the engine-provided locals for one interpolation chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Naming {
    pub exec_fn_name: String,
    pub local_var_name: String,
    pub self_ref_key_name: String,
    pub json_fn_name: String,
}

impl Naming {
    pub fn with_overrides(mut self, prime: &PrimeContext) -> Self {
        if let Some(name) = &prime.exec_fn_name {
            self.exec_fn_name = name.clone();
        }
        if let Some(name) = &prime.local_var_name {
            self.local_var_name = name.clone();
        }
        if let Some(name) = &prime.self_ref_key_name {
            self.self_ref_key_name = name.clone();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.context_name, "ctx");
        assert_eq!(config.recursion_limit, 9);
        assert!(config.cache_enabled);
        assert_eq!(config.naming().local_var_name, "PARTIAL");
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: EngineConfig = serde_yaml::from_str("recursion_limit: 2\n").unwrap();
        assert_eq!(config.recursion_limit, 2);
        assert_eq!(config.exec_fn_name, "partial");
    }

    #[test]
    fn test_naming_overrides() {
        let mut prime = PrimeContext::new("x");
        prime.exec_fn_name = Some("include".to_string());
        let naming = EngineConfig::default().naming().with_overrides(&prime);
        assert_eq!(naming.exec_fn_name, "include");
        assert_eq!(naming.self_ref_key_name, "SELF");
    }
}
