// ABOUTME: Configuration management for spry-weave application
// ABOUTME: Handles loading and merging configuration from files and environment variables

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::EngineConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub template_vars: IndexMap<String, String>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file path or default locations
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => Self::find_config_file(),
        };

        let mut config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config {}", config_path.display()))?;
            serde_yaml::from_str(&contents)
                .with_context(|| format!("Invalid config {}", config_path.display()))?
        } else {
            Config::default()
        };

        config.merge_env()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> PathBuf {
        let possible_paths = [
            PathBuf::from("spry-weave.yaml"),
            PathBuf::from("spry-weave.yml"),
            PathBuf::from(".spry-weave.yaml"),
            PathBuf::from(".spry-weave.yml"),
        ];

        for path in possible_paths {
            if path.exists() {
                return path;
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(".spry-weave").join("config.yaml");
            if home_config.exists() {
                return home_config;
            }
        }

        // Default path (may not exist)
        PathBuf::from("spry-weave.yaml")
    }

    /// Merge environment variables into configuration
    fn merge_env(&mut self) -> Result<()> {
        if let Ok(level) = std::env::var("SPRY_WEAVE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("SPRY_WEAVE_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Ok(limit) = std::env::var("SPRY_WEAVE_RECURSION_LIMIT") {
            self.engine.recursion_limit = limit
                .parse()
                .with_context(|| format!("Invalid SPRY_WEAVE_RECURSION_LIMIT '{}'", limit))?;
        }
        if let Ok(name) = std::env::var("SPRY_WEAVE_CONTEXT_NAME") {
            self.engine.context_name = name;
        }
        if let Ok(value) = std::env::var("SPRY_WEAVE_NO_CACHE") {
            if !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false") {
                self.engine.cache_enabled = false;
            }
        }

        Ok(())
    }

    /// Merge additional variables into template variables
    pub fn merge_variables(&mut self, vars: IndexMap<String, String>) {
        self.template_vars.extend(vars);
    }
}
