// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Provides temp environments, partial declaration builders and engine constructors

#![allow(dead_code)]

use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::fs;

use spry_weave::engine::{EngineConfig, Interpolator};
use spry_weave::partial::{define_partial, PartialCollection, PartialFragment, PartialOptions};
use spry_weave::template::{Locals, Value};

pub struct TestPartial {
    pub identity: String,
    pub source: String,
    pub schema: Option<JsonValue>,
    pub inject: Vec<String>,
    pub prepend: bool,
    pub append: bool,
}

impl TestPartial {
    pub fn new(identity: &str, source: &str) -> Self {
        Self {
            identity: identity.to_string(),
            source: source.to_string(),
            schema: None,
            inject: Vec::new(),
            prepend: false,
            append: false,
        }
    }

    pub fn with_schema(mut self, schema: JsonValue) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn injected_into(mut self, glob: &str) -> Self {
        self.inject.push(glob.to_string());
        self
    }

    pub fn appended(mut self) -> Self {
        self.append = true;
        self
    }

    pub fn on_both_sides(mut self) -> Self {
        self.prepend = true;
        self.append = true;
        self
    }

    pub fn build(&self) -> PartialFragment {
        define_partial(
            &self.identity,
            &self.source,
            self.schema.clone(),
            PartialOptions {
                inject_globs: self.inject.clone(),
                prepend: self.prepend,
                append: self.append,
            },
            &mut |issue| panic!("unexpected partial issue: {:?}", issue),
        )
        .expect("Failed to define partial")
    }
}

pub struct DeclarationsBuilder {
    partials: Vec<TestPartial>,
}

impl DeclarationsBuilder {
    pub fn new() -> Self {
        Self {
            partials: Vec::new(),
        }
    }

    pub fn with_partial(mut self, partial: TestPartial) -> Self {
        self.partials.push(partial);
        self
    }

    pub fn generate_yaml(&self) -> String {
        let mut yaml = String::from("partials:\n");
        for partial in &self.partials {
            yaml.push_str(&format!("  - identity: {}\n", partial.identity));
            yaml.push_str(&format!("    source: {}\n", JsonValue::String(partial.source.clone())));
            if let Some(schema) = &partial.schema {
                yaml.push_str(&format!("    schema: {}\n", schema));
            }
            if !partial.inject.is_empty() {
                let globs: Vec<String> = partial
                    .inject
                    .iter()
                    .map(|g| JsonValue::String(g.clone()).to_string())
                    .collect();
                yaml.push_str(&format!("    inject: [{}]\n", globs.join(", ")));
            }
            if partial.prepend {
                yaml.push_str("    prepend: true\n");
            }
            if partial.append {
                yaml.push_str("    append: true\n");
            }
        }
        yaml
    }

    pub async fn write_to_file(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        fs::write(path, self.generate_yaml()).await?;
        Ok(())
    }
}

pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub async fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path().join(name);
        fs::write(&path, content)
            .await
            .expect("Failed to write test file");
        path
    }

    pub async fn create_declarations_file(&self, name: &str, builder: &DeclarationsBuilder) -> PathBuf {
        let path = self.path().join(format!("{}.yaml", name));
        builder
            .write_to_file(&path)
            .await
            .expect("Failed to write declarations file");
        path
    }
}

pub fn locals(pairs: &[(&str, JsonValue)]) -> Locals {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), Value::from_json(value.clone())))
        .collect()
}

pub fn collection_of(partials: Vec<TestPartial>) -> PartialCollection {
    let mut collection = PartialCollection::new();
    for partial in partials {
        collection
            .register(partial.build())
            .expect("Failed to register partial");
    }
    collection
}

pub fn trusted_engine(context: JsonValue, partials: Vec<TestPartial>) -> Interpolator {
    Interpolator::new(
        EngineConfig::default(),
        Value::from_json(context),
        collection_of(partials),
    )
}

pub fn engine_with_config(config: EngineConfig, context: JsonValue, partials: Vec<TestPartial>) -> Interpolator {
    Interpolator::new(config, Value::from_json(context), collection_of(partials))
}
