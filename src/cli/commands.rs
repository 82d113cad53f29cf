// ABOUTME: Command implementations for the spry-weave CLI
// ABOUTME: Handles execution of render, validate, and partials commands

use anyhow::{Context, Result};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::config::Config;
use crate::engine::{Interpolator, InterpolationResult, PrimeContext};
use crate::partial::{load_declarations, ContentResult, PartialCollection};
use crate::template::{Locals, Value};

/// Render a template file and print the result
pub async fn render_template(
    file: PathBuf,
    context: Option<PathBuf>,
    partials: Option<PathBuf>,
    restricted: bool,
    path: Option<String>,
    config: &Config,
) -> Result<()> {
    info!("Rendering template: {}", file.display());

    let template = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read template {}", file.display()))?;
    let context = match context {
        Some(path) => load_context(&path).await?,
        None => Value::Object(Locals::new()),
    };
    let collection = match partials {
        Some(path) => load_collection(&path).await?,
        None => PartialCollection::new(),
    };

    let engine = build_engine(config, context, collection, restricted);
    let locals = template_locals(config);

    // Injection wraps the raw body so wrapper expressions render with it.
    let composed = match &path {
        Some(path) => {
            engine
                .compose_for_path(ContentResult::new(template, locals.clone()), path, None)
                .await
        }
        None => ContentResult::new(template, locals.clone()),
    };
    if !composed.interpolate {
        warn!("Injection for {:?} rejected its locals", path);
    }

    let mut prime = PrimeContext::new(composed.content).with_context(locals);
    prime.interpolate = composed.interpolate;

    let output = match engine.interpolate_unsafely(prime).await {
        InterpolationResult::Failed { error, .. } => {
            return Err(anyhow::anyhow!("Failed to render {}: {}", file.display(), error))
        }
        result => {
            info!("Template {} ({})", file.display(), result.status());
            result.into_source()
        }
    };

    print!("{}", output);
    if !output.ends_with('\n') {
        println!();
    }
    Ok(())
}

/// Compile a template file without rendering it
pub async fn validate_template(file: PathBuf, restricted: bool, config: &Config) -> Result<()> {
    info!("Validating template: {}", file.display());

    let template = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read template {}", file.display()))?;

    let engine = build_engine(config, Value::Null, PartialCollection::new(), restricted);
    let naming = config.engine.naming();
    let mut names: Vec<String> = config.template_vars.keys().cloned().collect();
    names.extend([
        naming.json_fn_name,
        naming.self_ref_key_name,
        naming.exec_fn_name,
        config.engine.captured_name.clone(),
    ]);

    let renderer = engine
        .compile(&template, &names)
        .await
        .map_err(|e| anyhow::anyhow!("Template validation failed: {}", e))?;

    println!("✓ Template '{}' is valid", file.display());
    println!("  Dialect: {}", engine.dialect_name());
    println!(
        "  Expressions: {}",
        if renderer.has_expressions() { "yes" } else { "none" }
    );
    Ok(())
}

/// List partial declarations and optionally the injectable for a path
pub async fn list_partials(file: PathBuf, path: Option<String>) -> Result<()> {
    let collection = load_collection(&file).await?;

    println!("Partials ({}):", collection.len());
    for identity in collection.identities() {
        let Some(fragment) = collection.get(identity) else {
            continue;
        };
        match fragment.injection() {
            Some(injection) => println!(
                "  {} [{} {}]",
                identity,
                injection.mode,
                injection.globs.join(", ")
            ),
            None => println!("  {}", identity),
        }
    }

    if let Some(path) = path {
        match collection.find_injectable_for_path(&path) {
            Some(found) => println!(
                "Injectable for '{}': {} via '{}' (weight {})",
                path,
                found.partial.identity(),
                found.glob,
                found.wildcard_weight
            ),
            None => println!("No injectable matches '{}'", path),
        }
    }

    Ok(())
}

fn build_engine(
    config: &Config,
    context: Value,
    collection: PartialCollection,
    restricted: bool,
) -> Interpolator {
    if restricted {
        Interpolator::restricted(config.engine.clone(), context, collection)
    } else {
        Interpolator::new(config.engine.clone(), context, collection)
    }
}

fn template_locals(config: &Config) -> Locals {
    config
        .template_vars
        .iter()
        .map(|(key, value)| (key.clone(), Value::from(value.as_str())))
        .collect()
}

async fn load_context(path: &Path) -> Result<Value> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read context {}", path.display()))?;
    let json: JsonValue = serde_yaml::from_str(&content)
        .with_context(|| format!("Invalid context YAML {}", path.display()))?;
    Ok(Value::from_json(json))
}

async fn load_collection(path: &Path) -> Result<PartialCollection> {
    let declarations = load_declarations(path)
        .await
        .with_context(|| format!("Failed to load partials {}", path.display()))?;
    let (collection, issues) = PartialCollection::from_declarations(declarations)
        .with_context(|| format!("Invalid partial declarations in {}", path.display()))?;
    for issue in issues {
        warn!("Partial '{}': {}", issue.identity, issue.message);
    }
    Ok(collection)
}
