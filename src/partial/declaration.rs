// ABOUTME: YAML partial declarations as extracted from documents by an upstream parser
// ABOUTME: Loads declaration lists from disk and turns them into registered fragments

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;
use tracing::{debug, info};

use super::collection::PartialCollection;
use super::error::Result;
use super::fragment::{define_partial, PartialFragment, PartialIssue, PartialOptions};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialDeclaration {
    pub identity: String,
    pub source: String,
    #[serde(default)]
    pub schema: Option<JsonValue>,
    #[serde(default, alias = "inject")]
    pub inject_globs: Vec<String>,
    #[serde(default)]
    pub prepend: bool,
    #[serde(default)]
    pub append: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DeclarationFile {
    List(Vec<PartialDeclaration>),
    Keyed { partials: Vec<PartialDeclaration> },
}

/// Accepts either a bare list or a document with a top-level `partials:` list
pub fn parse_declarations(content: &str) -> Result<Vec<PartialDeclaration>> {
    let file: DeclarationFile = serde_yaml::from_str(content)?;
    Ok(match file {
        DeclarationFile::List(list) => list,
        DeclarationFile::Keyed { partials } => partials,
    })
}

pub async fn load_declarations<P: AsRef<Path>>(path: P) -> Result<Vec<PartialDeclaration>> {
    let path = path.as_ref();
    debug!("Loading partial declarations from {}", path.display());
    let content = tokio::fs::read_to_string(path).await?;
    parse_declarations(&content)
}

impl PartialDeclaration {
    pub fn into_fragment(self, register_issue: &mut dyn FnMut(PartialIssue)) -> Result<PartialFragment> {
        let options = PartialOptions {
            inject_globs: self.inject_globs,
            prepend: self.prepend,
            append: self.append,
        };
        define_partial(&self.identity, &self.source, self.schema, options, register_issue)
    }
}

impl PartialCollection {
    /// Build a collection from declarations, returning it with any schema issues
    pub fn from_declarations<I>(declarations: I) -> Result<(Self, Vec<PartialIssue>)>
    where
        I: IntoIterator<Item = PartialDeclaration>,
    {
        let mut issues = Vec::new();
        let mut collection = PartialCollection::new();
        for declaration in declarations {
            let fragment = declaration.into_fragment(&mut |issue| issues.push(issue))?;
            collection.register(fragment)?;
        }
        info!(
            "Registered {} partials ({} issues)",
            collection.len(),
            issues.len()
        );
        Ok((collection, issues))
    }
}
