// ABOUTME: Command line argument definitions and parsing using Clap
// ABOUTME: Defines the main CLI structure and subcommands for spry-weave

use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "spry-weave")]
#[command(about = "Render executable-documentation templates with partials and captured output")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Path to configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a template file to stdout
    Render {
        #[arg(help = "Path to template file")]
        file: PathBuf,

        #[arg(long, help = "YAML file bound as the shared context")]
        context: Option<PathBuf>,

        #[arg(long, help = "YAML file of partial declarations")]
        partials: Option<PathBuf>,

        #[arg(short = 'V', long = "var", help = "Template locals (key=value)")]
        vars: Vec<String>,

        #[arg(long, help = "Use the restricted dialect (lookups and partial calls only)")]
        restricted: bool,

        #[arg(long, help = "Artifact path used to pick an injectable partial")]
        path: Option<String>,
    },

    /// Compile a template without rendering it
    Validate {
        #[arg(help = "Path to template file")]
        file: PathBuf,

        #[arg(short = 'V', long = "var", help = "Template locals (key=value)")]
        vars: Vec<String>,

        #[arg(long, help = "Validate against the restricted dialect")]
        restricted: bool,
    },

    /// List declared partials and the injectable chosen for a path
    Partials {
        #[arg(help = "YAML file of partial declarations")]
        file: PathBuf,

        #[arg(long, help = "Artifact path to match against injection globs")]
        path: Option<String>,
    },
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parse variables from key=value format, keeping command line order
    pub fn parse_variables(vars: &[String]) -> anyhow::Result<IndexMap<String, String>> {
        let mut variables = IndexMap::new();

        for var in vars {
            if let Some((key, value)) = var.split_once('=') {
                variables.insert(key.to_string(), value.to_string());
            } else {
                return Err(anyhow::anyhow!(
                    "Invalid variable format '{}'. Expected 'key=value'",
                    var
                ));
            }
        }

        Ok(variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variables() {
        let vars = vec![
            "user=Zoya".to_string(),
            "version=2.4.0".to_string(),
            "query=a=b".to_string(),
        ];

        let parsed = Args::parse_variables(&vars).unwrap();

        assert_eq!(parsed.get("user"), Some(&"Zoya".to_string()));
        assert_eq!(parsed.get("version"), Some(&"2.4.0".to_string()));
        assert_eq!(parsed.get("query"), Some(&"a=b".to_string()));
        assert_eq!(parsed.keys().next().map(String::as_str), Some("user"));
    }

    #[test]
    fn test_parse_variables_invalid() {
        let vars = vec!["invalid_format".to_string()];
        let result = Args::parse_variables(&vars);
        assert!(result.is_err());
    }

    #[test]
    fn test_render_flags() {
        let args = Args::try_parse_from([
            "spry-weave",
            "render",
            "body.sql",
            "--restricted",
            "--var",
            "user=Zoya",
            "--path",
            "reports/x.sql",
        ])
        .unwrap();

        match args.command {
            Commands::Render {
                file,
                restricted,
                vars,
                path,
                ..
            } => {
                assert_eq!(file, PathBuf::from("body.sql"));
                assert!(restricted);
                assert_eq!(vars, vec!["user=Zoya".to_string()]);
                assert_eq!(path.as_deref(), Some("reports/x.sql"));
            }
            _ => panic!("expected render command"),
        }
    }
}
