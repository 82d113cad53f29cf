// ABOUTME: Main application orchestration for spry-weave CLI
// ABOUTME: Coordinates between CLI arguments, configuration, and command execution

use anyhow::Result;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use super::commands;
use super::{Args, Commands, Config};

pub struct App {
    config: Config,
}

impl App {
    /// Create a new application instance
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self, verbose: bool, no_color: bool) -> Result<()> {
        let log_level = if verbose {
            "debug"
        } else {
            &self.config.logging.level
        };

        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        // Logs go to stderr so rendered output stays clean on stdout.
        let result = match self.config.logging.format.as_str() {
            "compact" => tracing_subscriber::fmt()
                .compact()
                .with_env_filter(env_filter)
                .with_ansi(!no_color)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init(),
            _ => tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(env_filter)
                .with_ansi(!no_color)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init(),
        };
        result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

        debug!("Logging initialized with level: {}", log_level);
        Ok(())
    }

    /// Run the application with parsed arguments
    pub async fn run(&mut self, args: Args) -> Result<()> {
        self.init_logging(args.verbose, args.no_color)?;

        info!("Starting spry-weave v{}", env!("CARGO_PKG_VERSION"));
        debug!("Configuration loaded from: {:?}", args.config);

        // Command line variables override configured template variables
        match &args.command {
            Commands::Render { vars, .. } | Commands::Validate { vars, .. } => {
                let variables = Args::parse_variables(vars)?;
                self.config.merge_variables(variables);
            }
            Commands::Partials { .. } => {}
        }

        match args.command {
            Commands::Render {
                file,
                context,
                partials,
                restricted,
                path,
                ..
            } => {
                commands::render_template(file, context, partials, restricted, path, &self.config)
                    .await
            }

            Commands::Validate {
                file, restricted, ..
            } => commands::validate_template(file, restricted, &self.config).await,

            Commands::Partials { file, path } => commands::list_partials(file, path).await,
        }
    }

    /// Create application from already parsed arguments
    pub fn from_args(args: &Args) -> Result<Self> {
        let config = Config::load(args.config.clone())?;
        Ok(Self::new(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_app_creation() {
        let app = App::new(Config::default());
        assert_eq!(app.config().engine.recursion_limit, 9);
        assert_eq!(app.config().logging.format, "pretty");
    }

    #[test]
    fn test_app_from_args_with_config_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("spry-weave.yaml");
        fs::write(
            &config_path,
            "engine:\n  recursion_limit: 3\nlogging:\n  level: debug\n  format: compact\n",
        )
        .unwrap();

        let args = <Args as clap::Parser>::try_parse_from([
            "spry-weave",
            "--config",
            config_path.to_str().unwrap(),
            "partials",
            "partials.yaml",
        ])
        .unwrap();
        let app = App::from_args(&args).unwrap();
        assert_eq!(app.config().engine.recursion_limit, 3);
        assert_eq!(app.config().logging.level, "debug");
    }
}
