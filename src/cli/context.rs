//! Command execution context
//!
//! Provides a unified context for commands that talk to the backend,
//! eliminating boilerplate for config loading and console wiring.

use adminop::config::Config;
use adminop::{Console, Result};

use crate::cli::OutputFormat;
use crate::cli::args::GlobalOptions;

/// Context for command execution containing the console and runtime options.
pub struct CommandContext {
    /// Backend client and request cache
    pub console: Console,
    /// Output format preference
    pub format: OutputFormat,
}

impl CommandContext {
    /// Create a new command context.
    ///
    /// A missing config file is not an error as long as the backend URL is
    /// supplied through the environment.
    ///
    /// # Errors
    /// Returns error if the config is invalid or no backend URL is known.
    pub fn new(opts: &GlobalOptions) -> Result<Self> {
        let config = Config::load_or_default(opts.config_ref())?;
        let console = Console::from_config(&config, opts.no_cache)?;

        Ok(Self {
            console,
            format: opts.format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adminop::Error;
    use adminop::error::ConfigError;
    use tempfile::TempDir;

    #[test]
    fn test_missing_api_url_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "preferences:\n  page_size: 5\n").unwrap();

        let opts = GlobalOptions {
            format: OutputFormat::Pretty,
            config: Some(path.display().to_string()),
            no_cache: true,
        };

        // Only meaningful when the environment doesn't supply the URL
        if std::env::var(adminop::config::API_URL_ENV).is_err() {
            assert!(matches!(
                CommandContext::new(&opts),
                Err(Error::Config(ConfigError::MissingApiUrl))
            ));
        }
    }

    #[test]
    fn test_context_from_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "api_url: http://localhost:9/api\npreferences:\n  page_size: 5\n",
        )
        .unwrap();

        let opts = GlobalOptions {
            format: OutputFormat::Json,
            config: Some(path.display().to_string()),
            no_cache: true,
        };

        let ctx = CommandContext::new(&opts).unwrap();
        assert_eq!(ctx.format, OutputFormat::Json);
        assert_eq!(ctx.console.preferences().page_size, 5);
        assert!(ctx.console.cache().is_empty());
    }
}
