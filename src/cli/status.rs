//! Status command implementation

use colored::Colorize;

use adminop::Result;
use adminop::cache::CacheStorage;
use adminop::config::{API_URL_ENV, Config};

use crate::cli::args::GlobalOptions;

/// Run the status command to display configuration status
pub fn run(opts: &GlobalOptions) -> Result<()> {
    println!("{}\n", "adminop Configuration Status".bold());

    let config_path = Config::resolve_path(opts.config_ref())?;

    match Config::load_at(opts.config_ref()) {
        Ok(config) => {
            println!("Config file: {}", config_path.display().to_string().cyan());
            println!();

            match &config.api_url {
                Some(url) => {
                    let source = if std::env::var(API_URL_ENV).is_ok() {
                        format!(" (from {})", API_URL_ENV)
                    } else {
                        String::new()
                    };
                    println!("{} Backend: {}{}", "✓".green(), url, source.dimmed());
                }
                None => {
                    println!("{} Backend URL not configured", "✗".red());
                    println!("  → Run 'adminop init' to configure");
                }
            }

            if config.api_token.is_some() {
                println!("{} API token configured", "✓".green());
            } else {
                println!("{} No API token (requests are sent unauthenticated)", "○".dimmed());
            }

            let cache_dir = match &config.cache_dir {
                Some(dir) => Some(dir.clone()),
                None => CacheStorage::cache_dir().ok(),
            };
            if let Some(dir) = cache_dir {
                println!("{} Cache: {}", "○".dimmed(), dir.display());
            }

            let prefs = &config.preferences;
            println!();
            println!("Page size:      {}", prefs.page_size);
            println!("Search delay:   {}ms", prefs.debounce_ms);
            println!("Fresh for:      {}s", prefs.stale_secs);
            println!(
                "Failed delete:  {}",
                if prefs.keep_dialog_open_on_failure {
                    "keep confirmation open"
                } else {
                    "close confirmation"
                }
            );
            println!();
        }
        Err(_) => {
            println!("{} Configuration not found", "✗".red());
            println!();
            println!(
                "Run {} to create a configuration file.",
                "adminop init".cyan()
            );
            println!();
        }
    }

    Ok(())
}
