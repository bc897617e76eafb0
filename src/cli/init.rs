//! Init and logout commands

use colored::Colorize;
use dialoguer::{Confirm, Input, Password, theme::ColorfulTheme};

use adminop::Result;
use adminop::cache::CacheStorage;
use adminop::client::{ListQuery, ResourceApi, RestClient};
use adminop::config::Config;
use adminop::resource::ResourceKind;

use crate::cli::args::GlobalOptions;

/// Run the init command
///
/// Prompts for the backend URL and token, checks that the backend answers,
/// and writes the config file. Existing preferences are kept.
pub async fn run(opts: &GlobalOptions) -> Result<()> {
    let theme = ColorfulTheme::default();
    let mut config = Config::load_or_default(opts.config_ref())?;

    println!("{}", "Welcome to adminop!".bold().green());
    println!("Let's connect to your console backend.\n");

    let mut url_prompt = Input::<String>::with_theme(&theme).with_prompt("Backend API URL");
    if let Some(existing) = &config.api_url {
        url_prompt = url_prompt.default(existing.clone());
    }
    let api_url = url_prompt.interact_text()?;

    let token = Password::with_theme(&theme)
        .with_prompt("API token (leave empty for none)")
        .allow_empty_password(true)
        .interact()?;
    let token = if token.trim().is_empty() { None } else { Some(token) };

    println!("\n{}", "Checking connection...".cyan());
    let client = RestClient::new(&api_url, token.clone())?;
    let probe = ListQuery::new().size(1);
    match client.list(&ResourceKind::Users.descriptor(), &probe).await {
        Ok(_) => println!("{}", "✓ Backend reachable".green()),
        Err(e) => {
            println!("{} {}", "⚠ Could not reach backend:".yellow(), e);
            let save_anyway = Confirm::with_theme(&theme)
                .with_prompt("Save this configuration anyway?")
                .default(false)
                .interact()?;
            if !save_anyway {
                println!("Configuration not saved.");
                return Ok(());
            }
        }
    }

    config.api_url = Some(api_url);
    config.api_token = token;
    config.save_at(opts.config_ref())?;

    let config_path = Config::resolve_path(opts.config_ref())?;
    println!(
        "\n{} Configuration saved to: {}",
        "✓".green(),
        config_path.display()
    );

    println!("\n{}", "You're all set! Try running:".bold());
    println!("  {} - Show configuration status", "adminop status".cyan());
    println!("  {} - List users", "adminop list users".cyan());

    Ok(())
}

/// Forget the token and every cached result
pub fn logout(opts: &GlobalOptions) -> Result<()> {
    let mut config = Config::load_or_default(opts.config_ref())?;

    let had_token = config.api_token.take().is_some();
    if had_token {
        config.save_at(opts.config_ref())?;
    }

    let storage = match &config.cache_dir {
        Some(dir) => CacheStorage::open_at(dir)?,
        None => CacheStorage::open()?,
    };
    let cleared = storage.clear_all()?;

    if had_token {
        println!("{} Token removed", "✓".green());
    } else {
        println!("{} No token was stored", "○".dimmed());
    }
    println!(
        "{} Cleared {} cached results",
        "✓".green(),
        cleared.entries_removed
    );

    Ok(())
}
