//! CLI command definitions and handlers

use clap::{Parser, Subcommand};
pub use clap_complete::Shell;

use adminop::resource::ResourceKind;

pub mod args;
pub mod cache;
pub mod context;
pub mod init;
pub mod resource;
pub mod status;

pub use args::{ListArgs, OutputFormat, PayloadArgs};
pub use context::CommandContext;

/// adminop - command-line front end for the administrative console
#[derive(Parser, Debug)]
#[command(name = "adminop")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (pretty, table, json)
    #[arg(
        long,
        global = true,
        env = "ADMINOP_FORMAT",
        default_value = "pretty",
        hide_env = true,
        hide_possible_values = true
    )]
    pub format: OutputFormat,

    /// Override config file location
    #[arg(long, global = true, env = "ADMINOP_CONFIG", hide_env = true)]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true, env = "ADMINOP_DEBUG", hide_env = true)]
    pub debug: bool,

    /// Keep cached results in memory only, skipping the on-disk cache
    #[arg(long, global = true, env = "ADMINOP_NO_CACHE", hide_env = true)]
    pub no_cache: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize adminop configuration
    Init,

    /// Show configuration status
    Status,

    /// Display version information
    Version,

    /// List the resource kinds the console manages
    Kinds,

    /// List a page of resources
    List {
        /// Resource kind (see `adminop kinds`)
        #[arg(value_enum)]
        kind: ResourceKind,

        #[command(flatten)]
        list: ListArgs,

        /// Ignore cached results and fetch again
        #[arg(long)]
        refresh: bool,
    },

    /// Show one resource
    Get {
        /// Resource kind
        #[arg(value_enum)]
        kind: ResourceKind,

        /// Resource ID
        id: String,
    },

    /// Create a resource
    #[command(after_help = "\
Examples:
  adminop create tags --set name=rust
  adminop create users --data '{\"email\": \"a@b.com\", \"firstName\": \"Ada\", \"lastName\": \"Lovelace\"}'")]
    Create {
        /// Resource kind
        #[arg(value_enum)]
        kind: ResourceKind,

        #[command(flatten)]
        payload: PayloadArgs,
    },

    /// Update fields of a resource
    Update {
        /// Resource kind
        #[arg(value_enum)]
        kind: ResourceKind,

        /// Resource ID
        id: String,

        #[command(flatten)]
        payload: PayloadArgs,
    },

    /// Delete a resource (asks you to retype its name or email)
    Delete {
        /// Resource kind
        #[arg(value_enum)]
        kind: ResourceKind,

        /// Resource ID
        id: String,

        /// Confirmation text, for non-interactive use
        #[arg(long, value_name = "TEXT")]
        confirm: Option<String>,

        /// Preview what would be deleted without making changes
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove the stored token and clear cached results
    Logout,

    /// Manage local response cache
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Generate shell completions
    #[command(after_help = "\
Examples:
  bash:   adminop completion bash > /etc/bash_completion.d/adminop
  zsh:    adminop completion zsh > \"${fpath[1]}/_adminop\"
  fish:   adminop completion fish > ~/.config/fish/completions/adminop.fish")]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Cache management subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show cache statistics
    Status,

    /// Clear all cached data
    Clear,

    /// Print cache directory path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_list_with_arguments() {
        let cli = Cli::parse_from([
            "adminop", "list", "team-members", "-s", "ada", "-p", "2", "-n", "25", "--sort-by", "name",
            "--sort-dir", "desc",
        ]);

        match cli.command {
            Commands::List { kind, list, refresh } => {
                assert_eq!(kind, ResourceKind::TeamMembers);
                assert_eq!(list.search.as_deref(), Some("ada"));
                assert_eq!(list.page, Some(2));
                assert_eq!(list.size, Some(25));
                assert_eq!(list.sort_by.as_deref(), Some("name"));
                assert!(!refresh);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_delete_with_confirm() {
        let cli = Cli::parse_from(["adminop", "delete", "users", "7", "--confirm", "a@b.com"]);
        match cli.command {
            Commands::Delete {
                kind,
                id,
                confirm,
                dry_run,
            } => {
                assert_eq!(kind, ResourceKind::Users);
                assert_eq!(id, "7");
                assert_eq!(confirm.as_deref(), Some("a@b.com"));
                assert!(!dry_run);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_repeated_set() {
        let cli = Cli::parse_from(["adminop", "update", "tags", "3", "--set", "name=go", "--set", "color=blue"]);
        match cli.command {
            Commands::Update { payload, .. } => {
                assert_eq!(payload.assignments, vec!["name=go", "color=blue"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!(Cli::try_parse_from(["adminop", "list", "widgets"]).is_err());
    }
}
