//! adminop CLI - command-line front end for the administrative console

use clap::{CommandFactory, Parser};

mod cli;
mod output;

use adminop::Result;
use cli::args::GlobalOptions;
use cli::{CacheCommands, Cli, Commands};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

/// Warnings by default, debug output with `--debug`; `RUST_LOG` wins over both.
fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);
    log::debug!("adminop {} starting", env!("CARGO_PKG_VERSION"));

    let opts = GlobalOptions::from_cli(&cli);

    match cli.command {
        Commands::Init => cli::init::run(&opts).await,
        Commands::Status => cli::status::run(&opts),
        Commands::Version => {
            println!("adminop version {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Kinds => cli::resource::kinds(opts.format),
        Commands::List {
            kind,
            list,
            refresh,
        } => cli::resource::list(&opts, kind, &list, refresh).await,
        Commands::Get { kind, id } => cli::resource::get(&opts, kind, &id).await,
        Commands::Create { kind, payload } => cli::resource::create(&opts, kind, &payload).await,
        Commands::Update { kind, id, payload } => {
            cli::resource::update(&opts, kind, &id, &payload).await
        }
        Commands::Delete {
            kind,
            id,
            confirm,
            dry_run,
        } => cli::resource::delete(&opts, kind, &id, confirm.as_deref(), dry_run).await,
        Commands::Logout => cli::init::logout(&opts),
        Commands::Cache(cache_cmd) => match cache_cmd {
            CacheCommands::Status => cli::cache::status(&opts),
            CacheCommands::Clear => cli::cache::clear(&opts),
            CacheCommands::Path => cli::cache::path(&opts),
        },
        Commands::Completion { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "adminop", &mut std::io::stdout());
            Ok(())
        }
    }
}
