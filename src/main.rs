use anyhow::{Result, anyhow};
use clap::Parser;

use libdesk::Settings;
use libdesk::cli::{Cli, Commands, commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Init runs before a settings file exists
    if let Commands::Init { force } = cli.command {
        libdesk::logging::init();
        return commands::init::run_init(force);
    }

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .map_err(|e| anyhow!("Failed to load configuration: {e}"))?;

    libdesk::logging::init_with_config(&settings.logging);

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Index { force } => commands::index::run(&settings, force),
        Commands::Status { json } => commands::status::run(&settings, json),
        Commands::Query { text, k, json } => commands::query::run(&settings, &text, k, json),
        Commands::Config => commands::init::run_config(&settings),
    }
}
