//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Parse `-k`, rejecting negative counts before they reach the index.
fn parse_k(value: &str) -> Result<usize, String> {
    let k: i64 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    usize::try_from(k).map_err(|_| format!("k must not be negative (got {k})"))
}

/// Index lifecycle tool for the library help desk chatbot
#[derive(Parser)]
#[command(
    name = "libdesk",
    version = env!("CARGO_PKG_VERSION"),
    about = "Build and query the library help desk retrieval index",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true, env = "LIBDESK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up .libdesk/settings.toml in the current directory
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Build the index if it is missing or stale
    Index {
        /// Rebuild even if the index is fresh
        #[arg(short, long)]
        force: bool,
    },

    /// Report whether the index matches its sources
    Status {
        #[arg(long)]
        json: bool,
    },

    /// Retrieve the chunks most similar to a question
    Query {
        /// Question text
        text: String,

        /// Number of chunks to return (defaults to retrieval.default_k)
        #[arg(short, long, allow_negative_numbers = true, value_parser = parse_k)]
        k: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Display active settings
    Config,
}
