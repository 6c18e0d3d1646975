use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// drawroom — turn-orchestration backend for a collaborative drawing room.
#[derive(Debug, Parser)]
#[command(name = "drawroom", version, about)]
pub struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server and turn processor (default).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the resolved configuration as JSON, secrets redacted.
    Show,
}
