//! CLI definitions for modhost.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// modhost CLI.
#[derive(Parser)]
#[command(name = "modhost")]
#[command(about = "Dependency-ordered component host")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/modhost.toml", global = true, env = "MODHOST_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Initialize every component and serve until shutdown (default)
    Run {
        /// Register the bundled components in-process instead of loading units
        #[arg(long)]
        dev: bool,
    },

    /// List loadable units in the plugin directory without initializing them
    Inspect {
        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Validate the configuration file
    CheckConfig,
}
