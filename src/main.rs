//! modhost - dependency-ordered component host
//!
//! Main entry point for the modhost CLI.

mod cli;
mod cmd_config;
mod cmd_inspect;
mod cmd_run;
mod register;

use clap::Parser;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use modhost_config::{ConfigLoader, LoggingConfig};

use crate::cli::{Cli, Commands};

/// Initialize tracing with console output and, when configured, a daily-rolling log file.
fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let console = if logging.json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).with_ansi(true).boxed()
    };

    let file = match &logging.directory {
        Some(directory) => {
            let log_dir = ConfigLoader::expand_path(directory);
            std::fs::create_dir_all(&log_dir)?;

            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("modhost")
                .filename_suffix("log")
                .max_log_files(30)
                .build(&log_dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // The guard flushes on drop; keep it for the life of the process.
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::CheckConfig) => cmd_config::check_config(&cli.config),
        Some(Commands::Inspect { format }) => {
            let config = ConfigLoader::load_or_default(&cli.config)?;
            init_tracing(&config.logging)?;
            cmd_inspect::inspect(&config, &format)
        }
        Some(Commands::Run { dev }) => {
            let mut config = ConfigLoader::load_or_default(&cli.config)?;
            config.runtime.dev_mode |= dev;
            init_tracing(&config.logging)?;
            cmd_run::run(config).await
        }
        None => {
            let config = ConfigLoader::load_or_default(&cli.config)?;
            init_tracing(&config.logging)?;
            cmd_run::run(config).await
        }
    }
}
