//! folio - operator CLI for the portfolio sync core

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// Inspect and exercise the folio sync core
#[derive(Parser, Debug)]
#[command(name = "folio", version, about = "Ownership-aware portfolio sync tools")]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "FOLIO_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "FOLIO_LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load FOLIO_* configuration from the environment and validate it
    CheckConfig,

    /// Replay a JSON-lines file of remote pushes through a fresh engine
    Replay {
        /// File with one flat document object per line
        file: PathBuf,

        /// Print one JSON report per push
        #[arg(long)]
        json: bool,
    },

    /// Print the content replica stored in a file cache
    InspectCache {
        /// Cache file
        path: PathBuf,

        /// Remove the replica after printing it
        #[arg(long)]
        clear: bool,
    },
}

fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            format!("folio={level},folio_sync={level},folio_auth={level},folio_store={level},warn")
                .into()
        });

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);

    match cli.command {
        Command::CheckConfig => {
            if !commands::check_config() {
                std::process::exit(1);
            }
        }
        Command::Replay { file, json } => {
            let summary = commands::replay(&file, json, &mut std::io::stdout().lock())?;
            println!(
                "{} pushes: {} initialized, {} notified, {} suppressed",
                summary.total(),
                summary.initialized,
                summary.notified,
                summary.suppressed
            );
        }
        Command::InspectCache { path, clear } => {
            commands::inspect_cache(&path, clear, &mut std::io::stdout().lock())?;
        }
    }

    Ok(())
}
