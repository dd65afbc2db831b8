#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

use std::str::FromStr;

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use hookwarden::Config;
use hookwarden::cli::{Cli, Commands, dispatch, emit_fallback};

const DEFAULT_LEVEL: Level = Level::WARN;

/// Stdout carries the hook response, so logs go to stderr.
fn init_logging(level: Option<&str>) {
    let level = level
        .and_then(|raw| Level::from_str(raw.trim()).ok())
        .unwrap_or(DEFAULT_LEVEL);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: failed to install log subscriber: {e}");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let evaluating = matches!(cli.command, None | Some(Commands::Evaluate));

    let config = match Config::load() {
        Ok(config) => config,
        Err(error) => {
            init_logging(std::env::var("HOOKWARDEN_LOG").ok().as_deref());
            tracing::error!(%error, "configuration unusable");
            if evaluating {
                // The host still needs a decision.
                emit_fallback(&format!("hookwarden configuration is invalid: {error}"));
                return Ok(());
            }
            return Err(error.into());
        }
    };
    init_logging(config.log_level.as_deref());

    dispatch(cli, config).await
}
