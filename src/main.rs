//! fx-export
//!
//! Exports the published foreign-exchange rate tables of five Thai banks to
//! PDF files in a dated archive.

mod banks;
mod cli;
mod config;
mod export;
mod retry;
mod scraper;
mod types;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fx_export=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Run { bank, root, headed } => {
            let summary = cli::run_export(bank, root, headed).await?;
            if summary.all_failed() {
                anyhow::bail!("every selected bank failed");
            }
            Ok(())
        }
        Commands::Banks => {
            cli::run_banks();
            Ok(())
        }
        Commands::Parse { text, file } => cli::run_parse(text, file),
    }
}
