//! CLI commands for fx-export.
//!
//! Supports running the bank exports, listing banks, and checking how a
//! publication stamp parses.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::banks::{run_all, ExportContext, RunSummary};
use crate::config::AppConfig;
use crate::scraper::parsers::thai_date::{
    self, BODY_TEXT_PATTERNS, DATE_ONLY_PATTERNS, KBANK_ELEMENT_PATTERNS, UOB_PATTERNS,
};
use crate::scraper::parsers::Pattern;
use crate::types::BankCode;

#[derive(Parser)]
#[command(name = "fx-export")]
#[command(version, about = "Export Thai bank foreign-exchange rate publications to PDF", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export rate publications for the selected banks
    Run {
        /// Banks to export, comma separated (default: all, in run order)
        #[arg(short, long, value_delimiter = ',')]
        bank: Vec<BankCode>,

        /// Output root override
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Show the browser window
        #[arg(long)]
        headed: bool,
    },

    /// List the supported banks and their output folders
    Banks,

    /// Parse a publication stamp with every pattern set
    Parse {
        /// Text to parse
        #[arg(value_name = "TEXT", required_unless_present = "file")]
        text: Option<String>,

        /// Read the text from a file instead
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },
}

/// Banks to run: the requested ones in run order, or all of them
pub fn selected_banks(requested: &[BankCode]) -> Vec<BankCode> {
    if requested.is_empty() {
        return BankCode::ALL.to_vec();
    }
    BankCode::ALL
        .iter()
        .copied()
        .filter(|b| requested.contains(b))
        .collect()
}

/// Run the export and print a per-round table.
pub async fn run_export(bank: Vec<BankCode>, root: Option<PathBuf>, headed: bool) -> anyhow::Result<RunSummary> {
    let mut config = AppConfig::load().context("Failed to load configuration")?;

    if let Some(root) = root {
        config.output.root = root.to_string_lossy().to_string();
    }
    if headed {
        config.browser.headless = false;
    }

    tracing::info!("Output root: {}", config.output.root);

    let ctx = ExportContext::new(config);
    let banks = selected_banks(&bank);
    let summary = run_all(&ctx, &banks).await;

    print_summary(&summary);
    Ok(summary)
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("=== Export Summary ===");
    for report in &summary.reports {
        println!(
            "{} ({} exported, {} skipped, {} failed)",
            report.bank.display_name(),
            report.exported(),
            report.skipped(),
            report.failed()
        );
        for (label, outcome) in &report.outcomes {
            println!("  {:>12}: {}", label, outcome);
        }
    }
    for (bank, error) in &summary.failures {
        println!("{}: FAILED - {}", bank.display_name(), error);
    }
}

/// Print the supported banks
pub fn run_banks() {
    println!("{:<8} {:<10} {:<10} {}", "CODE", "LABEL", "FOLDER", "NAME");
    for bank in BankCode::ALL {
        println!(
            "{:<8} {:<10} {:<10} {}",
            bank.to_string(),
            bank.label(),
            bank.dir_name(),
            bank.display_name()
        );
    }
}

/// Parse `text` (or the contents of `file`) with each pattern set and print
/// the results as JSON.
pub fn run_parse(text: Option<String>, file: Option<PathBuf>) -> anyhow::Result<()> {
    let text = match (text, file) {
        (_, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (Some(text), None) => text,
        (None, None) => anyhow::bail!("Provide TEXT or --file"),
    };

    let sets: [(&str, &[Pattern]); 3] = [
        ("uob", UOB_PATTERNS.as_slice()),
        ("kbank-element", KBANK_ELEMENT_PATTERNS.as_slice()),
        ("body-text", BODY_TEXT_PATTERNS.as_slice()),
    ];

    let mut results = serde_json::Map::new();
    for (name, patterns) in sets {
        let value = match thai_date::parse(&text, patterns) {
            Ok(info) => serde_json::to_value(&info)?,
            Err(e) => serde_json::Value::String(e.to_string()),
        };
        results.insert(name.to_string(), value);
    }
    let date_only = thai_date::parse_date(&text, &DATE_ONLY_PATTERNS).map(|d| d.to_string());
    results.insert("date-only".to_string(), serde_json::to_value(date_only)?);

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
