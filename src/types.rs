//! Shared types for the exchange-rate exporter.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::export::ExportTarget;
use crate::scraper::parsers::ParseFailure;

/// Banks with a configured export flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BankCode {
    Bbl,
    Bot,
    Kbank,
    Uob,
    Exim,
}

impl BankCode {
    /// Run order used by the orchestrator
    pub const ALL: [BankCode; 5] = [
        BankCode::Kbank,
        BankCode::Exim,
        BankCode::Bot,
        BankCode::Bbl,
        BankCode::Uob,
    ];

    /// Label used as the file name prefix (bank capitalization preserved)
    pub fn label(&self) -> &'static str {
        match self {
            BankCode::Bbl => "BBL",
            BankCode::Bot => "BOT",
            BankCode::Kbank => "k-bank",
            BankCode::Uob => "uob",
            BankCode::Exim => "Exim",
        }
    }

    /// Directory under the export root
    pub fn dir_name(&self) -> &'static str {
        match self {
            BankCode::Bbl => "BBL",
            BankCode::Bot => "BOT",
            BankCode::Kbank => "K-BANK",
            BankCode::Uob => "UOB",
            BankCode::Exim => "Exim",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BankCode::Bbl => "Bangkok Bank",
            BankCode::Bot => "Bank of Thailand",
            BankCode::Kbank => "Kasikornbank",
            BankCode::Uob => "UOB Thailand",
            BankCode::Exim => "EXIM Thailand",
        }
    }
}

impl fmt::Display for BankCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for BankCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "bbl" | "bangkokbank" => Ok(BankCode::Bbl),
            "bot" => Ok(BankCode::Bot),
            "kbank" | "kasikorn" => Ok(BankCode::Kbank),
            "uob" => Ok(BankCode::Uob),
            "exim" => Ok(BankCode::Exim),
            other => Err(format!("unknown bank: {}", other)),
        }
    }
}

/// Round-level failure taxonomy
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error(transparent)]
    Parse(#[from] ParseFailure),

    #[error("no rate data after {attempts} checks")]
    NoData { attempts: u32 },

    #[error("round selection failed: {0}")]
    Selection(String),

    #[error("render failed: {0}")]
    Render(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExportError {
    /// Navigation and browser-protocol failures are worth another try
    pub fn is_transient(&self) -> bool {
        matches!(self, ExportError::Navigation(_) | ExportError::Browser(_))
    }
}

/// Why a round was skipped without error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Output file is already on disk
    AlreadyExists(PathBuf),
    /// Publication time is outside the business window
    OutsideWindow(String),
}

/// Result of processing a single round
#[derive(Debug)]
pub enum RoundOutcome {
    Exported(ExportTarget),
    Skipped(SkipReason),
    Exhausted { attempts: u32 },
    Failed(ExportError),
}

impl RoundOutcome {
    pub fn is_exported(&self) -> bool {
        matches!(self, RoundOutcome::Exported(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, RoundOutcome::Skipped(_))
    }
}

impl fmt::Display for RoundOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundOutcome::Exported(target) => write!(f, "exported {}", target.file_name()),
            RoundOutcome::Skipped(SkipReason::AlreadyExists(path)) => {
                write!(f, "skipped, exists: {}", path.display())
            }
            RoundOutcome::Skipped(SkipReason::OutsideWindow(time)) => {
                write!(f, "skipped, {} outside business hours", time)
            }
            RoundOutcome::Exhausted { attempts } => write!(f, "no data after {} checks", attempts),
            RoundOutcome::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Per-bank summary returned by every export flow
#[derive(Debug)]
pub struct BankReport {
    pub bank: BankCode,
    /// (round label, outcome) in processing order
    pub outcomes: Vec<(String, RoundOutcome)>,
}

impl BankReport {
    pub fn new(bank: BankCode) -> Self {
        Self {
            bank,
            outcomes: Vec::new(),
        }
    }

    pub fn push(&mut self, label: impl Into<String>, outcome: RoundOutcome) {
        self.outcomes.push((label.into(), outcome));
    }

    pub fn exported(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_exported()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_skipped()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.exported() - self.skipped()
    }
}
