//! Output path resolution and dedup checks.
//!
//! Layout: `<root>/<bank dir>/<YYYY>/<EnglishMonth>/<Label> <YYYY-MM-DD> #<n>.pdf`

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::scraper::parsers::thai_date::english_month_name;
use crate::types::BankCode;

static SEQUENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\d+)\.pdf$").expect("sequence regex"));

/// Where one round's PDF goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportTarget {
    pub bank_code: String,
    pub year: String,
    pub month_name: String,
    pub date_str: String,
    /// `None` for banks publishing a single daily file (BOT)
    pub sequence_or_round: Option<u32>,
    pub file_path: PathBuf,
}

impl ExportTarget {
    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn dir(&self) -> &Path {
        self.file_path.parent().unwrap_or(Path::new("."))
    }
}

/// Resolves deterministic output paths under the export root
#[derive(Debug, Clone)]
pub struct OutputResolver {
    root: PathBuf,
}

impl OutputResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<root>/<bank dir>/<YYYY>/<EnglishMonth>`
    pub fn month_dir(&self, bank: BankCode, date: NaiveDate) -> PathBuf {
        self.root
            .join(bank.dir_name())
            .join(format!("{:04}", date.year()))
            .join(english_month_name(date.month()).unwrap_or("Unknown"))
    }

    fn target(&self, bank: BankCode, date: NaiveDate, index: Option<u32>) -> ExportTarget {
        let date_str = date.format("%Y-%m-%d").to_string();
        let file_name = match index {
            Some(n) => format!("{} {} #{}.pdf", bank.label(), date_str, n),
            None => format!("{} {}.pdf", bank.label(), date_str),
        };

        ExportTarget {
            bank_code: bank.label().to_string(),
            year: format!("{:04}", date.year()),
            month_name: english_month_name(date.month()).unwrap_or("Unknown").to_string(),
            date_str,
            sequence_or_round: index,
            file_path: self.month_dir(bank, date).join(file_name),
        }
    }

    /// Target for a known round (or list position)
    pub fn resolve(&self, bank: BankCode, date: NaiveDate, index: u32) -> ExportTarget {
        self.target(bank, date, Some(index))
    }

    /// Target for a single daily publication
    pub fn resolve_daily(&self, bank: BankCode, date: NaiveDate) -> ExportTarget {
        self.target(bank, date, None)
    }

    /// `max(existing #n) + 1` over `<Label> <date>*.pdf` in the month dir.
    ///
    /// Files with no `#n` suffix count as 0; a missing directory yields 1.
    pub fn next_sequence(&self, bank: BankCode, date: NaiveDate) -> std::io::Result<u32> {
        let dir = self.month_dir(bank, date);
        if !dir.exists() {
            return Ok(1);
        }

        let prefix = format!("{} {}", bank.label(), date.format("%Y-%m-%d"));
        let mut max_seen: Option<u32> = None;

        for entry in std::fs::read_dir(&dir)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if !name.starts_with(&prefix) || !name.ends_with(".pdf") {
                continue;
            }
            let n = SEQUENCE_RE
                .captures(&name)
                .and_then(|caps| caps[1].parse::<u32>().ok())
                .unwrap_or(0);
            max_seen = Some(max_seen.map_or(n, |m| m.max(n)));
        }

        Ok(max_seen.map_or(1, |m| m + 1))
    }

    /// Target with the next unused sequence number, for unknown round identity
    pub fn resolve_next(&self, bank: BankCode, date: NaiveDate) -> std::io::Result<ExportTarget> {
        let n = self.next_sequence(bank, date)?;
        Ok(self.resolve(bank, date, n))
    }

    pub fn exists(&self, target: &ExportTarget) -> bool {
        target.file_path.exists()
    }

    pub fn ensure_dir(&self, target: &ExportTarget) -> std::io::Result<()> {
        std::fs::create_dir_all(target.dir())
    }
}
