//! Round dropdown enumeration.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::export::BusinessWindow;

static CLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2}):(\d{2})").expect("clock regex"));

/// `<option>` as read from the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOption {
    pub value: String,
    pub label: String,
}

impl RawOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// A dropdown round with the clock time embedded in its label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundOption {
    pub raw_label: String,
    pub value: String,
    pub hour: u32,
    pub minute: u32,
}

impl RoundOption {
    pub fn minutes(&self) -> u32 {
        self.hour * 60 + self.minute
    }

    pub fn canonical_time(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }
}

/// First `H:MM` / `HH:MM` clock in a label
pub fn parse_clock(label: &str) -> Option<(u32, u32)> {
    CLOCK_RE.captures_iter(label).find_map(|caps| {
        let hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps[2].parse().ok()?;
        (hour < 24 && minute < 60).then_some((hour, minute))
    })
}

/// Time-labelled rounds inside `window`, ascending by time.
///
/// Options without a value or a parseable clock are dropped; an empty
/// dropdown yields an empty list.
pub fn enumerate(raw_options: &[RawOption], window: &BusinessWindow) -> Vec<RoundOption> {
    let mut rounds: Vec<RoundOption> = raw_options
        .iter()
        .filter(|opt| !opt.value.trim().is_empty() && !opt.label.trim().is_empty())
        .filter_map(|opt| {
            let (hour, minute) = parse_clock(&opt.label)?;
            Some(RoundOption {
                raw_label: opt.label.trim().to_string(),
                value: opt.value.trim().to_string(),
                hour,
                minute,
            })
        })
        .filter(|round| window.contains_minutes(round.minutes()))
        .collect();

    rounds.sort_by_key(RoundOption::minutes);
    rounds
}

/// Positive round numbers from a dropdown whose values are bare numbers
pub fn enumerate_numbered(raw_options: &[RawOption]) -> Vec<u32> {
    let mut rounds: Vec<u32> = raw_options
        .iter()
        .filter_map(|opt| opt.value.trim().parse::<u32>().ok())
        .filter(|n| *n > 0)
        .collect();
    rounds.sort_unstable();
    rounds.dedup();
    rounds
}
