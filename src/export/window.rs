//! Business-hours window for publication rounds.

use serde::{Deserialize, Serialize};

/// Inclusive window in minutes since midnight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessWindow {
    #[serde(default = "default_start_minute")]
    pub start_minute: u32,
    #[serde(default = "default_end_minute")]
    pub end_minute: u32,
}

fn default_start_minute() -> u32 {
    8 * 60
}

fn default_end_minute() -> u32 {
    16 * 60
}

impl Default for BusinessWindow {
    fn default() -> Self {
        Self {
            start_minute: default_start_minute(),
            end_minute: default_end_minute(),
        }
    }
}

/// `HH:MM` (or `H:MM`, seconds ignored) to minutes since midnight
pub fn minutes_since_midnight(canonical_time: &str) -> Option<u32> {
    let mut parts = canonical_time.trim().split(':');
    let hour: u32 = parts.next()?.trim().parse().ok()?;
    let minute: u32 = parts.next()?.trim().parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some(hour * 60 + minute)
}

/// True iff `window_start <= minutes(time) <= window_end`
pub fn is_eligible(canonical_time: &str, window_start_minute: u32, window_end_minute: u32) -> bool {
    minutes_since_midnight(canonical_time)
        .map(|m| window_start_minute <= m && m <= window_end_minute)
        .unwrap_or(false)
}

impl BusinessWindow {
    pub fn contains_minutes(&self, minutes: u32) -> bool {
        self.start_minute <= minutes && minutes <= self.end_minute
    }

    pub fn is_eligible(&self, canonical_time: &str) -> bool {
        is_eligible(canonical_time, self.start_minute, self.end_minute)
    }

    /// `HH:MM-HH:MM` for log lines
    pub fn describe(&self) -> String {
        format!(
            "{:02}:{:02}-{:02}:{:02}",
            self.start_minute / 60,
            self.start_minute % 60,
            self.end_minute / 60,
            self.end_minute % 60
        )
    }
}
