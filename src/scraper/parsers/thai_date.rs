//! Thai locale date/time parser.
//!
//! Bank pages publish their rate timestamps as Thai text with Buddhist Era
//! years, e.g. `วันที่ 12 กันยายน 2568 เวลา 13:10:38` or
//! `วันที่ 10 / 09 / 2568 ครั้งที่ : 5 เวลา : 14:02:35`.

use chrono::{NaiveDate, NaiveTime};
use regex::{Captures, Regex};
use serde::Serialize;
use std::sync::LazyLock;
use thiserror::Error;

/// Thai month names (full and abbreviated) to month numbers
const THAI_MONTHS: [(&str, u32); 24] = [
    ("มกราคม", 1),
    ("กุมภาพันธ์", 2),
    ("มีนาคม", 3),
    ("เมษายน", 4),
    ("พฤษภาคม", 5),
    ("มิถุนายน", 6),
    ("กรกฎาคม", 7),
    ("สิงหาคม", 8),
    ("กันยายน", 9),
    ("ตุลาคม", 10),
    ("พฤศจิกายน", 11),
    ("ธันวาคม", 12),
    ("ม.ค.", 1),
    ("ก.พ.", 2),
    ("มี.ค.", 3),
    ("เม.ย.", 4),
    ("พ.ค.", 5),
    ("มิ.ย.", 6),
    ("ก.ค.", 7),
    ("ส.ค.", 8),
    ("ก.ย.", 9),
    ("ต.ค.", 10),
    ("พ.ย.", 11),
    ("ธ.ค.", 12),
];

const ENGLISH_MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Years above this are Buddhist Era
const BUDDHIST_ERA_THRESHOLD: i32 = 2500;
const BUDDHIST_ERA_OFFSET: i32 = 543;

/// Month number (1..12) for a Thai month name or abbreviation
pub fn month_number(name: &str) -> Option<u32> {
    let name = name.trim();
    THAI_MONTHS
        .iter()
        .find(|(thai, _)| *thai == name)
        .map(|(_, n)| *n)
}

/// Abbreviated Thai month name (`ม.ค.` .. `ธ.ค.`)
pub fn thai_month_abbrev(month: u32) -> Option<&'static str> {
    THAI_MONTHS[12..]
        .iter()
        .find(|(_, n)| *n == month)
        .map(|(name, _)| *name)
}

/// English month name used for output directories
pub fn english_month_name(month: u32) -> Option<&'static str> {
    ENGLISH_MONTHS.get(month.checked_sub(1)? as usize).copied()
}

/// Convert a Buddhist Era year to Common Era; CE years pass through
pub fn to_common_era(year: i32) -> i32 {
    if year > BUDDHIST_ERA_THRESHOLD {
        year - BUDDHIST_ERA_OFFSET
    } else {
        year
    }
}

pub fn to_buddhist_era(year: i32) -> i32 {
    year + BUDDHIST_ERA_OFFSET
}

/// Publication date/time read from page text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicationInfo {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub round_index: Option<u32>,
    pub raw_matched_text: String,
}

impl PublicationInfo {
    /// `YYYY-MM-DD`
    pub fn iso_date(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// Zero-padded 24h `HH:MM`
    pub fn canonical_time(&self) -> String {
        self.time.format("%H:%M").to_string()
    }
}

/// No pattern produced both a date and a time
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("no publication date/time found in {sample:?}")]
pub struct ParseFailure {
    pub sample: String,
}

impl ParseFailure {
    fn new(text: &str) -> Self {
        Self {
            sample: text.chars().take(80).collect(),
        }
    }
}

/// A text pattern using named groups.
///
/// Recognised groups: `day`, `month` (numeric), `month_name` (Thai), `year`,
/// `round`, `hour`, `minute`, `second`. A pattern contributes whichever of
/// date, time and round its groups cover.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub name: &'static str,
    regex: Regex,
}

impl Pattern {
    pub fn new(name: &'static str, regex: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            regex: Regex::new(regex)?,
        })
    }
}

#[derive(Debug, Default)]
struct Partial {
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
    round: Option<u32>,
    matched: Vec<String>,
}

fn group_u32(caps: &Captures<'_>, name: &str) -> Option<u32> {
    caps.name(name)?.as_str().parse().ok()
}

fn date_from(caps: &Captures<'_>) -> Option<NaiveDate> {
    let day = group_u32(caps, "day")?;
    let month = match caps.name("month_name") {
        Some(m) => month_number(m.as_str())?,
        None => group_u32(caps, "month")?,
    };
    let year: i32 = caps.name("year")?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(to_common_era(year), month, day)
}

fn time_from(caps: &Captures<'_>) -> Option<NaiveTime> {
    let hour = group_u32(caps, "hour")?;
    let minute = group_u32(caps, "minute")?;
    let second = group_u32(caps, "second").unwrap_or(0);
    NaiveTime::from_hms_opt(hour, minute, second)
}

/// Apply `patterns` in priority order.
///
/// A pattern that yields date and time on its own wins immediately. Otherwise
/// date, time and round are each taken from the first pattern providing them.
pub fn parse(raw_text: &str, patterns: &[Pattern]) -> Result<PublicationInfo, ParseFailure> {
    let mut partial = Partial::default();

    for pattern in patterns {
        let Some(caps) = pattern.regex.captures(raw_text) else {
            continue;
        };

        let date = date_from(&caps);
        let time = time_from(&caps);
        let round = group_u32(&caps, "round");
        let matched = caps[0].trim().to_string();

        if let (Some(date), Some(time)) = (date, time) {
            return Ok(PublicationInfo {
                date,
                time,
                round_index: round
                    .or(partial.round)
                    .or_else(|| parse_round(raw_text, patterns)),
                raw_matched_text: matched,
            });
        }

        let mut used = false;
        if partial.date.is_none() && date.is_some() {
            partial.date = date;
            used = true;
        }
        if partial.time.is_none() && time.is_some() {
            partial.time = time;
            used = true;
        }
        if partial.round.is_none() && round.is_some() {
            partial.round = round;
            used = true;
        }
        if used {
            partial.matched.push(matched);
        }
    }

    match (partial.date, partial.time) {
        (Some(date), Some(time)) => Ok(PublicationInfo {
            date,
            time,
            round_index: partial.round,
            raw_matched_text: partial.matched.join(" | "),
        }),
        _ => Err(ParseFailure::new(raw_text)),
    }
}

/// Round number alone, for pages where only the round is printed
pub fn parse_round(raw_text: &str, patterns: &[Pattern]) -> Option<u32> {
    patterns
        .iter()
        .filter_map(|p| p.regex.captures(raw_text))
        .find_map(|caps| group_u32(&caps, "round"))
}

/// Date alone (`D <Thai month> YYYY` or `D/M/YYYY`)
pub fn parse_date(raw_text: &str, patterns: &[Pattern]) -> Option<NaiveDate> {
    patterns
        .iter()
        .filter_map(|p| p.regex.captures(raw_text))
        .find_map(|caps| date_from(&caps))
}

macro_rules! pattern_set {
    ($($name:literal => $re:literal),+ $(,)?) => {
        vec![$(Pattern::new($name, $re).expect(concat!("invalid pattern ", $name))),+]
    };
}

/// UOB: combined `date / round / time` line, then the fields separately
pub static UOB_PATTERNS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    pattern_set![
        "uob-combined" => r"วันที่\s+(?P<day>\d{1,2})\s*/\s*(?P<month>\d{1,2})\s*/\s*(?P<year>\d{4})\s+ครั้งที่\s*:\s*(?P<round>\d+)\s+เวลา\s*:\s*(?P<hour>\d{1,2}):(?P<minute>\d{2})(?::(?P<second>\d{2}))?",
        "numeric-date" => r"วันที่\s+(?P<day>\d{1,2})\s*/\s*(?P<month>\d{1,2})\s*/\s*(?P<year>\d{4})",
        "round-colon" => r"ครั้งที่\s*:\s*(?P<round>\d+)",
        "time-colon" => r"เวลา\s*:\s*(?P<hour>\d{1,2}):(?P<minute>\d{2})(?::(?P<second>\d{2}))?",
    ]
});

/// K-BANK `#ModDate` element: `D <month> YYYY ... HH:MM:SS ... <round>`
pub static KBANK_ELEMENT_PATTERNS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    pattern_set![
        "thai-month-date" => r"(?P<day>\d{1,2})\s+(?P<month_name>[\p{Thai}.]+)\s+(?P<year>\d{4})",
        "clock" => r"(?P<hour>\d{1,2}):(?P<minute>\d{2}):(?P<second>\d{2})",
        "trailing-round" => r"(?:^|[^:\d])(?P<round>\d{1,2})\s*$",
    ]
});

/// Date-only labels such as EXIM's `12 กันยายน 2568` or `12/09/2568`
pub static DATE_ONLY_PATTERNS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    pattern_set![
        "thai-month-date" => r"(?P<day>\d{1,2})\s+(?P<month_name>[\p{Thai}.]+)\s+(?P<year>\d{4})",
        "numeric-date" => r"(?P<day>\d{1,2})\s*/\s*(?P<month>\d{1,2})\s*/\s*(?P<year>\d{4})",
    ]
});

/// Generic body-text patterns shared by K-BANK (fallback) and EXIM
pub static BODY_TEXT_PATTERNS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    pattern_set![
        "thai-date-time" => r"วันที่\s*(?P<day>\d{1,2})\s+(?P<month_name>[\p{Thai}.]+)\s+(?P<year>\d{4})\s*เวลา\s*:?\s*(?P<hour>\d{1,2}):(?P<minute>\d{2})(?::(?P<second>\d{2}))?",
        "thai-date" => r"วันที่\s*(?P<day>\d{1,2})\s+(?P<month_name>[\p{Thai}.]+)\s+(?P<year>\d{4})",
        "thai-date-before-time" => r"(?P<day>\d{1,2})\s+(?P<month_name>[\p{Thai}.]+)\s+(?P<year>\d{4})\s*เวลา",
        "numeric-date" => r"วันที่\s*(?P<day>\d{1,2})\s*/\s*(?P<month>\d{1,2})\s*/\s*(?P<year>\d{4})",
        "numeric-date-before-time" => r"(?P<day>\d{1,2})\s*/\s*(?P<month>\d{1,2})\s*/\s*(?P<year>\d{4})\s*เวลา",
        "time" => r"เวลา\s*:?\s*(?P<hour>\d{1,2}):(?P<minute>\d{2})(?::(?P<second>\d{2}))?",
        "time-before-round" => r"(?P<hour>\d{1,2}):(?P<minute>\d{2}):(?P<second>\d{2})\s*รอบที่",
        "round" => r"(?:รอบที่|ครั้งที่)\s*:?\s*(?P<round>\d+)",
    ]
});
