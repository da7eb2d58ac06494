//! Published-date parsing and the retention-window check.

use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;

use crate::types::{HarvestError, HarvestResult, HarvestWindow};

/// Date formats tried in order against the extracted date text.
const DATE_FORMATS: &[&str] = &["%B %d, %Y", "%b %d, %Y", "%b. %d, %Y"];

fn published_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"Published (.*?)(?: at|$)").expect("published-line pattern is valid")
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DateCutoffPolicy;

impl DateCutoffPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Parse the calendar date out of a "Published <date> [at <time>]" line.
    pub fn parse(&self, text: &str) -> HarvestResult<NaiveDate> {
        let failed = || HarvestError::DateParseFailed {
            text: text.to_string(),
        };

        let trimmed = text.trim();
        let captured = published_pattern()
            .captures(trimmed)
            .and_then(|c| c.get(1))
            .ok_or_else(failed)?;
        let date_text = normalize_month(captured.as_str().trim());

        DATE_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(&date_text, format).ok())
            .ok_or_else(failed)
    }

    /// Whether `date` falls on or after the window's lower bound.
    pub fn is_within_window(&self, date: NaiveDate, window: &HarvestWindow) -> bool {
        date.and_time(NaiveTime::MIN) >= window.lower_bound()
    }
}

// AP style writes September as "Sept."; chrono only knows "Sep".
fn normalize_month(date_text: &str) -> String {
    match date_text.strip_prefix("Sept.") {
        Some(rest) => format!("Sep.{rest}"),
        None => date_text.to_string(),
    }
}
