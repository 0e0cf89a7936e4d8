//! Calendar month tokens (`YYYY-MM`) used to bucket release events.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static MONTH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-(0[1-9]|1[0-2])$").expect("month pattern is a valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    #[error("invalid month \"{0}\", expected YYYY-MM")]
    Malformed(String),
}

/// A validated `YYYY-MM` period identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthToken {
    year: i32,
    month: u32,
}

impl MonthToken {
    /// Validate and parse a `YYYY-MM` token.
    ///
    /// # Errors
    /// Returns [`PeriodError::Malformed`] when the input does not match `YYYY-MM`
    /// with a month between `01` and `12`.
    pub fn parse(raw: &str) -> Result<Self, PeriodError> {
        let trimmed = raw.trim();
        if !MONTH_PATTERN.is_match(trimmed) {
            return Err(PeriodError::Malformed(raw.to_string()));
        }
        let (year, month) = trimmed
            .split_once('-')
            .ok_or_else(|| PeriodError::Malformed(raw.to_string()))?;
        let year = year
            .parse::<i32>()
            .map_err(|_| PeriodError::Malformed(raw.to_string()))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| PeriodError::Malformed(raw.to_string()))?;
        Ok(Self { year, month })
    }

    /// The month containing `instant`, evaluated in UTC.
    #[must_use]
    pub fn of(instant: &DateTime<Utc>) -> Self {
        Self {
            year: instant.year(),
            month: instant.month(),
        }
    }

    #[must_use]
    pub fn year(&self) -> i32 {
        self.year
    }

    #[must_use]
    pub fn month(&self) -> u32 {
        self.month
    }

    /// Whether `instant` falls inside this month (UTC).
    #[must_use]
    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        Self::of(instant) == *self
    }

    /// Same as [`MonthToken::contains`] but tolerates a missing timestamp.
    #[must_use]
    pub fn contains_opt(&self, instant: Option<&DateTime<Utc>>) -> bool {
        instant.is_some_and(|i| self.contains(i))
    }

    /// Human label such as `March 2024`.
    #[must_use]
    pub fn label(&self) -> String {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .map_or_else(|| self.to_string(), |d| d.format("%B %Y").to_string())
    }
}

impl fmt::Display for MonthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthToken {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MonthToken {
    type Error = PeriodError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MonthToken> for String {
    fn from(value: MonthToken) -> Self {
        value.to_string()
    }
}

/// Parse an upstream timestamp.
///
/// Accepts RFC 3339, naive `YYYY-MM-DDTHH:MM:SS[.fff]` (assumed UTC) and bare
/// `YYYY-MM-DD`. Anything else yields `None`.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
