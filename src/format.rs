//! Display formatting for currency amounts and content dates.
//!
//! Dates in content files are free text. [`parse_date`] accepts plain
//! calendar days (`2024-06-15`), RFC 3339 timestamps and naive
//! `YYYY-MM-DDTHH:MM[:SS]` timestamps (read as UTC). Anything else is kept
//! as written when displayed.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::config::DisplayConfig;

/// A parsed content date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentDate {
    /// A whole calendar day.
    Day(NaiveDate),
    Instant(DateTime<Utc>),
}

impl ContentDate {
    /// First instant covered by this date.
    pub fn start(&self) -> DateTime<Utc> {
        match self {
            ContentDate::Day(day) => day.and_time(NaiveTime::MIN).and_utc(),
            ContentDate::Instant(at) => *at,
        }
    }

    /// Last instant covered by this date. A day lasts until 23:59:59.999999999.
    pub fn end(&self) -> DateTime<Utc> {
        match self {
            ContentDate::Day(day) => day
                .succ_opt()
                .map(|next| {
                    next.and_time(NaiveTime::MIN).and_utc() - chrono::Duration::nanoseconds(1)
                })
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            ContentDate::Instant(at) => *at,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            ContentDate::Day(day) => *day,
            ContentDate::Instant(at) => at.date_naive(),
        }
    }
}

const NAIVE_DATETIME_FORMATS: [&str; 3] =
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

pub fn parse_date(raw: &str) -> Option<ContentDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(ContentDate::Day(day));
    }

    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(ContentDate::Instant(at.with_timezone(&Utc)));
    }

    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|at| ContentDate::Instant(at.and_utc()))
}

/// Formats amounts and dates for presentation.
#[derive(Debug, Clone)]
pub struct Formatter {
    currency_symbol: String,
    unknown_placeholder: String,
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(&DisplayConfig::default())
    }
}

impl Formatter {
    pub fn new(display: &DisplayConfig) -> Self {
        Self {
            currency_symbol: display.currency_symbol.clone(),
            unknown_placeholder: display.unknown_placeholder.clone(),
        }
    }

    /// Whole-unit currency with thousands separators (`$1,450`).
    /// `None` renders the placeholder, never `0`.
    pub fn currency(&self, amount: Option<f64>) -> String {
        let Some(amount) = amount.filter(|a| a.is_finite()) else {
            return self.unknown_placeholder.clone();
        };

        let rounded = amount.round();
        let sign = if rounded < 0.0 { "-" } else { "" };
        format!(
            "{}{}{}",
            sign,
            self.currency_symbol,
            group_thousands(rounded.abs() as u64)
        )
    }

    /// `Jun 15, 2024`. Unparseable input is returned unchanged.
    pub fn date(&self, raw: &str) -> String {
        match parse_date(raw) {
            Some(parsed) => parsed.date().format("%b %-d, %Y").to_string(),
            None => raw.to_string(),
        }
    }

    /// A single date, or `start - end` when the range spans more than one day.
    pub fn date_range(&self, start: &str, end: Option<&str>) -> String {
        let Some(end) = end.filter(|e| !e.trim().is_empty()) else {
            return self.date(start);
        };

        match (parse_date(start), parse_date(end)) {
            (Some(s), Some(e)) if s.date() == e.date() => self.date(start),
            _ => format!("{} - {}", self.date(start), self.date(end)),
        }
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
