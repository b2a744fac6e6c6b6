//! Calendar helpers: date parsing, the bookable horizon, and the clock seam

use chrono::{Datelike, Duration, Local, NaiveDate, Weekday};

use crate::error::WizardError;

/// Source of "today" for past-date checks
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local wall-clock date
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock pinned to one date
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_iso_date(value: &str) -> Result<NaiveDate, WizardError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| WizardError::InvalidSelection(format!("'{value}' is not a valid date: {e}")))
}

/// e.g. "Sunday, March 10, 2024"
pub fn format_long_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Dates offered for booking: `horizon_days` days starting at `from`,
/// optionally leaving out Saturdays and Sundays.
pub fn upcoming_dates(from: NaiveDate, horizon_days: u32, skip_weekends: bool) -> Vec<NaiveDate> {
    (0..i64::from(horizon_days))
        .map(|offset| from + Duration::days(offset))
        .filter(|date| !(skip_weekends && is_weekend(*date)))
        .collect()
}
