//! Recurrence expansion -- converts a start date, a recurrence pattern, and an
//! end date into the ordered calendar dates an availability window applies to.
//!
//! Expansion is anchored on the start date: the `n`th occurrence is
//! `start + n * step`, so a monthly series that starts on the 31st clamps to
//! the last day of shorter months without drifting (01-31, 02-29, 03-31, ...).

use std::str::FromStr;

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulingError};

/// Repetition rule for a recurring availability window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrencePattern {
    Daily,
    Weekly,
    Monthly,
}

impl RecurrencePattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrencePattern::Daily => "daily",
            RecurrencePattern::Weekly => "weekly",
            RecurrencePattern::Monthly => "monthly",
        }
    }

    /// The `n`th occurrence counting from `start` (`n = 0` is `start` itself).
    ///
    /// Returns `None` once the result would leave chrono's supported range.
    pub fn nth_from(&self, start: NaiveDate, n: u32) -> Option<NaiveDate> {
        match self {
            RecurrencePattern::Daily => start.checked_add_days(Days::new(u64::from(n))),
            RecurrencePattern::Weekly => start.checked_add_days(Days::new(u64::from(n) * 7)),
            RecurrencePattern::Monthly => start.checked_add_months(Months::new(n)),
        }
    }
}

impl FromStr for RecurrencePattern {
    type Err = SchedulingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(RecurrencePattern::Daily),
            "weekly" => Ok(RecurrencePattern::Weekly),
            "monthly" => Ok(RecurrencePattern::Monthly),
            other => Err(SchedulingError::invalid(format!(
                "unknown recurrence pattern '{}'",
                other
            ))),
        }
    }
}

/// A validated recurrence: the dates from `start` to `end` stepping by `pattern`.
///
/// `Expansion` is a value; every call to [`Expansion::iter`] restarts from the
/// first date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expansion {
    start: NaiveDate,
    pattern: Option<RecurrencePattern>,
    end: NaiveDate,
}

/// Expand a recurrence into its ordered dates.
///
/// With no pattern the expansion is the single `start` date. With a pattern
/// it starts at `start` and steps until the next value would pass `end`.
///
/// # Errors
/// Returns `SchedulingError::InvalidRecurrenceRange` if `end < start`.
pub fn expand(
    start: NaiveDate,
    pattern: Option<RecurrencePattern>,
    end: NaiveDate,
) -> Result<Expansion> {
    if end < start {
        return Err(SchedulingError::InvalidRecurrenceRange { start, end });
    }
    Ok(Expansion { start, pattern, end })
}

impl Expansion {
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last date the expansion may reach (inclusive bound, not necessarily emitted).
    pub fn end(&self) -> NaiveDate {
        match self.pattern {
            Some(_) => self.end,
            None => self.start,
        }
    }

    pub fn pattern(&self) -> Option<RecurrencePattern> {
        self.pattern
    }

    pub fn iter(&self) -> Dates {
        Dates {
            expansion: *self,
            index: 0,
            done: false,
        }
    }

    /// Whether `date` is one of the expanded dates, without iterating.
    pub fn contains(&self, date: NaiveDate) -> bool {
        if date < self.start || date > self.end() {
            return false;
        }
        match self.pattern {
            None => date == self.start,
            Some(RecurrencePattern::Daily) => true,
            Some(RecurrencePattern::Weekly) => (date - self.start).num_days() % 7 == 0,
            Some(RecurrencePattern::Monthly) => {
                let months = (date.year() - self.start.year()) * 12 + date.month() as i32
                    - self.start.month() as i32;
                u32::try_from(months)
                    .ok()
                    .and_then(|n| RecurrencePattern::Monthly.nth_from(self.start, n))
                    == Some(date)
            }
        }
    }
}

impl IntoIterator for Expansion {
    type Item = NaiveDate;
    type IntoIter = Dates;

    fn into_iter(self) -> Dates {
        self.iter()
    }
}

impl IntoIterator for &Expansion {
    type Item = NaiveDate;
    type IntoIter = Dates;

    fn into_iter(self) -> Dates {
        self.iter()
    }
}

/// Lazy iterator over the dates of an [`Expansion`].
#[derive(Debug, Clone)]
pub struct Dates {
    expansion: Expansion,
    index: u32,
    done: bool,
}

impl Iterator for Dates {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        if self.done {
            return None;
        }
        let candidate = match self.expansion.pattern {
            Some(pattern) => pattern.nth_from(self.expansion.start, self.index),
            None if self.index == 0 => Some(self.expansion.start),
            None => None,
        };
        match candidate {
            Some(date) if date <= self.expansion.end() => {
                self.index += 1;
                Some(date)
            }
            _ => {
                self.done = true;
                None
            }
        }
    }
}
