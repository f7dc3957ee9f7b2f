use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::date_util::{
    end_of_day, first_day_of_month, first_day_of_previous_month, last_day_of_month, start_of_day,
};
use crate::error::{Error, Result};

/// The period a summary covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFilter {
    Today,
    Yesterday,
    #[default]
    #[serde(rename = "last_7_days")]
    Last7Days,
    ThisMonth,
    LastMonth,
    #[serde(rename = "last_6_months")]
    Last6Months,
    ThisYear,
    AllTime,
}

impl DateFilter {
    pub const ALL: [DateFilter; 8] = [
        DateFilter::Today,
        DateFilter::Yesterday,
        DateFilter::Last7Days,
        DateFilter::ThisMonth,
        DateFilter::LastMonth,
        DateFilter::Last6Months,
        DateFilter::ThisYear,
        DateFilter::AllTime,
    ];

    /// Parse a filter key.
    ///
    /// Accepts the canonical keys (`today`, `last_7_days`, ...) case-insensitively,
    /// with `-` allowed in place of `_`.
    pub fn parse(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|f| f.to_key() == normalized)
            .ok_or_else(|| Error::DateFilterParse(format!("unrecognized date filter: {s}")))
    }

    /// Canonical key string for storage/lookup.
    pub fn to_key(&self) -> &'static str {
        match self {
            DateFilter::Today => "today",
            DateFilter::Yesterday => "yesterday",
            DateFilter::Last7Days => "last_7_days",
            DateFilter::ThisMonth => "this_month",
            DateFilter::LastMonth => "last_month",
            DateFilter::Last6Months => "last_6_months",
            DateFilter::ThisYear => "this_year",
            DateFilter::AllTime => "all_time",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DateFilter::Today => "Today",
            DateFilter::Yesterday => "Yesterday",
            DateFilter::Last7Days => "Last 7 days",
            DateFilter::ThisMonth => "This month",
            DateFilter::LastMonth => "Last month",
            DateFilter::Last6Months => "Last 6 months",
            DateFilter::ThisYear => "This year",
            DateFilter::AllTime => "All time",
        }
    }

    /// Get the date range (inclusive start, inclusive end) relative to `today`.
    /// `AllTime` has no bounds.
    pub fn date_range(&self, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        match self {
            DateFilter::Today => Some((today, today)),
            DateFilter::Yesterday => {
                let y = today - Duration::days(1);
                Some((y, y))
            }
            DateFilter::Last7Days => Some((today - Duration::days(6), today)),
            DateFilter::ThisMonth => Some((first_day_of_month(today), today)),
            DateFilter::LastMonth => {
                let start = first_day_of_previous_month(today);
                Some((start, last_day_of_month(start.year(), start.month())))
            }
            DateFilter::Last6Months => {
                let start = today.checked_sub_months(Months::new(6)).unwrap_or(today);
                Some((start, today))
            }
            DateFilter::ThisYear => {
                let start = today.with_ordinal(1).unwrap_or(today);
                Some((start, today))
            }
            DateFilter::AllTime => None,
        }
    }
}

impl std::fmt::Display for DateFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_key())
    }
}

impl std::str::FromStr for DateFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Inclusive instant bounds a task's `created_at` is tested against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Resolve a filter against the wall clock `now`, using day boundaries of
    /// `now`'s time zone. Returns `None` for `AllTime`.
    pub fn for_filter<Tz: TimeZone>(filter: DateFilter, now: &DateTime<Tz>) -> Option<Self> {
        let tz = now.timezone();
        let (start, end) = filter.date_range(now.date_naive())?;
        Some(Self {
            start: start_of_day(&tz, start),
            end: end_of_day(&tz, end),
        })
    }

    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        *at >= self.start && *at <= self.end
    }
}
