//! Date context — resolves relative time phrases to absolute dates.

use chrono::{Days, NaiveDate, Utc};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Absolute date boundaries for one request. Built fresh per query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateContext {
    pub today: NaiveDate,
    pub yesterday: NaiveDate,
    /// Start of "last week" (7 days back); the range ends today.
    pub last_week_start: NaiveDate,
    /// Start of "last month" (30 days back); the range ends today.
    pub last_month_start: NaiveDate,
}

impl DateContext {
    /// Context anchored on the given day.
    pub fn for_date(today: NaiveDate) -> Self {
        Self {
            today,
            yesterday: days_back(today, 1),
            last_week_start: days_back(today, 7),
            last_month_start: days_back(today, 30),
        }
    }

    /// Context anchored on the current UTC date, matching stored timestamps.
    pub fn now() -> Self {
        Self::for_date(Utc::now().date_naive())
    }

    /// `[start, end]` of "last week" as ISO dates.
    pub fn last_week(&self) -> (String, String) {
        (fmt(self.last_week_start), fmt(self.today))
    }

    /// `[start, end]` of "last month" as ISO dates.
    pub fn last_month(&self) -> (String, String) {
        (fmt(self.last_month_start), fmt(self.today))
    }

    /// Instruction block injected into the system prompt.
    pub fn render(&self) -> String {
        let (week_start, week_end) = self.last_week();
        let (month_start, month_end) = self.last_month();
        format!(
            "Today's date is {today}.\n\
             - \"Last week\" means from {week_start} to {week_end}\n\
             - \"Yesterday\" means {yesterday}\n\
             - \"Last month\" means from {month_start} to {month_end}",
            today = fmt(self.today),
            yesterday = fmt(self.yesterday),
        )
    }
}

fn days_back(day: NaiveDate, n: u64) -> NaiveDate {
    day.checked_sub_days(Days::new(n)).unwrap_or(NaiveDate::MIN)
}

fn fmt(day: NaiveDate) -> String {
    day.format(DATE_FORMAT).to_string()
}
