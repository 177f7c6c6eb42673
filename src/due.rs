use std::fmt;

use time::macros::format_description;
use time::{util, Date, Month};

pub const DUE_SOON_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterStatus {
    Overdue,
    DueSoon,
    Good,
}

impl FilterStatus {
    pub fn label(self) -> &'static str {
        match self {
            FilterStatus::Overdue => "overdue",
            FilterStatus::DueSoon => "due-soon",
            FilterStatus::Good => "good",
        }
    }
}

impl fmt::Display for FilterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Calendar month addition. Days past the end of the target month clamp to
/// its last day, so Jan 31 + 1 month is Feb 28 (or 29).
pub fn add_months(date: Date, months: u32) -> Date {
    let zero_based = i64::from(date.year()) * 12 + i64::from(u8::from(date.month())) - 1;
    let target = zero_based + i64::from(months);
    let year = target.div_euclid(12);
    let month_number = (target.rem_euclid(12) + 1) as u8;
    let (Ok(year), Ok(month)) = (i32::try_from(year), Month::try_from(month_number)) else {
        return date;
    };
    let day = date.day().min(util::days_in_year_month(year, month));
    Date::from_calendar_date(year, month, day).unwrap_or(date)
}

/// Whole days until `next_due`; negative once the date has passed.
pub fn days_until_due(next_due: Date, today: Date) -> i64 {
    (next_due - today).whole_days()
}

pub fn status(days_until_due: i64) -> FilterStatus {
    if days_until_due < 0 {
        FilterStatus::Overdue
    } else if days_until_due <= DUE_SOON_WINDOW_DAYS {
        FilterStatus::DueSoon
    } else {
        FilterStatus::Good
    }
}

pub fn status_text(status: FilterStatus, days_until_due: i64) -> String {
    let days = days_until_due.abs();
    match status {
        FilterStatus::Overdue => format!("Overdue by {days} days"),
        FilterStatus::DueSoon => format!("Due in {days} days"),
        FilterStatus::Good => format!("{days} days remaining"),
    }
}

/// Status and label for a due date in one call, as every view needs both.
pub fn describe(next_due: Date, today: Date) -> (FilterStatus, i64, String) {
    let days = days_until_due(next_due, today);
    let status = status(days);
    (status, days, status_text(status, days))
}

pub fn format_date(date: Date) -> String {
    date.format(&format_description!(
        "[month repr:short] [day padding:none], [year]"
    ))
    .unwrap_or_else(|_| date.to_string())
}
