use std::fmt;
use std::slice;

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::{Date, Duration};

use crate::model::{Filter, HistoryEntry};

/// Lazy, restartable walk over the active filters that match a term.
/// Cloning restarts nothing; it forks the cursor at its current position.
#[derive(Debug, Clone)]
pub struct FilterSearch<'a> {
    inner: slice::Iter<'a, Filter>,
    term: String,
}

impl<'a> FilterSearch<'a> {
    pub fn new(filters: &'a [Filter], term: &str) -> Self {
        Self {
            inner: filters.iter(),
            term: normalize_term(term),
        }
    }

    pub fn term(&self) -> &str {
        &self.term
    }
}

impl<'a> Iterator for FilterSearch<'a> {
    type Item = &'a Filter;

    fn next(&mut self) -> Option<Self::Item> {
        let term = self.term.as_str();
        self.inner
            .by_ref()
            .find(|filter| filter.is_active && filter.matches_term(term))
    }
}

pub fn normalize_term(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HistoryRange {
    #[default]
    All,
    Last30Days,
    Last90Days,
    Last365Days,
}

impl HistoryRange {
    pub const ALL: [HistoryRange; 4] = [
        HistoryRange::All,
        HistoryRange::Last30Days,
        HistoryRange::Last90Days,
        HistoryRange::Last365Days,
    ];

    pub fn days(self) -> Option<i64> {
        match self {
            HistoryRange::All => None,
            HistoryRange::Last30Days => Some(30),
            HistoryRange::Last90Days => Some(90),
            HistoryRange::Last365Days => Some(365),
        }
    }

    pub fn from_days(days: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|range| range.days() == Some(days))
    }

    /// Earliest date still inside the range.
    pub fn cutoff(self, today: Date) -> Option<Date> {
        self.days()
            .and_then(|days| today.checked_sub(Duration::days(days)))
    }

    pub fn contains(self, date: Date, today: Date) -> bool {
        match self.cutoff(today) {
            Some(cutoff) => date >= cutoff,
            None => true,
        }
    }

    pub fn cycled(self) -> Self {
        match self {
            HistoryRange::All => HistoryRange::Last30Days,
            HistoryRange::Last30Days => HistoryRange::Last90Days,
            HistoryRange::Last90Days => HistoryRange::Last365Days,
            HistoryRange::Last365Days => HistoryRange::All,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            HistoryRange::All => "All time",
            HistoryRange::Last30Days => "Last 30 days",
            HistoryRange::Last90Days => "Last 90 days",
            HistoryRange::Last365Days => "Last year",
        }
    }
}

impl fmt::Display for HistoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Inclusive calendar span parsed from `YYYY-MM-DD`, `FROM..TO`, `FROM..`
/// or `..TO`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateSpan {
    pub from: Option<Date>,
    pub to: Option<Date>,
}

impl DateSpan {
    pub fn contains(&self, date: Date) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

pub fn parse_date_span(spec: &str) -> Option<DateSpan> {
    let parts: Vec<&str> = spec.trim().split("..").collect();
    match parts.as_slice() {
        [single] => {
            let day = parse_single_date(single)?;
            Some(DateSpan {
                from: Some(day),
                to: Some(day),
            })
        }
        [from, to] => {
            let from = match from.trim() {
                "" => None,
                raw => Some(parse_single_date(raw)?),
            };
            let to = match to.trim() {
                "" => None,
                raw => Some(parse_single_date(raw)?),
            };
            Some(DateSpan { from, to })
        }
        _ => None,
    }
}

pub fn parse_single_date(input: &str) -> Option<Date> {
    Date::parse(input.trim(), format_description!("[year]-[month]-[day]")).ok()
}

pub fn entries_in_span<'a>(
    history: &'a [HistoryEntry],
    span: DateSpan,
) -> impl Iterator<Item = &'a HistoryEntry> + Clone + 'a {
    history.iter().filter(move |entry| span.contains(entry.date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::filter;
    use time::macros::date;

    fn fleet() -> Vec<Filter> {
        let mut removed = filter("f3", "Removed Carbon", date!(2024 - 01 - 01), 6);
        removed.is_active = false;
        let mut membrane = filter("f2", "RO Membrane", date!(2024 - 01 - 01), 24);
        membrane.location = "Garage".into();
        membrane.filter_type = "Membrane".into();
        vec![
            filter("f1", "Sediment", date!(2024 - 01 - 01), 6),
            membrane,
            removed,
        ]
    }

    #[test]
    fn empty_term_yields_every_active_filter() {
        let filters = fleet();
        let ids: Vec<_> = FilterSearch::new(&filters, "  ")
            .map(|f| f.id.as_str())
            .collect();
        assert_eq!(ids, vec!["f1", "f2"]);
    }

    #[test]
    fn matches_name_location_and_type_case_insensitively() {
        let filters = fleet();
        let by_location: Vec<_> = FilterSearch::new(&filters, "GARAGE").collect();
        assert_eq!(by_location.len(), 1);
        assert_eq!(by_location[0].id, "f2");

        let by_type: Vec<_> = FilterSearch::new(&filters, "carbon")
            .map(|f| f.id.as_str())
            .collect();
        // f1 is typed Carbon; the removed "Removed Carbon" never shows up.
        assert_eq!(by_type, vec!["f1"]);
    }

    #[test]
    fn search_is_restartable() {
        let filters = fleet();
        let search = FilterSearch::new(&filters, "");
        let first: Vec<_> = search.clone().collect();
        let second: Vec<_> = search.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn history_ranges_cut_off_relative_to_today() {
        let today = date!(2024 - 06 - 30);
        assert!(HistoryRange::All.contains(date!(2000 - 01 - 01), today));
        assert!(HistoryRange::Last30Days.contains(date!(2024 - 05 - 31), today));
        assert!(!HistoryRange::Last30Days.contains(date!(2024 - 05 - 30), today));
        assert_eq!(HistoryRange::from_days(90), Some(HistoryRange::Last90Days));
        assert_eq!(HistoryRange::from_days(7), None);
        assert_eq!(HistoryRange::Last365Days.cycled(), HistoryRange::All);
    }

    #[test]
    fn parses_date_spans() {
        assert_eq!(
            parse_date_span("2024-01-01..2024-03-31"),
            Some(DateSpan {
                from: Some(date!(2024 - 01 - 01)),
                to: Some(date!(2024 - 03 - 31)),
            })
        );
        let open = parse_date_span("..2024-03-31").expect("open span");
        assert!(open.contains(date!(1999 - 01 - 01)));
        assert!(!open.contains(date!(2024 - 04 - 01)));
        assert_eq!(parse_date_span("yesterday"), None);
    }

    #[test]
    fn single_dates_are_iso_only() {
        assert_eq!(parse_single_date(" 2024-02-29 "), Some(date!(2024 - 02 - 29)));
        assert_eq!(parse_single_date("2023-02-29"), None);
        assert_eq!(parse_single_date("29/02/2024"), None);
        assert_eq!(parse_single_date(""), None);
    }
}
