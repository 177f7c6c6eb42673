use time::Date;

use crate::due::{self, FilterStatus};
use crate::model::{Filter, HistoryEntry};

pub const BOTTLES_PER_REPLACEMENT: u64 = 600;
const CO2_LBS_PER_BOTTLE: f64 = 0.16;
const WASTE_LBS_PER_BOTTLE: f64 = 0.032;
const DAYS_PER_MONTH: f64 = 30.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub total: usize,
    pub overdue: usize,
    pub due_soon: usize,
    pub good: usize,
}

pub fn status_counts<'a, I>(filters: I, today: Date) -> StatusCounts
where
    I: IntoIterator<Item = &'a Filter>,
{
    filters
        .into_iter()
        .filter(|filter| filter.is_active)
        .fold(StatusCounts::default(), |mut counts, filter| {
            counts.total += 1;
            match due::status(due::days_until_due(filter.next_due_date, today)) {
                FilterStatus::Overdue => counts.overdue += 1,
                FilterStatus::DueSoon => counts.due_soon += 1,
                FilterStatus::Good => counts.good += 1,
            }
            counts
        })
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostStats {
    pub total: f64,
    pub average: f64,
    pub monthly: f64,
    pub yearly_projection: f64,
}

/// Spend derived from history. The monthly rate spreads the total over the
/// months since the oldest entry, never fewer than one.
pub fn cost_stats(history: &[HistoryEntry], today: Date) -> CostStats {
    if history.is_empty() {
        return CostStats::default();
    }
    let total: f64 = history.iter().map(|entry| entry.cost).sum();
    let average = total / history.len() as f64;
    let oldest = history
        .iter()
        .map(|entry| entry.date)
        .min()
        .unwrap_or(today);
    let elapsed_days = (today - oldest).whole_days() as f64;
    let months = (elapsed_days / DAYS_PER_MONTH).max(1.0);
    let monthly = total / months;
    CostStats {
        total,
        average,
        monthly,
        yearly_projection: monthly * 12.0,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Impact {
    pub replacements: usize,
    pub bottles_saved: u64,
    pub co2_saved_lbs: u64,
    pub waste_reduced_lbs: u64,
}

pub fn impact(history: &[HistoryEntry]) -> Impact {
    let replacements = history.len();
    let bottles_saved = replacements as u64 * BOTTLES_PER_REPLACEMENT;
    Impact {
        replacements,
        bottles_saved,
        co2_saved_lbs: (bottles_saved as f64 * CO2_LBS_PER_BOTTLE).round() as u64,
        waste_reduced_lbs: (bottles_saved as f64 * WASTE_LBS_PER_BOTTLE).round() as u64,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterPerformance {
    pub filter_id: String,
    pub name: String,
    pub filter_type: String,
    pub replacement_interval: u32,
    pub replacements: usize,
    pub total_cost: f64,
    pub cost_per_month: f64,
    pub notifications: String,
}

/// Per-filter spend, most expensive per month first. Filters without history
/// are costed from their unit price over one interval.
pub fn performance<'a, I>(filters: I, history: &[HistoryEntry]) -> Vec<FilterPerformance>
where
    I: IntoIterator<Item = &'a Filter>,
{
    let mut rows: Vec<FilterPerformance> = filters
        .into_iter()
        .filter(|filter| filter.is_active)
        .map(|filter| {
            let (replacements, total_cost) = history
                .iter()
                .filter(|entry| entry.filter_id == filter.id)
                .fold((0usize, 0.0f64), |(count, sum), entry| {
                    (count + 1, sum + entry.cost)
                });
            let interval = f64::from(filter.replacement_interval.max(1));
            let cost_per_month = if replacements > 0 {
                total_cost / (replacements as f64 * interval)
            } else {
                filter.cost / interval
            };
            FilterPerformance {
                filter_id: filter.id.clone(),
                name: filter.name.clone(),
                filter_type: filter.filter_type.clone(),
                replacement_interval: filter.replacement_interval,
                replacements,
                total_cost,
                cost_per_month,
                notifications: filter.notification_settings.summary(),
            }
        })
        .collect();
    rows.sort_by(|a, b| b.cost_per_month.total_cmp(&a.cost_per_month));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::filter;
    use time::macros::date;

    fn entry(filter: &Filter, date: Date, cost: f64) -> HistoryEntry {
        let mut entry = HistoryEntry::replacement(filter, date);
        entry.cost = cost;
        entry
    }

    #[test]
    fn counts_by_status_ignoring_removed() {
        let today = date!(2024 - 06 - 15);
        let overdue = filter("a", "A", date!(2023 - 01 - 01), 6);
        let due_soon = filter("b", "B", date!(2024 - 01 - 01), 6);
        let good = filter("c", "C", date!(2024 - 06 - 01), 12);
        let mut removed = filter("d", "D", date!(2023 - 01 - 01), 6);
        removed.is_active = false;

        let counts = status_counts([&overdue, &due_soon, &good, &removed], today);
        assert_eq!(
            counts,
            StatusCounts {
                total: 3,
                overdue: 1,
                due_soon: 1,
                good: 1,
            }
        );
    }

    #[test]
    fn empty_history_has_zero_costs() {
        assert_eq!(cost_stats(&[], date!(2024 - 01 - 01)), CostStats::default());
        assert_eq!(impact(&[]).bottles_saved, 0);
    }

    #[test]
    fn monthly_cost_spreads_over_elapsed_months() {
        let f = filter("a", "A", date!(2024 - 01 - 01), 6);
        let history = vec![
            entry(&f, date!(2024 - 06 - 30), 100.0),
            entry(&f, date!(2024 - 04 - 01), 200.0),
        ];
        // 90 days since the oldest entry is three months.
        let stats = cost_stats(&history, date!(2024 - 06 - 30));
        assert_eq!(stats.total, 300.0);
        assert_eq!(stats.average, 150.0);
        assert_eq!(stats.monthly, 100.0);
        assert_eq!(stats.yearly_projection, 1200.0);
    }

    #[test]
    fn recent_history_counts_as_one_month() {
        let f = filter("a", "A", date!(2024 - 01 - 01), 6);
        let history = vec![entry(&f, date!(2024 - 06 - 20), 90.0)];
        let stats = cost_stats(&history, date!(2024 - 06 - 30));
        assert_eq!(stats.monthly, 90.0);
    }

    #[test]
    fn impact_rounds_to_whole_pounds() {
        let f = filter("a", "A", date!(2024 - 01 - 01), 6);
        let history = vec![
            entry(&f, date!(2024 - 01 - 01), 0.0),
            entry(&f, date!(2024 - 02 - 01), 0.0),
            entry(&f, date!(2024 - 03 - 01), 0.0),
        ];
        let impact = impact(&history);
        assert_eq!(impact.bottles_saved, 1800);
        assert_eq!(impact.co2_saved_lbs, 288);
        assert_eq!(impact.waste_reduced_lbs, 58);
    }

    #[test]
    fn performance_sorts_by_cost_per_month() {
        let cheap = filter("cheap", "Cheap", date!(2024 - 01 - 01), 12);
        let mut pricey = filter("pricey", "Pricey", date!(2024 - 01 - 01), 6);
        pricey.cost = 600.0;
        let history = vec![
            entry(&cheap, date!(2024 - 01 - 01), 120.0),
            entry(&cheap, date!(2023 - 01 - 01), 120.0),
        ];

        let rows = performance([&cheap, &pricey], &history);
        assert_eq!(rows[0].filter_id, "pricey");
        assert_eq!(rows[0].cost_per_month, 100.0);
        assert_eq!(rows[0].replacements, 0);
        assert_eq!(rows[1].replacements, 2);
        assert_eq!(rows[1].total_cost, 240.0);
        assert_eq!(rows[1].cost_per_month, 10.0);
        assert_eq!(rows[1].notifications, "Buy, Replace");
    }
}
