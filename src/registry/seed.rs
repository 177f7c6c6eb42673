use time::macros::date;
use time::Date;

use crate::due::add_months;
use crate::model::{
    BuyReminder, Cadence, CriticalReminder, Escalation, Filter, NotificationSettings,
    ReplaceReminder,
};

const LOCATION: &str = "RO System - Kitchen";
const BRAND: &str = "APEC";

struct Stage {
    number: u8,
    name: &'static str,
    kind: &'static str,
    model: &'static str,
    installed: Date,
    months: u32,
    cost: f64,
    notes: &'static str,
    buy_timing: u32,
    buy_stop_days: u32,
    replace_timing: u32,
    escalation: Escalation,
    critical_threshold: Option<u32>,
}

const STAGES: [Stage; 7] = [
    Stage {
        number: 1,
        name: "Sediment Pre-Filter",
        kind: "Sediment",
        model: "FI-SED-10",
        installed: date!(2024 - 03 - 15),
        months: 6,
        cost: 240.0,
        notes: "First stage - removes sediment, dirt, and rust particles",
        buy_timing: 14,
        buy_stop_days: 7,
        replace_timing: 1,
        escalation: Escalation::Every2Hours,
        critical_threshold: None,
    },
    Stage {
        number: 2,
        name: "Carbon Pre-Filter",
        kind: "Carbon",
        model: "FI-GAC-10",
        installed: date!(2024 - 04 - 01),
        months: 6,
        cost: 288.0,
        notes: "Second stage - removes chlorine, taste, and odor",
        buy_timing: 14,
        buy_stop_days: 7,
        replace_timing: 1,
        escalation: Escalation::Every2Hours,
        critical_threshold: None,
    },
    Stage {
        number: 3,
        name: "Carbon Block Filter",
        kind: "Carbon Block",
        model: "FI-CB-10",
        installed: date!(2024 - 01 - 20),
        months: 9,
        cost: 400.0,
        notes: "Third stage - final pre-filtration before RO membrane",
        buy_timing: 21,
        buy_stop_days: 14,
        replace_timing: 3,
        escalation: Escalation::Every2Hours,
        critical_threshold: None,
    },
    Stage {
        number: 4,
        name: "RO Membrane",
        kind: "RO Membrane",
        model: "MEM-75-RO",
        installed: date!(2023 - 08 - 10),
        months: 24,
        cost: 1360.0,
        notes: "Fourth stage - reverse osmosis membrane for pure water",
        buy_timing: 30,
        buy_stop_days: 14,
        replace_timing: 7,
        escalation: Escalation::Every6Hours,
        critical_threshold: Some(30),
    },
    Stage {
        number: 5,
        name: "Post Carbon Filter",
        kind: "Post Carbon",
        model: "FI-GAC-T33",
        installed: date!(2023 - 12 - 05),
        months: 12,
        cost: 352.0,
        notes: "Fifth stage - final taste and odor polishing",
        buy_timing: 21,
        buy_stop_days: 7,
        replace_timing: 3,
        escalation: Escalation::Every2Hours,
        critical_threshold: None,
    },
    Stage {
        number: 6,
        name: "Alkaline Mineral Filter",
        kind: "Mineral",
        model: "FI-AL-10",
        installed: date!(2024 - 02 - 28),
        months: 12,
        cost: 560.0,
        notes: "Sixth stage - adds beneficial minerals and balances pH",
        buy_timing: 21,
        buy_stop_days: 7,
        replace_timing: 3,
        escalation: Escalation::Every2Hours,
        critical_threshold: None,
    },
    Stage {
        number: 7,
        name: "UV Sterilizer Lamp",
        kind: "UV Lamp",
        model: "UV-11W",
        installed: date!(2024 - 01 - 15),
        months: 12,
        cost: 720.0,
        notes: "Seventh stage - UV sterilization for bacteria-free water",
        buy_timing: 30,
        buy_stop_days: 14,
        replace_timing: 7,
        escalation: Escalation::Every6Hours,
        critical_threshold: Some(14),
    },
];

/// Sample seven-stage reverse-osmosis system shown on first run.
pub fn demo_filters() -> Vec<Filter> {
    STAGES.iter().map(Stage::to_filter).collect()
}

impl Stage {
    fn to_filter(&self) -> Filter {
        let defaults = NotificationSettings::default();
        Filter {
            id: format!("stage-{}", self.number),
            name: self.name.to_string(),
            location: LOCATION.to_string(),
            stage: format!("Stage {}", self.number),
            filter_type: self.kind.to_string(),
            brand: BRAND.to_string(),
            model: self.model.to_string(),
            install_date: self.installed,
            replacement_interval: self.months,
            next_due_date: add_months(self.installed, self.months),
            cost: self.cost,
            notes: self.notes.to_string(),
            is_active: true,
            notification_settings: NotificationSettings {
                buy_reminder: BuyReminder {
                    timing: self.buy_timing,
                    stop_days: self.buy_stop_days,
                    ..defaults.buy_reminder
                },
                replace_reminder: ReplaceReminder {
                    timing: self.replace_timing,
                    overdue_escalation: self.escalation,
                    ..defaults.replace_reminder
                },
                critical_reminder: CriticalReminder {
                    enabled: self.critical_threshold.is_some(),
                    threshold: self.critical_threshold.unwrap_or(14),
                    frequency: Cadence::Hourly,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_seven_stages_with_consistent_due_dates() {
        let filters = demo_filters();
        assert_eq!(filters.len(), 7);
        let membrane = &filters[3];
        assert_eq!(membrane.id, "stage-4");
        assert_eq!(membrane.next_due_date, date!(2025 - 08 - 10));
        assert!(membrane.notification_settings.critical_reminder.enabled);
        assert_eq!(membrane.notification_settings.critical_reminder.threshold, 30);
        assert!(!filters[0].notification_settings.critical_reminder.enabled);
        assert!(filters
            .iter()
            .all(|f| f.next_due_date == add_months(f.install_date, f.replacement_interval)));
    }
}
