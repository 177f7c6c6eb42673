use std::str::FromStr;

use strum::IntoEnumIterator;
use time::macros::format_description;
use time::{Date, Time};

use crate::due::format_date;
use crate::model::{
    parse_cost_input, parse_interval_input, BuyReminder, Cadence, CriticalReminder, Escalation,
    Filter, FilterDraft, NotificationSettings, ReplaceReminder, DEFAULT_REPLACEMENT_INTERVAL,
};
use crate::search::parse_single_date;

const MAX_FIELD_LEN: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Toggle,
    Choice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldId {
    Name,
    Location,
    Stage,
    FilterType,
    Brand,
    Model,
    InstallDate,
    Interval,
    Cost,
    Notes,
    BuyEnabled,
    BuyTiming,
    BuyFrequency,
    BuyTime,
    BuyStopDays,
    ReplaceEnabled,
    ReplaceTiming,
    ReplaceFrequency,
    ReplaceTime,
    Escalation,
    CriticalEnabled,
    CriticalThreshold,
    CriticalFrequency,
}

impl FieldId {
    pub const ALL: [FieldId; 23] = [
        FieldId::Name,
        FieldId::Location,
        FieldId::Stage,
        FieldId::FilterType,
        FieldId::Brand,
        FieldId::Model,
        FieldId::InstallDate,
        FieldId::Interval,
        FieldId::Cost,
        FieldId::Notes,
        FieldId::BuyEnabled,
        FieldId::BuyTiming,
        FieldId::BuyFrequency,
        FieldId::BuyTime,
        FieldId::BuyStopDays,
        FieldId::ReplaceEnabled,
        FieldId::ReplaceTiming,
        FieldId::ReplaceFrequency,
        FieldId::ReplaceTime,
        FieldId::Escalation,
        FieldId::CriticalEnabled,
        FieldId::CriticalThreshold,
        FieldId::CriticalFrequency,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FieldId::Name => "Name",
            FieldId::Location => "Location",
            FieldId::Stage => "Stage",
            FieldId::FilterType => "Type",
            FieldId::Brand => "Brand",
            FieldId::Model => "Model",
            FieldId::InstallDate => "Installed (YYYY-MM-DD)",
            FieldId::Interval => "Interval (months)",
            FieldId::Cost => "Cost",
            FieldId::Notes => "Notes",
            FieldId::BuyEnabled => "Buy reminder",
            FieldId::BuyTiming => "  days before due",
            FieldId::BuyFrequency => "  repeat",
            FieldId::BuyTime => "  at (HH:MM)",
            FieldId::BuyStopDays => "  stop after days",
            FieldId::ReplaceEnabled => "Replace reminder",
            FieldId::ReplaceTiming => "  days before due",
            FieldId::ReplaceFrequency => "  repeat",
            FieldId::ReplaceTime => "  at (HH:MM)",
            FieldId::Escalation => "  when overdue",
            FieldId::CriticalEnabled => "Critical reminder",
            FieldId::CriticalThreshold => "  days past due",
            FieldId::CriticalFrequency => "  repeat",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            FieldId::BuyEnabled | FieldId::ReplaceEnabled | FieldId::CriticalEnabled => {
                FieldKind::Toggle
            }
            FieldId::BuyFrequency
            | FieldId::ReplaceFrequency
            | FieldId::CriticalFrequency
            | FieldId::Escalation => FieldKind::Choice,
            _ => FieldKind::Text,
        }
    }

    fn options(self) -> Vec<String> {
        match self.kind() {
            FieldKind::Toggle => vec!["yes".to_string(), "no".to_string()],
            FieldKind::Choice if self == FieldId::Escalation => {
                Escalation::iter().map(|e| e.to_string()).collect()
            }
            FieldKind::Choice => Cadence::iter().map(|c| c.to_string()).collect(),
            FieldKind::Text => Vec::new(),
        }
    }
}

/// Editable text for every field of a filter, including its reminder
/// settings. Choice and toggle fields only take values from their option
/// list; everything else is free text validated on submit.
#[derive(Debug, Clone)]
pub struct FilterForm {
    editing: Option<String>,
    values: Vec<String>,
    focus: usize,
    error: Option<String>,
}

impl FilterForm {
    pub fn blank(today: Date) -> Self {
        let mut form = Self::with_settings(None, &NotificationSettings::default());
        form.set(FieldId::InstallDate, iso(today));
        form.set(FieldId::Interval, DEFAULT_REPLACEMENT_INTERVAL.to_string());
        form
    }

    pub fn edit(filter: &Filter) -> Self {
        let mut form = Self::with_settings(Some(filter.id.clone()), &filter.notification_settings);
        form.set(FieldId::Name, filter.name.clone());
        form.set(FieldId::Location, filter.location.clone());
        form.set(FieldId::Stage, filter.stage.clone());
        form.set(FieldId::FilterType, filter.filter_type.clone());
        form.set(FieldId::Brand, filter.brand.clone());
        form.set(FieldId::Model, filter.model.clone());
        form.set(FieldId::InstallDate, iso(filter.install_date));
        form.set(FieldId::Interval, filter.replacement_interval.to_string());
        form.set(FieldId::Cost, trim_amount(filter.cost));
        form.set(FieldId::Notes, filter.notes.clone());
        form
    }

    fn with_settings(editing: Option<String>, settings: &NotificationSettings) -> Self {
        let mut form = Self {
            editing,
            values: vec![String::new(); FieldId::ALL.len()],
            focus: 0,
            error: None,
        };
        let buy = &settings.buy_reminder;
        let replace = &settings.replace_reminder;
        let critical = &settings.critical_reminder;
        form.set(FieldId::BuyEnabled, yes_no(buy.enabled));
        form.set(FieldId::BuyTiming, buy.timing.to_string());
        form.set(FieldId::BuyFrequency, buy.frequency.to_string());
        form.set(FieldId::BuyTime, hh_mm(buy.time));
        form.set(FieldId::BuyStopDays, buy.stop_days.to_string());
        form.set(FieldId::ReplaceEnabled, yes_no(replace.enabled));
        form.set(FieldId::ReplaceTiming, replace.timing.to_string());
        form.set(FieldId::ReplaceFrequency, replace.frequency.to_string());
        form.set(FieldId::ReplaceTime, hh_mm(replace.time));
        form.set(FieldId::Escalation, replace.overdue_escalation.to_string());
        form.set(FieldId::CriticalEnabled, yes_no(critical.enabled));
        form.set(FieldId::CriticalThreshold, critical.threshold.to_string());
        form.set(FieldId::CriticalFrequency, critical.frequency.to_string());
        form
    }

    pub fn editing(&self) -> Option<&str> {
        self.editing.as_deref()
    }

    pub fn title(&self) -> &'static str {
        if self.editing.is_some() {
            "Edit filter"
        } else {
            "Add filter"
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (FieldId, &str)> {
        FieldId::ALL
            .iter()
            .copied()
            .zip(self.values.iter().map(String::as_str))
    }

    pub fn value(&self, field: FieldId) -> &str {
        &self.values[index_of(field)]
    }

    pub fn focused(&self) -> FieldId {
        FieldId::ALL[self.focus]
    }

    pub fn focus_index(&self) -> usize {
        self.focus
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn focus_next(&mut self) {
        self.focus = (self.focus + 1) % FieldId::ALL.len();
    }

    pub fn focus_previous(&mut self) {
        self.focus = (self.focus + FieldId::ALL.len() - 1) % FieldId::ALL.len();
    }

    pub fn push_char(&mut self, ch: char) {
        let field = self.focused();
        match field.kind() {
            FieldKind::Text => {
                let value = &mut self.values[self.focus];
                if value.chars().count() < MAX_FIELD_LEN {
                    value.push(ch);
                }
            }
            FieldKind::Toggle | FieldKind::Choice if ch == ' ' => self.cycle(true),
            _ => {}
        }
        self.error = None;
    }

    pub fn pop_char(&mut self) {
        if self.focused().kind() == FieldKind::Text {
            self.values[self.focus].pop();
        }
    }

    /// Steps a toggle or choice field through its options.
    pub fn cycle(&mut self, forward: bool) {
        let options = self.focused().options();
        if options.is_empty() {
            return;
        }
        let current = options
            .iter()
            .position(|option| *option == self.values[self.focus])
            .unwrap_or(0);
        let next = if forward {
            (current + 1) % options.len()
        } else {
            (current + options.len() - 1) % options.len()
        };
        self.values[self.focus] = options[next].clone();
        self.error = None;
    }

    /// Blank or non-numeric interval and cost fall back to their defaults;
    /// dates, times and day counts must parse.
    pub fn to_draft(&self) -> Result<FilterDraft, String> {
        let install_date = parse_single_date(self.value(FieldId::InstallDate)).ok_or_else(|| {
            format!(
                "Install date must look like 2025-01-15, got '{}'",
                self.value(FieldId::InstallDate)
            )
        })?;
        let notification_settings = NotificationSettings {
            buy_reminder: BuyReminder {
                enabled: self.flag(FieldId::BuyEnabled),
                timing: self.days(FieldId::BuyTiming)?,
                frequency: self.cadence(FieldId::BuyFrequency)?,
                time: self.clock(FieldId::BuyTime)?,
                stop_days: self.days(FieldId::BuyStopDays)?,
            },
            replace_reminder: ReplaceReminder {
                enabled: self.flag(FieldId::ReplaceEnabled),
                timing: self.days(FieldId::ReplaceTiming)?,
                frequency: self.cadence(FieldId::ReplaceFrequency)?,
                time: self.clock(FieldId::ReplaceTime)?,
                overdue_escalation: Escalation::from_str(self.value(FieldId::Escalation))
                    .map_err(|_| "Unknown overdue escalation".to_string())?,
            },
            critical_reminder: CriticalReminder {
                enabled: self.flag(FieldId::CriticalEnabled),
                threshold: self.days(FieldId::CriticalThreshold)?,
                frequency: self.cadence(FieldId::CriticalFrequency)?,
            },
        };
        Ok(FilterDraft {
            name: Some(self.text(FieldId::Name)),
            location: Some(self.text(FieldId::Location)),
            stage: Some(self.text(FieldId::Stage)),
            filter_type: Some(self.text(FieldId::FilterType)),
            brand: Some(self.text(FieldId::Brand)),
            model: Some(self.text(FieldId::Model)),
            notes: Some(self.text(FieldId::Notes)),
            install_date: Some(install_date),
            replacement_interval: Some(
                parse_interval_input(self.value(FieldId::Interval)).unwrap_or(0),
            ),
            cost: Some(parse_cost_input(self.value(FieldId::Cost)).unwrap_or(0.0)),
            notification_settings: Some(notification_settings),
        })
    }

    /// One-line preview of the date the form would produce.
    pub fn install_preview(&self) -> Option<String> {
        parse_single_date(self.value(FieldId::InstallDate)).map(format_date)
    }

    fn set(&mut self, field: FieldId, value: String) {
        self.values[index_of(field)] = value;
    }

    fn text(&self, field: FieldId) -> String {
        self.value(field).trim().to_string()
    }

    fn flag(&self, field: FieldId) -> bool {
        self.value(field) == "yes"
    }

    fn days(&self, field: FieldId) -> Result<u32, String> {
        let raw = self.value(field).trim();
        raw.parse::<u32>()
            .map_err(|_| format!("{} must be a whole number, got '{raw}'", field.label().trim()))
    }

    fn cadence(&self, field: FieldId) -> Result<Cadence, String> {
        Cadence::from_str(self.value(field))
            .map_err(|_| format!("Unknown repeat '{}'", self.value(field)))
    }

    fn clock(&self, field: FieldId) -> Result<Time, String> {
        let raw = self.value(field).trim();
        Time::parse(raw, format_description!("[hour]:[minute]"))
            .map_err(|_| format!("Reminder time must be HH:MM, got '{raw}'"))
    }
}

fn index_of(field: FieldId) -> usize {
    FieldId::ALL
        .iter()
        .position(|candidate| *candidate == field)
        .unwrap_or(0)
}

fn yes_no(flag: bool) -> String {
    let label = if flag { "yes" } else { "no" };
    label.to_string()
}

fn iso(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

fn hh_mm(time: Time) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}

fn trim_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else {
        amount.to_string()
    }
}
