use serde::{Deserialize, Deserializer, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use time::macros::time;
use time::{Date, Duration, OffsetDateTime, Time};
use uuid::Uuid;

pub const DEFAULT_REPLACEMENT_INTERVAL: u32 = 6;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");
time::serde::format_description!(clock_time, Time, "[hour]:[minute]");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub stage: String,
    #[serde(rename = "type", default)]
    pub filter_type: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub model: String,
    #[serde(with = "iso_date")]
    pub install_date: Date,
    #[serde(
        default = "default_interval",
        deserialize_with = "deserialize_interval"
    )]
    pub replacement_interval: u32,
    #[serde(with = "iso_date")]
    pub next_due_date: Date,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub cost: f64,
    #[serde(default)]
    pub notes: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub notification_settings: NotificationSettings,
}

impl Filter {
    /// Case-insensitive substring match over name, location and type.
    pub fn matches_term(&self, lowered_term: &str) -> bool {
        if lowered_term.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(lowered_term)
            || self.location.to_lowercase().contains(lowered_term)
            || self.filter_type.to_lowercase().contains(lowered_term)
    }
}

/// User-supplied fields for creating or editing a filter. `None` leaves the
/// current value untouched on update and falls back to a default on create.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterDraft {
    pub name: Option<String>,
    pub location: Option<String>,
    pub stage: Option<String>,
    pub filter_type: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub notes: Option<String>,
    pub install_date: Option<Date>,
    pub replacement_interval: Option<i64>,
    pub cost: Option<f64>,
    pub notification_settings: Option<NotificationSettings>,
}

impl FilterDraft {
    pub fn from_filter(filter: &Filter) -> Self {
        Self {
            name: Some(filter.name.clone()),
            location: Some(filter.location.clone()),
            stage: Some(filter.stage.clone()),
            filter_type: Some(filter.filter_type.clone()),
            brand: Some(filter.brand.clone()),
            model: Some(filter.model.clone()),
            notes: Some(filter.notes.clone()),
            install_date: Some(filter.install_date),
            replacement_interval: Some(i64::from(filter.replacement_interval)),
            cost: Some(filter.cost),
            notification_settings: Some(filter.notification_settings.clone()),
        }
    }
}

/// Non-numeric or non-positive intervals fall back to six months.
pub fn coerce_interval(raw: Option<i64>) -> u32 {
    match raw {
        Some(months) if months > 0 => u32::try_from(months).unwrap_or(DEFAULT_REPLACEMENT_INTERVAL),
        _ => DEFAULT_REPLACEMENT_INTERVAL,
    }
}

pub fn coerce_cost(raw: Option<f64>) -> f64 {
    match raw {
        Some(cost) if cost.is_finite() && cost >= 0.0 => cost,
        _ => 0.0,
    }
}

pub fn parse_interval_input(input: &str) -> Option<i64> {
    input.trim().parse::<i64>().ok()
}

pub fn parse_cost_input(input: &str) -> Option<f64> {
    input.trim().parse::<f64>().ok()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    pub buy_reminder: BuyReminder,
    pub replace_reminder: ReplaceReminder,
    pub critical_reminder: CriticalReminder,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            buy_reminder: BuyReminder::default(),
            replace_reminder: ReplaceReminder::default(),
            critical_reminder: CriticalReminder::default(),
        }
    }
}

impl NotificationSettings {
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if self.buy_reminder.enabled {
            parts.push("Buy");
        }
        if self.replace_reminder.enabled {
            parts.push("Replace");
        }
        if self.critical_reminder.enabled {
            parts.push("Critical");
        }
        if parts.is_empty() {
            "None".to_string()
        } else {
            parts.join(", ")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuyReminder {
    pub enabled: bool,
    /// Days before the due date of the first reminder.
    #[serde(deserialize_with = "deserialize_days")]
    pub timing: u32,
    pub frequency: Cadence,
    #[serde(with = "clock_time")]
    pub time: Time,
    /// Recurrence stops this many days after the first reminder; 0 never stops.
    #[serde(deserialize_with = "deserialize_days")]
    pub stop_days: u32,
}

impl Default for BuyReminder {
    fn default() -> Self {
        Self {
            enabled: true,
            timing: 14,
            frequency: Cadence::Weekly,
            time: time!(9:00),
            stop_days: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplaceReminder {
    pub enabled: bool,
    #[serde(deserialize_with = "deserialize_days")]
    pub timing: u32,
    pub frequency: Cadence,
    #[serde(with = "clock_time")]
    pub time: Time,
    pub overdue_escalation: Escalation,
}

impl Default for ReplaceReminder {
    fn default() -> Self {
        Self {
            enabled: true,
            timing: 1,
            frequency: Cadence::Daily,
            time: time!(10:00),
            overdue_escalation: Escalation::Every2Hours,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CriticalReminder {
    pub enabled: bool,
    /// Days past the due date before critical reminders start.
    #[serde(deserialize_with = "deserialize_days")]
    pub threshold: u32,
    pub frequency: Cadence,
}

impl Default for CriticalReminder {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 14,
            frequency: Cadence::Hourly,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
pub enum Cadence {
    #[serde(rename = "once")]
    #[strum(serialize = "once")]
    Once,
    #[serde(rename = "every-15-min")]
    #[strum(serialize = "every-15-min")]
    Every15Min,
    #[serde(rename = "every-30-min")]
    #[strum(serialize = "every-30-min")]
    Every30Min,
    #[serde(rename = "hourly", alias = "every-hour")]
    #[strum(to_string = "hourly", serialize = "every-hour")]
    Hourly,
    #[serde(rename = "every-2-hours")]
    #[strum(serialize = "every-2-hours")]
    Every2Hours,
    #[serde(rename = "every-6-hours")]
    #[strum(serialize = "every-6-hours")]
    Every6Hours,
    #[serde(rename = "twice-daily")]
    #[strum(serialize = "twice-daily")]
    TwiceDaily,
    #[serde(rename = "daily")]
    #[strum(serialize = "daily")]
    Daily,
    #[serde(rename = "every-3-days")]
    #[strum(serialize = "every-3-days")]
    Every3Days,
    #[serde(rename = "weekly")]
    #[strum(serialize = "weekly")]
    Weekly,
}

impl Cadence {
    /// Interval between recurring fires; `None` for one-shot reminders.
    pub fn interval(self) -> Option<Duration> {
        match self {
            Cadence::Once => None,
            Cadence::Every15Min => Some(Duration::minutes(15)),
            Cadence::Every30Min => Some(Duration::minutes(30)),
            Cadence::Hourly => Some(Duration::hours(1)),
            Cadence::Every2Hours => Some(Duration::hours(2)),
            Cadence::Every6Hours => Some(Duration::hours(6)),
            Cadence::TwiceDaily => Some(Duration::hours(12)),
            Cadence::Daily => Some(Duration::days(1)),
            Cadence::Every3Days => Some(Duration::days(3)),
            Cadence::Weekly => Some(Duration::days(7)),
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
pub enum Escalation {
    #[serde(rename = "none")]
    #[strum(serialize = "none")]
    Disabled,
    #[serde(rename = "hourly")]
    #[strum(serialize = "hourly")]
    Hourly,
    #[serde(rename = "every-2-hours")]
    #[strum(serialize = "every-2-hours")]
    Every2Hours,
    #[serde(rename = "every-6-hours")]
    #[strum(serialize = "every-6-hours")]
    Every6Hours,
}

impl Escalation {
    pub fn interval(self) -> Option<Duration> {
        match self {
            Escalation::Disabled => None,
            Escalation::Hourly => Some(Duration::hours(1)),
            Escalation::Every2Hours => Some(Duration::hours(2)),
            Escalation::Every6Hours => Some(Duration::hours(6)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub filter_id: String,
    pub filter_name: String,
    #[serde(with = "iso_date")]
    pub date: Date,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub cost: f64,
    #[serde(default)]
    pub notes: String,
    #[serde(rename = "type", default)]
    pub kind: HistoryKind,
}

impl HistoryEntry {
    pub fn replacement(filter: &Filter, date: Date) -> Self {
        Self {
            id: new_history_id(),
            filter_id: filter.id.clone(),
            filter_name: filter.name.clone(),
            date,
            cost: filter.cost,
            notes: format!("Filter replaced - {}", filter.name),
            kind: HistoryKind::Replacement,
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HistoryKind {
    #[default]
    Replacement,
    Note,
}

pub fn new_filter_id() -> String {
    format!("filter-{}", Uuid::new_v4().simple())
}

pub fn new_history_id() -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let suffix = Uuid::new_v4().simple().to_string();
    format!("history-{millis}-{}", &suffix[..8])
}

fn default_interval() -> u32 {
    DEFAULT_REPLACEMENT_INTERVAL
}

fn default_true() -> bool {
    true
}

// Browser-era records hold `null` where a form field was left blank.
fn deserialize_interval<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(coerce_interval(raw.filter(|v| v.is_finite()).map(|v| v as i64)))
}

fn deserialize_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(coerce_cost(raw))
}

fn deserialize_days<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(match raw {
        Some(days) if days.is_finite() && days >= 0.0 => days as u32,
        _ => 0,
    })
}
