use std::fmt;

use indexmap::IndexMap;
use time::{Duration, PrimitiveDateTime};

use crate::due;
use crate::model::{Cadence, Filter};

pub mod notify;
pub mod runtime;

pub use notify::{ChannelNotifier, Notifier, Permission, StdoutNotifier};
pub use runtime::{ReminderRuntime, ReminderStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Buy,
    Replace,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Variant {
    Initial,
    Recurring,
    Overdue,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimerKey {
    pub filter_id: String,
    pub channel: Channel,
    pub variant: Variant,
}

impl TimerKey {
    fn new(filter_id: &str, channel: Channel, variant: Variant) -> Self {
        Self {
            filter_id: filter_id.to_string(),
            channel,
            variant,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmedTimer {
    pub fire_at: PrimitiveDateTime,
    /// Repeat interval after firing. An `Initial` timer with an interval
    /// hands over to a `Recurring` one.
    pub every: Option<Duration>,
    /// Recurrence never fires after this instant.
    pub stop_at: Option<PrimitiveDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReminderKind {
    Buy,
    Replace,
    Overdue,
    Critical,
}

impl ReminderKind {
    fn of(key: &TimerKey) -> Self {
        match (key.channel, key.variant) {
            (Channel::Critical, _) | (_, Variant::Critical) => ReminderKind::Critical,
            (_, Variant::Overdue) => ReminderKind::Overdue,
            (Channel::Buy, _) => ReminderKind::Buy,
            (Channel::Replace, _) => ReminderKind::Replace,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ReminderKind::Buy => "Time to buy new filter",
            ReminderKind::Replace => "Time to replace filter",
            ReminderKind::Overdue => "Filter overdue!",
            ReminderKind::Critical => "CRITICAL: filter overdue",
        }
    }

    /// Interactive notifications stay on screen until dismissed.
    pub fn interactive(self) -> bool {
        !matches!(self, ReminderKind::Buy)
    }
}

impl fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReminderKind::Buy => "buy",
            ReminderKind::Replace => "replace",
            ReminderKind::Overdue => "overdue",
            ReminderKind::Critical => "critical",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub filter_id: String,
    pub kind: ReminderKind,
    pub title: String,
    pub body: String,
    pub interactive: bool,
    pub fired_at: PrimitiveDateTime,
}

impl Notification {
    fn compose(kind: ReminderKind, filter: &Filter, now: PrimitiveDateTime) -> Self {
        let (_, _, status) = due::describe(filter.next_due_date, now.date());
        let location = if filter.location.is_empty() {
            String::new()
        } else {
            format!(" ({})", filter.location)
        };
        Self {
            filter_id: filter.id.clone(),
            kind,
            title: kind.title().to_string(),
            body: format!("{}{location}: {status}", filter.name),
            interactive: kind.interactive(),
            fired_at: now,
        }
    }
}

/// Timer table for every `(filter, channel, variant)` reminder. Nothing runs
/// on its own: callers drive it with `tick`, and `reschedule` rebuilds the
/// table from scratch after any change to the filters.
#[derive(Debug, Default)]
pub struct Scheduler {
    timers: IndexMap<TimerKey, ArmedTimer>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn timers(&self) -> impl Iterator<Item = (&TimerKey, &ArmedTimer)> {
        self.timers.iter()
    }

    pub fn get(&self, key: &TimerKey) -> Option<&ArmedTimer> {
        self.timers.get(key)
    }

    pub fn next_fire(&self) -> Option<(&TimerKey, &ArmedTimer)> {
        self.timers.iter().min_by_key(|(_, timer)| timer.fire_at)
    }

    pub fn cancel_all(&mut self) {
        self.timers.clear();
    }

    /// Cancels every timer and re-arms from the current filter state.
    pub fn reschedule<'a, I>(&mut self, filters: I, enabled: bool, now: PrimitiveDateTime)
    where
        I: IntoIterator<Item = &'a Filter>,
    {
        self.cancel_all();
        if !enabled {
            return;
        }
        for filter in filters.into_iter().filter(|filter| filter.is_active) {
            self.arm_buy(filter, now);
            self.arm_replace(filter, now);
            self.arm_critical(filter, now);
        }
        tracing::debug!(armed = self.timers.len(), "reminders rescheduled");
    }

    /// Fires every timer due at `now`. Filters are looked up again by id, so
    /// text reflects the latest state; timers of vanished filters are dropped.
    pub fn tick(&mut self, now: PrimitiveDateTime, filters: &[Filter]) -> Vec<Notification> {
        let due_keys: Vec<TimerKey> = self
            .timers
            .iter()
            .filter(|(_, timer)| timer.fire_at <= now)
            .map(|(key, _)| key.clone())
            .collect();

        let mut fired = Vec::with_capacity(due_keys.len());
        for key in due_keys {
            let Some(timer) = self.timers.shift_remove(&key) else {
                continue;
            };
            let Some(filter) = filters
                .iter()
                .find(|filter| filter.id == key.filter_id && filter.is_active)
            else {
                tracing::debug!(filter_id = %key.filter_id, "dropping timer for missing filter");
                continue;
            };
            if !channel_enabled(filter, key.channel) {
                continue;
            }

            let notification = Notification::compose(ReminderKind::of(&key), filter, now);
            tracing::info!(
                filter_id = %filter.id,
                kind = %notification.kind,
                "reminder fired"
            );
            fired.push(notification);

            // Once the due date has passed, a replace chain escalates.
            if key.channel == Channel::Replace && key.variant != Variant::Overdue {
                if let Some(every) = escalation_interval(filter, now) {
                    self.timers.insert(
                        TimerKey {
                            variant: Variant::Overdue,
                            ..key
                        },
                        ArmedTimer {
                            fire_at: now + every,
                            every: Some(every),
                            stop_at: None,
                        },
                    );
                    continue;
                }
            }

            let Some(every) = timer.every else {
                continue;
            };
            let next_fire = next_step_after(timer.fire_at, every, now);
            if timer.stop_at.is_some_and(|stop| next_fire > stop) {
                continue;
            }
            let variant = match key.variant {
                Variant::Initial => Variant::Recurring,
                other => other,
            };
            self.timers.insert(
                TimerKey { variant, ..key },
                ArmedTimer {
                    fire_at: next_fire,
                    ..timer
                },
            );
        }
        fired
    }

    fn arm_buy(&mut self, filter: &Filter, now: PrimitiveDateTime) {
        let settings = &filter.notification_settings.buy_reminder;
        if !settings.enabled {
            return;
        }
        let Some(first) = first_fire(filter, settings.timing, settings.time) else {
            return;
        };
        let stop_at = (settings.stop_days > 0)
            .then(|| first + Duration::days(i64::from(settings.stop_days)));
        self.arm_first(filter, Channel::Buy, first, settings.frequency, stop_at, now);
    }

    fn arm_replace(&mut self, filter: &Filter, now: PrimitiveDateTime) {
        let settings = &filter.notification_settings.replace_reminder;
        if !settings.enabled {
            return;
        }
        let Some(first) = first_fire(filter, settings.timing, settings.time) else {
            return;
        };
        if first <= now {
            if let Some(every) = escalation_interval(filter, now) {
                self.timers.insert(
                    TimerKey::new(&filter.id, Channel::Replace, Variant::Overdue),
                    ArmedTimer {
                        fire_at: now + every,
                        every: Some(every),
                        stop_at: None,
                    },
                );
                return;
            }
        }
        self.arm_first(filter, Channel::Replace, first, settings.frequency, None, now);
    }

    fn arm_critical(&mut self, filter: &Filter, now: PrimitiveDateTime) {
        let settings = &filter.notification_settings.critical_reminder;
        if !settings.enabled {
            return;
        }
        let threshold = Duration::days(i64::from(settings.threshold));
        let Some(limit) = filter.next_due_date.checked_add(threshold) else {
            return;
        };
        let Some(crossed) = limit.next_day() else {
            return;
        };
        let start = PrimitiveDateTime::new(crossed, time::Time::MIDNIGHT);
        let every = settings.frequency.interval();
        let fire_at = if start > now {
            start
        } else {
            // Already past the threshold: a one-shot has had its turn.
            let Some(every) = every else {
                return;
            };
            now + every
        };
        self.timers.insert(
            TimerKey::new(&filter.id, Channel::Critical, Variant::Critical),
            ArmedTimer {
                fire_at,
                every,
                stop_at: None,
            },
        );
    }

    /// Buy and replace share this path: a future first fire arms `Initial`;
    /// a past one on a repeating cadence resumes as `Recurring` on the next
    /// step after `now`, so reminders survive a restart.
    fn arm_first(
        &mut self,
        filter: &Filter,
        channel: Channel,
        first: PrimitiveDateTime,
        cadence: Cadence,
        stop_at: Option<PrimitiveDateTime>,
        now: PrimitiveDateTime,
    ) {
        let every = cadence.interval();
        if first > now {
            self.timers.insert(
                TimerKey::new(&filter.id, channel, Variant::Initial),
                ArmedTimer {
                    fire_at: first,
                    every,
                    stop_at,
                },
            );
            return;
        }
        let Some(every) = every else {
            return;
        };
        let fire_at = next_step_after(first, every, now);
        if stop_at.is_some_and(|stop| fire_at > stop) {
            return;
        }
        self.timers.insert(
            TimerKey::new(&filter.id, channel, Variant::Recurring),
            ArmedTimer {
                fire_at,
                every: Some(every),
                stop_at,
            },
        );
    }
}

fn channel_enabled(filter: &Filter, channel: Channel) -> bool {
    let settings = &filter.notification_settings;
    match channel {
        Channel::Buy => settings.buy_reminder.enabled,
        Channel::Replace => settings.replace_reminder.enabled,
        Channel::Critical => settings.critical_reminder.enabled,
    }
}

/// Escalation cadence for a filter whose due date lies before `now`.
fn escalation_interval(filter: &Filter, now: PrimitiveDateTime) -> Option<Duration> {
    if now.date() <= filter.next_due_date {
        return None;
    }
    filter
        .notification_settings
        .replace_reminder
        .overdue_escalation
        .interval()
}

/// `nextDueDate - days` at the configured time of day.
fn first_fire(filter: &Filter, days: u32, at: time::Time) -> Option<PrimitiveDateTime> {
    let date = filter
        .next_due_date
        .checked_sub(Duration::days(i64::from(days)))?;
    Some(PrimitiveDateTime::new(date, at))
}

/// First instant `origin + k * every` strictly after `now`, k >= 1.
fn next_step_after(
    origin: PrimitiveDateTime,
    every: Duration,
    now: PrimitiveDateTime,
) -> PrimitiveDateTime {
    let step = every.whole_seconds().max(1);
    let elapsed = (now - origin).whole_seconds();
    let steps = if elapsed < 0 { 1 } else { elapsed / step + 1 };
    origin + Duration::seconds(step * steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Escalation, NotificationSettings};
    use crate::test_support::{at, filter};
    use time::macros::date;

    fn key(id: &str, channel: Channel, variant: Variant) -> TimerKey {
        TimerKey::new(id, channel, variant)
    }

    /// Due 2024-07-01: buy first fire 2024-06-17 09:00, replace 2024-06-30 10:00.
    fn kitchen() -> Filter {
        filter("f1", "Kitchen Carbon", date!(2024 - 01 - 01), 6)
    }

    #[test]
    fn disabled_notifications_arm_nothing() {
        let mut scheduler = Scheduler::new();
        scheduler.reschedule([&kitchen()], false, at(date!(2024 - 06 - 01), 8, 0));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn future_fires_arm_initial_timers() {
        let mut scheduler = Scheduler::new();
        scheduler.reschedule([&kitchen()], true, at(date!(2024 - 06 - 01), 8, 0));

        assert_eq!(scheduler.len(), 2);
        let buy = scheduler
            .get(&key("f1", Channel::Buy, Variant::Initial))
            .expect("buy timer");
        assert_eq!(buy.fire_at, at(date!(2024 - 06 - 17), 9, 0));
        assert_eq!(buy.every, Some(Duration::days(7)));
        assert_eq!(buy.stop_at, Some(at(date!(2024 - 06 - 24), 9, 0)));

        let replace = scheduler
            .get(&key("f1", Channel::Replace, Variant::Initial))
            .expect("replace timer");
        assert_eq!(replace.fire_at, at(date!(2024 - 06 - 30), 10, 0));
    }

    #[test]
    fn reschedule_is_idempotent() {
        let filters = vec![kitchen(), filter("f2", "Membrane", date!(2023 - 01 - 01), 6)];
        let now = at(date!(2024 - 06 - 01), 8, 0);
        let mut once = Scheduler::new();
        once.reschedule(&filters, true, now);
        let mut twice = Scheduler::new();
        twice.reschedule(&filters, true, now);
        twice.reschedule(&filters, true, now);
        assert_eq!(
            once.timers().collect::<Vec<_>>(),
            twice.timers().collect::<Vec<_>>()
        );
    }

    #[test]
    fn initial_fire_hands_over_to_recurring_until_stop_days() {
        let filters = vec![kitchen()];
        let mut scheduler = Scheduler::new();
        scheduler.reschedule(&filters, true, at(date!(2024 - 06 - 01), 8, 0));

        let fired = scheduler.tick(at(date!(2024 - 06 - 17), 9, 0), &filters);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].kind, ReminderKind::Buy);
        assert_eq!(fired[0].title, "Time to buy new filter");
        assert_eq!(fired[0].body, "Kitchen Carbon (Kitchen): Due in 14 days");
        assert!(!fired[0].interactive);
        assert!(scheduler
            .get(&key("f1", Channel::Buy, Variant::Initial))
            .is_none());
        let recurring = scheduler
            .get(&key("f1", Channel::Buy, Variant::Recurring))
            .expect("recurring buy");
        assert_eq!(recurring.fire_at, at(date!(2024 - 06 - 24), 9, 0));

        // The weekly repeat on the stop boundary still fires, the next does not.
        let fired = scheduler.tick(at(date!(2024 - 06 - 24), 9, 0), &filters);
        assert_eq!(fired.len(), 1);
        assert!(scheduler
            .get(&key("f1", Channel::Buy, Variant::Recurring))
            .is_none());
    }

    #[test]
    fn nothing_fires_before_its_time() {
        let filters = vec![kitchen()];
        let mut scheduler = Scheduler::new();
        scheduler.reschedule(&filters, true, at(date!(2024 - 06 - 01), 8, 0));
        assert!(scheduler
            .tick(at(date!(2024 - 06 - 17), 8, 59), &filters)
            .is_empty());
        assert_eq!(scheduler.len(), 2);
    }

    #[test]
    fn missed_steps_fire_once_and_jump_ahead() {
        let filters = vec![kitchen()];
        let mut scheduler = Scheduler::new();
        scheduler.reschedule(&filters, true, at(date!(2024 - 06 - 29), 8, 0));

        // Replace fires daily from 2024-06-30 10:00; wake up three days late.
        let fired = scheduler.tick(at(date!(2024 - 07 - 03), 12, 0), &filters);
        let replace: Vec<_> = fired
            .iter()
            .filter(|n| n.kind == ReminderKind::Replace)
            .collect();
        assert_eq!(replace.len(), 1);
        assert!(replace[0].interactive);
        assert_eq!(replace[0].body, "Kitchen Carbon (Kitchen): Overdue by 2 days");
        // Past the due date the chain hands over to escalation.
        assert!(scheduler
            .get(&key("f1", Channel::Replace, Variant::Recurring))
            .is_none());
        let overdue = scheduler
            .get(&key("f1", Channel::Replace, Variant::Overdue))
            .expect("escalated replace");
        assert_eq!(overdue.fire_at, at(date!(2024 - 07 - 03), 14, 0));
    }

    #[test]
    fn replace_window_before_due_date_does_not_escalate() {
        let filters = vec![kitchen()];
        let mut scheduler = Scheduler::new();
        // Replace first fired 2024-06-30 10:00; the filter is due tomorrow.
        scheduler.reschedule(&filters, true, at(date!(2024 - 06 - 30), 11, 0));

        assert!(scheduler
            .get(&key("f1", Channel::Replace, Variant::Overdue))
            .is_none());
        let recurring = scheduler
            .get(&key("f1", Channel::Replace, Variant::Recurring))
            .expect("daily replace");
        assert_eq!(recurring.fire_at, at(date!(2024 - 07 - 01), 10, 0));
        assert!(scheduler
            .tick(at(date!(2024 - 06 - 30), 13, 0), &filters)
            .is_empty());
    }

    #[test]
    fn running_scheduler_escalates_once_due_date_passes() {
        let filters = vec![kitchen()];
        let mut scheduler = Scheduler::new();
        let mut now = at(date!(2024 - 06 - 29), 8, 0);
        scheduler.reschedule(&filters, true, now);

        let mut fired = Vec::new();
        while now <= at(date!(2024 - 07 - 05), 0, 0) {
            for notification in scheduler.tick(now, &filters) {
                fired.push((now, notification.kind));
            }
            now += Duration::hours(1);
        }

        let replace: Vec<_> = fired
            .iter()
            .filter(|(_, kind)| *kind == ReminderKind::Replace)
            .map(|(when, _)| *when)
            .collect();
        assert_eq!(
            replace,
            vec![
                at(date!(2024 - 06 - 30), 10, 0),
                at(date!(2024 - 07 - 01), 10, 0),
                at(date!(2024 - 07 - 02), 10, 0),
            ]
        );
        let first_overdue = fired
            .iter()
            .find(|(_, kind)| *kind == ReminderKind::Overdue)
            .map(|(when, _)| *when);
        assert_eq!(first_overdue, Some(at(date!(2024 - 07 - 02), 12, 0)));
        assert!(scheduler
            .get(&key("f1", Channel::Replace, Variant::Overdue))
            .is_some());
        assert!(scheduler
            .get(&key("f1", Channel::Replace, Variant::Recurring))
            .is_none());
    }

    #[test]
    fn past_replace_fire_escalates() {
        let filters = vec![kitchen()];
        let now = at(date!(2024 - 07 - 10), 12, 0);
        let mut scheduler = Scheduler::new();
        scheduler.reschedule(&filters, true, now);

        let overdue = scheduler
            .get(&key("f1", Channel::Replace, Variant::Overdue))
            .expect("overdue timer");
        assert_eq!(overdue.fire_at, at(date!(2024 - 07 - 10), 14, 0));
        assert!(scheduler
            .get(&key("f1", Channel::Replace, Variant::Initial))
            .is_none());

        let fired = scheduler.tick(at(date!(2024 - 07 - 10), 14, 0), &filters);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].title, "Filter overdue!");
        let rearmed = scheduler
            .get(&key("f1", Channel::Replace, Variant::Overdue))
            .expect("still escalating");
        assert_eq!(rearmed.fire_at, at(date!(2024 - 07 - 10), 16, 0));
    }

    #[test]
    fn past_replace_without_escalation_resumes_recurring() {
        let mut f = kitchen();
        f.notification_settings.replace_reminder.overdue_escalation = Escalation::Disabled;
        let mut scheduler = Scheduler::new();
        scheduler.reschedule([&f], true, at(date!(2024 - 07 - 10), 12, 0));

        let recurring = scheduler
            .get(&key("f1", Channel::Replace, Variant::Recurring))
            .expect("recurring after restart");
        assert_eq!(recurring.fire_at, at(date!(2024 - 07 - 11), 10, 0));
    }

    #[test]
    fn past_buy_fire_respects_stop_days_after_restart() {
        let f = kitchen();
        let mut scheduler = Scheduler::new();
        // Inside the stop window: next weekly step 2024-06-24 09:00.
        scheduler.reschedule([&f], true, at(date!(2024 - 06 - 20), 12, 0));
        assert_eq!(
            scheduler
                .get(&key("f1", Channel::Buy, Variant::Recurring))
                .map(|t| t.fire_at),
            Some(at(date!(2024 - 06 - 24), 9, 0))
        );

        // Past the window: no buy reminder at all.
        scheduler.reschedule([&f], true, at(date!(2024 - 06 - 25), 12, 0));
        assert!(scheduler.timers().all(|(k, _)| k.channel != Channel::Buy));
    }

    #[test]
    fn once_cadence_does_not_repeat() {
        let mut f = kitchen();
        f.notification_settings.buy_reminder.frequency = Cadence::Once;
        let filters = vec![f];
        let mut scheduler = Scheduler::new();
        scheduler.reschedule(&filters, true, at(date!(2024 - 06 - 01), 8, 0));
        scheduler.tick(at(date!(2024 - 06 - 17), 9, 0), &filters);
        assert!(scheduler.timers().all(|(k, _)| k.channel != Channel::Buy));

        // After a restart a past one-shot stays silent.
        scheduler.reschedule(&filters, true, at(date!(2024 - 06 - 18), 8, 0));
        assert!(scheduler.timers().all(|(k, _)| k.channel != Channel::Buy));
    }

    #[test]
    fn critical_waits_for_threshold() {
        let mut f = kitchen();
        f.notification_settings.critical_reminder.enabled = true;
        let filters = vec![f];
        let mut scheduler = Scheduler::new();

        // Due 2024-07-01 + 14 days = 2024-07-15; the 15th itself is not past it.
        scheduler.reschedule(&filters, true, at(date!(2024 - 07 - 15), 12, 0));
        let pending = scheduler
            .get(&key("f1", Channel::Critical, Variant::Critical))
            .expect("critical timer");
        assert_eq!(pending.fire_at, at(date!(2024 - 07 - 16), 0, 0));
        assert!(scheduler
            .tick(at(date!(2024 - 07 - 15), 23, 59), &filters)
            .iter()
            .all(|n| n.kind != ReminderKind::Critical));

        scheduler.reschedule(&filters, true, at(date!(2024 - 07 - 16), 12, 0));
        let critical = scheduler
            .get(&key("f1", Channel::Critical, Variant::Critical))
            .expect("critical timer");
        assert_eq!(critical.fire_at, at(date!(2024 - 07 - 16), 13, 0));
        assert_eq!(critical.every, Some(Duration::hours(1)));
    }

    #[test]
    fn one_shot_critical_fires_once_across_reschedules() {
        let mut f = kitchen();
        f.notification_settings.critical_reminder.enabled = true;
        f.notification_settings.critical_reminder.frequency = Cadence::Once;
        let filters = vec![f];
        let mut scheduler = Scheduler::new();
        scheduler.reschedule(&filters, true, at(date!(2024 - 07 - 10), 8, 0));

        let fired = scheduler.tick(at(date!(2024 - 07 - 16), 0, 0), &filters);
        assert_eq!(
            fired
                .iter()
                .filter(|n| n.kind == ReminderKind::Critical)
                .count(),
            1
        );

        // An edit or sync reschedules; the one-shot must not come back.
        scheduler.reschedule(&filters, true, at(date!(2024 - 07 - 16), 8, 0));
        assert!(scheduler
            .get(&key("f1", Channel::Critical, Variant::Critical))
            .is_none());
    }

    #[test]
    fn critical_notification_text() {
        let mut f = kitchen();
        f.notification_settings = NotificationSettings::default();
        f.notification_settings.critical_reminder.enabled = true;
        f.notification_settings.replace_reminder.enabled = false;
        f.notification_settings.buy_reminder.enabled = false;
        let filters = vec![f];
        let mut scheduler = Scheduler::new();
        scheduler.reschedule(&filters, true, at(date!(2024 - 08 - 01), 12, 0));
        let fired = scheduler.tick(at(date!(2024 - 08 - 01), 13, 0), &filters);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].title, "CRITICAL: filter overdue");
        assert_eq!(fired[0].body, "Kitchen Carbon (Kitchen): Overdue by 31 days");
    }

    #[test]
    fn tick_drops_timers_of_removed_filters() {
        let mut filters = vec![kitchen()];
        let mut scheduler = Scheduler::new();
        scheduler.reschedule(&filters, true, at(date!(2024 - 06 - 01), 8, 0));
        filters[0].is_active = false;
        assert!(scheduler
            .tick(at(date!(2024 - 06 - 17), 9, 0), &filters)
            .is_empty());
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn tick_reads_current_filter_state() {
        let mut filters = vec![kitchen()];
        let mut scheduler = Scheduler::new();
        scheduler.reschedule(&filters, true, at(date!(2024 - 06 - 01), 8, 0));
        filters[0].name = "Renamed".to_string();
        let fired = scheduler.tick(at(date!(2024 - 06 - 17), 9, 0), &filters);
        assert!(fired[0].body.starts_with("Renamed"));
    }

    #[test]
    fn removed_filters_are_never_armed() {
        let mut f = kitchen();
        f.is_active = false;
        let mut scheduler = Scheduler::new();
        scheduler.reschedule([&f], true, at(date!(2024 - 06 - 01), 8, 0));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn steps_land_strictly_after_now() {
        let origin = at(date!(2024 - 01 - 01), 0, 0);
        let hour = Duration::hours(1);
        assert_eq!(next_step_after(origin, hour, origin), at(date!(2024 - 01 - 01), 1, 0));
        assert_eq!(
            next_step_after(origin, hour, at(date!(2024 - 01 - 01), 5, 30)),
            at(date!(2024 - 01 - 01), 6, 0)
        );
        assert_eq!(
            next_step_after(origin, hour, at(date!(2023 - 12 - 31), 0, 0)),
            at(date!(2024 - 01 - 01), 1, 0)
        );
    }
}
