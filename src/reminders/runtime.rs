use std::time::{Duration, Instant};

use time::PrimitiveDateTime;

use super::{Notification, Notifier, Permission, Scheduler};
use crate::config::ReminderOptions;
use crate::model::Filter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderStatus {
    Disabled,
    Idle,
    Armed {
        timers: usize,
        next_fire: PrimitiveDateTime,
    },
    Error {
        message: String,
    },
}

/// Polled driver around the scheduler: checks the timer table at most once
/// per `check_interval` and hands fired reminders to the notifier.
pub struct ReminderRuntime {
    scheduler: Scheduler,
    notifier: Box<dyn Notifier>,
    check_interval: Duration,
    last_check: Option<Instant>,
    enabled: bool,
    last_error: Option<String>,
}

impl ReminderRuntime {
    pub fn new(notifier: Box<dyn Notifier>, options: &ReminderOptions) -> Self {
        Self {
            scheduler: Scheduler::new(),
            notifier,
            check_interval: options.check_interval(),
            last_check: None,
            enabled: false,
            last_error: None,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn status(&self) -> ReminderStatus {
        if !self.enabled {
            return ReminderStatus::Disabled;
        }
        if let Some(message) = &self.last_error {
            return ReminderStatus::Error {
                message: message.clone(),
            };
        }
        match self.scheduler.next_fire() {
            Some((_, timer)) => ReminderStatus::Armed {
                timers: self.scheduler.len(),
                next_fire: timer.fire_at,
            },
            None => ReminderStatus::Idle,
        }
    }

    pub fn request_permission(&self) -> Permission {
        self.notifier.request_permission()
    }

    pub fn reschedule(&mut self, filters: &[Filter], enabled: bool, now: PrimitiveDateTime) {
        self.enabled = enabled;
        self.last_error = None;
        self.scheduler.reschedule(filters, enabled, now);
    }

    /// Fires due reminders if the check interval has elapsed since the last
    /// check.
    pub fn poll(&mut self, filters: &[Filter], now: PrimitiveDateTime) -> Vec<Notification> {
        if !self.enabled {
            return Vec::new();
        }
        if let Some(last) = self.last_check {
            if last.elapsed() < self.check_interval {
                return Vec::new();
            }
        }
        self.check_now(filters, now)
    }

    pub fn check_now(&mut self, filters: &[Filter], now: PrimitiveDateTime) -> Vec<Notification> {
        self.last_check = Some(Instant::now());
        if !self.enabled {
            return Vec::new();
        }
        let fired = self.scheduler.tick(now, filters);
        for notification in &fired {
            if let Err(err) = self.notifier.display(notification) {
                tracing::warn!(error = %err, "failed to display reminder");
                self.last_error = Some(err.to_string());
            }
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminders::ChannelNotifier;
    use crate::test_support::{at, filter};
    use time::macros::date;

    fn options(check_interval_secs: u64) -> ReminderOptions {
        ReminderOptions {
            check_interval_secs,
            terminal_bell: false,
        }
    }

    #[test]
    fn delivers_fired_reminders_to_notifier() {
        let (notifier, rx) = ChannelNotifier::bounded(8);
        let mut runtime = ReminderRuntime::new(Box::new(notifier), &options(30));
        let filters = vec![filter("f1", "Sediment", date!(2024 - 01 - 01), 6)];
        runtime.reschedule(&filters, true, at(date!(2024 - 06 - 01), 8, 0));
        assert_eq!(
            runtime.status(),
            ReminderStatus::Armed {
                timers: 2,
                next_fire: at(date!(2024 - 06 - 17), 9, 0),
            }
        );

        let fired = runtime.check_now(&filters, at(date!(2024 - 06 - 17), 9, 0));
        assert_eq!(fired.len(), 1);
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn poll_waits_for_the_check_interval() {
        let (notifier, rx) = ChannelNotifier::bounded(8);
        let mut runtime = ReminderRuntime::new(Box::new(notifier), &options(3600));
        let filters = vec![filter("f1", "Sediment", date!(2024 - 01 - 01), 6)];
        runtime.reschedule(&filters, true, at(date!(2024 - 06 - 01), 8, 0));

        assert!(runtime
            .poll(&filters, at(date!(2024 - 06 - 01), 8, 1))
            .is_empty());
        // Checked a moment ago, so even a due timer waits for the next window.
        assert!(runtime
            .poll(&filters, at(date!(2024 - 06 - 17), 9, 0))
            .is_empty());
        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn disabled_runtime_stays_quiet() {
        let (notifier, _rx) = ChannelNotifier::bounded(8);
        let mut runtime = ReminderRuntime::new(Box::new(notifier), &options(30));
        let filters = vec![filter("f1", "Sediment", date!(2024 - 01 - 01), 6)];
        runtime.reschedule(&filters, false, at(date!(2024 - 06 - 01), 8, 0));
        assert_eq!(runtime.status(), ReminderStatus::Disabled);
        assert!(runtime
            .check_now(&filters, at(date!(2024 - 06 - 17), 9, 0))
            .is_empty());
    }

    #[test]
    fn display_failures_surface_in_status() {
        let (notifier, rx) = ChannelNotifier::bounded(8);
        drop(rx);
        let mut runtime = ReminderRuntime::new(Box::new(notifier), &options(30));
        let filters = vec![filter("f1", "Sediment", date!(2024 - 01 - 01), 6)];
        runtime.reschedule(&filters, true, at(date!(2024 - 06 - 01), 8, 0));
        runtime.check_now(&filters, at(date!(2024 - 06 - 17), 9, 0));
        assert!(matches!(runtime.status(), ReminderStatus::Error { .. }));
    }
}
