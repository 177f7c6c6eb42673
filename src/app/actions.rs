use std::path::PathBuf;

use anyhow::{Context, Result};
use time::Date;

use crate::backup::{self, ImportDocument};
use crate::clock::Clock;
use crate::config::{AppConfig, ThemeName};
use crate::model::{Filter, FilterDraft};
use crate::prefs::{Currency, Preferences};
use crate::registry::{Registry, RegistryResult};
use crate::reminders::{Permission, ReminderRuntime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationsOutcome {
    Enabled,
    Disabled,
    /// Permission was refused; the preference has been switched off.
    Denied,
}

/// Every user-facing mutation. Each one writes through to the store and then
/// rebuilds the reminder timers from the new state.
pub struct ActionDispatcher<'a> {
    config: &'a AppConfig,
    registry: &'a mut Registry,
    prefs: &'a mut Preferences,
    reminders: &'a mut ReminderRuntime,
    clock: &'a dyn Clock,
}

impl<'a> ActionDispatcher<'a> {
    pub fn new(
        config: &'a AppConfig,
        registry: &'a mut Registry,
        prefs: &'a mut Preferences,
        reminders: &'a mut ReminderRuntime,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            config,
            registry,
            prefs,
            reminders,
            clock,
        }
    }

    pub fn reschedule(&mut self) {
        let now = self.clock.now();
        self.reminders
            .reschedule(self.registry.all(), self.prefs.notifications_enabled, now);
    }

    pub fn add_filter(&mut self, draft: FilterDraft) -> RegistryResult<Filter> {
        let filter = self.registry.create(draft, self.clock.today())?;
        self.reschedule();
        Ok(filter)
    }

    pub fn edit_filter(&mut self, id: &str, draft: FilterDraft) -> RegistryResult<Filter> {
        let filter = self.registry.update(id, draft)?;
        self.reschedule();
        Ok(filter)
    }

    /// Returns the new due date for the confirmation message.
    pub fn mark_replaced(&mut self, id: &str) -> RegistryResult<Date> {
        let next_due = self.registry.mark_replaced(id, self.clock.today())?;
        self.reschedule();
        Ok(next_due)
    }

    pub fn remove_filter(&mut self, id: &str) -> RegistryResult<Filter> {
        let removed = self.registry.remove(id)?;
        self.reschedule();
        Ok(removed)
    }

    pub fn clear_history(&mut self) -> RegistryResult<usize> {
        self.registry.clear_history()
    }

    pub fn set_currency(&mut self, currency: Currency) -> Result<()> {
        self.prefs.set_currency(self.registry.storage(), currency)
    }

    pub fn cycle_currency(&mut self) -> Result<Currency> {
        let next = self.prefs.currency.cycled();
        self.set_currency(next.clone())?;
        Ok(next)
    }

    pub fn set_theme(&mut self, theme: ThemeName) -> Result<()> {
        self.prefs.set_theme(self.registry.storage(), theme)
    }

    pub fn toggle_theme(&mut self) -> Result<ThemeName> {
        let next = self.prefs.theme.toggled();
        self.set_theme(next)?;
        Ok(next)
    }

    /// Turning notifications on asks the notifier for permission first. A
    /// refusal stores `false` and is reported once; nothing retries it.
    pub fn set_notifications(&mut self, enabled: bool) -> Result<NotificationsOutcome> {
        let storage = self.registry.storage().clone();
        let outcome = if !enabled {
            self.prefs.set_notifications_enabled(&storage, false)?;
            NotificationsOutcome::Disabled
        } else if self.reminders.request_permission() == Permission::Denied {
            tracing::warn!("notification permission denied");
            self.prefs.set_notifications_enabled(&storage, false)?;
            NotificationsOutcome::Denied
        } else {
            self.prefs.set_notifications_enabled(&storage, true)?;
            NotificationsOutcome::Enabled
        };
        self.reschedule();
        Ok(outcome)
    }

    pub fn toggle_notifications(&mut self) -> Result<NotificationsOutcome> {
        let enabled = !self.prefs.notifications_enabled;
        self.set_notifications(enabled)
    }

    /// Writes a complete backup; without a target it lands in the backups
    /// directory under a dated name.
    pub fn export_all(&mut self, target: Option<PathBuf>) -> Result<PathBuf> {
        let path = target.unwrap_or_else(|| {
            self.config
                .storage
                .backup_dir
                .join(backup::complete_backup_name(self.clock.today()))
        });
        let contents = backup::complete_export(
            self.registry.all(),
            self.registry.history(),
            self.prefs,
            self.clock.now_utc(),
        )?;
        backup::write_document(&path, &contents)?;
        self.registry.storage().record_backup(&path, "export")?;
        Ok(path)
    }

    pub fn export_history(&mut self, target: Option<PathBuf>) -> Result<PathBuf> {
        let path = target.unwrap_or_else(|| {
            self.config
                .storage
                .backup_dir
                .join(backup::history_backup_name(self.clock.today()))
        });
        let contents = backup::history_export(
            self.registry.history(),
            &self.prefs.currency,
            self.clock.now_utc(),
        )?;
        backup::write_document(&path, &contents)?;
        self.registry.storage().record_backup(&path, "history")?;
        Ok(path)
    }

    /// Applies an already parsed backup. Filters, history and settings are
    /// written in one transaction, so a failure leaves the old state intact.
    pub fn import(&mut self, document: ImportDocument) -> RegistryResult<()> {
        let next_prefs = document.merged_preferences(self.prefs);
        let summary = document.summary();
        self.registry
            .replace_all(document.filters, document.history, &next_prefs.to_entries())?;
        *self.prefs = next_prefs;
        self.reschedule();
        tracing::info!(%summary, "backup imported");
        Ok(())
    }

    /// Wipes every stored key, then starts over from the defaults exactly as
    /// a first run would.
    pub fn reset_all(&mut self) -> Result<usize> {
        let storage = self.registry.storage().clone();
        let removed = storage.clear_all()?;
        self.registry
            .reload(self.config.storage.seed_demo_data)
            .context("reloading after reset")?;
        *self.prefs = Preferences::load(&storage, &self.config.default_currency)?;
        self.reschedule();
        Ok(removed)
    }
}
