use std::sync::Arc;

use anyhow::{Context, Result};
use time::{Date, PrimitiveDateTime};

use super::actions::ActionDispatcher;
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::prefs::Preferences;
use crate::registry::Registry;
use crate::reminders::{Notification, Notifier, ReminderRuntime};
use crate::storage::{Revision, StorageHandle};

/// State shared by the TUI and the CLI: the filter registry, preferences and
/// the reminder timers derived from them.
pub struct Session {
    config: Arc<AppConfig>,
    registry: Registry,
    prefs: Preferences,
    reminders: ReminderRuntime,
    clock: Arc<dyn Clock>,
    revision: Option<Revision>,
}

impl Session {
    /// Loads everything from the store and runs the startup reschedule pass.
    pub fn open(
        config: Arc<AppConfig>,
        storage: StorageHandle,
        notifier: Box<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let registry = Registry::load(storage.clone(), config.storage.seed_demo_data)
            .context("loading filters")?;
        let prefs = Preferences::load(&storage, &config.default_currency)
            .context("loading preferences")?;
        let reminders = ReminderRuntime::new(notifier, &config.reminders);
        let mut session = Self {
            config,
            registry,
            prefs,
            reminders,
            clock,
            revision: None,
        };
        session.dispatcher().reschedule();
        session.revision = Some(session.storage().revision()?);
        Ok(session)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn prefs(&self) -> &Preferences {
        &self.prefs
    }

    pub fn reminders(&self) -> &ReminderRuntime {
        &self.reminders
    }

    pub fn storage(&self) -> &StorageHandle {
        self.registry.storage()
    }

    pub fn now(&self) -> PrimitiveDateTime {
        self.clock.now()
    }

    pub fn today(&self) -> Date {
        self.clock.today()
    }

    pub fn dispatcher(&mut self) -> ActionDispatcher<'_> {
        ActionDispatcher::new(
            &self.config,
            &mut self.registry,
            &mut self.prefs,
            &mut self.reminders,
            self.clock.as_ref(),
        )
    }

    /// Runs due reminders once the check interval has passed.
    pub fn poll_reminders(&mut self) -> Vec<Notification> {
        let now = self.clock.now();
        self.reminders.poll(self.registry.all(), now)
    }

    pub fn check_reminders_now(&mut self) -> Vec<Notification> {
        let now = self.clock.now();
        self.reminders.check_now(self.registry.all(), now)
    }

    /// Reloads filters and preferences when another process has written to
    /// the store since the last look. Returns whether anything changed.
    pub fn sync_from_store(&mut self) -> Result<bool> {
        let current = self.storage().revision()?;
        if self.revision.as_ref() == Some(&current) {
            return Ok(false);
        }
        self.registry
            .reload(self.config.storage.seed_demo_data)
            .context("reloading filters")?;
        self.prefs = Preferences::load(self.storage(), &self.config.default_currency)
            .context("reloading preferences")?;
        self.dispatcher().reschedule();
        self.revision = Some(self.storage().revision()?);
        tracing::info!(
            filters = self.registry.all().len(),
            "reloaded after external change"
        );
        Ok(true)
    }

    /// Marks the store's current contents as seen, so our own writes do not
    /// trigger `sync_from_store`.
    pub fn mark_synced(&mut self) -> Result<()> {
        self.revision = Some(self.storage().revision()?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::FilterDraft;
    use crate::reminders::{ChannelNotifier, ReminderStatus};
    use crate::test_support::{at, init_with_config};
    use time::macros::date;

    #[test]
    fn open_seeds_and_arms_nothing_while_disabled() -> anyhow::Result<()> {
        let (_temp, config, storage) = init_with_config()?;
        let (notifier, _rx) = ChannelNotifier::bounded(8);
        let clock = Arc::new(FixedClock(at(date!(2025 - 01 - 10), 8, 0)));
        let session = Session::open(Arc::new(config), storage, Box::new(notifier), clock)?;
        assert_eq!(session.registry().active().count(), 7);
        assert!(!session.prefs().notifications_enabled);
        assert_eq!(session.reminders().status(), ReminderStatus::Disabled);
        Ok(())
    }

    #[test]
    fn sync_picks_up_writes_from_another_handle() -> anyhow::Result<()> {
        let (_temp, config, storage) = init_with_config()?;
        let config = Arc::new(config);
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(at(date!(2025 - 01 - 10), 8, 0)));

        let (notifier, _rx) = ChannelNotifier::bounded(8);
        let mut watcher =
            Session::open(config.clone(), storage.clone(), Box::new(notifier), clock.clone())?;
        assert!(!watcher.sync_from_store()?);

        let (notifier, _rx2) = ChannelNotifier::bounded(8);
        let mut writer = Session::open(config, storage, Box::new(notifier), clock)?;
        writer.dispatcher().add_filter(FilterDraft {
            name: Some("Shower head".into()),
            ..FilterDraft::default()
        })?;

        assert!(watcher.sync_from_store()?);
        assert_eq!(watcher.registry().active().count(), 8);
        assert!(!watcher.sync_from_store()?);
        Ok(())
    }
}
