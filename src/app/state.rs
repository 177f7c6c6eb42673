use std::collections::VecDeque;
use std::path::PathBuf;

use crate::backup::ImportDocument;
use crate::config::ThemeName;
use crate::due::{self, format_date, FilterStatus};
use crate::model::Filter;
use crate::prefs::Currency;
use crate::reminders::{Notification, ReminderStatus};
use crate::search::{normalize_term, HistoryRange};
use crate::stats::{self, Impact, StatusCounts};

use super::form::FilterForm;
use super::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Dashboard,
    History,
    Statistics,
    Settings,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Dashboard, Tab::History, Tab::Statistics, Tab::Settings];

    pub fn title(self) -> &'static str {
        match self {
            Tab::Dashboard => "Dashboard",
            Tab::History => "History",
            Tab::Statistics => "Statistics",
            Tab::Settings => "Settings",
        }
    }

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|tab| *tab == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn previous(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsItem {
    Currency,
    Theme,
    Notifications,
    ExportAll,
    ExportHistory,
    Import,
    Reset,
}

impl SettingsItem {
    pub const ALL: [SettingsItem; 7] = [
        SettingsItem::Currency,
        SettingsItem::Theme,
        SettingsItem::Notifications,
        SettingsItem::ExportAll,
        SettingsItem::ExportHistory,
        SettingsItem::Import,
        SettingsItem::Reset,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SettingsItem::Currency => "Currency",
            SettingsItem::Theme => "Theme",
            SettingsItem::Notifications => "Notifications",
            SettingsItem::ExportAll => "Export all data",
            SettingsItem::ExportHistory => "Export history",
            SettingsItem::Import => "Import backup",
            SettingsItem::Reset => "Reset all data",
        }
    }
}

/// One dashboard card, fully formatted.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCard {
    pub id: String,
    pub name: String,
    pub location: String,
    pub stage: String,
    pub filter_type: String,
    pub brand_model: String,
    pub installed: String,
    pub next_due: String,
    pub status: FilterStatus,
    pub status_text: String,
    pub cost: String,
    pub interval_months: u32,
    pub reminders: String,
    pub notes: String,
}

impl FilterCard {
    fn project(filter: &Filter, today: time::Date, currency: &Currency) -> Self {
        let (status, _, status_text) = due::describe(filter.next_due_date, today);
        let brand_model = [filter.brand.as_str(), filter.model.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            id: filter.id.clone(),
            name: filter.name.clone(),
            location: filter.location.clone(),
            stage: filter.stage.clone(),
            filter_type: filter.filter_type.clone(),
            brand_model,
            installed: format_date(filter.install_date),
            next_due: format_date(filter.next_due_date),
            status,
            status_text,
            cost: currency.format(filter.cost),
            interval_months: filter.replacement_interval,
            reminders: filter.notification_settings.summary(),
            notes: filter.notes.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub date: String,
    pub filter_name: String,
    pub cost: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceRow {
    pub name: String,
    pub filter_type: String,
    pub interval_months: u32,
    pub replacements: usize,
    pub total_cost: String,
    pub cost_per_month: String,
    pub notifications: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatisticsView {
    pub total_cost: String,
    pub average_cost: String,
    pub monthly_cost: String,
    pub yearly_projection: String,
    pub impact: Impact,
    pub performance: Vec<PerformanceRow>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pub active: bool,
    pub query: String,
}

#[derive(Debug)]
pub enum OverlayState {
    FilterForm(FilterForm),
    ConfirmReplace { id: String, name: String },
    ConfirmDelete { id: String, name: String },
    ConfirmClearHistory,
    ImportPath { input: String },
    ConfirmImport {
        path: PathBuf,
        summary: String,
        document: Box<ImportDocument>,
    },
    /// Reset asks twice; `armed` is set after the first confirmation.
    ConfirmReset { armed: bool },
    Help,
}

/// Everything the renderer reads. Rebuilt from the session after every
/// mutation; the renderer never looks at the registry directly.
#[derive(Debug)]
pub struct AppState {
    pub tab: Tab,
    pub search: SearchState,
    pub cards: Vec<FilterCard>,
    pub selected: usize,
    pub counts: StatusCounts,
    pub history_range: HistoryRange,
    pub history_rows: Vec<HistoryRow>,
    pub history_selected: usize,
    pub stats: StatisticsView,
    pub settings_selected: usize,
    pub theme: ThemeName,
    pub currency: Currency,
    pub notifications_enabled: bool,
    pub reminder_status: ReminderStatus,
    pub backup_dir: PathBuf,
    pub last_backup: Option<String>,
    pub today: String,
    banners: VecDeque<Notification>,
    overlay: Option<OverlayState>,
    status_message: Option<String>,
}

impl AppState {
    pub fn new(session: &Session) -> Self {
        let mut state = Self {
            tab: Tab::Dashboard,
            search: SearchState::default(),
            cards: Vec::new(),
            selected: 0,
            counts: StatusCounts::default(),
            history_range: session.config().history.default_range,
            history_rows: Vec::new(),
            history_selected: 0,
            stats: StatisticsView::default(),
            settings_selected: 0,
            theme: ThemeName::default(),
            currency: Currency::default(),
            notifications_enabled: false,
            reminder_status: ReminderStatus::Disabled,
            backup_dir: session.config().storage.backup_dir.clone(),
            last_backup: None,
            today: String::new(),
            banners: VecDeque::new(),
            overlay: None,
            status_message: None,
        };
        state.refresh(session);
        state
    }

    /// Re-projects registry, history, statistics and preferences.
    pub fn refresh(&mut self, session: &Session) {
        let today = session.today();
        let prefs = session.prefs();
        let registry = session.registry();
        self.theme = prefs.theme;
        self.currency = prefs.currency.clone();
        self.notifications_enabled = prefs.notifications_enabled;
        self.reminder_status = session.reminders().status();
        self.today = format_date(today);

        self.cards = registry
            .search(&self.search.query)
            .map(|filter| FilterCard::project(filter, today, &self.currency))
            .collect();
        self.counts = stats::status_counts(registry.active(), today);

        self.history_rows = registry
            .history_in_range(self.history_range, today)
            .map(|entry| HistoryRow {
                date: format_date(entry.date),
                filter_name: registry.lookup_name(entry).to_string(),
                cost: self.currency.format(entry.cost),
                notes: entry.notes.clone(),
            })
            .collect();

        let costs = stats::cost_stats(registry.history(), today);
        self.stats = StatisticsView {
            total_cost: self.currency.format(costs.total),
            average_cost: self.currency.format(costs.average),
            monthly_cost: self.currency.format(costs.monthly),
            yearly_projection: self.currency.format(costs.yearly_projection),
            impact: stats::impact(registry.history()),
            performance: stats::performance(registry.active(), registry.history())
                .into_iter()
                .map(|row| PerformanceRow {
                    name: row.name,
                    filter_type: row.filter_type,
                    interval_months: row.replacement_interval,
                    replacements: row.replacements,
                    total_cost: self.currency.format(row.total_cost),
                    cost_per_month: self.currency.format(row.cost_per_month),
                    notifications: row.notifications,
                })
                .collect(),
        };

        self.last_backup = match session.storage().latest_backup() {
            Ok(record) => record.map(|record| record.path.display().to_string()),
            Err(err) => {
                tracing::warn!(?err, "failed to read backup log");
                None
            }
        };
        self.clamp_selection();
    }

    pub fn selected_card(&self) -> Option<&FilterCard> {
        self.cards.get(self.selected)
    }

    pub fn select_card_by_id(&mut self, id: &str) {
        if let Some(index) = self.cards.iter().position(|card| card.id == id) {
            self.selected = index;
        }
    }

    pub fn move_selection(&mut self, delta: isize) {
        let (index, len) = match self.tab {
            Tab::Dashboard => (&mut self.selected, self.cards.len()),
            Tab::History => (&mut self.history_selected, self.history_rows.len()),
            Tab::Settings => (&mut self.settings_selected, SettingsItem::ALL.len()),
            Tab::Statistics => return,
        };
        if len == 0 {
            *index = 0;
            return;
        }
        let next = (*index as isize + delta).clamp(0, len as isize - 1);
        *index = next as usize;
    }

    pub fn selected_setting(&self) -> SettingsItem {
        SettingsItem::ALL[self.settings_selected.min(SettingsItem::ALL.len() - 1)]
    }

    fn clamp_selection(&mut self) {
        self.selected = self.selected.min(self.cards.len().saturating_sub(1));
        self.history_selected = self
            .history_selected
            .min(self.history_rows.len().saturating_sub(1));
    }

    pub fn begin_search(&mut self) {
        self.search.active = true;
    }

    pub fn finish_search(&mut self) {
        self.search.active = false;
    }

    pub fn is_search_active(&self) -> bool {
        self.search.active
    }

    pub fn push_search_char(&mut self, session: &Session, ch: char) {
        self.search.query.push(ch);
        self.selected = 0;
        self.refresh(session);
    }

    pub fn pop_search_char(&mut self, session: &Session) {
        self.search.query.pop();
        self.selected = 0;
        self.refresh(session);
    }

    pub fn cancel_search(&mut self, session: &Session) {
        self.search = SearchState::default();
        self.refresh(session);
    }

    /// Lowercased term used for match highlighting; empty when not searching.
    pub fn highlight_term(&self) -> String {
        normalize_term(&self.search.query)
    }

    pub fn cycle_history_range(&mut self, session: &Session) {
        self.history_range = self.history_range.cycled();
        self.history_selected = 0;
        self.refresh(session);
    }

    pub fn overlay(&self) -> Option<&OverlayState> {
        self.overlay.as_ref()
    }

    pub fn overlay_mut(&mut self) -> Option<&mut OverlayState> {
        self.overlay.as_mut()
    }

    pub fn open_overlay(&mut self, overlay: OverlayState) {
        self.overlay = Some(overlay);
    }

    pub fn close_overlay(&mut self) -> Option<OverlayState> {
        self.overlay.take()
    }

    pub fn filter_form_mut(&mut self) -> Option<&mut FilterForm> {
        match self.overlay.as_mut() {
            Some(OverlayState::FilterForm(form)) => Some(form),
            _ => None,
        }
    }

    /// Interactive reminders wait here until dismissed.
    pub fn push_banner(&mut self, notification: Notification) {
        self.banners.push_back(notification);
    }

    pub fn banner(&self) -> Option<&Notification> {
        self.banners.front()
    }

    pub fn pending_banners(&self) -> usize {
        self.banners.len()
    }

    pub fn dismiss_banner(&mut self) -> Option<Notification> {
        self.banners.pop_front()
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }

    pub fn clear_status_message(&mut self) {
        self.status_message = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::macros::date;

    use super::*;
    use crate::clock::FixedClock;
    use crate::model::FilterDraft;
    use crate::reminders::ChannelNotifier;
    use crate::test_support::{at, init_with_config};

    fn session() -> anyhow::Result<(tempfile::TempDir, Session)> {
        let (temp, config, storage) = init_with_config()?;
        let (notifier, _rx) = ChannelNotifier::bounded(8);
        let clock = Arc::new(FixedClock(at(date!(2025 - 01 - 10), 8, 0)));
        let session = Session::open(Arc::new(config), storage, Box::new(notifier), clock)?;
        Ok((temp, session))
    }

    #[test]
    fn projects_seed_into_cards_and_counts() -> anyhow::Result<()> {
        let (_temp, session) = session()?;
        let state = AppState::new(&session);
        assert_eq!(state.cards.len(), 7);
        assert_eq!(state.counts.total, 7);
        assert_eq!(
            state.counts.overdue + state.counts.due_soon + state.counts.good,
            7
        );
        assert_eq!(state.today, "Jan 10, 2025");
        assert!(state.history_rows.is_empty());
        assert!(state.cards[0].cost.starts_with("ج.م "));
        Ok(())
    }

    #[test]
    fn search_narrows_cards_and_resets_selection() -> anyhow::Result<()> {
        let (_temp, session) = session()?;
        let mut state = AppState::new(&session);
        state.selected = 4;
        state.begin_search();
        for ch in "MEMBRANE".chars() {
            state.push_search_char(&session, ch);
        }
        assert_eq!(state.selected, 0);
        assert!(!state.cards.is_empty());
        assert!(state
            .cards
            .iter()
            .all(|card| card.name.to_lowercase().contains("membrane")
                || card.filter_type.to_lowercase().contains("membrane")));
        assert_eq!(state.highlight_term(), "membrane");

        state.cancel_search(&session);
        assert_eq!(state.cards.len(), 7);
        Ok(())
    }

    #[test]
    fn history_rows_follow_range_and_current_names() -> anyhow::Result<()> {
        let (_temp, mut session) = session()?;
        let filter = session.dispatcher().add_filter(FilterDraft {
            name: Some("Old name".into()),
            cost: Some(1250.0),
            ..FilterDraft::default()
        })?;
        session.dispatcher().mark_replaced(&filter.id)?;
        session.dispatcher().edit_filter(
            &filter.id,
            FilterDraft {
                name: Some("New name".into()),
                ..FilterDraft::default()
            },
        )?;

        let mut state = AppState::new(&session);
        assert_eq!(state.history_rows.len(), 1);
        assert_eq!(state.history_rows[0].filter_name, "New name");
        assert_eq!(state.history_rows[0].cost, "ج.م 1,250");
        assert_eq!(state.history_rows[0].date, "Jan 10, 2025");

        state.cycle_history_range(&session);
        assert_eq!(state.history_range, HistoryRange::Last30Days);
        assert_eq!(state.history_rows.len(), 1);
        Ok(())
    }

    #[test]
    fn selection_is_clamped_per_tab() -> anyhow::Result<()> {
        let (_temp, session) = session()?;
        let mut state = AppState::new(&session);
        state.move_selection(100);
        assert_eq!(state.selected, 6);
        state.tab = Tab::Settings;
        state.move_selection(-3);
        assert_eq!(state.selected_setting(), SettingsItem::Currency);
        state.move_selection(100);
        assert_eq!(state.selected_setting(), SettingsItem::Reset);
        Ok(())
    }

    #[test]
    fn tabs_wrap_around() {
        assert_eq!(Tab::Settings.next(), Tab::Dashboard);
        assert_eq!(Tab::Dashboard.previous(), Tab::Settings);
    }
}
