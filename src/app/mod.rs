use std::io::Stdout;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::style::Print;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::ListState;
use ratatui::Terminal;

use crate::backup::ImportDocument;
use crate::clock::SystemClock;
use crate::config::AppConfig;
use crate::due::format_date;
use crate::registry::RegistryError;
use crate::reminders::{ChannelNotifier, Notification};
use crate::storage::StorageHandle;
use crate::ui;

pub mod actions;
pub mod form;
mod session;
pub mod state;

pub use actions::{ActionDispatcher, NotificationsOutcome};
pub use form::{FieldId, FieldKind, FilterForm};
pub use session::Session;
pub use state::{AppState, FilterCard, HistoryRow, OverlayState, SettingsItem, Tab};

const REMINDER_QUEUE: usize = 64;

enum Action {
    Quit,
    NextTab,
    PreviousTab,
    GoToTab(Tab),
    SelectNext,
    SelectPrevious,
    Refresh,
    ShowHelp,
    DismissBanner,
    StartSearch,
    AddFilter,
    EditFilter,
    ReplaceFilter,
    DeleteFilter,
    CycleHistoryRange,
    ClearHistory,
    ExportHistory,
    ExportAll,
    ImportBackup,
    CycleCurrency,
    ToggleTheme,
    ToggleNotifications,
    ResetAll,
    ActivateSetting,
}

pub struct App {
    pub config: Arc<AppConfig>,
    session: Session,
    state: AppState,
    list_state: ListState,
    reminders_rx: Receiver<Notification>,
    should_quit: bool,
    tick_rate: Duration,
    last_sync: Instant,
}

impl App {
    pub fn new(config: Arc<AppConfig>, storage: StorageHandle) -> Result<Self> {
        let (notifier, reminders_rx) = ChannelNotifier::bounded(REMINDER_QUEUE);
        let session = Session::open(
            config.clone(),
            storage,
            Box::new(notifier),
            Arc::new(SystemClock),
        )
        .context("opening session for the TUI")?;
        Ok(Self::with_session(config, session, reminders_rx))
    }

    pub fn with_session(
        config: Arc<AppConfig>,
        session: Session,
        reminders_rx: Receiver<Notification>,
    ) -> Self {
        let state = AppState::new(&session);
        let mut list_state = ListState::default();
        if !state.cards.is_empty() {
            list_state.select(Some(state.selected));
        }
        Self {
            tick_rate: Duration::from_millis(config.tick_rate_ms.max(16)),
            config,
            session,
            state,
            list_state,
            reminders_rx,
            should_quit: false,
            last_sync: Instant::now(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            terminal
                .draw(|frame| {
                    if self.state.cards.is_empty() {
                        self.list_state.select(None);
                    } else {
                        self.list_state.select(Some(self.state.selected));
                    }
                    ui::draw_app(frame, &self.state, &mut self.list_state);
                })
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));

            if event::poll(timeout).context("polling for terminal events")? {
                match event::read().context("reading terminal event")? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Resize(_, _) => {}
                    _ => {}
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.on_tick();
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    fn on_tick(&mut self) {
        if self.last_sync.elapsed() >= self.config.reminders.check_interval() {
            self.last_sync = Instant::now();
            match self.session.sync_from_store() {
                Ok(true) => {
                    self.state.refresh(&self.session);
                    self.state
                        .set_status_message(Some("Reloaded changes made outside this window"));
                }
                Ok(false) => {}
                Err(err) => tracing::error!(?err, "failed to check store for changes"),
            }
        }

        self.session.poll_reminders();
        self.drain_reminders();

        let today = format_date(self.session.today());
        if today != self.state.today {
            // Day rolled over: statuses and countdowns all shift.
            self.state.refresh(&self.session);
        } else {
            self.state.reminder_status = self.session.reminders().status();
        }
    }

    fn drain_reminders(&mut self) {
        let mut ring = false;
        while let Ok(notification) = self.reminders_rx.try_recv() {
            if notification.interactive {
                ring = true;
                self.state.push_banner(notification);
            } else {
                self.state.set_status_message(Some(format!(
                    "{}: {}",
                    notification.title, notification.body
                )));
            }
        }
        if ring && self.config.reminders.terminal_bell {
            if let Err(err) = execute!(std::io::stdout(), Print('\x07')) {
                tracing::warn!(?err, "failed to ring terminal bell");
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.handle_overlay_key(key) {
            return;
        }

        if self.state.is_search_active() {
            match key.code {
                KeyCode::Esc => {
                    self.state.cancel_search(&self.session);
                    self.sync_list_state();
                    return;
                }
                KeyCode::Enter => {
                    self.state.finish_search();
                    return;
                }
                KeyCode::Backspace => {
                    self.state.pop_search_char(&self.session);
                    return;
                }
                KeyCode::Char(ch) if is_plain(&key) => {
                    self.state.push_search_char(&self.session, ch);
                    return;
                }
                _ => {}
            }
        }

        if self.state.banner().is_some() && matches!(key.code, KeyCode::Esc | KeyCode::Enter) {
            self.handle_action(Action::DismissBanner);
            return;
        }

        let tab = self.state.tab;
        let action = match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Quit)
            }
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Refresh)
            }
            _ if !is_plain(&key) => None,
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Tab => Some(Action::NextTab),
            KeyCode::BackTab => Some(Action::PreviousTab),
            KeyCode::Char('1') => Some(Action::GoToTab(Tab::Dashboard)),
            KeyCode::Char('2') => Some(Action::GoToTab(Tab::History)),
            KeyCode::Char('3') => Some(Action::GoToTab(Tab::Statistics)),
            KeyCode::Char('4') => Some(Action::GoToTab(Tab::Settings)),
            KeyCode::Char('j') | KeyCode::Down => Some(Action::SelectNext),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::SelectPrevious),
            KeyCode::Char('?') => Some(Action::ShowHelp),
            KeyCode::Char('/') if tab == Tab::Dashboard => Some(Action::StartSearch),
            KeyCode::Char('a') if tab == Tab::Dashboard => Some(Action::AddFilter),
            KeyCode::Char('e') | KeyCode::Enter if tab == Tab::Dashboard => {
                Some(Action::EditFilter)
            }
            KeyCode::Char('r') if tab == Tab::Dashboard => Some(Action::ReplaceFilter),
            KeyCode::Char('d') if tab == Tab::Dashboard => Some(Action::DeleteFilter),
            KeyCode::Char('f') | KeyCode::Left | KeyCode::Right if tab == Tab::History => {
                Some(Action::CycleHistoryRange)
            }
            KeyCode::Char('c') if tab == Tab::History => Some(Action::ClearHistory),
            KeyCode::Char('x') if tab == Tab::History => Some(Action::ExportHistory),
            KeyCode::Enter | KeyCode::Char(' ') if tab == Tab::Settings => {
                Some(Action::ActivateSetting)
            }
            KeyCode::Char('c') if tab == Tab::Settings => Some(Action::CycleCurrency),
            KeyCode::Char('t') => Some(Action::ToggleTheme),
            KeyCode::Char('n') if tab == Tab::Settings => Some(Action::ToggleNotifications),
            KeyCode::Char('x') if tab == Tab::Settings => Some(Action::ExportAll),
            KeyCode::Char('i') if tab == Tab::Settings => Some(Action::ImportBackup),
            KeyCode::Char('R') if tab == Tab::Settings => Some(Action::ResetAll),
            _ => None,
        };

        if let Some(action) = action {
            self.handle_action(action);
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::NextTab => self.state.tab = self.state.tab.next(),
            Action::PreviousTab => self.state.tab = self.state.tab.previous(),
            Action::GoToTab(tab) => self.state.tab = tab,
            Action::SelectNext => self.state.move_selection(1),
            Action::SelectPrevious => self.state.move_selection(-1),
            Action::Refresh => self.handle_refresh(),
            Action::ShowHelp => self.state.open_overlay(OverlayState::Help),
            Action::DismissBanner => {
                self.state.dismiss_banner();
            }
            Action::StartSearch => {
                self.state.begin_search();
                self.state
                    .set_status_message(Some("Search: type to filter • Enter keep • Esc clear"));
            }
            Action::AddFilter => {
                let form = FilterForm::blank(self.session.today());
                self.state.open_overlay(OverlayState::FilterForm(form));
                self.state.set_status_message(Some(
                    "Tab/↑↓ move • ←/→ or space change choice • Enter save • Esc cancel",
                ));
            }
            Action::EditFilter => self.handle_edit_filter(),
            Action::ReplaceFilter => self.handle_confirm_selected(true),
            Action::DeleteFilter => self.handle_confirm_selected(false),
            Action::CycleHistoryRange => {
                self.state.cycle_history_range(&self.session);
                let label = self.state.history_range.label();
                self.state
                    .set_status_message(Some(format!("Showing history: {label}")));
            }
            Action::ClearHistory => {
                if self.session.registry().history().is_empty() {
                    self.state.set_status_message(Some("History is already empty"));
                } else {
                    self.state.open_overlay(OverlayState::ConfirmClearHistory);
                }
            }
            Action::ExportHistory => self.handle_export(false),
            Action::ExportAll => self.handle_export(true),
            Action::ImportBackup => {
                self.state.open_overlay(OverlayState::ImportPath {
                    input: String::new(),
                });
                self.state
                    .set_status_message(Some("Enter the path of a backup file"));
            }
            Action::CycleCurrency => self.handle_cycle_currency(),
            Action::ToggleTheme => self.handle_toggle_theme(),
            Action::ToggleNotifications => self.handle_toggle_notifications(),
            Action::ResetAll => self
                .state
                .open_overlay(OverlayState::ConfirmReset { armed: false }),
            Action::ActivateSetting => {
                let next = match self.state.selected_setting() {
                    SettingsItem::Currency => Action::CycleCurrency,
                    SettingsItem::Theme => Action::ToggleTheme,
                    SettingsItem::Notifications => Action::ToggleNotifications,
                    SettingsItem::ExportAll => Action::ExportAll,
                    SettingsItem::ExportHistory => Action::ExportHistory,
                    SettingsItem::Import => Action::ImportBackup,
                    SettingsItem::Reset => Action::ResetAll,
                };
                self.handle_action(next);
            }
        }
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) -> bool {
        match self.state.overlay() {
            Some(OverlayState::FilterForm(_)) => {
                match key.code {
                    KeyCode::Esc => {
                        self.state.close_overlay();
                        self.state.set_status_message(Some("Canceled"));
                    }
                    KeyCode::Enter => self.submit_filter_form(),
                    KeyCode::Tab | KeyCode::Down => {
                        if let Some(form) = self.state.filter_form_mut() {
                            form.focus_next();
                        }
                    }
                    KeyCode::BackTab | KeyCode::Up => {
                        if let Some(form) = self.state.filter_form_mut() {
                            form.focus_previous();
                        }
                    }
                    KeyCode::Left | KeyCode::Right => {
                        if let Some(form) = self.state.filter_form_mut() {
                            form.cycle(key.code == KeyCode::Right);
                        }
                    }
                    KeyCode::Backspace => {
                        if let Some(form) = self.state.filter_form_mut() {
                            form.pop_char();
                        }
                    }
                    KeyCode::Char(ch) if is_plain(&key) => {
                        if let Some(form) = self.state.filter_form_mut() {
                            form.push_char(ch);
                        }
                    }
                    _ => {}
                }
                true
            }
            Some(OverlayState::ImportPath { .. }) => {
                match key.code {
                    KeyCode::Esc => {
                        self.state.close_overlay();
                        self.state.set_status_message(Some("Import canceled"));
                    }
                    KeyCode::Enter => self.submit_import_path(),
                    KeyCode::Backspace => {
                        if let Some(OverlayState::ImportPath { input }) = self.state.overlay_mut()
                        {
                            input.pop();
                        }
                    }
                    KeyCode::Char(ch) if is_plain(&key) => {
                        if let Some(OverlayState::ImportPath { input }) = self.state.overlay_mut()
                        {
                            input.push(ch);
                        }
                    }
                    _ => {}
                }
                true
            }
            Some(OverlayState::Help) => {
                self.state.close_overlay();
                true
            }
            Some(_) => {
                match key.code {
                    KeyCode::Esc | KeyCode::Char('n') => {
                        self.state.close_overlay();
                        self.state.set_status_message(Some("Canceled"));
                    }
                    KeyCode::Enter | KeyCode::Char('y') => self.confirm_overlay(),
                    _ => {}
                }
                true
            }
            None => false,
        }
    }

    fn confirm_overlay(&mut self) {
        let Some(overlay) = self.state.close_overlay() else {
            return;
        };
        match overlay {
            OverlayState::ConfirmReplace { id, name } => {
                let result = self.session.dispatcher().mark_replaced(&id);
                match result {
                    Ok(next_due) => {
                        self.after_mutation();
                        self.state.select_card_by_id(&id);
                        self.state.set_status_message(Some(format!(
                            "{name} marked as replaced. Next replacement due {}",
                            format_date(next_due)
                        )));
                    }
                    Err(err) => self.report_registry_error("mark filter replaced", err),
                }
            }
            OverlayState::ConfirmDelete { id, name } => {
                let result = self.session.dispatcher().remove_filter(&id);
                match result {
                    Ok(_) => {
                        self.after_mutation();
                        self.state
                            .set_status_message(Some(format!("Deleted {name}")));
                    }
                    Err(err) => self.report_registry_error("delete filter", err),
                }
            }
            OverlayState::ConfirmClearHistory => {
                let result = self.session.dispatcher().clear_history();
                match result {
                    Ok(cleared) => {
                        self.after_mutation();
                        self.state.set_status_message(Some(format!(
                            "Cleared {cleared} history entries"
                        )));
                    }
                    Err(err) => self.report_registry_error("clear history", err),
                }
            }
            OverlayState::ConfirmImport {
                path, document, ..
            } => {
                let result = self.session.dispatcher().import(*document);
                match result {
                    Ok(()) => {
                        self.after_mutation();
                        self.state.set_status_message(Some(format!(
                            "Imported {}",
                            path.display()
                        )));
                    }
                    Err(err) => self.report_registry_error("import backup", err),
                }
            }
            OverlayState::ConfirmReset { armed: false } => {
                self.state
                    .open_overlay(OverlayState::ConfirmReset { armed: true });
            }
            OverlayState::ConfirmReset { armed: true } => {
                let result = self.session.dispatcher().reset_all();
                match result {
                    Ok(_) => {
                        self.after_mutation();
                        self.state.tab = Tab::Dashboard;
                        self.state
                            .set_status_message(Some("All data cleared; defaults restored"));
                    }
                    Err(err) => {
                        tracing::error!(?err, "failed to reset data");
                        self.state
                            .set_status_message(Some(format!("Reset failed: {err:#}")));
                    }
                }
            }
            other => self.state.open_overlay(other),
        }
    }

    fn submit_filter_form(&mut self) {
        let Some(OverlayState::FilterForm(form)) = self.state.overlay() else {
            return;
        };
        let editing = form.editing().map(str::to_string);
        let draft = match form.to_draft() {
            Ok(draft) => draft,
            Err(message) => {
                if let Some(form) = self.state.filter_form_mut() {
                    form.set_error(message.clone());
                }
                self.state.set_status_message(Some(message));
                return;
            }
        };
        let result = match &editing {
            Some(id) => self.session.dispatcher().edit_filter(id, draft),
            None => self.session.dispatcher().add_filter(draft),
        };
        match result {
            Ok(filter) => {
                self.state.close_overlay();
                self.after_mutation();
                self.state.select_card_by_id(&filter.id);
                let verb = if editing.is_some() { "Updated" } else { "Added" };
                self.state.set_status_message(Some(format!(
                    "{verb} {}. Next replacement due {}",
                    filter.name,
                    format_date(filter.next_due_date)
                )));
            }
            Err(err) => self.report_registry_error("save filter", err),
        }
    }

    fn submit_import_path(&mut self) {
        let Some(OverlayState::ImportPath { input }) = self.state.overlay() else {
            return;
        };
        let raw = input.trim();
        if raw.is_empty() {
            self.state.set_status_message(Some("Path cannot be empty"));
            return;
        }
        let path = PathBuf::from(raw);
        match ImportDocument::read(&path) {
            Ok(document) => {
                let summary = document.summary();
                self.state.open_overlay(OverlayState::ConfirmImport {
                    path,
                    summary,
                    document: Box::new(document),
                });
            }
            Err(err) => {
                tracing::warn!(%err, "backup rejected");
                self.state.close_overlay();
                self.state
                    .set_status_message(Some(format!("Import failed: {err}")));
            }
        }
    }

    fn handle_edit_filter(&mut self) {
        let Some(id) = self.state.selected_card().map(|card| card.id.clone()) else {
            self.state.set_status_message(Some("No filter selected"));
            return;
        };
        let Some(filter) = self.session.registry().get(&id) else {
            self.state.set_status_message(Some("Filter not found"));
            return;
        };
        let form = FilterForm::edit(filter);
        self.state.open_overlay(OverlayState::FilterForm(form));
    }

    fn handle_confirm_selected(&mut self, replace: bool) {
        let Some(card) = self.state.selected_card() else {
            self.state.set_status_message(Some("No filter selected"));
            return;
        };
        let id = card.id.clone();
        let name = card.name.clone();
        let overlay = if replace {
            OverlayState::ConfirmReplace { id, name }
        } else {
            OverlayState::ConfirmDelete { id, name }
        };
        self.state.open_overlay(overlay);
    }

    fn handle_export(&mut self, complete: bool) {
        let result = if complete {
            self.session.dispatcher().export_all(None)
        } else {
            self.session.dispatcher().export_history(None)
        };
        match result {
            Ok(path) => {
                self.after_mutation();
                self.state
                    .set_status_message(Some(format!("Exported to {}", path.display())));
            }
            Err(err) => {
                tracing::error!(?err, "export failed");
                self.state
                    .set_status_message(Some(format!("Export failed: {err:#}")));
            }
        }
    }

    fn handle_cycle_currency(&mut self) {
        let result = self.session.dispatcher().cycle_currency();
        match result {
            Ok(currency) => {
                self.after_mutation();
                self.state
                    .set_status_message(Some(format!("Currency set to {currency}")));
            }
            Err(err) => {
                tracing::error!(?err, "failed to change currency");
                self.state
                    .set_status_message(Some("Failed to change currency"));
            }
        }
    }

    fn handle_toggle_theme(&mut self) {
        let result = self.session.dispatcher().toggle_theme();
        match result {
            Ok(theme) => {
                self.after_mutation();
                self.state
                    .set_status_message(Some(format!("Theme: {theme}")));
            }
            Err(err) => {
                tracing::error!(?err, "failed to change theme");
                self.state.set_status_message(Some("Failed to change theme"));
            }
        }
    }

    fn handle_toggle_notifications(&mut self) {
        let result = self.session.dispatcher().toggle_notifications();
        let message = match result {
            Ok(NotificationsOutcome::Enabled) => "Reminders enabled",
            Ok(NotificationsOutcome::Disabled) => "Reminders disabled",
            Ok(NotificationsOutcome::Denied) => {
                "Notifications are not permitted here; reminders stay off"
            }
            Err(err) => {
                tracing::error!(?err, "failed to change notification preference");
                "Failed to change notification preference"
            }
        };
        self.after_mutation();
        self.state.set_status_message(Some(message));
    }

    fn handle_refresh(&mut self) {
        match self.session.sync_from_store() {
            Ok(_) => {
                self.state.refresh(&self.session);
                self.state.set_status_message(Some("Refreshed"));
            }
            Err(err) => {
                tracing::error!(?err, "failed to refresh from storage");
                self.state.set_status_message(Some("Refresh failed; see logs"));
            }
        }
    }

    /// Our own writes are not external changes; re-project and move on.
    fn after_mutation(&mut self) {
        if let Err(err) = self.session.mark_synced() {
            tracing::warn!(?err, "failed to read store revision");
        }
        self.state.refresh(&self.session);
        self.sync_list_state();
    }

    fn sync_list_state(&mut self) {
        if self.state.cards.is_empty() {
            self.list_state.select(None);
        } else {
            self.list_state.select(Some(self.state.selected));
        }
    }

    fn report_registry_error(&mut self, operation: &str, err: RegistryError) {
        match err {
            RegistryError::NotFound(id) => {
                tracing::warn!(%id, operation, "filter not found");
                self.state
                    .set_status_message(Some("Filter not found; it may have been removed"));
                self.state.refresh(&self.session);
            }
            RegistryError::Storage(err) => {
                tracing::error!(?err, operation, "storage failure");
                self.state
                    .set_status_message(Some(format!("Could not {operation}: {err:#}")));
            }
        }
    }
}

fn is_plain(key: &KeyEvent) -> bool {
    !key.modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER)
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("restoring screen state")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::ThemeName;
    use crate::reminders::{ReminderKind, ReminderStatus};
    use crate::test_support::{at, init_with_config};
    use crossbeam_channel::Sender;
    use time::macros::date;

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_text(app: &mut App, text: &str) {
        text.chars().for_each(|ch| press(app, KeyCode::Char(ch)));
    }

    fn app() -> anyhow::Result<(tempfile::TempDir, App, Sender<Notification>)> {
        let (temp, mut config, storage) = init_with_config()?;
        config.reminders.terminal_bell = false;
        let config = Arc::new(config);
        let (notifier, _unused) = ChannelNotifier::bounded(8);
        let clock = Arc::new(FixedClock(at(date!(2025 - 01 - 10), 8, 0)));
        let session = Session::open(config.clone(), storage, Box::new(notifier), clock)?;
        let (tx, rx) = crossbeam_channel::bounded(8);
        Ok((temp, App::with_session(config, session, rx), tx))
    }

    #[test]
    fn add_form_creates_a_filter() -> anyhow::Result<()> {
        let (_temp, mut app, _tx) = app()?;
        press(&mut app, KeyCode::Char('a'));
        assert!(matches!(
            app.state().overlay(),
            Some(OverlayState::FilterForm(_))
        ));
        type_text(&mut app, "Garden hose");
        press(&mut app, KeyCode::Enter);

        assert!(app.state().overlay().is_none());
        assert_eq!(app.state().cards.len(), 8);
        assert_eq!(
            app.state().selected_card().map(|card| card.name.as_str()),
            Some("Garden hose")
        );
        assert_eq!(
            app.state().status_message(),
            Some("Added Garden hose. Next replacement due Jul 10, 2025")
        );
        Ok(())
    }

    #[test]
    fn invalid_form_stays_open_with_an_error() -> anyhow::Result<()> {
        let (_temp, mut app, _tx) = app()?;
        press(&mut app, KeyCode::Char('a'));
        for _ in 0..6 {
            press(&mut app, KeyCode::Tab);
        }
        press(&mut app, KeyCode::Backspace);
        press(&mut app, KeyCode::Backspace);
        type_text(&mut app, "45");
        press(&mut app, KeyCode::Enter);

        let Some(OverlayState::FilterForm(form)) = app.state().overlay() else {
            anyhow::bail!("form closed on invalid input");
        };
        assert!(form.error().is_some_and(|e| e.starts_with("Install date")));
        assert_eq!(app.state().cards.len(), 7);
        Ok(())
    }

    #[test]
    fn replace_and_delete_require_confirmation() -> anyhow::Result<()> {
        let (_temp, mut app, _tx) = app()?;
        let name = app
            .state()
            .selected_card()
            .map(|card| card.name.clone())
            .unwrap_or_default();

        press(&mut app, KeyCode::Char('r'));
        press(&mut app, KeyCode::Esc);
        assert!(app.session.registry().history().is_empty());

        press(&mut app, KeyCode::Char('r'));
        press(&mut app, KeyCode::Char('y'));
        assert_eq!(app.session.registry().history().len(), 1);
        assert!(app
            .state()
            .status_message()
            .is_some_and(|m| m.starts_with(&format!("{name} marked as replaced"))));

        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.state().cards.len(), 6);
        assert_eq!(app.session.registry().all().len(), 7);
        Ok(())
    }

    #[test]
    fn reset_needs_two_confirmations() -> anyhow::Result<()> {
        let (_temp, mut app, _tx) = app()?;
        press(&mut app, KeyCode::Char('4'));
        press(&mut app, KeyCode::Char('t'));
        assert_eq!(app.state().theme, ThemeName::Dark);

        press(&mut app, KeyCode::Char('R'));
        press(&mut app, KeyCode::Enter);
        assert!(matches!(
            app.state().overlay(),
            Some(OverlayState::ConfirmReset { armed: true })
        ));
        press(&mut app, KeyCode::Enter);
        assert!(app.state().overlay().is_none());
        assert_eq!(app.state().theme, ThemeName::Light);
        assert_eq!(app.state().tab, Tab::Dashboard);
        Ok(())
    }

    #[test]
    fn search_filters_cards_until_cleared() -> anyhow::Result<()> {
        let (_temp, mut app, _tx) = app()?;
        press(&mut app, KeyCode::Char('/'));
        type_text(&mut app, "uv");
        assert_eq!(app.state().cards.len(), 1);
        press(&mut app, KeyCode::Enter);
        assert!(!app.state().is_search_active());
        assert_eq!(app.state().search.query, "uv");
        press(&mut app, KeyCode::Char('/'));
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.state().cards.len(), 7);
        Ok(())
    }

    #[test]
    fn interactive_reminders_wait_in_the_banner() -> anyhow::Result<()> {
        let (_temp, mut app, tx) = app()?;
        let reminder = |kind: ReminderKind| Notification {
            filter_id: "f1".into(),
            kind,
            title: kind.title().into(),
            body: "UV Sterilizer Lamp: Overdue by 2 days".into(),
            interactive: kind.interactive(),
            fired_at: at(date!(2025 - 01 - 10), 8, 0),
        };
        tx.send(reminder(ReminderKind::Buy))?;
        tx.send(reminder(ReminderKind::Overdue))?;
        app.drain_reminders();

        assert_eq!(app.state().pending_banners(), 1);
        assert!(app
            .state()
            .status_message()
            .is_some_and(|m| m.starts_with("Time to buy new filter")));
        press(&mut app, KeyCode::Esc);
        assert!(app.state().banner().is_none());
        Ok(())
    }

    #[test]
    fn notifications_toggle_from_settings() -> anyhow::Result<()> {
        let (_temp, mut app, _tx) = app()?;
        press(&mut app, KeyCode::Char('4'));
        press(&mut app, KeyCode::Char('n'));
        assert!(app.state().notifications_enabled);
        assert_ne!(app.state().reminder_status, ReminderStatus::Disabled);
        Ok(())
    }

    #[test]
    fn ctrl_c_quits() -> anyhow::Result<()> {
        let (_temp, mut app, _tx) = app()?;
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
        Ok(())
    }
}
