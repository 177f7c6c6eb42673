use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap};
use ratatui::Frame;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::app::form::{FieldKind, FilterForm};
use crate::app::state::{AppState, FilterCard, OverlayState, SettingsItem, Tab};
use crate::config::Palette;
use crate::due::{format_date, FilterStatus};
use crate::highlight::{build_highlight_regex, split_matches};
use crate::reminders::ReminderStatus;

pub fn draw_app(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let palette = state.theme.palette();
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(frame.size());

    render_tabs(frame, state, &palette, vertical[0]);

    let mut body = vertical[1];
    if let Some(banner) = state.banner() {
        let split = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(1)])
            .split(body);
        let more = state.pending_banners().saturating_sub(1);
        let mut lines = vec![Line::from(Span::styled(
            banner.body.clone(),
            Style::default().fg(palette.text),
        ))];
        let hint = if more > 0 {
            format!("Enter/Esc to dismiss • {more} more waiting")
        } else {
            "Enter/Esc to dismiss".to_string()
        };
        lines.push(Line::from(Span::styled(
            hint,
            Style::default().fg(palette.muted),
        )));
        let paragraph = Paragraph::new(lines)
            .block(
                Block::default()
                    .title(Span::styled(
                        banner.title.clone(),
                        Style::default()
                            .fg(palette.overdue)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(palette.overdue)),
            )
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, split[0]);
        body = split[1];
    }

    match state.tab {
        Tab::Dashboard => render_dashboard(frame, state, &palette, list_state, body),
        Tab::History => render_history(frame, state, &palette, body),
        Tab::Statistics => render_statistics(frame, state, &palette, body),
        Tab::Settings => render_settings(frame, state, &palette, body),
    }

    let status = Paragraph::new(build_status_line(state, &palette)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.border)),
    );
    frame.render_widget(status, vertical[2]);

    render_overlay(frame, state, &palette);
}

fn render_tabs(frame: &mut Frame, state: &AppState, palette: &Palette, area: Rect) {
    let titles: Vec<Line> = Tab::ALL
        .iter()
        .enumerate()
        .map(|(index, tab)| Line::from(format!("{} {}", index + 1, tab.title())))
        .collect();
    let tabs = Tabs::new(titles)
        .select(state.tab.index())
        .block(
            Block::default()
                .title(format!(" AquaTracker • {} ", state.today))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.border)),
        )
        .style(Style::default().fg(palette.muted))
        .highlight_style(
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD),
        )
        .divider("│");
    frame.render_widget(tabs, area);
}

fn render_dashboard(
    frame: &mut Frame,
    state: &AppState,
    palette: &Palette,
    list_state: &mut ListState,
    area: Rect,
) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(area);

    let counts = state.counts;
    let summary = Line::from(vec![
        Span::styled(
            format!("Total {}", counts.total),
            Style::default().fg(palette.text).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  │  "),
        Span::styled(
            format!("Overdue {}", counts.overdue),
            Style::default().fg(palette.overdue),
        ),
        Span::raw("  │  "),
        Span::styled(
            format!("Due soon {}", counts.due_soon),
            Style::default().fg(palette.due_soon),
        ),
        Span::raw("  │  "),
        Span::styled(
            format!("Good {}", counts.good),
            Style::default().fg(palette.good),
        ),
    ]);
    frame.render_widget(
        Paragraph::new(summary).block(
            Block::default()
                .title("Overview")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.border)),
        ),
        rows[0],
    );

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(rows[1]);

    let term = state.highlight_term();
    let regex = build_highlight_regex(&term);
    let highlight_style = Style::default()
        .fg(palette.due_soon)
        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED);

    let mut items: Vec<ListItem> = state
        .cards
        .iter()
        .map(|card| {
            let mut title = highlight_line(
                &card.name,
                regex.as_ref(),
                highlight_style,
                Style::default().fg(palette.text).add_modifier(Modifier::BOLD),
            );
            title.push(Span::raw("  "));
            title.push(Span::styled(
                card.status.label(),
                status_style(card.status, palette),
            ));
            let mut meta = highlight_line(
                &card.location,
                regex.as_ref(),
                highlight_style,
                Style::default().fg(palette.muted),
            );
            meta.push(Span::styled(" • ", Style::default().fg(palette.muted)));
            meta.extend(highlight_line(
                &card.filter_type,
                regex.as_ref(),
                highlight_style,
                Style::default().fg(palette.muted),
            ));
            let due = Line::from(Span::styled(
                card.status_text.clone(),
                status_style(card.status, palette),
            ));
            ListItem::new(vec![Line::from(title), Line::from(meta), due])
        })
        .collect();
    if items.is_empty() {
        let message = if term.is_empty() {
            "No filters yet. Press `a` to add one."
        } else {
            "No filters match the search."
        };
        items.push(ListItem::new(message));
    }

    let list_title = if term.is_empty() {
        "Filters".to_string()
    } else {
        format!("Filters matching \"{term}\"")
    };
    let list = List::new(items)
        .block(
            Block::default()
                .title(list_title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.accent)),
        )
        .highlight_style(
            Style::default()
                .bg(palette.selection_bg)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(list, columns[0], list_state);

    let detail = state
        .selected_card()
        .map(|card| card_detail(card, palette))
        .unwrap_or_else(|| Text::from("Select a filter to see its details."));
    let paragraph = Paragraph::new(detail)
        .block(
            Block::default()
                .title("Details")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.border)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, columns[1]);
}

fn card_detail(card: &FilterCard, palette: &Palette) -> Text<'static> {
    let label = Style::default().fg(palette.muted);
    let value = Style::default().fg(palette.text);
    let row = |name: &str, text: String| {
        Line::from(vec![
            Span::styled(fit_width(name, 14), label),
            Span::styled(text, value),
        ])
    };
    let mut lines = vec![
        Line::from(Span::styled(
            card.name.clone(),
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!("{} – {}", card.status.label(), card.status_text),
            status_style(card.status, palette),
        )),
        Line::from(""),
        row("Location", card.location.clone()),
        row("Stage", card.stage.clone()),
        row("Type", card.filter_type.clone()),
        row("Brand/Model", card.brand_model.clone()),
        row("Installed", card.installed.clone()),
        row("Next due", card.next_due.clone()),
        row("Interval", format!("{} months", card.interval_months)),
        row("Cost", card.cost.clone()),
        row("Reminders", card.reminders.clone()),
    ];
    if !card.notes.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(card.notes.clone(), label)));
    }
    Text::from(lines)
}

fn render_history(frame: &mut Frame, state: &AppState, palette: &Palette, area: Rect) {
    let mut items: Vec<ListItem> = state
        .history_rows
        .iter()
        .map(|row| {
            ListItem::new(vec![
                Line::from(vec![
                    Span::styled(fit_width(&row.date, 14), Style::default().fg(palette.muted)),
                    Span::styled(
                        fit_width(&row.filter_name, 28),
                        Style::default().fg(palette.text).add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(row.cost.clone(), Style::default().fg(palette.accent)),
                ]),
                Line::from(Span::styled(
                    format!("{}{}", " ".repeat(14), row.notes),
                    Style::default().fg(palette.muted),
                )),
            ])
        })
        .collect();
    if items.is_empty() {
        items.push(ListItem::new("No replacements recorded in this period."));
    }
    let title = format!(
        "History • {} • {} entries (f: range, c: clear, x: export)",
        state.history_range.label(),
        state.history_rows.len()
    );
    let list = List::new(items)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.accent)),
        )
        .highlight_style(Style::default().bg(palette.selection_bg))
        .highlight_symbol("▸ ");
    let mut history_state = ListState::default();
    if !state.history_rows.is_empty() {
        history_state.select(Some(state.history_selected));
    }
    frame.render_stateful_widget(list, area, &mut history_state);
}

fn render_statistics(frame: &mut Frame, state: &AppState, palette: &Palette, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(9), Constraint::Min(3)])
        .split(area);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[0]);

    let label = Style::default().fg(palette.muted);
    let value = Style::default().fg(palette.text).add_modifier(Modifier::BOLD);
    let pair = |name: &str, text: String| {
        Line::from(vec![
            Span::styled(fit_width(name, 22), label),
            Span::styled(text, value),
        ])
    };

    let stats = &state.stats;
    let costs = vec![
        pair("Total spent", stats.total_cost.clone()),
        pair("Average replacement", stats.average_cost.clone()),
        pair("Monthly", stats.monthly_cost.clone()),
        pair("Yearly projection", stats.yearly_projection.clone()),
        pair(
            "Filters (due soon)",
            format!("{} ({})", state.counts.total, state.counts.due_soon),
        ),
        pair("Overdue", state.counts.overdue.to_string()),
    ];
    frame.render_widget(
        Paragraph::new(costs).block(
            Block::default()
                .title("Costs")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.border)),
        ),
        columns[0],
    );

    let impact = stats.impact;
    let environment = vec![
        pair("Replacements", impact.replacements.to_string()),
        pair("Bottles saved", impact.bottles_saved.to_string()),
        pair("CO₂ saved", format!("{} lbs", impact.co2_saved_lbs)),
        pair("Plastic waste avoided", format!("{} lbs", impact.waste_reduced_lbs)),
    ];
    frame.render_widget(
        Paragraph::new(environment).block(
            Block::default()
                .title("Environmental impact")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.border)),
        ),
        columns[1],
    );

    let mut lines = vec![Line::from(Span::styled(
        format!(
            "{}{}{}{}{}{}",
            fit_width("Filter", 26),
            fit_width("Type", 14),
            fit_width("Every", 8),
            fit_width("Done", 6),
            fit_width("Per month", 14),
            "Reminders"
        ),
        label.add_modifier(Modifier::BOLD),
    ))];
    for row in &stats.performance {
        lines.push(Line::from(vec![
            Span::styled(fit_width(&row.name, 26), value),
            Span::styled(fit_width(&row.filter_type, 14), label),
            Span::raw(fit_width(&format!("{}mo", row.interval_months), 8)),
            Span::raw(fit_width(&row.replacements.to_string(), 6)),
            Span::styled(
                fit_width(&row.cost_per_month, 14),
                Style::default().fg(palette.accent),
            ),
            Span::styled(row.notifications.clone(), label),
        ]));
    }
    if stats.performance.is_empty() {
        lines.push(Line::from("No active filters."));
    }
    frame.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .title("Filter performance (highest monthly cost first)")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.accent)),
        ),
        rows[1],
    );
}

fn render_settings(frame: &mut Frame, state: &AppState, palette: &Palette, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(9), Constraint::Length(5)])
        .split(area);

    let items: Vec<ListItem> = SettingsItem::ALL
        .iter()
        .map(|item| {
            let current = match item {
                SettingsItem::Currency => format!(
                    "{} ({})",
                    state.currency.code(),
                    state.currency.symbol()
                ),
                SettingsItem::Theme => state.theme.to_string(),
                SettingsItem::Notifications => {
                    reminder_status_label(state.notifications_enabled, &state.reminder_status)
                }
                SettingsItem::ExportAll | SettingsItem::ExportHistory => {
                    "write JSON to the backups folder".to_string()
                }
                SettingsItem::Import => "replace data from a backup file".to_string(),
                SettingsItem::Reset => "erase everything and start over".to_string(),
            };
            let label_style = if *item == SettingsItem::Reset {
                Style::default().fg(palette.overdue)
            } else {
                Style::default().fg(palette.text)
            };
            ListItem::new(Line::from(vec![
                Span::styled(fit_width(item.label(), 18), label_style),
                Span::styled(current, Style::default().fg(palette.muted)),
            ]))
        })
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .title("Settings (Enter to change)")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.accent)),
        )
        .highlight_style(
            Style::default()
                .bg(palette.selection_bg)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    let mut settings_state = ListState::default();
    settings_state.select(Some(state.settings_selected));
    frame.render_stateful_widget(list, rows[0], &mut settings_state);

    let info = vec![
        Line::from(vec![
            Span::styled("Backups: ", Style::default().fg(palette.muted)),
            Span::raw(state.backup_dir.display().to_string()),
        ]),
        Line::from(vec![
            Span::styled("Last backup: ", Style::default().fg(palette.muted)),
            Span::raw(
                state
                    .last_backup
                    .clone()
                    .unwrap_or_else(|| "never".to_string()),
            ),
        ]),
        Line::from(Span::styled(
            format!("aquatracker {}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(palette.muted),
        )),
    ];
    frame.render_widget(
        Paragraph::new(info)
            .block(
                Block::default()
                    .title("Data")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(palette.border)),
            )
            .wrap(Wrap { trim: true }),
        rows[1],
    );
}

fn build_status_line(state: &AppState, palette: &Palette) -> Text<'static> {
    let mut spans = Vec::new();
    if state.is_search_active() {
        spans.push(Span::styled(
            "Search: ",
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::raw(format!("{}▌", state.search.query)));
        spans.push(Span::raw(" | "));
    } else if !state.search.query.is_empty() {
        spans.push(Span::styled(
            format!("Filtered by \"{}\" (/ to edit) ", state.search.query),
            Style::default().fg(palette.muted),
        ));
        spans.push(Span::raw(" | "));
    }

    if let Some(message) = state.status_message() {
        spans.push(Span::styled(
            message.to_string(),
            Style::default().fg(palette.text),
        ));
    } else {
        let hints = match state.tab {
            Tab::Dashboard => "a add • e edit • r replaced • d delete • / search • ? help • q quit",
            Tab::History => "f range • c clear • x export • Tab next view • q quit",
            Tab::Statistics => "Tab next view • ? help • q quit",
            Tab::Settings => "Enter change • c currency • t theme • n reminders • i import • q quit",
        };
        spans.push(Span::styled(hints, Style::default().fg(palette.muted)));
    }
    Text::from(Line::from(spans))
}

fn render_overlay(frame: &mut Frame, state: &AppState, palette: &Palette) {
    let hint = Style::default().fg(palette.muted);
    match state.overlay() {
        Some(OverlayState::FilterForm(form)) => render_filter_form(frame, form, palette),
        Some(OverlayState::ConfirmReplace { name, .. }) => render_confirm(
            frame,
            palette,
            "Mark replaced",
            vec![
                Line::from(format!("Mark {name} as replaced today?")),
                Line::from(Span::styled(
                    "This records the cost in history and restarts the interval.",
                    hint,
                )),
            ],
        ),
        Some(OverlayState::ConfirmDelete { name, .. }) => render_confirm(
            frame,
            palette,
            "Delete filter",
            vec![
                Line::from(format!("Delete {name}?")),
                Line::from(Span::styled(
                    "Its replacement history is kept.",
                    hint,
                )),
            ],
        ),
        Some(OverlayState::ConfirmClearHistory) => render_confirm(
            frame,
            palette,
            "Clear history",
            vec![Line::from(
                "Delete every replacement record? This cannot be undone.",
            )],
        ),
        Some(OverlayState::ConfirmImport { path, summary, .. }) => render_confirm(
            frame,
            palette,
            "Import backup",
            vec![
                Line::from(format!("Replace current data with {}?", path.display())),
                Line::from(Span::styled(summary.clone(), hint)),
            ],
        ),
        Some(OverlayState::ConfirmReset { armed }) => {
            let message = if *armed {
                "Really erase ALL filters, history and settings?"
            } else {
                "Reset all data? Filters, history and settings will be erased."
            };
            render_confirm(frame, palette, "Reset all data", vec![Line::from(message)]);
        }
        Some(OverlayState::ImportPath { input }) => {
            let area = centered_rect(60, 30, frame.size());
            frame.render_widget(Clear, area);
            let mut display = input.clone();
            display.push('▌');
            let paragraph = Paragraph::new(vec![
                Line::from(Span::styled(
                    "Backup file to import",
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(display),
                Line::from(""),
                Line::from(Span::styled("Enter to read • Esc to cancel", hint)),
            ])
            .block(
                Block::default()
                    .title("Import")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(palette.accent)),
            )
            .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        Some(OverlayState::Help) => render_help(frame, palette),
        None => {}
    }
}

fn render_confirm(frame: &mut Frame, palette: &Palette, title: &str, mut lines: Vec<Line<'static>>) {
    let area = centered_rect(60, 30, frame.size());
    frame.render_widget(Clear, area);
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Enter/y to confirm • Esc/n to cancel",
        Style::default().fg(palette.muted),
    )));
    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title(title.to_string())
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.overdue)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_filter_form(frame: &mut Frame, form: &FilterForm, palette: &Palette) {
    let area = centered_rect(70, 90, frame.size());
    frame.render_widget(Clear, area);

    let mut lines = Vec::new();
    for (index, (field, value)) in form.fields().enumerate() {
        let focused = index == form.focus_index();
        let shown = match field.kind() {
            FieldKind::Text if focused => format!("{value}▌"),
            FieldKind::Text => value.to_string(),
            FieldKind::Toggle | FieldKind::Choice => format!("‹ {value} ›"),
        };
        let style = if focused {
            Style::default()
                .bg(palette.selection_bg)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(palette.text)
        };
        lines.push(Line::from(vec![
            Span::styled(fit_width(field.label(), 24), Style::default().fg(palette.muted)),
            Span::styled(shown, style),
        ]));
    }
    lines.push(Line::from(""));
    if let Some(error) = form.error() {
        lines.push(Line::from(Span::styled(
            error.to_string(),
            Style::default().fg(palette.overdue),
        )));
    } else if let Some(preview) = form.install_preview() {
        lines.push(Line::from(Span::styled(
            format!("Installed {preview}"),
            Style::default().fg(palette.muted),
        )));
    }
    lines.push(Line::from(Span::styled(
        "Tab/↑↓ move • ←/→ change • Enter save • Esc cancel",
        Style::default().fg(palette.muted),
    )));

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title(form.title())
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.accent)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_help(frame: &mut Frame, palette: &Palette) {
    let area = centered_rect(60, 60, frame.size());
    frame.render_widget(Clear, area);
    let key = Style::default()
        .fg(palette.accent)
        .add_modifier(Modifier::BOLD);
    let entries = [
        ("1-4 / Tab", "switch view"),
        ("j/k ↑/↓", "move selection"),
        ("a", "add filter"),
        ("e / Enter", "edit selected filter"),
        ("r", "mark selected filter replaced"),
        ("d", "delete selected filter"),
        ("/", "search by name, location or type"),
        ("f", "cycle history range"),
        ("t", "toggle light/dark theme"),
        ("Ctrl-r", "reload from disk"),
        ("q / Ctrl-c", "quit"),
    ];
    let mut lines: Vec<Line> = entries
        .iter()
        .map(|(keys, action)| {
            Line::from(vec![
                Span::styled(fit_width(keys, 14), key),
                Span::raw(*action),
            ])
        })
        .collect();
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Press any key to close",
        Style::default().fg(palette.muted),
    )));
    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .title("Keys")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.accent)),
    );
    frame.render_widget(paragraph, area);
}

fn status_style(status: FilterStatus, palette: &Palette) -> Style {
    let color = match status {
        FilterStatus::Overdue => palette.overdue,
        FilterStatus::DueSoon => palette.due_soon,
        FilterStatus::Good => palette.good,
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

fn reminder_status_label(enabled: bool, status: &ReminderStatus) -> String {
    match status {
        ReminderStatus::Disabled if enabled => "on (starting)".to_string(),
        ReminderStatus::Disabled => "off".to_string(),
        ReminderStatus::Idle => "on, nothing scheduled".to_string(),
        ReminderStatus::Armed { timers, next_fire } => format!(
            "on, {timers} armed, next {} {:02}:{:02}",
            format_date(next_fire.date()),
            next_fire.hour(),
            next_fire.minute()
        ),
        ReminderStatus::Error { message } => format!("error: {message}"),
    }
}

fn highlight_line(
    text: &str,
    regex: Option<&Regex>,
    highlight_style: Style,
    base_style: Style,
) -> Vec<Span<'static>> {
    split_matches(text, regex)
        .into_iter()
        .filter(|(fragment, _)| !fragment.is_empty())
        .map(|(fragment, hit)| {
            let style = if hit { highlight_style } else { base_style };
            Span::styled(fragment.to_string(), style)
        })
        .collect()
}

/// Pads or truncates to `width` display columns, cutting on grapheme
/// boundaries so wide and combining characters stay intact.
fn fit_width(text: &str, width: usize) -> String {
    if text.width() < width {
        let padding = width - text.width();
        return format!("{text}{}", " ".repeat(padding));
    }
    let mut out = String::new();
    let mut used = 0;
    for grapheme in text.graphemes(true) {
        let w = grapheme.width();
        // Leave room for the ellipsis and one separating space.
        if used + w + 2 > width {
            break;
        }
        out.push_str(grapheme);
        used += w;
    }
    out.push('…');
    used += 1;
    out.push_str(&" ".repeat(width.saturating_sub(used)));
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use time::macros::date;

    use super::*;
    use crate::app::{AppState, Session};
    use crate::clock::FixedClock;
    use crate::reminders::ChannelNotifier;
    use crate::test_support::{at, init_with_config};

    fn span_texts(spans: &[Span<'static>]) -> Vec<String> {
        spans
            .iter()
            .map(|span| span.content.clone().into_owned())
            .collect()
    }

    fn rendered(state: &AppState) -> anyhow::Result<String> {
        let mut terminal = Terminal::new(TestBackend::new(120, 40))?;
        let mut list_state = ListState::default();
        list_state.select(Some(state.selected));
        terminal.draw(|frame| draw_app(frame, state, &mut list_state))?;
        let buffer = terminal.backend().buffer();
        Ok(buffer
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect::<String>())
    }

    #[test]
    fn highlight_splits_case_insensitive_matches() {
        let regex = build_highlight_regex("carb");
        let spans = highlight_line(
            "Post Carbon",
            regex.as_ref(),
            Style::default(),
            Style::default(),
        );
        assert_eq!(span_texts(&spans), vec!["Post ", "Carb", "on"]);
    }

    #[test]
    fn fit_width_pads_and_truncates() {
        assert_eq!(fit_width("Type", 8), "Type    ");
        assert_eq!(fit_width("Sediment Pre-Filter", 10), "Sediment… ");
        assert_eq!(fit_width("ج.م", 5).width(), 5);
    }

    #[test]
    fn reminder_label_describes_next_fire() {
        let status = ReminderStatus::Armed {
            timers: 3,
            next_fire: at(date!(2025 - 01 - 15), 9, 0),
        };
        assert_eq!(
            reminder_status_label(true, &status),
            "on, 3 armed, next Jan 15, 2025 09:00"
        );
        assert_eq!(reminder_status_label(false, &ReminderStatus::Disabled), "off");
    }

    #[test]
    fn every_tab_renders() -> anyhow::Result<()> {
        let (_temp, config, storage) = init_with_config()?;
        let (notifier, _rx) = ChannelNotifier::bounded(8);
        let clock = Arc::new(FixedClock(at(date!(2025 - 01 - 10), 8, 0)));
        let session = Session::open(Arc::new(config), storage, Box::new(notifier), clock)?;
        let mut state = AppState::new(&session);

        let dashboard = rendered(&state)?;
        assert!(dashboard.contains("Sediment Pre-Filter"));
        assert!(dashboard.contains("Total 7"));

        state.tab = Tab::History;
        assert!(rendered(&state)?.contains("No replacements recorded"));
        state.tab = Tab::Statistics;
        assert!(rendered(&state)?.contains("Environmental impact"));
        state.tab = Tab::Settings;
        assert!(rendered(&state)?.contains("Reset all data"));

        state.open_overlay(OverlayState::Help);
        assert!(rendered(&state)?.contains("Press any key to close"));
        Ok(())
    }
}
