use std::fmt::Write as _;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use time::{Duration, PrimitiveDateTime};

use crate::app::{App, NotificationsOutcome, Session};
use crate::backup::ImportDocument;
use crate::clock::SystemClock;
use crate::config::{AppConfig, ThemeName};
use crate::due::{describe, format_date};
use crate::model::FilterDraft;
use crate::prefs::Currency;
use crate::reminders::{Permission, StdoutNotifier};
use crate::search::{entries_in_span, normalize_term, parse_date_span, parse_single_date, DateSpan};
use crate::stats;
use crate::storage::StorageHandle;

/// Fields shared by `add` and `edit`. Anything left out keeps its current
/// value (or the default for a new filter).
#[derive(Args, Debug, Clone, Default)]
pub struct FilterFields {
    /// Where the filter is installed, e.g. "RO System - Kitchen"
    #[arg(long)]
    pub location: Option<String>,
    /// Stage label within a multi-stage system
    #[arg(long)]
    pub stage: Option<String>,
    /// Filter type, e.g. Sediment or "RO Membrane"
    #[arg(long = "type")]
    pub filter_type: Option<String>,
    #[arg(long)]
    pub brand: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    /// Install date as YYYY-MM-DD (defaults to today for new filters)
    #[arg(long)]
    pub installed: Option<String>,
    /// Replacement interval in months
    #[arg(long)]
    pub interval: Option<i64>,
    /// Unit cost of a replacement
    #[arg(long)]
    pub cost: Option<f64>,
    #[arg(long)]
    pub notes: Option<String>,
}

impl FilterFields {
    fn into_draft(self, name: Option<String>) -> Result<FilterDraft> {
        let install_date = match self.installed.as_deref() {
            Some(raw) => Some(
                parse_single_date(raw)
                    .with_context(|| format!("install date must look like 2025-01-15, got '{raw}'"))?,
            ),
            None => None,
        };
        Ok(FilterDraft {
            name,
            location: self.location,
            stage: self.stage,
            filter_type: self.filter_type,
            brand: self.brand,
            model: self.model,
            notes: self.notes,
            install_date,
            replacement_interval: self.interval,
            cost: self.cost,
            notification_settings: None,
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Display name of the new filter
    pub name: String,
    #[command(flatten)]
    pub fields: FilterFields,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Only show filters whose name, location or type contains this text
    #[arg(long, short)]
    pub search: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    /// Filter id or exact name
    pub filter: String,
    /// New display name
    #[arg(long)]
    pub name: Option<String>,
    #[command(flatten)]
    pub fields: FilterFields,
}

#[derive(Args, Debug, Clone)]
pub struct IdArgs {
    /// Filter id or exact name
    pub filter: String,
}

#[derive(Args, Debug, Clone, Default)]
pub struct HistoryArgs {
    /// Only entries from the last N days
    #[arg(long, conflicts_with = "between")]
    pub days: Option<u32>,
    /// Only entries inside FROM..TO (either end may be left open)
    #[arg(long)]
    pub between: Option<String>,
    /// Write the history to a JSON file instead of printing it
    #[arg(long, conflicts_with = "clear")]
    pub export: bool,
    /// Export target (defaults to the backups directory)
    #[arg(long, requires = "export")]
    pub out: Option<PathBuf>,
    /// Delete every history entry
    #[arg(long)]
    pub clear: bool,
    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ExportArgs {
    /// Target file (defaults to the backups directory)
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// Backup file written by `export`
    pub path: PathBuf,
    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ResetArgs {
    /// Required when stdin is not a terminal
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CurrencyArgs {
    /// ISO code such as EGP, USD or EUR; prints the current one if omitted
    pub code: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ThemeArgs {
    /// light or dark; prints the current theme if omitted
    pub theme: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switch {
    On,
    Off,
}

#[derive(Args, Debug, Clone, Default)]
pub struct NotificationsArgs {
    /// Prints the current state if omitted
    #[arg(value_enum)]
    pub state: Option<Switch>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct WatchArgs {
    /// Check once, print anything due, and exit
    #[arg(long)]
    pub once: bool,
}

pub fn run_tui(app: &mut App) -> Result<()> {
    app.run()
}

fn open_session(config: Arc<AppConfig>, storage: StorageHandle) -> Result<Session> {
    let notifier = StdoutNotifier::new(config.reminders.terminal_bell);
    Session::open(config, storage, Box::new(notifier), Arc::new(SystemClock))
}

pub fn add_filter(config: Arc<AppConfig>, storage: StorageHandle, args: AddArgs) -> Result<()> {
    let mut session = open_session(config, storage)?;
    println!("{}", run_add(&mut session, args)?);
    Ok(())
}

fn run_add(session: &mut Session, args: AddArgs) -> Result<String> {
    let name = args.name.trim().to_string();
    if name.is_empty() {
        bail!("filter name cannot be empty");
    }
    let draft = args.fields.into_draft(Some(name))?;
    let filter = session
        .dispatcher()
        .add_filter(draft)
        .context("adding filter")?;
    Ok(format!(
        "Added {} ({}). Next replacement due {}",
        filter.name,
        filter.id,
        format_date(filter.next_due_date)
    ))
}

pub fn list_filters(config: Arc<AppConfig>, storage: StorageHandle, args: ListArgs) -> Result<()> {
    let session = open_session(config, storage)?;
    print!("{}", render_list(&session, &args));
    Ok(())
}

fn render_list(session: &Session, args: &ListArgs) -> String {
    let today = session.today();
    let registry = session.registry();
    let currency = &session.prefs().currency;
    let term = args.search.as_deref().unwrap_or("");
    let mut out = String::new();
    let mut shown = 0;
    for filter in registry.search(term) {
        let (status, _, text) = describe(filter.next_due_date, today);
        let _ = writeln!(&mut out, "{}  {}  [{}]", filter.id, filter.name, status);
        let _ = writeln!(
            &mut out,
            "    {} • {} • every {} months • {}",
            filter.location,
            filter.filter_type,
            filter.replacement_interval,
            currency.format(filter.cost)
        );
        let _ = writeln!(
            &mut out,
            "    {} (due {})",
            text,
            format_date(filter.next_due_date)
        );
        shown += 1;
    }
    if shown == 0 {
        out.push_str(if term.trim().is_empty() {
            "No filters yet.\n"
        } else {
            "No filters match.\n"
        });
    }
    out
}

pub fn edit_filter(config: Arc<AppConfig>, storage: StorageHandle, args: EditArgs) -> Result<()> {
    let mut session = open_session(config, storage)?;
    println!("{}", run_edit(&mut session, args)?);
    Ok(())
}

fn run_edit(session: &mut Session, args: EditArgs) -> Result<String> {
    let id = resolve_filter(session, &args.filter)?;
    let name = args.name.map(|name| name.trim().to_string());
    if name.as_deref() == Some("") {
        bail!("filter name cannot be empty");
    }
    let draft = args.fields.into_draft(name)?;
    let filter = session
        .dispatcher()
        .edit_filter(&id, draft)
        .with_context(|| format!("updating filter {id}"))?;
    Ok(format!(
        "Updated {}. Next replacement due {}",
        filter.name,
        format_date(filter.next_due_date)
    ))
}

pub fn replace_filter(config: Arc<AppConfig>, storage: StorageHandle, args: IdArgs) -> Result<()> {
    let mut session = open_session(config, storage)?;
    println!("{}", run_replace(&mut session, &args)?);
    Ok(())
}

fn run_replace(session: &mut Session, args: &IdArgs) -> Result<String> {
    let id = resolve_filter(session, &args.filter)?;
    let next_due = session.dispatcher().mark_replaced(&id)?;
    let name = session.registry().get(&id).map_or(id.as_str(), |f| f.name.as_str());
    Ok(format!(
        "{name} marked as replaced. Next replacement due {}",
        format_date(next_due)
    ))
}

pub fn remove_filter(config: Arc<AppConfig>, storage: StorageHandle, args: IdArgs) -> Result<()> {
    let mut session = open_session(config, storage)?;
    let id = resolve_filter(&session, &args.filter)?;
    let removed = session.dispatcher().remove_filter(&id)?;
    println!("Removed {} (history kept)", removed.name);
    Ok(())
}

pub fn history(config: Arc<AppConfig>, storage: StorageHandle, args: HistoryArgs) -> Result<()> {
    let mut session = open_session(config, storage)?;
    if args.clear {
        if !confirm("Delete every replacement record?", args.yes)? {
            println!("History left untouched.");
            return Ok(());
        }
        let removed = session.dispatcher().clear_history()?;
        println!("Cleared {removed} history entr{}", plural_y(removed));
        return Ok(());
    }
    if args.export {
        let path = session.dispatcher().export_history(args.out)?;
        println!("Exported history to {}", path.display());
        return Ok(());
    }
    print!("{}", render_history(&session, &args)?);
    Ok(())
}

fn render_history(session: &Session, args: &HistoryArgs) -> Result<String> {
    let today = session.today();
    let span = match (&args.between, args.days) {
        (Some(spec), _) => parse_date_span(spec)
            .with_context(|| format!("expected FROM..TO with YYYY-MM-DD dates, got '{spec}'"))?,
        (None, Some(days)) => DateSpan {
            from: today.checked_sub(Duration::days(i64::from(days))),
            to: None,
        },
        (None, None) => DateSpan {
            from: session.config().history.default_range.cutoff(today),
            to: None,
        },
    };
    let registry = session.registry();
    let currency = &session.prefs().currency;
    let mut out = String::new();
    let mut total = 0.0;
    let mut count = 0usize;
    for entry in entries_in_span(registry.history(), span) {
        let _ = write!(
            &mut out,
            "{:<14}{:<28}{}",
            format_date(entry.date),
            registry.lookup_name(entry),
            currency.format(entry.cost)
        );
        if !entry.notes.is_empty() {
            let _ = write!(&mut out, "  {}", entry.notes);
        }
        out.push('\n');
        total += entry.cost;
        count += 1;
    }
    if count == 0 {
        out.push_str("No replacements recorded in this period.\n");
    } else {
        let _ = writeln!(
            &mut out,
            "{count} replacement{}, {} total",
            plural_s(count),
            currency.format(total)
        );
    }
    Ok(out)
}

pub fn stats(config: Arc<AppConfig>, storage: StorageHandle) -> Result<()> {
    let session = open_session(config, storage)?;
    print!("{}", render_stats(&session));
    Ok(())
}

fn render_stats(session: &Session) -> String {
    let today = session.today();
    let registry = session.registry();
    let currency = &session.prefs().currency;
    let counts = stats::status_counts(registry.all(), today);
    let costs = stats::cost_stats(registry.history(), today);
    let impact = stats::impact(registry.history());

    let mut out = String::new();
    let _ = writeln!(
        &mut out,
        "Filters: {} total, {} overdue, {} due soon, {} good",
        counts.total, counts.overdue, counts.due_soon, counts.good
    );
    let _ = writeln!(&mut out, "Total spent: {}", currency.format(costs.total));
    let _ = writeln!(&mut out, "Average replacement: {}", currency.format(costs.average));
    let _ = writeln!(&mut out, "Monthly: {}", currency.format(costs.monthly));
    let _ = writeln!(
        &mut out,
        "Yearly projection: {}",
        currency.format(costs.yearly_projection)
    );
    let _ = writeln!(&mut out, "Bottles saved: {}", impact.bottles_saved);
    let _ = writeln!(&mut out, "CO2 saved: {} lbs", impact.co2_saved_lbs);
    let _ = writeln!(&mut out, "Plastic waste avoided: {} lbs", impact.waste_reduced_lbs);
    out.push('\n');
    for row in stats::performance(registry.all(), registry.history()) {
        let _ = writeln!(
            &mut out,
            "{:<26}{:<14}{:>3}mo {:>3}x  {}/month  [{}]",
            row.name,
            row.filter_type,
            row.replacement_interval,
            row.replacements,
            currency.format(row.cost_per_month),
            row.notifications
        );
    }
    out
}

pub fn export(config: Arc<AppConfig>, storage: StorageHandle, args: ExportArgs) -> Result<()> {
    let mut session = open_session(config, storage)?;
    let path = session.dispatcher().export_all(args.out)?;
    println!("Exported to {}", path.display());
    Ok(())
}

pub fn import(config: Arc<AppConfig>, storage: StorageHandle, args: ImportArgs) -> Result<()> {
    let mut session = open_session(config, storage)?;
    println!("{}", run_import(&mut session, &args)?);
    Ok(())
}

fn run_import(session: &mut Session, args: &ImportArgs) -> Result<String> {
    let document = ImportDocument::read(&args.path)?;
    let summary = document.summary();
    let question = format!("Replace current data with {summary}?");
    if !confirm(&question, args.yes)? {
        return Ok("Import cancelled.".to_string());
    }
    session
        .dispatcher()
        .import(document)
        .with_context(|| format!("importing {}", args.path.display()))?;
    Ok(format!("Imported {summary}"))
}

pub fn reset(config: Arc<AppConfig>, storage: StorageHandle, args: ResetArgs) -> Result<()> {
    let mut session = open_session(config, storage)?;
    if !confirm("Erase ALL filters, history and settings?", args.yes)? {
        println!("Nothing was changed.");
        return Ok(());
    }
    let removed = session.dispatcher().reset_all()?;
    println!("Reset complete ({removed} stored keys removed)");
    Ok(())
}

pub fn currency(config: Arc<AppConfig>, storage: StorageHandle, args: CurrencyArgs) -> Result<()> {
    let mut session = open_session(config, storage)?;
    println!("{}", run_currency(&mut session, args)?);
    Ok(())
}

fn run_currency(session: &mut Session, args: CurrencyArgs) -> Result<String> {
    let Some(code) = args.code else {
        let current = &session.prefs().currency;
        return Ok(format!("Currency: {} ({})", current.code(), current.symbol()));
    };
    if code.trim().is_empty() {
        bail!("currency code cannot be empty");
    }
    let currency = Currency::new(&code);
    session.dispatcher().set_currency(currency.clone())?;
    Ok(format!(
        "Currency set to {} (e.g. {})",
        currency.code(),
        currency.format(1250.0)
    ))
}

pub fn theme(config: Arc<AppConfig>, storage: StorageHandle, args: ThemeArgs) -> Result<()> {
    let mut session = open_session(config, storage)?;
    println!("{}", run_theme(&mut session, args)?);
    Ok(())
}

fn run_theme(session: &mut Session, args: ThemeArgs) -> Result<String> {
    let Some(raw) = args.theme else {
        return Ok(format!("Theme: {}", session.prefs().theme));
    };
    let theme: ThemeName = raw
        .trim()
        .to_lowercase()
        .parse()
        .with_context(|| format!("unknown theme '{raw}', expected light or dark"))?;
    session.dispatcher().set_theme(theme)?;
    Ok(format!("Theme set to {theme}"))
}

pub fn notifications(
    config: Arc<AppConfig>,
    storage: StorageHandle,
    args: NotificationsArgs,
) -> Result<()> {
    let mut session = open_session(config, storage)?;
    println!("{}", run_notifications(&mut session, args)?);
    Ok(())
}

fn run_notifications(session: &mut Session, args: NotificationsArgs) -> Result<String> {
    let Some(state) = args.state else {
        let label = if session.prefs().notifications_enabled {
            "on"
        } else {
            "off"
        };
        return Ok(format!("Reminders are {label}"));
    };
    let outcome = session.dispatcher().set_notifications(state == Switch::On)?;
    Ok(match outcome {
        NotificationsOutcome::Enabled => {
            let armed = session.reminders().scheduler().len();
            format!("Reminders on ({armed} timer{} armed)", plural_s(armed))
        }
        NotificationsOutcome::Disabled => "Reminders off".to_string(),
        NotificationsOutcome::Denied => {
            "Reminders could not be enabled: notification permission was denied".to_string()
        }
    })
}

pub fn reminders(config: Arc<AppConfig>, storage: StorageHandle) -> Result<()> {
    let session = open_session(config, storage)?;
    print!("{}", render_reminders(&session));
    Ok(())
}

fn render_reminders(session: &Session) -> String {
    if !session.prefs().notifications_enabled {
        return "Reminders are off.\n".to_string();
    }
    let registry = session.registry();
    let mut timers: Vec<_> = session.reminders().scheduler().timers().collect();
    timers.sort_by_key(|(_, timer)| timer.fire_at);
    if timers.is_empty() {
        return "No reminders scheduled.\n".to_string();
    }
    let mut out = String::new();
    for (key, timer) in timers {
        let name = registry
            .get(&key.filter_id)
            .map_or(key.filter_id.as_str(), |filter| filter.name.as_str());
        let _ = write!(
            &mut out,
            "{}  {:<26}{:?}/{:?}",
            format_stamp(timer.fire_at),
            name,
            key.channel,
            key.variant
        );
        if let Some(every) = timer.every {
            let _ = write!(&mut out, "  every {} min", every.whole_minutes());
        }
        out.push('\n');
    }
    out
}

pub fn watch(config: Arc<AppConfig>, storage: StorageHandle, args: WatchArgs) -> Result<()> {
    let interval = config.reminders.check_interval();
    let mut session = open_session(config, storage)?;
    if !session.prefs().notifications_enabled {
        bail!("reminders are off; run `aquatracker notifications on` first");
    }
    if session.reminders().request_permission() == Permission::Denied {
        bail!("reminders need a terminal on stdout to be shown");
    }

    if args.once {
        if session.check_reminders_now().is_empty() {
            println!("Nothing due right now.");
        }
        return Ok(());
    }

    println!(
        "Watching {} timer{} (Ctrl-C to stop)",
        session.reminders().scheduler().len(),
        plural_s(session.reminders().scheduler().len())
    );
    tracing::info!(interval_secs = interval.as_secs(), "watching reminders");
    loop {
        if let Err(err) = session.sync_from_store() {
            tracing::error!(?err, "failed to reload the store");
        }
        let fired = session.poll_reminders();
        if !fired.is_empty() {
            tracing::debug!(count = fired.len(), "reminders delivered");
        }
        thread::sleep(interval);
    }
}

/// Resolves an id, or failing that a unique case-insensitive name, to the
/// id of an active filter.
fn resolve_filter(session: &Session, key: &str) -> Result<String> {
    let registry = session.registry();
    if let Some(filter) = registry.get(key.trim()) {
        return Ok(filter.id.clone());
    }
    let wanted = normalize_term(key);
    let mut matches = registry
        .active()
        .filter(|filter| filter.name.to_lowercase() == wanted);
    match (matches.next(), matches.next()) {
        (Some(filter), None) => Ok(filter.id.clone()),
        (Some(_), Some(_)) => bail!("more than one filter is named '{key}'; use its id"),
        (None, _) => bail!("filter '{key}' not found"),
    }
}

fn confirm(question: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    if !atty::is(atty::Stream::Stdin) {
        bail!("refusing to continue without --yes when stdin is not a terminal");
    }
    let answer = prompt(&format!("{question} [y/N]"))?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

fn format_stamp(at: PrimitiveDateTime) -> String {
    format!(
        "{} {:02}:{:02}",
        format_date(at.date()),
        at.hour(),
        at.minute()
    )
}

fn plural_s(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

fn plural_y(count: usize) -> &'static str {
    if count == 1 {
        "y"
    } else {
        "ies"
    }
}
