use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::App;
use crate::config::{ConfigLoader, CONFIG_ENV, DATA_ENV};
use crate::storage;

pub mod commands;

use self::commands::{
    AddArgs, CurrencyArgs, EditArgs, ExportArgs, HistoryArgs, IdArgs, ImportArgs, ListArgs,
    NotificationsArgs, ResetArgs, ThemeArgs, WatchArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "aquatracker",
    version,
    about = "Water filter replacement tracker for the terminal"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over AQUATRACKER_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over AQUATRACKER_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive TUI (default)
    Tui,
    /// Add a filter
    Add(AddArgs),
    /// List active filters with their due status
    List(ListArgs),
    /// Change fields of an existing filter
    Edit(EditArgs),
    /// Record a replacement today and restart the interval
    Replace(IdArgs),
    /// Remove a filter (its history is kept)
    Remove(IdArgs),
    /// Show, export or clear replacement history
    History(HistoryArgs),
    /// Print cost, impact and per-filter statistics
    Stats,
    /// Write a complete JSON backup
    Export(ExportArgs),
    /// Replace all data from a JSON backup
    Import(ImportArgs),
    /// Erase every filter, history entry and setting
    Reset(ResetArgs),
    /// Show or set the display currency
    Currency(CurrencyArgs),
    /// Show or set the colour theme
    Theme(ThemeArgs),
    /// Turn reminders on or off
    Notifications(NotificationsArgs),
    /// List armed reminder timers
    Reminders,
    /// Stay in the foreground and print reminders as they fire
    Watch(WatchArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    let command = cli.command.unwrap_or(Commands::Tui);
    let log_file = match command {
        Commands::Tui => Some(paths.log_dir.join("aquatracker.log")),
        _ => None,
    };
    init_tracing(&cli.log_level, log_file.as_deref())
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = loader.load_or_init()?;
    let storage = storage::init(&paths, &config.storage)?;

    let config = Arc::new(config);
    match command {
        Commands::Tui => {
            let mut app = App::new(config, storage)?;
            commands::run_tui(&mut app)
        }
        Commands::Add(args) => commands::add_filter(config, storage, args),
        Commands::List(args) => commands::list_filters(config, storage, args),
        Commands::Edit(args) => commands::edit_filter(config, storage, args),
        Commands::Replace(args) => commands::replace_filter(config, storage, args),
        Commands::Remove(args) => commands::remove_filter(config, storage, args),
        Commands::History(args) => commands::history(config, storage, args),
        Commands::Stats => commands::stats(config, storage),
        Commands::Export(args) => commands::export(config, storage, args),
        Commands::Import(args) => commands::import(config, storage, args),
        Commands::Reset(args) => commands::reset(config, storage, args),
        Commands::Currency(args) => commands::currency(config, storage, args),
        Commands::Theme(args) => commands::theme(config, storage, args),
        Commands::Notifications(args) => commands::notifications(config, storage, args),
        Commands::Reminders => commands::reminders(config, storage),
        Commands::Watch(args) => commands::watch(config, storage, args),
    }
}

/// The TUI owns the terminal, so it logs to a file; everything else logs to
/// stderr.
fn init_tracing(level: &str, log_file: Option<&Path>) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        match log_file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("opening log file {}", path.display()))?;
                fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .init();
            }
            None => {
                fmt()
                    .with_env_filter(env_filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
        }
        Ok::<(), anyhow::Error>(())
    })
    .map(|_| ())
}
