use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::prefs::Currency;
use crate::search::HistoryRange;

pub mod themes;

pub use themes::{Palette, ThemeName};

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "AquaTracker";
const APP_NAME: &str = "aquatracker";

pub const CONFIG_ENV: &str = "AQUATRACKER_CONFIG";
pub const DATA_ENV: &str = "AQUATRACKER_DATA";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load(&self.paths)?;
            self.write_default_config(&default_cfg)?;
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load(&self.paths)?;
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub backup_dir: PathBuf,
    pub log_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let override_data = env::var(DATA_ENV).ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let data_root = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        Ok(Self::rooted(config_dir, config_file, data_root, project_dirs.state_dir()))
    }

    /// Lays every path out under explicit roots; used by `discover` and tests.
    pub fn rooted(
        config_dir: PathBuf,
        config_file: PathBuf,
        data_root: PathBuf,
        state_dir: Option<&Path>,
    ) -> Self {
        let state_dir = state_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_root.join("state"));
        Self {
            config_dir,
            config_file,
            database_path: data_root.join("aquatracker.db"),
            backup_dir: data_root.join("backups"),
            log_dir: state_dir.join("logs"),
            data_dir: data_root,
            state_dir,
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.config_dir,
            &self.data_dir,
            &self.backup_dir,
            &self.log_dir,
            &self.state_dir,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Redraw and input-poll interval of the TUI.
    pub tick_rate_ms: u64,
    /// Currency used until one is chosen in settings.
    pub default_currency: Currency,
    pub reminders: ReminderOptions,
    pub storage: StorageOptions,
    pub history: HistoryOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_rate_ms: 250,
            default_currency: Currency::default(),
            reminders: ReminderOptions::default(),
            storage: StorageOptions::default(),
            history: HistoryOptions::default(),
        }
    }
}

impl AppConfig {
    fn post_load(&mut self, paths: &ConfigPaths) -> Result<()> {
        self.storage
            .resolve(paths)
            .context("resolving storage paths")?;
        if self.reminders.check_interval_secs == 0 {
            tracing::warn!("reminders.check_interval_secs is 0, using 30");
            self.reminders.check_interval_secs = 30;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderOptions {
    /// How often due reminders are re-evaluated against the wall clock.
    pub check_interval_secs: u64,
    pub terminal_bell: bool,
}

impl Default for ReminderOptions {
    fn default() -> Self {
        Self {
            check_interval_secs: 30,
            terminal_bell: true,
        }
    }
}

impl ReminderOptions {
    pub fn check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.check_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    #[serde(skip)]
    pub database_path: PathBuf,
    #[serde(skip)]
    pub backup_dir: PathBuf,
    pub wal_autocheckpoint: u32,
    /// Load the sample seven-stage RO system when no filters are stored yet.
    pub seed_demo_data: bool,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            database_path: PathBuf::new(),
            backup_dir: PathBuf::new(),
            wal_autocheckpoint: 1000,
            seed_demo_data: true,
        }
    }
}

impl StorageOptions {
    fn resolve(&mut self, paths: &ConfigPaths) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            self.database_path = paths.database_path.clone();
        }
        if self.backup_dir.as_os_str().is_empty() {
            self.backup_dir = paths.backup_dir.clone();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryOptions {
    pub default_range: HistoryRange,
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self {
            default_range: HistoryRange::All,
        }
    }
}
