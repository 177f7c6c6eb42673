use tempfile::TempDir;
use time::macros::time;
use time::{Date, PrimitiveDateTime};

use crate::config::{AppConfig, ConfigPaths, StorageOptions};
use crate::model::{Filter, NotificationSettings};
use crate::storage::{self, StorageHandle};

pub fn temp_paths(root: &TempDir) -> ConfigPaths {
    let base = root.path();
    let config_dir = base.join("config");
    ConfigPaths::rooted(
        config_dir.clone(),
        config_dir.join("config.toml"),
        base.join("data"),
        Some(&base.join("state")),
    )
}

pub fn storage_options(paths: &ConfigPaths) -> StorageOptions {
    StorageOptions {
        database_path: paths.database_path.clone(),
        backup_dir: paths.backup_dir.clone(),
        ..StorageOptions::default()
    }
}

pub fn init_storage() -> anyhow::Result<(TempDir, StorageHandle)> {
    let temp = TempDir::new()?;
    let paths = temp_paths(&temp);
    paths.ensure_directories()?;
    let opts = storage_options(&paths);
    let storage = storage::init(&paths, &opts)?;
    Ok((temp, storage))
}

pub fn at(date: Date, hour: u8, minute: u8) -> PrimitiveDateTime {
    let clock = time::Time::from_hms(hour, minute, 0).unwrap_or(time!(0:00));
    PrimitiveDateTime::new(date, clock)
}

/// A filter with default reminders installed on `install` for `months`.
pub fn filter(id: &str, name: &str, install: Date, months: u32) -> Filter {
    Filter {
        id: id.to_string(),
        name: name.to_string(),
        location: "Kitchen".to_string(),
        stage: String::new(),
        filter_type: "Carbon".to_string(),
        brand: String::new(),
        model: String::new(),
        install_date: install,
        replacement_interval: months,
        next_due_date: crate::due::add_months(install, months),
        cost: 100.0,
        notes: String::new(),
        is_active: true,
        notification_settings: NotificationSettings::default(),
    }
}

/// Storage plus a config whose paths all live under the returned temp dir.
pub fn init_with_config() -> anyhow::Result<(TempDir, AppConfig, StorageHandle)> {
    let temp = TempDir::new()?;
    let paths = temp_paths(&temp);
    paths.ensure_directories()?;
    let config = AppConfig {
        storage: storage_options(&paths),
        ..AppConfig::default()
    };
    let storage = storage::init(&paths, &config.storage)?;
    Ok((temp, config, storage))
}
