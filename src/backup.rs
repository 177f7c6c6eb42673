use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::config::ThemeName;
use crate::model::{Filter, HistoryEntry};
use crate::prefs::{Currency, Preferences};

pub const EXPORT_VERSION: &str = "3.0.0";

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("could not read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("not a valid AquaTracker backup: {0}")]
    Format(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportedSettings<'a> {
    theme: ThemeName,
    notifications_enabled: bool,
    currency: &'a Currency,
}

#[derive(Debug, Serialize)]
struct CompleteExport<'a> {
    filters: &'a [Filter],
    history: &'a [HistoryEntry],
    settings: ExportedSettings<'a>,
    exported: String,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct HistoryExport<'a> {
    history: &'a [HistoryEntry],
    currency: &'a Currency,
    exported: String,
    version: &'static str,
}

/// Fully parsed backup. Every part is optional; absent parts leave the
/// current data untouched when applied.
#[derive(Debug, Default, Deserialize)]
pub struct ImportDocument {
    #[serde(default)]
    pub filters: Option<Vec<Filter>>,
    #[serde(default)]
    pub history: Option<Vec<HistoryEntry>>,
    #[serde(default)]
    pub settings: Option<ImportedSettings>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedSettings {
    #[serde(default)]
    pub theme: Option<String>,
    /// Older exports stored this as the string `"true"`/`"false"` or null.
    #[serde(default)]
    pub notifications_enabled: Option<Value>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl ImportDocument {
    pub fn parse(raw: &str) -> Result<Self, ImportError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn read(path: &Path) -> Result<Self, ImportError> {
        let raw = fs::read_to_string(path).map_err(|source| ImportError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw)
    }

    /// Preferences after applying this document's settings to `current`.
    pub fn merged_preferences(&self, current: &Preferences) -> Preferences {
        let mut next = current.clone();
        let Some(settings) = &self.settings else {
            return next;
        };
        if let Some(theme) = settings
            .theme
            .as_deref()
            .and_then(|raw| raw.parse::<ThemeName>().ok())
        {
            next.theme = theme;
        }
        match &settings.notifications_enabled {
            Some(Value::Bool(enabled)) => next.notifications_enabled = *enabled,
            Some(Value::String(raw)) => next.notifications_enabled = raw == "true",
            _ => {}
        }
        if let Some(code) = settings.currency.as_deref().filter(|c| !c.trim().is_empty()) {
            next.currency = Currency::new(code);
        }
        next
    }

    pub fn summary(&self) -> String {
        let filters = self
            .filters
            .as_ref()
            .map_or("unchanged".to_string(), |f| f.len().to_string());
        let history = self
            .history
            .as_ref()
            .map_or("unchanged".to_string(), |h| h.len().to_string());
        format!("filters: {filters}, history entries: {history}")
    }
}

pub fn complete_export(
    filters: &[Filter],
    history: &[HistoryEntry],
    prefs: &Preferences,
    exported_at: OffsetDateTime,
) -> Result<String> {
    let document = CompleteExport {
        filters,
        history,
        settings: ExportedSettings {
            theme: prefs.theme,
            notifications_enabled: prefs.notifications_enabled,
            currency: &prefs.currency,
        },
        exported: timestamp(exported_at)?,
        version: EXPORT_VERSION,
    };
    serde_json::to_string_pretty(&document).context("encoding backup")
}

pub fn history_export(
    history: &[HistoryEntry],
    currency: &Currency,
    exported_at: OffsetDateTime,
) -> Result<String> {
    let document = HistoryExport {
        history,
        currency,
        exported: timestamp(exported_at)?,
        version: EXPORT_VERSION,
    };
    serde_json::to_string_pretty(&document).context("encoding history export")
}

pub fn complete_backup_name(today: Date) -> String {
    format!("aquatracker-complete-backup-{}.json", iso_day(today))
}

pub fn history_backup_name(today: Date) -> String {
    format!("aquatracker-history-{}.json", iso_day(today))
}

pub fn write_document(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating backup directory {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(path = %path.display(), "backup written");
    Ok(())
}

fn timestamp(at: OffsetDateTime) -> Result<String> {
    at.format(&Rfc3339).context("formatting export timestamp")
}

fn iso_day(date: Date) -> String {
    date.format(&format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}
