use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use time::OffsetDateTime;

use crate::config::{ConfigPaths, StorageOptions};

mod schema;

/// Keys of the key-value table. Values are JSON text.
pub mod keys {
    pub const FILTERS: &str = "waterFilters";
    pub const HISTORY: &str = "filterHistory";
    pub const CURRENCY: &str = "currency";
    pub const THEME: &str = "theme";
    pub const NOTIFICATIONS_ENABLED: &str = "notifications-enabled";
}

/// Cheap fingerprint of the table contents, compared by `watch` to notice
/// writes made by another process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Revision {
    pub rows: i64,
    pub last_write: i64,
    pub bytes: i64,
}

#[derive(Debug, Clone)]
pub struct BackupRecord {
    pub id: i64,
    pub created_at: i64,
    pub path: PathBuf,
    pub kind: String,
}

#[derive(Clone)]
pub struct StorageHandle {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
}

impl StorageHandle {
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&*self.db_path)
            .with_context(|| format!("opening database {}", self.db_path.display()))?;
        prepare_connection(&conn, &self.options)?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    pub fn get_raw(&self, key: &str) -> Result<Option<String>> {
        self.with_connection(|conn| {
            conn.query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .with_context(|| format!("reading key {key}"))
        })
    }

    pub fn put_raw(&self, key: &str, value: &str) -> Result<()> {
        self.with_connection(|conn| {
            upsert(conn, key, value)?;
            Ok(())
        })
    }

    pub fn put_json<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let encoded =
            serde_json::to_string(value).with_context(|| format!("encoding value for {key}"))?;
        self.put_raw(key, &encoded)
    }

    /// Writes every pair in one transaction; either all land or none do.
    pub fn put_many(&self, entries: &[(&str, String)]) -> Result<()> {
        self.with_connection(|conn| {
            let tx = conn
                .unchecked_transaction()
                .context("starting key-value transaction")?;
            for (key, value) in entries {
                upsert(&tx, key, value)?;
            }
            tx.commit().context("committing key-value transaction")?;
            Ok(())
        })
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        self.with_connection(|conn| {
            let removed = conn
                .execute("DELETE FROM kv WHERE key = ?1", [key])
                .with_context(|| format!("removing key {key}"))?;
            Ok(removed > 0)
        })
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
            let keys = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(keys)
        })
    }

    /// Drops every stored key. Backup bookkeeping is kept.
    pub fn clear_all(&self) -> Result<usize> {
        self.with_connection(|conn| {
            let removed = conn
                .execute("DELETE FROM kv", [])
                .context("clearing key-value store")?;
            tracing::info!(removed, "cleared all stored data");
            Ok(removed)
        })
    }

    pub fn revision(&self) -> Result<Revision> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT COUNT(*), COALESCE(MAX(updated_at), 0), COALESCE(SUM(LENGTH(value)), 0)
                 FROM kv",
                [],
                |row| {
                    Ok(Revision {
                        rows: row.get(0)?,
                        last_write: row.get(1)?,
                        bytes: row.get(2)?,
                    })
                },
            )
            .context("reading store revision")
        })
    }

    pub fn record_backup(&self, path: &Path, kind: &str) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO backups (created_at, path, kind) VALUES (?1, ?2, ?3)",
                params![
                    OffsetDateTime::now_utc().unix_timestamp(),
                    path.to_string_lossy(),
                    kind
                ],
            )
            .context("recording backup")?;
            Ok(())
        })
    }

    pub fn latest_backup(&self) -> Result<Option<BackupRecord>> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT id, created_at, path, kind FROM backups ORDER BY created_at DESC, id DESC LIMIT 1",
                [],
                |row| {
                    Ok(BackupRecord {
                        id: row.get(0)?,
                        created_at: row.get(1)?,
                        path: PathBuf::from(row.get::<_, String>(2)?),
                        kind: row.get(3)?,
                    })
                },
            )
            .optional()
            .context("reading latest backup")
        })
    }
}

fn upsert(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value, now_millis()],
    )
    .with_context(|| format!("writing key {key}"))?;
    Ok(())
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn init(paths: &ConfigPaths, storage: &StorageOptions) -> Result<StorageHandle> {
    let db_path = if storage.database_path.as_os_str().is_empty() {
        &paths.database_path
    } else {
        &storage.database_path
    };
    let existed = db_path.exists();
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    prepare_connection(&conn, storage)?;
    schema::apply(&conn)?;
    if !existed {
        tracing::info!(path = %db_path.display(), "created new data store");
    }
    Ok(StorageHandle {
        db_path: Arc::new(db_path.clone()),
        options: Arc::new(storage.clone()),
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("setting journal_mode=WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("setting synchronous=NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )
    .context("setting wal_autocheckpoint")?;
    Ok(())
}
