use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn apply(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS backups (
            id INTEGER PRIMARY KEY,
            created_at INTEGER NOT NULL,
            path TEXT NOT NULL,
            kind TEXT NOT NULL DEFAULT 'export'
        );
        "#,
    )
    .context("applying schema migrations")?;
    Ok(())
}
