/*!
 * SQLite-backed progress store.
 */

use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, params};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;

use super::connection::DatabaseConnection;
use crate::translation::cache::{ProgressStore, WriteOutcome};

/// Progress store keeping every record in one `translations` table
#[derive(Debug, Clone)]
pub struct SqliteProgressStore {
    db: DatabaseConnection,
}

impl SqliteProgressStore {
    /// Open or create the database file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            db: DatabaseConnection::new(path)?,
        })
    }

    /// In-memory store, for tests
    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            db: DatabaseConnection::new_in_memory()?,
        })
    }
}

fn to_sql_index(index: usize) -> Result<i64> {
    i64::try_from(index).context("Record index does not fit in SQLite INTEGER")
}

impl ProgressStore for SqliteProgressStore {
    fn exists(&self, namespace: &str, index: usize) -> Result<bool> {
        let idx = to_sql_index(index)?;
        self.db.execute(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM translations WHERE namespace = ?1 AND idx = ?2",
                params![namespace, idx],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    fn write(&self, namespace: &str, index: usize, record: &Value) -> Result<WriteOutcome> {
        let idx = to_sql_index(index)?;
        let body = serde_json::to_string(record).context("Failed to serialize record")?;

        self.db.execute(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO translations (namespace, idx, record, created_at)
                 VALUES (?1, ?2, ?3, datetime('now'))",
                params![namespace, idx, body],
            )?;

            Ok(if inserted == 0 {
                WriteOutcome::AlreadyPresent
            } else {
                WriteOutcome::Written
            })
        })
    }

    fn read(&self, namespace: &str, index: usize) -> Result<Option<Value>> {
        let idx = to_sql_index(index)?;
        let body: Option<String> = self.db.execute(|conn| {
            Ok(conn
                .query_row(
                    "SELECT record FROM translations WHERE namespace = ?1 AND idx = ?2",
                    params![namespace, idx],
                    |row| row.get(0),
                )
                .optional()?)
        })?;

        body.map(|b| {
            serde_json::from_str(&b)
                .with_context(|| format!("Stored record {}/{} is not valid JSON", namespace, index))
        })
        .transpose()
    }

    fn indices(&self, namespace: &str) -> Result<BTreeSet<usize>> {
        self.db.execute(|conn| {
            let mut statement = conn.prepare("SELECT idx FROM translations WHERE namespace = ?1")?;
            let rows = statement.query_map(params![namespace], |row| row.get::<_, i64>(0))?;

            let mut indices = BTreeSet::new();
            for idx in rows {
                let idx = idx?;
                indices.insert(usize::try_from(idx).context("Negative index in translations table")?);
            }
            Ok(indices)
        })
    }

    fn invalidate(&self, namespace: &str, index: usize) -> Result<bool> {
        let idx = to_sql_index(index)?;
        self.db.execute(|conn| {
            let removed = conn.execute(
                "DELETE FROM translations WHERE namespace = ?1 AND idx = ?2",
                params![namespace, idx],
            )?;
            Ok(removed > 0)
        })
    }
}
