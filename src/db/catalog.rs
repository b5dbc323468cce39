//! Ordered status catalog storage.

use super::Database;
use crate::types::StatusEntry;
use anyhow::Result;
use rusqlite::params;

impl Database {
    /// Catalog entries in board order. Empty when none are configured.
    pub fn status_catalog(&self) -> Result<Vec<StatusEntry>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT name, color FROM status_catalog ORDER BY position")?;
            let entries = stmt
                .query_map([], |row| {
                    Ok(StatusEntry {
                        name: row.get(0)?,
                        color: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
    }

    /// Replace the whole catalog in one transaction.
    pub fn replace_status_catalog(&self, entries: &[StatusEntry]) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM status_catalog", [])?;
            for (position, entry) in entries.iter().enumerate() {
                tx.execute(
                    "INSERT INTO status_catalog (position, name, color) VALUES (?1, ?2, ?3)",
                    params![position as i64, entry.name.trim(), &entry.color],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }
}
