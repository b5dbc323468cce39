//! Project records. The engine only writes `progress`; the rest is managed
//! by the host.

use super::Database;
use super::tasks::parse_task_row;
use crate::types::{Project, Task};
use anyhow::Result;
use rusqlite::params;

impl Database {
    pub fn get_project(&self, project_id: &str) -> Result<Option<Project>> {
        self.with_conn(|conn| {
            let result = conn.query_row(
                "SELECT id, name, progress FROM projects WHERE id = ?1",
                params![project_id],
                |row| {
                    let progress: i64 = row.get(2)?;
                    Ok(Project {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        progress: progress.clamp(0, 100) as u8,
                    })
                },
            );
            match result {
                Ok(project) => Ok(Some(project)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Create a project or update its name and progress.
    pub fn upsert_project(&self, project: &Project) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO projects (id, name, progress) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, progress = excluded.progress",
                params![&project.id, &project.name, project.progress as i64],
            )?;
            Ok(())
        })
    }

    /// All tasks in a project, archived included.
    pub fn project_tasks(&self, project_id: &str) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT * FROM tasks WHERE project_id = ?1 ORDER BY created_at")?;
            let tasks = stmt
                .query_map(params![project_id], parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks)
        })
    }

    pub fn set_project_progress(&self, project_id: &str, progress: u8) -> Result<bool> {
        self.with_conn(|conn| {
            let rows = conn.execute(
                "UPDATE projects SET progress = ?1 WHERE id = ?2",
                params![progress.min(100) as i64, project_id],
            )?;
            Ok(rows > 0)
        })
    }
}
