//! SQLite implementation of the task store.

pub mod activity;
pub mod catalog;
pub mod projects;
pub mod tasks;

use crate::store::{NewActivity, TaskFilter, TaskStore};
use crate::types::{ActivityEntry, FollowUp, Project, StatusEntry, Task, TaskComment};
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Database handle wrapping a SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for concurrent access
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.run_migrations()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.run_migrations()?;

        Ok(db)
    }

    /// Run database migrations.
    fn run_migrations(&self) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        embedded::migrations::runner().run(&mut *conn)?;
        Ok(())
    }

    /// Execute a function with exclusive access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().unwrap();
        f(&conn)
    }

    /// Execute a function with mutable access to the connection (for transactions).
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock().unwrap();
        f(&mut conn)
    }
}

/// Milliseconds since the epoch, as stored in timestamp columns.
pub fn to_ms(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub fn from_ms(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Dates are stored as `YYYY-MM-DD` text.
pub fn date_to_sql(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

pub fn date_from_sql(text: Option<String>) -> Option<NaiveDate> {
    text.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

impl TaskStore for Database {
    fn status_catalog(&self) -> Result<Vec<StatusEntry>> {
        Database::status_catalog(self)
    }

    fn replace_status_catalog(&self, entries: &[StatusEntry]) -> Result<()> {
        Database::replace_status_catalog(self, entries)
    }

    fn rename_task_status(&self, from: &str, to: &str) -> Result<usize> {
        Database::rename_task_status(self, from, to)
    }

    fn get_task(&self, id: &str) -> Result<Option<Task>> {
        Database::get_task(self, id)
    }

    fn insert_task(&self, task: &Task) -> Result<()> {
        Database::insert_task(self, task)
    }

    fn update_task(&self, task: &Task) -> Result<bool> {
        Database::update_task(self, task)
    }

    fn delete_task(&self, id: &str) -> Result<bool> {
        Database::delete_task(self, id)
    }

    fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        Database::list_tasks(self, filter)
    }

    fn count_in_status(&self, status: &str, exclude: Option<&str>) -> Result<usize> {
        Database::count_in_status(self, status, exclude)
    }

    fn find_series_occurrence(&self, root_id: &str, occurrence: u32) -> Result<Option<String>> {
        Database::find_series_occurrence(self, root_id, occurrence)
    }

    fn get_project(&self, id: &str) -> Result<Option<Project>> {
        Database::get_project(self, id)
    }

    fn upsert_project(&self, project: &Project) -> Result<()> {
        Database::upsert_project(self, project)
    }

    fn project_tasks(&self, project_id: &str) -> Result<Vec<Task>> {
        Database::project_tasks(self, project_id)
    }

    fn set_project_progress(&self, project_id: &str, progress: u8) -> Result<bool> {
        Database::set_project_progress(self, project_id, progress)
    }

    fn append_activity(&self, entry: &NewActivity) -> Result<i64> {
        Database::append_activity(self, entry)
    }

    fn activity_for_task(&self, task_id: &str) -> Result<Vec<ActivityEntry>> {
        Database::activity_for_task(self, task_id)
    }

    fn delete_activity_for_task(&self, task_id: &str) -> Result<usize> {
        Database::delete_activity_for_task(self, task_id)
    }

    fn add_follow_up(
        &self,
        task_id: &str,
        scheduled_for: NaiveDate,
        note: &str,
    ) -> Result<FollowUp> {
        Database::add_follow_up(self, task_id, scheduled_for, note)
    }

    fn follow_ups_for_task(&self, task_id: &str) -> Result<Vec<FollowUp>> {
        Database::follow_ups_for_task(self, task_id)
    }

    fn delete_follow_ups_for_task(&self, task_id: &str) -> Result<usize> {
        Database::delete_follow_ups_for_task(self, task_id)
    }

    fn add_comment(
        &self,
        task_id: &str,
        author_id: &str,
        text: &str,
        at: DateTime<Utc>,
    ) -> Result<TaskComment> {
        Database::add_comment(self, task_id, author_id, text, at)
    }

    fn comments_for_task(&self, task_id: &str) -> Result<Vec<TaskComment>> {
        Database::comments_for_task(self, task_id)
    }

    fn delete_comments_for_task(&self, task_id: &str) -> Result<usize> {
        Database::delete_comments_for_task(self, task_id)
    }
}
