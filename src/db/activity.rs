//! Records that reference a task by id: activity log, follow-ups, comments.

use super::{Database, date_from_sql, from_ms, to_ms};
use crate::store::NewActivity;
use crate::types::{ActivityAction, ActivityEntry, ActorKind, FollowUp, TaskComment};
use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::params;

impl Database {
    /// Append an activity entry. Entries are never updated.
    pub fn append_activity(&self, entry: &NewActivity) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO task_activity (task_id, action, details, actor_id, actor_kind, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    &entry.task_id,
                    entry.action.as_str(),
                    &entry.details,
                    &entry.actor_id,
                    entry.actor_kind.map(|k| k.as_str()),
                    to_ms(entry.created_at),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Activity for a task, oldest first. Unknown actions are skipped.
    pub fn activity_for_task(&self, task_id: &str) -> Result<Vec<ActivityEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, task_id, action, details, actor_id, actor_kind, created_at
                 FROM task_activity WHERE task_id = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![task_id], |row| {
                let action: String = row.get(2)?;
                let actor_kind: Option<String> = row.get(5)?;
                let created_at: i64 = row.get(6)?;
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    action,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    actor_kind,
                    created_at,
                ))
            })?;

            let mut entries = Vec::new();
            for row in rows {
                let (id, task_id, action, details, actor_id, actor_kind, created_at) = row?;
                let Some(action) = ActivityAction::from_str(&action) else {
                    continue;
                };
                entries.push(ActivityEntry {
                    id,
                    task_id,
                    action,
                    details,
                    actor_id,
                    actor_kind: actor_kind.as_deref().and_then(ActorKind::parse),
                    created_at: from_ms(created_at),
                });
            }
            Ok(entries)
        })
    }

    pub fn delete_activity_for_task(&self, task_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let rows = conn.execute(
                "DELETE FROM task_activity WHERE task_id = ?1",
                params![task_id],
            )?;
            Ok(rows)
        })
    }

    pub fn add_follow_up(
        &self,
        task_id: &str,
        scheduled_for: NaiveDate,
        note: &str,
    ) -> Result<FollowUp> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO task_follow_ups (task_id, scheduled_for, note) VALUES (?1, ?2, ?3)",
                params![task_id, scheduled_for.format("%Y-%m-%d").to_string(), note],
            )?;
            Ok(FollowUp {
                id: conn.last_insert_rowid(),
                task_id: task_id.to_string(),
                scheduled_for,
                note: note.to_string(),
            })
        })
    }

    pub fn follow_ups_for_task(&self, task_id: &str) -> Result<Vec<FollowUp>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, task_id, scheduled_for, note FROM task_follow_ups
                 WHERE task_id = ?1 ORDER BY scheduled_for, id",
            )?;
            let rows = stmt.query_map(params![task_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?;

            let mut follow_ups = Vec::new();
            for row in rows {
                let (id, task_id, scheduled_for, note) = row?;
                let scheduled_for = date_from_sql(Some(scheduled_for.clone()))
                    .ok_or_else(|| anyhow!("follow-up {} has invalid date '{}'", id, scheduled_for))?;
                follow_ups.push(FollowUp {
                    id,
                    task_id,
                    scheduled_for,
                    note,
                });
            }
            Ok(follow_ups)
        })
    }

    pub fn delete_follow_ups_for_task(&self, task_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let rows = conn.execute(
                "DELETE FROM task_follow_ups WHERE task_id = ?1",
                params![task_id],
            )?;
            Ok(rows)
        })
    }

    pub fn add_comment(
        &self,
        task_id: &str,
        author_id: &str,
        text: &str,
        at: DateTime<Utc>,
    ) -> Result<TaskComment> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO task_comments (task_id, author_id, text, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![task_id, author_id, text, to_ms(at)],
            )?;
            Ok(TaskComment {
                id: conn.last_insert_rowid(),
                task_id: task_id.to_string(),
                author_id: author_id.to_string(),
                text: text.to_string(),
                created_at: at,
            })
        })
    }

    pub fn comments_for_task(&self, task_id: &str) -> Result<Vec<TaskComment>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, task_id, author_id, text, created_at FROM task_comments
                 WHERE task_id = ?1 ORDER BY id",
            )?;
            let comments = stmt
                .query_map(params![task_id], |row| {
                    Ok(TaskComment {
                        id: row.get(0)?,
                        task_id: row.get(1)?,
                        author_id: row.get(2)?,
                        text: row.get(3)?,
                        created_at: from_ms(row.get(4)?),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(comments)
        })
    }

    pub fn delete_comments_for_task(&self, task_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let rows = conn.execute(
                "DELETE FROM task_comments WHERE task_id = ?1",
                params![task_id],
            )?;
            Ok(rows)
        })
    }
}
