//! Task CRUD and queries.

use super::{Database, date_from_sql, date_to_sql, from_ms, to_ms};
use crate::catalog::normalize_status;
use crate::store::TaskFilter;
use crate::types::{ActorKind, AssigneeProgress, Task};
use anyhow::Result;
use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

/// Decode a JSON column, reporting malformed data as a conversion error.
fn json_column<T: DeserializeOwned>(row: &Row, column: &str, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|e| {
        let index = row.as_ref().column_index(column).unwrap_or_default();
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
    })
}

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let id: String = row.get("id")?;
    let title: String = row.get("title")?;
    let description: String = row.get("description")?;

    let assignee_id: Option<String> = row.get("assignee_id")?;
    let assignee_type: Option<String> = row.get("assignee_type")?;
    let assignees_json: String = row.get("assignees")?;
    let assignee_ids_json: String = row.get("assignee_ids")?;

    let project_id: Option<String> = row.get("project_id")?;
    let status: String = row.get("status")?;
    let assignee_status_json: String = row.get("assignee_status")?;
    let progress_percent: i64 = row.get("progress_percent")?;
    let priority: String = row.get("priority")?;
    let due_date: Option<String> = row.get("due_date")?;
    let assigned_date: Option<String> = row.get("assigned_date")?;

    let completed_at: Option<i64> = row.get("completed_at")?;
    let completed_by: Option<String> = row.get("completed_by")?;
    let completed_by_type: Option<String> = row.get("completed_by_type")?;
    let completion_comment: Option<String> = row.get("completion_comment")?;

    let archived: bool = row.get("archived")?;

    let recurrence_json: Option<String> = row.get("recurrence")?;
    let parent_recurring_task_id: Option<String> = row.get("parent_recurring_task_id")?;
    let recurring_occurrence_count: i64 = row.get("recurring_occurrence_count")?;

    let weightage: Option<f64> = row.get("weightage")?;

    let created_at: i64 = row.get("created_at")?;
    let updated_at: i64 = row.get("updated_at")?;

    Ok(Task {
        id,
        title,
        description,
        assignee_id,
        assignee_type: assignee_type.as_deref().and_then(ActorKind::parse),
        assignees: json_column(row, "assignees", &assignees_json)?,
        assignee_ids: json_column(row, "assignee_ids", &assignee_ids_json)?,
        project_id,
        status,
        assignee_status: json_column(row, "assignee_status", &assignee_status_json)?,
        progress_percent: progress_percent.clamp(0, 100) as u8,
        priority: priority.parse().unwrap_or_default(),
        due_date: date_from_sql(due_date),
        assigned_date: date_from_sql(assigned_date),
        completed_at: completed_at.map(from_ms),
        completed_by,
        completed_by_type: completed_by_type.as_deref().and_then(ActorKind::parse),
        completion_comment,
        archived,
        recurrence: recurrence_json
            .map(|s| json_column(row, "recurrence", &s))
            .transpose()?,
        parent_recurring_task_id,
        recurring_occurrence_count: recurring_occurrence_count.max(0) as u32,
        weightage,
        created_at: from_ms(created_at),
        updated_at: from_ms(updated_at),
    })
}

/// Serialized column values shared by insert and update.
struct TaskColumns {
    assignees: String,
    assignee_ids: String,
    assignee_status: String,
    recurrence: Option<String>,
    due_date: Option<String>,
    assigned_date: Option<String>,
}

impl TaskColumns {
    fn from_task(task: &Task) -> Result<Self> {
        Ok(Self {
            assignees: serde_json::to_string(&task.assignees)?,
            assignee_ids: serde_json::to_string(&task.assignee_ids)?,
            assignee_status: serde_json::to_string(&task.assignee_status)?,
            recurrence: task
                .recurrence
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            due_date: date_to_sql(task.due_date),
            assigned_date: date_to_sql(task.assigned_date),
        })
    }
}

fn get_task_internal(conn: &Connection, task_id: &str) -> Result<Option<Task>> {
    let mut stmt = conn.prepare("SELECT * FROM tasks WHERE id = ?1")?;
    let result = stmt.query_row(params![task_id], parse_task_row);
    match result {
        Ok(task) => Ok(Some(task)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl Database {
    /// Insert a fully formed task record.
    pub fn insert_task(&self, task: &Task) -> Result<()> {
        let cols = TaskColumns::from_task(task)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (
                    id, title, description,
                    assignee_id, assignee_type, assignees, assignee_ids,
                    project_id, status, assignee_status, progress_percent, priority,
                    due_date, assigned_date,
                    completed_at, completed_by, completed_by_type, completion_comment,
                    archived, recurrence, parent_recurring_task_id, recurring_occurrence_count,
                    weightage, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                          ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)",
                params![
                    &task.id,
                    &task.title,
                    &task.description,
                    &task.assignee_id,
                    task.assignee_type.map(|k| k.as_str()),
                    cols.assignees,
                    cols.assignee_ids,
                    &task.project_id,
                    &task.status,
                    cols.assignee_status,
                    task.progress_percent as i64,
                    task.priority.as_str(),
                    cols.due_date,
                    cols.assigned_date,
                    task.completed_at.map(to_ms),
                    &task.completed_by,
                    task.completed_by_type.map(|k| k.as_str()),
                    &task.completion_comment,
                    task.archived,
                    cols.recurrence,
                    &task.parent_recurring_task_id,
                    task.recurring_occurrence_count as i64,
                    task.weightage,
                    to_ms(task.created_at),
                    to_ms(task.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    /// Replace every mutable column of a task.
    pub fn update_task(&self, task: &Task) -> Result<bool> {
        let cols = TaskColumns::from_task(task)?;

        self.with_conn(|conn| {
            let rows = conn.execute(
                "UPDATE tasks SET
                    title = ?2, description = ?3,
                    assignee_id = ?4, assignee_type = ?5, assignees = ?6, assignee_ids = ?7,
                    project_id = ?8, status = ?9, assignee_status = ?10,
                    progress_percent = ?11, priority = ?12,
                    due_date = ?13, assigned_date = ?14,
                    completed_at = ?15, completed_by = ?16, completed_by_type = ?17,
                    completion_comment = ?18,
                    archived = ?19, recurrence = ?20, parent_recurring_task_id = ?21,
                    recurring_occurrence_count = ?22, weightage = ?23, updated_at = ?24
                 WHERE id = ?1",
                params![
                    &task.id,
                    &task.title,
                    &task.description,
                    &task.assignee_id,
                    task.assignee_type.map(|k| k.as_str()),
                    cols.assignees,
                    cols.assignee_ids,
                    &task.project_id,
                    &task.status,
                    cols.assignee_status,
                    task.progress_percent as i64,
                    task.priority.as_str(),
                    cols.due_date,
                    cols.assigned_date,
                    task.completed_at.map(to_ms),
                    &task.completed_by,
                    task.completed_by_type.map(|k| k.as_str()),
                    &task.completion_comment,
                    task.archived,
                    cols.recurrence,
                    &task.parent_recurring_task_id,
                    task.recurring_occurrence_count as i64,
                    task.weightage,
                    to_ms(task.updated_at),
                ],
            )?;
            Ok(rows > 0)
        })
    }

    /// Get a task by ID.
    pub fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, task_id))
    }

    /// Delete a task record. Dependent records are not touched.
    pub fn delete_task(&self, task_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let rows = conn.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
            Ok(rows > 0)
        })
    }

    /// List tasks matching a filter, earliest due first, undated last.
    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let mut sql = String::from("SELECT * FROM tasks t WHERE 1=1");
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
            let mut param_idx = 1;

            if !filter.include_archived {
                sql.push_str(" AND t.archived = 0");
            }

            if let Some(ref project_id) = filter.project_id {
                sql.push_str(&format!(" AND t.project_id = ?{}", param_idx));
                params_vec.push(Box::new(project_id.clone()));
                param_idx += 1;
            }

            if let Some(ref assignee_id) = filter.assignee_id {
                sql.push_str(&format!(
                    " AND (t.assignee_id = ?{0} OR EXISTS (
                        SELECT 1 FROM json_each(t.assignee_ids) WHERE json_each.value = ?{0}))",
                    param_idx
                ));
                params_vec.push(Box::new(assignee_id.clone()));
                param_idx += 1;
            }

            if let Some(due) = filter.due_on_or_before {
                sql.push_str(&format!(
                    " AND t.due_date IS NOT NULL AND t.due_date <= ?{}",
                    param_idx
                ));
                params_vec.push(Box::new(due.format("%Y-%m-%d").to_string()));
            }

            sql.push_str(" ORDER BY t.due_date IS NULL, t.due_date, t.created_at");

            if let Some(limit) = filter.limit {
                sql.push_str(&format!(" LIMIT {}", limit));
            }

            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|b| b.as_ref()).collect();
            let mut stmt = conn.prepare(&sql)?;
            let tasks = stmt
                .query_map(params_refs.as_slice(), parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks)
        })
    }

    /// Count non-archived tasks whose status normalizes to `status`.
    pub fn count_in_status(&self, status: &str, exclude: Option<&str>) -> Result<usize> {
        let wanted = normalize_status(status);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, status FROM tasks WHERE archived = 0")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            let mut count = 0;
            for row in rows {
                let (id, task_status) = row?;
                if exclude == Some(id.as_str()) {
                    continue;
                }
                if normalize_status(&task_status) == wanted {
                    count += 1;
                }
            }
            Ok(count)
        })
    }

    /// Look up the instance with a given occurrence number in a series.
    pub fn find_series_occurrence(&self, root_id: &str, occurrence: u32) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let result = conn.query_row(
                "SELECT id FROM tasks
                 WHERE (id = ?1 AND parent_recurring_task_id IS NULL AND recurring_occurrence_count = ?2)
                    OR (parent_recurring_task_id = ?1 AND recurring_occurrence_count = ?2)
                 LIMIT 1",
                params![root_id, occurrence as i64],
                |row| row.get::<_, String>(0),
            );
            match result {
                Ok(id) => Ok(Some(id)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Move every task and assignee entry in status `from` to `to`, matched
    /// after normalization.
    pub fn rename_task_status(&self, from: &str, to: &str) -> Result<usize> {
        let wanted = normalize_status(from);
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let rows: Vec<(String, String, String)> = {
                let mut stmt = tx.prepare("SELECT id, status, assignee_status FROM tasks")?;
                let rows = stmt.query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })?;
                rows.collect::<rusqlite::Result<_>>()?
            };

            let mut touched = 0;
            for (id, status, entries_json) in rows {
                let mut entries: BTreeMap<String, AssigneeProgress> =
                    serde_json::from_str(&entries_json)?;
                let mut changed = false;
                for entry in entries.values_mut() {
                    if normalize_status(&entry.status) == wanted {
                        entry.status = to.to_string();
                        changed = true;
                    }
                }
                let status = if normalize_status(&status) == wanted {
                    changed = true;
                    to.to_string()
                } else {
                    status
                };
                if changed {
                    tx.execute(
                        "UPDATE tasks SET status = ?1, assignee_status = ?2 WHERE id = ?3",
                        params![status, serde_json::to_string(&entries)?, id],
                    )?;
                    touched += 1;
                }
            }
            tx.commit()?;
            Ok(touched)
        })
    }
}
