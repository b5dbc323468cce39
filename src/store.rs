//! Persistent store boundary.
//!
//! The engine reads and writes tasks, projects, the status catalog and
//! task-dependent records only through [`TaskStore`]. Every call is a single
//! document-level operation; nothing here spans more than one task, so
//! multi-record side effects stay best-effort at the engine layer.

use crate::types::{
    ActivityAction, ActivityEntry, ActorKind, FollowUp, Project, StatusEntry, Task, TaskComment,
};
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};

/// Activity entry before the store assigns its id.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub task_id: String,
    pub action: ActivityAction,
    pub details: String,
    pub actor_id: Option<String>,
    pub actor_kind: Option<ActorKind>,
    pub created_at: DateTime<Utc>,
}

/// Query filter for task listings.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub project_id: Option<String>,
    pub assignee_id: Option<String>,
    /// Include archived tasks (excluded by default).
    pub include_archived: bool,
    /// Only tasks due on or before this date.
    pub due_on_or_before: Option<NaiveDate>,
    pub limit: Option<usize>,
}

impl TaskFilter {
    pub fn project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            ..Default::default()
        }
    }

    pub fn with_archived(mut self) -> Self {
        self.include_archived = true;
        self
    }
}

/// Storage operations required by the engine.
pub trait TaskStore: Send + Sync {
    // Status catalog
    fn status_catalog(&self) -> Result<Vec<StatusEntry>>;
    fn replace_status_catalog(&self, entries: &[StatusEntry]) -> Result<()>;
    /// Rewrite `from` to `to` on every task status and assignee entry.
    /// Returns the number of tasks touched.
    fn rename_task_status(&self, from: &str, to: &str) -> Result<usize>;

    // Tasks
    fn get_task(&self, id: &str) -> Result<Option<Task>>;
    fn insert_task(&self, task: &Task) -> Result<()>;
    /// Whole-record replacement. Returns false if the task does not exist.
    fn update_task(&self, task: &Task) -> Result<bool>;
    /// Returns false if the task did not exist.
    fn delete_task(&self, id: &str) -> Result<bool>;
    fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>>;
    /// Non-archived tasks whose status normalizes to `status`, ignoring
    /// `exclude`.
    fn count_in_status(&self, status: &str, exclude: Option<&str>) -> Result<usize>;
    /// Id of the instance numbered `occurrence` in the series rooted at
    /// `root_id`, if one exists.
    fn find_series_occurrence(&self, root_id: &str, occurrence: u32) -> Result<Option<String>>;

    // Projects
    fn get_project(&self, id: &str) -> Result<Option<Project>>;
    fn upsert_project(&self, project: &Project) -> Result<()>;
    /// Every task in the project, archived included.
    fn project_tasks(&self, project_id: &str) -> Result<Vec<Task>>;
    /// Returns false if the project does not exist.
    fn set_project_progress(&self, project_id: &str, progress: u8) -> Result<bool>;

    // Task-dependent records
    fn append_activity(&self, entry: &NewActivity) -> Result<i64>;
    fn activity_for_task(&self, task_id: &str) -> Result<Vec<ActivityEntry>>;
    fn delete_activity_for_task(&self, task_id: &str) -> Result<usize>;

    fn add_follow_up(&self, task_id: &str, scheduled_for: NaiveDate, note: &str)
    -> Result<FollowUp>;
    fn follow_ups_for_task(&self, task_id: &str) -> Result<Vec<FollowUp>>;
    fn delete_follow_ups_for_task(&self, task_id: &str) -> Result<usize>;

    fn add_comment(
        &self,
        task_id: &str,
        author_id: &str,
        text: &str,
        at: DateTime<Utc>,
    ) -> Result<TaskComment>;
    fn comments_for_task(&self, task_id: &str) -> Result<Vec<TaskComment>>;
    fn delete_comments_for_task(&self, task_id: &str) -> Result<usize>;
}
