//! Core types for the task lifecycle engine.

use crate::catalog::is_done_status;
use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kind of principal that acts on, or is assigned to, a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    #[default]
    User,
    Client,
}

impl ActorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorKind::User => "user",
            ActorKind::Client => "client",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" => Some(ActorKind::User),
            "client" => Some(ActorKind::Client),
            _ => None,
        }
    }
}

impl fmt::Display for ActorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of whoever triggers a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub kind: ActorKind,
}

impl Actor {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ActorKind::User,
        }
    }

    pub fn client(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ActorKind::Client,
        }
    }
}

/// One entry of a task's assignment set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignee {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: ActorKind,
}

impl Assignee {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ActorKind::User,
        }
    }

    pub fn client(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ActorKind::Client,
        }
    }
}

/// Task priority. Sorts `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" | "-1" => Ok(Priority::Low),
            "medium" | "0" => Ok(Priority::Medium),
            "high" | "1" => Ok(Priority::High),
            other => Err(format!("unknown priority '{}'", other)),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-assignee sub-state on a multi-assignee task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssigneeProgress {
    pub status: String,
    #[serde(default)]
    pub progress_percent: u8,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_by: Option<String>,
    #[serde(default)]
    pub completion_comment: Option<String>,
}

impl AssigneeProgress {
    /// Fresh entry mirroring a coarse status.
    pub fn new(status: impl Into<String>) -> Self {
        let status = status.into();
        let progress_percent = if is_done_status(&status) { 100 } else { 0 };
        Self {
            status,
            progress_percent,
            completed_at: None,
            completed_by: None,
            completion_comment: None,
        }
    }

    pub fn is_done(&self) -> bool {
        is_done_status(&self.status)
    }
}

/// Calendar cadence of a recurring task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrencePattern {
    Daily,
    Weekly,
    Monthly,
}

impl RecurrencePattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrencePattern::Daily => "daily",
            RecurrencePattern::Weekly => "weekly",
            RecurrencePattern::Monthly => "monthly",
        }
    }
}

impl FromStr for RecurrencePattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(RecurrencePattern::Daily),
            "weekly" => Ok(RecurrencePattern::Weekly),
            "monthly" => Ok(RecurrencePattern::Monthly),
            other => Err(format!("unsupported recurrence pattern '{}'", other)),
        }
    }
}

/// When a recurring series stops producing instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RecurrenceEnd {
    #[default]
    Never,
    /// Stop once the series holds `count` occurrences.
    After { count: u32 },
    /// Stop once the next occurrence would fall after `date`.
    Date { date: NaiveDate },
}

/// A fully specified recurrence rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    pub pattern: RecurrencePattern,
    #[serde(default = "default_interval")]
    pub interval: u32,
    /// Weekly only. Empty means "same weekday, every `interval` weeks".
    #[serde(default)]
    pub selected_week_days: Vec<Weekday>,
    #[serde(default)]
    pub skip_weekends: bool,
    #[serde(default)]
    pub end: RecurrenceEnd,
}

fn default_interval() -> u32 {
    1
}

impl Recurrence {
    pub fn new(pattern: RecurrencePattern, interval: u32) -> Self {
        Self {
            pattern,
            interval,
            selected_week_days: Vec::new(),
            skip_weekends: false,
            end: RecurrenceEnd::Never,
        }
    }

    pub fn with_week_days(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.selected_week_days = days.into_iter().collect();
        self
    }

    pub fn skipping_weekends(mut self) -> Self {
        self.skip_weekends = true;
        self
    }

    pub fn ending(mut self, end: RecurrenceEnd) -> Self {
        self.end = end;
        self
    }
}

/// The entity under management.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,

    // Legacy single assignee
    pub assignee_id: Option<String>,
    pub assignee_type: Option<ActorKind>,
    // Current multi-assignee set and its flattened index
    pub assignees: Vec<Assignee>,
    pub assignee_ids: Vec<String>,

    pub project_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub assignee_status: BTreeMap<String, AssigneeProgress>,
    pub progress_percent: u8,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub assigned_date: Option<NaiveDate>,

    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<String>,
    pub completed_by_type: Option<ActorKind>,
    pub completion_comment: Option<String>,

    pub archived: bool,

    pub recurrence: Option<Recurrence>,
    pub parent_recurring_task_id: Option<String>,
    pub recurring_occurrence_count: u32,

    pub weightage: Option<f64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    pub fn is_done(&self) -> bool {
        is_done_status(&self.status)
    }

    /// Root of this task's recurring series (itself when it is the root).
    pub fn series_root_id(&self) -> &str {
        self.parent_recurring_task_id.as_deref().unwrap_or(&self.id)
    }

    /// Effective assignment set: the multi-assignee list, falling back to the
    /// legacy single assignee.
    pub fn effective_assignee_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for a in &self.assignees {
            if !a.id.is_empty() && !ids.contains(&a.id) {
                ids.push(a.id.clone());
            }
        }
        if ids.is_empty()
            && let Some(id) = self.assignee_id.as_ref().filter(|id| !id.is_empty())
        {
            ids.push(id.clone());
        }
        ids
    }

    /// Overdue means due strictly before `today`, not done and not archived.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        match self.due_date {
            Some(due) => due < today && !self.is_done() && !self.archived,
            None => false,
        }
    }
}

/// Input for creating a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub assignees: Vec<Assignee>,
    /// Legacy single assignee, used when `assignees` is empty.
    #[serde(default)]
    pub assignee: Option<Assignee>,
    #[serde(default)]
    pub project_id: Option<String>,
    /// Defaults to the catalog's initial status.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub assigned_date: Option<NaiveDate>,
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
    #[serde(default)]
    pub weightage: Option<f64>,
    /// Required when creating directly in the done state and the host
    /// enforces a minimum comment length.
    #[serde(default)]
    pub completion_comment: Option<String>,
}

/// External project entity. The engine only writes `progress`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub progress: u8,
}

/// One entry of the ordered status catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

impl StatusEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: None,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// Kind of an activity-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Created,
    StatusUpdated,
    ProgressUpdated,
    Completed,
    PriorityUpdated,
    AssigneeUpdated,
    ProjectUpdated,
    Archived,
    Unarchived,
    RecurrenceSpawned,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Created => "created",
            ActivityAction::StatusUpdated => "status_updated",
            ActivityAction::ProgressUpdated => "progress_updated",
            ActivityAction::Completed => "completed",
            ActivityAction::PriorityUpdated => "priority_updated",
            ActivityAction::AssigneeUpdated => "assignee_updated",
            ActivityAction::ProjectUpdated => "project_updated",
            ActivityAction::Archived => "archived",
            ActivityAction::Unarchived => "unarchived",
            ActivityAction::RecurrenceSpawned => "recurrence_spawned",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "created" => Some(ActivityAction::Created),
            "status_updated" => Some(ActivityAction::StatusUpdated),
            "progress_updated" => Some(ActivityAction::ProgressUpdated),
            "completed" => Some(ActivityAction::Completed),
            "priority_updated" => Some(ActivityAction::PriorityUpdated),
            "assignee_updated" => Some(ActivityAction::AssigneeUpdated),
            "project_updated" => Some(ActivityAction::ProjectUpdated),
            "archived" => Some(ActivityAction::Archived),
            "unarchived" => Some(ActivityAction::Unarchived),
            "recurrence_spawned" => Some(ActivityAction::RecurrenceSpawned),
            _ => None,
        }
    }
}

/// Append-only audit entry attached to a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: i64,
    pub task_id: String,
    pub action: ActivityAction,
    pub details: String,
    pub actor_id: Option<String>,
    pub actor_kind: Option<ActorKind>,
    pub created_at: DateTime<Utc>,
}

/// A scheduled follow-up linked to a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUp {
    pub id: i64,
    pub task_id: String,
    pub scheduled_for: NaiveDate,
    pub note: String,
}

/// A free-text comment on a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskComment {
    pub id: i64,
    pub task_id: String,
    pub author_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}
