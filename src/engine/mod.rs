//! Task lifecycle engine.
//!
//! [`Engine`] validates and applies every task mutation: status and progress
//! edits, board moves, reassignment, archival and deletion. Secondary effects
//! (recurrence spawn, project progress, dependent-record cleanup, activity
//! log) run after the primary write and report failures as [`Warning`]s
//! instead of errors.

pub mod assignees;
pub mod bulk;
pub mod cascade;
pub mod progress;
pub mod recurrence;
pub mod state_machine;
pub mod wip;

pub use bulk::{BulkFailure, BulkReport};
pub use cascade::Deletion;
pub use state_machine::{StatusProposal, StatusScope, Transition};
pub use wip::{ColumnLoad, WipGate};

use crate::catalog::{StatusCatalog, is_done_status, normalize_status, validate_entries};
use crate::clock::Clock;
use crate::config::Config;
use crate::error::{EngineError, EngineResult, Warning};
use crate::store::{NewActivity, TaskFilter, TaskStore};
use crate::types::{
    ActivityAction, ActivityEntry, Actor, Assignee, FollowUp, NewTask, Priority, StatusEntry, Task,
    TaskComment,
};
use chrono::NaiveDate;
use serde::Serialize;
use state_machine::TransitionContext;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Result of a committed mutation plus any best-effort follow-up failures.
#[derive(Debug, Clone, Serialize)]
pub struct MutationOutcome<T = Task> {
    pub value: T,
    /// Id of the next recurring instance, when this mutation produced or
    /// found one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spawned_task_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

impl<T> MutationOutcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            spawned_task_id: None,
            warnings: Vec::new(),
        }
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Engine handle. Cheap to clone; clones share the store, clock and config.
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    config: Arc<Config>,
    gate: Arc<WipGate>,
}

impl Engine {
    pub fn new(store: Arc<dyn TaskStore>, clock: Arc<dyn Clock>, config: Config) -> Self {
        let gate = WipGate::new(&config.wip.limits);
        Self {
            store,
            clock,
            config: Arc::new(config),
            gate: Arc::new(gate),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn gate(&self) -> &WipGate {
        &self.gate
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn store(&self) -> &dyn TaskStore {
        self.store.as_ref()
    }

    // =========================================================================
    // Status catalog
    // =========================================================================

    /// Current catalog and strategy, read from the store.
    pub fn catalog(&self) -> EngineResult<StatusCatalog> {
        Ok(StatusCatalog::from_entries(self.store.status_catalog()?))
    }

    /// Write the configured seed catalog when the store has none. Returns
    /// whether anything was written.
    pub fn seed_catalog_from_config(&self) -> EngineResult<bool> {
        let seed = &self.config.statuses.catalog;
        if seed.is_empty() || !self.store.status_catalog()?.is_empty() {
            return Ok(false);
        }
        validate_entries(seed).map_err(|e| EngineError::invalid("statuses.catalog", e.to_string()))?;
        self.store.replace_status_catalog(seed)?;
        info!(count = seed.len(), "seeded status catalog");
        Ok(true)
    }

    /// Append a status, optionally at `position` (end by default).
    pub fn add_status(&self, entry: StatusEntry, position: Option<usize>) -> EngineResult<Vec<StatusEntry>> {
        let mut entries = self.store.status_catalog()?;
        let entry = StatusEntry {
            name: entry.name.trim().to_string(),
            color: entry.color,
        };
        let at = position.unwrap_or(entries.len()).min(entries.len());
        entries.insert(at, entry);
        self.write_catalog(entries)
    }

    /// Rename a status. Tasks in the old status move to the new name. The new
    /// name must be done-like exactly when the old one was.
    pub fn rename_status(&self, from: &str, to: &str) -> EngineResult<Vec<StatusEntry>> {
        let mut entries = self.store.status_catalog()?;
        let index = catalog_index(&entries, from)?;
        let old = entries[index].name.clone();
        if is_done_status(&old) != is_done_status(to) {
            return Err(EngineError::invalid(
                "status",
                format!(
                    "cannot rename '{}' to '{}': a rename must keep whether the status means done",
                    old,
                    to.trim()
                ),
            ));
        }
        entries[index].name = to.trim().to_string();
        let entries = self.write_catalog(entries)?;
        let moved = self.store.rename_task_status(&old, to.trim())?;
        info!(from = %old, to = to.trim(), tasks = moved, "renamed status");
        Ok(entries)
    }

    /// Remove a status. Refused while non-archived tasks still use it.
    pub fn remove_status(&self, name: &str) -> EngineResult<Vec<StatusEntry>> {
        let mut entries = self.store.status_catalog()?;
        let index = catalog_index(&entries, name)?;
        let in_use = self.store.count_in_status(&entries[index].name, None)?;
        if in_use > 0 {
            return Err(EngineError::invalid(
                "status",
                format!(
                    "{} task(s) are still in '{}'; move them first",
                    in_use, entries[index].name
                ),
            ));
        }
        entries.remove(index);
        self.write_catalog(entries)
    }

    /// Move a status to a new board position.
    pub fn move_status(&self, name: &str, position: usize) -> EngineResult<Vec<StatusEntry>> {
        let mut entries = self.store.status_catalog()?;
        let index = catalog_index(&entries, name)?;
        let entry = entries.remove(index);
        let at = position.min(entries.len());
        entries.insert(at, entry);
        self.write_catalog(entries)
    }

    fn write_catalog(&self, entries: Vec<StatusEntry>) -> EngineResult<Vec<StatusEntry>> {
        validate_entries(&entries).map_err(|e| EngineError::invalid("status", e.to_string()))?;
        self.store.replace_status_catalog(&entries)?;
        Ok(entries)
    }

    fn resolve_status(&self, catalog: &StatusCatalog, status: &str) -> EngineResult<String> {
        catalog
            .resolve(status)
            .map(str::to_string)
            .ok_or_else(|| EngineError::UnknownStatus {
                status: status.trim().to_string(),
            })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn get_task(&self, task_id: &str) -> EngineResult<Task> {
        self.store
            .get_task(task_id)?
            .ok_or_else(|| EngineError::task_not_found(task_id))
    }

    pub fn list_tasks(&self, filter: &TaskFilter) -> EngineResult<Vec<Task>> {
        Ok(self.store.list_tasks(filter)?)
    }

    pub fn activity(&self, task_id: &str) -> EngineResult<Vec<ActivityEntry>> {
        Ok(self.store.activity_for_task(task_id)?)
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Create a task. The status defaults to the catalog's initial status; a
    /// task created directly in done is stamped as completed by `actor`.
    pub fn create_task(&self, input: NewTask, actor: &Actor) -> EngineResult<MutationOutcome> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(EngineError::invalid("title", "must not be empty"));
        }
        if let Some(w) = input.weightage
            && !w.is_finite()
        {
            return Err(EngineError::invalid("weightage", "must be a finite number"));
        }
        let assignment = assignees::normalize(&input.assignees, input.assignee.as_ref())?;
        if let Some(ref rule) = input.recurrence {
            recurrence::validate_rule(rule)?;
        }

        let catalog = self.catalog()?;
        let status = match input.status.as_deref() {
            Some(status) => self.resolve_status(&catalog, status)?,
            None => catalog.initial().to_string(),
        };

        self.gate.check(&status, self.store.count_in_status(&status, None)?)?;

        let now = self.clock.now();
        let mut task = Task {
            id: Uuid::now_v7().to_string(),
            title,
            description: input.description,
            assignee_id: None,
            assignee_type: None,
            assignees: Vec::new(),
            assignee_ids: Vec::new(),
            project_id: input.project_id.filter(|p| !p.trim().is_empty()),
            status: catalog.initial().to_string(),
            assignee_status: BTreeMap::new(),
            progress_percent: 0,
            priority: input.priority,
            due_date: input.due_date,
            assigned_date: input.assigned_date,
            completed_at: None,
            completed_by: None,
            completed_by_type: None,
            completion_comment: None,
            archived: false,
            recurrence: input.recurrence,
            parent_recurring_task_id: None,
            recurring_occurrence_count: 0,
            weightage: input.weightage,
            created_at: now,
            updated_at: now,
        };
        if task.recurrence.is_some() {
            task.recurring_occurrence_count = 1;
        }
        assignees::set_assignees(&mut task, assignment);

        let proposal = StatusProposal {
            status: Some(status),
            progress: None,
            completion_comment: input.completion_comment,
        };
        let ctx = TransitionContext {
            catalog: &catalog,
            completion: &self.config.completion,
            actor,
            now,
        };
        state_machine::apply(&mut task, &proposal, &StatusScope::admin(), &ctx)?;
        assignees::reconcile(&mut task);

        self.store.insert_task(&task)?;
        info!(task_id = %task.id, status = %task.status, "created task");

        let details = format!("Task created with status {}", task.status);
        let mut outcome = MutationOutcome::new(task);
        self.log(&mut outcome, ActivityAction::Created, details, actor);
        let project_id = outcome.value.project_id.clone();
        self.refresh_project(project_id.as_deref(), &mut outcome);
        Ok(outcome)
    }

    // =========================================================================
    // Status and progress
    // =========================================================================

    /// Apply a status and/or progress edit.
    ///
    /// Unknown statuses and WIP rejections are reported before anything is
    /// written. Completing a recurring task spawns its next instance.
    pub fn update_status(
        &self,
        task_id: &str,
        proposal: StatusProposal,
        scope: StatusScope,
        actor: &Actor,
    ) -> EngineResult<MutationOutcome> {
        let catalog = self.catalog()?;
        let mut proposal = proposal;
        if let Some(status) = proposal.status.take() {
            proposal.status = Some(self.resolve_status(&catalog, &status)?);
        }

        let mut task = self.get_task(task_id)?;
        let ctx = TransitionContext {
            catalog: &catalog,
            completion: &self.config.completion,
            actor,
            now: self.clock.now(),
        };
        let transition = state_machine::apply(&mut task, &proposal, &scope, &ctx)?;

        if transition.status_changed() && !task.archived {
            let count = self.store.count_in_status(&task.status, Some(&task.id))?;
            self.gate.check(&task.status, count)?;
        }

        if !self.store.update_task(&task)? {
            return Err(EngineError::task_not_found(task_id));
        }
        info!(
            task_id,
            from = %transition.from_status,
            to = %transition.to_status,
            progress = transition.to_progress,
            "updated task status"
        );

        let mut outcome = MutationOutcome::new(task);
        self.log_transition(&mut outcome, &transition, actor);

        if transition.became_done() && outcome.value.is_recurring() {
            self.spawn_after_completion(&mut outcome, actor);
        }
        if transition.status_changed() {
            let project_id = outcome.value.project_id.clone();
            self.refresh_project(project_id.as_deref(), &mut outcome);
        }
        Ok(outcome)
    }

    /// Admin status edit, propagated to every assignee entry.
    pub fn change_status(
        &self,
        task_id: &str,
        status: &str,
        completion_comment: Option<String>,
        actor: &Actor,
    ) -> EngineResult<MutationOutcome> {
        let proposal = StatusProposal {
            status: Some(status.to_string()),
            progress: None,
            completion_comment,
        };
        self.update_status(task_id, proposal, StatusScope::admin(), actor)
    }

    /// Progress edit. 100 completes the task; lowering a done task's
    /// progress reopens it.
    pub fn set_progress(
        &self,
        task_id: &str,
        progress: u8,
        scope: StatusScope,
        actor: &Actor,
    ) -> EngineResult<MutationOutcome> {
        self.update_status(task_id, StatusProposal::progress(progress), scope, actor)
    }

    /// Board drag-and-drop into another column.
    pub fn move_task(
        &self,
        task_id: &str,
        to_status: &str,
        completion_comment: Option<String>,
        actor: &Actor,
    ) -> EngineResult<MutationOutcome> {
        self.change_status(task_id, to_status, completion_comment, actor)
    }

    fn spawn_after_completion(&self, outcome: &mut MutationOutcome, actor: &Actor) {
        match self.spawn_next(&outcome.value, actor) {
            Ok(Some(id)) => outcome.spawned_task_id = Some(id),
            Ok(None) => {}
            Err(e) => {
                let warning = Warning::RecurrenceSpawnFailed {
                    task_id: outcome.value.id.clone(),
                    reason: e.to_string(),
                };
                warn!("{}", warning);
                outcome.warnings.push(warning);
            }
        }
    }

    /// Create the next instance of a completed recurring task, if its end
    /// condition allows one.
    ///
    /// At most one instance exists per series position: when the next
    /// position is already taken its id is returned and nothing is created.
    pub fn spawn_next(&self, task: &Task, actor: &Actor) -> EngineResult<Option<String>> {
        let today = self.clock.today();
        if !recurrence::should_spawn_next(task, today) {
            info!(task_id = %task.id, "recurring series reached its end");
            return Ok(None);
        }

        let root = task.series_root_id().to_string();
        let number = recurrence::occurrence_number(task) + 1;
        if let Some(existing) = self.store.find_series_occurrence(&root, number)? {
            info!(task_id = %task.id, existing = %existing, "next occurrence already exists");
            return Ok(Some(existing));
        }

        let catalog = self.catalog()?;
        let mut next = recurrence::build_next_instance(
            task,
            &catalog,
            Uuid::now_v7().to_string(),
            self.clock.now(),
        )?;
        assignees::reconcile(&mut next);

        if let Err(e) = self.store.insert_task(&next) {
            // Lost a race with another completion of the same instance.
            if let Some(existing) = self.store.find_series_occurrence(&root, number)? {
                return Ok(Some(existing));
            }
            return Err(e.into());
        }
        info!(
            task_id = %task.id,
            next_id = %next.id,
            due = ?next.due_date,
            occurrence = next.recurring_occurrence_count,
            "spawned next occurrence"
        );

        let mut spawned = MutationOutcome::new(next);
        self.log(
            &mut spawned,
            ActivityAction::RecurrenceSpawned,
            format!("Occurrence {} spawned from {}", number, task.id),
            actor,
        );
        let project_id = spawned.value.project_id.clone();
        self.refresh_project(project_id.as_deref(), &mut spawned);
        for warning in &spawned.warnings {
            warn!("{}", warning);
        }
        Ok(Some(spawned.value.id))
    }

    // =========================================================================
    // Assignment, project, priority
    // =========================================================================

    /// Replace the assignment set, reconciling per-assignee entries.
    pub fn reassign(
        &self,
        task_id: &str,
        assignees: Vec<Assignee>,
        actor: &Actor,
    ) -> EngineResult<MutationOutcome> {
        let assignment = assignees::normalize(&assignees, None)?;
        let mut task = self.get_task(task_id)?;
        let before = task.assignee_ids.clone();

        assignees::set_assignees(&mut task, assignment);
        assignees::reconcile(&mut task);
        task.updated_at = self.clock.now();

        if !self.store.update_task(&task)? {
            return Err(EngineError::task_not_found(task_id));
        }
        info!(task_id, assignees = ?task.assignee_ids, "reassigned task");

        let details = format!(
            "Assignees changed from [{}] to [{}]",
            before.join(", "),
            task.assignee_ids.join(", ")
        );
        let mut outcome = MutationOutcome::new(task);
        self.log(&mut outcome, ActivityAction::AssigneeUpdated, details, actor);
        Ok(outcome)
    }

    /// Move a task to another project (or none). Both projects are
    /// recomputed.
    pub fn move_to_project(
        &self,
        task_id: &str,
        project_id: Option<String>,
        actor: &Actor,
    ) -> EngineResult<MutationOutcome> {
        let mut task = self.get_task(task_id)?;
        let new_project = project_id.filter(|p| !p.trim().is_empty());
        let old_project = task.project_id.clone();
        if old_project == new_project {
            return Ok(MutationOutcome::new(task));
        }

        task.project_id = new_project.clone();
        task.updated_at = self.clock.now();
        if !self.store.update_task(&task)? {
            return Err(EngineError::task_not_found(task_id));
        }
        info!(task_id, from = ?old_project, to = ?new_project, "moved task to project");

        let mut outcome = MutationOutcome::new(task);
        self.log(
            &mut outcome,
            ActivityAction::ProjectUpdated,
            format!(
                "Project changed from {} to {}",
                old_project.as_deref().unwrap_or("none"),
                new_project.as_deref().unwrap_or("none")
            ),
            actor,
        );
        self.refresh_project(old_project.as_deref(), &mut outcome);
        self.refresh_project(new_project.as_deref(), &mut outcome);
        Ok(outcome)
    }

    pub fn set_priority(
        &self,
        task_id: &str,
        priority: Priority,
        actor: &Actor,
    ) -> EngineResult<MutationOutcome> {
        let mut task = self.get_task(task_id)?;
        let before = task.priority;
        if before == priority {
            return Ok(MutationOutcome::new(task));
        }
        task.priority = priority;
        task.updated_at = self.clock.now();
        if !self.store.update_task(&task)? {
            return Err(EngineError::task_not_found(task_id));
        }

        let mut outcome = MutationOutcome::new(task);
        self.log(
            &mut outcome,
            ActivityAction::PriorityUpdated,
            format!("Priority changed from {} to {}", before, priority),
            actor,
        );
        Ok(outcome)
    }

    // =========================================================================
    // Archival
    // =========================================================================

    /// Soft-remove a task from counts, aggregates and default views.
    pub fn archive(&self, task_id: &str, actor: &Actor) -> EngineResult<MutationOutcome> {
        self.set_archived(task_id, true, actor)
    }

    /// Restore an archived task. Not subject to the WIP gate.
    pub fn unarchive(&self, task_id: &str, actor: &Actor) -> EngineResult<MutationOutcome> {
        self.set_archived(task_id, false, actor)
    }

    fn set_archived(&self, task_id: &str, archived: bool, actor: &Actor) -> EngineResult<MutationOutcome> {
        let mut task = self.get_task(task_id)?;
        if task.archived == archived {
            return Ok(MutationOutcome::new(task));
        }
        task.archived = archived;
        task.updated_at = self.clock.now();
        if !self.store.update_task(&task)? {
            return Err(EngineError::task_not_found(task_id));
        }
        info!(task_id, archived, "changed archival");

        let (action, details) = if archived {
            (ActivityAction::Archived, "Task archived")
        } else {
            (ActivityAction::Unarchived, "Task restored from archive")
        };
        let mut outcome = MutationOutcome::new(task);
        self.log(&mut outcome, action, details.to_string(), actor);
        let project_id = outcome.value.project_id.clone();
        self.refresh_project(project_id.as_deref(), &mut outcome);
        Ok(outcome)
    }

    // =========================================================================
    // Comments and follow-ups
    // =========================================================================

    pub fn add_comment(&self, task_id: &str, text: &str, actor: &Actor) -> EngineResult<TaskComment> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::invalid("text", "comment must not be empty"));
        }
        self.get_task(task_id)?;
        Ok(self
            .store
            .add_comment(task_id, &actor.id, text, self.clock.now())?)
    }

    pub fn comments(&self, task_id: &str) -> EngineResult<Vec<TaskComment>> {
        Ok(self.store.comments_for_task(task_id)?)
    }

    pub fn add_follow_up(
        &self,
        task_id: &str,
        scheduled_for: NaiveDate,
        note: &str,
    ) -> EngineResult<FollowUp> {
        self.get_task(task_id)?;
        Ok(self.store.add_follow_up(task_id, scheduled_for, note.trim())?)
    }

    pub fn follow_ups(&self, task_id: &str) -> EngineResult<Vec<FollowUp>> {
        Ok(self.store.follow_ups_for_task(task_id)?)
    }

    // =========================================================================
    // Activity log
    // =========================================================================

    fn log<T: HasTaskId>(
        &self,
        outcome: &mut MutationOutcome<T>,
        action: ActivityAction,
        details: String,
        actor: &Actor,
    ) {
        let entry = NewActivity {
            task_id: outcome.value.task_id().to_string(),
            action,
            details,
            actor_id: Some(actor.id.clone()),
            actor_kind: Some(actor.kind),
            created_at: self.clock.now(),
        };
        if let Err(e) = self.store.append_activity(&entry) {
            let warning = Warning::ActivityLogFailed {
                task_id: entry.task_id,
                reason: e.to_string(),
            };
            warn!("{}", warning);
            outcome.warnings.push(warning);
        }
    }

    fn log_transition(&self, outcome: &mut MutationOutcome, transition: &Transition, actor: &Actor) {
        if transition.became_done() {
            let details = match outcome.value.completion_comment.clone() {
                Some(comment) => format!("Task completed: {}", comment),
                None => "Task completed".to_string(),
            };
            self.log(outcome, ActivityAction::Completed, details, actor);
        } else if transition.status_changed() {
            self.log(
                outcome,
                ActivityAction::StatusUpdated,
                format!(
                    "Status changed from {} to {}",
                    transition.from_status, transition.to_status
                ),
                actor,
            );
        }
        if transition.progress_changed() && !is_done_status(&transition.to_status) {
            self.log(
                outcome,
                ActivityAction::ProgressUpdated,
                format!(
                    "Progress changed from {}% to {}%",
                    transition.from_progress, transition.to_progress
                ),
                actor,
            );
        }
    }
}

/// Records an activity entry can be attributed to.
trait HasTaskId {
    fn task_id(&self) -> &str;
}

impl HasTaskId for Task {
    fn task_id(&self) -> &str {
        &self.id
    }
}

fn catalog_index(entries: &[StatusEntry], name: &str) -> EngineResult<usize> {
    let wanted = normalize_status(name);
    entries
        .iter()
        .position(|e| normalize_status(&e.name) == wanted)
        .ok_or_else(|| EngineError::UnknownStatus {
            status: name.trim().to_string(),
        })
}
