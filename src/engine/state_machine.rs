//! Status/progress state machine.
//!
//! Given a task and a proposed `(status, progress)` pair, produce the next
//! consistent task state. After every application the record satisfies
//! `done status <=> progress 100 <=> completed_at set`.

use crate::catalog::{StatusCatalog, is_done_status, normalize_status};
use crate::config::CompletionConfig;
use crate::error::{EngineError, EngineResult};
use crate::types::{Actor, AssigneeProgress, Task};
use chrono::{DateTime, Utc};
use tracing::debug;

/// A requested status and/or progress edit. `status` must already be a
/// canonical catalog name.
#[derive(Debug, Clone, Default)]
pub struct StatusProposal {
    pub status: Option<String>,
    pub progress: Option<u8>,
    /// Comment collected by the completion confirmation step.
    pub completion_comment: Option<String>,
}

impl StatusProposal {
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Default::default()
        }
    }

    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Default::default()
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.completion_comment = Some(comment.into());
        self
    }
}

/// Which record a status edit addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusScope {
    /// The coarse task status. With `propagate`, every assignee entry is
    /// overwritten with the new status and completion metadata.
    Task { propagate: bool },
    /// One assignee's own sub-status.
    Assignee(String),
}

impl StatusScope {
    pub fn admin() -> Self {
        StatusScope::Task { propagate: true }
    }
}

/// Inputs the machine needs besides the task itself.
pub struct TransitionContext<'a> {
    pub catalog: &'a StatusCatalog,
    pub completion: &'a CompletionConfig,
    pub actor: &'a Actor,
    pub now: DateTime<Utc>,
}

/// What a transition changed on the coarse record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from_status: String,
    pub to_status: String,
    pub from_progress: u8,
    pub to_progress: u8,
}

impl Transition {
    /// The not-done to done edge. Recurrence fires only here.
    pub fn became_done(&self) -> bool {
        !is_done_status(&self.from_status) && is_done_status(&self.to_status)
    }

    pub fn left_done(&self) -> bool {
        is_done_status(&self.from_status) && !is_done_status(&self.to_status)
    }

    pub fn status_changed(&self) -> bool {
        normalize_status(&self.from_status) != normalize_status(&self.to_status)
    }

    pub fn progress_changed(&self) -> bool {
        self.from_progress != self.to_progress
    }
}

/// Resolve the `(status, progress)` a record ends up with.
fn resolve_target(
    current_status: &str,
    current_progress: u8,
    proposal: &StatusProposal,
    catalog: &StatusCatalog,
) -> (String, u8) {
    let was_done = is_done_status(current_status);
    match (proposal.status.as_deref(), proposal.progress) {
        (_, Some(100)) => (catalog.done_status().to_string(), 100),
        (Some(status), _) if is_done_status(status) => (status.to_string(), 100),
        (Some(status), Some(progress)) => (status.to_string(), progress),
        (Some(status), None) if was_done => (status.to_string(), 0),
        (Some(status), None) => (status.to_string(), current_progress.min(99)),
        (None, Some(progress)) if was_done => {
            let status = if progress == 0 {
                catalog.initial()
            } else {
                catalog.in_progress_status()
            };
            (status.to_string(), progress)
        }
        (None, Some(progress)) => (current_status.to_string(), progress),
        (None, None) => (current_status.to_string(), current_progress),
    }
}

/// Whether reaching `target` requires the confirmation comment: a direct move
/// into done that did not come from progress reaching 100.
fn needs_confirmation(was_done: bool, target_status: &str, proposal: &StatusProposal) -> bool {
    !was_done && is_done_status(target_status) && proposal.progress != Some(100)
}

fn check_comment(ctx: &TransitionContext<'_>, proposal: &StatusProposal) -> EngineResult<()> {
    ctx.completion
        .check_comment(proposal.completion_comment.as_deref())
        .map_err(|message| EngineError::invalid("completion_comment", message))
}

fn clean_comment(proposal: &StatusProposal) -> Option<String> {
    proposal
        .completion_comment
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

/// Write a resolved target onto the coarse record, stamping or clearing
/// completion metadata.
fn write_coarse(
    task: &mut Task,
    status: String,
    progress: u8,
    comment: Option<String>,
    ctx: &TransitionContext<'_>,
) {
    let was_done = task.is_done();
    task.status = status;
    task.progress_percent = progress;
    if task.is_done() {
        if !was_done || task.completed_at.is_none() {
            task.completed_at = Some(ctx.now);
            task.completed_by = Some(ctx.actor.id.clone());
            task.completed_by_type = Some(ctx.actor.kind);
        }
        if comment.is_some() {
            task.completion_comment = comment;
        }
    } else {
        task.completed_at = None;
        task.completed_by = None;
        task.completed_by_type = None;
        task.completion_comment = None;
    }
}

fn write_entry(
    entry: &mut AssigneeProgress,
    status: String,
    progress: u8,
    comment: Option<String>,
    ctx: &TransitionContext<'_>,
) {
    let was_done = entry.is_done();
    entry.status = status;
    entry.progress_percent = progress;
    if entry.is_done() {
        if !was_done || entry.completed_at.is_none() {
            entry.completed_at = Some(ctx.now);
            entry.completed_by = Some(ctx.actor.id.clone());
        }
        if comment.is_some() {
            entry.completion_comment = comment;
        }
    } else {
        entry.completed_at = None;
        entry.completed_by = None;
        entry.completion_comment = None;
    }
}

/// Entry mirroring the coarse record, completion metadata included.
fn mirror_of(task: &Task) -> AssigneeProgress {
    AssigneeProgress {
        status: task.status.clone(),
        progress_percent: task.progress_percent,
        completed_at: task.completed_at,
        completed_by: task.completed_by.clone(),
        completion_comment: task.completion_comment.clone(),
    }
}

/// Give every current assignee an entry mirroring the coarse record.
fn ensure_entries(task: &mut Task) {
    let mirror = mirror_of(task);
    for id in task.effective_assignee_ids() {
        task.assignee_status
            .entry(id)
            .or_insert_with(|| mirror.clone());
    }
}

/// Coarse progress under legacy derivation: 100 when every entry is done,
/// otherwise the mean entry progress held below 100.
fn derived_progress(task: &Task) -> u8 {
    let entries = &task.assignee_status;
    if entries.is_empty() {
        return task.progress_percent;
    }
    if entries.values().all(|e| e.is_done()) {
        return 100;
    }
    let sum: u32 = entries.values().map(|e| e.progress_percent as u32).sum();
    let mean = (sum as f64 / entries.len() as f64).round() as u8;
    mean.min(99)
}

/// Apply a proposal to `task` in place.
///
/// Validation failures leave `task` untouched. The caller is responsible for
/// resolving the proposed status against the catalog beforehand.
pub fn apply(
    task: &mut Task,
    proposal: &StatusProposal,
    scope: &StatusScope,
    ctx: &TransitionContext<'_>,
) -> EngineResult<Transition> {
    if let Some(progress) = proposal.progress
        && progress > 100
    {
        return Err(EngineError::invalid(
            "progress_percent",
            format!("must be between 0 and 100, got {}", progress),
        ));
    }

    let from_status = task.status.clone();
    let from_progress = task.progress_percent;
    let comment = clean_comment(proposal);

    match scope {
        StatusScope::Task { propagate } => {
            let (status, progress) =
                resolve_target(&task.status, task.progress_percent, proposal, ctx.catalog);
            if needs_confirmation(task.is_done(), &status, proposal) {
                check_comment(ctx, proposal)?;
            }
            write_coarse(task, status, progress, comment, ctx);

            // Under legacy derivation the entries decide the coarse status, so
            // a task-level edit must reach them or it would be undone.
            let overwrite = *propagate || ctx.catalog.is_legacy();
            if overwrite && !task.assignee_status.is_empty() {
                let mirror = mirror_of(task);
                for entry in task.assignee_status.values_mut() {
                    *entry = mirror.clone();
                }
            }
        }
        StatusScope::Assignee(assignee_id) => {
            if !task.effective_assignee_ids().contains(assignee_id) {
                return Err(EngineError::invalid(
                    "assignee",
                    format!("{} is not assigned to task {}", assignee_id, task.id),
                ));
            }

            let (entry_status, entry_progress, entry_was_done) = task
                .assignee_status
                .get(assignee_id)
                .map(|e| (e.status.clone(), e.progress_percent, e.is_done()))
                .unwrap_or_else(|| (task.status.clone(), task.progress_percent, task.is_done()));
            let (status, progress) =
                resolve_target(&entry_status, entry_progress, proposal, ctx.catalog);
            if needs_confirmation(entry_was_done, &status, proposal) {
                check_comment(ctx, proposal)?;
            }

            ensure_entries(task);
            if let Some(entry) = task.assignee_status.get_mut(assignee_id) {
                write_entry(entry, status.clone(), progress, comment.clone(), ctx);
            }

            match ctx.catalog.derive_coarse(&task.assignee_status) {
                Some(derived) => {
                    let derived = derived.to_string();
                    let coarse_progress = if is_done_status(&derived) {
                        100
                    } else {
                        derived_progress(task).min(99)
                    };
                    write_coarse(task, derived, coarse_progress, comment, ctx);
                }
                // The coarse status is authoritative under a catalog; an
                // assignee edit only completes it once every entry is done.
                None => {
                    if !task.is_done() && task.assignee_status.values().all(|e| e.is_done()) {
                        let done = ctx.catalog.done_status().to_string();
                        write_coarse(task, done, 100, comment, ctx);
                    }
                }
            }
        }
    }

    task.updated_at = ctx.now;

    let transition = Transition {
        from_status,
        to_status: task.status.clone(),
        from_progress,
        to_progress: task.progress_percent,
    };
    debug!(
        task_id = %task.id,
        from = %transition.from_status,
        to = %transition.to_status,
        progress = transition.to_progress,
        "applied status transition"
    );
    Ok(transition)
}
