//! Cascade deletion.

use super::{Engine, MutationOutcome};
use crate::error::{EngineResult, Warning};
use serde::Serialize;
use tracing::{info, warn};

/// What a delete call removed.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Deletion {
    pub task_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// False when the task was already gone.
    pub existed: bool,
    pub activity_removed: usize,
    pub follow_ups_removed: usize,
    pub comments_removed: usize,
}

impl Engine {
    /// Delete a task and every record that references it.
    ///
    /// Dependent records go first, each class independently; a failure in one
    /// is reported as a warning and never blocks the task record itself.
    /// Deleting an unknown id succeeds with `existed == false`.
    pub fn delete_task(&self, task_id: &str) -> EngineResult<MutationOutcome<Deletion>> {
        let former = self.store.get_task(task_id)?;
        let mut outcome = MutationOutcome::new(Deletion {
            task_id: task_id.to_string(),
            project_id: former.and_then(|t| t.project_id),
            existed: false,
            activity_removed: 0,
            follow_ups_removed: 0,
            comments_removed: 0,
        });

        match self.store.delete_activity_for_task(task_id) {
            Ok(n) => outcome.value.activity_removed = n,
            Err(e) => cleanup_failed(&mut outcome, "activity", e),
        }
        match self.store.delete_follow_ups_for_task(task_id) {
            Ok(n) => outcome.value.follow_ups_removed = n,
            Err(e) => cleanup_failed(&mut outcome, "follow-ups", e),
        }
        match self.store.delete_comments_for_task(task_id) {
            Ok(n) => outcome.value.comments_removed = n,
            Err(e) => cleanup_failed(&mut outcome, "comments", e),
        }

        outcome.value.existed = self.store.delete_task(task_id)?;
        if outcome.value.existed {
            info!(
                task_id,
                activity = outcome.value.activity_removed,
                follow_ups = outcome.value.follow_ups_removed,
                comments = outcome.value.comments_removed,
                "deleted task"
            );
        }

        let project_id = outcome.value.project_id.clone();
        self.refresh_project(project_id.as_deref(), &mut outcome);
        Ok(outcome)
    }
}

fn cleanup_failed(outcome: &mut MutationOutcome<Deletion>, records: &str, error: anyhow::Error) {
    let warning = Warning::CascadeCleanupFailed {
        task_id: outcome.value.task_id.clone(),
        records: records.to_string(),
        reason: error.to_string(),
    };
    warn!("{}", warning);
    outcome.warnings.push(warning);
}
