//! Project progress aggregation.

use super::{Engine, MutationOutcome};
use crate::catalog::is_done_status;
use crate::config::ProgressMode;
use crate::error::{EngineError, EngineResult, Warning};
use crate::types::{Project, Task};
use tracing::{info, warn};

/// Completion percentage of a project's tasks. Archived tasks are ignored;
/// an empty project is 0%.
pub fn compute_progress(tasks: &[Task], mode: ProgressMode) -> u8 {
    let live = tasks.iter().filter(|t| !t.archived);
    let percent = match mode {
        ProgressMode::Count => {
            let (done, total) = live.fold((0usize, 0usize), |(done, total), t| {
                (done + is_done_status(&t.status) as usize, total + 1)
            });
            if total == 0 {
                return 0;
            }
            100.0 * done as f64 / total as f64
        }
        ProgressMode::Weighted => {
            let (done, total) = live
                .map(|t| (t, t.weightage.unwrap_or(1.0)))
                .filter(|(_, w)| w.is_finite() && *w > 0.0)
                .fold((0.0f64, 0.0f64), |(done, total), (t, w)| {
                    let earned = if is_done_status(&t.status) { w } else { 0.0 };
                    (done + earned, total + w)
                });
            if total <= 0.0 {
                return 0;
            }
            100.0 * done / total
        }
    };
    percent.round().clamp(0.0, 100.0) as u8
}

impl Engine {
    /// Recompute and persist a project's `progress`.
    pub fn recompute_project(&self, project_id: &str) -> EngineResult<u8> {
        let tasks = self.store.project_tasks(project_id)?;
        let progress = compute_progress(&tasks, self.config.progress.mode);
        if !self.store.set_project_progress(project_id, progress)? {
            return Err(EngineError::ProjectNotFound {
                id: project_id.to_string(),
            });
        }
        info!(project_id, progress, "recomputed project progress");
        Ok(progress)
    }

    /// Create or rename a project. Progress is computed from the tasks that
    /// already reference it.
    pub fn register_project(&self, project_id: &str, name: &str) -> EngineResult<Project> {
        let project_id = project_id.trim();
        if project_id.is_empty() {
            return Err(EngineError::invalid("project_id", "must not be empty"));
        }
        let tasks = self.store.project_tasks(project_id)?;
        let project = Project {
            id: project_id.to_string(),
            name: name.trim().to_string(),
            progress: compute_progress(&tasks, self.config.progress.mode),
        };
        self.store.upsert_project(&project)?;
        info!(project_id, progress = project.progress, "registered project");
        Ok(project)
    }

    pub fn get_project(&self, project_id: &str) -> EngineResult<Project> {
        self.store
            .get_project(project_id)?
            .ok_or_else(|| EngineError::ProjectNotFound {
                id: project_id.to_string(),
            })
    }

    /// Best-effort recompute after a mutation. Failures become warnings.
    pub(crate) fn refresh_project<T>(&self, project_id: Option<&str>, outcome: &mut MutationOutcome<T>) {
        let Some(project_id) = project_id else {
            return;
        };
        match self.recompute_project(project_id) {
            Ok(_) => {}
            Err(EngineError::ProjectNotFound { .. }) => {
                tracing::debug!(project_id, "project not tracked by the store; skipping progress");
            }
            Err(e) => {
                let warning = Warning::ProgressRecomputeFailed {
                    project_id: project_id.to_string(),
                    reason: e.to_string(),
                };
                warn!("{}", warning);
                outcome.warnings.push(warning);
            }
        }
    }
}
