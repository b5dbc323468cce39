//! Bulk archive, unarchive and delete.
//!
//! Each id runs the single-item operation on the blocking pool. Items are
//! independent: there is no ordering between them and no rollback when some
//! fail.

use super::{Engine, MutationOutcome};
use crate::error::{ErrorCode, Warning};
use crate::types::Actor;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use tokio::task::JoinSet;
use tracing::{info, warn};

/// One item that failed.
#[derive(Debug, Clone, Serialize)]
pub struct BulkFailure {
    pub task_id: String,
    pub code: ErrorCode,
    pub message: String,
}

/// Per-item results of a bulk operation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<BulkFailure>,
    pub warnings: Vec<Warning>,
}

impl BulkReport {
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
enum BulkOp {
    Archive,
    Unarchive,
    Delete,
}

impl BulkOp {
    fn as_str(&self) -> &'static str {
        match self {
            BulkOp::Archive => "archive",
            BulkOp::Unarchive => "unarchive",
            BulkOp::Delete => "delete",
        }
    }
}

/// Warnings and the touched project of one successful item.
type ItemResult = (String, Result<(Vec<Warning>, Option<String>), BulkFailure>);

impl Engine {
    pub async fn bulk_archive(&self, task_ids: Vec<String>, actor: &Actor) -> BulkReport {
        self.run_bulk(BulkOp::Archive, task_ids, actor).await
    }

    pub async fn bulk_unarchive(&self, task_ids: Vec<String>, actor: &Actor) -> BulkReport {
        self.run_bulk(BulkOp::Unarchive, task_ids, actor).await
    }

    pub async fn bulk_delete(&self, task_ids: Vec<String>) -> BulkReport {
        self.run_bulk(BulkOp::Delete, task_ids, &Actor::user("system")).await
    }

    async fn run_bulk(&self, op: BulkOp, task_ids: Vec<String>, actor: &Actor) -> BulkReport {
        let mut set: JoinSet<ItemResult> = JoinSet::new();
        let mut seen = HashSet::new();

        for task_id in task_ids {
            if !seen.insert(task_id.clone()) {
                continue;
            }
            let engine = self.clone();
            let actor = actor.clone();
            set.spawn_blocking(move || {
                let result = match op {
                    BulkOp::Archive => engine
                        .archive(&task_id, &actor)
                        .map(|o| (o.warnings, o.value.project_id)),
                    BulkOp::Unarchive => engine
                        .unarchive(&task_id, &actor)
                        .map(|o| (o.warnings, o.value.project_id)),
                    BulkOp::Delete => engine
                        .delete_task(&task_id)
                        .map(|o| (o.warnings, o.value.project_id)),
                };
                let result = result.map_err(|e| BulkFailure {
                    task_id: task_id.clone(),
                    code: e.code(),
                    message: e.to_string(),
                });
                (task_id, result)
            });
        }

        let mut report = BulkReport::default();
        let mut projects = BTreeSet::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((task_id, Ok((warnings, project_id)))) => {
                    report.succeeded.push(task_id);
                    report.warnings.extend(warnings);
                    projects.extend(project_id);
                }
                Ok((_, Err(failure))) => {
                    warn!(op = op.as_str(), task_id = %failure.task_id, "bulk item failed: {}", failure.message);
                    report.failed.push(failure);
                }
                Err(e) => {
                    warn!(op = op.as_str(), "bulk worker did not finish: {}", e);
                    report.failed.push(BulkFailure {
                        task_id: String::new(),
                        code: ErrorCode::StoreError,
                        message: e.to_string(),
                    });
                }
            }
        }

        // Per-item recomputes may interleave; settle each touched project once
        // every item has committed.
        let mut settled = MutationOutcome::new(());
        for project_id in &projects {
            self.refresh_project(Some(project_id.as_str()), &mut settled);
        }
        report.warnings.extend(settled.warnings);

        info!(
            op = op.as_str(),
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "bulk operation finished"
        );
        report
    }
}
