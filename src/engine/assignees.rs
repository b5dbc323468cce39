//! Assignment set handling: flattening, legacy fields and reconciliation of
//! per-assignee entries.

use crate::error::{EngineError, EngineResult};
use crate::types::{Assignee, AssigneeProgress, Task};

/// Deduplicated, non-empty assignment set from the multi-assignee list,
/// falling back to the legacy single assignee.
pub fn normalize(assignees: &[Assignee], legacy: Option<&Assignee>) -> EngineResult<Vec<Assignee>> {
    let mut set: Vec<Assignee> = Vec::new();
    for a in assignees.iter().chain(legacy.filter(|_| assignees.is_empty())) {
        let id = a.id.trim();
        if id.is_empty() || set.iter().any(|s| s.id == id) {
            continue;
        }
        set.push(Assignee {
            id: id.to_string(),
            kind: a.kind,
        });
    }
    if set.is_empty() {
        return Err(EngineError::invalid(
            "assignees",
            "a task needs at least one assignee",
        ));
    }
    Ok(set)
}

/// Store an assignment set on the task: the list itself, the flattened id
/// index and the legacy single-assignee fields (first entry).
pub fn set_assignees(task: &mut Task, assignees: Vec<Assignee>) {
    task.assignee_ids = assignees.iter().map(|a| a.id.clone()).collect();
    task.assignee_id = assignees.first().map(|a| a.id.clone());
    task.assignee_type = assignees.first().map(|a| a.kind);
    task.assignees = assignees;
}

/// Make the keys of `assignee_status` equal the current assignment set.
///
/// Entries for removed assignees are dropped and new assignees start from the
/// coarse status. A task that ends up with a single assignee keeps its
/// entries only if it already had some.
pub fn reconcile(task: &mut Task) {
    let ids = task.effective_assignee_ids();
    task.assignee_status.retain(|id, _| ids.contains(id));

    if task.assignee_status.is_empty() && ids.len() < 2 {
        return;
    }
    let initial = AssigneeProgress {
        status: task.status.clone(),
        progress_percent: task.progress_percent,
        completed_at: task.completed_at,
        completed_by: task.completed_by.clone(),
        completion_comment: task.completion_comment.clone(),
    };
    for id in ids {
        task.assignee_status
            .entry(id)
            .or_insert_with(|| initial.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActorKind;

    #[test]
    fn legacy_assignee_used_when_list_empty() {
        let set = normalize(&[], Some(&Assignee::client("c1"))).unwrap();
        assert_eq!(set, vec![Assignee::client("c1")]);
    }

    #[test]
    fn duplicates_and_blanks_are_dropped() {
        let set = normalize(
            &[Assignee::user("u1"), Assignee::user(" "), Assignee::user("u1"), Assignee::user("u2")],
            Some(&Assignee::client("ignored")),
        )
        .unwrap();
        let ids: Vec<_> = set.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u2"]);
    }

    #[test]
    fn empty_assignment_is_invalid() {
        assert!(normalize(&[], None).is_err());
        assert!(normalize(&[Assignee::user("")], None).is_err());
    }

    #[test]
    fn set_assignees_fills_legacy_fields() {
        let mut task = crate::engine::tests_support::blank_task();
        set_assignees(&mut task, vec![Assignee::client("c9"), Assignee::user("u1")]);
        assert_eq!(task.assignee_id.as_deref(), Some("c9"));
        assert_eq!(task.assignee_type, Some(ActorKind::Client));
        assert_eq!(task.assignee_ids, vec!["c9", "u1"]);
    }

    #[test]
    fn reconcile_drops_removed_and_initializes_added() {
        let mut task = crate::engine::tests_support::blank_task();
        task.status = "In Progress".into();
        task.progress_percent = 30;
        set_assignees(&mut task, vec![Assignee::user("u1"), Assignee::user("u2")]);
        reconcile(&mut task);
        task.assignee_status.get_mut("u1").unwrap().status = "Done".into();

        set_assignees(&mut task, vec![Assignee::user("u1"), Assignee::user("u3")]);
        reconcile(&mut task);

        let keys: Vec<_> = task.assignee_status.keys().cloned().collect();
        assert_eq!(keys, vec!["u1", "u3"]);
        assert_eq!(task.assignee_status["u1"].status, "Done");
        assert_eq!(task.assignee_status["u3"].status, "In Progress");
        assert_eq!(task.assignee_status["u3"].progress_percent, 30);
    }
}
