//! Integration tests for the lifecycle engine.
//!
//! Each test runs the engine against an in-memory SQLite store and a fixed
//! clock.

use chrono::NaiveDate;
use opsboard::board::Board;
use opsboard::clock::FixedClock;
use opsboard::config::Config;
use opsboard::db::Database;
use opsboard::engine::{ColumnLoad, Engine, StatusProposal, StatusScope};
use opsboard::error::{EngineError, ErrorCode};
use opsboard::store::TaskFilter;
use opsboard::types::{
    ActivityAction, Actor, Assignee, NewTask, Priority, Recurrence, RecurrencePattern, StatusEntry,
    Task,
};
use std::sync::Arc;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn setup_with(config: Config) -> Engine {
    let db = Database::open_in_memory().expect("Failed to create in-memory database");
    let clock = Arc::new(FixedClock::on(d(2025, 3, 3)));
    Engine::new(Arc::new(db), clock, config)
}

fn setup() -> Engine {
    setup_with(Config::default())
}

fn admin() -> Actor {
    Actor::user("admin")
}

fn new_task(title: &str, assignees: &[&str]) -> NewTask {
    NewTask {
        title: title.to_string(),
        assignees: assignees.iter().map(|a| Assignee::user(*a)).collect(),
        ..Default::default()
    }
}

fn create(engine: &Engine, title: &str) -> Task {
    engine
        .create_task(new_task(title, &["u1"]), &admin())
        .expect("Failed to create task")
        .value
}

fn assert_coupled(task: &Task) {
    let done = task.is_done();
    assert_eq!(done, task.progress_percent == 100, "{:?}", task);
    assert_eq!(done, task.completed_at.is_some(), "{:?}", task);
}

mod lifecycle_tests {
    use super::*;

    #[test]
    fn create_uses_initial_status_and_logs() {
        let engine = setup();
        let task = create(&engine, "Send invoice");

        assert_eq!(task.status, "To-Do");
        assert_eq!(task.progress_percent, 0);
        assert_eq!(task.assignee_id.as_deref(), Some("u1"));
        assert!(task.assignee_status.is_empty());

        let activity = engine.activity(&task.id).unwrap();
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].action, ActivityAction::Created);
        assert_eq!(activity[0].actor_id.as_deref(), Some("admin"));
    }

    #[test]
    fn create_rejects_blank_title_and_missing_assignees() {
        let engine = setup();
        let err = engine.create_task(new_task("  ", &["u1"]), &admin()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidFieldValue);

        let err = engine.create_task(new_task("Call", &[]), &admin()).unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));
    }

    #[test]
    fn progress_100_completes_task() {
        let engine = setup();
        let task = create(&engine, "File taxes");

        let outcome = engine
            .set_progress(&task.id, 100, StatusScope::admin(), &admin())
            .unwrap();
        assert_eq!(outcome.value.status, "Done");
        assert_eq!(outcome.value.completed_by.as_deref(), Some("admin"));
        assert_coupled(&outcome.value);

        let stored = engine.get_task(&task.id).unwrap();
        assert_eq!(stored, outcome.value);
    }

    #[test]
    fn done_status_forces_full_progress_and_reopen_clears_stamps() {
        let engine = setup();
        let task = create(&engine, "Renew lease");

        let done = engine
            .change_status(&task.id, "done", Some("signed".into()), &admin())
            .unwrap()
            .value;
        assert_eq!(done.status, "Done");
        assert_eq!(done.progress_percent, 100);
        assert_eq!(done.completion_comment.as_deref(), Some("signed"));

        let reopened = engine
            .change_status(&task.id, "In Progress", None, &admin())
            .unwrap()
            .value;
        assert_eq!(reopened.progress_percent, 0);
        assert!(reopened.completed_at.is_none());
        assert!(reopened.completion_comment.is_none());
        assert_coupled(&reopened);
    }

    #[test]
    fn lowering_progress_on_done_task_reopens_it() {
        let engine = setup();
        let task = create(&engine, "Audit");
        engine.set_progress(&task.id, 100, StatusScope::admin(), &admin()).unwrap();

        let reopened = engine
            .set_progress(&task.id, 60, StatusScope::admin(), &admin())
            .unwrap()
            .value;
        assert_eq!(reopened.status, "In Progress");
        assert_eq!(reopened.progress_percent, 60);
        assert_coupled(&reopened);
    }

    #[test]
    fn unknown_status_leaves_task_unchanged() {
        let engine = setup();
        let task = create(&engine, "Ship");
        let err = engine
            .change_status(&task.id, "Parked", None, &admin())
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownStatus { .. }));
        assert_eq!(engine.get_task(&task.id).unwrap(), task);
    }

    #[test]
    fn completion_comment_is_enforced_for_direct_moves_only() {
        let mut config = Config::default();
        config.completion.comment_min_len = 5;
        let engine = setup_with(config);
        let task = create(&engine, "Close books");

        let err = engine.move_task(&task.id, "Done", Some("ok".into()), &admin()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidFieldValue);
        assert!(!engine.get_task(&task.id).unwrap().is_done());

        engine
            .move_task(&task.id, "Done", Some("all reconciled".into()), &admin())
            .unwrap();

        let other = create(&engine, "Pay rent");
        let done = engine
            .set_progress(&other.id, 100, StatusScope::admin(), &admin())
            .unwrap();
        assert!(done.value.is_done());
    }

    #[test]
    fn status_change_is_logged() {
        let engine = setup();
        let task = create(&engine, "Review contract");
        engine.change_status(&task.id, "In Progress", None, &admin()).unwrap();
        engine.change_status(&task.id, "Done", None, &admin()).unwrap();

        let actions: Vec<_> = engine
            .activity(&task.id)
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(
            actions,
            vec![
                ActivityAction::Created,
                ActivityAction::StatusUpdated,
                ActivityAction::Completed
            ]
        );
    }

    #[test]
    fn priority_change_is_logged_once() {
        let engine = setup();
        let task = create(&engine, "Renew lease");

        let outcome = engine.set_priority(&task.id, Priority::High, &admin()).unwrap();
        assert_eq!(outcome.value.priority, Priority::High);
        engine.set_priority(&task.id, Priority::High, &admin()).unwrap();

        let updates = engine
            .activity(&task.id)
            .unwrap()
            .into_iter()
            .filter(|e| e.action == ActivityAction::PriorityUpdated)
            .count();
        assert_eq!(updates, 1);
        assert_eq!(engine.get_task(&task.id).unwrap().priority, Priority::High);
    }
}

mod assignee_tests {
    use super::*;

    #[test]
    fn legacy_coarse_status_follows_assignees() {
        let engine = setup();
        let task = engine
            .create_task(new_task("Onboard client", &["u1", "u2"]), &admin())
            .unwrap()
            .value;
        assert_eq!(task.assignee_status.len(), 2);

        let after_one = engine
            .update_status(
                &task.id,
                StatusProposal::status("Done"),
                StatusScope::Assignee("u1".into()),
                &Actor::user("u1"),
            )
            .unwrap()
            .value;
        assert_eq!(after_one.status, "In Progress");
        assert_eq!(after_one.progress_percent, 50);
        assert!(after_one.assignee_status["u1"].is_done());
        assert_coupled(&after_one);

        let after_both = engine
            .update_status(
                &task.id,
                StatusProposal::status("Done"),
                StatusScope::Assignee("u2".into()),
                &Actor::user("u2"),
            )
            .unwrap()
            .value;
        assert_eq!(after_both.status, "Done");
        assert_eq!(after_both.completed_by.as_deref(), Some("u2"));
        assert_coupled(&after_both);
    }

    #[test]
    fn assignee_scope_requires_assignment() {
        let engine = setup();
        let task = create(&engine, "Translate");
        let err = engine
            .update_status(
                &task.id,
                StatusProposal::progress(10),
                StatusScope::Assignee("stranger".into()),
                &admin(),
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidFieldValue);
    }

    #[test]
    fn reassign_reconciles_entries() {
        let engine = setup();
        let task = engine
            .create_task(new_task("Migrate CRM", &["u1", "u2"]), &admin())
            .unwrap()
            .value;

        let outcome = engine
            .reassign(
                &task.id,
                vec![Assignee::user("u2"), Assignee::client("c1")],
                &admin(),
            )
            .unwrap();
        let keys: Vec<_> = outcome.value.assignee_status.keys().cloned().collect();
        assert_eq!(keys, vec!["c1", "u2"]);
        assert_eq!(outcome.value.assignee_ids, vec!["u2", "c1"]);
        assert_eq!(outcome.value.assignee_id.as_deref(), Some("u2"));

        let listed = engine
            .list_tasks(&TaskFilter {
                assignee_id: Some("c1".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(listed.len(), 1);
    }
}

mod wip_tests {
    use super::*;

    fn limited() -> Engine {
        let mut config = Config::default();
        config.wip.limits.insert("In Progress".to_string(), 1);
        setup_with(config)
    }

    #[test]
    fn full_column_rejects_and_task_is_unchanged() {
        let engine = limited();
        let a = create(&engine, "A");
        let b = create(&engine, "B");
        engine.move_task(&a.id, "In Progress", None, &admin()).unwrap();

        let err = engine.move_task(&b.id, "in progress", None, &admin()).unwrap_err();
        match err {
            EngineError::Capacity { status, limit, count } => {
                assert_eq!(status, "In Progress");
                assert_eq!(limit, 1);
                assert_eq!(count, 1);
            }
            other => panic!("expected capacity error, got {:?}", other),
        }
        assert_eq!(engine.get_task(&b.id).unwrap().status, "To-Do");

        // Re-saving the task already in the column is not a new entry.
        engine
            .set_progress(&a.id, 40, StatusScope::admin(), &admin())
            .unwrap();
    }

    #[test]
    fn archived_tasks_free_capacity_and_unarchive_is_not_gated() {
        let engine = limited();
        let a = create(&engine, "A");
        let b = create(&engine, "B");
        engine.move_task(&a.id, "In Progress", None, &admin()).unwrap();
        engine.archive(&a.id, &admin()).unwrap();

        engine.move_task(&b.id, "In Progress", None, &admin()).unwrap();
        engine.unarchive(&a.id, &admin()).unwrap();

        let tasks = engine.list_tasks(&TaskFilter::default()).unwrap();
        let board = Board::build(&engine.catalog().unwrap(), engine.gate(), &tasks);
        assert_eq!(
            board.column("In Progress").unwrap().load,
            ColumnLoad::OverLimit { count: 2, limit: 1 }
        );
    }

    #[test]
    fn done_is_never_gated() {
        let mut config = Config::default();
        config.wip.limits.insert("Done".to_string(), 1);
        let engine = setup_with(config);
        let a = create(&engine, "A");
        let b = create(&engine, "B");
        engine.move_task(&a.id, "Done", None, &admin()).unwrap();
        engine.move_task(&b.id, "Done", None, &admin()).unwrap();
    }

    #[test]
    fn create_is_gated_on_its_target_status() {
        let mut config = Config::default();
        config.wip.limits.insert("To-Do".to_string(), 1);
        let engine = setup_with(config);
        create(&engine, "A");
        let err = engine.create_task(new_task("B", &["u1"]), &admin()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::WipLimitReached);
    }
}

mod catalog_tests {
    use super::*;

    fn with_catalog() -> Engine {
        let mut config = Config::default();
        config.statuses.catalog = vec![
            StatusEntry::new("Backlog"),
            StatusEntry::new("Doing"),
            StatusEntry::new("Review"),
            StatusEntry::new("Done"),
        ];
        let engine = setup_with(config);
        assert!(engine.seed_catalog_from_config().unwrap());
        engine
    }

    #[test]
    fn seeding_happens_once() {
        let engine = with_catalog();
        assert!(!engine.seed_catalog_from_config().unwrap());
        assert!(!engine.catalog().unwrap().is_legacy());
    }

    #[test]
    fn catalog_initial_and_resolution() {
        let engine = with_catalog();
        let task = create(&engine, "Draft memo");
        assert_eq!(task.status, "Backlog");

        let moved = engine.move_task(&task.id, "REVIEW", None, &admin()).unwrap();
        assert_eq!(moved.value.status, "Review");
    }

    #[test]
    fn add_rejects_normalized_duplicates() {
        let engine = with_catalog();
        let err = engine.add_status(StatusEntry::new("do-ing"), None).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidFieldValue);

        let entries = engine.add_status(StatusEntry::new("Blocked"), Some(1)).unwrap();
        assert_eq!(entries[1].name, "Blocked");
    }

    #[test]
    fn rename_moves_tasks_and_remove_is_refused_while_in_use() {
        let engine = with_catalog();
        let task = create(&engine, "Draft memo");
        engine.move_task(&task.id, "Review", None, &admin()).unwrap();

        engine.rename_status("review", "QA").unwrap();
        assert_eq!(engine.get_task(&task.id).unwrap().status, "QA");

        assert!(engine.remove_status("QA").is_err());
        engine.move_task(&task.id, "Done", None, &admin()).unwrap();
        let entries = engine.remove_status("QA").unwrap();
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn rename_must_keep_done_meaning() {
        let engine = with_catalog();
        let task = create(&engine, "Close books");
        engine.move_task(&task.id, "Done", None, &admin()).unwrap();
        let other = create(&engine, "Audit");
        engine.move_task(&other.id, "Review", None, &admin()).unwrap();

        let err = engine.rename_status("Done", "Shipped").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidFieldValue);
        let err = engine.rename_status("Review", "Completed").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidFieldValue);

        let done = engine.get_task(&task.id).unwrap();
        assert_eq!(done.status, "Done");
        assert_coupled(&done);
        assert_eq!(engine.get_task(&other.id).unwrap().status, "Review");

        engine.rename_status("Done", "Completed").unwrap();
        let renamed = engine.get_task(&task.id).unwrap();
        assert_eq!(renamed.status, "Completed");
        assert_coupled(&renamed);
    }

    #[test]
    fn rename_moves_assignee_entries() {
        let engine = with_catalog();
        let task = engine
            .create_task(new_task("Vendor review", &["u1", "u2"]), &admin())
            .unwrap()
            .value;
        engine
            .update_status(
                &task.id,
                StatusProposal::status("Review"),
                StatusScope::Assignee("u1".into()),
                &Actor::user("u1"),
            )
            .unwrap();

        engine.rename_status("Review", "QA").unwrap();
        let task = engine.get_task(&task.id).unwrap();
        assert_eq!(task.assignee_status["u1"].status, "QA");
        assert_eq!(task.assignee_status["u2"].status, "Backlog");
    }

    #[test]
    fn catalog_without_done_is_rejected() {
        let engine = with_catalog();
        let err = engine.remove_status("Done").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidFieldValue);

        let mut config = Config::default();
        config.statuses.catalog = vec![StatusEntry::new("Open"), StatusEntry::new("Closed")];
        assert!(config.validate().is_err());
        let engine = setup_with(config);
        assert!(engine.seed_catalog_from_config().is_err());
        assert!(engine.catalog().unwrap().is_legacy());
    }

    #[test]
    fn move_status_reorders() {
        let engine = with_catalog();
        let entries = engine.move_status("Done", 0).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Done", "Backlog", "Doing", "Review"]);
    }

    #[test]
    fn catalog_mode_assignee_done_waits_for_every_assignee() {
        let engine = with_catalog();
        let mut input = new_task("Quarterly review", &["u1", "u2"]);
        input.due_date = Some(d(2025, 3, 3));
        input.recurrence = Some(Recurrence::new(RecurrencePattern::Weekly, 1));
        let task = engine.create_task(input, &admin()).unwrap().value;

        let first = engine
            .update_status(
                &task.id,
                StatusProposal::status("Done"),
                StatusScope::Assignee("u1".into()),
                &Actor::user("u1"),
            )
            .unwrap();
        assert_eq!(first.value.status, "Backlog");
        assert_eq!(first.value.progress_percent, 0);
        assert!(first.value.assignee_status["u1"].is_done());
        assert_eq!(first.value.assignee_status["u2"].status, "Backlog");
        assert!(first.spawned_task_id.is_none());
        assert_coupled(&first.value);

        let last = engine
            .update_status(
                &task.id,
                StatusProposal::status("Done"),
                StatusScope::Assignee("u2".into()),
                &Actor::user("u2"),
            )
            .unwrap();
        assert_eq!(last.value.status, "Done");
        assert_coupled(&last.value);
        assert!(last.spawned_task_id.is_some());
    }
}

mod project_tests {
    use super::*;

    fn in_project(engine: &Engine, title: &str, project: &str) -> Task {
        let mut input = new_task(title, &["u1"]);
        input.project_id = Some(project.to_string());
        engine.create_task(input, &admin()).unwrap().value
    }

    #[test]
    fn progress_tracks_completion_and_archival() {
        let engine = setup();
        engine.register_project("p1", "Year end").unwrap();
        let a = in_project(&engine, "A", "p1");
        let b = in_project(&engine, "B", "p1");
        in_project(&engine, "C", "p1");
        assert_eq!(engine.get_project("p1").unwrap().progress, 0);

        engine.change_status(&a.id, "Done", None, &admin()).unwrap();
        assert_eq!(engine.get_project("p1").unwrap().progress, 33);

        engine.archive(&b.id, &admin()).unwrap();
        assert_eq!(engine.get_project("p1").unwrap().progress, 50);
    }

    #[test]
    fn moving_between_projects_recomputes_both() {
        let engine = setup();
        engine.register_project("p1", "One").unwrap();
        engine.register_project("p2", "Two").unwrap();
        let a = in_project(&engine, "A", "p1");
        in_project(&engine, "B", "p1");
        engine.change_status(&a.id, "Done", None, &admin()).unwrap();
        assert_eq!(engine.get_project("p1").unwrap().progress, 50);

        engine.move_to_project(&a.id, Some("p2".into()), &admin()).unwrap();
        assert_eq!(engine.get_project("p1").unwrap().progress, 0);
        assert_eq!(engine.get_project("p2").unwrap().progress, 100);
    }

    #[test]
    fn unknown_project_is_skipped_on_mutation_but_reported_on_recompute() {
        let engine = setup();
        let task = in_project(&engine, "A", "ghost");
        let outcome = engine.change_status(&task.id, "Done", None, &admin()).unwrap();
        assert!(!outcome.has_warnings());

        let err = engine.recompute_project("ghost").unwrap_err();
        assert_eq!(err.code(), ErrorCode::ProjectNotFound);
    }
}

mod deletion_tests {
    use super::*;

    #[test]
    fn delete_cascades_and_is_idempotent() {
        let engine = setup();
        engine.register_project("p1", "Ops").unwrap();
        let mut input = new_task("Old task", &["u1"]);
        input.project_id = Some("p1".into());
        let task = engine.create_task(input, &admin()).unwrap().value;
        let keep = create(&engine, "Keep");

        engine.add_comment(&task.id, "first", &admin()).unwrap();
        engine.add_follow_up(&task.id, d(2025, 3, 10), "call back").unwrap();
        engine.add_comment(&keep.id, "unrelated", &admin()).unwrap();

        let outcome = engine.delete_task(&task.id).unwrap();
        assert!(outcome.value.existed);
        assert_eq!(outcome.value.activity_removed, 1);
        assert_eq!(outcome.value.comments_removed, 1);
        assert_eq!(outcome.value.follow_ups_removed, 1);
        assert!(!outcome.has_warnings());

        assert!(matches!(
            engine.get_task(&task.id),
            Err(EngineError::TaskNotFound { .. })
        ));
        assert!(engine.comments(&task.id).unwrap().is_empty());
        assert!(engine.follow_ups(&task.id).unwrap().is_empty());
        assert_eq!(engine.comments(&keep.id).unwrap().len(), 1);

        let again = engine.delete_task(&task.id).unwrap();
        assert!(!again.value.existed);
    }

    #[test]
    fn comment_on_missing_task_is_not_found() {
        let engine = setup();
        let err = engine.add_comment("nope", "hello", &admin()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::TaskNotFound);
    }
}
