//! Integration tests for recurring series: spawn on completion, end
//! conditions, dedupe and projection.

use chrono::{NaiveDate, Weekday};
use opsboard::clock::FixedClock;
use opsboard::config::Config;
use opsboard::db::Database;
use opsboard::engine::Engine;
use opsboard::engine::recurrence::occurrences_between;
use opsboard::error::ErrorCode;
use opsboard::store::TaskFilter;
use opsboard::types::{
    ActivityAction, Actor, Assignee, NewTask, Recurrence, RecurrenceEnd, RecurrencePattern, Task,
};
use std::sync::Arc;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn setup(today: NaiveDate) -> (Engine, Arc<FixedClock>) {
    let db = Database::open_in_memory().expect("Failed to create in-memory database");
    let clock = Arc::new(FixedClock::on(today));
    let engine = Engine::new(Arc::new(db), clock.clone(), Config::default());
    (engine, clock)
}

fn admin() -> Actor {
    Actor::user("admin")
}

fn recurring(engine: &Engine, due: NaiveDate, rule: Recurrence) -> Task {
    let input = NewTask {
        title: "Payroll run".to_string(),
        assignees: vec![Assignee::user("u1"), Assignee::client("c1")],
        due_date: Some(due),
        recurrence: Some(rule),
        ..Default::default()
    };
    engine.create_task(input, &admin()).unwrap().value
}

/// Complete a task and return the id of the instance it produced.
fn complete(engine: &Engine, task_id: &str) -> Option<String> {
    let outcome = engine.change_status(task_id, "Done", None, &admin()).unwrap();
    assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
    outcome.spawned_task_id
}

#[test]
fn weekly_series_ends_after_count() {
    let (engine, _clock) = setup(d(2025, 3, 3));
    let rule = Recurrence::new(RecurrencePattern::Weekly, 1).ending(RecurrenceEnd::After { count: 3 });
    let root = recurring(&engine, d(2025, 3, 3), rule);
    assert_eq!(root.recurring_occurrence_count, 1);

    let second_id = complete(&engine, &root.id).expect("second occurrence");
    let second = engine.get_task(&second_id).unwrap();
    assert_eq!(second.due_date, Some(d(2025, 3, 10)));
    assert_eq!(second.parent_recurring_task_id.as_deref(), Some(root.id.as_str()));
    assert_eq!(second.recurring_occurrence_count, 2);
    assert_eq!(second.status, "To-Do");
    assert_eq!(second.progress_percent, 0);
    assert!(second.completed_at.is_none());
    assert_eq!(second.assignee_ids, vec!["u1", "c1"]);
    assert_eq!(second.assignee_status.len(), 2);
    assert!(second.assignee_status.values().all(|e| e.status == "To-Do"));
    assert_eq!(second.assigned_date, Some(d(2025, 3, 3)));

    let third_id = complete(&engine, &second_id).expect("third occurrence");
    let third = engine.get_task(&third_id).unwrap();
    assert_eq!(third.due_date, Some(d(2025, 3, 17)));
    assert_eq!(third.parent_recurring_task_id.as_deref(), Some(root.id.as_str()));
    assert_eq!(third.recurring_occurrence_count, 3);

    assert!(complete(&engine, &third_id).is_none());
    let all = engine.list_tasks(&TaskFilter::default()).unwrap();
    assert_eq!(all.len(), 3);
}

#[test]
fn recompleting_an_instance_does_not_duplicate_its_successor() {
    let (engine, _clock) = setup(d(2025, 3, 3));
    let rule = Recurrence::new(RecurrencePattern::Weekly, 1);
    let root = recurring(&engine, d(2025, 3, 3), rule);

    let first = complete(&engine, &root.id).unwrap();
    engine.change_status(&root.id, "To-Do", None, &admin()).unwrap();
    let again = complete(&engine, &root.id).unwrap();

    assert_eq!(first, again);
    assert_eq!(engine.list_tasks(&TaskFilter::default()).unwrap().len(), 2);

    let spawned: Vec<_> = engine
        .activity(&first)
        .unwrap()
        .into_iter()
        .filter(|e| e.action == ActivityAction::RecurrenceSpawned)
        .collect();
    assert_eq!(spawned.len(), 1);
}

#[test]
fn monthly_clamps_to_month_end() {
    let (engine, _clock) = setup(d(2025, 1, 31));
    let root = recurring(&engine, d(2025, 1, 31), Recurrence::new(RecurrencePattern::Monthly, 1));
    let next = complete(&engine, &root.id).unwrap();
    assert_eq!(engine.get_task(&next).unwrap().due_date, Some(d(2025, 2, 28)));
}

#[test]
fn weekly_selected_days_pick_next_weekday() {
    let (engine, _clock) = setup(d(2025, 3, 5));
    let rule = Recurrence::new(RecurrencePattern::Weekly, 1)
        .with_week_days([Weekday::Mon, Weekday::Wed, Weekday::Fri]);
    let root = recurring(&engine, d(2025, 3, 5), rule);
    let next = complete(&engine, &root.id).unwrap();
    assert_eq!(engine.get_task(&next).unwrap().due_date, Some(d(2025, 3, 7)));
}

#[test]
fn daily_skip_weekends_rolls_to_monday() {
    let (engine, _clock) = setup(d(2025, 3, 7));
    let rule = Recurrence::new(RecurrencePattern::Daily, 1).skipping_weekends();
    let root = recurring(&engine, d(2025, 3, 7), rule);
    let next = complete(&engine, &root.id).unwrap();
    assert_eq!(engine.get_task(&next).unwrap().due_date, Some(d(2025, 3, 10)));
}

#[test]
fn end_date_stops_series() {
    let (engine, clock) = setup(d(2025, 3, 3));
    let rule = Recurrence::new(RecurrencePattern::Daily, 1).ending(RecurrenceEnd::Date { date: d(2025, 3, 4) });
    let root = recurring(&engine, d(2025, 3, 3), rule);

    let next = complete(&engine, &root.id).unwrap();
    clock.set_date(d(2025, 3, 4));
    assert!(complete(&engine, &next).is_none());
}

#[test]
fn undated_task_recurs_from_completion_date() {
    let (engine, clock) = setup(d(2025, 3, 3));
    let input = NewTask {
        title: "Water plants".to_string(),
        assignees: vec![Assignee::user("u1")],
        recurrence: Some(Recurrence::new(RecurrencePattern::Daily, 2)),
        ..Default::default()
    };
    let root = engine.create_task(input, &admin()).unwrap().value;
    clock.set_date(d(2025, 3, 6));

    let next = complete(&engine, &root.id).unwrap();
    assert_eq!(engine.get_task(&next).unwrap().due_date, Some(d(2025, 3, 8)));
}

#[test]
fn invalid_rules_are_rejected_at_create() {
    let (engine, _clock) = setup(d(2025, 3, 3));
    let input = NewTask {
        title: "Bad".to_string(),
        assignees: vec![Assignee::user("u1")],
        recurrence: Some(Recurrence::new(RecurrencePattern::Daily, 0)),
        ..Default::default()
    };
    let err = engine.create_task(input, &admin()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidRecurrence);
}

#[test]
fn projection_honors_end_condition() {
    let (engine, _clock) = setup(d(2025, 3, 3));
    let rule = Recurrence::new(RecurrencePattern::Weekly, 1).ending(RecurrenceEnd::After { count: 3 });
    let root = recurring(&engine, d(2025, 3, 3), rule);

    let dates = occurrences_between(&root, d(2025, 3, 1), d(2025, 4, 30));
    assert_eq!(dates, vec![d(2025, 3, 3), d(2025, 3, 10), d(2025, 3, 17)]);

    let window = occurrences_between(&root, d(2025, 3, 9), d(2025, 3, 12));
    assert_eq!(window, vec![d(2025, 3, 10)]);
}
