//! Recurrence generator: end-condition checks, next-occurrence date math and
//! construction of the next instance of a series.
//!
//! Everything in this module is pure. Persisting the new instance, and the
//! at-most-once guard around it, live in [`Engine::spawn_next`].
//!
//! [`Engine::spawn_next`]: super::Engine::spawn_next

use crate::catalog::StatusCatalog;
use crate::error::{EngineError, EngineResult};
use crate::types::{Recurrence, RecurrenceEnd, RecurrencePattern, Task};
use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc, Weekday};
use std::collections::BTreeMap;
use tracing::debug;

/// Upper bound on projected occurrences, whatever the window.
const MAX_PROJECTED: usize = 1000;

/// Check a rule before it is stored on a task.
pub fn validate_rule(rule: &Recurrence) -> EngineResult<()> {
    if rule.interval == 0 {
        return Err(EngineError::InvalidRecurrence(
            "interval must be at least 1".into(),
        ));
    }
    if !rule.selected_week_days.is_empty() && rule.pattern != RecurrencePattern::Weekly {
        return Err(EngineError::InvalidRecurrence(format!(
            "selected week days only apply to weekly rules, not {}",
            rule.pattern.as_str()
        )));
    }
    if let RecurrenceEnd::After { count: 0 } = rule.end {
        return Err(EngineError::InvalidRecurrence(
            "end-after count must be at least 1".into(),
        ));
    }
    Ok(())
}

/// Position of a task within its series. The root is occurrence 1.
pub fn occurrence_number(task: &Task) -> u32 {
    task.recurring_occurrence_count.max(1)
}

/// Date the next occurrence is computed from: the due date, else the
/// completion date, else `today`.
pub fn reference_date(task: &Task, today: NaiveDate) -> NaiveDate {
    task.due_date
        .or_else(|| task.completed_at.map(|at| at.date_naive()))
        .unwrap_or(today)
}

/// Next occurrence after `reference` under `rule`.
pub fn next_occurrence(rule: &Recurrence, reference: NaiveDate) -> EngineResult<NaiveDate> {
    validate_rule(rule)?;
    let interval = rule.interval;

    let next = match rule.pattern {
        RecurrencePattern::Daily => add_days(reference, interval as u64)?,
        RecurrencePattern::Weekly if rule.selected_week_days.is_empty() => {
            add_days(reference, 7 * interval as u64)?
        }
        RecurrencePattern::Weekly => {
            return next_selected_weekday(reference, &rule.selected_week_days, interval);
        }
        RecurrencePattern::Monthly => reference
            .checked_add_months(Months::new(interval))
            .ok_or_else(out_of_range)?,
    };

    let next = if rule.skip_weekends {
        roll_past_weekend(next)?
    } else {
        next
    };
    debug!(pattern = rule.pattern.as_str(), %reference, %next, "computed next occurrence");
    Ok(next)
}

/// Next date after `reference` on one of `days`. Weeks start on Monday; once
/// the selected days of the current week are used up, jump `interval` weeks
/// ahead and take the earliest selected day of that week.
fn next_selected_weekday(
    reference: NaiveDate,
    days: &[Weekday],
    interval: u32,
) -> EngineResult<NaiveDate> {
    let mut offsets: Vec<u32> = days.iter().map(|d| d.num_days_from_monday()).collect();
    offsets.sort_unstable();
    offsets.dedup();

    let current = reference.weekday().num_days_from_monday();
    if let Some(&later) = offsets.iter().find(|&&d| d > current) {
        return add_days(reference, (later - current) as u64);
    }

    let week_start = reference
        .checked_sub_days(Days::new(current as u64))
        .ok_or_else(out_of_range)?;
    let first = offsets.first().copied().unwrap_or(current);
    add_days(week_start, 7 * interval as u64 + first as u64)
}

fn roll_past_weekend(date: NaiveDate) -> EngineResult<NaiveDate> {
    match date.weekday() {
        Weekday::Sat => add_days(date, 2),
        Weekday::Sun => add_days(date, 1),
        _ => Ok(date),
    }
}

fn add_days(date: NaiveDate, days: u64) -> EngineResult<NaiveDate> {
    date.checked_add_days(Days::new(days))
        .ok_or_else(out_of_range)
}

fn out_of_range() -> EngineError {
    EngineError::InvalidRecurrence("next occurrence is outside the supported date range".into())
}

/// Whether completing `task` should produce another instance.
///
/// `After { count }` compares the task's occurrence number with `<`, so a
/// series ending after 3 stops once the third instance completes.
pub fn should_spawn_next(task: &Task, today: NaiveDate) -> bool {
    let Some(rule) = task.recurrence.as_ref() else {
        return false;
    };
    match rule.end {
        RecurrenceEnd::Never => true,
        RecurrenceEnd::After { count } => occurrence_number(task) < count,
        RecurrenceEnd::Date { date } => next_occurrence(rule, reference_date(task, today))
            .map(|next| next <= date)
            .unwrap_or(false),
    }
}

/// Build the next instance of `task`'s series. The caller persists it.
pub fn build_next_instance(
    task: &Task,
    catalog: &StatusCatalog,
    new_id: String,
    now: DateTime<Utc>,
) -> EngineResult<Task> {
    let rule = task
        .recurrence
        .as_ref()
        .ok_or_else(|| EngineError::InvalidRecurrence(format!("task {} is not recurring", task.id)))?;

    let reference = reference_date(task, now.date_naive());
    let next_due = next_occurrence(rule, reference)?;
    let shift = (next_due - reference).num_days();
    let assigned_date = match task.assigned_date {
        Some(assigned) => Some(
            assigned
                .checked_add_signed(chrono::Duration::days(shift))
                .ok_or_else(out_of_range)?,
        ),
        None => task.due_date,
    };

    Ok(Task {
        id: new_id,
        title: task.title.clone(),
        description: task.description.clone(),
        assignee_id: task.assignee_id.clone(),
        assignee_type: task.assignee_type,
        assignees: task.assignees.clone(),
        assignee_ids: task.assignee_ids.clone(),
        project_id: task.project_id.clone(),
        status: catalog.initial().to_string(),
        assignee_status: BTreeMap::new(),
        progress_percent: 0,
        priority: task.priority,
        due_date: Some(next_due),
        assigned_date,
        completed_at: None,
        completed_by: None,
        completed_by_type: None,
        completion_comment: None,
        archived: false,
        recurrence: Some(rule.clone()),
        parent_recurring_task_id: Some(task.series_root_id().to_string()),
        recurring_occurrence_count: occurrence_number(task) + 1,
        weightage: task.weightage,
        created_at: now,
        updated_at: now,
    })
}

/// Due dates of the series from `task`'s due date onward that fall within
/// `[from, to]`, honoring the end condition. Tasks without a rule or a due
/// date project nothing.
pub fn occurrences_between(task: &Task, from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    let (Some(rule), Some(mut date)) = (task.recurrence.as_ref(), task.due_date) else {
        return Vec::new();
    };
    let mut number = occurrence_number(task);
    let mut dates = Vec::new();

    while date <= to && dates.len() < MAX_PROJECTED {
        if date >= from {
            dates.push(date);
        }
        if let RecurrenceEnd::After { count } = rule.end
            && number >= count
        {
            break;
        }
        let Ok(next) = next_occurrence(rule, date) else {
            break;
        };
        if let RecurrenceEnd::Date { date: end } = rule.end
            && next > end
        {
            break;
        }
        date = next;
        number += 1;
    }
    dates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Priority;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn recurring(rule: Recurrence, due: NaiveDate) -> Task {
        let now = d(2025, 1, 1).and_hms_opt(0, 0, 0).unwrap().and_utc();
        Task {
            id: "root".into(),
            title: "Standup notes".into(),
            description: String::new(),
            assignee_id: Some("u1".into()),
            assignee_type: None,
            assignees: vec![],
            assignee_ids: vec!["u1".into()],
            project_id: Some("p1".into()),
            status: "Done".into(),
            assignee_status: BTreeMap::new(),
            progress_percent: 100,
            priority: Priority::High,
            due_date: Some(due),
            assigned_date: None,
            completed_at: Some(now),
            completed_by: Some("u1".into()),
            completed_by_type: None,
            completion_comment: None,
            archived: false,
            recurrence: Some(rule),
            parent_recurring_task_id: None,
            recurring_occurrence_count: 1,
            weightage: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn monthly_clamps_to_month_end() {
        let rule = Recurrence::new(RecurrencePattern::Monthly, 1);
        assert_eq!(next_occurrence(&rule, d(2024, 1, 31)).unwrap(), d(2024, 2, 29));
        assert_eq!(next_occurrence(&rule, d(2023, 1, 31)).unwrap(), d(2023, 2, 28));
    }

    #[test]
    fn daily_skips_weekends() {
        let rule = Recurrence::new(RecurrencePattern::Daily, 1).skipping_weekends();
        // Friday -> Saturday -> rolled to Monday
        assert_eq!(next_occurrence(&rule, d(2025, 3, 7)).unwrap(), d(2025, 3, 10));
        // Tuesday -> Wednesday
        assert_eq!(next_occurrence(&rule, d(2025, 3, 4)).unwrap(), d(2025, 3, 5));
    }

    #[test]
    fn weekly_without_days_adds_whole_weeks() {
        let rule = Recurrence::new(RecurrencePattern::Weekly, 2);
        assert_eq!(next_occurrence(&rule, d(2025, 3, 3)).unwrap(), d(2025, 3, 17));
    }

    #[test]
    fn weekly_selected_days_advance_within_then_across_blocks() {
        let rule = Recurrence::new(RecurrencePattern::Weekly, 1)
            .with_week_days([Weekday::Mon, Weekday::Fri]);
        // Wednesday 2025-03-05 -> Friday 2025-03-07
        assert_eq!(next_occurrence(&rule, d(2025, 3, 5)).unwrap(), d(2025, 3, 7));
        // Friday 2025-03-07 -> Monday 2025-03-10
        assert_eq!(next_occurrence(&rule, d(2025, 3, 7)).unwrap(), d(2025, 3, 10));

        let fortnightly = Recurrence::new(RecurrencePattern::Weekly, 2)
            .with_week_days([Weekday::Mon, Weekday::Fri]);
        assert_eq!(
            next_occurrence(&fortnightly, d(2025, 3, 7)).unwrap(),
            d(2025, 3, 17)
        );
    }

    #[test]
    fn invalid_rules_are_rejected() {
        let zero = Recurrence::new(RecurrencePattern::Daily, 0);
        assert!(matches!(
            next_occurrence(&zero, d(2025, 1, 1)),
            Err(EngineError::InvalidRecurrence(_))
        ));

        let days_on_daily =
            Recurrence::new(RecurrencePattern::Daily, 1).with_week_days([Weekday::Mon]);
        assert!(validate_rule(&days_on_daily).is_err());

        let never_runs =
            Recurrence::new(RecurrencePattern::Daily, 1).ending(RecurrenceEnd::After { count: 0 });
        assert!(validate_rule(&never_runs).is_err());
    }

    #[test]
    fn end_after_uses_strict_comparison() {
        let rule = Recurrence::new(RecurrencePattern::Weekly, 1)
            .ending(RecurrenceEnd::After { count: 3 });
        let mut task = recurring(rule, d(2025, 3, 3));
        let today = d(2025, 3, 3);

        task.recurring_occurrence_count = 2;
        assert!(should_spawn_next(&task, today));
        task.recurring_occurrence_count = 3;
        assert!(!should_spawn_next(&task, today));
    }

    #[test]
    fn end_date_checks_next_occurrence() {
        let rule = Recurrence::new(RecurrencePattern::Daily, 1)
            .ending(RecurrenceEnd::Date { date: d(2025, 3, 4) });
        let today = d(2025, 3, 1);
        assert!(should_spawn_next(&recurring(rule.clone(), d(2025, 3, 3)), today));
        assert!(!should_spawn_next(&recurring(rule, d(2025, 3, 4)), today));
    }

    #[test]
    fn next_instance_resets_state_and_links_to_root() {
        let rule = Recurrence::new(RecurrencePattern::Weekly, 1);
        let mut task = recurring(rule, d(2025, 3, 3));
        task.assigned_date = Some(d(2025, 3, 1));
        task.parent_recurring_task_id = Some("series".into());
        task.recurring_occurrence_count = 2;

        let now = d(2025, 3, 3).and_hms_opt(9, 0, 0).unwrap().and_utc();
        let next =
            build_next_instance(&task, &StatusCatalog::legacy(), "next".into(), now).unwrap();

        assert_eq!(next.due_date, Some(d(2025, 3, 10)));
        assert_eq!(next.assigned_date, Some(d(2025, 3, 8)));
        assert_eq!(next.status, "To-Do");
        assert_eq!(next.progress_percent, 0);
        assert!(next.completed_at.is_none());
        assert_eq!(next.parent_recurring_task_id.as_deref(), Some("series"));
        assert_eq!(next.recurring_occurrence_count, 3);
        assert_eq!(next.priority, Priority::High);
        assert_eq!(next.project_id.as_deref(), Some("p1"));
    }

    #[test]
    fn missing_assigned_date_takes_previous_due() {
        let task = recurring(Recurrence::new(RecurrencePattern::Daily, 1), d(2025, 3, 3));
        let now = d(2025, 3, 3).and_hms_opt(9, 0, 0).unwrap().and_utc();
        let next =
            build_next_instance(&task, &StatusCatalog::legacy(), "next".into(), now).unwrap();
        assert_eq!(next.assigned_date, Some(d(2025, 3, 3)));
        assert_eq!(next.parent_recurring_task_id.as_deref(), Some("root"));
    }

    #[test]
    fn projection_honors_window_and_end() {
        let rule = Recurrence::new(RecurrencePattern::Weekly, 1)
            .ending(RecurrenceEnd::After { count: 3 });
        let task = recurring(rule, d(2025, 3, 3));
        let dates = occurrences_between(&task, d(2025, 3, 1), d(2025, 12, 31));
        assert_eq!(dates, vec![d(2025, 3, 3), d(2025, 3, 10), d(2025, 3, 17)]);

        let windowed = occurrences_between(&task, d(2025, 3, 5), d(2025, 3, 12));
        assert_eq!(windowed, vec![d(2025, 3, 10)]);
    }
}
