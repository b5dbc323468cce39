//! Output formatting utilities for markdown and JSON.

use crate::board::Board;
use crate::catalog::StatusCatalog;
use crate::engine::{BulkReport, ColumnLoad, Deletion, MutationOutcome};
use crate::error::Warning;
use crate::reminders::DueSoonNotice;
use crate::types::{ActivityEntry, Priority, RecurrenceEnd, Task};
use chrono::NaiveDate;
use clap::ValueEnum;
use serde::Serialize;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    Json,
    #[default]
    Markdown,
}

/// Pretty-printed JSON for any serializable result.
pub fn to_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

/// Format a single task as markdown.
pub fn format_task_markdown(task: &Task) -> String {
    let mut md = String::new();

    md.push_str(&format!("## Task: {}\n", task.title));
    md.push_str(&format!("- **id**: `{}`\n", task.id));
    md.push_str(&format!("- **status**: {}\n", task.status));
    md.push_str(&format!("- **progress**: {}%\n", task.progress_percent));
    md.push_str(&format!("- **priority**: {}\n", task.priority.as_str()));

    let assignees = task.effective_assignee_ids();
    if !assignees.is_empty() {
        md.push_str(&format!("- **assignees**: {}\n", assignees.join(", ")));
    }
    if let Some(ref project) = task.project_id {
        md.push_str(&format!("- **project**: `{}`\n", project));
    }
    if let Some(due) = task.due_date {
        md.push_str(&format!("- **due**: {}\n", due));
    }
    if let Some(assigned) = task.assigned_date {
        md.push_str(&format!("- **assigned**: {}\n", assigned));
    }
    if let Some(ref rule) = task.recurrence {
        let mut line = format!("every {} {}", rule.interval, rule.pattern.as_str());
        if !rule.selected_week_days.is_empty() {
            let days: Vec<String> = rule.selected_week_days.iter().map(|d| d.to_string()).collect();
            line.push_str(&format!(" on {}", days.join(", ")));
        }
        if rule.skip_weekends {
            line.push_str(", skipping weekends");
        }
        match rule.end {
            RecurrenceEnd::Never => {}
            RecurrenceEnd::After { count } => line.push_str(&format!(", {} occurrences", count)),
            RecurrenceEnd::Date { date } => line.push_str(&format!(", until {}", date)),
        }
        md.push_str(&format!(
            "- **recurrence**: {} (occurrence {})\n",
            line,
            task.recurring_occurrence_count.max(1)
        ));
    }
    if let Some(ref parent) = task.parent_recurring_task_id {
        md.push_str(&format!("- **series**: `{}`\n", parent));
    }
    if let Some(weight) = task.weightage {
        md.push_str(&format!("- **weightage**: {}\n", weight));
    }
    if task.archived {
        md.push_str("- **archived**: yes\n");
    }
    if let Some(at) = task.completed_at {
        let by = task.completed_by.as_deref().unwrap_or("unknown");
        md.push_str(&format!("- **completed**: {} by {}\n", at.format("%Y-%m-%d %H:%M"), by));
    }
    if let Some(ref comment) = task.completion_comment {
        md.push_str(&format!("- **completion comment**: {}\n", comment));
    }

    if !task.assignee_status.is_empty() {
        md.push_str("\n### Assignees\n");
        for (id, entry) in &task.assignee_status {
            md.push_str(&format!(
                "- `{}`: {} ({}%)\n",
                id, entry.status, entry.progress_percent
            ));
        }
    }

    if !task.description.is_empty() {
        md.push_str(&format!("\n{}\n", task.description));
    }

    md
}

/// Format a task in short form for lists.
fn format_task_short(task: &Task) -> String {
    let priority_marker = match task.priority {
        Priority::High => "!!! ",
        Priority::Medium | Priority::Low => "",
    };

    let due = task
        .due_date
        .map(|d| format!(" (due {})", d))
        .unwrap_or_default();

    let owners = task.effective_assignee_ids();
    let owners = if owners.is_empty() {
        String::new()
    } else {
        format!(" @{}", owners.join(" @"))
    };

    format!(
        "- {}{} `{}`{}{}\n",
        priority_marker,
        task.title,
        &task.id[..8.min(task.id.len())],
        due,
        owners,
    )
}

/// Format a list of tasks as markdown.
pub fn format_tasks_markdown(tasks: &[Task]) -> String {
    let mut md = format!("# Tasks ({})\n\n", tasks.len());
    for task in tasks {
        md.push_str(&format_task_short(task));
    }
    md
}

fn format_warnings(warnings: &[Warning]) -> String {
    let mut md = String::new();
    if !warnings.is_empty() {
        md.push_str("\n### Warnings\n");
        for warning in warnings {
            md.push_str(&format!("- {}\n", warning));
        }
    }
    md
}

/// Format a mutation result: the task, any spawned instance and warnings.
pub fn format_outcome_markdown(outcome: &MutationOutcome) -> String {
    let mut md = format_task_markdown(&outcome.value);
    if let Some(ref spawned) = outcome.spawned_task_id {
        md.push_str(&format!("\nNext occurrence: `{}`\n", spawned));
    }
    md.push_str(&format_warnings(&outcome.warnings));
    md
}

pub fn format_deletion_markdown(outcome: &MutationOutcome<Deletion>) -> String {
    let d = &outcome.value;
    let mut md = String::new();
    if d.existed {
        md.push_str(&format!("Deleted task `{}`\n", d.task_id));
    } else {
        md.push_str(&format!("Task `{}` did not exist\n", d.task_id));
    }
    md.push_str(&format!(
        "- activity: {}\n- follow-ups: {}\n- comments: {}\n",
        d.activity_removed, d.follow_ups_removed, d.comments_removed
    ));
    md.push_str(&format_warnings(&outcome.warnings));
    md
}

/// Format a board. Columns at or over their WIP limit are flagged.
pub fn format_board_markdown(board: &Board) -> String {
    let mut md = String::new();

    for column in &board.columns {
        let load = match column.load {
            ColumnLoad::Unlimited => String::new(),
            ColumnLoad::Under { count, limit } => format!(" [{}/{}]", count, limit),
            ColumnLoad::AtLimit { limit } => format!(" [{}/{} FULL]", limit, limit),
            ColumnLoad::OverLimit { count, limit } => format!(" [{}/{} OVER]", count, limit),
        };
        md.push_str(&format!("## {} ({}){}\n\n", column.status, column.tasks.len(), load));
        for task in &column.tasks {
            md.push_str(&format_task_short(task));
        }
        md.push('\n');
    }

    if !board.unmatched.is_empty() {
        md.push_str(&format!("## Unmatched ({})\n\n", board.unmatched.len()));
        for task in &board.unmatched {
            md.push_str(&format!("- {} `{}`: {}\n", task.title, task.id, task.status));
        }
        md.push('\n');
    }

    md
}

pub fn format_catalog_markdown(catalog: &StatusCatalog) -> String {
    let mut md = String::new();
    if catalog.is_legacy() {
        md.push_str("# Statuses (legacy)\n\n");
    } else {
        md.push_str(&format!("# Statuses ({})\n\n", catalog.entries().len()));
    }
    for (i, entry) in catalog.entries().iter().enumerate() {
        let name = entry.name.as_str();
        let color = entry
            .color
            .as_deref()
            .map(|c| format!(" {}", c))
            .unwrap_or_default();
        let mut marks = Vec::new();
        if name == catalog.initial() {
            marks.push("initial");
        }
        if name == catalog.done_status() {
            marks.push("done");
        }
        let marks = if marks.is_empty() {
            String::new()
        } else {
            format!(" _({})_", marks.join(", "))
        };
        md.push_str(&format!("{}. {}{}{}\n", i + 1, name, color, marks));
    }
    md
}

pub fn format_occurrences_markdown(task: &Task, dates: &[NaiveDate]) -> String {
    let mut md = format!("# Occurrences of {} ({})\n\n", task.title, dates.len());
    for date in dates {
        md.push_str(&format!("- {} {}\n", date, date.format("%a")));
    }
    md
}

pub fn format_bulk_markdown(op: &str, report: &BulkReport) -> String {
    let mut md = format!(
        "# Bulk {}: {} succeeded, {} failed\n\n",
        op,
        report.succeeded.len(),
        report.failed.len()
    );
    for id in &report.succeeded {
        md.push_str(&format!("- ok `{}`\n", id));
    }
    for failure in &report.failed {
        md.push_str(&format!(
            "- failed `{}`: {:?} {}\n",
            failure.task_id, failure.code, failure.message
        ));
    }
    md.push_str(&format_warnings(&report.warnings));
    md
}

pub fn format_activity_markdown(entries: &[ActivityEntry]) -> String {
    let mut md = String::new();
    if entries.is_empty() {
        return md;
    }
    md.push_str("\n### Activity\n");
    for entry in entries {
        let actor = entry.actor_id.as_deref().unwrap_or("system");
        md.push_str(&format!(
            "- {} {} ({}): {}\n",
            entry.created_at.format("%Y-%m-%d %H:%M"),
            entry.action.as_str(),
            actor,
            entry.details
        ));
    }
    md
}

pub fn format_due_soon_markdown(notice: Option<&DueSoonNotice>, tasks: &[&Task]) -> String {
    let mut md = match notice {
        Some(notice) => format!("{}\n\n", notice),
        None => "Nothing due soon.\n".to_string(),
    };
    for task in tasks {
        md.push_str(&format_task_short(task));
    }
    md
}
