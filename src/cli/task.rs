//! Task subcommand arguments.

use crate::engine::StatusScope;
use crate::types::{
    ActorKind, Assignee, NewTask, Priority, Recurrence, RecurrenceEnd, RecurrencePattern,
};
use chrono::{NaiveDate, Weekday};
use clap::Args;

/// Parse `kind:id` or a bare id (a user). Kinds are `user` and `client`.
pub fn parse_assignee(s: &str) -> Result<Assignee, String> {
    let s = s.trim();
    let (kind, id) = match s.split_once(':') {
        Some((kind, id)) => {
            let kind = ActorKind::parse(kind).ok_or_else(|| format!("unknown assignee kind '{}'", kind))?;
            (kind, id.trim())
        }
        None => (ActorKind::User, s),
    };
    if id.is_empty() {
        return Err("assignee id must not be empty".to_string());
    }
    Ok(Assignee {
        id: id.to_string(),
        kind,
    })
}

fn parse_priority(s: &str) -> Result<Priority, String> {
    s.parse()
}

fn parse_pattern(s: &str) -> Result<RecurrencePattern, String> {
    s.parse()
}

fn parse_weekday(s: &str) -> Result<Weekday, String> {
    s.trim()
        .parse::<Weekday>()
        .map_err(|_| format!("unknown weekday '{}'", s))
}

/// Arguments for the create subcommand
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Task title
    pub title: String,

    /// Longer description
    #[arg(long, default_value = "")]
    pub description: String,

    /// Assignee as `user:ID`, `client:ID` or a bare user id (repeatable)
    #[arg(short, long = "assignee", value_name = "ASSIGNEE", value_parser = parse_assignee, required = true)]
    pub assignees: Vec<Assignee>,

    /// Project the task belongs to
    #[arg(short, long)]
    pub project: Option<String>,

    /// Initial status (defaults to the first catalog status)
    #[arg(short, long)]
    pub status: Option<String>,

    /// Priority: low, medium or high
    #[arg(long, value_parser = parse_priority, default_value = "medium")]
    pub priority: Priority,

    /// Due date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub due: Option<NaiveDate>,

    /// Assigned date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub assigned: Option<NaiveDate>,

    /// Weight in weighted project progress
    #[arg(long)]
    pub weightage: Option<f64>,

    /// Completion comment, when creating directly in the done status
    #[arg(long)]
    pub comment: Option<String>,

    #[command(flatten)]
    pub recurrence: RecurrenceArgs,
}

/// Recurrence options for create
#[derive(Args, Debug, Default)]
pub struct RecurrenceArgs {
    /// Repeat pattern: daily, weekly or monthly
    #[arg(long = "repeat", value_name = "PATTERN", value_parser = parse_pattern)]
    pub pattern: Option<RecurrencePattern>,

    /// Repeat every N days, weeks or months
    #[arg(long, default_value_t = 1)]
    pub interval: u32,

    /// Weekdays for weekly repeats, comma-separated (mon,wed,fri)
    #[arg(long = "on", value_name = "DAYS", value_delimiter = ',', value_parser = parse_weekday)]
    pub week_days: Vec<Weekday>,

    /// Roll Saturday and Sunday occurrences forward to Monday
    #[arg(long)]
    pub skip_weekends: bool,

    /// Stop after this many occurrences
    #[arg(long, value_name = "COUNT", conflicts_with = "until")]
    pub count: Option<u32>,

    /// Stop after this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub until: Option<NaiveDate>,
}

impl RecurrenceArgs {
    /// The rule, or `None` when no `--repeat` was given.
    pub fn to_rule(&self) -> Option<Recurrence> {
        let pattern = self.pattern?;
        let mut rule = Recurrence::new(pattern, self.interval).with_week_days(self.week_days.iter().copied());
        if self.skip_weekends {
            rule = rule.skipping_weekends();
        }
        let end = match (self.count, self.until) {
            (Some(count), _) => RecurrenceEnd::After { count },
            (None, Some(date)) => RecurrenceEnd::Date { date },
            (None, None) => RecurrenceEnd::Never,
        };
        Some(rule.ending(end))
    }
}

impl CreateArgs {
    pub fn into_new_task(self) -> NewTask {
        let recurrence = self.recurrence.to_rule();
        NewTask {
            title: self.title,
            description: self.description,
            assignees: self.assignees,
            assignee: None,
            project_id: self.project,
            status: self.status,
            priority: self.priority,
            due_date: self.due,
            assigned_date: self.assigned,
            recurrence,
            weightage: self.weightage,
            completion_comment: self.comment,
        }
    }
}

/// A single task id
#[derive(Args, Debug)]
pub struct TaskIdArgs {
    /// Task id
    pub task_id: String,
}

/// Arguments for the priority subcommand
#[derive(Args, Debug)]
pub struct PriorityArgs {
    /// Task id
    pub task_id: String,

    /// New priority (low, medium, high)
    #[arg(value_parser = parse_priority)]
    pub priority: Priority,
}

/// Arguments for the show subcommand
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Task id
    pub task_id: String,

    /// Include the activity log
    #[arg(long)]
    pub activity: bool,
}

/// Arguments for the status and move subcommands
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Task id
    pub task_id: String,

    /// Target status
    pub status: String,

    /// Completion comment, required by some hosts when moving to done
    #[arg(long)]
    pub comment: Option<String>,

    /// Edit only this assignee's own status
    #[arg(long, value_name = "ID")]
    pub assignee: Option<String>,

    /// Leave per-assignee statuses untouched
    #[arg(long, conflicts_with = "assignee")]
    pub no_propagate: bool,
}

impl StatusArgs {
    pub fn scope(&self) -> StatusScope {
        scope_for(self.assignee.as_deref(), self.no_propagate)
    }
}

/// Arguments for the progress subcommand
#[derive(Args, Debug)]
pub struct ProgressArgs {
    /// Task id
    pub task_id: String,

    /// Progress percentage, 0 to 100
    #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
    pub progress: u8,

    /// Edit only this assignee's own progress
    #[arg(long, value_name = "ID")]
    pub assignee: Option<String>,

    /// Leave per-assignee progress untouched
    #[arg(long, conflicts_with = "assignee")]
    pub no_propagate: bool,
}

impl ProgressArgs {
    pub fn scope(&self) -> StatusScope {
        scope_for(self.assignee.as_deref(), self.no_propagate)
    }
}

fn scope_for(assignee: Option<&str>, no_propagate: bool) -> StatusScope {
    match assignee {
        Some(id) => StatusScope::Assignee(id.to_string()),
        None => StatusScope::Task {
            propagate: !no_propagate,
        },
    }
}

/// Arguments for the assign subcommand
#[derive(Args, Debug)]
pub struct AssignArgs {
    /// Task id
    pub task_id: String,

    /// New assignees, replacing the current set
    #[arg(value_parser = parse_assignee, required = true)]
    pub assignees: Vec<Assignee>,
}

/// Arguments for the project subcommand
#[derive(Args, Debug)]
pub struct ProjectArgs {
    /// Project id
    pub project_id: String,

    /// Display name
    #[arg(long, default_value = "")]
    pub name: String,
}

/// Arguments for moving a task between projects
#[derive(Args, Debug)]
pub struct RehomeArgs {
    /// Task id
    pub task_id: String,

    /// Target project; omit to detach
    pub project_id: Option<String>,
}

/// Arguments for bulk subcommands
#[derive(Args, Debug)]
pub struct BulkArgs {
    /// Task ids
    #[arg(required = true)]
    pub task_ids: Vec<String>,
}

/// Arguments for the board subcommand
#[derive(Args, Debug)]
pub struct BoardArgs {
    /// Only this project's tasks
    #[arg(short, long)]
    pub project: Option<String>,

    /// Only tasks assigned to this id
    #[arg(short, long)]
    pub assignee: Option<String>,
}

/// Arguments for the occurrences subcommand
#[derive(Args, Debug)]
pub struct OccurrencesArgs {
    /// Recurring task id
    pub task_id: String,

    /// Window start (defaults to today)
    #[arg(long, value_name = "DATE")]
    pub from: Option<NaiveDate>,

    /// Window end, inclusive
    #[arg(long, value_name = "DATE")]
    pub to: NaiveDate,
}

/// Arguments for the due-soon subcommand
#[derive(Args, Debug)]
pub struct DueSoonArgs {
    /// Session the reminder is shown in
    #[arg(long, default_value = "cli")]
    pub session: String,

    /// Override the configured window in days
    #[arg(long)]
    pub days: Option<u32>,

    /// Only tasks assigned to this id
    #[arg(short, long)]
    pub assignee: Option<String>,
}
