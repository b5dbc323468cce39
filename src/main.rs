//! Opsboard CLI
//!
//! Operator front end for the task lifecycle engine: create and move tasks,
//! manage the status catalog, and inspect boards, recurrences and reminders.

use anyhow::{Result, bail};
use clap::Parser;
use opsboard::board::Board;
use opsboard::catalog::StatusCatalog;
use opsboard::cli::catalog::CatalogCommand;
use opsboard::cli::task::{BoardArgs, DueSoonArgs, OccurrencesArgs, ShowArgs, StatusArgs};
use opsboard::cli::{Cli, Command};
use opsboard::clock::SystemClock;
use opsboard::config::ConfigLoader;
use opsboard::db::Database;
use opsboard::engine::recurrence::occurrences_between;
use opsboard::engine::{BulkReport, Engine, StatusProposal};
use opsboard::format::{self, OutputFormat};
use opsboard::logging;
use opsboard::reminders::{DueSoonTracker, SessionId, due_soon};
use opsboard::store::TaskFilter;
use opsboard::types::{Actor, StatusEntry};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log, cli.verbose)?;

    // If explicit config path given, set it as env var for ConfigLoader to pick up
    // SAFETY: This is safe at program startup before any other threads are spawned
    if let Some(config_path) = &cli.config {
        unsafe {
            std::env::set_var("OPSBOARD_CONFIG_PATH", config_path);
        }
    }
    let mut loader = ConfigLoader::load()?;
    debug!(sources = ?loader.sources(), "configuration loaded");

    // Override paths from CLI arguments
    if let Some(db_path) = &cli.database {
        loader.config_mut().store.db_path = db_path.into();
    }
    let config = loader.into_config();
    config.ensure_db_dir()?;

    let db = Database::open(&config.store.db_path)?;
    info!(path = %config.store.db_path.display(), "opened database");

    let engine = Engine::new(Arc::new(db), Arc::new(SystemClock), config);
    engine.seed_catalog_from_config()?;

    let actor = cli.actor();
    let output = run(&engine, cli.command, &actor, cli.format).await?;
    if !output.is_empty() {
        println!("{}", output.trim_end());
    }

    Ok(())
}

async fn run(engine: &Engine, command: Command, actor: &Actor, fmt: OutputFormat) -> Result<String> {
    match command {
        Command::Create(args) => {
            let outcome = engine.create_task(args.into_new_task(), actor)?;
            render(fmt, &outcome, format::format_outcome_markdown)
        }
        Command::Show(args) => run_show(engine, args, fmt),
        Command::List(args) => {
            let tasks = engine.list_tasks(&filter_for(&args))?;
            render(fmt, &tasks, |t| format::format_tasks_markdown(t))
        }
        Command::Status(args) => run_status(engine, args, actor, fmt),
        Command::Move(args) => {
            let outcome = engine.move_task(&args.task_id, &args.status, args.comment, actor)?;
            render(fmt, &outcome, format::format_outcome_markdown)
        }
        Command::Progress(args) => {
            let scope = args.scope();
            let outcome = engine.set_progress(&args.task_id, args.progress, scope, actor)?;
            render(fmt, &outcome, format::format_outcome_markdown)
        }
        Command::Assign(args) => {
            let outcome = engine.reassign(&args.task_id, args.assignees, actor)?;
            render(fmt, &outcome, format::format_outcome_markdown)
        }
        Command::Priority(args) => {
            let outcome = engine.set_priority(&args.task_id, args.priority, actor)?;
            render(fmt, &outcome, format::format_outcome_markdown)
        }
        Command::Rehome(args) => {
            let outcome = engine.move_to_project(&args.task_id, args.project_id, actor)?;
            render(fmt, &outcome, format::format_outcome_markdown)
        }
        Command::Archive(args) => {
            let outcome = engine.archive(&args.task_id, actor)?;
            render(fmt, &outcome, format::format_outcome_markdown)
        }
        Command::Unarchive(args) => {
            let outcome = engine.unarchive(&args.task_id, actor)?;
            render(fmt, &outcome, format::format_outcome_markdown)
        }
        Command::Delete(args) => {
            let outcome = engine.delete_task(&args.task_id)?;
            render(fmt, &outcome, format::format_deletion_markdown)
        }
        Command::BulkArchive(args) => {
            let report = engine.bulk_archive(args.task_ids, actor).await;
            render_bulk(fmt, "archive", &report)
        }
        Command::BulkUnarchive(args) => {
            let report = engine.bulk_unarchive(args.task_ids, actor).await;
            render_bulk(fmt, "unarchive", &report)
        }
        Command::BulkDelete(args) => {
            let report = engine.bulk_delete(args.task_ids).await;
            render_bulk(fmt, "delete", &report)
        }
        Command::Project(args) => {
            let project = engine.register_project(&args.project_id, &args.name)?;
            render(fmt, &project, |p| {
                format!("Project `{}` {}: {}%\n", p.id, p.name, p.progress)
            })
        }
        Command::Recompute { project_id } => {
            let progress = engine.recompute_project(&project_id)?;
            let value = json!({ "project_id": project_id, "progress": progress });
            render(fmt, &value, |_| format!("Project `{}`: {}%\n", project_id, progress))
        }
        Command::Board(args) => {
            let tasks = engine.list_tasks(&filter_for(&args))?;
            let board = Board::build(&engine.catalog()?, engine.gate(), &tasks);
            render(fmt, &board, format::format_board_markdown)
        }
        Command::Occurrences(args) => run_occurrences(engine, args, fmt),
        Command::DueSoon(args) => run_due_soon(engine, args, fmt),
        Command::Catalog(command) => run_catalog(engine, command, fmt),
    }
}

fn render<T: Serialize>(fmt: OutputFormat, value: &T, markdown: impl FnOnce(&T) -> String) -> Result<String> {
    match fmt {
        OutputFormat::Json => Ok(format::to_json(value)?),
        OutputFormat::Markdown => Ok(markdown(value)),
    }
}

fn render_bulk(fmt: OutputFormat, op: &str, report: &BulkReport) -> Result<String> {
    render(fmt, report, |r| format::format_bulk_markdown(op, r))
}

fn filter_for(args: &BoardArgs) -> TaskFilter {
    TaskFilter {
        project_id: args.project.clone(),
        assignee_id: args.assignee.clone(),
        ..Default::default()
    }
}

fn run_show(engine: &Engine, args: ShowArgs, fmt: OutputFormat) -> Result<String> {
    let task = engine.get_task(&args.task_id)?;
    let activity = if args.activity {
        engine.activity(&task.id)?
    } else {
        Vec::new()
    };
    let value = json!({ "task": task, "activity": activity });
    render(fmt, &value, |_| {
        let mut md = format::format_task_markdown(&task);
        md.push_str(&format::format_activity_markdown(&activity));
        md
    })
}

fn run_status(engine: &Engine, args: StatusArgs, actor: &Actor, fmt: OutputFormat) -> Result<String> {
    let scope = args.scope();
    let mut proposal = StatusProposal::status(args.status);
    if let Some(comment) = args.comment {
        proposal = proposal.with_comment(comment);
    }
    let outcome = engine.update_status(&args.task_id, proposal, scope, actor)?;
    render(fmt, &outcome, format::format_outcome_markdown)
}

fn run_occurrences(engine: &Engine, args: OccurrencesArgs, fmt: OutputFormat) -> Result<String> {
    let task = engine.get_task(&args.task_id)?;
    if !task.is_recurring() {
        bail!("task {} is not recurring", task.id);
    }
    if task.due_date.is_none() {
        bail!("task {} has no due date to project from", task.id);
    }
    let from = args.from.unwrap_or_else(|| engine.clock().today());
    let dates = occurrences_between(&task, from, args.to);
    let value = json!({ "task_id": task.id, "from": from, "to": args.to, "dates": dates });
    render(fmt, &value, |_| format::format_occurrences_markdown(&task, &dates))
}

fn run_due_soon(engine: &Engine, args: DueSoonArgs, fmt: OutputFormat) -> Result<String> {
    let filter = TaskFilter {
        assignee_id: args.assignee.clone(),
        ..Default::default()
    };
    let tasks = engine.list_tasks(&filter)?;
    let today = engine.clock().today();
    let within = args.days.unwrap_or(engine.config().reminders.due_soon_days);

    let tracker = DueSoonTracker::new(within);
    let notice = tracker.check(&SessionId::new(args.session), &tasks, today);
    let due = due_soon(&tasks, today, within);

    let value = json!({
        "notice": notice,
        "message": notice.as_ref().map(|n| n.to_string()),
        "tasks": due,
    });
    render(fmt, &value, |_| format::format_due_soon_markdown(notice.as_ref(), &due))
}

fn run_catalog(engine: &Engine, command: CatalogCommand, fmt: OutputFormat) -> Result<String> {
    let catalog = match command {
        CatalogCommand::List => engine.catalog()?,
        CatalogCommand::Add {
            name,
            color,
            position,
        } => {
            let entry = StatusEntry { name, color };
            StatusCatalog::from_entries(engine.add_status(entry, position)?)
        }
        CatalogCommand::Rename { from, to } => {
            StatusCatalog::from_entries(engine.rename_status(&from, &to)?)
        }
        CatalogCommand::Remove { name } => StatusCatalog::from_entries(engine.remove_status(&name)?),
        CatalogCommand::Move { name, position } => {
            StatusCatalog::from_entries(engine.move_status(&name, position)?)
        }
    };
    let value = json!({
        "strategy": catalog.strategy(),
        "statuses": catalog.entries(),
    });
    render(fmt, &value, |_| format::format_catalog_markdown(&catalog))
}
