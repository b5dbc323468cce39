//! CLI command definitions for opsboard
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod catalog;
pub mod task;

use crate::format::OutputFormat;
use crate::types::{Actor, ActorKind};
use catalog::CatalogCommand;
use clap::{Parser, Subcommand, ValueEnum};
use task::{
    AssignArgs, BoardArgs, BulkArgs, CreateArgs, DueSoonArgs, OccurrencesArgs, PriorityArgs,
    ProgressArgs, ProjectArgs, RehomeArgs, ShowArgs, StatusArgs, TaskIdArgs,
};

/// Kind of the acting principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ActorKindArg {
    #[default]
    User,
    Client,
}

impl From<ActorKindArg> for ActorKind {
    fn from(kind: ActorKindArg) -> Self {
        match kind {
            ActorKindArg::User => ActorKind::User,
            ActorKindArg::Client => ActorKind::Client,
        }
    }
}

/// Operations board: task lifecycle, recurrence and WIP limits
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    /// Who is acting; recorded on activity and completion stamps
    #[arg(long, default_value = "admin", global = true)]
    pub actor: String,

    /// Whether the actor is a user or a client
    #[arg(long, value_enum, default_value_t = ActorKindArg::User, global = true)]
    pub actor_kind: ActorKindArg,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Markdown, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.actor.clone(),
            kind: self.actor_kind.into(),
        }
    }
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a task
    Create(CreateArgs),

    /// Show a task
    Show(ShowArgs),

    /// List live tasks
    List(BoardArgs),

    /// Set a task's status
    Status(StatusArgs),

    /// Set a task's progress percentage
    Progress(ProgressArgs),

    /// Move a task to another board column
    Move(StatusArgs),

    /// Replace a task's assignees
    Assign(AssignArgs),

    /// Change a task's priority
    Priority(PriorityArgs),

    /// Move a task to another project, or detach it
    Rehome(RehomeArgs),

    /// Archive a task
    Archive(TaskIdArgs),

    /// Restore an archived task
    Unarchive(TaskIdArgs),

    /// Delete a task and its dependent records
    Delete(TaskIdArgs),

    /// Archive several tasks
    BulkArchive(BulkArgs),

    /// Restore several archived tasks
    BulkUnarchive(BulkArgs),

    /// Delete several tasks
    BulkDelete(BulkArgs),

    /// Create or rename a project
    Project(ProjectArgs),

    /// Recompute a project's progress
    Recompute {
        /// Project id
        project_id: String,
    },

    /// Show the board
    Board(BoardArgs),

    /// Project a recurring task's dates over a window
    Occurrences(OccurrencesArgs),

    /// Tasks due within the reminder window
    DueSoon(DueSoonArgs),

    /// Manage the status catalog
    #[command(subcommand)]
    Catalog(CatalogCommand),
}
