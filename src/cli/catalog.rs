//! Status catalog administration subcommands.

use clap::Subcommand;

/// Catalog operations
#[derive(Subcommand, Debug)]
pub enum CatalogCommand {
    /// Show the statuses in board order
    List,

    /// Add a status
    Add {
        /// Status name
        name: String,

        /// Display color, e.g. #3b82f6
        #[arg(long)]
        color: Option<String>,

        /// Zero-based board position (end by default)
        #[arg(long)]
        position: Option<usize>,
    },

    /// Rename a status; tasks in it follow the new name
    Rename {
        /// Current name
        from: String,
        /// New name
        to: String,
    },

    /// Remove a status that no live task uses
    Remove {
        /// Status name
        name: String,
    },

    /// Move a status to a new board position
    Move {
        /// Status name
        name: String,
        /// Zero-based board position
        position: usize,
    },
}
