//! Status catalog: the ordered set of valid status names.
//!
//! When the admin-configured catalog is empty the engine falls back to the
//! fixed three-state model and derives the coarse status of multi-assignee
//! tasks from their per-assignee entries. The two behaviours are selected
//! once, when the catalog is built, and never mixed.

use crate::types::{AssigneeProgress, StatusEntry, Task};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const LEGACY_TODO: &str = "To-Do";
pub const LEGACY_IN_PROGRESS: &str = "In Progress";
pub const LEGACY_DONE: &str = "Done";
const LEGACY_IN_REVIEW: &str = "In Review";

/// Lowercase and drop everything that is not alphanumeric.
///
/// `"In-Progress "`, `"in progress"` and `"InProgress"` all normalize to
/// `"inprogress"`.
pub fn normalize_status(status: &str) -> String {
    status
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether a status is the done-equivalent state.
pub fn is_done_status(status: &str) -> bool {
    matches!(
        normalize_status(status).as_str(),
        "done" | "completed" | "complete"
    )
}

fn is_in_progress_like(status: &str) -> bool {
    matches!(
        normalize_status(status).as_str(),
        "inprogress" | "inreview" | "doing" | "working"
    )
}

/// How the coarse status of a task is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusStrategy {
    /// An admin catalog is in effect; the persisted status is authoritative.
    Catalog,
    /// No catalog configured; coarse status is derived from assignee entries.
    LegacyDerivation,
}

/// The ordered set of valid statuses together with the strategy in effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCatalog {
    entries: Vec<StatusEntry>,
    strategy: StatusStrategy,
}

impl Default for StatusCatalog {
    fn default() -> Self {
        Self::legacy()
    }
}

impl StatusCatalog {
    /// Build from the store's catalog read. Empty selects the legacy model.
    pub fn from_entries(entries: Vec<StatusEntry>) -> Self {
        let entries: Vec<StatusEntry> = entries
            .into_iter()
            .filter(|e| !normalize_status(&e.name).is_empty())
            .collect();
        if entries.is_empty() {
            Self::legacy()
        } else {
            Self {
                entries,
                strategy: StatusStrategy::Catalog,
            }
        }
    }

    pub fn legacy() -> Self {
        Self {
            entries: vec![
                StatusEntry::new(LEGACY_TODO),
                StatusEntry::new(LEGACY_IN_PROGRESS),
                StatusEntry::new(LEGACY_DONE),
            ],
            strategy: StatusStrategy::LegacyDerivation,
        }
    }

    pub fn strategy(&self) -> StatusStrategy {
        self.strategy
    }

    pub fn is_legacy(&self) -> bool {
        self.strategy == StatusStrategy::LegacyDerivation
    }

    pub fn entries(&self) -> &[StatusEntry] {
        &self.entries
    }

    /// Status given to new tasks.
    pub fn initial(&self) -> &str {
        self.entries
            .first()
            .map(|e| e.name.as_str())
            .unwrap_or(LEGACY_TODO)
    }

    /// The done-equivalent status. Falls back to `Done` when the catalog
    /// carries no done-like entry.
    pub fn done_status(&self) -> &str {
        self.entries
            .iter()
            .map(|e| e.name.as_str())
            .find(|n| is_done_status(n))
            .unwrap_or(LEGACY_DONE)
    }

    /// Status a task falls back to when its progress drops below 100 without
    /// an explicit status: the first in-progress-like entry, else the first
    /// entry that is neither initial nor done, else the initial status.
    pub fn in_progress_status(&self) -> &str {
        if let Some(e) = self.entries.iter().find(|e| is_in_progress_like(&e.name)) {
            return &e.name;
        }
        let initial = self.initial();
        self.entries
            .iter()
            .map(|e| e.name.as_str())
            .find(|n| *n != initial && !is_done_status(n))
            .unwrap_or(initial)
    }

    /// Canonical catalog name for a user-supplied status, if any.
    pub fn resolve(&self, status: &str) -> Option<&str> {
        let wanted = normalize_status(status);
        if wanted.is_empty() {
            return None;
        }
        if let Some(e) = self
            .entries
            .iter()
            .find(|e| normalize_status(&e.name) == wanted)
        {
            return Some(&e.name);
        }
        if self.is_legacy() && wanted == normalize_status(LEGACY_IN_REVIEW) {
            return Some(LEGACY_IN_PROGRESS);
        }
        None
    }

    pub fn contains(&self, status: &str) -> bool {
        self.resolve(status).is_some()
    }

    /// Board position of a status, matched after normalization.
    pub fn position(&self, status: &str) -> Option<usize> {
        let canonical = self.resolve(status)?;
        self.entries.iter().position(|e| e.name == canonical)
    }

    /// Coarse status derived from per-assignee entries. Only the legacy
    /// strategy derives; with a catalog in effect this returns `None` and the
    /// persisted status stands.
    ///
    /// All done gives `Done`; any in progress or done gives `In Progress`;
    /// otherwise `To-Do`.
    pub fn derive_coarse(&self, entries: &BTreeMap<String, AssigneeProgress>) -> Option<&str> {
        if !self.is_legacy() || entries.is_empty() {
            return None;
        }
        let all_done = entries.values().all(|e| e.is_done());
        let any_active = entries
            .values()
            .any(|e| e.is_done() || is_in_progress_like(&e.status));
        Some(if all_done {
            LEGACY_DONE
        } else if any_active {
            LEGACY_IN_PROGRESS
        } else {
            LEGACY_TODO
        })
    }

    /// Status as the board should show it. Legacy tasks with assignee
    /// entries show the derived status; `In Review` reads as `In Progress`.
    pub fn effective_status<'a>(&'a self, task: &'a Task) -> &'a str {
        if let Some(derived) = self.derive_coarse(&task.assignee_status) {
            return derived;
        }
        self.resolve(&task.status).unwrap_or(&task.status)
    }

    /// Column names when no catalog is configured: the legacy order first,
    /// then any other statuses observed on task data in first-seen order.
    pub fn observed_columns(tasks: &[Task]) -> Vec<String> {
        let mut columns: Vec<String> = [LEGACY_TODO, LEGACY_IN_PROGRESS, LEGACY_DONE]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut seen: Vec<String> = columns.iter().map(|c| normalize_status(c)).collect();
        seen.push(normalize_status(LEGACY_IN_REVIEW));
        for task in tasks {
            let norm = normalize_status(&task.status);
            if norm.is_empty() || seen.contains(&norm) {
                continue;
            }
            seen.push(norm);
            columns.push(task.status.trim().to_string());
        }
        columns
    }
}

/// Validate an ordered catalog: names must be non-empty and unique after
/// normalization, and a non-empty catalog needs a done-like entry.
pub fn validate_entries(entries: &[StatusEntry]) -> anyhow::Result<()> {
    let mut seen: Vec<String> = Vec::new();
    for entry in entries {
        let norm = normalize_status(&entry.name);
        if norm.is_empty() {
            anyhow::bail!("status names must contain at least one letter or digit");
        }
        if seen.contains(&norm) {
            anyhow::bail!("status '{}' is listed more than once", entry.name.trim());
        }
        seen.push(norm);
    }
    if !entries.is_empty() && !entries.iter().any(|e| is_done_status(&e.name)) {
        anyhow::bail!("the catalog needs a status named Done, Completed or Complete");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(status: &str) -> AssigneeProgress {
        AssigneeProgress::new(status)
    }

    #[test]
    fn normalization_ignores_case_space_and_punctuation() {
        assert_eq!(normalize_status(" In-Progress "), "inprogress");
        assert!(is_done_status("COMPLETED."));
        assert!(is_done_status(" done"));
        assert!(!is_done_status("Done-ish"));
    }

    #[test]
    fn empty_catalog_selects_legacy() {
        let catalog = StatusCatalog::from_entries(vec![]);
        assert!(catalog.is_legacy());
        assert_eq!(catalog.initial(), LEGACY_TODO);
        assert_eq!(catalog.done_status(), LEGACY_DONE);
    }

    #[test]
    fn catalog_resolves_names_and_finds_done() {
        let catalog = StatusCatalog::from_entries(vec![
            StatusEntry::new("Backlog"),
            StatusEntry::new("Doing"),
            StatusEntry::new("Completed"),
        ]);
        assert!(!catalog.is_legacy());
        assert_eq!(catalog.initial(), "Backlog");
        assert_eq!(catalog.done_status(), "Completed");
        assert_eq!(catalog.in_progress_status(), "Doing");
        assert_eq!(catalog.resolve("doing"), Some("Doing"));
        assert_eq!(catalog.resolve("In Review"), None);
    }

    #[test]
    fn legacy_maps_in_review_to_in_progress() {
        let catalog = StatusCatalog::legacy();
        assert_eq!(catalog.resolve("In Review"), Some(LEGACY_IN_PROGRESS));
    }

    #[test]
    fn legacy_derivation_rules() {
        let catalog = StatusCatalog::legacy();
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), entry("Done"));
        map.insert("b".to_string(), entry("Done"));
        assert_eq!(catalog.derive_coarse(&map), Some(LEGACY_DONE));

        map.insert("c".to_string(), entry("To-Do"));
        assert_eq!(catalog.derive_coarse(&map), Some(LEGACY_IN_PROGRESS));

        let mut idle = BTreeMap::new();
        idle.insert("a".to_string(), entry("To-Do"));
        assert_eq!(catalog.derive_coarse(&idle), Some(LEGACY_TODO));
    }

    #[test]
    fn catalog_strategy_never_derives() {
        let catalog = StatusCatalog::from_entries(vec![StatusEntry::new("Open")]);
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), entry("Done"));
        assert_eq!(catalog.derive_coarse(&map), None);
    }

    #[test]
    fn validate_rejects_normalized_duplicates() {
        let entries = vec![StatusEntry::new("In Progress"), StatusEntry::new("in-progress")];
        assert!(validate_entries(&entries).is_err());
        assert!(validate_entries(&[StatusEntry::new("Open"), StatusEntry::new("Done")]).is_ok());
    }

    #[test]
    fn validate_requires_a_done_entry() {
        let entries = vec![StatusEntry::new("Open"), StatusEntry::new("Closed")];
        assert!(validate_entries(&entries).is_err());
        assert!(validate_entries(&[]).is_ok());
    }
}
