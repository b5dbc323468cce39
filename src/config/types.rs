//! Configuration types and structures.

use crate::catalog::{normalize_status, validate_entries};
use crate::types::StatusEntry;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub statuses: StatusesConfig,

    #[serde(default)]
    pub wip: WipConfig,

    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub progress: ProgressConfig,

    #[serde(default)]
    pub reminders: RemindersConfig,
}

/// Persistent store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("opsboard/opsboard.db")
}

/// Status catalog seed.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StatusesConfig {
    /// Ordered `{name, color}` entries written to the store's catalog when
    /// the store has none. Empty keeps the legacy three-state model.
    #[serde(default)]
    pub catalog: Vec<StatusEntry>,
}

/// Capacity configuration: status name to maximum non-archived task count.
/// Statuses without an entry are unlimited.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WipConfig {
    #[serde(default)]
    pub limits: BTreeMap<String, u32>,
}

/// Bounds on the completion comment collected by the confirmation step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Minimum comment length in characters (0 makes the comment optional).
    #[serde(default)]
    pub comment_min_len: usize,

    /// Maximum comment length in characters.
    #[serde(default = "default_comment_max_len")]
    pub comment_max_len: usize,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            comment_min_len: 0,
            comment_max_len: default_comment_max_len(),
        }
    }
}

fn default_comment_max_len() -> usize {
    300
}

impl CompletionConfig {
    /// Check a completion comment against the configured bounds.
    pub fn check_comment(&self, comment: Option<&str>) -> std::result::Result<(), String> {
        let len = comment.map(|c| c.trim().chars().count()).unwrap_or(0);
        if len < self.comment_min_len {
            return Err(format!(
                "completion comment must be at least {} characters",
                self.comment_min_len
            ));
        }
        if len > self.comment_max_len {
            return Err(format!(
                "completion comment must be at most {} characters",
                self.comment_max_len
            ));
        }
        Ok(())
    }
}

/// How project completion is aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressMode {
    /// Share of completed tasks.
    #[default]
    Count,
    /// Share of completed weightage; tasks without weightage weigh 1.
    Weighted,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProgressConfig {
    #[serde(default)]
    pub mode: ProgressMode,
}

/// Due-soon reminder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemindersConfig {
    /// Tasks due within this many days (inclusive) are "due soon".
    #[serde(default = "default_due_soon_days")]
    pub due_soon_days: u32,
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            due_soon_days: default_due_soon_days(),
        }
    }
}

fn default_due_soon_days() -> u32 {
    3
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        validate_entries(&self.statuses.catalog)?;

        for (status, limit) in &self.wip.limits {
            if normalize_status(status).is_empty() {
                return Err(anyhow!("WIP limit configured for an empty status name"));
            }
            if *limit == 0 {
                return Err(anyhow!(
                    "WIP limit for '{}' must be at least 1 (omit it for unlimited)",
                    status
                ));
            }
        }

        if self.completion.comment_min_len > self.completion.comment_max_len {
            return Err(anyhow!(
                "completion.comment_min_len ({}) exceeds comment_max_len ({})",
                self.completion.comment_min_len,
                self.completion.comment_max_len
            ));
        }

        Ok(())
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.store.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.completion.comment_max_len, 300);
        assert_eq!(config.reminders.due_soon_days, 3);
        assert_eq!(config.progress.mode, ProgressMode::Count);
    }

    #[test]
    fn parses_yaml_sections() {
        let yaml = r##"
statuses:
  catalog:
    - name: Backlog
      color: "#999999"
    - name: Doing
    - name: Done
wip:
  limits:
    Doing: 2
completion:
  comment_min_len: 5
progress:
  mode: weighted
"##;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.statuses.catalog.len(), 3);
        assert_eq!(config.statuses.catalog[0].color.as_deref(), Some("#999999"));
        assert_eq!(config.wip.limits.get("Doing"), Some(&2));
        assert_eq!(config.completion.comment_min_len, 5);
        assert_eq!(config.completion.comment_max_len, 300);
        assert_eq!(config.progress.mode, ProgressMode::Weighted);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_limit_is_rejected() {
        let mut config = Config::default();
        config.wip.limits.insert("Doing".into(), 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_comment_bounds_are_rejected() {
        let mut config = Config::default();
        config.completion.comment_min_len = 10;
        config.completion.comment_max_len = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn comment_bounds_are_checked() {
        let bounds = CompletionConfig {
            comment_min_len: 5,
            comment_max_len: 10,
        };
        assert!(bounds.check_comment(None).is_err());
        assert!(bounds.check_comment(Some("  ok  ")).is_err());
        assert!(bounds.check_comment(Some("shipped")).is_ok());
        assert!(bounds.check_comment(Some("far too long a note")).is_err());
        assert!(CompletionConfig::default().check_comment(None).is_ok());
    }
}
