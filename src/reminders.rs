//! Due-soon reminders, shown at most once per session.

use crate::types::Task;
use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;

/// Stable identifier of a viewing session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The one-shot reminder for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DueSoonNotice {
    Single {
        task_id: String,
        title: String,
        due_date: NaiveDate,
    },
    Many {
        count: usize,
        within_days: u32,
    },
}

impl fmt::Display for DueSoonNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DueSoonNotice::Single { title, .. } => write!(f, "Task \"{}\" is due shortly.", title),
            DueSoonNotice::Many { count, within_days } => write!(
                f,
                "You have {} tasks due within the next {} days.",
                count, within_days
            ),
        }
    }
}

/// Tasks due between `today` and `today + within_days`, inclusive, that are
/// neither done nor archived.
pub fn due_soon<'a>(tasks: &'a [Task], today: NaiveDate, within_days: u32) -> Vec<&'a Task> {
    let horizon = today
        .checked_add_days(Days::new(within_days as u64))
        .unwrap_or(NaiveDate::MAX);
    tasks
        .iter()
        .filter(|t| !t.archived && !t.is_done())
        .filter(|t| matches!(t.due_date, Some(due) if due >= today && due <= horizon))
        .collect()
}

/// Remembers which sessions have already been warned.
#[derive(Debug)]
pub struct DueSoonTracker {
    within_days: u32,
    notified: Mutex<HashSet<SessionId>>,
}

impl DueSoonTracker {
    pub fn new(within_days: u32) -> Self {
        Self {
            within_days,
            notified: Mutex::new(HashSet::new()),
        }
    }

    /// Notice for `session`, or `None` if it was already warned or nothing is
    /// due soon. A session is only marked once a notice is returned.
    pub fn check(&self, session: &SessionId, tasks: &[Task], today: NaiveDate) -> Option<DueSoonNotice> {
        let mut notified = self.notified.lock().unwrap();
        if notified.contains(session) {
            return None;
        }

        let due = due_soon(tasks, today, self.within_days);
        let notice = match due.as_slice() {
            [] => return None,
            [task] => DueSoonNotice::Single {
                task_id: task.id.clone(),
                title: task.title.clone(),
                due_date: task.due_date.unwrap_or(today),
            },
            many => DueSoonNotice::Many {
                count: many.len(),
                within_days: self.within_days,
            },
        };
        notified.insert(session.clone());
        Some(notice)
    }

    /// Forget a session, e.g. on sign-out.
    pub fn reset(&self, session: &SessionId) {
        self.notified.lock().unwrap().remove(session);
    }
}
