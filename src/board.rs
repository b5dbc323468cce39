//! Board view: tasks grouped into status columns with WIP load.

use crate::catalog::{StatusCatalog, normalize_status};
use crate::engine::{ColumnLoad, WipGate};
use crate::types::Task;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Column {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub load: ColumnLoad,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Board {
    pub columns: Vec<Column>,
    /// Tasks whose status matches no column.
    pub unmatched: Vec<Task>,
}

impl Board {
    /// Group non-archived tasks by normalized status.
    ///
    /// With a catalog the columns are its entries in order; otherwise they
    /// are the legacy statuses followed by any others seen on the tasks.
    pub fn build(catalog: &StatusCatalog, gate: &WipGate, tasks: &[Task]) -> Self {
        let live: Vec<&Task> = tasks.iter().filter(|t| !t.archived).collect();

        let heads: Vec<(String, Option<String>)> = if catalog.is_legacy() {
            let owned: Vec<Task> = live.iter().map(|t| (*t).clone()).collect();
            StatusCatalog::observed_columns(&owned)
                .into_iter()
                .map(|name| (name, None))
                .collect()
        } else {
            catalog
                .entries()
                .iter()
                .map(|e| (e.name.clone(), e.color.clone()))
                .collect()
        };

        let mut columns: Vec<Column> = heads
            .into_iter()
            .map(|(status, color)| Column {
                status,
                color,
                load: ColumnLoad::Unlimited,
                tasks: Vec::new(),
            })
            .collect();
        let keys: Vec<String> = columns.iter().map(|c| normalize_status(&c.status)).collect();

        let mut unmatched = Vec::new();
        for task in live {
            let key = normalize_status(catalog.effective_status(task));
            match keys.iter().position(|k| *k == key) {
                Some(i) => columns[i].tasks.push(task.clone()),
                None => unmatched.push(task.clone()),
            }
        }

        for column in &mut columns {
            column.load = gate.column_load(&column.status, column.tasks.len());
        }

        Self { columns, unmatched }
    }

    pub fn column(&self, status: &str) -> Option<&Column> {
        let key = normalize_status(status);
        self.columns.iter().find(|c| normalize_status(&c.status) == key)
    }
}
