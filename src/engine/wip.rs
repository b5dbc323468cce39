//! WIP gate: per-status capacity limits.

use crate::catalog::{is_done_status, normalize_status};
use crate::error::{EngineError, EngineResult};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// How full a board column is relative to its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ColumnLoad {
    Unlimited,
    Under { count: usize, limit: u32 },
    AtLimit { limit: u32 },
    OverLimit { count: usize, limit: u32 },
}

impl ColumnLoad {
    /// Whether the board should flag the column.
    pub fn is_flagged(&self) -> bool {
        matches!(self, ColumnLoad::AtLimit { .. } | ColumnLoad::OverLimit { .. })
    }
}

/// Capacity limits keyed by normalized status name.
#[derive(Debug, Clone, Default)]
pub struct WipGate {
    limits: BTreeMap<String, u32>,
}

impl WipGate {
    pub fn new(limits: &BTreeMap<String, u32>) -> Self {
        Self {
            limits: limits
                .iter()
                .map(|(status, limit)| (normalize_status(status), *limit))
                .filter(|(status, _)| !status.is_empty())
                .collect(),
        }
    }

    /// Configured limit for a status, if any.
    pub fn limit_for(&self, status: &str) -> Option<u32> {
        self.limits.get(&normalize_status(status)).copied()
    }

    /// Whether a status with `count` other non-archived tasks can take one
    /// more. Done-equivalent statuses are never gated.
    pub fn can_accept(&self, status: &str, count: usize) -> bool {
        if is_done_status(status) {
            return true;
        }
        match self.limit_for(status) {
            Some(limit) => count < limit as usize,
            None => true,
        }
    }

    /// [`can_accept`](Self::can_accept) as a capacity error naming the
    /// status and its limit.
    pub fn check(&self, status: &str, count: usize) -> EngineResult<()> {
        if self.can_accept(status, count) {
            debug!(status, count, "WIP gate accepted");
            return Ok(());
        }
        let limit = self.limit_for(status).unwrap_or_default();
        debug!(status, count, limit, "WIP gate rejected");
        Err(EngineError::Capacity {
            status: status.to_string(),
            limit,
            count,
        })
    }

    /// Column load for a board header.
    pub fn column_load(&self, status: &str, count: usize) -> ColumnLoad {
        match self.limit_for(status) {
            None => ColumnLoad::Unlimited,
            Some(limit) if count < limit as usize => ColumnLoad::Under { count, limit },
            Some(limit) if count == limit as usize => ColumnLoad::AtLimit { limit },
            Some(limit) => ColumnLoad::OverLimit { count, limit },
        }
    }
}
