//! Completion log records.
//!
//! # Invariants
//! - Entries are append-only; they disappear only with their task.

use crate::model::member::UserId;
use crate::model::task::TaskId;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Identifier of one completion log row.
pub type LogId = i64;

/// Persisted completion record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionLogEntry {
    pub log_id: LogId,
    pub task_id: TaskId,
    pub completed_by: UserId,
    pub completed_at: OffsetDateTime,
}

/// Completion record joined with its task description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionLogRecord {
    pub entry: CompletionLogEntry,
    pub task_description: String,
}

/// Completion record as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntryView {
    pub log_id: LogId,
    pub task_id: TaskId,
    pub task_description: String,
    pub completed_by: UserId,
    /// `None` when the completing user is no longer known to the directory.
    pub completed_by_name: Option<String>,
    pub completed_at: OffsetDateTime,
}

/// Clamped pagination window for completion log queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogPage {
    page: u32,
    size: u32,
}

impl LogPage {
    pub const DEFAULT_SIZE: u32 = 20;
    pub const MAX_SIZE: u32 = 100;

    /// Builds a page window, clamping `page < 0` to 0 and `size` into `1..=100`.
    pub fn clamped(page: i64, size: i64) -> Self {
        let page = page.clamp(0, i64::from(u32::MAX)) as u32;
        let size = size.clamp(1, i64::from(Self::MAX_SIZE)) as u32;
        Self { page, size }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }
}

impl Default for LogPage {
    fn default() -> Self {
        Self {
            page: 0,
            size: Self::DEFAULT_SIZE,
        }
    }
}
