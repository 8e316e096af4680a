//! Task and roster records.
//!
//! # Responsibility
//! - Define the persisted task shape and its recurrence/rotation enums.
//! - Define the roster entry and the read models handed to callers.
//!
//! # Invariants
//! - `description` is never blank after trim.
//! - Dates are compared at day granularity; `next_due` is always the start
//!   of a calendar day.

use crate::model::member::{HouseholdId, UserId};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use time::{Date, PrimitiveDateTime};
use uuid::Uuid;

/// Stable identifier for a recurring task.
pub type TaskId = Uuid;

/// Recurrence unit that drives schedule advancement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    /// Single occurrence; completing it makes the task terminal.
    Once,
    Daily,
    EveryOtherDay,
    Weekly,
    EveryOtherWeek,
    /// One calendar month, clamped to the last day of shorter months.
    Monthly,
}

impl Frequency {
    /// Returns whether completing an occurrence schedules another one.
    pub fn is_recurring(self) -> bool {
        !matches!(self, Self::Once)
    }

    /// Stable snake_case name, shared by storage and display.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::Daily => "daily",
            Self::EveryOtherDay => "every_other_day",
            Self::Weekly => "weekly",
            Self::EveryOtherWeek => "every_other_week",
            Self::Monthly => "monthly",
        }
    }
}

/// How responsibility for each occurrence is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    /// Position 1 is on duty; the roster rotates after every completion.
    Single,
    /// All responsibles jointly own every occurrence.
    Shared,
}

impl Rotation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Shared => "shared",
        }
    }
}

/// Validation failures for task fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    /// Description is empty after trim.
    BlankDescription,
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankDescription => write!(f, "task description must not be blank"),
        }
    }
}

impl Error for TaskValidationError {}

/// Persisted recurring task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub household_id: HouseholdId,
    pub description: String,
    pub frequency: Frequency,
    pub rotation: Rotation,
    pub start_date: Date,
    /// `None` only in the terminal state of a `Frequency::Once` task.
    pub next_due: Option<PrimitiveDateTime>,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl Task {
    /// Returns whether this task is a completed one-off.
    pub fn is_terminal(&self) -> bool {
        self.frequency == Frequency::Once && self.next_due.is_none()
    }

    pub fn validate(&self) -> Result<(), TaskValidationError> {
        validate_description(&self.description)
    }
}

/// Insert model for a task; the id and audit timestamps are assigned on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub household_id: HouseholdId,
    pub description: String,
    pub frequency: Frequency,
    pub rotation: Rotation,
    pub start_date: Date,
    pub next_due: Option<PrimitiveDateTime>,
}

impl NewTask {
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        validate_description(&self.description)
    }
}

/// One member's slot in a task roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsibleEntry {
    pub task_id: TaskId,
    pub user_id: UserId,
    /// 1-based; position 1 is on duty for `Rotation::Single`.
    pub position: u32,
}

/// Task loaded together with its roster from one consistent snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub task: Task,
    /// Ordered by position ascending.
    pub roster: Vec<ResponsibleEntry>,
}

/// Roster entry enriched with the member's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsibleView {
    pub user_id: UserId,
    /// `None` when the member is no longer known to the directory.
    pub display_name: Option<String>,
    pub position: u32,
}

/// Task read model returned by detail and list queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDetail {
    pub task_id: TaskId,
    pub household_id: HouseholdId,
    pub description: String,
    pub frequency: Frequency,
    pub rotation: Rotation,
    pub start_date: Date,
    pub next_due: Option<PrimitiveDateTime>,
    pub created_at: i64,
    pub updated_at: i64,
    /// Ordered by position ascending.
    pub responsibles: Vec<ResponsibleView>,
}

pub(crate) fn validate_description(description: &str) -> Result<(), TaskValidationError> {
    if description.trim().is_empty() {
        return Err(TaskValidationError::BlankDescription);
    }
    Ok(())
}
