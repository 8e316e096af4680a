//! Lifecycle service errors.

use crate::model::member::{HouseholdId, UserId};
use crate::model::task::{TaskId, TaskValidationError};
use crate::repo::task_repo::RepoError;
use crate::roster::plan::RosterError;
use crate::schedule::calculator::ScheduleError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use time::Date;

/// Coarse error category surfaced to the calling layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; never retried.
    Validation,
    /// Unknown task or user id.
    NotFound,
    /// Cross-household access.
    Authorization,
    /// Completing a terminal or not-yet-due task.
    InvalidState,
    /// Lock wait exceeded; safe to retry.
    Transient,
    /// Storage or data corruption failure.
    Internal,
}

/// Errors from task lifecycle operations.
#[derive(Debug)]
pub enum TaskServiceError {
    /// Description is blank after trim.
    BlankDescription,
    /// Responsible list is empty after deduplication.
    EmptyRoster,
    TaskNotFound(TaskId),
    UserNotFound(UserId),
    /// Actor has not joined any household.
    NoHousehold(UserId),
    /// Actor's household differs from the task's household.
    ForeignTask { user_id: UserId, task_id: TaskId },
    /// Responsible member is outside the task's household.
    ForeignMember {
        user_id: UserId,
        household_id: HouseholdId,
    },
    /// One-off task was already completed.
    AlreadyCompleted(TaskId),
    /// Today's date precedes the due date.
    NotYetDue { task_id: TaskId, due: Date },
    /// The per-task write scope could not be acquired in time.
    Busy,
    Schedule(ScheduleError),
    Repo(RepoError),
}

impl TaskServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BlankDescription | Self::EmptyRoster => ErrorKind::Validation,
            Self::TaskNotFound(_) | Self::UserNotFound(_) => ErrorKind::NotFound,
            Self::NoHousehold(_) | Self::ForeignTask { .. } | Self::ForeignMember { .. } => {
                ErrorKind::Authorization
            }
            Self::AlreadyCompleted(_) | Self::NotYetDue { .. } => ErrorKind::InvalidState,
            Self::Busy => ErrorKind::Transient,
            Self::Schedule(_) | Self::Repo(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BlankDescription => "blank_description",
            Self::EmptyRoster => "empty_roster",
            Self::TaskNotFound(_) => "task_not_found",
            Self::UserNotFound(_) => "user_not_found",
            Self::NoHousehold(_) => "no_household",
            Self::ForeignTask { .. } => "foreign_task",
            Self::ForeignMember { .. } => "foreign_member",
            Self::AlreadyCompleted(_) => "already_completed",
            Self::NotYetDue { .. } => "not_yet_due",
            Self::Busy => "busy",
            Self::Schedule(_) => "schedule_error",
            Self::Repo(_) => "storage_error",
        }
    }

    /// Returns whether the caller may retry the same request unchanged.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

impl Display for TaskServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankDescription => write!(f, "task description must not be blank"),
            Self::EmptyRoster => write!(f, "at least one responsible member is required"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::NoHousehold(id) => write!(f, "user {id} must be part of a household"),
            Self::ForeignTask { user_id, task_id } => write!(
                f,
                "access denied: user {user_id} is not in the household of task {task_id}"
            ),
            Self::ForeignMember {
                user_id,
                household_id,
            } => write!(
                f,
                "responsible {user_id} must be in household {household_id}"
            ),
            Self::AlreadyCompleted(id) => write!(f, "task {id} already completed"),
            Self::NotYetDue { task_id, due } => {
                write!(f, "task {task_id} is not yet due (due {due})")
            }
            Self::Busy => write!(f, "task is being modified concurrently; retry the request"),
            Self::Schedule(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TaskServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Schedule(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for TaskServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Busy => Self::Busy,
            RepoError::NotFound(task_id) => Self::TaskNotFound(task_id),
            RepoError::Validation(TaskValidationError::BlankDescription) => Self::BlankDescription,
            other => Self::Repo(other),
        }
    }
}

impl From<TaskValidationError> for TaskServiceError {
    fn from(value: TaskValidationError) -> Self {
        match value {
            TaskValidationError::BlankDescription => Self::BlankDescription,
        }
    }
}

impl From<RosterError> for TaskServiceError {
    fn from(value: RosterError) -> Self {
        match value {
            RosterError::Empty => Self::EmptyRoster,
        }
    }
}

impl From<ScheduleError> for TaskServiceError {
    fn from(value: ScheduleError) -> Self {
        Self::Schedule(value)
    }
}
