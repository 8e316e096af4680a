//! Recurring chore scheduling and responsibility rotation engine.
//! This crate is the single source of truth for task lifecycle invariants.

pub mod clock;
pub mod db;
pub mod logging;
pub mod membership;
pub mod model;
pub mod repo;
pub mod roster;
pub mod schedule;
pub mod service;

pub use clock::{Clock, FixedClock, SystemClock};
pub use logging::{default_log_level, init_logging, init_logging_with, logging_status, LoggingConfig};
pub use membership::directory::{InMemoryDirectory, MembershipDirectory, SqliteMembershipDirectory};
pub use model::log::{CompletionLogEntry, CompletionLogRecord, LogEntryView, LogId, LogPage};
pub use model::member::{HouseholdId, Member, UserId};
pub use model::task::{
    Frequency, NewTask, ResponsibleEntry, ResponsibleView, Rotation, Task, TaskDetail, TaskId,
    TaskRecord, TaskValidationError,
};
pub use repo::task_repo::{RepoError, RepoResult, SqliteTaskStore, TaskStore, TaskWriter};
pub use roster::plan::{PositionChange, RosterError, RosterPlan};
pub use schedule::calculator::{first_due, next_after, ScheduleError};
pub use service::error::{ErrorKind, TaskServiceError};
pub use service::task_service::{
    Completion, CreateTaskRequest, ServiceResult, TaskService, UpdateTaskRequest,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the engine crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
