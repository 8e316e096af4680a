//! Completion log query.
//!
//! Read-only: never takes the write scope and never mutates state.

use crate::clock::Clock;
use crate::membership::directory::MembershipDirectory;
use crate::model::log::{LogEntryView, LogPage};
use crate::model::member::UserId;
use crate::repo::task_repo::TaskStore;
use crate::service::task_service::{log_rejection, ServiceResult, TaskService};

impl<S: TaskStore, D: MembershipDirectory, C: Clock> TaskService<S, D, C> {
    /// Lists completions in the actor's household, newest first.
    ///
    /// `page < 0` clamps to 0 and `size` clamps into `1..=100`.
    pub fn list_completion_logs(
        &self,
        actor: UserId,
        page: i64,
        size: i64,
    ) -> ServiceResult<Vec<LogEntryView>> {
        let household_id = self.household_of(actor).inspect_err(|err| {
            log_rejection("log_list", actor, None, err);
        })?;

        self.store
            .list_logs(household_id, LogPage::clamped(page, size))?
            .into_iter()
            .map(|record| {
                Ok(LogEntryView {
                    log_id: record.entry.log_id,
                    task_id: record.entry.task_id,
                    task_description: record.task_description,
                    completed_by: record.entry.completed_by,
                    completed_by_name: self.display_name(record.entry.completed_by)?,
                    completed_at: record.entry.completed_at,
                })
            })
            .collect()
    }
}
