//! Task lifecycle service.
//!
//! # Responsibility
//! - Create, update, complete and delete recurring tasks.
//! - Compose the schedule calculator and roster planner under one write
//!   scope per operation.
//!
//! # Invariants
//! - Actor and task must share a household for every operation.
//! - A completed one-off task stays terminal.
//! - A completion appends a log, advances the due date and (for
//!   `Rotation::Single`) rotates the roster atomically.

use crate::clock::{Clock, SystemClock};
use crate::membership::directory::MembershipDirectory;
use crate::model::log::CompletionLogEntry;
use crate::model::member::{HouseholdId, UserId};
use crate::model::task::{
    validate_description, Frequency, NewTask, ResponsibleEntry, ResponsibleView, Rotation, Task,
    TaskDetail, TaskId, TaskRecord,
};
use crate::repo::task_repo::{RepoError, TaskStore, TaskWriter};
use crate::roster::plan::{
    is_contiguous, plan_assign, plan_reconcile, plan_rotation, PositionChange,
};
use crate::schedule::calculator::{first_due, next_after};
use crate::service::error::{ErrorKind, TaskServiceError};
use log::{debug, error, info, warn};
use std::time::Instant;
use time::{Date, PrimitiveDateTime};

pub type ServiceResult<T> = Result<T, TaskServiceError>;

/// Request model for creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTaskRequest {
    pub description: String,
    pub frequency: Frequency,
    pub rotation: Rotation,
    pub start_date: Date,
    /// Submitted order; duplicates keep their first occurrence.
    pub responsible_user_ids: Vec<UserId>,
}

/// Request model for updating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTaskRequest {
    pub description: String,
    pub frequency: Frequency,
    pub rotation: Rotation,
    pub start_date: Date,
    /// `None` leaves the roster untouched.
    pub responsible_user_ids: Option<Vec<UserId>>,
}

/// Result of a successful completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub log: CompletionLogEntry,
    /// `None` once a one-off task becomes terminal.
    pub next_due: Option<PrimitiveDateTime>,
    /// Member at position 1 after rotation.
    pub on_duty: Option<UserId>,
}

/// Task lifecycle facade over injected storage, membership and clock ports.
pub struct TaskService<S, D, C = SystemClock> {
    pub(super) store: S,
    pub(super) directory: D,
    clock: C,
}

impl<S: TaskStore, D: MembershipDirectory> TaskService<S, D> {
    /// Creates a service using the system clock.
    pub fn new(store: S, directory: D) -> Self {
        Self::with_clock(store, directory, SystemClock)
    }
}

impl<S: TaskStore, D: MembershipDirectory, C: Clock> TaskService<S, D, C> {
    pub fn with_clock(store: S, directory: D, clock: C) -> Self {
        Self {
            store,
            directory,
            clock,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a task in the actor's household and returns its id.
    ///
    /// # Contract
    /// - Actor and every responsible must belong to one household.
    /// - Description must be non-blank; the responsible list non-empty.
    /// - `next_due` starts at the start of `start_date`.
    /// - `created_at` and `updated_at` are stamped from the injected clock.
    pub fn create_task(&self, actor: UserId, request: &CreateTaskRequest) -> ServiceResult<TaskId> {
        let started_at = Instant::now();
        let result = self.create_task_inner(actor, request);
        log_outcome("task_create", actor, result.as_ref().ok().copied(), started_at, &result);
        result
    }

    fn create_task_inner(&self, actor: UserId, request: &CreateTaskRequest) -> ServiceResult<TaskId> {
        let household_id = self.household_of(actor)?;
        validate_description(&request.description)?;
        let roster = plan_assign(&request.responsible_user_ids)?;
        self.ensure_members(household_id, &roster)?;

        let draft = NewTask {
            household_id,
            description: request.description.trim().to_string(),
            frequency: request.frequency,
            rotation: request.rotation,
            start_date: request.start_date,
            next_due: Some(first_due(request.start_date)),
        };

        self.store.write(|writer| {
            let task = writer.insert_task(&draft, self.clock.now())?;
            writer.insert_responsibles(task.id, &roster)?;
            Ok(task.id)
        })
    }

    /// Lists the actor's household tasks, next due first.
    pub fn list_tasks(&self, actor: UserId) -> ServiceResult<Vec<TaskDetail>> {
        let household_id = self.household_of(actor).inspect_err(|err| {
            log_rejection("task_list", actor, None, err);
        })?;
        self.store
            .list_tasks(household_id)?
            .into_iter()
            .map(|record| self.detail(record))
            .collect()
    }

    /// Loads one task with its ordered roster.
    pub fn get_task(&self, actor: UserId, task_id: TaskId) -> ServiceResult<TaskDetail> {
        let record = self
            .store
            .find_task(task_id)?
            .ok_or(TaskServiceError::TaskNotFound(task_id))?;
        self.authorize(actor, &record.task).inspect_err(|err| {
            log_rejection("task_get", actor, Some(task_id), err);
        })?;
        self.detail(record)
    }

    /// Replaces task fields and, when a list is supplied, reconciles the roster.
    ///
    /// # Contract
    /// - Description, frequency, rotation and start date are replaced
    ///   unconditionally.
    /// - A missing `next_due` on an active task is reinitialized from the
    ///   new start date.
    /// - A terminal one-off task cannot be turned into a recurring one;
    ///   that attempt fails with `AlreadyCompleted` (`ErrorKind::InvalidState`).
    /// - `updated_at` is stamped from the injected clock.
    pub fn update_task(
        &self,
        actor: UserId,
        task_id: TaskId,
        request: &UpdateTaskRequest,
    ) -> ServiceResult<()> {
        let started_at = Instant::now();
        let result: ServiceResult<_> = self.store.write(|writer| {
            let mut task = self.lock_authorized(writer, actor, task_id)?;
            validate_description(&request.description)?;

            let plan = match &request.responsible_user_ids {
                Some(user_ids) => {
                    let target = plan_assign(user_ids)?;
                    self.ensure_members(task.household_id, &target)?;
                    Some(plan_reconcile(&writer.roster(task.id)?, user_ids)?)
                }
                None => None,
            };

            let was_terminal = task.is_terminal();
            if was_terminal && request.frequency.is_recurring() {
                return Err(TaskServiceError::AlreadyCompleted(task.id));
            }

            task.description = request.description.trim().to_string();
            task.frequency = request.frequency;
            task.rotation = request.rotation;
            task.start_date = request.start_date;
            if task.next_due.is_none() && !was_terminal {
                task.next_due = Some(first_due(task.start_date));
            }
            writer.update_task(&task, self.clock.now())?;

            if let Some(plan) = plan {
                writer.apply_plan(task.id, &plan)?;
                debug!(
                    "event=roster_reconcile module=service task_id={} writes={}",
                    task.id,
                    plan.write_count()
                );
                if !is_contiguous(&writer.roster(task.id)?) {
                    return Err(RepoError::InvalidData(format!(
                        "roster of task {} is not contiguous after reconcile",
                        task.id
                    ))
                    .into());
                }
            }
            Ok(())
        });
        log_outcome("task_update", actor, Some(task_id), started_at, &result);
        result
    }

    /// Records a completion by `actor`.
    ///
    /// # Contract
    /// - Fails with `AlreadyCompleted` for a terminal one-off task.
    /// - Fails with `NotYetDue` when today precedes the due date.
    /// - On success the log entry, the advanced due date and the rotation
    ///   commit together.
    pub fn complete_task(&self, actor: UserId, task_id: TaskId) -> ServiceResult<Completion> {
        let started_at = Instant::now();
        let result: ServiceResult<_> = self.store.write(|writer| {
            let mut task = self.lock_authorized(writer, actor, task_id)?;
            if task.is_terminal() {
                return Err(TaskServiceError::AlreadyCompleted(task.id));
            }

            let now = self.clock.now();
            let due = task
                .next_due
                .unwrap_or_else(|| first_due(task.start_date));
            if now.date() < due.date() {
                return Err(TaskServiceError::NotYetDue {
                    task_id: task.id,
                    due: due.date(),
                });
            }

            let log = writer.append_log(task.id, actor, now)?;
            task.next_due = match task.frequency {
                Frequency::Once => None,
                frequency => Some(next_after(due, frequency)?),
            };
            writer.update_task(&task, now)?;

            let mut roster = writer.roster(task.id)?;
            if task.rotation == Rotation::Single {
                let changes = plan_rotation(&roster);
                if !changes.is_empty() {
                    writer.reposition(task.id, &changes)?;
                    apply_positions(&mut roster, &changes);
                }
            }

            Ok(Completion {
                log,
                next_due: task.next_due,
                on_duty: roster
                    .iter()
                    .find(|entry| entry.position == 1)
                    .map(|entry| entry.user_id),
            })
        });
        log_outcome("task_complete", actor, Some(task_id), started_at, &result);
        result
    }

    /// Deletes a task together with its roster and completion log.
    pub fn delete_task(&self, actor: UserId, task_id: TaskId) -> ServiceResult<()> {
        let started_at = Instant::now();
        let result: ServiceResult<_> = self.store.write(|writer| {
            let task = self.lock_authorized(writer, actor, task_id)?;
            writer.delete_task(task.id)?;
            Ok(())
        });
        log_outcome("task_delete", actor, Some(task_id), started_at, &result);
        result
    }

    /// Resolves the household the actor belongs to.
    pub(super) fn household_of(&self, actor: UserId) -> ServiceResult<HouseholdId> {
        let member = self
            .directory
            .member(actor)?
            .ok_or(TaskServiceError::UserNotFound(actor))?;
        member
            .household_id
            .ok_or(TaskServiceError::NoHousehold(actor))
    }

    pub(super) fn display_name(&self, user_id: UserId) -> ServiceResult<Option<String>> {
        Ok(self.directory.display_name(user_id)?)
    }

    fn lock_authorized(
        &self,
        writer: &dyn TaskWriter,
        actor: UserId,
        task_id: TaskId,
    ) -> ServiceResult<Task> {
        let task = writer
            .lock_task(task_id)?
            .ok_or(TaskServiceError::TaskNotFound(task_id))?;
        self.authorize(actor, &task)?;
        Ok(task)
    }

    fn authorize(&self, actor: UserId, task: &Task) -> ServiceResult<()> {
        if self.household_of(actor)? != task.household_id {
            return Err(TaskServiceError::ForeignTask {
                user_id: actor,
                task_id: task.id,
            });
        }
        Ok(())
    }

    fn ensure_members(
        &self,
        household_id: HouseholdId,
        roster: &[PositionChange],
    ) -> ServiceResult<()> {
        for entry in roster {
            if self.directory.member(entry.user_id)?.is_none() {
                return Err(TaskServiceError::UserNotFound(entry.user_id));
            }
            if !self.directory.same_household(entry.user_id, household_id)? {
                return Err(TaskServiceError::ForeignMember {
                    user_id: entry.user_id,
                    household_id,
                });
            }
        }
        Ok(())
    }

    fn detail(&self, record: TaskRecord) -> ServiceResult<TaskDetail> {
        let TaskRecord { task, roster } = record;
        let responsibles = roster
            .iter()
            .map(|entry| {
                Ok(ResponsibleView {
                    user_id: entry.user_id,
                    display_name: self.display_name(entry.user_id)?,
                    position: entry.position,
                })
            })
            .collect::<ServiceResult<Vec<_>>>()?;

        Ok(TaskDetail {
            task_id: task.id,
            household_id: task.household_id,
            description: task.description,
            frequency: task.frequency,
            rotation: task.rotation,
            start_date: task.start_date,
            next_due: task.next_due,
            created_at: task.created_at,
            updated_at: task.updated_at,
            responsibles,
        })
    }
}

fn apply_positions(roster: &mut [ResponsibleEntry], changes: &[PositionChange]) {
    for change in changes {
        if let Some(entry) = roster
            .iter_mut()
            .find(|entry| entry.user_id == change.user_id)
        {
            entry.position = change.position;
        }
    }
}

fn log_outcome<T>(
    event: &str,
    actor: UserId,
    task_id: Option<TaskId>,
    started_at: Instant,
    result: &ServiceResult<T>,
) {
    let task = task_id.map_or_else(|| "none".to_string(), |id| id.to_string());
    match result {
        Ok(_) => info!(
            "event={event} module=service status=ok actor={actor} task_id={task} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => log_rejection(event, actor, task_id, err),
    }
}

pub(super) fn log_rejection(
    event: &str,
    actor: UserId,
    task_id: Option<TaskId>,
    err: &TaskServiceError,
) {
    let task = task_id.map_or_else(|| "none".to_string(), |id| id.to_string());
    let code = err.code();
    match err.kind() {
        ErrorKind::Authorization => warn!(
            "event={event} module=service status=rejected security=true actor={actor} task_id={task} error_code={code}"
        ),
        ErrorKind::Transient => warn!(
            "event={event} module=service status=busy actor={actor} task_id={task} error_code={code}"
        ),
        ErrorKind::Internal => error!(
            "event={event} module=service status=error actor={actor} task_id={task} error_code={code} error={err}"
        ),
        ErrorKind::Validation | ErrorKind::NotFound | ErrorKind::InvalidState => info!(
            "event={event} module=service status=rejected actor={actor} task_id={task} error_code={code}"
        ),
    }
}
