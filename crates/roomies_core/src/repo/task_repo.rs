//! Task storage contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist tasks, their rosters and their completion logs.
//! - Provide the exclusive write scope used for per-task read-modify-write.
//!
//! # Invariants
//! - `write` holds the database writer lock (`BEGIN IMMEDIATE`) for the
//!   whole closure and commits only when the closure succeeds.
//! - `UNIQUE(task_uuid, position)` holds after every statement; position
//!   rewrites park rows at negative positions first.
//! - Task deletion removes logs and roster rows in the same transaction.

use crate::db::migrations::latest_version;
use crate::db::{is_busy_error, DbError};
use crate::model::log::{CompletionLogEntry, CompletionLogRecord, LogPage};
use crate::model::member::{HouseholdId, UserId};
use crate::model::task::{
    Frequency, NewTask, ResponsibleEntry, Rotation, Task, TaskId, TaskRecord, TaskValidationError,
};
use crate::roster::plan::{PositionChange, RosterPlan};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT
    task_uuid,
    household_id,
    description,
    frequency,
    rotation,
    start_date,
    next_due,
    created_at,
    updated_at
FROM tasks";

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for task, roster and log persistence.
#[derive(Debug)]
pub enum RepoError {
    Validation(TaskValidationError),
    Db(DbError),
    /// The write lock could not be acquired within the busy timeout.
    Busy,
    NotFound(TaskId),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Busy => write!(f, "task storage is busy; retry the request"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted task data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Busy | Self::NotFound(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<TaskValidationError> for RepoError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        if value.is_busy() {
            return Self::Busy;
        }
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if is_busy_error(&value) {
            return Self::Busy;
        }
        Self::Db(DbError::Sqlite(value))
    }
}

/// Task storage port: committed reads plus an exclusive write scope.
pub trait TaskStore {
    /// Runs `f` inside one exclusive write transaction.
    ///
    /// Commits when `f` returns `Ok`; rolls back every write otherwise.
    fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn TaskWriter) -> Result<T, E>,
        E: From<RepoError>;

    /// Loads one task and its roster from one snapshot.
    fn find_task(&self, task_id: TaskId) -> RepoResult<Option<TaskRecord>>;

    /// Lists household tasks by next due ascending; terminal tasks last.
    fn list_tasks(&self, household_id: HouseholdId) -> RepoResult<Vec<TaskRecord>>;

    /// Lists household completion logs, newest first.
    fn list_logs(
        &self,
        household_id: HouseholdId,
        page: LogPage,
    ) -> RepoResult<Vec<CompletionLogRecord>>;
}

/// Mutations available inside `TaskStore::write`.
pub trait TaskWriter {
    /// Loads a task inside the write scope; no other writer can change it
    /// until the scope ends.
    fn lock_task(&self, task_id: TaskId) -> RepoResult<Option<Task>>;
    /// Inserts a task stamped with `at` as both audit timestamps.
    fn insert_task(&self, task: &NewTask, at: OffsetDateTime) -> RepoResult<Task>;
    /// Persists mutable fields and stamps `updated_at` with `at`.
    fn update_task(&self, task: &Task, at: OffsetDateTime) -> RepoResult<()>;
    /// Deletes a task together with its roster and logs.
    fn delete_task(&self, task_id: TaskId) -> RepoResult<()>;
    /// Current roster, ordered by position ascending.
    fn roster(&self, task_id: TaskId) -> RepoResult<Vec<ResponsibleEntry>>;
    fn insert_responsibles(&self, task_id: TaskId, entries: &[PositionChange]) -> RepoResult<()>;
    /// Moves existing members to new positions.
    fn reposition(&self, task_id: TaskId, changes: &[PositionChange]) -> RepoResult<()>;
    fn remove_responsibles(&self, task_id: TaskId, user_ids: &[UserId]) -> RepoResult<()>;
    fn append_log(
        &self,
        task_id: TaskId,
        completed_by: UserId,
        completed_at: OffsetDateTime,
    ) -> RepoResult<CompletionLogEntry>;

    /// Applies a reconciliation plan: removals, then moves, then inserts.
    fn apply_plan(&self, task_id: TaskId, plan: &RosterPlan) -> RepoResult<()> {
        if !plan.removals.is_empty() {
            self.remove_responsibles(task_id, &plan.removals)?;
        }
        if !plan.moves.is_empty() {
            self.reposition(task_id, &plan.moves)?;
        }
        if !plan.inserts.is_empty() {
            self.insert_responsibles(task_id, &plan.inserts)?;
        }
        Ok(())
    }
}

/// SQLite-backed task store.
pub struct SqliteTaskStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskStore<'conn> {
    /// Creates a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl TaskStore for SqliteTaskStore<'_> {
    fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn TaskWriter) -> Result<T, E>,
        E: From<RepoError>,
    {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(|err| E::from(RepoError::from(err)))?;
        let value = {
            let writer = SqliteTaskWriter { conn: &tx };
            f(&writer)?
        };
        tx.commit().map_err(|err| E::from(RepoError::from(err)))?;
        Ok(value)
    }

    fn find_task(&self, task_id: TaskId) -> RepoResult<Option<TaskRecord>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Deferred)?;
        let record = match select_task(&tx, task_id)? {
            Some(task) => {
                let roster = select_roster(&tx, task.id)?;
                Some(TaskRecord { task, roster })
            }
            None => None,
        };
        tx.finish()?;
        Ok(record)
    }

    fn list_tasks(&self, household_id: HouseholdId) -> RepoResult<Vec<TaskRecord>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Deferred)?;
        let tasks = {
            let mut stmt = tx.prepare(&format!(
                "{TASK_SELECT_SQL}
                 WHERE household_id = ?1
                 ORDER BY next_due IS NULL ASC, next_due ASC, created_at ASC, task_uuid ASC;"
            ))?;
            let mut rows = stmt.query([household_id])?;
            let mut tasks = Vec::new();
            while let Some(row) = rows.next()? {
                tasks.push(parse_task_row(row)?);
            }
            tasks
        };

        let mut records = Vec::with_capacity(tasks.len());
        for task in tasks {
            let roster = select_roster(&tx, task.id)?;
            records.push(TaskRecord { task, roster });
        }
        tx.finish()?;
        Ok(records)
    }

    fn list_logs(
        &self,
        household_id: HouseholdId,
        page: LogPage,
    ) -> RepoResult<Vec<CompletionLogRecord>> {
        let offset = i64::try_from(page.offset())
            .map_err(|_| RepoError::InvalidData(format!("log offset {} too large", page.offset())))?;
        let mut stmt = self.conn.prepare(
            "SELECT
                l.log_id AS log_id,
                l.task_uuid AS task_uuid,
                l.completed_by AS completed_by,
                l.completed_at AS completed_at,
                t.description AS description
             FROM task_logs l
             JOIN tasks t ON t.task_uuid = l.task_uuid
             WHERE t.household_id = ?1
             ORDER BY l.completed_at DESC, l.log_id DESC
             LIMIT ?2 OFFSET ?3;",
        )?;
        let mut rows = stmt.query(params![household_id, i64::from(page.size()), offset])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(CompletionLogRecord {
                entry: parse_log_row(row)?,
                task_description: row.get("description")?,
            });
        }
        Ok(records)
    }
}

struct SqliteTaskWriter<'tx> {
    conn: &'tx Connection,
}

impl TaskWriter for SqliteTaskWriter<'_> {
    fn lock_task(&self, task_id: TaskId) -> RepoResult<Option<Task>> {
        select_task(self.conn, task_id)
    }

    fn insert_task(&self, task: &NewTask, at: OffsetDateTime) -> RepoResult<Task> {
        task.validate()?;

        let task_id = Uuid::new_v4();
        let stamped_at = offset_to_epoch_ms(at);
        self.conn.execute(
            "INSERT INTO tasks (
                task_uuid,
                household_id,
                description,
                frequency,
                rotation,
                start_date,
                next_due,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8);",
            params![
                task_id.to_string(),
                task.household_id,
                task.description.as_str(),
                task.frequency.as_str(),
                task.rotation.as_str(),
                date_to_db(task.start_date)?,
                task.next_due.map(datetime_to_epoch_ms),
                stamped_at,
            ],
        )?;

        select_task(self.conn, task_id)?.ok_or(RepoError::NotFound(task_id))
    }

    fn update_task(&self, task: &Task, at: OffsetDateTime) -> RepoResult<()> {
        task.validate()?;

        let changed = self.conn.execute(
            "UPDATE tasks
             SET
                description = ?1,
                frequency = ?2,
                rotation = ?3,
                start_date = ?4,
                next_due = ?5,
                updated_at = ?6
             WHERE task_uuid = ?7;",
            params![
                task.description.as_str(),
                task.frequency.as_str(),
                task.rotation.as_str(),
                date_to_db(task.start_date)?,
                task.next_due.map(datetime_to_epoch_ms),
                offset_to_epoch_ms(at),
                task.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(task.id));
        }
        Ok(())
    }

    fn delete_task(&self, task_id: TaskId) -> RepoResult<()> {
        let id = task_id.to_string();
        self.conn
            .execute("DELETE FROM task_logs WHERE task_uuid = ?1;", [&id])?;
        self.conn
            .execute("DELETE FROM task_responsibles WHERE task_uuid = ?1;", [&id])?;
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE task_uuid = ?1;", [&id])?;

        if changed == 0 {
            return Err(RepoError::NotFound(task_id));
        }
        Ok(())
    }

    fn roster(&self, task_id: TaskId) -> RepoResult<Vec<ResponsibleEntry>> {
        select_roster(self.conn, task_id)
    }

    fn insert_responsibles(&self, task_id: TaskId, entries: &[PositionChange]) -> RepoResult<()> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO task_responsibles (task_uuid, user_id, position)
             VALUES (?1, ?2, ?3);",
        )?;
        for entry in entries {
            stmt.execute(params![
                task_id.to_string(),
                entry.user_id,
                i64::from(entry.position)
            ])?;
        }
        Ok(())
    }

    fn reposition(&self, task_id: TaskId, changes: &[PositionChange]) -> RepoResult<()> {
        let id = task_id.to_string();
        let mut stmt = self.conn.prepare(
            "UPDATE task_responsibles
             SET position = ?3
             WHERE task_uuid = ?1
               AND user_id = ?2;",
        )?;

        // Park first so no intermediate statement collides on (task, position).
        for change in changes {
            let changed = stmt.execute(params![id, change.user_id, -i64::from(change.position)])?;
            if changed == 0 {
                return Err(RepoError::InvalidData(format!(
                    "user {} is not on the roster of task {task_id}",
                    change.user_id
                )));
            }
        }
        for change in changes {
            stmt.execute(params![id, change.user_id, i64::from(change.position)])?;
        }
        Ok(())
    }

    fn remove_responsibles(&self, task_id: TaskId, user_ids: &[UserId]) -> RepoResult<()> {
        let mut stmt = self.conn.prepare(
            "DELETE FROM task_responsibles
             WHERE task_uuid = ?1
               AND user_id = ?2;",
        )?;
        for user_id in user_ids {
            stmt.execute(params![task_id.to_string(), user_id])?;
        }
        Ok(())
    }

    fn append_log(
        &self,
        task_id: TaskId,
        completed_by: UserId,
        completed_at: OffsetDateTime,
    ) -> RepoResult<CompletionLogEntry> {
        let completed_at_ms = offset_to_epoch_ms(completed_at);
        self.conn.execute(
            "INSERT INTO task_logs (task_uuid, completed_by, completed_at)
             VALUES (?1, ?2, ?3);",
            params![task_id.to_string(), completed_by, completed_at_ms],
        )?;

        Ok(CompletionLogEntry {
            log_id: self.conn.last_insert_rowid(),
            task_id,
            completed_by,
            completed_at: epoch_ms_to_offset(completed_at_ms)?,
        })
    }
}

fn select_task(conn: &Connection, task_id: TaskId) -> RepoResult<Option<Task>> {
    let mut stmt = conn.prepare(&format!("{TASK_SELECT_SQL} WHERE task_uuid = ?1;"))?;
    let mut rows = stmt.query([task_id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_task_row(row)?));
    }
    Ok(None)
}

fn select_roster(conn: &Connection, task_id: TaskId) -> RepoResult<Vec<ResponsibleEntry>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, position
         FROM task_responsibles
         WHERE task_uuid = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([task_id.to_string()])?;
    let mut roster = Vec::new();
    while let Some(row) = rows.next()? {
        let position: i64 = row.get("position")?;
        let position = u32::try_from(position).ok().filter(|value| *value >= 1).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid position `{position}` in task_responsibles.position"
            ))
        })?;
        roster.push(ResponsibleEntry {
            task_id,
            user_id: row.get("user_id")?,
            position,
        });
    }
    Ok(roster)
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let uuid_text: String = row.get("task_uuid")?;
    let id = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in tasks.task_uuid"))
    })?;

    let frequency_text: String = row.get("frequency")?;
    let frequency = parse_frequency(&frequency_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid frequency `{frequency_text}` in tasks.frequency"
        ))
    })?;

    let rotation_text: String = row.get("rotation")?;
    let rotation = parse_rotation(&rotation_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid rotation `{rotation_text}` in tasks.rotation"))
    })?;

    let start_text: String = row.get("start_date")?;
    let start_date = Date::parse(&start_text, DATE_FORMAT).map_err(|_| {
        RepoError::InvalidData(format!("invalid date `{start_text}` in tasks.start_date"))
    })?;

    let next_due = match row.get::<_, Option<i64>>("next_due")? {
        Some(value) => {
            let due = epoch_ms_to_offset(value)?;
            Some(PrimitiveDateTime::new(due.date(), due.time()))
        }
        None => None,
    };

    Ok(Task {
        id,
        household_id: row.get("household_id")?,
        description: row.get("description")?,
        frequency,
        rotation,
        start_date,
        next_due,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_log_row(row: &Row<'_>) -> RepoResult<CompletionLogEntry> {
    let uuid_text: String = row.get("task_uuid")?;
    let task_id = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid uuid value `{uuid_text}` in task_logs.task_uuid"
        ))
    })?;

    Ok(CompletionLogEntry {
        log_id: row.get("log_id")?,
        task_id,
        completed_by: row.get("completed_by")?,
        completed_at: epoch_ms_to_offset(row.get("completed_at")?)?,
    })
}

fn parse_frequency(value: &str) -> Option<Frequency> {
    match value {
        "once" => Some(Frequency::Once),
        "daily" => Some(Frequency::Daily),
        "every_other_day" => Some(Frequency::EveryOtherDay),
        "weekly" => Some(Frequency::Weekly),
        "every_other_week" => Some(Frequency::EveryOtherWeek),
        "monthly" => Some(Frequency::Monthly),
        _ => None,
    }
}

fn parse_rotation(value: &str) -> Option<Rotation> {
    match value {
        "single" => Some(Rotation::Single),
        "shared" => Some(Rotation::Shared),
        _ => None,
    }
}

fn date_to_db(date: Date) -> RepoResult<String> {
    date.format(DATE_FORMAT)
        .map_err(|err| RepoError::InvalidData(format!("cannot format date {date}: {err}")))
}

/// Due timestamps are stored as UTC wall-clock epoch milliseconds.
fn datetime_to_epoch_ms(value: PrimitiveDateTime) -> i64 {
    offset_to_epoch_ms(value.assume_utc())
}

fn offset_to_epoch_ms(value: OffsetDateTime) -> i64 {
    (value.unix_timestamp_nanos() / 1_000_000) as i64
}

fn epoch_ms_to_offset(value: i64) -> RepoResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(value) * 1_000_000)
        .map_err(|_| RepoError::InvalidData(format!("epoch ms `{value}` out of range")))
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::InvalidData(format!(
            "task store requires schema version {expected_version}, got {actual_version}"
        )));
    }

    for table in ["tasks", "task_responsibles", "task_logs"] {
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1;",
                [table],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(RepoError::InvalidData(format!(
                "task store requires table `{table}`"
            )));
        }
    }
    Ok(())
}
