use roomies_core::db::open_db_in_memory;
use roomies_core::{
    CompletionLogEntry, CompletionLogRecord, CreateTaskRequest, ErrorKind, FixedClock, Frequency,
    HouseholdId, InMemoryDirectory, LogPage, NewTask, PositionChange, RepoError, RepoResult,
    ResponsibleEntry, Rotation, SqliteTaskStore, Task, TaskId, TaskRecord, TaskService,
    TaskServiceError, TaskStore, TaskWriter, UpdateTaskRequest, UserId,
};
use std::cell::Cell;
use time::macros::{date, datetime};
use time::OffsetDateTime;

/// Store wrapper counting roster mutations.
struct CountingStore<'conn> {
    inner: SqliteTaskStore<'conn>,
    roster_writes: Cell<usize>,
}

struct CountingWriter<'a> {
    inner: &'a dyn TaskWriter,
    roster_writes: &'a Cell<usize>,
}

impl CountingWriter<'_> {
    fn bump(&self) {
        self.roster_writes.set(self.roster_writes.get() + 1);
    }
}

impl TaskStore for CountingStore<'_> {
    fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn TaskWriter) -> Result<T, E>,
        E: From<RepoError>,
    {
        self.inner.write(|writer| {
            let counting = CountingWriter {
                inner: writer,
                roster_writes: &self.roster_writes,
            };
            f(&counting)
        })
    }

    fn find_task(&self, task_id: TaskId) -> RepoResult<Option<TaskRecord>> {
        self.inner.find_task(task_id)
    }

    fn list_tasks(&self, household_id: HouseholdId) -> RepoResult<Vec<TaskRecord>> {
        self.inner.list_tasks(household_id)
    }

    fn list_logs(
        &self,
        household_id: HouseholdId,
        page: LogPage,
    ) -> RepoResult<Vec<CompletionLogRecord>> {
        self.inner.list_logs(household_id, page)
    }
}

impl TaskWriter for CountingWriter<'_> {
    fn lock_task(&self, task_id: TaskId) -> RepoResult<Option<Task>> {
        self.inner.lock_task(task_id)
    }

    fn insert_task(&self, task: &NewTask, at: OffsetDateTime) -> RepoResult<Task> {
        self.inner.insert_task(task, at)
    }

    fn update_task(&self, task: &Task, at: OffsetDateTime) -> RepoResult<()> {
        self.inner.update_task(task, at)
    }

    fn delete_task(&self, task_id: TaskId) -> RepoResult<()> {
        self.inner.delete_task(task_id)
    }

    fn roster(&self, task_id: TaskId) -> RepoResult<Vec<ResponsibleEntry>> {
        self.inner.roster(task_id)
    }

    fn insert_responsibles(&self, task_id: TaskId, entries: &[PositionChange]) -> RepoResult<()> {
        self.bump();
        self.inner.insert_responsibles(task_id, entries)
    }

    fn reposition(&self, task_id: TaskId, changes: &[PositionChange]) -> RepoResult<()> {
        self.bump();
        self.inner.reposition(task_id, changes)
    }

    fn remove_responsibles(&self, task_id: TaskId, user_ids: &[UserId]) -> RepoResult<()> {
        self.bump();
        self.inner.remove_responsibles(task_id, user_ids)
    }

    fn append_log(
        &self,
        task_id: TaskId,
        completed_by: UserId,
        completed_at: OffsetDateTime,
    ) -> RepoResult<CompletionLogEntry> {
        self.inner.append_log(task_id, completed_by, completed_at)
    }
}

fn directory() -> InMemoryDirectory {
    InMemoryDirectory::new()
        .with_member(1, Some(10), "Ada")
        .with_member(2, Some(10), "Ben")
        .with_member(3, Some(10), "Cy")
        .with_member(4, Some(20), "Dee")
}

fn create_request(user_ids: &[UserId]) -> CreateTaskRequest {
    CreateTaskRequest {
        description: "Clean kitchen".to_string(),
        frequency: Frequency::Weekly,
        rotation: Rotation::Single,
        start_date: date!(2024 - 01 - 31),
        responsible_user_ids: user_ids.to_vec(),
    }
}

fn update_request(user_ids: Option<&[UserId]>) -> UpdateTaskRequest {
    UpdateTaskRequest {
        description: "Clean kitchen".to_string(),
        frequency: Frequency::Weekly,
        rotation: Rotation::Single,
        start_date: date!(2024 - 01 - 31),
        responsible_user_ids: user_ids.map(<[UserId]>::to_vec),
    }
}

fn roster_of<S: TaskStore>(
    service: &TaskService<S, InMemoryDirectory, FixedClock>,
    task_id: TaskId,
) -> Vec<(UserId, u32)> {
    service
        .get_task(1, task_id)
        .unwrap()
        .responsibles
        .iter()
        .map(|entry| (entry.user_id, entry.position))
        .collect()
}

fn counting_service(
    conn: &rusqlite::Connection,
) -> TaskService<CountingStore<'_>, InMemoryDirectory, FixedClock> {
    TaskService::with_clock(
        CountingStore {
            inner: SqliteTaskStore::try_new(conn).unwrap(),
            roster_writes: Cell::new(0),
        },
        directory(),
        FixedClock::new(datetime!(2024-01-31 09:00 UTC)),
    )
}

#[test]
fn reconcile_keeps_shared_members_and_appends_new_ones() {
    let conn = open_db_in_memory().unwrap();
    let service = counting_service(&conn);
    let task_id = service.create_task(1, &create_request(&[1, 2])).unwrap();

    service
        .update_task(1, task_id, &update_request(Some(&[2, 3][..])))
        .unwrap();

    assert_eq!(roster_of(&service, task_id), vec![(2, 1), (3, 2)]);
}

#[test]
fn reconcile_collapses_duplicates_to_first_occurrence() {
    let conn = open_db_in_memory().unwrap();
    let service = counting_service(&conn);
    let task_id = service.create_task(1, &create_request(&[1, 2, 3])).unwrap();

    service
        .update_task(1, task_id, &update_request(Some(&[2, 2, 1, 2, 1][..])))
        .unwrap();

    assert_eq!(roster_of(&service, task_id), vec![(2, 1), (1, 2)]);
}

#[test]
fn identical_reconcile_issues_no_roster_writes() {
    let conn = open_db_in_memory().unwrap();
    let service = counting_service(&conn);
    let task_id = service.create_task(1, &create_request(&[1, 2])).unwrap();

    service
        .update_task(1, task_id, &update_request(Some(&[3, 1, 2][..])))
        .unwrap();
    let after_first = service.store().roster_writes.get();
    assert!(after_first > 0);

    service
        .update_task(1, task_id, &update_request(Some(&[3, 1, 2][..])))
        .unwrap();

    assert_eq!(service.store().roster_writes.get(), after_first);
    assert_eq!(roster_of(&service, task_id), vec![(3, 1), (1, 2), (2, 3)]);
}

#[test]
fn omitted_roster_is_left_untouched() {
    let conn = open_db_in_memory().unwrap();
    let service = counting_service(&conn);
    let task_id = service.create_task(1, &create_request(&[3, 1])).unwrap();
    let before = service.store().roster_writes.get();

    service
        .update_task(1, task_id, &update_request(None))
        .unwrap();

    assert_eq!(service.store().roster_writes.get(), before);
    assert_eq!(roster_of(&service, task_id), vec![(3, 1), (1, 2)]);
}

#[test]
fn empty_roster_is_rejected_and_task_unchanged() {
    let conn = open_db_in_memory().unwrap();
    let service = counting_service(&conn);
    let task_id = service.create_task(1, &create_request(&[1, 2])).unwrap();

    let mut request = update_request(Some(&[][..]));
    request.description = "Renamed".to_string();
    let err = service.update_task(1, task_id, &request).unwrap_err();

    assert!(matches!(err, TaskServiceError::EmptyRoster));
    assert_eq!(err.kind(), ErrorKind::Validation);
    let detail = service.get_task(1, task_id).unwrap();
    assert_eq!(detail.description, "Clean kitchen");
    assert_eq!(roster_of(&service, task_id), vec![(1, 1), (2, 2)]);
}

#[test]
fn foreign_member_is_rejected_without_partial_writes() {
    let conn = open_db_in_memory().unwrap();
    let service = counting_service(&conn);
    let task_id = service.create_task(1, &create_request(&[1, 2])).unwrap();

    let err = service
        .update_task(1, task_id, &update_request(Some(&[2, 4][..])))
        .unwrap_err();

    assert!(matches!(err, TaskServiceError::ForeignMember { user_id: 4, .. }));
    assert_eq!(roster_of(&service, task_id), vec![(1, 1), (2, 2)]);
}

#[test]
fn rotation_after_reconcile_follows_new_order() {
    let conn = open_db_in_memory().unwrap();
    let service = counting_service(&conn);
    let task_id = service.create_task(1, &create_request(&[1, 2])).unwrap();
    service
        .update_task(1, task_id, &update_request(Some(&[3, 2, 1][..])))
        .unwrap();

    let completion = service.complete_task(3, task_id).unwrap();

    assert_eq!(completion.on_duty, Some(2));
    assert_eq!(roster_of(&service, task_id), vec![(2, 1), (1, 2), (3, 3)]);
}
