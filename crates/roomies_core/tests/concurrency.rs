use roomies_core::db::{open_db, open_db_with, DbOptions};
use roomies_core::{
    CreateTaskRequest, ErrorKind, FixedClock, Frequency, InMemoryDirectory, Rotation,
    SqliteTaskStore, TaskId, TaskService, TaskServiceError,
};
use rusqlite::Connection;
use std::sync::Barrier;
use std::thread;
use std::time::Duration;
use time::macros::{date, datetime};

fn directory() -> InMemoryDirectory {
    InMemoryDirectory::new()
        .with_member(1, Some(10), "Ada")
        .with_member(2, Some(10), "Ben")
        .with_member(3, Some(10), "Cy")
}

fn clock() -> FixedClock {
    FixedClock::new(datetime!(2024-01-31 09:00 UTC))
}

fn create_daily(conn: &Connection, user_ids: &[i64]) -> TaskId {
    let service = TaskService::with_clock(
        SqliteTaskStore::try_new(conn).unwrap(),
        directory(),
        clock(),
    );
    service
        .create_task(
            1,
            &CreateTaskRequest {
                description: "Take out bins".to_string(),
                frequency: Frequency::Daily,
                rotation: Rotation::Single,
                start_date: date!(2024 - 01 - 31),
                responsible_user_ids: user_ids.to_vec(),
            },
        )
        .unwrap()
}

fn complete_after_barrier(
    conn: Connection,
    barrier: &Barrier,
    actor: i64,
    task_id: TaskId,
) -> Result<(), TaskServiceError> {
    let service = TaskService::with_clock(
        SqliteTaskStore::try_new(&conn).unwrap(),
        directory(),
        clock(),
    );
    barrier.wait();
    service.complete_task(actor, task_id).map(|_| ())
}

#[test]
fn concurrent_completions_of_one_task_apply_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roomies.sqlite3");
    let setup = open_db(&path).unwrap();
    let task_id = create_daily(&setup, &[1, 2, 3]);

    let options = DbOptions {
        busy_timeout: Duration::from_secs(10),
    };
    let first = open_db_with(&path, &options).unwrap();
    let second = open_db_with(&path, &options).unwrap();
    let barrier = Barrier::new(2);

    let results = thread::scope(|scope| {
        let a = scope.spawn(|| complete_after_barrier(first, &barrier, 1, task_id));
        let b = scope.spawn(|| complete_after_barrier(second, &barrier, 2, task_id));
        vec![a.join().unwrap(), b.join().unwrap()]
    });

    let successes = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(successes, 1);
    for result in &results {
        if let Err(err) = result {
            assert!(
                matches!(err, TaskServiceError::NotYetDue { .. }) || err.is_transient(),
                "unexpected error: {err}"
            );
        }
    }

    let logs: i64 = setup
        .query_row("SELECT COUNT(*) FROM task_logs;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(logs, 1);

    let positions: Vec<(i64, i64)> = {
        let mut stmt = setup
            .prepare(
                "SELECT user_id, position FROM task_responsibles
                 WHERE task_uuid = ?1 ORDER BY position;",
            )
            .unwrap();
        stmt.query_map([task_id.to_string()], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    };
    assert_eq!(positions, vec![(2, 1), (3, 2), (1, 3)]);
}

#[test]
fn completions_of_different_tasks_both_commit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roomies.sqlite3");
    let setup = open_db(&path).unwrap();
    let dishes = create_daily(&setup, &[1, 2]);
    let bins = create_daily(&setup, &[2, 3]);

    let options = DbOptions {
        busy_timeout: Duration::from_secs(10),
    };
    let first = open_db_with(&path, &options).unwrap();
    let second = open_db_with(&path, &options).unwrap();
    let barrier = Barrier::new(2);

    let results = thread::scope(|scope| {
        let a = scope.spawn(|| complete_after_barrier(first, &barrier, 1, dishes));
        let b = scope.spawn(|| complete_after_barrier(second, &barrier, 3, bins));
        vec![a.join().unwrap(), b.join().unwrap()]
    });

    assert!(results.iter().all(Result::is_ok), "{results:?}");
    let logs: i64 = setup
        .query_row("SELECT COUNT(*) FROM task_logs;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(logs, 2);
}

#[test]
fn busy_writer_lock_surfaces_as_transient() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roomies.sqlite3");
    let holder = open_db(&path).unwrap();
    let task_id = create_daily(&holder, &[1]);

    let impatient = open_db_with(
        &path,
        &DbOptions {
            busy_timeout: Duration::from_millis(50),
        },
    )
    .unwrap();
    let service = TaskService::with_clock(
        SqliteTaskStore::try_new(&impatient).unwrap(),
        directory(),
        clock(),
    );

    holder.execute_batch("BEGIN IMMEDIATE;").unwrap();
    let err = service.complete_task(1, task_id).unwrap_err();
    holder.execute_batch("ROLLBACK;").unwrap();

    assert!(matches!(err, TaskServiceError::Busy));
    assert_eq!(err.kind(), ErrorKind::Transient);
    service.complete_task(1, task_id).unwrap();
}
