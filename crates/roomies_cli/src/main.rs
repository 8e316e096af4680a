//! `roomies` command-line entry point.
//!
//! # Responsibility
//! - Expose health checks and a thin operator surface over `roomies_core`.
//! - Read database and logging configuration from the environment.

use clap::{Parser, Subcommand};
use log::info;
use roomies_core::db::{open_db, DbError};
use roomies_core::{
    default_log_level, init_logging, LogEntryView, RepoError, SqliteMembershipDirectory,
    SqliteTaskStore, TaskDetail, TaskId, TaskService, TaskServiceError, UserId,
};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use time::format_description::well_known::Rfc3339;

const DB_ENV: &str = "ROOMIES_DB";
const LOG_LEVEL_ENV: &str = "ROOMIES_LOG_LEVEL";
const LOG_DIR_ENV: &str = "ROOMIES_LOG_DIR";

#[derive(Parser, Debug)]
#[command(name = "roomies", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the engine links
    Ping,
    /// Print the engine version
    Version,
    /// List the household tasks visible to a member
    ///
    /// Example: roomies tasks 1
    Tasks { actor: UserId },
    /// List recent completions in a member's household
    ///
    /// Example: roomies logs 1 0 20
    Logs {
        actor: UserId,
        #[arg(default_value_t = 0)]
        page: i64,
        #[arg(default_value_t = 20)]
        size: i64,
    },
    /// Record a completion of a task
    ///
    /// Example: roomies complete 5f0c... 1
    Complete { task_id: TaskId, actor: UserId },
}

#[derive(Debug)]
enum CliError {
    MissingEnv(&'static str),
    Logging(String),
    Db(DbError),
    Repo(RepoError),
    Service(TaskServiceError),
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingEnv(name) => write!(f, "environment variable {name} is not set"),
            Self::Logging(message) => write!(f, "logging setup failed: {message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Service(err) => write!(f, "{} ({})", err, err.code()),
        }
    }
}

impl Error for CliError {}

impl From<DbError> for CliError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for CliError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<TaskServiceError> for CliError {
    fn from(value: TaskServiceError) -> Self {
        Self::Service(value)
    }
}

fn setup_logging() -> Result<(), CliError> {
    let Ok(log_dir) = std::env::var(LOG_DIR_ENV) else {
        return Ok(());
    };
    let level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| default_log_level().to_string());
    init_logging(&level, &log_dir).map_err(CliError::Logging)
}

fn open_from_env() -> Result<Connection, CliError> {
    let path = std::env::var(DB_ENV).map_err(|_| CliError::MissingEnv(DB_ENV))?;
    Ok(open_db(path)?)
}

fn format_instant(value: time::OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_else(|_| value.to_string())
}

fn print_task(task: &TaskDetail) {
    let due = task
        .next_due
        .map_or_else(|| "done".to_string(), |due| due.date().to_string());
    let roster = task
        .responsibles
        .iter()
        .map(|entry| {
            let name = entry.display_name.as_deref().unwrap_or("?");
            format!("{}:{}", entry.position, name)
        })
        .collect::<Vec<_>>()
        .join(",");
    println!(
        "{} | {} | {} | {} | {} | {}",
        task.task_id,
        task.description,
        task.frequency.as_str(),
        task.rotation.as_str(),
        due,
        roster
    );
}

fn print_log(entry: &LogEntryView) {
    let name = entry.completed_by_name.as_deref().unwrap_or("?");
    println!(
        "{} | {} | {} | {} ({})",
        format_instant(entry.completed_at),
        entry.task_id,
        entry.task_description,
        name,
        entry.completed_by
    );
}

fn run_command(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Ping => println!("roomies_core ping={}", roomies_core::ping()),
        Command::Version => println!("roomies_core version={}", roomies_core::core_version()),
        Command::Tasks { actor } => {
            let conn = open_from_env()?;
            let service = TaskService::new(
                SqliteTaskStore::try_new(&conn)?,
                SqliteMembershipDirectory::new(&conn),
            );
            for task in service.list_tasks(actor)? {
                print_task(&task);
            }
        }
        Command::Logs { actor, page, size } => {
            let conn = open_from_env()?;
            let service = TaskService::new(
                SqliteTaskStore::try_new(&conn)?,
                SqliteMembershipDirectory::new(&conn),
            );
            for entry in service.list_completion_logs(actor, page, size)? {
                print_log(&entry);
            }
        }
        Command::Complete { task_id, actor } => {
            let conn = open_from_env()?;
            let service = TaskService::new(
                SqliteTaskStore::try_new(&conn)?,
                SqliteMembershipDirectory::new(&conn),
            );
            let completion = service.complete_task(actor, task_id)?;
            let next_due = completion
                .next_due
                .map_or_else(|| "done".to_string(), |due| due.date().to_string());
            let on_duty = completion
                .on_duty
                .map_or_else(|| "-".to_string(), |user_id| user_id.to_string());
            println!(
                "Completed task: {} log={} next_due={} on_duty={}",
                task_id, completion.log.log_id, next_due, on_duty
            );
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = setup_logging() {
        eprintln!("ERROR: {err}");
        std::process::exit(1);
    }
    info!("event=cli_start module=cli status=ok command={:?}", cli.command);

    if let Err(err) = run_command(cli) {
        eprintln!("ERROR: {err}");
        std::process::exit(1);
    }
}
