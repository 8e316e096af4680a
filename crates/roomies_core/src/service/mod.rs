//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate the task lifecycle: create, update, complete, delete.
//! - Enforce household authorization and state-machine invariants.
//! - Serve read models for tasks and the completion log.
//!
//! # Invariants
//! - Every mutation runs inside one `TaskStore::write` scope, so log,
//!   due-date and roster effects commit together or not at all.
//! - Preconditions are evaluated after the task is locked.

pub mod completion_log;
pub mod error;
pub mod task_service;
