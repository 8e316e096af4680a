//! Storage ports and SQLite adapters.
//!
//! # Responsibility
//! - Define the task storage contracts the lifecycle service depends on.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Every mutation runs inside `TaskStore::write`, which is all-or-nothing.
//! - Read paths observe committed state only.
//! - Repository APIs return semantic errors (`NotFound`, `Busy`) in
//!   addition to DB transport errors.

pub mod task_repo;
