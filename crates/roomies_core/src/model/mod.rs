//! Domain model for recurring household tasks.
//!
//! # Responsibility
//! - Define canonical task, roster, completion-log and member records.
//! - Keep ownership flat: roster and log rows reference a task by id.
//!
//! # Invariants
//! - Every task is identified by a stable `TaskId`.
//! - `next_due` is `None` only for a completed `Frequency::Once` task.
//! - Roster positions of one task form the permutation `1..=N`.

pub mod log;
pub mod member;
pub mod task;
