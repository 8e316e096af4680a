//! Due-date computation for recurring tasks.
//!
//! # Responsibility
//! - Map a start date to the first due timestamp.
//! - Advance a due timestamp by one recurrence step.
//!
//! # Invariants
//! - Pure and deterministic: no clock reads, no I/O.
//! - Every recurring step strictly increases the due timestamp.

pub mod calculator;
