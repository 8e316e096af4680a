//! Household membership port.
//!
//! # Responsibility
//! - Answer "which household does this user belong to" for authorization.
//! - Resolve display names for roster and log read models.
//!
//! # Invariants
//! - The engine never mutates membership through this port; the SQLite
//!   adapter's `upsert_member` exists for the membership system to sync.

pub mod directory;
