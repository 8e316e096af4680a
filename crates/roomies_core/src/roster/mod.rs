//! Responsibility roster planning.
//!
//! # Responsibility
//! - Turn submitted member lists into ordered roster positions.
//! - Compute minimal reconciliation diffs and single-holder rotations.
//!
//! # Invariants
//! - Plans are pure; callers apply them inside one write transaction.
//! - Applying a plan to a valid roster yields positions `1..=N` with no
//!   duplicates or gaps.

pub mod plan;
