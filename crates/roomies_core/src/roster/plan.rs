//! Pure roster plans.
//!
//! A plan describes the writes needed to move a roster from its current
//! state to a target state. Storage adapters apply it as removals first,
//! then position moves, then inserts.

use crate::model::member::UserId;
use crate::model::task::ResponsibleEntry;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Target position for one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionChange {
    pub user_id: UserId,
    pub position: u32,
}

/// Errors from roster planning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterError {
    /// No responsible member remains after deduplication.
    Empty,
}

impl Display for RosterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "at least one responsible member is required"),
        }
    }
}

impl Error for RosterError {}

/// Minimal write set that reconciles a roster with a submitted member list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterPlan {
    /// Members absent from the submitted list.
    pub removals: Vec<UserId>,
    /// Members kept whose position changed.
    pub moves: Vec<PositionChange>,
    /// Members new to the roster.
    pub inserts: Vec<PositionChange>,
}

impl RosterPlan {
    /// Returns whether applying this plan performs no writes.
    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.moves.is_empty() && self.inserts.is_empty()
    }

    /// Number of row writes this plan performs.
    pub fn write_count(&self) -> usize {
        self.removals.len() + self.moves.len() + self.inserts.len()
    }
}

/// Deduplicates member ids, keeping the first occurrence of each.
pub fn dedupe(user_ids: &[UserId]) -> Vec<UserId> {
    let mut seen = HashSet::with_capacity(user_ids.len());
    user_ids
        .iter()
        .copied()
        .filter(|user_id| seen.insert(*user_id))
        .collect()
}

/// Materializes positions `1..=N` for an initial roster.
///
/// # Errors
/// - `Empty` when `user_ids` is empty after deduplication.
pub fn plan_assign(user_ids: &[UserId]) -> Result<Vec<PositionChange>, RosterError> {
    let ordered = dedupe(user_ids);
    if ordered.is_empty() {
        return Err(RosterError::Empty);
    }
    Ok(numbered(&ordered))
}

/// Computes the minimal diff from `current` to the submitted order.
///
/// Members present in both keep their row and are only moved when their
/// position differs. Reconciling twice with the same input yields an empty
/// plan the second time.
///
/// # Errors
/// - `Empty` when `user_ids` is empty after deduplication.
pub fn plan_reconcile(
    current: &[ResponsibleEntry],
    user_ids: &[UserId],
) -> Result<RosterPlan, RosterError> {
    let target = plan_assign(user_ids)?;
    let current_positions: HashMap<UserId, u32> = current
        .iter()
        .map(|entry| (entry.user_id, entry.position))
        .collect();
    let target_members: HashSet<UserId> = target.iter().map(|change| change.user_id).collect();

    let mut plan = RosterPlan {
        removals: current
            .iter()
            .map(|entry| entry.user_id)
            .filter(|user_id| !target_members.contains(user_id))
            .collect(),
        ..RosterPlan::default()
    };

    for change in target {
        match current_positions.get(&change.user_id) {
            Some(position) if *position == change.position => {}
            Some(_) => plan.moves.push(change),
            None => plan.inserts.push(change),
        }
    }

    Ok(plan)
}

/// Computes the single-holder rotation: position 1 moves to the back and
/// everyone else advances by one.
///
/// Returns no changes for rosters with fewer than two members.
pub fn plan_rotation(current: &[ResponsibleEntry]) -> Vec<PositionChange> {
    let count = current.len() as u32;
    if count < 2 {
        return Vec::new();
    }

    let mut ordered: Vec<&ResponsibleEntry> = current.iter().collect();
    ordered.sort_by_key(|entry| entry.position);
    ordered
        .into_iter()
        .map(|entry| PositionChange {
            user_id: entry.user_id,
            position: if entry.position == 1 {
                count
            } else {
                entry.position - 1
            },
        })
        .collect()
}

/// Returns whether roster positions form exactly `1..=N`.
pub fn is_contiguous(entries: &[ResponsibleEntry]) -> bool {
    let mut positions: Vec<u32> = entries.iter().map(|entry| entry.position).collect();
    positions.sort_unstable();
    positions
        .iter()
        .enumerate()
        .all(|(index, position)| *position as usize == index + 1)
}

fn numbered(user_ids: &[UserId]) -> Vec<PositionChange> {
    user_ids
        .iter()
        .enumerate()
        .map(|(index, user_id)| PositionChange {
            user_id: *user_id,
            position: index as u32 + 1,
        })
        .collect()
}
