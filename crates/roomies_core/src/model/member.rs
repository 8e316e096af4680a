//! Household member projection.
//!
//! Membership is owned by an external collaborator; the engine only reads
//! the fields it needs for authorization and display.

use serde::{Deserialize, Serialize};

/// Identifier issued by the identity layer.
pub type UserId = i64;

/// Identifier issued by the household membership layer.
pub type HouseholdId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: UserId,
    /// `None` when the user has not joined any household.
    pub household_id: Option<HouseholdId>,
    pub display_name: String,
}

impl Member {
    pub fn belongs_to(&self, household_id: HouseholdId) -> bool {
        self.household_id == Some(household_id)
    }
}
