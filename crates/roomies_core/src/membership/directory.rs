//! Membership directory contract and adapters.

use crate::model::member::{HouseholdId, Member, UserId};
use crate::repo::task_repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;

/// Read access to household membership owned by an external collaborator.
pub trait MembershipDirectory {
    /// Loads one member, or `None` for an unknown user id.
    fn member(&self, user_id: UserId) -> RepoResult<Option<Member>>;

    /// Returns whether `user_id` currently belongs to `household_id`.
    fn same_household(&self, user_id: UserId, household_id: HouseholdId) -> RepoResult<bool> {
        Ok(self
            .member(user_id)?
            .is_some_and(|member| member.belongs_to(household_id)))
    }

    /// Returns the display name of a known user.
    fn display_name(&self, user_id: UserId) -> RepoResult<Option<String>> {
        Ok(self.member(user_id)?.map(|member| member.display_name))
    }
}

impl<T: MembershipDirectory + ?Sized> MembershipDirectory for &T {
    fn member(&self, user_id: UserId) -> RepoResult<Option<Member>> {
        (**self).member(user_id)
    }
}

/// Hash-map directory for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    members: HashMap<UserId, Member>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces one member.
    pub fn insert(
        &mut self,
        user_id: UserId,
        household_id: Option<HouseholdId>,
        display_name: impl Into<String>,
    ) {
        self.members.insert(
            user_id,
            Member {
                user_id,
                household_id,
                display_name: display_name.into(),
            },
        );
    }

    /// Builder form of [`InMemoryDirectory::insert`].
    pub fn with_member(
        mut self,
        user_id: UserId,
        household_id: Option<HouseholdId>,
        display_name: impl Into<String>,
    ) -> Self {
        self.insert(user_id, household_id, display_name);
        self
    }
}

impl MembershipDirectory for InMemoryDirectory {
    fn member(&self, user_id: UserId) -> RepoResult<Option<Member>> {
        Ok(self.members.get(&user_id).cloned())
    }
}

/// Directory backed by the local `members` projection table.
pub struct SqliteMembershipDirectory<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMembershipDirectory<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Inserts or refreshes one member row.
    pub fn upsert_member(&self, member: &Member) -> RepoResult<()> {
        if member.display_name.trim().is_empty() {
            return Err(RepoError::InvalidData(format!(
                "member {} has a blank display name",
                member.user_id
            )));
        }

        self.conn.execute(
            "INSERT INTO members (user_id, household_id, display_name)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (user_id) DO UPDATE SET
                household_id = excluded.household_id,
                display_name = excluded.display_name;",
            params![
                member.user_id,
                member.household_id,
                member.display_name.as_str()
            ],
        )?;
        Ok(())
    }
}

impl MembershipDirectory for SqliteMembershipDirectory<'_> {
    fn member(&self, user_id: UserId) -> RepoResult<Option<Member>> {
        let member = self
            .conn
            .query_row(
                "SELECT user_id, household_id, display_name
                 FROM members
                 WHERE user_id = ?1;",
                [user_id],
                |row| {
                    Ok(Member {
                        user_id: row.get("user_id")?,
                        household_id: row.get("household_id")?,
                        display_name: row.get("display_name")?,
                    })
                },
            )
            .optional()?;
        Ok(member)
    }
}
