//! Diff-based membership sync.
//!
//! A submitted target list fully replaces the current membership of an
//! owner row: missing members are added, absent ones removed, and ids
//! that do not exist in the member table are skipped without error
//! (stale form submissions are routine, not exceptional).

use rusqlite::params;
use rustc_hash::FxHashSet;

use super::{ConfigDb, RegistryError};
use crate::debug;

/// Which many-to-many relation to sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// Users of a group.
    GroupUsers,
    /// Roles of a group.
    GroupRoles,
    /// Users of a role.
    RoleUsers,
}

impl Membership {
    const fn join_table(self) -> &'static str {
        match self {
            Self::GroupUsers => "group_users",
            Self::GroupRoles => "group_roles",
            Self::RoleUsers => "role_users",
        }
    }

    const fn owner_column(self) -> &'static str {
        match self {
            Self::GroupUsers | Self::GroupRoles => "group_id",
            Self::RoleUsers => "role_id",
        }
    }

    const fn member_column(self) -> &'static str {
        match self {
            Self::GroupUsers | Self::RoleUsers => "user_id",
            Self::GroupRoles => "role_id",
        }
    }

    const fn member_table(self) -> &'static str {
        match self {
            Self::GroupUsers | Self::RoleUsers => "users",
            Self::GroupRoles => "roles",
        }
    }
}

/// What a sync actually changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub added: usize,
    pub removed: usize,
    pub skipped: usize,
}

impl ConfigDb {
    /// Replace the membership of `owner_id` with `target` ids.
    pub fn sync_membership(
        &self,
        membership: Membership,
        owner_id: i64,
        target: &[i64],
    ) -> Result<SyncOutcome, RegistryError> {
        let join = membership.join_table();
        let owner_col = membership.owner_column();
        let member_col = membership.member_column();

        let current: FxHashSet<i64> = {
            let mut stmt = self.conn().prepare(&format!(
                "SELECT {member_col} FROM {join} WHERE {owner_col} = ?1"
            ))?;
            stmt.query_map(params![owner_id], |row| row.get(0))?
                .collect::<Result<FxHashSet<_>, _>>()?
        };

        let mut outcome = SyncOutcome::default();
        let mut submitted: FxHashSet<i64> = FxHashSet::default();

        for &member in target {
            if !submitted.insert(member) {
                continue;
            }
            if current.contains(&member) {
                continue;
            }
            if !self.member_exists(membership, member)? {
                debug!("sync"; "skipping unknown id {} for {}", member, join);
                outcome.skipped += 1;
                continue;
            }
            self.conn().execute(
                &format!("INSERT INTO {join} ({owner_col}, {member_col}) VALUES (?1, ?2)"),
                params![owner_id, member],
            )?;
            outcome.added += 1;
        }

        for &member in &current {
            if !submitted.contains(&member) {
                self.conn().execute(
                    &format!("DELETE FROM {join} WHERE {owner_col} = ?1 AND {member_col} = ?2"),
                    params![owner_id, member],
                )?;
                outcome.removed += 1;
            }
        }

        Ok(outcome)
    }

    /// Current member ids of an owner, sorted.
    pub fn membership(
        &self,
        membership: Membership,
        owner_id: i64,
    ) -> Result<Vec<i64>, RegistryError> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {} FROM {} WHERE {} = ?1 ORDER BY 1",
            membership.member_column(),
            membership.join_table(),
            membership.owner_column(),
        ))?;
        let rows = stmt
            .query_map(params![owner_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn member_exists(&self, membership: Membership, id: i64) -> Result<bool, RegistryError> {
        let count: i64 = self.conn().query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE id = ?1", membership.member_table()),
            params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
