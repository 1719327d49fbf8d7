//! Per-role resource permissions.
//!
//! Absence of a row means no access: revoking read deletes the row
//! instead of storing an explicit "false". The public role's grants get
//! priority 0, every other role priority 1; downstream renderers use the
//! priority to resolve conflicting grants, this module only assigns it.

use rusqlite::{OptionalExtension, params};

use super::{ConfigDb, RegistryError};

/// One permission row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission {
    pub role_id: i64,
    pub role_name: String,
    pub write: bool,
    pub priority: i64,
}

impl ConfigDb {
    /// Add, update or remove the permission of one role on one resource.
    ///
    /// `read == false` deletes any existing row (write is then
    /// meaningless, so a write-only row can never come into existence).
    pub fn set_permission(
        &self,
        resource_id: i64,
        role_id: i64,
        read: bool,
        write: bool,
    ) -> Result<(), RegistryError> {
        if !read {
            self.conn().execute(
                "DELETE FROM resource_permissions WHERE resource_id = ?1 AND role_id = ?2",
                params![resource_id, role_id],
            )?;
            return Ok(());
        }

        let priority = if self.is_public_role(role_id)? { 0 } else { 1 };

        self.conn().execute(
            "INSERT INTO resource_permissions (resource_id, role_id, write, priority)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (resource_id, role_id)
             DO UPDATE SET write = excluded.write, priority = excluded.priority",
            params![resource_id, role_id, write, priority],
        )?;
        Ok(())
    }

    /// Permissions of a resource, ordered by role name.
    pub fn permissions(&self, resource_id: i64) -> Result<Vec<Permission>, RegistryError> {
        let mut stmt = self.conn().prepare(
            "SELECT p.role_id, r.name, p.write, p.priority
             FROM resource_permissions p JOIN roles r ON r.id = p.role_id
             WHERE p.resource_id = ?1
             ORDER BY r.name",
        )?;
        let rows = stmt
            .query_map(params![resource_id], |row| {
                Ok(Permission {
                    role_id: row.get(0)?,
                    role_name: row.get(1)?,
                    write: row.get(2)?,
                    priority: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Delete every permission row of a resource (resource destruction).
    pub fn remove_all_permissions(&self, resource_id: i64) -> Result<(), RegistryError> {
        self.conn().execute(
            "DELETE FROM resource_permissions WHERE resource_id = ?1",
            params![resource_id],
        )?;
        Ok(())
    }

    fn is_public_role(&self, role_id: i64) -> Result<bool, RegistryError> {
        let name: Option<String> = self
            .conn()
            .query_row(
                "SELECT name FROM roles WHERE id = ?1",
                params![role_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name.as_deref() == Some(self.public_role()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ResourceKind;
    use crate::registry::testutil::db;

    #[test]
    fn test_grant_update_revoke() {
        let db = db();
        let layer = db.create_resource(ResourceKind::Layer, "rivers").unwrap();
        let role = db.create_role("editors").unwrap();

        db.set_permission(layer.id, role, true, false).unwrap();
        let perms = db.permissions(layer.id).unwrap();
        assert_eq!(perms.len(), 1);
        assert!(!perms[0].write);
        assert_eq!(perms[0].priority, 1);

        // upgrade to write keeps a single row
        db.set_permission(layer.id, role, true, true).unwrap();
        let perms = db.permissions(layer.id).unwrap();
        assert_eq!(perms.len(), 1);
        assert!(perms[0].write);

        // revoking read deletes the row
        db.set_permission(layer.id, role, false, false).unwrap();
        assert!(db.permissions(layer.id).unwrap().is_empty());
    }

    #[test]
    fn test_no_write_only_row() {
        let db = db();
        let layer = db.create_resource(ResourceKind::Layer, "rivers").unwrap();
        let role = db.create_role("editors").unwrap();

        db.set_permission(layer.id, role, false, true).unwrap();
        assert!(db.permissions(layer.id).unwrap().is_empty());
    }

    #[test]
    fn test_public_role_priority() {
        let db = db();
        let layer = db.create_resource(ResourceKind::Layer, "rivers").unwrap();
        let public = db.ensure_public_role().unwrap();
        let editors = db.create_role("editors").unwrap();

        db.set_permission(layer.id, public, true, false).unwrap();
        db.set_permission(layer.id, editors, true, false).unwrap();

        let perms = db.permissions(layer.id).unwrap();
        let by_name = |name: &str| perms.iter().find(|p| p.role_name == name).unwrap();
        assert_eq!(by_name("public").priority, 0);
        assert_eq!(by_name("editors").priority, 1);
    }

    #[test]
    fn test_remove_all() {
        let db = db();
        let layer = db.create_resource(ResourceKind::Layer, "rivers").unwrap();
        let a = db.create_role("a").unwrap();
        let b = db.create_role("b").unwrap();
        db.set_permission(layer.id, a, true, false).unwrap();
        db.set_permission(layer.id, b, true, true).unwrap();

        db.remove_all_permissions(layer.id).unwrap();
        assert!(db.permissions(layer.id).unwrap().is_empty());
    }
}
