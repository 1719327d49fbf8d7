//! Roles, users and groups.

use rusqlite::{OptionalExtension, params};

use super::{ConfigDb, RegistryError, constraint_to_conflict};

impl ConfigDb {
    /// Create a role. Duplicate names conflict.
    pub fn create_role(&self, name: &str) -> Result<i64, RegistryError> {
        self.insert_principal("roles", name)
    }

    /// Create a user.
    pub fn create_user(&self, name: &str) -> Result<i64, RegistryError> {
        self.insert_principal("users", name)
    }

    /// Create a group.
    pub fn create_group(&self, name: &str) -> Result<i64, RegistryError> {
        self.insert_principal("groups", name)
    }

    /// Role id by name.
    pub fn role_id(&self, name: &str) -> Result<Option<i64>, RegistryError> {
        Ok(self
            .conn()
            .query_row(
                "SELECT id FROM roles WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Create the configured public role if it does not exist yet.
    pub fn ensure_public_role(&self) -> Result<i64, RegistryError> {
        let name = self.public_role().to_string();
        if let Some(id) = self.role_id(&name)? {
            return Ok(id);
        }
        self.create_role(&name)
    }

    fn insert_principal(&self, table: &str, name: &str) -> Result<i64, RegistryError> {
        self.conn()
            .execute(
                &format!("INSERT INTO {table} (name) VALUES (?1)"),
                params![name],
            )
            .map_err(|e| constraint_to_conflict(e, &format!("'{name}' already exists")))?;
        Ok(self.conn().last_insert_rowid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::testutil::db;

    #[test]
    fn test_create_and_find_role() {
        let db = db();
        let id = db.create_role("editors").unwrap();
        assert_eq!(db.role_id("editors").unwrap(), Some(id));
        assert_eq!(db.role_id("missing").unwrap(), None);
        assert!(matches!(
            db.create_role("editors"),
            Err(RegistryError::Conflict(_))
        ));
    }

    #[test]
    fn test_ensure_public_role_is_idempotent() {
        let db = db();
        let first = db.ensure_public_role().unwrap();
        let second = db.ensure_public_role().unwrap();
        assert_eq!(first, second);
    }
}
