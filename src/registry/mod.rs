//! SQLite-backed resource graph registry.
//!
//! Every configurable entity (layer, layer group, data set, map, template,
//! data source) occupies a slot in one shared resource id space and can
//! carry three attachable facets: per-role permissions, one contact
//! assignment per role type, and membership edges in the published
//! service trees.
//!
//! The connection is plain and unshared; the core is single-threaded per
//! request and the commit/rollback boundary around each logical edit is
//! supplied here, one transaction per multi-statement method.

mod contact;
mod document;
mod permission;
mod principal;
mod resource;
mod sync;
mod tree;

pub use contact::{Contact, ContactKind};
pub use document::{Channel, LayoutRecord, StyleRecord};
pub use permission::Permission;
pub use resource::{Resource, ResourceKind};
pub use sync::{Membership, SyncOutcome};
pub use tree::{Protocol, SubLayer, TreeNode};

use std::path::Path;

use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Uniqueness violation, surfaced with the offending name.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Referenced row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Edge write would break the service-tree forest invariant.
    #[error("tree constraint violated: {0}")]
    TreeViolation(String),

    /// Member-of assignment would make the contact graph cyclic.
    #[error("contact cycle: {0}")]
    CyclicContact(String),
}

/// The configuration database.
pub struct ConfigDb {
    conn: Connection,
    public_role: String,
}

impl ConfigDb {
    /// Open or create the configuration database at `path`.
    ///
    /// `public_role` names the role whose permissions apply to anonymous
    /// viewers (lowest grant priority).
    pub fn open(path: impl AsRef<Path>, public_role: &str) -> Result<Self, RegistryError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(Self {
            conn,
            public_role: public_role.to_string(),
        })
    }

    /// Create an in-memory database (tests).
    pub fn in_memory(public_role: &str) -> Result<Self, RegistryError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(Self {
            conn,
            public_role: public_role.to_string(),
        })
    }

    /// Configured public role name.
    pub fn public_role(&self) -> &str {
        &self.public_role
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Convert a SQLite constraint failure into a `Conflict` naming `what`.
pub(crate) fn constraint_to_conflict(e: rusqlite::Error, what: &str) -> RegistryError {
    match &e {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            RegistryError::Conflict(what.to_string())
        }
        _ => RegistryError::Database(e),
    }
}
