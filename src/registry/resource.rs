//! The shared resource id space.

use std::fmt;
use std::str::FromStr;

use rusqlite::{OptionalExtension, params};

use super::{ConfigDb, RegistryError, constraint_to_conflict};

/// Kind of a configurable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Layer,
    LayerGroup,
    DataSet,
    Map,
    Template,
    DataSource,
    BackgroundLayer,
}

impl ResourceKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Layer => "layer",
            Self::LayerGroup => "layer_group",
            Self::DataSet => "data_set",
            Self::Map => "map",
            Self::Template => "template",
            Self::DataSource => "data_source",
            Self::BackgroundLayer => "background_layer",
        }
    }

    /// Whether tree traversal descends into this resource's children.
    pub const fn is_group(self) -> bool {
        matches!(self, Self::LayerGroup)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "layer" => Ok(Self::Layer),
            "layer_group" => Ok(Self::LayerGroup),
            "data_set" => Ok(Self::DataSet),
            "map" => Ok(Self::Map),
            "template" => Ok(Self::Template),
            "data_source" => Ok(Self::DataSource),
            "background_layer" => Ok(Self::BackgroundLayer),
            other => Err(format!("unknown resource kind: {other}")),
        }
    }
}

/// A row of the shared resource table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub id: i64,
    pub kind: ResourceKind,
    pub name: String,
}

impl ConfigDb {
    /// Create a resource slot. Duplicate (kind, name) is a conflict.
    pub fn create_resource(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> Result<Resource, RegistryError> {
        self.conn()
            .execute(
                "INSERT INTO resources (kind, name) VALUES (?1, ?2)",
                params![kind.as_str(), name],
            )
            .map_err(|e| {
                constraint_to_conflict(e, &format!("{} '{}' already exists", kind, name))
            })?;

        Ok(Resource {
            id: self.conn().last_insert_rowid(),
            kind,
            name: name.to_string(),
        })
    }

    /// Look up a resource by id.
    pub fn resource(&self, id: i64) -> Result<Resource, RegistryError> {
        self.conn()
            .query_row(
                "SELECT id, kind, name FROM resources WHERE id = ?1",
                params![id],
                row_to_resource,
            )
            .optional()?
            .ok_or_else(|| RegistryError::NotFound(format!("resource {id}")))
    }

    /// Look up a resource by kind and name.
    pub fn find_resource(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> Result<Option<Resource>, RegistryError> {
        Ok(self
            .conn()
            .query_row(
                "SELECT id, kind, name FROM resources WHERE kind = ?1 AND name = ?2",
                params![kind.as_str(), name],
                row_to_resource,
            )
            .optional()?)
    }

    /// Look up a resource by name across all kinds (CLI convenience).
    pub fn find_resource_by_name(&self, name: &str) -> Result<Option<Resource>, RegistryError> {
        Ok(self
            .conn()
            .query_row(
                "SELECT id, kind, name FROM resources WHERE name = ?1 LIMIT 1",
                params![name],
                row_to_resource,
            )
            .optional()?)
    }

    /// All resources, ordered by kind then name.
    pub fn resources(&self) -> Result<Vec<Resource>, RegistryError> {
        let mut stmt = self
            .conn()
            .prepare("SELECT id, kind, name FROM resources ORDER BY kind, name")?;
        let rows = stmt
            .query_map([], row_to_resource)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Remove every registry row attached to a resource, then the resource
    /// itself, in one transaction.
    ///
    /// File cleanup belongs to the caller and must happen before this
    /// (documents are unreadable afterwards).
    pub fn purge_resource(&self, id: i64) -> Result<(), RegistryError> {
        let tx = self.conn().unchecked_transaction()?;

        tx.execute(
            "DELETE FROM resource_permissions WHERE resource_id = ?1",
            params![id],
        )?;
        tx.execute(
            "DELETE FROM resource_contacts WHERE resource_id = ?1",
            params![id],
        )?;
        tx.execute(
            "DELETE FROM tree_edges WHERE child_id = ?1 OR parent_id = ?1",
            params![id],
        )?;
        tx.execute(
            "DELETE FROM style_documents WHERE resource_id = ?1",
            params![id],
        )?;
        tx.execute(
            "DELETE FROM print_layouts WHERE resource_id = ?1",
            params![id],
        )?;
        let removed = tx.execute("DELETE FROM resources WHERE id = ?1", params![id])?;

        tx.commit()?;

        if removed == 0 {
            return Err(RegistryError::NotFound(format!("resource {id}")));
        }
        Ok(())
    }
}

fn row_to_resource(row: &rusqlite::Row<'_>) -> rusqlite::Result<Resource> {
    let kind: String = row.get(1)?;
    Ok(Resource {
        id: row.get(0)?,
        kind: kind.parse().map_err(|_| rusqlite::Error::InvalidQuery)?,
        name: row.get(2)?,
    })
}
