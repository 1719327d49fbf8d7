//! Published service trees.
//!
//! Each protocol (WMS, WFS) owns one distinguished root layer group; the
//! ordered tree edges below it form the advertised layer tree. The same
//! resource may sit in both protocol trees, but within one tree it has at
//! most one parent and the edge graph stays acyclic — both verified when
//! edges are written, so traversal never needs a cycle guard.

use std::fmt;
use std::str::FromStr;

use rusqlite::{OptionalExtension, params};
use rustc_hash::{FxHashMap, FxHashSet};

use super::{ConfigDb, RegistryError, ResourceKind};

/// Published protocol, one root tree each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Wms,
    Wfs,
}

impl Protocol {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Wms => "wms",
            Self::Wfs => "wfs",
        }
    }

    /// Name of the root layer-group resource.
    const fn root_name(self) -> &'static str {
        match self {
            Self::Wms => "wms_root",
            Self::Wfs => "wfs_root",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wms" => Ok(Self::Wms),
            "wfs" => Ok(Self::Wfs),
            other => Err(format!("unknown protocol: {other}")),
        }
    }
}

/// Submitted sub-layer row for the ordered group sync.
#[derive(Debug, Clone, Copy)]
pub struct SubLayer {
    pub child_id: i64,
    pub position: i64,
    pub active: bool,
}

/// One node of a rendered tree listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub id: i64,
    pub name: String,
    pub kind: ResourceKind,
    pub depth: usize,
    pub active: bool,
}

impl ConfigDb {
    /// Create the root layer group of a protocol if missing.
    pub fn ensure_service_root(&self, protocol: Protocol) -> Result<i64, RegistryError> {
        if let Some(root) = self.service_root(protocol)? {
            return Ok(root);
        }

        let root = match self.find_resource(ResourceKind::LayerGroup, protocol.root_name())? {
            Some(resource) => resource,
            None => self.create_resource(ResourceKind::LayerGroup, protocol.root_name())?,
        };
        self.conn().execute(
            "INSERT INTO service_roots (protocol, root_id) VALUES (?1, ?2)",
            params![protocol.as_str(), root.id],
        )?;
        Ok(root.id)
    }

    /// Root resource id of a protocol tree, if initialized.
    pub fn service_root(&self, protocol: Protocol) -> Result<Option<i64>, RegistryError> {
        Ok(self
            .conn()
            .query_row(
                "SELECT root_id FROM service_roots WHERE protocol = ?1",
                params![protocol.as_str()],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Attach a resource as an immediate member of a protocol root.
    ///
    /// Already-attached is a no-op; new members are appended at the end
    /// and start out active.
    pub fn attach(&self, child_id: i64, protocol: Protocol) -> Result<(), RegistryError> {
        let root = self.require_root(protocol)?;
        if self.edge_id(root, child_id)?.is_some() {
            return Ok(());
        }

        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM tree_edges WHERE parent_id = ?1",
            params![root],
            |row| row.get(0),
        )?;
        self.insert_edge(root, child_id, count, true)
    }

    /// Detach a resource from a protocol root. Absent edge is a no-op.
    pub fn detach(&self, child_id: i64, protocol: Protocol) -> Result<(), RegistryError> {
        let root = self.require_root(protocol)?;
        self.conn().execute(
            "DELETE FROM tree_edges WHERE parent_id = ?1 AND child_id = ?2",
            params![root, child_id],
        )?;
        Ok(())
    }

    /// Whether a resource is an immediate member of a protocol root.
    pub fn is_attached(&self, child_id: i64, protocol: Protocol) -> Result<bool, RegistryError> {
        let root = self.require_root(protocol)?;
        Ok(self.edge_id(root, child_id)?.is_some())
    }

    /// Insert a tree edge after verifying the forest invariant.
    pub fn insert_edge(
        &self,
        parent_id: i64,
        child_id: i64,
        position: i64,
        active: bool,
    ) -> Result<(), RegistryError> {
        self.check_forest_invariant(parent_id, child_id)?;
        self.conn()
            .execute(
                "INSERT INTO tree_edges (parent_id, child_id, position, active)
                 VALUES (?1, ?2, ?3, ?4)",
                params![parent_id, child_id, position, active],
            )
            .map_err(|e| {
                super::constraint_to_conflict(
                    e,
                    &format!("edge ({parent_id}, {child_id}) already exists"),
                )
            })?;
        Ok(())
    }

    /// Ordered sub-layer sync for a layer group.
    ///
    /// Updates existing edges in place, inserts new ones (through the
    /// invariant check) and deletes edges for children no longer listed.
    pub fn sync_sub_layers(
        &self,
        group_id: i64,
        entries: &[SubLayer],
    ) -> Result<(), RegistryError> {
        let mut current: FxHashMap<i64, i64> = FxHashMap::default();
        {
            let mut stmt = self
                .conn()
                .prepare("SELECT child_id, id FROM tree_edges WHERE parent_id = ?1")?;
            let rows = stmt.query_map(params![group_id], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (child, edge) = row?;
                current.insert(child, edge);
            }
        }

        let mut submitted: FxHashSet<i64> = FxHashSet::default();
        for entry in entries {
            submitted.insert(entry.child_id);
            match current.get(&entry.child_id) {
                Some(edge) => {
                    self.conn().execute(
                        "UPDATE tree_edges SET position = ?2, active = ?3 WHERE id = ?1",
                        params![edge, entry.position, entry.active],
                    )?;
                }
                None => {
                    self.insert_edge(group_id, entry.child_id, entry.position, entry.active)?;
                }
            }
        }

        for (child, edge) in &current {
            if !submitted.contains(child) {
                self.conn()
                    .execute("DELETE FROM tree_edges WHERE id = ?1", params![edge])?;
            }
        }
        Ok(())
    }

    /// Depth-first listing of a protocol tree, children ordered by
    /// position. The root itself is not included.
    pub fn collect_layers(&self, protocol: Protocol) -> Result<Vec<TreeNode>, RegistryError> {
        let root = self.require_root(protocol)?;
        let mut nodes = Vec::new();
        self.collect_children(root, 0, &mut nodes)?;
        Ok(nodes)
    }

    fn collect_children(
        &self,
        parent_id: i64,
        depth: usize,
        out: &mut Vec<TreeNode>,
    ) -> Result<(), RegistryError> {
        let mut stmt = self.conn().prepare(
            "SELECT r.id, r.name, r.kind, e.active
             FROM tree_edges e JOIN resources r ON r.id = e.child_id
             WHERE e.parent_id = ?1
             ORDER BY e.position, e.id",
        )?;
        let children = stmt
            .query_map(params![parent_id], |row| {
                let kind: String = row.get(2)?;
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    kind,
                    row.get::<_, bool>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        for (id, name, kind, active) in children {
            let kind: ResourceKind = kind
                .parse()
                .map_err(|_| RegistryError::NotFound(format!("resource {id}")))?;
            out.push(TreeNode {
                id,
                name,
                kind,
                depth,
                active,
            });
            if kind.is_group() {
                self.collect_children(id, depth + 1, out)?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Forest invariant
    // ------------------------------------------------------------------

    /// Verify that adding (parent, child) keeps the edge graph a forest:
    /// no self-edge, no cycle, and at most one parent per protocol tree.
    fn check_forest_invariant(&self, parent_id: i64, child_id: i64) -> Result<(), RegistryError> {
        if parent_id == child_id {
            return Err(RegistryError::TreeViolation(format!(
                "resource {child_id} cannot contain itself"
            )));
        }

        // cycle check: child must not already be an ancestor of parent
        let parent_ancestors = self.ancestors_of(parent_id)?;
        if parent_ancestors.contains(&child_id) {
            return Err(RegistryError::TreeViolation(format!(
                "resource {child_id} is an ancestor of {parent_id}"
            )));
        }

        // single parent per protocol tree: if the new parent sits in a
        // protocol tree, the child must not already hang somewhere else
        // in that same tree
        let roots = self.protocol_roots()?;
        let new_roots: FxHashSet<i64> = parent_ancestors
            .iter()
            .copied()
            .chain([parent_id])
            .filter(|id| roots.contains(id))
            .collect();
        if new_roots.is_empty() {
            return Ok(());
        }

        let mut stmt = self
            .conn()
            .prepare("SELECT parent_id FROM tree_edges WHERE child_id = ?1")?;
        let existing_parents = stmt
            .query_map(params![child_id], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        for existing in existing_parents {
            let mut tree_of_existing = self.ancestors_of(existing)?;
            tree_of_existing.push(existing);
            if tree_of_existing.iter().any(|id| new_roots.contains(id)) {
                return Err(RegistryError::TreeViolation(format!(
                    "resource {child_id} already has a parent in this tree"
                )));
            }
        }
        Ok(())
    }

    /// All transitive ancestors of a resource (across every tree).
    fn ancestors_of(&self, id: i64) -> Result<Vec<i64>, RegistryError> {
        let mut seen: FxHashSet<i64> = FxHashSet::default();
        let mut queue = vec![id];
        let mut out = Vec::new();

        let mut stmt = self
            .conn()
            .prepare("SELECT parent_id FROM tree_edges WHERE child_id = ?1")?;

        while let Some(current) = queue.pop() {
            let parents = stmt
                .query_map(params![current], |row| row.get::<_, i64>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            for parent in parents {
                if seen.insert(parent) {
                    out.push(parent);
                    queue.push(parent);
                }
            }
        }
        Ok(out)
    }

    fn protocol_roots(&self) -> Result<FxHashSet<i64>, RegistryError> {
        let mut stmt = self.conn().prepare("SELECT root_id FROM service_roots")?;
        let roots = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<Result<FxHashSet<_>, _>>()?;
        Ok(roots)
    }

    fn require_root(&self, protocol: Protocol) -> Result<i64, RegistryError> {
        self.service_root(protocol)?
            .ok_or_else(|| RegistryError::NotFound(format!("{protocol} root (run init)")))
    }

    fn edge_id(&self, parent_id: i64, child_id: i64) -> Result<Option<i64>, RegistryError> {
        Ok(self
            .conn()
            .query_row(
                "SELECT id FROM tree_edges WHERE parent_id = ?1 AND child_id = ?2",
                params![parent_id, child_id],
                |row| row.get(0),
            )
            .optional()?)
    }
}
