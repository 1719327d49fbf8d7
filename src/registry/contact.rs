//! Contacts and responsible-party assignments.
//!
//! A contact is a person or an organisation; at most one member-of edge
//! links it into an organisation, and the member-of graph stays acyclic.
//! Role types ("responsible", "data owner", ...) are created on first
//! use. Each resource holds at most one contact per role type.

use std::fmt;
use std::str::FromStr;

use rusqlite::{OptionalExtension, params};

use super::{ConfigDb, RegistryError};
use crate::log;

/// Person or organisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactKind {
    Person,
    Organisation,
}

impl ContactKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Organisation => "organisation",
        }
    }
}

impl fmt::Display for ContactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "person" => Ok(Self::Person),
            "organisation" => Ok(Self::Organisation),
            other => Err(format!("unknown contact kind: {other}")),
        }
    }
}

/// A contact row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub id: i64,
    pub kind: ContactKind,
    pub name: String,
    pub organisation_id: Option<i64>,
}

impl ConfigDb {
    /// Create a contact. `organisation_id` links it into the member-of
    /// graph and must point at an organisation.
    pub fn create_contact(
        &self,
        kind: ContactKind,
        name: &str,
        organisation_id: Option<i64>,
    ) -> Result<i64, RegistryError> {
        if let Some(org) = organisation_id {
            self.require_organisation(org)?;
        }
        self.conn().execute(
            "INSERT INTO contacts (kind, name, organisation_id) VALUES (?1, ?2, ?3)",
            params![kind.as_str(), name, organisation_id],
        )?;
        Ok(self.conn().last_insert_rowid())
    }

    /// Contact row by id.
    pub fn contact(&self, id: i64) -> Result<Contact, RegistryError> {
        self.conn()
            .query_row(
                "SELECT id, kind, name, organisation_id FROM contacts WHERE id = ?1",
                params![id],
                |row| {
                    let kind: String = row.get(1)?;
                    Ok(Contact {
                        id: row.get(0)?,
                        kind: kind.parse().map_err(|_| rusqlite::Error::InvalidQuery)?,
                        name: row.get(2)?,
                        organisation_id: row.get(3)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| RegistryError::NotFound(format!("contact {id}")))
    }

    /// Re-link a contact's member-of edge.
    ///
    /// Rejects edges that would make the graph cyclic: the target
    /// organisation must not be the contact itself or any of its
    /// transitive members.
    pub fn set_member_of(
        &self,
        contact_id: i64,
        organisation_id: Option<i64>,
    ) -> Result<(), RegistryError> {
        if let Some(org) = organisation_id {
            self.require_organisation(org)?;

            let mut members = vec![contact_id];
            self.collect_members(contact_id, &mut members)?;
            if members.contains(&org) {
                return Err(RegistryError::CyclicContact(format!(
                    "contact {contact_id} cannot belong to its own member {org}"
                )));
            }
        }

        let updated = self.conn().execute(
            "UPDATE contacts SET organisation_id = ?2 WHERE id = ?1",
            params![contact_id, organisation_id],
        )?;
        if updated == 0 {
            return Err(RegistryError::NotFound(format!("contact {contact_id}")));
        }
        Ok(())
    }

    /// Assign, update or remove the contact for a (resource, role type).
    ///
    /// `contact_id == 0` removes the assignment. The role type is created
    /// on first use anywhere.
    pub fn set_contact(
        &self,
        resource_id: i64,
        role_type: &str,
        contact_id: i64,
    ) -> Result<(), RegistryError> {
        let existing: Option<i64> = self
            .conn()
            .query_row(
                "SELECT rc.id FROM resource_contacts rc
                 JOIN contact_roles cr ON cr.id = rc.contact_role_id
                 WHERE rc.resource_id = ?1 AND cr.type = ?2",
                params![resource_id, role_type],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            None => {
                if contact_id > 0 {
                    let role_id = self.ensure_contact_role(role_type)?;
                    self.conn().execute(
                        "INSERT INTO resource_contacts (resource_id, contact_role_id, contact_id)
                         VALUES (?1, ?2, ?3)",
                        params![resource_id, role_id, contact_id],
                    )?;
                }
            }
            Some(assignment) => {
                if contact_id > 0 {
                    self.conn().execute(
                        "UPDATE resource_contacts SET contact_id = ?2 WHERE id = ?1",
                        params![assignment, contact_id],
                    )?;
                } else {
                    self.conn().execute(
                        "DELETE FROM resource_contacts WHERE id = ?1",
                        params![assignment],
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Assigned contact id for a (resource, role type), if any.
    pub fn contact_assignment(
        &self,
        resource_id: i64,
        role_type: &str,
    ) -> Result<Option<i64>, RegistryError> {
        Ok(self
            .conn()
            .query_row(
                "SELECT rc.contact_id FROM resource_contacts rc
                 JOIN contact_roles cr ON cr.id = rc.contact_role_id
                 WHERE rc.resource_id = ?1 AND cr.type = ?2",
                params![resource_id, role_type],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Delete every contact assignment of a resource.
    pub fn remove_all_contacts(&self, resource_id: i64) -> Result<(), RegistryError> {
        self.conn().execute(
            "DELETE FROM resource_contacts WHERE resource_id = ?1",
            params![resource_id],
        )?;
        Ok(())
    }

    fn ensure_contact_role(&self, role_type: &str) -> Result<i64, RegistryError> {
        let existing: Option<i64> = self
            .conn()
            .query_row(
                "SELECT id FROM contact_roles WHERE type = ?1",
                params![role_type],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }

        log!("contacts"; "creating new contact role '{}'", role_type);
        self.conn().execute(
            "INSERT INTO contact_roles (type) VALUES (?1)",
            params![role_type],
        )?;
        Ok(self.conn().last_insert_rowid())
    }

    fn require_organisation(&self, id: i64) -> Result<(), RegistryError> {
        let contact = self.contact(id)?;
        if contact.kind != ContactKind::Organisation {
            return Err(RegistryError::Conflict(format!(
                "contact {id} is not an organisation"
            )));
        }
        Ok(())
    }

    /// Transitive members of a contact (depth-first over member-of edges).
    fn collect_members(&self, contact_id: i64, out: &mut Vec<i64>) -> Result<(), RegistryError> {
        let mut stmt = self
            .conn()
            .prepare("SELECT id FROM contacts WHERE organisation_id = ?1")?;
        let children = stmt
            .query_map(params![contact_id], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        for child in children {
            if !out.contains(&child) {
                out.push(child);
                self.collect_members(child, out)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ResourceKind;
    use crate::registry::testutil::db;

    #[test]
    fn test_assignment_lifecycle() {
        let db = db();
        let layer = db.create_resource(ResourceKind::Layer, "rivers").unwrap();
        let alice = db
            .create_contact(ContactKind::Person, "Alice", None)
            .unwrap();
        let bob = db.create_contact(ContactKind::Person, "Bob", None).unwrap();

        // first use auto-creates the role type
        db.set_contact(layer.id, "responsible", alice).unwrap();
        assert_eq!(
            db.contact_assignment(layer.id, "responsible").unwrap(),
            Some(alice)
        );

        // update replaces the assignment in place
        db.set_contact(layer.id, "responsible", bob).unwrap();
        assert_eq!(
            db.contact_assignment(layer.id, "responsible").unwrap(),
            Some(bob)
        );

        // zero removes, removing again is a no-op
        db.set_contact(layer.id, "responsible", 0).unwrap();
        assert_eq!(db.contact_assignment(layer.id, "responsible").unwrap(), None);
        db.set_contact(layer.id, "responsible", 0).unwrap();
    }

    #[test]
    fn test_zero_without_assignment_creates_nothing() {
        let db = db();
        let layer = db.create_resource(ResourceKind::Layer, "rivers").unwrap();
        db.set_contact(layer.id, "supplier", 0).unwrap();
        assert_eq!(db.contact_assignment(layer.id, "supplier").unwrap(), None);
    }

    #[test]
    fn test_role_types_are_independent() {
        let db = db();
        let layer = db.create_resource(ResourceKind::Layer, "rivers").unwrap();
        let alice = db
            .create_contact(ContactKind::Person, "Alice", None)
            .unwrap();
        db.set_contact(layer.id, "responsible", alice).unwrap();
        db.set_contact(layer.id, "data owner", alice).unwrap();

        db.set_contact(layer.id, "responsible", 0).unwrap();
        assert_eq!(
            db.contact_assignment(layer.id, "data owner").unwrap(),
            Some(alice)
        );
    }

    #[test]
    fn test_member_of_rejects_cycle() {
        let db = db();
        let canton = db
            .create_contact(ContactKind::Organisation, "Canton", None)
            .unwrap();
        let office = db
            .create_contact(ContactKind::Organisation, "Office", Some(canton))
            .unwrap();
        let unit = db
            .create_contact(ContactKind::Organisation, "Unit", Some(office))
            .unwrap();

        // canton -> unit would close the loop canton > office > unit
        assert!(matches!(
            db.set_member_of(canton, Some(unit)),
            Err(RegistryError::CyclicContact(_))
        ));
        // self-membership is a cycle of length one
        assert!(matches!(
            db.set_member_of(canton, Some(canton)),
            Err(RegistryError::CyclicContact(_))
        ));

        // reparenting along a valid edge works
        db.set_member_of(unit, Some(canton)).unwrap();
        assert_eq!(db.contact(unit).unwrap().organisation_id, Some(canton));

        // and clearing the edge always works
        db.set_member_of(office, None).unwrap();
        assert_eq!(db.contact(office).unwrap().organisation_id, None);
    }

    #[test]
    fn test_member_of_requires_organisation() {
        let db = db();
        let alice = db
            .create_contact(ContactKind::Person, "Alice", None)
            .unwrap();
        let bob = db.create_contact(ContactKind::Person, "Bob", None).unwrap();
        assert!(matches!(
            db.set_member_of(alice, Some(bob)),
            Err(RegistryError::Conflict(_))
        ));
    }

    #[test]
    fn test_remove_all_contacts() {
        let db = db();
        let layer = db.create_resource(ResourceKind::Layer, "rivers").unwrap();
        let alice = db
            .create_contact(ContactKind::Person, "Alice", None)
            .unwrap();
        db.set_contact(layer.id, "responsible", alice).unwrap();
        db.set_contact(layer.id, "supplier", alice).unwrap();

        db.remove_all_contacts(layer.id).unwrap();
        assert_eq!(db.contact_assignment(layer.id, "responsible").unwrap(), None);
        assert_eq!(db.contact_assignment(layer.id, "supplier").unwrap(), None);
    }
}
