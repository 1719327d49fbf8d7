//! Owned documents: per-channel layer styles and print layouts.

use std::fmt;
use std::str::FromStr;

use rusqlite::{OptionalExtension, params};

use super::{ConfigDb, RegistryError};
use crate::style::LayoutInfo;

/// Rendering channel a style document is meant for.
///
/// The server and client channels are fully independent: a layer may
/// carry one document per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Server,
    Client,
}

impl Channel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Client => "client",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "server" => Ok(Self::Server),
            "client" => Ok(Self::Client),
            other => Err(format!("unknown channel: {other}")),
        }
    }
}

/// Stored style document of one (resource, channel).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRecord {
    pub body: String,
    pub upload_token: Option<String>,
}

/// Stored print layout of a template resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutRecord {
    pub body: String,
    pub upload_token: Option<String>,
    pub map_width: Option<String>,
    pub map_height: Option<String>,
    pub labels: String,
}

impl ConfigDb {
    /// Stored style document, if any.
    pub fn style_document(
        &self,
        resource_id: i64,
        channel: Channel,
    ) -> Result<Option<StyleRecord>, RegistryError> {
        Ok(self
            .conn()
            .query_row(
                "SELECT body, upload_token FROM style_documents
                 WHERE resource_id = ?1 AND channel = ?2",
                params![resource_id, channel.as_str()],
                |row| {
                    Ok(StyleRecord {
                        body: row.get(0)?,
                        upload_token: row.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    /// Insert or replace the style document of a (resource, channel).
    pub fn set_style_document(
        &self,
        resource_id: i64,
        channel: Channel,
        body: &str,
        upload_token: Option<&str>,
    ) -> Result<(), RegistryError> {
        self.conn().execute(
            "INSERT INTO style_documents (resource_id, channel, body, upload_token)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (resource_id, channel)
             DO UPDATE SET body = excluded.body, upload_token = excluded.upload_token",
            params![resource_id, channel.as_str(), body, upload_token],
        )?;
        Ok(())
    }

    /// Delete the style document of a (resource, channel), if present.
    pub fn delete_style_document(
        &self,
        resource_id: i64,
        channel: Channel,
    ) -> Result<(), RegistryError> {
        self.conn().execute(
            "DELETE FROM style_documents WHERE resource_id = ?1 AND channel = ?2",
            params![resource_id, channel.as_str()],
        )?;
        Ok(())
    }

    /// Stored print layout, if any.
    pub fn print_layout(&self, resource_id: i64) -> Result<Option<LayoutRecord>, RegistryError> {
        Ok(self
            .conn()
            .query_row(
                "SELECT body, upload_token, map_width, map_height, labels
                 FROM print_layouts WHERE resource_id = ?1",
                params![resource_id],
                |row| {
                    Ok(LayoutRecord {
                        body: row.get(0)?,
                        upload_token: row.get(1)?,
                        map_width: row.get(2)?,
                        map_height: row.get(3)?,
                        labels: row.get(4)?,
                    })
                },
            )
            .optional()?)
    }

    /// Insert or replace the print layout of a template resource.
    pub fn set_print_layout(
        &self,
        resource_id: i64,
        body: &str,
        upload_token: Option<&str>,
        info: &LayoutInfo,
    ) -> Result<(), RegistryError> {
        self.conn().execute(
            "INSERT INTO print_layouts (resource_id, body, upload_token, map_width, map_height, labels)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (resource_id)
             DO UPDATE SET body = excluded.body, upload_token = excluded.upload_token,
                           map_width = excluded.map_width, map_height = excluded.map_height,
                           labels = excluded.labels",
            params![
                resource_id,
                body,
                upload_token,
                info.map_width,
                info.map_height,
                info.labels_field(),
            ],
        )?;
        Ok(())
    }

    /// Delete the print layout of a resource, if present.
    pub fn delete_print_layout(&self, resource_id: i64) -> Result<(), RegistryError> {
        self.conn().execute(
            "DELETE FROM print_layouts WHERE resource_id = ?1",
            params![resource_id],
        )?;
        Ok(())
    }

    /// Every stored style document (orphan detection during cleanup).
    pub fn all_style_documents(&self) -> Result<Vec<(i64, Channel, String)>, RegistryError> {
        let mut stmt = self
            .conn()
            .prepare("SELECT resource_id, channel, body FROM style_documents")?;
        let rows = stmt
            .query_map([], |row| {
                let channel: String = row.get(1)?;
                Ok((row.get::<_, i64>(0)?, channel, row.get::<_, String>(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, channel, body)| {
                let channel = channel
                    .parse()
                    .map_err(|_| RegistryError::NotFound(format!("channel of resource {id}")))?;
                Ok((id, channel, body))
            })
            .collect()
    }

    /// Every stored print layout (orphan detection during cleanup).
    pub fn all_print_layouts(&self) -> Result<Vec<(i64, String)>, RegistryError> {
        let mut stmt = self
            .conn()
            .prepare("SELECT resource_id, body FROM print_layouts")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
