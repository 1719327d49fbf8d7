//! In-memory handle over an uploaded ZIP bundle.

use std::io::{Cursor, Read};

use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::AssetError;

/// An opened upload bundle.
///
/// Entry names are captured in central-directory order at open time, so
/// "first matching entry" decisions are deterministic across re-uploads.
pub struct StyleBundle {
    archive: ZipArchive<Cursor<Vec<u8>>>,
    names: Vec<String>,
}

impl StyleBundle {
    /// Open a bundle from raw upload bytes.
    pub fn open(data: Vec<u8>) -> Result<Self, AssetError> {
        let mut archive =
            ZipArchive::new(Cursor::new(data)).map_err(AssetError::InvalidArchive)?;

        let mut names = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let entry = archive
                .by_index_raw(index)
                .map_err(AssetError::InvalidArchive)?;
            names.push(entry.name().to_string());
        }

        Ok(Self { archive, names })
    }

    /// Entry names in archive-listing order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Resolve a referenced filename against the bundle.
    ///
    /// Exact entry names win; otherwise the first entry whose final path
    /// segment matches is used, so resources nested in bundle
    /// subdirectories are still found.
    pub fn resolve(&self, filename: &str) -> Option<&str> {
        if let Some(name) = self.names.iter().find(|n| n.as_str() == filename) {
            return Some(name);
        }
        self.names
            .iter()
            .find(|n| basename(n) == filename)
            .map(String::as_str)
    }

    /// Read the raw bytes of a named entry.
    pub fn read(&mut self, name: &str) -> Result<Vec<u8>, AssetError> {
        let mut entry = match self.archive.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                return Err(AssetError::NotFound(name.to_string()));
            }
            Err(e) => return Err(AssetError::InvalidArchive(e)),
        };

        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| AssetError::io(name, e))?;
        Ok(bytes)
    }
}

/// Final path segment of an entry name (handles both separators).
pub fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
