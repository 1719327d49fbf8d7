//! Error taxonomy for upload handling and the operation boundary.
//!
//! Upload-validation failures (`InvalidArchive`, `MissingDocument`,
//! `EncodingError`, `MalformedDocument`) are raised before any persisted
//! state changes, so a failed upload leaves the previous style and assets
//! untouched. File-store failures carry the offending path.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::registry::RegistryError;

/// Errors from archive ingestion, document processing and the file stores.
#[derive(Debug, Error)]
pub enum AssetError {
    /// Uploaded container could not be opened as a ZIP archive.
    #[error("file is not a valid ZIP archive")]
    InvalidArchive(#[source] zip::result::ZipError),

    /// Archive contains no top-level document with the expected suffix.
    #[error("archive contains no top-level .{expected} document")]
    MissingDocument {
        /// Expected document suffix (without dot).
        expected: &'static str,
    },

    /// Document bytes are not valid UTF-8.
    #[error("document encoding is not UTF-8")]
    EncodingError(#[from] std::string::FromUtf8Error),

    /// Document text is not well-formed XML.
    #[error("document is not well-formed XML: {0}")]
    MalformedDocument(String),

    /// Disk read/write/delete failure in one of the file stores.
    #[error("I/O failure at {path}")]
    Io {
        /// Path of the file or directory that failed.
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Requested upload or asset is absent.
    #[error("not found: {0}")]
    NotFound(String),
}

impl AssetError {
    /// Attach a path to a raw I/O error.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Error type crossing the operation boundary (spec'd callers of `ops`).
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
