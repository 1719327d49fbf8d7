//! Content-addressed asset store.
//!
//! Assets are stored flat under one directory, named by a content key
//! derived from their bytes. Same content always maps to the same
//! filename, so overwriting on put is the expected dedup path and
//! deleting a filename that is gone already is a no-op.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::debug;
use crate::error::AssetError;

/// Store for renderer-visible binary assets (symbols, print resources).
pub struct SymbolStore {
    dir: PathBuf,
}

impl SymbolStore {
    /// Create a store rooted at `dir`. The directory is created lazily on
    /// the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory this store writes into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write an asset, overwriting any existing file of the same name.
    pub fn put(&self, filename: &str, bytes: &[u8]) -> Result<(), AssetError> {
        fs::create_dir_all(&self.dir).map_err(|e| AssetError::io(&self.dir, e))?;

        let path = self.dir.join(filename);
        fs::write(&path, bytes).map_err(|e| AssetError::io(&path, e))?;
        Ok(())
    }

    /// Remove an asset. Returns whether the file existed; a missing file
    /// is not an error.
    pub fn delete(&self, filename: &str) -> Result<bool, AssetError> {
        let path = self.dir.join(filename);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("symbols"; "already absent: {}", path.display());
                Ok(false)
            }
            Err(e) => Err(AssetError::io(&path, e)),
        }
    }

    /// Whether an asset exists.
    pub fn contains(&self, filename: &str) -> bool {
        self.dir.join(filename).is_file()
    }

    /// Read an asset back (used by tests and the round-trip property).
    pub fn get(&self, filename: &str) -> Result<Vec<u8>, AssetError> {
        let path = self.dir.join(filename);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(AssetError::NotFound(filename.to_string()))
            }
            Err(e) => Err(AssetError::io(&path, e)),
        }
    }
}
