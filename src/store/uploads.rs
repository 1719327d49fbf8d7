//! Verbatim upload store.
//!
//! Every stored upload gets a fresh uuid subdirectory holding the original
//! file under its original name. The `{uuid}/{filename}` token is persisted
//! on the owning database row and is the only way back to the file.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::AssetError;
use crate::utils::mime;
use crate::warn;

/// Locator of a stored upload: one subdirectory segment plus the filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadToken {
    sub_dir: String,
    filename: String,
}

impl UploadToken {
    /// Parse a persisted token.
    ///
    /// Rejects anything that is not exactly `{subdir}/{filename}` with
    /// plain segments, so a tampered database row cannot escape the
    /// uploads tree.
    pub fn parse(token: &str) -> Result<Self, AssetError> {
        let mut parts = token.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(sub_dir), Some(filename), None)
                if !sub_dir.is_empty()
                    && !filename.is_empty()
                    && sub_dir != "."
                    && sub_dir != ".."
                    && filename != "."
                    && filename != ".."
                    && !sub_dir.contains('\\')
                    && !filename.contains('\\') =>
            {
                Ok(Self {
                    sub_dir: sub_dir.to_string(),
                    filename: filename.to_string(),
                })
            }
            _ => Err(AssetError::NotFound(format!("invalid upload token: {token}"))),
        }
    }

    /// Original filename of the upload.
    pub fn filename(&self) -> &str {
        &self.filename
    }
}

impl fmt::Display for UploadToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.sub_dir, self.filename)
    }
}

/// Store for original uploads, kept for later re-download.
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory this store writes into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist an upload verbatim under a fresh unique subdirectory.
    pub fn store(&self, bytes: &[u8], original_filename: &str) -> Result<UploadToken, AssetError> {
        let token = UploadToken {
            sub_dir: Uuid::new_v4().to_string(),
            filename: sanitize_filename(original_filename),
        };

        let target_dir = self.dir.join(&token.sub_dir);
        fs::create_dir_all(&target_dir).map_err(|e| AssetError::io(&target_dir, e))?;

        let path = target_dir.join(&token.filename);
        fs::write(&path, bytes).map_err(|e| AssetError::io(&path, e))?;

        Ok(token)
    }

    /// Remove a stored upload and its subdirectory.
    ///
    /// Missing file or directory is tolerated; failures are logged and
    /// swallowed so a stray file never blocks the superseding operation.
    pub fn remove(&self, token: &UploadToken) {
        let sub_dir = self.dir.join(&token.sub_dir);
        let path = sub_dir.join(&token.filename);

        if let Err(e) = fs::remove_file(&path)
            && e.kind() != ErrorKind::NotFound
        {
            warn!("uploads"; "failed to remove {}: {}", path.display(), e);
        }
        if let Err(e) = fs::remove_dir(&sub_dir)
            && e.kind() != ErrorKind::NotFound
        {
            warn!("uploads"; "failed to remove {}: {}", sub_dir.display(), e);
        }
    }

    /// Fetch a stored upload for re-download.
    ///
    /// Returns the raw bytes and a MIME hint derived from the filename.
    pub fn fetch(&self, token: &UploadToken) -> Result<(Vec<u8>, &'static str), AssetError> {
        let path = self.dir.join(&token.sub_dir).join(&token.filename);
        match fs::read(&path) {
            Ok(bytes) => Ok((bytes, mime::from_path(Path::new(&token.filename)))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(AssetError::NotFound(token.to_string()))
            }
            Err(e) => Err(AssetError::io(&path, e)),
        }
    }
}

/// Keep only the final path segment of a client-declared filename.
fn sanitize_filename(filename: &str) -> String {
    filename
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or("upload.bin")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_store_and_fetch() {
        let dir = TempDir::new().unwrap();
        let store = UploadStore::new(dir.path().join("uploads"));

        let token = store.store(b"zip bytes", "bundle.zip").unwrap();
        assert_eq!(token.filename(), "bundle.zip");

        let (bytes, mime_hint) = store.fetch(&token).unwrap();
        assert_eq!(bytes, b"zip bytes");
        assert_eq!(mime_hint, "application/zip");
    }

    #[test]
    fn test_fresh_subdir_per_store() {
        let dir = TempDir::new().unwrap();
        let store = UploadStore::new(dir.path().join("uploads"));

        let a = store.store(b"one", "style.qml").unwrap();
        let b = store.store(b"two", "style.qml").unwrap();
        assert_ne!(a, b);
        assert_eq!(store.fetch(&a).unwrap().0, b"one");
        assert_eq!(store.fetch(&b).unwrap().0, b"two");
    }

    #[test]
    fn test_remove_deletes_file_and_subdir() {
        let dir = TempDir::new().unwrap();
        let store = UploadStore::new(dir.path().join("uploads"));

        let token = store.store(b"data", "style.qml").unwrap();
        store.remove(&token);

        assert!(matches!(
            store.fetch(&token),
            Err(AssetError::NotFound(_))
        ));
        assert!(!dir.path().join("uploads").join(token.to_string()).parent().unwrap().exists());

        // removing again is a quiet no-op
        store.remove(&token);
    }

    #[test]
    fn test_token_roundtrip() {
        let token = UploadToken::parse("9a7b8c6d/style.qml").unwrap();
        assert_eq!(token.to_string(), "9a7b8c6d/style.qml");
        assert_eq!(token.filename(), "style.qml");
    }

    #[test]
    fn test_token_rejects_traversal() {
        assert!(UploadToken::parse("../etc/passwd").is_err());
        assert!(UploadToken::parse("a/b/c").is_err());
        assert!(UploadToken::parse("style.qml").is_err());
        assert!(UploadToken::parse("a/..").is_err());
        assert!(UploadToken::parse("a\\b/c.qml").is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("style.qml"), "style.qml");
        assert_eq!(sanitize_filename("dir/style.qml"), "style.qml");
        assert_eq!(sanitize_filename("c:\\dir\\style.qml"), "style.qml");
        assert_eq!(sanitize_filename(""), "upload.bin");
    }
}
