//! Upload ingestion: classify an uploaded blob as a bare document or a
//! bundle archive, and select the authoritative document.
//!
//! A bare upload must itself carry the expected document suffix. A bundle
//! is a ZIP archive whose first top-level entry with the expected suffix
//! (in archive-listing order) becomes the authoritative document; all other
//! entries stay available for reference extraction.
//!
//! Nothing here touches persisted state, so every failure leaves the
//! previously stored style and assets intact.

pub(crate) mod archive;

pub use archive::StyleBundle;

use regex::Regex;
use std::sync::LazyLock;

use crate::error::AssetError;
use crate::log;

/// Top-level `.qml` entry: a single path segment, no subdirectories.
static STYLE_DOC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^/\\]+\.qml$").unwrap());

/// Top-level `.qpt` entry.
static LAYOUT_DOC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^/\\]+\.qpt$").unwrap());

/// Which kind of document an upload is expected to provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Layer style (`.qml`).
    Style,
    /// Print layout (`.qpt`).
    Layout,
}

impl DocumentKind {
    /// Expected document suffix, without the dot.
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Style => "qml",
            Self::Layout => "qpt",
        }
    }

    fn top_level_pattern(self) -> &'static Regex {
        match self {
            Self::Style => &STYLE_DOC_RE,
            Self::Layout => &LAYOUT_DOC_RE,
        }
    }
}

/// An uploaded blob together with its declared filename.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Filename as declared by the uploader.
    pub filename: String,
    /// Raw upload bytes.
    pub data: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            data,
        }
    }

    /// Whether the upload is a bare document (no containing archive).
    pub fn is_bare(&self, kind: DocumentKind) -> bool {
        self.filename.ends_with(&format!(".{}", kind.suffix()))
    }
}

/// Result of ingestion: decoded document text, plus the opened bundle when
/// the upload was an archive.
pub struct IngestedDocument {
    /// Decoded text of the authoritative document.
    pub text: String,
    /// Bundle handle for reference extraction (archive uploads only).
    pub bundle: Option<StyleBundle>,
}

/// Validate and open an upload.
///
/// Errors: [`AssetError::InvalidArchive`] if the container cannot be opened,
/// [`AssetError::MissingDocument`] if no top-level entry has the expected
/// suffix, [`AssetError::EncodingError`] if the document is not UTF-8.
pub fn ingest(upload: &Upload, kind: DocumentKind) -> Result<IngestedDocument, AssetError> {
    if upload.is_bare(kind) {
        let text = String::from_utf8(upload.data.clone())?;
        return Ok(IngestedDocument { text, bundle: None });
    }

    let mut bundle = StyleBundle::open(upload.data.clone())?;

    let pattern = kind.top_level_pattern();
    let document = bundle
        .names()
        .iter()
        .find(|name| pattern.is_match(name))
        .cloned()
        .ok_or(AssetError::MissingDocument {
            expected: kind.suffix(),
        })?;

    log!("ingest"; "using document: {}", document);

    let bytes = bundle.read(&document)?;
    let text = String::from_utf8(bytes)?;

    Ok(IngestedDocument {
        text,
        bundle: Some(bundle),
    })
}
