//! MIME type detection utilities.
//!
//! Provides consistent MIME type hints for uploaded files served back to
//! the operator (original style/layout uploads, legend images).

use std::path::Path;

/// Common MIME type constants.
pub mod types {
    // Text
    pub const PLAIN: &str = "text/plain; charset=utf-8";
    pub const XML: &str = "application/xml";

    // Binary
    pub const OCTET_STREAM: &str = "application/octet-stream";
    pub const ZIP: &str = "application/zip";
    pub const PDF: &str = "application/pdf";

    // Images
    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
    pub const GIF: &str = "image/gif";
    pub const WEBP: &str = "image/webp";
    pub const SVG: &str = "image/svg+xml";
    pub const TIFF: &str = "image/tiff";
}

/// Guess MIME type from file extension.
///
/// Returns a full MIME type string suitable for a Content-Type header.
/// QGIS documents (`.qml`, `.qpt`) are XML.
pub fn from_path(path: &Path) -> &'static str {
    from_extension(path.extension().and_then(|e| e.to_str()))
}

/// Guess MIME type from file extension string.
pub fn from_extension(ext: Option<&str>) -> &'static str {
    match ext {
        Some("qml" | "qpt" | "xml") => types::XML,
        Some("txt") => types::PLAIN,

        // Images
        Some("svg") => types::SVG,
        Some("png") => types::PNG,
        Some("jpg" | "jpeg") => types::JPEG,
        Some("gif") => types::GIF,
        Some("webp") => types::WEBP,
        Some("tif" | "tiff") => types::TIFF,

        // Documents / Binary
        Some("pdf") => types::PDF,
        Some("zip") => types::ZIP,

        _ => types::OCTET_STREAM,
    }
}
