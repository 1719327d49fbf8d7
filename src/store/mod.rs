//! File-backed stores for style assets and verbatim uploads.
//!
//! Two shared mutable trees live under the configured base directories:
//! the content-addressed symbols/print-resources tree consumed by the
//! renderers, and the uploads tree holding original upload bundles for
//! re-download. All mutation goes through these store APIs; there is no
//! file-level locking (single writer per request, spec'd behavior).

mod symbols;
mod uploads;

pub use symbols::SymbolStore;
pub use uploads::{UploadStore, UploadToken};
