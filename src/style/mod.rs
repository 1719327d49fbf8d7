//! Style document processing.
//!
//! Parses uploaded layer styles and print layouts, rewrites embedded
//! resource references to content-addressed asset paths, and scans stored
//! documents again when their assets must be cleaned up.

mod cleanup;
mod layout;
mod process;
mod rules;

pub use cleanup::cleanup_assets;
pub use layout::{LayoutInfo, update_layout};
pub use process::{NewAsset, ProcessOutcome, content_key, rewrite_references, scan_references};
pub use rules::{LAYOUT_RULES, ReferenceRule, STYLE_RULES};
