//! Operation layer: the edit operations exposed to the CLI.
//!
//! Each operation composes the ingester, the document processor, the two
//! file stores and the registry, in this order: validate and rewrite in
//! memory first (nothing persisted on failure), sweep the replaced
//! document's assets, write the new asset set, replace the stored upload,
//! and commit the owning database row last — so the database never
//! references a file that was not written.

mod layout;
mod resource;
mod style;

pub use layout::{clear_print_layout, fetch_layout_upload, save_print_layout};
pub use resource::destroy_resource;
pub use style::{clear_style, fetch_style_upload, save_style};

use rustc_hash::FxHashSet;

use crate::config::{AdminConfig, PRINT_SUB_DIR, SYMBOLS_SUB_DIR};
use crate::error::AdminError;
use crate::registry::{Channel, ConfigDb};
use crate::store::{SymbolStore, UploadStore};
use crate::style::{LAYOUT_RULES, STYLE_RULES, scan_references};
use crate::warn;

/// Everything one request operates on: registry connection plus the three
/// file stores, resolved from the injected configuration.
pub struct AdminContext {
    pub db: ConfigDb,
    pub(crate) symbols: SymbolStore,
    pub(crate) print: SymbolStore,
    pub(crate) uploads: UploadStore,
}

impl AdminContext {
    /// Open the context described by a loaded configuration.
    pub fn new(config: &AdminConfig) -> Result<Self, AdminError> {
        let db = ConfigDb::open(config.db_path(), &config.access.public_role)?;
        Ok(Self {
            db,
            symbols: SymbolStore::new(config.symbols_dir()),
            print: SymbolStore::new(config.print_dir()),
            uploads: UploadStore::new(config.uploads_dir()),
        })
    }

    #[cfg(test)]
    pub(crate) fn in_memory(root: &std::path::Path) -> Self {
        Self {
            db: ConfigDb::in_memory("public").unwrap(),
            symbols: SymbolStore::new(root.join(SYMBOLS_SUB_DIR)),
            print: SymbolStore::new(root.join(PRINT_SUB_DIR)),
            uploads: UploadStore::new(root.join("uploads")),
        }
    }
}

/// Symbol filenames referenced by style documents other than the one
/// identified by (`exclude_resource`, `exclude_channel`).
///
/// `exclude_channel == None` excludes both channels (resource
/// destruction). Unreadable documents are skipped with a warning — a
/// broken neighbor must not block this resource's cleanup.
pub(crate) fn style_assets_in_use(
    db: &ConfigDb,
    exclude_resource: i64,
    exclude_channel: Option<Channel>,
) -> FxHashSet<String> {
    let mut keep = FxHashSet::default();

    let documents = match db.all_style_documents() {
        Ok(documents) => documents,
        Err(e) => {
            warn!("cleanup"; "cannot enumerate style documents: {}", e);
            return keep;
        }
    };

    for (resource_id, channel, body) in documents {
        let excluded = resource_id == exclude_resource
            && exclude_channel.is_none_or(|c| c == channel);
        if excluded {
            continue;
        }
        collect_managed(&body, STYLE_RULES, SYMBOLS_SUB_DIR, &mut keep);
    }
    keep
}

/// Print-resource filenames referenced by layouts of other resources.
pub(crate) fn print_assets_in_use(db: &ConfigDb, exclude_resource: i64) -> FxHashSet<String> {
    let mut keep = FxHashSet::default();

    let layouts = match db.all_print_layouts() {
        Ok(layouts) => layouts,
        Err(e) => {
            warn!("cleanup"; "cannot enumerate print layouts: {}", e);
            return keep;
        }
    };

    for (resource_id, body) in layouts {
        if resource_id == exclude_resource {
            continue;
        }
        collect_managed(&body, LAYOUT_RULES, PRINT_SUB_DIR, &mut keep);
    }
    keep
}

fn collect_managed(
    body: &str,
    rules: &[crate::style::ReferenceRule],
    sub_dir: &str,
    keep: &mut FxHashSet<String>,
) {
    let prefix = format!("{sub_dir}/");
    match scan_references(body, rules) {
        Ok(references) => {
            for path in references {
                if let Some(filename) = path.strip_prefix(&prefix)
                    && !filename.contains('/')
                {
                    keep.insert(filename.to_string());
                }
            }
        }
        Err(e) => {
            warn!("cleanup"; "skipping unreadable stored document: {}", e);
        }
    }
}
