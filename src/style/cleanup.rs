//! Removal of assets referenced by a stored document.
//!
//! Runs the same reference scan as the rewrite pass, but only paths that
//! were previously rewritten into the managed subdirectory are deleted.
//! References that stayed untouched at save time (platform defaults) are
//! never candidates, and neither is anything in `keep` — the set of
//! filenames other stored documents still reference. Failures are logged
//! and never abort the sweep.

use rustc_hash::FxHashSet;

use super::process::scan_references;
use super::rules::ReferenceRule;
use crate::store::SymbolStore;
use crate::{debug, warn};

/// Delete the assets the document references under `sub_dir`, except
/// those named in `keep`.
///
/// Returns the number of files actually removed. Already-missing files
/// and scan failures only log; a half-broken stored document must not
/// block replace or destroy operations.
pub fn cleanup_assets(
    text: &str,
    rules: &[ReferenceRule],
    sub_dir: &str,
    store: &SymbolStore,
    keep: &FxHashSet<String>,
) -> usize {
    let references = match scan_references(text, rules) {
        Ok(references) => references,
        Err(e) => {
            warn!("cleanup"; "skipping asset sweep, stored document unreadable: {}", e);
            return 0;
        }
    };

    let prefix = format!("{sub_dir}/");
    let mut removed = 0;

    for path in references {
        let Some(filename) = path.strip_prefix(&prefix) else {
            debug!("cleanup"; "not a managed asset, skipping: {}", path);
            continue;
        };
        if filename.contains('/') {
            continue;
        }
        if keep.contains(filename) {
            debug!("cleanup"; "still referenced elsewhere, keeping: {}", path);
            continue;
        }

        match store.delete(filename) {
            Ok(true) => removed += 1,
            Ok(false) => {}
            Err(e) => {
                warn!("cleanup"; "failed to remove {}: {}", path, e);
            }
        }
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::rules::STYLE_RULES;
    use tempfile::TempDir;

    fn stored_doc(filename: &str) -> String {
        format!(
            r#"<qgis><layer class="SvgMarker"><prop k="name" v="symbols/{filename}"/></layer>
<layer class="SVGFill"><prop k="svgFile" v="/usr/share/qgis/svg/default.svg"/></layer></qgis>"#
        )
    }

    #[test]
    fn test_removes_managed_assets_only() {
        let dir = TempDir::new().unwrap();
        let store = SymbolStore::new(dir.path().join("symbols"));
        store.put("abc123.svg", b"bytes").unwrap();
        store.put("default.svg", b"unrelated").unwrap();

        let removed = cleanup_assets(
            &stored_doc("abc123.svg"),
            STYLE_RULES,
            "symbols",
            &store,
            &FxHashSet::default(),
        );

        assert_eq!(removed, 1);
        assert!(!store.contains("abc123.svg"));
        // the default-path reference shares a basename with a stored file;
        // it must survive because its path was never rewritten
        assert!(store.contains("default.svg"));
    }

    #[test]
    fn test_keep_set_retains_shared_assets() {
        let dir = TempDir::new().unwrap();
        let store = SymbolStore::new(dir.path().join("symbols"));
        store.put("shared.svg", b"bytes").unwrap();

        let keep: FxHashSet<String> = ["shared.svg".to_string()].into_iter().collect();
        let removed = cleanup_assets(
            &stored_doc("shared.svg"),
            STYLE_RULES,
            "symbols",
            &store,
            &keep,
        );

        assert_eq!(removed, 0);
        assert!(store.contains("shared.svg"));
    }

    #[test]
    fn test_missing_files_tolerated() {
        let dir = TempDir::new().unwrap();
        let store = SymbolStore::new(dir.path().join("symbols"));

        let removed = cleanup_assets(
            &stored_doc("ghost.svg"),
            STYLE_RULES,
            "symbols",
            &store,
            &FxHashSet::default(),
        );
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_unreadable_document_tolerated() {
        let dir = TempDir::new().unwrap();
        let store = SymbolStore::new(dir.path().join("symbols"));

        let removed = cleanup_assets(
            "<qgis><a></b>",
            STYLE_RULES,
            "symbols",
            &store,
            &FxHashSet::default(),
        );
        assert_eq!(removed, 0);
    }
}
