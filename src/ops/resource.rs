//! Resource destruction.

use super::style::remove_upload;
use super::{AdminContext, print_assets_in_use, style_assets_in_use};
use crate::config::{PRINT_SUB_DIR, SYMBOLS_SUB_DIR};
use crate::error::AdminError;
use crate::registry::Channel;
use crate::style::{LAYOUT_RULES, STYLE_RULES, cleanup_assets};
use crate::log;

/// Destroy a resource: sweep its files, then remove every registry row.
///
/// The file phase is best effort — individual failures are logged and
/// never stop the registry purge, so the record always disappears even
/// if a stray file stays behind. Assets still referenced by another
/// resource's document are retained.
pub fn destroy_resource(ctx: &AdminContext, resource_id: i64) -> Result<(), AdminError> {
    let resource = ctx.db.resource(resource_id)?;

    for channel in [Channel::Server, Channel::Client] {
        if let Some(record) = ctx.db.style_document(resource_id, channel)? {
            let keep = style_assets_in_use(&ctx.db, resource_id, None);
            cleanup_assets(&record.body, STYLE_RULES, SYMBOLS_SUB_DIR, &ctx.symbols, &keep);
            if let Some(token) = record.upload_token.as_deref() {
                remove_upload(ctx, token);
            }
        }
    }

    if let Some(record) = ctx.db.print_layout(resource_id)? {
        let keep = print_assets_in_use(&ctx.db, resource_id);
        cleanup_assets(&record.body, LAYOUT_RULES, PRINT_SUB_DIR, &ctx.print, &keep);
        if let Some(token) = record.upload_token.as_deref() {
            remove_upload(ctx, token);
        }
    }

    ctx.db.purge_resource(resource_id)?;

    log!("resource"; "destroyed {} '{}' (id {})", resource.kind, resource.name, resource_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::Upload;
    use crate::ingest::archive::tests::zip_bytes;
    use crate::ops::save_style;
    use crate::registry::{Protocol, ResourceKind};
    use crate::style::content_key;
    use tempfile::TempDir;

    const MARKER_QML: &str =
        r#"<qgis><layer class="SvgMarker"><prop k="name" v="marker.svg"/></layer></qgis>"#;

    fn marker_bundle() -> Upload {
        Upload::new(
            "bundle.zip",
            zip_bytes(&[
                ("a.qml", MARKER_QML.as_bytes()),
                ("marker.svg", b"<svg>marker</svg>"),
            ]),
        )
    }

    fn marker_hash_name() -> String {
        format!("{}.svg", content_key(b"<svg>marker</svg>"))
    }

    #[test]
    fn test_destroy_sweeps_everything() {
        let dir = TempDir::new().unwrap();
        let ctx = AdminContext::in_memory(dir.path());
        ctx.db.ensure_service_root(Protocol::Wms).unwrap();

        let rivers = ctx
            .db
            .create_resource(ResourceKind::Layer, "rivers")
            .unwrap()
            .id;
        let editors = ctx.db.create_role("editors").unwrap();

        save_style(&ctx, rivers, Channel::Server, &marker_bundle()).unwrap();
        ctx.db.set_permission(rivers, editors, true, true).unwrap();
        ctx.db.attach(rivers, Protocol::Wms).unwrap();

        destroy_resource(&ctx, rivers).unwrap();

        assert!(ctx.db.resource(rivers).is_err());
        assert!(!ctx.symbols.contains(&marker_hash_name()));
        assert!(ctx.db.collect_layers(Protocol::Wms).unwrap().is_empty());
    }

    #[test]
    fn test_destroy_retains_assets_referenced_elsewhere() {
        let dir = TempDir::new().unwrap();
        let ctx = AdminContext::in_memory(dir.path());

        let rivers = ctx
            .db
            .create_resource(ResourceKind::Layer, "rivers")
            .unwrap()
            .id;
        let lakes = ctx
            .db
            .create_resource(ResourceKind::Layer, "lakes")
            .unwrap()
            .id;

        save_style(&ctx, rivers, Channel::Server, &marker_bundle()).unwrap();
        save_style(&ctx, lakes, Channel::Server, &marker_bundle()).unwrap();

        destroy_resource(&ctx, rivers).unwrap();

        // lakes still references the shared symbol
        assert!(ctx.symbols.contains(&marker_hash_name()));

        destroy_resource(&ctx, lakes).unwrap();
        assert!(!ctx.symbols.contains(&marker_hash_name()));
    }

    #[test]
    fn test_destroy_covers_both_channels() {
        let dir = TempDir::new().unwrap();
        let ctx = AdminContext::in_memory(dir.path());

        let rivers = ctx
            .db
            .create_resource(ResourceKind::Layer, "rivers")
            .unwrap()
            .id;

        save_style(&ctx, rivers, Channel::Server, &marker_bundle()).unwrap();
        save_style(&ctx, rivers, Channel::Client, &marker_bundle()).unwrap();

        destroy_resource(&ctx, rivers).unwrap();
        assert!(!ctx.symbols.contains(&marker_hash_name()));
        assert!(!dir_has_files(dir.path().join("uploads")));
    }

    #[test]
    fn test_destroy_unknown_resource() {
        let dir = TempDir::new().unwrap();
        let ctx = AdminContext::in_memory(dir.path());
        assert!(destroy_resource(&ctx, 77).is_err());
    }

    fn dir_has_files(path: std::path::PathBuf) -> bool {
        std::fs::read_dir(path)
            .map(|entries| entries.flatten().next().is_some())
            .unwrap_or(false)
    }
}
