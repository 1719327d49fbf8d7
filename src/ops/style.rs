//! Layer style operations: save, clear, re-download.

use super::{AdminContext, style_assets_in_use};
use crate::config::SYMBOLS_SUB_DIR;
use crate::error::AdminError;
use crate::ingest::{DocumentKind, Upload, ingest};
use crate::registry::Channel;
use crate::store::UploadToken;
use crate::style::{STYLE_RULES, cleanup_assets, rewrite_references, scan_references};
use crate::{log, warn};

/// Save an uploaded style for one (resource, channel).
///
/// A bare `.qml` is stored verbatim; a bundle has its resolvable symbol
/// references rewritten to content-addressed paths and the referenced
/// resources extracted into the symbol store. The previous document's
/// assets are swept first (delete-then-write: identical content keeps
/// its name, so re-saving is idempotent), and the database row is
/// committed last.
pub fn save_style(
    ctx: &AdminContext,
    resource_id: i64,
    channel: Channel,
    upload: &Upload,
) -> Result<(), AdminError> {
    ctx.db.resource(resource_id)?;

    // validate and rewrite in memory; a failure here leaves every store
    // untouched
    let document = ingest(upload, DocumentKind::Style)?;
    let (body, assets) = match document.bundle {
        Some(mut bundle) => {
            let outcome =
                rewrite_references(&document.text, STYLE_RULES, SYMBOLS_SUB_DIR, &mut bundle)?;
            (outcome.text, outcome.assets)
        }
        None => {
            // bare upload: well-formedness check only, text stays verbatim
            scan_references(&document.text, STYLE_RULES)?;
            (document.text, Vec::new())
        }
    };

    // sweep the replaced document's assets, keeping whatever other
    // documents still reference
    let previous = ctx.db.style_document(resource_id, channel)?;
    if let Some(previous) = &previous {
        let keep = style_assets_in_use(&ctx.db, resource_id, Some(channel));
        cleanup_assets(&previous.body, STYLE_RULES, SYMBOLS_SUB_DIR, &ctx.symbols, &keep);
    }

    // write the new asset set; partial failure is reported, not rolled
    // back, and never leaves the database pointing at the missing file
    // because the row is only committed after the writes
    for asset in &assets {
        if let Err(e) = ctx.symbols.put(&asset.filename, &asset.bytes) {
            warn!("style"; "failed to store asset {}: {}", asset.filename, e);
        }
    }

    // supersede the stored original upload
    if let Some(token) = previous.as_ref().and_then(|p| p.upload_token.as_deref()) {
        remove_upload(ctx, token);
    }
    let token = ctx.uploads.store(&upload.data, &upload.filename)?;

    ctx.db
        .set_style_document(resource_id, channel, &body, Some(&token.to_string()))?;

    log!("style"; "saved {} style for resource {} ({} asset(s))",
        channel, resource_id, assets.len());
    Ok(())
}

/// Remove the stored style of one (resource, channel), sweeping its
/// assets and the stored upload. Absent style is a no-op.
pub fn clear_style(
    ctx: &AdminContext,
    resource_id: i64,
    channel: Channel,
) -> Result<(), AdminError> {
    let Some(record) = ctx.db.style_document(resource_id, channel)? else {
        return Ok(());
    };

    let keep = style_assets_in_use(&ctx.db, resource_id, Some(channel));
    cleanup_assets(&record.body, STYLE_RULES, SYMBOLS_SUB_DIR, &ctx.symbols, &keep);

    if let Some(token) = record.upload_token.as_deref() {
        remove_upload(ctx, token);
    }

    ctx.db.delete_style_document(resource_id, channel)?;
    log!("style"; "cleared {} style for resource {}", channel, resource_id);
    Ok(())
}

/// Fetch the original upload of one (resource, channel) for re-download.
pub fn fetch_style_upload(
    ctx: &AdminContext,
    resource_id: i64,
    channel: Channel,
) -> Result<(String, Vec<u8>, &'static str), AdminError> {
    let record = ctx
        .db
        .style_document(resource_id, channel)?
        .ok_or_else(|| {
            crate::error::AssetError::NotFound(format!(
                "no {channel} style for resource {resource_id}"
            ))
        })?;
    let token = record.upload_token.ok_or_else(|| {
        crate::error::AssetError::NotFound(format!(
            "no stored upload for resource {resource_id}"
        ))
    })?;

    let token = UploadToken::parse(&token)?;
    let (bytes, mime_hint) = ctx.uploads.fetch(&token)?;
    Ok((token.filename().to_string(), bytes, mime_hint))
}

/// Best-effort removal of a stored upload by its persisted token.
pub(crate) fn remove_upload(ctx: &AdminContext, token: &str) {
    match UploadToken::parse(token) {
        Ok(token) => ctx.uploads.remove(&token),
        Err(e) => warn!("uploads"; "ignoring unusable upload token: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AssetError;
    use crate::ingest::archive::tests::zip_bytes;
    use crate::registry::ResourceKind;
    use crate::style::content_key;
    use std::fs;
    use tempfile::TempDir;

    const BARE_QML: &str = r#"<qgis version="3.22">
 <renderer-v2 type="singleSymbol"/>
</qgis>"#;

    const MARKER_QML: &str = r#"<qgis>
 <layer class="SvgMarker">
  <prop k="name" v="marker.svg"/>
 </layer>
</qgis>"#;

    const PLAIN_QML: &str = r#"<qgis>
 <layer class="SimpleLine">
  <prop k="color" v="0,0,0,255"/>
 </layer>
</qgis>"#;

    fn layer(ctx: &AdminContext, name: &str) -> i64 {
        ctx.db.create_resource(ResourceKind::Layer, name).unwrap().id
    }

    fn marker_hash_name() -> String {
        format!("{}.svg", content_key(b"<svg>marker</svg>"))
    }

    fn marker_bundle() -> Upload {
        Upload::new(
            "bundle.zip",
            zip_bytes(&[
                ("a.qml", MARKER_QML.as_bytes()),
                ("marker.svg", b"<svg>marker</svg>"),
            ]),
        )
    }

    // Scenario A: bare upload referencing nothing external
    #[test]
    fn test_bare_upload_stored_verbatim() {
        let dir = TempDir::new().unwrap();
        let ctx = AdminContext::in_memory(dir.path());
        let rivers = layer(&ctx, "rivers");

        let upload = Upload::new("style.qml", BARE_QML.as_bytes().to_vec());
        save_style(&ctx, rivers, Channel::Server, &upload).unwrap();

        let record = ctx
            .db
            .style_document(rivers, Channel::Server)
            .unwrap()
            .unwrap();
        assert_eq!(record.body, BARE_QML);
        // no assets written
        assert!(!dir.path().join("symbols").exists());
        // the original upload is stored for re-download
        let (filename, bytes, mime_hint) =
            fetch_style_upload(&ctx, rivers, Channel::Server).unwrap();
        assert_eq!(filename, "style.qml");
        assert_eq!(bytes, BARE_QML.as_bytes());
        assert_eq!(mime_hint, "application/xml");
    }

    // Scenario B: bundle with a referenced symbol
    #[test]
    fn test_bundle_rewrites_and_stores_symbol() {
        let dir = TempDir::new().unwrap();
        let ctx = AdminContext::in_memory(dir.path());
        let rivers = layer(&ctx, "rivers");

        save_style(&ctx, rivers, Channel::Server, &marker_bundle()).unwrap();

        let record = ctx
            .db
            .style_document(rivers, Channel::Server)
            .unwrap()
            .unwrap();
        let expected = format!("symbols/{}", marker_hash_name());
        assert!(record.body.contains(&expected));

        // round-trip: the stored file's bytes equal the bundle entry's
        assert_eq!(
            ctx.symbols.get(&marker_hash_name()).unwrap(),
            b"<svg>marker</svg>"
        );
    }

    // Scenario C: bundle without a top-level document
    #[test]
    fn test_bundle_without_document_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let ctx = AdminContext::in_memory(dir.path());
        let rivers = layer(&ctx, "rivers");

        let upload = Upload::new("bundle.zip", zip_bytes(&[("marker.svg", b"<svg/>")]));
        let result = save_style(&ctx, rivers, Channel::Server, &upload);
        assert!(matches!(
            result,
            Err(AdminError::Asset(AssetError::MissingDocument { .. }))
        ));

        assert!(ctx.db.style_document(rivers, Channel::Server).unwrap().is_none());
        assert!(!dir.path().join("symbols").exists());
        assert!(!dir.path().join("uploads").exists());
    }

    // Scenario D: replacing a style sweeps assets the new style dropped
    #[test]
    fn test_replace_sweeps_dropped_assets() {
        let dir = TempDir::new().unwrap();
        let ctx = AdminContext::in_memory(dir.path());
        let rivers = layer(&ctx, "rivers");

        save_style(&ctx, rivers, Channel::Server, &marker_bundle()).unwrap();
        assert!(ctx.symbols.contains(&marker_hash_name()));

        let replacement = Upload::new(
            "bundle.zip",
            zip_bytes(&[("b.qml", PLAIN_QML.as_bytes())]),
        );
        save_style(&ctx, rivers, Channel::Server, &replacement).unwrap();

        assert!(!ctx.symbols.contains(&marker_hash_name()));
        let record = ctx
            .db
            .style_document(rivers, Channel::Server)
            .unwrap()
            .unwrap();
        assert!(record.body.contains("SimpleLine"));
    }

    // Idempotence: same archive twice, byte-identical outcome
    #[test]
    fn test_resave_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let ctx = AdminContext::in_memory(dir.path());
        let rivers = layer(&ctx, "rivers");

        save_style(&ctx, rivers, Channel::Server, &marker_bundle()).unwrap();
        let first = ctx
            .db
            .style_document(rivers, Channel::Server)
            .unwrap()
            .unwrap();

        save_style(&ctx, rivers, Channel::Server, &marker_bundle()).unwrap();
        let second = ctx
            .db
            .style_document(rivers, Channel::Server)
            .unwrap()
            .unwrap();

        assert_eq!(first.body, second.body);
        assert!(ctx.symbols.contains(&marker_hash_name()));
        // the upload token is fresh per save
        assert_ne!(first.upload_token, second.upload_token);
    }

    // Shared assets survive a neighbor's replace
    #[test]
    fn test_shared_asset_retained_across_resources() {
        let dir = TempDir::new().unwrap();
        let ctx = AdminContext::in_memory(dir.path());
        let rivers = layer(&ctx, "rivers");
        let lakes = layer(&ctx, "lakes");

        save_style(&ctx, rivers, Channel::Server, &marker_bundle()).unwrap();
        save_style(&ctx, lakes, Channel::Server, &marker_bundle()).unwrap();

        // rivers drops the marker; lakes still references it
        clear_style(&ctx, rivers, Channel::Server).unwrap();
        assert!(ctx.symbols.contains(&marker_hash_name()));

        // lakes goes too: now the asset is orphaned and removed
        clear_style(&ctx, lakes, Channel::Server).unwrap();
        assert!(!ctx.symbols.contains(&marker_hash_name()));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let ctx = AdminContext::in_memory(dir.path());
        let rivers = layer(&ctx, "rivers");

        save_style(&ctx, rivers, Channel::Server, &marker_bundle()).unwrap();
        clear_style(&ctx, rivers, Channel::Server).unwrap();
        assert!(ctx.db.style_document(rivers, Channel::Server).unwrap().is_none());

        // clearing an absent style is a no-op
        clear_style(&ctx, rivers, Channel::Server).unwrap();
    }

    #[test]
    fn test_replace_supersedes_upload() {
        let dir = TempDir::new().unwrap();
        let ctx = AdminContext::in_memory(dir.path());
        let rivers = layer(&ctx, "rivers");

        save_style(&ctx, rivers, Channel::Server, &marker_bundle()).unwrap();
        let first_token = ctx
            .db
            .style_document(rivers, Channel::Server)
            .unwrap()
            .unwrap()
            .upload_token
            .unwrap();

        let upload = Upload::new("style.qml", BARE_QML.as_bytes().to_vec());
        save_style(&ctx, rivers, Channel::Server, &upload).unwrap();

        // the old upload directory is gone
        let old = UploadToken::parse(&first_token).unwrap();
        assert!(matches!(
            ctx.uploads.fetch(&old),
            Err(AssetError::NotFound(_))
        ));
    }

    #[test]
    fn test_unknown_resource_rejected() {
        let dir = TempDir::new().unwrap();
        let ctx = AdminContext::in_memory(dir.path());
        let upload = Upload::new("style.qml", BARE_QML.as_bytes().to_vec());
        assert!(save_style(&ctx, 42, Channel::Server, &upload).is_err());
    }

    #[test]
    fn test_malformed_bare_upload_rejected() {
        let dir = TempDir::new().unwrap();
        let ctx = AdminContext::in_memory(dir.path());
        let rivers = layer(&ctx, "rivers");

        let upload = Upload::new("style.qml", b"<qgis><layer></qgis>".to_vec());
        assert!(matches!(
            save_style(&ctx, rivers, Channel::Server, &upload),
            Err(AdminError::Asset(AssetError::MalformedDocument(_)))
        ));
        assert!(ctx.db.style_document(rivers, Channel::Server).unwrap().is_none());
    }

    #[test]
    fn test_failed_replace_keeps_previous_state() {
        let dir = TempDir::new().unwrap();
        let ctx = AdminContext::in_memory(dir.path());
        let rivers = layer(&ctx, "rivers");

        save_style(&ctx, rivers, Channel::Server, &marker_bundle()).unwrap();
        let before = ctx
            .db
            .style_document(rivers, Channel::Server)
            .unwrap()
            .unwrap();

        // replacement bundle with no document: validation fails first
        let upload = Upload::new("bundle.zip", zip_bytes(&[("x.svg", b"<svg/>")]));
        assert!(save_style(&ctx, rivers, Channel::Server, &upload).is_err());

        let after = ctx
            .db
            .style_document(rivers, Channel::Server)
            .unwrap()
            .unwrap();
        assert_eq!(before, after);
        assert!(ctx.symbols.contains(&marker_hash_name()));

        // the stored upload is still fetchable
        let _ = fs::read_dir(dir.path().join("uploads")).unwrap();
        fetch_style_upload(&ctx, rivers, Channel::Server).unwrap();
    }
}
