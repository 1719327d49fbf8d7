//! Print layout operations for template resources.

use super::style::remove_upload;
use super::{AdminContext, print_assets_in_use};
use crate::config::PRINT_SUB_DIR;
use crate::error::{AdminError, AssetError};
use crate::ingest::{DocumentKind, Upload, ingest};
use crate::registry::{RegistryError, ResourceKind};
use crate::store::UploadToken;
use crate::style::{LAYOUT_RULES, cleanup_assets, rewrite_references, update_layout};
use crate::{log, warn};

/// Save an uploaded print layout for a template resource.
///
/// Bundle uploads get their picture references rewritten into the print
/// resource store. The layout always round-trips through the serializer:
/// the composer title is kept in sync with `title` and the first map
/// size plus all label ids are extracted onto the database row.
pub fn save_print_layout(
    ctx: &AdminContext,
    resource_id: i64,
    upload: &Upload,
    title: Option<&str>,
) -> Result<(), AdminError> {
    require_template(ctx, resource_id)?;

    // validate and rewrite in memory first
    let document = ingest(upload, DocumentKind::Layout)?;
    let (text, assets) = match document.bundle {
        Some(mut bundle) => {
            let outcome =
                rewrite_references(&document.text, LAYOUT_RULES, PRINT_SUB_DIR, &mut bundle)?;
            (outcome.text, outcome.assets)
        }
        None => (document.text, Vec::new()),
    };
    let (body, info) = update_layout(&text, title)?;

    // sweep the replaced layout's resources
    let previous = ctx.db.print_layout(resource_id)?;
    if let Some(previous) = &previous {
        let keep = print_assets_in_use(&ctx.db, resource_id);
        cleanup_assets(&previous.body, LAYOUT_RULES, PRINT_SUB_DIR, &ctx.print, &keep);
    }

    for asset in &assets {
        if let Err(e) = ctx.print.put(&asset.filename, &asset.bytes) {
            warn!("layout"; "failed to store resource {}: {}", asset.filename, e);
        }
    }

    if let Some(token) = previous.as_ref().and_then(|p| p.upload_token.as_deref()) {
        remove_upload(ctx, token);
    }
    let token = ctx.uploads.store(&upload.data, &upload.filename)?;

    ctx.db
        .set_print_layout(resource_id, &body, Some(&token.to_string()), &info)?;

    log!("layout"; "saved print layout for resource {} ({} resource(s))",
        resource_id, assets.len());
    Ok(())
}

/// Remove the stored print layout of a template. Absent layout is a no-op.
pub fn clear_print_layout(ctx: &AdminContext, resource_id: i64) -> Result<(), AdminError> {
    let Some(record) = ctx.db.print_layout(resource_id)? else {
        return Ok(());
    };

    let keep = print_assets_in_use(&ctx.db, resource_id);
    cleanup_assets(&record.body, LAYOUT_RULES, PRINT_SUB_DIR, &ctx.print, &keep);

    if let Some(token) = record.upload_token.as_deref() {
        remove_upload(ctx, token);
    }

    ctx.db.delete_print_layout(resource_id)?;
    log!("layout"; "cleared print layout for resource {}", resource_id);
    Ok(())
}

/// Fetch the original layout upload for re-download.
pub fn fetch_layout_upload(
    ctx: &AdminContext,
    resource_id: i64,
) -> Result<(String, Vec<u8>, &'static str), AdminError> {
    let record = ctx.db.print_layout(resource_id)?.ok_or_else(|| {
        AssetError::NotFound(format!("no print layout for resource {resource_id}"))
    })?;
    let token = record.upload_token.ok_or_else(|| {
        AssetError::NotFound(format!("no stored upload for resource {resource_id}"))
    })?;

    let token = UploadToken::parse(&token)?;
    let (bytes, mime_hint) = ctx.uploads.fetch(&token)?;
    Ok((token.filename().to_string(), bytes, mime_hint))
}

fn require_template(ctx: &AdminContext, resource_id: i64) -> Result<(), AdminError> {
    let resource = ctx.db.resource(resource_id)?;
    if resource.kind != ResourceKind::Template {
        return Err(RegistryError::Conflict(format!(
            "resource {resource_id} is a {}, not a template",
            resource.kind
        ))
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::archive::tests::zip_bytes;
    use crate::style::content_key;
    use tempfile::TempDir;

    const QPT: &str = r#"<Composer title="draft">
 <ComposerMap><ComposerItem width="180" height="90"/></ComposerMap>
 <ComposerLabel><ComposerItem id="title"/></ComposerLabel>
 <ComposerPicture file="img/arrow.png"/>
</Composer>"#;

    fn template(ctx: &AdminContext) -> i64 {
        ctx.db
            .create_resource(ResourceKind::Template, "a4-landscape")
            .unwrap()
            .id
    }

    fn layout_bundle() -> Upload {
        Upload::new(
            "layout.zip",
            zip_bytes(&[
                ("print.qpt", QPT.as_bytes()),
                ("img/arrow.png", b"png bytes"),
            ]),
        )
    }

    #[test]
    fn test_save_extracts_metadata_and_resources() {
        let dir = TempDir::new().unwrap();
        let ctx = AdminContext::in_memory(dir.path());
        let a4 = template(&ctx);

        save_print_layout(&ctx, a4, &layout_bundle(), Some("A4 landscape")).unwrap();

        let record = ctx.db.print_layout(a4).unwrap().unwrap();
        assert!(record.body.contains(r#"title="A4 landscape""#));
        assert_eq!(record.map_width.as_deref(), Some("180"));
        assert_eq!(record.map_height.as_deref(), Some("90"));
        assert_eq!(record.labels, "title");

        let arrow = format!("{}.png", content_key(b"png bytes"));
        assert!(record.body.contains(&format!("print/{arrow}")));
        assert_eq!(ctx.print.get(&arrow).unwrap(), b"png bytes");
    }

    #[test]
    fn test_bare_layout_is_parsed_not_rewritten() {
        let dir = TempDir::new().unwrap();
        let ctx = AdminContext::in_memory(dir.path());
        let a4 = template(&ctx);

        let upload = Upload::new("print.qpt", QPT.as_bytes().to_vec());
        save_print_layout(&ctx, a4, &upload, None).unwrap();

        let record = ctx.db.print_layout(a4).unwrap().unwrap();
        // reference untouched without a bundle, metadata still extracted
        assert!(record.body.contains("img/arrow.png"));
        assert_eq!(record.map_width.as_deref(), Some("180"));
    }

    #[test]
    fn test_clear_sweeps_resources() {
        let dir = TempDir::new().unwrap();
        let ctx = AdminContext::in_memory(dir.path());
        let a4 = template(&ctx);

        save_print_layout(&ctx, a4, &layout_bundle(), None).unwrap();
        let arrow = format!("{}.png", content_key(b"png bytes"));
        assert!(ctx.print.contains(&arrow));

        clear_print_layout(&ctx, a4).unwrap();
        assert!(!ctx.print.contains(&arrow));
        assert!(ctx.db.print_layout(a4).unwrap().is_none());

        // clearing again is a no-op
        clear_print_layout(&ctx, a4).unwrap();
    }

    #[test]
    fn test_non_template_rejected() {
        let dir = TempDir::new().unwrap();
        let ctx = AdminContext::in_memory(dir.path());
        let layer = ctx
            .db
            .create_resource(ResourceKind::Layer, "rivers")
            .unwrap()
            .id;

        assert!(save_print_layout(&ctx, layer, &layout_bundle(), None).is_err());
    }

    #[test]
    fn test_missing_document_in_bundle() {
        let dir = TempDir::new().unwrap();
        let ctx = AdminContext::in_memory(dir.path());
        let a4 = template(&ctx);

        let upload = Upload::new("layout.zip", zip_bytes(&[("arrow.png", b"png")]));
        assert!(matches!(
            save_print_layout(&ctx, a4, &upload, None),
            Err(AdminError::Asset(AssetError::MissingDocument { expected: "qpt" }))
        ));
        assert!(ctx.db.print_layout(a4).unwrap().is_none());
    }

    #[test]
    fn test_fetch_layout_upload() {
        let dir = TempDir::new().unwrap();
        let ctx = AdminContext::in_memory(dir.path());
        let a4 = template(&ctx);

        save_print_layout(&ctx, a4, &layout_bundle(), None).unwrap();
        let (filename, bytes, mime_hint) = fetch_layout_upload(&ctx, a4).unwrap();
        assert_eq!(filename, "layout.zip");
        assert_eq!(bytes, layout_bundle().data);
        assert_eq!(mime_hint, "application/zip");
    }
}
