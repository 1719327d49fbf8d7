//! Style and layout command handlers.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::{LayoutCommands, StyleCommands, resolve_resource};
use crate::ingest::Upload;
use crate::log;
use crate::ops::{self, AdminContext};
use crate::registry::Channel;

pub fn run_style(command: &StyleCommands, ctx: &AdminContext) -> Result<()> {
    match command {
        StyleCommands::Upload {
            resource,
            file,
            channel,
        } => {
            let resource = resolve_resource(ctx, resource)?;
            let channel = parse_channel(channel)?;
            let upload = read_upload(file)?;
            ops::save_style(ctx, resource.id, channel, &upload)?;
            Ok(())
        }
        StyleCommands::Clear { resource, channel } => {
            let resource = resolve_resource(ctx, resource)?;
            let channel = parse_channel(channel)?;
            ops::clear_style(ctx, resource.id, channel)?;
            Ok(())
        }
        StyleCommands::Download {
            resource,
            channel,
            output,
        } => {
            let resource = resolve_resource(ctx, resource)?;
            let channel = parse_channel(channel)?;
            let (filename, bytes, mime_hint) =
                ops::fetch_style_upload(ctx, resource.id, channel)?;
            write_download(&filename, &bytes, mime_hint, output.as_deref())
        }
    }
}

pub fn run_layout(command: &LayoutCommands, ctx: &AdminContext) -> Result<()> {
    match command {
        LayoutCommands::Upload {
            resource,
            file,
            title,
        } => {
            let resource = resolve_resource(ctx, resource)?;
            let upload = read_upload(file)?;
            // default the composer title to the template name
            let title = title.as_deref().unwrap_or(resource.name.as_str());
            ops::save_print_layout(ctx, resource.id, &upload, Some(title))?;
            Ok(())
        }
        LayoutCommands::Clear { resource } => {
            let resource = resolve_resource(ctx, resource)?;
            ops::clear_print_layout(ctx, resource.id)?;
            Ok(())
        }
        LayoutCommands::Download { resource, output } => {
            let resource = resolve_resource(ctx, resource)?;
            let (filename, bytes, mime_hint) = ops::fetch_layout_upload(ctx, resource.id)?;
            write_download(&filename, &bytes, mime_hint, output.as_deref())
        }
    }
}

fn parse_channel(arg: &str) -> Result<Channel> {
    arg.parse::<Channel>().map_err(anyhow::Error::msg)
}

fn read_upload(path: &Path) -> Result<Upload> {
    let data =
        fs::read(path).with_context(|| format!("cannot read upload {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.bin")
        .to_string();
    Ok(Upload::new(filename, data))
}

fn write_download(
    filename: &str,
    bytes: &[u8],
    mime_hint: &str,
    output: Option<&Path>,
) -> Result<()> {
    let target: PathBuf = output.map_or_else(|| PathBuf::from(filename), Path::to_path_buf);
    fs::write(&target, bytes)
        .with_context(|| format!("cannot write {}", target.display()))?;
    log!("download"; "{} ({} bytes, {})", target.display(), bytes.len(), mime_hint);
    Ok(())
}
