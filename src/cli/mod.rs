//! Command-line interface module.

mod args;
pub mod documents;
pub mod init;
pub mod registry;

pub use args::{
    AccessCommands, Cli, Commands, LayoutCommands, ResourceCommands, StyleCommands, TreeCommands,
};

use anyhow::{Context, Result, bail};

use crate::ops::AdminContext;
use crate::registry::Resource;

/// Resolve a CLI resource argument: numeric id first, then unique name.
pub fn resolve_resource(ctx: &AdminContext, arg: &str) -> Result<Resource> {
    if let Ok(id) = arg.parse::<i64>() {
        return ctx
            .db
            .resource(id)
            .with_context(|| format!("no resource with id {id}"));
    }
    match ctx.db.find_resource_by_name(arg)? {
        Some(resource) => Ok(resource),
        None => bail!("no resource named '{arg}'"),
    }
}
