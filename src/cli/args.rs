//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Geoconf platform configuration CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: geoconf.toml)
    #[arg(short = 'C', long, default_value = "geoconf.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Initialize config file, database and service roots
    #[command(visible_alias = "i")]
    Init,

    /// Manage layer styles
    #[command(subcommand, visible_alias = "s")]
    Style(StyleCommands),

    /// Manage print layouts of templates
    #[command(subcommand, visible_alias = "l")]
    Layout(LayoutCommands),

    /// Manage configured resources
    #[command(subcommand, visible_alias = "r")]
    Resource(ResourceCommands),

    /// Manage permissions, contacts and memberships
    #[command(subcommand, visible_alias = "a")]
    Access(AccessCommands),

    /// Manage the published WMS/WFS layer trees
    #[command(subcommand, visible_alias = "t")]
    Tree(TreeCommands),
}

/// Style subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum StyleCommands {
    /// Upload a style (.qml or a ZIP bundle with symbols)
    Upload {
        /// Layer resource (id or name)
        resource: String,

        /// File to upload
        #[arg(value_hint = clap::ValueHint::FilePath)]
        file: PathBuf,

        /// Rendering channel (server, client)
        #[arg(short, long, default_value = "server")]
        channel: String,
    },

    /// Remove the stored style and its symbols
    Clear {
        /// Layer resource (id or name)
        resource: String,

        /// Rendering channel (server, client)
        #[arg(short, long, default_value = "server")]
        channel: String,
    },

    /// Download the original upload
    Download {
        /// Layer resource (id or name)
        resource: String,

        /// Rendering channel (server, client)
        #[arg(short, long, default_value = "server")]
        channel: String,

        /// Write to this path instead of the original filename
        #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
        output: Option<PathBuf>,
    },
}

/// Layout subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum LayoutCommands {
    /// Upload a print layout (.qpt or a ZIP bundle with pictures)
    Upload {
        /// Template resource (id or name)
        resource: String,

        /// File to upload
        #[arg(value_hint = clap::ValueHint::FilePath)]
        file: PathBuf,

        /// Sync the composer title to this name
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Remove the stored layout and its resources
    Clear {
        /// Template resource (id or name)
        resource: String,
    },

    /// Download the original upload
    Download {
        /// Template resource (id or name)
        resource: String,

        /// Write to this path instead of the original filename
        #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
        output: Option<PathBuf>,
    },
}

/// Resource subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum ResourceCommands {
    /// Register a resource slot
    Add {
        /// Resource kind (layer, layer_group, data_set, map, template, data_source, background_layer)
        kind: String,

        /// Resource name (unique per kind)
        name: String,
    },

    /// Destroy a resource and everything attached to it
    Rm {
        /// Resource (id or name)
        resource: String,
    },

    /// List registered resources
    Ls,
}

/// Access subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum AccessCommands {
    /// Grant, change or revoke a role's permission on a resource
    Perm {
        /// Resource (id or name)
        resource: String,

        /// Role name
        role: String,

        /// Grant read access (omit to revoke the permission)
        #[arg(long)]
        read: bool,

        /// Grant write access (implies read)
        #[arg(long)]
        write: bool,
    },

    /// Register a contact (person or organisation)
    AddContact {
        /// Contact kind (person, organisation)
        kind: String,

        /// Display name
        name: String,

        /// Organisation this contact belongs to
        #[arg(long)]
        member_of: Option<i64>,
    },

    /// Assign or remove a responsible-party contact (0 removes)
    Contact {
        /// Resource (id or name)
        resource: String,

        /// Contact role type (e.g. responsible, "data owner", supplier)
        role_type: String,

        /// Contact id, 0 to remove
        contact_id: i64,
    },

    /// Replace a membership list (group-users, group-roles, role-users)
    Sync {
        /// Relation to sync
        relation: String,

        /// Owning group/role id
        owner: i64,

        /// Member ids (unknown ids are skipped)
        members: Vec<i64>,
    },
}

/// Tree subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum TreeCommands {
    /// Attach a resource to a protocol root
    Attach {
        /// Resource (id or name)
        resource: String,

        /// Published protocol (wms, wfs)
        #[arg(short, long, default_value = "wms")]
        protocol: String,
    },

    /// Detach a resource from a protocol root
    Detach {
        /// Resource (id or name)
        resource: String,

        /// Published protocol (wms, wfs)
        #[arg(short, long, default_value = "wms")]
        protocol: String,
    },

    /// Replace the ordered children of a layer group
    SetChildren {
        /// Layer-group resource (id or name)
        group: String,

        /// Child resource ids in display order
        children: Vec<i64>,
    },

    /// Print a protocol tree depth-first
    Ls {
        /// Published protocol (wms, wfs)
        #[arg(short, long, default_value = "wms")]
        protocol: String,
    },
}

#[allow(unused)]
impl Cli {
    pub const fn is_init(&self) -> bool {
        matches!(self.command, Commands::Init)
    }
}
