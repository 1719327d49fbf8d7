//! Resource, access and tree command handlers.

use anyhow::{Result, bail};
use owo_colors::OwoColorize;

use super::{AccessCommands, ResourceCommands, TreeCommands, resolve_resource};
use crate::log;
use crate::ops::{self, AdminContext};
use crate::registry::{ContactKind, Membership, Protocol, ResourceKind, SubLayer};

pub fn run_resource(command: &ResourceCommands, ctx: &AdminContext) -> Result<()> {
    match command {
        ResourceCommands::Add { kind, name } => {
            let kind: ResourceKind = kind.parse().map_err(anyhow::Error::msg)?;
            let resource = ctx.db.create_resource(kind, name)?;
            log!("resource"; "created {} '{}' (id {})", kind, name, resource.id);
            Ok(())
        }
        ResourceCommands::Rm { resource } => {
            let resource = resolve_resource(ctx, resource)?;
            ops::destroy_resource(ctx, resource.id)?;
            Ok(())
        }
        ResourceCommands::Ls => {
            for resource in ctx.db.resources()? {
                println!(
                    "{:>6}  {:<18} {}",
                    resource.id,
                    resource.kind.to_string().dimmed(),
                    resource.name
                );
            }
            Ok(())
        }
    }
}

pub fn run_access(command: &AccessCommands, ctx: &AdminContext) -> Result<()> {
    match command {
        AccessCommands::Perm {
            resource,
            role,
            read,
            write,
        } => {
            let resource = resolve_resource(ctx, resource)?;
            let Some(role_id) = ctx.db.role_id(role)? else {
                bail!("no role named '{role}'");
            };
            // write implies read
            let read = *read || *write;
            ctx.db.set_permission(resource.id, role_id, read, *write)?;
            log!("access"; "{} on '{}': read={} write={}", role, resource.name, read, write);
            Ok(())
        }
        AccessCommands::AddContact {
            kind,
            name,
            member_of,
        } => {
            let kind: ContactKind = kind.parse().map_err(anyhow::Error::msg)?;
            let id = ctx.db.create_contact(kind, name, *member_of)?;
            log!("access"; "created {} '{}' (id {})", kind, name, id);
            Ok(())
        }
        AccessCommands::Contact {
            resource,
            role_type,
            contact_id,
        } => {
            let resource = resolve_resource(ctx, resource)?;
            ctx.db.set_contact(resource.id, role_type, *contact_id)?;
            Ok(())
        }
        AccessCommands::Sync {
            relation,
            owner,
            members,
        } => {
            let membership = parse_membership(relation)?;
            let outcome = ctx.db.sync_membership(membership, *owner, members)?;
            log!("access"; "synced {}: +{} -{} ({} skipped)",
                relation, outcome.added, outcome.removed, outcome.skipped);
            Ok(())
        }
    }
}

pub fn run_tree(command: &TreeCommands, ctx: &AdminContext) -> Result<()> {
    match command {
        TreeCommands::Attach { resource, protocol } => {
            let resource = resolve_resource(ctx, resource)?;
            let protocol = parse_protocol(protocol)?;
            ctx.db.attach(resource.id, protocol)?;
            log!("tree"; "'{}' attached to {}", resource.name, protocol);
            Ok(())
        }
        TreeCommands::Detach { resource, protocol } => {
            let resource = resolve_resource(ctx, resource)?;
            let protocol = parse_protocol(protocol)?;
            ctx.db.detach(resource.id, protocol)?;
            log!("tree"; "'{}' detached from {}", resource.name, protocol);
            Ok(())
        }
        TreeCommands::SetChildren { group, children } => {
            let group = resolve_resource(ctx, group)?;
            if !group.kind.is_group() {
                bail!("'{}' is a {}, not a layer group", group.name, group.kind);
            }
            let entries: Vec<SubLayer> = children
                .iter()
                .enumerate()
                .map(|(position, child_id)| SubLayer {
                    child_id: *child_id,
                    position: position as i64,
                    active: true,
                })
                .collect();
            ctx.db.sync_sub_layers(group.id, &entries)?;
            log!("tree"; "'{}' now has {} sub-layer(s)", group.name, entries.len());
            Ok(())
        }
        TreeCommands::Ls { protocol } => {
            let protocol = parse_protocol(protocol)?;
            for node in ctx.db.collect_layers(protocol)? {
                let indent = "  ".repeat(node.depth);
                let marker = if node.active { "" } else { " (inactive)" };
                println!("{}{} {}{}", indent, node.id, node.name, marker.dimmed());
            }
            Ok(())
        }
    }
}

fn parse_protocol(arg: &str) -> Result<Protocol> {
    arg.parse::<Protocol>().map_err(anyhow::Error::msg)
}

fn parse_membership(arg: &str) -> Result<Membership> {
    match arg {
        "group-users" => Ok(Membership::GroupUsers),
        "group-roles" => Ok(Membership::GroupRoles),
        "role-users" => Ok(Membership::RoleUsers),
        other => bail!("unknown relation: {other} (expected group-users, group-roles, role-users)"),
    }
}
