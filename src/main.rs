//! Geoconf - configuration admin tool for a geodata publishing platform.

#![allow(dead_code)]

mod cli;
mod config;
mod error;
mod ingest;
mod logger;
mod ops;
mod registry;
mod store;
mod style;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::AdminConfig;
use ops::AdminContext;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    // Init bootstraps the config file itself; everything else needs one
    if cli.is_init() {
        return cli::init::init_workspace(&cli.config);
    }

    let config = AdminConfig::load(&cli.config)?;
    let ctx = AdminContext::new(&config)?;

    match &cli.command {
        Commands::Init => unreachable!("handled above"),
        Commands::Style(command) => cli::documents::run_style(command, &ctx),
        Commands::Layout(command) => cli::documents::run_layout(command, &ctx),
        Commands::Resource(command) => cli::registry::run_resource(command, &ctx),
        Commands::Access(command) => cli::registry::run_access(command, &ctx),
        Commands::Tree(command) => cli::registry::run_tree(command, &ctx),
    }
}
