// Copyright 2026 Export Share Developers
// SPDX-License-Identifier: GPL-3.0-or-later
mod conf;
mod core;
mod defs;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use conf::{
    cli::{Cli, Commands},
    cli_handlers,
};
use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::GenConfig { output } = &cli.command {
        return cli_handlers::handle_gen_config(output);
    }

    let mut config = cli_handlers::load_config(&cli)?;
    config.merge_with_cli(cli.overrides());

    let _log_guard = utils::init_logging(cli.verbose, config.log_file.as_deref())
        .context("Failed to initialize logging")?;

    if config.dry_run {
        tracing::info!(":: DRY-RUN :: nfsd will not be called");
    }

    tracing::debug!("Exports file: {}", config.exports_file.display());

    let cancel = utils::cancel_on_interrupt().context("Failed to install signal handlers")?;
    let mut manager = cli_handlers::build_manager(&config, cancel);

    match &cli.command {
        Commands::Add { path } => cli_handlers::handle_add(&mut manager, path)?,
        Commands::Remove { path } => cli_handlers::handle_remove(&mut manager, path)?,
        Commands::Exists { path, exact } => cli_handlers::handle_exists(&manager, path, *exact)?,
        Commands::List { all, json } => cli_handlers::handle_list(&manager, *all, *json)?,
        Commands::Reload => cli_handlers::handle_reload(&mut manager)?,
        Commands::ShowConfig => cli_handlers::handle_show_config(&config)?,
        Commands::GenConfig { .. } => {}
    }

    Ok(())
}
