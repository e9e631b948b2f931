// Copyright 2026 Export Share Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::Path;

use anyhow::{Context, Result};

use crate::{
    conf::{cli::Cli, config::Config},
    core::{
        ShareManager,
        identity::ConfigIdentity,
        reload::{NfsdSurface, ReloadDriver},
        store::ExportStore,
        validator::HostFs,
    },
    defs,
    utils::{self, CancelToken},
};

pub type HostShareManager = ShareManager<ConfigIdentity, HostFs, NfsdSurface>;

pub fn load_config(cli: &Cli) -> Result<Config> {
    if let Some(config_path) = &cli.config {
        return Config::from_file(config_path).with_context(|| {
            format!(
                "Failed to load config from custom path: {}",
                config_path.display()
            )
        });
    }

    match Config::load_default() {
        Ok(config) => Ok(config),
        Err(e) => {
            let is_not_found = e
                .root_cause()
                .downcast_ref::<std::io::Error>()
                .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                .unwrap_or(false);

            if is_not_found {
                Ok(Config::default())
            } else {
                Err(e).context(format!(
                    "Failed to load default config from {}",
                    defs::CONFIG_FILE
                ))
            }
        }
    }
}

pub fn build_manager(config: &Config, cancel: CancelToken) -> HostShareManager {
    let mut store = ExportStore::new(&config.exports_file);
    if let Some(lock_file) = &config.lock_file {
        store = store.with_lock_file(lock_file);
    }

    let reloader = ReloadDriver::new(NfsdSurface::new(&config.nfsd, config.reload_timeout()))
        .dry_run(config.dry_run)
        .retries(config.reload_retries)
        .cancel_token(cancel);

    ShareManager::new(
        store,
        ConfigIdentity::from_config(&config.identity),
        HostFs,
        reloader,
    )
    .empty_rule(config.empty_rule)
}

pub fn handle_add(manager: &mut HostShareManager, path: &str) -> Result<()> {
    utils::validate_share_path(path)?;

    manager
        .add(path)
        .with_context(|| format!("Failed to share {}", path))?;

    println!("Shared {}", path);
    Ok(())
}

pub fn handle_remove(manager: &mut HostShareManager, path: &str) -> Result<()> {
    utils::validate_share_path(path)?;

    manager
        .remove(path)
        .with_context(|| format!("Failed to unshare {}", path))?;

    println!("Unshared {}", path);
    Ok(())
}

pub fn handle_exists(manager: &HostShareManager, path: &str, exact: bool) -> Result<()> {
    let found = if exact {
        manager.exists_exact(path)
    } else {
        manager.exists(path)
    };

    println!("{}", found);
    Ok(())
}

pub fn handle_list(manager: &HostShareManager, all: bool, json: bool) -> Result<()> {
    let rules = manager.list(all).context("Failed to list export rules")?;

    if json {
        let json = serde_json::to_string(&rules).context("Failed to serialize export rules")?;
        println!("{}", json);
        return Ok(());
    }

    if rules.is_empty() {
        println!("No shares in {}", manager.store().path().display());
        return Ok(());
    }

    for rule in rules {
        println!("{}", rule.selector);
        if rule.is_empty() {
            println!("    (empty rule)");
        }
        for path in &rule.paths {
            println!("    {}", path);
        }
    }
    Ok(())
}

pub fn handle_reload(manager: &mut HostShareManager) -> Result<()> {
    let result = manager.reload();
    tracing::debug!("Reload finished in state {:?}", manager.reloader().state());
    result.context("Failed to reload NFS exports")
}

pub fn handle_gen_config(output: &Path) -> Result<()> {
    Config::default()
        .save_to_file(output)
        .with_context(|| format!("Failed to save generated config to {}", output.display()))
}

pub fn handle_show_config(config: &Config) -> Result<()> {
    let json = serde_json::to_string(config).context("Failed to serialize config to JSON")?;

    println!("{}", json);

    Ok(())
}
