// Copyright 2026 Export Share Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{
    conf::config::IdentityConfig,
    core::{error::IdentityError, selector::MountSelector},
    defs,
};

pub trait MountIdentityProvider {
    fn mount_selector(&self) -> Result<MountSelector, IdentityError>;
}

/// State written by the VM provider once its host-only network is up.
#[derive(Debug, Deserialize)]
struct ProviderState {
    mount_ip: String,
}

/// Resolves the selector from config, falling back to the provider state file
/// for the IP and to the (sudo) caller for uid/gid.
#[derive(Debug, Clone, Default)]
pub struct ConfigIdentity {
    mount_ip: Option<String>,
    uid: Option<u32>,
    gid: Option<u32>,
    provider_file: Option<PathBuf>,
}

impl ConfigIdentity {
    pub fn from_config(config: &IdentityConfig) -> Self {
        Self {
            mount_ip: config.mount_ip.clone(),
            uid: config.uid,
            gid: config.gid,
            provider_file: config.provider_file.clone(),
        }
    }

    fn resolve_mount_ip(&self) -> Result<String, IdentityError> {
        if let Some(ip) = self.mount_ip.as_deref().filter(|ip| !ip.trim().is_empty()) {
            return Ok(ip.trim().to_string());
        }

        match &self.provider_file {
            Some(path) => read_provider_ip(path),
            None => Err(IdentityError::MissingMountIp),
        }
    }
}

impl MountIdentityProvider for ConfigIdentity {
    fn mount_selector(&self) -> Result<MountSelector, IdentityError> {
        let mount_ip = self.resolve_mount_ip()?;

        let uid = match self.uid {
            Some(uid) => uid,
            None => caller_id(defs::SUDO_UID_VAR, || rustix::process::getuid().as_raw())?,
        };
        let gid = match self.gid {
            Some(gid) => gid,
            None => caller_id(defs::SUDO_GID_VAR, || rustix::process::getgid().as_raw())?,
        };

        Ok(MountSelector::new(mount_ip, uid, gid))
    }
}

fn read_provider_ip(path: &Path) -> Result<String, IdentityError> {
    let provider_err = |reason: String| IdentityError::ProviderFile {
        path: path.to_path_buf(),
        reason,
    };

    let content = fs::read_to_string(path).map_err(|e| provider_err(e.to_string()))?;
    let state: ProviderState =
        serde_json::from_str(&content).map_err(|e| provider_err(e.to_string()))?;

    if state.mount_ip.trim().is_empty() {
        return Err(IdentityError::MissingMountIp);
    }

    Ok(state.mount_ip.trim().to_string())
}

/// Prefers the id sudo passed down so shares stay owned by the invoking user.
fn caller_id(var: &'static str, current: impl FnOnce() -> u32) -> Result<u32, IdentityError> {
    match env::var(var) {
        Ok(value) if !value.is_empty() => value
            .trim()
            .parse()
            .map_err(|_| IdentityError::InvalidId { var, value }),
        _ => Ok(current()),
    }
}
