// Copyright 2026 Export Share Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{core::merger::EmptyRulePolicy, defs};

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct IdentityConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_file: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_exports_file")]
    pub exports_file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_file: Option<PathBuf>,
    #[serde(default = "default_nfsd")]
    pub nfsd: PathBuf,
    #[serde(default = "default_reload_timeout_secs")]
    pub reload_timeout_secs: u64,
    #[serde(default)]
    pub reload_retries: u32,
    #[serde(default)]
    pub empty_rule: EmptyRulePolicy,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub identity: IdentityConfig,
}

fn default_exports_file() -> PathBuf {
    PathBuf::from(defs::EXPORTS_FILE)
}

fn default_nfsd() -> PathBuf {
    PathBuf::from(defs::NFSD_BIN)
}

fn default_reload_timeout_secs() -> u64 {
    defs::DEFAULT_RELOAD_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exports_file: default_exports_file(),
            lock_file: None,
            nfsd: default_nfsd(),
            reload_timeout_secs: default_reload_timeout_secs(),
            reload_retries: 0,
            empty_rule: EmptyRulePolicy::default(),
            dry_run: false,
            log_file: None,
            identity: IdentityConfig::default(),
        }
    }
}

/// Values passed on the command line; `None` leaves the file value alone.
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub exports_file: Option<PathBuf>,
    pub mount_ip: Option<String>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub dry_run: bool,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).context("failed to read config file")?;

        let config: Config = toml::from_str(&content).context("failed to parse config file")?;

        Ok(config)
    }

    pub fn load_default() -> Result<Self> {
        Self::from_file(defs::CONFIG_FILE)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("failed to serialize config")?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).context("failed to create config directory")?;
        }

        fs::write(path.as_ref(), content).context("failed to write config file")?;

        Ok(())
    }

    pub fn merge_with_cli(&mut self, overrides: CliOverrides) {
        if let Some(file) = overrides.exports_file {
            self.exports_file = file;
        }

        if let Some(ip) = overrides.mount_ip {
            self.identity.mount_ip = Some(ip);
        }

        if let Some(uid) = overrides.uid {
            self.identity.uid = Some(uid);
        }

        if let Some(gid) = overrides.gid {
            self.identity.gid = Some(gid);
        }

        if overrides.dry_run {
            self.dry_run = true;
        }
    }

    pub fn reload_timeout(&self) -> Duration {
        Duration::from_secs(self.reload_timeout_secs.max(1))
    }
}
