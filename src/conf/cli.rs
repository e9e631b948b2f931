// Copyright 2026 Export Share Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::{conf::config::CliOverrides, defs};

#[derive(Parser, Debug)]
#[command(
    name = "export-share",
    version,
    about = "Share host directories with a development VM over NFS"
)]
pub struct Cli {
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
    /// Edit the exports file but do not touch nfsd
    #[arg(long = "dry-run")]
    pub dry_run: bool,
    #[arg(long = "exports")]
    pub exports_file: Option<PathBuf>,
    #[arg(long = "mount-ip")]
    pub mount_ip: Option<String>,
    #[arg(long)]
    pub uid: Option<u32>,
    #[arg(long)]
    pub gid: Option<u32>,
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            exports_file: self.exports_file.clone(),
            mount_ip: self.mount_ip.clone(),
            uid: self.uid,
            gid: self.gid,
            dry_run: self.dry_run,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Share a directory with the VM
    Add { path: String },
    /// Stop sharing a directory
    Remove { path: String },
    Exists {
        path: String,
        /// Match whole path tokens instead of any substring
        #[arg(long)]
        exact: bool,
    },
    List {
        /// Include rules for every identity
        #[arg(long)]
        all: bool,
        #[arg(long)]
        json: bool,
    },
    /// Run enable, checkexports and update against nfsd
    Reload,
    GenConfig {
        #[arg(short = 'o', long = "output", default_value = defs::CONFIG_FILE)]
        output: PathBuf,
    },
    ShowConfig,
}
