// Copyright 2026 Export Share Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{fmt, sync::OnceLock};

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::defs;

static RULE_REGEX: OnceLock<Regex> = OnceLock::new();

/// Identifies the export line a share request belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountSelector {
    pub mount_ip: String,
    pub uid: u32,
    pub gid: u32,
}

impl MountSelector {
    pub fn new(mount_ip: impl Into<String>, uid: u32, gid: u32) -> Self {
        Self {
            mount_ip: mount_ip.into(),
            uid,
            gid,
        }
    }

    /// Rule suffix shared by every line owned by this selector:
    /// `<mount_ip> -alldirs -mapall=<uid>:<gid>`.
    pub fn line_check(&self) -> String {
        format!(
            "{} {} {}{}:{}",
            self.mount_ip,
            defs::ALLDIRS_FLAG,
            defs::MAPALL_FLAG,
            self.uid,
            self.gid
        )
    }
}

impl fmt::Display for MountSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.mount_ip, self.uid, self.gid)
    }
}

/// Structured view of a rule line. Only used for reporting and exact
/// lookups; merging works on the raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRule {
    pub paths: Vec<String>,
    pub selector: MountSelector,
}

impl ExportRule {
    pub fn parse(line: &str) -> Option<Self> {
        let re = RULE_REGEX.get_or_init(|| {
            Regex::new(r"^(.*?)\s*(\S+) -alldirs -mapall=(\d+):(\d+)$")
                .expect("Invalid Regex pattern")
        });

        let caps = re.captures(line)?;
        let uid = caps[3].parse().ok()?;
        let gid = caps[4].parse().ok()?;

        Some(Self {
            paths: caps[1].split_whitespace().map(str::to_string).collect(),
            selector: MountSelector::new(&caps[2], uid, gid),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
