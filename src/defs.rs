// Copyright 2026 Export Share Developers
// SPDX-License-Identifier: GPL-3.0-or-later

// Export table
pub const EXPORTS_FILE: &str = "/etc/exports";
pub const LOCK_SUFFIX: &str = "lock";
pub const EXPORTS_FILE_MODE: u32 = 0o644;
pub const LOCK_POLL_INTERVAL_MS: u64 = 100;

// Rule suffix flags, rendered after the mount IP
pub const ALLDIRS_FLAG: &str = "-alldirs";
pub const MAPALL_FLAG: &str = "-mapall=";

// Config
pub const CONFIG_FILE: &str = "/etc/export-share/config.toml";

// Reload protocol
pub const NFSD_BIN: &str = "nfsd";
pub const NFSD_ENABLE: &str = "enable";
pub const NFSD_CHECK: &str = "checkexports";
pub const NFSD_UPDATE: &str = "update";
pub const DEFAULT_RELOAD_TIMEOUT_SECS: u64 = 30;
pub const MAX_RELOAD_RETRIES: u32 = 1;
pub const STEP_POLL_INTERVAL_MS: u64 = 25;
// How long to wait for output still in the pipe once the step is over
pub const STEP_OUTPUT_GRACE_MS: u64 = 200;

// sudo hands the invoking user's ids down through these
pub const SUDO_UID_VAR: &str = "SUDO_UID";
pub const SUDO_GID_VAR: &str = "SUDO_GID";
