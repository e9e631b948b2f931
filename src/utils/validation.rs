// Copyright 2026 Export Share Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use anyhow::{Result, bail};

/// Export lines are space separated, so a path with whitespace in it would
/// be split into bogus tokens on the next load.
pub fn validate_share_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("Share path must not be empty");
    }
    if path.chars().any(char::is_whitespace) {
        bail!("Invalid share path: '{path}'. Paths containing whitespace cannot be exported");
    }
    Ok(())
}
