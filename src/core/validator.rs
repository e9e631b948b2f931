// Copyright 2026 Export Share Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::fs;

/// Directory existence check used when revalidating shared paths.
pub trait DirProbe {
    fn is_dir(&self, path: &str) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HostFs;

impl DirProbe for HostFs {
    fn is_dir(&self, path: &str) -> bool {
        if path.is_empty() {
            return false;
        }
        fs::metadata(path).is_ok_and(|meta| meta.is_dir())
    }
}

/// Drops every path token of `line` that is not an existing directory and
/// re-renders it as `<surviving paths> <line_check>`.
///
/// The first occurrence of `line_check` is cut out before splitting, so any
/// text that follows it is treated as path tokens too.
pub fn clean_line(line: &str, line_check: &str, probe: &impl DirProbe) -> String {
    let stripped = line.replacen(line_check, "", 1);

    let good_paths: Vec<&str> = stripped
        .split(' ')
        .filter(|path| {
            let keep = probe.is_dir(path);
            if !keep && !path.is_empty() {
                tracing::debug!("Dropping stale share path: {}", path);
            }
            keep
        })
        .collect();

    format!("{} {}", good_paths.join(" "), line_check)
}
