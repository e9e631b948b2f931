// Copyright 2026 Export Share Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use serde::{Deserialize, Serialize};

use crate::core::{
    selector::MountSelector,
    store::ExportTable,
    validator::{DirProbe, clean_line},
};

/// What happens to a rule line once its last path has been removed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmptyRulePolicy {
    /// Keep ` <line_check>` in the file.
    #[default]
    Keep,
    /// Drop the line when nothing but the suffix is left.
    Prune,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareAction {
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareRequest {
    pub path: String,
    pub action: ShareAction,
}

impl ShareRequest {
    pub fn add(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            action: ShareAction::Add,
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            action: ShareAction::Remove,
        }
    }
}

pub struct EntryMerger<'a, P: DirProbe> {
    probe: &'a P,
    empty_rule: EmptyRulePolicy,
}

impl<'a, P: DirProbe> EntryMerger<'a, P> {
    pub fn new(probe: &'a P, empty_rule: EmptyRulePolicy) -> Self {
        Self { probe, empty_rule }
    }

    pub fn apply(&self, table: &mut ExportTable, request: &ShareRequest, selector: &MountSelector) {
        match request.action {
            ShareAction::Add => self.add(table, &request.path, selector),
            ShareAction::Remove => self.remove(table, &request.path, selector),
        }
    }

    /// Prepends `path` to the first line owned by `selector`, or appends a new
    /// rule when there is none. Existing paths are not deduplicated.
    pub fn add(&self, table: &mut ExportTable, path: &str, selector: &MountSelector) {
        let line_check = selector.line_check();

        match table
            .lines_mut()
            .iter_mut()
            .find(|line| line.contains(&line_check))
        {
            Some(line) => {
                let merged = format!("{} {}", path, line);
                *line = clean_line(&merged, &line_check, self.probe);
                tracing::debug!("Merged {} into existing rule: {}", path, line);
            }
            None => {
                let line = format!("{} {}", path, line_check);
                tracing::debug!("Appending new rule: {}", line);
                table.push(line);
            }
        }
    }

    /// Strips the first `"<path> "` from every line owned by `selector` and
    /// revalidates what is left.
    pub fn remove(&self, table: &mut ExportTable, path: &str, selector: &MountSelector) {
        let line_check = selector.line_check();
        let needle = format!("{} ", path);

        let lines = std::mem::take(table.lines_mut());
        let mut kept = Vec::with_capacity(lines.len());

        for line in lines {
            if !line.contains(&line_check) {
                kept.push(line);
                continue;
            }

            let stripped = line.replacen(&needle, "", 1);

            if self.empty_rule == EmptyRulePolicy::Prune && stripped == line_check {
                tracing::debug!("Pruning empty rule for {}", selector);
                continue;
            }

            kept.push(clean_line(&stripped, &line_check, self.probe));
        }

        *table.lines_mut() = kept;
    }
}
