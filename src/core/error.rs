// Copyright 2026 Export Share Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{io, path::PathBuf, time::Duration};

use thiserror::Error;

use crate::core::reload::ReloadStep;

#[derive(Error, Debug)]
pub enum ShareError {
    #[error("failed to read exports file {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write exports file {}: {source}", path.display())]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to lock {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("mount identity lookup failed: {0}")]
    Identity(#[from] IdentityError),

    /// The file was already written when the reload failed.
    #[error(
        "exports file was updated but the NFS server did not reload ({0}); \
         re-run the command or `export-share reload`"
    )]
    Reload(#[from] ReloadError),
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("no mount IP configured; set identity.mount_ip or pass --mount-ip")]
    MissingMountIp,

    #[error("failed to read provider file {}: {reason}", path.display())]
    ProviderFile { path: PathBuf, reason: String },

    #[error("invalid {var} value: {value:?}")]
    InvalidId { var: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum ReloadError {
    #[error("{step}: {output} ({status})")]
    StepFailed {
        step: ReloadStep,
        status: String,
        output: String,
    },

    #[error("{step}: timed out after {}s", timeout.as_secs())]
    TimedOut {
        step: ReloadStep,
        timeout: Duration,
        output: String,
    },

    #[error("{step}: cancelled")]
    Cancelled { step: ReloadStep },

    #[error("{step}: failed to run {program}: {source}")]
    Spawn {
        step: ReloadStep,
        program: String,
        #[source]
        source: io::Error,
    },
}

impl ReloadError {
    pub fn step(&self) -> ReloadStep {
        match self {
            Self::StepFailed { step, .. }
            | Self::TimedOut { step, .. }
            | Self::Cancelled { step }
            | Self::Spawn { step, .. } => *step,
        }
    }

    pub fn output(&self) -> Option<&str> {
        match self {
            Self::StepFailed { output, .. } | Self::TimedOut { output, .. } => Some(output),
            _ => None,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}
