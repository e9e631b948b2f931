// Copyright 2026 Export Share Developers
// SPDX-License-Identifier: GPL-3.0-or-later

//! Drives the NFS server through `enable`, `checkexports` and `update` after
//! the export file changed. Steps run strictly in order and the first failure
//! ends the sequence.

use std::{ffi::OsString, fmt, time::Duration};

#[cfg(test)]
use mockall::automock;

use crate::{
    core::error::ReloadError,
    defs,
    utils::{CancelToken, Completion, run_bounded},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadStep {
    Enable,
    Check,
    Update,
}

impl ReloadStep {
    pub const SEQUENCE: [ReloadStep; 3] = [Self::Enable, Self::Check, Self::Update];

    pub fn verb(self) -> &'static str {
        match self {
            Self::Enable => defs::NFSD_ENABLE,
            Self::Check => defs::NFSD_CHECK,
            Self::Update => defs::NFSD_UPDATE,
        }
    }

    fn running_state(self) -> ReloadState {
        match self {
            Self::Enable => ReloadState::Enabling,
            Self::Check => ReloadState::Validating,
            Self::Update => ReloadState::Updating,
        }
    }
}

impl fmt::Display for ReloadStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadState {
    Idle,
    Enabling,
    Validating,
    Updating,
    Done,
    Failed(ReloadStep),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutput {
    pub success: bool,
    pub status: String,
    pub output: String,
}

/// External surface that executes a single reload step.
#[cfg_attr(test, automock)]
pub trait ReloadSurface {
    fn run(&self, step: ReloadStep, cancel: &CancelToken) -> Result<StepOutput, ReloadError>;
}

/// Runs `<nfsd> <verb>` for each step.
#[derive(Debug, Clone)]
pub struct NfsdSurface {
    program: OsString,
    timeout: Duration,
}

impl NfsdSurface {
    pub fn new(program: impl Into<OsString>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl Default for NfsdSurface {
    fn default() -> Self {
        Self::new(
            defs::NFSD_BIN,
            Duration::from_secs(defs::DEFAULT_RELOAD_TIMEOUT_SECS),
        )
    }
}

impl ReloadSurface for NfsdSurface {
    fn run(&self, step: ReloadStep, cancel: &CancelToken) -> Result<StepOutput, ReloadError> {
        let result = run_bounded(&self.program, &[step.verb()], self.timeout, cancel).map_err(
            |source| ReloadError::Spawn {
                step,
                program: self.program.to_string_lossy().into_owned(),
                source,
            },
        )?;

        match result.completion {
            Completion::Exited(status) => Ok(StepOutput {
                success: status.success(),
                status: status.to_string(),
                output: result.combined,
            }),
            Completion::TimedOut => Err(ReloadError::TimedOut {
                step,
                timeout: self.timeout,
                output: result.combined,
            }),
            Completion::Cancelled => Err(ReloadError::Cancelled { step }),
        }
    }
}

pub struct ReloadDriver<S: ReloadSurface> {
    surface: S,
    dry_run: bool,
    retries: u32,
    cancel: CancelToken,
    state: ReloadState,
}

impl<S: ReloadSurface> ReloadDriver<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            dry_run: false,
            retries: 0,
            cancel: CancelToken::new(),
            state: ReloadState::Idle,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Extra attempts for a step that timed out. Capped at one.
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries.min(defs::MAX_RELOAD_RETRIES);
        self
    }

    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn state(&self) -> ReloadState {
        self.state
    }

    pub fn apply(&mut self) -> Result<(), ReloadError> {
        self.state = ReloadState::Idle;

        for step in ReloadStep::SEQUENCE {
            self.state = step.running_state();

            if let Err(e) = self.run_step(step) {
                if let Some(output) = e.output().filter(|o| !o.is_empty()) {
                    tracing::debug!("nfsd {} output:\n{}", step, output);
                }
                tracing::error!("Reload failed at `{}`: {}", step, e);
                self.state = ReloadState::Failed(step);
                return Err(e);
            }
        }

        self.state = ReloadState::Done;
        tracing::info!(">> NFS exports reloaded.");
        Ok(())
    }

    fn run_step(&self, step: ReloadStep) -> Result<(), ReloadError> {
        if self.cancel.is_cancelled() {
            return Err(ReloadError::Cancelled { step });
        }

        if self.dry_run {
            tracing::info!("[dry-run] would run nfsd {}", step);
            return Ok(());
        }

        tracing::debug!("Running nfsd {}", step);

        let mut attempt = 0;
        let out = loop {
            match self.surface.run(step, &self.cancel) {
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    tracing::warn!("{}; retrying ({}/{})", e, attempt, self.retries);
                }
                other => break other?,
            }
        };

        if !out.success {
            return Err(ReloadError::StepFailed {
                step,
                status: out.status,
                output: out.output,
            });
        }

        Ok(())
    }
}
