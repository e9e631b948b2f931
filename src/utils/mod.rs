// Copyright 2026 Export Share Developers
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod fs;
pub mod log;
pub mod process;
pub mod validation;

pub use self::{fs::*, log::*, process::*, validation::*};
