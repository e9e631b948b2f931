// Copyright 2026 Export Share Developers
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod cli;
pub mod cli_handlers;
pub mod config;
