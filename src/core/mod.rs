// Copyright 2026 Export Share Developers
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod error;
pub mod identity;
pub mod merger;
pub mod reload;
pub mod selector;
pub mod share;
pub mod store;
pub mod validator;

pub use share::ShareManager;
