// Copyright 2026 Export Share Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    os::unix::fs::{OpenOptionsExt, PermissionsExt},
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

/// Writes `content` to a temp file beside `path`, syncs it and renames it over
/// `path`. Falls back to a plain copy when the rename is refused.
pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(
    path: P,
    content: C,
    mode: u32,
) -> io::Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let pid = std::process::id();
    let temp_name = format!(".{}_{}.tmp", pid, now);
    let temp_file = dir.join(temp_name);

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(mode)
            .open(&temp_file)?;
        file.write_all(content.as_ref())?;
        file.sync_all()?;
    }

    // umask may have stripped bits from the create mode
    if let Err(e) = fs::set_permissions(&temp_file, fs::Permissions::from_mode(mode)) {
        let _ = fs::remove_file(&temp_file);
        return Err(e);
    }

    if let Err(e) = fs::rename(&temp_file, path) {
        tracing::debug!("rename into {} failed ({}), copying", path.display(), e);
        let copied = fs::copy(&temp_file, path);
        let _ = fs::remove_file(&temp_file);
        copied?;
    }
    Ok(())
}

pub fn ensure_dir_exists<T: AsRef<Path>>(dir: T) -> io::Result<()> {
    if !dir.as_ref().exists() {
        fs::create_dir_all(&dir)?;
    }
    Ok(())
}
