// Copyright 2026 Export Share Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    fs::{self, File},
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use rustix::{
    fs::{FlockOperation, flock},
    io::Errno,
};

use crate::{
    core::{error::ShareError, selector::ExportRule},
    defs,
    utils::{self, CancelToken},
};

/// The export file as an ordered list of raw lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportTable {
    lines: Vec<String>,
}

impl ExportTable {
    pub fn from_content(content: &str) -> Self {
        if content.is_empty() {
            return Self::default();
        }
        Self {
            lines: content.split('\n').map(str::to_string).collect(),
        }
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn lines_mut(&mut self) -> &mut Vec<String> {
        &mut self.lines
    }

    pub fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    pub fn rules(&self) -> impl Iterator<Item = ExportRule> + '_ {
        self.lines.iter().filter_map(|line| ExportRule::parse(line))
    }
}

#[derive(Debug, Clone)]
pub struct ExportStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl ExportStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let lock_path = default_lock_path(&path);
        Self { path, lock_path }
    }

    pub fn with_lock_file<P: AsRef<Path>>(mut self, lock_path: P) -> Self {
        self.lock_path = lock_path.as_ref().to_path_buf();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<ExportTable, ShareError> {
        Ok(self.read()?.unwrap_or_default())
    }

    /// Like [`Self::load`], but `None` when the file does not exist.
    pub fn read(&self) -> Result<Option<ExportTable>, ShareError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("{} does not exist yet", self.path.display());
                return Ok(None);
            }
            Err(source) => {
                return Err(ShareError::ConfigRead {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let content = match String::from_utf8(raw) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(
                    "{} is not valid UTF-8; invalid bytes will be replaced on save",
                    self.path.display()
                );
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };

        Ok(Some(ExportTable::from_content(&content)))
    }

    /// True when the file can be read at all, empty or not.
    pub fn is_readable(&self) -> bool {
        File::open(&self.path).is_ok_and(|f| f.metadata().is_ok_and(|m| m.is_file()))
    }

    /// Writes the table back exactly as rendered, no newline is added.
    pub fn save(&self, table: &ExportTable) -> Result<(), ShareError> {
        utils::atomic_write(&self.path, table.render(), defs::EXPORTS_FILE_MODE).map_err(
            |source| ShareError::ConfigWrite {
                path: self.path.clone(),
                source,
            },
        )
    }

    /// Byte-level check for `"<path> "` anywhere in the file. There is no
    /// token boundary on the left, so `/data` also matches `/srv/data `.
    pub fn exists(&self, path: &str) -> bool {
        let needle = format!("{} ", path);
        fs::read(&self.path)
            .map(|content| {
                content
                    .windows(needle.len())
                    .any(|window| window == needle.as_bytes())
            })
            .unwrap_or(false)
    }

    /// Token-exact variant of [`Self::exists`].
    pub fn exists_exact(&self, path: &str) -> bool {
        self.load()
            .map(|table| table.rules().any(|rule| rule.paths.iter().any(|p| p == path)))
            .unwrap_or(false)
    }

    /// Takes the exclusive lock, polling so a cancelled `cancel` can abort a
    /// wait on another process's lock.
    pub fn lock(&self, cancel: &CancelToken) -> Result<ExportLock, ShareError> {
        let lock_err = |source: io::Error| ShareError::Lock {
            path: self.lock_path.clone(),
            source,
        };

        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(lock_err)?;

        let poll = Duration::from_millis(defs::LOCK_POLL_INTERVAL_MS);
        let mut waiting = false;

        loop {
            match flock(&file, FlockOperation::NonBlockingLockExclusive) {
                Ok(()) => break,
                Err(Errno::WOULDBLOCK) | Err(Errno::INTR) => {
                    if cancel.is_cancelled() {
                        return Err(lock_err(io::ErrorKind::Interrupted.into()));
                    }
                    if !waiting {
                        tracing::info!(
                            ">> Waiting for {} held by another process...",
                            self.lock_path.display()
                        );
                        waiting = true;
                    }
                    thread::sleep(poll);
                }
                Err(e) => return Err(lock_err(e.into())),
            }
        }

        tracing::debug!("Acquired export lock {}", self.lock_path.display());

        Ok(ExportLock { file })
    }
}

fn default_lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(defs::LOCK_SUFFIX);
    PathBuf::from(name)
}

/// Exclusive advisory lock held for one read-modify-write cycle.
pub struct ExportLock {
    file: File,
}

impl Drop for ExportLock {
    fn drop(&mut self) {
        let _ = flock(&self.file, FlockOperation::Unlock);
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn store_in(dir: &TempDir) -> ExportStore {
        ExportStore::new(dir.path().join("exports"))
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let table = store_in(&dir).load().unwrap();
        assert!(table.lines().is_empty());
    }

    #[test]
    fn load_directory_is_read_error() {
        let dir = TempDir::new().unwrap();
        let store = ExportStore::new(dir.path());
        assert!(matches!(store.load(), Err(ShareError::ConfigRead { .. })));
    }

    #[test]
    fn save_preserves_content_without_trailing_newline() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let table = ExportTable::from_content("# keep me\n/a 10.0.2.2 -alldirs -mapall=1:2");
        store.save(&table).unwrap();

        let written = fs::read_to_string(store.path()).unwrap();
        assert_eq!(written, "# keep me\n/a 10.0.2.2 -alldirs -mapall=1:2");
        assert_eq!(store.load().unwrap(), table);
    }

    #[test]
    fn trailing_newline_survives_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "/a 10.0.2.2 -alldirs -mapall=1:2\n").unwrap();

        let table = store.load().unwrap();
        assert_eq!(table.lines().len(), 2);
        store.save(&table).unwrap();

        assert_eq!(
            fs::read_to_string(store.path()).unwrap(),
            "/a 10.0.2.2 -alldirs -mapall=1:2\n"
        );
    }

    #[test]
    fn save_sets_export_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save(&ExportTable::from_content("x")).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, defs::EXPORTS_FILE_MODE);
    }

    #[test]
    fn exists_matches_path_suffix_without_left_boundary() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "/srv/data 10.0.2.2 -alldirs -mapall=501:20").unwrap();

        assert!(store.exists("/srv/data"));
        assert!(store.exists("/data"));
        assert!(!store.exists("/srv"));
    }

    #[test]
    fn exists_needs_trailing_space() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "/data2 10.0.2.2 -alldirs -mapall=501:20").unwrap();

        assert!(store.exists("/data2"));
        assert!(!store.exists("/data"));
    }

    #[test]
    fn exists_exact_matches_whole_tokens() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "/srv/data 10.0.2.2 -alldirs -mapall=501:20").unwrap();

        assert!(store.exists_exact("/srv/data"));
        assert!(!store.exists_exact("/data"));
    }

    #[test]
    fn exists_searches_non_utf8_files() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(
            store.path(),
            b"# caf\xe9\n/data 10.0.2.2 -alldirs -mapall=501:20",
        )
        .unwrap();

        assert!(store.exists("/data"));
    }

    #[test]
    fn load_non_utf8_file_replaces_bad_bytes() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(
            store.path(),
            b"# caf\xe9\n/data 10.0.2.2 -alldirs -mapall=501:20",
        )
        .unwrap();

        let table = store.load().unwrap();
        assert_eq!(table.lines()[0], "# caf\u{fffd}");
        assert_eq!(table.lines()[1], "/data 10.0.2.2 -alldirs -mapall=501:20");
    }

    #[test]
    fn read_distinguishes_missing_from_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.read().unwrap().is_none());
        assert!(!store.is_readable());

        fs::write(store.path(), "").unwrap();
        assert_eq!(store.read().unwrap(), Some(ExportTable::default()));
        assert!(store.is_readable());
    }

    #[test]
    fn exists_on_missing_file_is_false() {
        let dir = TempDir::new().unwrap();
        assert!(!store_in(&dir).exists("/data"));
    }

    #[test]
    fn lock_file_defaults_next_to_exports() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let guard = store.lock(&CancelToken::new()).unwrap();
        assert!(dir.path().join("exports.lock").exists());
        drop(guard);

        // released on drop, so it can be taken again
        let _again = store.lock(&CancelToken::new()).unwrap();
    }

    #[test]
    fn held_lock_excludes_other_holders() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let lock_path = dir.path().join("exports.lock");

        let guard = store.lock(&CancelToken::new()).unwrap();

        let other = File::open(&lock_path).unwrap();
        assert_eq!(
            flock(&other, FlockOperation::NonBlockingLockExclusive),
            Err(Errno::WOULDBLOCK)
        );

        drop(guard);
        assert_eq!(flock(&other, FlockOperation::NonBlockingLockExclusive), Ok(()));
    }

    #[test]
    fn cancelled_wait_on_held_lock_gives_up() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let _guard = store.lock(&CancelToken::new()).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();

        match store.lock(&cancel) {
            Err(ShareError::Lock { source, .. }) => {
                assert_eq!(source.kind(), ErrorKind::Interrupted)
            }
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("lock taken while held"),
        }
    }
}
