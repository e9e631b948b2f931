// Copyright 2026 Export Share Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::core::{
    error::ShareError,
    identity::MountIdentityProvider,
    merger::{EmptyRulePolicy, EntryMerger, ShareAction, ShareRequest},
    reload::{ReloadDriver, ReloadSurface},
    selector::ExportRule,
    store::ExportStore,
    validator::DirProbe,
};

/// Entry point for share commands: keeps the export table in sync for the
/// current mount identity and reloads the server after each change.
pub struct ShareManager<I, P, S>
where
    I: MountIdentityProvider,
    P: DirProbe,
    S: ReloadSurface,
{
    store: ExportStore,
    identity: I,
    probe: P,
    reloader: ReloadDriver<S>,
    empty_rule: EmptyRulePolicy,
}

impl<I, P, S> ShareManager<I, P, S>
where
    I: MountIdentityProvider,
    P: DirProbe,
    S: ReloadSurface,
{
    pub fn new(store: ExportStore, identity: I, probe: P, reloader: ReloadDriver<S>) -> Self {
        Self {
            store,
            identity,
            probe,
            reloader,
            empty_rule: EmptyRulePolicy::default(),
        }
    }

    pub fn empty_rule(mut self, policy: EmptyRulePolicy) -> Self {
        self.empty_rule = policy;
        self
    }

    pub fn store(&self) -> &ExportStore {
        &self.store
    }

    pub fn reloader(&self) -> &ReloadDriver<S> {
        &self.reloader
    }

    pub fn exists(&self, path: &str) -> bool {
        self.store.exists(path)
    }

    pub fn exists_exact(&self, path: &str) -> bool {
        self.store.exists_exact(path)
    }

    pub fn add(&mut self, path: &str) -> Result<(), ShareError> {
        self.submit(ShareRequest::add(path))
    }

    pub fn remove(&mut self, path: &str) -> Result<(), ShareError> {
        self.submit(ShareRequest::remove(path))
    }

    pub fn submit(&mut self, request: ShareRequest) -> Result<(), ShareError> {
        let selector = self.identity.mount_selector()?;

        tracing::info!(
            ">> {:?} share {} for {}",
            request.action,
            request.path,
            selector
        );

        {
            let _lock = match (self.store.lock(self.reloader.cancel()), request.action) {
                (Ok(lock), _) => lock,
                (Err(e), ShareAction::Remove) if !self.store.is_readable() => {
                    tracing::error!("{}; nothing to remove", e);
                    return Ok(());
                }
                (Err(e), _) => return Err(e),
            };

            let mut table = match (self.store.read(), request.action) {
                (Ok(Some(table)), _) => table,
                (Ok(None), ShareAction::Add) => Default::default(),
                (Ok(None), ShareAction::Remove) => {
                    tracing::debug!(
                        "{} does not exist; nothing to remove",
                        self.store.path().display()
                    );
                    return Ok(());
                }
                (Err(e), ShareAction::Add) => return Err(e),
                (Err(e), ShareAction::Remove) => {
                    tracing::error!("{}; nothing to remove", e);
                    return Ok(());
                }
            };

            EntryMerger::new(&self.probe, self.empty_rule).apply(&mut table, &request, &selector);

            self.store.save(&table)?;
            tracing::debug!("Saved {}", self.store.path().display());
        }

        self.reload()
    }

    pub fn reload(&mut self) -> Result<(), ShareError> {
        self.reloader.apply()?;
        Ok(())
    }

    /// Rules in the export file, limited to the current identity unless
    /// `all` is set.
    pub fn list(&self, all: bool) -> Result<Vec<ExportRule>, ShareError> {
        let table = self.store.load()?;

        if all {
            return Ok(table.rules().collect());
        }

        let selector = self.identity.mount_selector()?;
        Ok(table.rules().filter(|rule| rule.selector == selector).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::core::{
        error::{IdentityError, ReloadError},
        reload::{MockReloadSurface, ReloadState, ReloadStep, StepOutput},
        selector::MountSelector,
        validator::HostFs,
    };

    struct FixedIdentity(Option<MountSelector>);

    impl MountIdentityProvider for FixedIdentity {
        fn mount_selector(&self) -> Result<MountSelector, IdentityError> {
            self.0.clone().ok_or(IdentityError::MissingMountIp)
        }
    }

    fn selector() -> MountSelector {
        MountSelector::new("10.0.2.2", 501, 20)
    }

    fn ok_surface(expected_runs: usize) -> MockReloadSurface {
        let mut mock = MockReloadSurface::new();
        mock.expect_run().times(expected_runs).returning(|_, _| {
            Ok(StepOutput {
                success: true,
                status: "exit status: 0".to_string(),
                output: String::new(),
            })
        });
        mock
    }

    fn manager(
        dir: &TempDir,
        identity: Option<MountSelector>,
        surface: MockReloadSurface,
    ) -> ShareManager<FixedIdentity, HostFs, MockReloadSurface> {
        ShareManager::new(
            ExportStore::new(dir.path().join("exports")),
            FixedIdentity(identity),
            HostFs,
            ReloadDriver::new(surface),
        )
    }

    fn mkdir(dir: &TempDir, name: &str) -> String {
        let path = dir.path().join(name);
        fs::create_dir(&path).unwrap();
        path.to_str().unwrap().to_string()
    }

    fn read(dir: &TempDir) -> String {
        fs::read_to_string(dir.path().join("exports")).unwrap()
    }

    #[test]
    fn add_add_remove_scenario() {
        let dir = TempDir::new().unwrap();
        let app = mkdir(&dir, "app");
        let app2 = mkdir(&dir, "app2");
        let check = selector().line_check();
        fs::write(dir.path().join("exports"), &check).unwrap();

        let mut mgr = manager(&dir, Some(selector()), ok_surface(9));

        mgr.add(&app).unwrap();
        assert_eq!(read(&dir), format!("{app} {check}"));

        mgr.add(&app2).unwrap();
        assert_eq!(read(&dir), format!("{app2} {app} {check}"));

        mgr.remove(&app).unwrap();
        assert_eq!(read(&dir), format!("{app2} {check}"));

        assert!(mgr.exists(&app2));
        assert_eq!(mgr.reloader().state(), ReloadState::Done);
    }

    #[test]
    fn remove_on_missing_file_succeeds_without_reload() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager(&dir, Some(selector()), ok_surface(0));

        mgr.remove("/Users/me/app").unwrap();

        assert!(!dir.path().join("exports").exists());
        assert_eq!(mgr.reloader().state(), ReloadState::Idle);
    }

    #[test]
    fn remove_when_lock_cannot_be_created_succeeds() {
        let dir = TempDir::new().unwrap();
        let mut mgr = ShareManager::new(
            ExportStore::new(dir.path().join("nodir").join("exports")),
            FixedIdentity(Some(selector())),
            HostFs,
            ReloadDriver::new(ok_surface(0)),
        );

        mgr.remove("/Users/me/app").unwrap();
        assert_eq!(mgr.reloader().state(), ReloadState::Idle);
    }

    #[test]
    fn add_when_lock_cannot_be_created_fails() {
        let dir = TempDir::new().unwrap();
        let mut mgr = ShareManager::new(
            ExportStore::new(dir.path().join("nodir").join("exports")),
            FixedIdentity(Some(selector())),
            HostFs,
            ReloadDriver::new(ok_surface(0)),
        );

        let err = mgr.add("/Users/me/app").unwrap_err();
        assert!(matches!(err, ShareError::Lock { .. }));
    }

    #[test]
    fn remove_on_empty_file_rewrites_and_reloads() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("exports"), "").unwrap();

        let mut mgr = manager(&dir, Some(selector()), ok_surface(3));
        mgr.remove("/Users/me/app").unwrap();

        assert_eq!(read(&dir), "");
        assert_eq!(mgr.reloader().state(), ReloadState::Done);
    }

    #[test]
    fn remove_on_unreadable_file_is_swallowed() {
        let dir = TempDir::new().unwrap();
        let mut mgr = ShareManager::new(
            ExportStore::new(dir.path()).with_lock_file(dir.path().join("lock")),
            FixedIdentity(Some(selector())),
            HostFs,
            ReloadDriver::new(ok_surface(0)),
        );

        mgr.remove("/Users/me/app").unwrap();
    }

    #[test]
    fn add_on_unreadable_file_propagates() {
        let dir = TempDir::new().unwrap();
        let mut mgr = ShareManager::new(
            ExportStore::new(dir.path()).with_lock_file(dir.path().join("lock")),
            FixedIdentity(Some(selector())),
            HostFs,
            ReloadDriver::new(ok_surface(0)),
        );

        let err = mgr.add("/Users/me/app").unwrap_err();
        assert!(matches!(err, ShareError::ConfigRead { .. }));
    }

    #[test]
    fn add_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager(&dir, Some(selector()), ok_surface(3));

        mgr.add("/Users/me/app").unwrap();

        assert_eq!(
            read(&dir),
            "/Users/me/app 10.0.2.2 -alldirs -mapall=501:20"
        );
    }

    #[test]
    fn identity_failure_aborts_before_touching_file() {
        let dir = TempDir::new().unwrap();
        let original = "/srv -ro";
        fs::write(dir.path().join("exports"), original).unwrap();

        let mut mgr = manager(&dir, None, ok_surface(0));

        assert!(matches!(mgr.add("/x"), Err(ShareError::Identity(_))));
        assert!(matches!(mgr.remove("/x"), Err(ShareError::Identity(_))));
        assert_eq!(read(&dir), original);
    }

    #[test]
    fn reload_failure_keeps_written_file_and_names_step() {
        let dir = TempDir::new().unwrap();

        let mut mock = MockReloadSurface::new();
        mock.expect_run().times(1).returning(|step, _| {
            Ok(StepOutput {
                success: step != ReloadStep::Enable,
                status: "exit status: 1".to_string(),
                output: "nfsd: permission denied".to_string(),
            })
        });

        let mut mgr = manager(&dir, Some(selector()), mock);
        let err = mgr.add("/Users/me/app").unwrap_err();

        match &err {
            ShareError::Reload(ReloadError::StepFailed { step, output, .. }) => {
                assert_eq!(*step, ReloadStep::Enable);
                assert_eq!(output, "nfsd: permission denied");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("re-run"));
        assert_eq!(read(&dir), "/Users/me/app 10.0.2.2 -alldirs -mapall=501:20");
    }

    #[test]
    fn selectors_do_not_interfere() {
        let dir = TempDir::new().unwrap();
        let shared = mkdir(&dir, "shared");
        let other = format!("{shared} 10.0.2.2 -alldirs -mapall=502:20");
        fs::write(dir.path().join("exports"), &other).unwrap();

        let mut mgr = manager(&dir, Some(selector()), ok_surface(3));
        mgr.add(&shared).unwrap();

        let content = read(&dir);
        let lines: Vec<&str> = content.split('\n').collect();
        assert_eq!(lines[0], other);
        assert_eq!(lines[1], format!("{shared} 10.0.2.2 -alldirs -mapall=501:20"));
    }

    #[test]
    fn list_filters_by_identity() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("exports"),
            "/a 10.0.2.2 -alldirs -mapall=501:20\n/b 10.0.2.2 -alldirs -mapall=0:0\n# note",
        )
        .unwrap();

        let mgr = manager(&dir, Some(selector()), ok_surface(0));

        let mine = mgr.list(false).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].paths, vec!["/a"]);

        assert_eq!(mgr.list(true).unwrap().len(), 2);
    }

    #[test]
    fn prune_policy_drops_last_rule() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("exports"),
            "/Users/me/app 10.0.2.2 -alldirs -mapall=501:20",
        )
        .unwrap();

        let mut mgr =
            manager(&dir, Some(selector()), ok_surface(3)).empty_rule(EmptyRulePolicy::Prune);
        mgr.remove("/Users/me/app").unwrap();

        assert_eq!(read(&dir), "");
    }
}
