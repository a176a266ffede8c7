//! Complete-mode per-release repository build: load enabled repos at the
//! target release, download every applicable update, then shell out to
//! `createrepo`/`modifyrepo` to assemble an offline-installable repo tree.
//!
//! Grounded on the `zif_release_get_package_data` phase of
//! `zif-release.c`: override `releasever`, enumerate updates via the
//! `ZifRepos`/`ZifStoreArray` collaborators, download each into
//! `<repo_dir>/packages`, then `createrepo --database` and
//! `modifyrepo --mdtype=group_gz`.

use std::path::{Path, PathBuf};
use std::process::Command;

use rpmup_config::{Configuration, UintOverrideGuard};
use rpmup_download::Downloader;
use rpmup_progress::ProgressNode;
use tracing::debug;

use crate::error::EngineError;
use crate::process::{ProcessRunner, SpawnError};

/// One package update the Complete-mode repository build must fetch.
#[derive(Debug, Clone)]
pub struct UpdatePackage {
    pub name: String,
    pub location_href: String,
}

/// A handle to one enabled remote store, refreshed and queried for
/// updates during the repository build. Minimal surface per spec §6 —
/// enough for the Engine to drive the build, not a full store
/// implementation.
pub trait RemoteStore {
    fn id(&self) -> &str;
    fn refresh(&mut self) -> Result<(), EngineError>;
    fn updates(&self) -> Result<Vec<UpdatePackage>, EngineError>;
    /// Path to this store's `group_gz` comps metadata, if it has one.
    fn group_gz_path(&self) -> Option<PathBuf>;
}

/// Enumerates the enabled remote stores for the current `releasever`.
pub trait Repos {
    fn enabled_stores(&mut self) -> Result<Vec<Box<dyn RemoteStore>>, EngineError>;
}

/// Build (or rebuild) the per-release package repository at
/// `upgrade_repo_dir`, per spec's Complete-only phase. `releasever` is
/// overridden to `target_version` for the duration of the call via a
/// scope guard that restores it on every exit path, including error
/// returns.
pub fn build_repository(
    config: &mut dyn Configuration,
    repos: &mut dyn Repos,
    downloader: &dyn Downloader,
    process: &dyn ProcessRunner,
    target_version: u64,
    progress: &mut ProgressNode,
) -> Result<(), EngineError> {
    progress.begin(&[5, 1, 5, 5, 75, 5, 2, 2])?;

    let repo_dir = config
        .get_string("upgrade_repo_dir")
        .ok_or_else(|| EngineError::SetupInvalid("upgrade_repo_dir not set".into()))?;
    let repo_dir = PathBuf::from(repo_dir);
    crate::preflight::ensure_dir_exists(&repo_dir)?;
    progress.done()?;

    let _releasever_guard = UintOverrideGuard::new(config, "releasever", target_version);

    let mut stores = repos.enabled_stores()?;
    progress.done()?;

    for store in &mut stores {
        store.refresh()?;
    }
    progress.done()?;

    let mut updates = Vec::new();
    for store in &stores {
        updates.extend(store.updates()?);
    }
    progress.done()?;

    let packages_dir = repo_dir.join("packages");
    std::fs::create_dir_all(&packages_dir).map_err(|source| EngineError::WriteFailed {
        path: packages_dir.display().to_string(),
        source,
    })?;
    for update in &updates {
        debug!(name = %update.name, "downloading update package");
        let dest = packages_dir.join(
            Path::new(&update.location_href)
                .file_name()
                .unwrap_or_else(|| std::ffi::OsStr::new(&update.name)),
        );
        downloader.download_location(&update.location_href, &dest, progress.get_child(4)?)?;
    }
    progress.done()?;

    run_createrepo(process, &repo_dir)?;
    progress.done()?;

    let group_gz = stores
        .iter()
        .find(|s| s.id() == "updates")
        .and_then(|s| s.group_gz_path())
        .or_else(|| stores.iter().find_map(|s| s.group_gz_path()));
    progress.done()?;

    if let Some(group_gz) = group_gz {
        run_modifyrepo(process, &group_gz, &repo_dir.join("repodata"))?;
    }
    progress.done()?;

    Ok(())
}

fn run_createrepo(process: &dyn ProcessRunner, repo_dir: &Path) -> Result<(), EngineError> {
    let mut command = Command::new("/usr/bin/createrepo");
    command.arg("--database").arg(repo_dir);
    let output = process.run(&mut command)?;
    if !output.status.success() {
        return Err(SpawnError::NonZeroExit {
            command: command.get_program().to_string_lossy().into_owned(),
            code: output.status.code(),
        }
        .into());
    }
    Ok(())
}

fn run_modifyrepo(
    process: &dyn ProcessRunner,
    group_gz: &Path,
    repodata_dir: &Path,
) -> Result<(), EngineError> {
    let mut command = Command::new("/usr/bin/modifyrepo");
    command
        .arg("--mdtype=group_gz")
        .arg(group_gz)
        .arg(repodata_dir);
    let output = process.run(&mut command)?;
    if !output.status.success() {
        return Err(SpawnError::NonZeroExit {
            command: command.get_program().to_string_lossy().into_owned(),
            code: output.status.code(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::test_support::RecordingProcessRunner;
    use rpmup_config::MapConfiguration;
    use rpmup_mirror::MirrorSet;
    use std::cell::RefCell;

    struct StubStore {
        name: &'static str,
        updates: Vec<UpdatePackage>,
        refreshed: RefCell<bool>,
    }

    impl RemoteStore for StubStore {
        fn id(&self) -> &str {
            self.name
        }
        fn refresh(&mut self) -> Result<(), EngineError> {
            *self.refreshed.borrow_mut() = true;
            Ok(())
        }
        fn updates(&self) -> Result<Vec<UpdatePackage>, EngineError> {
            Ok(self.updates.clone())
        }
        fn group_gz_path(&self) -> Option<PathBuf> {
            (self.name == "updates").then(|| PathBuf::from("/cache/updates/comps.xml.gz"))
        }
    }

    struct StubRepos {
        stores: Vec<StubStore>,
    }

    impl Repos for StubRepos {
        fn enabled_stores(&mut self) -> Result<Vec<Box<dyn RemoteStore>>, EngineError> {
            Ok(std::mem::take(&mut self.stores)
                .into_iter()
                .map(|s| Box::new(s) as Box<dyn RemoteStore>)
                .collect())
        }
    }

    struct StubDownloader;
    impl Downloader for StubDownloader {
        fn download(
            &self,
            _uri: &str,
            dest: &Path,
            _progress: &mut ProgressNode,
        ) -> Result<(), rpmup_download::DownloadError> {
            std::fs::write(dest, b"rpm")?;
            Ok(())
        }
        fn download_with_verify(
            &self,
            uri: &str,
            dest: &Path,
            _min_size: u64,
            _content_type_list: Option<&[&str]>,
            _algo: rpmup_download::ChecksumAlgo,
            _hex_digest: &str,
            progress: &mut ProgressNode,
        ) -> Result<(), rpmup_download::DownloadError> {
            self.download(uri, dest, progress)
        }
        fn download_location(
            &self,
            relative_path: &str,
            dest: &Path,
            progress: &mut ProgressNode,
        ) -> Result<(), rpmup_download::DownloadError> {
            self.download(relative_path, dest, progress)
        }
        fn download_location_with_verify(
            &self,
            relative_path: &str,
            dest: &Path,
            _min_size: u64,
            _content_type_list: Option<&[&str]>,
            _algo: rpmup_download::ChecksumAlgo,
            _hex_digest: &str,
            progress: &mut ProgressNode,
        ) -> Result<(), rpmup_download::DownloadError> {
            self.download(relative_path, dest, progress)
        }
        fn add_location(&mut self, _mirrors: MirrorSet) {}
        fn clear_locations(&mut self) {}
    }

    #[test]
    fn build_repository_restores_releasever_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = MapConfiguration::new();
        config.set_string("upgrade_repo_dir", dir.path().to_string_lossy().into_owned());
        config.set_uint("releasever", 14);

        let mut repos = StubRepos {
            stores: vec![StubStore {
                name: "updates",
                updates: vec![UpdatePackage {
                    name: "foo-1.0".into(),
                    location_href: "packages/foo-1.0.rpm".into(),
                }],
                refreshed: RefCell::new(false),
            }],
        };
        let downloader = StubDownloader;
        let process = RecordingProcessRunner::default();
        let mut progress = ProgressNode::root();

        build_repository(&mut config, &mut repos, &downloader, &process, 15, &mut progress).unwrap();

        assert_eq!(config.get_uint("releasever").unwrap(), Some(14));
        assert!(dir.path().join("packages/foo-1.0.rpm").is_file());
        let commands = process.commands.lock().unwrap();
        assert!(commands.iter().any(|c| c.starts_with("/usr/bin/createrepo")));
        assert!(commands.iter().any(|c| c.starts_with("/usr/bin/modifyrepo")));
    }

    #[test]
    fn build_repository_restores_releasever_on_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = MapConfiguration::new();
        config.set_string("upgrade_repo_dir", dir.path().to_string_lossy().into_owned());
        config.set_uint("releasever", 14);

        let mut repos = StubRepos { stores: vec![] };
        let downloader = StubDownloader;
        let process = RecordingProcessRunner {
            fail_programs: vec!["/usr/bin/createrepo".to_string()],
            ..Default::default()
        };
        let mut progress = ProgressNode::root();

        let err = build_repository(&mut config, &mut repos, &downloader, &process, 15, &mut progress)
            .unwrap_err();
        assert!(matches!(err, EngineError::SpawnFailed(_)));
        assert_eq!(config.get_uint("releasever").unwrap(), Some(14));
    }
}
