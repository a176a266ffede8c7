//! Upgrade Engine: end-to-end distribution upgrade orchestration.
//!
//! `UpgradeEngine::upgrade_to` is the one operation the whole workspace
//! exists to support: it drives every other `rpmup-*` crate through the
//! phase table of spec §4.G, in the declared order, checkpointing each
//! phase against the caller's [`ProgressNode`]. Grounded in full on
//! `original_source/libzif/zif-release.c`'s `zif_release_upgrade_version`.

pub mod bootloader;
pub mod error;
pub mod keyfile;
pub mod preflight;
pub mod process;
pub mod repo_build;
pub mod treeinfo;

use std::path::{Path, PathBuf};

pub use error::EngineError;
pub use process::{ProcessRunner, RealProcessRunner, SpawnError};
pub use repo_build::{RemoteStore, Repos, UpdatePackage};

use rpmup_catalog::{ReleaseCatalog, Upgrade};
use rpmup_config::Configuration;
use rpmup_download::Downloader;
use rpmup_mirror::{Mirror, MirrorSet, Protocol};
use rpmup_progress::ProgressNode;
use tracing::info;

use treeinfo::TreeInfo;

/// Which set of images an upgrade installs, selecting the phase table's
/// weight row (spec §4.G).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeKind {
    Minimal,
    Default,
    Complete,
}

impl UpgradeKind {
    /// The phase weights declared to `progress.begin` for this kind, in
    /// the order the engine executes them.
    fn phase_weights(self) -> &'static [u32] {
        match self {
            UpgradeKind::Minimal => &[1, 5, 1, 3, 15, 70, 5],
            UpgradeKind::Default => &[1, 5, 1, 3, 15, 20, 50, 5],
            UpgradeKind::Complete => &[1, 5, 1, 3, 5, 20, 30, 30, 5],
        }
    }
}

/// State scoped to a single `upgrade_to` call: owned exclusively by the
/// engine for the duration of the call and dropped at return (spec §3,
/// "Upgrade scratch"). Held as a local rather than returned or shared.
struct UpgradeScratch<'u> {
    upgrade: &'u Upgrade,
    kind: UpgradeKind,
    version: u64,
    treeinfo: Option<TreeInfo>,
    uuid_root: String,
    uuid_boot: String,
    has_stage2: bool,
}

/// The Upgrade Engine. Holds borrowed collaborators for the duration of
/// one or more `upgrade_to` calls; it does not own any of them (the
/// Release Catalog exclusively owns `Upgrade` descriptors, the caller
/// owns the `Downloader`/`Configuration`/`ProcessRunner`/`Repos`
/// instances).
pub struct UpgradeEngine<'a> {
    config: &'a mut dyn Configuration,
    catalog: &'a ReleaseCatalog,
    downloader: &'a mut dyn Downloader,
    process: &'a dyn ProcessRunner,
    repos: Option<&'a mut dyn Repos>,
}

impl<'a> UpgradeEngine<'a> {
    pub fn new(
        config: &'a mut dyn Configuration,
        catalog: &'a ReleaseCatalog,
        downloader: &'a mut dyn Downloader,
        process: &'a dyn ProcessRunner,
        repos: Option<&'a mut dyn Repos>,
    ) -> Self {
        Self {
            config,
            catalog,
            downloader,
            process,
            repos,
        }
    }

    /// Stage an install-on-next-boot environment for `version` at the
    /// given `kind`. Per spec, this does not perform the post-reboot
    /// upgrade itself — it downloads images, optionally stages a local
    /// package repository, and registers a one-shot boot entry.
    ///
    /// `progress` must be a fresh (or freshly `reset`) node: the engine
    /// calls `begin` exactly once and `done` exactly once per declared
    /// phase, in order. Cleanup — clearing the downloader's registered
    /// mirror locations — runs on every exit path, success or error.
    pub fn upgrade_to(
        &mut self,
        version: u64,
        kind: UpgradeKind,
        progress: &mut ProgressNode,
    ) -> Result<(), EngineError> {
        if !progress.valid() {
            return Err(EngineError::SetupInvalid(
                "progress node is not in a valid state for a new upgrade_to call".into(),
            ));
        }

        let result = self.run(version, kind, progress);
        self.downloader.clear_locations();
        result
    }

    fn run(
        &mut self,
        version: u64,
        kind: UpgradeKind,
        progress: &mut ProgressNode,
    ) -> Result<(), EngineError> {
        let upgrade = self.catalog.get(version)?.clone();
        progress.begin(kind.phase_weights())?;

        let cache_dir = required_string(self.config, "upgrade_cache_dir")?;
        let boot_dir = required_string(self.config, "upgrade_boot_dir")?;
        let basearch = required_string(self.config, "basearch")?;

        let mut scratch = UpgradeScratch {
            upgrade: &upgrade,
            kind,
            version,
            treeinfo: None,
            uuid_root: String::new(),
            uuid_boot: String::new(),
            has_stage2: false,
        };

        // Phase 0: Setup & UUID discovery.
        preflight::ensure_dir_exists(Path::new(&boot_dir))?;
        preflight::check_filesystem_free(Path::new(&boot_dir), preflight::BOOT_DIR_MIN_FREE)?;
        preflight::check_filesystem_free(Path::new("/var/cache"), preflight::VAR_CACHE_MIN_FREE)?;
        std::fs::create_dir_all(&cache_dir).map_err(|source| EngineError::WriteFailed {
            path: cache_dir.clone(),
            source,
        })?;
        let (uuid_root, uuid_boot) = preflight::resolve_uuids(self.process)?;
        scratch.uuid_root = uuid_root;
        scratch.uuid_boot = uuid_boot;
        progress.done()?;

        // Phase 1: Fetch install mirror list.
        let mirror_source = scratch
            .upgrade
            .install_mirrorlist
            .clone()
            .or_else(|| scratch.upgrade.mirrorlist.clone())
            .or_else(|| scratch.upgrade.baseurl.clone())
            .ok_or_else(|| {
                EngineError::InvalidMetadata(format!(
                    "release {version} has none of baseurl/mirrorlist/install_mirrorlist set"
                ))
            })?;
        let install_mirrorlist_path = PathBuf::from(&cache_dir).join("installmirrorlist");
        self.downloader.download(
            &mirror_source,
            &install_mirrorlist_path,
            progress.get_child(1)?,
        )?;
        progress.done()?;

        // Phase 2: Register mirror list.
        let is_listing = scratch.upgrade.install_mirrorlist.is_some()
            || scratch.upgrade.mirrorlist.is_some();
        let mirror_set = if is_listing {
            let text = std::fs::read_to_string(&install_mirrorlist_path)?;
            MirrorSet::from_mirrorlist_text(&text)
        } else {
            let mut set = MirrorSet::new();
            set.add(Mirror {
                uri: mirror_source.clone(),
                protocol: Protocol::Http,
                preference: 0,
            });
            set
        };
        self.downloader.clear_locations();
        self.downloader.add_location(mirror_set);
        progress.done()?;

        // Phase 3: Fetch .treeinfo.
        let treeinfo = TreeInfo::fetch(
            self.downloader,
            Path::new(&cache_dir),
            &basearch,
            version,
            progress.get_child(3)?,
        )?;
        progress.done()?;

        // Phase 4: Fetch kernel image.
        treeinfo::fetch_kernel(
            self.downloader,
            &treeinfo,
            Path::new(&boot_dir),
            progress.get_child(4)?,
        )?;
        progress.done()?;

        // Phase 5: Fetch initrd image.
        treeinfo::fetch_initrd(
            self.downloader,
            &treeinfo,
            Path::new(&boot_dir),
            progress.get_child(5)?,
        )?;
        progress.done()?;
        scratch.treeinfo = Some(treeinfo);

        // Phase 6 (Default/Complete only): Fetch stage2 image.
        if kind != UpgradeKind::Minimal {
            let treeinfo_ref = scratch.treeinfo.as_ref().expect("set above");
            scratch.has_stage2 = treeinfo::fetch_stage2(
                self.downloader,
                treeinfo_ref,
                Path::new(&boot_dir),
                progress.get_child(6)?,
            )?;
            progress.done()?;
        }

        // Phase 7 (Complete only): build the per-release package repository.
        if kind == UpgradeKind::Complete {
            let repos = self.repos.as_mut().ok_or_else(|| {
                EngineError::SetupInvalid(
                    "a Repos collaborator is required for Complete upgrades".into(),
                )
            })?;
            repo_build::build_repository(
                self.config,
                &mut **repos,
                self.downloader,
                self.process,
                version,
                progress.get_child(7)?,
            )?;
            progress.done()?;
        }

        // Final phase: install boot entry (kernel + initrd + kickstart).
        let repo_dir = self.config.get_string("upgrade_repo_dir").unwrap_or_default();
        bootloader::remove_previous_kernel(self.process, &boot_dir)?;
        bootloader::add_kernel(
            self.process,
            &boot_dir,
            &basearch,
            version,
            kind,
            &scratch.uuid_boot,
            scratch.has_stage2,
            (kind == UpgradeKind::Complete).then_some(repo_dir.as_str()),
        )?;
        bootloader::make_default_once(self.process, &boot_dir)?;
        bootloader::write_kickstart(&boot_dir, &repo_dir, &scratch.uuid_root)?;
        info!(version = scratch.version, kind = ?scratch.kind, "upgrade staged for next boot");
        progress.done()?;

        Ok(())
    }
}

fn required_string(config: &dyn Configuration, key: &str) -> Result<String, EngineError> {
    config
        .get_string(key)
        .ok_or_else(|| EngineError::SetupInvalid(format!("{key} not set")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::test_support::RecordingProcessRunner;
    use rpmup_config::MapConfiguration;
    use rpmup_download::{ChecksumAlgo, DownloadError};
    use sha2::{Digest, Sha256};
    use std::collections::HashMap;

    fn sha256_hex(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// A `Downloader` that serves canned bytes for each URI/location,
    /// used to drive `upgrade_to` end to end without real network access.
    struct FixtureDownloader {
        uri_bodies: HashMap<String, Vec<u8>>,
        location_bodies: HashMap<String, Vec<u8>>,
    }

    impl Downloader for FixtureDownloader {
        fn download(
            &self,
            uri: &str,
            dest: &Path,
            _progress: &mut ProgressNode,
        ) -> Result<(), DownloadError> {
            let body = self
                .uri_bodies
                .get(uri)
                .or_else(|| self.location_bodies.get(uri))
                .ok_or(DownloadError::NoMirrors)?;
            std::fs::write(dest, body)?;
            Ok(())
        }

        fn download_with_verify(
            &self,
            uri: &str,
            dest: &Path,
            _min_size: u64,
            _content_type_list: Option<&[&str]>,
            algo: ChecksumAlgo,
            hex_digest: &str,
            progress: &mut ProgressNode,
        ) -> Result<(), DownloadError> {
            self.download_location(uri, dest, progress)?;
            let actual = match algo {
                ChecksumAlgo::Sha256 => sha256_hex(&std::fs::read(dest)?),
                _ => unreachable!("fixture only uses sha256"),
            };
            if !actual.eq_ignore_ascii_case(hex_digest) {
                let _ = std::fs::remove_file(dest);
                return Err(DownloadError::Checksum {
                    expected: hex_digest.to_string(),
                    actual,
                });
            }
            Ok(())
        }

        fn download_location(
            &self,
            relative_path: &str,
            dest: &Path,
            _progress: &mut ProgressNode,
        ) -> Result<(), DownloadError> {
            let body = self
                .location_bodies
                .get(relative_path)
                .ok_or(DownloadError::NoMirrors)?;
            std::fs::write(dest, body)?;
            Ok(())
        }

        fn download_location_with_verify(
            &self,
            relative_path: &str,
            dest: &Path,
            _min_size: u64,
            _content_type_list: Option<&[&str]>,
            algo: ChecksumAlgo,
            hex_digest: &str,
            progress: &mut ProgressNode,
        ) -> Result<(), DownloadError> {
            self.download_location(relative_path, dest, progress)?;
            let actual = match algo {
                ChecksumAlgo::Sha256 => sha256_hex(&std::fs::read(dest)?),
                _ => unreachable!("fixture only uses sha256"),
            };
            if !actual.eq_ignore_ascii_case(hex_digest) {
                let _ = std::fs::remove_file(dest);
                return Err(DownloadError::Checksum {
                    expected: hex_digest.to_string(),
                    actual,
                });
            }
            Ok(())
        }

        fn add_location(&mut self, _mirrors: MirrorSet) {}
        fn clear_locations(&mut self) {}
    }

    /// A `RecordingProcessRunner` with `/sbin/blkid` pre-seeded, so
    /// `preflight::resolve_uuids` (which every upgrade runs regardless of
    /// boot_dir) succeeds instead of failing on an empty stdout.
    fn process_with_blkid() -> RecordingProcessRunner {
        RecordingProcessRunner {
            stdout_for: HashMap::from([("/sbin/blkid".to_string(), "fixture-uuid\n".to_string())]),
            ..Default::default()
        }
    }

    fn base_config(cache: &Path, boot: &Path) -> MapConfiguration {
        let mut cfg = MapConfiguration::new();
        cfg.set_string("upgrade_cache_dir", cache.to_string_lossy().into_owned());
        cfg.set_string("upgrade_boot_dir", boot.to_string_lossy().into_owned());
        cfg.set_string("basearch", "i686".into());
        cfg.set_uint("releasever", 14);
        cfg
    }

    fn sample_catalog() -> ReleaseCatalog {
        let mut catalog = ReleaseCatalog::new();
        let text = "[14]\nstable=True\npreupgrade-ok=True\nversion=14\nbaseurl=http://example.com/14\n\n\
             [15]\nstable=True\npreupgrade-ok=True\nversion=15\nbaseurl=http://example.com/15\n";
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = MapConfiguration::new();
        cfg.set_string("upgrade_cache_dir", dir.path().to_string_lossy().into_owned());
        cfg.set_string(
            "upgrade_releases_uri",
            "http://example.com/releases.txt".into(),
        );
        cfg.set_uint("metadata_expire", 1800);
        let downloader = FixtureDownloader {
            uri_bodies: HashMap::from([(
                "http://example.com/releases.txt".to_string(),
                text.as_bytes().to_vec(),
            )]),
            location_bodies: HashMap::new(),
        };
        let mut progress = ProgressNode::root();
        catalog
            .ensure_loaded(&cfg, &downloader, &mut progress)
            .unwrap();
        // keep the backing tempdir alive long enough by leaking it — the
        // catalog only needs the already-read, in-memory Upgrade list.
        std::mem::forget(dir);
        catalog
    }

    fn sample_kernel_bytes() -> Vec<u8> {
        b"kernel-bytes".to_vec()
    }
    fn sample_initrd_bytes() -> Vec<u8> {
        b"initrd-bytes".to_vec()
    }

    fn treeinfo_text(version: u64) -> String {
        let kernel_sum = sha256_hex(&sample_kernel_bytes());
        let initrd_sum = sha256_hex(&sample_initrd_bytes());
        format!(
            "[general]\nversion={version}\n\n\
             [images-i686]\nkernel=images/pxeboot/vmlinuz\ninitrd=images/pxeboot/initrd.img\n\n\
             [checksums]\nimages/pxeboot/vmlinuz=sha256:{kernel_sum}\nimages/pxeboot/initrd.img=sha256:{initrd_sum}\n"
        )
    }

    fn fixture_downloader(version: u64) -> FixtureDownloader {
        let mut location_bodies = HashMap::new();
        location_bodies.insert(".treeinfo".to_string(), treeinfo_text(version).into_bytes());
        location_bodies.insert("images/pxeboot/vmlinuz".to_string(), sample_kernel_bytes());
        location_bodies.insert("images/pxeboot/initrd.img".to_string(), sample_initrd_bytes());
        FixtureDownloader {
            uri_bodies: HashMap::from([(
                "http://example.com/15".to_string(),
                b"http://example.com/15\n".to_vec(),
            )]),
            location_bodies,
        }
    }

    #[test]
    fn minimal_upgrade_happy_path_dry_run() {
        let cache = tempfile::tempdir().unwrap();
        let boot = tempfile::tempdir().unwrap();
        let mut config = base_config(cache.path(), boot.path());
        let catalog = sample_catalog();
        let mut downloader = fixture_downloader(15);
        let process = process_with_blkid();

        let mut engine = UpgradeEngine::new(&mut config, &catalog, &mut downloader, &process, None);
        let mut progress = ProgressNode::root();
        engine
            .upgrade_to(15, UpgradeKind::Minimal, &mut progress)
            .unwrap();

        assert!(boot.path().join("vmlinuz").is_file());
        assert!(boot.path().join("initrd.img").is_file());
        assert!(boot.path().join("ks.cfg").is_file());
        assert!(!boot.path().join("install.img").exists());

        // boot_dir does not start with /boot: grubby/ybin must be logged
        // only, though blkid (UUID discovery, not gated on boot_dir) runs.
        let commands = process.commands.lock().unwrap();
        assert!(!commands.iter().any(|c| c.contains("grubby") || c.contains("ybin")));
        assert_eq!(progress.percent(), 100);
    }

    #[test]
    fn treeinfo_version_mismatch_is_invalid_metadata() {
        let cache = tempfile::tempdir().unwrap();
        let boot = tempfile::tempdir().unwrap();
        let mut config = base_config(cache.path(), boot.path());
        let catalog = sample_catalog();
        // .treeinfo declares version 16 while we request 15.
        let mut downloader = fixture_downloader(16);
        let process = process_with_blkid();

        let mut engine = UpgradeEngine::new(&mut config, &catalog, &mut downloader, &process, None);
        let mut progress = ProgressNode::root();
        let err = engine
            .upgrade_to(15, UpgradeKind::Minimal, &mut progress)
            .unwrap_err();

        assert!(matches!(err, EngineError::InvalidMetadata(_)));
        assert!(!boot.path().join("vmlinuz").exists());
        assert!(!boot.path().join("ks.cfg").exists());
    }

    #[test]
    fn stale_kernel_checksum_is_redownloaded() {
        let cache = tempfile::tempdir().unwrap();
        let boot = tempfile::tempdir().unwrap();
        std::fs::write(boot.path().join("vmlinuz"), b"stale-bytes").unwrap();

        let mut config = base_config(cache.path(), boot.path());
        let catalog = sample_catalog();
        let mut downloader = fixture_downloader(15);
        let process = process_with_blkid();

        let mut engine = UpgradeEngine::new(&mut config, &catalog, &mut downloader, &process, None);
        let mut progress = ProgressNode::root();
        engine
            .upgrade_to(15, UpgradeKind::Minimal, &mut progress)
            .unwrap();

        assert_eq!(
            std::fs::read(boot.path().join("vmlinuz")).unwrap(),
            sample_kernel_bytes()
        );
    }

    #[test]
    fn unknown_version_is_not_found() {
        let cache = tempfile::tempdir().unwrap();
        let boot = tempfile::tempdir().unwrap();
        let mut config = base_config(cache.path(), boot.path());
        let catalog = sample_catalog();
        let mut downloader = fixture_downloader(99);
        let process = RecordingProcessRunner::default();

        let mut engine = UpgradeEngine::new(&mut config, &catalog, &mut downloader, &process, None);
        let mut progress = ProgressNode::root();
        let err = engine
            .upgrade_to(99, UpgradeKind::Minimal, &mut progress)
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(99)));
    }

    #[test]
    fn complete_upgrade_without_repos_collaborator_is_setup_invalid() {
        let cache = tempfile::tempdir().unwrap();
        let boot = tempfile::tempdir().unwrap();
        let mut config = base_config(cache.path(), boot.path());
        config.set_string(
            "upgrade_repo_dir",
            cache.path().join("repo").to_string_lossy().into_owned(),
        );
        let catalog = sample_catalog();
        let mut downloader = fixture_downloader(15);
        let process = process_with_blkid();

        let mut engine = UpgradeEngine::new(&mut config, &catalog, &mut downloader, &process, None);
        let mut progress = ProgressNode::root();
        let err = engine
            .upgrade_to(15, UpgradeKind::Complete, &mut progress)
            .unwrap_err();
        assert!(matches!(err, EngineError::SetupInvalid(_)));
        // property 7: releasever is restored even though the phase failed
        // before entering the repo-build scope guard (never overridden).
        assert_eq!(config.get_uint("releasever").unwrap(), Some(14));
    }
}
