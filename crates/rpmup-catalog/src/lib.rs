//! Release Catalog: loads `releases.txt`, turns it into [`Upgrade`]
//! descriptors, and invalidates its cache when the file changes on disk.
//!
//! Grounded on `zif-release.c`'s `zif_release_load` (cache-age/download/
//! parse sequencing) and `zif-upgrade.c` (the per-release fields; its
//! `zif_upgrade_get_version` bug — returning `enabled` instead of
//! `version` — is fixed here per spec §9's flagged Open Question).

mod ini;

pub mod error;

use std::path::PathBuf;
use std::time::SystemTime;

pub use error::CatalogError;
use rpmup_collections::KeyedVec;
use rpmup_config::Configuration;
use rpmup_download::Downloader;
use rpmup_monitor::FileMonitor;
use rpmup_progress::ProgressNode;
use tracing::debug;

/// One available release, as described by a single `[group]` of
/// `releases.txt`. Immutable once constructed; the catalog owns every
/// instance exclusively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upgrade {
    pub id: String,
    pub version: u64,
    pub stable: bool,
    pub enabled: bool,
    pub baseurl: Option<String>,
    pub mirrorlist: Option<String>,
    pub install_mirrorlist: Option<String>,
}

impl Upgrade {
    /// The upgrade's release version. Unlike the original
    /// `zif_upgrade_get_version`, this returns the actual `version` field,
    /// not `enabled` (see module docs / DESIGN.md).
    pub fn version(&self) -> u64 {
        self.version
    }
}

fn upgrade_key(upgrade: &Upgrade) -> String {
    upgrade.id.clone()
}

type UpgradeIndex = KeyedVec<Upgrade, String, fn(&Upgrade) -> String>;

fn empty_index() -> UpgradeIndex {
    KeyedVec::new(upgrade_key as fn(&Upgrade) -> String)
}

/// Loads and caches `releases.txt`, exposing queries over the parsed
/// [`Upgrade`] descriptors. A single instance is meant to live for the
/// lifetime of the calling program; `ensure_loaded` is idempotent and
/// cheap once loaded (a monitor poll, nothing more) until the file
/// changes underneath it.
pub struct ReleaseCatalog {
    upgrades: UpgradeIndex,
    loaded: bool,
    monitor: FileMonitor,
    releases_path: Option<PathBuf>,
}

impl Default for ReleaseCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleaseCatalog {
    pub fn new() -> Self {
        Self {
            upgrades: empty_index(),
            loaded: false,
            monitor: FileMonitor::new(),
            releases_path: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Load (or reuse the cached load of) `releases.txt`, per spec §4.E's
    /// four-step algorithm. A no-op if already loaded and the watched
    /// file has not changed since.
    pub fn ensure_loaded(
        &mut self,
        config: &dyn Configuration,
        downloader: &dyn Downloader,
        progress: &mut ProgressNode,
    ) -> Result<(), CatalogError> {
        if self.loaded {
            let changed = self
                .releases_path
                .as_ref()
                .map(|p| self.monitor.poll(p))
                .unwrap_or(false);
            if !changed {
                return Ok(());
            }
            debug!("releases.txt changed on disk, reloading catalog");
            self.loaded = false;
        }
        self.load(config, downloader, progress)
    }

    /// Drop every parsed [`Upgrade`] and stop watching the cache file;
    /// the next `ensure_loaded` call performs a full reload.
    pub fn unload(&mut self) {
        if let Some(path) = &self.releases_path {
            self.monitor.unwatch(path);
        }
        self.upgrades = empty_index();
        self.loaded = false;
    }

    fn load(
        &mut self,
        config: &dyn Configuration,
        downloader: &dyn Downloader,
        progress: &mut ProgressNode,
    ) -> Result<(), CatalogError> {
        let cache_dir = config
            .get_string("upgrade_cache_dir")
            .ok_or_else(|| CatalogError::SetupInvalid("upgrade_cache_dir not set".into()))?;
        let path = PathBuf::from(&cache_dir).join("releases.txt");

        let mut need_download = !path.is_file();
        if path.is_file() {
            let age = file_age_seconds(&path)?;
            let expire = config
                .get_uint("metadata_expire")
                .ok()
                .flatten()
                .unwrap_or(0);
            if age > expire {
                debug!(path = %path.display(), age, expire, "releases.txt expired, re-downloading");
                std::fs::remove_file(&path)?;
                need_download = true;
            }
        }

        if need_download {
            let uri = config
                .get_string("upgrade_releases_uri")
                .ok_or_else(|| CatalogError::SetupInvalid("upgrade_releases_uri not set".into()))?;
            std::fs::create_dir_all(&cache_dir)?;
            downloader.download(&uri, &path, progress)?;
        }

        self.monitor.watch(&path);
        self.releases_path = Some(path.clone());

        let text = std::fs::read_to_string(&path)?;
        let groups = ini::parse(&text);
        if groups.is_empty() {
            return Err(CatalogError::InvalidMetadata(
                "releases.txt has no groups".into(),
            ));
        }

        let mut upgrades = empty_index();
        for (id, entries) in groups {
            let stable = ini::lookup(&entries, "stable") == Some("True");
            let enabled = ini::lookup(&entries, "preupgrade-ok") == Some("True");
            let version: u64 = ini::lookup(&entries, "version")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            let baseurl = ini::lookup(&entries, "baseurl").map(|v| config.expand(v));
            let mirrorlist = ini::lookup(&entries, "mirrorlist").map(|v| config.expand(v));
            let install_mirrorlist =
                ini::lookup(&entries, "installmirrorlist").map(|v| config.expand(v));

            if baseurl.is_none() && mirrorlist.is_none() && install_mirrorlist.is_none() {
                return Err(CatalogError::InvalidMetadata(format!(
                    "release {id} has none of baseurl/mirrorlist/install_mirrorlist set"
                )));
            }

            upgrades.add(Upgrade {
                id,
                version,
                stable,
                enabled,
                baseurl,
                mirrorlist,
                install_mirrorlist,
            });
        }

        self.upgrades = upgrades;
        self.loaded = true;
        Ok(())
    }

    pub fn all(&self) -> impl Iterator<Item = &Upgrade> {
        self.upgrades.iter()
    }

    pub fn newer_than_installed(&self, releasever: u64) -> Vec<&Upgrade> {
        self.all().filter(|u| u.version > releasever).collect()
    }

    pub fn get(&self, version: u64) -> Result<&Upgrade, CatalogError> {
        self.all()
            .find(|u| u.version == version)
            .ok_or(CatalogError::NotFound(version))
    }
}

fn file_age_seconds(path: &std::path::Path) -> std::io::Result<u64> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(SystemTime::now()
        .duration_since(modified)
        .map(|d| d.as_secs())
        .unwrap_or(0))
}
