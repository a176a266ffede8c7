//! `.treeinfo` binding and kernel/initrd/stage2 image fetch, grounded on
//! `zif_release_get_treeinfo` / `zif_release_get_kernel` /
//! `zif_release_get_initrd` / `zif_release_get_stage2`.

use std::path::Path;

use rpmup_download::{ChecksumAlgo, Downloader};
use rpmup_progress::ProgressNode;
use tracing::debug;

use crate::error::EngineError;
use crate::keyfile::KeyFile;

pub const KERNEL_CONTENT_TYPES: &[&str] = &["application/octet-stream"];
pub const INITRD_CONTENT_TYPES: &[&str] = &[
    "application/x-gzip",
    "application/x-extension-img",
    "application/x-xz",
];
pub const STAGE2_CONTENT_TYPES: &[&str] = &["application/x-extension-img", "application/octet-stream"];

/// The parsed `.treeinfo` document plus the derived `images-<basearch>`
/// section name for the current upgrade.
pub struct TreeInfo {
    keyfile: KeyFile,
    images_section: String,
}

impl TreeInfo {
    /// Download `.treeinfo` (if not already cached) and bind it against
    /// `expected_version`/`basearch`. `progress` is the phase's own node;
    /// this declares and completes its two weighted steps (fetch, parse).
    pub fn fetch(
        downloader: &dyn Downloader,
        cache_dir: &Path,
        basearch: &str,
        expected_version: u64,
        progress: &mut ProgressNode,
    ) -> Result<Self, EngineError> {
        progress.begin(&[90, 10])?;

        let path = cache_dir.join(".treeinfo");
        if !path.is_file() {
            downloader.download_location(".treeinfo", &path, progress.get_child(0)?)?;
        }
        progress.done()?;

        let keyfile = KeyFile::load(&path).map_err(|source| EngineError::WriteFailed {
            path: path.display().to_string(),
            source,
        })?;

        let version: u64 = keyfile
            .get("general", "version")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        if version != expected_version {
            return Err(EngineError::InvalidMetadata(format!(
                "treeinfo release '{version}' differs from wanted release '{expected_version}'"
            )));
        }

        let images_section = format!("images-{basearch}");
        progress.done()?;

        Ok(Self { keyfile, images_section })
    }

    fn image_filename(&self, key: &str) -> Option<&str> {
        self.keyfile.get(&self.images_section, key)
    }

    fn checksum_for(&self, filename: &str) -> Option<&str> {
        self.keyfile.get("checksums", filename)
    }

    fn stage2_filename(&self) -> Option<&str> {
        self.keyfile.get("stage2", "mainimage")
    }
}

/// Split a `<algo>:<hex>`-tagged checksum value structurally, per spec's
/// fix of `zif-release.c`'s fragile fixed `checksum+7` offset.
fn split_tagged_checksum(raw: &str) -> Option<(&str, &str)> {
    raw.split_once(':')
}

fn fetch_image(
    downloader: &dyn Downloader,
    treeinfo: &TreeInfo,
    image_key: &str,
    dest: &Path,
    content_types: &[&str],
    progress: &mut ProgressNode,
) -> Result<(), EngineError> {
    let filename = treeinfo.image_filename(image_key).ok_or_else(|| {
        EngineError::InvalidMetadata(format!("treeinfo missing `{image_key}` in images section"))
    })?;
    let raw_checksum = treeinfo.checksum_for(filename).ok_or_else(|| {
        EngineError::InvalidMetadata(format!("treeinfo missing checksum for `{filename}`"))
    })?;
    let (algo_tag, hex_digest) = split_tagged_checksum(raw_checksum).ok_or_else(|| {
        EngineError::InvalidMetadata(format!("malformed checksum for `{filename}`: {raw_checksum}"))
    })?;
    let algo = ChecksumAlgo::from_tag(algo_tag).ok_or_else(|| {
        EngineError::InvalidMetadata(format!("unsupported checksum algorithm `{algo_tag}`"))
    })?;

    if dest.is_file() && algo.matches_file(dest, hex_digest) {
        debug!(path = %dest.display(), "existing image already matches checksum, skipping download");
        return Ok(());
    }
    let _ = std::fs::remove_file(dest);

    downloader.download_location_with_verify(filename, dest, 0, Some(content_types), algo, hex_digest, progress)?;
    Ok(())
}

/// Fetch the kernel image into `<boot_dir>/vmlinuz`.
pub fn fetch_kernel(
    downloader: &dyn Downloader,
    treeinfo: &TreeInfo,
    boot_dir: &Path,
    progress: &mut ProgressNode,
) -> Result<(), EngineError> {
    fetch_image(
        downloader,
        treeinfo,
        "kernel",
        &boot_dir.join("vmlinuz"),
        KERNEL_CONTENT_TYPES,
        progress,
    )
}

/// Fetch the initrd image into `<boot_dir>/initrd.img`.
pub fn fetch_initrd(
    downloader: &dyn Downloader,
    treeinfo: &TreeInfo,
    boot_dir: &Path,
    progress: &mut ProgressNode,
) -> Result<(), EngineError> {
    fetch_image(
        downloader,
        treeinfo,
        "initrd",
        &boot_dir.join("initrd.img"),
        INITRD_CONTENT_TYPES,
        progress,
    )
}

/// Fetch the stage2 image into `<boot_dir>/install.img`, if `.treeinfo`
/// declares one. Returns `Ok(false)` (not fatal) when `[stage2].mainimage`
/// is absent, matching distributions from F15 onward that don't ship one.
pub fn fetch_stage2(
    downloader: &dyn Downloader,
    treeinfo: &TreeInfo,
    boot_dir: &Path,
    progress: &mut ProgressNode,
) -> Result<bool, EngineError> {
    let Some(stage2_filename) = treeinfo.stage2_filename() else {
        debug!("no stage2 image declared in treeinfo, skipping");
        return Ok(false);
    };
    let stage2_filename = stage2_filename.to_string();
    fetch_stage2_image(downloader, treeinfo, &stage2_filename, boot_dir, progress)?;
    Ok(true)
}

fn fetch_stage2_image(
    downloader: &dyn Downloader,
    treeinfo: &TreeInfo,
    stage2_filename: &str,
    boot_dir: &Path,
    progress: &mut ProgressNode,
) -> Result<(), EngineError> {
    let raw_checksum = treeinfo.checksum_for(stage2_filename).ok_or_else(|| {
        EngineError::InvalidMetadata(format!("treeinfo missing checksum for `{stage2_filename}`"))
    })?;
    let (algo_tag, hex_digest) = split_tagged_checksum(raw_checksum).ok_or_else(|| {
        EngineError::InvalidMetadata(format!(
            "malformed checksum for `{stage2_filename}`: {raw_checksum}"
        ))
    })?;
    let algo = ChecksumAlgo::from_tag(algo_tag).ok_or_else(|| {
        EngineError::InvalidMetadata(format!("unsupported checksum algorithm `{algo_tag}`"))
    })?;

    let dest = boot_dir.join("install.img");
    if dest.is_file() && algo.matches_file(&dest, hex_digest) {
        debug!(path = %dest.display(), "existing stage2 image already matches checksum, skipping download");
        return Ok(());
    }
    let _ = std::fs::remove_file(&dest);
    downloader.download_location_with_verify(
        stage2_filename,
        &dest,
        0,
        Some(STAGE2_CONTENT_TYPES),
        algo,
        hex_digest,
        progress,
    )?;
    Ok(())
}
