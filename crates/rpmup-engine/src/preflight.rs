//! Preflight contracts that must pass before any network activity starts:
//! boot directory creatable, free space thresholds, and root/boot
//! filesystem UUID discovery.
//!
//! Grounded on `zif_release_check_filesystem_size`, `zif_release_get_uuid`
//! (`/sbin/blkid -s UUID -o value <dev>`) and
//! `zif_release_get_mtab_entry` (`/etc/mtab` scan) in `zif-release.c`.

use std::path::Path;
use std::process::Command;

use crate::error::EngineError;
use crate::process::ProcessRunner;

pub const BOOT_DIR_MIN_FREE: u64 = 26 * 1024 * 1024;
pub const VAR_CACHE_MIN_FREE: u64 = 700 * 1024 * 1024;

/// Ensure `dir` exists, creating it (and its parents) if absent.
pub fn ensure_dir_exists(dir: &Path) -> Result<(), EngineError> {
    if dir.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|source| EngineError::WriteFailed {
        path: dir.display().to_string(),
        source,
    })
}

/// Fail with `LowDiskSpace` unless the filesystem backing `path` has at
/// least `required` bytes free.
pub fn check_filesystem_free(path: &Path, required: u64) -> Result<(), EngineError> {
    let stats = nix::sys::statvfs::statvfs(path)
        .map_err(|errno| EngineError::SetupInvalid(format!("statvfs({}): {errno}", path.display())))?;
    let available = stats.blocks_available() as u64 * stats.fragment_size() as u64;
    if available < required {
        return Err(EngineError::LowDiskSpace {
            path: path.display().to_string(),
            required,
            available,
        });
    }
    Ok(())
}

/// Run `/sbin/blkid -s UUID -o value <device>` and return the trimmed UUID.
pub fn get_device_uuid(
    runner: &dyn ProcessRunner,
    device: &str,
) -> Result<String, EngineError> {
    let mut command = Command::new("/sbin/blkid");
    command.args(["-s", "UUID", "-o", "value", device]);
    let output = runner.run(&mut command)?;
    if !output.status.success() {
        return Err(EngineError::NoUuidForRoot(device.to_string()));
    }
    let uuid = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if uuid.is_empty() {
        return Err(EngineError::NoUuidForRoot(device.to_string()));
    }
    Ok(uuid)
}

/// Find the device mounted at `mount_point` by scanning `/etc/mtab`,
/// matching `zif_release_get_mtab_entry`'s space-delimited column scan.
pub fn mtab_device_for(mount_point: &str) -> Option<String> {
    mtab_device_for_file(Path::new("/etc/mtab"), mount_point)
}

fn mtab_device_for_file(mtab_path: &Path, mount_point: &str) -> Option<String> {
    let data = std::fs::read_to_string(mtab_path).ok()?;
    data.lines().find_map(|line| {
        let mut columns = line.split(' ');
        let device = columns.next()?;
        let mount = columns.next()?;
        (mount == mount_point).then(|| device.to_string())
    })
}

/// Resolve the root and boot filesystem UUIDs per the preflight contract:
/// root must resolve via `blkid` against `/dev/root`; boot falls back to
/// the root UUID when `/boot` has no distinct mtab entry.
pub fn resolve_uuids(runner: &dyn ProcessRunner) -> Result<(String, String), EngineError> {
    let uuid_root = get_device_uuid(runner, "/dev/root")?;
    let uuid_boot = match mtab_device_for("/boot") {
        Some(device) => get_device_uuid(runner, &device)?,
        None => uuid_root.clone(),
    };
    Ok((uuid_root, uuid_boot))
}
