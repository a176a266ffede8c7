//! Boot entry management (`grubby`/`ybin`) and kickstart file assembly,
//! grounded on `zif_release_remove_kernel`, `zif_release_add_kernel`,
//! `zif_release_make_kernel_default_once` and `zif_release_write_kickstart`
//! in `zif-release.c`.

use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::error::EngineError;
use crate::keyfile::read_shell_assignment;
use crate::process::{ProcessRunner, SpawnError};
use crate::UpgradeKind;

const GRUB_CONFIG_FILE: &str = "/boot/grub/grub.conf";
const I18N_FILE: &str = "/etc/sysconfig/i18n";
const KEYBOARD_FILE: &str = "/etc/sysconfig/keyboard";
const DEFAULT_LANG: &str = "en_US.UTF-8";
const DEFAULT_KEYMAP: &str = "us";

/// `true` once `boot_dir` is a real `/boot`-rooted path — the point past
/// which `grubby`/`ybin` are actually executed rather than only logged.
fn installs_to_real_boot(boot_dir: &str) -> bool {
    boot_dir.starts_with("/boot")
}

fn run_or_log(
    process: &dyn ProcessRunner,
    boot_dir: &str,
    mut command: Command,
) -> Result<(), EngineError> {
    if !installs_to_real_boot(boot_dir) {
        debug!(
            cmd = ?command.get_program(),
            args = ?command.get_args().collect::<Vec<_>>(),
            "not running bootloader command, boot_dir does not start with /boot"
        );
        return Ok(());
    }
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

/// Remove any previous upgrade kernel registered at `<boot_dir>/vmlinuz`.
pub fn remove_previous_kernel(
    process: &dyn ProcessRunner,
    boot_dir: &str,
) -> Result<(), EngineError> {
    let mut command = Command::new("/sbin/grubby");
    command
        .arg(format!("--config-file={GRUB_CONFIG_FILE}"))
        .arg(format!("--remove-kernel={boot_dir}/vmlinuz"));
    run_or_log(process, boot_dir, command)
}

#[allow(clippy::too_many_arguments)]
pub fn add_kernel(
    process: &dyn ProcessRunner,
    boot_dir: &str,
    basearch: &str,
    version: u64,
    kind: UpgradeKind,
    uuid_boot: &str,
    has_stage2: bool,
    repo_dir: Option<&str>,
) -> Result<(), EngineError> {
    let title = if basearch.starts_with("ppc") {
        "upgrade".to_string()
    } else {
        format!("Upgrade to Fedora {version}")
    };

    let mut args = format!("preupgrade ks=hd:UUID={uuid_boot}:/upgrade/ks.cfg ");
    if has_stage2 {
        args.push_str(&format!("stage2=hd:UUID={uuid_boot}:/upgrade/install.img "));
    }
    if kind == UpgradeKind::Complete {
        let repo_dir = repo_dir.ok_or_else(|| {
            EngineError::SetupInvalid("upgrade_repo_dir required for Complete boot args".into())
        })?;
        args.push_str(&format!("repo=hd::{repo_dir} "));
    }
    args.push_str("ksdevice=link ip=dhcp ipv6=dhcp ");

    let mut command = Command::new("/sbin/grubby");
    command
        .arg(format!("--config-file={GRUB_CONFIG_FILE}"))
        .arg(format!("--add-kernel={boot_dir}/vmlinuz"))
        .arg(format!("--initrd={boot_dir}/initrd.img"))
        .arg(format!("--title={title}"))
        .arg(format!("--args={}", args.trim_end()));
    run_or_log(process, boot_dir, command)?;

    if basearch.starts_with("ppc") {
        debug!("running ybin to activate ppc boot changes");
        let mut ybin = Command::new("/sbin/ybin");
        run_or_log(process, boot_dir, ybin_command(&mut ybin))?;
    }
    Ok(())
}

fn ybin_command(command: &mut Command) -> Command {
    std::mem::replace(command, Command::new("/sbin/ybin"))
}

/// Mark the just-added kernel as the default for the next boot only.
pub fn make_default_once(process: &dyn ProcessRunner, boot_dir: &str) -> Result<(), EngineError> {
    let mut command = Command::new("/sbin/grubby");
    command
        .arg(format!("--config-file={GRUB_CONFIG_FILE}"))
        .arg(format!("--set-default={boot_dir}/vmlinuz"));
    run_or_log(process, boot_dir, command)
}

/// Assemble and write `<boot_dir>/ks.cfg`, per spec's literal template.
pub fn write_kickstart(
    boot_dir: &str,
    repo_dir: &str,
    uuid_root: &str,
) -> Result<(), EngineError> {
    let lang = read_shell_assignment(Path::new(I18N_FILE), "LANG").unwrap_or_else(|| {
        debug!("failed to read LANG from {I18N_FILE}, using default");
        DEFAULT_LANG.to_string()
    });
    let keymap = read_shell_assignment(Path::new(KEYBOARD_FILE), "KEYTABLE").unwrap_or_else(|| {
        debug!("failed to read KEYTABLE from {KEYBOARD_FILE}, using default");
        DEFAULT_KEYMAP.to_string()
    });

    let mut contents = String::new();
    contents.push_str("# ks.cfg generated by Zif\n");
    contents.push_str(&format!("lang {lang}\n"));
    contents.push_str(&format!("keyboard {keymap}\n"));
    contents.push_str("bootloader --upgrade --location=none\n");
    contents.push_str("clearpart --none\n");
    contents.push_str(&format!("upgrade --root-device=UUID={uuid_root}\n"));
    contents.push_str("reboot\n");
    contents.push('\n');
    contents.push_str("%post\n");
    contents.push_str(&format!("grubby --remove-kernel={boot_dir}/vmlinuz\n"));
    contents.push_str(&format!("rm -rf {boot_dir} {repo_dir}*\n"));
    contents.push_str("%end\n");

    let path = Path::new(boot_dir).join("ks.cfg");
    std::fs::write(&path, contents).map_err(|source| EngineError::WriteFailed {
        path: path.display().to_string(),
        source,
    })
}
