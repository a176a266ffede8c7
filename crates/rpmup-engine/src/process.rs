//! External process invocation behind a capability interface, so the
//! engine's spawn sites (`blkid`, `grubby`, `ybin`, `createrepo`,
//! `modifyrepo`) can be exercised in tests without touching the host.
//!
//! Grounded on `soar_core::package::hooks::run_hook`'s non-sandboxed
//! `std::process::Command` path — fixed system tools invoked with fixed
//! arguments don't need the Landlock sandboxing `run_hook` applies to
//! arbitrary hook scripts.

use std::process::{Command, ExitStatus, Output};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to spawn `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with status {code:?}")]
    NonZeroExit { command: String, code: Option<i32> },
}

/// Runs an external command and reports its exit status plus captured
/// output. Every spawn site in the engine goes through this trait instead
/// of calling `std::process::Command` directly, so tests can inject a
/// recorder in place of the host's actual `blkid`/`grubby`/etc.
pub trait ProcessRunner {
    fn run(&self, command: &mut Command) -> Result<Output, SpawnError>;
}

/// Spawns the command for real and waits for it to exit.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealProcessRunner;

impl ProcessRunner for RealProcessRunner {
    fn run(&self, command: &mut Command) -> Result<Output, SpawnError> {
        let program = command.get_program().to_string_lossy().into_owned();
        command
            .output()
            .map_err(|source| SpawnError::Io { command: program, source })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::collections::HashMap;
    use std::os::unix::process::ExitStatusExt;
    use std::sync::Mutex;

    /// Records the command line of every invocation and reports a
    /// configurable canned stdout/exit code per program, without actually
    /// spawning anything.
    #[derive(Default)]
    pub struct RecordingProcessRunner {
        pub commands: Mutex<Vec<String>>,
        pub stdout_for: HashMap<String, String>,
        pub fail_programs: Vec<String>,
    }

    impl ProcessRunner for RecordingProcessRunner {
        fn run(&self, command: &mut Command) -> Result<Output, SpawnError> {
            let program = command.get_program().to_string_lossy().into_owned();
            let args: Vec<String> = command
                .get_args()
                .map(|a| a.to_string_lossy().into_owned())
                .collect();
            let line = if args.is_empty() {
                program.clone()
            } else {
                format!("{program} {}", args.join(" "))
            };
            self.commands.lock().unwrap().push(line);

            let code: i32 = if self.fail_programs.iter().any(|p| p == &program) {
                1
            } else {
                0
            };
            let stdout = self
                .stdout_for
                .get(&program)
                .cloned()
                .unwrap_or_default()
                .into_bytes();
            Ok(Output {
                // raw wait-status encoding: low byte 0 means exited
                // normally, exit code is the next byte up.
                status: ExitStatus::from_raw(code << 8),
                stdout,
                stderr: Vec::new(),
            })
        }
    }
}
