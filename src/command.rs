//! External command execution behind an injectable trait.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use tracing::debug;

use crate::error::CommandError;

/// A program invocation: argv plus the directory it runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub dir: PathBuf,
}

impl CommandSpec {
    /// Build a spec from an argv array as stored in the toolchain profile.
    pub fn from_argv(argv: &[String], dir: &Path) -> Result<Self, CommandError> {
        let (program, args) = argv.split_first().ok_or(CommandError::Empty)?;
        Ok(CommandSpec {
            program: program.clone(),
            args: args.to_vec(),
            dir: dir.to_path_buf(),
        })
    }

    /// The command line without the working directory, e.g. `go list -json ./...`.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Runs external commands and returns their stdout.
///
/// Calls block until the process exits; there is no timeout.
pub trait Commander {
    fn output(&self, spec: &CommandSpec) -> Result<Vec<u8>, CommandError>;
}

/// Real subprocess execution backed by `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommander;

impl Commander for SystemCommander {
    fn output(&self, spec: &CommandSpec) -> Result<Vec<u8>, CommandError> {
        debug!(command = %spec, dir = %spec.dir.display(), "spawning process");

        let output = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.dir)
            // `go list` derives `Dir` from $PWD when it names the working directory
            .env("PWD", &spec.dir)
            .output()
            .map_err(|source| CommandError::Spawn {
                command: spec.command_line(),
                source,
            })?;

        if !output.status.success() {
            return Err(CommandError::Status {
                command: spec.command_line(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        debug!(command = %spec, bytes = output.stdout.len(), "process completed");
        Ok(output.stdout)
    }
}

enum Scripted {
    Stdout(Vec<u8>),
    Failure(String),
}

/// Commander that answers from a fixed script instead of spawning processes.
///
/// Responses are keyed by command line. Unscripted commands fail as if the
/// program did not exist. Every call is recorded for later assertions.
#[derive(Default)]
pub struct ScriptedCommander {
    script: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedCommander {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: succeed with `stdout` when `command_line` runs.
    pub fn with_output(self, command_line: &str, stdout: impl AsRef<[u8]>) -> Self {
        self.lock_script().insert(
            command_line.to_string(),
            Scripted::Stdout(stdout.as_ref().to_vec()),
        );
        self
    }

    /// Builder: exit non-zero with `stderr` when `command_line` runs.
    pub fn with_failure(self, command_line: &str, stderr: &str) -> Self {
        self.lock_script().insert(
            command_line.to_string(),
            Scripted::Failure(stderr.to_string()),
        );
        self
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, HashMap<String, Scripted>> {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Commander for ScriptedCommander {
    fn output(&self, spec: &CommandSpec) -> Result<Vec<u8>, CommandError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(spec.clone());

        let command = spec.command_line();
        match self.lock_script().get(&command) {
            Some(Scripted::Stdout(stdout)) => Ok(stdout.clone()),
            Some(Scripted::Failure(stderr)) => Err(CommandError::Status {
                command,
                status: "exit status: 1".to_string(),
                stderr: stderr.clone(),
            }),
            None => Err(CommandError::Spawn {
                command,
                source: io::Error::new(io::ErrorKind::NotFound, "command not scripted"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_spec_from_argv_splits_program() {
        let spec = CommandSpec::from_argv(&argv(&["go", "list", "-json", "./..."]), Path::new("/src"))
            .unwrap();
        assert_eq!(spec.program, "go");
        assert_eq!(spec.args, argv(&["list", "-json", "./..."]));
        assert_eq!(spec.command_line(), "go list -json ./...");
    }

    #[test]
    fn test_spec_from_empty_argv_is_rejected() {
        assert!(matches!(
            CommandSpec::from_argv(&[], Path::new("/src")),
            Err(CommandError::Empty)
        ));
    }

    #[test]
    fn test_scripted_commander_answers_and_records() {
        let commander = ScriptedCommander::new()
            .with_output("go list -json ./...", "{}")
            .with_failure("go mod tidy", "boom");

        let list = CommandSpec::from_argv(&argv(&["go", "list", "-json", "./..."]), Path::new("/a"))
            .unwrap();
        let tidy = CommandSpec::from_argv(&argv(&["go", "mod", "tidy"]), Path::new("/a")).unwrap();
        let other = CommandSpec::from_argv(&argv(&["make"]), Path::new("/a")).unwrap();

        assert_eq!(commander.output(&list).unwrap(), b"{}".to_vec());
        assert!(matches!(
            commander.output(&tidy),
            Err(CommandError::Status { ref stderr, .. }) if stderr == "boom"
        ));
        assert!(matches!(
            commander.output(&other),
            Err(CommandError::Spawn { .. })
        ));
        assert_eq!(commander.calls().len(), 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_system_commander_reports_nonzero_exit() {
        let spec = CommandSpec::from_argv(&argv(&["false"]), Path::new("/")).unwrap();
        assert!(matches!(
            SystemCommander.output(&spec),
            Err(CommandError::Status { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_system_commander_captures_stdout() {
        let spec = CommandSpec::from_argv(&argv(&["echo", "hello"]), Path::new("/")).unwrap();
        let out = SystemCommander.output(&spec).unwrap();
        assert_eq!(String::from_utf8_lossy(&out).trim(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_system_commander_sets_pwd_to_working_directory() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().canonicalize().unwrap();
        let spec = CommandSpec::from_argv(
            &argv(&["sh", "-c", "printf %s \"$PWD\""]),
            &dir,
        )
        .unwrap();
        let out = SystemCommander.output(&spec).unwrap();
        assert_eq!(String::from_utf8_lossy(&out), dir.to_string_lossy());
    }
}
