//! External process execution.
use anyhow::{Context as _, Result, bail};
use std::path::Path;
use std::process::{Command, Output};

/// Result of a command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Whether the process exited successfully.
    pub success: bool,
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Process runner used by tasks that shell out.
///
/// Commands never fail on a non-zero exit; callers inspect
/// [`ExecResult::success`] and decide how to report it.
#[cfg_attr(test, mockall::automock)]
pub trait Executor: Send + Sync {
    /// Run `command` through `sh -c` in `cwd`.
    fn run_shell(&self, command: &str, cwd: &Path) -> Result<ExecResult>;
    /// Run `argv[0]` with the remaining elements as arguments in `cwd`.
    fn run_argv(&self, argv: &[String], cwd: &Path) -> Result<ExecResult>;
    /// Whether `program` is available on `PATH`.
    fn which(&self, program: &str) -> bool;
}

/// [`Executor`] backed by [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn run_shell(&self, command: &str, cwd: &Path) -> Result<ExecResult> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(cwd)
            .output()
            .with_context(|| format!("failed to execute: {command}"))?;
        Ok(ExecResult::from(output))
    }

    fn run_argv(&self, argv: &[String], cwd: &Path) -> Result<ExecResult> {
        let Some((program, args)) = argv.split_first() else {
            bail!("empty command");
        };
        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .output()
            .with_context(|| format!("failed to execute: {program}"))?;
        Ok(ExecResult::from(output))
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}
