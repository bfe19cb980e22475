// Shared helpers for integration tests.
//
// Provides a temporary directory holding a playbook search directory and a
// separate working directory, so each integration test runs the driver end
// to end without touching the real home or current directory.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use uplaybook::cli::RunOpts;
use uplaybook::commands::run::run;
use uplaybook::commands::{RunEnv, RunReport};
use uplaybook::logging::{BufferedLog, LogEntry};

/// An isolated playbook environment backed by a [`tempfile::TempDir`].
///
/// Layout:
/// - `playbooks/` is the only search directory
/// - `work/` is the run's working directory
pub struct PlaybookTestContext {
    /// Temporary directory holding both trees.
    pub root: tempfile::TempDir,
    /// Log of the most recent run.
    pub log: Arc<BufferedLog>,
    /// Interrupt flag handed to every run.
    pub interrupt: Arc<AtomicBool>,
}

impl PlaybookTestContext {
    /// Create empty `playbooks/` and `work/` directories.
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        std::fs::create_dir_all(root.path().join("playbooks")).expect("create playbooks dir");
        std::fs::create_dir_all(root.path().join("work")).expect("create work dir");
        Self {
            root,
            log: Arc::new(BufferedLog::new()),
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The playbook search directory.
    pub fn playbooks(&self) -> PathBuf {
        self.root.path().join("playbooks")
    }

    /// The run's working directory.
    pub fn work(&self) -> PathBuf {
        self.root.path().join("work")
    }

    /// Write `playbooks/<name>.toml`.
    pub fn write_playbook(&self, name: &str, source: &str) -> PathBuf {
        let path = self.playbooks().join(format!("{name}.toml"));
        std::fs::write(&path, source).expect("write playbook");
        path
    }

    /// Write a file relative to the playbook directory.
    pub fn write_playbook_file(&self, relative: &str, contents: &str) {
        let path = self.playbooks().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dir");
        }
        std::fs::write(path, contents).expect("write playbook file");
    }

    /// Run `playbook` with `args` using a fresh log.
    pub fn run(&mut self, playbook: &str, args: &[&str]) -> RunReport {
        self.run_with(RunOpts {
            full_trace: false,
            playbook: Some(playbook.to_string()),
            args: args.iter().map(ToString::to_string).collect(),
        })
    }

    /// Run with explicit options using a fresh log.
    pub fn run_with(&mut self, opts: RunOpts) -> RunReport {
        self.log = Arc::new(BufferedLog::new());
        let env = RunEnv {
            search_dirs: vec![self.playbooks()],
            workdir: Some(self.work()),
            interrupt: Arc::clone(&self.interrupt),
        };
        run(&opts, &env, self.log.clone())
    }

    /// Status lines of the most recent run.
    pub fn status_lines(&self) -> Vec<String> {
        self.log.status_lines()
    }

    /// Error entries of the most recent run.
    pub fn errors(&self) -> Vec<String> {
        self.entries_matching(|e| matches!(e, LogEntry::Error(_)))
    }

    /// Warning entries of the most recent run.
    pub fn warnings(&self) -> Vec<String> {
        self.entries_matching(|e| matches!(e, LogEntry::Warn(_)))
    }

    /// The recap line of the most recent run, if any.
    pub fn recap(&self) -> Option<String> {
        self.entries_matching(|e| matches!(e, LogEntry::Recap(_)))
            .pop()
    }

    fn entries_matching(&self, keep: impl Fn(&LogEntry) -> bool) -> Vec<String> {
        self.log
            .entries()
            .iter()
            .filter(|e| keep(e))
            .map(|e| e.text().to_string())
            .collect()
    }

    /// Read a file from the working directory.
    pub fn read_work_file(&self, relative: &str) -> String {
        std::fs::read_to_string(self.work().join(relative)).expect("read work file")
    }

    /// Whether a path exists in the working directory.
    pub fn work_exists(&self, relative: &str) -> bool {
        Path::new(&self.work().join(relative)).exists()
    }
}
