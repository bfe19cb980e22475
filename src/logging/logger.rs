//! Structured logger that routes playbook output through `tracing`.
use std::path::{Path, PathBuf};

use super::types::{Log, StatusKind};
use super::utils::log_file_path;

/// Implement the plain-message methods of [`Log`] by delegating to inherent
/// methods of the same name on the implementing type.
///
/// `status` is **not** included because it also carries a [`StatusKind`].
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// Structured logger for a playbook run.
///
/// Every record becomes a `tracing` event whose target names the record
/// kind, so the console formatter can colour status lines and the file layer
/// can write them to `$XDG_CACHE_HOME/uplaybook/<playbook>.log`.
#[derive(Debug)]
pub struct Logger {
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Create a logger for the playbook `name`.
    ///
    /// Only remembers the log file path for the recap; the file itself is
    /// created by [`init_subscriber`](super::subscriber::init_subscriber).
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            log_file: log_file_path(name),
        }
    }

    /// Return the log file path, if the cache directory is available.
    #[must_use]
    pub fn log_path(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// Emit a task status line under the target matching `kind`.
    pub fn status(&self, kind: StatusKind, line: &str) {
        match kind {
            StatusKind::Changed => tracing::info!(target: "uplaybook::changed", "{line}"),
            StatusKind::Unchanged => tracing::info!(target: "uplaybook::unchanged", "{line}"),
            StatusKind::FailureIgnored => tracing::info!(target: "uplaybook::ignored", "{line}"),
            StatusKind::Failed => tracing::info!(target: "uplaybook::failed", "{line}"),
        }
    }

    /// Emit task output beneath the preceding status line.
    pub fn output(&self, text: &str) {
        tracing::info!(target: "uplaybook::output", "{text}");
    }

    /// Emit a handler bracket message.
    pub fn handler(&self, msg: &str) {
        tracing::info!(target: "uplaybook::handler", "{msg}");
    }

    /// Emit the recap line, followed by the log file location at debug level.
    pub fn recap(&self, msg: &str) {
        tracing::info!(target: "uplaybook::recap", "{msg}");
        if let Some(path) = &self.log_file {
            tracing::debug!("log: {}", path.display());
        }
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a debug message (suppressed on console unless verbose; always
    /// written to the log file).
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }
}

impl Log for Logger {
    forward_log_methods!(output, handler, recap, info, debug, warn, error);

    fn status(&self, kind: StatusKind, line: &str) {
        self.status(kind, line);
    }
}
