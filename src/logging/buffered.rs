//! In-memory logger that captures records for later inspection or replay.
use std::sync::Mutex;

use super::types::{Log, StatusKind};

/// A single captured log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    /// A task status line.
    Status(StatusKind, String),
    /// A task output block.
    Output(String),
    /// A handler bracket message.
    Handler(String),
    /// The recap line.
    Recap(String),
    /// An informational entry.
    Info(String),
    /// A debug entry.
    Debug(String),
    /// A warning entry.
    Warn(String),
    /// An error entry.
    Error(String),
}

impl LogEntry {
    /// Replay this entry into another [`Log`].
    fn replay(&self, log: &dyn Log) {
        match self {
            Self::Status(kind, line) => log.status(*kind, line),
            Self::Output(msg) => log.output(msg),
            Self::Handler(msg) => log.handler(msg),
            Self::Recap(msg) => log.recap(msg),
            Self::Info(msg) => log.info(msg),
            Self::Debug(msg) => log.debug(msg),
            Self::Warn(msg) => log.warn(msg),
            Self::Error(msg) => log.error(msg),
        }
    }

    /// The text carried by this entry.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Status(_, msg)
            | Self::Output(msg)
            | Self::Handler(msg)
            | Self::Recap(msg)
            | Self::Info(msg)
            | Self::Debug(msg)
            | Self::Warn(msg)
            | Self::Error(msg) => msg,
        }
    }
}

/// Implement the plain-message methods of [`Log`] by buffering each message
/// as the corresponding [`LogEntry`] variant.
macro_rules! buffer_log_methods {
    ($($method:ident => $variant:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.push(LogEntry::$variant(msg.to_string()));
            }
        )+
    };
}

/// Logger that records every entry in memory.
///
/// Used to embed a run without touching the terminal and to assert on the
/// exact status lines a run produced. Entries can be replayed in order into
/// another [`Log`].
#[derive(Debug, Default)]
pub struct BufferedLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl BufferedLog {
    /// Create an empty buffered logger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, entry: LogEntry) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.push(entry);
        }
    }

    /// Return a copy of every captured entry.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Return the captured status lines, in order.
    #[must_use]
    pub fn status_lines(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|entry| match entry {
                LogEntry::Status(_, line) => Some(line),
                _ => None,
            })
            .collect()
    }

    /// Return the text of every captured entry, in order.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.entries()
            .iter()
            .map(|entry| entry.text().to_string())
            .collect()
    }

    /// Replay all captured entries into `log` and clear the buffer.
    pub fn drain_into(&self, log: &dyn Log) {
        let entries = match self.entries.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => return,
        };
        for entry in &entries {
            entry.replay(log);
        }
    }
}

impl Log for BufferedLog {
    buffer_log_methods! {
        output  => Output,
        handler => Handler,
        recap   => Recap,
        info    => Info,
        debug   => Debug,
        warn    => Warn,
        error   => Error,
    }

    fn status(&self, kind: StatusKind, line: &str) {
        self.push(LogEntry::Status(kind, line.to_string()));
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::isolated_logger;
    use std::fs;

    #[test]
    fn captures_entries_in_order() {
        let buf = BufferedLog::new();
        buf.status(StatusKind::Changed, "=> a()");
        buf.output("out");
        buf.info("info");
        assert_eq!(
            buf.entries(),
            vec![
                LogEntry::Status(StatusKind::Changed, "=> a()".to_string()),
                LogEntry::Output("out".to_string()),
                LogEntry::Info("info".to_string()),
            ]
        );
    }

    #[test]
    fn status_lines_filters_other_entries() {
        let buf = BufferedLog::new();
        buf.handler(">> *** Starting handler: h");
        buf.status(StatusKind::Unchanged, "=# b()");
        buf.warn("careful");
        assert_eq!(buf.status_lines(), vec!["=# b()".to_string()]);
    }

    #[test]
    fn drain_into_replays_and_clears() {
        let (log, _tmp, _guard) = isolated_logger();
        let buf = BufferedLog::new();
        let marker = format!("buf-marker-{}", std::process::id());
        buf.status(StatusKind::Changed, &marker);
        buf.drain_into(&log);
        let contents = fs::read_to_string(log.log_path().expect("log path")).unwrap();
        assert!(contents.contains(&marker));
        assert!(buf.entries().is_empty());
    }

    #[test]
    fn drain_into_another_buffer_preserves_order() {
        let first = BufferedLog::new();
        first.recap("recap");
        first.error("err");
        let second = BufferedLog::new();
        first.drain_into(&second);
        assert_eq!(second.lines(), vec!["recap".to_string(), "err".to_string()]);
    }
}
