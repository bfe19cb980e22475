//! Core logging types: status kinds and the [`Log`] trait.

/// Outcome category of a reported task invocation.
///
/// Each kind has its own status glyph. Changed outranks failed, and failed
/// outranks plain success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// The task changed system state.
    Changed,
    /// The task succeeded and nothing needed to change.
    Unchanged,
    /// The task failed while failures were tolerated.
    FailureIgnored,
    /// The task failed and the failure aborts the run.
    Failed,
}

impl StatusKind {
    /// Glyph printed after the depth marker.
    ///
    /// ```
    /// use uplaybook::logging::StatusKind;
    /// assert_eq!(StatusKind::Changed.glyph(), "=>");
    /// assert_eq!(StatusKind::Unchanged.glyph(), "=#");
    /// ```
    #[must_use]
    pub const fn glyph(self) -> &'static str {
        match self {
            Self::Changed => "=>",
            Self::Unchanged => "=#",
            Self::FailureIgnored => "=!",
            Self::Failed => "=X",
        }
    }

    /// Trailing annotation appended to the status line.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::FailureIgnored => " (failure ignored)",
            Self::Changed | Self::Unchanged | Self::Failed => "",
        }
    }

    /// Whether this kind represents a failed task, tolerated or not.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::FailureIgnored | Self::Failed)
    }
}

/// Abstraction over logging backends.
///
/// [`Logger`](super::logger::Logger) emits through `tracing` immediately;
/// [`BufferedLog`](super::buffered::BufferedLog) keeps entries in memory so
/// they can be inspected or replayed later.
pub trait Log: Send + Sync {
    /// Emit a task status line.
    fn status(&self, kind: StatusKind, line: &str);
    /// Emit a block of task output shown beneath its status line.
    fn output(&self, text: &str);
    /// Emit a handler bracket message.
    fn handler(&self, msg: &str);
    /// Emit the end-of-run recap.
    fn recap(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
}
