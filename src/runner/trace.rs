//! Failure traces: which statements were executing when a run failed.
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// One executing statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Playbook file the statement came from.
    pub file: PathBuf,
    /// Statement location such as `steps[2].steps[0]`.
    pub location: String,
    /// Statement name or task.
    pub label: String,
}

impl Frame {
    /// Trace line for this frame.
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "  File: \"{}\", {}, in {}",
            self.file.display(),
            self.location,
            self.label
        )
    }
}

/// Stack of executing statements, plus a snapshot taken at the first
/// failure.
#[derive(Debug, Default)]
pub struct Trace {
    active: RefCell<Vec<Frame>>,
    failure: RefCell<Option<Vec<Frame>>>,
}

impl Trace {
    pub(super) fn enter(&self, frame: Frame) {
        self.active.borrow_mut().push(frame);
    }

    /// Pop the innermost frame. The innermost failing statement records the
    /// snapshot; outer frames unwinding the same error leave it alone.
    pub(super) fn leave(&self, failed: bool) {
        if failed && self.failure.borrow().is_none() {
            let snapshot = self.active.borrow().iter().rev().cloned().collect();
            *self.failure.borrow_mut() = Some(snapshot);
        }
        self.active.borrow_mut().pop();
    }

    /// Frames of the first failure, innermost first.
    #[must_use]
    pub fn failure(&self) -> Vec<Frame> {
        self.failure.borrow().clone().unwrap_or_default()
    }

    /// Trace lines for the first failure, restricted to `files_seen`
    /// unless `full` is set.
    #[must_use]
    pub fn render(&self, files_seen: &BTreeSet<PathBuf>, full: bool) -> Vec<String> {
        self.failure()
            .iter()
            .filter(|frame| full || files_seen.contains(&frame.file))
            .map(Frame::describe)
            .collect()
    }
}
