//! The run's working directory, shared with template helpers.
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Working directory of a run.
///
/// Tracked per run instead of through the process-wide current directory,
/// so independent runs in one process do not interfere.
#[derive(Debug, Clone)]
pub struct WorkingDir(Arc<RwLock<PathBuf>>);

impl WorkingDir {
    /// Start at `path`.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self(Arc::new(RwLock::new(path)))
    }

    /// Current directory.
    #[must_use]
    pub fn get(&self) -> PathBuf {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Change directory; relative paths resolve against the current one.
    pub fn set(&self, path: &Path) {
        let resolved = self.resolve(path);
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = resolved;
    }

    /// Resolve `path` against the working directory and normalize it.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize(path)
        } else {
            normalize(&self.get().join(path))
        }
    }
}

/// Lexically remove `.` and `..` components.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    dunce::simplified(&out).to_path_buf()
}
