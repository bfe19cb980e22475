//! File content resource, compared by SHA-256.
use anyhow::{Context as _, Result};
use std::path::PathBuf;

use super::helpers::fs::{sha256_hex, write_atomic};
use super::{Resource, ResourceChange, ResourceState};

/// A regular file that should hold exactly `contents`.
#[derive(Debug, Clone)]
pub struct FileContentResource {
    /// Target path (absolute).
    pub target: PathBuf,
    /// Desired bytes.
    pub contents: Vec<u8>,
    /// Permissions for a newly written file.
    pub mode: Option<u32>,
}

impl FileContentResource {
    /// Create a new content resource.
    #[must_use]
    pub fn new(target: PathBuf, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            target,
            contents: contents.into(),
            mode: None,
        }
    }

    /// Permissions applied when the file is (re)written.
    #[must_use]
    pub const fn with_mode(mut self, mode: Option<u32>) -> Self {
        self.mode = mode;
        self
    }
}

impl Resource for FileContentResource {
    fn description(&self) -> String {
        format!("{} ({} bytes)", self.target.display(), self.contents.len())
    }

    fn current_state(&self) -> Result<ResourceState> {
        if self.target.is_dir() {
            return Ok(ResourceState::Invalid {
                reason: format!("target is a directory: {}", self.target.display()),
            });
        }
        if !self.target.exists() {
            return Ok(ResourceState::Missing);
        }
        let existing = std::fs::read(&self.target)
            .with_context(|| format!("read {}", self.target.display()))?;
        let current = sha256_hex(&existing);
        if current == sha256_hex(&self.contents) {
            Ok(ResourceState::Correct)
        } else {
            Ok(ResourceState::Incorrect {
                current: format!("sha256:{current}"),
            })
        }
    }

    fn apply(&self) -> Result<ResourceChange> {
        write_atomic(&self.target, &self.contents, self.mode)?;
        Ok(ResourceChange::Applied)
    }
}
