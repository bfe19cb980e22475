//! File permission resource.
use anyhow::{Context as _, Result};
use std::path::PathBuf;

use super::mode::ModeSpec;
use super::{Resource, ResourceChange, ResourceState};

/// Permission bits of an existing path (Unix only).
#[derive(Debug, Clone)]
pub struct ChmodResource {
    /// Target path (absolute).
    pub target: PathBuf,
    /// Desired permissions.
    pub mode: ModeSpec,
    /// Treat the target as a directory for `X`; detected when `None`.
    pub is_directory: Option<bool>,
}

impl ChmodResource {
    /// Create a new chmod resource.
    #[must_use]
    pub const fn new(target: PathBuf, mode: ModeSpec) -> Self {
        Self {
            target,
            mode,
            is_directory: None,
        }
    }

    /// Override directory detection.
    #[must_use]
    pub const fn with_is_directory(mut self, is_directory: Option<bool>) -> Self {
        self.is_directory = is_directory;
        self
    }

    /// Current permission bits of the target.
    ///
    /// # Errors
    ///
    /// Returns an error if the target cannot be read, or on platforms without
    /// Unix permissions.
    pub fn current_mode(&self) -> Result<u32> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let meta = std::fs::metadata(&self.target)
                .with_context(|| format!("stat {}", self.target.display()))?;
            Ok(meta.permissions().mode() & 0o7777)
        }

        #[cfg(not(unix))]
        {
            Err(super::ResourceError::UnsupportedOperation {
                operation: "chmod".to_string(),
            }
            .into())
        }
    }

    /// Permission bits the target should have.
    ///
    /// # Errors
    ///
    /// Returns an error if the current mode cannot be read or the mode is
    /// malformed.
    pub fn desired_mode(&self) -> Result<u32> {
        let current = self.current_mode()?;
        let is_dir = self.is_directory.unwrap_or_else(|| self.target.is_dir());
        Ok(self.mode.resolve(current, is_dir)?)
    }
}

impl Resource for ChmodResource {
    fn description(&self) -> String {
        format!("{} {}", self.mode, self.target.display())
    }

    fn current_state(&self) -> Result<ResourceState> {
        if !self.target.exists() {
            return Ok(ResourceState::Invalid {
                reason: format!("target does not exist: {}", self.target.display()),
            });
        }

        let current = self.current_mode()?;
        if current == self.desired_mode()? {
            Ok(ResourceState::Correct)
        } else {
            Ok(ResourceState::Incorrect {
                current: format!("{current:o}"),
            })
        }
    }

    fn apply(&self) -> Result<ResourceChange> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mode = self.desired_mode()?;
            std::fs::set_permissions(&self.target, std::fs::Permissions::from_mode(mode))
                .with_context(|| format!("set permissions: {}", self.target.display()))?;
            Ok(ResourceChange::Applied)
        }

        #[cfg(not(unix))]
        {
            Err(super::ResourceError::UnsupportedOperation {
                operation: "chmod".to_string(),
            }
            .into())
        }
    }
}
