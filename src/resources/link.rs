//! Symbolic and hard link resources.
use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};

use super::helpers::fs::remove_existing;
use super::{Resource, ResourceChange, ResourceState};

/// Whether `path` is a real directory rather than a link to one.
fn is_real_dir(path: &Path) -> bool {
    path.symlink_metadata().is_ok_and(|m| m.is_dir())
}

/// A symlink at `target` whose contents are exactly `source`.
///
/// `source` is stored verbatim, so relative sources stay relative to the
/// link's directory and dangling links are allowed.
#[derive(Debug, Clone)]
pub struct SymlinkResource {
    /// What the symlink points to.
    pub source: PathBuf,
    /// Where the symlink is created.
    pub target: PathBuf,
}

impl SymlinkResource {
    /// Create a new symlink resource.
    #[must_use]
    pub const fn new(source: PathBuf, target: PathBuf) -> Self {
        Self { source, target }
    }
}

impl Resource for SymlinkResource {
    fn description(&self) -> String {
        format!("{} -> {}", self.target.display(), self.source.display())
    }

    fn current_state(&self) -> Result<ResourceState> {
        if is_real_dir(&self.target) {
            return Ok(ResourceState::Invalid {
                reason: "target is a real directory".to_string(),
            });
        }
        match std::fs::read_link(&self.target) {
            Ok(existing) if existing == self.source => Ok(ResourceState::Correct),
            Ok(existing) => Ok(ResourceState::Incorrect {
                current: format!("points to {}", existing.display()),
            }),
            Err(_) if self.target.symlink_metadata().is_ok() => Ok(ResourceState::Incorrect {
                current: "target is a regular file".to_string(),
            }),
            Err(_) => Ok(ResourceState::Missing),
        }
    }

    fn apply(&self) -> Result<ResourceChange> {
        remove_existing(&self.target)?;
        create_symlink(&self.source, &self.target)?;
        Ok(ResourceChange::Applied)
    }
}

/// Create a symlink at `link` pointing to `target`.
fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    #[cfg(unix)]
    let result = std::os::unix::fs::symlink(target, link);
    #[cfg(windows)]
    let result = if target.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    };
    result.with_context(|| {
        format!(
            "creating symlink {} -> {}",
            link.display(),
            target.display()
        )
    })
}

/// A hard link at `target` sharing the inode of `source`.
#[derive(Debug, Clone)]
pub struct HardLinkResource {
    /// Existing file to link to.
    pub source: PathBuf,
    /// Where the link is created.
    pub target: PathBuf,
}

impl HardLinkResource {
    /// Create a new hard link resource.
    #[must_use]
    pub const fn new(source: PathBuf, target: PathBuf) -> Self {
        Self { source, target }
    }
}

#[cfg(unix)]
fn same_file(a: &std::fs::Metadata, b: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(not(unix))]
fn same_file(_: &std::fs::Metadata, _: &std::fs::Metadata) -> bool {
    false
}

impl Resource for HardLinkResource {
    fn description(&self) -> String {
        format!("{} => {}", self.target.display(), self.source.display())
    }

    fn current_state(&self) -> Result<ResourceState> {
        let Ok(source) = std::fs::metadata(&self.source) else {
            return Ok(ResourceState::Invalid {
                reason: format!("source does not exist: {}", self.source.display()),
            });
        };
        if is_real_dir(&self.target) {
            return Ok(ResourceState::Invalid {
                reason: "target is a real directory".to_string(),
            });
        }
        match std::fs::metadata(&self.target) {
            Ok(target) if same_file(&source, &target) => Ok(ResourceState::Correct),
            Ok(_) => Ok(ResourceState::Incorrect {
                current: "target is a different file".to_string(),
            }),
            Err(_) => Ok(ResourceState::Missing),
        }
    }

    fn apply(&self) -> Result<ResourceChange> {
        remove_existing(&self.target)?;
        std::fs::hard_link(&self.source, &self.target).with_context(|| {
            format!(
                "creating hard link {} => {}",
                self.target.display(),
                self.source.display()
            )
        })?;
        Ok(ResourceChange::Applied)
    }
}

#[cfg(all(test, unix))]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn symlink_description() {
        let resource = SymlinkResource::new(PathBuf::from("/source"), PathBuf::from("/target"));
        assert_eq!(resource.description(), "/target -> /source");
    }

    #[test]
    fn symlink_missing_then_correct() {
        let temp_dir = tempfile::tempdir().unwrap();
        let target = temp_dir.path().join("target");
        let resource = SymlinkResource::new(PathBuf::from("/nonexistent/source"), target.clone());

        assert_eq!(resource.current_state().unwrap(), ResourceState::Missing);
        assert!(resource.converge().unwrap().changed());
        assert_eq!(
            std::fs::read_link(&target).unwrap(),
            PathBuf::from("/nonexistent/source")
        );
        assert_eq!(resource.converge().unwrap(), ResourceChange::AlreadyCorrect);
    }

    #[test]
    fn symlink_pointing_elsewhere_is_replaced() {
        let temp_dir = tempfile::tempdir().unwrap();
        let target = temp_dir.path().join("target");
        std::os::unix::fs::symlink("/other", &target).unwrap();

        let resource = SymlinkResource::new(PathBuf::from("/wanted"), target.clone());
        assert!(matches!(
            resource.current_state().unwrap(),
            ResourceState::Incorrect { .. }
        ));
        resource.converge().unwrap();
        assert_eq!(std::fs::read_link(&target).unwrap(), PathBuf::from("/wanted"));
    }

    #[test]
    fn symlink_replaces_regular_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let target = temp_dir.path().join("target");
        std::fs::write(&target, "content").unwrap();

        let resource = SymlinkResource::new(PathBuf::from("/wanted"), target.clone());
        assert_eq!(
            resource.current_state().unwrap(),
            ResourceState::Incorrect {
                current: "target is a regular file".to_string()
            }
        );
        resource.converge().unwrap();
        assert!(target.symlink_metadata().unwrap().is_symlink());
    }

    #[test]
    fn symlink_refuses_real_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let resource =
            SymlinkResource::new(PathBuf::from("/wanted"), temp_dir.path().to_path_buf());
        assert!(matches!(
            resource.current_state().unwrap(),
            ResourceState::Invalid { .. }
        ));
    }

    #[test]
    fn hard_link_shares_inode() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("source");
        let target = temp_dir.path().join("target");
        std::fs::write(&source, "data").unwrap();

        let resource = HardLinkResource::new(source, target.clone());
        assert_eq!(resource.current_state().unwrap(), ResourceState::Missing);
        assert!(resource.converge().unwrap().changed());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "data");
        assert_eq!(resource.current_state().unwrap(), ResourceState::Correct);
    }

    #[test]
    fn hard_link_replaces_different_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("source");
        let target = temp_dir.path().join("target");
        std::fs::write(&source, "data").unwrap();
        std::fs::write(&target, "other").unwrap();

        let resource = HardLinkResource::new(source, target.clone());
        assert!(resource.current_state().unwrap().needs_change());
        resource.converge().unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "data");
    }

    #[test]
    fn hard_link_requires_source() {
        let temp_dir = tempfile::tempdir().unwrap();
        let resource = HardLinkResource::new(
            temp_dir.path().join("missing"),
            temp_dir.path().join("target"),
        );
        assert!(matches!(
            resource.current_state().unwrap(),
            ResourceState::Invalid { .. }
        ));
    }
}
