//! File ownership resource and user/group name resolution.
use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};

use super::{Resource, ResourceChange, ResourceError, ResourceState};

const PASSWD: &str = "/etc/passwd";
const GROUP: &str = "/etc/group";

/// Find `name` in a colon-separated account database (`passwd(5)` or
/// `group(5)` layout) and return its numeric id (third field).
#[must_use]
pub fn lookup_id(database: &str, name: &str) -> Option<u32> {
    database
        .lines()
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| {
            let mut fields = line.split(':');
            if fields.next()? != name {
                return None;
            }
            fields.nth(1)?.trim().parse().ok()
        })
}

fn resolve(name: &str, database: &Path, unknown: fn(String) -> ResourceError) -> Result<u32> {
    if let Ok(id) = name.parse::<u32>() {
        return Ok(id);
    }
    let contents = std::fs::read_to_string(database)
        .with_context(|| format!("reading {}", database.display()))?;
    lookup_id(&contents, name).ok_or_else(|| unknown(name.to_string()).into())
}

/// Resolve a user name or numeric uid.
///
/// # Errors
///
/// Returns [`ResourceError::UnknownUser`] if the name is not in
/// `/etc/passwd`.
pub fn resolve_user(name: &str) -> Result<u32> {
    resolve(name, Path::new(PASSWD), ResourceError::UnknownUser)
}

/// Resolve a group name or numeric gid.
///
/// # Errors
///
/// Returns [`ResourceError::UnknownGroup`] if the name is not in
/// `/etc/group`.
pub fn resolve_group(name: &str) -> Result<u32> {
    resolve(name, Path::new(GROUP), ResourceError::UnknownGroup)
}

/// Owner and/or group of an existing path (Unix only).
#[derive(Debug, Clone)]
pub struct OwnerResource {
    /// Target path (absolute).
    pub target: PathBuf,
    /// Desired uid, unchanged when `None`.
    pub uid: Option<u32>,
    /// Desired gid, unchanged when `None`.
    pub gid: Option<u32>,
}

impl OwnerResource {
    /// Create a new ownership resource.
    #[must_use]
    pub const fn new(target: PathBuf, uid: Option<u32>, gid: Option<u32>) -> Self {
        Self { target, uid, gid }
    }

    /// Current `(uid, gid)` of the target.
    ///
    /// # Errors
    ///
    /// Returns an error if the target cannot be read, or on platforms without
    /// Unix ownership.
    pub fn current_owner(&self) -> Result<(u32, u32)> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let meta = std::fs::metadata(&self.target)
                .with_context(|| format!("stat {}", self.target.display()))?;
            Ok((meta.uid(), meta.gid()))
        }

        #[cfg(not(unix))]
        {
            Err(ResourceError::UnsupportedOperation {
                operation: "chown".to_string(),
            }
            .into())
        }
    }
}

impl Resource for OwnerResource {
    fn description(&self) -> String {
        let id = |v: Option<u32>| v.map_or_else(|| "-".to_string(), |v| v.to_string());
        format!("{}:{} {}", id(self.uid), id(self.gid), self.target.display())
    }

    fn current_state(&self) -> Result<ResourceState> {
        if !self.target.exists() {
            return Ok(ResourceState::Invalid {
                reason: format!("target does not exist: {}", self.target.display()),
            });
        }
        let (uid, gid) = self.current_owner()?;
        let uid_ok = self.uid.is_none_or(|want| want == uid);
        let gid_ok = self.gid.is_none_or(|want| want == gid);
        if uid_ok && gid_ok {
            Ok(ResourceState::Correct)
        } else {
            Ok(ResourceState::Incorrect {
                current: format!("{uid}:{gid}"),
            })
        }
    }

    fn apply(&self) -> Result<ResourceChange> {
        #[cfg(unix)]
        {
            std::os::unix::fs::chown(&self.target, self.uid, self.gid)
                .with_context(|| format!("chown {}", self.target.display()))?;
            Ok(ResourceChange::Applied)
        }

        #[cfg(not(unix))]
        {
            Err(ResourceError::UnsupportedOperation {
                operation: "chown".to_string(),
            }
            .into())
        }
    }
}
