//! File-system resource helpers.
use anyhow::{Context as _, Result};
use sha2::{Digest as _, Sha256};
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// Hex-encoded SHA-256 digest of `data`.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Sibling temp path for staging writes to `path`, on the same filesystem
/// so the final rename is atomic.
#[must_use]
pub fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "file".into(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!(".{name}.tmp.{}", std::process::id()))
}

/// Write `data` to `path` by staging it in a sibling temp file and renaming
/// it into place. `mode` sets the permissions of the new file.
///
/// # Errors
///
/// Returns an error if the temp file cannot be written or renamed; the temp
/// file is removed on failure.
pub fn write_atomic(path: &Path, data: &[u8], mode: Option<u32>) -> Result<()> {
    let tmp = staging_path(path);
    let cleanup = || {
        let _ = std::fs::remove_file(&tmp);
    };

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    if let Some(mode) = mode {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let written = options
        .open(&tmp)
        .and_then(|mut file| file.write_all(data));
    if let Err(e) = written {
        cleanup();
        return Err(e).with_context(|| format!("write {}", tmp.display()));
    }

    #[cfg(unix)]
    if let Some(mode) = mode {
        use std::os::unix::fs::PermissionsExt;
        // The open mode is filtered by the umask.
        if let Err(e) = std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(mode)) {
            cleanup();
            return Err(e).with_context(|| format!("set permissions: {}", tmp.display()));
        }
    }

    if let Err(e) = std::fs::rename(&tmp, path) {
        cleanup();
        return Err(e).with_context(|| format!("rename {} to {}", tmp.display(), path.display()));
    }
    Ok(())
}

/// Permission bits of `path`, following symlinks.
///
/// # Errors
///
/// Returns an error if `path` cannot be read.
#[cfg(unix)]
pub fn file_mode(path: &Path) -> Result<u32> {
    use std::os::unix::fs::PermissionsExt;
    let meta = std::fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
    Ok(meta.permissions().mode() & 0o7777)
}

/// Permission bits of `path`; reported as `0o644` without Unix permissions.
///
/// # Errors
///
/// Returns an error if `path` cannot be read.
#[cfg(not(unix))]
pub fn file_mode(path: &Path) -> Result<u32> {
    std::fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
    Ok(0o644)
}

/// Set the permission bits of `path`. A no-op without Unix permissions.
///
/// # Errors
///
/// Returns an error if the permissions cannot be changed.
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .with_context(|| format!("set permissions: {}", path.display()))
    }

    #[cfg(not(unix))]
    {
        let _ = (path, mode);
        Ok(())
    }
}

/// Remove an existing file or symlink at `path`, including broken symlinks.
///
/// Does nothing if `path` does not exist.
///
/// # Errors
///
/// Returns an error if the path exists but cannot be removed.
pub fn remove_existing(path: &Path) -> Result<()> {
    if path.symlink_metadata().is_ok() {
        std::fs::remove_file(path)
            .with_context(|| format!("remove existing: {}", path.display()))?;
    }
    Ok(())
}
