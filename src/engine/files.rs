//! Locating task source files along the search path.
use std::path::{Path, PathBuf};

use anyhow::anyhow;

use super::context::RunContext;
use crate::error::PlaybookError;

/// Expand a `:`-separated search path; a leading `...` stands for the
/// playbook directory.
fn search_dirs(files_path: &str, playbook_dir: &Path) -> Vec<PathBuf> {
    files_path
        .split(':')
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.strip_prefix("...") {
            Some(rest) => playbook_dir.join(rest.trim_start_matches('/')),
            None => PathBuf::from(entry),
        })
        .collect()
}

/// Find `name` on the run's search path.
///
/// Absolute names are returned as-is when they exist. Relative search
/// directories resolve against the run's working directory.
///
/// # Errors
///
/// Returns [`PlaybookError::Operation`] if no candidate exists.
pub fn find_file(ctx: &RunContext, name: &str) -> Result<PathBuf, PlaybookError> {
    let path = Path::new(name);
    if path.is_absolute() {
        return if path.exists() {
            Ok(path.to_path_buf())
        } else {
            Err(anyhow!("file not found: {name}").into())
        };
    }
    let playbook_dir = ctx.playbook().directory;
    search_dirs(ctx.files_path(), &playbook_dir)
        .into_iter()
        .map(|dir| ctx.resolve_path(&dir.join(name).to_string_lossy()))
        .find(|candidate| candidate.exists())
        .ok_or_else(|| {
            anyhow!(
                "unable to locate '{name}' in search path {}",
                ctx.files_path()
            )
            .into()
        })
}
