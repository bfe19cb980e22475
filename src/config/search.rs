//! Playbook discovery along `UP_PLAYBOOK_PATH`.
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

/// Search path used when `UP_PLAYBOOK_PATH` is unset.
pub const DEFAULT_PLAYBOOK_PATH: &str =
    ".:.uplaybooks:~/.config/uplaybook:~/.config/uplaybook/library:/etc/uplaybook";

/// File extension of playbook files.
const EXTENSION: &str = "toml";

/// File name of a playbook packaged as a directory.
const DIRECTORY_PLAYBOOK: &str = "playbook.toml";

/// A playbook found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybookLocation {
    /// Name used to run it: the file stem, or the directory name.
    pub name: String,
    /// Directory holding the playbook file.
    pub directory: PathBuf,
    /// The playbook file.
    pub file: PathBuf,
}

impl PlaybookLocation {
    fn from_file(file: PathBuf) -> Self {
        let file = dunce::simplified(&std::path::absolute(&file).unwrap_or_else(|_| file.clone()))
            .to_path_buf();
        let directory = file.parent().map(Path::to_path_buf).unwrap_or_default();
        let name = if file.file_name().is_some_and(|n| n == DIRECTORY_PLAYBOOK) {
            directory.file_name()
        } else {
            file.file_stem()
        }
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
        Self {
            name,
            directory,
            file,
        }
    }
}

/// Expand a leading `~` to the home directory.
fn expand_home(entry: &str) -> PathBuf {
    let home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"));
    match (entry.strip_prefix('~'), home) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest.trim_start_matches('/')),
        _ => PathBuf::from(entry),
    }
}

/// Split a `:`-separated search path into directories.
#[must_use]
pub fn search_dirs(search_path: &str) -> Vec<PathBuf> {
    search_path
        .split(':')
        .filter(|entry| !entry.is_empty())
        .map(expand_home)
        .collect()
}

/// The configured search directories.
#[must_use]
pub fn playbook_search_dirs() -> Vec<PathBuf> {
    let search_path = std::env::var("UP_PLAYBOOK_PATH")
        .unwrap_or_else(|_| DEFAULT_PLAYBOOK_PATH.to_string());
    search_dirs(&search_path)
}

/// Playbooks in `dirs`, in search order and sorted by name within each
/// directory. A name may appear more than once; the first one wins.
#[must_use]
pub fn list_playbooks(dirs: &[PathBuf]) -> Vec<PlaybookLocation> {
    let mut found = Vec::new();
    for dir in dirs {
        let Ok(entries) = std::fs::read_dir(dir) else {
            continue;
        };
        let mut here: Vec<PlaybookLocation> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter_map(|path| {
                if path.is_dir() {
                    let file = path.join(DIRECTORY_PLAYBOOK);
                    file.is_file().then_some(file)
                } else {
                    path.extension()
                        .is_some_and(|ext| ext == EXTENSION)
                        .then_some(path)
                }
            })
            .map(PlaybookLocation::from_file)
            .collect();
        here.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.file.cmp(&b.file)));
        found.extend(here);
    }
    found
}

/// Resolve `name` to a playbook file.
///
/// A name containing a path separator is a path: a directory resolves to
/// its `playbook.toml`. Otherwise the search directories are scanned for
/// `<name>.toml` or `<name>/playbook.toml`; a trailing `.toml` in `name` is
/// allowed.
///
/// # Errors
///
/// Returns an error if no playbook matches.
pub fn find_playbook(name: &str, dirs: &[PathBuf]) -> Result<PlaybookLocation> {
    let is_path = name.contains('/') || name.contains(std::path::MAIN_SEPARATOR);
    if is_path {
        let mut file = PathBuf::from(name);
        if file.is_dir() {
            file.push(DIRECTORY_PLAYBOOK);
        }
        if !file.is_file() {
            bail!("playbook file not found: {}", file.display());
        }
        return Ok(PlaybookLocation::from_file(file));
    }

    let wanted = name
        .strip_suffix(&format!(".{EXTENSION}"))
        .unwrap_or(name);
    if let Some(found) = list_playbooks(dirs).into_iter().find(|pb| pb.name == wanted) {
        return Ok(found);
    }
    let searched: Vec<String> = dirs.iter().map(|d| d.display().to_string()).collect();
    bail!(
        "unable to locate a playbook named {name}, searched in: {}",
        searched.join(", ")
    )
}
