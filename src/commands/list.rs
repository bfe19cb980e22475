use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::config::toml_loader::load_config;
use crate::config::{Playbook, list_playbooks};
use crate::logging::Log;

/// Log every playbook on the search path with the first line of its
/// description. Names shadowed by an earlier directory are marked.
///
/// Returns how many playbooks were found.
pub fn run(dirs: &[PathBuf], log: &dyn Log) -> usize {
    let playbooks = list_playbooks(dirs);
    if playbooks.is_empty() {
        let searched: Vec<String> = dirs.iter().map(|d| d.display().to_string()).collect();
        log.warn(&format!("no playbooks found in: {}", searched.join(", ")));
        return 0;
    }

    log.info("Available playbooks:");
    let mut seen = BTreeSet::new();
    for playbook in &playbooks {
        let hidden = if seen.insert(playbook.name.as_str()) {
            ""
        } else {
            " *HIDDEN BY PREVIOUS PLAYBOOK*"
        };
        log.info(&format!(
            "  - {} ({}{hidden})",
            playbook.name,
            playbook.directory.display()
        ));
        // Unreadable playbooks are still listed; running one reports why.
        let summary = load_config::<Playbook>(&playbook.file)
            .map(|pb| pb.summary().to_string())
            .unwrap_or_default();
        if !summary.is_empty() {
            log.info(&format!("      {summary}"));
        }
    }
    playbooks.len()
}
