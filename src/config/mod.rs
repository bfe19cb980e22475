//! Playbook files: schema, loading, validation, discovery and run
//! arguments.
pub mod playbook;
pub mod run_args;
pub mod search;
pub mod toml_loader;
pub mod validation;

use std::path::Path;

pub use playbook::{ArgDecl, ArgType, HandlerDef, Notify, Playbook, Step};
pub use search::{PlaybookLocation, find_playbook, list_playbooks, playbook_search_dirs};
pub use validation::ValidationWarning;

use crate::error::ConfigError;
use crate::tasks::TaskRegistry;
use validation::{HandlerUsageValidator, PlaybookValidator, TaskValidator};

impl Playbook {
    /// Load a playbook file and reject structurally invalid ones.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read or parsed, or
    /// fails the structural checks.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let playbook: Self = toml_loader::load_config(path)?;
        validation::check_playbook(&playbook)?;
        Ok(playbook)
    }

    /// Run every validator and collect their warnings.
    #[must_use]
    pub fn validate(&self, source: &str, registry: &TaskRegistry) -> Vec<ValidationWarning> {
        let validators: [&dyn PlaybookValidator; 2] =
            [&TaskValidator::new(registry), &HandlerUsageValidator];
        validators
            .iter()
            .flat_map(|v| v.validate(self, source))
            .collect()
    }
}
