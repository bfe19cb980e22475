//! Domain-specific error types for the playbook engine.
//!
//! Internal modules return typed errors while the CLI boundary converts them
//! to [`anyhow::Error`] via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! PlaybookError   runtime: templates, argument binding, task outcomes, exit
//! ConfigError     loading and validating playbook files
//! ```
//!
//! OS-level helpers report through `anyhow`; their errors reach the engine as
//! [`PlaybookError::Operation`].

use thiserror::Error;

/// Errors raised while executing a playbook.
#[derive(Error, Debug)]
pub enum PlaybookError {
    /// A template referenced a name absent from the composed environment.
    #[error("undefined template variable in {template:?}: {detail}")]
    UndefinedTemplateVariable {
        /// The template source that failed to render.
        template: String,
        /// Renderer diagnostic.
        detail: String,
    },

    /// A template could not be parsed or evaluated.
    #[error("template error in {template:?}: {detail}")]
    Template {
        /// The template source that failed to render.
        template: String,
        /// Renderer diagnostic.
        detail: String,
    },

    /// A task reported a failed outcome.
    #[error("{0}")]
    TaskFailure(String),

    /// A task was invoked with positional arguments.
    #[error("task '{task}' must be called with keyword arguments")]
    UnqualifiedArgument {
        /// Qualified task name.
        task: String,
    },

    /// A required parameter was not supplied.
    #[error("task '{task}' is missing required argument '{name}'")]
    MissingArgument {
        /// Qualified task name.
        task: String,
        /// Parameter name.
        name: String,
    },

    /// An argument does not match any declared parameter.
    #[error("task '{task}' got an unexpected argument '{name}'")]
    UnexpectedArgument {
        /// Qualified task name.
        task: String,
        /// Argument name.
        name: String,
    },

    /// An argument value has the wrong shape for its parameter.
    #[error("task '{task}' argument '{name}' must be {expected}")]
    InvalidArgument {
        /// Qualified task name.
        task: String,
        /// Parameter name.
        name: String,
        /// Description of the accepted values.
        expected: String,
    },

    /// No task is registered under this name.
    #[error("unknown task '{0}'")]
    UnknownTask(String),

    /// No handler is defined under this name.
    #[error("unknown handler '{0}'")]
    UnknownHandler(String),

    /// A result without an exit action was used as a scope guard.
    #[error("task result is not a scope guard")]
    NotAScopeGuard,

    /// The playbook asked to stop with a specific exit code.
    #[error("exit requested with code {code}{}", format_exit_message(.message))]
    EarlyExit {
        /// Process exit code.
        code: i32,
        /// Optional explanation.
        message: String,
    },

    /// The run was interrupted (Ctrl-C).
    #[error("interrupted")]
    Interrupted,

    /// An OS-level operation failed.
    #[error("{0:#}")]
    Operation(#[from] anyhow::Error),
}

fn format_exit_message(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(": {message}")
    }
}

impl PlaybookError {
    /// Whether this error is a usage error in the playbook itself.
    ///
    /// Usage errors fail before a task result exists, so ignore-failure
    /// blocks never tolerate them.
    #[must_use]
    pub const fn is_fatal_usage(&self) -> bool {
        matches!(
            self,
            Self::UndefinedTemplateVariable { .. }
                | Self::Template { .. }
                | Self::UnqualifiedArgument { .. }
                | Self::MissingArgument { .. }
                | Self::UnexpectedArgument { .. }
                | Self::InvalidArgument { .. }
                | Self::UnknownTask(_)
                | Self::UnknownHandler(_)
        )
    }

    /// The exit code requested by [`EarlyExit`](Self::EarlyExit), if any.
    #[must_use]
    pub const fn exit_code(&self) -> Option<i32> {
        match self {
            Self::EarlyExit { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Errors that arise from loading and validating playbook files.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The playbook file could not be read.
    #[error("IO error reading playbook {path}: {source}")]
    Io {
        /// Path to the file that could not be read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The playbook file is not valid TOML or does not match the schema.
    #[error("Invalid TOML syntax in {file}: {message}")]
    InvalidSyntax {
        /// Path to the offending file.
        file: String,
        /// Parser diagnostic.
        message: String,
    },

    /// A step is structurally invalid.
    #[error("Invalid step {location}: {reason}")]
    InvalidStep {
        /// Step location such as `steps[2]`.
        location: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A run argument declaration is invalid.
    #[error("Invalid argument declaration '{name}': {reason}")]
    InvalidArgument {
        /// Argument name.
        name: String,
        /// Human-readable reason.
        reason: String,
    },
}
