//! Idempotent filesystem primitives (check + apply pattern).
//!
//! Tasks in [`crate::tasks::fs`] describe the desired state of a path with
//! one of these resources, ask for its [`ResourceState`], and only call
//! [`Resource::apply`] when it is not already correct.
pub mod chmod;
pub mod content;
pub mod error;
pub mod helpers;
pub mod link;
pub mod mode;
pub mod owner;

pub use error::ResourceError;

use anyhow::Result;

/// State of a resource relative to its desired state.
///
/// # Examples
///
/// ```
/// use uplaybook::resources::ResourceState;
///
/// let missing = ResourceState::Missing;
/// let correct = ResourceState::Correct;
/// let wrong = ResourceState::Incorrect { current: "644".into() };
///
/// assert_ne!(missing, correct);
/// assert!(wrong.needs_change());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// Resource does not exist.
    Missing,
    /// Resource exists and matches the desired state.
    Correct,
    /// Resource exists but does not match the desired state.
    Incorrect {
        /// Description of the current value.
        current: String,
    },
    /// Resource cannot be applied, e.g. its target is missing.
    Invalid {
        /// Why the resource cannot be applied.
        reason: String,
    },
}

impl ResourceState {
    /// Whether applying the resource would change anything.
    #[must_use]
    pub const fn needs_change(&self) -> bool {
        matches!(self, Self::Missing | Self::Incorrect { .. })
    }
}

/// Result of applying a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceChange {
    /// Resource was created or updated.
    Applied,
    /// Resource was already correct.
    AlreadyCorrect,
}

impl ResourceChange {
    /// Whether the apply changed anything.
    #[must_use]
    pub const fn changed(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// A resource that can determine its own state and converge it.
pub trait Resource {
    /// Human-readable description.
    fn description(&self) -> String;

    /// Check the current state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be determined (I/O failures,
    /// permission issues, invalid desired state).
    fn current_state(&self) -> Result<ResourceState>;

    /// Unconditionally apply the desired state.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be made.
    fn apply(&self) -> Result<ResourceChange>;

    /// Apply only if the current state differs from the desired one.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`current_state`](Self::current_state) and
    /// [`apply`](Self::apply). An [`Invalid`](ResourceState::Invalid) state is
    /// an error.
    fn converge(&self) -> Result<ResourceChange> {
        match self.current_state()? {
            ResourceState::Correct => Ok(ResourceChange::AlreadyCorrect),
            ResourceState::Invalid { reason } => Err(ResourceError::InvalidState {
                resource: self.description(),
                reason,
            }
            .into()),
            ResourceState::Missing | ResourceState::Incorrect { .. } => self.apply(),
        }
    }
}
