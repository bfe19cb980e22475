//! Typed error variants for resource operations.
//!
//! Resource code returns these directly; callers convert to
//! [`anyhow::Error`] via `?`.

use thiserror::Error;

/// Errors that arise from resource checks and apply operations.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// A permission specification could not be parsed.
    #[error("invalid mode '{mode}': {reason}")]
    InvalidMode {
        /// The mode as written.
        mode: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A user name is not present in the user database.
    #[error("unknown user: {0}")]
    UnknownUser(String),

    /// A group name is not present in the group database.
    #[error("unknown group: {0}")]
    UnknownGroup(String),

    /// A resource exists but is in an unexpected or inconsistent state.
    #[error("invalid state for '{resource}': {reason}")]
    InvalidState {
        /// Name or description of the resource in the invalid state.
        resource: String,
        /// Human-readable explanation of why the state is invalid.
        reason: String,
    },

    /// The operation is not available on this platform.
    #[error("operation '{operation}' is not supported on this platform")]
    UnsupportedOperation {
        /// Name of the unsupported operation (e.g. `"chown"`).
        operation: String,
    },
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn invalid_mode_display() {
        let e = ResourceError::InvalidMode {
            mode: "u*x".to_string(),
            reason: "expected one of +, -, =".to_string(),
        };
        assert_eq!(e.to_string(), "invalid mode 'u*x': expected one of +, -, =");
    }

    #[test]
    fn unknown_user_display() {
        let e = ResourceError::UnknownUser("nosuch".to_string());
        assert_eq!(e.to_string(), "unknown user: nosuch");
    }

    #[test]
    fn invalid_state_display() {
        let e = ResourceError::InvalidState {
            resource: "/srv/app".to_string(),
            reason: "target does not exist".to_string(),
        };
        assert!(e.to_string().contains("/srv/app"));
        assert!(e.to_string().contains("target does not exist"));
    }

    #[test]
    fn resource_error_converts_to_anyhow() {
        let e = ResourceError::UnknownGroup("wheel".to_string());
        let err: anyhow::Error = e.into();
        assert!(err.downcast_ref::<ResourceError>().is_some());
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn resource_error_is_send_sync() {
        assert_send_sync::<ResourceError>();
    }
}
