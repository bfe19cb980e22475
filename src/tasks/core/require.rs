use super::MODULE;
use crate::engine::{Outcome, Param, Signature, TaskCall, TaskResult};
use crate::error::PlaybookError;
use crate::tasks::{Task, conclude};

/// `core.require`: fail unless the run is executing as `user`, given as a
/// name or a numeric uid.
pub struct RequireUser;

impl Task for RequireUser {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "require"
    }

    fn signature(&self) -> Signature {
        Signature::new([Param::template("user")])
    }

    fn run(&self, call: &TaskCall<'_>) -> Result<TaskResult, PlaybookError> {
        conclude(call, check(call))
    }
}

#[cfg(unix)]
fn check(call: &TaskCall<'_>) -> Result<Outcome, PlaybookError> {
    use anyhow::Context as _;
    use nix::unistd::{User, getuid};

    let (label, wanted) = match call.int("user") {
        Ok(id) => {
            let uid = u32::try_from(id).map_err(|_| call.invalid("user", "a user name or uid"))?;
            (id.to_string(), uid)
        }
        Err(_) => {
            let name = call.str("user")?;
            let user = User::from_name(name)
                .with_context(|| format!("looking up user {name}"))?
                .ok_or_else(|| anyhow::anyhow!("unknown user: {name}"))?;
            (name.to_string(), user.uid.as_raw())
        }
    };

    let current = getuid().as_raw();
    if current == wanted {
        return Ok(Outcome::unchanged());
    }
    Ok(Outcome::failed().error(PlaybookError::TaskFailure(format!(
        "Expected to run as user {label}, got uid={current}"
    ))))
}

#[cfg(not(unix))]
fn check(_call: &TaskCall<'_>) -> Result<Outcome, PlaybookError> {
    Err(anyhow::anyhow!("user checks are only supported on unix").into())
}

#[cfg(all(test, unix))]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use nix::unistd::{User, getuid};

    use crate::engine::Call;
    use crate::engine::test_helpers::test_context;
    use crate::error::PlaybookError;

    #[test]
    fn current_uid_is_accepted() {
        let (ctx, log, _tmp) = test_context();
        let uid = i64::from(getuid().as_raw());
        let result = ctx
            .invoke(Call::new("core.require").arg("user", uid))
            .unwrap();
        assert!(result.succeeded());
        assert!(!result.changed());
        assert_eq!(log.status_lines(), vec![format!("=# core.require(user={uid})")]);
    }

    #[test]
    fn current_user_name_is_accepted() {
        let (ctx, _log, _tmp) = test_context();
        let Some(me) = User::from_uid(getuid()).unwrap() else {
            return;
        };
        let result = ctx
            .invoke(Call::new("core.require").arg("user", me.name.as_str()))
            .unwrap();
        assert!(result.succeeded());
    }

    #[test]
    fn other_uid_fails_with_current_uid() {
        let (ctx, log, _tmp) = test_context();
        let current = getuid().as_raw();
        let other = i64::from(current) + 1;
        let err = ctx
            .invoke(Call::new("core.require").arg("user", other))
            .unwrap_err();
        assert!(matches!(err, PlaybookError::TaskFailure(_)));
        assert_eq!(
            err.to_string(),
            format!("Expected to run as user {other}, got uid={current}")
        );
        assert!(log.status_lines()[0].starts_with("=X core.require("));
        assert_eq!(ctx.counters().failure, 1);
    }

    #[test]
    fn unknown_user_name_fails() {
        let (ctx, log, _tmp) = test_context();
        let err = ctx
            .invoke(Call::new("core.require").arg("user", "no-such-user-xyz"))
            .unwrap_err();
        assert!(err.to_string().contains("no-such-user-xyz"), "{err}");
        assert!(log.status_lines()[0].starts_with("=X core.require("));
    }

    #[test]
    fn negative_uid_is_rejected() {
        let (ctx, _log, _tmp) = test_context();
        let err = ctx
            .invoke(Call::new("core.require").arg("user", -1_i64))
            .unwrap_err();
        assert!(matches!(err, PlaybookError::InvalidArgument { .. }));
    }
}
