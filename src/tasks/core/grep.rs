use anyhow::Context as _;
use regex::Regex;

use super::MODULE;
use crate::engine::{Outcome, Param, Signature, TaskCall, TaskResult};
use crate::error::PlaybookError;
use crate::tasks::{Task, conclude};

/// `core.grep`: does any line of a file match?
///
/// No match is a failure, tolerated by default so the result can be used
/// as a condition.
pub struct GrepFile;

impl Task for GrepFile {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "grep"
    }

    fn signature(&self) -> Signature {
        Signature::new([
            Param::template("path"),
            Param::template("search"),
            Param::opaque("regex").default(true),
            Param::opaque("ignore_failures").default(true),
        ])
    }

    fn run(&self, call: &TaskCall<'_>) -> Result<TaskResult, PlaybookError> {
        conclude(call, search(call))
    }
}

fn search(call: &TaskCall<'_>) -> Result<Outcome, PlaybookError> {
    let path = call.path("path")?;
    let needle = call.str("search")?;
    let ignore_failures = call.bool("ignore_failures")?;

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    let found = if call.bool("regex")? {
        let rx = Regex::new(needle).with_context(|| format!("invalid regex: {needle}"))?;
        contents.lines().any(|line| rx.is_match(line))
    } else {
        contents.lines().any(|line| line.contains(needle))
    };

    if found {
        return Ok(Outcome::unchanged());
    }
    let mut outcome = Outcome::failed().ignore_failure(ignore_failures);
    if !ignore_failures {
        outcome = outcome.error(PlaybookError::TaskFailure("No match found".to_string()));
    }
    Ok(outcome)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use crate::engine::Call;
    use crate::engine::test_helpers::test_context;
    use crate::error::PlaybookError;

    fn write_sample(dir: &std::path::Path) {
        std::fs::write(dir.join("conf"), "user=sean\nsecret=xyzzy\n").unwrap();
    }

    #[test]
    fn regex_match_succeeds() {
        let (ctx, _log, tmp) = test_context();
        write_sample(tmp.path());
        let result = ctx
            .invoke(
                Call::new("core.grep")
                    .arg("path", "conf")
                    .arg("search", "^secret=x+y"),
            )
            .unwrap();
        assert!(result.succeeded());
    }

    #[test]
    fn plain_search_does_not_interpret_regex() {
        let (ctx, _log, tmp) = test_context();
        write_sample(tmp.path());
        let result = ctx
            .invoke(
                Call::new("core.grep")
                    .arg("path", "conf")
                    .arg("search", "^secret")
                    .arg("regex", false),
            )
            .unwrap();
        assert!(!result.succeeded());
        assert_eq!(ctx.counters().failure, 0);
    }

    #[test]
    fn no_match_is_fatal_when_not_ignored() {
        let (ctx, log, tmp) = test_context();
        write_sample(tmp.path());
        let err = ctx
            .invoke(
                Call::new("core.grep")
                    .arg("path", "conf")
                    .arg("search", "missing")
                    .arg("ignore_failures", false),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "No match found");
        assert!(log.status_lines()[0].starts_with("=X core.grep("));
    }

    #[test]
    fn unreadable_file_reports_failure() {
        let (ctx, _log, _tmp) = test_context();
        let err = ctx
            .invoke(
                Call::new("core.grep")
                    .arg("path", "nope")
                    .arg("search", "x")
                    .arg("ignore_failures", false),
            )
            .unwrap_err();
        assert!(matches!(err, PlaybookError::Operation(_)));
    }
}
