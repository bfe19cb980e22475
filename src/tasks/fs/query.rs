use anyhow::Context as _;
use serde_json::{Map, Value};

use super::MODULE;
use crate::engine::{Outcome, Param, Signature, TaskCall, TaskResult};
use crate::error::PlaybookError;
use crate::tasks::{Task, conclude};

/// `fs.exists`: succeed if `path` exists.
///
/// Absence is a tolerated failure by default, so the result can be used as
/// a condition.
pub struct PathExists;

impl Task for PathExists {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "exists"
    }

    fn signature(&self) -> Signature {
        Signature::new([
            Param::template("path"),
            Param::opaque("ignore_failure").default(true),
        ])
    }

    fn run(&self, call: &TaskCall<'_>) -> Result<TaskResult, PlaybookError> {
        if call.path("path")?.exists() {
            return call.report(Outcome::unchanged());
        }
        let ignore = call.bool("ignore_failure")?;
        let mut outcome = Outcome::failed().ignore_failure(ignore);
        if !ignore {
            let msg = format!("File does not exist: {}", call.str("path")?);
            outcome = outcome.error(PlaybookError::TaskFailure(msg));
        }
        call.report(outcome)
    }
}

/// `fs.stat`: report metadata of `path` in the result's extra data.
pub struct StatPath;

impl Task for StatPath {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "stat"
    }

    fn signature(&self) -> Signature {
        Signature::new([
            Param::template("path"),
            Param::opaque("follow_symlinks").default(true),
        ])
    }

    fn run(&self, call: &TaskCall<'_>) -> Result<TaskResult, PlaybookError> {
        let path = call.path("path")?;
        let meta = if call.bool("follow_symlinks")? {
            std::fs::metadata(&path)
        } else {
            std::fs::symlink_metadata(&path)
        }
        .with_context(|| format!("stat {}", path.display()));

        let outcome = meta.map_err(PlaybookError::from).map(|meta| {
            stat_fields(&meta)
                .into_iter()
                .fold(Outcome::unchanged(), |outcome, (k, v)| outcome.extra(k, v))
        });
        conclude(call, outcome)
    }
}

#[cfg(unix)]
fn stat_fields(meta: &std::fs::Metadata) -> Map<String, Value> {
    use std::os::unix::fs::{FileTypeExt, MetadataExt};

    let ft = meta.file_type();
    let mut fields = Map::new();
    let mut put = |name: &str, value: Value| {
        fields.insert(name.to_string(), value);
    };
    put("perms", (meta.mode() & 0o7777).into());
    put("st_mode", meta.mode().into());
    put("st_ino", meta.ino().into());
    put("st_dev", meta.dev().into());
    put("st_nlink", meta.nlink().into());
    put("st_uid", meta.uid().into());
    put("st_gid", meta.gid().into());
    put("st_size", meta.size().into());
    put("st_atime", meta.atime().into());
    put("st_mtime", meta.mtime().into());
    put("st_ctime", meta.ctime().into());
    put("S_ISBLK", ft.is_block_device().into());
    put("S_ISCHR", ft.is_char_device().into());
    put("S_ISDIR", ft.is_dir().into());
    put("S_ISFIFO", ft.is_fifo().into());
    put("S_ISLNK", ft.is_symlink().into());
    put("S_ISREG", ft.is_file().into());
    put("S_ISSOCK", ft.is_socket().into());
    fields
}

#[cfg(not(unix))]
fn stat_fields(meta: &std::fs::Metadata) -> Map<String, Value> {
    let ft = meta.file_type();
    let mut fields = Map::new();
    fields.insert("st_size".to_string(), meta.len().into());
    fields.insert("S_ISDIR".to_string(), ft.is_dir().into());
    fields.insert("S_ISLNK".to_string(), ft.is_symlink().into());
    fields.insert("S_ISREG".to_string(), ft.is_file().into());
    fields
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use serde_json::json;

    use crate::engine::Call;
    use crate::engine::test_helpers::test_context;

    #[test]
    fn exists_is_truthy_or_tolerated_failure() {
        let (ctx, log, tmp) = test_context();
        std::fs::write(tmp.path().join("here"), "").unwrap();

        let here = ctx.invoke(Call::new("fs.exists").arg("path", "here")).unwrap();
        let gone = ctx.invoke(Call::new("fs.exists").arg("path", "gone")).unwrap();
        assert!(here.succeeded());
        assert!(!gone.succeeded());
        assert_eq!(ctx.counters().failure, 0);
        assert_eq!(
            log.status_lines(),
            [
                "=# fs.exists(path=here, ignore_failure=true)",
                "=! fs.exists(path=gone, ignore_failure=true) (failure ignored)",
            ]
        );
    }

    #[test]
    fn exists_can_be_fatal() {
        let (ctx, _log, _tmp) = test_context();
        let err = ctx
            .invoke(
                Call::new("fs.exists")
                    .arg("path", "gone")
                    .arg("ignore_failure", false),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "File does not exist: gone");
    }

    #[test]
    fn stat_reports_size_and_type() {
        let (ctx, _log, tmp) = test_context();
        std::fs::write(tmp.path().join("f"), "12345").unwrap();
        let result = ctx.invoke(Call::new("fs.stat").arg("path", "f")).unwrap();
        assert!(!result.changed());
        assert_eq!(result.extra()["st_size"], json!(5));
        assert_eq!(result.extra()["S_ISREG"], json!(true));
        assert_eq!(result.extra()["S_ISDIR"], json!(false));
    }

    #[cfg(unix)]
    #[test]
    fn stat_without_following_sees_the_link() {
        let (ctx, _log, tmp) = test_context();
        std::fs::write(tmp.path().join("f"), "").unwrap();
        std::os::unix::fs::symlink("f", tmp.path().join("l")).unwrap();

        let followed = ctx.invoke(Call::new("fs.stat").arg("path", "l")).unwrap();
        let link = ctx
            .invoke(
                Call::new("fs.stat")
                    .arg("path", "l")
                    .arg("follow_symlinks", false),
            )
            .unwrap();
        assert_eq!(followed.extra()["S_ISLNK"], json!(false));
        assert_eq!(link.extra()["S_ISLNK"], json!(true));
    }

    #[test]
    fn stat_missing_path_fails() {
        let (ctx, log, _tmp) = test_context();
        assert!(ctx.invoke(Call::new("fs.stat").arg("path", "gone")).is_err());
        assert!(log.status_lines()[0].starts_with("=X fs.stat("));
    }
}
