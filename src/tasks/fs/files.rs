use std::path::Path;

use anyhow::Context as _;

use super::{MODULE, mode_arg};
use crate::engine::{Call, CallDepthGuard, Outcome, Param, Signature, TaskCall, TaskResult};
use crate::error::PlaybookError;
use crate::resources::Resource as _;
use crate::resources::content::FileContentResource;
use crate::resources::helpers::fs::set_mode;
use crate::resources::mode::ModeSpec;
use crate::tasks::{Task, conclude, forward};

/// Run `fs.chmod` on the task's own `path` one level deeper.
fn nested_chmod(call: &TaskCall<'_>, is_directory: bool) -> Result<bool, PlaybookError> {
    let _depth = CallDepthGuard::enter(call.ctx());
    let result = call.invoke(
        Call::new("fs.chmod")
            .arg("path", forward(call.value("path")))
            .arg("mode", forward(call.value("mode")))
            .arg("is_directory", is_directory),
    )?;
    Ok(result.changed())
}

/// `fs.mkfile`: create a file if it does not exist.
///
/// A new file gets `mode` atomically on creation. For an existing file,
/// `contents` (when given) replaces differing contents and `mode` is applied
/// with a nested `fs.chmod`.
pub struct MakeFile;

impl Task for MakeFile {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "mkfile"
    }

    fn signature(&self) -> Signature {
        Signature::new([
            Param::template("path"),
            Param::template("mode").optional(),
            Param::template("contents").optional(),
        ])
    }

    fn run(&self, call: &TaskCall<'_>) -> Result<TaskResult, PlaybookError> {
        let path = call.path("path")?;
        let mode = mode_arg(call, "mode")?;
        let contents = call.opt_str("contents")?;

        if path.symlink_metadata().is_err() {
            let bits = mode.map(|m| m.resolve(0, false)).transpose();
            let created = bits.map_err(anyhow::Error::from).and_then(|bits| {
                FileContentResource::new(path, contents.unwrap_or_default())
                    .with_mode(bits)
                    .apply()
            });
            return conclude(call, created.map(|_| Outcome::changed()).map_err(Into::into));
        }

        let mut changed = false;
        if let Some(contents) = contents {
            let resource = FileContentResource::new(path, contents);
            match resource.converge() {
                Ok(change) => changed = change.changed(),
                Err(e) => return conclude(call, Err(e.into())),
            }
        }
        if mode.is_some() {
            changed |= nested_chmod(call, false)?;
        }
        call.report(Outcome::from_changed(changed))
    }
}

/// `fs.mkdir`: create a directory, with parents by default.
pub struct MakeDir;

impl Task for MakeDir {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "mkdir"
    }

    fn signature(&self) -> Signature {
        Signature::new([
            Param::template("path"),
            Param::template("mode").optional(),
            Param::opaque("parents").default(true),
        ])
    }

    fn run(&self, call: &TaskCall<'_>) -> Result<TaskResult, PlaybookError> {
        let path = call.path("path")?;
        let mode = mode_arg(call, "mode")?;

        if !path.exists() {
            let created = create_dir(&path, call.bool("parents")?, mode.as_ref());
            return conclude(call, created.map(|()| Outcome::changed()).map_err(Into::into));
        }

        let changed = mode.is_some() && nested_chmod(call, true)?;
        call.report(Outcome::from_changed(changed))
    }
}

fn create_dir(path: &Path, parents: bool, mode: Option<&ModeSpec>) -> anyhow::Result<()> {
    if parents {
        std::fs::create_dir_all(path)
    } else {
        std::fs::create_dir(path)
    }
    .with_context(|| format!("creating directory {}", path.display()))?;
    if let Some(mode) = mode {
        // The mode given to mkdir(2) is filtered by the umask.
        set_mode(path, mode.resolve(0, true)?)?;
    }
    Ok(())
}

/// `fs.rm`: remove a file, or a directory tree with `recursive = true`.
pub struct RemovePath;

impl Task for RemovePath {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "rm"
    }

    fn signature(&self) -> Signature {
        Signature::new([
            Param::template("path"),
            Param::opaque("recursive").default(false),
        ])
    }

    fn run(&self, call: &TaskCall<'_>) -> Result<TaskResult, PlaybookError> {
        let path = call.path("path")?;
        let Ok(meta) = path.symlink_metadata() else {
            return call.report(Outcome::unchanged());
        };

        if meta.is_dir() {
            if !call.bool("recursive")? {
                let msg = format!(
                    "Path {} is a directory, will not remove without `recursive` option",
                    call.str("path")?
                );
                return call.report(Outcome::failed().error(PlaybookError::TaskFailure(msg)));
            }
            let removed = std::fs::remove_dir_all(&path)
                .with_context(|| format!("removing directory {}", path.display()));
            return conclude(call, removed.map(|()| Outcome::changed()).map_err(Into::into));
        }

        let removed =
            std::fs::remove_file(&path).with_context(|| format!("removing {}", path.display()));
        conclude(call, removed.map(|()| Outcome::changed()).map_err(Into::into))
    }
}

/// `fs.mv`: rename `src` to `path`.
///
/// Moving into an existing directory keeps the source name. Succeeds
/// without change if `src` is gone but `path` exists.
pub struct MovePath;

impl Task for MovePath {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "mv"
    }

    fn signature(&self) -> Signature {
        Signature::new([Param::template("path"), Param::template("src")])
    }

    fn run(&self, call: &TaskCall<'_>) -> Result<TaskResult, PlaybookError> {
        let path = call.path("path")?;
        let src = call.path("src")?;

        if src.symlink_metadata().is_ok() {
            let dest = match src.file_name() {
                Some(name) if path.is_dir() => path.join(name),
                _ => path,
            };
            let moved = std::fs::rename(&src, &dest)
                .with_context(|| format!("moving {} to {}", src.display(), dest.display()));
            return conclude(call, moved.map(|()| Outcome::changed()).map_err(Into::into));
        }
        if path.exists() {
            return call.report(Outcome::unchanged());
        }
        let msg = format!(
            "No file to move: src={} path={}",
            call.str("src")?,
            call.str("path")?
        );
        call.report(Outcome::failed().error(PlaybookError::TaskFailure(msg)))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::fs;

    use crate::engine::Call;
    use crate::engine::test_helpers::test_context;

    // -----------------------------------------------------------------------
    // mkfile
    // -----------------------------------------------------------------------

    #[test]
    fn mkfile_creates_once() {
        let (ctx, log, tmp) = test_context();
        let first = ctx.invoke(Call::new("fs.mkfile").arg("path", "a")).unwrap();
        let second = ctx.invoke(Call::new("fs.mkfile").arg("path", "a")).unwrap();
        assert!(first.changed());
        assert!(!second.changed());
        assert_eq!(fs::read(tmp.path().join("a")).unwrap(), b"");
        assert_eq!(
            log.status_lines(),
            ["=> fs.mkfile(path=a)", "=# fs.mkfile(path=a)"]
        );
    }

    #[test]
    fn mkfile_replaces_differing_contents() {
        let (ctx, _log, tmp) = test_context();
        fs::write(tmp.path().join("a"), "old").unwrap();
        let result = ctx
            .invoke(Call::new("fs.mkfile").arg("path", "a").arg("contents", "new"))
            .unwrap();
        assert!(result.changed());
        assert_eq!(fs::read_to_string(tmp.path().join("a")).unwrap(), "new");

        let again = ctx
            .invoke(Call::new("fs.mkfile").arg("path", "a").arg("contents", "new"))
            .unwrap();
        assert!(!again.changed());
    }

    #[test]
    fn mkfile_renders_contents() {
        let (ctx, _log, tmp) = test_context();
        ctx.set_var("greeting", "hello".into());
        ctx.invoke(
            Call::new("fs.mkfile")
                .arg("path", "a")
                .arg("contents", "{{ greeting }}\n"),
        )
        .unwrap();
        assert_eq!(fs::read_to_string(tmp.path().join("a")).unwrap(), "hello\n");
    }

    #[cfg(unix)]
    #[test]
    fn mkfile_mode_on_existing_file_nests_chmod() {
        use std::os::unix::fs::PermissionsExt;
        let (ctx, log, tmp) = test_context();
        let file = tmp.path().join("a");
        fs::write(&file, "").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o644)).unwrap();

        let result = ctx
            .invoke(Call::new("fs.mkfile").arg("path", "a").arg("mode", "600"))
            .unwrap();
        assert!(result.changed());
        assert_eq!(
            log.status_lines(),
            [
                "==> fs.chmod(path=a, mode=600, is_directory=false) (Changed permissions: 644 -> 600)",
                "=> fs.mkfile(path=a, mode=600)",
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn mkfile_sets_mode_on_creation() {
        use std::os::unix::fs::PermissionsExt;
        let (ctx, _log, tmp) = test_context();
        ctx.invoke(Call::new("fs.mkfile").arg("path", "a").arg("mode", 0o600_i64))
            .unwrap();
        let mode = fs::metadata(tmp.path().join("a")).unwrap().permissions().mode();
        assert_eq!(mode & 0o7777, 0o600);
    }

    // -----------------------------------------------------------------------
    // mkdir
    // -----------------------------------------------------------------------

    #[test]
    fn mkdir_creates_parents_by_default() {
        let (ctx, _log, tmp) = test_context();
        let result = ctx.invoke(Call::new("fs.mkdir").arg("path", "a/b/c")).unwrap();
        assert!(result.changed());
        assert!(tmp.path().join("a/b/c").is_dir());

        let again = ctx.invoke(Call::new("fs.mkdir").arg("path", "a/b/c")).unwrap();
        assert!(!again.changed());
    }

    #[test]
    fn mkdir_without_parents_fails_on_missing_parent() {
        let (ctx, log, _tmp) = test_context();
        let err = ctx
            .invoke(
                Call::new("fs.mkdir")
                    .arg("path", "x/y")
                    .arg("parents", false),
            )
            .unwrap_err();
        assert!(err.to_string().contains("creating directory"), "{err}");
        assert!(log.status_lines()[0].starts_with("=X fs.mkdir("));
    }

    #[cfg(unix)]
    #[test]
    fn mkdir_symbolic_mode_treats_path_as_directory() {
        use std::os::unix::fs::PermissionsExt;
        let (ctx, _log, tmp) = test_context();
        ctx.invoke(
            Call::new("fs.mkdir")
                .arg("path", "d")
                .arg("mode", "a=rX,u+w"),
        )
        .unwrap();
        let mode = fs::metadata(tmp.path().join("d")).unwrap().permissions().mode();
        assert_eq!(mode & 0o7777, 0o755);
    }

    // -----------------------------------------------------------------------
    // rm
    // -----------------------------------------------------------------------

    #[test]
    fn rm_file_and_missing_path() {
        let (ctx, _log, tmp) = test_context();
        fs::write(tmp.path().join("a"), "").unwrap();
        assert!(ctx.invoke(Call::new("fs.rm").arg("path", "a")).unwrap().changed());
        assert!(!tmp.path().join("a").exists());
        assert!(!ctx.invoke(Call::new("fs.rm").arg("path", "a")).unwrap().changed());
    }

    #[test]
    fn rm_directory_requires_recursive() {
        let (ctx, log, tmp) = test_context();
        fs::create_dir_all(tmp.path().join("d/sub")).unwrap();

        let err = ctx.invoke(Call::new("fs.rm").arg("path", "d")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Path d is a directory, will not remove without `recursive` option"
        );
        assert!(tmp.path().join("d").exists());
        assert_eq!(log.status_lines()[0], "=X fs.rm(path=d, recursive=false)");

        let result = ctx
            .invoke(Call::new("fs.rm").arg("path", "d").arg("recursive", true))
            .unwrap();
        assert!(result.changed());
        assert!(!tmp.path().join("d").exists());
    }

    // -----------------------------------------------------------------------
    // mv
    // -----------------------------------------------------------------------

    #[test]
    fn mv_renames_then_is_unchanged() {
        let (ctx, _log, tmp) = test_context();
        fs::write(tmp.path().join("old"), "x").unwrap();
        let call = || Call::new("fs.mv").arg("path", "new").arg("src", "old");

        assert!(ctx.invoke(call()).unwrap().changed());
        assert_eq!(fs::read_to_string(tmp.path().join("new")).unwrap(), "x");
        assert!(!ctx.invoke(call()).unwrap().changed());
    }

    #[test]
    fn mv_into_directory_keeps_name() {
        let (ctx, _log, tmp) = test_context();
        fs::create_dir(tmp.path().join("d")).unwrap();
        fs::write(tmp.path().join("f"), "x").unwrap();
        ctx.invoke(Call::new("fs.mv").arg("path", "d").arg("src", "f"))
            .unwrap();
        assert!(tmp.path().join("d/f").exists());
    }

    #[test]
    fn mv_with_nothing_to_move_fails() {
        let (ctx, _log, _tmp) = test_context();
        let err = ctx
            .invoke(Call::new("fs.mv").arg("path", "b").arg("src", "a"))
            .unwrap_err();
        assert_eq!(err.to_string(), "No file to move: src=a path=b");
        assert_eq!(ctx.counters().failure, 1);
    }
}
