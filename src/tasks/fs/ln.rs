use std::path::{Path, PathBuf};

use super::MODULE;
use crate::engine::{Outcome, Param, Signature, TaskCall, TaskResult};
use crate::error::PlaybookError;
use crate::resources::Resource;
use crate::resources::link::{HardLinkResource, SymlinkResource};
use crate::tasks::{Task, conclude};

/// `fs.ln`: link `path` to `src`.
///
/// Symbolic links store `src` verbatim. When `path` is an existing
/// directory (not a link to one), the link is created inside it under the
/// name of `src`.
pub struct LinkPath;

impl Task for LinkPath {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "ln"
    }

    fn signature(&self) -> Signature {
        Signature::new([
            Param::template("path"),
            Param::template("src"),
            Param::opaque("symbolic").default(false),
        ])
    }

    fn run(&self, call: &TaskCall<'_>) -> Result<TaskResult, PlaybookError> {
        let src = call.str("src")?;
        let path = link_target(call.path("path")?, Path::new(src));

        let resource: Box<dyn Resource> = if call.bool("symbolic")? {
            Box::new(SymlinkResource::new(PathBuf::from(src), path))
        } else {
            Box::new(HardLinkResource::new(call.ctx().resolve_path(src), path))
        };
        let linked = resource.converge().map(|change| Outcome::from_changed(change.changed()));
        conclude(call, linked.map_err(Into::into))
    }
}

fn link_target(path: PathBuf, src: &Path) -> PathBuf {
    let is_real_dir = path.symlink_metadata().is_ok_and(|m| m.is_dir());
    match src.file_name() {
        Some(name) if is_real_dir => path.join(name),
        _ => path,
    }
}

#[cfg(all(test, unix))]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::fs;
    use std::os::unix::fs::MetadataExt;
    use std::path::PathBuf;

    use crate::engine::Call;
    use crate::engine::test_helpers::test_context;

    #[test]
    fn symlink_is_created_once() {
        let (ctx, _log, tmp) = test_context();
        let call = || {
            Call::new("fs.ln")
                .arg("path", "link")
                .arg("src", "/etc/hostname")
                .arg("symbolic", true)
        };
        assert!(ctx.invoke(call()).unwrap().changed());
        assert!(!ctx.invoke(call()).unwrap().changed());
        assert_eq!(
            fs::read_link(tmp.path().join("link")).unwrap(),
            PathBuf::from("/etc/hostname")
        );
    }

    #[test]
    fn symlink_into_directory_uses_source_name() {
        let (ctx, _log, tmp) = test_context();
        fs::create_dir(tmp.path().join("bin")).unwrap();
        ctx.invoke(
            Call::new("fs.ln")
                .arg("path", "bin")
                .arg("src", "../tools/run")
                .arg("symbolic", true),
        )
        .unwrap();
        assert_eq!(
            fs::read_link(tmp.path().join("bin/run")).unwrap(),
            PathBuf::from("../tools/run")
        );
    }

    #[test]
    fn symlink_to_directory_stays_idempotent() {
        let (ctx, _log, tmp) = test_context();
        fs::create_dir(tmp.path().join("real")).unwrap();
        let call = || {
            Call::new("fs.ln")
                .arg("path", "alias")
                .arg("src", "real")
                .arg("symbolic", true)
        };
        assert!(ctx.invoke(call()).unwrap().changed());
        assert!(!ctx.invoke(call()).unwrap().changed());
        assert!(!tmp.path().join("real/real").exists());
    }

    #[test]
    fn hard_link_shares_inode() {
        let (ctx, _log, tmp) = test_context();
        fs::write(tmp.path().join("orig"), "x").unwrap();
        let call = || Call::new("fs.ln").arg("path", "copy").arg("src", "orig");

        assert!(ctx.invoke(call()).unwrap().changed());
        assert!(!ctx.invoke(call()).unwrap().changed());
        let a = fs::metadata(tmp.path().join("orig")).unwrap();
        let b = fs::metadata(tmp.path().join("copy")).unwrap();
        assert_eq!(a.ino(), b.ino());
    }

    #[test]
    fn hard_link_to_missing_source_fails() {
        let (ctx, log, _tmp) = test_context();
        let err = ctx
            .invoke(Call::new("fs.ln").arg("path", "copy").arg("src", "missing"))
            .unwrap_err();
        assert!(err.to_string().contains("source does not exist"), "{err}");
        assert!(log.status_lines()[0].starts_with("=X fs.ln("));
    }
}
