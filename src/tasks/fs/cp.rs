use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use super::{MODULE, mode_arg};
use crate::engine::{
    ArgValue, Call, CallDepthGuard, Outcome, Param, RunContext, Signature, TaskCall, TaskResult,
    find_file,
};
use crate::error::PlaybookError;
use crate::resources::helpers::fs::{file_mode, set_mode, sha256_hex, write_atomic};
use crate::resources::mode::ModeSpec;
use crate::tasks::{Task, conclude, forward};

/// `fs.cp`: copy a file or directory tree, rendering contents as templates.
///
/// `src` defaults to the name of `path` plus `.j2` and is looked up along
/// the files search path. A directory `src` is copied recursively through
/// nested `fs.mkdir` and `fs.cp` calls. The status message names what
/// changed: `Contents`, `Permissions`, `Subdir` or `Subfile`.
pub struct CopyFile;

impl Task for CopyFile {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "cp"
    }

    fn signature(&self) -> Signature {
        Signature::new([
            Param::template("path"),
            Param::template("src").optional(),
            Param::template("mode").optional(),
            Param::opaque("template").default(true),
            Param::opaque("template_filenames").default(true),
            Param::opaque("recursive").default(true),
        ])
    }

    fn run(&self, call: &TaskCall<'_>) -> Result<TaskResult, PlaybookError> {
        let path = call.str("path")?;
        let src_name = match call.opt_str("src")? {
            Some(src) => src.to_string(),
            None => default_source(path),
        };
        let mode = mode_arg(call, "mode")?;
        let template = call.bool("template")?;

        let src = match find_file(call.ctx(), &src_name) {
            Ok(src) => src,
            Err(e) => return conclude(call, Err(e)),
        };

        let changes = if call.bool("recursive")? && src.is_dir() {
            let _depth = CallDepthGuard::enter(call.ctx());
            copy_tree(call, &src, path, template)?
        } else {
            let dest = call.ctx().resolve_path(path);
            match copy_file(call.ctx(), &src, &dest, mode.as_ref(), template) {
                Ok(change) => change.into_iter().collect(),
                Err(e) => return conclude(call, Err(e)),
            }
        };

        if changes.is_empty() {
            return call.report(Outcome::unchanged());
        }
        let message = changes.into_iter().collect::<Vec<_>>().join(", ");
        call.report(Outcome::changed().message(message))
    }
}

/// `motd` is rendered from `motd.j2`.
fn default_source(path: &str) -> String {
    let name = Path::new(path)
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    format!("{name}.j2")
}

/// A directory of the source tree, relative to its root, with its files.
struct TreeDir {
    relative: PathBuf,
    files: Vec<String>,
}

/// Pre-order listing of `root`, sorted by name.
fn walk(root: &Path) -> anyhow::Result<Vec<TreeDir>> {
    fn visit(root: &Path, relative: PathBuf, out: &mut Vec<TreeDir>) -> anyhow::Result<()> {
        let dir = root.join(&relative);
        let mut entries = std::fs::read_dir(&dir)
            .with_context(|| format!("reading directory {}", dir.display()))?
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("reading directory {}", dir.display()))?;
        entries.sort_by_key(std::fs::DirEntry::file_name);

        let mut subdirs = Vec::new();
        let mut files = Vec::new();
        for entry in entries {
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.path().is_dir() {
                subdirs.push(name);
            } else {
                files.push(name);
            }
        }
        out.push(TreeDir {
            relative: relative.clone(),
            files,
        });
        for name in subdirs {
            visit(root, relative.join(name), out)?;
        }
        Ok(())
    }

    let mut out = Vec::new();
    visit(root, PathBuf::new(), &mut out)?;
    Ok(out)
}

fn copy_tree(
    call: &TaskCall<'_>,
    src: &Path,
    path: &str,
    template: bool,
) -> Result<BTreeSet<&'static str>, PlaybookError> {
    let template_filenames = call.bool("template_filenames")?;
    let dest_arg = |dest: String| {
        if template_filenames {
            ArgValue::text(dest)
        } else {
            ArgValue::raw(dest)
        }
    };
    let join = |base: &Path, name: &Path| {
        if name.as_os_str().is_empty() {
            base.to_string_lossy().into_owned()
        } else {
            base.join(name).to_string_lossy().into_owned()
        }
    };

    let mut changes = BTreeSet::new();
    for dir in walk(src)? {
        let dest_dir = join(Path::new(path), &dir.relative);
        let made = call.invoke(
            Call::new("fs.mkdir")
                .arg("path", dest_arg(dest_dir.clone()))
                .arg("mode", forward(call.value("mode"))),
        )?;
        if made.changed() {
            changes.insert("Subdir");
        }

        for file in &dir.files {
            let src_file = join(&src.join(&dir.relative), Path::new(file));
            let copied = call.invoke(
                Call::new("fs.cp")
                    .arg("path", dest_arg(join(Path::new(&dest_dir), Path::new(file))))
                    .arg("src", ArgValue::raw(src_file))
                    .arg("template", template),
            )?;
            if copied.changed() {
                changes.insert("Subfile");
            }
        }
    }
    Ok(changes)
}

/// Copy one file, returning what changed.
fn copy_file(
    ctx: &RunContext,
    src: &Path,
    dest: &Path,
    mode: Option<&ModeSpec>,
    template: bool,
) -> Result<Option<&'static str>, PlaybookError> {
    let (old_mode, hash_before) = match std::fs::read(dest) {
        Ok(existing) => (Some(file_mode(dest)?), Some(sha256_hex(&existing))),
        Err(_) => (None, None),
    };

    let raw = std::fs::read(src).with_context(|| format!("reading {}", src.display()))?;
    let data = if template {
        let text = String::from_utf8(raw)
            .with_context(|| format!("{} is not UTF-8 text; copy it with template = false", src.display()))?;
        ctx.render(&text, None)?.into_bytes()
    } else {
        raw
    };

    let new_mode = mode
        .map(|m| m.resolve(old_mode.unwrap_or(0), false))
        .transpose()
        .map_err(anyhow::Error::from)?;

    if hash_before.as_deref() == Some(sha256_hex(&data).as_str()) {
        return match new_mode {
            Some(bits) if Some(bits) != old_mode => {
                set_mode(dest, bits)?;
                Ok(Some("Permissions"))
            }
            _ => Ok(None),
        };
    }
    write_atomic(dest, &data, new_mode.or(old_mode))?;
    Ok(Some("Contents"))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::fs;

    use super::*;
    use crate::engine::test_helpers::test_context;

    #[test]
    fn default_source_appends_j2() {
        assert_eq!(default_source("/etc/motd"), "motd.j2");
        assert_eq!(default_source("site.conf"), "site.conf.j2");
    }

    #[test]
    fn walk_lists_directories_before_children_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("b/c")).unwrap();
        fs::create_dir_all(tmp.path().join("a")).unwrap();
        fs::write(tmp.path().join("z.txt"), "").unwrap();
        fs::write(tmp.path().join("b/y.txt"), "").unwrap();

        let dirs = walk(tmp.path()).unwrap();
        let listing: Vec<_> = dirs
            .iter()
            .map(|d| (d.relative.to_string_lossy().into_owned(), d.files.clone()))
            .collect();
        assert_eq!(
            listing,
            [
                (String::new(), vec!["z.txt".to_string()]),
                ("a".to_string(), vec![]),
                ("b".to_string(), vec!["y.txt".to_string()]),
                ("b/c".to_string(), vec![]),
            ]
        );
    }

    #[test]
    fn renders_default_source_from_files_dir() {
        let (ctx, log, tmp) = test_context();
        fs::create_dir(tmp.path().join("files")).unwrap();
        fs::write(tmp.path().join("files/motd.j2"), "Welcome to {{ host }}\n").unwrap();
        ctx.set_var("host", "web1".into());

        let result = ctx.invoke(Call::new("fs.cp").arg("path", "motd")).unwrap();
        assert!(result.changed());
        assert_eq!(
            fs::read_to_string(tmp.path().join("motd")).unwrap(),
            "Welcome to web1\n"
        );
        assert_eq!(
            log.status_lines()[0],
            "=> fs.cp(path=motd, template=true, template_filenames=true, recursive=true) (Contents)"
        );

        let again = ctx.invoke(Call::new("fs.cp").arg("path", "motd")).unwrap();
        assert!(!again.changed());
    }

    #[test]
    fn template_false_copies_verbatim() {
        let (ctx, _log, tmp) = test_context();
        fs::write(tmp.path().join("raw.txt"), "{{ not_defined }}").unwrap();
        ctx.invoke(
            Call::new("fs.cp")
                .arg("path", "out.txt")
                .arg("src", "raw.txt")
                .arg("template", false),
        )
        .unwrap();
        assert_eq!(
            fs::read_to_string(tmp.path().join("out.txt")).unwrap(),
            "{{ not_defined }}"
        );
    }

    #[test]
    fn missing_source_fails_with_status() {
        let (ctx, log, _tmp) = test_context();
        let err = ctx.invoke(Call::new("fs.cp").arg("path", "motd")).unwrap_err();
        assert!(err.to_string().contains("unable to locate 'motd.j2'"), "{err}");
        assert!(log.status_lines()[0].starts_with("=X fs.cp("));
    }

    #[cfg(unix)]
    #[test]
    fn permissions_only_change() {
        use std::os::unix::fs::PermissionsExt;
        let (ctx, log, tmp) = test_context();
        fs::write(tmp.path().join("src"), "same").unwrap();
        fs::write(tmp.path().join("dest"), "same").unwrap();
        fs::set_permissions(tmp.path().join("dest"), fs::Permissions::from_mode(0o644)).unwrap();

        let result = ctx
            .invoke(
                Call::new("fs.cp")
                    .arg("path", "dest")
                    .arg("src", "src")
                    .arg("mode", "600"),
            )
            .unwrap();
        assert!(result.changed());
        assert!(log.status_lines()[0].ends_with("(Permissions)"));
        let mode = fs::metadata(tmp.path().join("dest")).unwrap().permissions().mode();
        assert_eq!(mode & 0o7777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn rewrite_keeps_existing_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let (ctx, _log, tmp) = test_context();
        fs::write(tmp.path().join("src"), "new").unwrap();
        fs::write(tmp.path().join("dest"), "old").unwrap();
        fs::set_permissions(tmp.path().join("dest"), fs::Permissions::from_mode(0o640)).unwrap();

        ctx.invoke(Call::new("fs.cp").arg("path", "dest").arg("src", "src"))
            .unwrap();
        let mode = fs::metadata(tmp.path().join("dest")).unwrap().permissions().mode();
        assert_eq!(mode & 0o7777, 0o640);
    }

    #[test]
    fn recursive_copy_nests_tasks() {
        let (ctx, log, tmp) = test_context();
        fs::create_dir_all(tmp.path().join("tree/sub")).unwrap();
        fs::write(tmp.path().join("tree/a.txt"), "a").unwrap();
        fs::write(tmp.path().join("tree/sub/b.txt"), "{{ 1 + 1 }}").unwrap();

        let result = ctx
            .invoke(Call::new("fs.cp").arg("path", "out").arg("src", "tree"))
            .unwrap();
        assert!(result.changed());
        assert_eq!(fs::read_to_string(tmp.path().join("out/a.txt")).unwrap(), "a");
        assert_eq!(fs::read_to_string(tmp.path().join("out/sub/b.txt")).unwrap(), "2");

        let lines = log.status_lines();
        assert_eq!(lines.len(), 5);
        assert!(lines[..4].iter().all(|l| l.starts_with("==")), "{lines:?}");
        assert!(
            lines[4].starts_with("=> fs.cp(path=out, src=tree") && lines[4].ends_with("(Subdir, Subfile)"),
            "{}",
            lines[4]
        );
    }

    #[test]
    fn raw_filenames_are_not_rendered() {
        let (ctx, _log, tmp) = test_context();
        fs::create_dir_all(tmp.path().join("tree")).unwrap();
        fs::write(tmp.path().join("tree/{{ name }}.txt"), "x").unwrap();

        ctx.invoke(
            Call::new("fs.cp")
                .arg("path", "out")
                .arg("src", "tree")
                .arg("template_filenames", false),
        )
        .unwrap();
        assert!(tmp.path().join("out/{{ name }}.txt").exists());
    }

    #[test]
    fn templated_filenames_are_rendered() {
        let (ctx, _log, tmp) = test_context();
        fs::create_dir_all(tmp.path().join("tree")).unwrap();
        fs::write(tmp.path().join("tree/{{ name }}.txt"), "x").unwrap();
        ctx.set_var("name", "web1".into());

        ctx.invoke(Call::new("fs.cp").arg("path", "out").arg("src", "tree"))
            .unwrap();
        assert!(tmp.path().join("out/web1.txt").exists());
    }
}
