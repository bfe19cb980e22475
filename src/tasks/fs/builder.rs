use serde_json::{Map, Value};

use super::MODULE;
use crate::engine::{
    ArgValue, Call, CallDepthGuard, ItemScope, ItemScopeGuard, Outcome, Param, Signature,
    TaskCall, TaskResult,
};
use crate::error::PlaybookError;
use crate::tasks::{Task, forward};

const ACTIONS: &str = "one of template, copy, directory, exists, link, symlink, absent";

/// Forward `name` from the current call if it was given.
fn pass(call: &TaskCall<'_>, nested: Call, name: &str) -> Call {
    match call.value(name) {
        value if value.is_unset() => nested,
        value => nested.arg(name, forward(value)),
    }
}

/// `fs.fs`: bring `path` into the state named by `action`.
///
/// | action      | task                         |
/// |-------------|------------------------------|
/// | `template`  | `fs.cp`                      |
/// | `copy`      | `fs.cp` with `template=false`|
/// | `directory` | `fs.mkdir`                   |
/// | `exists`    | `fs.mkfile`                  |
/// | `link`      | `fs.ln`                      |
/// | `symlink`   | `fs.ln` with `symbolic=true` |
/// | `absent`    | `fs.rm`                      |
///
/// `owner` and `group` are applied with a nested `fs.chown`, and `notify`
/// handlers are queued if anything changed.
pub struct BuildPath;

impl Task for BuildPath {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "fs"
    }

    fn signature(&self) -> Signature {
        Signature::new([
            Param::template("path"),
            Param::template("action").default("template"),
            Param::template("src").optional(),
            Param::template("mode").optional(),
            Param::template("owner").optional(),
            Param::template("group").optional(),
            Param::opaque("notify").optional(),
        ])
    }

    fn run(&self, call: &TaskCall<'_>) -> Result<TaskResult, PlaybookError> {
        let path = forward(call.value("path"));
        let action = call.str("action")?;
        let nested = match action {
            "template" | "copy" => {
                let cp = pass(call, Call::new("fs.cp").arg("path", path.clone()), "src");
                pass(call, cp, "mode").arg("template", action == "template")
            }
            "directory" => pass(call, Call::new("fs.mkdir").arg("path", path.clone()), "mode"),
            "exists" => pass(call, Call::new("fs.mkfile").arg("path", path.clone()), "mode"),
            "link" | "symlink" => pass(call, Call::new("fs.ln").arg("path", path.clone()), "src")
                .arg("symbolic", action == "symlink"),
            "absent" => Call::new("fs.rm").arg("path", path.clone()),
            _ => return Err(call.invalid("action", ACTIONS)),
        };
        let handlers = call.handlers("notify")?;

        let changed = {
            let _depth = CallDepthGuard::enter(call.ctx());
            let mut changed = call.invoke(nested)?.changed();
            let owned = !call.value("owner").is_unset() || !call.value("group").is_unset();
            if owned && action != "absent" {
                let chown = Call::new("fs.chown").arg("path", path);
                let chown = pass(call, pass(call, chown, "owner"), "group");
                changed |= call.invoke(chown)?.changed();
            }
            changed
        };

        let result = call.report(Outcome::from_changed(changed))?;
        result.notify(call.ctx(), &handlers);
        Ok(result)
    }
}

/// `fs.builder`: run `fs.fs` for each item, over `defaults`.
///
/// Each merged item is also pushed as an item scope, so its fields can be
/// used in templates: `path = "/srv/{{ name }}"`.
pub struct Builder;

impl Task for Builder {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "builder"
    }

    fn signature(&self) -> Signature {
        Signature::new([
            Param::opaque("items"),
            Param::opaque("defaults").optional(),
        ])
    }

    fn run(&self, call: &TaskCall<'_>) -> Result<TaskResult, PlaybookError> {
        let defaults = match call.value("defaults").to_json() {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            _ => return Err(call.invalid("defaults", "a table")),
        };
        let Value::Array(items) = call.value("items").to_json() else {
            return Err(call.invalid("items", "a list of tables"));
        };

        let declared = call
            .ctx()
            .registry()
            .get("fs.fs")
            .map(|task| task.signature().clone())
            .unwrap_or_default();

        let mut changed = false;
        for item in items {
            let Value::Object(fields) = item else {
                return Err(call.invalid("items", "a list of tables"));
            };
            let mut merged = defaults.clone();
            merged.extend(fields);

            // Fields fs.fs does not declare are only visible as variables.
            let nested = merged
                .iter()
                .filter(|(name, _)| declared.get(name).is_some())
                .fold(Call::new("fs.fs"), |nested, (name, value)| {
                    nested.arg(name.clone(), ArgValue::from_json(value.clone()))
                });
            let _item = ItemScopeGuard::push(call.ctx(), ItemScope::from(merged));
            changed |= call.invoke(nested)?.changed();
        }
        call.report(Outcome::from_changed(changed))
    }
}
