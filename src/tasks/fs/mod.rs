//! Filesystem tasks.
//!
//! The individual tasks follow Unix naming (`mkdir`, `rm`, `ln`, ...).
//! `fs.fs` dispatches to them by `action`, and `fs.builder` runs `fs.fs`
//! once per item with the item's fields exposed as template variables.
mod builder;
mod cd;
mod cp;
mod files;
mod ln;
mod perms;
mod query;

pub use builder::{BuildPath, Builder};
pub use cd::ChangeDir;
pub use cp::CopyFile;
pub use files::{MakeDir, MakeFile, MovePath, RemovePath};
pub use ln::LinkPath;
pub use perms::{ChangeMode, ChangeOwner};
pub use query::{PathExists, StatPath};

use serde_json::Value;

use super::Task;
use crate::engine::{ArgValue, TaskCall};
use crate::error::PlaybookError;
use crate::resources::mode::ModeSpec;

/// Module name shared by every fs task.
const MODULE: &str = "fs";

/// Every fs task.
#[must_use]
pub fn all_tasks() -> Vec<Box<dyn Task>> {
    vec![
        Box::new(ChangeMode),
        Box::new(ChangeOwner),
        Box::new(MakeFile),
        Box::new(MakeDir),
        Box::new(RemovePath),
        Box::new(MovePath),
        Box::new(PathExists),
        Box::new(StatPath),
        Box::new(ChangeDir),
        Box::new(LinkPath),
        Box::new(CopyFile),
        Box::new(BuildPath),
        Box::new(Builder),
    ]
}

/// Permission argument: an integer (`0o644` in TOML) or an octal or
/// symbolic string.
fn mode_arg(call: &TaskCall<'_>, name: &str) -> Result<Option<ModeSpec>, PlaybookError> {
    let invalid = || call.invalid(name, "an octal or symbolic mode");
    match call.value(name) {
        value if value.is_unset() => Ok(None),
        ArgValue::Data(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n <= 0o7777)
            .map(|n| Some(ModeSpec::Numeric(n)))
            .ok_or_else(invalid),
        value => {
            let text = value.as_str().ok_or_else(invalid)?;
            ModeSpec::parse(text).map(Some).map_err(|_| invalid())
        }
    }
}
