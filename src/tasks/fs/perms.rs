use anyhow::anyhow;

use super::{MODULE, mode_arg};
use crate::engine::{Outcome, Param, Signature, TaskCall, TaskResult};
use crate::error::PlaybookError;
use crate::resources::Resource as _;
use crate::resources::chmod::ChmodResource;
use crate::resources::owner::{OwnerResource, resolve_group, resolve_user};
use crate::tasks::{Task, conclude};

/// `fs.chmod`: set the permissions of an existing path.
///
/// `mode` may be octal or symbolic (`a=rX,u+w`). `is_directory` overrides
/// detection for the `X` permission.
pub struct ChangeMode;

impl Task for ChangeMode {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "chmod"
    }

    fn signature(&self) -> Signature {
        Signature::new([
            Param::template("path"),
            Param::template("mode").optional(),
            Param::opaque("is_directory").optional(),
        ])
    }

    fn run(&self, call: &TaskCall<'_>) -> Result<TaskResult, PlaybookError> {
        let Some(mode) = mode_arg(call, "mode")? else {
            return call.report(Outcome::unchanged());
        };
        let resource = ChmodResource::new(call.path("path")?, mode)
            .with_is_directory(call.opt_bool("is_directory")?);
        conclude(call, change_mode(&resource))
    }
}

fn change_mode(resource: &ChmodResource) -> Result<Outcome, PlaybookError> {
    if !resource.target.exists() {
        return Err(anyhow!("no such file or directory: {}", resource.target.display()).into());
    }
    let old = resource.current_mode()?;
    let new = resource.desired_mode()?;
    if old == new {
        return Ok(Outcome::unchanged());
    }
    resource.apply()?;
    Ok(Outcome::changed().message(format!("Changed permissions: {old:o} -> {new:o}")))
}

/// `fs.chown`: set the owner and/or group of an existing path.
pub struct ChangeOwner;

impl Task for ChangeOwner {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "chown"
    }

    fn signature(&self) -> Signature {
        Signature::new([
            Param::template("path"),
            Param::template("owner").optional(),
            Param::template("group").optional(),
        ])
    }

    fn run(&self, call: &TaskCall<'_>) -> Result<TaskResult, PlaybookError> {
        let path = call.path("path")?;
        let owner = call.opt_str("owner")?;
        let group = call.opt_str("group")?;
        conclude(call, change_owner(path, owner, group))
    }
}

fn change_owner(
    path: std::path::PathBuf,
    owner: Option<&str>,
    group: Option<&str>,
) -> Result<Outcome, PlaybookError> {
    let uid = owner.map(resolve_user).transpose()?;
    let gid = group.map(resolve_group).transpose()?;
    let resource = OwnerResource::new(path, uid, gid);
    if !resource.target.exists() {
        return Err(anyhow!("no such file or directory: {}", resource.target.display()).into());
    }

    let (old_uid, old_gid) = resource.current_owner()?;
    if !resource.converge()?.changed() {
        return Ok(Outcome::unchanged());
    }
    let mut messages = Vec::new();
    if uid.is_some_and(|uid| uid != old_uid) {
        messages.push(format!("User changed from {old_uid}"));
    }
    if gid.is_some_and(|gid| gid != old_gid) {
        messages.push(format!("Group changed from {old_gid}"));
    }
    Ok(Outcome::changed().message(messages.join(", ")))
}
