//! Run-level argument parsing for a playbook's `[[args]]` declarations.
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use serde_json::Value;

use super::playbook::{ArgDecl, ArgType};
use crate::engine::Vars;

/// Long option for an argument: `dry_run` becomes `--dry-run`.
fn long_name(name: &str) -> String {
    name.replace('_', "-")
}

/// Id of the negated flag for a boolean option.
fn negated_id(name: &str) -> String {
    format!("no_{name}")
}

/// Build the argument parser for a playbook.
///
/// Declarations without a default are required positionals in declaration
/// order. The rest are `--name <value>` options; booleans become
/// `--name` / `--no-name` flags.
#[must_use]
pub fn build_command(playbook: &str, about: &str, decls: &[ArgDecl]) -> Command {
    let mut cmd = Command::new(format!("up:{playbook}"))
        .about(about.trim().to_string())
        .no_binary_name(true);

    for decl in decls {
        let help = decl.description.clone().unwrap_or_default();
        let long = long_name(&decl.name);
        cmd = match (decl.default.is_some(), decl.kind) {
            (false, kind) => {
                let arg = Arg::new(decl.name.clone()).required(true).help(help);
                cmd.arg(with_parser(arg, kind))
            }
            (true, ArgType::Bool) => {
                let no = negated_id(&decl.name);
                cmd.arg(
                    Arg::new(decl.name.clone())
                        .long(long.clone())
                        .action(ArgAction::SetTrue)
                        .overrides_with(no.clone())
                        .help(help),
                )
                .arg(
                    Arg::new(no.clone())
                        .long(format!("no-{long}"))
                        .action(ArgAction::SetTrue)
                        .overrides_with(decl.name.clone())
                        .hide(true),
                )
            }
            (true, kind) => {
                let arg = Arg::new(decl.name.clone())
                    .long(long)
                    .value_name(decl.name.to_uppercase())
                    .help(help);
                cmd.arg(with_parser(arg, kind))
            }
        };
    }
    cmd
}

fn with_parser(arg: Arg, kind: ArgType) -> Arg {
    match kind {
        ArgType::Int => arg.value_parser(value_parser!(i64)),
        ArgType::Bool => arg.value_parser(value_parser!(bool)),
        ArgType::Str => arg.value_parser(value_parser!(String)),
        ArgType::Password => arg.value_parser(value_parser!(String)).hide_default_value(true),
    }
}

fn matched_value(matches: &ArgMatches, decl: &ArgDecl) -> Option<Value> {
    let id = decl.name.as_str();
    match decl.kind {
        ArgType::Bool if decl.default.is_some() => {
            if matches.get_flag(id) {
                Some(Value::Bool(true))
            } else if matches.get_flag(&negated_id(id)) {
                Some(Value::Bool(false))
            } else {
                None
            }
        }
        ArgType::Bool => matches.get_one::<bool>(id).map(|b| Value::Bool(*b)),
        ArgType::Int => matches.get_one::<i64>(id).map(|n| Value::from(*n)),
        ArgType::Str | ArgType::Password => {
            matches.get_one::<String>(id).map(|s| Value::String(s.clone()))
        }
    }
}

/// Parse `argv` (without a program name) against `decls`.
///
/// Every declared argument gets a value: the parsed one or its default.
///
/// # Errors
///
/// Returns the [`clap::Error`] for invalid input, including the
/// `--help` request, which callers should print and treat as success.
pub fn parse_run_args(
    playbook: &str,
    about: &str,
    decls: &[ArgDecl],
    argv: &[String],
) -> Result<Vars, clap::Error> {
    let matches = build_command(playbook, about, decls).try_get_matches_from(argv)?;
    Ok(decls
        .iter()
        .map(|decl| {
            let value = matched_value(&matches, decl)
                .or_else(|| decl.default.clone())
                .unwrap_or(Value::Null);
            (decl.name.clone(), value)
        })
        .collect())
}
