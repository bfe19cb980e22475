use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context as _, Result};

use crate::cli::RunOpts;
use crate::config::run_args::{build_command, parse_run_args};
use crate::config::{Playbook, PlaybookLocation, find_playbook};
use crate::engine::{Counters, PlaybookInfo, RunContext};
use crate::error::PlaybookError;
use crate::logging::Log;
use crate::runner::StepRunner;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Process exit code.
    pub exit_code: i32,
    /// Final task counters.
    pub counters: Counters,
}

/// Everything a run needs besides the command line.
#[derive(Debug)]
pub struct RunEnv {
    /// Where to look for playbooks by name.
    pub search_dirs: Vec<PathBuf>,
    /// Working directory; the process's current directory when unset.
    pub workdir: Option<PathBuf>,
    /// Set asynchronously to stop the run between statements.
    pub interrupt: Arc<AtomicBool>,
}

/// A playbook ready to execute.
struct Prepared {
    location: PlaybookLocation,
    playbook: Playbook,
}

/// Find, load and validate the playbook.
fn prepare(opts: &RunOpts, env: &RunEnv, ctx: &RunContext) -> Result<Prepared> {
    let log = ctx.log();
    let name = opts
        .playbook
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("no playbook given"))?;
    let location = find_playbook(name, &env.search_dirs)?;
    log.debug(&format!("playbook: {}", location.file.display()));
    let playbook = Playbook::load(&location.file)
        .with_context(|| format!("loading {}", location.file.display()))?;

    let source = location.file.display().to_string();
    for warning in playbook.validate(&source, ctx.registry()) {
        log.warn(&format!(
            "{} [{}]: {}",
            warning.source, warning.item, warning.message
        ));
    }
    Ok(Prepared { location, playbook })
}

/// Whether the playbook's own help was requested.
fn wants_help(opts: &RunOpts) -> bool {
    opts.args.iter().any(|a| a == "--help" || a == "-h")
}

/// Record metadata, parse run arguments and execute the steps.
fn execute(
    ctx: &RunContext,
    prepared: &Prepared,
    opts: &RunOpts,
    runner: &StepRunner,
) -> Result<()> {
    let Prepared { location, playbook } = prepared;
    ctx.set_playbook(PlaybookInfo {
        name: location.name.clone(),
        directory: location.directory.clone(),
        description: playbook.description.clone(),
        files_seen: BTreeSet::from([location.file.clone()]),
    });

    let args = parse_run_args(&location.name, &playbook.description, &playbook.args, &opts.args)
        .map_err(|e| anyhow::anyhow!("{}", e.render().to_string().trim_end()))?;
    ctx.set_run_args(args);

    runner.load(ctx, playbook);
    runner.run(ctx, &playbook.steps)?;
    Ok(())
}

/// Log the failure trace and cause of a failed run.
fn report_failure(ctx: &RunContext, runner: Option<&StepRunner>, err: &anyhow::Error, full: bool) {
    let log = ctx.log();
    if let Some(runner) = runner {
        let lines = runner.trace().render(&ctx.playbook().files_seen, full);
        if !lines.is_empty() {
            log.error("Playbook trace (innermost first):");
            for line in &lines {
                log.error(line);
            }
        }
    }
    if full {
        log.error(&format!("{err:?}"));
    } else if let Some(PlaybookError::TaskFailure(cause)) = err.downcast_ref::<PlaybookError>() {
        log.error(&format!("Task failure, cause: {cause}"));
    } else {
        log.error(&format!("{err:#}"));
    }
}

/// Exit code for a finished run.
fn exit_code(result: &Result<()>, handlers_failed: bool, counters: Counters) -> i32 {
    let requested = result
        .as_ref()
        .err()
        .and_then(|e| e.downcast_ref::<PlaybookError>())
        .and_then(PlaybookError::exit_code);
    match (requested, result) {
        (Some(code), _) if code != 0 || !handlers_failed => code,
        (None, Err(_)) => 1,
        _ if handlers_failed || counters.failure > 0 => 1,
        _ => 0,
    }
}

/// Run a playbook from start to recap.
///
/// Handlers are flushed exactly once at the end, whether or not the steps
/// succeeded, and the recap is always logged. `--help` for the playbook's
/// own arguments is logged and ends the run before any step.
#[must_use]
pub fn run(opts: &RunOpts, env: &RunEnv, log: Arc<dyn Log>) -> RunReport {
    let mut ctx = RunContext::new(Arc::clone(&log)).with_interrupt_flag(Arc::clone(&env.interrupt));
    if let Some(dir) = &env.workdir {
        ctx = ctx.with_workdir(dir);
    }

    let prepared = prepare(opts, env, &ctx);
    if let Ok(ready) = &prepared
        && wants_help(opts)
    {
        let help = build_command(
            &ready.location.name,
            &ready.playbook.description,
            &ready.playbook.args,
        )
        .render_help();
        log.info(help.to_string().trim_end());
        return RunReport {
            exit_code: 0,
            counters: Counters::default(),
        };
    }

    let mut runner = None;
    let result = prepared.and_then(|prepared| {
        let steps = StepRunner::new(prepared.location.file.clone());
        runner = Some(steps.clone());
        execute(&ctx, &prepared, opts, &steps)
    });

    let early_exit = result
        .as_ref()
        .err()
        .and_then(|e| e.downcast_ref::<PlaybookError>())
        .is_some_and(|e| e.exit_code().is_some());
    if let Err(err) = &result
        && !early_exit
    {
        report_failure(&ctx, runner.as_ref(), err, opts.full_trace);
    }

    let handlers_failed = match ctx.flush_handlers() {
        Ok(_) => false,
        Err(err) => {
            report_failure(&ctx, runner.as_ref(), &anyhow::Error::from(err), opts.full_trace);
            true
        }
    };

    let counters = ctx.counters();
    log.recap(&format!(
        "*** RECAP:  total={} changed={} failure={}",
        counters.total, counters.changed, counters.failure
    ));

    RunReport {
        exit_code: exit_code(&result, handlers_failed, counters),
        counters,
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn counters(failure: usize) -> Counters {
        Counters {
            total: 3,
            changed: 1,
            failure,
        }
    }

    fn early_exit(code: i32) -> Result<()> {
        Err(PlaybookError::EarlyExit {
            code,
            message: String::new(),
        }
        .into())
    }

    #[test]
    fn clean_run_exits_zero() {
        assert_eq!(exit_code(&Ok(()), false, counters(0)), 0);
    }

    #[test]
    fn recorded_failures_exit_one() {
        assert_eq!(exit_code(&Ok(()), false, counters(1)), 1);
        assert_eq!(exit_code(&Ok(()), true, counters(0)), 1);
    }

    #[test]
    fn errors_exit_one() {
        let err: Result<()> = Err(anyhow::anyhow!("boom"));
        assert_eq!(exit_code(&err, false, counters(0)), 1);
    }

    #[test]
    fn early_exit_code_wins() {
        assert_eq!(exit_code(&early_exit(3), false, counters(1)), 3);
        assert_eq!(exit_code(&early_exit(0), false, counters(0)), 0);
        assert_eq!(exit_code(&early_exit(0), true, counters(0)), 1);
    }
}
