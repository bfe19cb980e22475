//! Statement execution: turns playbook steps into task invocations.
//!
//! Each step may loop over `items`, be skipped by `when`, tolerate
//! failures, invoke one task, and run nested steps. Nested steps under a
//! task whose result is a scope guard (such as `fs.cd`) run inside the
//! guard; under any other task they run only if it succeeded.
mod trace;

pub use trace::{Frame, Trace};

use std::path::PathBuf;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::config::{HandlerDef, Notify, Playbook, Step};
use crate::engine::{
    ArgValue, Call, Handler, IgnoreFailureGuard, ItemScope, ItemScopeGuard, RunContext,
};
use crate::error::PlaybookError;

/// Executes the steps of one playbook file.
///
/// Clones share the same [`Trace`], so handler steps run from the handler
/// queue report into it as well.
#[derive(Debug, Clone)]
pub struct StepRunner {
    file: PathBuf,
    trace: Rc<Trace>,
}

impl StepRunner {
    /// Runner for steps loaded from `file`.
    #[must_use]
    pub fn new(file: PathBuf) -> Self {
        Self {
            file,
            trace: Rc::new(Trace::default()),
        }
    }

    /// Statements executing at the first failure.
    #[must_use]
    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Install the playbook's variables and handlers into `ctx`.
    pub fn load(&self, ctx: &RunContext, playbook: &Playbook) {
        for (name, value) in &playbook.vars {
            ctx.set_var(name.clone(), value.clone());
        }
        self.define_handlers(ctx, &playbook.handlers);
    }

    /// Define one [`Handler`] per entry. Each is created once, so every
    /// notification of a name queues the same handler.
    pub fn define_handlers(&self, ctx: &RunContext, handlers: &IndexMap<String, HandlerDef>) {
        for (name, def) in handlers {
            let runner = self.clone();
            let steps: Rc<[Step]> = def.steps.clone().into();
            let prefix = format!("handlers.{name}.steps");
            ctx.define_handler(Handler::new(name.clone(), move |ctx| {
                runner.run_steps(ctx, &steps, &prefix)
            }));
        }
    }

    /// Run top-level steps.
    ///
    /// # Errors
    ///
    /// Stops at the first error: an un-tolerated task failure, a usage
    /// error, an early exit, or an interruption.
    pub fn run(&self, ctx: &RunContext, steps: &[Step]) -> Result<(), PlaybookError> {
        self.run_steps(ctx, steps, "steps")
    }

    fn run_steps(&self, ctx: &RunContext, steps: &[Step], prefix: &str) -> Result<(), PlaybookError> {
        steps
            .iter()
            .enumerate()
            .try_for_each(|(i, step)| self.run_step(ctx, step, &format!("{prefix}[{i}]")))
    }

    fn run_step(&self, ctx: &RunContext, step: &Step, location: &str) -> Result<(), PlaybookError> {
        self.trace.enter(Frame {
            file: self.file.clone(),
            location: location.to_string(),
            label: step.label().to_string(),
        });
        let result = self.run_items(ctx, step, location);
        self.trace.leave(result.is_err());
        result
    }

    fn run_items(&self, ctx: &RunContext, step: &Step, location: &str) -> Result<(), PlaybookError> {
        ctx.check_interrupted()?;
        let Some(items) = &step.items else {
            return self.run_guarded(ctx, step, location);
        };
        for item in items {
            ctx.check_interrupted()?;
            let scope = match item {
                Value::Object(fields) => ItemScope::from(fields.clone()),
                _ => ItemScope::new(),
            }
            .with("item", item.clone());
            let _item = ItemScopeGuard::push(ctx, scope);
            self.run_guarded(ctx, step, location)?;
        }
        Ok(())
    }

    fn run_guarded(&self, ctx: &RunContext, step: &Step, location: &str) -> Result<(), PlaybookError> {
        if let Some(condition) = &step.when
            && !ctx.eval_condition(condition, Some(&step.vars))?
        {
            ctx.log().debug(&format!("{location}: skipped, `when` is false"));
            return Ok(());
        }
        let _ignore = step.ignore_failure.then(|| IgnoreFailureGuard::enter(ctx));
        self.run_body(ctx, step, location)
    }

    fn run_body(&self, ctx: &RunContext, step: &Step, location: &str) -> Result<(), PlaybookError> {
        let children = format!("{location}.steps");
        let Some(task) = &step.task else {
            apply_set(ctx, step)?;
            return self.run_steps(ctx, &step.steps, &children);
        };

        let handlers = step
            .notify
            .iter()
            .flat_map(Notify::names)
            .map(|name| ctx.handler(name))
            .collect::<Result<Vec<_>, _>>()?;

        let call = step.positional.iter().fold(
            Call::new(task.clone()).locals(step.vars.clone()),
            |call, value| call.positional(ArgValue::from_json(value.clone())),
        );
        let call = step.args.iter().fold(call, |call, (name, value)| {
            call.arg(name.clone(), ArgValue::from_json(value.clone()))
        });

        let mut result = ctx.invoke(call)?;
        result.notify(ctx, &handlers);
        if let Some(name) = &step.register {
            ctx.set_var(name.clone(), result.to_value());
        }
        apply_set(ctx, step)?;

        if step.steps.is_empty() {
            Ok(())
        } else if result.is_scope_guard() {
            let guard = result.enter(ctx)?;
            self.run_steps(ctx, &step.steps, &children)?;
            guard.close()
        } else if result.succeeded() {
            self.run_steps(ctx, &step.steps, &children)
        } else {
            ctx.log()
                .debug(&format!("{location}: nested steps skipped, {task} failed"));
            Ok(())
        }
    }
}

/// Assign `set` entries into the playbook namespace, rendering strings.
fn apply_set(ctx: &RunContext, step: &Step) -> Result<(), PlaybookError> {
    for (name, value) in &step.set {
        let value = match value {
            Value::String(template) => Value::String(ctx.render(template, Some(&step.vars))?),
            other => other.clone(),
        };
        ctx.set_var(name.clone(), value);
    }
    Ok(())
}
