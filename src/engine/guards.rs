//! Scope guards for every stack-like mutation of the run context.
//!
//! Each guard undoes its mutation on drop, so the run context is restored on
//! every exit path, including errors propagated with `?`.
use super::call::CallInfo;
use super::context::RunContext;
use super::scope::ItemScope;
use super::value::Vars;

/// Increments the call depth for nested task invocations.
#[derive(Debug)]
#[must_use = "the call depth is restored when the guard is dropped"]
pub struct CallDepthGuard<'a> {
    ctx: &'a RunContext,
}

impl<'a> CallDepthGuard<'a> {
    /// Increase the call depth until the guard is dropped.
    pub fn enter(ctx: &'a RunContext) -> Self {
        ctx.call_depth.set(ctx.call_depth.get() + 1);
        Self { ctx }
    }
}

impl Drop for CallDepthGuard<'_> {
    fn drop(&mut self) {
        self.ctx
            .call_depth
            .set(self.ctx.call_depth.get().saturating_sub(1));
    }
}

/// Tolerates task failures while alive.
#[derive(Debug)]
#[must_use = "failures are tolerated only while the guard is alive"]
pub struct IgnoreFailureGuard<'a> {
    ctx: &'a RunContext,
}

impl<'a> IgnoreFailureGuard<'a> {
    /// Increase the ignore-failure depth until the guard is dropped.
    pub fn enter(ctx: &'a RunContext) -> Self {
        ctx.ignore_failure_depth
            .set(ctx.ignore_failure_depth.get() + 1);
        Self { ctx }
    }
}

impl Drop for IgnoreFailureGuard<'_> {
    fn drop(&mut self) {
        self.ctx
            .ignore_failure_depth
            .set(self.ctx.ignore_failure_depth.get().saturating_sub(1));
    }
}

/// Keeps an item scope on the overlay stack while alive.
#[derive(Debug)]
#[must_use = "the item scope is popped when the guard is dropped"]
pub struct ItemScopeGuard<'a> {
    ctx: &'a RunContext,
}

impl<'a> ItemScopeGuard<'a> {
    /// Push `item` until the guard is dropped.
    pub fn push(ctx: &'a RunContext, item: ItemScope) -> Self {
        ctx.scopes.borrow_mut().items.push(item);
        Self { ctx }
    }
}

impl Drop for ItemScopeGuard<'_> {
    fn drop(&mut self) {
        self.ctx.scopes.borrow_mut().items.pop();
    }
}

/// Installs the calling scope for one invocation and clears it afterwards.
#[derive(Debug)]
pub(crate) struct CallingScopeGuard<'a> {
    ctx: &'a RunContext,
}

impl<'a> CallingScopeGuard<'a> {
    pub(crate) fn set(ctx: &'a RunContext, vars: Vars) -> Self {
        ctx.scopes.borrow_mut().calling = vars;
        Self { ctx }
    }
}

impl Drop for CallingScopeGuard<'_> {
    fn drop(&mut self) {
        self.ctx.scopes.borrow_mut().calling.clear();
    }
}

/// Keeps call metadata on the call stack for the duration of a task body.
#[derive(Debug)]
pub(crate) struct CallFrameGuard<'a> {
    ctx: &'a RunContext,
}

impl<'a> CallFrameGuard<'a> {
    pub(crate) fn push(ctx: &'a RunContext, info: CallInfo) -> Self {
        ctx.calls.borrow_mut().push(info);
        Self { ctx }
    }
}

impl Drop for CallFrameGuard<'_> {
    fn drop(&mut self) {
        self.ctx.calls.borrow_mut().pop();
    }
}
