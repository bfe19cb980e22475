//! Deferred handlers and the queue that runs them once.
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use super::context::RunContext;
use crate::error::PlaybookError;

type HandlerFn = dyn Fn(&RunContext) -> Result<(), PlaybookError>;

/// A named, deferred action.
///
/// Clones share the same action; two handlers are the same handler exactly
/// when they share it, regardless of name.
#[derive(Clone)]
pub struct Handler {
    name: Rc<str>,
    action: Rc<HandlerFn>,
}

impl Handler {
    /// Create a handler from a closure.
    pub fn new(
        name: impl Into<String>,
        action: impl Fn(&RunContext) -> Result<(), PlaybookError> + 'static,
    ) -> Self {
        let name: String = name.into();
        Self {
            name: Rc::from(name),
            action: Rc::new(action),
        }
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `other` is the same handler.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.action), Rc::as_ptr(&other.action))
    }

    /// Run the handler.
    ///
    /// # Errors
    ///
    /// Propagates the handler's error.
    pub fn call(&self, ctx: &RunContext) -> Result<(), PlaybookError> {
        (self.action)(ctx)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Ordered queue of distinct handlers.
#[derive(Debug, Default)]
pub struct HandlerQueue {
    queue: RefCell<VecDeque<Handler>>,
}

impl HandlerQueue {
    /// Append `handler` unless the same handler is already queued.
    ///
    /// Returns whether it was added.
    pub fn add(&self, handler: Handler) -> bool {
        let mut queue = self.queue.borrow_mut();
        if queue.iter().any(|queued| queued.same_as(&handler)) {
            return false;
        }
        queue.push_back(handler);
        true
    }

    /// Remove and return the head of the queue.
    ///
    /// The borrow ends before the caller runs the handler, so a running
    /// handler may queue more.
    pub(crate) fn pop_front(&self) -> Option<Handler> {
        self.queue.borrow_mut().pop_front()
    }

    /// Number of queued handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// Names of queued handlers, head first.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.queue
            .borrow()
            .iter()
            .map(|h| h.name().to_string())
            .collect()
    }
}
