//! Reactive Context
//!
//! The reactive context tracks which watcher is currently evaluating.
//! This enables automatic dependency tracking: when a reactive location is
//! read, its [`Dep`](super::Dep) asks the current watcher to record it.
//!
//! # Implementation
//!
//! We use a thread-local stack rather than a single slot. When a watcher
//! starts evaluating we push it; when it finishes we pop it, restoring the
//! outer watcher. This supports re-entrant evaluation, e.g. a computed value
//! pulled from inside a render getter, or a sync watcher re-run from inside
//! another watcher's getter.
//!
//! An entry may also be empty: [`untracked`] pushes a "no target" frame so
//! reads inside it register nothing, even when an outer watcher is active.

use std::cell::RefCell;

use crate::watch::Watcher;

thread_local! {
    static TARGET_STACK: RefCell<Vec<Option<Watcher>>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the evaluation returns early with
/// an error or panics.
pub struct ReactiveContext {
    target: Option<u64>,
}

impl ReactiveContext {
    /// Make `watcher` the current evaluation target until the guard drops.
    pub fn enter(watcher: &Watcher) -> Self {
        let target = Some(watcher.id().raw());
        TARGET_STACK.with(|stack| stack.borrow_mut().push(Some(watcher.clone())));
        Self { target }
    }

    /// Suspend tracking until the guard drops.
    pub fn pause() -> Self {
        TARGET_STACK.with(|stack| stack.borrow_mut().push(None));
        Self { target: None }
    }

    /// Check if there is a watcher collecting dependencies right now.
    pub fn is_active() -> bool {
        TARGET_STACK.with(|stack| matches!(stack.borrow().last(), Some(Some(_))))
    }

    /// Get the watcher currently collecting dependencies, if any.
    pub fn current() -> Option<Watcher> {
        TARGET_STACK.with(|stack| stack.borrow().last().cloned().flatten())
    }

    /// Number of frames on the stack, tracking or not.
    pub fn depth() -> usize {
        TARGET_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        TARGET_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.as_ref().map(|w| w.id().raw()),
                    self.target,
                    "ReactiveContext mismatch"
                );
            }
        });
    }
}

/// Run `f` without recording any dependencies.
pub fn untracked<T>(f: impl FnOnce() -> T) -> T {
    let _ctx = ReactiveContext::pause();
    f()
}
