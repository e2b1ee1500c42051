//! Watcher Implementation
//!
//! A watcher wraps a getter, evaluates it while registered as the current
//! evaluation target, and keeps its set of deps exactly equal to what the
//! latest evaluation read.
//!
//! # How Watchers Work
//!
//! 1. On creation the getter runs once (unless the watcher is lazy) and
//!    every dep it reads is recorded.
//!
//! 2. When one of those deps notifies, `update()` either marks the watcher
//!    dirty (lazy), re-runs it on the spot (sync), or hands it to the
//!    scheduler.
//!
//! 3. A re-run evaluates the getter again. Deps read this time but not last
//!    time are subscribed; deps read last time but not this time are
//!    unsubscribed. The callback then fires with `(new, old)`.
//!
//! # Dependency Bookkeeping
//!
//! Two dep sets are kept: `deps` from the previous evaluation and
//! `new_deps` being collected by the current one. Both are `IndexMap`s keyed
//! by dep id, so they serve as id set and ordered list at once. A dep read
//! several times in one evaluation is recorded once.
//!
//! # States
//!
//! ```text
//! uninitialized --evaluate--> clean --update--> dirty --run/pull--> clean
//!                                 \                                  |
//!                                  +----------- teardown ------------+--> torn down
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::options::{Callback, Getter, GetterFn, Hook, WatcherOptions};
use super::scope::{Scope, WeakScope};
use crate::config;
use crate::error::{ReactiveError, Result};
use crate::reactive::{
    parse_path, resolve, traverse, Dep, ReactiveContext, Subscriber, Value, WatcherId,
};
use crate::scheduler;

enum ResolvedGetter {
    Path(Vec<String>),
    Func(GetterFn),
    /// Fallback for a path that failed to parse.
    Noop,
}

struct WatcherState {
    value: Value,
    dirty: bool,
    active: bool,
    deps: IndexMap<u64, Dep>,
    new_deps: IndexMap<u64, Dep>,
}

struct WatcherInner {
    id: WatcherId,
    me: Weak<WatcherInner>,
    scope: WeakScope,
    expression: String,
    getter: ResolvedGetter,
    callback: Option<Callback>,
    deep: bool,
    user: bool,
    lazy: bool,
    sync: bool,
    before: Option<Hook>,
    state: RefCell<WatcherState>,
}

/// A tracked computation.
///
/// Cloning a `Watcher` yields another handle to the same node.
#[derive(Clone)]
pub struct Watcher {
    inner: Rc<WatcherInner>,
}

impl Watcher {
    /// Create a watcher and evaluate it once, unless it is lazy.
    ///
    /// A failing first evaluation of a non-`user` watcher tears the watcher
    /// down again and returns the error.
    pub fn new(
        scope: &Scope,
        getter: Getter,
        callback: Option<Callback>,
        options: WatcherOptions,
    ) -> Result<Self> {
        let watcher = Self::build(scope, getter, callback, options);
        if !watcher.inner.lazy {
            match watcher.evaluate() {
                Ok(value) => watcher.inner.state.borrow_mut().value = value,
                Err(err) => {
                    watcher.teardown();
                    return Err(err);
                }
            }
        }
        Ok(watcher)
    }

    /// Create and register a watcher without evaluating it.
    pub(crate) fn build(
        scope: &Scope,
        getter: Getter,
        callback: Option<Callback>,
        options: WatcherOptions,
    ) -> Self {
        let (expression, getter) = match getter {
            Getter::Path(path) => match parse_path(&path) {
                Some(segments) => (path, ResolvedGetter::Path(segments)),
                None => {
                    config::warn(&ReactiveError::InvalidPath(path.clone()).to_string(), Some(scope));
                    (path, ResolvedGetter::Noop)
                }
            },
            Getter::Func { label, f } => (label, ResolvedGetter::Func(f)),
        };

        let WatcherOptions {
            deep,
            user,
            lazy,
            sync,
            before,
        } = options;

        let inner = Rc::new_cyclic(|me| WatcherInner {
            id: WatcherId::new(),
            me: me.clone(),
            scope: scope.downgrade(),
            expression,
            getter,
            callback,
            deep,
            user,
            lazy,
            sync,
            before,
            state: RefCell::new(WatcherState {
                value: Value::Undefined,
                dirty: lazy,
                active: true,
                deps: IndexMap::new(),
                new_deps: IndexMap::new(),
            }),
        });

        let watcher = Self { inner };
        scope.register(&watcher);
        watcher
    }

    /// Helper for building a boxed callback with the right signature.
    pub fn callback<F>(f: F) -> Callback
    where
        F: Fn(&Scope, &Value, &Value) -> Result<()> + 'static,
    {
        Rc::new(f)
    }

    pub fn id(&self) -> WatcherId {
        self.inner.id
    }

    /// Human-readable description: the path, or the getter's label.
    pub fn expression(&self) -> &str {
        &self.inner.expression
    }

    /// The cached value.
    pub fn value(&self) -> Value {
        self.inner.state.borrow().value.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.state.borrow().dirty
    }

    pub fn is_active(&self) -> bool {
        self.inner.state.borrow().active
    }

    pub fn is_lazy(&self) -> bool {
        self.inner.lazy
    }

    pub fn is_user(&self) -> bool {
        self.inner.user
    }

    pub fn is_deep(&self) -> bool {
        self.inner.deep
    }

    pub fn is_sync(&self) -> bool {
        self.inner.sync
    }

    /// The owning scope, unless it has been dropped.
    pub fn scope(&self) -> Option<Scope> {
        self.inner.scope.upgrade()
    }

    /// Deps read by the latest evaluation, in read order.
    pub fn deps(&self) -> Vec<Dep> {
        self.inner.state.borrow().deps.values().cloned().collect()
    }

    pub fn dependency_ids(&self) -> Vec<u64> {
        self.inner.state.borrow().deps.keys().copied().collect()
    }

    pub fn dependency_count(&self) -> usize {
        self.inner.state.borrow().deps.len()
    }

    /// Run the getter with this watcher as the evaluation target and
    /// reconcile the dep sets afterwards.
    ///
    /// Getter errors of `user` watchers go to the error sink and produce
    /// `Undefined`; other getter errors are returned. The dep sets are
    /// reconciled either way. A torn-down watcher returns its cached value
    /// without evaluating.
    pub fn evaluate(&self) -> Result<Value> {
        if !self.is_active() {
            return Ok(self.value());
        }
        let Some(scope) = self.scope() else {
            return Ok(self.value());
        };

        let result = {
            let _ctx = ReactiveContext::enter(self);
            let produced = match self.call_getter(&scope) {
                Ok(value) => Ok(value),
                Err(err) if self.inner.user => {
                    config::handle_error(
                        &err,
                        Some(&scope),
                        &format!("getter for watcher \"{}\"", self.inner.expression),
                    );
                    Ok(Value::Undefined)
                }
                Err(err) => Err(ReactiveError::getter(&self.inner.expression, err)),
            };
            if self.inner.deep {
                if let Ok(value) = &produced {
                    traverse(value);
                }
            }
            produced
        };
        self.cleanup_deps();
        result
    }

    fn call_getter(&self, scope: &Scope) -> Result<Value> {
        match &self.inner.getter {
            ResolvedGetter::Func(f) => f(scope),
            ResolvedGetter::Path(segments) => Ok(resolve(&scope.data(), segments)),
            ResolvedGetter::Noop => Ok(Value::Undefined),
        }
    }

    /// Record `dep` as read by the evaluation in progress.
    ///
    /// Subscribes to it only if the previous evaluation had not.
    pub fn add_dep(&self, dep: &Dep) {
        let id = dep.id();
        let subscribe = {
            let mut state = self.inner.state.borrow_mut();
            if state.new_deps.contains_key(&id) {
                return;
            }
            state.new_deps.insert(id, dep.clone());
            !state.deps.contains_key(&id)
        };
        if subscribe {
            dep.add_sub(self.id(), self.subscriber());
        }
    }

    fn subscriber(&self) -> Weak<dyn Subscriber> {
        Rc::downgrade(&self.inner) as Weak<dyn Subscriber>
    }

    /// Unsubscribe from deps that the last evaluation did not read, then
    /// make the collected set current.
    fn cleanup_deps(&self) {
        let stale: Vec<Dep> = {
            let mut guard = self.inner.state.borrow_mut();
            let state = &mut *guard;
            let stale = state
                .deps
                .values()
                .filter(|dep| !state.new_deps.contains_key(&dep.id()))
                .cloned()
                .collect();
            std::mem::swap(&mut state.deps, &mut state.new_deps);
            state.new_deps.clear();
            stale
        };
        for dep in stale {
            dep.remove_sub(self.id());
        }
    }

    /// Invalidation entry point.
    pub fn update(&self) {
        if !self.is_active() {
            return;
        }
        if self.inner.lazy {
            self.inner.state.borrow_mut().dirty = true;
        } else if self.inner.sync {
            if let Err(err) = self.run() {
                let scope = self.scope();
                config::handle_error(&err, scope.as_ref(), "sync watcher");
            }
        } else {
            scheduler::queue_watcher(self.clone());
        }
    }

    /// Re-evaluate and fire the callback if the value changed.
    ///
    /// Object values and deep watchers always fire, since a structure can
    /// change in place without changing identity.
    pub fn run(&self) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }
        let value = self.evaluate()?;

        let old = {
            let mut state = self.inner.state.borrow_mut();
            if !value.same_value(&state.value) || value.is_object() || self.inner.deep {
                Some(std::mem::replace(&mut state.value, value.clone()))
            } else {
                None
            }
        };

        match old {
            Some(old) => self.invoke_callback(&value, &old),
            None => Ok(()),
        }
    }

    fn invoke_callback(&self, value: &Value, old: &Value) -> Result<()> {
        let Some(callback) = &self.inner.callback else {
            return Ok(());
        };
        let Some(scope) = self.scope() else {
            return Ok(());
        };

        match callback(&scope, value, old) {
            Ok(()) => Ok(()),
            Err(err) if self.inner.user => {
                config::handle_error(
                    &err,
                    Some(&scope),
                    &format!("callback for watcher \"{}\"", self.inner.expression),
                );
                Ok(())
            }
            Err(err) => Err(ReactiveError::callback(&self.inner.expression, err)),
        }
    }

    /// Run the `before` hook, if any. Failures are reported, not returned.
    pub(crate) fn run_before(&self) {
        let Some(before) = &self.inner.before else {
            return;
        };
        let Some(scope) = self.scope() else {
            return;
        };
        if let Err(err) = before(&scope) {
            config::handle_error(
                &err,
                Some(&scope),
                &format!("before hook for watcher \"{}\"", self.inner.expression),
            );
        }
    }

    /// Read the value of a lazy watcher, recomputing it if dirty.
    ///
    /// If another watcher is evaluating, it inherits all of this watcher's
    /// deps, so it is invalidated by whatever invalidates this one. On a
    /// watcher that is not lazy this only returns the cached value.
    pub fn pull(&self) -> Result<Value> {
        if !self.inner.lazy {
            return Ok(self.value());
        }
        if self.is_dirty() && self.is_active() {
            let value = self.evaluate()?;
            let mut state = self.inner.state.borrow_mut();
            state.value = value;
            state.dirty = false;
        }
        if ReactiveContext::is_active() {
            self.depend();
        }
        Ok(self.value())
    }

    /// Register every dep of this watcher with the evaluating watcher.
    pub fn depend(&self) {
        for dep in self.deps() {
            dep.depend();
        }
    }

    /// Stop watching. Idempotent.
    pub fn teardown(&self) {
        let deps: Vec<Dep> = {
            let mut state = self.inner.state.borrow_mut();
            if !state.active {
                return;
            }
            state.active = false;
            state.new_deps.clear();
            std::mem::take(&mut state.deps).into_values().collect()
        };

        if let Some(scope) = self.scope() {
            if !scope.is_being_destroyed() {
                scope.unregister(self.id());
            }
        }
        for dep in &deps {
            dep.remove_sub(self.id());
        }
        tracing::debug!(watcher = %self.id(), expression = %self.inner.expression, "teardown");
    }
}

impl Subscriber for WatcherInner {
    fn id(&self) -> WatcherId {
        self.id
    }

    fn update(&self) {
        if let Some(inner) = self.me.upgrade() {
            Watcher { inner }.update();
        }
    }
}

impl PartialEq for Watcher {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Watcher {}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.id())
            .field("expression", &self.inner.expression)
            .field("dirty", &self.is_dirty())
            .field("active", &self.is_active())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
