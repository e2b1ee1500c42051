//! Scopes own watchers.
//!
//! A scope is the component-like owner that a watcher's getter runs
//! against. It holds the observed data, a registry of every watcher created
//! for it, and at most one render watcher. Destroying the scope tears all of
//! them down.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::computed::Computed;
use super::options::{Getter, Hook, WatchOptions, WatcherOptions};
use super::watcher::Watcher;
use crate::config;
use crate::error::Result;
use crate::reactive::{observe, untracked, Value, WatcherId};

struct ScopeInner {
    name: String,
    data: Value,
    watchers: RefCell<Vec<Watcher>>,
    render_watcher: RefCell<Option<Watcher>>,
    being_destroyed: Cell<bool>,
    destroyed: Cell<bool>,
}

#[derive(Clone)]
pub struct Scope {
    inner: Rc<ScopeInner>,
}

/// Non-owning handle held by watchers, so a scope and its watchers do not
/// keep each other alive.
#[derive(Clone)]
pub(crate) struct WeakScope(Weak<ScopeInner>);

impl WeakScope {
    pub(crate) fn upgrade(&self) -> Option<Scope> {
        self.0.upgrade().map(|inner| Scope { inner })
    }
}

impl Scope {
    /// Create a scope over `data`, observing it.
    pub fn new(name: impl Into<String>, data: impl Into<Value>) -> Self {
        let data = data.into();
        observe(&data);
        Self {
            inner: Rc::new(ScopeInner {
                name: name.into(),
                data,
                watchers: RefCell::new(Vec::new()),
                render_watcher: RefCell::new(None),
                being_destroyed: Cell::new(false),
                destroyed: Cell::new(false),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The scope's (observed) data. Path getters resolve against it.
    pub fn data(&self) -> Value {
        self.inner.data.clone()
    }

    pub(crate) fn downgrade(&self) -> WeakScope {
        WeakScope(Rc::downgrade(&self.inner))
    }

    pub(crate) fn register(&self, watcher: &Watcher) {
        self.inner.watchers.borrow_mut().push(watcher.clone());
    }

    pub(crate) fn unregister(&self, id: WatcherId) {
        self.inner.watchers.borrow_mut().retain(|w| w.id() != id);
        let mut render = self.inner.render_watcher.borrow_mut();
        if render.as_ref().is_some_and(|w| w.id() == id) {
            *render = None;
        }
    }

    /// Every live watcher owned by this scope, in creation order.
    pub fn watchers(&self) -> Vec<Watcher> {
        self.inner.watchers.borrow().clone()
    }

    /// Watch a path or getter and call `callback(scope, new, old)` when it
    /// changes.
    ///
    /// The watcher is a `user` watcher: errors in its getter or callback are
    /// reported to the error sink and do not propagate.
    pub fn watch<G, F>(&self, getter: G, callback: F, options: WatchOptions) -> Result<Watcher>
    where
        G: Into<Getter>,
        F: Fn(&Scope, &Value, &Value) -> Result<()> + 'static,
    {
        let callback = Watcher::callback(callback);
        let watcher = Watcher::new(
            self,
            getter.into(),
            Some(callback.clone()),
            WatcherOptions {
                deep: options.deep,
                user: true,
                lazy: false,
                sync: options.sync,
                before: None,
            },
        )?;

        if options.immediate {
            let value = watcher.value();
            let outcome = untracked(|| callback(self, &value, &Value::Undefined));
            if let Err(err) = outcome {
                config::handle_error(
                    &err,
                    Some(self),
                    &format!("callback for immediate watcher \"{}\"", watcher.expression()),
                );
            }
        }
        Ok(watcher)
    }

    /// Define a lazily computed value.
    pub fn computed<F>(&self, label: impl Into<String>, f: F) -> Computed
    where
        F: Fn(&Scope) -> Result<Value> + 'static,
    {
        Computed::new(self, label, f)
    }

    /// Create the render watcher.
    ///
    /// Its getter runs `render` and hands the result to `patch`. `before`
    /// runs ahead of every scheduled re-render. Render errors propagate.
    pub fn mount<R, P>(&self, render: R, patch: P, before: Option<Hook>) -> Result<Watcher>
    where
        R: Fn(&Scope) -> Result<Value> + 'static,
        P: Fn(&Scope, &Value) -> Result<()> + 'static,
    {
        let getter = Getter::func(format!("render {}", self.name()), move |scope| {
            let vnode = render(scope)?;
            patch(scope, &vnode)?;
            Ok(Value::Undefined)
        });
        let watcher = Watcher::new(
            self,
            getter,
            None,
            WatcherOptions {
                before,
                ..WatcherOptions::default()
            },
        )?;
        *self.inner.render_watcher.borrow_mut() = Some(watcher.clone());
        tracing::debug!(scope = %self.name(), watcher = %watcher.id(), "mounted");
        Ok(watcher)
    }

    pub fn render_watcher(&self) -> Option<Watcher> {
        self.inner.render_watcher.borrow().clone()
    }

    /// Tear down every watcher. Idempotent.
    pub fn destroy(&self) {
        if self.inner.being_destroyed.replace(true) {
            return;
        }
        let watchers = std::mem::take(&mut *self.inner.watchers.borrow_mut());
        self.inner.render_watcher.borrow_mut().take();
        for watcher in &watchers {
            watcher.teardown();
        }
        self.inner.destroyed.set(true);
        tracing::debug!(scope = %self.name(), watchers = watchers.len(), "destroyed");
    }

    pub fn is_being_destroyed(&self) -> bool {
        self.inner.being_destroyed.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.inner.name)
            .field("watchers", &self.inner.watchers.borrow().len())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
