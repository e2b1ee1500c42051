//! Watcher configuration.

use std::fmt;
use std::rc::Rc;

use super::Scope;
use crate::error::Result;
use crate::reactive::Value;

/// A getter closure. Runs with the owning scope.
pub type GetterFn = Rc<dyn Fn(&Scope) -> Result<Value>>;

/// Completion callback, invoked with `(scope, new, old)`.
pub type Callback = Rc<dyn Fn(&Scope, &Value, &Value) -> Result<()>>;

/// A hook run before a scheduled re-run.
pub type Hook = Rc<dyn Fn(&Scope) -> Result<()>>;

/// What a watcher evaluates.
#[derive(Clone)]
pub enum Getter {
    /// A dot-delimited path resolved against the scope's data.
    Path(String),
    /// A closure, with a label used in diagnostics.
    Func { label: String, f: GetterFn },
}

impl Getter {
    pub fn path(path: impl Into<String>) -> Self {
        Getter::Path(path.into())
    }

    pub fn func<F>(label: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Scope) -> Result<Value> + 'static,
    {
        Getter::Func {
            label: label.into(),
            f: Rc::new(f),
        }
    }
}

impl From<&str> for Getter {
    fn from(path: &str) -> Self {
        Getter::Path(path.to_string())
    }
}

impl From<String> for Getter {
    fn from(path: String) -> Self {
        Getter::Path(path)
    }
}

impl fmt::Debug for Getter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Getter::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Getter::Func { label, .. } => f.debug_tuple("Func").field(label).finish(),
        }
    }
}

/// Flags controlling how a watcher evaluates and re-runs.
#[derive(Clone, Default)]
pub struct WatcherOptions {
    /// Touch everything reachable from the produced value.
    pub deep: bool,
    /// Errors are reported to the error sink instead of propagating.
    pub user: bool,
    /// Compute on demand and cache until invalidated.
    pub lazy: bool,
    /// Re-run immediately on invalidation, bypassing the scheduler.
    pub sync: bool,
    pub before: Option<Hook>,
}

impl fmt::Debug for WatcherOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherOptions")
            .field("deep", &self.deep)
            .field("user", &self.user)
            .field("lazy", &self.lazy)
            .field("sync", &self.sync)
            .field("before", &self.before.is_some())
            .finish()
    }
}

/// Options for [`Scope::watch`](super::Scope::watch).
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    pub deep: bool,
    /// Invoke the callback once right away with `(value, Undefined)`.
    pub immediate: bool,
    pub sync: bool,
}
