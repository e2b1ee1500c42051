//! Computed values: lazy watchers with a read accessor.

use std::fmt;

use super::options::{Getter, WatcherOptions};
use super::scope::Scope;
use super::watcher::Watcher;
use crate::error::Result;
use crate::reactive::Value;

/// A cached derived value.
///
/// The getter runs on the first [`get`](Computed::get) and again only after
/// one of its deps changed. A watcher reading a computed value depends on
/// everything the computed value depends on.
#[derive(Clone)]
pub struct Computed {
    watcher: Watcher,
}

impl Computed {
    pub fn new<F>(scope: &Scope, label: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Scope) -> Result<Value> + 'static,
    {
        let watcher = Watcher::build(
            scope,
            Getter::func(label, f),
            None,
            WatcherOptions {
                lazy: true,
                ..WatcherOptions::default()
            },
        );
        Self { watcher }
    }

    pub fn get(&self) -> Result<Value> {
        self.watcher.pull()
    }

    pub fn is_dirty(&self) -> bool {
        self.watcher.is_dirty()
    }

    pub fn watcher(&self) -> &Watcher {
        &self.watcher
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Computed").field(&self.watcher).finish()
    }
}
