//! Runtime Configuration
//!
//! Configuration is per thread, matching the rest of the runtime state: the
//! evaluation stack and the scheduler queue are thread-local too, so every
//! thread is an independent reactive world.
//!
//! The serializable part lives in [`RuntimeConfig`]. The error and warning
//! sinks are closures and are installed separately.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{ReactiveError, Result};
use crate::watch::Scope;

/// Default number of re-runs of one watcher within one flush before the
/// scheduler treats it as an infinite update loop.
pub const MAX_UPDATE_COUNT: usize = 100;

/// When queued watchers are flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushMode {
    /// Batch invalidations and flush them on the next tick.
    #[default]
    Async,
    /// Flush inside `enqueue`, and sort notifications by watcher id.
    Sync,
}

/// How a pending tick gets run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickDriver {
    /// The host drains ticks with [`crate::scheduler::tick::run_pending`].
    #[default]
    Manual,
    /// Ticks are spawned onto the current tokio `LocalSet`.
    Tokio,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub flush_mode: FlushMode,
    pub tick_driver: TickDriver,
    pub max_update_count: usize,
    /// Suppress the default warning log output.
    pub silent: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            flush_mode: FlushMode::Async,
            tick_driver: TickDriver::Manual,
            max_update_count: MAX_UPDATE_COUNT,
            silent: false,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Sink for isolated failures: `(error, owning scope, info)`.
pub type ErrorHandler = Rc<dyn Fn(&ReactiveError, Option<&Scope>, &str)>;

/// Sink for diagnostics such as runaway update loops.
pub type WarnHandler = Rc<dyn Fn(&str, Option<&Scope>)>;

thread_local! {
    static CONFIG: RefCell<RuntimeConfig> = RefCell::new(RuntimeConfig::default());
    static ERROR_HANDLER: RefCell<Option<ErrorHandler>> = const { RefCell::new(None) };
    static WARN_HANDLER: RefCell<Option<WarnHandler>> = const { RefCell::new(None) };
}

/// Install a configuration for the current thread.
pub fn configure(config: RuntimeConfig) {
    CONFIG.with(|c| *c.borrow_mut() = config);
}

/// The configuration in effect on the current thread.
pub fn current() -> RuntimeConfig {
    CONFIG.with(|c| c.borrow().clone())
}

pub(crate) fn is_async() -> bool {
    CONFIG.with(|c| c.borrow().flush_mode == FlushMode::Async)
}

pub fn set_error_handler<F>(handler: F)
where
    F: Fn(&ReactiveError, Option<&Scope>, &str) + 'static,
{
    ERROR_HANDLER.with(|h| *h.borrow_mut() = Some(Rc::new(handler)));
}

pub fn set_warn_handler<F>(handler: F)
where
    F: Fn(&str, Option<&Scope>) + 'static,
{
    WARN_HANDLER.with(|h| *h.borrow_mut() = Some(Rc::new(handler)));
}

/// Remove any installed sinks, restoring the logging defaults.
pub fn clear_handlers() {
    ERROR_HANDLER.with(|h| h.borrow_mut().take());
    WARN_HANDLER.with(|h| h.borrow_mut().take());
}

/// Report an isolated failure.
///
/// The handler is cloned out of the slot before it is called, so a handler
/// may itself install a different handler.
pub fn handle_error(err: &ReactiveError, scope: Option<&Scope>, info: &str) {
    let handler = ERROR_HANDLER.with(|h| h.borrow().clone());
    match handler {
        Some(handler) => handler(err, scope, info),
        None => tracing::error!(
            scope = scope.map(|s| s.name()).unwrap_or("<root>"),
            "error in {info}: {err}"
        ),
    }
}

/// Report a diagnostic.
pub fn warn(message: &str, scope: Option<&Scope>) {
    let handler = WARN_HANDLER.with(|h| h.borrow().clone());
    match handler {
        Some(handler) => handler(message, scope),
        None => {
            if !CONFIG.with(|c| c.borrow().silent) {
                tracing::warn!(
                    scope = scope.map(|s| s.name()).unwrap_or("<root>"),
                    "{message}"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.flush_mode, FlushMode::Async);
        assert_eq!(config.tick_driver, TickDriver::Manual);
        assert_eq!(config.max_update_count, 100);
        assert!(!config.silent);
    }

    #[test]
    fn parses_partial_json() {
        let config = RuntimeConfig::from_json(r#"{"flush_mode": "sync", "max_update_count": 5}"#)
            .unwrap();
        assert_eq!(config.flush_mode, FlushMode::Sync);
        assert_eq!(config.max_update_count, 5);
        assert_eq!(config.tick_driver, TickDriver::Manual);
    }

    #[test]
    fn rejects_bad_json() {
        let err = RuntimeConfig::from_json(r#"{"flush_mode": "eventually"}"#).unwrap_err();
        assert!(matches!(err, ReactiveError::Config(_)));
    }

    #[test]
    fn configure_is_per_thread() {
        configure(RuntimeConfig {
            flush_mode: FlushMode::Sync,
            ..RuntimeConfig::default()
        });
        assert!(!is_async());

        let other = std::thread::spawn(is_async).join().unwrap();
        assert!(other);
    }

    #[test]
    fn handlers_receive_reports() {
        let errors = Rc::new(Cell::new(0));
        let warnings = Rc::new(Cell::new(0));

        let e = errors.clone();
        set_error_handler(move |_, _, info| {
            assert_eq!(info, "nextTick");
            e.set(e.get() + 1);
        });
        let w = warnings.clone();
        set_warn_handler(move |msg, _| {
            assert_eq!(msg, "careful");
            w.set(w.get() + 1);
        });

        handle_error(&ReactiveError::user("boom"), None, "nextTick");
        warn("careful", None);
        assert_eq!(errors.get(), 1);
        assert_eq!(warnings.get(), 1);

        clear_handlers();
        handle_error(&ReactiveError::user("boom"), None, "nextTick");
        assert_eq!(errors.get(), 1);
    }
}
