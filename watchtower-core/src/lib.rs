//! Watchtower Core
//!
//! This crate provides a fine-grained reactive runtime. It implements:
//!
//! - Dependency tracking on observed data (records and lists)
//! - Watchers that re-run when the data they read changes
//! - Lazily computed values
//! - A batched scheduler that re-runs each invalidated watcher once per tick
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: values, deps, the evaluation stack and the observer
//! - `watch`: watchers, computed values and the scopes that own them
//! - `scheduler`: the watcher queue and the deferred tick
//! - `config`: per-thread runtime configuration and the error sinks
//!
//! The runtime is single-threaded. Every thread has its own evaluation
//! stack, queue and configuration.
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use watchtower_core::scheduler;
//! use watchtower_core::{Scope, Value, WatchOptions};
//!
//! let scope = Scope::new("counter", Value::from_json(serde_json::json!({"count": 1})));
//! let data = scope.data();
//! let record = data.as_record().unwrap();
//!
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let sink = log.clone();
//! scope
//!     .watch(
//!         "count",
//!         move |_, new, old| {
//!             sink.borrow_mut().push((new.clone(), old.clone()));
//!             Ok(())
//!         },
//!         WatchOptions::default(),
//!     )
//!     .unwrap();
//!
//! record.set("count", 5);
//! record.set("count", 6);
//! scheduler::run_pending();
//!
//! // Two writes, one re-run.
//! assert_eq!(*log.borrow(), vec![(Value::from(6), Value::from(1))]);
//! ```

pub mod config;
pub mod error;
pub mod reactive;
pub mod scheduler;
pub mod watch;

pub use config::{FlushMode, RuntimeConfig, TickDriver};
pub use error::{ReactiveError, Result};
pub use reactive::{observe, reactive, traverse, untracked, Dep, List, Record, Value, WatcherId};
pub use watch::{Computed, Getter, Scope, WatchOptions, Watcher, WatcherOptions};
