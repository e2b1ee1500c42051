//! Computations
//!
//! A [`Watcher`] is the consumer side of the system: it runs a getter,
//! records which deps the getter read, and re-runs when any of them
//! changes. Watchers are owned by a [`Scope`], which also provides the
//! convenience constructors used by hosts: [`Scope::watch`],
//! [`Scope::computed`] and [`Scope::mount`].
//!
//! # Kinds of Watchers
//!
//! - **Render watcher**: created by `mount`, re-runs through the scheduler,
//!   errors propagate.
//! - **User watcher**: created by `watch`, calls back with `(new, old)`,
//!   errors are isolated.
//! - **Lazy watcher**: backs a [`Computed`], only marks itself dirty on
//!   invalidation and recomputes on the next read.

mod computed;
mod options;
mod scope;
mod watcher;

pub use computed::Computed;
pub use options::{Callback, Getter, GetterFn, Hook, WatchOptions, WatcherOptions};
pub use scope::Scope;
pub use watcher::Watcher;
