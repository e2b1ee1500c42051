//! Update Scheduler
//!
//! The scheduler decides when invalidated watchers re-run. Invalidations
//! during one synchronous stretch are collected in a deduplicated queue
//! ([`queue`]) and flushed together on a deferred tick ([`tick`]).
//!
//! Under [`FlushMode::Sync`](crate::config::FlushMode::Sync) the queue is
//! flushed right inside the invalidation instead.

pub mod queue;
pub mod tick;

pub use queue::{flush, is_flushing, is_waiting, on_flushed, pending, queue_watcher};
pub use tick::{next_tick, run_pending, run_until_idle};
