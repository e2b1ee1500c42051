//! Subscriber types for the reactive system.
//!
//! A subscriber is anything a [`Dep`](super::Dep) can notify. In practice
//! that is a [`Watcher`](crate::watch::Watcher), but the seam is a trait so
//! the subject can be exercised on its own.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a subscriber.
///
/// Ids strictly increase with creation order. The scheduler flushes in
/// ascending id order, so a watcher declared before another runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatcherId(u64);

impl WatcherId {
    /// Generate the next subscriber id.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for WatcherId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something that wants to hear about changes to a reactive location.
pub trait Subscriber {
    fn id(&self) -> WatcherId;

    /// Invalidation entry point, called by a subject the subscriber read.
    fn update(&self);
}
