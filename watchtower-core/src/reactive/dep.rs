//! Dep Implementation
//!
//! A `Dep` is the fan-out notification point for one reactive location: a
//! single record key, or the identity of a whole record or list.
//!
//! # How Deps Work
//!
//! 1. When a location is read while a watcher is evaluating, its dep asks
//!    that watcher to record it ([`Dep::depend`]). The watcher decides
//!    whether to subscribe; the dep never deduplicates on its own.
//!
//! 2. When the location is written, [`Dep::notify`] calls `update()` on
//!    every subscriber, in subscription order.
//!
//! Subscribers are held weakly. A dropped watcher silently disappears from
//! the list the next time the dep notifies.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, WatcherId};
use crate::config;

/// Counter for generating unique dep ids.
static DEP_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

type SubscriberSlot = (WatcherId, Weak<dyn Subscriber>);

struct DepInner {
    id: u64,
    subs: RefCell<SmallVec<[SubscriberSlot; 4]>>,
}

/// A subject that watchers subscribe to.
///
/// Cloning a `Dep` yields another handle to the same subject.
#[derive(Clone)]
pub struct Dep {
    inner: Rc<DepInner>,
}

impl Dep {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(DepInner {
                id: DEP_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
                subs: RefCell::new(SmallVec::new()),
            }),
        }
    }

    /// Creation-ordered id.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Append a subscriber. The caller is responsible for not adding the
    /// same subscriber twice.
    ///
    /// Entries whose subscriber was dropped are pruned first, so a dep that
    /// is only ever written to from outside a notify does not grow.
    pub fn add_sub(&self, id: WatcherId, sub: Weak<dyn Subscriber>) {
        let mut subs = self.inner.subs.borrow_mut();
        subs.retain(|(_, existing)| existing.strong_count() > 0);
        subs.push((id, sub));
    }

    /// Remove one occurrence of the subscriber with `id`, if present.
    pub fn remove_sub(&self, id: WatcherId) {
        let mut subs = self.inner.subs.borrow_mut();
        if let Some(pos) = subs.iter().position(|(sub_id, _)| *sub_id == id) {
            subs.remove(pos);
        }
    }

    /// Register this dep with the watcher currently evaluating, if any.
    pub fn depend(&self) {
        if let Some(target) = ReactiveContext::current() {
            target.add_dep(self);
        }
    }

    /// Notify every subscriber that the location changed.
    ///
    /// The subscriber list is snapshotted first: running a watcher commonly
    /// subscribes or unsubscribes others, and that must not disturb the
    /// notification in flight.
    pub fn notify(&self) {
        let mut snapshot: Vec<Rc<dyn Subscriber>> = {
            let mut subs = self.inner.subs.borrow_mut();
            subs.retain(|(_, sub)| sub.strong_count() > 0);
            subs.iter().filter_map(|(_, sub)| sub.upgrade()).collect()
        };

        if !config::is_async() {
            // The scheduler does not sort when it flushes synchronously,
            // so sort here to keep parent-before-child order.
            snapshot.sort_by_key(|sub| sub.id());
        }

        tracing::trace!(dep = self.id(), subscribers = snapshot.len(), "notify");

        for sub in snapshot {
            sub.update();
        }
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subs.borrow().len()
    }

    /// Ids of the current subscribers, in subscription order.
    pub fn subscriber_ids(&self) -> Vec<WatcherId> {
        self.inner.subs.borrow().iter().map(|(id, _)| *id).collect()
    }

    pub fn has_subscriber(&self, id: WatcherId) -> bool {
        self.inner.subs.borrow().iter().any(|(sub_id, _)| *sub_id == id)
    }
}

impl Default for Dep {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Dep {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Dep {}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.id())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
