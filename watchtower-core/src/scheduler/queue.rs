//! Watcher Queue
//!
//! Invalidated watchers are collected here and re-run together on the next
//! tick.
//!
//! # Algorithm
//!
//! 1. `queue_watcher` adds a watcher unless its id is already queued, and
//!    arms a flush on the first addition.
//! 2. The flush sorts the queue by ascending watcher id. Watchers are
//!    created parent before child, so a parent re-runs (and possibly tears
//!    children down) before its children.
//! 3. Each watcher runs its `before` hook, then `run()`.
//! 4. A watcher queued while the flush is in progress is spliced into the
//!    unprocessed part of the queue at its id position when its id is
//!    greater than the running watcher's id. Otherwise it goes to the end.
//! 5. A watcher re-queued more than `max_update_count` times in one flush
//!    is skipped from then on and reported once as an infinite update loop.
//!
//! After the flush the queue resets and the `on_flushed` observers run.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use super::tick;
use crate::config;
use crate::error::{ReactiveError, Result};
use crate::reactive::WatcherId;
use crate::watch::Watcher;

#[derive(Default)]
struct QueueState {
    queue: Vec<Watcher>,
    has: HashSet<WatcherId>,
    circular: HashMap<WatcherId, usize>,
    reported: HashSet<WatcherId>,
    waiting: bool,
    flushing: bool,
    index: usize,
    flushed_observers: Vec<Box<dyn FnOnce()>>,
}

impl QueueState {
    fn reset(&mut self) {
        self.queue.clear();
        self.has.clear();
        self.circular.clear();
        self.reported.clear();
        self.waiting = false;
        self.flushing = false;
        self.index = 0;
    }

    /// Position for a watcher queued mid-flush.
    fn splice_position(&self, id: WatcherId) -> usize {
        let running = self.queue.get(self.index).map(|w| w.id());
        match running {
            Some(running) if id > running => {
                let mut i = self.queue.len();
                while i > self.index + 1 && self.queue[i - 1].id() > id {
                    i -= 1;
                }
                i
            }
            _ => self.queue.len(),
        }
    }
}

thread_local! {
    static QUEUE: RefCell<QueueState> = RefCell::new(QueueState::default());
}

/// Queue `watcher` for the next flush. Duplicates are ignored.
pub fn queue_watcher(watcher: Watcher) {
    let id = watcher.id();
    let arm = QUEUE.with(|q| {
        let mut q = q.borrow_mut();
        if !q.has.insert(id) {
            return false;
        }
        if q.flushing {
            let at = q.splice_position(id);
            q.queue.insert(at, watcher);
            tracing::trace!(watcher = %id, at, "queued during flush");
        } else {
            q.queue.push(watcher);
            tracing::trace!(watcher = %id, "queued");
        }
        !std::mem::replace(&mut q.waiting, true)
    });

    if !arm {
        return;
    }
    if config::is_async() {
        tick::next_tick(flush);
    } else if let Err(err) = flush() {
        config::handle_error(&err, None, "flush");
    }
}

enum Step {
    Run(Watcher),
    Skip,
    Runaway(Watcher),
    Done,
}

fn next_step(max_updates: usize) -> Step {
    QUEUE.with(|q| {
        let mut q = q.borrow_mut();
        let Some(watcher) = q.queue.get(q.index).cloned() else {
            return Step::Done;
        };
        let id = watcher.id();
        q.has.remove(&id);

        // The first dequeue is the scheduled run; every later one is a
        // re-queue caused by the watcher's own flush.
        let dequeued = q.circular.entry(id).or_insert(0);
        *dequeued += 1;
        if *dequeued - 1 > max_updates {
            if q.reported.insert(id) {
                Step::Runaway(watcher)
            } else {
                Step::Skip
            }
        } else {
            Step::Run(watcher)
        }
    })
}

/// Run every queued watcher.
///
/// Calling `flush` while a flush is running does nothing. A failing run of
/// a watcher that is not a `user` watcher aborts the flush: the queue is
/// reset and the error returned.
pub fn flush() -> Result<()> {
    let max_updates = config::current().max_update_count;
    let started = QUEUE.with(|q| {
        let mut q = q.borrow_mut();
        if q.flushing {
            return false;
        }
        q.flushing = true;
        q.index = 0;
        q.queue.sort_by_key(|w| w.id());
        tracing::trace!(queued = q.queue.len(), "flush");
        true
    });
    if !started {
        return Ok(());
    }

    let outcome = run_queue(max_updates);

    let observers = QUEUE.with(|q| {
        let mut q = q.borrow_mut();
        q.reset();
        if outcome.is_ok() {
            std::mem::take(&mut q.flushed_observers)
        } else {
            Vec::new()
        }
    });
    for observer in observers {
        observer();
    }
    outcome
}

fn run_queue(max_updates: usize) -> Result<()> {
    loop {
        match next_step(max_updates) {
            Step::Done => return Ok(()),
            Step::Skip => {}
            Step::Runaway(watcher) => {
                let err = ReactiveError::InfiniteLoop {
                    id: watcher.id(),
                    expression: watcher.expression().to_string(),
                };
                tracing::debug!(%err, "skipping watcher");
                let scope = watcher.scope();
                config::warn(
                    &format!(
                        "You may have an infinite update loop in watcher with expression \"{}\"",
                        watcher.expression()
                    ),
                    scope.as_ref(),
                );
            }
            Step::Run(watcher) => {
                if watcher.is_active() {
                    watcher.run_before();
                    watcher.run()?;
                }
            }
        }
        QUEUE.with(|q| q.borrow_mut().index += 1);
    }
}

/// Run `observer` once the current flush completes, or on the next tick if
/// nothing is queued.
pub fn on_flushed<F>(observer: F)
where
    F: FnOnce() + 'static,
{
    let deferred = QUEUE.with(|q| {
        let mut q = q.borrow_mut();
        if q.waiting || q.flushing {
            q.flushed_observers.push(Box::new(observer));
            None
        } else {
            Some(observer)
        }
    });
    if let Some(observer) = deferred {
        tick::next_tick(move || {
            observer();
            Ok(())
        });
    }
}

/// Number of queued watchers that have not run yet.
pub fn pending() -> usize {
    QUEUE.with(|q| q.borrow().has.len())
}

pub fn is_flushing() -> bool {
    QUEUE.with(|q| q.borrow().flushing)
}

/// Check if a flush is armed or running.
pub fn is_waiting() -> bool {
    QUEUE.with(|q| q.borrow().waiting)
}
