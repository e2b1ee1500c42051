//! Deferred Ticks
//!
//! `next_tick` queues a callback to run after the current synchronous work
//! finishes. All callbacks queued before the tick fires run together, in
//! queue order, so any number of invalidations during one synchronous
//! stretch lead to a single flush.
//!
//! # Drivers
//!
//! The first callback of a batch arms a tick through the configured
//! [`TickDriver`]:
//!
//! - `Manual`: nothing is scheduled. The host calls [`run_pending`] at the
//!   point where a microtask checkpoint would happen.
//! - `Tokio`: a task is spawned on the current `LocalSet` with
//!   `tokio::task::spawn_local`. Outside a `LocalSet` a warning is emitted
//!   and the batch is left for [`run_pending`], as with `Manual`.

use std::cell::RefCell;
use std::panic;

use crate::config::{self, TickDriver};
use crate::error::Result;

type TickCallback = Box<dyn FnOnce() -> Result<()>>;

#[derive(Default)]
struct TickState {
    callbacks: Vec<TickCallback>,
    pending: bool,
}

thread_local! {
    static TICK: RefCell<TickState> = RefCell::new(TickState::default());
}

/// Queue `callback` for the next tick.
pub fn next_tick<F>(callback: F)
where
    F: FnOnce() -> Result<()> + 'static,
{
    let arm = TICK.with(|tick| {
        let mut tick = tick.borrow_mut();
        tick.callbacks.push(Box::new(callback));
        !std::mem::replace(&mut tick.pending, true)
    });

    if arm {
        match config::current().tick_driver {
            TickDriver::Manual => {}
            TickDriver::Tokio => {
                if !spawn_tick_task() {
                    config::warn(
                        "tick driver is \"tokio\" but no tokio LocalSet is running; \
                         pending ticks must be drained with run_pending()",
                        None,
                    );
                }
            }
        }
    }
}

/// Spawn a task draining the pending callbacks onto the current `LocalSet`.
///
/// Returns false when there is no `LocalSet` to spawn onto. The callbacks
/// then stay queued for a manual drain.
fn spawn_tick_task() -> bool {
    if tokio::runtime::Handle::try_current().is_err() {
        return false;
    }
    // Inside a runtime, `spawn_local` still panics outside a `LocalSet`.
    panic::catch_unwind(|| {
        tokio::task::spawn_local(async {
            run_pending();
        });
    })
    .is_ok()
}

/// Run the callbacks queued so far. Returns how many ran.
///
/// Callbacks queued while these run form the next batch. Errors are
/// reported to the error sink and do not stop the remaining callbacks.
pub fn run_pending() -> usize {
    let batch = TICK.with(|tick| {
        let mut tick = tick.borrow_mut();
        tick.pending = false;
        std::mem::take(&mut tick.callbacks)
    });

    let count = batch.len();
    for callback in batch {
        if let Err(err) = callback() {
            config::handle_error(&err, None, "nextTick");
        }
    }
    count
}

/// Run ticks until no callback is queued. Returns how many ran in total.
pub fn run_until_idle() -> usize {
    let mut total = 0;
    while has_pending() {
        total += run_pending();
    }
    total
}

/// Check if a tick is armed.
pub fn has_pending() -> bool {
    TICK.with(|tick| tick.borrow().pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::error::ReactiveError;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn callbacks_run_in_order_on_tick() {
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let l = log.clone();
            next_tick(move || {
                l.borrow_mut().push(i);
                Ok(())
            });
        }

        assert!(has_pending());
        assert!(log.borrow().is_empty());

        assert_eq!(run_pending(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert!(!has_pending());
    }

    #[test]
    fn nested_callbacks_form_next_batch() {
        let ran = Rc::new(Cell::new(0));
        let r = ran.clone();
        next_tick(move || {
            let r2 = r.clone();
            r.set(r.get() + 1);
            next_tick(move || {
                r2.set(r2.get() + 1);
                Ok(())
            });
            Ok(())
        });

        assert_eq!(run_pending(), 1);
        assert_eq!(ran.get(), 1);
        assert!(has_pending());
        assert_eq!(run_until_idle(), 1);
        assert_eq!(ran.get(), 2);
    }

    #[test]
    fn errors_reach_the_sink() {
        let infos = Rc::new(RefCell::new(Vec::new()));
        let i = infos.clone();
        config::set_error_handler(move |err, _, info| {
            i.borrow_mut().push(format!("{info}: {err}"));
        });

        let after = Rc::new(Cell::new(false));
        let a = after.clone();
        next_tick(|| Err(ReactiveError::user("tick failed")));
        next_tick(move || {
            a.set(true);
            Ok(())
        });

        run_pending();
        assert_eq!(*infos.borrow(), vec!["nextTick: tick failed".to_string()]);
        assert!(after.get());
        config::clear_handlers();
    }

    #[test]
    fn tokio_driver_runs_on_local_set() {
        config::configure(RuntimeConfig {
            tick_driver: TickDriver::Tokio,
            ..RuntimeConfig::default()
        });

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let local = tokio::task::LocalSet::new();

        let ran = Rc::new(Cell::new(false));
        let r = ran.clone();
        local.block_on(&runtime, async move {
            next_tick(move || {
                r.set(true);
                Ok(())
            });
            assert!(has_pending());
            tokio::task::yield_now().await;
        });
        // Drain anything the single yield did not reach.
        runtime.block_on(local);

        assert!(ran.get());
        assert!(!has_pending());
    }

    #[test]
    fn tokio_driver_without_local_set_falls_back() {
        config::configure(RuntimeConfig {
            tick_driver: TickDriver::Tokio,
            ..RuntimeConfig::default()
        });
        let warnings = Rc::new(RefCell::new(Vec::new()));
        let w = warnings.clone();
        config::set_warn_handler(move |msg, _| w.borrow_mut().push(msg.to_string()));

        let ran = Rc::new(Cell::new(0));
        let r = ran.clone();
        next_tick(move || {
            r.set(r.get() + 1);
            Ok(())
        });
        assert_eq!(warnings.borrow().len(), 1);
        assert!(warnings.borrow()[0].contains("LocalSet"));
        assert!(has_pending());

        // Inside a runtime but outside a LocalSet.
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let r = ran.clone();
        runtime.block_on(async move {
            run_pending();
            next_tick(move || {
                r.set(r.get() + 1);
                Ok(())
            });
        });
        assert_eq!(warnings.borrow().len(), 2);

        assert_eq!(run_until_idle(), 1);
        assert_eq!(ran.get(), 2);
        config::clear_handlers();
    }
}
