//! Property-based tests for dependency tracking.
//!
//! 1. After every evaluation a watcher is subscribed to a key's dep iff the
//!    evaluation read that key.
//! 2. Each dep lists the watcher at most once, however often it was read.
//! 3. A batch of writes fires a watcher's callback at most once per flush,
//!    and only if the value ended up different.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use proptest::prelude::*;
use watchtower_core::scheduler;
use watchtower_core::{Getter, Record, Scope, Value, Watcher, WatcherOptions};

const KEYS: usize = 8;

fn key(i: usize) -> String {
    format!("k{i}")
}

fn keyed_scope() -> (Scope, Record) {
    let record: Record = (0..KEYS).map(|i| (key(i), i as f64)).collect();
    let scope = Scope::new("prop", record.clone());
    (scope, record)
}

/// Watcher reading the keys listed in `plan`, in order, duplicates included.
fn planned_watcher(scope: &Scope, plan: &Rc<RefCell<Vec<usize>>>) -> Watcher {
    let plan = plan.clone();
    Watcher::new(
        scope,
        Getter::func("planned reads", move |scope| {
            let data = scope.data();
            let record = data.as_record().unwrap();
            let mut sum = 0.0;
            for i in plan.borrow().iter() {
                sum += record.get(&key(*i)).as_number().unwrap_or_default();
            }
            Ok(Value::from(sum))
        }),
        None,
        WatcherOptions::default(),
    )
    .unwrap()
}

fn arb_plan() -> impl Strategy<Value = Vec<usize>> {
    proptest::collection::vec(0..KEYS, 0..=12)
}

// ═════════════════════════════════════════════════════════════════════════
// 1 + 2. Subscriptions match the latest read set exactly
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn subscriptions_match_reads(plans in proptest::collection::vec(arb_plan(), 1..=6)) {
        let (scope, record) = keyed_scope();
        let plan = Rc::new(RefCell::new(plans[0].clone()));
        let watcher = planned_watcher(&scope, &plan);

        for (step, reads) in plans.iter().enumerate() {
            if step > 0 {
                *plan.borrow_mut() = reads.clone();
                watcher.run().unwrap();
            }

            let mut distinct = 0;
            for i in 0..KEYS {
                let dep = record.key_dep(&key(i)).unwrap();
                let read = reads.contains(&i);
                prop_assert_eq!(dep.has_subscriber(watcher.id()), read);
                let listed = dep
                    .subscriber_ids()
                    .into_iter()
                    .filter(|id| *id == watcher.id())
                    .count();
                prop_assert!(listed <= 1);
                distinct += usize::from(read);
            }
            prop_assert_eq!(watcher.dependency_count(), distinct);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. One flush, at most one re-run
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn writes_batch_into_one_run(
        reads in arb_plan(),
        writes in proptest::collection::vec((0..KEYS, -5i32..5), 1..=10),
    ) {
        let (scope, record) = keyed_scope();
        let plan = Rc::new(RefCell::new(reads.clone()));
        let watcher = planned_watcher(&scope, &plan);
        let before = watcher.value();

        let fired = Rc::new(Cell::new(0));
        let f = fired.clone();
        let p = plan.clone();
        let _observer = scope
            .watch(
                Getter::func("planned reads again", move |scope| {
                    let data = scope.data();
                    let record = data.as_record().unwrap();
                    let mut sum = 0.0;
                    for i in p.borrow().iter() {
                        sum += record.get(&key(*i)).as_number().unwrap_or_default();
                    }
                    Ok(Value::from(sum))
                }),
                move |_, _, _| {
                    f.set(f.get() + 1);
                    Ok(())
                },
                Default::default(),
            )
            .unwrap();

        for (i, v) in &writes {
            record.set(&key(*i), *v);
        }
        prop_assert!(scheduler::pending() <= 2);

        scheduler::run_until_idle();
        prop_assert_eq!(scheduler::pending(), 0);
        prop_assert!(fired.get() <= 1);

        let expected: f64 = reads
            .iter()
            .map(|i| record.get_untracked(&key(*i)).as_number().unwrap_or_default())
            .sum();
        prop_assert_eq!(watcher.value(), Value::from(expected));
        prop_assert_eq!(fired.get() == 1, !before.same_value(&watcher.value()));
    }
}
