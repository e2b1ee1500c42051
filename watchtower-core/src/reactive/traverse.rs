//! Deep traversal.
//!
//! A deep watcher touches every reachable key and structure after its
//! getter runs, so a change anywhere under the produced value invalidates
//! it. The visited set is keyed by structure identity so cyclic graphs
//! terminate.

use std::collections::HashSet;

use super::value::Value;

/// Touch everything reachable from `value`, registering each dep with the
/// evaluating watcher.
pub fn traverse(value: &Value) {
    let mut seen = HashSet::new();
    walk(value, &mut seen);
}

fn walk(value: &Value, seen: &mut HashSet<usize>) {
    match value {
        Value::Record(record) => {
            if record.is_frozen() || !seen.insert(record.identity()) {
                return;
            }
            record.depend();
            for key in record.keys_untracked() {
                let child = record.get(&key);
                walk(&child, seen);
            }
        }
        Value::List(list) => {
            if list.is_frozen() || !seen.insert(list.identity()) {
                return;
            }
            list.depend();
            for item in list.to_vec() {
                walk(&item, seen);
            }
        }
        _ => {}
    }
}
