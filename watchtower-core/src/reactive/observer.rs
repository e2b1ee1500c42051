//! Making plain data reactive.
//!
//! [`observe`] instruments a record or list in place, eagerly and
//! recursively, and never replaces the handle the caller holds. Every
//! observed structure carries an [`Observer`] marker, so observing it again
//! is a no-op that returns the same marker.

use std::collections::HashSet;

use super::dep::Dep;
use super::list::List;
use super::value::Value;

/// Instrumentation handle attached to an observed record or list.
///
/// Its dep is the structure's own notification channel: key additions and
/// removals on records, every mutator call on lists.
#[derive(Clone, Debug)]
pub struct Observer {
    dep: Dep,
}

impl Observer {
    pub(crate) fn new() -> Self {
        Self { dep: Dep::new() }
    }

    pub fn dep(&self) -> &Dep {
        &self.dep
    }
}

/// Instrument `value` in place.
///
/// Returns `None` for primitives and for frozen structures, which silently
/// stay non-reactive.
pub fn observe(value: &Value) -> Option<Observer> {
    match value {
        Value::Record(record) => record.instrument(),
        Value::List(list) => list.instrument(),
        _ => None,
    }
}

/// Convert `value` and make it reactive, returning the same handle.
pub fn reactive(value: impl Into<Value>) -> Value {
    let value = value.into();
    observe(&value);
    value
}

/// Register the own dep of every observed structure inside `list`.
///
/// Index reads are not tracked, so a watcher reading a list through a
/// record key must also hear about mutations of the structures in it.
pub(crate) fn depend_array(list: &List) {
    let mut seen = HashSet::new();
    depend_array_inner(list, &mut seen);
}

fn depend_array_inner(list: &List, seen: &mut HashSet<usize>) {
    if !seen.insert(list.identity()) {
        return;
    }
    for item in list.to_vec() {
        if let Some(ob) = item.observer() {
            ob.dep().depend();
        }
        if let Value::List(inner) = &item {
            depend_array_inner(inner, seen);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Record;
    use serde_json::json;

    #[test]
    fn primitives_are_never_observed() {
        assert!(observe(&Value::from(1)).is_none());
        assert!(observe(&Value::from("x")).is_none());
        assert!(observe(&Value::Null).is_none());
    }

    #[test]
    fn observe_is_idempotent_and_in_place() {
        let value = Value::from_json(json!({"a": {"b": [1, {"c": 2}]}}));
        let first = observe(&value).unwrap();
        let second = observe(&value).unwrap();
        assert_eq!(first.dep(), second.dep());

        // Nested structures were instrumented eagerly.
        let a = value.as_record().unwrap().get_untracked("a");
        assert!(a.observer().is_some());
        let b = a.as_record().unwrap().get_untracked("b");
        assert!(b.observer().is_some());
        let c_holder = b.as_list().unwrap().get(1).unwrap();
        assert!(c_holder.observer().is_some());
        assert!(c_holder.as_record().unwrap().key_dep("c").is_some());
    }

    #[test]
    fn reactive_returns_same_handle() {
        let record = Record::new();
        let value = reactive(record.clone());
        assert!(value.as_record().unwrap().ptr_eq(&record));
        assert!(record.observer().is_some());
    }

    #[test]
    fn cyclic_graphs_terminate() {
        let record = Record::new();
        record.set("self", record.clone());
        assert!(observe(&Value::from(record.clone())).is_some());
        assert!(record.key_dep("self").is_some());
    }

    #[test]
    fn frozen_nested_structure_stays_plain() {
        let inner = Record::new();
        inner.freeze();
        let outer: Record = [("inner", inner.clone())].into_iter().collect();

        observe(&Value::from(outer.clone()));
        assert!(outer.observer().is_some());
        assert!(inner.observer().is_none());
    }
}
