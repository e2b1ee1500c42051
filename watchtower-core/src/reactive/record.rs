//! Keyed records.
//!
//! Property access on a record goes through explicit accessors instead of
//! ambient interception. Once the record is observed every key owns a
//! [`Dep`]: [`Record::get`] registers it with the evaluating watcher and
//! [`Record::set`] notifies it.
//!
//! A record also has its own dep (held by its [`Observer`]). It fires when
//! keys are added or removed, and it is registered whenever the record is
//! read through a parent's accessor, so structural changes reach whoever
//! holds the record.

use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::context::ReactiveContext;
use super::dep::Dep;
use super::observer::{depend_array, observe, Observer};
use super::value::Value;

struct Property {
    value: Value,
    /// Present once the owning record has been observed.
    dep: Option<Dep>,
}

struct RecordInner {
    props: RefCell<IndexMap<String, Property>>,
    observer: OnceCell<Observer>,
    frozen: Cell<bool>,
}

/// A shared keyed record, iterated in insertion order.
#[derive(Clone)]
pub struct Record {
    inner: Rc<RecordInner>,
}

impl Record {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RecordInner {
                props: RefCell::new(IndexMap::new()),
                observer: OnceCell::new(),
                frozen: Cell::new(false),
            }),
        }
    }

    pub fn ptr_eq(&self, other: &Record) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    /// Read a key, registering the dependency with the evaluating watcher.
    ///
    /// Besides the key's own dep this registers the dep of an observed
    /// nested structure, so in-place mutation of that structure is seen.
    /// Reading a missing key registers the record's dep instead, so adding
    /// the key later is seen too.
    pub fn get(&self, key: &str) -> Value {
        let slot = self
            .inner
            .props
            .borrow()
            .get(key)
            .map(|prop| (prop.value.clone(), prop.dep.clone()));

        match slot {
            Some((value, dep)) => {
                if let Some(dep) = dep {
                    if ReactiveContext::is_active() {
                        dep.depend();
                        if let Some(child) = value.observer() {
                            child.dep().depend();
                            if let Value::List(list) = &value {
                                depend_array(list);
                            }
                        }
                    }
                }
                value
            }
            None => {
                if let Some(ob) = self.observer() {
                    ob.dep().depend();
                }
                Value::Undefined
            }
        }
    }

    /// Read a key without registering anything.
    pub fn get_untracked(&self, key: &str) -> Value {
        self.inner
            .props
            .borrow()
            .get(key)
            .map(|prop| prop.value.clone())
            .unwrap_or_default()
    }

    /// Write a key.
    ///
    /// Writing a value that is the same as the current one does nothing.
    /// Otherwise the value is stored, observed if this record is observed,
    /// and the key's dep is notified. Writing a missing key defines it and
    /// notifies the record's own dep.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        if self.is_frozen() {
            tracing::debug!(key, "ignoring write to frozen record");
            return;
        }
        let value = value.into();

        let existing = self
            .inner
            .props
            .borrow()
            .get(key)
            .map(|prop| (prop.value.clone(), prop.dep.clone()));

        let Some((old, dep)) = existing else {
            self.define(key, value);
            return;
        };
        if old.same_value(&value) {
            return;
        }

        if let Some(prop) = self.inner.props.borrow_mut().get_mut(key) {
            prop.value = value.clone();
        }
        if let Some(dep) = dep {
            observe(&value);
            dep.notify();
        }
    }

    fn define(&self, key: &str, value: Value) {
        let ob = self.observer();
        let dep = ob.as_ref().map(|_| Dep::new());
        self.inner.props.borrow_mut().insert(
            key.to_string(),
            Property {
                value: value.clone(),
                dep,
            },
        );
        if let Some(ob) = ob {
            observe(&value);
            ob.dep().notify();
        }
    }

    /// Delete a key, notifying the record's own dep.
    pub fn remove(&self, key: &str) -> Option<Value> {
        if self.is_frozen() {
            tracing::debug!(key, "ignoring delete on frozen record");
            return None;
        }
        let removed = self.inner.props.borrow_mut().shift_remove(key)?;
        if let Some(ob) = self.observer() {
            ob.dep().notify();
        }
        Some(removed.value)
    }

    /// Whether `key` exists. Tracked on the record's own dep.
    pub fn has(&self, key: &str) -> bool {
        self.depend();
        self.inner.props.borrow().contains_key(key)
    }

    /// Keys in insertion order. Tracked on the record's own dep.
    pub fn keys(&self) -> Vec<String> {
        self.depend();
        self.keys_untracked()
    }

    pub fn len(&self) -> usize {
        self.depend();
        self.inner.props.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register the record's own dep with the evaluating watcher.
    pub fn depend(&self) {
        if let Some(ob) = self.observer() {
            ob.dep().depend();
        }
    }

    /// The dep of a single key, once observed.
    pub fn key_dep(&self, key: &str) -> Option<Dep> {
        self.inner.props.borrow().get(key).and_then(|prop| prop.dep.clone())
    }

    /// Make the record non-extensible: it will not be observed and writes
    /// to it are ignored.
    pub fn freeze(&self) {
        self.inner.frozen.set(true);
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.frozen.get()
    }

    pub fn observer(&self) -> Option<Observer> {
        self.inner.observer.get().cloned()
    }

    pub(crate) fn keys_untracked(&self) -> Vec<String> {
        self.inner.props.borrow().keys().cloned().collect()
    }

    pub(crate) fn entries_untracked(&self) -> Vec<(String, Value)> {
        self.inner
            .props
            .borrow()
            .iter()
            .map(|(k, prop)| (k.clone(), prop.value.clone()))
            .collect()
    }

    /// Instrument every key in place. Runs at most once per record.
    pub(crate) fn instrument(&self) -> Option<Observer> {
        if let Some(ob) = self.observer() {
            return Some(ob);
        }
        if self.is_frozen() {
            return None;
        }

        // Set the marker before recursing so cycles terminate.
        let ob = Observer::new();
        let _ = self.inner.observer.set(ob.clone());

        let children: Vec<Value> = {
            let mut props = self.inner.props.borrow_mut();
            props
                .values_mut()
                .map(|prop| {
                    prop.dep.get_or_insert_with(Dep::new);
                    prop.value.clone()
                })
                .collect()
        };
        for child in &children {
            observe(child);
        }

        Some(ob)
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let record = Record::new();
        {
            let mut props = record.inner.props.borrow_mut();
            for (k, v) in iter {
                props.insert(
                    k.into(),
                    Property {
                        value: v.into(),
                        dep: None,
                    },
                );
            }
        }
        record
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("keys", &self.keys_untracked())
            .field("observed", &self.observer().is_some())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_record_reads_and_writes() {
        let record: Record = [("a", 1)].into_iter().collect();
        assert_eq!(record.get("a"), Value::from(1));
        assert_eq!(record.get("missing"), Value::Undefined);
        assert!(record.key_dep("a").is_none());

        record.set("a", 2);
        record.set("b", "two");
        assert_eq!(record.get_untracked("a"), Value::from(2));
        assert_eq!(record.keys_untracked(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn instrument_creates_key_deps_once() {
        let record: Record = [("a", 1), ("b", 2)].into_iter().collect();

        let first = record.instrument().unwrap();
        let dep_a = record.key_dep("a").unwrap();
        let second = record.instrument().unwrap();

        assert_eq!(first.dep(), second.dep());
        assert_eq!(record.key_dep("a").unwrap(), dep_a);
        assert!(record.key_dep("b").is_some());
    }

    #[test]
    fn frozen_record_is_skipped_and_read_only() {
        let record: Record = [("a", 1)].into_iter().collect();
        record.freeze();

        assert!(record.instrument().is_none());
        record.set("a", 2);
        assert_eq!(record.get_untracked("a"), Value::from(1));
        assert!(record.remove("a").is_none());
    }

    #[test]
    fn defining_a_key_on_observed_record_makes_it_reactive() {
        let record = Record::new();
        record.instrument();

        record.set("late", Record::new());
        assert!(record.key_dep("late").is_some());
        assert!(record.get_untracked("late").observer().is_some());
    }

    #[test]
    fn remove_preserves_order() {
        let record: Record = [("a", 1), ("b", 2), ("c", 3)].into_iter().collect();
        assert_eq!(record.remove("b"), Some(Value::from(2)));
        assert_eq!(record.keys_untracked(), vec!["a".to_string(), "c".to_string()]);
    }
}
