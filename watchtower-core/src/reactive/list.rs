//! Ordered lists.
//!
//! Lists are not instrumented per index. A list has a single dep, held by
//! its [`Observer`], and the seven mutators below are the only operations
//! that notify it. Reads by index or by snapshot are untracked; a watcher
//! depends on a list through the record key that holds it, through
//! [`List::depend`], or through a deep traversal.

use std::cell::{Cell, OnceCell, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use super::observer::{observe, Observer};
use super::value::Value;

struct ListInner {
    items: RefCell<Vec<Value>>,
    observer: OnceCell<Observer>,
    frozen: Cell<bool>,
}

/// A shared ordered collection.
#[derive(Clone)]
pub struct List {
    inner: Rc<ListInner>,
}

impl List {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ListInner {
                items: RefCell::new(Vec::new()),
                observer: OnceCell::new(),
                frozen: Cell::new(false),
            }),
        }
    }

    pub fn ptr_eq(&self, other: &List) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner.items.borrow().get(index).cloned()
    }

    /// Snapshot of the current items.
    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.items.borrow().clone()
    }

    /// Register the list's dep with the evaluating watcher.
    pub fn depend(&self) {
        if let Some(ob) = self.observer() {
            ob.dep().depend();
        }
    }

    /// Append one item. Returns the new length.
    pub fn push(&self, item: impl Into<Value>) -> usize {
        if self.rejects_write("push") {
            return self.len();
        }
        let item = item.into();
        let len = {
            let mut items = self.inner.items.borrow_mut();
            items.push(item.clone());
            items.len()
        };
        self.mutated(&[item]);
        len
    }

    /// Remove the last item.
    pub fn pop(&self) -> Option<Value> {
        if self.rejects_write("pop") {
            return None;
        }
        let removed = self.inner.items.borrow_mut().pop();
        self.mutated(&[]);
        removed
    }

    /// Remove the first item.
    pub fn shift(&self) -> Option<Value> {
        if self.rejects_write("shift") {
            return None;
        }
        let removed = {
            let mut items = self.inner.items.borrow_mut();
            if items.is_empty() {
                None
            } else {
                Some(items.remove(0))
            }
        };
        self.mutated(&[]);
        removed
    }

    /// Prepend one item. Returns the new length.
    pub fn unshift(&self, item: impl Into<Value>) -> usize {
        if self.rejects_write("unshift") {
            return self.len();
        }
        let item = item.into();
        let len = {
            let mut items = self.inner.items.borrow_mut();
            items.insert(0, item.clone());
            items.len()
        };
        self.mutated(&[item]);
        len
    }

    /// Remove `delete_count` items starting at `start` and insert `items`
    /// in their place. Out-of-range arguments are clamped. Returns the
    /// removed items.
    pub fn splice(&self, start: usize, delete_count: usize, items: Vec<Value>) -> Vec<Value> {
        if self.rejects_write("splice") {
            return Vec::new();
        }
        let removed = {
            let mut current = self.inner.items.borrow_mut();
            let start = start.min(current.len());
            let end = start + delete_count.min(current.len() - start);
            current.splice(start..end, items.iter().cloned()).collect()
        };
        self.mutated(&items);
        removed
    }

    /// Sort in place.
    ///
    /// The comparator runs on a detached copy, so it may read the list.
    pub fn sort_by<F>(&self, compare: F)
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        if self.rejects_write("sort") {
            return;
        }
        let mut items = self.to_vec();
        items.sort_by(compare);
        *self.inner.items.borrow_mut() = items;
        self.mutated(&[]);
    }

    /// Reverse in place.
    pub fn reverse(&self) {
        if self.rejects_write("reverse") {
            return;
        }
        self.inner.items.borrow_mut().reverse();
        self.mutated(&[]);
    }

    /// Make the list non-extensible: it will not be observed and mutators
    /// leave it untouched.
    pub fn freeze(&self) {
        self.inner.frozen.set(true);
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.frozen.get()
    }

    pub fn observer(&self) -> Option<Observer> {
        self.inner.observer.get().cloned()
    }

    fn rejects_write(&self, op: &'static str) -> bool {
        let frozen = self.is_frozen();
        if frozen {
            tracing::debug!(op, "ignoring mutation of frozen list");
        }
        frozen
    }

    /// Observe newly inserted items, then notify the list's dep once.
    fn mutated(&self, inserted: &[Value]) {
        let Some(ob) = self.observer() else {
            return;
        };
        for item in inserted {
            observe(item);
        }
        ob.dep().notify();
    }

    /// Instrument the list and its items. Runs at most once per list.
    pub(crate) fn instrument(&self) -> Option<Observer> {
        if let Some(ob) = self.observer() {
            return Some(ob);
        }
        if self.is_frozen() {
            return None;
        }

        let ob = Observer::new();
        let _ = self.inner.observer.set(ob.clone());
        for item in self.to_vec() {
            observe(&item);
        }
        Some(ob)
    }
}

impl Default for List {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Into<Value>> FromIterator<V> for List {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        let list = List::new();
        list.inner
            .items
            .borrow_mut()
            .extend(iter.into_iter().map(Into::into));
        list
    }
}

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("List")
            .field("len", &self.len())
            .field("observed", &self.observer().is_some())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(list: &List) -> Vec<f64> {
        list.to_vec().iter().filter_map(Value::as_number).collect()
    }

    #[test]
    fn mutators_return_js_results() {
        let list: List = [1, 2, 3].into_iter().collect();

        assert_eq!(list.push(4), 4);
        assert_eq!(list.pop(), Some(Value::from(4)));
        assert_eq!(list.shift(), Some(Value::from(1)));
        assert_eq!(list.unshift(0), 3);
        assert_eq!(numbers(&list), vec![0.0, 2.0, 3.0]);

        let removed = list.splice(1, 1, vec![Value::from(7), Value::from(8)]);
        assert_eq!(removed, vec![Value::from(2)]);
        assert_eq!(numbers(&list), vec![0.0, 7.0, 8.0, 3.0]);

        list.reverse();
        assert_eq!(numbers(&list), vec![3.0, 8.0, 7.0, 0.0]);

        list.sort_by(|a, b| {
            a.as_number()
                .unwrap_or_default()
                .total_cmp(&b.as_number().unwrap_or_default())
        });
        assert_eq!(numbers(&list), vec![0.0, 3.0, 7.0, 8.0]);
    }

    #[test]
    fn splice_clamps_out_of_range_arguments() {
        let list: List = [1, 2].into_iter().collect();
        assert!(list.splice(10, 5, vec![Value::from(3)]).is_empty());
        assert_eq!(numbers(&list), vec![1.0, 2.0, 3.0]);

        let removed = list.splice(1, 100, Vec::new());
        assert_eq!(removed.len(), 2);
        assert_eq!(numbers(&list), vec![1.0]);
    }

    #[test]
    fn empty_list_edges() {
        let list = List::new();
        assert_eq!(list.pop(), None);
        assert_eq!(list.shift(), None);
        assert!(list.is_empty());
    }

    #[test]
    fn inserted_items_are_observed_when_list_is() {
        let list = List::new();
        let plain = crate::reactive::Record::new();
        list.push(plain.clone());
        assert!(plain.observer().is_none());

        list.instrument();
        assert!(plain.observer().is_some());

        let late = crate::reactive::Record::new();
        list.unshift(late.clone());
        assert!(late.observer().is_some());
    }

    #[test]
    fn frozen_list_ignores_mutation() {
        let list: List = [1].into_iter().collect();
        list.freeze();

        assert_eq!(list.push(2), 1);
        assert_eq!(list.pop(), None);
        assert!(list.instrument().is_none());
        assert_eq!(numbers(&list), vec![1.0]);
    }
}
