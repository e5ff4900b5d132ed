use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use super::Value;
use crate::error::warn;
use crate::observer::{observe, Observer};

struct ArrayData {
    items: Vec<Value>,
    frozen: bool,
    observer: Option<Rc<Observer>>,
}

/// The observed collection.
///
/// The mutating methods (`push`, `pop`, `shift`, `unshift`, `splice`,
/// `sort`, `reverse`) perform the mutation, observe any inserted elements,
/// and notify the array's shape subject. Index writes through
/// [`Array::set_index`] are not reactive; use [`crate::set`] for that.
#[derive(Clone)]
pub struct Array(Rc<RefCell<ArrayData>>);

impl Array {
    pub fn new() -> Self {
        Self::from(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().items.get(index).cloned()
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.0.borrow().items.clone()
    }

    /// Write an index directly, padding with `Undefined`. Nobody is
    /// notified.
    pub fn set_index(&self, index: usize, value: impl Into<Value>) {
        let old = {
            let mut data = self.0.borrow_mut();
            if index >= data.items.len() {
                data.items.resize(index + 1, Value::Undefined);
            }
            std::mem::replace(&mut data.items[index], value.into())
        };
        drop(old);
    }

    /// Pad with `Undefined` up to `len`. Never shrinks, never notifies.
    pub(crate) fn extend_to(&self, len: usize) {
        let mut data = self.0.borrow_mut();
        if data.items.len() < len {
            data.items.resize(len, Value::Undefined);
        }
    }

    /// Append an element. Returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> usize {
        let value = value.into();
        if self.rejects_mutation("push") {
            return self.len();
        }
        let len = {
            let mut data = self.0.borrow_mut();
            data.items.push(value.clone());
            data.items.len()
        };
        self.mutated(&[value]);
        len
    }

    pub fn pop(&self) -> Option<Value> {
        if self.rejects_mutation("pop") {
            return None;
        }
        let popped = self.0.borrow_mut().items.pop();
        self.mutated(&[]);
        popped
    }

    pub fn shift(&self) -> Option<Value> {
        if self.rejects_mutation("shift") {
            return None;
        }
        let shifted = {
            let mut data = self.0.borrow_mut();
            (!data.items.is_empty()).then(|| data.items.remove(0))
        };
        self.mutated(&[]);
        shifted
    }

    /// Prepend elements, keeping their order. Returns the new length.
    pub fn unshift(&self, items: Vec<Value>) -> usize {
        if self.rejects_mutation("unshift") {
            return self.len();
        }
        let len = {
            let mut data = self.0.borrow_mut();
            let rest = std::mem::take(&mut data.items);
            data.items = items.iter().cloned().chain(rest).collect();
            data.items.len()
        };
        self.mutated(&items);
        len
    }

    /// Remove `delete_count` elements at `start` and insert `items` there.
    /// `start` and `delete_count` are clamped. Returns the removed elements.
    pub fn splice(&self, start: usize, delete_count: usize, items: Vec<Value>) -> Vec<Value> {
        if self.rejects_mutation("splice") {
            return Vec::new();
        }
        let removed: Vec<Value> = {
            let mut data = self.0.borrow_mut();
            let start = start.min(data.items.len());
            let end = start.saturating_add(delete_count).min(data.items.len());
            data.items.splice(start..end, items.iter().cloned()).collect()
        };
        self.mutated(&items);
        removed
    }

    /// Sort by string conversion, with `Undefined` last.
    pub fn sort(&self) {
        self.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
    }

    /// Stable sort with a comparator. `Undefined` elements always go last
    /// and are never passed to `compare`.
    pub fn sort_by<F>(&self, mut compare: F)
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        if self.rejects_mutation("sort") {
            return;
        }
        // Sort a detached copy so the comparator may read the array.
        let mut items = std::mem::take(&mut self.0.borrow_mut().items);
        items.sort_by(|a, b| match (a.is_undefined(), b.is_undefined()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => compare(a, b),
        });
        self.0.borrow_mut().items = items;
        self.mutated(&[]);
    }

    pub fn reverse(&self) {
        if self.rejects_mutation("reverse") {
            return;
        }
        self.0.borrow_mut().items.reverse();
        self.mutated(&[]);
    }

    pub fn freeze(&self) {
        self.0.borrow_mut().frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.0.borrow().frozen
    }

    pub fn is_extensible(&self) -> bool {
        !self.is_frozen()
    }

    pub fn observer(&self) -> Option<Rc<Observer>> {
        self.0.borrow().observer.clone()
    }

    pub(crate) fn attach_observer(&self, observer: Rc<Observer>) {
        self.0.borrow_mut().observer = Some(observer);
    }

    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    fn rejects_mutation(&self, method: &str) -> bool {
        if self.is_frozen() {
            warn(&format!("cannot {method} on a frozen array"));
            return true;
        }
        false
    }

    fn mutated(&self, inserted: &[Value]) {
        let Some(observer) = self.observer() else {
            return;
        };
        for item in inserted {
            observe(item, false);
        }
        observer.subject().notify();
    }
}

impl Default for Array {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<Value>> for Array {
    fn from(items: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(ArrayData {
            items,
            frozen: false,
            observer: None,
        })))
    }
}

impl<V: Into<Value>> FromIterator<V> for Array {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self::from(iter.into_iter().map(Into::into).collect::<Vec<_>>())
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(data) => f
                .debug_struct("Array")
                .field("len", &data.items.len())
                .field("observed", &data.observer.is_some())
                .finish(),
            Err(_) => f.write_str("Array { <borrowed> }"),
        }
    }
}
