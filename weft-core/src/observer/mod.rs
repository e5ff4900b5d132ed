//! Observer & Reactive Properties
//!
//! [`observe`] makes a value reactive in place: every own enumerable
//! property of a plain object gets a [`Subject`], nested containers are
//! observed recursively, and the container itself gets an [`Observer`]
//! whose subject signals shape changes (keys added or removed, array
//! mutations).

pub(crate) mod dynamic;
pub(crate) mod property;

use std::cell::Cell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::data::{Array, Object, ObjectKind};
use crate::reactive::Subject;
use crate::Value;

pub use dynamic::{del, set};
pub use property::{define_reactive, Getter, Setter};

thread_local! {
    static SHOULD_OBSERVE: Cell<bool> = const { Cell::new(true) };
}

/// Enable or disable creation of new observers on this thread. Values that
/// are already observed are unaffected.
pub fn toggle_observing(enabled: bool) {
    SHOULD_OBSERVE.with(|flag| flag.set(enabled));
}

pub fn should_observe() -> bool {
    SHOULD_OBSERVE.with(Cell::get)
}

/// Marker attached to an observed container.
pub struct Observer {
    subject: Subject,
    root_count: Cell<usize>,
}

impl Observer {
    fn new() -> Self {
        Self {
            subject: Subject::new(),
            root_count: Cell::new(0),
        }
    }

    /// The shape-change subject.
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// How many roots designate this value as their top-level state.
    pub fn root_count(&self) -> usize {
        self.root_count.get()
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("subject", &self.subject.id())
            .field("root_count", &self.root_count.get())
            .finish()
    }
}

/// Make `value` reactive and return its observer.
///
/// Returns `None` for primitives, for `Instance`/`Opaque` objects, for
/// non-extensible or frozen containers, and while observing is toggled off.
/// A value that already carries an observer reuses it.
pub fn observe(value: &Value, as_root: bool) -> Option<Rc<Observer>> {
    let observer = match value {
        Value::Object(object) => observe_object(object)?,
        Value::Array(array) => observe_array(array)?,
        _ => return None,
    };
    if as_root {
        observer.root_count.set(observer.root_count.get() + 1);
    }
    Some(observer)
}

fn observe_object(object: &Object) -> Option<Rc<Observer>> {
    if let Some(existing) = object.observer() {
        return Some(existing);
    }
    if !should_observe() || object.kind() != ObjectKind::Plain || !object.is_extensible() {
        return None;
    }

    // Attach before walking so cyclic references find it.
    let observer = Rc::new(Observer::new());
    object.data_mut().observer = Some(observer.clone());
    debug!(subject = observer.subject.id().raw(), "observing object");

    for key in object.keys() {
        define_reactive(object, &key, None, false);
    }
    Some(observer)
}

fn observe_array(array: &Array) -> Option<Rc<Observer>> {
    if let Some(existing) = array.observer() {
        return Some(existing);
    }
    if !should_observe() || !array.is_extensible() {
        return None;
    }

    let observer = Rc::new(Observer::new());
    array.attach_observer(observer.clone());
    debug!(subject = observer.subject.id().raw(), "observing array");

    for item in array.to_vec() {
        observe(&item, false);
    }
    Some(observer)
}

/// Subscribe the current evaluation to the shape subject of every observed
/// element reachable through `array`, since element mutation never passes
/// through the owning property's setter.
pub(crate) fn depend_array(array: &Array) {
    depend_array_inner(array, &mut HashSet::new());
}

fn depend_array_inner(array: &Array, seen: &mut HashSet<usize>) {
    if !seen.insert(array.addr()) {
        return;
    }
    for item in array.to_vec() {
        if let Some(observer) = item.observer() {
            observer.subject.depend();
        }
        if let Value::Array(inner) = &item {
            depend_array_inner(inner, seen);
        }
    }
}
