//! The reactive-property protocol.
//!
//! A property made reactive carries a [`ReactiveBinding`]: its own subject
//! plus the observer of its current value. Reads through [`get`] subscribe
//! the running evaluation; writes through [`set`] re-observe the new value
//! and notify.

use std::rc::Rc;

use super::{depend_array, observe, Observer};
use crate::data::{Object, PropertyFlags};
use crate::reactive::{Runtime, Subject};
use crate::Value;

pub type Getter = Rc<dyn Fn() -> Value>;
pub type Setter = Rc<dyn Fn(Value)>;

#[derive(Clone)]
pub(crate) enum Slot {
    Data(Value),
    Accessor {
        get: Option<Getter>,
        set: Option<Setter>,
    },
}

impl Slot {
    /// Must not be called while the owning object is borrowed.
    fn read(&self) -> Value {
        match self {
            Slot::Data(value) => value.clone(),
            Slot::Accessor { get: Some(get), .. } => get(),
            Slot::Accessor { get: None, .. } => Value::Undefined,
        }
    }
}

#[derive(Clone)]
pub(crate) struct ReactiveBinding {
    pub(crate) subject: Rc<Subject>,
    pub(crate) child: Option<Rc<Observer>>,
    pub(crate) shallow: bool,
}

#[derive(Clone)]
pub(crate) struct Property {
    pub(crate) slot: Slot,
    pub(crate) enumerable: bool,
    pub(crate) configurable: bool,
    pub(crate) writable: bool,
    pub(crate) binding: Option<ReactiveBinding>,
}

impl Property {
    pub(crate) fn data(value: Value, flags: PropertyFlags) -> Self {
        Self {
            slot: Slot::Data(value),
            enumerable: flags.enumerable,
            configurable: flags.configurable,
            writable: flags.writable,
            binding: None,
        }
    }

    pub(crate) fn accessor(get: Option<Getter>, set: Option<Setter>, flags: PropertyFlags) -> Self {
        Self {
            slot: Slot::Accessor { get, set },
            enumerable: flags.enumerable,
            configurable: flags.configurable,
            writable: flags.writable,
            binding: None,
        }
    }
}

/// Make `key` on `object` reactive.
///
/// An existing accessor pair stays authoritative for storage. Without
/// `initial`, the current value is used. `shallow` leaves the value itself
/// unobserved. Non-configurable properties are left alone.
pub fn define_reactive(object: &Object, key: &str, initial: Option<Value>, shallow: bool) {
    let existing = object.data().props.get(key).cloned();
    let (slot, enumerable, writable) = match existing {
        Some(prop) if !prop.configurable => return,
        Some(prop) => (prop.slot, prop.enumerable, prop.writable),
        None if !object.is_extensible() => return,
        None => (Slot::Data(Value::Undefined), true, true),
    };

    let (slot, value) = match slot {
        Slot::Data(current) => {
            let value = initial.unwrap_or(current);
            (Slot::Data(value.clone()), value)
        }
        Slot::Accessor { get, set } => {
            let value = match initial {
                Some(value) => value,
                None if get.is_none() || set.is_some() => {
                    get.as_ref().map(|get| get()).unwrap_or_default()
                }
                None => Value::Undefined,
            };
            (Slot::Accessor { get, set }, value)
        }
    };

    let child = if shallow { None } else { observe(&value, false) };
    let prop = Property {
        slot,
        enumerable,
        configurable: true,
        writable,
        binding: Some(ReactiveBinding {
            subject: Rc::new(Subject::new()),
            child,
            shallow,
        }),
    };

    let replaced = object.data_mut().props.insert(key.to_string(), prop);
    drop(replaced);
}

pub(crate) fn get(object: &Object, key: &str) -> Value {
    let (slot, binding) = {
        let data = object.data();
        match data.props.get(key) {
            Some(prop) => (prop.slot.clone(), prop.binding.clone()),
            None => return Value::Undefined,
        }
    };

    let value = slot.read();
    if let Some(binding) = binding {
        if Runtime::is_tracking() {
            binding.subject.depend();
            if let Some(child) = &binding.child {
                child.subject().depend();
                if let Value::Array(array) = &value {
                    depend_array(array);
                }
            }
        }
    }
    value
}

pub(crate) fn set(object: &Object, key: &str, value: Value) {
    let existing = {
        let data = object.data();
        data.props
            .get(key)
            .map(|prop| (prop.slot.clone(), prop.writable, prop.binding.clone()))
    };

    let Some((slot, writable, binding)) = existing else {
        let mut data = object.data_mut();
        if data.extensible {
            data.props
                .insert(key.to_string(), Property::data(value, PropertyFlags::default()));
        }
        return;
    };

    let Some(binding) = binding else {
        assign(object, key, &slot, writable, value);
        return;
    };

    if value.same_value(&slot.read()) {
        return;
    }
    if !assign(object, key, &slot, writable, value.clone()) {
        return;
    }

    let child = if binding.shallow {
        None
    } else {
        observe(&value, false)
    };
    let replaced = {
        let mut data = object.data_mut();
        data.props
            .get_mut(key)
            .and_then(|prop| prop.binding.as_mut())
            .and_then(|binding| std::mem::replace(&mut binding.child, child))
    };
    drop(replaced);

    binding.subject.notify();
}

/// Store through the setter or the data slot. Returns whether anything was
/// written; getter-only accessors and read-only data are not.
fn assign(object: &Object, key: &str, slot: &Slot, writable: bool, value: Value) -> bool {
    match slot {
        Slot::Accessor { set: Some(set), .. } => {
            set(value);
            true
        }
        Slot::Accessor { set: None, .. } => false,
        Slot::Data(_) if !writable => false,
        Slot::Data(_) => {
            let old = {
                let mut data = object.data_mut();
                match data.props.get_mut(key) {
                    Some(Property {
                        slot: Slot::Data(current),
                        ..
                    }) => Some(std::mem::replace(current, value)),
                    _ => None,
                }
            };
            drop(old);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    use crate::data::Array;
    use crate::reactive::Computation;

    fn watch_count(object: &Object, key: &'static str) -> (Computation, Rc<Cell<usize>>) {
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();
        let reader = object.clone();
        let computation = Computation::builder(move || {
            counter.set(counter.get() + 1);
            Ok(reader.get(key))
        })
        .sync(true)
        .build()
        .unwrap();
        (computation, runs)
    }

    #[test]
    fn writes_notify_readers() {
        let object: Object = [("a", 1), ("b", 2)].into_iter().collect();
        observe(&Value::from(object.clone()), false);
        let (_computation, runs) = watch_count(&object, "a");

        object.set("a", 5);
        assert_eq!(runs.get(), 2);

        // Unrelated property.
        object.set("b", 6);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn unchanged_writes_are_ignored() {
        let object: Object = [("a", Value::from(f64::NAN))].into_iter().collect();
        observe(&Value::from(object.clone()), false);
        let (_computation, runs) = watch_count(&object, "a");

        object.set("a", f64::NAN);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn new_values_are_observed() {
        let object: Object = [("child", Value::Null)].into_iter().collect();
        observe(&Value::from(object.clone()), false);

        let replacement: Object = [("x", 1)].into_iter().collect();
        object.set("child", replacement.clone());
        assert!(replacement.is_reactive_property("x"));
    }

    #[test]
    fn shallow_properties_leave_values_raw() {
        let object = Object::new();
        let raw: Object = [("x", 1)].into_iter().collect();
        define_reactive(&object, "raw", Some(Value::from(raw.clone())), true);

        assert!(object.is_reactive_property("raw"));
        assert!(raw.observer().is_none());

        let other: Object = [("y", 1)].into_iter().collect();
        object.set("raw", other.clone());
        assert!(other.observer().is_none());
    }

    #[test]
    fn getter_only_accessors_are_read_only() {
        let object = Object::new();
        object.define_accessor(
            "answer",
            Some(Rc::new(|| Value::from(42))),
            None,
            PropertyFlags::default(),
        );
        define_reactive(&object, "answer", None, false);
        let (_computation, runs) = watch_count(&object, "answer");

        object.set("answer", 1);
        assert_eq!(object.get("answer"), Value::from(42));
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn accessor_pairs_stay_authoritative() {
        let store = Rc::new(RefCell::new(Value::from(1)));
        let (read, write) = (store.clone(), store.clone());
        let object = Object::new();
        object.define_accessor(
            "n",
            Some(Rc::new(move || read.borrow().clone())),
            Some(Rc::new(move |value| *write.borrow_mut() = value)),
            PropertyFlags::default(),
        );
        define_reactive(&object, "n", None, false);
        let (computation, runs) = watch_count(&object, "n");

        object.set("n", 2);
        assert_eq!(*store.borrow(), Value::from(2));
        assert_eq!(runs.get(), 2);
        assert_eq!(computation.value(), Value::from(2));
    }

    #[test]
    fn non_configurable_properties_are_skipped() {
        let object = Object::new();
        let locked = PropertyFlags {
            configurable: false,
            ..PropertyFlags::default()
        };
        object.define_property("fixed", 1, locked);
        define_reactive(&object, "fixed", None, false);
        assert!(!object.is_reactive_property("fixed"));
    }

    #[test]
    fn reading_an_array_property_depends_on_nested_elements() {
        let item: Object = [("x", 1)].into_iter().collect();
        let nested = Array::from(vec![Value::from(item.clone())]);
        let object: Object = [("list", Value::from(vec![Value::from(nested.clone())]))]
            .into_iter()
            .collect();
        observe(&Value::from(object.clone()), false);

        let (computation, runs) = watch_count(&object, "list");
        // property + list shape + nested shape + item shape
        assert_eq!(computation.dependency_count(), 4);

        nested.push(2);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn reading_mutually_nested_arrays_terminates() {
        let a = Array::new();
        let b = Array::from(vec![Value::from(a.clone())]);
        a.push(Value::from(b.clone()));
        let object: Object = [("list", Value::from(a.clone()))].into_iter().collect();
        observe(&Value::from(object.clone()), false);

        let (computation, runs) = watch_count(&object, "list");
        // property + a shape + b shape
        assert_eq!(computation.dependency_count(), 3);

        b.push(1);
        assert_eq!(runs.get(), 2);
    }
}
