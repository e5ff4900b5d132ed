//! Adding and removing properties after observation.
//!
//! Accessors installed by [`observe`](super::observe) only cover the keys
//! present at that time. [`set`] and [`del`] change an observed value's
//! shape and notify its observer so readers that enumerate it re-run.

use tracing::debug;

use super::property::define_reactive;
use crate::data::{Key, ObjectKind};
use crate::error::{warn, Error, Result};
use crate::Value;

/// Set `key` on `target`, adding a reactive property if it is new.
/// Returns the value that was set.
///
/// On an array, a valid index writes through `splice`, padding if needed.
/// Adding a key to a root state object fails with
/// [`Error::RootMutation`] and leaves it untouched.
pub fn set(target: &Value, key: impl Into<Key>, value: impl Into<Value>) -> Result<Value> {
    let key = key.into();
    let value = value.into();

    match target {
        Value::Array(array) => {
            let Some(index) = key.as_index() else {
                warn(&format!("invalid array index for set: {key}"));
                return Err(Error::InvalidArrayIndex(key.to_string()));
            };
            array.extend_to(index);
            array.splice(index, 1, vec![value.clone()]);
            Ok(value)
        }
        Value::Object(object) => {
            let name = key.to_name();
            if object.has_own(&name) {
                object.set(&name, value.clone());
                return Ok(value);
            }

            let observer = object.observer();
            if object.kind() == ObjectKind::Instance
                || observer.as_ref().is_some_and(|ob| ob.root_count() > 0)
            {
                warn(&format!(
                    "avoid adding reactive property \"{name}\" to a root state object at runtime; declare it up front"
                ));
                return Err(Error::RootMutation(name));
            }

            match observer {
                None => object.set(&name, value.clone()),
                Some(observer) => {
                    define_reactive(object, &name, Some(value.clone()), false);
                    debug!(key = %name, "reactive property added");
                    observer.subject().notify();
                }
            }
            Ok(value)
        }
        other => {
            warn(&format!(
                "cannot set reactive property on a {} value",
                other.type_name()
            ));
            Err(Error::NonObjectTarget(other.type_name().to_string()))
        }
    }
}

/// Delete `key` from `target` and notify its observer.
///
/// Missing keys are a no-op. Deleting from a root state object fails with
/// [`Error::RootMutation`].
pub fn del(target: &Value, key: impl Into<Key>) -> Result<()> {
    let key = key.into();

    match target {
        Value::Array(array) => {
            // Out-of-range indices remove nothing but still notify.
            if let Some(index) = key.as_index() {
                array.splice(index, 1, Vec::new());
            }
            Ok(())
        }
        Value::Object(object) => {
            let name = key.to_name();
            let observer = object.observer();
            if object.kind() == ObjectKind::Instance
                || observer.as_ref().is_some_and(|ob| ob.root_count() > 0)
            {
                warn(&format!(
                    "avoid deleting property \"{name}\" from a root state object; set it to null instead"
                ));
                return Err(Error::RootMutation(name));
            }

            if !object.has_own(&name) || !object.delete(&name) {
                return Ok(());
            }
            if let Some(observer) = observer {
                debug!(key = %name, "reactive property deleted");
                observer.subject().notify();
            }
            Ok(())
        }
        other => {
            warn(&format!(
                "cannot delete reactive property on a {} value",
                other.type_name()
            ));
            Err(Error::NonObjectTarget(other.type_name().to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    use crate::config;
    use crate::data::{Array, Object};
    use crate::observer::observe;
    use crate::reactive::Computation;

    fn quiet() {
        config::configure(|c| c.silent = true);
    }

    fn count_runs<F>(f: F) -> (Computation, Rc<Cell<usize>>)
    where
        F: Fn() -> Value + 'static,
    {
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();
        let computation = Computation::builder(move || {
            counter.set(counter.get() + 1);
            Ok(f())
        })
        .sync(true)
        .build()
        .unwrap();
        (computation, runs)
    }

    #[test]
    fn adding_a_key_notifies_shape_readers() {
        let object: Object = [("a", 1)].into_iter().collect();
        let state = Value::from(object.clone());
        let holder: Object = [("state", state.clone())].into_iter().collect();
        observe(&Value::from(holder.clone()), false);

        let reader = holder.clone();
        let (computation, runs) = count_runs(move || {
            let state = reader.get("state");
            let keys = state.as_object().map(Object::keys).unwrap_or_default();
            Value::from(keys.len())
        });

        assert_eq!(set(&state, "b", 2).unwrap(), Value::from(2));
        assert_eq!(runs.get(), 2);
        assert_eq!(computation.value(), Value::from(2));
        assert!(object.is_reactive_property("b"));
    }

    #[test]
    fn existing_keys_are_plain_assignments() {
        let object: Object = [("a", 1)].into_iter().collect();
        let state = Value::from(object.clone());
        observe(&state, false);

        let reader = object.clone();
        let (_computation, runs) = count_runs(move || reader.get("a"));
        set(&state, "a", 3).unwrap();
        assert_eq!(runs.get(), 2);
        assert_eq!(object.get("a"), Value::from(3));
    }

    #[test]
    fn unobserved_targets_get_plain_properties() {
        let object = Object::new();
        set(&Value::from(object.clone()), "k", "v").unwrap();
        assert_eq!(object.get("k"), Value::from("v"));
        assert!(!object.is_reactive_property("k"));
    }

    #[test]
    fn root_objects_refuse_new_keys() {
        quiet();
        let object: Object = [("a", 1)].into_iter().collect();
        let state = Value::from(object.clone());
        observe(&state, true);

        assert!(matches!(set(&state, "b", 1), Err(Error::RootMutation(k)) if k == "b"));
        assert!(!object.has_own("b"));
        assert!(matches!(del(&state, "a"), Err(Error::RootMutation(_))));
        assert!(object.has_own("a"));

        let instance = Value::from(Object::instance());
        assert!(set(&instance, "x", 1).is_err());
        config::reset();
    }

    #[test]
    fn array_index_set_goes_through_splice() {
        let array: Array = [1, 2].into_iter().collect();
        let value = Value::from(array.clone());
        observe(&value, false);

        let reader = array.clone();
        let (_computation, runs) = count_runs(move || {
            crate::reactive::traverse(&Value::from(reader.clone()));
            Value::from(reader.len())
        });

        set(&value, 0, "first").unwrap();
        assert_eq!(array.get(0), Some(Value::from("first")));
        assert_eq!(runs.get(), 2);

        set(&value, "4", 5).unwrap();
        assert_eq!(array.len(), 5);
        assert_eq!(array.get(3), Some(Value::Undefined));
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn invalid_array_index_is_rejected() {
        quiet();
        let value = Value::from(Array::new());
        assert!(matches!(set(&value, -1, 1), Err(Error::InvalidArrayIndex(_))));
        assert!(matches!(set(&value, "x", 1), Err(Error::InvalidArrayIndex(_))));
        config::reset();
    }

    #[test]
    fn primitives_are_rejected() {
        quiet();
        assert!(matches!(
            set(&Value::from(1), "a", 1),
            Err(Error::NonObjectTarget(t)) if t == "number"
        ));
        assert!(del(&Value::Null, "a").is_err());
        config::reset();
    }

    #[test]
    fn deleting_notifies_and_missing_keys_are_ignored() {
        let object: Object = [("a", 1), ("b", 2)].into_iter().collect();
        let state = Value::from(object.clone());
        observe(&state, false);

        // Enumerating keys is not a tracked read; depend on the shape.
        let shape = object.clone();
        let (computation, runs) = count_runs(move || {
            if let Some(observer) = shape.observer() {
                observer.subject().depend();
            }
            Value::from(shape.keys().len())
        });

        del(&state, "a").unwrap();
        assert_eq!(computation.value(), Value::from(1));
        assert_eq!(runs.get(), 2);

        del(&state, "missing").unwrap();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn deleting_array_elements_splices() {
        let array: Array = [1, 2, 3].into_iter().collect();
        del(&Value::from(array.clone()), 1).unwrap();
        assert_eq!(array.to_vec(), vec![Value::from(1), Value::from(3)]);
        del(&Value::from(array.clone()), 10).unwrap();
        assert_eq!(array.len(), 2);
    }

    #[test]
    fn out_of_range_array_delete_still_notifies() {
        let array: Array = [1, 2].into_iter().collect();
        let state: Object = [("list", Value::from(array.clone()))].into_iter().collect();
        observe(&Value::from(state.clone()), false);

        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();
        let reader = state.clone();
        let _computation = Computation::builder(move || {
            counter.set(counter.get() + 1);
            Ok(reader.get("list"))
        })
        .sync(true)
        .build()
        .unwrap();

        del(&Value::from(array.clone()), 5).unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(runs.get(), 2);
    }
}
