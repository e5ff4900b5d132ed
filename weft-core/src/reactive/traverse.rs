//! Deep traversal for `deep` computations.
//!
//! Reads every nested reactive slot under a value so the running evaluation
//! depends on all of them, including the shape subject of each observed
//! container.

use std::collections::HashSet;

use crate::Value;

#[derive(PartialEq, Eq, Hash)]
enum Seen {
    Subject(u64),
    Address(usize),
}

pub fn traverse(value: &Value) {
    let mut seen = HashSet::new();
    walk(value, &mut seen);
}

fn walk(value: &Value, seen: &mut HashSet<Seen>) {
    let key = match value.observer() {
        Some(observer) => Seen::Subject(observer.subject().id().raw()),
        None => match value {
            Value::Object(object) => Seen::Address(object.addr()),
            Value::Array(array) => Seen::Address(array.addr()),
            _ => return,
        },
    };
    if !seen.insert(key) {
        return;
    }

    match value {
        Value::Object(object) => {
            if object.is_frozen() || object.kind() == crate::ObjectKind::Opaque {
                return;
            }
            if let Some(observer) = object.observer() {
                observer.subject().depend();
            }
            for key in object.keys() {
                walk(&object.get(&key), seen);
            }
        }
        Value::Array(array) => {
            if array.is_frozen() {
                return;
            }
            if let Some(observer) = array.observer() {
                observer.subject().depend();
            }
            for item in array.to_vec() {
                walk(&item, seen);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Array, Object};
    use crate::observer::observe;
    use crate::reactive::Computation;

    #[test]
    fn depends_on_every_nested_slot() {
        let leaf: Object = [("x", Value::from(1)), ("y", Value::from(2))]
            .into_iter()
            .collect();
        let list = Array::from(vec![Value::Object(leaf.clone())]);
        let root: Object = [("list", Value::Array(list))].into_iter().collect();
        let root = Value::Object(root);
        observe(&root, false);

        let target = root.clone();
        let computation = Computation::new(move || {
            traverse(&target);
            Ok(Value::Null)
        })
        .unwrap();

        // root shape + list prop + list shape + leaf shape + x + y
        assert_eq!(computation.dependency_count(), 6);
    }

    #[test]
    fn survives_cycles() {
        let a = Object::new();
        let b: Object = [("a", Value::Object(a.clone()))].into_iter().collect();
        a.set("b", Value::Object(b));
        traverse(&Value::Object(a.clone()));
        a.delete("b");
    }
}
