//! Dotted path watch expressions, e.g. `"a.b.c"`.

use crate::error::{Error, Result};
use crate::Value;

/// Split a path into segments. Only word characters, `$` and `.` are
/// accepted; anything else (brackets, spaces, operators) is rejected.
pub fn parse(path: &str) -> Result<Vec<String>> {
    let valid = path
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.');
    if !valid {
        return Err(Error::InvalidPath(path.to_string()));
    }
    Ok(path.split('.').map(str::to_string).collect())
}

/// Walk `segments` from `root`, reading through the tracked accessors so the
/// current evaluation depends on every hop. A missing hop yields `Undefined`.
pub fn resolve(root: &Value, segments: &[String]) -> Value {
    let mut current = root.clone();
    for segment in segments {
        current = match &current {
            Value::Object(object) => object.get(segment),
            Value::Array(array) => {
                if let Some(observer) = array.observer() {
                    observer.subject().depend();
                }
                if segment == "length" {
                    Value::from(array.len())
                } else {
                    match segment.parse::<usize>() {
                        Ok(index) => array.get(index).unwrap_or_default(),
                        Err(_) => Value::Undefined,
                    }
                }
            }
            _ => return Value::Undefined,
        };
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Array, Object};

    #[test]
    fn parses_dotted_paths() {
        assert_eq!(parse("a.b.c").unwrap(), vec!["a", "b", "c"]);
        assert_eq!(parse("$data.item_1").unwrap(), vec!["$data", "item_1"]);
    }

    #[test]
    fn rejects_anything_but_simple_paths() {
        for path in ["a[0]", "a b", "a+b", "fn()", "a-b", "é.x", "a.ü"] {
            assert!(
                matches!(parse(path), Err(Error::InvalidPath(p)) if p == path),
                "{path} should be rejected"
            );
        }
    }

    #[test]
    fn resolves_through_objects_and_arrays() {
        let list = Array::from(vec![Value::from("x"), Value::from("y")]);
        let inner: Object = [("list", Value::Array(list))].into_iter().collect();
        let root: Object = [("inner", Value::Object(inner))].into_iter().collect();
        let root = Value::Object(root);

        let get = |p: &str| resolve(&root, &parse(p).unwrap());
        assert_eq!(get("inner.list.1"), Value::from("y"));
        assert_eq!(get("inner.list.length"), Value::from(2));
        assert_eq!(get("inner.missing.deeper"), Value::Undefined);
        assert_eq!(get("inner.list.7"), Value::Undefined);
    }
}
