//! Plain-data snapshots of reactive state.
//!
//! Snapshots read without tracking, so taking one inside a computation does
//! not subscribe it to anything.

use std::collections::HashSet;

use serde_json::{Map, Number, Value as Json};

use crate::data::{Array, Object};
use crate::error::{Error, Result};
use crate::reactive::untracked;
use crate::Value;

/// Convert `value` to JSON.
///
/// Undefined object members are omitted; undefined array elements and
/// non-finite numbers become `null`. A container that contains itself fails
/// with [`Error::CyclicSnapshot`].
pub fn to_json(value: &Value) -> Result<Json> {
    untracked(|| convert(value, &mut HashSet::new()))
}

/// Encode the JSON snapshot of `value` as MessagePack.
pub fn to_msgpack(value: &Value) -> Result<Vec<u8>> {
    let json = to_json(value)?;
    Ok(rmp_serde::to_vec(&json)?)
}

fn convert(value: &Value, path: &mut HashSet<usize>) -> Result<Json> {
    Ok(match value {
        Value::Undefined | Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) => Number::from_f64(*n).map_or(Json::Null, Json::Number),
        Value::String(s) => Json::String(s.to_string()),
        Value::Object(object) => {
            enter(path, object.addr())?;
            let result = convert_object(object, path);
            path.remove(&object.addr());
            result?
        }
        Value::Array(array) => {
            enter(path, array.addr())?;
            let result = convert_array(array, path);
            path.remove(&array.addr());
            result?
        }
    })
}

fn enter(path: &mut HashSet<usize>, addr: usize) -> Result<()> {
    if path.insert(addr) {
        Ok(())
    } else {
        Err(Error::CyclicSnapshot)
    }
}

fn convert_object(object: &Object, path: &mut HashSet<usize>) -> Result<Json> {
    let mut map = Map::new();
    for key in object.keys() {
        let member = object.get(&key);
        if member.is_undefined() {
            continue;
        }
        map.insert(key, convert(&member, path)?);
    }
    Ok(Json::Object(map))
}

fn convert_array(array: &Array, path: &mut HashSet<usize>) -> Result<Json> {
    array
        .to_vec()
        .iter()
        .map(|item| convert(item, path))
        .collect::<Result<Vec<_>>>()
        .map(Json::Array)
}

/// Build plain, unobserved data from JSON.
impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::from(s),
            Json::Array(items) => items.into_iter().map(Value::from).collect::<Array>().into(),
            Json::Object(map) => map
                .into_iter()
                .map(|(k, v)| (k, Value::from(v)))
                .collect::<Object>()
                .into(),
        }
    }
}
