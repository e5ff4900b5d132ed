//! Data Model
//!
//! Dynamically typed values and the two container types the reactive layer
//! knows how to observe: [`Object`] for keyed state and [`Array`] for
//! ordered collections. Both are shared handles; cloning one clones the
//! handle, not the contents.

mod array;
mod object;
mod value;

pub use array::Array;
pub use object::{Object, ObjectKind, PropertyFlags};
pub use value::{Key, Value};
