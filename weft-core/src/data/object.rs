use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::Value;
use crate::observer::property::{self, Getter, Property, Setter};
use crate::observer::Observer;

/// What an object is, as far as observation is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectKind {
    /// Ordinary state; observable.
    #[default]
    Plain,
    /// A root state container. Never observed; refuses dynamic add/delete.
    Instance,
    /// Carries a foreign marker (a virtual node, say). Never observed or
    /// traversed.
    Opaque,
}

/// Property attributes for [`Object::define_property`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyFlags {
    pub enumerable: bool,
    pub configurable: bool,
    pub writable: bool,
}

impl Default for PropertyFlags {
    fn default() -> Self {
        Self {
            enumerable: true,
            configurable: true,
            writable: true,
        }
    }
}

pub(crate) struct ObjectData {
    pub(crate) props: IndexMap<String, Property>,
    pub(crate) kind: ObjectKind,
    pub(crate) extensible: bool,
    pub(crate) frozen: bool,
    pub(crate) observer: Option<Rc<Observer>>,
}

/// A keyed container with ordered own properties.
///
/// Reads and writes of properties made reactive by
/// [`observe`](crate::observe) go through the subscribe/notify protocol;
/// everything else behaves like plain assignment.
#[derive(Clone)]
pub struct Object(Rc<RefCell<ObjectData>>);

impl Object {
    pub fn new() -> Self {
        Self::with_kind(ObjectKind::Plain)
    }

    pub fn with_kind(kind: ObjectKind) -> Self {
        Self(Rc::new(RefCell::new(ObjectData {
            props: IndexMap::new(),
            kind,
            extensible: true,
            frozen: false,
            observer: None,
        })))
    }

    /// A root state container.
    pub fn instance() -> Self {
        Self::with_kind(ObjectKind::Instance)
    }

    /// An object that must never be observed.
    pub fn opaque() -> Self {
        Self::with_kind(ObjectKind::Opaque)
    }

    pub fn kind(&self) -> ObjectKind {
        self.0.borrow().kind
    }

    /// Read a property. Missing properties read as `Undefined`.
    pub fn get(&self, key: &str) -> Value {
        property::get(self, key)
    }

    /// Assign a property. Unknown keys are added as plain (non-reactive)
    /// data properties if the object is extensible; use [`crate::set`] to
    /// add a reactive one.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        property::set(self, key, value.into());
    }

    /// Remove a configurable own property without notifying anyone.
    /// Returns whether the key is now absent.
    pub fn delete(&self, key: &str) -> bool {
        let removed = {
            let mut data = self.0.borrow_mut();
            match data.props.get(key) {
                None => return true,
                Some(prop) if !prop.configurable => return false,
                Some(_) => data.props.shift_remove(key),
            }
        };
        // Dropped outside the borrow: the old value may own other containers.
        drop(removed);
        true
    }

    pub fn has_own(&self, key: &str) -> bool {
        self.0.borrow().props.contains_key(key)
    }

    /// Own enumerable keys, in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.0
            .borrow()
            .props
            .iter()
            .filter(|(_, prop)| prop.enumerable)
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Define or redefine a data property. Fails on a non-configurable
    /// existing property or a new key on a non-extensible object.
    pub fn define_property(&self, key: &str, value: impl Into<Value>, flags: PropertyFlags) -> bool {
        self.define(key, Property::data(value.into(), flags))
    }

    /// Define or redefine an accessor property.
    pub fn define_accessor(
        &self,
        key: &str,
        get: Option<Getter>,
        set: Option<Setter>,
        flags: PropertyFlags,
    ) -> bool {
        self.define(key, Property::accessor(get, set, flags))
    }

    fn define(&self, key: &str, prop: Property) -> bool {
        let replaced = {
            let mut data = self.0.borrow_mut();
            match data.props.get(key) {
                Some(existing) if !existing.configurable => return false,
                None if !data.extensible => return false,
                _ => data.props.insert(key.to_string(), prop),
            }
        };
        drop(replaced);
        true
    }

    pub fn prevent_extensions(&self) {
        self.0.borrow_mut().extensible = false;
    }

    /// Make the object non-extensible with every property read-only and
    /// non-configurable. Frozen objects are never observed.
    pub fn freeze(&self) {
        let mut data = self.0.borrow_mut();
        data.extensible = false;
        data.frozen = true;
        for prop in data.props.values_mut() {
            prop.configurable = false;
            prop.writable = false;
        }
    }

    pub fn is_extensible(&self) -> bool {
        self.0.borrow().extensible
    }

    pub fn is_frozen(&self) -> bool {
        self.0.borrow().frozen
    }

    pub fn observer(&self) -> Option<Rc<Observer>> {
        self.0.borrow().observer.clone()
    }

    /// Whether `key` has been made reactive.
    pub fn is_reactive_property(&self, key: &str) -> bool {
        self.0
            .borrow()
            .props
            .get(key)
            .is_some_and(|prop| prop.binding.is_some())
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn data(&self) -> Ref<'_, ObjectData> {
        self.0.borrow()
    }

    pub(crate) fn data_mut(&self) -> RefMut<'_, ObjectData> {
        self.0.borrow_mut()
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let object = Object::new();
        {
            let mut data = object.0.borrow_mut();
            for (key, value) in iter {
                data.props
                    .insert(key.into(), Property::data(value.into(), PropertyFlags::default()));
            }
        }
        object
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(data) => f
                .debug_struct("Object")
                .field("kind", &data.kind)
                .field("keys", &data.props.keys().collect::<Vec<_>>())
                .field("observed", &data.observer.is_some())
                .finish(),
            Err(_) => f.write_str("Object { <borrowed> }"),
        }
    }
}
