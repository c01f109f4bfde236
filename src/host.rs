//! Dynamic host-side value model.
//!
//! The host environment is JS-shaped: values are loosely typed, objects
//! are shared mutable property bags with identity, and "no value" comes
//! in two flavors (`Null` and `Undefined`) that some APIs distinguish.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A host-provided function callable through a bound import.
///
/// Failures are stringly typed; the dispatcher routes them into the
/// caller's exception slot.
pub type HostFunction = Rc<dyn Fn(&[HostValue]) -> Result<HostValue, String>>;

/// A dynamically typed host value.
#[derive(Debug, Clone)]
pub enum HostValue {
    Undefined,
    Null,
    Bool(bool),
    /// All numerics up to 32 bits, plus both float widths.
    Number(f64),
    /// Raw bits of a 64-bit integer; signedness comes from the declared
    /// parameter type.
    BigInt(u64),
    String(String),
    Object(HostObject),
    Array(Vec<HostValue>),
}

impl HostValue {
    /// Either of the two host "no value" states.
    pub fn is_absent(&self) -> bool {
        matches!(self, HostValue::Undefined | HostValue::Null)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            HostValue::Undefined => "undefined",
            HostValue::Null => "null",
            HostValue::Bool(_) => "bool",
            HostValue::Number(_) => "number",
            HostValue::BigInt(_) => "bigint",
            HostValue::String(_) => "string",
            HostValue::Object(_) => "object",
            HostValue::Array(_) => "array",
        }
    }
}

impl PartialEq for HostValue {
    /// Bit-exact for numbers, identity for objects.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Undefined, HostValue::Undefined) => true,
            (HostValue::Null, HostValue::Null) => true,
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::Number(a), HostValue::Number(b)) => a.to_bits() == b.to_bits(),
            (HostValue::BigInt(a), HostValue::BigInt(b)) => a == b,
            (HostValue::String(a), HostValue::String(b)) => a == b,
            (HostValue::Object(a), HostValue::Object(b)) => HostObject::ptr_eq(a, b),
            (HostValue::Array(a), HostValue::Array(b)) => a == b,
            _ => false,
        }
    }
}

#[derive(Default)]
struct ObjectData {
    properties: HashMap<String, HostValue>,
    /// Handle already assigned to this object by the tracker, so repeated
    /// crossings reuse it instead of minting a new one. Not visible as a
    /// property.
    tracking_handle: Option<u32>,
}

/// A shared host object with identity.
///
/// Clones refer to the same underlying property bag; equality is
/// identity ([`HostObject::ptr_eq`]), matching host-object semantics.
#[derive(Clone, Default)]
pub struct HostObject {
    inner: Rc<RefCell<ObjectData>>,
}

impl HostObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<HostValue> {
        self.inner.borrow().properties.get(key).cloned()
    }

    pub fn set(&self, key: &str, value: HostValue) {
        self.inner
            .borrow_mut()
            .properties
            .insert(key.to_string(), value);
    }

    pub fn ptr_eq(a: &HostObject, b: &HostObject) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    pub(crate) fn tracking_handle(&self) -> Option<u32> {
        self.inner.borrow().tracking_handle
    }

    pub(crate) fn set_tracking_handle(&self, handle: Option<u32>) {
        self.inner.borrow_mut().tracking_handle = handle;
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Property bags may be cyclic; print shape only.
        let data = self.inner.borrow();
        write!(f, "HostObject({} properties)", data.properties.len())
    }
}
