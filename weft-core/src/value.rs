//! Reactive Value Model
//!
//! The engine observes dynamic structured data, so values are represented by
//! a [`Value`] enum rather than static Rust types: scalars plus two
//! `Arc`-shared container handles, [`ObjectRef`] and [`ArrayRef`]. Cloning a
//! `Value` is cheap and aliases containers, which is what makes identity
//! semantics (and the hidden observer back-reference) work.
//!
//! # Two notions of equality
//!
//! 1. `PartialEq` is change-detection equality, used when a watcher decides
//!    whether its re-evaluated result differs from the cached one: scalars by
//!    value with IEEE float semantics (`NaN != NaN`), containers by identity.
//!
//! 2. [`Value::same_value`] is write-suppression equality, used by reactive
//!    cells to skip redundant notifications: identical to `PartialEq` except
//!    that two NaN floats compare equal, so re-writing NaN over NaN does not
//!    notify. The asymmetry is load-bearing; keep the two paths distinct.
//!
//! # Field slots
//!
//! An object's field is either `Plain` (an uninstrumented value, as stored
//! before the object is observed or when a key is added by plain assignment)
//! or `Reactive` (an explicit cell that intercepts reads and writes). The
//! [`crate::reactive::observe`] walk converts plain slots to reactive ones.

use std::fmt;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::reactive::{Observer, ReactiveCell};

/// A dynamically typed, observable value.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Object(ObjectRef),
    Array(ArrayRef),
}

impl Value {
    /// Whether this value is a container (object or array).
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_))
    }

    /// Write-suppression equality: like `==`, but two NaN floats are equal.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self == other,
        }
    }

    /// The observer attached to this value, if it is an observed container.
    pub fn observer(&self) -> Option<Arc<Observer>> {
        match self {
            Value::Object(obj) => obj.observer(),
            Value::Array(arr) => arr.observer(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Build a plain (unobserved) value tree from JSON.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                ArrayRef::from_items(items.iter().map(Value::from_json).collect()).into()
            }
            serde_json::Value::Object(fields) => ObjectRef::from_fields(
                fields.iter().map(|(k, v)| (k.clone(), Value::from_json(v))),
            )
            .into(),
        }
    }

    /// Snapshot this value tree as JSON without registering dependencies.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Float(n) => serde_json::Value::from(*n),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Object(obj) => {
                let mut map = serde_json::Map::new();
                for key in obj.keys() {
                    if let Some(v) = obj.get_untracked(&key) {
                        map.insert(key, v.to_json());
                    }
                }
                serde_json::Value::Object(map)
            }
            Value::Array(arr) => {
                serde_json::Value::Array(arr.snapshot().iter().map(Value::to_json).collect())
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Float(n) => write!(f, "Float({n})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Object(obj) => write!(f, "Object(len={})", obj.len()),
            Value::Array(arr) => write!(f, "Array(len={})", arr.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Value {
        Value::Int(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Value {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Value {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Str(s)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Value {
        Value::Object(obj)
    }
}

impl From<ArrayRef> for Value {
    fn from(arr: ArrayRef) -> Value {
        Value::Array(arr)
    }
}

/// A field slot inside an object.
pub(crate) enum Field {
    /// Uninstrumented value. Reads and writes are plain.
    Plain(Value),
    /// Intercepted value. Reads collect dependencies, writes notify.
    Reactive(Arc<ReactiveCell>),
}

pub(crate) struct ObjectInner {
    pub(crate) fields: RwLock<IndexMap<String, Field>>,
    /// Hidden back-reference to this container's observer, set once on
    /// first observation.
    pub(crate) ob: OnceLock<Arc<Observer>>,
}

/// A shared handle to an observable object (ordered string-keyed fields).
#[derive(Clone)]
pub struct ObjectRef {
    pub(crate) inner: Arc<ObjectInner>,
}

impl ObjectRef {
    pub fn new() -> ObjectRef {
        ObjectRef::from_fields(std::iter::empty())
    }

    pub fn from_fields(fields: impl IntoIterator<Item = (String, Value)>) -> ObjectRef {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (k, Field::Plain(v)))
            .collect();
        ObjectRef {
            inner: Arc::new(ObjectInner {
                fields: RwLock::new(fields),
                ob: OnceLock::new(),
            }),
        }
    }

    /// Read a field. If the field is reactive and a watcher is currently
    /// evaluating, the read registers a dependency.
    pub fn get(&self, key: &str) -> Option<Value> {
        let cell = {
            let fields = self.inner.fields.read();
            match fields.get(key) {
                None => return None,
                Some(Field::Plain(v)) => return Some(v.clone()),
                Some(Field::Reactive(cell)) => Arc::clone(cell),
            }
        };
        Some(cell.get())
    }

    /// Read a field without registering any dependency.
    pub fn get_untracked(&self, key: &str) -> Option<Value> {
        let cell = {
            let fields = self.inner.fields.read();
            match fields.get(key) {
                None => return None,
                Some(Field::Plain(v)) => return Some(v.clone()),
                Some(Field::Reactive(cell)) => Arc::clone(cell),
            }
        };
        Some(cell.get_untracked())
    }

    /// Write a field. Reactive fields go through their cell (same-value
    /// suppression, child observation, notification). A missing key is
    /// inserted as a plain, non-reactive field; use
    /// [`crate::reactive::set_key`] for a reactive structural add.
    pub fn set(&self, key: &str, value: Value) {
        let cell = {
            let mut fields = self.inner.fields.write();
            match fields.get_mut(key) {
                None => {
                    fields.insert(key.to_string(), Field::Plain(value));
                    return;
                }
                Some(Field::Plain(slot)) => {
                    *slot = value;
                    return;
                }
                Some(Field::Reactive(cell)) => Arc::clone(cell),
            }
        };
        cell.set(value);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.fields.read().contains_key(key)
    }

    /// Field names, in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.fields.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.fields.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.fields.read().is_empty()
    }

    /// The observer attached to this object, if it has been observed.
    pub fn observer(&self) -> Option<Arc<Observer>> {
        self.inner.ob.get().cloned()
    }

    /// Identity comparison: do both handles alias the same object?
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for ObjectRef {
    fn default() -> ObjectRef {
        ObjectRef::new()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("len", &self.len())
            .field("observed", &self.observer().is_some())
            .finish()
    }
}

pub(crate) struct ArrayInner {
    pub(crate) items: RwLock<Vec<Value>>,
    pub(crate) ob: OnceLock<Arc<Observer>>,
}

/// A shared handle to an observable array.
///
/// Direct indexed access is not intercepted; structural changes are made
/// observable through the instrumented mutators in
/// [`crate::reactive::array`].
#[derive(Clone)]
pub struct ArrayRef {
    pub(crate) inner: Arc<ArrayInner>,
}

impl ArrayRef {
    pub fn new() -> ArrayRef {
        ArrayRef::from_items(Vec::new())
    }

    pub fn from_items(items: Vec<Value>) -> ArrayRef {
        ArrayRef {
            inner: Arc::new(ArrayInner {
                items: RwLock::new(items),
                ob: OnceLock::new(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.read().is_empty()
    }

    /// Read one element. Not intercepted: element reads register no
    /// dependency of their own (the read of the field holding this array
    /// already registered the array's deps).
    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner.items.read().get(index).cloned()
    }

    /// Clone the current elements.
    pub fn snapshot(&self) -> Vec<Value> {
        self.inner.items.read().clone()
    }

    /// The observer attached to this array, if it has been observed.
    pub fn observer(&self) -> Option<Arc<Observer>> {
        self.inner.ob.get().cloned()
    }

    /// Identity comparison: do both handles alias the same array?
    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for ArrayRef {
    fn default() -> ArrayRef {
        ArrayRef::new()
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayRef")
            .field("len", &self.len())
            .field("observed", &self.observer().is_some())
            .finish()
    }
}
