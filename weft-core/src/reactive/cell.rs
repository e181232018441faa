//! Reactive Cells
//!
//! A [`ReactiveCell`] is the explicit read/write interceptor wrapped around
//! one object field: it owns the field's [`Dep`], collects the currently
//! evaluating watcher on read, and notifies on writes that actually change
//! the value.
//!
//! A cell normally stores its value directly. Alternatively it can delegate
//! to a pre-existing accessor pair (a getter, and optionally a setter);
//! that is how computed fields are exposed. A cell with a getter but no
//! setter is read-only: writes warn and degrade to a no-op.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::reactive::array::depend_array;
use crate::reactive::dep::{is_tracking, Dep};
use crate::reactive::observer::{observe, Observer};
use crate::value::Value;

/// A delegated read accessor.
pub type AccessorFn = Arc<dyn Fn() -> Value + Send + Sync>;
/// A delegated write accessor.
pub type MutatorFn = Arc<dyn Fn(Value) + Send + Sync>;

/// One intercepted field: a boxed value (or accessor pair) plus its dep.
pub struct ReactiveCell {
    /// Field name, for diagnostics only.
    key: String,
    dep: Dep,
    value: RwLock<Value>,
    /// Observer of the current value, when the value is an observed
    /// container. Re-resolved on every write.
    child_ob: RwLock<Option<Arc<Observer>>>,
    getter: Option<AccessorFn>,
    setter: Option<MutatorFn>,
}

impl ReactiveCell {
    /// Cell storing `value` directly. The value is recursively observed.
    pub(crate) fn new(key: &str, value: Value) -> ReactiveCell {
        let child_ob = observe(&value);
        ReactiveCell {
            key: key.to_string(),
            dep: Dep::new(),
            value: RwLock::new(value),
            child_ob: RwLock::new(child_ob),
            getter: None,
            setter: None,
        }
    }

    /// Cell delegating to an accessor pair.
    pub(crate) fn with_accessors(
        key: &str,
        getter: AccessorFn,
        setter: Option<MutatorFn>,
    ) -> ReactiveCell {
        ReactiveCell {
            key: key.to_string(),
            dep: Dep::new(),
            value: RwLock::new(Value::Null),
            child_ob: RwLock::new(None),
            getter: Some(getter),
            setter,
        }
    }

    pub(crate) fn dep(&self) -> &Dep {
        &self.dep
    }

    /// Read the value, collecting dependencies if a watcher is evaluating:
    /// this cell's dep, the child container's observer dep, and (because
    /// indexed element access is not intercepted) every observed element's
    /// dep when the value is an array.
    pub fn get(&self) -> Value {
        let value = match &self.getter {
            Some(getter) => getter(),
            None => self.value.read().clone(),
        };
        if is_tracking() {
            self.dep.depend();
            let child = self.child_ob.read().clone();
            if let Some(child) = child {
                child.dep().depend();
                if let Value::Array(arr) = &value {
                    depend_array(arr);
                }
            }
        }
        value
    }

    /// Read the value without collecting anything.
    pub fn get_untracked(&self) -> Value {
        match &self.getter {
            Some(getter) => getter(),
            None => self.value.read().clone(),
        }
    }

    /// Write the value and notify subscribers.
    ///
    /// Skipped entirely when the new value is the same as the old one
    /// (two NaN floats count as the same). Read-only cells warn and ignore
    /// the write. The new value is recursively observed so nested containers
    /// stay reactive.
    pub fn set(&self, new_value: Value) {
        let old = match &self.getter {
            Some(getter) => getter(),
            None => self.value.read().clone(),
        };
        if new_value.same_value(&old) {
            return;
        }
        if self.getter.is_some() && self.setter.is_none() {
            tracing::warn!(
                target: "weft",
                field = %self.key,
                "write to read-only reactive field ignored"
            );
            return;
        }
        match &self.setter {
            Some(setter) => setter(new_value.clone()),
            None => *self.value.write() = new_value.clone(),
        }
        *self.child_ob.write() = observe(&new_value);
        self.dep.notify();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_returns_values() {
        let cell = ReactiveCell::new("a", Value::Int(1));
        assert_eq!(cell.get(), Value::Int(1));

        cell.set(Value::Int(2));
        assert_eq!(cell.get(), Value::Int(2));
        assert_eq!(cell.get_untracked(), Value::Int(2));
    }

    #[test]
    fn same_value_write_is_ignored() {
        let cell = ReactiveCell::new("a", Value::Float(f64::NAN));
        // A second NaN is "the same value": nothing to store, nothing to
        // notify. Observable here only through the absence of change.
        cell.set(Value::Float(f64::NAN));
        assert!(cell.get().as_f64().unwrap().is_nan());

        let cell = ReactiveCell::new("b", Value::Int(1));
        cell.set(Value::Int(1));
        assert_eq!(cell.get(), Value::Int(1));
    }

    #[test]
    fn accessor_cell_reads_through_getter() {
        let getter: AccessorFn = Arc::new(|| Value::Int(42));
        let cell = ReactiveCell::with_accessors("computed", getter, None);
        assert_eq!(cell.get(), Value::Int(42));
        assert_eq!(cell.get_untracked(), Value::Int(42));
    }

    #[test]
    fn read_only_cell_ignores_writes() {
        let getter: AccessorFn = Arc::new(|| Value::Int(42));
        let cell = ReactiveCell::with_accessors("computed", getter, None);
        cell.set(Value::Int(7));
        assert_eq!(cell.get(), Value::Int(42));
    }

    #[test]
    fn accessor_cell_writes_through_setter() {
        let backing = Arc::new(RwLock::new(Value::Int(0)));
        let read = Arc::clone(&backing);
        let write = Arc::clone(&backing);
        let getter: AccessorFn = Arc::new(move || read.read().clone());
        let setter: MutatorFn = Arc::new(move |v| *write.write() = v);

        let cell = ReactiveCell::with_accessors("proxied", getter, Some(setter));
        cell.set(Value::Int(9));
        assert_eq!(cell.get(), Value::Int(9));
        assert_eq!(backing.read().clone(), Value::Int(9));
    }
}
