//! Deep Observation
//!
//! Observing a container converts it, recursively, into reactive form: every
//! object field becomes an intercepting [`ReactiveCell`], every nested
//! container gets its own [`Observer`], and arrays additionally answer
//! structural changes through their instrumented mutators.
//!
//! # The Observer
//!
//! Each observed container carries exactly one `Observer`, reachable through
//! a hidden back-reference on the container. The observer owns the
//! container's own dep, the channel that signals identity-level shape
//! changes (a reactively added key, a list mutation) as opposed to a field's
//! value change, and counts how many scopes hold the container as their
//! root data (`vm_count`), which guards against runtime shape changes on
//! root containers.
//!
//! Observation is idempotent: observing an already-observed value returns
//! the existing observer. It can also be suspended globally with
//! [`toggle_observing`], used when constructing internal values that must
//! not become reactive.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::reactive::array::observe_items;
use crate::reactive::cell::{AccessorFn, MutatorFn, ReactiveCell};
use crate::reactive::dep::Dep;
use crate::value::{Field, ObjectRef, Value};

static SHOULD_OBSERVE: AtomicBool = AtomicBool::new(true);

/// Suspend or resume observation globally.
pub fn toggle_observing(enabled: bool) {
    SHOULD_OBSERVE.store(enabled, Ordering::SeqCst);
}

/// Whether `observe` currently instruments new containers.
pub fn is_observing() -> bool {
    SHOULD_OBSERVE.load(Ordering::SeqCst)
}

/// Per-container observation state: the container's own dep plus the count
/// of scopes holding the container as root data.
pub struct Observer {
    dep: Dep,
    vm_count: AtomicUsize,
}

impl Observer {
    fn new() -> Observer {
        Observer {
            dep: Dep::new(),
            vm_count: AtomicUsize::new(0),
        }
    }

    /// The container's identity-level change channel.
    pub fn dep(&self) -> &Dep {
        &self.dep
    }

    /// How many scopes hold this container as their root data.
    pub fn vm_count(&self) -> usize {
        self.vm_count.load(Ordering::SeqCst)
    }

    pub(crate) fn inc_vm_count(&self) {
        self.vm_count.fetch_add(1, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("dep_id", &self.dep.id())
            .field("vm_count", &self.vm_count())
            .finish()
    }
}

/// Attempt to observe a value.
///
/// Returns the (new or pre-existing) observer for containers, `None` for
/// scalars or when observation is suspended.
pub fn observe(value: &Value) -> Option<Arc<Observer>> {
    match value {
        Value::Object(obj) => {
            if let Some(ob) = obj.inner.ob.get() {
                return Some(Arc::clone(ob));
            }
            if !is_observing() {
                return None;
            }
            let mut created = false;
            let ob = Arc::clone(obj.inner.ob.get_or_init(|| {
                created = true;
                Arc::new(Observer::new())
            }));
            if created {
                walk(obj);
            }
            Some(ob)
        }
        Value::Array(arr) => {
            if let Some(ob) = arr.inner.ob.get() {
                return Some(Arc::clone(ob));
            }
            if !is_observing() {
                return None;
            }
            let mut created = false;
            let ob = Arc::clone(arr.inner.ob.get_or_init(|| {
                created = true;
                Arc::new(Observer::new())
            }));
            if created {
                observe_items(arr);
            }
            Some(ob)
        }
        _ => None,
    }
}

/// Observe a value as some scope's root data: observes it and bumps the
/// observer's root count.
pub fn observe_root(value: &Value) -> Option<Arc<Observer>> {
    let ob = observe(value);
    if let Some(ob) = &ob {
        ob.inc_vm_count();
    }
    ob
}

/// Convert every plain field of `obj` into a reactive cell.
fn walk(obj: &ObjectRef) {
    for key in obj.keys() {
        let plain = {
            let fields = obj.inner.fields.read();
            match fields.get(&key) {
                Some(Field::Plain(value)) => Some(value.clone()),
                _ => None,
            }
        };
        if let Some(value) = plain {
            define_reactive(obj, &key, value);
        }
    }
}

/// Install a reactive cell for one field, replacing any existing slot.
///
/// This is the binder entry point used both by the observation walk and by
/// callers wiring up a single field dynamically.
pub fn define_reactive(obj: &ObjectRef, key: &str, value: Value) {
    let cell = Arc::new(ReactiveCell::new(key, value));
    obj.inner
        .fields
        .write()
        .insert(key.to_string(), Field::Reactive(cell));
}

/// Install a reactive cell that delegates to a pre-existing accessor pair.
/// With no setter the field is read-only.
pub fn define_reactive_accessor(
    obj: &ObjectRef,
    key: &str,
    getter: AccessorFn,
    setter: Option<MutatorFn>,
) {
    let cell = Arc::new(ReactiveCell::with_accessors(key, getter, setter));
    obj.inner
        .fields
        .write()
        .insert(key.to_string(), Field::Reactive(cell));
}

/// Reactively add (or update) a key on an object.
///
/// Existing keys take the plain write path. Adding a key to an observed
/// object defines a reactive cell and notifies the object's own dep, so
/// watchers that read the container pick up the new shape. Adding to a root
/// data container warns and degrades to a no-op; adding to a non-observed
/// object is a plain insert.
pub fn set_key(obj: &ObjectRef, key: &str, value: Value) -> Value {
    if obj.contains_key(key) {
        obj.set(key, value.clone());
        return value;
    }
    let Some(ob) = obj.observer() else {
        obj.set(key, value.clone());
        return value;
    };
    if ob.vm_count() > 0 {
        tracing::warn!(
            target: "weft",
            key,
            "avoid adding reactive fields to root data at runtime; declare them upfront"
        );
        return value;
    }
    define_reactive(obj, key, value.clone());
    ob.dep().notify();
    value
}

/// Reactively delete a key from an object, notifying the object's own dep.
/// Deleting from a root data container warns and degrades to a no-op.
pub fn delete_key(obj: &ObjectRef, key: &str) {
    let ob = obj.observer();
    if let Some(ob) = &ob {
        if ob.vm_count() > 0 {
            tracing::warn!(
                target: "weft",
                key,
                "avoid deleting fields on root data at runtime; set them to null instead"
            );
            return;
        }
    }
    let removed = obj.inner.fields.write().shift_remove(key);
    if removed.is_none() {
        return;
    }
    if let Some(ob) = ob {
        ob.dep().notify();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn observe_scalars_is_none() {
        assert!(observe(&Value::Int(1)).is_none());
        assert!(observe(&Value::Null).is_none());
        assert!(observe(&Value::from("s")).is_none());
    }

    #[test]
    fn observe_is_idempotent() {
        let value = Value::from_json(&json!({"a": 1}));
        let first = observe(&value).expect("observer");
        let second = observe(&value).expect("observer");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.dep().id(), second.dep().id());
    }

    #[test]
    fn observation_recurses_into_nested_containers() {
        let value = Value::from_json(&json!({"nested": {"x": 1}, "list": [{"y": 2}]}));
        observe(&value).expect("observer");

        let obj = value.as_object().unwrap();
        let nested = obj.get_untracked("nested").unwrap();
        assert!(nested.observer().is_some());

        let list = obj.get_untracked("list").unwrap();
        assert!(list.observer().is_some());
        let element = list.as_array().unwrap().get(0).unwrap();
        assert!(element.observer().is_some());
    }

    #[test]
    fn observe_root_counts_roots() {
        let value = Value::from_json(&json!({"a": 1}));
        let ob = observe_root(&value).expect("observer");
        assert_eq!(ob.vm_count(), 1);
        observe_root(&value);
        assert_eq!(ob.vm_count(), 2);
    }

    #[test]
    fn set_key_on_unobserved_object_is_plain() {
        let obj = ObjectRef::new();
        set_key(&obj, "a", Value::Int(1));
        assert_eq!(obj.get("a"), Some(Value::Int(1)));
        assert!(obj.observer().is_none());
    }

    #[test]
    fn set_key_on_root_data_is_refused() {
        let value = Value::from_json(&json!({"a": 1}));
        observe_root(&value);
        let obj = value.as_object().unwrap();

        set_key(obj, "b", Value::Int(2));
        assert!(!obj.contains_key("b"));
    }

    #[test]
    fn delete_key_removes_field() {
        let value = Value::from_json(&json!({"inner": {"a": 1, "b": 2}}));
        observe(&value);
        let inner = value.as_object().unwrap().get_untracked("inner").unwrap();
        let inner = inner.as_object().unwrap();

        delete_key(inner, "a");
        assert!(!inner.contains_key("a"));
        assert!(inner.contains_key("b"));
    }
}
