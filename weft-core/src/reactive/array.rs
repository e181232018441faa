//! Instrumented Array Mutations
//!
//! Indexed element access on an [`ArrayRef`] is deliberately not
//! intercepted; what makes arrays observable is this set of instrumented
//! mutators. Each one applies the structural change, recursively observes
//! any inserted values (when the array itself is observed), and notifies the
//! array's own dep so watchers that read the array re-evaluate.
//!
//! Because element reads register nothing on their own, a tracked read of a
//! field holding an array also registers every observed element's dep (see
//! [`depend_array`], called from the cell getter), so replacing state deep
//! inside a list is observable from a shallow read of the list.

use crate::reactive::observer::observe;
use crate::value::{ArrayRef, Value};

/// Recursively observe each element of an observed array.
pub(crate) fn observe_items(arr: &ArrayRef) {
    for item in arr.snapshot() {
        observe(&item);
    }
}

/// Register the observer dep of every observed element (recursively for
/// nested arrays) with the currently evaluating watcher.
pub(crate) fn depend_array(arr: &ArrayRef) {
    for item in arr.snapshot() {
        if let Some(ob) = item.observer() {
            ob.dep().depend();
        }
        if let Value::Array(nested) = &item {
            depend_array(nested);
        }
    }
}

impl ArrayRef {
    /// Observe `inserted` values and signal a structural change, if this
    /// array is observed.
    fn notify_mutation(&self, inserted: &[Value]) {
        if let Some(ob) = self.observer() {
            for item in inserted {
                observe(item);
            }
            ob.dep().notify();
        }
    }

    pub fn push(&self, value: Value) {
        self.inner.items.write().push(value.clone());
        self.notify_mutation(std::slice::from_ref(&value));
    }

    pub fn pop(&self) -> Option<Value> {
        let removed = self.inner.items.write().pop();
        if removed.is_some() {
            self.notify_mutation(&[]);
        }
        removed
    }

    /// Remove and return the first element.
    pub fn shift(&self) -> Option<Value> {
        let removed = {
            let mut items = self.inner.items.write();
            if items.is_empty() {
                None
            } else {
                Some(items.remove(0))
            }
        };
        if removed.is_some() {
            self.notify_mutation(&[]);
        }
        removed
    }

    /// Insert an element at the front.
    pub fn unshift(&self, value: Value) {
        self.inner.items.write().insert(0, value.clone());
        self.notify_mutation(std::slice::from_ref(&value));
    }

    /// Remove `delete_count` elements starting at `start` (both clamped to
    /// the current length) and insert `inserted` in their place. Returns the
    /// removed elements.
    pub fn splice(&self, start: usize, delete_count: usize, inserted: Vec<Value>) -> Vec<Value> {
        let removed: Vec<Value> = {
            let mut items = self.inner.items.write();
            let start = start.min(items.len());
            let end = (start + delete_count).min(items.len());
            items.splice(start..end, inserted.iter().cloned()).collect()
        };
        self.notify_mutation(&inserted);
        removed
    }

    /// Replace the element at `index`, growing the array if needed.
    /// This is the reactive indexed write (plain indexed writes don't exist
    /// on this type).
    pub fn set(&self, index: usize, value: Value) {
        {
            let mut items = self.inner.items.write();
            if index >= items.len() {
                items.resize(index, Value::Null);
            }
        }
        self.splice(index, 1, vec![value]);
    }

    /// Reactively remove the element at `index`, if present.
    pub fn remove(&self, index: usize) -> Option<Value> {
        if index >= self.len() {
            return None;
        }
        self.splice(index, 1, Vec::new()).into_iter().next()
    }

    pub fn reverse(&self) {
        self.inner.items.write().reverse();
        self.notify_mutation(&[]);
    }

    pub fn sort_by<F>(&self, compare: F)
    where
        F: FnMut(&Value, &Value) -> std::cmp::Ordering,
    {
        self.inner.items.write().sort_by(compare);
        self.notify_mutation(&[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn observed(items: serde_json::Value) -> ArrayRef {
        let value = Value::from_json(&items);
        observe(&value).expect("observer");
        value.as_array().unwrap().clone()
    }

    #[test]
    fn push_and_pop() {
        let arr = observed(json!([1, 2]));
        arr.push(Value::Int(3));
        assert_eq!(arr.len(), 3);
        assert_eq!(arr.get(2), Some(Value::Int(3)));

        assert_eq!(arr.pop(), Some(Value::Int(3)));
        assert_eq!(arr.len(), 2);
    }

    #[test]
    fn shift_and_unshift() {
        let arr = observed(json!([1, 2]));
        arr.unshift(Value::Int(0));
        assert_eq!(arr.get(0), Some(Value::Int(0)));

        assert_eq!(arr.shift(), Some(Value::Int(0)));
        assert_eq!(arr.get(0), Some(Value::Int(1)));
        assert_eq!(observed(json!([])).shift(), None);
    }

    #[test]
    fn splice_removes_and_inserts() {
        let arr = observed(json!([1, 2, 3, 4]));
        let removed = arr.splice(1, 2, vec![Value::Int(9)]);
        assert_eq!(removed, vec![Value::Int(2), Value::Int(3)]);
        assert_eq!(arr.snapshot(), vec![Value::Int(1), Value::Int(9), Value::Int(4)]);

        // out-of-range is clamped
        let removed = arr.splice(10, 5, vec![Value::Int(7)]);
        assert!(removed.is_empty());
        assert_eq!(arr.get(3), Some(Value::Int(7)));
    }

    #[test]
    fn set_grows_and_replaces() {
        let arr = observed(json!([1]));
        arr.set(0, Value::Int(5));
        assert_eq!(arr.get(0), Some(Value::Int(5)));

        arr.set(3, Value::Int(9));
        assert_eq!(arr.len(), 4);
        assert_eq!(arr.get(1), Some(Value::Null));
        assert_eq!(arr.get(3), Some(Value::Int(9)));
    }

    #[test]
    fn remove_out_of_range_is_none() {
        let arr = observed(json!([1]));
        assert_eq!(arr.remove(3), None);
        assert_eq!(arr.remove(0), Some(Value::Int(1)));
        assert!(arr.is_empty());
    }

    #[test]
    fn inserted_containers_become_observed() {
        let arr = observed(json!([]));
        let element = Value::from_json(&json!({"x": 1}));
        assert!(element.observer().is_none());

        arr.push(element.clone());
        assert!(element.observer().is_some());

        let spliced = Value::from_json(&json!({"y": 2}));
        arr.splice(0, 0, vec![spliced.clone()]);
        assert!(spliced.observer().is_some());
    }

    #[test]
    fn reverse_and_sort() {
        let arr = observed(json!([3, 1, 2]));
        arr.sort_by(|a, b| a.as_i64().cmp(&b.as_i64()));
        assert_eq!(
            arr.snapshot(),
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );
        arr.reverse();
        assert_eq!(
            arr.snapshot(),
            vec![Value::Int(3), Value::Int(2), Value::Int(1)]
        );
    }
}
