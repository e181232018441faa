//! Deep Traversal
//!
//! Deep watchers need to re-run when anything inside their value changes,
//! not just when the value's identity changes. After a deep watcher's
//! evaluation, [`traverse`] touches every reachable field with tracked
//! reads, so the full subtree's deps end up registered on the watcher.
//!
//! Observed containers are de-duplicated by their observer dep id, which
//! also terminates traversal of cyclic structures.

use std::collections::HashSet;

use crate::value::Value;

/// Recursively read every field/element of `value`, registering
/// dependencies with the currently evaluating watcher.
pub fn traverse(value: &Value) {
    let mut seen = HashSet::new();
    traverse_inner(value, &mut seen);
}

fn traverse_inner(value: &Value, seen: &mut HashSet<u64>) {
    match value {
        Value::Object(obj) => {
            if let Some(ob) = obj.observer() {
                if !seen.insert(ob.dep().id()) {
                    return;
                }
            }
            for key in obj.keys() {
                // tracked read: registers the field's dep
                if let Some(child) = obj.get(&key) {
                    traverse_inner(&child, seen);
                }
            }
        }
        Value::Array(arr) => {
            if let Some(ob) = arr.observer() {
                if !seen.insert(ob.dep().id()) {
                    return;
                }
            }
            for item in arr.snapshot() {
                traverse_inner(&item, seen);
            }
        }
        _ => {}
    }
}
