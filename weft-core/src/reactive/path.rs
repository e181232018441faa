//! Watch Path Expressions
//!
//! Watchers can be created from a dotted path like `"a.b.c"` instead of a
//! getter function. Only simple dot-delimited identifier paths are
//! supported; anything else is rejected (the caller warns and degrades to a
//! no-op getter). Missing or non-object intermediate segments resolve to
//! `Null`, matching the forgiving lookup semantics of the path form.

use std::sync::Arc;

use crate::reactive::watcher::Getter;
use crate::value::Value;

fn is_path_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '.'
}

/// Parse a dotted path into a getter that reads through the scope's root
/// data with tracked reads. Returns `None` when the path is not a simple
/// dot-delimited identifier sequence.
pub fn parse_path(path: &str) -> Option<Getter> {
    if path.is_empty() || !path.chars().all(is_path_char) {
        return None;
    }
    let segments: Vec<String> = path.split('.').map(str::to_string).collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return None;
    }
    Some(Arc::new(move |scope| {
        let mut current = Value::Object(scope.data().clone());
        for segment in &segments {
            current = match &current {
                Value::Object(obj) => obj.get(segment).unwrap_or(Value::Null),
                _ => return Ok(Value::Null),
            };
        }
        Ok(current)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;
    use crate::value::ObjectRef;
    use serde_json::json;

    #[test]
    fn rejects_complex_expressions() {
        assert!(parse_path("").is_none());
        assert!(parse_path("a.b[0]").is_none());
        assert!(parse_path("a + b").is_none());
        assert!(parse_path("a..b").is_none());
        assert!(parse_path(".a").is_none());
    }

    #[test]
    fn accepts_simple_paths() {
        assert!(parse_path("a").is_some());
        assert!(parse_path("a.b.c").is_some());
        assert!(parse_path("$data.value_1").is_some());
    }

    #[test]
    fn resolves_through_nested_objects() {
        let data = Value::from_json(&json!({"a": {"b": {"c": 42}}}));
        let scope = Scope::new(data.as_object().unwrap().clone());

        let getter = parse_path("a.b.c").unwrap();
        assert_eq!(getter(&scope).unwrap(), Value::Int(42));

        let getter = parse_path("a.missing.c").unwrap();
        assert_eq!(getter(&scope).unwrap(), Value::Null);
    }

    #[test]
    fn resolves_null_through_scalars() {
        let scope = Scope::new(ObjectRef::from_fields([("a".to_string(), Value::Int(1))]));
        let getter = parse_path("a.b").unwrap();
        assert_eq!(getter(&scope).unwrap(), Value::Null);
    }
}
