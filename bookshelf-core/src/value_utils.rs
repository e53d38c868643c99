//! Value utility functions shared across modules
//!
//! Nested field access, equality and ordering for JSON values.

use serde_json::Value;
use std::cmp::Ordering;

/// Get nested value from JSON with dot notation support
///
/// Supports:
/// - Simple fields: "title"
/// - Nested objects: "meta.isbn"
/// - Array indexing: "editions.0.year"
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use bookshelf_core::value_utils::get_nested_value;
///
/// let doc = json!({"meta": {"isbn": "978-0"}});
/// assert_eq!(get_nested_value(&doc, "meta.isbn"), Some(&json!("978-0")));
/// ```
pub fn get_nested_value<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    // Fast path: no dots means simple field access
    if !path.contains('.') {
        return doc.get(path);
    }

    let mut value = doc;
    for part in path.split('.') {
        match value {
            Value::Object(map) => value = map.get(part)?,
            Value::Array(arr) => {
                let index = part.parse::<usize>().ok()?;
                value = arr.get(index)?;
            }
            _ => return None,
        }
    }
    Some(value)
}

/// Set a value at a nested path, creating intermediate objects if needed
///
/// ```
/// use serde_json::json;
/// use bookshelf_core::value_utils::set_nested_value;
///
/// let mut doc = json!({"title": "Dune"});
/// set_nested_value(&mut doc, "meta.edition", json!(2));
/// assert_eq!(doc["meta"]["edition"], 2);
/// ```
pub fn set_nested_value(doc: &mut Value, path: &str, value: Value) {
    let mut current = doc;
    let mut parts = path.split('.').peekable();

    while let Some(part) = parts.next() {
        let map = match current {
            Value::Object(map) => map,
            // Cannot navigate into non-object
            _ => return,
        };

        if parts.peek().is_none() {
            map.insert(part.to_string(), value);
            return;
        }

        current = map
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
}

/// Equality with numeric normalisation: `10` equals `10.0`
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n1), Value::Number(n2)) => match (n1.as_f64(), n2.as_f64()) {
            (Some(f1), Some(f2)) => f1 == f2,
            _ => n1 == n2,
        },
        _ => a == b,
    }
}

/// Compare two JSON values
///
/// Returns `Some(Ordering)` for comparable types (numbers, strings, booleans),
/// `None` for incompatible types (e.g., comparing string to number).
///
/// ```
/// use serde_json::json;
/// use std::cmp::Ordering;
/// use bookshelf_core::value_utils::compare_values;
///
/// assert_eq!(compare_values(&json!(10), &json!(5)), Some(Ordering::Greater));
/// assert_eq!(compare_values(&json!("a"), &json!("b")), Some(Ordering::Less));
/// assert_eq!(compare_values(&json!("a"), &json!(1)), None);
/// ```
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(n1), Value::Number(n2)) => {
            let f1 = n1.as_f64()?;
            let f2 = n2.as_f64()?;
            f1.partial_cmp(&f2)
        }
        (Value::String(s1), Value::String(s2)) => Some(s1.cmp(s2)),
        (Value::Bool(b1), Value::Bool(b2)) => Some(b1.cmp(b2)),
        _ => None,
    }
}

/// Total order used for sorting mixed documents
///
/// Missing values sort first; values of different types are ordered by
/// type rank: null < number < string < bool < object < array.
pub fn compare_for_sort(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(av), Some(bv)) => compare_values(av, bv)
            .unwrap_or_else(|| type_rank(av).cmp(&type_rank(bv))),
    }
}

fn type_rank(val: &Value) -> u8 {
    match val {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Bool(_) => 3,
        Value::Object(_) => 4,
        Value::Array(_) => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_nested_value() {
        let doc = json!({
            "title": "Dune",
            "meta": {"isbn": {"13": "978-0441013593"}},
            "editions": [{"year": 1965}, {"year": 1990}]
        });

        assert_eq!(get_nested_value(&doc, "title"), Some(&json!("Dune")));
        assert_eq!(
            get_nested_value(&doc, "meta.isbn.13"),
            Some(&json!("978-0441013593"))
        );
        assert_eq!(get_nested_value(&doc, "editions.1.year"), Some(&json!(1990)));
        assert_eq!(get_nested_value(&doc, "editions.x.year"), None);
        assert_eq!(get_nested_value(&doc, "meta.missing"), None);
    }

    #[test]
    fn test_set_nested_value_creates_path() {
        let mut doc = json!({});
        set_nested_value(&mut doc, "a.b.c", json!(1));
        assert_eq!(doc, json!({"a": {"b": {"c": 1}}}));

        // Non-object in the way: no-op
        let mut doc = json!({"a": 5});
        set_nested_value(&mut doc, "a.b", json!(1));
        assert_eq!(doc, json!({"a": 5}));
    }

    #[test]
    fn test_values_equal_normalises_numbers() {
        assert!(values_equal(&json!(10), &json!(10.0)));
        assert!(!values_equal(&json!(10), &json!("10")));
        assert!(values_equal(&json!("x"), &json!("x")));
    }

    #[test]
    fn test_compare_for_sort_ranks() {
        assert_eq!(compare_for_sort(None, Some(&json!(1))), Ordering::Less);
        assert_eq!(
            compare_for_sort(Some(&json!(2.5)), Some(&json!(2))),
            Ordering::Greater
        );
        assert_eq!(
            compare_for_sort(Some(&json!(1)), Some(&json!("a"))),
            Ordering::Less
        );
        assert_eq!(
            compare_for_sort(Some(&json!(true)), Some(&json!("a"))),
            Ordering::Greater
        );
    }
}
