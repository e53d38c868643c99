// bookshelf-core/src/query.rs
//! Query filters in the MongoDB filter language
//!
//! All matching logic lives in [`operators`]; [`Query`] is a validated
//! wrapper around the JSON filter.

pub mod operators;

use serde_json::Value;

use crate::document::Document;
use crate::error::Result;

pub use operators::matches_filter;

/// A validated query filter
#[derive(Debug, Clone)]
pub struct Query {
    json: Value,
}

impl Query {
    /// Empty filter (matches all documents)
    pub fn new() -> Self {
        Query {
            json: Value::Object(serde_json::Map::new()),
        }
    }

    /// Validate and wrap a JSON filter
    ///
    /// Unknown operators and malformed logical clauses are rejected here,
    /// before any document is scanned.
    pub fn from_json(json: &Value) -> Result<Self> {
        operators::validate_filter(json)?;
        Ok(Query { json: json.clone() })
    }

    pub fn matches(&self, document: &Document) -> Result<bool> {
        operators::matches_filter(document, &self.json)
    }

    /// `Some((field, value))` when the filter is a single literal equality,
    /// the shape an index lookup can answer.
    pub fn single_equality(&self) -> Option<(&str, &Value)> {
        let obj = self.json.as_object()?;
        if obj.len() != 1 {
            return None;
        }
        let (field, value) = obj.iter().next()?;
        if field.starts_with('$') {
            return None;
        }
        match value {
            Value::Object(_) | Value::Array(_) => None,
            literal => Some((field.as_str(), literal)),
        }
    }

    pub fn to_json(&self) -> &Value {
        &self.json
    }
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_new_is_empty() {
        let query = Query::new();
        assert!(query.to_json().as_object().unwrap().is_empty());
    }

    #[test]
    fn test_from_json_rejects_unknown_operator() {
        let err = Query::from_json(&json!({"price": {"$between": [1, 2]}})).unwrap_err();
        assert!(err.to_string().contains("Unknown operator"));
    }

    #[test]
    fn test_single_equality() {
        let q = Query::from_json(&json!({"title": "Dune"})).unwrap();
        assert_eq!(q.single_equality(), Some(("title", &json!("Dune"))));

        let q = Query::from_json(&json!({"title": {"$eq": "Dune"}})).unwrap();
        assert_eq!(q.single_equality(), None);

        let q = Query::from_json(&json!({"title": "Dune", "genre": "SF"})).unwrap();
        assert_eq!(q.single_equality(), None);
    }

    #[test]
    fn test_matches() {
        let doc = Document::from_value(json!({"_id": 1, "genre": "Fiction"})).unwrap();
        let q = Query::from_json(&json!({"genre": "Fiction"})).unwrap();
        assert!(q.matches(&doc).unwrap());
    }
}
