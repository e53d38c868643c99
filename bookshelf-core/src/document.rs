// bookshelf-core/src/document.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{BookshelfError, Result};
use crate::value_utils::{get_nested_value, set_nested_value};

/// Stored document: the full JSON object, `_id` included
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Document {
    id: DocumentId,
    body: Map<String, Value>,
}

/// Document ID types
/// Untagged so that it appears as a plain value in documents: {"_id": 2}
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(untagged)]
pub enum DocumentId {
    Int(i64),
    String(String),
}

impl DocumentId {
    /// Next auto-increment ID
    pub fn new_auto(last_id: u64) -> Self {
        DocumentId::Int((last_id + 1) as i64)
    }

    pub fn to_value(&self) -> Value {
        match self {
            DocumentId::Int(n) => Value::from(*n),
            DocumentId::String(s) => Value::from(s.as_str()),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(DocumentId::Int),
            Value::String(s) => Some(DocumentId::String(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentId::Int(n) => write!(f, "{}", n),
            DocumentId::String(s) => write!(f, "{}", s),
        }
    }
}

impl Document {
    /// Build a document from its fields, stamping `_id` first
    pub fn new(id: DocumentId, fields: Map<String, Value>) -> Self {
        let mut body = Map::with_capacity(fields.len() + 1);
        body.insert("_id".to_string(), id.to_value());
        for (key, value) in fields {
            if key != "_id" {
                body.insert(key, value);
            }
        }
        Document { id, body }
    }

    /// Parse a stored JSON object; `_id` must be present
    pub fn from_value(value: Value) -> Result<Self> {
        let body = match value {
            Value::Object(map) => map,
            other => {
                return Err(BookshelfError::Serialization(format!(
                    "Document must be an object, got {}",
                    other
                )))
            }
        };

        let id = body
            .get("_id")
            .and_then(DocumentId::from_value)
            .ok_or_else(|| BookshelfError::Serialization("Document has no valid _id".into()))?;

        Ok(Document { id, body })
    }

    /// Matching view over an object that has no usable `_id`
    /// (aggregation output); the body is kept untouched.
    pub(crate) fn detached(body: Map<String, Value>) -> Self {
        Document {
            id: DocumentId::Int(0),
            body,
        }
    }

    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    /// Field lookup with dot notation ("address.city"), `_id` included
    pub fn get(&self, field: &str) -> Option<&Value> {
        if field.is_empty() {
            return None;
        }
        match self.body.get(field) {
            Some(value) => Some(value),
            None if field.contains('.') => {
                let (head, rest) = field.split_once('.')?;
                get_nested_value(self.body.get(head)?, rest)
            }
            None => None,
        }
    }

    /// Set a field, creating intermediate objects for dotted paths.
    /// `_id` is immutable and silently ignored.
    pub fn set(&mut self, field: &str, value: Value) {
        if field == "_id" {
            return;
        }
        match field.split_once('.') {
            None => {
                self.body.insert(field.to_string(), value);
            }
            Some((head, rest)) => {
                let root = self
                    .body
                    .entry(head.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !root.is_object() {
                    *root = Value::Object(Map::new());
                }
                set_nested_value(root, rest, value);
            }
        }
    }

    /// Remove a top-level field; returns whether it existed
    pub fn remove(&mut self, field: &str) -> bool {
        if field == "_id" {
            return false;
        }
        self.body.shift_remove(field).is_some()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.body
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.body.clone())
    }
}

impl TryFrom<Value> for Document {
    type Error = BookshelfError;

    fn try_from(value: Value) -> Result<Self> {
        Document::from_value(value)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Value::Object(doc.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_new_puts_id_first() {
        let doc = Document::new(DocumentId::Int(7), fields(json!({"title": "Dune"})));
        let keys: Vec<_> = doc.as_map().keys().cloned().collect();
        assert_eq!(keys, vec!["_id", "title"]);
        assert_eq!(doc.get("_id"), Some(&json!(7)));
    }

    #[test]
    fn test_from_value_requires_id() {
        assert!(Document::from_value(json!({"title": "Dune"})).is_err());
        assert!(Document::from_value(json!([1, 2])).is_err());

        let doc = Document::from_value(json!({"_id": "abc", "title": "Dune"})).unwrap();
        assert_eq!(doc.id(), &DocumentId::String("abc".into()));
    }

    #[test]
    fn test_get_dot_notation() {
        let doc = Document::from_value(json!({
            "_id": 1,
            "meta": {"isbn": {"13": "978-0441013593"}}
        }))
        .unwrap();

        assert_eq!(doc.get("meta.isbn.13"), Some(&json!("978-0441013593")));
        assert_eq!(doc.get("meta.missing"), None);
        assert_eq!(doc.get(""), None);
    }

    #[test]
    fn test_set_and_remove() {
        let mut doc = Document::new(DocumentId::Int(1), Map::new());
        doc.set("price", json!(9.5));
        doc.set("meta.edition", json!(2));
        doc.set("_id", json!(99));

        assert_eq!(doc.get("price"), Some(&json!(9.5)));
        assert_eq!(doc.get("meta.edition"), Some(&json!(2)));
        assert_eq!(doc.id(), &DocumentId::Int(1));

        assert!(doc.remove("price"));
        assert!(!doc.remove("price"));
        assert!(!doc.remove("_id"));
    }

    #[test]
    fn test_serde_is_transparent() {
        let doc = Document::new(DocumentId::Int(3), fields(json!({"genre": "Fiction"})));
        let text = serde_json::to_string(&doc).unwrap();
        assert_eq!(text, r#"{"_id":3,"genre":"Fiction"}"#);

        let back: Document = serde_json::from_str(&text).unwrap();
        assert_eq!(back, doc);
    }
}
