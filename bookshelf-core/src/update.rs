// bookshelf-core/src/update.rs
// Update operators: $set, $inc, $unset

use serde_json::Value;

use crate::document::Document;
use crate::error::{BookshelfError, Result};
use crate::value_utils::values_equal;

/// A parsed update document
#[derive(Debug, Clone)]
pub struct Update {
    ops: Vec<UpdateOp>,
}

#[derive(Debug, Clone)]
enum UpdateOp {
    Set(String, Value),
    Inc(String, f64, bool),
    Unset(String),
}

impl Update {
    /// Parse `{"$set": {...}, "$inc": {...}, "$unset": {...}}`
    pub fn from_json(update_json: &Value) -> Result<Self> {
        let obj = update_json
            .as_object()
            .ok_or_else(|| BookshelfError::InvalidQuery("Update must be an object".into()))?;

        if obj.is_empty() {
            return Err(BookshelfError::InvalidQuery(
                "Update must contain at least one operator".into(),
            ));
        }

        let mut ops = Vec::new();
        for (op, spec) in obj {
            let fields = spec.as_object().ok_or_else(|| {
                BookshelfError::InvalidQuery(format!("{} requires an object", op))
            })?;

            for (field, value) in fields {
                if field == "_id" {
                    return Err(BookshelfError::InvalidQuery(
                        "_id is immutable and cannot be updated".into(),
                    ));
                }
                match op.as_str() {
                    "$set" => ops.push(UpdateOp::Set(field.clone(), value.clone())),
                    "$inc" => {
                        let by = value.as_f64().ok_or_else(|| {
                            BookshelfError::InvalidQuery(format!("$inc on '{}' needs a number", field))
                        })?;
                        ops.push(UpdateOp::Inc(field.clone(), by, value.is_i64()));
                    }
                    "$unset" => ops.push(UpdateOp::Unset(field.clone())),
                    other => {
                        return Err(BookshelfError::InvalidQuery(format!(
                            "Unknown update operator: {}",
                            other
                        )))
                    }
                }
            }
        }

        Ok(Update { ops })
    }

    /// `{"$set": {field: value}}`
    pub fn set(field: &str, value: Value) -> Self {
        Update {
            ops: vec![UpdateOp::Set(field.to_string(), value)],
        }
    }

    /// Apply to a document; returns whether anything changed
    pub fn apply(&self, document: &mut Document) -> Result<bool> {
        let mut modified = false;

        for op in &self.ops {
            match op {
                UpdateOp::Set(field, value) => {
                    let unchanged = document
                        .get(field)
                        .is_some_and(|current| values_equal(current, value));
                    if !unchanged {
                        document.set(field, value.clone());
                        modified = true;
                    }
                }
                UpdateOp::Inc(field, by, integral) => {
                    let next = match document.get(field) {
                        None | Some(Value::Null) => number(*by, *integral),
                        Some(Value::Number(n)) if n.is_i64() && *integral => {
                            Value::from(n.as_i64().unwrap_or(0).saturating_add(*by as i64))
                        }
                        Some(Value::Number(n)) => Value::from(n.as_f64().unwrap_or(0.0) + by),
                        Some(other) => {
                            return Err(BookshelfError::InvalidQuery(format!(
                                "Cannot apply $inc to non-numeric field '{}': {}",
                                field, other
                            )))
                        }
                    };
                    if *by != 0.0 || document.get(field).is_none() {
                        document.set(field, next);
                        modified = true;
                    }
                }
                UpdateOp::Unset(field) => {
                    if document.remove(field) {
                        modified = true;
                    }
                }
            }
        }

        Ok(modified)
    }
}

fn number(n: f64, integral: bool) -> Value {
    if integral {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}
