// bookshelf-core/src/find_options.rs
// Find query options: projection, sort, limit, skip

use crate::value_utils::{compare_for_sort, get_nested_value};
use serde_json::{Map, Value};

/// Options for find queries
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Projection: [(field, 1 include | 0 exclude)] in output order.
    /// `_id` may be excluded in include mode.
    pub projection: Option<Vec<(String, i32)>>,

    /// Sort: [(field, direction)], direction: 1 (asc) or -1 (desc)
    pub sort: Option<Vec<(String, i32)>>,

    /// Limit: maximum number of documents to return
    pub limit: Option<usize>,

    /// Skip: number of documents to skip (for pagination)
    pub skip: Option<usize>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projection(mut self, projection: Vec<(String, i32)>) -> Self {
        self.projection = Some(projection);
        self
    }

    /// Include-mode projection of `fields`, `_id` suppressed
    pub fn with_fields(self, fields: &[&str]) -> Self {
        let mut projection: Vec<(String, i32)> =
            fields.iter().map(|f| (f.to_string(), 1)).collect();
        projection.push(("_id".to_string(), 0));
        self.with_projection(projection)
    }

    pub fn with_sort(mut self, sort: Vec<(String, i32)>) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }
}

/// Apply projection to a document
/// Supports dot notation for nested fields (e.g., "meta.isbn")
pub fn apply_projection(doc: &Value, projection: &[(String, i32)]) -> Value {
    if projection.is_empty() {
        return doc.clone();
    }

    let obj = match doc {
        Value::Object(obj) => obj,
        other => return other.clone(),
    };

    let action_of = |field: &str| {
        projection
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, action)| *action)
    };

    // Detect mode
    let has_inclusions = projection.iter().any(|(_, v)| *v == 1);
    let has_non_id_exclusions = projection
        .iter()
        .any(|(field, action)| *action == 0 && field != "_id");
    let include_mode = has_inclusions && !has_non_id_exclusions;

    let mut result = Map::new();

    if include_mode {
        // Include _id unless explicitly excluded
        if action_of("_id") != Some(0) {
            if let Some(id) = obj.get("_id") {
                result.insert("_id".to_string(), id.clone());
            }
        }

        for (field, action) in projection {
            if *action == 1 && field != "_id" {
                if let Some(value) = get_nested_value(doc, field) {
                    result.insert(field.clone(), value.clone());
                }
            }
        }
    } else {
        // Exclude mode: copy all top-level fields except excluded
        for (key, value) in obj {
            if action_of(key) != Some(0) {
                result.insert(key.clone(), value.clone());
            }
        }
    }

    Value::Object(result)
}

/// Apply sort to documents (stable: ties keep their input order)
/// Supports dot notation for nested fields
pub fn apply_sort(docs: &mut [Value], sort: &[(String, i32)]) {
    if sort.is_empty() {
        return;
    }

    docs.sort_by(|a, b| {
        for (field, direction) in sort {
            let cmp = compare_for_sort(get_nested_value(a, field), get_nested_value(b, field));

            if cmp != std::cmp::Ordering::Equal {
                return if *direction >= 0 { cmp } else { cmp.reverse() };
            }
        }
        std::cmp::Ordering::Equal
    });
}

/// Apply limit and skip to documents
pub fn apply_limit_skip(docs: Vec<Value>, limit: Option<usize>, skip: Option<usize>) -> Vec<Value> {
    let skip_count = skip.unwrap_or(0);

    docs.into_iter()
        .skip(skip_count)
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}
