// bookshelf-core/src/query/operators.rs
//! Query operator implementations
//!
//! Each filter operator is a separate type implementing [`OperatorMatcher`],
//! looked up by name in a static registry.
//!
//! ```text
//! OperatorMatcher trait
//!     ↓
//! ┌──────────────────────────────┬────────────────┬────────────┐
//! │ Comparison                   │ Logical        │ Element    │
//! │ ($eq $ne $gt $gte $lt $lte   │ ($and, $or)    │ ($exists)  │
//! │  $in $nin)                   │                │            │
//! └──────────────────────────────┴────────────────┴────────────┘
//! ```

use crate::document::Document;
use crate::error::{BookshelfError, Result};
use crate::value_utils::{compare_values, values_equal};
use lazy_static::lazy_static;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Trait for all query operators
///
/// ```rust
/// use serde_json::json;
/// use bookshelf_core::query::operators::{GtOperator, OperatorMatcher};
///
/// let gt = GtOperator;
/// assert!(gt.matches(Some(&json!(2001)), &json!(2000), None).unwrap());
/// ```
pub trait OperatorMatcher: Send + Sync {
    /// Operator name (e.g., "$eq", "$gt", "$and")
    fn name(&self) -> &'static str;

    /// Check a document value against the operator argument
    ///
    /// - `doc_value`: value of the field (None if the field doesn't exist)
    /// - `filter_value`: the operator argument from the filter
    /// - `document`: full document, required by logical operators
    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        document: Option<&Document>,
    ) -> Result<bool>;
}

// ============================================================================
// COMPARISON OPERATORS
// ============================================================================

/// $eq: field equals value; an array field matches if any element does
pub struct EqOperator;

impl OperatorMatcher for EqOperator {
    fn name(&self) -> &'static str {
        "$eq"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        _document: Option<&Document>,
    ) -> Result<bool> {
        Ok(match doc_value {
            None => filter_value.is_null(),
            Some(v) if values_equal(v, filter_value) => true,
            Some(Value::Array(arr)) => arr.iter().any(|elem| values_equal(elem, filter_value)),
            Some(_) => false,
        })
    }
}

/// $ne: negation of $eq (missing fields match)
pub struct NeOperator;

impl OperatorMatcher for NeOperator {
    fn name(&self) -> &'static str {
        "$ne"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        document: Option<&Document>,
    ) -> Result<bool> {
        EqOperator
            .matches(doc_value, filter_value, document)
            .map(|eq| !eq)
    }
}

/// Shared body of the four ordering operators.
/// Missing fields and incomparable types never match.
fn ordering_matches(
    doc_value: Option<&Value>,
    filter_value: &Value,
    accept: fn(Ordering) -> bool,
) -> bool {
    match doc_value {
        None => false,
        Some(Value::Array(arr)) => arr
            .iter()
            .any(|elem| compare_values(elem, filter_value).is_some_and(accept)),
        Some(v) => compare_values(v, filter_value).is_some_and(accept),
    }
}

/// $gt: field is strictly greater than value
pub struct GtOperator;

impl OperatorMatcher for GtOperator {
    fn name(&self) -> &'static str {
        "$gt"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        _document: Option<&Document>,
    ) -> Result<bool> {
        Ok(ordering_matches(doc_value, filter_value, |o| {
            o == Ordering::Greater
        }))
    }
}

/// $gte: field is greater than or equal to value
pub struct GteOperator;

impl OperatorMatcher for GteOperator {
    fn name(&self) -> &'static str {
        "$gte"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        _document: Option<&Document>,
    ) -> Result<bool> {
        Ok(ordering_matches(doc_value, filter_value, |o| {
            o != Ordering::Less
        }))
    }
}

/// $lt: field is strictly less than value
pub struct LtOperator;

impl OperatorMatcher for LtOperator {
    fn name(&self) -> &'static str {
        "$lt"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        _document: Option<&Document>,
    ) -> Result<bool> {
        Ok(ordering_matches(doc_value, filter_value, |o| o == Ordering::Less))
    }
}

/// $lte: field is less than or equal to value
pub struct LteOperator;

impl OperatorMatcher for LteOperator {
    fn name(&self) -> &'static str {
        "$lte"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        _document: Option<&Document>,
    ) -> Result<bool> {
        Ok(ordering_matches(doc_value, filter_value, |o| {
            o != Ordering::Greater
        }))
    }
}

fn expect_array<'a>(op: &str, filter_value: &'a Value) -> Result<&'a Vec<Value>> {
    filter_value
        .as_array()
        .ok_or_else(|| BookshelfError::InvalidQuery(format!("{} operator requires an array", op)))
}

/// $in: field equals any value in the list
pub struct InOperator;

impl OperatorMatcher for InOperator {
    fn name(&self) -> &'static str {
        "$in"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        document: Option<&Document>,
    ) -> Result<bool> {
        for candidate in expect_array("$in", filter_value)? {
            if EqOperator.matches(doc_value, candidate, document)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// $nin: field equals none of the values in the list
pub struct NinOperator;

impl OperatorMatcher for NinOperator {
    fn name(&self) -> &'static str {
        "$nin"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        document: Option<&Document>,
    ) -> Result<bool> {
        InOperator
            .matches(doc_value, filter_value, document)
            .map(|found| !found)
    }
}

// ============================================================================
// ELEMENT OPERATORS
// ============================================================================

/// $exists: field presence check
pub struct ExistsOperator;

impl OperatorMatcher for ExistsOperator {
    fn name(&self) -> &'static str {
        "$exists"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        _document: Option<&Document>,
    ) -> Result<bool> {
        let should_exist = filter_value.as_bool().ok_or_else(|| {
            BookshelfError::InvalidQuery("$exists operator requires a boolean".to_string())
        })?;
        Ok(doc_value.is_some() == should_exist)
    }
}

// ============================================================================
// LOGICAL OPERATORS
// ============================================================================

/// $and: every sub-filter matches
pub struct AndOperator;

impl OperatorMatcher for AndOperator {
    fn name(&self) -> &'static str {
        "$and"
    }

    fn matches(
        &self,
        _doc_value: Option<&Value>,
        filter_value: &Value,
        document: Option<&Document>,
    ) -> Result<bool> {
        let doc = document.ok_or_else(|| {
            BookshelfError::InvalidQuery("$and operator requires document context".to_string())
        })?;

        for condition in expect_array("$and", filter_value)? {
            if !matches_filter(doc, condition)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// $or: at least one sub-filter matches
pub struct OrOperator;

impl OperatorMatcher for OrOperator {
    fn name(&self) -> &'static str {
        "$or"
    }

    fn matches(
        &self,
        _doc_value: Option<&Value>,
        filter_value: &Value,
        document: Option<&Document>,
    ) -> Result<bool> {
        let doc = document.ok_or_else(|| {
            BookshelfError::InvalidQuery("$or operator requires document context".to_string())
        })?;

        for condition in expect_array("$or", filter_value)? {
            if matches_filter(doc, condition)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

lazy_static! {
    static ref OPERATOR_REGISTRY: HashMap<&'static str, Box<dyn OperatorMatcher>> = {
        let operators: Vec<Box<dyn OperatorMatcher>> = vec![
            Box::new(EqOperator),
            Box::new(NeOperator),
            Box::new(GtOperator),
            Box::new(GteOperator),
            Box::new(LtOperator),
            Box::new(LteOperator),
            Box::new(InOperator),
            Box::new(NinOperator),
            Box::new(ExistsOperator),
            Box::new(AndOperator),
            Box::new(OrOperator),
        ];
        operators.into_iter().map(|op| (op.name(), op)).collect()
    };
}

fn lookup(name: &str) -> Result<&'static dyn OperatorMatcher> {
    OPERATOR_REGISTRY
        .get(name)
        .map(|op| op.as_ref())
        .ok_or_else(|| BookshelfError::InvalidQuery(format!("Unknown operator: {}", name)))
}

/// Match a document against a filter
///
/// - `{}` matches everything
/// - `{"field": value}` is implicit `$eq`
/// - `{"field": {"$op": arg, ...}}` applies every operator (implicit AND)
/// - top-level `$and` / `$or` recurse
pub fn matches_filter(document: &Document, filter: &Value) -> Result<bool> {
    let filter_obj = filter
        .as_object()
        .ok_or_else(|| BookshelfError::InvalidQuery("Filter must be an object".to_string()))?;

    for (key, value) in filter_obj {
        if key.starts_with('$') {
            if !lookup(key)?.matches(None, value, Some(document))? {
                return Ok(false);
            }
            continue;
        }

        let doc_value = document.get(key);
        let matched = match value {
            Value::Object(condition) if is_operator_object(condition) => {
                let mut all = true;
                for (op_name, op_value) in condition {
                    if !lookup(op_name)?.matches(doc_value, op_value, Some(document))? {
                        all = false;
                        break;
                    }
                }
                all
            }
            literal => EqOperator.matches(doc_value, literal, Some(document))?,
        };

        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

/// An object whose keys all start with `$` is an operator expression;
/// anything else is compared literally.
fn is_operator_object(condition: &serde_json::Map<String, Value>) -> bool {
    !condition.is_empty() && condition.keys().all(|k| k.starts_with('$'))
}

/// Structural check of a filter without a document: every operator name
/// must be known and logical operators must carry arrays of filters.
pub fn validate_filter(filter: &Value) -> Result<()> {
    let filter_obj = filter
        .as_object()
        .ok_or_else(|| BookshelfError::InvalidQuery("Filter must be an object".to_string()))?;

    for (key, value) in filter_obj {
        if key.starts_with('$') {
            lookup(key)?;
            for sub in expect_array(key, value)? {
                validate_filter(sub)?;
            }
        } else if let Value::Object(condition) = value {
            if is_operator_object(condition) {
                for op_name in condition.keys() {
                    lookup(op_name)?;
                }
            }
        }
    }
    Ok(())
}
