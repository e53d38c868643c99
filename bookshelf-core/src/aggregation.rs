// bookshelf-core/src/aggregation.rs
// Aggregation pipeline implementation

use ahash::AHashMap;
use serde_json::{Map, Value};

use crate::document::Document;
use crate::error::{BookshelfError, Result};
use crate::find_options::apply_sort;
use crate::query::Query;
use crate::value_utils::get_nested_value;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn agg_error(msg: impl Into<String>) -> BookshelfError {
    BookshelfError::AggregationError(msg.into())
}

/// Parse a field reference ("$fieldName" -> "fieldName")
fn parse_field_reference(value: &Value, op_name: &str) -> Result<String> {
    match value.as_str() {
        Some(s) if s.starts_with('$') && s.len() > 1 => Ok(s[1..].to_string()),
        Some(_) => Err(agg_error(format!(
            "{} field reference must start with $",
            op_name
        ))),
        None => Err(agg_error(format!("{} must be a field reference", op_name))),
    }
}

/// Min or max over the numeric values of a field
fn compute_extremum<F>(docs: &[Value], field: &str, pick: F) -> Value
where
    F: Fn(f64, f64) -> f64,
{
    docs.iter()
        .filter_map(|doc| get_nested_value(doc, field).and_then(Value::as_f64))
        .reduce(pick)
        .map(Value::from)
        .unwrap_or(Value::Null)
}

/// Single-key stage object: `{"$op": spec}`
fn single_entry<'a>(value: &'a Value, what: &str) -> Result<(&'a String, &'a Value)> {
    let obj = value
        .as_object()
        .ok_or_else(|| agg_error(format!("{} must be an object", what)))?;
    if obj.len() != 1 {
        return Err(agg_error(format!("{} must have exactly one operator", what)));
    }
    obj.iter()
        .next()
        .ok_or_else(|| agg_error(format!("{} must have exactly one operator", what)))
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Aggregation pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

/// Pipeline stage
#[derive(Debug, Clone)]
pub enum Stage {
    Match(Query),
    Project(ProjectStage),
    Group(GroupStage),
    Sort(Vec<(String, i32)>),
    Limit(usize),
    Skip(usize),
}

/// $project stage - reshape documents
#[derive(Debug, Clone)]
pub struct ProjectStage {
    fields: Vec<(String, ProjectField)>,
}

#[derive(Debug, Clone)]
pub enum ProjectField {
    Include,        // 1
    Exclude,        // 0
    Rename(String), // "$fieldName"
}

/// $group stage - group documents and compute aggregates
#[derive(Debug, Clone)]
pub struct GroupStage {
    id: GroupId,
    accumulators: Vec<(String, Accumulator)>,
}

#[derive(Debug, Clone)]
pub enum GroupId {
    Field(String), // "$genre"
    Null,          // null (all documents in one group)
}

#[derive(Debug, Clone)]
pub enum Accumulator {
    Sum(SumExpression),
    Avg(String),
    Min(String),
    Max(String),
    First(String),
    Last(String),
}

#[derive(Debug, Clone)]
pub enum SumExpression {
    Constant(i64), // {"$sum": 1} - count
    Field(String), // {"$sum": "$price"} - sum field values
}

impl Pipeline {
    /// Create pipeline from JSON array
    pub fn from_json(pipeline_json: &Value) -> Result<Self> {
        let stages_array = pipeline_json
            .as_array()
            .ok_or_else(|| agg_error("Pipeline must be an array"))?;

        if stages_array.is_empty() {
            return Err(agg_error("Pipeline cannot be empty"));
        }

        let stages = stages_array
            .iter()
            .map(Stage::from_json)
            .collect::<Result<Vec<_>>>()?;

        Ok(Pipeline { stages })
    }

    /// Execute pipeline on documents
    pub fn execute(&self, mut docs: Vec<Value>) -> Result<Vec<Value>> {
        for stage in &self.stages {
            docs = stage.execute(docs)?;
        }
        Ok(docs)
    }
}

impl Stage {
    /// Parse stage from JSON
    fn from_json(stage_json: &Value) -> Result<Self> {
        let (stage_name, spec) = single_entry(stage_json, "Stage")?;

        match stage_name.as_str() {
            "$match" => Ok(Stage::Match(
                Query::from_json(spec).map_err(|e| agg_error(format!("$match: {}", e)))?,
            )),
            "$project" => Ok(Stage::Project(ProjectStage::from_json(spec)?)),
            "$group" => Ok(Stage::Group(GroupStage::from_json(spec)?)),
            "$sort" => Ok(Stage::Sort(parse_sort_spec(spec)?)),
            "$limit" => spec
                .as_u64()
                .map(|n| Stage::Limit(n as usize))
                .ok_or_else(|| agg_error("$limit must be a positive number")),
            "$skip" => spec
                .as_u64()
                .map(|n| Stage::Skip(n as usize))
                .ok_or_else(|| agg_error("$skip must be a positive number")),
            other => Err(agg_error(format!("Unknown stage: {}", other))),
        }
    }

    fn execute(&self, docs: Vec<Value>) -> Result<Vec<Value>> {
        match self {
            Stage::Match(query) => {
                let mut kept = Vec::with_capacity(docs.len());
                for doc in docs {
                    // Group outputs may carry a null or composite _id
                    if query.matches(&match_view(&doc)?)? {
                        kept.push(doc);
                    }
                }
                Ok(kept)
            }
            Stage::Project(stage) => docs.iter().map(|d| stage.project_document(d)).collect(),
            Stage::Group(stage) => stage.execute(docs),
            Stage::Sort(fields) => {
                let mut docs = docs;
                apply_sort(&mut docs, fields);
                Ok(docs)
            }
            Stage::Limit(limit) => Ok(docs.into_iter().take(*limit).collect()),
            Stage::Skip(skip) => Ok(docs.into_iter().skip(*skip).collect()),
        }
    }
}

fn match_view(doc: &Value) -> Result<Document> {
    doc.as_object()
        .cloned()
        .map(Document::detached)
        .ok_or_else(|| agg_error("$match input must be a document"))
}

fn parse_sort_spec(spec: &Value) -> Result<Vec<(String, i32)>> {
    let obj = spec
        .as_object()
        .ok_or_else(|| agg_error("$sort must be an object"))?;
    if obj.is_empty() {
        return Err(agg_error("$sort must name at least one field"));
    }

    obj.iter()
        .map(|(field, value)| match value.as_i64() {
            Some(1) => Ok((field.clone(), 1)),
            Some(-1) => Ok((field.clone(), -1)),
            _ => Err(agg_error("Sort direction must be 1 or -1")),
        })
        .collect()
}

impl ProjectStage {
    fn from_json(spec: &Value) -> Result<Self> {
        let obj = spec
            .as_object()
            .ok_or_else(|| agg_error("$project must be an object"))?;

        let mut fields = Vec::with_capacity(obj.len());
        for (field, value) in obj {
            let action = match value {
                Value::Number(n) if n.as_i64() == Some(1) => ProjectField::Include,
                Value::Number(n) if n.as_i64() == Some(0) => ProjectField::Exclude,
                Value::Bool(true) => ProjectField::Include,
                Value::Bool(false) => ProjectField::Exclude,
                Value::String(s) if s.starts_with('$') => ProjectField::Rename(s[1..].to_string()),
                Value::String(_) => {
                    return Err(agg_error("$project expression must be a field reference"))
                }
                _ => return Err(agg_error(format!("Invalid $project value for '{}'", field))),
            };
            fields.push((field.clone(), action));
        }

        Ok(ProjectStage { fields })
    }

    fn project_document(&self, doc: &Value) -> Result<Value> {
        let obj = doc
            .as_object()
            .ok_or_else(|| agg_error("$project input must be a document"))?;

        let is_excluded = |name: &str| {
            self.fields
                .iter()
                .any(|(f, a)| f == name && matches!(a, ProjectField::Exclude))
        };
        let include_mode = self
            .fields
            .iter()
            .any(|(f, a)| f != "_id" && !matches!(a, ProjectField::Exclude));

        let mut result = Map::new();
        if include_mode {
            if !is_excluded("_id") {
                if let Some(id) = obj.get("_id") {
                    result.insert("_id".to_string(), id.clone());
                }
            }
            for (field, action) in &self.fields {
                let source = match action {
                    ProjectField::Include => field.as_str(),
                    ProjectField::Rename(source) => source.as_str(),
                    ProjectField::Exclude => continue,
                };
                if let Some(value) = get_nested_value(doc, source) {
                    result.insert(field.clone(), value.clone());
                }
            }
        } else {
            for (key, value) in obj {
                if !is_excluded(key) {
                    result.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(Value::Object(result))
    }
}

impl GroupStage {
    fn from_json(spec: &Value) -> Result<Self> {
        let obj = spec
            .as_object()
            .ok_or_else(|| agg_error("$group must be an object"))?;

        let id = match obj.get("_id") {
            Some(Value::Null) => GroupId::Null,
            Some(id_value) => GroupId::Field(parse_field_reference(id_value, "Group _id")?),
            None => return Err(agg_error("Group stage must have _id field")),
        };

        let mut accumulators = Vec::new();
        for (field, value) in obj {
            if field == "_id" {
                continue;
            }
            accumulators.push((field.clone(), Accumulator::from_json(value)?));
        }

        Ok(GroupStage { id, accumulators })
    }

    /// Groups are emitted in the order their first member was seen
    fn execute(&self, docs: Vec<Value>) -> Result<Vec<Value>> {
        let mut slots: AHashMap<String, usize> = AHashMap::new();
        let mut groups: Vec<(Value, Vec<Value>)> = Vec::new();

        for doc in docs {
            let key_value = self.group_key(&doc);
            let key = serde_json::to_string(&key_value)?;
            match slots.get(&key) {
                Some(&slot) => groups[slot].1.push(doc),
                None => {
                    slots.insert(key, groups.len());
                    groups.push((key_value, vec![doc]));
                }
            }
        }

        let mut results = Vec::with_capacity(groups.len());
        for (key_value, members) in groups {
            let mut result = Map::new();
            result.insert("_id".to_string(), key_value);
            for (field, accumulator) in &self.accumulators {
                result.insert(field.clone(), accumulator.compute(&members)?);
            }
            results.push(Value::Object(result));
        }

        Ok(results)
    }

    fn group_key(&self, doc: &Value) -> Value {
        match &self.id {
            GroupId::Null => Value::Null,
            GroupId::Field(field) => get_nested_value(doc, field).cloned().unwrap_or(Value::Null),
        }
    }
}

impl Accumulator {
    fn from_json(spec: &Value) -> Result<Self> {
        let (op, value) = single_entry(spec, "Accumulator")?;

        match op.as_str() {
            "$sum" => {
                if let Some(n) = value.as_i64() {
                    Ok(Accumulator::Sum(SumExpression::Constant(n)))
                } else if value.is_string() {
                    Ok(Accumulator::Sum(SumExpression::Field(parse_field_reference(
                        value, "$sum",
                    )?)))
                } else {
                    Err(agg_error("$sum must be a number or field reference"))
                }
            }
            "$avg" => Ok(Accumulator::Avg(parse_field_reference(value, "$avg")?)),
            "$min" => Ok(Accumulator::Min(parse_field_reference(value, "$min")?)),
            "$max" => Ok(Accumulator::Max(parse_field_reference(value, "$max")?)),
            "$first" => Ok(Accumulator::First(parse_field_reference(value, "$first")?)),
            "$last" => Ok(Accumulator::Last(parse_field_reference(value, "$last")?)),
            _ => Err(agg_error(format!("Unknown accumulator: {}", op))),
        }
    }

    fn compute(&self, docs: &[Value]) -> Result<Value> {
        match self {
            Accumulator::Sum(SumExpression::Constant(n)) => {
                Ok(Value::from(n.saturating_mul(docs.len() as i64)))
            }

            Accumulator::Sum(SumExpression::Field(field)) => {
                let mut sum_int: i64 = 0;
                let mut sum_float: f64 = 0.0;
                let mut has_float = false;

                for value in docs.iter().filter_map(|d| get_nested_value(d, field)) {
                    if let Some(n) = value.as_i64() {
                        sum_int = sum_int.saturating_add(n);
                    } else if let Some(f) = value.as_f64() {
                        sum_float += f;
                        has_float = true;
                    }
                }

                if has_float {
                    Ok(Value::from(sum_float + sum_int as f64))
                } else {
                    Ok(Value::from(sum_int))
                }
            }

            Accumulator::Avg(field) => {
                let (sum, count) = docs
                    .iter()
                    .filter_map(|d| get_nested_value(d, field).and_then(Value::as_f64))
                    .fold((0.0, 0usize), |(sum, count), n| (sum + n, count + 1));

                if count > 0 {
                    Ok(Value::from(sum / count as f64))
                } else {
                    Ok(Value::Null)
                }
            }

            Accumulator::Min(field) => Ok(compute_extremum(docs, field, f64::min)),

            Accumulator::Max(field) => Ok(compute_extremum(docs, field, f64::max)),

            Accumulator::First(field) => Ok(docs
                .first()
                .and_then(|doc| get_nested_value(doc, field).cloned())
                .unwrap_or(Value::Null)),

            Accumulator::Last(field) => Ok(docs
                .last()
                .and_then(|doc| get_nested_value(doc, field).cloned())
                .unwrap_or(Value::Null)),
        }
    }
}
