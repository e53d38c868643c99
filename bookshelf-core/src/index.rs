// bookshelf-core/src/index.rs
// Ordered secondary indexes (single-field and compound)

use crate::document::{Document, DocumentId};
use crate::error::{BookshelfError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Name of the implicit primary-key index every collection has
pub const ID_INDEX_NAME: &str = "_id_";

/// Index key - supported types for indexing
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexKey {
    Null,
    Number(OrderedFloat),
    String(String),
    Bool(bool),
    /// Arrays and objects, keyed by their JSON text
    Other(String),
}

/// OrderedFloat wrapper for f64 to enable Ord
#[derive(Debug, Clone, Copy)]
pub struct OrderedFloat(pub f64);

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OrderedFloat {}

impl PartialOrd for OrderedFloat {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedFloat {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0.is_nan(), other.0.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal),
        }
    }
}

impl From<Option<&Value>> for IndexKey {
    fn from(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => IndexKey::Null,
            Some(Value::Bool(b)) => IndexKey::Bool(*b),
            Some(Value::Number(n)) => n
                .as_f64()
                .map(|f| IndexKey::Number(OrderedFloat(f)))
                .unwrap_or(IndexKey::Null),
            Some(Value::String(s)) => IndexKey::String(s.clone()),
            Some(other) => IndexKey::Other(other.to_string()),
        }
    }
}

/// One component of an index entry, ordered by its field's direction
#[derive(Debug, Clone, PartialEq, Eq)]
struct DirectedKey {
    key: IndexKey,
    descending: bool,
}

impl PartialOrd for DirectedKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DirectedKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let ord = self.key.cmp(&other.key);
        if self.descending {
            ord.reverse()
        } else {
            ord
        }
    }
}

type EntryKey = Vec<DirectedKey>;

/// Persisted description of an index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    /// [(field, 1 | -1)] in key order
    pub keys: Vec<(String, i32)>,
}

impl IndexDefinition {
    /// Definition with the conventional generated name
    pub fn new(keys: Vec<(String, i32)>) -> Result<Self> {
        Self::validate_keys(&keys)?;
        Ok(IndexDefinition {
            name: Self::generate_name(&keys),
            keys,
        })
    }

    pub fn with_name(name: impl Into<String>, keys: Vec<(String, i32)>) -> Result<Self> {
        Self::validate_keys(&keys)?;
        let name = name.into();
        if name.is_empty() {
            return Err(BookshelfError::IndexError("Index name cannot be empty".into()));
        }
        Ok(IndexDefinition { name, keys })
    }

    /// `field_dir` segments joined by `_`, e.g. `author_1_published_year_-1`
    pub fn generate_name(keys: &[(String, i32)]) -> String {
        keys.iter()
            .map(|(field, dir)| format!("{}_{}", field, dir))
            .collect::<Vec<_>>()
            .join("_")
    }

    fn validate_keys(keys: &[(String, i32)]) -> Result<()> {
        if keys.is_empty() {
            return Err(BookshelfError::IndexError(
                "Index must have at least one field".into(),
            ));
        }
        for (i, (field, dir)) in keys.iter().enumerate() {
            if field.is_empty() {
                return Err(BookshelfError::IndexError("Index field name cannot be empty".into()));
            }
            if *dir != 1 && *dir != -1 {
                return Err(BookshelfError::IndexError(format!(
                    "Index direction for '{}' must be 1 or -1",
                    field
                )));
            }
            if keys[..i].iter().any(|(f, _)| f == field) {
                return Err(BookshelfError::IndexError(format!(
                    "Field '{}' appears twice in index",
                    field
                )));
            }
        }
        Ok(())
    }

    pub fn is_compound(&self) -> bool {
        self.keys.len() > 1
    }

    fn entry_key(&self, doc: &Document) -> EntryKey {
        self.keys
            .iter()
            .map(|(field, dir)| DirectedKey {
                key: IndexKey::from(doc.get(field)),
                descending: *dir < 0,
            })
            .collect()
    }
}

/// In-memory ordered index: entry key -> document ids (insertion order)
#[derive(Debug, Clone)]
pub struct OrderedIndex {
    definition: IndexDefinition,
    entries: BTreeMap<EntryKey, Vec<DocumentId>>,
}

impl OrderedIndex {
    pub fn new(definition: IndexDefinition) -> Self {
        OrderedIndex {
            definition,
            entries: BTreeMap::new(),
        }
    }

    pub fn definition(&self) -> &IndexDefinition {
        &self.definition
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn insert(&mut self, doc: &Document) {
        let key = self.definition.entry_key(doc);
        self.entries.entry(key).or_default().push(doc.id().clone());
    }

    pub fn remove(&mut self, doc: &Document) {
        let key = self.definition.entry_key(doc);
        if let Some(ids) = self.entries.get_mut(&key) {
            ids.retain(|id| id != doc.id());
            if ids.is_empty() {
                self.entries.remove(&key);
            }
        }
    }

    /// Ids whose leading field equals `value`; only meaningful for
    /// single-field indexes.
    pub fn lookup(&self, value: &Value) -> Vec<DocumentId> {
        let key = vec![DirectedKey {
            key: IndexKey::from(Some(value)),
            descending: self.definition.keys[0].1 < 0,
        }];
        self.entries.get(&key).cloned().unwrap_or_default()
    }

    /// All ids in index order
    pub fn scan(&self) -> Vec<DocumentId> {
        self.entries.values().flatten().cloned().collect()
    }

    /// Whether any document stores an array or object under the leading
    /// field; equality on such fields also matches array elements, which
    /// `lookup` cannot answer.
    pub fn has_composite_values(&self) -> bool {
        self.entries
            .keys()
            .any(|key| matches!(key.first(), Some(DirectedKey { key: IndexKey::Other(_), .. })))
    }

    /// Number of distinct keys
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }
}

/// Index Manager - manages all secondary indexes of a collection
#[derive(Debug, Clone, Default)]
pub struct IndexManager {
    indexes: Vec<OrderedIndex>,
}

impl IndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the index unless an identical one exists.
    /// Returns `true` when a new index was created.
    ///
    /// Same name with different keys, or same keys under another name,
    /// is a conflict.
    pub fn ensure_index<'a, I>(&mut self, definition: IndexDefinition, docs: I) -> Result<bool>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        if definition.name == ID_INDEX_NAME {
            return Err(BookshelfError::IndexError(format!(
                "Index name '{}' is reserved",
                ID_INDEX_NAME
            )));
        }

        for existing in &self.indexes {
            let same_name = existing.definition.name == definition.name;
            let same_keys = existing.definition.keys == definition.keys;
            match (same_name, same_keys) {
                (true, true) => return Ok(false),
                (true, false) => {
                    return Err(BookshelfError::IndexError(format!(
                        "Index '{}' already exists with different keys",
                        definition.name
                    )))
                }
                (false, true) => {
                    return Err(BookshelfError::IndexError(format!(
                        "Index with the same keys already exists as '{}'",
                        existing.definition.name
                    )))
                }
                (false, false) => {}
            }
        }

        let mut index = OrderedIndex::new(definition);
        for doc in docs {
            index.insert(doc);
        }
        self.indexes.push(index);
        Ok(true)
    }

    pub fn drop_index(&mut self, name: &str) -> Result<IndexDefinition> {
        if name == ID_INDEX_NAME {
            return Err(BookshelfError::IndexError("Cannot drop the _id index".into()));
        }
        let pos = self
            .indexes
            .iter()
            .position(|idx| idx.name() == name)
            .ok_or_else(|| BookshelfError::IndexError(format!("Index not found: {}", name)))?;
        Ok(self.indexes.remove(pos).definition)
    }

    pub fn get(&self, name: &str) -> Option<&OrderedIndex> {
        self.indexes.iter().find(|idx| idx.name() == name)
    }

    /// A single-field index on `field`, if one exists
    pub fn single_field(&self, field: &str) -> Option<&OrderedIndex> {
        self.indexes
            .iter()
            .find(|idx| !idx.definition.is_compound() && idx.definition.keys[0].0 == field)
    }

    pub fn on_insert(&mut self, doc: &Document) {
        for index in &mut self.indexes {
            index.insert(doc);
        }
    }

    pub fn on_remove(&mut self, doc: &Document) {
        for index in &mut self.indexes {
            index.remove(doc);
        }
    }

    pub fn on_update(&mut self, before: &Document, after: &Document) {
        self.on_remove(before);
        self.on_insert(after);
    }

    /// Index names, `_id_` first, then in creation order
    pub fn list_indexes(&self) -> Vec<String> {
        std::iter::once(ID_INDEX_NAME.to_string())
            .chain(self.indexes.iter().map(|idx| idx.name().to_string()))
            .collect()
    }

    pub fn definitions(&self) -> Vec<IndexDefinition> {
        self.indexes.iter().map(|idx| idx.definition.clone()).collect()
    }
}
