// bookshelf-core/src/collection_core.rs
// Collection operations over any Storage backend
//
// FILE STRUCTURE:
// ├── Constructor (index rebuild from persisted definitions)
// ├── CRUD Operations
// │   ├── insert_one, insert_many
// │   ├── update_one, delete_one
// ├── Query Operations
// │   ├── find, find_one, find_with_options, count_documents
// ├── Aggregation
// ├── Index Operations
// │   ├── create_index, create_named_index, drop_index, list_indexes
// └── Private Helpers
//     ├── matching_documents, indexed_candidates
//     └── persist_index_definitions
//
// Lock order is always storage, then indexes.

use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::aggregation::Pipeline;
use crate::document::{Document, DocumentId};
use crate::error::{BookshelfError, Result};
use crate::find_options::{apply_limit_skip, apply_projection, apply_sort, FindOptions};
use crate::index::{IndexDefinition, IndexManager};
use crate::query::Query;
use crate::storage::Storage;
use crate::update::Update;

/// Result of insert_many operation
#[derive(Debug, Clone)]
pub struct InsertManyResult {
    pub inserted_ids: Vec<DocumentId>,
    pub inserted_count: usize,
}

/// One collection of a database, sharing the database's storage
pub struct CollectionCore<S: Storage> {
    pub name: String,
    pub storage: Arc<RwLock<S>>,
    /// Secondary indexes; the `_id_` index is implicit
    pub indexes: Arc<RwLock<IndexManager>>,
}

impl<S: Storage> CollectionCore<S> {
    // ========== CONSTRUCTOR ==========

    /// Open a collection, creating it when missing, and rebuild its
    /// persisted indexes from the stored documents
    pub fn new(name: String, storage: Arc<RwLock<S>>) -> Result<Self> {
        let mut index_manager = IndexManager::new();
        {
            let mut storage_guard = storage.write();
            if storage_guard.get_collection_meta(&name).is_none() {
                storage_guard.create_collection(&name)?;
                tracing::debug!(collection = %name, "created collection");
            }

            let definitions = storage_guard
                .get_collection_meta(&name)
                .map(|meta| meta.indexes.clone())
                .unwrap_or_default();
            let docs = storage_guard.scan_documents(&name)?;
            for definition in definitions {
                let index_name = definition.name.clone();
                if let Err(e) = index_manager.ensure_index(definition, docs.iter()) {
                    tracing::warn!(index = %index_name, error = %e, "skipping persisted index");
                }
            }
            tracing::debug!(
                collection = %name,
                documents = docs.len(),
                indexes = index_manager.definitions().len(),
                "index rebuild completed"
            );
        }

        Ok(CollectionCore {
            name,
            storage,
            indexes: Arc::new(RwLock::new(index_manager)),
        })
    }

    // ========== CRUD OPERATIONS ==========

    /// Insert one document - returns its id
    ///
    /// An integer or string `_id` in `fields` is kept; otherwise the next
    /// auto-increment id is assigned.
    pub fn insert_one(&self, fields: Map<String, Value>) -> Result<DocumentId> {
        let mut storage = self.storage.write();
        let mut indexes = self.indexes.write();
        self.insert_locked(&mut *storage, &mut indexes, fields)
    }

    /// Insert many documents under one lock acquisition
    ///
    /// Stops at the first failure; documents before it stay inserted.
    pub fn insert_many(&self, documents: Vec<Map<String, Value>>) -> Result<InsertManyResult> {
        let mut storage = self.storage.write();
        let mut indexes = self.indexes.write();

        let mut inserted_ids = Vec::with_capacity(documents.len());
        for fields in documents {
            inserted_ids.push(self.insert_locked(&mut *storage, &mut indexes, fields)?);
        }

        tracing::debug!(collection = %self.name, count = inserted_ids.len(), "insert_many");
        Ok(InsertManyResult {
            inserted_count: inserted_ids.len(),
            inserted_ids,
        })
    }

    /// Update the first matching document (natural order)
    /// Returns (matched_count, modified_count)
    pub fn update_one(&self, query_json: &Value, update_json: &Value) -> Result<(u64, u64)> {
        let query = Query::from_json(query_json)?;
        let update = Update::from_json(update_json)?;

        let mut storage = self.storage.write();
        let target = {
            let indexes = self.indexes.read();
            self.matching_documents(&*storage, &indexes, &query)?
                .into_iter()
                .next()
                .cloned()
        };

        let before = match target {
            Some(doc) => doc,
            None => return Ok((0, 0)),
        };

        let mut after = before.clone();
        if !update.apply(&mut after)? {
            return Ok((1, 0));
        }

        storage.replace_document(&self.name, after.clone())?;
        self.indexes.write().on_update(&before, &after);

        tracing::debug!(collection = %self.name, id = %before.id(), "update_one modified document");
        Ok((1, 1))
    }

    /// Delete the first matching document (natural order)
    /// Returns deleted count (0 or 1)
    pub fn delete_one(&self, query_json: &Value) -> Result<u64> {
        let query = Query::from_json(query_json)?;

        let mut storage = self.storage.write();
        let target_id = {
            let indexes = self.indexes.read();
            self.matching_documents(&*storage, &indexes, &query)?
                .first()
                .map(|doc| doc.id().clone())
        };

        let id = match target_id {
            Some(id) => id,
            None => return Ok(0),
        };

        match storage.delete_document(&self.name, &id)? {
            Some(removed) => {
                self.indexes.write().on_remove(&removed);
                tracing::debug!(collection = %self.name, id = %id, "delete_one removed document");
                Ok(1)
            }
            None => Ok(0),
        }
    }

    // ========== QUERY OPERATIONS ==========

    /// Find documents matching the query, in natural order
    pub fn find(&self, query_json: &Value) -> Result<Vec<Value>> {
        self.find_with_options(query_json, FindOptions::default())
    }

    /// Find with options: filter, then sort, skip, limit and projection
    pub fn find_with_options(&self, query_json: &Value, options: FindOptions) -> Result<Vec<Value>> {
        let query = Query::from_json(query_json)?;

        let mut results: Vec<Value> = {
            let storage = self.storage.read();
            let indexes = self.indexes.read();
            self.matching_documents(&*storage, &indexes, &query)?
                .into_iter()
                .map(Document::to_value)
                .collect()
        };

        if let Some(sort) = &options.sort {
            apply_sort(&mut results, sort);
        }
        let mut results = apply_limit_skip(results, options.limit, options.skip);
        if let Some(projection) = &options.projection {
            results = results
                .iter()
                .map(|doc| apply_projection(doc, projection))
                .collect();
        }

        tracing::trace!(collection = %self.name, returned = results.len(), "find");
        Ok(results)
    }

    /// First matching document in natural order
    pub fn find_one(&self, query_json: &Value) -> Result<Option<Value>> {
        Ok(self
            .find_with_options(query_json, FindOptions::new().with_limit(1))?
            .into_iter()
            .next())
    }

    pub fn count_documents(&self, query_json: &Value) -> Result<u64> {
        let query = Query::from_json(query_json)?;
        let storage = self.storage.read();
        let indexes = self.indexes.read();
        Ok(self.matching_documents(&*storage, &indexes, &query)?.len() as u64)
    }

    // ========== AGGREGATION ==========

    /// Run an aggregation pipeline over the collection in natural order
    pub fn aggregate(&self, pipeline_json: &Value) -> Result<Vec<Value>> {
        let pipeline = Pipeline::from_json(pipeline_json)?;

        let docs: Vec<Value> = {
            let storage = self.storage.read();
            storage
                .scan_documents(&self.name)?
                .iter()
                .map(Document::to_value)
                .collect()
        };

        pipeline.execute(docs)
    }

    // ========== INDEX OPERATIONS ==========

    /// Create an index with the conventional generated name; idempotent
    ///
    /// `keys` is `[(field, 1 | -1)]` in key order. Returns the index name.
    pub fn create_index(&self, keys: Vec<(String, i32)>) -> Result<String> {
        self.ensure_index(IndexDefinition::new(keys)?)
    }

    /// Create an index under an explicit name; idempotent
    pub fn create_named_index(&self, name: &str, keys: Vec<(String, i32)>) -> Result<String> {
        self.ensure_index(IndexDefinition::with_name(name, keys)?)
    }

    pub fn drop_index(&self, index_name: &str) -> Result<()> {
        let mut storage = self.storage.write();
        let mut indexes = self.indexes.write();
        indexes.drop_index(index_name)?;
        self.persist_index_definitions(&mut *storage, &indexes)?;
        tracing::info!(collection = %self.name, index = %index_name, "dropped index");
        Ok(())
    }

    /// Index names, `_id_` first
    pub fn list_indexes(&self) -> Vec<String> {
        self.indexes.read().list_indexes()
    }

    // ========== PRIVATE HELPERS ==========

    fn insert_locked(
        &self,
        storage: &mut S,
        indexes: &mut IndexManager,
        mut fields: Map<String, Value>,
    ) -> Result<DocumentId> {
        let doc_id = match fields.remove("_id") {
            Some(Value::Number(n)) => n.as_i64().map(DocumentId::Int).ok_or_else(|| {
                BookshelfError::InvalidInput(format!("_id must be an integer, got {}", n))
            })?,
            Some(Value::String(s)) => DocumentId::String(s),
            Some(other) => {
                return Err(BookshelfError::InvalidInput(format!(
                    "Unsupported _id value: {}",
                    other
                )))
            }
            None => storage.next_document_id(&self.name)?,
        };

        let doc = Document::new(doc_id.clone(), fields);
        storage.insert_document(&self.name, doc.clone())?;
        indexes.on_insert(&doc);
        Ok(doc_id)
    }

    fn ensure_index(&self, definition: IndexDefinition) -> Result<String> {
        let name = definition.name.clone();
        let mut storage = self.storage.write();
        let mut indexes = self.indexes.write();

        let created = {
            let docs = storage.scan_documents(&self.name)?;
            indexes.ensure_index(definition, docs.iter())?
        };

        if created {
            self.persist_index_definitions(&mut *storage, &indexes)?;
            tracing::info!(collection = %self.name, index = %name, "created index");
        } else {
            tracing::debug!(collection = %self.name, index = %name, "index already exists");
        }
        Ok(name)
    }

    fn persist_index_definitions(&self, storage: &mut S, indexes: &IndexManager) -> Result<()> {
        let meta = storage
            .get_collection_meta_mut(&self.name)
            .ok_or_else(|| BookshelfError::CollectionNotFound(self.name.clone()))?;
        meta.indexes = indexes.definitions();
        meta.touch();
        Ok(())
    }

    /// Matching documents in natural order
    fn matching_documents<'a>(
        &self,
        storage: &'a S,
        indexes: &IndexManager,
        query: &Query,
    ) -> Result<Vec<&'a Document>> {
        let docs = storage.scan_documents(&self.name)?;
        let candidates = self.indexed_candidates(indexes, query);

        let mut matched = Vec::new();
        for doc in docs {
            if let Some(ids) = &candidates {
                if !ids.contains(doc.id()) {
                    continue;
                }
            }
            if query.matches(doc)? {
                matched.push(doc);
            }
        }
        Ok(matched)
    }

    /// Ids an index can narrow a single-field equality filter to
    fn indexed_candidates(&self, indexes: &IndexManager, query: &Query) -> Option<Vec<DocumentId>> {
        let (field, value) = query.single_equality()?;
        let index = indexes.single_field(field)?;
        if index.has_composite_values() {
            return None;
        }
        tracing::trace!(collection = %self.name, index = %index.name(), "index lookup");
        Some(index.lookup(value))
    }
}
