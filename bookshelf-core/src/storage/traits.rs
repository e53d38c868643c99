// bookshelf-core/src/storage/traits.rs
//! Storage abstraction
//!
//! Backends expose their [`CollectionSet`] and a flush hook; document and
//! collection operations are provided on top of that.

use crate::document::{Document, DocumentId};
use crate::error::{BookshelfError, Result};
use crate::storage::{CollectionData, CollectionMeta, CollectionSet};

/// Core storage abstraction
///
/// # Implementations
///
/// - **FileStorage**: single checksummed database file
/// - **MemoryStorage**: ephemeral, for tests
pub trait Storage: Send + Sync {
    /// Read access to the working set
    fn collections(&self) -> &CollectionSet;

    /// Write access to the working set; backends may mark themselves dirty
    fn collections_mut(&mut self) -> &mut CollectionSet;

    /// Persist pending changes (no-op for memory storage)
    fn flush(&mut self) -> Result<()>;

    /// Whether there are changes `flush` would write
    fn is_dirty(&self) -> bool;

    // ========================================================================
    // COLLECTION MANAGEMENT
    // ========================================================================

    /// Create a collection; creating an existing one is a no-op
    fn create_collection(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(BookshelfError::InvalidInput(
                "Collection name cannot be empty".into(),
            ));
        }
        if !self.collections().contains(name) {
            self.collections_mut().insert(CollectionData::new(name));
        }
        Ok(())
    }

    fn drop_collection(&mut self, name: &str) -> Result<()> {
        self.collections_mut()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| BookshelfError::CollectionNotFound(name.to_string()))
    }

    fn list_collections(&self) -> Vec<String> {
        self.collections().names()
    }

    fn get_collection_meta(&self, name: &str) -> Option<&CollectionMeta> {
        self.collections().get(name).map(|data| &data.meta)
    }

    fn get_collection_meta_mut(&mut self, name: &str) -> Option<&mut CollectionMeta> {
        self.collections_mut().get_mut(name).map(|data| &mut data.meta)
    }

    // ========================================================================
    // DOCUMENT OPERATIONS
    // ========================================================================

    /// All live documents of a collection in natural order
    fn scan_documents(&self, collection: &str) -> Result<&[Document]> {
        self.collections()
            .get(collection)
            .map(|data| data.documents.as_slice())
            .ok_or_else(|| BookshelfError::CollectionNotFound(collection.to_string()))
    }

    fn read_document(&self, collection: &str, id: &DocumentId) -> Result<Option<&Document>> {
        Ok(self
            .scan_documents(collection)?
            .iter()
            .find(|doc| doc.id() == id))
    }

    /// Append a document; its id must not be taken
    fn insert_document(&mut self, collection: &str, doc: Document) -> Result<()> {
        let data = collection_mut(self.collections_mut(), collection)?;

        if data.documents.iter().any(|d| d.id() == doc.id()) {
            return Err(BookshelfError::InvalidInput(format!(
                "Duplicate _id: {}",
                doc.id()
            )));
        }

        if let DocumentId::Int(n) = doc.id() {
            if *n > 0 && *n as u64 > data.meta.last_id {
                data.meta.last_id = *n as u64;
            }
        }
        data.documents.push(doc);
        data.meta.document_count = data.documents.len() as u64;
        data.meta.touch();
        Ok(())
    }

    /// Replace the document with the same id in place; false if absent
    fn replace_document(&mut self, collection: &str, doc: Document) -> Result<bool> {
        let data = collection_mut(self.collections_mut(), collection)?;

        match data.documents.iter_mut().find(|d| d.id() == doc.id()) {
            Some(slot) => {
                *slot = doc;
                data.meta.touch();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove a document by id, keeping the order of the rest
    fn delete_document(&mut self, collection: &str, id: &DocumentId) -> Result<Option<Document>> {
        let data = collection_mut(self.collections_mut(), collection)?;

        let removed = data
            .documents
            .iter()
            .position(|d| d.id() == id)
            .map(|pos| data.documents.remove(pos));

        if removed.is_some() {
            data.meta.document_count = data.documents.len() as u64;
            data.meta.touch();
        }
        Ok(removed)
    }

    /// Reserve the next auto-increment id of a collection
    fn next_document_id(&mut self, collection: &str) -> Result<DocumentId> {
        let data = collection_mut(self.collections_mut(), collection)?;
        let id = DocumentId::new_auto(data.meta.last_id);
        data.meta.last_id += 1;
        Ok(id)
    }
}

fn collection_mut<'a>(set: &'a mut CollectionSet, name: &str) -> Result<&'a mut CollectionData> {
    set.get_mut(name)
        .ok_or_else(|| BookshelfError::CollectionNotFound(name.to_string()))
}
