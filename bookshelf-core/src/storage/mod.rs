// bookshelf-core/src/storage/mod.rs
//! Storage backends
//!
//! ```text
//! Storage trait (unified interface)
//!   ├── FileStorage   (single .bookshelf file, checksummed, atomic flush)
//!   └── MemoryStorage (tests)
//! ```
//!
//! Both backends keep the working set in a [`CollectionSet`]; they differ
//! only in how it is loaded and persisted.

mod file_storage;
mod memory_storage;
mod traits;

pub use file_storage::{FileStorage, Header, FORMAT_VERSION, HEADER_SIZE, MAGIC};
pub use memory_storage::MemoryStorage;
pub use traits::Storage;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::document::Document;
use crate::index::IndexDefinition;

/// Per-collection metadata, persisted with the documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMeta {
    pub name: String,
    pub document_count: u64,
    /// Highest auto-increment id handed out
    pub last_id: u64,
    /// Secondary index definitions; entries are rebuilt on open
    #[serde(default)]
    pub indexes: Vec<IndexDefinition>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CollectionMeta {
    pub fn new(name: &str) -> Self {
        let now = Utc::now();
        CollectionMeta {
            name: name.to_string(),
            document_count: 0,
            last_id: 0,
            indexes: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A collection's metadata and documents in natural (insertion) order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionData {
    pub meta: CollectionMeta,
    pub documents: Vec<Document>,
}

impl CollectionData {
    pub fn new(name: &str) -> Self {
        CollectionData {
            meta: CollectionMeta::new(name),
            documents: Vec::new(),
        }
    }
}

/// Every collection of one database, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionSet {
    collections: BTreeMap<String, CollectionData>,
}

impl CollectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&CollectionData> {
        self.collections.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut CollectionData> {
        self.collections.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    pub fn insert(&mut self, data: CollectionData) {
        self.collections.insert(data.meta.name.clone(), data);
    }

    pub fn remove(&mut self, name: &str) -> Option<CollectionData> {
        self.collections.remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }
}
