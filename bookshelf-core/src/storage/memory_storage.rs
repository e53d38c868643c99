// bookshelf-core/src/storage/memory_storage.rs
//! Pure in-memory storage for fast tests

use crate::error::Result;
use crate::storage::{CollectionSet, Storage};

/// In-memory storage backend (testing)
///
/// No persistence: data is lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    collections: CollectionSet,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn collections(&self) -> &CollectionSet {
        &self.collections
    }

    fn collections_mut(&mut self) -> &mut CollectionSet {
        &mut self.collections
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_dirty(&self) -> bool {
        false
    }
}
