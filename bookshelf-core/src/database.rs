// bookshelf-core/src/database.rs
// Database handle: owns the storage shared by its collections

use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::collection_core::CollectionCore;
use crate::error::{BookshelfError, Result};
use crate::storage::{FileStorage, MemoryStorage, Storage};

/// Embedded document database
///
/// Generic over Storage backend:
/// - `DatabaseCore<FileStorage>` - single-file storage
/// - `DatabaseCore<MemoryStorage>` - in-memory storage for testing
pub struct DatabaseCore<S: Storage> {
    storage: Arc<RwLock<S>>,
    name: String,
    path: Option<PathBuf>,
}

// ============================================================================
// FILESTORAGE-SPECIFIC IMPLEMENTATION
// ============================================================================

impl DatabaseCore<FileStorage> {
    /// Open or create a database backed by the file at `path`
    ///
    /// A new database file is written immediately, stamped with `name`, so
    /// that the path exists once this returns. An existing file must hold a
    /// database of the same name.
    pub fn open<P: AsRef<Path>>(path: P, name: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let fresh = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
        let mut storage = FileStorage::open(&path)?;
        if fresh {
            storage.set_database(name);
            storage.flush()?;
            tracing::info!(path = %path.display(), database = name, "created database file");
        } else if storage.database() != name {
            return Err(BookshelfError::Config(format!(
                "{} holds database '{}', not '{}'",
                path.display(),
                storage.database(),
                name
            )));
        }

        Ok(DatabaseCore {
            storage: Arc::new(RwLock::new(storage)),
            name: name.to_string(),
            path: Some(path),
        })
    }
}

// ============================================================================
// MEMORYSTORAGE-SPECIFIC IMPLEMENTATION
// ============================================================================

impl DatabaseCore<MemoryStorage> {
    pub fn in_memory(name: &str) -> Self {
        DatabaseCore {
            storage: Arc::new(RwLock::new(MemoryStorage::new())),
            name: name.to_string(),
            path: None,
        }
    }
}

// ============================================================================
// GENERIC IMPLEMENTATION (all storage backends)
// ============================================================================

impl<S: Storage> DatabaseCore<S> {
    /// Get collection (creates if doesn't exist)
    pub fn collection(&self, name: &str) -> Result<CollectionCore<S>> {
        CollectionCore::new(name.to_string(), Arc::clone(&self.storage))
    }

    /// List all collection names
    pub fn list_collections(&self) -> Vec<String> {
        let storage = self.storage.read();
        storage.list_collections()
    }

    /// Drop collection
    pub fn drop_collection(&self, name: &str) -> Result<()> {
        let mut storage = self.storage.write();
        storage.drop_collection(name)
    }

    /// Flush all changes to disk
    pub fn flush(&self) -> Result<()> {
        let mut storage = self.storage.write();
        storage.flush()
    }

    /// Whether there are unflushed changes
    pub fn is_dirty(&self) -> bool {
        self.storage.read().is_dirty()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Database file path (None for in-memory databases)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
