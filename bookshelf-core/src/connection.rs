// bookshelf-core/src/connection.rs
//! Scoped, exclusive connection to the catalog store
//!
//! A [`Connection`] holds an advisory lock on `<path>.lock` for its whole
//! lifetime. [`Connection::close`] flushes and unlocks; `Drop` does the same
//! on every other exit path.

use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing::Span;
use uuid::Uuid;

use crate::collection_core::CollectionCore;
use crate::config::ConnectionConfig;
use crate::database::DatabaseCore;
use crate::error::{BookshelfError, Result};
use crate::storage::FileStorage;

pub struct Connection {
    db: DatabaseCore<FileStorage>,
    collection: CollectionCore<FileStorage>,
    lock: Option<File>,
    session: Uuid,
    span: Span,
}

impl Connection {
    /// Lock, open and resolve the configured collection
    ///
    /// Waits while another process holds the lock. Every failure to reach
    /// the store is reported as [`BookshelfError::Connection`].
    pub fn open(config: &ConnectionConfig) -> Result<Self> {
        let session = Uuid::new_v4();
        let span = tracing::info_span!(
            "connection",
            session = %session,
            database = %config.database,
            collection = %config.collection
        );
        let _entered = span.enter();

        let lock = acquire_lock(config).map_err(|e| connection_error(&config.path, e))?;

        let opened = DatabaseCore::open(&config.path, &config.database).and_then(|db| {
            let collection = db.collection(&config.collection)?;
            Ok((db, collection))
        });
        let (db, collection) = match opened {
            Ok(pair) => pair,
            Err(e) => {
                release_lock(&lock);
                return Err(connection_error(&config.path, e));
            }
        };

        tracing::info!(path = %config.path.display(), "connection opened");
        drop(_entered);

        Ok(Connection {
            db,
            collection,
            lock: Some(lock),
            session,
            span,
        })
    }

    /// The configured collection
    pub fn collection(&self) -> &CollectionCore<FileStorage> {
        &self.collection
    }

    pub fn database(&self) -> &DatabaseCore<FileStorage> {
        &self.db
    }

    pub fn session(&self) -> Uuid {
        self.session
    }

    /// Span carrying the session id; enter it around work on this connection
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Flush pending writes and release the lock
    pub fn close(mut self) -> Result<()> {
        let _entered = self.span.clone().entered();
        let flushed = self.db.flush();
        if let Some(lock) = self.lock.take() {
            release_lock(&lock);
        }
        flushed?;
        tracing::info!("connection closed");
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let lock = match self.lock.take() {
            Some(lock) => lock,
            None => return,
        };
        let _entered = self.span.clone().entered();

        if self.db.is_dirty() && !std::thread::panicking() {
            if let Err(e) = self.db.flush() {
                tracing::warn!(error = %e, "flush on drop failed");
            }
        }
        release_lock(&lock);
        tracing::debug!("connection released on drop");
    }
}

fn acquire_lock(config: &ConnectionConfig) -> Result<File> {
    if let Some(parent) = config.path.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            return Err(BookshelfError::Connection(format!(
                "directory {} does not exist",
                parent.display()
            )));
        }
    }

    let lock_path = config.lock_path();
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)?;

    if !FileExt::try_lock_exclusive(&file)? {
        tracing::debug!(lock = %lock_path.display(), "waiting for store lock");
        FileExt::lock_exclusive(&file)?;
    }
    Ok(file)
}

fn release_lock(lock: &File) {
    if let Err(e) = FileExt::unlock(lock) {
        tracing::warn!(error = %e, "failed to release store lock");
    }
}

fn connection_error(path: &Path, err: BookshelfError) -> BookshelfError {
    match err {
        BookshelfError::Connection(_) => err,
        other => BookshelfError::Connection(format!("{}: {}", path.display(), other)),
    }
}
