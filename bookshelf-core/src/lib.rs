// bookshelf-core/src/lib.rs
// Embedded document store and the bookstore catalog built on it

pub mod aggregation;
pub mod book;
pub mod catalog;
pub mod collection_core;
pub mod config;
pub mod connection;
pub mod database;
pub mod document;
pub mod error;
pub mod find_options;
pub mod index;
pub mod query;
pub mod storage;
pub mod update;
pub mod value_utils;

// Public exports
pub use book::{
    AuthorCount, Book, BookSummary, DeleteSummary, GenreAverage, Listing, SortOrder,
    UpdateSummary,
};
pub use catalog::{CatalogQueryService, AUTHOR_YEAR_INDEX, PAGE_SIZE, TITLE_INDEX};
pub use collection_core::{CollectionCore, InsertManyResult};
pub use config::{BookshelfConfig, ConfigSource, ConnectionConfig, LoggingConfig};
pub use connection::Connection;
pub use database::DatabaseCore;
pub use document::{Document, DocumentId};
pub use error::{BookshelfError, Result};
pub use find_options::FindOptions;
pub use query::Query;
pub use storage::{FileStorage, MemoryStorage, Storage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
