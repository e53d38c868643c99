// bookshelf-core/src/error.rs
// Crate-wide error type

use thiserror::Error;

/// Errors raised by the store layer and the catalog service
#[derive(Error, Debug)]
pub enum BookshelfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupted database file: {0}")]
    Corruption(String),

    /// The store could not be reached, locked or decoded
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Caller input rejected before any request was issued
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Aggregation error: {0}")]
    AggregationError(String),

    #[error("Index error: {0}")]
    IndexError(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BookshelfError {
    /// True for failures that mean the store itself was unreachable
    pub fn is_connection(&self) -> bool {
        matches!(self, BookshelfError::Connection(_))
    }
}

impl From<serde_json::Error> for BookshelfError {
    fn from(err: serde_json::Error) -> Self {
        BookshelfError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for BookshelfError {
    fn from(err: bincode::Error) -> Self {
        BookshelfError::Corruption(format!("Invalid header: {}", err))
    }
}

impl From<toml::de::Error> for BookshelfError {
    fn from(err: toml::de::Error) -> Self {
        BookshelfError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BookshelfError>;
