// bookshelf-core/src/book.rs
// Typed catalog records and operation results

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{BookshelfError, Result};

/// One catalog record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub title: String,
    pub author: String,
    pub price: f64,
    pub published_year: i64,
    pub genre: String,
    pub in_stock: bool,
}

impl Book {
    /// Stored field map (no `_id`)
    pub fn to_fields(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(BookshelfError::Serialization(format!(
                "Book serialized to non-object {}",
                other
            ))),
        }
    }
}

/// Projection of a book to title, author and price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSummary {
    pub title: String,
    pub author: String,
    pub price: f64,
}

impl BookSummary {
    /// Decode a projected document; missing fields are a serialization error
    pub fn from_document(doc: Value) -> Result<Self> {
        serde_json::from_value(doc)
            .map_err(|e| BookshelfError::Serialization(format!("Malformed book record: {}", e)))
    }
}

impl fmt::Display for BookSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} by {} ({:.2})", self.title, self.author, self.price)
    }
}

/// Mean price of one genre
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreAverage {
    pub genre: String,
    pub average_price: f64,
}

impl fmt::Display for GenreAverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:.2}", self.genre, self.average_price)
    }
}

/// Number of records per author
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorCount {
    pub author: String,
    pub count: u64,
}

impl fmt::Display for AuthorCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.count == 1 { "book" } else { "books" };
        write!(f, "{} ({} {})", self.author, self.count, noun)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpdateSummary {
    pub matched: u64,
    pub modified: u64,
}

impl fmt::Display for UpdateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "matched {}, modified {}", self.matched, self.modified)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeleteSummary {
    pub deleted: u64,
}

impl fmt::Display for DeleteSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deleted {}", self.deleted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// 1 or -1, as used by sort specifications
    pub fn direction(self) -> i32 {
        match self {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = BookshelfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" | "1" => Ok(SortOrder::Ascending),
            "desc" | "descending" | "-1" => Ok(SortOrder::Descending),
            other => Err(BookshelfError::InvalidInput(format!(
                "Unknown sort order '{}', expected asc or desc",
                other
            ))),
        }
    }
}

/// A list result printed one entry per line
#[derive(Debug, Clone, PartialEq)]
pub struct Listing<T>(pub Vec<T>);

impl<T: fmt::Display> fmt::Display for Listing<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(no results)");
        }
        for (i, item) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", item)?;
        }
        Ok(())
    }
}
