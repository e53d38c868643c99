// bookshelf-core/src/catalog.rs
//! Catalog of named bookstore operations
//!
//! Every operation validates its input, opens its own [`Connection`], issues
//! exactly one request against the configured collection and closes the
//! connection again, on failure too. Nothing is shared between calls.

use serde_json::{json, Value};

use crate::book::{
    AuthorCount, Book, BookSummary, DeleteSummary, GenreAverage, SortOrder, UpdateSummary,
};
use crate::collection_core::CollectionCore;
use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::error::{BookshelfError, Result};
use crate::find_options::FindOptions;
use crate::storage::FileStorage;

/// Records per page for [`CatalogQueryService::find_paginated`]
pub const PAGE_SIZE: usize = 5;

pub const TITLE_INDEX: &str = "title_1";
pub const AUTHOR_YEAR_INDEX: &str = "author_1_published_year_-1";

const SUMMARY_FIELDS: [&str; 3] = ["title", "author", "price"];

/// Fixed menu of connection-scoped catalog operations
#[derive(Debug, Clone)]
pub struct CatalogQueryService {
    config: ConnectionConfig,
}

impl CatalogQueryService {
    pub fn new(config: ConnectionConfig) -> Self {
        CatalogQueryService { config }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    // ========== READS ==========

    /// Books whose genre equals `genre`
    pub fn find_by_genre(&self, genre: &str) -> Result<Vec<BookSummary>> {
        require_text("genre", genre)?;
        self.find_summaries("find_by_genre", json!({ "genre": genre }), FindOptions::new())
    }

    /// Books published strictly after `year`
    pub fn find_after_year(&self, year: i64) -> Result<Vec<BookSummary>> {
        self.find_summaries(
            "find_after_year",
            json!({ "published_year": { "$gt": year } }),
            FindOptions::new(),
        )
    }

    pub fn find_by_author(&self, author: &str) -> Result<Vec<BookSummary>> {
        require_text("author", author)?;
        self.find_summaries("find_by_author", json!({ "author": author }), FindOptions::new())
    }

    /// In-stock books published strictly after `year`
    pub fn find_available_after_year(&self, year: i64) -> Result<Vec<BookSummary>> {
        self.find_summaries(
            "find_available_after_year",
            json!({ "in_stock": true, "published_year": { "$gt": year } }),
            FindOptions::new(),
        )
    }

    /// All books by price; equal prices keep natural order
    pub fn find_sorted_by_price(&self, order: SortOrder) -> Result<Vec<BookSummary>> {
        self.find_summaries(
            "find_sorted_by_price",
            json!({}),
            FindOptions::new().with_sort(vec![("price".to_string(), order.direction())]),
        )
    }

    /// Page `page` (1-based) of [`PAGE_SIZE`] books in natural order
    pub fn find_paginated(&self, page: u64) -> Result<Vec<BookSummary>> {
        if page < 1 {
            return Err(BookshelfError::InvalidInput("page must be at least 1".into()));
        }
        let skip = usize::try_from(page - 1)
            .ok()
            .and_then(|p| p.checked_mul(PAGE_SIZE))
            .ok_or_else(|| BookshelfError::InvalidInput(format!("page {} is out of range", page)))?;

        self.find_summaries(
            "find_paginated",
            json!({}),
            FindOptions::new().with_skip(skip).with_limit(PAGE_SIZE),
        )
    }

    // ========== WRITES ==========

    /// Set the price of the first book titled `title`
    pub fn update_book_price(&self, title: &str, new_price: f64) -> Result<UpdateSummary> {
        if !new_price.is_finite() || new_price < 0.0 {
            return Err(BookshelfError::InvalidInput(format!(
                "price must be a non-negative number, got {}",
                new_price
            )));
        }

        self.with_connection("update_book_price", |books| {
            let (matched, modified) = books.update_one(
                &json!({ "title": title }),
                &json!({ "$set": { "price": new_price } }),
            )?;
            tracing::info!(title, price = new_price, matched, modified, "updated price");
            Ok(UpdateSummary { matched, modified })
        })
    }

    /// Remove the first book titled `title`
    pub fn delete_by_title(&self, title: &str) -> Result<DeleteSummary> {
        self.with_connection("delete_by_title", |books| {
            let deleted = books.delete_one(&json!({ "title": title }))?;
            tracing::info!(title, deleted, "deleted by title");
            Ok(DeleteSummary { deleted })
        })
    }

    // ========== AGGREGATIONS ==========

    /// Mean price per genre, highest mean first
    pub fn average_price_by_genre(&self) -> Result<Vec<GenreAverage>> {
        let rows = self.with_connection("average_price_by_genre", |books| {
            books.aggregate(&json!([
                { "$group": { "_id": "$genre", "average_price": { "$avg": "$price" } } },
                { "$sort": { "average_price": -1 } }
            ]))
        })?;

        rows.into_iter()
            .map(|row| -> Result<GenreAverage> {
                Ok(GenreAverage {
                    genre: group_key(&row),
                    average_price: row
                        .get("average_price")
                        .and_then(Value::as_f64)
                        .ok_or_else(|| malformed("average_price", &row))?,
                })
            })
            .collect()
    }

    /// Author with the most books; ties go to the author seen first
    pub fn author_with_most_books(&self) -> Result<Option<AuthorCount>> {
        let rows = self.with_connection("author_with_most_books", |books| {
            books.aggregate(&json!([
                { "$group": { "_id": "$author", "count": { "$sum": 1 } } },
                { "$sort": { "count": -1 } },
                { "$limit": 1 }
            ]))
        })?;

        rows.into_iter()
            .next()
            .map(|row| -> Result<AuthorCount> {
                Ok(AuthorCount {
                    author: group_key(&row),
                    count: row
                        .get("count")
                        .and_then(Value::as_u64)
                        .ok_or_else(|| malformed("count", &row))?,
                })
            })
            .transpose()
    }

    // ========== INDEXES ==========

    /// Ascending index on `title`; returns its name
    pub fn create_title_index(&self) -> Result<String> {
        self.with_connection("create_title_index", |books| {
            books.create_index(vec![("title".to_string(), 1)])
        })
    }

    /// Compound index: `author` ascending, `published_year` descending
    pub fn create_author_year_index(&self) -> Result<String> {
        self.with_connection("create_author_year_index", |books| {
            books.create_index(vec![
                ("author".to_string(), 1),
                ("published_year".to_string(), -1),
            ])
        })
    }

    pub fn list_indexes(&self) -> Result<Vec<String>> {
        self.with_connection("list_indexes", |books| Ok(books.list_indexes()))
    }

    // ========== SEEDING ==========

    /// Insert `books` in one connection; returns how many were inserted
    pub fn seed(&self, books: &[Book]) -> Result<usize> {
        let fields = books
            .iter()
            .map(Book::to_fields)
            .collect::<Result<Vec<_>>>()?;

        self.with_connection("seed", |coll| {
            let result = coll.insert_many(fields)?;
            tracing::info!(inserted = result.inserted_count, "seeded catalog");
            Ok(result.inserted_count)
        })
    }

    // ========== PRIVATE HELPERS ==========

    /// Run `request` on a fresh connection, then close it whatever the outcome
    fn with_connection<T, F>(&self, operation: &str, request: F) -> Result<T>
    where
        F: FnOnce(&CollectionCore<FileStorage>) -> Result<T>,
    {
        let conn = Connection::open(&self.config)?;
        let span = conn.span().clone();
        let _entered = span.enter();

        tracing::debug!(operation, "issuing request");
        let outcome = request(conn.collection());
        if let Err(e) = &outcome {
            tracing::debug!(operation, error = %e, "request failed");
        }

        let closed = conn.close();
        let value = outcome?;
        closed?;
        Ok(value)
    }

    fn find_summaries(
        &self,
        operation: &str,
        filter: Value,
        options: FindOptions,
    ) -> Result<Vec<BookSummary>> {
        let docs = self.with_connection(operation, |books| {
            books.find_with_options(&filter, options.with_fields(&SUMMARY_FIELDS))
        })?;
        docs.into_iter().map(BookSummary::from_document).collect()
    }
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(BookshelfError::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Group `_id` as text; records missing the field group under "null"
fn group_key(row: &Value) -> String {
    match row.get("_id") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "null".to_string(),
    }
}

fn malformed(field: &str, row: &Value) -> BookshelfError {
    BookshelfError::AggregationError(format!("missing numeric '{}' in {}", field, row))
}
