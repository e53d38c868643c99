use anyhow::{bail, Context, Result};
use bookshelf_core::{
    Book, BookshelfConfig, CatalogQueryService, ConfigSource, Listing, SortOrder, VERSION,
};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bookshelf")]
#[command(about = "Bookshelf CLI - query and maintain the bookstore catalog")]
#[command(version)]
struct Cli {
    /// Config file (default: $BOOKSHELF_CONFIG, then ./bookshelf.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Database file path, overrides store.path
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the reference call list in order
    Run,
    /// Run a single catalog operation
    Query {
        #[command(subcommand)]
        op: QueryOp,
    },
    /// Load book records from a JSON file into the configured collection
    Import {
        /// JSON array of books, or an object keyed by collection name
        file: PathBuf,
    },
    /// List index names of the configured collection
    Indexes,
}

#[derive(Subcommand, Clone)]
enum QueryOp {
    /// Books of a genre
    Genre { genre: String },
    /// Books published after a year
    AfterYear {
        #[arg(allow_negative_numbers = true)]
        year: i64,
    },
    /// Books by an author
    Author { author: String },
    /// Set the price of the first book with a title
    UpdatePrice {
        title: String,
        #[arg(allow_negative_numbers = true)]
        price: f64,
    },
    /// Delete the first book with a title
    Delete { title: String },
    /// In-stock books published after a year
    AvailableAfterYear {
        #[arg(allow_negative_numbers = true)]
        year: i64,
    },
    /// All books ordered by price (asc | desc)
    SortedByPrice {
        #[arg(default_value = "asc")]
        order: SortOrder,
    },
    /// One page of five books
    Page { page: u64 },
    /// Mean price per genre
    AvgPriceByGenre,
    /// Author with the most books
    TopAuthor,
    /// Create the title index
    IndexTitle,
    /// Create the author/published_year index
    IndexAuthorYear,
}

impl QueryOp {
    fn label(&self) -> String {
        match self {
            QueryOp::Genre { genre } => format!("find_by_genre({:?})", genre),
            QueryOp::AfterYear { year } => format!("find_after_year({})", year),
            QueryOp::Author { author } => format!("find_by_author({:?})", author),
            QueryOp::UpdatePrice { title, price } => {
                format!("update_book_price({:?}, {})", title, price)
            }
            QueryOp::Delete { title } => format!("delete_by_title({:?})", title),
            QueryOp::AvailableAfterYear { year } => format!("find_available_after_year({})", year),
            QueryOp::SortedByPrice { order } => format!("find_sorted_by_price({:?})", order),
            QueryOp::Page { page } => format!("find_paginated({})", page),
            QueryOp::AvgPriceByGenre => "average_price_by_genre()".to_string(),
            QueryOp::TopAuthor => "author_with_most_books()".to_string(),
            QueryOp::IndexTitle => "create_title_index()".to_string(),
            QueryOp::IndexAuthorYear => "create_author_year_index()".to_string(),
        }
    }

    /// Execute and render the result
    fn execute(&self, catalog: &CatalogQueryService) -> bookshelf_core::Result<String> {
        Ok(match self {
            QueryOp::Genre { genre } => render(Listing(catalog.find_by_genre(genre)?)),
            QueryOp::AfterYear { year } => render(Listing(catalog.find_after_year(*year)?)),
            QueryOp::Author { author } => render(Listing(catalog.find_by_author(author)?)),
            QueryOp::UpdatePrice { title, price } => {
                render(catalog.update_book_price(title, *price)?)
            }
            QueryOp::Delete { title } => render(catalog.delete_by_title(title)?),
            QueryOp::AvailableAfterYear { year } => {
                render(Listing(catalog.find_available_after_year(*year)?))
            }
            QueryOp::SortedByPrice { order } => {
                render(Listing(catalog.find_sorted_by_price(*order)?))
            }
            QueryOp::Page { page } => render(Listing(catalog.find_paginated(*page)?)),
            QueryOp::AvgPriceByGenre => render(Listing(catalog.average_price_by_genre()?)),
            QueryOp::TopAuthor => match catalog.author_with_most_books()? {
                Some(top) => render(top),
                None => "(no results)".to_string(),
            },
            QueryOp::IndexTitle => catalog.create_title_index()?,
            QueryOp::IndexAuthorYear => catalog.create_author_year_index()?,
        })
    }
}

fn render(result: impl Display) -> String {
    result.to_string()
}

/// The fixed sequence `run` executes
fn reference_calls() -> Vec<QueryOp> {
    vec![
        QueryOp::Genre { genre: "Fiction".into() },
        QueryOp::AfterYear { year: 2000 },
        QueryOp::Author { author: "George Orwell".into() },
        QueryOp::UpdatePrice { title: "1984".into(), price: 15.99 },
        QueryOp::Delete { title: "Brave New World".into() },
        QueryOp::AvailableAfterYear { year: 2010 },
        QueryOp::SortedByPrice { order: SortOrder::Ascending },
        QueryOp::Page { page: 1 },
        QueryOp::AvgPriceByGenre,
        QueryOp::TopAuthor,
        QueryOp::IndexTitle,
        QueryOp::IndexAuthorYear,
    ]
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, source) = BookshelfConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(db) = cli.db {
        config.store.path = db;
    }

    init_tracing(&config.logging.level);
    report_config_source(&source);
    tracing::debug!(version = VERSION, store = %config.store.path.display(), "starting");

    let catalog = CatalogQueryService::new(config.store.clone());

    match cli.command {
        Commands::Run => run_reference(&catalog),
        Commands::Query { op } => {
            let output = op
                .execute(&catalog)
                .with_context(|| format!("{} failed", op.label()))?;
            println!("{}", output);
            Ok(())
        }
        Commands::Import { file } => import_books(&catalog, &file),
        Commands::Indexes => {
            let names = catalog
                .list_indexes()
                .context("Failed to list indexes")?;
            for name in names {
                println!("{}", name);
            }
            Ok(())
        }
    }
}

/// stderr only, so stdout carries results; `RUST_LOG` wins over the config
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn report_config_source(source: &ConfigSource) {
    match source {
        ConfigSource::File(path) => tracing::debug!(path = %path.display(), "loaded config"),
        ConfigSource::Missing(path) => {
            tracing::warn!(path = %path.display(), "config file not found, using defaults")
        }
        ConfigSource::Defaults => tracing::debug!("no config file, using defaults"),
    }
}

/// Every call runs even if an earlier one failed
fn run_reference(catalog: &CatalogQueryService) -> Result<()> {
    let calls = reference_calls();
    let mut failed = 0;

    for op in &calls {
        println!("== {} ==", op.label());
        match op.execute(catalog) {
            Ok(output) => println!("{}", output),
            Err(e) => {
                failed += 1;
                tracing::error!(operation = %op.label(), error = %e, "operation failed");
                println!("error: {}", e);
            }
        }
        println!();
    }

    if failed > 0 {
        bail!("{} of {} operations failed", failed, calls.len());
    }
    Ok(())
}

/// Import books from a JSON file
/// Format: [books...] or { "<collection>": [books...], ... }
fn import_books(catalog: &CatalogQueryService, file: &Path) -> Result<()> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;

    let data: Value = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in file: {}", file.display()))?;

    let collection = &catalog.config().collection;
    let records = match data {
        Value::Array(records) => records,
        Value::Object(mut by_collection) => match by_collection.remove(collection) {
            Some(Value::Array(records)) => records,
            Some(_) => bail!("Collection '{}' must be an array", collection),
            None => bail!("No '{}' collection in {}", collection, file.display()),
        },
        _ => bail!("Expected an array or an object in {}", file.display()),
    };

    let books = records
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            serde_json::from_value::<Book>(record)
                .with_context(|| format!("Record {} is not a valid book", i))
        })
        .collect::<Result<Vec<_>>>()?;

    let inserted = catalog
        .seed(&books)
        .with_context(|| format!("Failed to import into {}", catalog.config().path.display()))?;

    println!("Imported {} books into '{}'", inserted, collection);
    Ok(())
}
