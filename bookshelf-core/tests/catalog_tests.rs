//! Integration tests for CatalogQueryService
//!
//! Every test seeds its own store under a TempDir.

use bookshelf_core::{
    AuthorCount, Book, BookSummary, BookshelfError, CatalogQueryService, ConnectionConfig,
    GenreAverage, SortOrder, UpdateSummary, AUTHOR_YEAR_INDEX, PAGE_SIZE, TITLE_INDEX,
};
use tempfile::TempDir;

fn book(title: &str, author: &str, genre: &str, price: f64, year: i64, in_stock: bool) -> Book {
    Book {
        title: title.to_string(),
        author: author.to_string(),
        price,
        published_year: year,
        genre: genre.to_string(),
        in_stock,
    }
}

fn library() -> Vec<Book> {
    vec![
        book("1984", "George Orwell", "Dystopia", 12.0, 1949, true),
        book("Animal Farm", "George Orwell", "Satire", 8.5, 1945, false),
        book("Brave New World", "Aldous Huxley", "Dystopia", 14.0, 1932, true),
        book("The Road", "Cormac McCarthy", "Fiction", 16.0, 2006, true),
        book("Klara and the Sun", "Kazuo Ishiguro", "Fiction", 22.0, 2021, false),
        book("Never Let Me Go", "Kazuo Ishiguro", "Fiction", 11.0, 2005, true),
        book("Homage to Catalonia", "George Orwell", "Memoir", 9.0, 1938, true),
        book("Blood Meridian", "Cormac McCarthy", "Western", 14.0, 1985, true),
        book("The Buried Giant", "Kazuo Ishiguro", "Fantasy", 18.5, 2015, true),
        book("Island", "Aldous Huxley", "Fiction", 10.0, 1962, false),
        book("Remains of the Day", "Kazuo Ishiguro", "Fiction", 13.0, 1989, true),
        book("Down and Out", "George Orwell", "Memoir", 7.0, 1933, true),
    ]
}

fn catalog(dir: &TempDir) -> CatalogQueryService {
    CatalogQueryService::new(ConnectionConfig::new(dir.path().join("bookstore.db")))
}

fn seeded(dir: &TempDir, books: &[Book]) -> CatalogQueryService {
    let catalog = catalog(dir);
    assert_eq!(catalog.seed(books).unwrap(), books.len());
    catalog
}

fn summary(b: &Book) -> BookSummary {
    BookSummary {
        title: b.title.clone(),
        author: b.author.clone(),
        price: b.price,
    }
}

fn titles(list: &[BookSummary]) -> Vec<&str> {
    list.iter().map(|b| b.title.as_str()).collect()
}

// ========== WORKED EXAMPLE ==========

#[test]
fn test_worked_example() {
    let dir = TempDir::new().unwrap();
    let catalog = seeded(
        &dir,
        &[
            book("A", "X", "Fiction", 10.0, 2000, true),
            book("B", "Y", "Fiction", 20.0, 1990, false),
        ],
    );

    assert_eq!(
        catalog.average_price_by_genre().unwrap(),
        vec![GenreAverage {
            genre: "Fiction".into(),
            average_price: 15.0
        }]
    );
    assert_eq!(titles(&catalog.find_after_year(1995).unwrap()), vec!["A"]);
    assert_eq!(titles(&catalog.find_available_after_year(1985).unwrap()), vec!["A"]);
}

// ========== READS ==========

#[test]
fn test_find_by_genre_projects_summary() {
    let dir = TempDir::new().unwrap();
    let books = library();
    let catalog = seeded(&dir, &books);

    let dystopias = catalog.find_by_genre("Dystopia").unwrap();
    assert_eq!(dystopias, vec![summary(&books[0]), summary(&books[2])]);
}

#[test]
fn test_find_by_unknown_genre_is_empty() {
    let dir = TempDir::new().unwrap();
    let catalog = seeded(&dir, &library());

    for genre in ["Poetry", "fiction", "Fiction ", "Horror"] {
        assert!(catalog.find_by_genre(genre).unwrap().is_empty(), "{}", genre);
    }
}

#[test]
fn test_find_after_year_is_sound_and_complete() {
    let dir = TempDir::new().unwrap();
    let books = library();
    let catalog = seeded(&dir, &books);

    for year in [1900, 1932, 1945, 1985, 2005, 2021, 2100] {
        let found = catalog.find_after_year(year).unwrap();
        let expected: Vec<BookSummary> = books
            .iter()
            .filter(|b| b.published_year > year)
            .map(summary)
            .collect();
        assert_eq!(found, expected, "year {}", year);
    }
}

#[test]
fn test_find_available_after_year_is_intersection() {
    let dir = TempDir::new().unwrap();
    let books = library();
    let catalog = seeded(&dir, &books);

    for year in [1900, 1960, 2000, 2010] {
        let after = catalog.find_after_year(year).unwrap();
        let in_stock: Vec<&str> = books
            .iter()
            .filter(|b| b.in_stock)
            .map(|b| b.title.as_str())
            .collect();
        let expected: Vec<BookSummary> = after
            .into_iter()
            .filter(|b| in_stock.contains(&b.title.as_str()))
            .collect();

        assert_eq!(catalog.find_available_after_year(year).unwrap(), expected);
    }
}

#[test]
fn test_find_by_author_natural_order() {
    let dir = TempDir::new().unwrap();
    let catalog = seeded(&dir, &library());

    assert_eq!(
        titles(&catalog.find_by_author("George Orwell").unwrap()),
        vec!["1984", "Animal Farm", "Homage to Catalonia", "Down and Out"]
    );
    assert!(catalog.find_by_author("Jane Austen").unwrap().is_empty());
}

#[test]
fn test_sorted_by_price_both_directions() {
    let dir = TempDir::new().unwrap();
    let catalog = seeded(&dir, &library());

    let asc = catalog.find_sorted_by_price(SortOrder::Ascending).unwrap();
    let desc = catalog.find_sorted_by_price(SortOrder::Descending).unwrap();

    assert!(asc.windows(2).all(|w| w[0].price <= w[1].price));
    assert!(desc.windows(2).all(|w| w[0].price >= w[1].price));

    let mut a: Vec<&str> = titles(&asc);
    let mut d: Vec<&str> = titles(&desc);
    a.sort_unstable();
    d.sort_unstable();
    assert_eq!(a, d);
    assert_eq!(asc.len(), library().len());
}

#[test]
fn test_sorted_by_price_ties_keep_natural_order() {
    let dir = TempDir::new().unwrap();
    let catalog = seeded(&dir, &library());

    let asc = catalog.find_sorted_by_price(SortOrder::Ascending).unwrap();
    let fourteen: Vec<&str> = asc
        .iter()
        .filter(|b| b.price == 14.0)
        .map(|b| b.title.as_str())
        .collect();
    assert_eq!(fourteen, vec!["Brave New World", "Blood Meridian"]);

    let desc = catalog.find_sorted_by_price(SortOrder::Descending).unwrap();
    let fourteen: Vec<&str> = desc
        .iter()
        .filter(|b| b.price == 14.0)
        .map(|b| b.title.as_str())
        .collect();
    assert_eq!(fourteen, vec!["Brave New World", "Blood Meridian"]);
}

#[test]
fn test_pagination_covers_everything_once() {
    let dir = TempDir::new().unwrap();
    let books = library();
    let catalog = seeded(&dir, &books);

    let mut all = Vec::new();
    let mut page = 1;
    loop {
        let chunk = catalog.find_paginated(page).unwrap();
        assert!(chunk.len() <= PAGE_SIZE);
        if chunk.is_empty() {
            break;
        }
        all.extend(chunk);
        page += 1;
    }

    assert_eq!(page, 4); // 12 records: 5 + 5 + 2
    assert_eq!(all, books.iter().map(summary).collect::<Vec<_>>());
    assert_eq!(catalog.find_paginated(3).unwrap().len(), 2);
    assert!(catalog.find_paginated(100).unwrap().is_empty());
}

// ========== WRITES ==========

#[test]
fn test_update_price_visible_to_later_reads() {
    let dir = TempDir::new().unwrap();
    let catalog = seeded(&dir, &library());

    let res = catalog.update_book_price("Island", 19.75).unwrap();
    assert_eq!(res, UpdateSummary { matched: 1, modified: 1 });

    let huxley = catalog.find_by_author("Aldous Huxley").unwrap();
    assert_eq!(huxley[1].title, "Island");
    assert_eq!(huxley[1].price, 19.75);

    let fiction = catalog.find_by_genre("Fiction").unwrap();
    let island = fiction.iter().find(|b| b.title == "Island").unwrap();
    assert_eq!(island.price, 19.75);
}

#[test]
fn test_update_price_same_value_not_modified() {
    let dir = TempDir::new().unwrap();
    let catalog = seeded(&dir, &library());

    let res = catalog.update_book_price("1984", 12.0).unwrap();
    assert_eq!(res, UpdateSummary { matched: 1, modified: 0 });
}

#[test]
fn test_update_price_unknown_title() {
    let dir = TempDir::new().unwrap();
    let catalog = seeded(&dir, &library());

    let res = catalog.update_book_price("Ulysses", 30.0).unwrap();
    assert_eq!(res, UpdateSummary { matched: 0, modified: 0 });
}

#[test]
fn test_update_price_duplicate_title_touches_first_only() {
    let dir = TempDir::new().unwrap();
    let catalog = seeded(
        &dir,
        &[
            book("Twin", "First", "Fiction", 5.0, 2000, true),
            book("Twin", "Second", "Fiction", 5.0, 2001, true),
        ],
    );

    let res = catalog.update_book_price("Twin", 6.0).unwrap();
    assert_eq!(res, UpdateSummary { matched: 1, modified: 1 });
    assert_eq!(catalog.find_by_author("First").unwrap()[0].price, 6.0);
    assert_eq!(catalog.find_by_author("Second").unwrap()[0].price, 5.0);
}

#[test]
fn test_delete_by_title() {
    let dir = TempDir::new().unwrap();
    let books = library();
    let catalog = seeded(&dir, &books);

    assert_eq!(catalog.delete_by_title("Island").unwrap().deleted, 1);
    let remaining = catalog.find_sorted_by_price(SortOrder::Ascending).unwrap();
    assert_eq!(remaining.len(), books.len() - 1);
    assert!(remaining.iter().all(|b| b.title != "Island"));

    let before = catalog.find_paginated(1).unwrap();
    assert_eq!(catalog.delete_by_title("Island").unwrap().deleted, 0);
    assert_eq!(catalog.find_paginated(1).unwrap(), before);
    assert_eq!(
        catalog.find_sorted_by_price(SortOrder::Ascending).unwrap().len(),
        books.len() - 1
    );
}

#[test]
fn test_blank_text_is_an_ordinary_value() {
    let dir = TempDir::new().unwrap();
    let books = library();
    let catalog = seeded(&dir, &books);

    assert_eq!(catalog.delete_by_title("").unwrap().deleted, 0);
    assert_eq!(
        catalog.update_book_price("", 1.0).unwrap(),
        UpdateSummary { matched: 0, modified: 0 }
    );
    assert!(catalog.find_by_genre("   ").unwrap().is_empty());
    assert!(catalog.find_by_author(" ").unwrap().is_empty());
    assert_eq!(
        catalog.find_sorted_by_price(SortOrder::Ascending).unwrap().len(),
        books.len()
    );
}

// ========== AGGREGATIONS ==========

#[test]
fn test_average_price_two_genres() {
    let dir = TempDir::new().unwrap();
    let catalog = seeded(
        &dir,
        &[
            book("A", "X", "Poetry", 3.0, 2000, true),
            book("B", "X", "Drama", 10.0, 2000, true),
            book("C", "Y", "Poetry", 6.0, 2000, true),
            book("D", "Y", "Drama", 20.0, 2000, true),
            book("E", "Z", "Poetry", 4.5, 2000, true),
        ],
    );

    assert_eq!(
        catalog.average_price_by_genre().unwrap(),
        vec![
            GenreAverage { genre: "Drama".into(), average_price: 15.0 },
            GenreAverage { genre: "Poetry".into(), average_price: 4.5 },
        ]
    );
}

#[test]
fn test_author_with_most_books() {
    let dir = TempDir::new().unwrap();
    let catalog = seeded(&dir, &library());

    // Orwell and Ishiguro both have four; Orwell's group is seen first
    assert_eq!(
        catalog.author_with_most_books().unwrap(),
        Some(AuthorCount { author: "George Orwell".into(), count: 4 })
    );

    catalog.delete_by_title("1984").unwrap();
    assert_eq!(
        catalog.author_with_most_books().unwrap(),
        Some(AuthorCount { author: "Kazuo Ishiguro".into(), count: 4 })
    );
}

// ========== INDEXES ==========

#[test]
fn test_index_creation_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let catalog = seeded(&dir, &library());

    assert_eq!(catalog.create_title_index().unwrap(), TITLE_INDEX);
    assert_eq!(catalog.create_title_index().unwrap(), TITLE_INDEX);
    assert_eq!(catalog.create_author_year_index().unwrap(), AUTHOR_YEAR_INDEX);
    assert_eq!(catalog.create_author_year_index().unwrap(), AUTHOR_YEAR_INDEX);

    assert_eq!(
        catalog.list_indexes().unwrap(),
        vec!["_id_", TITLE_INDEX, AUTHOR_YEAR_INDEX]
    );
}

#[test]
fn test_indexes_do_not_change_results() {
    let dir = TempDir::new().unwrap();
    let catalog = seeded(&dir, &library());

    let before_genre = catalog.find_by_author("Kazuo Ishiguro").unwrap();
    catalog.create_title_index().unwrap();
    catalog.create_author_year_index().unwrap();

    assert_eq!(catalog.find_by_author("Kazuo Ishiguro").unwrap(), before_genre);
    assert_eq!(catalog.update_book_price("The Road", 17.0).unwrap().modified, 1);
    assert_eq!(catalog.delete_by_title("Island").unwrap().deleted, 1);
    assert_eq!(catalog.delete_by_title("Island").unwrap().deleted, 0);
}

// ========== ERRORS ==========

#[test]
fn test_malformed_input_does_not_touch_store() {
    let dir = TempDir::new().unwrap();
    let catalog = catalog(&dir);

    assert!(matches!(
        catalog.update_book_price("1984", -0.5),
        Err(BookshelfError::InvalidInput(_))
    ));
    assert!(matches!(
        catalog.update_book_price("1984", f64::INFINITY),
        Err(BookshelfError::InvalidInput(_))
    ));
    assert!(matches!(catalog.find_paginated(0), Err(BookshelfError::InvalidInput(_))));
    assert!(matches!(catalog.find_by_genre(""), Err(BookshelfError::InvalidInput(_))));
    assert!(!dir.path().join("bookstore.db").exists());
}

#[test]
fn test_connection_failure_does_not_poison_later_calls() {
    let dir = TempDir::new().unwrap();
    let catalog = seeded(&dir, &library());
    let db = dir.path().join("bookstore.db");

    let good = std::fs::read(&db).unwrap();
    std::fs::write(&db, b"not a bookshelf file at all, just some text padding it out")
        .unwrap();
    assert!(catalog.find_by_genre("Fiction").unwrap_err().is_connection());
    assert!(catalog.average_price_by_genre().unwrap_err().is_connection());

    std::fs::write(&db, good).unwrap();
    assert_eq!(catalog.find_by_genre("Fiction").unwrap().len(), 5);
}

#[test]
fn test_sequential_services_share_nothing_but_the_store() {
    let dir = TempDir::new().unwrap();
    let writer = seeded(&dir, &library());
    let reader = catalog(&dir);

    writer.update_book_price("The Road", 9.0).unwrap();
    let road = reader
        .find_by_author("Cormac McCarthy")
        .unwrap()
        .into_iter()
        .find(|b| b.title == "The Road")
        .unwrap();
    assert_eq!(road.price, 9.0);
}
