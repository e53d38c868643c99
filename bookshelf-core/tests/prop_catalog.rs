use bookshelf_core::{
    Book, CatalogQueryService, ConnectionConfig, DatabaseCore, FindOptions, SortOrder, PAGE_SIZE,
};
use proptest::prelude::*;
use serde_json::json;
use tempfile::TempDir;

fn arb_book() -> impl Strategy<Value = Book> {
    (
        "[A-Z][a-z]{0,6}",
        prop::sample::select(vec!["Orwell", "Huxley", "Ishiguro", "Atwood"]),
        prop::sample::select(vec!["Fiction", "Memoir", "Satire"]),
        0u32..5000,
        1900i64..2030,
        any::<bool>(),
    )
        .prop_map(|(title, author, genre, cents, year, in_stock)| Book {
            title,
            author: author.to_string(),
            price: cents as f64 / 100.0,
            published_year: year,
            genre: genre.to_string(),
            in_stock,
        })
}

fn seeded(books: &[Book]) -> (TempDir, CatalogQueryService) {
    let dir = TempDir::new().unwrap();
    let catalog =
        CatalogQueryService::new(ConnectionConfig::new(dir.path().join("bookstore.db")));
    catalog.seed(books).unwrap();
    (dir, catalog)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_sorted_by_price_is_ordered_permutation(books in prop::collection::vec(arb_book(), 0..30)) {
        let (_dir, catalog) = seeded(&books);

        let asc = catalog.find_sorted_by_price(SortOrder::Ascending).unwrap();
        let desc = catalog.find_sorted_by_price(SortOrder::Descending).unwrap();

        for w in asc.windows(2) {
            prop_assert!(w[0].price <= w[1].price);
        }
        for w in desc.windows(2) {
            prop_assert!(w[0].price >= w[1].price);
        }

        let key = |b: &bookshelf_core::BookSummary| (b.title.clone(), b.author.clone(), (b.price * 100.0).round() as i64);
        let mut a: Vec<_> = asc.iter().map(key).collect();
        let mut d: Vec<_> = desc.iter().map(key).collect();
        a.sort();
        d.sort();
        prop_assert_eq!(a.len(), books.len());
        prop_assert_eq!(a, d);
    }

    #[test]
    fn prop_pages_concatenate_to_full_listing(books in prop::collection::vec(arb_book(), 0..23)) {
        let (_dir, catalog) = seeded(&books);

        let pages = books.len() / PAGE_SIZE + 2;
        let mut all = Vec::new();
        for page in 1..=pages as u64 {
            let chunk = catalog.find_paginated(page).unwrap();
            prop_assert!(chunk.len() <= PAGE_SIZE);
            all.extend(chunk);
        }

        prop_assert_eq!(all.len(), books.len());
        for (found, expected) in all.iter().zip(&books) {
            prop_assert_eq!(&found.title, &expected.title);
            prop_assert_eq!(found.price, expected.price);
        }
        prop_assert!(catalog.find_paginated(pages as u64 + 1).unwrap().is_empty());
    }

    #[test]
    fn prop_available_after_year_is_intersection(
        books in prop::collection::vec(arb_book(), 0..25),
        year in 1890i64..2040,
    ) {
        let (_dir, catalog) = seeded(&books);

        let expected: Vec<String> = books
            .iter()
            .filter(|b| b.in_stock && b.published_year > year)
            .map(|b| b.title.clone())
            .collect();
        let found: Vec<String> = catalog
            .find_available_after_year(year)
            .unwrap()
            .into_iter()
            .map(|b| b.title)
            .collect();
        prop_assert_eq!(found, expected);
    }

    #[test]
    fn prop_skip_limit_matches_slice(
        values in prop::collection::vec(-50i64..50, 0..40),
        skip in 0usize..45,
        limit in 1usize..10,
    ) {
        let db = DatabaseCore::in_memory("prop");
        let coll = db.collection("values").unwrap();
        for v in &values {
            coll.insert_one(json!({"v": v}).as_object().unwrap().clone()).unwrap();
        }

        let found: Vec<i64> = coll
            .find_with_options(
                &json!({}),
                FindOptions::new()
                    .with_sort(vec![("v".into(), 1)])
                    .with_skip(skip)
                    .with_limit(limit),
            )
            .unwrap()
            .iter()
            .map(|d| d["v"].as_i64().unwrap())
            .collect();

        let mut sorted = values.clone();
        sorted.sort();
        let expected: Vec<i64> = sorted.into_iter().skip(skip).take(limit).collect();
        prop_assert_eq!(found, expected);
    }
}
