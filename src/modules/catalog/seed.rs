//! Demo catalog used by `serve --seed`, the `search` command and tests.

use std::sync::Arc;

use bookstore_db::{EntityManager, Result, Store};

use super::models::{Book, Category, Publisher};
use super::{BookService, CategoryService, PublisherService};

/// How many rows of each kind a seed run created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub books: usize,
    pub categories: usize,
    pub publishers: usize,
}

/// Load the demo catalog through the services, inside the caller's
/// transaction.
pub fn load_demo_catalog(em: &mut EntityManager) -> Result<SeedSummary> {
    let books = BookService::new();
    let categories = CategoryService::new();
    let publishers = PublisherService::new();
    let mut summary = SeedSummary::default();

    let mut publisher = |em: &mut EntityManager, name: &str, country: &str| {
        summary.publishers += 1;
        publishers.save_publisher(
            em,
            Publisher {
                id: None,
                name: name.to_string(),
                country: Some(country.to_string()),
            },
        )
    };
    let prentice_hall = publisher(em, "Prentice Hall", "US")?.id;
    let addison_wesley = publisher(em, "Addison-Wesley", "US")?.id;
    let oreilly = publisher(em, "O'Reilly Media", "US")?.id;
    let no_starch = publisher(em, "No Starch Press", "US")?.id;

    let computing = categories.save_category(em, Category::root("Computing"))?;
    let programming = categories.save_category(em, Category::child_of("Programming", computing))?;
    let databases = categories.save_category(em, Category::child_of("Databases", computing))?;
    let fiction = categories.save_category(em, Category::root("Fiction"))?;
    summary.categories = 4;

    let catalog = [
        ("Thinking in Java", "Bruce Eckel", "978-0131872486", 2006, prentice_hall, programming),
        ("Effective Java", "Joshua Bloch", "978-0134685991", 2018, addison_wesley, programming),
        ("Java Concurrency in Practice", "Brian Goetz", "978-0321349606", 2006, addison_wesley, programming),
        ("Programming Rust", "Jim Blandy", "978-1492052593", 2021, oreilly, programming),
        ("The Rust Programming Language", "Steve Klabnik", "978-1718503106", 2023, no_starch, programming),
        ("Designing Data-Intensive Applications", "Martin Kleppmann", "978-1449373320", 2017, oreilly, databases),
        ("Dune", "Frank Herbert", "978-0441172719", 1965, None, fiction),
    ];
    for (title, author, isbn, year, publisher_id, category_id) in catalog {
        let mut book = Book::new(title, author, isbn);
        book.publication_year = Some(year);
        book.publisher_id = publisher_id;
        book.category_id = Some(category_id);
        books.save_book(em, book)?;
        summary.books += 1;
    }

    Ok(summary)
}

/// Seed `store` with the demo catalog in a transaction of its own.
pub fn seed_demo_catalog(store: &Arc<Store>) -> Result<SeedSummary> {
    let mut em = EntityManager::new(store.clone());
    em.begin()?;
    match load_demo_catalog(&mut em) {
        Ok(summary) => {
            em.commit()?;
            Ok(summary)
        }
        Err(error) => {
            em.rollback()?;
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::catalog::tests::catalog_store;
    use bookstore_db::Entity;

    #[test]
    fn seeding_commits_every_row() {
        let store = catalog_store();
        let summary = seed_demo_catalog(&store).unwrap();

        assert_eq!(summary.books, store.row_count(Book::NAME).unwrap());
        assert_eq!(summary.categories, store.row_count(Category::NAME).unwrap());
        assert_eq!(summary.publishers, store.row_count(Publisher::NAME).unwrap());
    }

    #[test]
    fn seeding_without_tables_leaves_nothing_behind() {
        let store = Arc::new(Store::default());
        assert!(seed_demo_catalog(&store).is_err());
        assert!(store.table_names().is_empty());
    }
}
