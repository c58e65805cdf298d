//! Ad-hoc criteria queries run against the demo catalog.

use std::sync::Arc;

use bookstore_app::modules::catalog::{models::CATALOG_TABLES, seed};
use bookstore_app::{Book, Category, Publisher};
use bookstore_db::{CriteriaQuery, EntityManager, Order, PersistenceError, Predicate, Store};

fn seeded() -> EntityManager {
    let store = Store::default();
    for table in CATALOG_TABLES {
        store.define_table(table);
    }
    let store = Arc::new(store);
    seed::seed_demo_catalog(&store).unwrap();
    EntityManager::new(store)
}

#[test]
fn simple_query_returns_rows() {
    let mut em = seeded();
    let books = em
        .create_query(CriteriaQuery::<Book>::new())
        .get_result_list()
        .unwrap();
    assert!(!books.is_empty());
}

#[test]
fn string_parameter_query_returns_rows() {
    let mut em = seeded();
    let books = em
        .create_query(
            CriteriaQuery::<Book>::new()
                .filter(Predicate::like("title", "%Rust%"))
                .order_by(Order::desc("publication_year")),
        )
        .get_result_list()
        .unwrap();
    let years: Vec<_> = books.iter().map(|book| book.publication_year).collect();
    assert_eq!(years, vec![Some(2023), Some(2021)]);
}

#[test]
fn query_parameterized_by_a_looked_up_category() {
    let mut em = seeded();
    let databases = em
        .create_query(CriteriaQuery::<Category>::new().filter(Predicate::equal("name", "Databases")))
        .get_single_result()
        .unwrap();

    let books = em
        .create_query(
            CriteriaQuery::<Book>::new()
                .filter(Predicate::equal("category_id", databases.id.unwrap())),
        )
        .get_result_list()
        .unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0].title, "Designing Data-Intensive Applications");
}

#[test]
fn composed_predicates_and_limits() {
    let mut em = seeded();
    let books = em
        .create_query(
            CriteriaQuery::<Book>::new()
                .filter(
                    Predicate::like("title", "%Java%")
                        .and(Predicate::equal("publication_year", 2006).not()),
                )
                .order_by(Order::asc("title")),
        )
        .get_result_list()
        .unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0].title, "Effective Java");

    let first_two = em
        .create_query(CriteriaQuery::<Book>::new().order_by(Order::asc("title")))
        .set_max_results(2)
        .get_result_list()
        .unwrap();
    assert_eq!(first_two.len(), 2);
    assert_eq!(first_two[0].title, "Designing Data-Intensive Applications");
}

#[test]
fn books_without_a_publisher_match_is_null() {
    let mut em = seeded();
    let books = em
        .create_query(CriteriaQuery::<Book>::new().filter(Predicate::is_null("publisher_id")))
        .get_result_list()
        .unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0].title, "Dune");
}

#[test]
fn ambiguous_single_result_is_reported() {
    let mut em = seeded();
    let result = em
        .create_query(CriteriaQuery::<Publisher>::new().filter(Predicate::equal("country", "US")))
        .get_single_result();
    assert!(matches!(
        result,
        Err(PersistenceError::NonUniqueResult { entity: "publisher", count: 4 })
    ));
}

#[test]
fn unknown_attribute_is_a_malformed_query() {
    let mut em = seeded();
    let result = em
        .create_query(CriteriaQuery::<Book>::new().filter(Predicate::equal("price", 10)))
        .get_result_list();
    assert!(matches!(
        result,
        Err(PersistenceError::UnknownAttribute { entity: "book", ref attribute }) if attribute == "price"
    ));
}
