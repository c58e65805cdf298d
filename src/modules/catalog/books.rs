use bookstore_db::{
    invoke, CriteriaQuery, EntityManager, Id, Predicate, Propagation, Result,
};

use super::models::Book;

/// Book management facade.
///
/// Operations run in the caller's transaction unless stated otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookService;

impl BookService {
    pub const fn new() -> Self {
        Self
    }

    /// Persist a newly created book and return it with its identity.
    pub fn save_book(&self, em: &mut EntityManager, mut book: Book) -> Result<Book> {
        invoke(em, Propagation::Mandatory, "save_book", move |em| {
            em.persist(&mut book)?;
            tracing::info!(book_id = ?book.id, title = %book.title, "book saved");
            Ok(book)
        })
    }

    pub fn find_book_by_id(&self, em: &mut EntityManager, book_id: Id) -> Result<Option<Book>> {
        invoke(em, Propagation::Mandatory, "find_book_by_id", |em| {
            em.find::<Book>(book_id)
        })
    }

    /// Remove a book. A `None` book is ignored.
    pub fn delete_book(&self, em: &mut EntityManager, book: Option<&Book>) -> Result<()> {
        invoke(em, Propagation::Mandatory, "delete_book", |em| {
            let Some(book) = book else {
                tracing::debug!("delete_book called without a book; nothing to remove");
                return Ok(());
            };
            em.remove(book)?;
            tracing::info!(book_id = ?book.id, "book deleted");
            Ok(())
        })
    }

    /// Books whose title matches `pattern` (`LIKE` syntax, wildcards supplied
    /// by the caller). Joins the caller's transaction when there is one.
    pub fn find_by_criteria(&self, em: &mut EntityManager, pattern: &str) -> Result<Vec<Book>> {
        invoke(em, Propagation::Supports, "find_by_criteria", |em| {
            em.create_query(CriteriaQuery::<Book>::new().filter(Predicate::like("title", pattern)))
                .get_result_list()
        })
    }

    /// Apply the state of a detached book to the stored one. Starts its own
    /// transaction when the caller has none.
    pub fn update_book(&self, em: &mut EntityManager, book: &Book) -> Result<Book> {
        invoke(em, Propagation::Required, "update_book", |em| {
            let updated = em.merge(book)?;
            tracing::info!(book_id = ?updated.id, "book updated");
            Ok(updated)
        })
    }
}
